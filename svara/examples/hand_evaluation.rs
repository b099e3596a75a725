//! Hand Evaluation Example
//!
//! Scores a few three-card hands, shows the joker at work and picks the
//! winners of a table.

use svara::entities::{Card, Deck, Rank, Suit};
use svara::functional::{argmax, score};

fn show(cards: &[Card; 3]) -> String {
    cards
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

fn main() {
    println!("=== Svara Hand Evaluation Example ===\n");

    // Example 1: Natural hands
    println!("Example 1: Scoring natural hands");
    let hands = [
        [
            Card(Rank::Ace, Suit::Heart),
            Card(Rank::King, Suit::Heart),
            Card(Rank::Eight, Suit::Spade),
        ],
        [
            Card(Rank::Ace, Suit::Spade),
            Card(Rank::Ace, Suit::Diamond),
            Card(Rank::Nine, Suit::Heart),
        ],
        [
            Card(Rank::Seven, Suit::Heart),
            Card(Rank::Seven, Suit::Diamond),
            Card(Rank::Seven, Suit::Spade),
        ],
    ];
    for hand in &hands {
        println!("{:<14} => {}", show(hand), score(hand));
    }

    // Example 2: The seven of clubs stands in for any missing card
    println!("\nExample 2: The joker");
    let with_joker = [
        Card(Rank::Seven, Suit::Club),
        Card(Rank::Ace, Suit::Heart),
        Card(Rank::King, Suit::Heart),
    ];
    println!("{:<14} => {}", show(&with_joker), score(&with_joker));

    // Example 3: A dealt table, ties included
    println!("\nExample 3: Winners of a dealt table");
    let mut rng = rand::rng();
    let mut deck = Deck::shuffled(&mut rng);
    let table: Vec<[Card; 3]> = (0..4)
        .filter_map(|_| deck.deal_hand())
        .filter_map(|cards| cards.try_into().ok())
        .collect();
    let scores: Vec<_> = table.iter().map(score).collect();
    for (seat, (hand, hand_score)) in table.iter().zip(&scores).enumerate() {
        println!("Seat {}: {:<14} => {}", seat + 1, show(hand), hand_score);
    }

    match argmax(&scores).as_slice() {
        [winner] => println!("\nWinner: seat {}", winner + 1),
        tied => println!(
            "\nSvara between seats {:?}",
            tied.iter().map(|seat| seat + 1).collect::<Vec<_>>()
        ),
    }
}
