/// Property-based tests for hand scoring using proptest
///
/// These tests verify that scoring is pure, ignores card order and that
/// the joker never scores worse than the card it stands in for.
use proptest::prelude::*;
use svara::{
    entities::{Card, Deck, HandRank, HandScore, Rank, Suit},
    functional::{argmax, score},
};

fn card_strategy() -> impl Strategy<Value = Card> {
    (0usize..8, 0usize..4).prop_map(|(rank, suit)| Card(Rank::ALL[rank], Suit::ALL[suit]))
}

// Three distinct cards from the 32-card deck
fn hand_strategy() -> impl Strategy<Value = [Card; 3]> {
    [card_strategy(), card_strategy(), card_strategy()]
        .prop_filter("Cards must be unique", |[a, b, c]| a != b && b != c && a != c)
}

const JOKER: Card = Card(Rank::Seven, Suit::Club);

proptest! {
    #[test]
    fn test_score_is_pure(hand in hand_strategy()) {
        prop_assert_eq!(score(&hand), score(&hand));
    }

    #[test]
    fn test_score_ignores_order(hand in hand_strategy()) {
        let [a, b, c] = hand;
        let expected = score(&hand);
        for permutation in [[a, c, b], [b, a, c], [b, c, a], [c, a, b], [c, b, a]] {
            prop_assert_eq!(score(&permutation), expected);
        }
    }

    #[test]
    fn test_joker_never_hurts(hand in hand_strategy(), slot in 0usize..3) {
        prop_assume!(!hand.contains(&JOKER));
        let mut with_joker = hand;
        with_joker[slot] = JOKER;
        prop_assert!(score(&with_joker) >= score(&hand));
    }

    #[test]
    fn test_value_bounds(hand in hand_strategy()) {
        let HandScore { rank, value } = score(&hand);
        let ceiling = match rank {
            HandRank::HighCard => 11,
            HandRank::Pair | HandRank::TwoSuited => 22,
            HandRank::ThreeSuited | HandRank::ThreeOfAKind => 33,
            HandRank::ThreeSevens => 34,
        };
        prop_assert!(value >= 7 && value <= ceiling, "{rank} scored {value}");
    }

    #[test]
    fn test_argmax_picks_every_best(hands in prop::collection::vec(hand_strategy(), 1..=10)) {
        let scores: Vec<HandScore> = hands.iter().map(score).collect();
        let winners = argmax(&scores);
        let best = scores.iter().max().copied();
        prop_assert!(!winners.is_empty());
        for (idx, s) in scores.iter().enumerate() {
            prop_assert_eq!(winners.contains(&idx), Some(*s) == best);
        }
    }
}

#[test]
fn test_three_sevens_beat_every_other_hand() {
    let sevens = [
        Card(Rank::Seven, Suit::Heart),
        Card(Rank::Seven, Suit::Diamond),
        Card(Rank::Seven, Suit::Spade),
    ];
    let best = score(&sevens);
    let cards = Deck::standard().cards().to_vec();
    for (i, a) in cards.iter().enumerate() {
        for (j, b) in cards.iter().enumerate().skip(i + 1) {
            for c in cards.iter().skip(j + 1) {
                assert!(score(&[*a, *b, *c]) <= best);
            }
        }
    }
}
