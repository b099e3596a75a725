use super::{
    constants::THREE_SEVENS_VALUE,
    entities::{Card, Deck, HandRank, HandScore, Rank},
};

/// Score a three-card hand.
///
/// The joker (seven of clubs) takes whichever identity gives the best
/// score, including playing as itself. Pure and order independent.
#[must_use]
pub fn score(cards: &[Card; 3]) -> HandScore {
    let natural = score_natural(cards);
    let Some(joker_idx) = cards.iter().position(Card::is_joker) else {
        return natural;
    };

    Deck::standard()
        .cards()
        .iter()
        .filter(|candidate| !cards.contains(candidate))
        .map(|&substitute| {
            let mut hand = *cards;
            hand[joker_idx] = substitute;
            score_natural(&hand)
        })
        .fold(natural, HandScore::max)
}

/// Score a hand, or `None` unless it holds exactly three cards.
#[must_use]
pub fn score_slice(cards: &[Card]) -> Option<HandScore> {
    let hand: &[Card; 3] = cards.try_into().ok()?;
    Some(score(hand))
}

fn score_natural(cards: &[Card; 3]) -> HandScore {
    let [a, b, c] = *cards;

    if a.0 == b.0 && b.0 == c.0 {
        if a.0 == Rank::Seven {
            return HandScore {
                rank: HandRank::ThreeSevens,
                value: THREE_SEVENS_VALUE,
            };
        }
        return HandScore {
            rank: HandRank::ThreeOfAKind,
            value: a.value() + b.value() + c.value(),
        };
    }

    if a.1 == b.1 && b.1 == c.1 {
        return HandScore {
            rank: HandRank::ThreeSuited,
            value: a.value() + b.value() + c.value(),
        };
    }

    // With three cards at most one pair can share a suit.
    let suited = [(a, b), (a, c), (b, c)]
        .into_iter()
        .find(|(x, y)| x.1 == y.1);
    if let Some((x, y)) = suited {
        return HandScore {
            rank: HandRank::TwoSuited,
            value: x.value() + y.value(),
        };
    }

    let paired = [(a, b), (a, c), (b, c)]
        .into_iter()
        .find(|(x, y)| x.0 == y.0);
    if let Some((x, _)) = paired {
        return HandScore {
            rank: HandRank::Pair,
            value: 2 * x.value(),
        };
    }

    HandScore {
        rank: HandRank::HighCard,
        value: a.value().max(b.value()).max(c.value()),
    }
}

/// Indices of every score tied for the best.
#[must_use]
pub fn argmax(scores: &[HandScore]) -> Vec<usize> {
    let Some(best) = scores.iter().max() else {
        return Vec::new();
    };
    scores
        .iter()
        .enumerate()
        .filter(|(_, score)| *score == best)
        .map(|(idx, _)| idx)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::entities::Suit;

    fn hand(cards: [(Rank, Suit); 3]) -> [Card; 3] {
        cards.map(|(rank, suit)| Card(rank, suit))
    }

    #[test]
    fn test_three_sevens() {
        let cards = hand([
            (Rank::Seven, Suit::Heart),
            (Rank::Seven, Suit::Diamond),
            (Rank::Seven, Suit::Spade),
        ]);
        assert_eq!(
            score(&cards),
            HandScore {
                rank: HandRank::ThreeSevens,
                value: 34
            }
        );
    }

    #[test]
    fn test_joker_with_two_sevens() {
        let cards = hand([
            (Rank::Seven, Suit::Club),
            (Rank::Seven, Suit::Heart),
            (Rank::Seven, Suit::Spade),
        ]);
        assert_eq!(score(&cards).rank, HandRank::ThreeSevens);
    }

    #[test]
    fn test_joker_picks_best_suit_pair() {
        let cards = hand([
            (Rank::Seven, Suit::Club),
            (Rank::Eight, Suit::Heart),
            (Rank::Nine, Suit::Diamond),
        ]);
        assert_eq!(
            score(&cards),
            HandScore {
                rank: HandRank::TwoSuited,
                value: 20
            }
        );
    }

    #[test]
    fn test_three_aces_top_three_of_a_kind() {
        let aces = hand([
            (Rank::Ace, Suit::Heart),
            (Rank::Ace, Suit::Diamond),
            (Rank::Ace, Suit::Spade),
        ]);
        let kings = hand([
            (Rank::King, Suit::Heart),
            (Rank::King, Suit::Diamond),
            (Rank::King, Suit::Spade),
        ]);
        assert_eq!(
            score(&aces),
            HandScore {
                rank: HandRank::ThreeOfAKind,
                value: 33
            }
        );
        assert!(score(&aces) > score(&kings));
    }

    #[test]
    fn test_joker_completes_three_aces() {
        let cards = hand([
            (Rank::Seven, Suit::Club),
            (Rank::Ace, Suit::Heart),
            (Rank::Ace, Suit::Spade),
        ]);
        assert_eq!(
            score(&cards),
            HandScore {
                rank: HandRank::ThreeOfAKind,
                value: 33
            }
        );
    }

    #[test]
    fn test_three_suited_sums_values() {
        let cards = hand([
            (Rank::Ace, Suit::Heart),
            (Rank::King, Suit::Heart),
            (Rank::Eight, Suit::Heart),
        ]);
        assert_eq!(
            score(&cards),
            HandScore {
                rank: HandRank::ThreeSuited,
                value: 29
            }
        );
    }

    #[test]
    fn test_joker_extends_suit() {
        let cards = hand([
            (Rank::Seven, Suit::Club),
            (Rank::King, Suit::Heart),
            (Rank::Queen, Suit::Heart),
        ]);
        assert_eq!(
            score(&cards),
            HandScore {
                rank: HandRank::ThreeSuited,
                value: 31
            }
        );
    }

    #[test]
    fn test_two_suited_sums_the_pair() {
        let cards = hand([
            (Rank::Ace, Suit::Spade),
            (Rank::Nine, Suit::Spade),
            (Rank::King, Suit::Heart),
        ]);
        assert_eq!(
            score(&cards),
            HandScore {
                rank: HandRank::TwoSuited,
                value: 20
            }
        );
    }

    #[test]
    fn test_pair_doubles_rank_value() {
        let cards = hand([
            (Rank::King, Suit::Spade),
            (Rank::King, Suit::Heart),
            (Rank::Eight, Suit::Diamond),
        ]);
        assert_eq!(
            score(&cards),
            HandScore {
                rank: HandRank::Pair,
                value: 20
            }
        );
    }

    #[test]
    fn test_high_card() {
        let cards = hand([
            (Rank::Ace, Suit::Spade),
            (Rank::Nine, Suit::Heart),
            (Rank::Eight, Suit::Diamond),
        ]);
        assert_eq!(
            score(&cards),
            HandScore {
                rank: HandRank::HighCard,
                value: 11
            }
        );
    }

    #[test]
    fn test_two_suited_beats_pair() {
        let suited = hand([
            (Rank::Eight, Suit::Spade),
            (Rank::Seven, Suit::Spade),
            (Rank::Nine, Suit::Heart),
        ]);
        let pair = hand([
            (Rank::Ace, Suit::Spade),
            (Rank::Ace, Suit::Heart),
            (Rank::Nine, Suit::Diamond),
        ]);
        assert!(score(&suited) > score(&pair));
    }

    #[test]
    fn test_score_slice_requires_three_cards() {
        let cards = [Card(Rank::Ace, Suit::Spade), Card(Rank::Nine, Suit::Heart)];
        assert!(score_slice(&cards).is_none());
        assert!(score_slice(&[]).is_none());
    }

    #[test]
    fn test_argmax_returns_all_ties() {
        let pair = HandScore {
            rank: HandRank::Pair,
            value: 20,
        };
        let high = HandScore {
            rank: HandRank::HighCard,
            value: 11,
        };
        assert_eq!(argmax(&[pair, high, pair]), vec![0, 2]);
        assert!(argmax(&[]).is_empty());
    }
}
