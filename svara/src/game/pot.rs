//! Side pots, refunds, rake and payouts.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::{
    constants::{cent, rake_rate},
    entities::{HandScore, Payout, PlayerId, Usd, round_money, truncate_money},
};

/// One player's money in the hand being settled.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Contribution {
    pub player_id: PlayerId,
    pub total_bet: Usd,
    pub folded: bool,
}

/// A bet-level tier and the players who can win it.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct SidePot {
    pub level: Usd,
    pub amount: Usd,
    pub eligible: Vec<PlayerId>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct PotBreakdown {
    /// Ascending by level; the first is the main pot.
    pub pots: Vec<SidePot>,
    /// Uncalled excess handed back to the only player at a level.
    pub refunds: Vec<Payout>,
    /// Money committed by folded players.
    pub dead_money: Usd,
}

/// Split final bets into tiers over the non-folded players.
#[must_use]
pub fn compute_pots(contributions: &[Contribution]) -> PotBreakdown {
    let mut levels: Vec<Usd> = contributions
        .iter()
        .filter(|c| !c.folded && c.total_bet > Decimal::ZERO)
        .map(|c| c.total_bet)
        .collect();
    levels.sort();
    levels.dedup();

    let mut breakdown = PotBreakdown {
        dead_money: contributions
            .iter()
            .filter(|c| c.folded)
            .map(|c| c.total_bet)
            .sum(),
        ..PotBreakdown::default()
    };

    let mut previous = Decimal::ZERO;
    for level in levels {
        let eligible: Vec<PlayerId> = contributions
            .iter()
            .filter(|c| !c.folded && c.total_bet >= level)
            .map(|c| c.player_id)
            .collect();
        let amount = (level - previous) * Decimal::from(eligible.len());
        match eligible.as_slice() {
            [only] => breakdown.refunds.push(Payout {
                player_id: *only,
                amount,
            }),
            _ => breakdown.pots.push(SidePot {
                level,
                amount,
                eligible,
            }),
        }
        previous = level;
    }
    breakdown
}

#[must_use]
pub fn rake_for(amount: Usd) -> Usd {
    round_money(amount * rake_rate())
}

/// Divide `amount` evenly. Shares are truncated to cents and the leftover
/// cents go one each to the earliest winners.
#[must_use]
pub fn split_evenly(amount: Usd, winners: &[PlayerId]) -> Vec<Payout> {
    if winners.is_empty() {
        return Vec::new();
    }
    let share = truncate_money(amount / Decimal::from(winners.len()));
    let mut leftover = amount - share * Decimal::from(winners.len());
    winners
        .iter()
        .map(|&player_id| {
            let mut amount = share;
            if leftover >= cent() {
                amount += cent();
                leftover -= cent();
            }
            Payout { player_id, amount }
        })
        .collect()
}

/// A tied main pot waiting on the svara.
#[derive(Clone, Debug, PartialEq)]
pub struct SvaraCarry {
    pub amount: Usd,
    /// Tied players in seat order.
    pub tied: Vec<PlayerId>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Settlement {
    pub payouts: Vec<Payout>,
    pub refunds: Vec<Payout>,
    pub rake: Usd,
    pub svara: Option<SvaraCarry>,
}

impl Settlement {
    /// Everything the settlement hands out, including the house take and
    /// any pot carried into a svara.
    #[must_use]
    pub fn total(&self) -> Usd {
        let paid: Usd = self.payouts.iter().map(|p| p.amount).sum();
        let refunded: Usd = self.refunds.iter().map(|p| p.amount).sum();
        paid + refunded + self.rake + self.svara.as_ref().map_or(Decimal::ZERO, |s| s.amount)
    }

    fn credit(&mut self, payout: Payout) {
        match self
            .payouts
            .iter_mut()
            .find(|p| p.player_id == payout.player_id)
        {
            Some(existing) => existing.amount += payout.amount,
            None => self.payouts.push(payout),
        }
    }
}

fn seat_rank(seat_order: &[PlayerId], player_id: PlayerId) -> usize {
    seat_order
        .iter()
        .position(|&id| id == player_id)
        .unwrap_or(usize::MAX)
}

/// Best-scoring eligible players in seat order. Eligible players without a
/// score only win when nobody has one.
fn pot_winners(
    eligible: &[PlayerId],
    scores: &HashMap<PlayerId, HandScore>,
    seat_order: &[PlayerId],
) -> Vec<PlayerId> {
    let best = eligible.iter().filter_map(|id| scores.get(id)).max();
    let mut winners: Vec<PlayerId> = eligible
        .iter()
        .copied()
        .filter(|id| best.is_none() || scores.get(id) == best)
        .collect();
    winners.sort_by_key(|&id| seat_rank(seat_order, id));
    winners
}

/// Settle a hand.
///
/// Dead money and `carried` join the main pot. Every pot is raked before it
/// is split, except a tied main pot, which is carried to the svara whole.
#[must_use]
pub fn settle(
    contributions: &[Contribution],
    carried: Usd,
    scores: &HashMap<PlayerId, HandScore>,
    seat_order: &[PlayerId],
) -> Settlement {
    let breakdown = compute_pots(contributions);
    let extra = breakdown.dead_money + carried;
    let mut pots = breakdown.pots;
    let mut settlement = Settlement {
        refunds: breakdown.refunds,
        ..Settlement::default()
    };

    match pots.first_mut() {
        Some(main) => main.amount += extra,
        None if extra > Decimal::ZERO => {
            let eligible: Vec<PlayerId> = contributions
                .iter()
                .filter(|c| !c.folded)
                .map(|c| c.player_id)
                .collect();
            if eligible.is_empty() {
                settlement.rake += extra;
            } else {
                pots.push(SidePot {
                    level: Decimal::ZERO,
                    amount: extra,
                    eligible,
                });
            }
        }
        None => {}
    }

    for (idx, pot) in pots.into_iter().enumerate() {
        let winners = pot_winners(&pot.eligible, scores, seat_order);
        if idx == 0 && winners.len() >= 2 {
            settlement.svara = Some(SvaraCarry {
                amount: pot.amount,
                tied: winners,
            });
            continue;
        }
        let rake = rake_for(pot.amount);
        settlement.rake += rake;
        for payout in split_evenly(pot.amount - rake, &winners) {
            settlement.credit(payout);
        }
    }
    settlement
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::entities::HandRank;

    fn usd(dollars: i64) -> Usd {
        Decimal::from(dollars)
    }

    fn bet(player_id: PlayerId, dollars: i64, folded: bool) -> Contribution {
        Contribution {
            player_id,
            total_bet: usd(dollars),
            folded,
        }
    }

    fn pair(value: u8) -> HandScore {
        HandScore {
            rank: HandRank::Pair,
            value,
        }
    }

    #[test]
    fn test_equal_bets_form_one_pot() {
        let breakdown = compute_pots(&[bet(1, 30, false), bet(2, 30, false)]);
        assert_eq!(breakdown.pots.len(), 1);
        assert_eq!(breakdown.pots[0].amount, usd(60));
        assert!(breakdown.refunds.is_empty());
    }

    #[test]
    fn test_all_in_creates_side_pot() {
        let breakdown = compute_pots(&[bet(1, 20, false), bet(2, 50, false), bet(3, 50, false)]);
        assert_eq!(breakdown.pots.len(), 2);
        assert_eq!(breakdown.pots[0].amount, usd(60));
        assert_eq!(breakdown.pots[0].eligible, vec![1, 2, 3]);
        assert_eq!(breakdown.pots[1].amount, usd(60));
        assert_eq!(breakdown.pots[1].eligible, vec![2, 3]);
    }

    #[test]
    fn test_uncalled_excess_is_refunded() {
        let breakdown = compute_pots(&[bet(1, 20, false), bet(2, 50, false)]);
        assert_eq!(breakdown.pots.len(), 1);
        assert_eq!(breakdown.pots[0].amount, usd(40));
        assert_eq!(
            breakdown.refunds,
            vec![Payout {
                player_id: 2,
                amount: usd(30)
            }]
        );
    }

    #[test]
    fn test_folded_money_is_dead() {
        let breakdown = compute_pots(&[bet(1, 30, false), bet(2, 30, false), bet(3, 15, true)]);
        assert_eq!(breakdown.dead_money, usd(15));
        assert_eq!(breakdown.pots[0].eligible, vec![1, 2]);
    }

    #[test]
    fn test_split_evenly_hands_out_leftover_cents() {
        let payouts = split_evenly(usd(10), &[4, 5, 6]);
        let amounts: Vec<Usd> = payouts.iter().map(|p| p.amount).collect();
        assert_eq!(
            amounts,
            vec![Decimal::new(334, 2), Decimal::new(333, 2), Decimal::new(333, 2)]
        );
    }

    #[test]
    fn test_settle_rakes_and_pays_winner() {
        let scores = HashMap::from([(1, pair(22)), (2, pair(20))]);
        let settlement = settle(&[bet(1, 30, false), bet(2, 30, false)], usd(0), &scores, &[1, 2]);
        assert_eq!(
            settlement.payouts,
            vec![Payout {
                player_id: 1,
                amount: usd(57)
            }]
        );
        assert_eq!(settlement.rake, usd(3));
        assert_eq!(settlement.total(), usd(60));
    }

    #[test]
    fn test_tied_main_pot_goes_to_svara() {
        let scores = HashMap::from([(1, pair(20)), (2, pair(20)), (3, pair(22))]);
        let settlement = settle(
            &[bet(1, 20, false), bet(2, 20, false), bet(3, 10, true)],
            usd(0),
            &scores,
            &[2, 3, 1],
        );
        let svara = settlement.svara.expect("tie carries to svara");
        assert_eq!(svara.amount, usd(50));
        assert_eq!(svara.tied, vec![2, 1]);
        assert!(settlement.payouts.is_empty());
        assert!(settlement.rake.is_zero());
    }

    #[test]
    fn test_tied_side_pot_splits_immediately() {
        let scores = HashMap::from([(1, pair(22)), (2, pair(20)), (3, pair(20))]);
        let settlement = settle(
            &[bet(1, 10, false), bet(2, 30, false), bet(3, 30, false)],
            usd(0),
            &scores,
            &[1, 2, 3],
        );
        assert!(settlement.svara.is_none());
        // Main pot $30 to player 1, side pot $40 split between 2 and 3.
        assert_eq!(settlement.rake, Decimal::new(350, 2));
        assert_eq!(
            settlement.payouts,
            vec![
                Payout {
                    player_id: 1,
                    amount: Decimal::new(2850, 2)
                },
                Payout {
                    player_id: 2,
                    amount: usd(19)
                },
                Payout {
                    player_id: 3,
                    amount: usd(19)
                },
            ]
        );
        assert_eq!(settlement.total(), usd(70));
    }

    #[test]
    fn test_fold_win_refunds_own_bet_and_rakes_dead_money() {
        let settlement = settle(
            &[bet(1, 30, false), bet(2, 10, true)],
            usd(0),
            &HashMap::new(),
            &[1, 2],
        );
        assert_eq!(
            settlement.refunds,
            vec![Payout {
                player_id: 1,
                amount: usd(30)
            }]
        );
        assert_eq!(settlement.payouts[0].amount, Decimal::new(950, 2));
        assert_eq!(settlement.total(), usd(40));
    }

    #[test]
    fn test_carried_pot_joins_main_pot() {
        let scores = HashMap::from([(1, pair(22)), (2, pair(20))]);
        let settlement = settle(
            &[bet(1, 10, false), bet(2, 10, false)],
            usd(60),
            &scores,
            &[1, 2],
        );
        assert_eq!(settlement.payouts[0].amount, usd(76));
        assert_eq!(settlement.rake, usd(4));
    }
}
