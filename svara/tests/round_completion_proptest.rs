//! Betting rounds close exactly when every live player has answered the
//! last raise with a level bet.
//!
//! Random legal play is driven through the state machine while an outside
//! record of who has acted since `current_bet` last rose is kept from the
//! observed transitions alone.

use chrono::Utc;
use proptest::prelude::*;
use rand::{SeedableRng, rngs::StdRng};
use rust_decimal::Decimal;
use std::collections::BTreeSet;
use svara::{
    Command, GameSettings, GameState, GameStatus, PlayerAction, apply,
    entities::{Player, PlayerId},
    game::{
        ActionChoice,
        betting::{is_round_complete, legal_actions},
    },
};

fn deal(balances: &[i64], rng: &mut StdRng) -> GameState {
    let mut state = GameState::new(1, Decimal::from(10), GameSettings::default());
    for (i, &balance) in balances.iter().enumerate() {
        let id = i as PlayerId + 1;
        state
            .players
            .push(Player::new(id, format!("player{id}"), Decimal::from(balance), i));
    }
    state.status = GameStatus::Finished;
    apply(&state, Command::Restart, rng, Utc::now())
        .expect("deal")
        .state
}

fn pick(choice: &ActionChoice, fraction: u8) -> PlayerAction {
    match *choice {
        ActionChoice::Blind { .. } => PlayerAction::Blind,
        ActionChoice::Look => PlayerAction::Look,
        ActionChoice::Call { .. } => PlayerAction::Call,
        ActionChoice::Raise { min, max } => {
            let extra = (max - min) * Decimal::from(fraction) / Decimal::from(u8::MAX);
            PlayerAction::Raise {
                amount: min + extra.round_dp(2),
            }
        }
        ActionChoice::Fold => PlayerAction::Fold,
        ActionChoice::AllIn { .. } => PlayerAction::AllIn,
    }
}

/// Everyone who can still act has acted since the last raise and matched it.
fn everyone_answered(state: &GameState, acted: &BTreeSet<PlayerId>) -> bool {
    let live: Vec<&Player> = state.players.iter().filter(|p| p.is_live()).collect();
    match live.as_slice() {
        [] => true,
        [only] => only.total_bet >= state.current_bet,
        _ => live
            .iter()
            .all(|p| acted.contains(&p.id) && p.total_bet == state.current_bet),
    }
}

fn balances_strategy() -> impl Strategy<Value = Vec<i64>> {
    prop::collection::vec(20i64..=200, 2..=5)
}

fn moves_strategy() -> impl Strategy<Value = Vec<(u8, u8)>> {
    prop::collection::vec((any::<u8>(), any::<u8>()), 1..60)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn test_round_closes_only_when_everyone_answered(
        balances in balances_strategy(),
        moves in moves_strategy(),
        seed in any::<u64>(),
    ) {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut state = deal(&balances, &mut rng);
        let mut acted = BTreeSet::new();

        for (choice, fraction) in moves {
            if state.status != GameStatus::BlindBetting && state.status != GameStatus::Betting {
                break;
            }
            let actor = state.current_player().expect("someone to act").id;
            let choices = legal_actions(&state, actor);
            prop_assert!(!choices.is_empty(), "player {} has no legal action", actor);
            let action = pick(&choices.0[choice as usize % choices.0.len()], fraction);

            let next = apply(&state, Command::Act { player_id: actor, action }, &mut rng, Utc::now())
                .unwrap_or_else(|e| panic!("player {actor} {action}: {e}"))
                .state;

            match next.status {
                GameStatus::BlindBetting | GameStatus::Betting | GameStatus::Showdown => {
                    if next.current_bet > state.current_bet {
                        acted.clear();
                    }
                    if action != PlayerAction::Look {
                        acted.insert(actor);
                    }
                }
                _ => {
                    prop_assert!(next.in_hand_count() <= 1, "hand settled with a contest left");
                    break;
                }
            }

            match next.status {
                GameStatus::Showdown => {
                    prop_assert!(everyone_answered(&next, &acted), "round closed early");
                }
                _ => {
                    prop_assert!(!everyone_answered(&next, &acted), "round left open");
                    prop_assert!(!is_round_complete(&next));
                    let current = next.current_player();
                    prop_assert!(current.is_some_and(Player::is_live));
                    if action == PlayerAction::Look {
                        prop_assert_eq!(current.map(|p| p.id), Some(actor));
                    }
                }
            }
            state = next;
        }
    }
}

#[test]
fn test_first_actor_folding_leaves_the_rest_to_act() {
    let mut rng = StdRng::seed_from_u64(7);
    let state = deal(&[100, 100, 100, 100], &mut rng);
    assert_eq!(state.current_player().map(|p| p.id), Some(2));

    let state = apply(
        &state,
        Command::Act {
            player_id: 2,
            action: PlayerAction::Fold,
        },
        &mut rng,
        Utc::now(),
    )
    .expect("fold")
    .state;
    assert_eq!(state.status, GameStatus::BlindBetting);
    assert_eq!(state.current_player().map(|p| p.id), Some(3));
    assert!(!is_round_complete(&state));
}
