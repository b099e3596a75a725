//! The tie-break sub-flow: confirm/decline, buy-ins and the decision on
//! what happens to a tied pot.

use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

use super::{
    entities::{ActionKind, GameAction, GameState, GameStatus, PlayerId, Usd},
    pot::SvaraCarry,
    state_machine::GameError,
};

/// What to do with the pot once every svara decision is in.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SvaraResolution {
    /// Nobody confirmed. The pot goes to the house.
    Void,
    /// A single participant takes the pot.
    Outright(PlayerId),
    /// Participants can't all fund another ante, so they share the pot.
    Split(Vec<PlayerId>),
    /// Deal a new hand among the participants.
    Replay(Vec<PlayerId>),
}

/// Open the decision window for a tied main pot. Bets must already be
/// settled.
pub fn enter(state: &mut GameState, carry: SvaraCarry, now: DateTime<Utc>) -> Vec<GameAction> {
    state.status = GameStatus::SvaraPending;
    state.current_player_index = None;
    state.turn_start_time = Some(now);
    state.pot = carry.amount;
    state.carried = carry.amount;
    state.svara_participants = carry.tied.iter().copied().collect();
    state.svara_confirmed = state.svara_participants.clone();
    state.svara_declined = state
        .players
        .iter()
        .filter(|p| !state.svara_participants.contains(&p.id))
        .filter(|p| p.leaving || p.balance < carry.amount)
        .map(|p| p.id)
        .collect();

    let names = state
        .players
        .iter()
        .filter(|p| state.svara_participants.contains(&p.id))
        .map(|p| p.username.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    vec![GameAction::new(
        ActionKind::Svara,
        None,
        Some(carry.amount),
        now,
        format!("svara between {names} for ${}", carry.amount),
    )]
}

/// Seated players who still owe a confirm/decline.
#[must_use]
pub fn pending_deciders(state: &GameState) -> Vec<PlayerId> {
    if state.status != GameStatus::SvaraPending {
        return Vec::new();
    }
    state
        .players
        .iter()
        .map(|p| p.id)
        .filter(|id| !state.svara_confirmed.contains(id) && !state.svara_declined.contains(id))
        .collect()
}

#[must_use]
pub fn is_decided(state: &GameState) -> bool {
    pending_deciders(state).is_empty()
}

/// Record a decision. Joining costs the full current pot.
pub fn decide(
    state: &mut GameState,
    player_id: PlayerId,
    join: bool,
    now: DateTime<Utc>,
) -> Result<Vec<GameAction>, GameError> {
    if state.status != GameStatus::SvaraPending {
        return Err(GameError::NoSvaraDecisionPending);
    }
    if !pending_deciders(state).contains(&player_id) {
        return match state.player(player_id) {
            Some(_) => Err(GameError::AlreadyDecided),
            None => Err(GameError::PlayerNotSeated(player_id)),
        };
    }

    let price = state.pot;
    let player = state
        .player_mut(player_id)
        .ok_or(GameError::PlayerNotSeated(player_id))?;

    if !join {
        let message = format!("{} sits out the svara", player.username);
        state.svara_declined.insert(player_id);
        return Ok(vec![GameAction::new(
            ActionKind::Svara,
            Some(player_id),
            None,
            now,
            message,
        )]);
    }

    if player.balance < price {
        return Err(GameError::InsufficientBalance {
            required: price,
            available: player.balance,
        });
    }
    player.balance -= price;
    let message = format!("{} buys into the svara for ${price}", player.username);
    state.pot += price;
    state.carried += price;
    state.svara_participants.insert(player_id);
    state.svara_confirmed.insert(player_id);
    Ok(vec![GameAction::new(
        ActionKind::Svara,
        Some(player_id),
        Some(price),
        now,
        message,
    )])
}

/// The decision window closed. Undecided players are treated as declined.
pub fn expire(state: &mut GameState) -> BTreeSet<PlayerId> {
    let undecided: BTreeSet<PlayerId> = pending_deciders(state).into_iter().collect();
    state.svara_declined.extend(undecided.iter().copied());
    undecided
}

#[must_use]
pub fn resolve(state: &GameState) -> SvaraResolution {
    let ante: Usd = state.min_bet;
    let confirmed: Vec<PlayerId> = state
        .seat_order_after_dealer()
        .into_iter()
        .filter(|id| state.svara_confirmed.contains(id))
        .filter(|&id| state.player(id).is_some_and(|p| !p.leaving))
        .collect();

    match confirmed.as_slice() {
        [] => SvaraResolution::Void,
        [only] => SvaraResolution::Outright(*only),
        _ => {
            let funded = confirmed
                .iter()
                .all(|&id| state.player(id).is_some_and(|p| p.balance >= ante));
            if funded {
                SvaraResolution::Replay(confirmed)
            } else {
                SvaraResolution::Split(confirmed)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::entities::{GameSettings, Player};
    use rust_decimal::Decimal;

    fn usd(dollars: i64) -> Usd {
        Decimal::from(dollars)
    }

    fn tied_state(balances: &[i64]) -> GameState {
        let mut state = GameState::new(1, usd(10), GameSettings::default());
        for (i, &balance) in balances.iter().enumerate() {
            let mut player = Player::new(i as PlayerId + 1, format!("p{i}"), usd(balance), i);
            player.is_active = true;
            state.players.push(player);
        }
        let carry = SvaraCarry {
            amount: usd(60),
            tied: vec![1, 2],
        };
        enter(&mut state, carry, Utc::now());
        state
    }

    #[test]
    fn test_enter_confirms_tied_players() {
        let state = tied_state(&[100, 100, 100]);
        assert_eq!(state.status, GameStatus::SvaraPending);
        assert_eq!(state.pot, usd(60));
        assert_eq!(state.carried, usd(60));
        assert_eq!(state.svara_confirmed, BTreeSet::from([1, 2]));
        assert_eq!(pending_deciders(&state), vec![3]);
    }

    #[test]
    fn test_players_who_cannot_afford_are_declined() {
        let state = tied_state(&[100, 100, 40]);
        assert!(state.svara_declined.contains(&3));
        assert!(is_decided(&state));
    }

    #[test]
    fn test_buy_in_costs_the_pot() {
        let mut state = tied_state(&[100, 100, 100]);
        decide(&mut state, 3, true, Utc::now()).expect("buy in");
        assert_eq!(state.player(3).map(|p| p.balance), Some(usd(40)));
        assert_eq!(state.pot, usd(120));
        assert_eq!(state.carried, usd(120));
        assert!(is_decided(&state));
        assert_eq!(resolve(&state), SvaraResolution::Replay(vec![2, 3, 1]));
    }

    #[test]
    fn test_tied_player_cannot_decline() {
        let mut state = tied_state(&[100, 100, 100]);
        let err = decide(&mut state, 1, false, Utc::now()).unwrap_err();
        assert_eq!(err, GameError::AlreadyDecided);
    }

    #[test]
    fn test_expire_declines_undecided() {
        let mut state = tied_state(&[100, 100, 100]);
        let expired = expire(&mut state);
        assert_eq!(expired, BTreeSet::from([3]));
        assert!(is_decided(&state));
    }

    #[test]
    fn test_short_participants_split() {
        let state = tied_state(&[100, 5, 100]);
        assert!(matches!(resolve(&state), SvaraResolution::Split(_)));
    }

    #[test]
    fn test_single_participant_wins_outright() {
        let mut state = tied_state(&[100, 100]);
        state.svara_confirmed.remove(&2);
        assert_eq!(resolve(&state), SvaraResolution::Outright(1));
    }

    #[test]
    fn test_nobody_confirmed_is_void() {
        let mut state = tied_state(&[100, 100]);
        state.svara_confirmed.clear();
        assert_eq!(resolve(&state), SvaraResolution::Void);
    }
}
