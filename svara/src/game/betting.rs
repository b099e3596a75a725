//! Action validation, legal action sets, raise bounds and round
//! completion.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::{fmt, mem::discriminant};

use super::{
    entities::{ActionKind, GameAction, GameState, GameStatus, Player, PlayerId, Usd, round_money},
    state_machine::GameError,
};

/// An action a player asks to take on their turn.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlayerAction {
    /// Raise the blind stake without looking.
    Blind,
    Look,
    Call,
    /// Call, then put `amount` on top.
    Raise {
        amount: Usd,
    },
    Fold,
    AllIn,
}

impl fmt::Display for PlayerAction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let repr = match self {
            Self::Blind => "blind".to_string(),
            Self::Look => "look".to_string(),
            Self::Call => "call".to_string(),
            Self::Raise { amount } => format!("raise ${amount}"),
            Self::Fold => "fold".to_string(),
            Self::AllIn => "all-in".to_string(),
        };
        write!(f, "{repr}")
    }
}

/// A legal action along with the amounts it involves.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionChoice {
    Blind { amount: Usd },
    Look,
    Call { amount: Usd },
    Raise { min: Usd, max: Usd },
    Fold,
    AllIn { amount: Usd },
}

impl ActionChoice {
    fn matches(&self, action: &PlayerAction) -> bool {
        let as_choice = match action {
            PlayerAction::Blind => ActionChoice::Blind {
                amount: Decimal::ZERO,
            },
            PlayerAction::Look => ActionChoice::Look,
            PlayerAction::Call => ActionChoice::Call {
                amount: Decimal::ZERO,
            },
            PlayerAction::Raise { .. } => ActionChoice::Raise {
                min: Decimal::ZERO,
                max: Decimal::ZERO,
            },
            PlayerAction::Fold => ActionChoice::Fold,
            PlayerAction::AllIn => ActionChoice::AllIn {
                amount: Decimal::ZERO,
            },
        };
        discriminant(self) == discriminant(&as_choice)
    }
}

impl fmt::Display for ActionChoice {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let repr = match self {
            Self::Blind { amount } => format!("blind (== ${amount})"),
            Self::Look => "look".to_string(),
            Self::Call { amount } => format!("call (== ${amount})"),
            Self::Raise { min, max } => format!("raise (${min}..=${max})"),
            Self::Fold => "fold".to_string(),
            Self::AllIn { amount } => format!("all-in (== ${amount})"),
        };
        write!(f, "{repr}")
    }
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct ActionChoices(pub Vec<ActionChoice>);

impl ActionChoices {
    #[must_use]
    pub fn contains(&self, action: &PlayerAction) -> bool {
        self.0.iter().any(|choice| choice.matches(action))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ActionChoices {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = self
            .0
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        write!(f, "{repr}")
    }
}

impl<I> From<I> for ActionChoices
where
    I: IntoIterator<Item = ActionChoice>,
{
    fn from(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[must_use]
pub fn amount_to_call(state: &GameState, player_id: PlayerId) -> Usd {
    state
        .player(player_id)
        .map_or(Decimal::ZERO, |player| {
            (state.current_bet - player.total_bet).max(Decimal::ZERO)
        })
}

/// The stake an unlooked player pays to raise the blind.
#[must_use]
pub fn next_blind(state: &GameState) -> Usd {
    if state.last_blind.is_zero() {
        state.min_bet
    } else {
        round_money(state.last_blind * Decimal::TWO)
    }
}

#[must_use]
pub fn min_raise(state: &GameState) -> Usd {
    if state.status == GameStatus::BlindBetting {
        next_blind(state)
    } else {
        state.min_bet
    }
}

#[must_use]
pub fn max_raise(state: &GameState, player_id: PlayerId) -> Usd {
    state.player(player_id).map_or(Decimal::ZERO, |player| {
        (player.balance - amount_to_call(state, player_id)).max(Decimal::ZERO)
    })
}

/// Everything `player_id` may do right now. Empty when it isn't their turn.
#[must_use]
pub fn legal_actions(state: &GameState, player_id: PlayerId) -> ActionChoices {
    let Some(idx) = state.player_index(player_id) else {
        return ActionChoices::default();
    };
    let player = &state.players[idx];
    if !state.status.is_betting() || state.current_player_index != Some(idx) || !player.is_live()
    {
        return ActionChoices::default();
    }

    let mut choices = Vec::with_capacity(4);
    if state.status == GameStatus::BlindBetting && !player.has_looked {
        let blind = next_blind(state);
        if player.balance >= blind {
            choices.push(ActionChoice::Blind { amount: blind });
        }
        choices.push(ActionChoice::Look);
        choices.push(ActionChoice::Fold);
        return choices.into();
    }

    let to_call = amount_to_call(state, player_id);
    if player.balance >= to_call {
        choices.push(ActionChoice::Call { amount: to_call });
        let (min, max) = (min_raise(state), max_raise(state, player_id));
        if max >= min {
            choices.push(ActionChoice::Raise { min, max });
        }
    }
    choices.push(ActionChoice::Fold);
    choices.push(ActionChoice::AllIn {
        amount: player.balance,
    });
    choices.into()
}

/// The player who owns the round: last raiser, else last blind bettor,
/// else the dealer.
#[must_use]
pub fn anchor_index(state: &GameState) -> usize {
    state
        .last_raise_index
        .or(state.last_blind_bettor_index)
        .unwrap_or(state.dealer_index)
}

#[must_use]
pub fn next_live_after(state: &GameState, idx: usize) -> Option<usize> {
    state.next_index_after(idx, Player::is_live)
}

/// Whether the betting round is over.
///
/// Every live player must have acted since the anchor last lifted
/// `current_bet` and hold a level bet. Raising clears everyone else's
/// `has_acted`, so this holds exactly when the turn would come back round to
/// the anchor, even after the anchor or the seats next to it have folded.
#[must_use]
pub fn is_round_complete(state: &GameState) -> bool {
    let live: Vec<&Player> = state.players.iter().filter(|p| p.is_live()).collect();
    match live.as_slice() {
        [] => true,
        [only] => only.total_bet >= state.current_bet,
        _ => live
            .iter()
            .all(|p| p.has_acted && p.total_bet == state.current_bet),
    }
}

fn check_amounts(
    state: &GameState,
    player: &Player,
    action: &PlayerAction,
) -> Result<(), GameError> {
    let open = state.status == GameStatus::Betting || player.has_looked;
    let to_call = amount_to_call(state, player.id);
    match action {
        PlayerAction::Raise { amount } if open => {
            let amount = round_money(*amount);
            let min = min_raise(state);
            if amount < min {
                return Err(GameError::RaiseBelowMinimum { min });
            }
            if to_call + amount > player.balance {
                return Err(GameError::InsufficientBalance {
                    required: to_call + amount,
                    available: player.balance,
                });
            }
        }
        PlayerAction::Call if open && to_call > player.balance => {
            return Err(GameError::InsufficientBalance {
                required: to_call,
                available: player.balance,
            });
        }
        PlayerAction::Blind if !open && next_blind(state) > player.balance => {
            return Err(GameError::InsufficientBalance {
                required: next_blind(state),
                available: player.balance,
            });
        }
        _ => {}
    }
    Ok(())
}

/// Flip every hand still in play and move to open betting.
fn open_betting(state: &mut GameState) {
    state.status = GameStatus::Betting;
    for player in state.players.iter_mut().filter(|p| p.in_hand()) {
        player.has_looked = true;
        player.has_looked_and_must_act = false;
    }
}

/// Validate and apply `action` for `player_id`.
///
/// Nothing is touched unless validation passes. Returns the log entries the
/// action produced; turn advancement is left to the caller.
pub fn apply_action(
    state: &mut GameState,
    player_id: PlayerId,
    action: PlayerAction,
    now: DateTime<Utc>,
) -> Result<Vec<GameAction>, GameError> {
    if !state.status.is_betting() {
        return Err(GameError::WrongPhase {
            status: state.status,
        });
    }
    let idx = state
        .player_index(player_id)
        .ok_or(GameError::PlayerNotSeated(player_id))?;
    if state.current_player_index != Some(idx) {
        return Err(GameError::OutOfTurn);
    }
    check_amounts(state, &state.players[idx], &action)?;
    if !legal_actions(state, player_id).contains(&action) {
        return Err(GameError::IllegalAction {
            action: action.to_string(),
            status: state.status,
        });
    }

    let to_call = amount_to_call(state, player_id);
    let was_must_act = state.players[idx].has_looked_and_must_act;
    let username = state.players[idx].username.clone();

    let (kind, amount, message) = match action {
        PlayerAction::Blind => {
            let stake = next_blind(state);
            let paid = state.players[idx].commit(stake);
            state.pot += paid;
            state.last_blind = paid;
            state.last_action_amount = paid;
            state.last_blind_bettor_index = Some(idx);
            (ActionKind::Blind, Some(paid), format!("{username} blinds ${paid}"))
        }
        PlayerAction::Look => {
            let player = &mut state.players[idx];
            player.has_looked = true;
            player.has_looked_and_must_act = true;
            (ActionKind::Look, None, format!("{username} looks at their cards"))
        }
        PlayerAction::Call => {
            let paid = state.players[idx].commit(to_call);
            state.pot += paid;
            (ActionKind::Call, Some(paid), format!("{username} calls ${paid}"))
        }
        PlayerAction::Raise { amount } => {
            let amount = round_money(amount);
            let paid = state.players[idx].commit(to_call + amount);
            state.pot += paid;
            state.last_raise_index = Some(idx);
            state.last_action_amount = amount;
            (
                ActionKind::Raise,
                Some(paid),
                format!("{username} raises ${amount}"),
            )
        }
        PlayerAction::Fold => {
            state.players[idx].has_folded = true;
            (ActionKind::Fold, None, format!("{username} folds"))
        }
        PlayerAction::AllIn => {
            let stake = state.players[idx].balance;
            let paid = state.players[idx].commit(stake);
            state.pot += paid;
            let total = state.players[idx].total_bet;
            if total > state.current_bet {
                state.last_action_amount = total - state.current_bet;
                state.last_raise_index = Some(idx);
            }
            (
                ActionKind::AllIn,
                Some(paid),
                format!("{username} goes all-in for ${paid}"),
            )
        }
    };

    if state.players[idx].total_bet > state.current_bet {
        state.current_bet = state.players[idx].total_bet;
        for (other, player) in state.players.iter_mut().enumerate() {
            if other != idx {
                player.has_acted = false;
            }
        }
    }
    let player = &mut state.players[idx];
    player.last_action = Some(kind);
    if kind != ActionKind::Look {
        player.has_looked_and_must_act = false;
        player.has_acted = true;
    }

    let opens = state.status == GameStatus::BlindBetting
        && was_must_act
        && matches!(kind, ActionKind::Call | ActionKind::Raise | ActionKind::AllIn);
    let message = if opens {
        open_betting(state);
        format!("{message}, cards are open")
    } else {
        message
    };

    Ok(vec![GameAction::new(
        kind,
        Some(player_id),
        amount,
        now,
        message,
    )])
}
