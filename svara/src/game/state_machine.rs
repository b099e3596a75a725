//! Game state machine.
//!
//! Every change to a [`GameState`] goes through [`apply`], which takes the
//! current state and a [`Command`] and returns a [`Transition`]: the next
//! state, the log entries the command produced and the balances that must
//! be written back to the ledger. The input state is never touched, so a
//! rejected command leaves the room exactly as it was.
//!
//! ```text
//! waiting -> ante -> blind_betting -> betting -> showdown -> finished
//!                                                   |          ^
//!                                                   v          |
//!                                            svara_pending ----+
//!                                                   |
//!                                                   +--> ante (svara hand)
//! ```

use chrono::{DateTime, Utc};
use log::{debug, info};
use rand::Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fmt, mem};
use thiserror::Error;
use uuid::{Builder, Uuid};

use super::{
    betting::{self, PlayerAction},
    entities::{
        ActionKind, Deck, GameAction, GameState, GameStatus, Payout, Player, PlayerId, Usd,
        round_money,
    },
    functional,
    pot::{self, Contribution},
    svara::{self, SvaraResolution},
};

/// Errors that can occur while applying a command.
#[derive(Clone, Debug, Deserialize, Eq, Error, PartialEq, Serialize)]
pub enum GameError {
    #[error("not your turn")]
    OutOfTurn,
    #[error("can't {action} during {status}")]
    IllegalAction { action: String, status: GameStatus },
    #[error("raise must be at least ${min}")]
    RaiseBelowMinimum { min: Usd },
    #[error("need ${required}, have ${available}")]
    InsufficientBalance { required: Usd, available: Usd },
    #[error("player {0} is not seated")]
    PlayerNotSeated(PlayerId),
    #[error("room is full")]
    RoomFull,
    #[error("already seated")]
    AlreadySeated,
    #[error("no svara decision pending")]
    NoSvaraDecisionPending,
    #[error("svara decision already made")]
    AlreadyDecided,
    #[error("not allowed during {status}")]
    WrongPhase { status: GameStatus },
    #[error("timer no longer applies")]
    StaleTimeout,
    #[error("invariant violated: {0}")]
    InvariantViolation(String),
}

impl GameError {
    /// Fatal errors mean the room's money can no longer be trusted.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::InvariantViolation(_))
    }
}

/// A closed set of everything that can happen to a room.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    Join {
        player_id: PlayerId,
        username: String,
        /// Account balance as read from the ledger.
        balance: Usd,
    },
    Leave {
        player_id: PlayerId,
    },
    Act {
        player_id: PlayerId,
        action: PlayerAction,
    },
    SvaraDecision {
        player_id: PlayerId,
        join: bool,
    },
    TurnTimeout {
        player_id: PlayerId,
    },
    SvaraTimeout,
    Reveal,
    Restart,
}

impl Command {
    /// The player who issued the command. Timer commands have none.
    #[must_use]
    pub fn player_id(&self) -> Option<PlayerId> {
        match self {
            Self::Join { player_id, .. }
            | Self::Leave { player_id }
            | Self::Act { player_id, .. }
            | Self::SvaraDecision { player_id, .. } => Some(*player_id),
            Self::TurnTimeout { .. } | Self::SvaraTimeout | Self::Reveal | Self::Restart => None,
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteReason {
    Leave,
    Eject,
    Settle,
}

impl fmt::Display for WriteReason {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let repr = match self {
            Self::Leave => "leave",
            Self::Eject => "eject",
            Self::Settle => "settle",
        };
        write!(f, "{repr}")
    }
}

/// An absolute balance to persist to the ledger.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct BalanceWrite {
    pub player_id: PlayerId,
    pub balance: Usd,
    pub reason: WriteReason,
    /// Replaying a write with the same key is a no-op on the ledger side.
    pub idempotency_key: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Transition {
    pub state: GameState,
    pub log: Vec<GameAction>,
    pub balance_writes: Vec<BalanceWrite>,
    /// Players no longer seated after this transition.
    pub removed: Vec<PlayerId>,
}

/// Apply `command` to `state`.
///
/// The returned state has already passed [`verify_invariants`].
pub fn apply<R: Rng>(
    state: &GameState,
    command: Command,
    rng: &mut R,
    now: DateTime<Utc>,
) -> Result<Transition, GameError> {
    let mut engine = Engine {
        state: state.clone(),
        log: Vec::new(),
        writes: Vec::new(),
        removed: Vec::new(),
        rng,
        now,
    };

    match command {
        Command::Join {
            player_id,
            username,
            balance,
        } => engine.join(player_id, username, balance)?,
        Command::Leave { player_id } => engine.leave(player_id)?,
        Command::Act { player_id, action } => engine.act(player_id, action)?,
        Command::SvaraDecision { player_id, join } => engine.svara_decision(player_id, join)?,
        Command::TurnTimeout { player_id } => engine.turn_timeout(player_id)?,
        Command::SvaraTimeout => engine.svara_timeout()?,
        Command::Reveal => engine.reveal()?,
        Command::Restart => engine.restart()?,
    }

    verify_invariants(&engine.state)?;
    Ok(Transition {
        state: engine.state,
        log: engine.log,
        balance_writes: engine.writes,
        removed: engine.removed,
    })
}

/// Check the money and turn invariants of a state.
pub fn verify_invariants(state: &GameState) -> Result<(), GameError> {
    if let Some(player) = state
        .players
        .iter()
        .chain(&state.waitlist)
        .find(|p| p.balance < Decimal::ZERO)
    {
        return Err(GameError::InvariantViolation(format!(
            "player {} has a negative balance of ${}",
            player.id, player.balance
        )));
    }

    if state.status.is_hand_running() {
        let expected = state.carried + state.committed();
        if state.pot != expected {
            return Err(GameError::InvariantViolation(format!(
                "pot is ${} but bets add up to ${expected}",
                state.pot
            )));
        }
    }

    if let Some(idx) = state.current_player_index {
        let valid = state.status.is_betting()
            && state.players.get(idx).is_some_and(Player::is_live);
        if !valid {
            return Err(GameError::InvariantViolation(format!(
                "seat {idx} can't hold the turn during {}",
                state.status
            )));
        }
    }
    Ok(())
}

struct Engine<'r, R: Rng> {
    state: GameState,
    log: Vec<GameAction>,
    writes: Vec<BalanceWrite>,
    removed: Vec<PlayerId>,
    rng: &'r mut R,
    now: DateTime<Utc>,
}

impl<R: Rng> Engine<'_, R> {
    fn record(&mut self, entries: Vec<GameAction>) {
        self.state.log.extend(entries.iter().cloned());
        self.log.extend(entries);
    }

    fn push(
        &mut self,
        kind: ActionKind,
        player_id: Option<PlayerId>,
        amount: Option<Usd>,
        message: String,
    ) {
        let entry = GameAction::new(kind, player_id, amount, self.now, message);
        self.record(vec![entry]);
    }

    fn write_balance(&mut self, player: &Player, reason: WriteReason) {
        let idempotency_key = format!(
            "{}:{}:{}:{}:{}",
            self.state.room_id,
            self.state.hand_id,
            player.id,
            reason,
            self.state.log.len()
        );
        self.writes.push(BalanceWrite {
            player_id: player.id,
            balance: player.balance,
            reason,
            idempotency_key,
        });
    }

    fn funded_count(&self) -> usize {
        self.state
            .players
            .iter()
            .filter(|p| !p.leaving && p.balance >= self.state.min_bet)
            .count()
    }

    /// Insert into `players` by seat position. Only valid between hands.
    fn seat(&mut self, player: Player) {
        let idx = self
            .state
            .players
            .partition_point(|p| p.position < player.position);
        if idx <= self.state.dealer_index && !self.state.players.is_empty() {
            self.state.dealer_index += 1;
        }
        self.state.players.insert(idx, player);
    }

    /// Remove from `players` outright. Only valid between hands.
    fn unseat(&mut self, idx: usize) {
        let player = self.state.players.remove(idx);
        self.removed.push(player.id);
        if idx < self.state.dealer_index {
            self.state.dealer_index -= 1;
        }
        if self.state.dealer_index >= self.state.players.len() {
            self.state.dealer_index = 0;
        }
    }

    fn join(&mut self, player_id: PlayerId, username: String, balance: Usd) -> Result<(), GameError> {
        if self.state.is_seated(player_id) {
            return Err(GameError::AlreadySeated);
        }
        let max_players = self.state.settings.max_players;
        if self.state.seat_count() >= max_players {
            return Err(GameError::RoomFull);
        }
        let taken: Vec<usize> = self
            .state
            .players
            .iter()
            .chain(&self.state.waitlist)
            .map(|p| p.position)
            .collect();
        let position = (0..max_players)
            .find(|pos| !taken.contains(pos))
            .ok_or(GameError::RoomFull)?;

        let player = Player::new(player_id, username, balance, position);
        info!(
            "Room {}: {} seated at {} with ${}",
            self.state.room_id, player.username, position, player.balance
        );
        self.push(
            ActionKind::Join,
            Some(player_id),
            Some(player.balance),
            format!("{} sits down", player.username),
        );

        if self.state.status == GameStatus::Waiting {
            self.seat(player);
            if self.funded_count() >= 2 {
                self.start_hand()?;
            }
        } else {
            self.state.waitlist.push(player);
        }
        Ok(())
    }

    fn leave(&mut self, player_id: PlayerId) -> Result<(), GameError> {
        if let Some(pos) = self.state.waitlist.iter().position(|p| p.id == player_id) {
            let player = self.state.waitlist.remove(pos);
            self.write_balance(&player, WriteReason::Leave);
            self.push(
                ActionKind::Leave,
                Some(player_id),
                Some(player.balance),
                format!("{} leaves", player.username),
            );
            self.removed.push(player_id);
            return Ok(());
        }

        let idx = self
            .state
            .player_index(player_id)
            .filter(|&idx| !self.state.players[idx].leaving)
            .ok_or(GameError::PlayerNotSeated(player_id))?;

        match self.state.status {
            GameStatus::Waiting | GameStatus::Finished => {
                let player = self.state.players[idx].clone();
                self.write_balance(&player, WriteReason::Leave);
                self.push(
                    ActionKind::Leave,
                    Some(player_id),
                    Some(player.balance),
                    format!("{} leaves", player.username),
                );
                self.unseat(idx);
                Ok(())
            }
            GameStatus::SvaraPending => {
                self.state.svara_confirmed.remove(&player_id);
                self.state.svara_declined.insert(player_id);
                self.mark_leaving(idx, WriteReason::Leave);
                if svara::is_decided(&self.state) {
                    self.resolve_svara()?;
                }
                Ok(())
            }
            GameStatus::Ante | GameStatus::BlindBetting | GameStatus::Betting | GameStatus::Showdown => {
                let in_hand = self.state.players[idx].in_hand();
                if in_hand && self.state.current_player_index == Some(idx) {
                    let entries =
                        betting::apply_action(&mut self.state, player_id, PlayerAction::Fold, self.now)?;
                    self.record(entries);
                    self.mark_leaving(idx, WriteReason::Leave);
                    return self.advance(PlayerAction::Fold);
                }

                self.mark_leaving(idx, WriteReason::Leave);
                if in_hand {
                    let player = &mut self.state.players[idx];
                    player.has_folded = true;
                    player.last_action = Some(ActionKind::Fold);
                    let message = format!("{} folds", player.username);
                    self.push(ActionKind::Fold, Some(player_id), None, message);
                    if self.state.in_hand_count() <= 1 {
                        return self.settle_hand();
                    }
                }
                Ok(())
            }
        }
    }

    /// Queue a player for removal at hand end and return their uncommitted
    /// balance to the ledger.
    fn mark_leaving(&mut self, idx: usize, reason: WriteReason) {
        let player = self.state.players[idx].clone();
        self.state.players[idx].leaving = true;
        self.write_balance(&player, reason);
        let message = match reason {
            WriteReason::Eject => format!("{} is removed for inactivity", player.username),
            _ => format!("{} leaves", player.username),
        };
        self.push(
            ActionKind::Leave,
            Some(player.id),
            Some(player.balance),
            message,
        );
    }

    fn act(&mut self, player_id: PlayerId, action: PlayerAction) -> Result<(), GameError> {
        let entries = betting::apply_action(&mut self.state, player_id, action, self.now)?;
        self.record(entries);
        if let Some(player) = self.state.player_mut(player_id) {
            player.inactivity_count = 0;
        }
        self.advance(action)
    }

    fn turn_timeout(&mut self, player_id: PlayerId) -> Result<(), GameError> {
        let idx = match self.state.current_player_index {
            Some(idx) if self.state.players[idx].id == player_id => idx,
            _ => return Err(GameError::StaleTimeout),
        };
        let mut entries =
            betting::apply_action(&mut self.state, player_id, PlayerAction::Fold, self.now)?;

        let max_inactivity = self.state.settings.max_inactivity;
        let player = &mut self.state.players[idx];
        player.inactivity_count = player.inactivity_count.saturating_add(1);
        let count = player.inactivity_count;
        for entry in &mut entries {
            entry.message = format!("{} (timed out {count}/{max_inactivity})", entry.message);
        }
        self.record(entries);
        info!(
            "Room {}: player {} timed out ({}/{})",
            self.state.room_id, player_id, count, max_inactivity
        );

        if count >= max_inactivity {
            info!(
                "Room {}: ejecting player {} for inactivity",
                self.state.room_id, player_id
            );
            self.mark_leaving(idx, WriteReason::Eject);
        }
        self.advance(PlayerAction::Fold)
    }

    /// Move on after the current player's action.
    fn advance(&mut self, action: PlayerAction) -> Result<(), GameError> {
        if action == PlayerAction::Look {
            self.state.turn_start_time = Some(self.now);
            return Ok(());
        }
        if self.state.in_hand_count() <= 1 {
            return self.settle_hand();
        }
        if betting::is_round_complete(&self.state) {
            debug!(
                "Room {}: round closed, anchor seat {}",
                self.state.room_id,
                betting::anchor_index(&self.state)
            );
            self.enter_showdown();
            return Ok(());
        }
        let next = self
            .state
            .current_player_index
            .and_then(|idx| betting::next_live_after(&self.state, idx));
        match next {
            Some(idx) => {
                self.state.current_player_index = Some(idx);
                self.state.turn_start_time = Some(self.now);
            }
            None => self.enter_showdown(),
        }
        Ok(())
    }

    fn enter_showdown(&mut self) {
        debug!("Room {}: showdown", self.state.room_id);
        self.state.status = GameStatus::Showdown;
        self.state.current_player_index = None;
        self.state.turn_start_time = Some(self.now);
        for player in self.state.players.iter_mut().filter(|p| p.in_hand()) {
            player.has_looked = true;
            player.score = functional::score_slice(&player.cards);
        }
    }

    fn reveal(&mut self) -> Result<(), GameError> {
        if self.state.status != GameStatus::Showdown {
            return Err(GameError::StaleTimeout);
        }
        self.settle_hand()
    }

    fn credit(&mut self, payout: &Payout, kind: ActionKind, message: String) {
        if let Some(player) = self.state.player_mut(payout.player_id) {
            player.balance += payout.amount;
        }
        self.push(kind, Some(payout.player_id), Some(payout.amount), message);
    }

    fn username(&self, player_id: PlayerId) -> String {
        self.state
            .player(player_id)
            .map_or_else(|| player_id.to_string(), |p| p.username.clone())
    }

    fn settle_hand(&mut self) -> Result<(), GameError> {
        for player in self.state.players.iter_mut().filter(|p| p.in_hand()) {
            player.score = functional::score_slice(&player.cards);
        }
        let contributions: Vec<Contribution> = self
            .state
            .players
            .iter()
            .map(|p| Contribution {
                player_id: p.id,
                total_bet: p.total_bet,
                folded: !p.in_hand(),
            })
            .collect();
        let scores: HashMap<PlayerId, _> = self
            .state
            .players
            .iter()
            .filter(|p| p.in_hand())
            .filter_map(|p| p.score.map(|score| (p.id, score)))
            .collect();
        let order = self.state.seat_order_after_dealer();

        let settlement = pot::settle(&contributions, self.state.carried, &scores, &order);
        if settlement.total() != self.state.pot {
            return Err(GameError::InvariantViolation(format!(
                "settlement hands out ${} of a ${} pot",
                settlement.total(),
                self.state.pot
            )));
        }

        for refund in &settlement.refunds {
            let message = format!("${} returned to {}", refund.amount, self.username(refund.player_id));
            self.credit(refund, ActionKind::ReturnBet, message);
        }
        for payout in &settlement.payouts {
            let message = format!("{} wins ${}", self.username(payout.player_id), payout.amount);
            self.credit(payout, ActionKind::Win, message);
            self.state.winners.push(payout.clone());
        }
        self.state.rake += settlement.rake;

        for player in &mut self.state.players {
            player.total_bet = Decimal::ZERO;
        }
        self.state.pot = Decimal::ZERO;
        self.state.carried = Decimal::ZERO;
        self.state.current_player_index = None;

        match settlement.svara {
            Some(carry) => {
                info!(
                    "Room {}: tie for ${}, entering svara",
                    self.state.room_id, carry.amount
                );
                let entries = svara::enter(&mut self.state, carry, self.now);
                self.record(entries);
                if svara::is_decided(&self.state) {
                    self.resolve_svara()?;
                }
                Ok(())
            }
            None => {
                self.finish();
                Ok(())
            }
        }
    }

    fn svara_decision(&mut self, player_id: PlayerId, join: bool) -> Result<(), GameError> {
        let entries = svara::decide(&mut self.state, player_id, join, self.now)?;
        self.record(entries);
        if let Some(player) = self.state.player_mut(player_id) {
            player.inactivity_count = 0;
        }
        if svara::is_decided(&self.state) {
            self.resolve_svara()?;
        }
        Ok(())
    }

    fn svara_timeout(&mut self) -> Result<(), GameError> {
        if self.state.status != GameStatus::SvaraPending {
            return Err(GameError::StaleTimeout);
        }
        for player_id in svara::expire(&mut self.state) {
            let message = format!("{} did not answer the svara", self.username(player_id));
            self.push(ActionKind::Svara, Some(player_id), None, message);
        }
        self.resolve_svara()
    }

    fn resolve_svara(&mut self) -> Result<(), GameError> {
        let pot = self.state.pot;
        match svara::resolve(&self.state) {
            SvaraResolution::Void => {
                self.push(
                    ActionKind::Svara,
                    None,
                    Some(pot),
                    format!("nobody plays the svara, ${pot} goes to the house"),
                );
                self.state.rake += pot;
                self.finish();
            }
            SvaraResolution::Outright(player_id) => {
                self.award(pot, &[player_id]);
                self.finish();
            }
            SvaraResolution::Split(player_ids) => {
                self.award(pot, &player_ids);
                self.finish();
            }
            SvaraResolution::Replay(player_ids) => self.replay(&player_ids)?,
        }
        Ok(())
    }

    /// Rake `pot` and split what is left between `winners`.
    fn award(&mut self, pot: Usd, winners: &[PlayerId]) {
        let rake = pot::rake_for(pot);
        self.state.rake += rake;
        for payout in pot::split_evenly(pot - rake, winners) {
            let message = format!("{} wins ${}", self.username(payout.player_id), payout.amount);
            self.credit(&payout, ActionKind::Win, message);
            self.state.winners.push(payout);
        }
    }

    /// Close the hand: persist balances and drop departed players.
    fn finish(&mut self) {
        self.state.status = GameStatus::Finished;
        self.state.current_player_index = None;
        self.state.turn_start_time = Some(self.now);
        self.state.pot = Decimal::ZERO;
        self.state.carried = Decimal::ZERO;
        for player in &mut self.state.players {
            player.total_bet = Decimal::ZERO;
        }

        let staying: Vec<Player> = self
            .state
            .players
            .iter()
            .filter(|p| !p.leaving)
            .cloned()
            .collect();
        for player in &staying {
            self.write_balance(player, WriteReason::Settle);
        }

        let dealer_position = self
            .state
            .players
            .get(self.state.dealer_index)
            .map(|p| p.position);
        let departed = self.state.players.iter().filter(|p| p.leaving).map(|p| p.id);
        self.removed.extend(departed);
        self.state.players = staying;
        // The dealer button stays at the last remaining seat at or before
        // where it was.
        self.state.dealer_index = dealer_position
            .and_then(|pos| self.state.players.iter().rposition(|p| p.position <= pos))
            .unwrap_or(self.state.players.len().saturating_sub(1));

        info!(
            "Room {}: hand {} finished, rake ${}",
            self.state.room_id, self.state.round, self.state.rake
        );
    }

    fn restart(&mut self) -> Result<(), GameError> {
        if self.state.status != GameStatus::Finished {
            return Err(GameError::StaleTimeout);
        }
        self.start_hand()
    }

    fn new_hand_id(&mut self) -> Uuid {
        Builder::from_random_bytes(self.rng.random()).into_uuid()
    }

    fn start_hand(&mut self) -> Result<(), GameError> {
        for player in mem::take(&mut self.state.waitlist) {
            self.seat(player);
        }
        if self.funded_count() < 2 {
            debug!("Room {}: not enough funded players", self.state.room_id);
            self.state.status = GameStatus::Waiting;
            self.state.current_player_index = None;
            self.state.turn_start_time = None;
            return Ok(());
        }

        let hand_id = self.new_hand_id();
        let state = &mut self.state;
        state.hand_id = hand_id;
        state.round += 1;
        state.log.clear();
        state.is_svara = false;
        state.svara_participants.clear();
        state.svara_confirmed.clear();
        state.svara_declined.clear();
        state.winners.clear();
        state.rake = Decimal::ZERO;
        state.pot = Decimal::ZERO;
        state.carried = Decimal::ZERO;
        let min_bet = state.min_bet;
        for player in &mut state.players {
            player.reset_for_hand();
            player.is_active = !player.leaving && player.balance >= min_bet;
        }
        let from = if state.round == 1 {
            state.players.len() - 1
        } else {
            state.dealer_index
        };
        state.dealer_index = state.next_index_after(from, |p| p.is_active).unwrap_or(0);

        info!(
            "Room {}: starting hand {} with dealer at seat {}",
            self.state.room_id, self.state.round, self.state.dealer_index
        );
        self.ante_and_deal()
    }

    /// Start a svara hand among `participants`. The dealer stays put and the
    /// tied pot carries in.
    fn replay(&mut self, participants: &[PlayerId]) -> Result<(), GameError> {
        let names = participants
            .iter()
            .map(|&id| self.username(id))
            .collect::<Vec<_>>()
            .join(", ");
        let pot = self.state.pot;
        self.push(
            ActionKind::Svara,
            None,
            Some(pot),
            format!("svara hand between {names} for ${pot}"),
        );

        self.state.is_svara = true;
        self.state.svara_participants = participants.iter().copied().collect();
        self.state.svara_confirmed.clear();
        self.state.svara_declined.clear();
        for player in &mut self.state.players {
            player.reset_for_hand();
            player.is_active = participants.contains(&player.id);
        }
        let hand_id = self.new_hand_id();
        self.state.hand_id = hand_id;
        self.ante_and_deal()
    }

    fn ante_and_deal(&mut self) -> Result<(), GameError> {
        self.state.status = GameStatus::Ante;
        self.state.current_bet = Decimal::ZERO;
        self.state.last_action_amount = Decimal::ZERO;
        self.state.last_blind = Decimal::ZERO;
        self.state.last_raise_index = None;
        self.state.last_blind_bettor_index = None;

        let ante = round_money(self.state.min_bet);
        let active: Vec<usize> = (0..self.state.players.len())
            .filter(|&idx| self.state.players[idx].is_active)
            .collect();
        for &idx in &active {
            let paid = self.state.players[idx].commit(ante);
            self.state.pot += paid;
            self.state.players[idx].last_action = Some(ActionKind::Ante);
            let player_id = self.state.players[idx].id;
            let message = format!("{} antes ${paid}", self.state.players[idx].username);
            self.push(ActionKind::Ante, Some(player_id), Some(paid), message);
        }
        self.state.current_bet = ante;

        self.state.deck = Deck::shuffled(&mut *self.rng);
        for &idx in &active {
            let cards = self.state.deck.deal_hand().ok_or_else(|| {
                GameError::InvariantViolation("deck ran out of cards".to_string())
            })?;
            self.state.players[idx].cards = cards;
        }

        self.state.status = GameStatus::BlindBetting;
        let first = betting::next_live_after(&self.state, self.state.dealer_index);
        match first {
            Some(idx)
                if self.state.live_count() >= 2
                    || self.state.players[idx].total_bet < self.state.current_bet =>
            {
                self.state.current_player_index = Some(idx);
                self.state.turn_start_time = Some(self.now);
            }
            _ => self.enter_showdown(),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::entities::{Card, GameSettings, Rank, Suit};
    use rand::{SeedableRng, rngs::StdRng};

    fn usd(dollars: i64) -> Usd {
        Decimal::from(dollars)
    }

    fn join(state: &GameState, player_id: PlayerId, balance: i64, rng: &mut StdRng) -> GameState {
        apply(
            state,
            Command::Join {
                player_id,
                username: format!("p{player_id}"),
                balance: usd(balance),
            },
            rng,
            Utc::now(),
        )
        .expect("join")
        .state
    }

    fn act(state: &GameState, player_id: PlayerId, action: PlayerAction, rng: &mut StdRng) -> Transition {
        apply(state, Command::Act { player_id, action }, rng, Utc::now()).expect("action")
    }

    /// `n` players with $100 each and the first hand dealt. Dealer at seat 0.
    fn dealt(n: usize, rng: &mut StdRng) -> GameState {
        let mut state = GameState::new(1, usd(10), GameSettings::default());
        for i in 0..n {
            let id = i as PlayerId + 1;
            state
                .players
                .push(Player::new(id, format!("p{id}"), usd(100), i));
        }
        state.status = GameStatus::Finished;
        apply(&state, Command::Restart, rng, Utc::now())
            .expect("deal")
            .state
    }

    fn current_id(state: &GameState) -> PlayerId {
        state.current_player().expect("someone to act").id
    }

    #[test]
    fn test_hand_starts_with_second_player() {
        let mut rng = StdRng::seed_from_u64(1);
        let state = GameState::new(1, usd(10), GameSettings::default());
        let state = join(&state, 1, 100, &mut rng);
        assert_eq!(state.status, GameStatus::Waiting);
        let state = join(&state, 2, 100, &mut rng);
        assert_eq!(state.status, GameStatus::BlindBetting);
        assert_eq!(state.pot, usd(20));
        assert_eq!(state.round, 1);
        assert!(state.players.iter().all(|p| p.cards.len() == 3));
        assert_eq!(state.deck.len(), 26);
        assert_ne!(state.hand_id, Uuid::nil());
    }

    #[test]
    fn test_turn_starts_after_dealer() {
        let mut rng = StdRng::seed_from_u64(1);
        let state = dealt(3, &mut rng);
        assert_eq!(state.dealer_index, 0);
        assert_eq!(state.current_player_index, Some(1));
        assert_eq!(state.pot, usd(30));
    }

    #[test]
    fn test_join_rejects_duplicates_and_full_rooms() {
        let mut rng = StdRng::seed_from_u64(1);
        let settings = GameSettings {
            max_players: 2,
            ..GameSettings::default()
        };
        let state = GameState::new(1, usd(10), settings);
        let state = join(&state, 1, 100, &mut rng);
        let err = apply(
            &state,
            Command::Join {
                player_id: 1,
                username: "again".into(),
                balance: usd(100),
            },
            &mut rng,
            Utc::now(),
        )
        .unwrap_err();
        assert_eq!(err, GameError::AlreadySeated);

        let state = join(&state, 2, 100, &mut rng);
        let err = apply(
            &state,
            Command::Join {
                player_id: 3,
                username: "late".into(),
                balance: usd(100),
            },
            &mut rng,
            Utc::now(),
        )
        .unwrap_err();
        assert_eq!(err, GameError::RoomFull);
    }

    #[test]
    fn test_mid_hand_join_waits_for_next_hand() {
        let mut rng = StdRng::seed_from_u64(1);
        let state = GameState::new(1, usd(10), GameSettings::default());
        let state = join(&state, 1, 100, &mut rng);
        let state = join(&state, 2, 100, &mut rng);
        let state = join(&state, 3, 100, &mut rng);
        assert_eq!(state.players.len(), 2);
        assert_eq!(state.waitlist.len(), 1);
    }

    #[test]
    fn test_rejected_command_leaves_state_untouched() {
        let mut rng = StdRng::seed_from_u64(1);
        let state = GameState::new(1, usd(10), GameSettings::default());
        let state = join(&state, 1, 100, &mut rng);
        let state = join(&state, 2, 100, &mut rng);
        let before = state.clone();
        let actor = current_id(&state);
        let err = apply(
            &state,
            Command::Act {
                player_id: actor,
                action: PlayerAction::Call,
            },
            &mut rng,
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, GameError::IllegalAction { .. }));
        assert_eq!(state, before);
    }

    #[test]
    fn test_fold_ends_two_player_hand() {
        let mut rng = StdRng::seed_from_u64(1);
        let state = GameState::new(1, usd(10), GameSettings::default());
        let state = join(&state, 1, 100, &mut rng);
        let state = join(&state, 2, 100, &mut rng);
        let folder = current_id(&state);
        let transition = act(&state, folder, PlayerAction::Fold, &mut rng);
        let state = transition.state;
        assert_eq!(state.status, GameStatus::Finished);
        let winner = state.players.iter().find(|p| p.id != folder).expect("winner");
        // Own $10 back plus the folded $10 less 5% rake.
        assert_eq!(winner.balance, Decimal::new(10950, 2));
        assert_eq!(state.rake, Decimal::new(50, 2));
        assert_eq!(transition.balance_writes.len(), 2);
        assert!(
            transition
                .balance_writes
                .iter()
                .all(|w| w.reason == WriteReason::Settle)
        );
    }

    #[test]
    fn test_restart_rotates_dealer() {
        let mut rng = StdRng::seed_from_u64(1);
        let state = GameState::new(1, usd(10), GameSettings::default());
        let state = join(&state, 1, 100, &mut rng);
        let state = join(&state, 2, 100, &mut rng);
        let dealer = state.dealer_index;
        let first_hand = state.hand_id;
        let folder = current_id(&state);
        let state = act(&state, folder, PlayerAction::Fold, &mut rng).state;
        let state = apply(&state, Command::Restart, &mut rng, Utc::now())
            .expect("restart")
            .state;
        assert_eq!(state.round, 2);
        assert_eq!(state.status, GameStatus::BlindBetting);
        assert_ne!(state.dealer_index, dealer);
        assert_ne!(state.hand_id, first_hand);
        assert_ne!(state.hand_id, Uuid::nil());
    }

    #[test]
    fn test_stale_timers_are_rejected() {
        let mut rng = StdRng::seed_from_u64(1);
        let state = GameState::new(1, usd(10), GameSettings::default());
        let state = join(&state, 1, 100, &mut rng);
        let state = join(&state, 2, 100, &mut rng);
        let waiting = state
            .players
            .iter()
            .find(|p| Some(p.id) != state.current_player().map(|c| c.id))
            .expect("other player")
            .id;
        for command in [
            Command::TurnTimeout { player_id: waiting },
            Command::Reveal,
            Command::Restart,
            Command::SvaraTimeout,
        ] {
            let err = apply(&state, command, &mut rng, Utc::now()).unwrap_err();
            assert_eq!(err, GameError::StaleTimeout);
        }
    }

    #[test]
    fn test_leave_between_hands_removes_immediately() {
        let mut rng = StdRng::seed_from_u64(1);
        let state = GameState::new(1, usd(10), GameSettings::default());
        let state = join(&state, 1, 100, &mut rng);
        let transition = apply(&state, Command::Leave { player_id: 1 }, &mut rng, Utc::now())
            .expect("leave");
        assert!(transition.state.players.is_empty());
        assert_eq!(transition.removed, vec![1]);
        assert_eq!(transition.balance_writes[0].balance, usd(100));
        assert_eq!(transition.balance_writes[0].reason, WriteReason::Leave);
    }

    #[test]
    fn test_leave_mid_hand_out_of_turn_folds_and_defers_removal() {
        let mut rng = StdRng::seed_from_u64(1);
        let state = dealt(3, &mut rng);
        let leaver = state
            .players
            .iter()
            .find(|p| Some(p.id) != state.current_player().map(|c| c.id))
            .expect("someone waiting")
            .id;
        let transition = apply(&state, Command::Leave { player_id: leaver }, &mut rng, Utc::now())
            .expect("leave");
        let player = transition.state.player(leaver).expect("still listed");
        assert!(player.has_folded && player.leaving);
        assert_eq!(transition.balance_writes[0].balance, usd(90));
        assert!(transition.removed.is_empty());
        assert_eq!(transition.state.pot, usd(30));
    }

    #[test]
    fn test_invariant_violation_detected() {
        let mut state = GameState::new(1, usd(10), GameSettings::default());
        state.status = GameStatus::Betting;
        state.pot = usd(5);
        assert!(matches!(
            verify_invariants(&state),
            Err(GameError::InvariantViolation(_))
        ));
    }

    #[test]
    fn test_showdown_then_reveal_settles() {
        let mut rng = StdRng::seed_from_u64(1);
        let state = GameState::new(1, usd(10), GameSettings::default());
        let state = join(&state, 1, 100, &mut rng);
        let mut state = join(&state, 2, 100, &mut rng);
        let first = current_id(&state);
        let second = state
            .players
            .iter()
            .find(|p| p.id != first)
            .expect("other")
            .id;
        for player in &mut state.players {
            player.cards = if player.id == first {
                vec![
                    Card(Rank::Ace, Suit::Heart),
                    Card(Rank::Ace, Suit::Spade),
                    Card(Rank::Ace, Suit::Diamond),
                ]
            } else {
                vec![
                    Card(Rank::Eight, Suit::Heart),
                    Card(Rank::Nine, Suit::Spade),
                    Card(Rank::Ten, Suit::Diamond),
                ]
            };
        }
        let state = act(&state, first, PlayerAction::Look, &mut rng).state;
        let state = act(&state, first, PlayerAction::Call, &mut rng).state;
        assert_eq!(state.status, GameStatus::Betting);
        let state = act(&state, second, PlayerAction::Call, &mut rng).state;
        assert_eq!(state.status, GameStatus::Showdown);
        let state = apply(&state, Command::Reveal, &mut rng, Utc::now())
            .expect("reveal")
            .state;
        assert_eq!(state.status, GameStatus::Finished);
        assert_eq!(state.winners[0].player_id, first);
        assert_eq!(state.winners[0].amount, Decimal::new(1900, 2));
    }
}
