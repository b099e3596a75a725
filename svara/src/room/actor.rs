//! Room actor: the single writer of one room's game state.

use super::{
    config::RoomConfig,
    messages::{RoomError, RoomMessage, RoomRequest, RoomResponse},
    scheduler::{TimerKind, TurnScheduler},
    seats::SeatRegistry,
};
use crate::{
    game::{
        BalanceWrite, Command, GameError, GameState, GameStatus, GameView,
        entities::{PlayerId, RoomId},
        state_machine,
    },
    ledger::Ledger,
    store::{GameStore, Room, RoomStatus, StoreResult},
};
use chrono::Utc;
use rand::{SeedableRng, rngs::StdRng};
use std::{sync::Arc, time::Duration};
use tokio::sync::{mpsc, oneshot};

/// How long a timer waits before retrying after the store or ledger failed.
const TIMER_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Room actor handle for sending messages
#[derive(Clone, Debug)]
pub struct RoomHandle {
    sender: mpsc::Sender<RoomMessage>,
    room_id: RoomId,
}

impl RoomHandle {
    /// Create a new room handle
    pub fn new(sender: mpsc::Sender<RoomMessage>, room_id: RoomId) -> Self {
        Self { sender, room_id }
    }

    /// Get room ID
    pub fn room_id(&self) -> RoomId {
        self.room_id
    }

    /// Send a message to the room
    pub async fn send(&self, message: RoomMessage) -> Result<(), String> {
        self.sender
            .send(message)
            .await
            .map_err(|_| "Room is closed".to_string())
    }

    /// Send a player request and wait for the outcome.
    pub async fn request(&self, request: RoomRequest) -> RoomResponse {
        let (response, rx) = oneshot::channel();
        if self
            .send(RoomMessage::Request { request, response })
            .await
            .is_err()
        {
            return RoomResponse::Closed;
        }
        rx.await.unwrap_or(RoomResponse::Closed)
    }

    /// The room as `player_id` sees it. `None` once the room is gone or its
    /// state can't be loaded.
    pub async fn view(&self, player_id: Option<PlayerId>) -> Option<GameView> {
        let (response, rx) = oneshot::channel();
        self.send(RoomMessage::GetState {
            player_id,
            response,
        })
        .await
        .ok()?;
        rx.await.ok().flatten()
    }

    pub async fn room(&self) -> Option<Room> {
        let (response, rx) = oneshot::channel();
        self.send(RoomMessage::GetRoom { response }).await.ok()?;
        rx.await.ok().flatten()
    }
}

/// Room actor managing a single Svara room
pub struct RoomActor {
    /// Room ID
    id: RoomId,

    /// Room configuration
    config: RoomConfig,

    /// Message inbox
    inbox: mpsc::Receiver<RoomMessage>,

    /// Where the game and room records live
    store: Arc<dyn GameStore>,

    /// Account balances
    ledger: Arc<dyn Ledger>,

    /// The room's single pending deadline
    scheduler: TurnScheduler,

    /// Shuffles decks
    rng: StdRng,

    /// Last room record written
    room: Room,

    /// Ledger writes that failed and are retried before the next command
    pending_writes: Vec<BalanceWrite>,

    /// Seats held across the manager's rooms
    seats: SeatRegistry,

    /// Removed players whose seat is freed once their last write lands
    departed: Vec<PlayerId>,

    /// Is room closed
    is_closed: bool,
}

impl RoomActor {
    /// Create a new room actor
    ///
    /// # Returns
    ///
    /// * `(RoomActor, RoomHandle)` - Actor and handle for sending messages
    pub fn new(
        id: RoomId,
        config: RoomConfig,
        store: Arc<dyn GameStore>,
        ledger: Arc<dyn Ledger>,
    ) -> (Self, RoomHandle) {
        let (sender, inbox) = mpsc::channel(100);

        let room = Room {
            id,
            name: config.name.clone(),
            status: RoomStatus::Waiting,
            members: Vec::new(),
            min_bet: config.min_bet,
            max_players: config.max_players,
        };

        let actor = Self {
            id,
            config,
            inbox,
            store,
            ledger,
            scheduler: TurnScheduler::new(),
            rng: StdRng::from_os_rng(),
            room,
            pending_writes: Vec::new(),
            seats: SeatRegistry::new(),
            departed: Vec::new(),
            is_closed: false,
        };

        (actor, RoomHandle::new(sender, id))
    }

    /// Use a fixed RNG, for reproducible deals.
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    /// Share seat bookkeeping with other rooms.
    pub fn with_seats(mut self, seats: SeatRegistry) -> Self {
        self.seats = seats;
        self
    }

    /// Write the initial game and room records.
    pub async fn init(&self) -> StoreResult<()> {
        let state = GameState::new(self.id, self.config.min_bet, self.config.game_settings());
        self.store.save_game(&state).await?;
        self.store.save_room(&self.room).await?;
        self.store.publish_room(&self.room).await
    }

    /// Run the room actor event loop
    pub async fn run(mut self) {
        log::info!("Room {} '{}' starting", self.id, self.config.name);

        loop {
            tokio::select! {
                message = self.inbox.recv() => {
                    match message {
                        Some(message) => self.handle_message(message).await,
                        None => break,
                    }
                    if self.is_closed {
                        break;
                    }
                }

                kind = self.scheduler.fired() => {
                    self.scheduler.clear();
                    self.handle_timer(kind).await;
                }
            }
        }

        log::info!("Room {} '{}' closed", self.id, self.config.name);
    }

    async fn handle_message(&mut self, message: RoomMessage) {
        match message {
            RoomMessage::Request { request, response } => {
                let player_id = request.player_id();
                let result = self.handle_request(request).await;
                if let Err(e) = &result {
                    log::debug!("Room {}: rejected request from {}: {}", self.id, player_id, e);
                }
                let _ = response.send(result.map_or_else(RoomResponse::from, |()| RoomResponse::Success));
            }

            RoomMessage::GetState {
                player_id,
                response,
            } => {
                let view = match self.store.load_game(self.id).await {
                    Ok(state) => Some(state.view_for(player_id)),
                    Err(e) => {
                        log::warn!("Room {}: can't load state: {}", self.id, e);
                        None
                    }
                };
                let _ = response.send(view);
            }

            RoomMessage::GetRoom { response } => {
                let _ = response.send(Some(self.room.clone()));
            }

            RoomMessage::Close { response } => {
                let result = self.close().await;
                let _ = response.send(result.map_or_else(RoomResponse::from, |()| RoomResponse::Success));
            }
        }
    }

    async fn handle_request(&mut self, request: RoomRequest) -> Result<(), RoomError> {
        let command = match request {
            RoomRequest::Join {
                player_id,
                username,
            } => return self.join(player_id, username).await,
            RoomRequest::Leave { player_id } => Command::Leave { player_id },
            RoomRequest::Act { player_id, action } => Command::Act { player_id, action },
            RoomRequest::SvaraDecision { player_id, join } => {
                Command::SvaraDecision { player_id, join }
            }
        };
        self.process(command).await
    }

    async fn join(&mut self, player_id: PlayerId, username: String) -> Result<(), RoomError> {
        self.ensure_open()?;
        let claimed = self
            .seats
            .claim(player_id, self.id)
            .await
            .map_err(|room| RoomError::Rejected(format!("Already seated in room {room}")))?;

        let result = match self.ledger.get_balance(player_id).await {
            Ok(balance) => {
                self.process(Command::Join {
                    player_id,
                    username,
                    balance,
                })
                .await
            }
            Err(e) => Err(e.into()),
        };
        match &result {
            Ok(()) => self.departed.retain(|&id| id != player_id),
            Err(_) if claimed => self.seats.release(player_id, self.id).await,
            Err(_) => {}
        }
        result
    }

    async fn handle_timer(&mut self, kind: TimerKind) {
        let command = match kind {
            TimerKind::Turn(player_id) => Command::TurnTimeout { player_id },
            TimerKind::SvaraDecision => Command::SvaraTimeout,
            TimerKind::Reveal => Command::Reveal,
            TimerKind::Restart => Command::Restart,
        };
        log::debug!("Room {}: timer {:?} fired", self.id, kind);

        match self.process(command).await {
            Ok(()) => {}
            Err(RoomError::Validation(GameError::StaleTimeout)) => {
                log::debug!("Room {}: stale timer {:?} ignored", self.id, kind);
            }
            Err(RoomError::ServerBusy(reason)) => {
                log::warn!(
                    "Room {}: timer {:?} failed ({}), retrying",
                    self.id,
                    kind,
                    reason
                );
                self.scheduler.arm(kind, None, TIMER_RETRY_DELAY);
            }
            Err(e) => log::warn!("Room {}: timer {:?} failed: {}", self.id, kind, e),
        }
    }

    fn ensure_open(&self) -> Result<(), RoomError> {
        match self.room.status {
            RoomStatus::Closed => Err(RoomError::Closed),
            RoomStatus::Reconciliation => Err(RoomError::Reconciliation),
            _ => Ok(()),
        }
    }

    /// Apply one command: load, transition, persist, settle balances,
    /// publish, reschedule.
    async fn process(&mut self, command: Command) -> Result<(), RoomError> {
        self.ensure_open()?;
        self.retry_pending_writes().await;

        let state = self.store.load_game(self.id).await?;
        let transition = match state_machine::apply(&state, command, &mut self.rng, Utc::now()) {
            Ok(transition) => transition,
            Err(e) if e.is_fatal() => {
                self.flag_reconciliation(&e).await;
                return Err(RoomError::Reconciliation);
            }
            Err(e) => return Err(e.into()),
        };

        self.store.save_game(&transition.state).await?;

        for write in transition.balance_writes {
            self.write_balance(write).await;
        }
        if !transition.removed.is_empty() {
            log::info!(
                "Room {}: players {:?} left the table",
                self.id,
                transition.removed
            );
            self.departed.extend(transition.removed);
        }
        self.release_departed().await;

        if let Err(e) = self.store.publish_game(&transition.state).await {
            log::warn!("Room {}: failed to publish game update: {}", self.id, e);
        }
        self.sync_room(&transition.state).await;
        self.reschedule(&transition.state);
        Ok(())
    }

    async fn write_balance(&mut self, write: BalanceWrite) {
        if let Err(e) = self
            .ledger
            .set_balance(write.player_id, write.balance, &write.idempotency_key)
            .await
        {
            log::error!(
                "Room {}: ledger write {} for player {} failed: {}",
                self.id,
                write.idempotency_key,
                write.player_id,
                e
            );
            self.pending_writes.push(write);
        }
    }

    async fn retry_pending_writes(&mut self) {
        for write in std::mem::take(&mut self.pending_writes) {
            self.write_balance(write).await;
        }
        self.release_departed().await;
    }

    async fn release_departed(&mut self) {
        let (waiting, settled): (Vec<PlayerId>, Vec<PlayerId>) = std::mem::take(&mut self.departed)
            .into_iter()
            .partition(|id| self.pending_writes.iter().any(|w| w.player_id == *id));
        for player_id in settled {
            self.seats.release(player_id, self.id).await;
        }
        self.departed = waiting;
    }

    /// Keep the room record in step with the game.
    async fn sync_room(&mut self, state: &GameState) {
        let members: Vec<PlayerId> = state
            .players
            .iter()
            .filter(|p| !p.leaving)
            .chain(&state.waitlist)
            .map(|p| p.id)
            .collect();
        let status = RoomStatus::from_game(state.status);
        if members == self.room.members && status == self.room.status {
            return;
        }
        self.room.members = members;
        self.room.status = status;
        self.persist_room().await;
    }

    async fn persist_room(&self) {
        if let Err(e) = self.store.save_room(&self.room).await {
            log::warn!("Room {}: failed to save room record: {}", self.id, e);
        }
        if let Err(e) = self.store.publish_room(&self.room).await {
            log::warn!("Room {}: failed to publish room record: {}", self.id, e);
        }
    }

    async fn flag_reconciliation(&mut self, error: &GameError) {
        log::error!(
            "Room {}: {}. Suspending room for reconciliation",
            self.id,
            error
        );
        self.scheduler.clear();
        self.room.status = RoomStatus::Reconciliation;
        self.persist_room().await;
    }

    fn reschedule(&mut self, state: &GameState) {
        let desired = match state.status {
            GameStatus::BlindBetting | GameStatus::Betting => state
                .current_player()
                .map(|p| (TimerKind::Turn(p.id), self.config.turn_timeout())),
            GameStatus::Showdown => Some((TimerKind::Reveal, self.config.showdown_delay())),
            GameStatus::SvaraPending => Some((
                TimerKind::SvaraDecision,
                self.config.svara_decision_timeout(),
            )),
            GameStatus::Finished => Some((TimerKind::Restart, self.config.restart_delay())),
            GameStatus::Waiting | GameStatus::Ante => None,
        };

        match desired {
            Some((kind, after)) => {
                if !self.scheduler.is_armed_for(kind, state.turn_start_time) {
                    self.scheduler.arm(kind, state.turn_start_time, after);
                }
            }
            None => self.scheduler.clear(),
        }
    }

    async fn close(&mut self) -> Result<(), RoomError> {
        if self.room.status == RoomStatus::Closed {
            return Err(RoomError::Closed);
        }
        let state = self.store.load_game(self.id).await?;
        if state.status.is_hand_running() && self.room.status != RoomStatus::Reconciliation {
            return Err(RoomError::Rejected("hand in progress".to_string()));
        }
        self.retry_pending_writes().await;
        self.scheduler.clear();
        self.room.status = RoomStatus::Closed;
        self.persist_room().await;
        self.seats.release_room(self.id).await;
        self.is_closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        game::{GameStatus, PlayerAction},
        ledger::MemoryLedger,
        store::MemoryStore,
    };
    use rust_decimal::Decimal;

    struct Fixture {
        handle: RoomHandle,
        store: Arc<MemoryStore>,
        ledger: Arc<MemoryLedger>,
    }

    async fn spawn_room() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let ledger = Arc::new(MemoryLedger::with_default_balance(Decimal::from(100)));
        let (actor, handle) = RoomActor::new(1, RoomConfig::default(), store.clone(), ledger.clone());
        let actor = actor.with_rng(StdRng::seed_from_u64(7));
        actor.init().await.expect("init");
        tokio::spawn(actor.run());
        Fixture {
            handle,
            store,
            ledger,
        }
    }

    async fn join(handle: &RoomHandle, player_id: PlayerId) -> RoomResponse {
        handle
            .request(RoomRequest::Join {
                player_id,
                username: format!("p{player_id}"),
            })
            .await
    }

    #[tokio::test]
    async fn test_second_join_starts_hand() {
        let room = spawn_room().await;
        assert!(join(&room.handle, 1).await.is_success());
        assert_eq!(
            room.handle.room().await.expect("room").status,
            RoomStatus::Waiting
        );
        assert!(join(&room.handle, 2).await.is_success());

        let view = room.handle.view(Some(1)).await.expect("view");
        assert_eq!(view.status, GameStatus::BlindBetting);
        assert_eq!(view.players.len(), 2);

        let record = room.handle.room().await.expect("room");
        assert_eq!(record.status, RoomStatus::Playing);
        assert_eq!(record.members, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_out_of_turn_action_is_rejected() {
        let room = spawn_room().await;
        join(&room.handle, 1).await;
        join(&room.handle, 2).await;

        // Player 1 deals, so player 2 acts first.
        let response = room
            .handle
            .request(RoomRequest::Act {
                player_id: 1,
                action: PlayerAction::Fold,
            })
            .await;
        assert_eq!(response, RoomResponse::Rejected("not your turn".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_turn_timeout_folds_and_settles() {
        let room = spawn_room().await;
        join(&room.handle, 1).await;
        join(&room.handle, 2).await;

        tokio::time::sleep(Duration::from_secs(16)).await;

        let view = room.handle.view(None).await.expect("view");
        assert_eq!(view.status, GameStatus::Finished);
        assert_eq!(
            room.ledger.get_balance(1).await.expect("balance"),
            Decimal::new(10950, 2)
        );
        assert_eq!(
            room.ledger.get_balance(2).await.expect("balance"),
            Decimal::from(90)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_next_hand_deals_after_restart_delay() {
        let room = spawn_room().await;
        join(&room.handle, 1).await;
        join(&room.handle, 2).await;

        // Timeout at 15s, restart 5s later.
        tokio::time::sleep(Duration::from_secs(21)).await;

        let state = room.store.load_game(1).await.expect("state");
        assert_eq!(state.round, 2);
        assert_eq!(state.status, GameStatus::BlindBetting);
    }

    #[tokio::test]
    async fn test_store_outage_reports_busy() {
        let room = spawn_room().await;
        room.store.set_available(false);
        assert!(matches!(
            join(&room.handle, 1).await,
            RoomResponse::ServerBusy(_)
        ));

        room.store.set_available(true);
        assert!(join(&room.handle, 1).await.is_success());
    }

    #[tokio::test]
    async fn test_close_only_between_hands() {
        let room = spawn_room().await;
        join(&room.handle, 1).await;
        join(&room.handle, 2).await;

        let (response, rx) = oneshot::channel();
        room.handle
            .send(RoomMessage::Close { response })
            .await
            .expect("send");
        assert!(matches!(rx.await, Ok(RoomResponse::Rejected(_))));

        let fixture = spawn_room().await;
        let (response, rx) = oneshot::channel();
        fixture
            .handle
            .send(RoomMessage::Close { response })
            .await
            .expect("send");
        assert_eq!(rx.await.expect("reply"), RoomResponse::Success);
        assert_eq!(join(&fixture.handle, 1).await, RoomResponse::Closed);
    }
}
