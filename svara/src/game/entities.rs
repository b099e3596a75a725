use chrono::{DateTime, Utc};
use rand::{Rng, seq::SliceRandom};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeSet, fmt};
use uuid::Uuid;

use super::constants::{CARDS_PER_HAND, DEFAULT_MAX_INACTIVITY, MAX_PLAYERS};

/// Type alias for money. Balances, bets and pots are decimal dollars kept
/// at cent precision.
pub type Usd = Decimal;

pub type PlayerId = i64;
pub type RoomId = i64;

/// Round an amount to cents before it touches a balance or the pot.
#[must_use]
pub fn round_money(amount: Usd) -> Usd {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Drop anything below a cent. Used for even splits so that shares never
/// add up to more than what is being split.
#[must_use]
pub fn truncate_money(amount: Usd) -> Usd {
    amount.round_dp_with_strategy(2, RoundingStrategy::ToZero)
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Suit {
    Heart,
    Diamond,
    Club,
    Spade,
}

impl Suit {
    pub const ALL: [Suit; 4] = [Suit::Heart, Suit::Diamond, Suit::Club, Suit::Spade];
}

impl fmt::Display for Suit {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let repr = match self {
            Self::Heart => "♥",
            Self::Diamond => "♦",
            Self::Club => "♣",
            Self::Spade => "♠",
        };
        write!(f, "{repr}")
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Rank {
    Seven,
    Eight,
    Nine,
    Ten,
    Jack,
    Queen,
    King,
    Ace,
}

impl Rank {
    pub const ALL: [Rank; 8] = [
        Rank::Seven,
        Rank::Eight,
        Rank::Nine,
        Rank::Ten,
        Rank::Jack,
        Rank::Queen,
        Rank::King,
        Rank::Ace,
    ];

    /// Points a card of this rank is worth. Faces count 10, the ace 11.
    #[must_use]
    pub fn value(self) -> u8 {
        match self {
            Self::Seven => 7,
            Self::Eight => 8,
            Self::Nine => 9,
            Self::Ten | Self::Jack | Self::Queen | Self::King => 10,
            Self::Ace => 11,
        }
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let repr = match self {
            Self::Seven => "7",
            Self::Eight => "8",
            Self::Nine => "9",
            Self::Ten => "10",
            Self::Jack => "J",
            Self::Queen => "Q",
            Self::King => "K",
            Self::Ace => "A",
        };
        write!(f, "{repr}")
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct Card(pub Rank, pub Suit);

impl Card {
    #[must_use]
    pub fn value(&self) -> u8 {
        self.0.value()
    }

    /// The seven of clubs plays as a wild card.
    #[must_use]
    pub fn is_joker(&self) -> bool {
        matches!(self, Card(Rank::Seven, Suit::Club))
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let repr = format!("{}/{}", self.0, self.1);
        write!(f, "{repr:>4}")
    }
}

/// Undealt cards. Dealing pops from the back.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Deck {
    cards: Vec<Card>,
}

impl Deck {
    #[must_use]
    pub fn standard() -> Self {
        let cards = Rank::ALL
            .into_iter()
            .flat_map(|rank| Suit::ALL.into_iter().map(move |suit| Card(rank, suit)))
            .collect();
        Self { cards }
    }

    pub fn shuffled<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let mut deck = Self::standard();
        deck.cards.shuffle(rng);
        deck
    }

    pub fn deal(&mut self) -> Option<Card> {
        self.cards.pop()
    }

    pub fn deal_hand(&mut self) -> Option<Vec<Card>> {
        if self.cards.len() < CARDS_PER_HAND {
            return None;
        }
        let at = self.cards.len() - CARDS_PER_HAND;
        Some(self.cards.split_off(at))
    }

    #[must_use]
    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cards.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }
}

impl Default for Deck {
    fn default() -> Self {
        Self::standard()
    }
}

/// Hand classes, weakest first so the derived ordering ranks hands.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HandRank {
    HighCard,
    Pair,
    TwoSuited,
    ThreeSuited,
    ThreeOfAKind,
    ThreeSevens,
}

impl fmt::Display for HandRank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = match self {
            Self::HighCard => "high card",
            Self::Pair => "pair",
            Self::TwoSuited => "two suited",
            Self::ThreeSuited => "svara",
            Self::ThreeOfAKind => "three of a kind",
            Self::ThreeSevens => "three sevens",
        };
        write!(f, "{repr}")
    }
}

/// Class first, then value within the class.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct HandScore {
    pub rank: HandRank,
    pub value: u8,
}

impl fmt::Display for HandScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.rank, self.value)
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Ante,
    Blind,
    Look,
    Call,
    Raise,
    Fold,
    AllIn,
    Win,
    Svara,
    Join,
    Leave,
    ReturnBet,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let repr = match self {
            Self::Ante => "ante",
            Self::Blind => "blind",
            Self::Look => "look",
            Self::Call => "call",
            Self::Raise => "raise",
            Self::Fold => "fold",
            Self::AllIn => "all_in",
            Self::Win => "win",
            Self::Svara => "svara",
            Self::Join => "join",
            Self::Leave => "leave",
            Self::ReturnBet => "return_bet",
        };
        write!(f, "{repr}")
    }
}

/// Immutable log entry, doubling as the notification payload for
/// spectators.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct GameAction {
    pub kind: ActionKind,
    pub player_id: Option<PlayerId>,
    pub amount: Option<Usd>,
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

impl GameAction {
    pub fn new(
        kind: ActionKind,
        player_id: Option<PlayerId>,
        amount: Option<Usd>,
        timestamp: DateTime<Utc>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            player_id,
            amount,
            timestamp,
            message: message.into(),
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    Waiting,
    Ante,
    BlindBetting,
    Betting,
    Showdown,
    SvaraPending,
    Finished,
}

impl GameStatus {
    /// Whether money is committed to a hand that has not been settled.
    #[must_use]
    pub fn is_hand_running(self) -> bool {
        matches!(
            self,
            Self::Ante | Self::BlindBetting | Self::Betting | Self::Showdown | Self::SvaraPending
        )
    }

    #[must_use]
    pub fn is_betting(self) -> bool {
        matches!(self, Self::BlindBetting | Self::Betting)
    }

    /// Phases in which every non-folded hand is face up.
    #[must_use]
    pub fn cards_open(self) -> bool {
        matches!(
            self,
            Self::Betting | Self::Showdown | Self::SvaraPending | Self::Finished
        )
    }
}

impl fmt::Display for GameStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let repr = match self {
            Self::Waiting => "waiting",
            Self::Ante => "ante",
            Self::BlindBetting => "blind_betting",
            Self::Betting => "betting",
            Self::Showdown => "showdown",
            Self::SvaraPending => "svara_pending",
            Self::Finished => "finished",
        };
        write!(f, "{repr}")
    }
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Player {
    pub id: PlayerId,
    pub username: String,
    /// Funds not yet committed to the current hand.
    pub balance: Usd,
    /// Committed to the current hand.
    pub total_bet: Usd,
    pub cards: Vec<Card>,
    pub is_active: bool,
    pub has_folded: bool,
    pub has_looked: bool,
    pub has_looked_and_must_act: bool,
    pub is_all_in: bool,
    /// Acted since `current_bet` last went up.
    #[serde(default)]
    pub has_acted: bool,
    pub score: Option<HandScore>,
    pub last_action: Option<ActionKind>,
    pub position: usize,
    pub inactivity_count: u8,
    /// Left or ejected. Removed once the hand settles.
    pub leaving: bool,
}

impl Player {
    #[must_use]
    pub fn new(id: PlayerId, username: String, balance: Usd, position: usize) -> Self {
        Self {
            id,
            username,
            balance: round_money(balance),
            total_bet: Decimal::ZERO,
            cards: Vec::with_capacity(CARDS_PER_HAND),
            is_active: false,
            has_folded: false,
            has_looked: false,
            has_looked_and_must_act: false,
            is_all_in: false,
            has_acted: false,
            score: None,
            last_action: None,
            position,
            inactivity_count: 0,
            leaving: false,
        }
    }

    /// Still holding cards in the current hand.
    #[must_use]
    pub fn in_hand(&self) -> bool {
        self.is_active && !self.has_folded
    }

    /// Still able to act: in the hand and not all-in.
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.in_hand() && !self.is_all_in
    }

    pub fn reset_for_hand(&mut self) {
        self.total_bet = Decimal::ZERO;
        self.cards.clear();
        self.is_active = false;
        self.has_folded = false;
        self.has_looked = false;
        self.has_looked_and_must_act = false;
        self.is_all_in = false;
        self.has_acted = false;
        self.score = None;
        self.last_action = None;
    }

    /// Move `amount` from the player's balance into their committed bet.
    /// Returns the amount actually moved, already rounded to cents.
    pub fn commit(&mut self, amount: Usd) -> Usd {
        let amount = round_money(amount).min(self.balance);
        self.balance -= amount;
        self.total_bet += amount;
        if self.balance.is_zero() {
            self.is_all_in = true;
        }
        amount
    }
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Payout {
    pub player_id: PlayerId,
    pub amount: Usd,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct GameSettings {
    pub max_players: usize,
    pub max_inactivity: u8,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            max_players: MAX_PLAYERS,
            max_inactivity: DEFAULT_MAX_INACTIVITY,
        }
    }
}

/// The authoritative record of one room's game.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct GameState {
    pub room_id: RoomId,
    pub hand_id: Uuid,
    pub status: GameStatus,
    pub settings: GameSettings,
    /// Seated players ordered by seat position.
    pub players: Vec<Player>,
    /// Players who joined while a hand was running. Seated at the next hand.
    pub waitlist: Vec<Player>,
    pub deck: Deck,
    pub pot: Usd,
    /// Pot carried into a svara hand from the tied hand before it.
    pub carried: Usd,
    pub min_bet: Usd,
    pub dealer_index: usize,
    pub current_player_index: Option<usize>,
    pub current_bet: Usd,
    pub last_action_amount: Usd,
    pub last_blind: Usd,
    pub last_raise_index: Option<usize>,
    pub last_blind_bettor_index: Option<usize>,
    pub round: u32,
    pub is_svara: bool,
    pub svara_participants: BTreeSet<PlayerId>,
    pub svara_confirmed: BTreeSet<PlayerId>,
    pub svara_declined: BTreeSet<PlayerId>,
    pub winners: Vec<Payout>,
    /// House take of the latest settlement.
    pub rake: Usd,
    pub log: Vec<GameAction>,
    pub turn_start_time: Option<DateTime<Utc>>,
}

impl GameState {
    #[must_use]
    pub fn new(room_id: RoomId, min_bet: Usd, settings: GameSettings) -> Self {
        Self {
            room_id,
            hand_id: Uuid::nil(),
            status: GameStatus::Waiting,
            settings,
            players: Vec::new(),
            waitlist: Vec::new(),
            deck: Deck::standard(),
            pot: Decimal::ZERO,
            carried: Decimal::ZERO,
            min_bet: round_money(min_bet),
            dealer_index: 0,
            current_player_index: None,
            current_bet: Decimal::ZERO,
            last_action_amount: Decimal::ZERO,
            last_blind: Decimal::ZERO,
            last_raise_index: None,
            last_blind_bettor_index: None,
            round: 0,
            is_svara: false,
            svara_participants: BTreeSet::new(),
            svara_confirmed: BTreeSet::new(),
            svara_declined: BTreeSet::new(),
            winners: Vec::new(),
            rake: Decimal::ZERO,
            log: Vec::new(),
            turn_start_time: None,
        }
    }

    #[must_use]
    pub fn player_index(&self, player_id: PlayerId) -> Option<usize> {
        self.players.iter().position(|p| p.id == player_id)
    }

    #[must_use]
    pub fn player(&self, player_id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == player_id)
    }

    pub fn player_mut(&mut self, player_id: PlayerId) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id == player_id)
    }

    #[must_use]
    pub fn current_player(&self) -> Option<&Player> {
        self.current_player_index.and_then(|idx| self.players.get(idx))
    }

    /// Seated anywhere, including the waitlist.
    #[must_use]
    pub fn is_seated(&self, player_id: PlayerId) -> bool {
        self.players.iter().chain(&self.waitlist).any(|p| p.id == player_id)
    }

    #[must_use]
    pub fn seat_count(&self) -> usize {
        self.players.len() + self.waitlist.len()
    }

    #[must_use]
    pub fn in_hand_count(&self) -> usize {
        self.players.iter().filter(|p| p.in_hand()).count()
    }

    #[must_use]
    pub fn live_count(&self) -> usize {
        self.players.iter().filter(|p| p.is_live()).count()
    }

    #[must_use]
    pub fn committed(&self) -> Usd {
        self.players.iter().map(|p| p.total_bet).sum()
    }

    /// First seat strictly after `from` (wrapping) that satisfies `pred`.
    /// `from` itself is checked last.
    pub fn next_index_after(&self, from: usize, pred: impl Fn(&Player) -> bool) -> Option<usize> {
        let n = self.players.len();
        (1..=n)
            .map(|offset| (from + offset) % n)
            .find(|&idx| pred(&self.players[idx]))
    }

    /// Player ids in seat order starting with the seat after the dealer.
    #[must_use]
    pub fn seat_order_after_dealer(&self) -> Vec<PlayerId> {
        let n = self.players.len();
        (1..=n)
            .map(|offset| self.players[(self.dealer_index + offset) % n].id)
            .collect()
    }

    /// Render the state as seen by `viewer`. Spectators pass `None`.
    #[must_use]
    pub fn view_for(&self, viewer: Option<PlayerId>) -> GameView {
        let players = self
            .players
            .iter()
            .map(|player| {
                let visible = (viewer == Some(player.id) && player.has_looked)
                    || (self.status.cards_open() && player.in_hand());
                PlayerView {
                    id: player.id,
                    username: player.username.clone(),
                    balance: player.balance,
                    total_bet: player.total_bet,
                    cards: if visible {
                        player.cards.clone()
                    } else {
                        Vec::new()
                    },
                    card_count: player.cards.len(),
                    is_active: player.is_active,
                    has_folded: player.has_folded,
                    has_looked: player.has_looked,
                    is_all_in: player.is_all_in,
                    score: if visible { player.score } else { None },
                    last_action: player.last_action,
                    position: player.position,
                    inactivity_count: player.inactivity_count,
                }
            })
            .collect();

        GameView {
            room_id: self.room_id,
            hand_id: self.hand_id,
            status: self.status,
            players,
            waitlist: self.waitlist.iter().map(|p| p.username.clone()).collect(),
            pot: self.pot,
            min_bet: self.min_bet,
            dealer_index: self.dealer_index,
            current_player_index: self.current_player_index,
            current_bet: self.current_bet,
            last_action_amount: self.last_action_amount,
            round: self.round,
            is_svara: self.is_svara,
            svara_participants: self.svara_participants.clone(),
            svara_confirmed: self.svara_confirmed.clone(),
            svara_declined: self.svara_declined.clone(),
            winners: self.winners.clone(),
            log: self.log.clone(),
            turn_start_time: self.turn_start_time,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct PlayerView {
    pub id: PlayerId,
    pub username: String,
    pub balance: Usd,
    pub total_bet: Usd,
    pub cards: Vec<Card>,
    pub card_count: usize,
    pub is_active: bool,
    pub has_folded: bool,
    pub has_looked: bool,
    pub is_all_in: bool,
    pub score: Option<HandScore>,
    pub last_action: Option<ActionKind>,
    pub position: usize,
    pub inactivity_count: u8,
}

/// What a client is allowed to see of a [`GameState`].
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct GameView {
    pub room_id: RoomId,
    pub hand_id: Uuid,
    pub status: GameStatus,
    pub players: Vec<PlayerView>,
    pub waitlist: Vec<String>,
    pub pot: Usd,
    pub min_bet: Usd,
    pub dealer_index: usize,
    pub current_player_index: Option<usize>,
    pub current_bet: Usd,
    pub last_action_amount: Usd,
    pub round: u32,
    pub is_svara: bool,
    pub svara_participants: BTreeSet<PlayerId>,
    pub svara_confirmed: BTreeSet<PlayerId>,
    pub svara_declined: BTreeSet<PlayerId>,
    pub winners: Vec<Payout>,
    pub log: Vec<GameAction>,
    pub turn_start_time: Option<DateTime<Utc>>,
}
