//! Per-room timer. A room has at most one pending deadline at a time: a
//! player's turn, the svara decision window, the showdown reveal or the
//! restart after a finished hand.

use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::time::{Instant, sleep_until};

use crate::game::entities::PlayerId;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TimerKind {
    Turn(PlayerId),
    SvaraDecision,
    Reveal,
    Restart,
}

#[derive(Clone, Copy, Debug)]
struct Armed {
    kind: TimerKind,
    /// Game timestamp the timer was armed for. A new stamp with the same
    /// kind still means a new deadline.
    stamp: Option<DateTime<Utc>>,
    deadline: Instant,
}

#[derive(Debug, Default)]
pub struct TurnScheduler {
    armed: Option<Armed>,
}

impl TurnScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm a timer, replacing whatever was armed before.
    pub fn arm(&mut self, kind: TimerKind, stamp: Option<DateTime<Utc>>, after: Duration) {
        self.armed = Some(Armed {
            kind,
            stamp,
            deadline: Instant::now() + after,
        });
    }

    pub fn clear(&mut self) {
        self.armed = None;
    }

    pub fn armed(&self) -> Option<TimerKind> {
        self.armed.map(|a| a.kind)
    }

    pub fn is_armed_for(&self, kind: TimerKind, stamp: Option<DateTime<Utc>>) -> bool {
        self.armed
            .is_some_and(|a| a.kind == kind && a.stamp == stamp)
    }

    pub fn remaining(&self) -> Option<Duration> {
        self.armed
            .map(|a| a.deadline.saturating_duration_since(Instant::now()))
    }

    /// Resolves when the armed deadline passes. Never resolves while nothing
    /// is armed. The caller clears the timer once it has fired.
    pub async fn fired(&self) -> TimerKind {
        match self.armed {
            Some(armed) => {
                sleep_until(armed.deadline).await;
                armed.kind
            }
            None => std::future::pending().await,
        }
    }
}
