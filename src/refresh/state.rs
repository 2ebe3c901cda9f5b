//! Refresh loop state machine and shared status.
//!
//! # State Transitions
//! ```text
//! Idle → Fetching: poll interval elapsed or manual trigger
//! Fetching → Applying: service returned a new snapshot
//! Fetching → Idle: service reported no change
//! Fetching → Backoff: fetch failed
//! Applying → Idle: snapshot swapped, subscribers notified
//! Backoff → Fetching: retry delay elapsed
//! Idle | Backoff → Stopped: shutdown signal
//! ```

use std::sync::atomic::{AtomicU32, AtomicU64, AtomicU8, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Serialize;

/// Refresh loop state.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshState {
    Idle = 0,
    Fetching = 1,
    Applying = 2,
    Backoff = 3,
    Stopped = 4,
}

impl From<u8> for RefreshState {
    fn from(val: u8) -> Self {
        match val {
            1 => RefreshState::Fetching,
            2 => RefreshState::Applying,
            3 => RefreshState::Backoff,
            4 => RefreshState::Stopped,
            _ => RefreshState::Idle,
        }
    }
}

/// Status shared between the refresh loop and its observers (admin API, tests).
#[derive(Debug)]
pub struct SchedulerStatus {
    state: AtomicU8,
    consecutive_failures: AtomicU32,
    current_backoff_ms: AtomicU64,
    last_success_unix: AtomicU64,
    last_error: Mutex<Option<String>>,
}

/// Serializable point-in-time copy of [`SchedulerStatus`].
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub state: RefreshState,
    pub consecutive_failures: u32,
    pub current_backoff_ms: u64,
    /// Seconds since the epoch of the last successful fetch, if any.
    pub last_success_unix: Option<u64>,
    pub last_error: Option<String>,
}

impl SchedulerStatus {
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(RefreshState::Idle as u8),
            consecutive_failures: AtomicU32::new(0),
            current_backoff_ms: AtomicU64::new(0),
            last_success_unix: AtomicU64::new(0),
            last_error: Mutex::new(None),
        }
    }

    pub fn state(&self) -> RefreshState {
        RefreshState::from(self.state.load(Ordering::Acquire))
    }

    pub(crate) fn set_state(&self, state: RefreshState) {
        let previous = RefreshState::from(self.state.swap(state as u8, Ordering::AcqRel));
        if previous != state {
            tracing::trace!(from = ?previous, to = ?state, "Refresh state transition");
        }
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures.load(Ordering::Acquire)
    }

    pub fn current_backoff(&self) -> Duration {
        Duration::from_millis(self.current_backoff_ms.load(Ordering::Acquire))
    }

    pub fn last_error(&self) -> Option<String> {
        self.last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Record a failure; returns the new consecutive failure count.
    pub(crate) fn record_failure(&self, error: String) -> u32 {
        *self.last_error.lock().unwrap_or_else(PoisonError::into_inner) = Some(error);
        self.consecutive_failures.fetch_add(1, Ordering::AcqRel).saturating_add(1)
    }

    pub(crate) fn set_backoff(&self, delay: Duration) {
        let ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self.current_backoff_ms.store(ms, Ordering::Release);
    }

    pub(crate) fn record_success(&self) {
        self.consecutive_failures.store(0, Ordering::Release);
        self.current_backoff_ms.store(0, Ordering::Release);
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        self.last_success_unix.store(now, Ordering::Release);
        *self.last_error.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn report(&self) -> StatusReport {
        let last_success = self.last_success_unix.load(Ordering::Acquire);
        StatusReport {
            state: self.state(),
            consecutive_failures: self.consecutive_failures(),
            current_backoff_ms: self.current_backoff_ms.load(Ordering::Acquire),
            last_success_unix: (last_success > 0).then_some(last_success),
            last_error: self.last_error(),
        }
    }
}

impl Default for SchedulerStatus {
    fn default() -> Self {
        Self::new()
    }
}
