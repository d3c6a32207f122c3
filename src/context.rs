//! Cooperative cancellation for bucket operations
//!
//! A [`CancellationSource`] hands out [`CancellationToken`]s and can cancel
//! all of them at once. Tokens may also carry a deadline. Bucket operations
//! check their token before touching storage, and `put` re-checks between
//! copied chunks.

use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::{Error, Result};

/// Why an operation was cancelled
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancellationReason {
    /// Caller asked for cancellation
    UserCancel,
    /// The token's deadline passed
    DeadlineExceeded,
    /// Custom reason with description
    Custom(String),
}

impl fmt::Display for CancellationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancellationReason::UserCancel => write!(f, "user cancelled"),
            CancellationReason::DeadlineExceeded => write!(f, "deadline exceeded"),
            CancellationReason::Custom(msg) => write!(f, "{}", msg),
        }
    }
}

type SharedState = Arc<Mutex<Option<CancellationReason>>>;

/// A cloneable handle checked by operations that can be cancelled
#[derive(Debug, Clone)]
pub struct CancellationToken {
    state: SharedState,
    deadline: Option<Instant>,
}

impl CancellationToken {
    /// A token that is never cancelled and has no deadline
    pub fn none() -> Self {
        CancellationToken {
            state: Arc::new(Mutex::new(None)),
            deadline: None,
        }
    }

    /// Same cancellation state, with a deadline at `deadline`
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(existing) if existing < deadline => existing,
            _ => deadline,
        };
        CancellationToken {
            state: Arc::clone(&self.state),
            deadline: Some(deadline),
        }
    }

    /// Same cancellation state, expiring `timeout` from now
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// The reason for cancellation, if cancelled or past the deadline
    pub fn reason(&self) -> Option<CancellationReason> {
        if let Some(reason) = self.state.lock().clone() {
            return Some(reason);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => {
                Some(CancellationReason::DeadlineExceeded)
            }
            _ => None,
        }
    }

    /// Checks if cancellation has been requested or the deadline has passed
    pub fn is_cancelled(&self) -> bool {
        self.reason().is_some()
    }

    /// Fail with [`Error::Cancelled`] if cancelled
    pub fn check(&self) -> Result<()> {
        match self.reason() {
            Some(reason) => Err(Error::Cancelled(reason)),
            None => Ok(()),
        }
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::none()
    }
}

/// Creates tokens and cancels them all at once
#[derive(Debug, Clone)]
pub struct CancellationSource {
    state: SharedState,
}

impl CancellationSource {
    pub fn new() -> Self {
        CancellationSource {
            state: Arc::new(Mutex::new(None)),
        }
    }

    /// A token observing this source
    pub fn token(&self) -> CancellationToken {
        CancellationToken {
            state: Arc::clone(&self.state),
            deadline: None,
        }
    }

    /// Cancel every token from this source. The first reason wins.
    pub fn cancel(&self, reason: CancellationReason) {
        let mut state = self.state.lock();
        if state.is_none() {
            *state = Some(reason);
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.lock().is_some()
    }
}

impl Default for CancellationSource {
    fn default() -> Self {
        Self::new()
    }
}
