use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SessionState {
    Uninitialized,
    Initializing,
    Active,
    Suspended,
    Disposed,
}

impl Default for SessionState {
    fn default() -> Self {
        SessionState::Uninitialized
    }
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Uninitialized => "uninitialized",
            SessionState::Initializing => "initializing",
            SessionState::Active => "active",
            SessionState::Suspended => "suspended",
            SessionState::Disposed => "disposed",
        }
    }

    /// Recognition events only reach the ledger while active.
    pub fn accepts_events(&self) -> bool {
        matches!(self, SessionState::Active)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Disposed)
    }

    /// Transition table. `None` means the trigger is illegal in this state.
    pub fn next(self, trigger: SessionTrigger) -> Option<SessionState> {
        use SessionState::*;
        use SessionTrigger::*;

        match (self, trigger) {
            (Uninitialized, Start) => Some(Initializing),
            (Initializing, InitSucceeded) => Some(Active),
            (Initializing, InitFailed) => Some(Disposed),
            (Active, Hidden) => Some(Suspended),
            (Suspended, Visible) => Some(Active),
            (Active | Suspended, Teardown) => Some(Disposed),
            // Nothing was acquired yet.
            (Uninitialized, Teardown) => Some(Disposed),
            _ => None,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionTrigger {
    Start,
    InitSucceeded,
    InitFailed,
    Hidden,
    Visible,
    Teardown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("illegal session transition: {trigger:?} while {from}")]
pub struct TransitionError {
    pub from: SessionState,
    pub trigger: SessionTrigger,
}

/// Everything the session controller tracks besides the adapter itself.
#[derive(Debug, Clone)]
pub struct Lifecycle {
    pub state: SessionState,
    pub session_id: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    /// Latest visibility reported by the host, even while a lifecycle call
    /// is pending. Reconciled once the adapter is free again.
    pub visible: bool,
    /// Set as soon as teardown is requested so a pending initialize
    /// disposes instead of activating.
    pub teardown_requested: bool,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self {
            state: SessionState::Uninitialized,
            session_id: None,
            started_at: None,
            visible: true,
            teardown_requested: false,
        }
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, trigger: SessionTrigger) -> Result<SessionState, TransitionError> {
        let next = self.state.next(trigger).ok_or(TransitionError {
            from: self.state,
            trigger,
        })?;
        self.state = next;
        Ok(next)
    }

    pub fn begin(&mut self, session_id: String, started_at: DateTime<Utc>) -> Result<(), TransitionError> {
        self.apply(SessionTrigger::Start)?;
        self.session_id = Some(session_id);
        self.started_at = Some(started_at);
        Ok(())
    }

    pub fn session_label(&self) -> &str {
        self.session_id.as_deref().unwrap_or("-")
    }
}
