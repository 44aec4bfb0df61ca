use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::event_bus::{BridgeEvent, EventBus};

/// Lifecycle of one worker session.
///
/// `Idle → Starting → Running → (WaitingForSecretPrompt?) → Running →
/// (QuestionOpen → Answered)* → Exiting → Draining → Closed`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Constructed, nothing spawned yet
    Idle,
    /// Spawning the worker
    Starting,
    /// Worker running, no question open
    Running,
    /// Elevated spawn waiting for the password prompt
    WaitingForSecretPrompt,
    /// A question is waiting for its answer
    QuestionOpen,
    /// The last question's answer was written
    Answered,
    /// The worker exited; reading what is left of its output
    Exiting,
    /// Waiting for in-flight line handlers before closing stdin
    Draining,
    /// Standard input closed and the result produced
    Closed,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Idle => "Idle",
            Self::Starting => "Starting",
            Self::Running => "Running",
            Self::WaitingForSecretPrompt => "WaitingForSecretPrompt",
            Self::QuestionOpen => "QuestionOpen",
            Self::Answered => "Answered",
            Self::Exiting => "Exiting",
            Self::Draining => "Draining",
            Self::Closed => "Closed",
        };
        write!(f, "{}", name)
    }
}

/// Current state of one session, publishing every transition
pub(crate) struct Lifecycle {
    session_id: Uuid,
    events: EventBus,
    state: Mutex<SessionState>,
}

impl Lifecycle {
    pub fn new(session_id: Uuid, events: EventBus) -> Self {
        Self {
            session_id,
            events,
            state: Mutex::new(SessionState::Idle),
        }
    }

    pub fn get(&self) -> SessionState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set(&self, next: SessionState) {
        {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            if *state == next {
                return;
            }
            debug!(session_id = %self.session_id, from = %*state, to = %next, "Session state");
            *state = next;
        }
        self.events.publish(BridgeEvent::SessionState {
            session_id: self.session_id,
            state: next,
        });
    }
}
