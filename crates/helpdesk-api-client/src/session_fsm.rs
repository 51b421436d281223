//! Session state machine using rust-fsm.
//!
//! An observable view of the session for the application shell. The
//! refresh gate, not this machine, decides whether a refresh may start.
//!
//! ```text
//!               CredentialsStored / SessionRestored
//! ┌───────────┐ ─────────────────────────────────► ┌───────────┐
//! │ SignedOut │                                    │ SignedIn  │
//! └───────────┘ ◄───────────────────────────────── └───────────┘
//!     ▲  │        LogoutRequested / SessionEnded       │   ▲
//!     │  │ AccessRejected               AccessRejected │   │ RefreshSucceeded
//!     │  ▼                                             ▼   │
//!     │ ┌────────────────────────────────────────────────────┐
//!     └─┤                     Refreshing                     │
//!       └────────────────────────────────────────────────────┘
//!        RefreshFailed / LogoutRequested
//! ```

use rust_fsm::*;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tracing::debug;

state_machine! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub session_machine(SignedOut)

    SignedOut => {
        CredentialsStored => SignedIn,
        SessionRestored => SignedIn,
        // A refresh credential can outlive the access credential
        AccessRejected => Refreshing,
        LogoutRequested => SignedOut
    },
    SignedIn => {
        CredentialsStored => SignedIn,
        AccessRejected => Refreshing,
        SessionEnded => SignedOut,
        LogoutRequested => SignedOut
    },
    Refreshing => {
        RefreshSucceeded => SignedIn,
        // A new login or another process replaced the session mid-refresh
        CredentialsStored => SignedIn,
        SessionRestored => SignedIn,
        RefreshFailed => SignedOut,
        LogoutRequested => SignedOut
    }
}

pub use session_machine::Input as SessionMachineInput;
pub use session_machine::State as SessionMachineState;
pub use session_machine::StateMachine as SessionMachine;

/// Session state for external consumption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    SignedOut,
    SignedIn,
    Refreshing,
}

impl SessionState {
    /// True while requests can be authenticated (possibly after a refresh).
    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionState::SignedIn | SessionState::Refreshing)
    }
}

impl From<&SessionMachineState> for SessionState {
    fn from(state: &SessionMachineState) -> Self {
        match state {
            SessionMachineState::SignedOut => SessionState::SignedOut,
            SessionMachineState::SignedIn => SessionState::SignedIn,
            SessionMachineState::Refreshing => SessionState::Refreshing,
        }
    }
}

/// Payload for session state change notifications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStateChanged {
    pub previous: SessionState,
    pub state: SessionState,
}

/// Callback type for session state change notifications.
pub type SessionStateCallback = Arc<dyn Fn(SessionStateChanged) + Send + Sync>;

/// Thread-safe wrapper that drives the machine and notifies a listener.
pub(crate) struct SessionTracker {
    fsm: Mutex<SessionMachine>,
    callback: Mutex<Option<SessionStateCallback>>,
}

impl SessionTracker {
    pub(crate) fn new() -> Self {
        Self {
            fsm: Mutex::new(SessionMachine::new()),
            callback: Mutex::new(None),
        }
    }

    pub(crate) fn set_callback(&self, callback: SessionStateCallback) {
        let mut cb = self.callback.lock().unwrap();
        *cb = Some(callback);
    }

    pub(crate) fn state(&self) -> SessionState {
        let fsm = self.fsm.lock().unwrap();
        SessionState::from(fsm.state())
    }

    /// Apply an input. Impossible transitions are ignored (for example a
    /// refresh settling after an explicit logout) and leave the state as is.
    pub(crate) fn transition(&self, input: SessionMachineInput) -> SessionState {
        let mut fsm = self.fsm.lock().unwrap();
        let previous = SessionState::from(fsm.state());

        if fsm.consume(&input).is_err() {
            debug!(state = ?previous, input = ?input, "Ignoring session transition");
            return previous;
        }

        let state = SessionState::from(fsm.state());
        drop(fsm);

        if previous != state {
            debug!(previous = ?previous, state = ?state, "Session state transition");
            // Invoked outside the lock so the callback may replace itself.
            let callback = self.callback.lock().unwrap().clone();
            if let Some(callback) = callback {
                callback(SessionStateChanged { previous, state });
            }
        }

        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_initial_state_is_signed_out() {
        let machine = SessionMachine::new();
        assert_eq!(*machine.state(), SessionMachineState::SignedOut);
    }

    #[test]
    fn test_refresh_success_flow() {
        let mut machine = SessionMachine::new();

        machine.consume(&SessionMachineInput::CredentialsStored).unwrap();
        machine.consume(&SessionMachineInput::AccessRejected).unwrap();
        assert_eq!(*machine.state(), SessionMachineState::Refreshing);

        machine.consume(&SessionMachineInput::RefreshSucceeded).unwrap();
        assert_eq!(*machine.state(), SessionMachineState::SignedIn);
    }

    #[test]
    fn test_refresh_failure_signs_out() {
        let mut machine = SessionMachine::new();

        machine.consume(&SessionMachineInput::SessionRestored).unwrap();
        machine.consume(&SessionMachineInput::AccessRejected).unwrap();
        machine.consume(&SessionMachineInput::RefreshFailed).unwrap();
        assert_eq!(*machine.state(), SessionMachineState::SignedOut);
    }

    #[test]
    fn test_cannot_settle_refresh_that_never_started() {
        let mut machine = SessionMachine::new();
        machine.consume(&SessionMachineInput::CredentialsStored).unwrap();

        assert!(machine.consume(&SessionMachineInput::RefreshSucceeded).is_err());
        assert_eq!(*machine.state(), SessionMachineState::SignedIn);
    }

    #[test]
    fn test_tracker_ignores_late_refresh_after_logout() {
        let tracker = SessionTracker::new();
        tracker.transition(SessionMachineInput::CredentialsStored);
        tracker.transition(SessionMachineInput::AccessRejected);
        tracker.transition(SessionMachineInput::LogoutRequested);

        let state = tracker.transition(SessionMachineInput::RefreshSucceeded);
        assert_eq!(state, SessionState::SignedOut);
    }

    #[test]
    fn test_callback_invoked_only_on_change() {
        let tracker = SessionTracker::new();
        let changes = Arc::new(AtomicUsize::new(0));
        let changes_clone = changes.clone();

        tracker.set_callback(Arc::new(move |_payload| {
            changes_clone.fetch_add(1, Ordering::SeqCst);
        }));

        tracker.transition(SessionMachineInput::CredentialsStored);
        // Self-transition: no notification
        tracker.transition(SessionMachineInput::CredentialsStored);
        tracker.transition(SessionMachineInput::LogoutRequested);

        assert_eq!(changes.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_callback_can_replace_itself() {
        let tracker = Arc::new(SessionTracker::new());
        let replaced = Arc::new(AtomicUsize::new(0));

        let weak = Arc::downgrade(&tracker);
        let replaced_clone = replaced.clone();
        tracker.set_callback(Arc::new(move |_payload| {
            let replaced = replaced_clone.clone();
            if let Some(tracker) = weak.upgrade() {
                tracker.set_callback(Arc::new(move |_payload| {
                    replaced.fetch_add(1, Ordering::SeqCst);
                }));
            }
        }));

        tracker.transition(SessionMachineInput::CredentialsStored);
        tracker.transition(SessionMachineInput::LogoutRequested);

        assert_eq!(replaced.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_login_during_refresh_signs_in() {
        let tracker = SessionTracker::new();
        tracker.transition(SessionMachineInput::SessionRestored);
        tracker.transition(SessionMachineInput::AccessRejected);

        let state = tracker.transition(SessionMachineInput::CredentialsStored);
        assert_eq!(state, SessionState::SignedIn);
        // The stale refresh settling afterwards changes nothing.
        assert_eq!(
            tracker.transition(SessionMachineInput::RefreshFailed),
            SessionState::SignedIn
        );
    }

    #[test]
    fn test_state_is_authenticated() {
        assert!(SessionState::SignedIn.is_authenticated());
        assert!(SessionState::Refreshing.is_authenticated());
        assert!(!SessionState::SignedOut.is_authenticated());
    }
}
