//! Session lifecycle: states, events, and promotion outcomes.

use std::fmt;

use crate::error::StreamError;

/// Lifecycle state of an append-stream session.
///
/// ```text
/// Initializing --(truncation ok)--> Ready
/// Ready --(write)--> Writing --(append ok)--> Writing
/// Ready | Writing --(finish)--> Finishing --(promotion ok)--> Closed
/// any non-terminal --(failure or abort)--> Errored
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Truncation of the staging key has been dispatched but not observed.
    Initializing,
    /// Staging key truncated; no chunk appended yet.
    Ready,
    /// At least one chunk has been submitted.
    Writing,
    /// All appends acknowledged; promotion in progress.
    Finishing,
    /// Promotion succeeded or was enqueued. Terminal.
    Closed,
    /// A store call failed or the producer aborted. Terminal.
    Errored,
}

impl SessionState {
    /// Returns `true` for `Closed` and `Errored`.
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Closed | SessionState::Errored)
    }

    /// Whether the session may move from `self` to `next`.
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        match (self, next) {
            (Initializing, Ready) => true,
            (Ready, Writing) | (Writing, Writing) => true,
            (Ready, Finishing) | (Writing, Finishing) => true,
            (Finishing, Closed) => true,
            (from, Errored) => !from.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Initializing => "initializing",
            SessionState::Ready => "ready",
            SessionState::Writing => "writing",
            SessionState::Finishing => "finishing",
            SessionState::Closed => "closed",
            SessionState::Errored => "errored",
        };
        f.write_str(name)
    }
}

/// How the staged data reached (or will reach) the public key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Promotion {
    /// The rename was executed and acknowledged by the store.
    Renamed,
    /// The rename was queued into the caller's batch; it takes effect when
    /// the caller commits that batch.
    Enqueued,
}

impl fmt::Display for Promotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Promotion::Renamed => f.write_str("renamed"),
            Promotion::Enqueued => f.write_str("enqueued"),
        }
    }
}

/// Notifications broadcast to session subscribers.
#[derive(Clone, Debug)]
pub enum SessionEvent {
    /// The staging key was truncated.
    Ready,
    /// A chunk was acknowledged by the store.
    Appended { len: usize, total: u64 },
    /// Promotion completed. Sent at most once per session.
    Finished(Promotion),
    /// The session entered `Errored`. Sent at most once per session.
    Failed(StreamError),
}

/// Counters for data acknowledged by the store.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Chunks appended.
    pub chunks: u64,
    /// Bytes appended.
    pub bytes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use SessionState::*;

    #[test]
    fn documented_edges_are_allowed() {
        assert!(Initializing.can_transition_to(Ready));
        assert!(Initializing.can_transition_to(Errored));
        assert!(Ready.can_transition_to(Writing));
        assert!(Writing.can_transition_to(Writing));
        assert!(Writing.can_transition_to(Finishing));
        assert!(Ready.can_transition_to(Finishing));
        assert!(Writing.can_transition_to(Errored));
        assert!(Finishing.can_transition_to(Closed));
        assert!(Finishing.can_transition_to(Errored));
    }

    #[test]
    fn terminal_states_are_final() {
        for next in [Initializing, Ready, Writing, Finishing, Closed, Errored] {
            assert!(!Closed.can_transition_to(next));
            assert!(!Errored.can_transition_to(next));
        }
    }

    #[test]
    fn no_shortcuts() {
        assert!(!Initializing.can_transition_to(Writing));
        assert!(!Initializing.can_transition_to(Closed));
        assert!(!Writing.can_transition_to(Closed));
        assert!(!Finishing.can_transition_to(Writing));
    }

    #[test]
    fn display_names() {
        assert_eq!(Finishing.to_string(), "finishing");
        assert_eq!(Promotion::Enqueued.to_string(), "enqueued");
    }
}
