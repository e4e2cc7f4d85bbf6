use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a service as seen by the orchestrator.
///
/// ```text
/// NotStarted ──► Starting ──► Running ──► Stopping ──► Stopped
///                                │
///                                ▼ (process gone, pid file left behind)
///                              Stale ──► Stopped
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceState {
    NotStarted,
    Starting,
    Running,
    Stopping,
    Stopped,
    Stale,
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceState::NotStarted => write!(f, "not started"),
            ServiceState::Starting => write!(f, "starting"),
            ServiceState::Running => write!(f, "running"),
            ServiceState::Stopping => write!(f, "stopping"),
            ServiceState::Stopped => write!(f, "stopped"),
            ServiceState::Stale => write!(f, "stale"),
        }
    }
}

impl ServiceState {
    /// Check if a state transition is valid according to the state machine.
    ///
    /// ```
    /// use service_provisioner::service::ServiceState;
    ///
    /// assert!(ServiceState::NotStarted.is_valid_transition(ServiceState::Starting));
    /// assert!(ServiceState::Running.is_valid_transition(ServiceState::Stale));
    /// assert!(!ServiceState::NotStarted.is_valid_transition(ServiceState::Running));
    /// ```
    pub fn is_valid_transition(&self, to: ServiceState) -> bool {
        use ServiceState::*;
        match (self, to) {
            (NotStarted | Stopped, Starting) => true,
            (Starting, Running) => true,
            // Launch failed before a pid was recorded
            (Starting, NotStarted) => true,
            (Running, Stopping) => true,
            (Running, Stale) => true,
            (Stopping, Stopped) => true,
            (Stale, Stopped) => true,
            (Stale, Starting) => true,
            (s1, s2) if *s1 == s2 => true,
            _ => false,
        }
    }
}

/// Record a transition in the trace log, flagging invalid ones.
pub(crate) fn transition(service: &str, from: ServiceState, to: ServiceState) {
    if from.is_valid_transition(to) {
        tracing::debug!(service = %service, "{} -> {}", from, to);
    } else {
        tracing::warn!(service = %service, "unexpected state transition {} -> {}", from, to);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ServiceState::*;

    #[test]
    fn happy_path_is_valid() {
        let path = [NotStarted, Starting, Running, Stopping, Stopped];
        for pair in path.windows(2) {
            assert!(pair[0].is_valid_transition(pair[1]), "{:?}", pair);
        }
    }

    #[test]
    fn stale_paths() {
        assert!(Running.is_valid_transition(Stale));
        assert!(Stale.is_valid_transition(Stopped));
        assert!(Stale.is_valid_transition(Starting));
        assert!(!Stale.is_valid_transition(Running));
    }

    #[test]
    fn skipping_states_is_invalid() {
        assert!(!NotStarted.is_valid_transition(Running));
        assert!(!Stopped.is_valid_transition(Running));
        assert!(!Starting.is_valid_transition(Stopped));
    }

    #[test]
    fn serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&NotStarted).unwrap(),
            "\"not_started\""
        );
    }
}
