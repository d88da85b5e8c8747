use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of a voice session
///
/// `idle -> connecting -> active -> (idle | error)`. `error` is terminal
/// until the user starts again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    #[default]
    Idle,
    Connecting,
    Active,
    Error,
}

impl SessionState {
    /// A session exists (owns devices and a channel)
    pub fn is_open(&self) -> bool {
        matches!(self, SessionState::Connecting | SessionState::Active)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Connecting => "connecting",
            SessionState::Active => "active",
            SessionState::Error => "error",
        };
        f.write_str(name)
    }
}
