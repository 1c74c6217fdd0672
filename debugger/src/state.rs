use std::fmt;

/// Lifecycle of a debugging session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No connection and not listening.
    #[default]
    Idle,
    /// Waiting for an engine to connect.
    Listening,
    /// An engine is connected and paused.
    Connected,
    /// An engine is connected and executing.
    Running,
    /// The last session has ended.
    Ended,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Listening => "listening",
            Self::Connected => "connected",
            Self::Running => "running",
            Self::Ended => "ended",
        };
        f.write_str(name)
    }
}
