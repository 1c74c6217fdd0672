/// Error taxonomy for the protocol and transport tiers.
///
/// `Timeout`, `Interrupted` and `ConnectionClosed` are expected during
/// normal operation and are reported as informational messages by the
/// session layer. `Protocol` means the engine violated the wire protocol
/// and the session cannot continue.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("timed out waiting for a debugger connection")]
    Timeout,

    #[error("interrupted while waiting for a debugger connection")]
    Interrupted,

    #[error("the connection to the debugger engine has been closed")]
    ConnectionClosed,

    #[error("protocol error: {0}")]
    Protocol(String),

    /// The engine replied with an `<error>` element.
    #[error("debugger engine error {code}: {message}")]
    Engine { code: u32, message: String },

    /// Engine error code 4: the command is not supported by this engine.
    #[error("command is not implemented by the debugger engine")]
    CommandNotImplemented,

    /// I/O failure while setting up the listening socket.
    #[error("socket error: {0}")]
    Io(#[from] std::io::Error),
}
