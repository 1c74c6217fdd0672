use thiserror::Error;

/// Everything that can go wrong while debugging: protocol and transport
/// failures bubble up from [`dbgp`], the rest is invalid user input.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Dbgp(#[from] dbgp::Error),

    /// Invalid breakpoint input, e.g. an unknown type or a missing
    /// argument.
    #[error("{0}")]
    Breakpoint(String),

    /// A file path that cannot be translated, e.g. an empty one.
    #[error("{0}")]
    FilePath(String),
}

pub type Result<T> = std::result::Result<T, Error>;
