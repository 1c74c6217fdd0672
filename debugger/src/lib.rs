//! Editor-agnostic debugging core built on the [`dbgp`] protocol client.
//!
//! The [`Session`] runner owns the connection lifecycle and drives the
//! engine; the host editor plugs in through the [`Ui`] trait and receives
//! pre-rendered stack and variable listings from [`render`].
pub mod breakpoint;
pub mod config;
mod error;
pub mod path;
pub mod render;
mod session;
mod state;
pub mod testing;
mod ui;

pub use breakpoint::{Breakpoint, BreakpointKind, BreakpointStore};
pub use config::{OnClose, Options};
pub use error::{Error, Result};
pub use path::{FilePath, PathMap};
pub use session::Session;
pub use state::SessionState;
pub use ui::Ui;
