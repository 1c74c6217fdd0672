//! User-facing configuration, deserialized from the host editor's
//! settings.
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// What to send the engine when the user closes a live session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnClose {
    /// Let the script run to completion.
    Detach,
    /// Terminate the script.
    Stop,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Address to listen on; empty means all interfaces.
    pub server: String,
    pub port: u16,
    /// Seconds to wait for an engine to connect.
    pub timeout: u64,
    /// When non-empty, only engines announcing this IDE key are accepted.
    pub ide_key: String,
    pub on_close: OnClose,
    /// Listen again as soon as a session ends.
    pub continuous_mode: bool,
    /// Break on the first statement instead of running to the first
    /// breakpoint.
    pub break_on_open: bool,
    /// Remote path prefix to local path prefix.
    pub path_maps: BTreeMap<String, String>,
    /// Engine features applied best-effort at session start, e.g.
    /// `max_depth` or `max_children`.
    pub features: BTreeMap<String, String>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            server: String::new(),
            port: dbgp::DEFAULT_DBGP_PORT,
            timeout: 30,
            ide_key: String::new(),
            on_close: OnClose::Detach,
            continuous_mode: false,
            break_on_open: true,
            path_maps: BTreeMap::new(),
            features: BTreeMap::new(),
        }
    }
}

impl Options {
    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }
}
