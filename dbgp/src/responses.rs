//! Typed responses parsed from the engine's `<response>` documents.
//!
//! Every parse runs the same document-level validation first: well-formed
//! XML, a DBGP namespace, and the `<error>` check. A response carrying an
//! `<error>` element always fails with the engine's code and message, so
//! no caller can mistake an engine error for a success.
use std::fmt;
use std::str::FromStr;

use crate::properties::ContextProperty;
use crate::Error;

pub(crate) const NS_PROTOCOL: &str = "urn:debugger_protocol_v1";
pub(crate) const NS_API: &str = "urn:debugger_api_v1";

/// Engine error code for "command not available".
const CODE_NOT_IMPLEMENTED: u32 = 4;

/// Execution status reported by the engine after a continuation command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Starting,
    Stopping,
    Stopped,
    Running,
    Break,
    Interactive,
}

impl FromStr for Status {
    type Err = Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s {
            "starting" => Ok(Self::Starting),
            "stopping" => Ok(Self::Stopping),
            "stopped" => Ok(Self::Stopped),
            "running" => Ok(Self::Running),
            "break" => Ok(Self::Break),
            "interactive" => Ok(Self::Interactive),
            other => Err(Error::Protocol(format!("unknown engine status {other:?}"))),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Starting => "starting",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
            Self::Running => "running",
            Self::Break => "break",
            Self::Interactive => "interactive",
        };
        f.write_str(name)
    }
}

/// Parse `raw`, run the shared validation, then hand the root element to
/// the per-response extractor.
pub(crate) fn with_response<T>(
    raw: &str,
    f: impl FnOnce(roxmltree::Node<'_, '_>) -> crate::Result<T>,
) -> crate::Result<T> {
    let doc = roxmltree::Document::parse(raw)
        .map_err(|e| Error::Protocol(format!("invalid response XML: {e}")))?;
    let root = doc.root_element();
    check_namespace(root)?;
    check_error(root)?;
    f(root)
}

fn check_namespace(root: roxmltree::Node<'_, '_>) -> crate::Result<()> {
    match root.tag_name().namespace() {
        Some(NS_PROTOCOL) | Some(NS_API) => Ok(()),
        _ => Err(Error::Protocol(
            "invalid or missing XML namespace".to_string(),
        )),
    }
}

fn check_error(root: roxmltree::Node<'_, '_>) -> crate::Result<()> {
    let Some(err_el) = root
        .children()
        .find(|n| n.is_element() && n.tag_name().name() == "error")
    else {
        return Ok(());
    };

    let code: u32 = err_el
        .attribute("code")
        .ok_or_else(|| Error::Protocol("missing error code in response".to_string()))?
        .parse()
        .map_err(|_| Error::Protocol("malformed error code in response".to_string()))?;
    if code == CODE_NOT_IMPLEMENTED {
        return Err(Error::CommandNotImplemented);
    }

    let message = err_el
        .children()
        .find(|n| n.is_element() && n.tag_name().name() == "message")
        .and_then(|n| n.text())
        .ok_or_else(|| Error::Protocol("missing error message in response".to_string()))?;
    Err(Error::Engine {
        code,
        message: message.trim().to_string(),
    })
}

/// Assert that the response carries the transaction ID we sent. A mismatch
/// is a fatal protocol violation: the protocol is strictly synchronous, so
/// there is never another transaction the response could belong to.
pub(crate) fn verify_transaction(raw: &str, expected: u32) -> crate::Result<()> {
    let doc = roxmltree::Document::parse(raw)
        .map_err(|e| Error::Protocol(format!("invalid response XML: {e}")))?;
    match doc.root_element().attribute("transaction_id") {
        Some(value) if value.trim().parse() == Ok(expected) => Ok(()),
        Some(value) => Err(Error::Protocol(format!(
            "transaction id mismatch: sent {expected}, received {value}"
        ))),
        None => Err(Error::Protocol(
            "response is missing a transaction id".to_string(),
        )),
    }
}

#[derive(Debug, Clone)]
pub struct StatusResponse {
    pub status: Status,
    pub reason: Option<String>,
}

impl StatusResponse {
    pub fn parse(raw: &str) -> crate::Result<Self> {
        with_response(raw, |root| {
            let status = root
                .attribute("status")
                .ok_or_else(|| Error::Protocol("response is missing a status".to_string()))?
                .parse()?;
            Ok(Self {
                status,
                reason: root.attribute("reason").map(str::to_string),
            })
        })
    }
}

#[derive(Debug, Clone)]
pub struct FeatureGetResponse {
    pub feature: String,
    pub supported: bool,
    pub value: String,
}

impl FeatureGetResponse {
    pub fn parse(raw: &str) -> crate::Result<Self> {
        with_response(raw, |root| {
            Ok(Self {
                feature: root.attribute("feature_name").unwrap_or_default().to_string(),
                supported: root.attribute("supported") == Some("1"),
                value: root.text().unwrap_or_default().trim().to_string(),
            })
        })
    }
}

#[derive(Debug, Clone)]
pub struct ContextName {
    pub id: u32,
    pub name: String,
}

/// The named variable scopes the engine exposes, e.g. "Locals"/"Superglobals".
#[derive(Debug, Clone)]
pub struct ContextNamesResponse {
    pub names: Vec<ContextName>,
}

impl ContextNamesResponse {
    pub fn parse(raw: &str) -> crate::Result<Self> {
        with_response(raw, |root| {
            let mut names = Vec::new();
            for node in root
                .children()
                .filter(|n| n.is_element() && n.tag_name().name() == "context")
            {
                let id = node
                    .attribute("id")
                    .and_then(|v| v.parse().ok())
                    .ok_or_else(|| {
                        Error::Protocol("context is missing a numeric id".to_string())
                    })?;
                let name = node.attribute("name").unwrap_or_default().to_string();
                names.push(ContextName { id, name });
            }
            Ok(Self { names })
        })
    }

    pub fn name_of(&self, id: u32) -> Option<&str> {
        self.names
            .iter()
            .find(|c| c.id == id)
            .map(|c| c.name.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct BreakpointSetResponse {
    /// The engine-assigned breakpoint ID, used for `breakpoint_remove`.
    pub id: String,
}

impl BreakpointSetResponse {
    pub fn parse(raw: &str) -> crate::Result<Self> {
        with_response(raw, |root| {
            let id = root
                .attribute("id")
                .ok_or_else(|| {
                    Error::Protocol("breakpoint_set response is missing an id".to_string())
                })?
                .to_string();
            Ok(Self { id })
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackFrame {
    pub level: u32,
    /// The engine's "where": the function name, or "main" for the
    /// outermost frame when the engine leaves it unset.
    pub function: String,
    /// Remote file URI, untranslated.
    pub filename: String,
    pub lineno: u32,
}

#[derive(Debug, Clone)]
pub struct StackGetResponse {
    frames: Vec<StackFrame>,
}

impl StackGetResponse {
    pub fn parse(raw: &str) -> crate::Result<Self> {
        with_response(raw, |root| {
            let mut frames = Vec::new();
            for node in root
                .children()
                .filter(|n| n.is_element() && n.tag_name().name() == "stack")
            {
                let level = node
                    .attribute("level")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(frames.len() as u32);
                let function = node
                    .attribute("where")
                    .filter(|w| !w.is_empty())
                    .unwrap_or("main")
                    .to_string();
                let filename = node
                    .attribute("filename")
                    .ok_or_else(|| {
                        Error::Protocol("stack frame is missing a filename".to_string())
                    })?
                    .to_string();
                let lineno = node
                    .attribute("lineno")
                    .and_then(|v| v.parse().ok())
                    .ok_or_else(|| {
                        Error::Protocol("stack frame is missing a line number".to_string())
                    })?;
                frames.push(StackFrame {
                    level,
                    function,
                    filename,
                    lineno,
                });
            }
            Ok(Self { frames })
        })
    }

    /// Frames ordered innermost first, matching the engine's ascending
    /// "level" numbering.
    pub fn get_stack(&self) -> &[StackFrame] {
        &self.frames
    }
}

/// Variables for one context, or the single property returned by
/// `property_get`/`eval`.
#[derive(Debug, Clone)]
pub struct ContextGetResponse {
    properties: Vec<ContextProperty>,
}

impl ContextGetResponse {
    pub fn parse(raw: &str) -> crate::Result<Self> {
        with_response(raw, |root| {
            let properties = root
                .children()
                .filter(|n| n.is_element() && n.tag_name().name() == "property")
                .map(|n| ContextProperty::from_node(n, 0))
                .collect();
            Ok(Self { properties })
        })
    }

    /// The ordered top-level properties; nested properties hang off their
    /// parents' `children`.
    pub fn get_context(&self) -> &[ContextProperty] {
        &self.properties
    }
}
