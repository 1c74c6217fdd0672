use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use base64::Engine;

use crate::responses::{
    self, BreakpointSetResponse, ContextGetResponse, ContextNamesResponse, FeatureGetResponse,
    StackGetResponse, StatusResponse,
};
use crate::{Connection, Error};

/// Details the engine declares in its unsolicited `<init>` handshake.
#[derive(Debug, Clone)]
pub struct Init {
    /// Engine language, lower-cased (e.g. "php").
    pub language: String,
    pub protocol_version: String,
    pub ide_key: String,
    /// URI of the script the engine started in, when declared.
    pub file_uri: Option<String>,
}

impl Init {
    fn parse(raw: &str) -> crate::Result<Self> {
        let doc = roxmltree::Document::parse(raw)
            .map_err(|e| Error::Protocol(format!("invalid init XML: {e}")))?;
        let root = doc.root_element();
        if root.tag_name().name() != "init" {
            return Err(Error::Protocol(format!(
                "expected an <init> handshake, got <{}>",
                root.tag_name().name()
            )));
        }
        let language = root
            .attribute("language")
            .ok_or_else(|| {
                Error::Protocol("init message does not declare a language".to_string())
            })?
            .to_lowercase();
        Ok(Self {
            language,
            protocol_version: root
                .attribute("protocol_version")
                .unwrap_or_default()
                .to_string(),
            ide_key: root.attribute("idekey").unwrap_or_default().to_string(),
            file_uri: root.attribute("fileuri").map(str::to_string),
        })
    }
}

struct ClientInternals {
    conn: Connection,
    next_transaction: u32,
}

/// The protocol API: builds commands, assigns transaction IDs and parses
/// the engine's replies into the typed responses.
///
/// `Client` is a clonable handle around the single connection, so the
/// session runner and the breakpoint store can share it without either
/// owning the connection twice. The protocol is strictly synchronous: the
/// internal lock is held for the whole send/receive round trip, so at most
/// one transaction is ever in flight.
#[derive(Clone)]
pub struct Client {
    internals: Arc<Mutex<ClientInternals>>,
    init: Arc<Init>,
    peer: SocketAddr,
}

impl Client {
    /// Consume a freshly accepted connection, reading and validating the
    /// engine's `<init>` handshake.
    pub fn new(mut conn: Connection) -> crate::Result<Self> {
        let raw = conn.receive_message()?;
        let init = Init::parse(&raw)?;
        tracing::debug!(language = %init.language, idekey = %init.ide_key, "engine init received");
        let peer = conn.peer_addr();
        Ok(Self {
            internals: Arc::new(Mutex::new(ClientInternals {
                conn,
                next_transaction: 1,
            })),
            init: Arc::new(init),
            peer,
        })
    }

    pub fn init(&self) -> &Init {
        &self.init
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Cheap, non-failing liveness check.
    pub fn is_connected(&self) -> bool {
        self.internals
            .lock()
            .map(|i| i.conn.is_connected())
            .unwrap_or(false)
    }

    pub fn close(&self) {
        if let Ok(mut internals) = self.internals.lock() {
            internals.conn.close();
        }
    }

    /// One full round trip: allocate the next transaction ID, send the
    /// command, block for the reply and assert the reply carries our ID.
    fn send_command(&self, command: &str, args: &str) -> crate::Result<String> {
        let mut internals = self.internals.lock().unwrap();
        let transaction = internals.next_transaction;
        internals.next_transaction += 1;

        let mut line = format!("{command} -i {transaction}");
        let args = args.trim();
        if !args.is_empty() {
            line.push(' ');
            line.push_str(args);
        }

        tracing::debug!(command = %line, "sending command");
        internals.conn.send_command(&line)?;
        let raw = internals.conn.receive_message()?;
        tracing::debug!(response = %raw, "received response");

        responses::verify_transaction(&raw, transaction)?;
        Ok(raw)
    }

    pub fn status(&self) -> crate::Result<StatusResponse> {
        StatusResponse::parse(&self.send_command("status", "")?)
    }

    /// Start or resume execution.
    pub fn run(&self) -> crate::Result<StatusResponse> {
        StatusResponse::parse(&self.send_command("run", "")?)
    }

    /// Step to the next statement, descending into function calls.
    pub fn step_into(&self) -> crate::Result<StatusResponse> {
        StatusResponse::parse(&self.send_command("step_into", "")?)
    }

    /// Step to the next statement in the current scope.
    pub fn step_over(&self) -> crate::Result<StatusResponse> {
        StatusResponse::parse(&self.send_command("step_over", "")?)
    }

    /// Step out of the current scope.
    pub fn step_out(&self) -> crate::Result<StatusResponse> {
        StatusResponse::parse(&self.send_command("step_out", "")?)
    }

    /// Terminate the script immediately.
    pub fn stop(&self) -> crate::Result<StatusResponse> {
        StatusResponse::parse(&self.send_command("stop", "")?)
    }

    /// Detach from the engine, letting the script run to completion. The
    /// connection is closed once the engine acknowledges.
    pub fn detach(&self) -> crate::Result<StatusResponse> {
        let raw = self.send_command("detach", "")?;
        let response = StatusResponse::parse(&raw)?;
        self.close();
        Ok(response)
    }

    pub fn feature_get(&self, name: &str) -> crate::Result<FeatureGetResponse> {
        FeatureGetResponse::parse(&self.send_command("feature_get", &format!("-n {name}"))?)
    }

    pub fn feature_set(&self, name: &str, value: &str) -> crate::Result<()> {
        let raw = self.send_command("feature_set", &format!("-n {name} -v {value}"))?;
        responses::with_response(&raw, |_| Ok(()))
    }

    pub fn stack_get(&self) -> crate::Result<StackGetResponse> {
        StackGetResponse::parse(&self.send_command("stack_get", "")?)
    }

    pub fn context_names(&self) -> crate::Result<ContextNamesResponse> {
        ContextNamesResponse::parse(&self.send_command("context_names", "")?)
    }

    pub fn context_get(&self, context: u32) -> crate::Result<ContextGetResponse> {
        ContextGetResponse::parse(&self.send_command("context_get", &format!("-c {context}"))?)
    }

    /// Fetch one property (and its children) by full name; the lazy half
    /// of child expansion when the engine paged children out of a
    /// `context_get` reply.
    pub fn property_get(&self, name: &str) -> crate::Result<ContextGetResponse> {
        ContextGetResponse::parse(&self.send_command("property_get", &format!("-n {name} -d 0"))?)
    }

    pub fn eval(&self, code: &str) -> crate::Result<ContextGetResponse> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(code);
        ContextGetResponse::parse(&self.send_command("eval", &format!("-- {encoded}"))?)
    }

    /// Register a breakpoint; `cmd_args` comes from the breakpoint's own
    /// command construction.
    pub fn breakpoint_set(&self, cmd_args: &str) -> crate::Result<BreakpointSetResponse> {
        BreakpointSetResponse::parse(&self.send_command("breakpoint_set", cmd_args)?)
    }

    /// Unregister a breakpoint by the engine-assigned ID.
    pub fn breakpoint_remove(&self, id: &str) -> crate::Result<()> {
        let raw = self.send_command("breakpoint_remove", &format!("-d {id}"))?;
        responses::with_response(&raw, |_| Ok(()))
    }
}
