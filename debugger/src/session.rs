//! The session runner: owns the connection lifecycle and turns user
//! commands into protocol round trips and UI updates.
use std::time::Duration;

use dbgp::responses::{ContextNamesResponse, Status};
use dbgp::{CancelToken, Client, Connection};

use crate::breakpoint::{Breakpoint, BreakpointKind, BreakpointStore};
use crate::config::{OnClose, Options};
use crate::path::{FilePath, PathMap};
use crate::render;
use crate::state::SessionState;
use crate::ui::Ui;
use crate::Error;

pub struct Session<U> {
    ui: U,
    options: Options,
    path_map: PathMap,
    store: BreakpointStore,
    client: Option<Client>,
    context_names: Option<ContextNamesResponse>,
    /// Expression re-evaluated on every refresh until cleared.
    saved_eval: Option<String>,
    state: SessionState,
    cancel: CancelToken,
}

impl<U: Ui> Session<U> {
    pub fn new(ui: U, options: Options) -> Self {
        let path_map = PathMap::new(&options.path_maps);
        Self {
            ui,
            options,
            path_map,
            store: BreakpointStore::new(),
            client: None,
            context_names: None,
            saved_eval: None,
            state: SessionState::Idle,
            cancel: CancelToken::new(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.client.as_ref().is_some_and(Client::is_connected)
    }

    pub fn ui(&self) -> &U {
        &self.ui
    }

    pub fn ui_mut(&mut self) -> &mut U {
        &mut self.ui
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn breakpoints(&self) -> Vec<&Breakpoint> {
        self.store.get_sorted_list()
    }

    /// A token that aborts a pending [`Session::open`] from another
    /// thread.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    // Public commands. Each wraps a fallible body; every error funnels
    // through the one dispatch in `report`.

    /// Wait for an engine and bring the session up.
    pub fn open(&mut self) {
        if self.is_connected() {
            self.ui.say("A debugger session is already active");
            return;
        }
        if let Err(e) = self.try_open() {
            self.report(e);
        }
    }

    pub fn run(&mut self) {
        self.continuation(|c| c.run());
    }

    pub fn step_into(&mut self) {
        self.continuation(|c| c.step_into());
    }

    pub fn step_over(&mut self) {
        self.continuation(|c| c.step_over());
    }

    pub fn step_out(&mut self) {
        self.continuation(|c| c.step_out());
    }

    /// Run up to the cursor line via a temporary breakpoint.
    pub fn run_to_cursor(&mut self) {
        if let Err(e) = self.try_run_to_cursor() {
            self.report(e);
        }
    }

    /// Evaluate an expression now and on every subsequent pause.
    pub fn eval(&mut self, code: &str) {
        let Some(client) = self.require_client() else {
            return;
        };
        self.saved_eval = Some(code.to_string());
        if let Err(e) = self.eval_with(&client, code) {
            self.report(e);
        }
    }

    /// Stop re-evaluating the saved expression.
    pub fn clear_eval(&mut self) {
        self.saved_eval = None;
    }

    /// Set a breakpoint from user arguments, or remove the existing one
    /// when pointed at an already-broken line.
    pub fn set_breakpoint(&mut self, args: &str) {
        if let Err(e) = self.try_set_breakpoint(args) {
            self.report(e);
        }
    }

    /// Remove breakpoints by ID, or all of them with `*`.
    pub fn remove_breakpoint(&mut self, args: &str) {
        if let Err(e) = self.try_remove_breakpoint(args) {
            self.report(e);
        }
    }

    /// Detach from the engine, leaving the script to finish on its own.
    pub fn detach(&mut self) {
        let Some(client) = self.require_client() else {
            return;
        };
        self.ui.say("Detaching from the debugger engine");
        let result = client.detach();
        self.teardown();
        if let Err(e) = result {
            self.report(e.into());
        }
    }

    /// End the session, consulting the `on_close` policy when an engine
    /// is still attached. Idempotent.
    pub fn close(&mut self) {
        self.close_connection(true);
    }

    // Internals.

    fn try_open(&mut self) -> crate::Result<()> {
        if self.ui.is_modified() {
            self.ui
                .error("The current buffer has unsaved changes, save before debugging");
            return Ok(());
        }

        self.state = SessionState::Listening;
        let client = self.accept_engine()?;
        self.state = SessionState::Connected;
        self.client = Some(client.clone());
        self.ui.say(&format!(
            "Connected to a {} engine ({})",
            client.init().language,
            client.peer_addr()
        ));

        self.apply_features(&client);

        let positions = self.ui.breakpoint_positions();
        self.store.update_lines(&positions);
        self.store.link(client.clone())?;

        self.context_names = Some(client.context_names()?);

        let status = if self.options.break_on_open {
            client.step_into()?
        } else {
            client.run()?
        };
        self.refresh(status.status)
    }

    /// Accept connections until one announces the configured IDE key.
    /// Mismatched engines are detached and listening resumes.
    fn accept_engine(&mut self) -> crate::Result<Client> {
        loop {
            let conn = Connection::listen(
                &self.options.server,
                self.options.port,
                Duration::from_secs(self.options.timeout),
                Some(&self.cancel),
            )?;
            let client = Client::new(conn)?;

            let expected = &self.options.ide_key;
            if !expected.is_empty() && client.init().ide_key != *expected {
                self.ui.say(&format!(
                    "Ignoring connection with IDE key {:?} (expected {:?})",
                    client.init().ide_key, expected
                ));
                if let Err(e) = client.detach() {
                    tracing::debug!(error = %e, "detaching an unwanted engine failed");
                }
                client.close();
                continue;
            }
            return Ok(client);
        }
    }

    /// Apply the configured engine features. Per-feature failures are
    /// reported and skipped; the session still comes up.
    fn apply_features(&mut self, client: &Client) {
        for (name, value) in &self.options.features {
            if let Err(e) = client.feature_set(name, value) {
                self.ui
                    .error(&format!("Failed to set feature {name}: {e}"));
            }
        }
    }

    /// Send one continuation command and refresh from its status,
    /// bootstrapping a session first when none is active.
    fn continuation(&mut self, f: impl FnOnce(&Client) -> dbgp::Result<dbgp::responses::StatusResponse>) {
        let result = match self.client.clone() {
            None => self.try_open(),
            Some(client) => {
                self.state = SessionState::Running;
                match f(&client) {
                    Ok(response) => self.refresh(response.status),
                    Err(e) => Err(e.into()),
                }
            }
        };
        if let Err(e) = result {
            self.report(e);
        }
    }

    /// Bring the UI up to date after the engine paused or ended.
    fn refresh(&mut self, status: Status) -> crate::Result<()> {
        tracing::debug!(%status, "refreshing from engine status");
        match status {
            Status::Interactive => {
                self.ui
                    .error("The engine entered interactive mode, which is not supported");
                self.close_connection(true);
                Ok(())
            }
            Status::Stopping | Status::Stopped => {
                self.ui.say("Debugging session has ended");
                // the script is gone, there is nothing left to stop
                self.close_connection(false);
                if self.options.continuous_mode {
                    return self.try_open();
                }
                Ok(())
            }
            Status::Starting | Status::Running | Status::Break => {
                self.state = SessionState::Connected;
                let Some(client) = self.client.clone() else {
                    return Err(dbgp::Error::ConnectionClosed.into());
                };

                let stack = client.stack_get()?;
                if let Some(frame) = stack.get_stack().first() {
                    let file = FilePath::from_remote(&frame.filename, &self.path_map)?;
                    self.ui.set_source_position(&file, frame.lineno);
                }
                self.ui
                    .show_stack(&render::render_stack(stack.get_stack(), &self.path_map));

                if let Some(code) = self.saved_eval.clone() {
                    self.eval_with(&client, &code)
                } else {
                    let response = client.context_get(0)?;
                    let title = self.context_title(0);
                    self.ui
                        .show_context(&title, &render::render_context(response.get_context()));
                    Ok(())
                }
            }
        }
    }

    fn eval_with(&mut self, client: &Client, code: &str) -> crate::Result<()> {
        match client.eval(code) {
            Ok(response) => {
                self.ui.show_context(
                    &format!("eval: {code}"),
                    &render::render_context(response.get_context()),
                );
                Ok(())
            }
            Err(dbgp::Error::Engine { .. }) => {
                self.ui
                    .error(&format!("Failed to evaluate expression: {code}"));
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn try_run_to_cursor(&mut self) -> crate::Result<()> {
        let Some(client) = self.require_client() else {
            return Ok(());
        };
        let file = self
            .ui
            .current_file()
            .ok_or_else(|| Error::Breakpoint("No file, cannot run to cursor".to_string()))?;
        let file = FilePath::from_local(&file, &self.path_map)?;
        let line = self.ui.current_row();

        // registered directly with the engine: one-shot, never stored
        let kind = BreakpointKind::TemporaryLine { file, line };
        client.breakpoint_set(&kind.command())?;

        self.state = SessionState::Running;
        let status = client.run()?;
        self.refresh(status.status)
    }

    fn try_set_breakpoint(&mut self, args: &str) -> crate::Result<()> {
        let kind = Breakpoint::parse(&self.ui, args, &self.path_map)?;
        if let BreakpointKind::Line { file, line } = &kind {
            if let Some(id) = self.store.find_line(file, *line) {
                let removed = self.store.remove(id)?;
                self.ui.remove_breakpoint(&removed);
                return Ok(());
            }
        }
        self.store.add(&mut self.ui, kind)?;
        Ok(())
    }

    fn try_remove_breakpoint(&mut self, args: &str) -> crate::Result<()> {
        let args = args.trim();
        if args == "*" {
            for breakpoint in self.store.remove_all()? {
                self.ui.remove_breakpoint(&breakpoint);
            }
            return Ok(());
        }
        for word in args.split_whitespace() {
            let id: u32 = word.parse().map_err(|_| {
                Error::Breakpoint(format!("Invalid breakpoint ID: {word}"))
            })?;
            let removed = self.store.remove(id)?;
            self.ui.remove_breakpoint(&removed);
        }
        Ok(())
    }

    fn require_client(&mut self) -> Option<Client> {
        let client = self.client.clone().filter(Client::is_connected);
        if client.is_none() {
            self.ui.error("No debugger connection");
        }
        client
    }

    fn close_connection(&mut self, end_command: bool) {
        let Some(client) = self.client.take() else {
            self.state = SessionState::Idle;
            return;
        };
        self.store.unlink();

        if end_command && client.is_connected() {
            let result = match self.options.on_close {
                OnClose::Detach => match client.detach() {
                    Err(dbgp::Error::CommandNotImplemented) => {
                        self.ui.say(
                            "The engine does not support detaching, stopping it instead",
                        );
                        // remember the fallback for the rest of this run
                        self.options.on_close = OnClose::Stop;
                        client.stop().map(|_| ())
                    }
                    other => other.map(|_| ()),
                },
                OnClose::Stop => client.stop().map(|_| ()),
            };
            match result {
                Ok(_) => {}
                Err(dbgp::Error::ConnectionClosed) => {
                    self.ui.say("Connection to the debugger has been closed");
                }
                Err(e) => tracing::debug!(error = %e, "error while ending the session"),
            }
        }

        client.close();
        self.finish_teardown();
    }

    /// Cleanup after the connection is already gone.
    fn teardown(&mut self) {
        if let Some(client) = self.client.take() {
            client.close();
        }
        self.store.unlink();
        self.finish_teardown();
    }

    fn finish_teardown(&mut self) {
        self.context_names = None;
        self.saved_eval = None;
        self.state = SessionState::Ended;
        tracing::info!("debugging session ended");
    }

    fn context_title(&self, id: u32) -> String {
        self.context_names
            .as_ref()
            .and_then(|names| names.name_of(id))
            .unwrap_or("Context")
            .to_string()
    }

    /// The single place every command error arrives at. Each variant has
    /// a deliberate disposition; none fall through to a catch-all.
    fn report(&mut self, error: Error) {
        match error {
            Error::Dbgp(dbgp::Error::Timeout) => {
                self.state = SessionState::Idle;
                self.ui
                    .say("No engine connected within the timeout period");
            }
            Error::Dbgp(dbgp::Error::Interrupted) => {
                self.state = SessionState::Idle;
                self.ui.say("Listening for connections cancelled");
            }
            Error::Dbgp(dbgp::Error::ConnectionClosed) => {
                self.teardown();
                self.ui.say("Connection to the debugger has been closed");
            }
            Error::Dbgp(dbgp::Error::Engine { code, message }) => {
                self.ui
                    .error(&format!("Debugger engine error: {message} (code {code})"));
            }
            Error::Dbgp(dbgp::Error::CommandNotImplemented) => {
                self.ui
                    .error("The engine does not support that command");
            }
            Error::Dbgp(e @ dbgp::Error::Protocol(_)) | Error::Dbgp(e @ dbgp::Error::Io(_)) => {
                self.ui.error(&format!("Fatal debugger error: {e}"));
                self.teardown();
            }
            Error::Breakpoint(message) | Error::FilePath(message) => {
                self.ui.error(&message);
            }
        }
    }
}
