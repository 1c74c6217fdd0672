//! Test doubles for code driving a [`Session`](crate::Session).
use std::collections::BTreeMap;

use crate::breakpoint::Breakpoint;
use crate::path::FilePath;
use crate::ui::Ui;

/// A [`Ui`] that records everything the core tells it, and answers
/// cursor queries from plain fields set up by the test.
#[derive(Default)]
pub struct RecordingUi {
    pub messages: Vec<String>,
    pub errors: Vec<String>,
    pub stack: Option<String>,
    /// (title, rendered listing) of the last `show_context`.
    pub context: Option<(String, String)>,
    /// (local path, line) of the last `set_source_position`.
    pub position: Option<(String, u32)>,
    pub registered: Vec<u32>,
    pub removed: Vec<u32>,

    pub modified: bool,
    pub file: Option<String>,
    pub line_text: String,
    pub row: u32,
    pub positions: BTreeMap<u32, u32>,
}

impl Ui for RecordingUi {
    fn register_breakpoint(&mut self, breakpoint: &Breakpoint) {
        self.registered.push(breakpoint.id);
    }

    fn remove_breakpoint(&mut self, breakpoint: &Breakpoint) {
        self.removed.push(breakpoint.id);
    }

    fn set_source_position(&mut self, file: &FilePath, line: u32) {
        self.position = Some((file.as_local().to_string(), line));
    }

    fn show_stack(&mut self, rendered: &str) {
        self.stack = Some(rendered.to_string());
    }

    fn show_context(&mut self, title: &str, rendered: &str) {
        self.context = Some((title.to_string(), rendered.to_string()));
    }

    fn say(&mut self, message: &str) {
        self.messages.push(message.to_string());
    }

    fn error(&mut self, message: &str) {
        self.errors.push(message.to_string());
    }

    fn is_modified(&self) -> bool {
        self.modified
    }

    fn current_file(&self) -> Option<String> {
        self.file.clone()
    }

    fn current_line_text(&self) -> Option<String> {
        self.file.as_ref().map(|_| self.line_text.clone())
    }

    fn current_row(&self) -> u32 {
        self.row
    }

    fn breakpoint_positions(&self) -> BTreeMap<u32, u32> {
        self.positions.clone()
    }
}
