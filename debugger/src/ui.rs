use std::collections::BTreeMap;

use crate::breakpoint::Breakpoint;
use crate::path::FilePath;

/// What the session runner needs from the host editor.
///
/// The core never draws anything itself; it hands the editor rendered
/// text and position updates and asks it about the cursor when placing
/// breakpoints.
pub trait Ui {
    /// A breakpoint was stored; show its sign/marker.
    fn register_breakpoint(&mut self, breakpoint: &Breakpoint);
    fn remove_breakpoint(&mut self, breakpoint: &Breakpoint);

    /// Execution is paused here; move the editor to this file and line.
    fn set_source_position(&mut self, file: &FilePath, line: u32);
    fn show_stack(&mut self, rendered: &str);
    /// `title` names what is shown, e.g. the context name or the
    /// evaluated expression.
    fn show_context(&mut self, title: &str, rendered: &str);

    /// Informational message.
    fn say(&mut self, message: &str);
    fn error(&mut self, message: &str);

    /// Whether the current buffer has unsaved changes.
    fn is_modified(&self) -> bool;
    fn current_file(&self) -> Option<String>;
    fn current_line_text(&self) -> Option<String>;
    /// 1-based cursor row.
    fn current_row(&self) -> u32;
    /// Current line of each breakpoint sign, keyed by breakpoint ID.
    fn breakpoint_positions(&self) -> BTreeMap<u32, u32>;
}
