//! Breakpoint model and the store that keeps editor-side breakpoints in
//! sync with the engine.
use std::collections::BTreeMap;

use base64::Engine;
use dbgp::Client;

use crate::path::{FilePath, PathMap};
use crate::ui::Ui;
use crate::Error;

/// Local breakpoint IDs start here so they are visually distinct from
/// line numbers and engine-assigned IDs in editor signs and listings.
const FIRST_BREAKPOINT_ID: u32 = 11000;

/// The breakpoint types the protocol knows, each carrying only the fields
/// that type actually uses.
#[derive(Debug, Clone, PartialEq)]
pub enum BreakpointKind {
    Line {
        file: FilePath,
        line: u32,
    },
    /// A line breakpoint the engine discards after the first hit; used by
    /// run-to-cursor and never shown in the editor.
    TemporaryLine {
        file: FilePath,
        line: u32,
    },
    Conditional {
        file: FilePath,
        line: u32,
        condition: String,
    },
    Watch {
        expression: String,
    },
    Exception {
        name: String,
    },
    Call {
        function: String,
    },
    Return {
        function: String,
    },
}

impl BreakpointKind {
    /// Arguments for the engine's `breakpoint_set` command. Free-form
    /// payloads (conditions, watch expressions) travel base64-encoded
    /// after the `--` separator.
    pub fn command(&self) -> String {
        let b64 = |text: &str| base64::engine::general_purpose::STANDARD.encode(text);
        match self {
            Self::Line { file, line } => {
                format!("-t line -f {} -n {} -s enabled", file.as_remote(), line)
            }
            Self::TemporaryLine { file, line } => {
                format!("-t line -f {} -n {} -s enabled -r 1", file.as_remote(), line)
            }
            Self::Conditional {
                file,
                line,
                condition,
            } => format!(
                "-t line -f {} -n {} -s enabled -- {}",
                file.as_remote(),
                line,
                b64(condition)
            ),
            Self::Watch { expression } => format!("-t watch -- {}", b64(expression)),
            Self::Exception { name } => format!("-t exception -x {name} -s enabled"),
            Self::Call { function } => format!("-t call -m {function} -s enabled"),
            Self::Return { function } => format!("-t return -m {function} -s enabled"),
        }
    }

    /// Line-family breakpoints live on a source line; the rest do not.
    fn position(&self) -> Option<(&FilePath, u32)> {
        match self {
            Self::Line { file, line }
            | Self::TemporaryLine { file, line }
            | Self::Conditional { file, line, .. } => Some((file, *line)),
            _ => None,
        }
    }

    fn set_line(&mut self, new_line: u32) {
        match self {
            Self::Line { line, .. }
            | Self::TemporaryLine { line, .. }
            | Self::Conditional { line, .. } => *line = new_line,
            _ => {}
        }
    }
}

#[derive(Debug, Clone)]
pub struct Breakpoint {
    pub id: u32,
    /// The ID the engine assigned on registration; present only while
    /// linked to a connection.
    pub remote_id: Option<String>,
    pub kind: BreakpointKind,
}

impl Breakpoint {
    /// Build a breakpoint kind from the user's command arguments.
    ///
    /// Empty arguments mean a line breakpoint at the cursor; otherwise
    /// the first word selects the type and the rest is its argument.
    pub fn parse(ui: &dyn Ui, args: &str, map: &PathMap) -> crate::Result<BreakpointKind> {
        let args = args.trim();
        if args.is_empty() {
            let (file, line) = cursor_position(ui, map)?;
            return Ok(BreakpointKind::Line { file, line });
        }

        let (kind, rest) = match args.split_once(char::is_whitespace) {
            Some((kind, rest)) => (kind, rest.trim()),
            None => (args, ""),
        };
        match kind {
            "conditional" => {
                if rest.is_empty() {
                    return Err(Error::Breakpoint(
                        "Conditional breakpoints require a condition to be specified".to_string(),
                    ));
                }
                let (file, line) = cursor_position(ui, map)?;
                Ok(BreakpointKind::Conditional {
                    file,
                    line,
                    condition: rest.to_string(),
                })
            }
            "watch" => require(rest, "Watch breakpoints require an expression to be specified")
                .map(|expression| BreakpointKind::Watch { expression }),
            "exception" => require(rest, "Exception breakpoints require an exception name")
                .map(|name| BreakpointKind::Exception { name }),
            "call" => require(rest, "Call breakpoints require a function name")
                .map(|function| BreakpointKind::Call { function }),
            "return" => require(rest, "Return breakpoints require a function name")
                .map(|function| BreakpointKind::Return { function }),
            other => Err(Error::Breakpoint(format!(
                "Unrecognised breakpoint type: {other}"
            ))),
        }
    }
}

fn require(value: &str, message: &str) -> crate::Result<String> {
    if value.is_empty() {
        Err(Error::Breakpoint(message.to_string()))
    } else {
        Ok(value.to_string())
    }
}

fn cursor_position(ui: &dyn Ui, map: &PathMap) -> crate::Result<(FilePath, u32)> {
    let file = ui
        .current_file()
        .ok_or_else(|| Error::Breakpoint("No file, cannot set breakpoint".to_string()))?;
    if ui
        .current_line_text()
        .map_or(true, |text| text.trim().is_empty())
    {
        return Err(Error::Breakpoint(
            "Cannot set a breakpoint on an empty line".to_string(),
        ));
    }
    Ok((FilePath::from_local(&file, map)?, ui.current_row()))
}

/// All breakpoints the user has set, whether or not an engine is
/// currently connected.
///
/// While linked to a [`Client`], every mutation is mirrored to the engine
/// immediately; while unlinked, breakpoints accumulate locally and are
/// registered in bulk on the next [`BreakpointStore::link`].
pub struct BreakpointStore {
    breakpoints: BTreeMap<u32, Breakpoint>,
    client: Option<Client>,
    next_id: u32,
}

impl Default for BreakpointStore {
    fn default() -> Self {
        Self::new()
    }
}

impl BreakpointStore {
    pub fn new() -> Self {
        Self {
            breakpoints: BTreeMap::new(),
            client: None,
            next_id: FIRST_BREAKPOINT_ID,
        }
    }

    /// Add a breakpoint, registering it with the engine when linked. The
    /// UI is notified except for temporary line breakpoints, which never
    /// appear in the editor.
    pub fn add(&mut self, ui: &mut dyn Ui, kind: BreakpointKind) -> crate::Result<u32> {
        let id = self.next_id;
        self.next_id += 1;

        let mut breakpoint = Breakpoint {
            id,
            remote_id: None,
            kind,
        };
        if let Some(client) = &self.client {
            let response = client.breakpoint_set(&breakpoint.kind.command())?;
            breakpoint.remote_id = Some(response.id);
        }
        if !matches!(breakpoint.kind, BreakpointKind::TemporaryLine { .. }) {
            ui.register_breakpoint(&breakpoint);
        }
        tracing::debug!(id, linked = self.client.is_some(), "breakpoint added");
        self.breakpoints.insert(id, breakpoint);
        Ok(id)
    }

    /// Attach to a connection and register every stored breakpoint.
    /// Remote IDs from a previous connection are discarded first; they
    /// belong to an engine that no longer exists.
    pub fn link(&mut self, client: Client) -> crate::Result<()> {
        for breakpoint in self.breakpoints.values_mut() {
            breakpoint.remote_id = None;
            let response = client.breakpoint_set(&breakpoint.kind.command())?;
            breakpoint.remote_id = Some(response.id);
        }
        self.client = Some(client);
        Ok(())
    }

    pub fn unlink(&mut self) {
        self.client = None;
        for breakpoint in self.breakpoints.values_mut() {
            breakpoint.remote_id = None;
        }
    }

    pub fn is_linked(&self) -> bool {
        self.client.is_some()
    }

    /// Remove one breakpoint, unregistering it from the engine when
    /// linked. Unknown IDs are a user error.
    ///
    /// The engine is asked first; when it refuses, the breakpoint stays
    /// in the store, since the engine still enforces it.
    pub fn remove(&mut self, id: u32) -> crate::Result<Breakpoint> {
        let breakpoint = self
            .breakpoints
            .get(&id)
            .ok_or_else(|| Error::Breakpoint(format!("No breakpoint with ID {id}")))?;
        if let (Some(client), Some(remote_id)) = (&self.client, &breakpoint.remote_id) {
            client.breakpoint_remove(remote_id)?;
        }
        self.breakpoints
            .remove(&id)
            .ok_or_else(|| Error::Breakpoint(format!("No breakpoint with ID {id}")))
    }

    pub fn remove_all(&mut self) -> crate::Result<Vec<Breakpoint>> {
        let ids: Vec<u32> = self.breakpoints.keys().copied().collect();
        let mut removed = Vec::with_capacity(ids.len());
        for id in ids {
            removed.push(self.remove(id)?);
        }
        Ok(removed)
    }

    /// Adopt the line numbers the editor reports, keyed by breakpoint ID.
    /// Editing a buffer moves its signs; this realigns the line-family
    /// breakpoints before they are (re-)registered. Other kinds have no
    /// line to move.
    pub fn update_lines(&mut self, positions: &BTreeMap<u32, u32>) {
        for (id, line) in positions {
            if let Some(breakpoint) = self.breakpoints.get_mut(id) {
                breakpoint.kind.set_line(*line);
            }
        }
    }

    /// The ID of a line-family breakpoint at exactly this position, if
    /// one exists. Drives set-breakpoint toggling.
    pub fn find_line(&self, file: &FilePath, line: u32) -> Option<u32> {
        self.breakpoints
            .values()
            .find(|b| b.kind.position() == Some((file, line)))
            .map(|b| b.id)
    }

    /// Breakpoints in ascending ID order, which is creation order.
    pub fn get_sorted_list(&self) -> Vec<&Breakpoint> {
        self.breakpoints.values().collect()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use crate::path::{FilePath, PathMap};
    use crate::testing::RecordingUi;
    use crate::{Breakpoint, Error};

    use super::{BreakpointKind, BreakpointStore};

    fn file(path: &str) -> FilePath {
        FilePath::from_local(path, &PathMap::default()).unwrap()
    }

    macro_rules! command_tests {
        ($($name:ident: $kind:expr => $expected:expr,)+) => {
            $(
            #[test]
            fn $name() {
                assert_eq!($kind.command(), $expected);
            }
            )+
        };
    }

    command_tests! {
        line_command: BreakpointKind::Line { file: file("/srv/app.php"), line: 20 }
            => "-t line -f file:///srv/app.php -n 20 -s enabled",
        temporary_line_command: BreakpointKind::TemporaryLine { file: file("/srv/app.php"), line: 7 }
            => "-t line -f file:///srv/app.php -n 7 -s enabled -r 1",
        conditional_command: BreakpointKind::Conditional {
            file: file("/srv/app.php"),
            line: 4,
            condition: "$x > 3".to_string(),
        } => "-t line -f file:///srv/app.php -n 4 -s enabled -- JHggPiAz",
        watch_command: BreakpointKind::Watch { expression: "$total".to_string() }
            => "-t watch -- JHRvdGFs",
        exception_command: BreakpointKind::Exception { name: "RuntimeException".to_string() }
            => "-t exception -x RuntimeException -s enabled",
        call_command: BreakpointKind::Call { function: "do_work".to_string() }
            => "-t call -m do_work -s enabled",
        return_command: BreakpointKind::Return { function: "do_work".to_string() }
            => "-t return -m do_work -s enabled",
    }

    fn ui_at(file: &str, row: u32, line_text: &str) -> RecordingUi {
        let mut ui = RecordingUi::default();
        ui.file = Some(file.to_string());
        ui.row = row;
        ui.line_text = line_text.to_string();
        ui
    }

    #[test]
    fn empty_args_place_a_line_breakpoint_at_the_cursor() {
        let ui = ui_at("/srv/app.php", 12, "echo $x;");
        let kind = Breakpoint::parse(&ui, "", &PathMap::default()).unwrap();
        assert_eq!(
            kind,
            BreakpointKind::Line {
                file: file("/srv/app.php"),
                line: 12
            }
        );
    }

    #[test]
    fn blank_cursor_line_is_rejected() {
        let ui = ui_at("/srv/app.php", 12, "   ");
        let err = Breakpoint::parse(&ui, "", &PathMap::default()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Cannot set a breakpoint on an empty line"
        );
    }

    #[test]
    fn no_open_file_is_rejected() {
        let ui = RecordingUi::default();
        let err = Breakpoint::parse(&ui, "", &PathMap::default()).unwrap_err();
        assert_eq!(err.to_string(), "No file, cannot set breakpoint");
    }

    #[test]
    fn conditional_requires_a_condition() {
        let ui = ui_at("/srv/app.php", 3, "echo $x;");
        assert!(matches!(
            Breakpoint::parse(&ui, "conditional", &PathMap::default()),
            Err(Error::Breakpoint(_))
        ));
        let kind = Breakpoint::parse(&ui, "conditional $x > 3", &PathMap::default()).unwrap();
        assert_eq!(
            kind,
            BreakpointKind::Conditional {
                file: file("/srv/app.php"),
                line: 3,
                condition: "$x > 3".to_string()
            }
        );
    }

    #[test]
    fn non_positional_kinds_parse_their_argument() {
        let ui = RecordingUi::default();
        let map = PathMap::default();
        assert_eq!(
            Breakpoint::parse(&ui, "watch $total", &map).unwrap(),
            BreakpointKind::Watch {
                expression: "$total".to_string()
            }
        );
        assert_eq!(
            Breakpoint::parse(&ui, "exception RuntimeException", &map).unwrap(),
            BreakpointKind::Exception {
                name: "RuntimeException".to_string()
            }
        );
        assert_eq!(
            Breakpoint::parse(&ui, "call do_work", &map).unwrap(),
            BreakpointKind::Call {
                function: "do_work".to_string()
            }
        );
        assert_eq!(
            Breakpoint::parse(&ui, "return do_work", &map).unwrap(),
            BreakpointKind::Return {
                function: "do_work".to_string()
            }
        );
    }

    #[test]
    fn unknown_type_is_rejected() {
        let ui = RecordingUi::default();
        let err = Breakpoint::parse(&ui, "frobnicate now", &PathMap::default()).unwrap_err();
        assert_eq!(err.to_string(), "Unrecognised breakpoint type: frobnicate");
    }

    #[test]
    fn ids_count_up_from_the_base() {
        let mut store = BreakpointStore::new();
        let mut ui = RecordingUi::default();
        let first = store
            .add(
                &mut ui,
                BreakpointKind::Line {
                    file: file("/srv/app.php"),
                    line: 1,
                },
            )
            .unwrap();
        let second = store
            .add(
                &mut ui,
                BreakpointKind::Watch {
                    expression: "$x".to_string(),
                },
            )
            .unwrap();
        assert_eq!(first, 11000);
        assert_eq!(second, 11001);
        assert_eq!(ui.registered, vec![11000, 11001]);
    }

    #[test]
    fn temporary_breakpoints_are_not_shown() {
        let mut store = BreakpointStore::new();
        let mut ui = RecordingUi::default();
        store
            .add(
                &mut ui,
                BreakpointKind::TemporaryLine {
                    file: file("/srv/app.php"),
                    line: 5,
                },
            )
            .unwrap();
        assert!(ui.registered.is_empty());
    }

    #[test]
    fn removing_an_unknown_id_is_an_error() {
        let mut store = BreakpointStore::new();
        let err = store.remove(42).unwrap_err();
        assert_eq!(err.to_string(), "No breakpoint with ID 42");
    }

    #[test]
    fn find_line_matches_only_the_exact_position() {
        let mut store = BreakpointStore::new();
        let mut ui = RecordingUi::default();
        let id = store
            .add(
                &mut ui,
                BreakpointKind::Line {
                    file: file("/srv/app.php"),
                    line: 10,
                },
            )
            .unwrap();
        assert_eq!(store.find_line(&file("/srv/app.php"), 10), Some(id));
        assert_eq!(store.find_line(&file("/srv/app.php"), 11), None);
        assert_eq!(store.find_line(&file("/srv/other.php"), 10), None);
    }

    #[test]
    fn update_lines_moves_only_line_breakpoints() {
        let mut store = BreakpointStore::new();
        let mut ui = RecordingUi::default();
        let line_id = store
            .add(
                &mut ui,
                BreakpointKind::Line {
                    file: file("/srv/app.php"),
                    line: 10,
                },
            )
            .unwrap();
        let watch_id = store
            .add(
                &mut ui,
                BreakpointKind::Watch {
                    expression: "$x".to_string(),
                },
            )
            .unwrap();

        let positions: BTreeMap<u32, u32> =
            [(line_id, 14), (watch_id, 99)].into_iter().collect();
        store.update_lines(&positions);

        assert_eq!(store.find_line(&file("/srv/app.php"), 14), Some(line_id));
        let list = store.get_sorted_list();
        assert_eq!(list.len(), 2);
        assert!(matches!(
            list[1].kind,
            BreakpointKind::Watch { .. }
        ));
    }
}
