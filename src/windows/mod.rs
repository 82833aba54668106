//! Window locator: turns a client's cached attributes and resolved pid
//! into menu-ready window candidates.
//!
//! Window tools print one window per line: the window id, some metadata
//! columns, then the title. Pid searches carry four leading columns,
//! title searches three.

use std::str::FromStr;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::accessor::PropertyAccessor;
use crate::gateway::{SessionGateway, TitleMode};

/// Literal printed by the window tools for a missing window id.
const NO_WINDOW_ID: &str = "None";

#[derive(Debug, thiserror::Error)]
pub enum WindowError {
    #[error("invalid window search option {0:?}, expected many-titles or single-title")]
    InvalidOption(String),
}

impl FromStr for TitleMode {
    type Err = WindowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim_start_matches("--") {
            "many-titles" => Ok(Self::Many),
            "single-title" => Ok(Self::Single),
            _ => Err(WindowError::InvalidOption(s.to_string())),
        }
    }
}

/// One selectable entry. A candidate without a window id stands for a GUI
/// that is not running yet and can be launched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WindowCandidate {
    pub window_id: Option<String>,
    pub title: String,
}

/// Which window tool produced an output; decides the column layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchKind {
    ByPid,
    ByTitle,
}

impl SearchKind {
    /// Token index where the title starts; a line needs at least one
    /// token past it.
    fn title_index(self) -> usize {
        match self {
            Self::ByPid => 4,
            Self::ByTitle => 3,
        }
    }
}

/// Parse window tool output. Lines that are too short, or whose id or
/// title is missing, are skipped.
pub fn parse_window_lines(output: &str, kind: SearchKind) -> Vec<WindowCandidate> {
    let title_index = kind.title_index();
    output
        .lines()
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() <= title_index {
                return None;
            }
            let window_id = Some(fields[0]).filter(|id| *id != NO_WINDOW_ID)?;
            let title = fields[title_index..].join(" ");
            if title.trim().is_empty() {
                return None;
            }
            Some(WindowCandidate {
                window_id: Some(window_id.to_string()),
                title,
            })
        })
        .collect()
}

pub struct WindowLocator {
    gateway: Arc<dyn SessionGateway>,
    accessor: Arc<PropertyAccessor>,
    session_manager_label: String,
}

impl WindowLocator {
    pub fn new(
        gateway: Arc<dyn SessionGateway>,
        accessor: Arc<PropertyAccessor>,
        session_manager_label: impl Into<String>,
    ) -> Self {
        Self {
            gateway,
            accessor,
            session_manager_label: session_manager_label.into(),
        }
    }

    /// Windows owned by `pid`, optionally filtered by a title pattern.
    /// A zero pid is "not running" and yields nothing.
    pub fn windows_for_pid(
        &self,
        pid: u32,
        mode: TitleMode,
        pattern: Option<&str>,
    ) -> Vec<WindowCandidate> {
        if pid == 0 {
            return Vec::new();
        }
        match self.gateway.find_windows_by_pid(pid, mode, pattern) {
            Ok(output) => parse_window_lines(&output, SearchKind::ByPid),
            Err(e) => {
                warn!(pid, error = %e, "window lookup by pid failed");
                Vec::new()
            }
        }
    }

    /// Windows whose title matches `pattern`, across all processes.
    pub fn windows_for_title(&self, pattern: &str, mode: TitleMode) -> Vec<WindowCandidate> {
        if pattern.trim().is_empty() {
            return Vec::new();
        }
        match self.gateway.find_windows_by_title(pattern, mode) {
            Ok(output) => parse_window_lines(&output, SearchKind::ByTitle),
            Err(e) => {
                warn!(%pattern, error = %e, "window lookup by title failed");
                Vec::new()
            }
        }
    }

    /// Direct window search with a caller-supplied option string
    /// (`many-titles` or `single-title`, optionally `--`-prefixed). A pid
    /// searches by pid, filtered by `pattern` if given; otherwise
    /// `pattern` is matched against all titles.
    pub fn search(
        &self,
        pid: Option<u32>,
        pattern: Option<&str>,
        option: &str,
    ) -> Result<Vec<WindowCandidate>, WindowError> {
        let mode: TitleMode = option.parse()?;
        Ok(match (pid, pattern) {
            (Some(pid), pattern) => self.windows_for_pid(pid, mode, pattern),
            (None, Some(pattern)) => self.windows_for_title(pattern, mode),
            (None, None) => Vec::new(),
        })
    }

    /// Candidates for client `name`, recomputed on every call.
    ///
    /// GUI clients with a live pid are searched by pid (filtered by their
    /// title pattern if any); other clients by title pattern alone. With
    /// nothing found, a configured launcher becomes a `start <gui>` entry.
    /// A client in a session always gets its session window appended.
    pub fn find_windows(&self, name: &str) -> Vec<WindowCandidate> {
        let Some(record) = self.accessor.record(name) else {
            debug!(%name, "client not registered");
            return Vec::new();
        };

        let expects_gui = record.with_gui == Some(true);
        let title = record.window_title();
        let pid = if expects_gui {
            self.accessor.resolve_pid(&record)
        } else {
            0
        };

        let mut candidates = match (expects_gui, title) {
            (true, title) if pid != 0 => self.windows_for_pid(pid, TitleMode::Many, title),
            (false, Some(title)) => self.windows_for_title(title, TitleMode::Many),
            _ => Vec::new(),
        };

        if candidates.is_empty() {
            if let Some(gui) = record.gui_to_load() {
                candidates.push(WindowCandidate {
                    window_id: None,
                    title: format!("start {gui}"),
                });
            }
        }

        if let Some(session) = record.session_name() {
            let pattern = format!("{} - {}", self.session_manager_label, session);
            candidates.extend(
                self.windows_for_title(&pattern, TitleMode::Single)
                    .into_iter()
                    .take(1),
            );
        }

        debug!(%name, pid, ?candidates, "window candidates");
        candidates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::Port;
    use crate::gateway::fake::{FakeGateway, WindowQuery};
    use crate::store::{ClientRecord, ClientStore, ClientType};

    const PORT: &str = "16001";

    fn setup() -> (Arc<FakeGateway>, Arc<ClientStore>, WindowLocator) {
        let gateway = Arc::new(FakeGateway::new());
        let store = Arc::new(ClientStore::new());
        let accessor = Arc::new(PropertyAccessor::new(
            gateway.clone(),
            store.clone(),
            "xxx-PID-xxx",
        ));
        let locator = WindowLocator::new(gateway.clone(), accessor, "RaySession");
        (gateway, store, locator)
    }

    fn gui_client(name: &str) -> ClientRecord {
        ClientRecord {
            client_id: Some("cid".to_string()),
            client_type: Some(ClientType::Plain),
            with_gui: Some(true),
            ..ClientRecord::new(name, Port::parse(PORT).unwrap())
        }
    }

    fn window(id: &str, title: &str) -> WindowCandidate {
        WindowCandidate {
            window_id: Some(id.to_string()),
            title: title.to_string(),
        }
    }

    #[test]
    fn parse_pid_lines() {
        let output = "0x1 0 4242 host Mixer Main\n\
                      0x2 0 4242 host\n\
                      None 0 4242 host Orphan\n\
                      \n\
                      0x3  0  4242  host   Spaced   Title  \n";
        assert_eq!(
            parse_window_lines(output, SearchKind::ByPid),
            [window("0x1", "Mixer Main"), window("0x3", "Spaced Title")]
        );
    }

    #[test]
    fn parse_title_lines() {
        let output = "0x10 0 host RaySession - live\n0x11 0 host\nNone 0 host Ghost\n";
        assert_eq!(
            parse_window_lines(output, SearchKind::ByTitle),
            [window("0x10", "RaySession - live")]
        );
    }

    #[test]
    fn short_title_line_is_valid_in_title_mode_only() {
        let line = "0x5 0 host Title";
        assert!(parse_window_lines(line, SearchKind::ByPid).is_empty());
        assert_eq!(
            parse_window_lines(line, SearchKind::ByTitle),
            [window("0x5", "Title")]
        );
    }

    #[test]
    fn title_mode_option_parsing() {
        assert_eq!("many-titles".parse::<TitleMode>().unwrap(), TitleMode::Many);
        assert_eq!("--single-title".parse::<TitleMode>().unwrap(), TitleMode::Single);
        assert!(matches!(
            "--all".parse::<TitleMode>(),
            Err(WindowError::InvalidOption(_))
        ));
    }

    #[test]
    fn unknown_client_has_no_windows() {
        let (gateway, _store, locator) = setup();
        assert!(locator.find_windows("ghost").is_empty());
        assert_eq!(gateway.calls(), 0);
    }

    #[test]
    fn gui_client_searched_by_pid() {
        let (gateway, store, locator) = setup();
        store.upsert_if_absent([ClientRecord {
            window_title: Some("Synth.*".to_string()),
            gui_to_load: Some("SynthGUI".to_string()),
            ..gui_client("synth")
        }]);
        gateway.set_pid(PORT, "cid", 4242);
        gateway.set_windows_by_pid(4242, "0x1 0 4242 host Synth Editor\n");

        assert_eq!(
            locator.find_windows("synth"),
            [window("0x1", "Synth Editor")]
        );
        assert_eq!(
            gateway.window_queries(),
            [WindowQuery::ByPid {
                pid: 4242,
                mode: TitleMode::Many,
                pattern: Some("Synth.*".to_string()),
            }]
        );
    }

    #[test]
    fn gui_client_without_title_searched_by_pid_unfiltered() {
        let (gateway, store, locator) = setup();
        store.upsert_if_absent([gui_client("synth")]);
        gateway.set_pid(PORT, "cid", 4242);
        gateway.set_windows_by_pid(4242, "0x1 0 4242 host Synth Editor\n");

        assert_eq!(
            locator.find_windows("synth"),
            [window("0x1", "Synth Editor")]
        );
        assert_eq!(
            gateway.window_queries(),
            [WindowQuery::ByPid {
                pid: 4242,
                mode: TitleMode::Many,
                pattern: None,
            }]
        );
    }

    #[test]
    fn non_gui_client_searched_by_title() {
        let (gateway, store, locator) = setup();
        store.upsert_if_absent([ClientRecord {
            with_gui: None,
            window_title: Some("Carla.*".to_string()),
            ..gui_client("carla")
        }]);
        gateway.set_windows_by_title("Carla.*", "0x7 0 host Carla Rack\n");

        assert_eq!(locator.find_windows("carla"), [window("0x7", "Carla Rack")]);
        assert_eq!(
            gateway.window_queries(),
            [WindowQuery::ByTitle {
                pattern: "Carla.*".to_string(),
                mode: TitleMode::Many,
            }]
        );
    }

    #[test]
    fn client_without_gui_searched_by_title() {
        let (gateway, store, locator) = setup();
        store.upsert_if_absent([ClientRecord {
            with_gui: Some(false),
            window_title: Some("Carla.*".to_string()),
            ..gui_client("carla")
        }]);
        gateway.set_pid(PORT, "cid", 4242);
        gateway.set_windows_by_pid(4242, "0x9 0 4242 host Wrong\n");
        gateway.set_windows_by_title("Carla.*", "0x7 0 host Carla Rack\n");

        assert_eq!(locator.find_windows("carla"), [window("0x7", "Carla Rack")]);
        assert_eq!(
            gateway.window_queries(),
            [WindowQuery::ByTitle {
                pattern: "Carla.*".to_string(),
                mode: TitleMode::Many,
            }]
        );
    }

    #[test]
    fn gui_client_without_pid_offers_launch() {
        let (gateway, store, locator) = setup();
        store.upsert_if_absent([ClientRecord {
            window_title: Some("Mixer.*".to_string()),
            gui_to_load: Some("MixerGUI".to_string()),
            ..gui_client("mixer")
        }]);

        assert_eq!(
            locator.find_windows("mixer"),
            [WindowCandidate {
                window_id: None,
                title: "start MixerGUI".to_string(),
            }]
        );
        assert!(gateway.window_queries().is_empty());
    }

    #[test]
    fn session_window_appended_once() {
        let (gateway, store, locator) = setup();
        store.upsert_if_absent([ClientRecord {
            session_name: Some("live".to_string()),
            gui_to_load: Some("MixerGUI".to_string()),
            ..gui_client("mixer")
        }]);
        gateway.set_windows_by_title(
            "RaySession - live",
            "0x10 0 host RaySession - live\n0x11 0 host RaySession - live\n",
        );

        assert_eq!(
            locator.find_windows("mixer"),
            [
                WindowCandidate {
                    window_id: None,
                    title: "start MixerGUI".to_string(),
                },
                window("0x10", "RaySession - live"),
            ]
        );
        assert_eq!(
            gateway.window_queries(),
            [WindowQuery::ByTitle {
                pattern: "RaySession - live".to_string(),
                mode: TitleMode::Single,
            }]
        );
    }

    #[test]
    fn search_parses_option() {
        let (gateway, _store, locator) = setup();
        gateway.set_windows_by_pid(4242, "0x1 0 4242 host Synth Editor\n");

        assert_eq!(
            locator.search(Some(4242), Some("Synth.*"), "--single-title").unwrap(),
            [window("0x1", "Synth Editor")]
        );
        assert_eq!(
            gateway.window_queries(),
            [WindowQuery::ByPid {
                pid: 4242,
                mode: TitleMode::Single,
                pattern: Some("Synth.*".to_string()),
            }]
        );
        assert!(locator.search(None, None, "many-titles").unwrap().is_empty());
    }

    #[test]
    fn search_rejects_unknown_option() {
        let (gateway, _store, locator) = setup();

        assert!(matches!(
            locator.search(None, Some("Synth.*"), "all-titles"),
            Err(WindowError::InvalidOption(option)) if option == "all-titles"
        ));
        assert_eq!(gateway.calls(), 0);
    }

    #[test]
    fn window_tool_failure_is_empty() {
        let (gateway, store, locator) = setup();
        store.upsert_if_absent([ClientRecord {
            with_gui: Some(false),
            window_title: Some("Nothing".to_string()),
            ..gui_client("quiet")
        }]);

        assert!(locator.find_windows("quiet").is_empty());
        assert_eq!(gateway.window_queries().len(), 1);
    }
}
