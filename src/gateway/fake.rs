//! Scripted in-memory gateway for tests.

use std::collections::HashMap;
use std::sync::Mutex;

use super::{GatewayError, Port, SessionGateway, SwitchScope, TitleMode};

/// Command issued through a fire-and-forget gateway call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Issued {
    Switch {
        session: Option<String>,
        launcher: Option<String>,
        window_id: String,
    },
    Launch {
        launcher: String,
        title_hint: Option<String>,
    },
}

/// Window lookup received by the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowQuery {
    ByPid {
        pid: u32,
        mode: TitleMode,
        pattern: Option<String>,
    },
    ByTitle {
        pattern: String,
        mode: TitleMode,
    },
}

#[derive(Debug, Default)]
struct Script {
    /// `None` makes `list_daemons` fail.
    daemons: Option<Vec<String>>,
    session_paths: HashMap<String, String>,
    failing_session_paths: Vec<String>,
    clients: HashMap<String, Vec<String>>,
    custom: HashMap<(String, String, String), String>,
    pids: HashMap<(String, String), u32>,
    children: HashMap<u32, Vec<u32>>,
    failing_children: Vec<u32>,
    windows_by_pid: HashMap<u32, String>,
    windows_by_title: HashMap<String, String>,
    issued: Vec<Issued>,
    window_queries: Vec<WindowQuery>,
    calls: usize,
}

#[derive(Debug, Default)]
pub struct FakeGateway {
    script: Mutex<Script>,
}

fn fail(what: &'static str) -> GatewayError {
    GatewayError::Status {
        program: what.to_string(),
        code: Some(1),
    }
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    fn with<R>(&self, f: impl FnOnce(&mut Script) -> R) -> R {
        let mut script = self.script.lock().unwrap();
        f(&mut script)
    }

    pub fn set_daemons(&self, ports: &[&str]) {
        self.with(|s| s.daemons = Some(ports.iter().map(|p| p.to_string()).collect()));
    }

    pub fn fail_daemons(&self) {
        self.with(|s| s.daemons = None);
    }

    pub fn set_session(&self, port: &str, path: &str) {
        self.with(|s| {
            s.session_paths.insert(port.to_string(), path.to_string());
        });
    }

    pub fn clear_session(&self, port: &str) {
        self.with(|s| {
            s.session_paths.remove(port);
        });
    }

    pub fn fail_session_path(&self, port: &str) {
        self.with(|s| s.failing_session_paths.push(port.to_string()));
    }

    /// Register a client exposing `jack_names` with the given custom data.
    pub fn add_client(&self, port: &str, client_id: &str, jack_names: &str, data: &[(&str, &str)]) {
        self.with(|s| {
            s.clients
                .entry(port.to_string())
                .or_default()
                .push(client_id.to_string());
            s.custom.insert(
                (port.to_string(), client_id.to_string(), "jacknames".to_string()),
                jack_names.to_string(),
            );
            for (key, value) in data {
                s.custom.insert(
                    (port.to_string(), client_id.to_string(), key.to_string()),
                    value.to_string(),
                );
            }
        });
    }

    pub fn set_custom(&self, port: &str, client_id: &str, key: &str, value: &str) {
        self.with(|s| {
            s.custom.insert(
                (port.to_string(), client_id.to_string(), key.to_string()),
                value.to_string(),
            );
        });
    }

    pub fn set_pid(&self, port: &str, client_id: &str, pid: u32) {
        self.with(|s| {
            s.pids.insert((port.to_string(), client_id.to_string()), pid);
        });
    }

    pub fn set_children(&self, pid: u32, children: &[u32]) {
        self.with(|s| {
            s.children.insert(pid, children.to_vec());
        });
    }

    pub fn fail_children(&self, pid: u32) {
        self.with(|s| s.failing_children.push(pid));
    }

    pub fn set_windows_by_pid(&self, pid: u32, output: &str) {
        self.with(|s| {
            s.windows_by_pid.insert(pid, output.to_string());
        });
    }

    pub fn set_windows_by_title(&self, pattern: &str, output: &str) {
        self.with(|s| {
            s.windows_by_title
                .insert(pattern.to_string(), output.to_string());
        });
    }

    pub fn issued(&self) -> Vec<Issued> {
        self.with(|s| s.issued.clone())
    }

    pub fn window_queries(&self) -> Vec<WindowQuery> {
        self.with(|s| s.window_queries.clone())
    }

    /// Total number of gateway calls served so far.
    pub fn calls(&self) -> usize {
        self.with(|s| s.calls)
    }

    fn count<R>(&self, f: impl FnOnce(&mut Script) -> R) -> R {
        self.with(|s| {
            s.calls += 1;
            f(s)
        })
    }
}

impl SessionGateway for FakeGateway {
    fn list_daemons(&self) -> Result<Vec<String>, GatewayError> {
        self.count(|s| s.daemons.clone().ok_or_else(|| fail("list_daemons")))
    }

    fn session_path(&self, port: &Port) -> Result<Option<String>, GatewayError> {
        self.count(|s| {
            if s.failing_session_paths.iter().any(|p| p == port.as_str()) {
                return Err(fail("get_session_path"));
            }
            Ok(s.session_paths.get(port.as_str()).cloned())
        })
    }

    fn list_clients(&self, port: &Port) -> Result<Vec<String>, GatewayError> {
        self.count(|s| Ok(s.clients.get(port.as_str()).cloned().unwrap_or_default()))
    }

    fn custom_data(
        &self,
        port: &Port,
        client_id: &str,
        key: &str,
    ) -> Result<Option<String>, GatewayError> {
        self.count(|s| {
            s.custom
                .get(&(port.to_string(), client_id.to_string(), key.to_string()))
                .cloned()
                .map(Some)
                .ok_or_else(|| fail("get_custom_data"))
        })
    }

    fn client_pid(&self, port: &Port, client_id: &str) -> Result<u32, GatewayError> {
        self.count(|s| {
            s.pids
                .get(&(port.to_string(), client_id.to_string()))
                .copied()
                .ok_or_else(|| fail("get_pid"))
        })
    }

    fn list_children(&self, pid: u32) -> Result<Vec<u32>, GatewayError> {
        self.count(|s| {
            if s.failing_children.contains(&pid) {
                return Err(fail("list_children"));
            }
            Ok(s.children.get(&pid).cloned().unwrap_or_default())
        })
    }

    fn find_windows_by_pid(
        &self,
        pid: u32,
        mode: TitleMode,
        pattern: Option<&str>,
    ) -> Result<String, GatewayError> {
        self.count(|s| {
            s.window_queries.push(WindowQuery::ByPid {
                pid,
                mode,
                pattern: pattern.map(str::to_string),
            });
            Ok(s.windows_by_pid.get(&pid).cloned().unwrap_or_default())
        })
    }

    fn find_windows_by_title(
        &self,
        pattern: &str,
        mode: TitleMode,
    ) -> Result<String, GatewayError> {
        self.count(|s| {
            s.window_queries.push(WindowQuery::ByTitle {
                pattern: pattern.to_string(),
                mode,
            });
            s.windows_by_title
                .get(pattern)
                .cloned()
                .ok_or_else(|| fail("find_windows_by_title"))
        })
    }

    fn switch_to(&self, scope: SwitchScope<'_>, window_id: &str) -> Result<(), GatewayError> {
        let (session, launcher) = match scope {
            SwitchScope::Session(s) => (Some(s.to_string()), None),
            SwitchScope::Launcher(l) => (None, Some(l.to_string())),
            SwitchScope::Unscoped => (None, None),
        };
        self.count(|s| {
            s.issued.push(Issued::Switch {
                session,
                launcher,
                window_id: window_id.to_string(),
            })
        });
        Ok(())
    }

    fn launch(&self, launcher: &str, title_hint: Option<&str>) -> Result<(), GatewayError> {
        self.count(|s| {
            s.issued.push(Issued::Launch {
                launcher: launcher.to_string(),
                title_hint: title_hint.map(str::to_string),
            })
        });
        Ok(())
    }
}
