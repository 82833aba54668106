//! Session gateway: typed access to the external session manager,
//! the window lookup tools and the switch/launch tool.
//!
//! Everything the cache knows about the outside world comes through
//! [`SessionGateway`]. Implementations never panic on bad output; they
//! return a [`GatewayError`] and the caller treats it as "no data".

pub mod command;
#[cfg(test)]
pub mod fake;
pub mod process;

use std::fmt;

use serde::Serialize;

pub use command::CommandGateway;

/// Gateway failure. Always recovered by the caller.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// The external program could not be started.
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    /// The external program exited unsuccessfully.
    #[error("{program} exited with status {code:?}")]
    Status { program: String, code: Option<i32> },
    /// The program ran but its output could not be interpreted.
    #[error("malformed {what}: {output:?}")]
    Malformed { what: &'static str, output: String },
}

/// Addressing handle for one running session-manager daemon.
///
/// Only all-digit tokens are valid ports; anything else reported by
/// `list_daemons` is ignored.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Port(String);

impl Port {
    pub fn parse(token: &str) -> Option<Self> {
        let token = token.trim();
        if !token.is_empty() && token.bytes().all(|b| b.is_ascii_digit()) {
            Some(Self(token.to_string()))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Title option passed to the window lookup tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TitleMode {
    /// Every matching window.
    #[default]
    Many,
    /// At most one matching window.
    Single,
}

impl TitleMode {
    pub fn as_flag(self) -> &'static str {
        match self {
            Self::Many => "--many-titles",
            Self::Single => "--single-title",
        }
    }
}

/// Scope handed to the switch tool alongside a window id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchScope<'a> {
    /// The client's owning session.
    Session(&'a str),
    /// The client's GUI launcher.
    Launcher(&'a str),
    /// Raw window id, no scope.
    Unscoped,
}

/// Contract of the external collaborators.
///
/// Window lookups return the tool's raw stdout; line parsing belongs to
/// the window locator. `switch_to` and `launch` are fire-and-forget:
/// `Ok` only means the command was started.
pub trait SessionGateway: Send + Sync {
    /// Whitespace-separated daemon ports, unfiltered.
    fn list_daemons(&self) -> Result<Vec<String>, GatewayError>;

    /// Session path currently loaded on `port`, `None` if there is none.
    fn session_path(&self, port: &Port) -> Result<Option<String>, GatewayError>;

    /// Client ids on `port`. Empty when the session has no clients.
    fn list_clients(&self, port: &Port) -> Result<Vec<String>, GatewayError>;

    /// First line of a client's custom data entry, `None` if unset.
    fn custom_data(
        &self,
        port: &Port,
        client_id: &str,
        key: &str,
    ) -> Result<Option<String>, GatewayError>;

    /// Custom data entry split on `separator`.
    fn custom_data_list(
        &self,
        port: &Port,
        client_id: &str,
        key: &str,
        separator: char,
    ) -> Result<Option<Vec<String>>, GatewayError> {
        Ok(self
            .custom_data(port, client_id, key)?
            .map(|value| value.split(separator).map(str::to_string).collect()))
    }

    /// Pid the session manager reports for a client.
    fn client_pid(&self, port: &Port, client_id: &str) -> Result<u32, GatewayError>;

    /// Direct children of `pid`, ascending.
    fn list_children(&self, pid: u32) -> Result<Vec<u32>, GatewayError>;

    fn find_windows_by_pid(
        &self,
        pid: u32,
        mode: TitleMode,
        pattern: Option<&str>,
    ) -> Result<String, GatewayError>;

    fn find_windows_by_title(&self, pattern: &str, mode: TitleMode)
    -> Result<String, GatewayError>;

    fn switch_to(&self, scope: SwitchScope<'_>, window_id: &str) -> Result<(), GatewayError>;

    fn launch(&self, launcher: &str, title_hint: Option<&str>) -> Result<(), GatewayError>;
}
