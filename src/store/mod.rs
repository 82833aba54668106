//! Client record store: the single source of truth for cached client
//! attributes, the session-per-port mapping and the known-layers set.
//!
//! All three live behind one mutex. Critical sections are record-level:
//! callers must never hold the guard across a gateway call, which the
//! API enforces by only handing out clones.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;

use crate::gateway::Port;

/// How the session manager launches a client, which decides how deep
/// below the reported pid the real process lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(into = "String")]
pub enum ClientType {
    Plain,
    /// Reported pid is the direct parent of the real process.
    Proxy,
    /// Reported pid is the grandparent of the real process.
    ProxyWrapper,
    Other(String),
}

impl ClientType {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "" => None,
            "plain" => Some(Self::Plain),
            "proxy" => Some(Self::Proxy),
            "proxy-wrapper" => Some(Self::ProxyWrapper),
            other => Some(Self::Other(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Plain => "plain",
            Self::Proxy => "proxy",
            Self::ProxyWrapper => "proxy-wrapper",
            Self::Other(other) => other,
        }
    }

    /// Levels of child processes between the reported pid and the real one.
    pub fn child_depth(&self) -> usize {
        match self {
            Self::Proxy => 1,
            Self::ProxyWrapper => 2,
            Self::Plain | Self::Other(_) => 0,
        }
    }
}

impl From<ClientType> for String {
    fn from(value: ClientType) -> Self {
        value.as_str().to_string()
    }
}

/// Parse the `with_gui` custom data entry.
///
/// Blank is unknown; the usual false spellings are `false`; any other
/// non-blank value counts as `true`.
pub fn parse_with_gui(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "" => None,
        "false" | "0" | "no" | "off" => Some(false),
        _ => Some(true),
    }
}

/// Named property of a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Property {
    Name,
    WindowTitle,
    Layer,
    GuiToLoad,
    WithGui,
    ClientType,
    SessionName,
    ClientId,
    Port,
    /// Resolved at query time, never stored.
    Pid,
}

#[derive(Debug, thiserror::Error)]
#[error("unknown property {0:?}")]
pub struct UnknownProperty(pub String);

impl FromStr for Property {
    type Err = UnknownProperty;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "name" => Self::Name,
            "windowtitle" => Self::WindowTitle,
            "layer" => Self::Layer,
            "guitoload" => Self::GuiToLoad,
            "with_gui" => Self::WithGui,
            "clienttype" => Self::ClientType,
            "sessionname" => Self::SessionName,
            "clientid" => Self::ClientId,
            "port" => Self::Port,
            "pid" => Self::Pid,
            other => return Err(UnknownProperty(other.to_string())),
        })
    }
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Name => "name",
            Self::WindowTitle => "windowtitle",
            Self::Layer => "layer",
            Self::GuiToLoad => "guitoload",
            Self::WithGui => "with_gui",
            Self::ClientType => "clienttype",
            Self::SessionName => "sessionname",
            Self::ClientId => "clientid",
            Self::Port => "port",
            Self::Pid => "pid",
        })
    }
}

/// Cached attributes of one named endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientRecord {
    pub name: String,
    pub window_title: Option<String>,
    pub layer: Option<String>,
    pub gui_to_load: Option<String>,
    pub with_gui: Option<bool>,
    pub client_type: Option<ClientType>,
    pub session_name: Option<String>,
    pub client_id: Option<String>,
    /// Gateway port whose session produced this record.
    pub port: Port,
}

impl ClientRecord {
    pub fn new(name: impl Into<String>, port: Port) -> Self {
        Self {
            name: name.into(),
            window_title: None,
            layer: None,
            gui_to_load: None,
            with_gui: None,
            client_type: None,
            session_name: None,
            client_id: None,
            port,
        }
    }

    /// Stored value of `property`; blank strings read as absent.
    /// [`Property::Pid`] is never stored and always reads as absent.
    pub fn field(&self, property: Property) -> Option<String> {
        let value = match property {
            Property::Name => Some(self.name.clone()),
            Property::WindowTitle => self.window_title.clone(),
            Property::Layer => self.layer.clone(),
            Property::GuiToLoad => self.gui_to_load.clone(),
            Property::WithGui => self.with_gui.map(|gui| gui.to_string()),
            Property::ClientType => self.client_type.as_ref().map(|t| t.as_str().to_string()),
            Property::SessionName => self.session_name.clone(),
            Property::ClientId => self.client_id.clone(),
            Property::Port => Some(self.port.to_string()),
            Property::Pid => None,
        };
        value.filter(|v| !v.trim().is_empty())
    }

    pub fn window_title(&self) -> Option<&str> {
        non_blank(self.window_title.as_deref())
    }

    pub fn gui_to_load(&self) -> Option<&str> {
        non_blank(self.gui_to_load.as_deref())
    }

    pub fn session_name(&self) -> Option<&str> {
        non_blank(self.session_name.as_deref())
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

#[derive(Debug, Default)]
struct StoreInner {
    records: HashMap<String, ClientRecord>,
    session_path_by_port: BTreeMap<Port, String>,
    known_layers: BTreeSet<String>,
}

/// Thread-safe registry of client records.
#[derive(Debug, Default)]
pub struct ClientStore {
    inner: Mutex<StoreInner>,
}

impl ClientStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stored value of `property` for exactly `name`.
    pub fn get(&self, name: &str, property: Property) -> Option<String> {
        self.lock()
            .records
            .get(name)
            .and_then(|record| record.field(property))
    }

    /// Clone of the first record found among `names`, tried in order
    /// under a single lock acquisition.
    pub fn first_of<'a>(&self, names: impl IntoIterator<Item = &'a str>) -> Option<ClientRecord> {
        let inner = self.lock();
        names
            .into_iter()
            .find_map(|name| inner.records.get(name).cloned())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lock().records.contains_key(name)
    }

    /// Insert every record whose name is not registered yet. Existing
    /// names keep their current values. Returns the number inserted.
    pub fn upsert_if_absent(&self, records: impl IntoIterator<Item = ClientRecord>) -> usize {
        Self::insert_absent(&mut self.lock(), records)
    }

    /// Drop every record produced by `port`. Returns the number removed.
    pub fn remove_by_port(&self, port: &Port) -> usize {
        Self::remove_port_records(&mut self.lock(), port)
    }

    /// Swap the records of `port` for `records` and map it to `path`, all
    /// under one lock acquisition. Readers observe either the old or the
    /// new set, never a gap. Returns `(removed, inserted)`.
    pub fn replace_port(
        &self,
        port: &Port,
        path: String,
        records: impl IntoIterator<Item = ClientRecord>,
    ) -> (usize, usize) {
        let mut inner = self.lock();
        let removed = Self::remove_port_records(&mut inner, port);
        inner.session_path_by_port.insert(port.clone(), path);
        let inserted = Self::insert_absent(&mut inner, records);
        (removed, inserted)
    }

    fn remove_port_records(inner: &mut StoreInner, port: &Port) -> usize {
        let before = inner.records.len();
        inner.records.retain(|_, record| &record.port != port);
        before - inner.records.len()
    }

    fn insert_absent(
        inner: &mut StoreInner,
        records: impl IntoIterator<Item = ClientRecord>,
    ) -> usize {
        let mut inserted = 0;
        for record in records {
            if inner.records.contains_key(&record.name) {
                continue;
            }
            if let Some(layer) = non_blank(record.layer.as_deref()) {
                inner.known_layers.insert(layer.to_string());
            }
            inner.records.insert(record.name.clone(), record);
            inserted += 1;
        }
        inserted
    }

    /// All records, sorted by name.
    pub fn records(&self) -> Vec<ClientRecord> {
        let mut records: Vec<_> = self.lock().records.values().cloned().collect();
        records.sort_by(|a, b| a.name.cmp(&b.name));
        records
    }

    pub fn len(&self) -> usize {
        self.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every layer ever inserted, including those of removed records.
    pub fn known_layers(&self) -> Vec<String> {
        self.lock().known_layers.iter().cloned().collect()
    }

    /// Ports with a registered session, ascending.
    pub fn known_ports(&self) -> Vec<Port> {
        self.lock().session_path_by_port.keys().cloned().collect()
    }

    pub fn session_path(&self, port: &Port) -> Option<String> {
        self.lock().session_path_by_port.get(port).cloned()
    }

    pub fn set_session_path(&self, port: Port, path: String) {
        self.lock().session_path_by_port.insert(port, path);
    }

    pub fn forget_port(&self, port: &Port) {
        self.lock().session_path_by_port.remove(port);
    }
}
