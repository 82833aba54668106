//! Property accessor: single-property lookups with instance-name
//! normalisation and pid resolution through the session manager.
//!
//! Record lookups take the store lock once and return a clone; the
//! gateway calls of pid resolution run on that clone with no lock held,
//! so a pid may be resolved for a client that was removed meanwhile.

use std::fmt;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde::Serialize;
use tracing::{debug, warn};

use crate::gateway::SessionGateway;
use crate::store::{ClientRecord, ClientStore, Property, UnknownProperty};

static TRAILING_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+$").expect("trailing number pattern is valid"));

#[derive(Debug, thiserror::Error)]
pub enum PropertyError {
    #[error(transparent)]
    Unknown(#[from] UnknownProperty),
}

/// Resolved property value. Pids are `0` when the client is not running
/// or the chain could not be followed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Text(String),
    Pid(u32),
}

impl PropertyValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Pid(_) => None,
        }
    }

    pub fn as_pid(&self) -> Option<u32> {
        match self {
            Self::Pid(pid) => Some(*pid),
            Self::Text(_) => None,
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.write_str(text),
            Self::Pid(pid) => write!(f, "{pid}"),
        }
    }
}

pub struct PropertyAccessor {
    gateway: Arc<dyn SessionGateway>,
    store: Arc<ClientStore>,
    pid_placeholder: String,
}

impl PropertyAccessor {
    pub fn new(
        gateway: Arc<dyn SessionGateway>,
        store: Arc<ClientStore>,
        pid_placeholder: impl Into<String>,
    ) -> Self {
        Self {
            gateway,
            store,
            pid_placeholder: pid_placeholder.into(),
        }
    }

    /// `name` with its trailing number replaced by the placeholder, if it
    /// ends in digits.
    pub fn template_name(&self, name: &str) -> Option<String> {
        TRAILING_NUMBER
            .find(name)
            .map(|m| format!("{}{}", &name[..m.start()], self.pid_placeholder))
    }

    /// Record registered under the template name if there is one,
    /// otherwise under `name` itself.
    pub fn record(&self, name: &str) -> Option<ClientRecord> {
        match self.template_name(name) {
            Some(template) => self.store.first_of([template.as_str(), name]),
            None => self.store.first_of([name]),
        }
    }

    /// Resolve `property` for client `name`. Unknown clients yield `None`
    /// for every property.
    pub fn get_property(&self, name: &str, property: Property) -> Option<PropertyValue> {
        let record = self.record(name);
        let Some(record) = record else {
            debug!(%name, %property, "client not registered");
            return None;
        };

        let value = match property {
            Property::Pid => Some(PropertyValue::Pid(self.resolve_pid(&record))),
            other => record.field(other).map(PropertyValue::Text),
        };
        debug!(%name, %property, ?value, "property");
        value
    }

    /// String-keyed entry point. Unknown property names are rejected.
    pub fn get_property_named(
        &self,
        name: &str,
        property: &str,
    ) -> Result<Option<PropertyValue>, PropertyError> {
        let property: Property = property.parse()?;
        Ok(self.get_property(name, property))
    }

    /// Resolved pid of `name`; `None` for unknown clients.
    pub fn pid(&self, name: &str) -> Option<u32> {
        self.record(name).map(|record| self.resolve_pid(&record))
    }

    /// Follow the pid chain for `record`: the session manager's pid, then
    /// one child level per proxy layer. Any failure yields `0`.
    pub fn resolve_pid(&self, record: &ClientRecord) -> u32 {
        let (Some(client_id), Some(client_type)) = (&record.client_id, &record.client_type) else {
            return 0;
        };

        let mut pid = match self.gateway.client_pid(&record.port, client_id) {
            Ok(pid) => pid,
            Err(e) => {
                warn!(client = %record.name, %client_id, error = %e, "pid lookup failed");
                return 0;
            }
        };

        for level in 0..client_type.child_depth() {
            if pid == 0 {
                break;
            }
            pid = match self.gateway.list_children(pid) {
                Ok(children) => children.first().copied().unwrap_or(0),
                Err(e) => {
                    warn!(client = %record.name, pid, error = %e, "child lookup failed");
                    0
                }
            };
            debug!(client = %record.name, level, pid, "proxy child");
        }

        debug!(client = %record.name, pid, "final pid");
        pid
    }
}
