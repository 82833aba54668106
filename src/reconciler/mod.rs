//! Reconciler: diffs the live sessions reported by the gateway against
//! the last observed session-per-port mapping and adds or tears down
//! client records accordingly.
//!
//! One cycle:
//! 1. every known port is provisionally marked for removal;
//! 2. each live numeric port is fetched and either registered, replaced
//!    (session path changed) or kept;
//! 3. ports still marked are torn down, strictly after step 2.
//!
//! Refreshing a port never overwrites an already-registered client name;
//! names only disappear through whole-port teardown.

pub mod worker;

use std::collections::BTreeSet;
use std::path::{Component, Path};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::gateway::{Port, SessionGateway};
use crate::store::{ClientRecord, ClientStore, ClientType, parse_with_gui};

pub use worker::ReconcilerWorker;

/// Custom data keys read for every client.
const KEY_JACK_NAMES: &str = "jacknames";
const KEY_LAYER: &str = "layer";
const KEY_WITH_GUI: &str = "with_gui";
const KEY_WINDOW_TITLE: &str = "windowtitle";
const KEY_GUI_TO_LOAD: &str = "guitoload";
const KEY_CLIENT_TYPE: &str = "clienttype";

/// What one reconciliation cycle changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub added: Vec<Port>,
    pub replaced: Vec<Port>,
    pub kept: Vec<Port>,
    pub removed: Vec<Port>,
    pub records_inserted: usize,
}

impl CycleReport {
    /// True when the cycle left the store untouched.
    pub fn is_noop(&self) -> bool {
        self.added.is_empty()
            && self.replaced.is_empty()
            && self.removed.is_empty()
            && self.records_inserted == 0
    }
}

/// Resets the in-progress flag when a cycle ends, including by panic.
struct CycleGuard<'a>(&'a AtomicBool);

impl<'a> CycleGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct Reconciler {
    gateway: Arc<dyn SessionGateway>,
    store: Arc<ClientStore>,
    jack_name_separator: char,
    in_progress: AtomicBool,
}

impl Reconciler {
    pub fn new(
        gateway: Arc<dyn SessionGateway>,
        store: Arc<ClientStore>,
        jack_name_separator: char,
    ) -> Self {
        Self {
            gateway,
            store,
            jack_name_separator,
            in_progress: AtomicBool::new(false),
        }
    }

    /// Run one reconciliation cycle.
    ///
    /// Returns `None` without doing anything if another cycle is still
    /// in flight. Once `cancel` fires, remaining store mutations of the
    /// cycle are dropped; gateway calls already running complete.
    pub fn run_cycle(&self, cancel: &CancellationToken) -> Option<CycleReport> {
        let Some(_guard) = CycleGuard::acquire(&self.in_progress) else {
            debug!("reconciliation already in progress, skipping");
            return None;
        };

        let mut report = CycleReport::default();
        let mut to_remove: BTreeSet<Port> = self.store.known_ports().into_iter().collect();

        let tokens = match self.gateway.list_daemons() {
            Ok(tokens) => tokens,
            Err(e) => {
                warn!(error = %e, "listing daemons failed, keeping previous sessions");
                return Some(report);
            }
        };
        debug!(?tokens, "daemons");

        for port in tokens.iter().filter_map(|token| Port::parse(token)) {
            let current = match self.gateway.session_path(&port) {
                Ok(path) => path,
                Err(e) => {
                    warn!(%port, error = %e, "reading session path failed");
                    None
                }
            };
            let previous = self.store.session_path(&port);

            match (previous, current) {
                (_, None) => {
                    debug!(%port, "no session on port");
                }
                (Some(previous), Some(current)) if previous == current => {
                    to_remove.remove(&port);
                    report.kept.push(port);
                }
                (previous, Some(current)) => {
                    let records = self.fetch_port_records(&port, &current);
                    if cancel.is_cancelled() {
                        return Some(report);
                    }
                    match previous {
                        Some(previous) => {
                            info!(%port, %previous, %current, "session replaced");
                            report.replaced.push(port.clone());
                        }
                        None => {
                            info!(%port, session = %current, "session discovered");
                            report.added.push(port.clone());
                        }
                    }
                    let (removed, inserted) = self.store.replace_port(&port, current, records);
                    debug!(%port, removed, inserted, "port records swapped");
                    report.records_inserted += inserted;
                    to_remove.remove(&port);
                }
            }
        }

        if cancel.is_cancelled() {
            return Some(report);
        }
        for port in to_remove {
            let removed = self.store.remove_by_port(&port);
            self.store.forget_port(&port);
            info!(%port, removed, "session gone");
            report.removed.push(port);
        }

        Some(report)
    }

    /// Build the records of every client on `port`. Gateway calls only;
    /// the store is not touched.
    fn fetch_port_records(&self, port: &Port, session_path: &str) -> Vec<ClientRecord> {
        let session_name = session_name(session_path);
        let client_ids = match self.gateway.list_clients(port) {
            Ok(ids) => ids,
            Err(e) => {
                warn!(%port, error = %e, "listing clients failed");
                return Vec::new();
            }
        };

        let mut records = Vec::new();
        for client_id in client_ids {
            let names: Vec<String> = match self.gateway.custom_data_list(
                port,
                &client_id,
                KEY_JACK_NAMES,
                self.jack_name_separator,
            ) {
                Ok(Some(names)) => names
                    .into_iter()
                    .map(|name| name.trim().to_string())
                    .filter(|name| !name.is_empty())
                    .collect(),
                Ok(None) => Vec::new(),
                Err(e) => {
                    debug!(%port, %client_id, error = %e, "no jack names");
                    Vec::new()
                }
            };
            if names.is_empty() {
                continue;
            }

            let template = ClientRecord {
                window_title: self.attribute(port, &client_id, KEY_WINDOW_TITLE),
                layer: self.attribute(port, &client_id, KEY_LAYER),
                gui_to_load: self.attribute(port, &client_id, KEY_GUI_TO_LOAD),
                with_gui: self
                    .attribute(port, &client_id, KEY_WITH_GUI)
                    .as_deref()
                    .and_then(parse_with_gui),
                client_type: self
                    .attribute(port, &client_id, KEY_CLIENT_TYPE)
                    .as_deref()
                    .and_then(ClientType::parse),
                session_name: session_name.clone(),
                client_id: Some(client_id.clone()),
                ..ClientRecord::new(String::new(), port.clone())
            };
            records.extend(names.into_iter().map(|name| ClientRecord {
                name,
                ..template.clone()
            }));
        }
        debug!(%port, count = records.len(), "fetched client records");
        records
    }

    fn attribute(&self, port: &Port, client_id: &str, key: &str) -> Option<String> {
        match self.gateway.custom_data(port, client_id, key) {
            Ok(value) => value,
            Err(e) => {
                debug!(%port, %client_id, key, error = %e, "custom data unavailable");
                None
            }
        }
    }
}

/// Last component of the session path after lexical normalisation:
/// `.` is dropped and `..` cancels the component before it.
fn session_name(session_path: &str) -> Option<String> {
    let mut names = Vec::new();
    for component in Path::new(session_path.trim()).components() {
        match component {
            Component::Normal(name) => names.push(name),
            Component::ParentDir => {
                names.pop();
            }
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
        }
    }
    names.last().map(|name| name.to_string_lossy().into_owned())
}
