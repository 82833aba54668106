//! `PropertyCache`: wires the store, reconciler, accessor, locator and
//! activator around one gateway, and owns the background worker.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::accessor::{PropertyAccessor, PropertyError, PropertyValue};
use crate::activator::{Activation, Activator};
use crate::config::{Config, ConfigError};
use crate::gateway::{CommandGateway, SessionGateway};
use crate::reconciler::{CycleReport, Reconciler, ReconcilerWorker};
use crate::store::{ClientRecord, ClientStore, Property};
use crate::windows::{WindowCandidate, WindowError, WindowLocator};

pub struct PropertyCache {
    config: Config,
    store: Arc<ClientStore>,
    reconciler: Arc<Reconciler>,
    accessor: Arc<PropertyAccessor>,
    locator: WindowLocator,
    activator: Activator,
    worker: Option<ReconcilerWorker>,
}

impl PropertyCache {
    /// Build a cache over `gateway` without starting the background loop.
    pub fn new(config: Config, gateway: Arc<dyn SessionGateway>) -> Result<Self, ConfigError> {
        config.validate()?;
        let store = Arc::new(ClientStore::new());
        let reconciler = Arc::new(Reconciler::new(
            Arc::clone(&gateway),
            Arc::clone(&store),
            config.jack_name_separator,
        ));
        let accessor = Arc::new(PropertyAccessor::new(
            Arc::clone(&gateway),
            Arc::clone(&store),
            config.pid_placeholder.clone(),
        ));
        let locator = WindowLocator::new(
            Arc::clone(&gateway),
            Arc::clone(&accessor),
            config.session_manager_label.clone(),
        );
        let activator = Activator::new(gateway, Arc::clone(&accessor));

        Ok(Self {
            config,
            store,
            reconciler,
            accessor,
            locator,
            activator,
            worker: None,
        })
    }

    /// Build a cache over the external tools named in `config`.
    pub fn with_command_gateway(config: Config) -> Result<Self, ConfigError> {
        let gateway = Arc::new(CommandGateway::new(&config));
        Self::new(config, gateway)
    }

    /// Build a cache and start reconciling right away.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn start(config: Config, gateway: Arc<dyn SessionGateway>) -> Result<Self, ConfigError> {
        let mut cache = Self::new(config, gateway)?;
        cache.spawn_reconciler();
        Ok(cache)
    }

    /// Start the background loop if it is not running.
    pub fn spawn_reconciler(&mut self) {
        if self.worker.as_ref().is_some_and(|w| !w.is_stopped()) {
            return;
        }
        self.worker = Some(ReconcilerWorker::spawn(
            Arc::clone(&self.reconciler),
            self.config.refresh_interval,
        ));
    }

    /// Signal the background loop to stop without waiting for it.
    pub fn stop(&self) {
        if let Some(worker) = &self.worker {
            worker.stop();
        }
    }

    /// Stop the background loop and wait for it to exit.
    pub async fn shutdown(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.shutdown().await;
        }
    }

    pub fn is_running(&self) -> bool {
        self.worker.as_ref().is_some_and(|w| !w.is_stopped())
    }

    /// Run one reconciliation cycle on the calling thread. `None` if a
    /// cycle is already in flight.
    pub fn refresh_now(&self) -> Option<CycleReport> {
        self.reconciler.run_cycle(&CancellationToken::new())
    }

    pub fn get_property(&self, name: &str, property: Property) -> Option<PropertyValue> {
        self.accessor.get_property(name, property)
    }

    pub fn get_property_named(
        &self,
        name: &str,
        property: &str,
    ) -> Result<Option<PropertyValue>, PropertyError> {
        self.accessor.get_property_named(name, property)
    }

    pub fn find_windows(&self, name: &str) -> Vec<WindowCandidate> {
        self.locator.find_windows(name)
    }

    /// Window search by pid and/or title pattern with a window-tool
    /// option string; an unsupported option is rejected.
    pub fn search_windows(
        &self,
        pid: Option<u32>,
        pattern: Option<&str>,
        option: &str,
    ) -> Result<Vec<WindowCandidate>, WindowError> {
        self.locator.search(pid, pattern, option)
    }

    pub fn activate(&self, name: &str, window_id: Option<&str>) -> Activation {
        self.activator.activate(name, window_id)
    }

    pub fn record(&self, name: &str) -> Option<ClientRecord> {
        self.accessor.record(name)
    }

    pub fn records(&self) -> Vec<ClientRecord> {
        self.store.records()
    }

    /// Every layer seen since the cache was built.
    pub fn layers(&self) -> Vec<String> {
        self.store.known_layers()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}
