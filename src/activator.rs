//! Activator: switch to a client's window or launch its GUI.
//!
//! Commands are fire-and-forget: nothing is captured from the tool and a
//! failed start is logged, never retried.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::accessor::PropertyAccessor;
use crate::gateway::{SessionGateway, SwitchScope};

/// What [`Activator::activate`] decided to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Activation {
    Switched,
    Launched,
    /// No window id and no launcher: nothing to do.
    Nothing,
}

pub struct Activator {
    gateway: Arc<dyn SessionGateway>,
    accessor: Arc<PropertyAccessor>,
}

impl Activator {
    pub fn new(gateway: Arc<dyn SessionGateway>, accessor: Arc<PropertyAccessor>) -> Self {
        Self { gateway, accessor }
    }

    /// Switch to `window_id`, scoped to the client's session or launcher
    /// when known, or launch the client's GUI when no window is given.
    pub fn activate(&self, name: &str, window_id: Option<&str>) -> Activation {
        let record = self.accessor.record(name);
        let session = record.as_ref().and_then(|r| r.session_name());
        let launcher = record.as_ref().and_then(|r| r.gui_to_load());
        let title = record.as_ref().and_then(|r| r.window_title());

        let (activation, result) = match window_id {
            Some(window_id) => {
                let scope = match (session, launcher) {
                    (Some(session), _) => SwitchScope::Session(session),
                    (None, Some(launcher)) => SwitchScope::Launcher(launcher),
                    (None, None) => SwitchScope::Unscoped,
                };
                info!(%name, %window_id, ?scope, "switching");
                (Activation::Switched, self.gateway.switch_to(scope, window_id))
            }
            None => match launcher {
                Some(launcher) => {
                    info!(%name, %launcher, "launching");
                    (Activation::Launched, self.gateway.launch(launcher, title))
                }
                None => {
                    debug!(%name, "nothing to do");
                    return Activation::Nothing;
                }
            },
        };

        if let Err(e) = result {
            warn!(%name, error = %e, "activation command failed");
        }
        activation
    }
}
