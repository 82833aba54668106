//! jackprops: cached client properties for session-managed JACK clients.
//!
//! A background reconciler mirrors the clients of every running session
//! manager into an in-memory store; callers query single properties,
//! resolve a client's windows and switch to or launch its GUI without
//! waiting on the session manager for anything but pid and window
//! lookups.

pub mod accessor;
pub mod activator;
pub mod cache;
pub mod config;
pub mod gateway;
pub mod reconciler;
pub mod store;
pub mod windows;

pub use cache::PropertyCache;
pub use config::Config;
pub use gateway::{CommandGateway, SessionGateway};
pub use store::{ClientRecord, Property};
