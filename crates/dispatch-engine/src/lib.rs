//! Dispatcher: answers polls, runs analysis backends and takes in worker
//! progress, with all job state in a shared store.

mod backend;
mod config;
mod dispatcher;
mod error;

pub use backend::{BackendRegistry, DeferredBackend, InstantBackend};
pub use config::{ConfigError, DispatcherConfig, StoreKind};
pub use dispatcher::Dispatcher;
pub use error::DispatchError;
