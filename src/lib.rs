//! Client-side config directory
//!
//! A locally cached, watch-synchronized view of cluster, namespace and table
//! metadata stored in a strongly consistent coordination service. Callers
//! read from the cache, write through optimistic conditional writes and
//! register one change callback per entity type.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use config_directory::ConfigDirectory;
//! use config_directory::Directory;
//! use config_directory::DirectoryConfig;
//! use config_directory::InMemoryCoordinator;
//! use config_directory::NamespaceConfig;
//!
//! # async fn run() -> config_directory::Result<()> {
//! let coordinator = InMemoryCoordinator::new();
//! let config = DirectoryConfig::new()?.validate()?;
//! let directory = Directory::new(config, Arc::new(coordinator.client()))?;
//! directory.start().await?;
//!
//! directory.update_namespace_config(NamespaceConfig::new("acme")).await?;
//! let acme = directory.get_namespace_config("acme").await?;
//! assert!(acme.version > 0);
//!
//! directory.stop().await?;
//! # Ok(())
//! # }
//! ```

mod config;
mod coordination;
mod directory;
mod entity;
mod errors;
mod metrics;
mod protocol;
mod state;
mod store;
mod utils;
mod watch;

pub use config::*;
pub use coordination::*;
pub use directory::*;
pub use entity::*;
pub use errors::*;
pub use metrics::register_custom_metrics;
pub use protocol::*;
pub use state::*;
pub use store::*;
pub use watch::*;

//-----------------------------------------------------------
// Test utils

#[cfg(test)]
pub mod test_utils;
