//! Stayhub CLI - command-line front end over a sled-backed store.

pub mod commands;
pub mod config;
pub mod error;

pub use commands::execute;
pub use config::{Args, CliConfig, Command};
pub use error::{CliError, Result};

use std::sync::Arc;

use stayhub_core::{EntityService, SledStorage};

/// Open the store, run one command and shut the engine down cleanly.
pub fn run(config: CliConfig, command: Command) -> Result<serde_json::Value> {
    let storage = Arc::new(SledStorage::open(&config.data_path)?);
    let service = EntityService::new(storage.clone(), config.engine)?;

    let result = execute(&service, &config.principal, command);

    service.shutdown();
    storage.flush()?;
    result
}
