pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod forms;
pub mod models;
pub mod probe;
pub mod recorders;
pub mod registry;
pub mod schema;
pub mod server;
pub mod state;
pub mod telemetry;

use crate::{config::AppConfig, server::Server};

/// Boots the inventory service using environment configuration.
pub async fn run() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;
    Server::new(config).await?.run().await
}
