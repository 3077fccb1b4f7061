use anyhow::{Context, Result};
use serde::Deserialize;
use std::{
    env,
    net::{SocketAddr, ToSocketAddrs},
    time::Duration,
};

pub const IN_MEMORY_DATABASE: &str = ":memory:";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub listen_addr: SocketAddr,
    pub database_url: String,
    pub max_pool_size: u32,
    pub api_key: Option<String>,
    pub probe_timeout: Duration,
    pub recent_checks_limit: i64,
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(default)]
    assets_listen_addr: Option<String>,
    #[serde(default)]
    assets_listen_host: Option<String>,
    #[serde(default)]
    assets_listen_port: Option<u16>,
    #[serde(default)]
    assets_database_url: Option<String>,
    #[serde(default)]
    database_url: Option<String>,
    #[serde(default = "default_pool_size")]
    assets_max_pool_size: u32,
    #[serde(default)]
    assets_api_key: Option<String>,
    #[serde(default = "default_probe_timeout_ms")]
    assets_probe_timeout_ms: u64,
    #[serde(default = "default_recent_checks_limit")]
    assets_recent_checks_limit: i64,
}

const fn default_pool_size() -> u32 {
    1
}

const fn default_probe_timeout_ms() -> u64 {
    2000
}

const fn default_recent_checks_limit() -> i64 {
    10
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_vars(env::vars())
    }

    pub fn from_vars<I>(vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let raw: RawConfig =
            envy::from_iter(vars).context("failed to parse ASSETS_* environment variables")?;

        let listen_addr = resolve_addr(
            raw.assets_listen_addr,
            raw.assets_listen_host,
            raw.assets_listen_port,
        )?;

        let database_url = raw
            .assets_database_url
            .or(raw.database_url)
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty())
            .unwrap_or_else(|| "assets.db".to_string());

        let api_key = raw.assets_api_key.filter(|key| !key.trim().is_empty());

        let mut config = Self {
            listen_addr,
            database_url,
            max_pool_size: raw.assets_max_pool_size.max(1),
            api_key,
            probe_timeout: Duration::from_millis(raw.assets_probe_timeout_ms.max(1)),
            recent_checks_limit: raw.assets_recent_checks_limit.max(1),
        };

        // Each connection to an in-memory database opens a separate database.
        if config.is_in_memory() {
            config.max_pool_size = 1;
        }

        Ok(config)
    }

    pub fn is_in_memory(&self) -> bool {
        self.database_url == IN_MEMORY_DATABASE
    }
}

fn resolve_addr(
    addr: Option<String>,
    host: Option<String>,
    port: Option<u16>,
) -> Result<SocketAddr> {
    if let Some(addr) = addr {
        return addr
            .to_socket_addrs()
            .context("invalid ASSETS_LISTEN_ADDR value")?
            .next()
            .context("ASSETS_LISTEN_ADDR resolved to no addresses");
    }

    let host = host.unwrap_or_else(|| "0.0.0.0".to_string());
    let port = port.unwrap_or(8490);
    let combined = format!("{}:{}", host, port);
    combined
        .to_socket_addrs()
        .context("invalid listen host/port combination")?
        .next()
        .context("listen address resolved to no targets")
}
