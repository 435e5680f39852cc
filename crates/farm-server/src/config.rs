//! Configuration for the farm TCP server.
//!
//! For now this is intentionally simple: you can either use defaults
//! or override via a few environment variables:
//!
//! - `FARM_BIND_ADDR`   (default: "0.0.0.0")
//! - `FARM_PORT`        (default: "5555")
//! - `FARM_MAX_CLIENTS` (default: "1024")
//! - `FARM_DATA_DIR`    (default: "data")
//! - `FARM_GROW_MS`     (default: "5000")
//!
//! Tests construct a `Config` directly instead, usually with a scratch
//! data directory and a short grow timer.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use farm_core::engine::GROW_DURATION_MS;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// IP address / interface to bind to (e.g. "0.0.0.0" or "127.0.0.1").
    pub bind_addr: String,

    /// TCP port to listen on.
    pub port: u16,

    /// Maximum number of simultaneously connected clients.
    pub max_clients: usize,

    /// Directory holding the three snapshot files.
    pub data_dir: PathBuf,

    /// Plot growth duration in milliseconds.
    pub grow_ms: i64,
}

impl Config {
    /// Construct a `Config` from environment variables, falling back
    /// to reasonable defaults.
    pub fn from_env() -> anyhow::Result<Self> {
        let bind_addr = env::var("FARM_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = read_env_or_default("FARM_PORT", 5555u16)?;
        let max_clients = read_env_or_default("FARM_MAX_CLIENTS", 1024usize)?;
        let data_dir =
            PathBuf::from(env::var("FARM_DATA_DIR").unwrap_or_else(|_| "data".to_string()));
        let grow_ms = read_env_or_default("FARM_GROW_MS", GROW_DURATION_MS)?;

        Ok(Config {
            bind_addr,
            port,
            max_clients,
            data_dir,
            grow_ms,
        })
    }

    /// Convenience: `addr:port` socket string.
    pub fn socket_addr_string(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }
}

fn read_env_or_default<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(val) => Ok(val.parse::<T>()?),
        Err(_) => Ok(default),
    }
}
