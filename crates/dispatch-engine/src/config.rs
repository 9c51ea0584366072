//! Dispatcher configuration from environment variables.

use dispatch_jobs::{CallbackEndpoint, DEFAULT_CALLBACK_HANDLE, DEFAULT_MULTI_WORKER_INSTRUMENTS};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: '{value}' ({reason})")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Backing store for job state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    /// Scratch directories on a shared filesystem.
    Fs,
    Memory,
    Sqlite,
}

impl FromStr for StoreKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fs" | "file" | "filesystem" => Ok(StoreKind::Fs),
            "memory" | "mem" => Ok(StoreKind::Memory),
            "sqlite" => Ok(StoreKind::Sqlite),
            other => Err(format!("unknown store kind '{}'", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Address the HTTP surface binds to.
    pub listen_addr: SocketAddr,
    /// Directory holding `scratch_*` and `download_*` directories.
    pub scratch_root: PathBuf,
    /// Host and port workers use to reach the callback route.
    pub server_url: String,
    pub server_port: u16,
    pub callback_handle: String,
    pub multi_worker_instruments: Vec<String>,
    pub store: StoreKind,
    pub sqlite_path: PathBuf,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8000)),
            scratch_root: PathBuf::from("."),
            server_url: "localhost".to_string(),
            server_port: 8000,
            callback_handle: DEFAULT_CALLBACK_HANDLE.to_string(),
            multi_worker_instruments: DEFAULT_MULTI_WORKER_INSTRUMENTS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            store: StoreKind::Fs,
            sqlite_path: PathBuf::from("dispatcher_state.sqlite"),
        }
    }
}

fn parse<T>(var: &'static str, value: String) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|e: T::Err| ConfigError::Invalid {
        var,
        reason: e.to_string(),
        value,
    })
}

impl DispatcherConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from any variable source; unset variables keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();
        if let Some(v) = lookup("DISPATCHER_LISTEN") {
            cfg.listen_addr = parse("DISPATCHER_LISTEN", v)?;
        }
        if let Some(v) = lookup("DISPATCHER_SCRATCH_ROOT") {
            cfg.scratch_root = PathBuf::from(v);
        }
        if let Some(v) = lookup("DISPATCHER_SERVER_URL") {
            cfg.server_url = v;
        }
        if let Some(v) = lookup("DISPATCHER_SERVER_PORT") {
            cfg.server_port = parse("DISPATCHER_SERVER_PORT", v)?;
        }
        if let Some(v) = lookup("DISPATCHER_CALLBACK_HANDLE") {
            cfg.callback_handle = v.trim_matches('/').to_string();
        }
        if let Some(v) = lookup("DISPATCHER_MULTI_WORKER_INSTRUMENTS") {
            cfg.multi_worker_instruments = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(v) = lookup("DISPATCHER_STORE") {
            cfg.store = parse("DISPATCHER_STORE", v)?;
        }
        if let Some(v) = lookup("DISPATCHER_SQLITE_PATH") {
            cfg.sqlite_path = PathBuf::from(v);
        }
        Ok(cfg)
    }

    pub fn endpoint(&self) -> CallbackEndpoint {
        CallbackEndpoint::new(self.server_url.clone(), self.server_port)
            .with_handle(self.callback_handle.clone())
    }
}
