use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

use crate::http::connection::ConnectionLimits;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub pool: PoolConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub backlog: i32,
    pub idle_timeout_ms: u64,
    pub buffer_size: usize,
    pub max_header_bytes: usize,
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            backlog: 50,
            idle_timeout_ms: 30_000,
            buffer_size: 8192,
            max_header_bytes: 64 * 1024,
            max_body_bytes: 8 * 1024 * 1024,
        }
    }
}

impl ServerConfig {
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    pub fn limits(&self) -> ConnectionLimits {
        ConnectionLimits {
            max_header_bytes: self.max_header_bytes,
            max_body_bytes: self.max_body_bytes,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Worker threads; 0 means one per available core.
    pub threads: usize,
    /// Queued jobs allowed before new requests get a 500.
    pub max_load: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            threads: 0,
            max_load: 5000,
        }
    }
}

impl Config {
    /// Defaults, overlaid with the YAML file named by `WARDEN_CONFIG` and
    /// then with a `LISTEN=host:port` override.
    pub fn load() -> anyhow::Result<Self> {
        let mut config = match std::env::var("WARDEN_CONFIG") {
            Ok(path) => Self::from_file(&path)?,
            Err(_) => Self::default(),
        };

        if let Ok(listen) = std::env::var("LISTEN") {
            config.apply_listen(&listen)?;
        }

        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read config file {}", path.display()))?;
        Self::from_yaml(&text).with_context(|| format!("invalid config file {}", path.display()))
    }

    pub fn from_yaml(text: &str) -> anyhow::Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }

    /// Replaces host and port from a `host:port` string.
    pub fn apply_listen(&mut self, listen: &str) -> anyhow::Result<()> {
        let (host, port) = listen
            .rsplit_once(':')
            .with_context(|| format!("LISTEN must be host:port, got {listen:?}"))?;
        self.server.port = port
            .parse()
            .with_context(|| format!("invalid port in LISTEN: {port:?}"))?;
        self.server.host = host.to_string();
        Ok(())
    }
}
