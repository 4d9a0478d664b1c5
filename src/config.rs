use std::env;
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;

/// Engine/server configuration.
///
/// Built programmatically or from `SCORMTRACK_*` environment variables; the
/// server binary layers CLI flags on top.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Bind address for the HTTP boundary.
    pub host: IpAddr,

    /// Bind port.
    pub port: u16,

    /// Where to load/save the durable store snapshot. `None` runs purely
    /// in memory.
    pub snapshot_path: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 3080,
            snapshot_path: None,
        }
    }

    pub fn host(mut self, host: IpAddr) -> Self {
        self.host = host;
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn snapshot_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.snapshot_path = Some(path.into());
        self
    }

    /// Read configuration from the environment. Unset variables keep their
    /// defaults; a malformed value is an error, not a silent fallback.
    pub fn from_env() -> Result<Self, String> {
        let mut config = Self::new();
        if let Ok(raw) = env::var("SCORMTRACK_HOST") {
            config.host = raw
                .parse()
                .map_err(|_| format!("invalid SCORMTRACK_HOST='{raw}'"))?;
        }
        if let Ok(raw) = env::var("SCORMTRACK_PORT") {
            config.port = raw
                .parse()
                .map_err(|_| format!("invalid SCORMTRACK_PORT='{raw}'"))?;
        }
        if let Ok(raw) = env::var("SCORMTRACK_SNAPSHOT") {
            if !raw.is_empty() {
                config.snapshot_path = Some(PathBuf::from(raw));
            }
        }
        Ok(config)
    }
}
