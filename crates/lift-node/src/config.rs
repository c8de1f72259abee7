//! Node configuration.
//!
//! Read from a TOML file where every field has a default, so an empty file
//! (or none at all) yields a working single-host setup.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use lift_network::TransportConfig;
use lift_protocol::{
    PeerId, DEFAULT_BROADCAST_INTERVAL, DEFAULT_BROADCAST_PORT, DEFAULT_CHANNEL_CAPACITY,
    DEFAULT_LIVENESS_POLL_INTERVAL, DEFAULT_NUM_FLOORS, DEFAULT_ORDER_REFRESH_INTERVAL,
    DEFAULT_PEER_TIMEOUT,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LiftConfig {
    pub node: NodeSection,
    pub network: NetworkSection,
    pub liveness: LivenessSection,
    pub orders: OrdersSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeSection {
    pub peer_id: u8,
    pub num_floors: u8,
    /// Capacity of every queue between actors.
    pub channel_capacity: usize,
}

impl Default for NodeSection {
    fn default() -> Self {
        Self {
            peer_id: 1,
            num_floors: DEFAULT_NUM_FLOORS,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkSection {
    pub listen_addr: String,
    pub broadcast_addrs: Vec<String>,
    pub broadcast_interval_ms: u64,
    /// Fraction of outbound datagrams dropped on purpose.
    pub simulated_loss: f64,
}

impl Default for NetworkSection {
    fn default() -> Self {
        Self {
            listen_addr: format!("0.0.0.0:{DEFAULT_BROADCAST_PORT}"),
            broadcast_addrs: vec![format!("255.255.255.255:{DEFAULT_BROADCAST_PORT}")],
            broadcast_interval_ms: DEFAULT_BROADCAST_INTERVAL.as_millis() as u64,
            simulated_loss: 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LivenessSection {
    pub poll_interval_ms: u64,
    pub peer_timeout_ms: u64,
}

impl Default for LivenessSection {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_LIVENESS_POLL_INTERVAL.as_millis() as u64,
            peer_timeout_ms: DEFAULT_PEER_TIMEOUT.as_millis() as u64,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrdersSection {
    pub refresh_interval_ms: u64,
    /// Hall request assigner executable. Without one no orders are computed.
    pub assigner_path: Option<PathBuf>,
}

impl Default for OrdersSection {
    fn default() -> Self {
        Self {
            refresh_interval_ms: DEFAULT_ORDER_REFRESH_INTERVAL.as_millis() as u64,
            assigner_path: None,
        }
    }
}

/// `<config_dir>/liftsync/config.toml`, if the platform has a config dir.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("liftsync").join("config.toml"))
}

impl LiftConfig {
    /// Load and validate the configuration.
    ///
    /// An explicit `path` must exist. Otherwise the default location is
    /// used when present, and built-in defaults when not.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(p) => Some(p.to_path_buf()),
            None => default_config_path().filter(|p| p.exists()),
        };

        let config = match path {
            Some(path) => {
                let contents = std::fs::read_to_string(&path)
                    .map_err(|source| ConfigError::Io { path: path.clone(), source })?;
                tracing::debug!(path = %path.display(), "Loaded config file");
                Self::from_toml(&contents)?
            }
            None => Self::default(),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.node.num_floors < 2 {
            return Err(ConfigError::Invalid(format!(
                "node.num_floors must be at least 2, got {}",
                self.node.num_floors
            )));
        }
        if self.node.channel_capacity == 0 {
            return Err(ConfigError::Invalid("node.channel_capacity must be positive".into()));
        }

        let intervals = [
            ("network.broadcast_interval_ms", self.network.broadcast_interval_ms),
            ("liveness.poll_interval_ms", self.liveness.poll_interval_ms),
            ("liveness.peer_timeout_ms", self.liveness.peer_timeout_ms),
            ("orders.refresh_interval_ms", self.orders.refresh_interval_ms),
        ];
        for (name, value) in intervals {
            if value == 0 {
                return Err(ConfigError::Invalid(format!("{name} must be non-zero")));
            }
        }

        if !(0.0..1.0).contains(&self.network.simulated_loss) {
            return Err(ConfigError::Invalid(format!(
                "network.simulated_loss must be in [0, 1), got {}",
                self.network.simulated_loss
            )));
        }

        self.transport_config().map(|_| ())
    }

    pub fn peer_id(&self) -> PeerId {
        PeerId(self.node.peer_id)
    }

    pub fn broadcast_interval(&self) -> Duration {
        Duration::from_millis(self.network.broadcast_interval_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.liveness.poll_interval_ms)
    }

    pub fn peer_timeout(&self) -> Duration {
        Duration::from_millis(self.liveness.peer_timeout_ms)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.orders.refresh_interval_ms)
    }

    pub fn transport_config(&self) -> Result<TransportConfig, ConfigError> {
        let listen_addr = parse_addr("network.listen_addr", &self.network.listen_addr)?;

        if self.network.broadcast_addrs.is_empty() {
            return Err(ConfigError::Invalid(
                "network.broadcast_addrs needs at least one address".into(),
            ));
        }
        let broadcast_addrs = self
            .network
            .broadcast_addrs
            .iter()
            .map(|a| parse_addr("network.broadcast_addrs", a))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(TransportConfig {
            listen_addr,
            broadcast_addrs,
            simulated_loss: self.network.simulated_loss,
        })
    }
}

fn parse_addr(field: &str, value: &str) -> Result<SocketAddr, ConfigError> {
    value
        .parse()
        .map_err(|e| ConfigError::Invalid(format!("{field}: '{value}' is not an address: {e}")))
}
