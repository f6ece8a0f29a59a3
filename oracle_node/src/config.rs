//! Runtime configuration for the Oracle Node.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

/// TCP port Virtual Nodes register on.
pub const DEFAULT_PORT: u16 = 5000;

/// Upper bound on the readiness-wait granularity.
pub const MAX_TICK: Duration = Duration::from_secs(1);

/// Configuration for one Oracle Node process.
#[derive(Debug, Clone)]
pub struct OracleConfig {
    /// Topology config file, polled for changes every tick
    pub config_path: PathBuf,

    /// Address to listen on
    pub bind: IpAddr,

    /// TCP port to listen on (0 = ephemeral)
    pub port: u16,

    /// Readiness-wait timeout (at most `MAX_TICK`)
    pub tick: Duration,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            config_path: PathBuf::from("topology.conf"),
            bind: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            tick: MAX_TICK,
        }
    }
}

impl OracleConfig {
    /// Creates a default configuration for the given topology file.
    pub fn new(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
            ..Default::default()
        }
    }

    /// Sets the tick, clamped to `1ms..=MAX_TICK`.
    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick.clamp(Duration::from_millis(1), MAX_TICK);
        self
    }

    pub fn with_listen(mut self, bind: IpAddr, port: u16) -> Self {
        self.bind = bind;
        self.port = port;
        self
    }

    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }
}
