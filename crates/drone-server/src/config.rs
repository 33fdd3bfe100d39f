//! Server configuration from environment.

use std::env;
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use drone_core::{Fleet, FleetEntry};

const DEFAULT_HEARTBEAT: Duration = Duration::from_secs(30);
const MIN_HEARTBEAT: Duration = Duration::from_millis(5);

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: IpAddr,
    /// WebSocket control endpoint.
    pub control_port: u16,
    /// HTTP directory endpoint.
    pub directory_port: u16,
    /// Lock lease; `None` keeps locks until the session ends.
    pub lock_lease: Option<Duration>,
    pub lease_sweep_interval: Duration,
    /// Batch queue slots per session.
    pub queue_capacity: usize,
    /// JSON list of `{id, model, name}` entries.
    pub fleet_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: IpAddr::V4(Ipv4Addr::LOCALHOST),
            control_port: 8765,
            directory_port: 8081,
            lock_lease: Some(Duration::from_secs(300)),
            lease_sweep_interval: Duration::from_secs(5),
            queue_capacity: 16,
            fleet_file: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            bind_addr: env::var("DRONE_BIND_ADDR")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.bind_addr),
            control_port: env::var("DRONE_CONTROL_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.control_port),
            directory_port: env::var("DRONE_DIRECTORY_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.directory_port),
            // 0 disables leases.
            lock_lease: match env::var("DRONE_LOCK_LEASE_SECS")
                .ok()
                .and_then(|s| s.parse::<u64>().ok())
            {
                Some(0) => None,
                Some(secs) => Some(Duration::from_secs(secs)),
                None => defaults.lock_lease,
            },
            lease_sweep_interval: env::var("DRONE_LEASE_SWEEP_SECS")
                .ok()
                .and_then(|s| s.parse::<u64>().ok())
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.lease_sweep_interval),
            queue_capacity: env::var("DRONE_QUEUE_CAPACITY")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.queue_capacity),
            fleet_file: env::var("DRONE_FLEET_FILE").ok().map(PathBuf::from),
        }
    }

    /// How often a connection task pings its peer.
    ///
    /// Three pings fit in one lease, so a responsive client keeps its drone
    /// even while it sends no commands.
    pub fn heartbeat_interval(&self) -> Duration {
        self.lock_lease
            .map(|lease| lease / 3)
            .unwrap_or(DEFAULT_HEARTBEAT)
            .clamp(MIN_HEARTBEAT, DEFAULT_HEARTBEAT)
    }

    /// Fleet entries from the fleet file, or the built-in fleet.
    pub fn fleet_entries(&self) -> Result<Vec<FleetEntry>> {
        let Some(path) = self.fleet_file.as_ref() else {
            return Ok(Fleet::default_entries());
        };
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading fleet file {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("parsing fleet file {}", path.display()))
    }
}
