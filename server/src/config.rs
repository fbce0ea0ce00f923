//! Server configuration.

use crate::dispatcher::AdmissionPolicy;
use crate::teams::RemainderPolicy;
use shared::DEFAULT_PORT;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Number of games that may run at the same time.
    pub pool_capacity: usize,
    /// Formed teams allowed to wait for a free worker.
    pub queue_bound: usize,
    pub admission: AdmissionPolicy,
    pub remainder: RemainderPolicy,
    /// Signed-in players accepted before new connections are turned away.
    pub max_players: usize,
    pub players_file: PathBuf,
    /// Keep registered players in memory only.
    pub ephemeral: bool,
    pub read_timeout: Option<Duration>,
    pub monitor_interval: Duration,
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            pool_capacity: 8,
            queue_bound: 32,
            admission: AdmissionPolicy::Backpressure,
            remainder: RemainderPolicy::StartUndersized,
            max_players: 50,
            players_file: PathBuf::from("players.csv"),
            ephemeral: false,
            read_timeout: None,
            monitor_interval: Duration::from_secs(10),
        }
    }
}
