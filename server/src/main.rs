use clap::{Parser, ValueEnum};
use log::{error, info};
use server::config::ServerConfig;
use server::dispatcher::AdmissionPolicy;
use server::network::{Server, ServerEvent};
use server::teams::RemainderPolicy;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Admission {
    Backpressure,
    Reject,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Remainder {
    StartUndersized,
    KeepQueued,
}

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "0.0.0.0")]
    host: String,
    /// Server port to listen on
    #[arg(short, long, default_value_t = shared::DEFAULT_PORT)]
    port: u16,
    /// Number of games that may run at once
    #[arg(short = 'w', long, default_value = "8")]
    workers: usize,
    /// Formed teams that may wait for a free worker
    #[arg(long, default_value = "32")]
    queue_bound: usize,
    /// Behavior when the session queue is full
    #[arg(long, value_enum, default_value = "backpressure")]
    admission: Admission,
    /// Behavior for a final group smaller than the mode minimum
    #[arg(long, value_enum, default_value = "start-undersized")]
    remainder: Remainder,
    /// Maximum number of signed-in players
    #[arg(short = 'm', long, default_value = "50")]
    max_players: usize,
    /// CSV file with registered players
    #[arg(short = 'f', long, default_value = "players.csv")]
    players_file: PathBuf,
    /// Keep registered players in memory only
    #[arg(long)]
    ephemeral: bool,
    /// Seconds to wait for a client reply before treating it as gone (0 = wait forever)
    #[arg(long, default_value = "0")]
    read_timeout: u64,
    /// Seconds between liveness snapshots
    #[arg(long, default_value = "10")]
    monitor_interval: u64,
}

impl From<Args> for ServerConfig {
    fn from(args: Args) -> Self {
        ServerConfig {
            host: args.host,
            port: args.port,
            pool_capacity: args.workers,
            queue_bound: args.queue_bound,
            admission: match args.admission {
                Admission::Backpressure => AdmissionPolicy::Backpressure,
                Admission::Reject => AdmissionPolicy::Reject,
            },
            remainder: match args.remainder {
                Remainder::StartUndersized => RemainderPolicy::StartUndersized,
                Remainder::KeepQueued => RemainderPolicy::KeepQueued,
            },
            max_players: args.max_players,
            players_file: args.players_file,
            ephemeral: args.ephemeral,
            read_timeout: (args.read_timeout > 0).then(|| Duration::from_secs(args.read_timeout)),
            monitor_interval: Duration::from_secs(args.monitor_interval.max(1)),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args = Args::parse();
    let config = ServerConfig::from(args);
    info!("Starting server with {:?}", config);

    let mut server = Server::new(config).await?;

    let shutdown = server.event_sender();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for ctrl-c: {}", e);
            return;
        }
        info!("Received ctrl-c");
        if let Err(e) = shutdown.send(ServerEvent::Shutdown) {
            error!("Failed to deliver shutdown: {}", e);
        }
    });

    server.run().await
}
