//! Server network layer: TCP accept loop, session events and the liveness
//! monitor.

use crate::config::ServerConfig;
use crate::dispatcher::SessionDispatcher;
use crate::lobby::Lobby;
use crate::matchmaking::Matchmaker;
use crate::roster::Roster;
use crate::session::SessionReport;
use crate::store::{CsvPlayerStore, MemoryPlayerStore, PlayerStore};
use log::{debug, error, info, warn};
use shared::{Connection, GameMode};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

/// Messages sent to the main server loop
#[derive(Debug)]
pub enum ServerEvent {
    /// A session released its worker; its players wait for their post-game
    /// choice.
    SessionFinished(SessionReport),
    Shutdown,
}

/// Main server tying the listener to the lobby
pub struct Server {
    listener: TcpListener,
    lobby: Arc<Lobby>,
    config: ServerConfig,

    event_tx: mpsc::UnboundedSender<ServerEvent>,
    event_rx: mpsc::UnboundedReceiver<ServerEvent>,
}

impl Server {
    /// Opens the configured player store and binds the listener.
    pub async fn new(config: ServerConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let store: Box<dyn PlayerStore> = if config.ephemeral {
            info!("Using an in-memory player store");
            Box::new(MemoryPlayerStore::default())
        } else {
            info!("Using player file {}", config.players_file.display());
            Box::new(CsvPlayerStore::new(&config.players_file))
        };
        Self::with_store(config, store).await
    }

    pub async fn with_store(
        config: ServerConfig,
        store: Box<dyn PlayerStore>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let roster = Arc::new(Roster::load(store)?);

        let listener = TcpListener::bind(config.bind_addr()).await?;
        info!("Server listening on {}", listener.local_addr()?);

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let dispatcher = SessionDispatcher::start(
            config.pool_capacity,
            config.queue_bound,
            config.admission,
            Arc::clone(&roster),
            event_tx.clone(),
        );
        let lobby = Arc::new(Lobby::new(roster, Matchmaker::new(config.remainder), dispatcher));

        Ok(Server {
            listener,
            lobby,
            config,
            event_tx,
            event_rx,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn lobby(&self) -> Arc<Lobby> {
        Arc::clone(&self.lobby)
    }

    /// Handle for stopping the loop from outside, e.g. on ctrl-c.
    pub fn event_sender(&self) -> mpsc::UnboundedSender<ServerEvent> {
        self.event_tx.clone()
    }

    /// Spawns task that periodically snapshots the signed-in players
    fn spawn_liveness_monitor(&self) {
        let lobby = Arc::clone(&self.lobby);
        let period = self.config.monitor_interval;

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);

            loop {
                interval.tick().await;

                let online = lobby.roster().online_snapshot().await;
                for player in &online {
                    debug!(
                        "Online: {} (token {}, {} points)",
                        player.username, player.token, player.rank_points
                    );
                }
                lobby.log_status().await;
            }
        });
    }

    async fn handle_connection(&self, stream: TcpStream, addr: SocketAddr) {
        let occupancy = self.lobby.occupancy().await;
        if occupancy >= self.config.max_players {
            warn!(
                "Rejecting connection from {}: {} players online or signing in",
                addr, occupancy
            );
            return;
        }
        let slot = self.lobby.reserve_handshake();

        if let Err(e) = stream.set_nodelay(true) {
            debug!("Could not disable Nagle for {}: {}", addr, e);
        }

        info!("New connection from {}", addr);
        let connection = Connection::new(stream).with_read_timeout(self.config.read_timeout);
        let lobby = Arc::clone(&self.lobby);
        tokio::spawn(async move {
            lobby.handle_connection(connection, slot).await;
        });
    }

    /// Each player decides on their own after a game, so every one of them
    /// gets a task. Teams a full pool refused earlier get another chance now
    /// that a worker is free.
    fn handle_session_finished(&self, report: SessionReport) {
        info!(
            "{} ({}) released its worker, {} players returning to the lobby",
            report.id,
            report.mode,
            report.team.len()
        );

        for player in report.team.into_players() {
            let lobby = Arc::clone(&self.lobby);
            tokio::spawn(async move {
                lobby.after_game(player).await;
            });
        }

        let lobby = Arc::clone(&self.lobby);
        tokio::spawn(async move {
            for mode in [GameMode::Simple, GameMode::Ranked] {
                lobby.start_games(mode).await;
            }
        });
    }

    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.spawn_liveness_monitor();

        info!("Server started successfully");

        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, addr)) => self.handle_connection(stream, addr).await,
                        Err(e) => {
                            error!("Error accepting connection: {}", e);
                            tokio::time::sleep(Duration::from_millis(10)).await;
                        }
                    }
                },

                event = self.event_rx.recv() => {
                    match event {
                        Some(ServerEvent::SessionFinished(report)) => self.handle_session_finished(report),
                        Some(ServerEvent::Shutdown) | None => {
                            info!("Server shutting down");
                            break;
                        }
                    }
                },
            }
        }

        self.lobby.log_status().await;
        Ok(())
    }
}
