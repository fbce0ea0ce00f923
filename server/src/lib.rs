//! # Guessing Arena Server Library
//!
//! Matchmaking and session orchestration for a round-based number-guessing
//! game played over persistent TCP connections. Players sign in, wait in a
//! queue for their chosen mode, and are grouped into teams that each play one
//! game on a bounded pool of session workers. Ranked games move the players'
//! rank points and tiers.
//!
//! ## Core Responsibilities
//!
//! ### Matchmaking
//! Two FIFO queues, one per game mode, each behind its own lock. The ranked
//! queue is grouped by rank tier so ranked teams never mix tiers. Teams are
//! cut from the front of a queue and removed from it in the same critical
//! section.
//!
//! ### Session Execution
//! A session owns its team for the whole game. Rounds are played turn by turn
//! in team order: every player guesses once per round and the closest guess
//! wins. Connection faults count as a forfeited turn and never abort the game.
//!
//! ### Rank Settlement
//! Ranked games award points per round won plus a bonus for the game winner,
//! and penalise players who won nothing. Tiers are derived from the points.
//!
//! ## Architecture Design
//!
//! ### Event Loop
//! The server runs one accept loop that also drains [`network::ServerEvent`]s.
//! Handshakes and post-game choices each run on their own task, so a slow
//! client never holds up the loop.
//!
//! ### Bounded Session Pool
//! Formed teams wait in a bounded job queue for one of a fixed number of
//! workers. When the queue is full the dispatcher either waits or hands the
//! team back, depending on its [`dispatcher::AdmissionPolicy`].
//!
//! ## Module Organization
//!
//! - `rank`: point totals, tiers and tier movement
//! - `player`: a signed-in player and their connection
//! - `store` / `roster`: registered players and who is online
//! - `teams` / `matchmaking`: queues and team formation
//! - `game` / `session`: round rules and the per-game driver
//! - `dispatcher`: the session worker pool
//! - `lobby`: sign-in, mode selection, admission and post-game flow
//! - `network`: TCP listener and the main loop
//! - `config`: runtime settings
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig {
//!         port: 5000,
//!         ephemeral: true,
//!         ..ServerConfig::default()
//!     };
//!
//!     // Accepts connections and runs games until a shutdown event arrives.
//!     let mut server = Server::new(config).await?;
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod dispatcher;
pub mod game;
pub mod lobby;
pub mod matchmaking;
pub mod network;
pub mod player;
pub mod rank;
pub mod roster;
pub mod session;
pub mod store;
pub mod teams;
