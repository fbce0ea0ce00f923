//! Lobby: everything a connection goes through outside of a game.
//!
//! A new connection authenticates, picks a mode, and is admitted to that
//! mode's queue. Admission also runs team formation and hands every formed
//! team to the dispatcher. After a game each player is offered another round
//! through the same path.

use crate::dispatcher::{DispatchError, SessionDispatcher};
use crate::matchmaking::Matchmaker;
use crate::player::{generate_token, Player};
use crate::roster::{AuthError, Roster};
use crate::store::StoreError;
use crate::teams::Team;
use log::{debug, error, info, warn};
use shared::{messages, AuthChoice, Connection, EndChoice, GameMode, ProtocolError};
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HandshakeError {
    #[error("transport error: {0}")]
    Transport(#[from] io::Error),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error("player store error: {0}")]
    Store(#[from] StoreError),
}

/// A connection counted against the player cap while it signs in. The count
/// is released on drop.
pub struct HandshakeSlot {
    pending: Arc<AtomicUsize>,
}

impl Drop for HandshakeSlot {
    fn drop(&mut self) {
        self.pending.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct Lobby {
    roster: Arc<Roster>,
    matchmaker: Matchmaker,
    dispatcher: SessionDispatcher,
    handshakes: Arc<AtomicUsize>,
}

impl Lobby {
    pub fn new(roster: Arc<Roster>, matchmaker: Matchmaker, dispatcher: SessionDispatcher) -> Self {
        Self {
            roster,
            matchmaker,
            dispatcher,
            handshakes: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn roster(&self) -> &Arc<Roster> {
        &self.roster
    }

    pub fn matchmaker(&self) -> &Matchmaker {
        &self.matchmaker
    }

    pub fn dispatcher(&self) -> &SessionDispatcher {
        &self.dispatcher
    }

    pub fn reserve_handshake(&self) -> HandshakeSlot {
        self.handshakes.fetch_add(1, Ordering::SeqCst);
        HandshakeSlot {
            pending: Arc::clone(&self.handshakes),
        }
    }

    /// Signed-in players plus connections still authenticating.
    pub async fn occupancy(&self) -> usize {
        self.roster.online_count().await + self.handshakes.load(Ordering::SeqCst)
    }

    /// Runs a fresh connection through sign-in and mode selection and admits
    /// it to a queue. `slot` is held until the player is signed in.
    pub async fn handle_connection(&self, connection: Connection, slot: HandshakeSlot) {
        let signed_in = self.authenticate(connection).await;
        drop(slot);
        match signed_in {
            Ok(player) => self.enter(player).await,
            Err(e) => warn!("Handshake failed: {}", e),
        }
    }

    /// Reads the auth choice, then credentials until they are accepted.
    pub async fn authenticate(&self, mut connection: Connection) -> Result<Player, HandshakeError> {
        let choice = AuthChoice::try_from(connection.recv_int().await?)?;

        loop {
            let username = connection.recv_text().await?;
            let password = connection.recv_text().await?;
            let token = generate_token();

            let outcome = match choice {
                AuthChoice::Login => self.roster.login(&username, &password, &token).await,
                AuthChoice::Register => self.roster.register(&username, &password, &token).await,
            };

            let rank = match outcome {
                Ok(rank) => rank,
                Err(AuthError::Store(e)) => return Err(e.into()),
                Err(e) => {
                    debug!("Authentication attempt for {:?} refused: {}", username, e);
                    connection.send_text(refusal_text(&e)).await?;
                    continue;
                }
            };

            let reply = match choice {
                AuthChoice::Login => messages::welcome_back(&username),
                AuthChoice::Register => messages::REGISTERED.to_string(),
            };
            if let Err(e) = connection.send_text(&reply).await {
                self.roster.logout(&username).await;
                return Err(e.into());
            }

            return Ok(Player::with_token(username, token, rank, connection));
        }
    }

    pub async fn select_mode(&self, player: &mut Player) -> Result<GameMode, HandshakeError> {
        let value = player.recv_int().await?;
        Ok(GameMode::try_from(value)?)
    }

    /// Mode selection followed by admission. Signs the player out if the
    /// selection cannot be read.
    async fn enter(&self, mut player: Player) {
        match self.select_mode(&mut player).await {
            Ok(mode) => self.admit(player, mode).await,
            Err(e) => {
                warn!("{} failed to select a game mode: {}", player.username(), e);
                self.disconnect(player).await;
            }
        }
    }

    /// Confirms the queue to the player, enqueues them, and starts whatever
    /// teams the queue now allows.
    pub async fn admit(&self, mut player: Player, mode: GameMode) {
        if let Err(e) = player.send(&messages::queued(mode)).await {
            warn!("Failed to confirm queue to {}: {}", player.username(), e);
            self.disconnect(player).await;
            return;
        }

        self.matchmaker.enqueue(player, mode).await;
        self.start_games(mode).await;
    }

    /// Forms teams for `mode` and dispatches them. Teams refused by a full
    /// pool go back to the head of the queue in their original order.
    pub async fn start_games(&self, mode: GameMode) {
        let mut returned: Vec<Team> = Vec::new();

        for team in self.matchmaker.form_teams(mode).await {
            if !returned.is_empty() {
                returned.push(team);
                continue;
            }

            match self.dispatcher.dispatch(team, mode).await {
                Ok(id) => info!("{} ({}) handed to the session pool", id, mode),
                Err(DispatchError::Saturated(team)) => {
                    warn!("Session pool is saturated, {} players go back to the {} queue", team.len(), mode);
                    returned.push(team);
                }
                Err(DispatchError::Closed(team)) => {
                    error!("Session pool is closed, signing out {} players", team.len());
                    for player in team.into_players() {
                        self.disconnect(player).await;
                    }
                }
            }
        }

        for team in returned.into_iter().rev() {
            self.matchmaker.requeue_front(team, mode).await;
        }
    }

    /// Reads the post-game choice of one player and acts on it.
    pub async fn after_game(&self, mut player: Player) {
        let choice = match player.recv_int().await {
            Ok(value) => EndChoice::try_from(value).map_err(HandshakeError::from),
            Err(e) => Err(HandshakeError::from(e)),
        };

        match choice {
            Ok(EndChoice::PlayAgain) => {
                info!("{} chose to play again", player.username());
                self.enter(player).await;
            }
            Ok(EndChoice::Disconnect) => self.disconnect(player).await,
            Err(e) => {
                warn!("Lost {} after the game: {}", player.username(), e);
                self.disconnect(player).await;
            }
        }
    }

    async fn disconnect(&self, mut player: Player) {
        let username = player.username().to_string();
        self.roster.logout(&username).await;
        if let Err(e) = player.connection().shutdown().await {
            debug!("Shutdown of {}'s connection failed: {}", username, e);
        }
    }

    pub async fn log_status(&self) {
        let online = self.roster.online_count().await;
        let simple = self.matchmaker.len(GameMode::Simple).await;
        let ranked = self.matchmaker.len(GameMode::Ranked).await;
        let pool = self.dispatcher.pool_snapshot();
        info!(
            "Status: {} active games ({} running, {} waiting), {} players online, queued simple={} ranked={}",
            pool.active_sessions, pool.busy_workers, pool.queued, online, simple, ranked
        );
    }
}

fn refusal_text(error: &AuthError) -> &'static str {
    match error {
        AuthError::UsernameTaken(_) => messages::USERNAME_TAKEN,
        AuthError::InvalidUsername(_) => messages::USERNAME_INVALID,
        AuthError::InvalidPassword => messages::PASSWORD_INVALID,
        _ => messages::LOGIN_FAILED,
    }
}
