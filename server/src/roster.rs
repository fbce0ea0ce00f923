//! Registered players and the live directory of signed-in ones.
//!
//! The roster is loaded once at startup and rewritten through its
//! [`PlayerStore`] whenever a record changes (registration, ranked results).
//! Writes run on the blocking pool after the state lock is released.

use crate::rank::Rank;
use crate::store::{PlayerRecord, PlayerStore, StoreError};
use log::{info, warn};
use std::io;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("username {0:?} is already registered")]
    UsernameTaken(String),
    #[error("username {0:?} is not allowed")]
    InvalidUsername(String),
    #[error("password contains a field or record separator")]
    InvalidPassword,
    #[error("invalid username or password")]
    InvalidCredentials,
    #[error("{0} is already logged in")]
    AlreadyOnline(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Read-only view of a signed-in player, as handed to the liveness monitor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnlinePlayer {
    pub username: String,
    pub token: String,
    pub rank_points: u32,
}

struct RosterState {
    registered: Vec<PlayerRecord>,
    online: Vec<OnlinePlayer>,
    /// Bumped on every change to `registered`.
    version: u64,
}

impl RosterState {
    fn snapshot(&mut self) -> (u64, Vec<PlayerRecord>) {
        self.version += 1;
        (self.version, self.registered.clone())
    }
}

pub struct Roster {
    state: Mutex<RosterState>,
    store: Arc<dyn PlayerStore>,
    /// Version of the last snapshot written to the store.
    persisted: Mutex<u64>,
}

impl Roster {
    pub fn load(store: Box<dyn PlayerStore>) -> Result<Self, StoreError> {
        let registered = store.load()?;
        info!("Loaded {} registered players", registered.len());
        Ok(Self {
            state: Mutex::new(RosterState {
                registered,
                online: Vec::new(),
                version: 0,
            }),
            store: Arc::from(store),
            persisted: Mutex::new(0),
        })
    }

    /// Creates a record with zero points, persists it, and signs the player in.
    pub async fn register(&self, username: &str, password: &str, token: &str) -> Result<Rank, AuthError> {
        if !is_valid_username(username) {
            return Err(AuthError::InvalidUsername(username.to_string()));
        }
        if !is_valid_field(password) {
            return Err(AuthError::InvalidPassword);
        }

        let (version, records) = {
            let mut state = self.state.lock().await;
            if state.registered.iter().any(|r| r.username == username) {
                return Err(AuthError::UsernameTaken(username.to_string()));
            }
            state.registered.push(PlayerRecord::new(username, password, 0));
            state.online.push(OnlinePlayer {
                username: username.to_string(),
                token: token.to_string(),
                rank_points: 0,
            });
            state.snapshot()
        };

        if let Err(e) = self.persist(version, records).await {
            let mut state = self.state.lock().await;
            state.registered.retain(|r| r.username != username);
            state.online.retain(|p| p.username != username);
            return Err(e.into());
        }

        info!("{} was registered successfully, token {}", username, token);
        Ok(Rank::default())
    }

    /// Signs in a registered player who is not already online.
    pub async fn login(&self, username: &str, password: &str, token: &str) -> Result<Rank, AuthError> {
        let mut state = self.state.lock().await;

        let points = state
            .registered
            .iter()
            .find(|r| r.username == username && r.password == password)
            .map(|r| r.rank_points)
            .ok_or(AuthError::InvalidCredentials)?;

        if state.online.iter().any(|p| p.username == username) {
            return Err(AuthError::AlreadyOnline(username.to_string()));
        }

        state.online.push(OnlinePlayer {
            username: username.to_string(),
            token: token.to_string(),
            rank_points: points,
        });
        info!("{} logged in, token {}", username, token);
        Ok(Rank::new(points))
    }

    /// Removes a player from the live directory. Returns false if they were
    /// not signed in.
    pub async fn logout(&self, username: &str) -> bool {
        let mut state = self.state.lock().await;
        let before = state.online.len();
        state.online.retain(|p| p.username != username);
        let removed = state.online.len() != before;
        if removed {
            info!("{} disconnected from the server", username);
        }
        removed
    }

    /// Writes new point totals for the given players and persists the roster
    /// once.
    pub async fn record_ranks(&self, updates: &[(String, u32)]) -> Result<(), StoreError> {
        let (version, records) = {
            let mut state = self.state.lock().await;
            for (username, points) in updates {
                if let Some(record) = state.registered.iter_mut().find(|r| &r.username == username) {
                    record.rank_points = *points;
                }
                if let Some(online) = state.online.iter_mut().find(|p| &p.username == username) {
                    online.rank_points = *points;
                }
            }
            state.snapshot()
        };

        self.persist(version, records).await
    }

    /// Hands a snapshot to the store unless a newer one already landed.
    async fn persist(&self, version: u64, records: Vec<PlayerRecord>) -> Result<(), StoreError> {
        let mut persisted = self.persisted.lock().await;
        if *persisted >= version {
            return Ok(());
        }

        let store = Arc::clone(&self.store);
        match tokio::task::spawn_blocking(move || store.save(&records)).await {
            Ok(result) => result?,
            Err(e) => {
                warn!("Player store write did not complete: {}", e);
                return Err(io::Error::new(io::ErrorKind::Other, e).into());
            }
        }
        *persisted = version;
        Ok(())
    }

    pub async fn online_snapshot(&self) -> Vec<OnlinePlayer> {
        self.state.lock().await.online.clone()
    }

    pub async fn online_count(&self) -> usize {
        self.state.lock().await.online.len()
    }

    pub async fn registered(&self) -> Vec<PlayerRecord> {
        self.state.lock().await.registered.clone()
    }
}

/// Credentials are stored as CSV fields, so separators are refused.
pub fn is_valid_field(value: &str) -> bool {
    !value.contains([',', '\n', '\r'])
}

pub fn is_valid_username(username: &str) -> bool {
    !username.trim().is_empty() && is_valid_field(username)
}
