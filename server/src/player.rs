//! Authenticated players and their connections.

use crate::rank::{Rank, RankTier};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use rand::RngCore;
use shared::Connection;
use std::io;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const TOKEN_BYTES: usize = 10;

/// A signed-in player together with the connection used to reach them.
///
/// Players are moved, never shared: a player lives in exactly one queue, one
/// team, or one post-game task at a time.
#[derive(Debug)]
pub struct Player {
    username: String,
    token: String,
    rank: Rank,
    connection: Connection,
}

impl Player {
    pub fn new(username: impl Into<String>, rank: Rank, connection: Connection) -> Self {
        Self::with_token(username, generate_token(), rank, connection)
    }

    /// Builds a player around a token that was already issued, e.g. the one
    /// recorded in the roster at sign-in.
    pub fn with_token(
        username: impl Into<String>,
        token: impl Into<String>,
        rank: Rank,
        connection: Connection,
    ) -> Self {
        Self {
            username: username.into(),
            token: token.into(),
            rank,
            connection,
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn rank(&self) -> Rank {
        self.rank
    }

    pub fn rank_mut(&mut self) -> &mut Rank {
        &mut self.rank
    }

    pub fn tier(&self) -> RankTier {
        self.rank.tier()
    }

    pub fn connection(&mut self) -> &mut Connection {
        &mut self.connection
    }

    pub async fn send(&mut self, text: &str) -> io::Result<()> {
        self.connection.send_text(text).await
    }

    pub async fn recv_int(&mut self) -> io::Result<i32> {
        self.connection.recv_int().await
    }
}

/// Random URL-safe session token: ten random bytes in unpadded base64url,
/// then the creation time in epoch milliseconds.
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);

    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis();

    format!("{}_{}", URL_SAFE_NO_PAD.encode(bytes), timestamp)
}
