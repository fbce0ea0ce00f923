//! Wire protocol and game rules shared by the server and its clients.
//!
//! A connection carries two kinds of frames over one byte stream:
//! - text: big-endian `u16` byte length followed by that many UTF-8 bytes
//! - integer: a 4-byte big-endian `i32`
//!
//! Clients send integers for every menu choice and for guesses, and strings
//! for credentials. The server answers with human-readable strings whose
//! prefixes (see [`messages`]) double as protocol markers.

use std::fmt;
use std::future::Future;
use std::io;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

pub const DEFAULT_PORT: u16 = 5000;

pub const MIN_SIMPLE_TEAM_SIZE: usize = 2;
pub const MIN_RANKED_TEAM_SIZE: usize = 3;
pub const MAX_TEAM_SIZE: usize = 8;

/// Inclusive range the upper bound of a round is drawn from.
pub const UPPER_BOUND_RANGE: (i32, i32) = (49, 98);
/// Inclusive range the lower bound of a round is drawn from.
pub const LOWER_BOUND_RANGE: (i32, i32) = (0, 48);

/// Largest text frame the length prefix can describe.
pub const MAX_TEXT_LEN: usize = u16::MAX as usize;

/// A menu value outside the enumeration the server expected at that point.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("unexpected {field} selection: {value}")]
    UnexpectedChoice { field: &'static str, value: i32 },
}

/// First message of every connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthChoice {
    Login,
    Register,
}

impl TryFrom<i32> for AuthChoice {
    type Error = ProtocolError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(AuthChoice::Login),
            2 => Ok(AuthChoice::Register),
            _ => Err(ProtocolError::UnexpectedChoice {
                field: "authentication",
                value,
            }),
        }
    }
}

impl From<AuthChoice> for i32 {
    fn from(choice: AuthChoice) -> Self {
        match choice {
            AuthChoice::Login => 1,
            AuthChoice::Register => 2,
        }
    }
}

/// Game mode a player queues for.
///
/// The mode carries every rule that differs between the two game variants, so
/// a single round driver can run both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GameMode {
    Simple,
    Ranked,
}

/// Minimum and maximum number of players a team may have.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TeamBounds {
    pub min: usize,
    pub max: usize,
}

impl GameMode {
    pub fn team_bounds(self) -> TeamBounds {
        match self {
            GameMode::Simple => TeamBounds {
                min: MIN_SIMPLE_TEAM_SIZE,
                max: MAX_TEAM_SIZE,
            },
            GameMode::Ranked => TeamBounds {
                min: MIN_RANKED_TEAM_SIZE,
                max: MAX_TEAM_SIZE,
            },
        }
    }

    /// Number of rounds a session of this mode plays for a team of `team_size`.
    pub fn round_count(self, team_size: usize) -> usize {
        match self {
            GameMode::Simple => team_size,
            GameMode::Ranked => team_size * 2,
        }
    }

    pub fn is_ranked(self) -> bool {
        matches!(self, GameMode::Ranked)
    }
}

impl fmt::Display for GameMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameMode::Simple => write!(f, "Simple"),
            GameMode::Ranked => write!(f, "Ranked"),
        }
    }
}

impl TryFrom<i32> for GameMode {
    type Error = ProtocolError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(GameMode::Simple),
            2 => Ok(GameMode::Ranked),
            _ => Err(ProtocolError::UnexpectedChoice {
                field: "game type",
                value,
            }),
        }
    }
}

impl From<GameMode> for i32 {
    fn from(mode: GameMode) -> Self {
        match mode {
            GameMode::Simple => 1,
            GameMode::Ranked => 2,
        }
    }
}

/// What a player wants to do once their game has ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndChoice {
    PlayAgain,
    Disconnect,
}

impl TryFrom<i32> for EndChoice {
    type Error = ProtocolError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(EndChoice::PlayAgain),
            2 => Ok(EndChoice::Disconnect),
            _ => Err(ProtocolError::UnexpectedChoice {
                field: "end of game",
                value,
            }),
        }
    }
}

impl From<EndChoice> for i32 {
    fn from(choice: EndChoice) -> Self {
        match choice {
            EndChoice::PlayAgain => 1,
            EndChoice::Disconnect => 2,
        }
    }
}

/// Texts exchanged during a game. Clients key their behaviour on the prefixes.
pub mod messages {
    use super::GameMode;

    pub const OK_PREFIX: &str = "OK";
    pub const YOUR_TURN: &str = "Its your turn guessing.\n> ";
    pub const OUT_OF_RANGE: &str = "Please select a value within the given range.";
    pub const GUESS_ACCEPTED: &str = "OK";
    pub const CONTINUING: &str = "Continuing game.";
    pub const GAME_ENDED_PREFIX: &str = "\nGame ended";
    pub const SIMPLE_MARKER: &str = "SIMPLE";
    pub const INTERVAL_PREFIX: &str = "The target interval is ";

    pub const LOGIN_FAILED: &str =
        "Invalid username, password or user is already logged in. Please try again.";
    pub const USERNAME_TAKEN: &str = "Username already exists. Please try again.";
    pub const USERNAME_INVALID: &str =
        "Usernames must be non-empty and may not contain commas or line breaks. Please try again.";
    pub const PASSWORD_INVALID: &str =
        "Passwords may not contain commas or line breaks. Please try again.";
    pub const REGISTERED: &str = "OK - Registration successful.";

    pub fn welcome_back(username: &str) -> String {
        format!("OK - Login successful. Welcome back {}.", username)
    }

    pub fn queued(mode: GameMode) -> String {
        let mode = match mode {
            GameMode::Simple => "simple",
            GameMode::Ranked => "ranked",
        };
        format!("You are now queuing for a {} game.\nWaiting for players...", mode)
    }

    pub fn game_starting(mode: GameMode, players: usize) -> String {
        format!("\nStarting {} Game with {} players.", mode, players)
    }

    pub fn round_header(round: usize, total: usize, lower: i32, upper: i32) -> String {
        format!(
            "\nRound {} of {}:\n{}{}..{}.\n",
            round, total, INTERVAL_PREFIX, lower, upper
        )
    }

    pub fn is_guessing(username: &str) -> String {
        format!("{} is guessing...\n", username)
    }

    pub fn game_ended(rounds_won: u32, total: usize) -> String {
        format!(
            "{}. You won {} of {} rounds.",
            GAME_ENDED_PREFIX, rounds_won, total
        )
    }

    /// Extracts `(lower, upper)` from a round header.
    pub fn parse_interval(text: &str) -> Option<(i32, i32)> {
        let start = text.find(INTERVAL_PREFIX)? + INTERVAL_PREFIX.len();
        let rest = &text[start..];
        let end = rest.find(".\n").unwrap_or(rest.len());
        let (lower, upper) = rest[..end].split_once("..")?;
        Some((lower.trim().parse().ok()?, upper.trim().parse().ok()?))
    }
}

/// Any byte stream a [`Connection`] can run on: TCP sockets, in-memory duplex
/// pipes, test mocks.
pub trait Transport: AsyncRead + AsyncWrite + Unpin + Send + Sync {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send + Sync> Transport for T {}

/// Framed text/integer channel to one peer.
///
/// Reads block until a full frame arrives unless a read timeout is set, in
/// which case a stalled read fails with [`io::ErrorKind::TimedOut`].
pub struct Connection {
    stream: Box<dyn Transport>,
    read_timeout: Option<Duration>,
}

impl Connection {
    pub fn new<T: Transport + 'static>(stream: T) -> Self {
        Self {
            stream: Box::new(stream),
            read_timeout: None,
        }
    }

    pub fn with_read_timeout(mut self, read_timeout: Option<Duration>) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    pub async fn send_text(&mut self, text: &str) -> io::Result<()> {
        let bytes = text.as_bytes();
        if bytes.len() > MAX_TEXT_LEN {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("text frame of {} bytes exceeds {}", bytes.len(), MAX_TEXT_LEN),
            ));
        }

        let mut frame = Vec::with_capacity(2 + bytes.len());
        frame.extend_from_slice(&(bytes.len() as u16).to_be_bytes());
        frame.extend_from_slice(bytes);
        self.stream.write_all(&frame).await?;
        self.stream.flush().await
    }

    pub async fn send_int(&mut self, value: i32) -> io::Result<()> {
        self.stream.write_all(&value.to_be_bytes()).await?;
        self.stream.flush().await
    }

    pub async fn recv_text(&mut self) -> io::Result<String> {
        let deadline = self.read_timeout;
        let stream = &mut self.stream;
        within(deadline, async move {
            let len = stream.read_u16().await?;
            let mut buf = vec![0u8; len as usize];
            stream.read_exact(&mut buf).await?;
            String::from_utf8(buf).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
        })
        .await
    }

    pub async fn recv_int(&mut self) -> io::Result<i32> {
        let deadline = self.read_timeout;
        within(deadline, self.stream.read_i32()).await
    }

    pub async fn shutdown(&mut self) -> io::Result<()> {
        self.stream.shutdown().await
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("read_timeout", &self.read_timeout)
            .finish_non_exhaustive()
    }
}

async fn within<T, F>(deadline: Option<Duration>, fut: F) -> io::Result<T>
where
    F: Future<Output = io::Result<T>>,
{
    match deadline {
        Some(limit) => match tokio::time::timeout(limit, fut).await {
            Ok(result) => result,
            Err(_) => Err(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("no data within {:?}", limit),
            )),
        },
        None => fut.await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::io::Builder;

    #[test]
    fn test_choice_decoding() {
        assert_eq!(AuthChoice::try_from(1), Ok(AuthChoice::Login));
        assert_eq!(AuthChoice::try_from(2), Ok(AuthChoice::Register));
        assert_eq!(GameMode::try_from(1), Ok(GameMode::Simple));
        assert_eq!(GameMode::try_from(2), Ok(GameMode::Ranked));
        assert_eq!(EndChoice::try_from(2), Ok(EndChoice::Disconnect));

        let err = GameMode::try_from(3).unwrap_err();
        assert_eq!(
            err,
            ProtocolError::UnexpectedChoice {
                field: "game type",
                value: 3
            }
        );
        assert_eq!(err.to_string(), "unexpected game type selection: 3");
        assert!(AuthChoice::try_from(0).is_err());
        assert!(EndChoice::try_from(-1).is_err());
    }

    #[test]
    fn test_choice_encoding_matches_decoding() {
        for mode in [GameMode::Simple, GameMode::Ranked] {
            assert_eq!(GameMode::try_from(i32::from(mode)), Ok(mode));
        }
        assert_eq!(i32::from(AuthChoice::Register), 2);
        assert_eq!(i32::from(EndChoice::PlayAgain), 1);
    }

    #[test]
    fn test_mode_rules() {
        assert_eq!(GameMode::Simple.round_count(3), 3);
        assert_eq!(GameMode::Ranked.round_count(3), 6);
        assert_eq!(GameMode::Simple.team_bounds(), TeamBounds { min: 2, max: 8 });
        assert_eq!(GameMode::Ranked.team_bounds(), TeamBounds { min: 3, max: 8 });
        assert!(GameMode::Ranked.is_ranked());
        assert_eq!(GameMode::Ranked.to_string(), "Ranked");
    }

    #[test]
    fn test_interval_parsing() {
        let header = messages::round_header(2, 4, 17, 63);
        assert_eq!(header, "\nRound 2 of 4:\nThe target interval is 17..63.\n");
        assert_eq!(messages::parse_interval(&header), Some((17, 63)));
        assert_eq!(messages::parse_interval("Continuing game."), None);
    }

    #[test]
    fn test_message_texts() {
        assert_eq!(
            messages::queued(GameMode::Ranked),
            "You are now queuing for a ranked game.\nWaiting for players..."
        );
        assert_eq!(
            messages::game_starting(GameMode::Simple, 2),
            "\nStarting Simple Game with 2 players."
        );
        assert!(messages::game_ended(1, 2).starts_with(messages::GAME_ENDED_PREFIX));
        assert!(messages::welcome_back("ana").starts_with(messages::OK_PREFIX));
    }

    #[tokio::test]
    async fn test_text_frame_layout() {
        let mock = Builder::new().write(&[0, 5, b'h', b'e', b'l', b'l', b'o']).build();
        let mut conn = Connection::new(mock);
        conn.send_text("hello").await.unwrap();
    }

    #[tokio::test]
    async fn test_int_frame_layout() {
        let mock = Builder::new()
            .write(&[0xFF, 0xFF, 0xFF, 0xFE])
            .read(&[0, 0, 0, 42])
            .build();
        let mut conn = Connection::new(mock);
        conn.send_int(-2).await.unwrap();
        assert_eq!(conn.recv_int().await.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_text_read_spanning_chunks() {
        let mock = Builder::new()
            .read(&[0, 4])
            .read("añb".as_bytes())
            .build();
        let mut conn = Connection::new(mock);
        assert_eq!(conn.recv_text().await.unwrap(), "añb");
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_rejected() {
        let mock = Builder::new().read(&[0, 2, 0xC3, 0x28]).build();
        let mut conn = Connection::new(mock);
        let err = conn.recv_text().await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[tokio::test]
    async fn test_oversized_text_is_rejected() {
        let (client, _server) = tokio::io::duplex(64);
        let mut conn = Connection::new(client);
        let text = "x".repeat(MAX_TEXT_LEN + 1);
        let err = conn.send_text(&text).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[tokio::test]
    async fn test_duplex_round_trip() {
        let (a, b) = tokio::io::duplex(256);
        let mut left = Connection::new(a);
        let mut right = Connection::new(b);

        left.send_text("Round 1").await.unwrap();
        left.send_int(37).await.unwrap();

        assert_eq!(right.recv_text().await.unwrap(), "Round 1");
        assert_eq!(right.recv_int().await.unwrap(), 37);
    }

    #[tokio::test]
    async fn test_read_timeout() {
        let (a, _b) = tokio::io::duplex(64);
        let mut conn = Connection::new(a).with_read_timeout(Some(Duration::from_millis(20)));
        let err = conn.recv_int().await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
    }

    #[tokio::test]
    async fn test_closed_peer_reports_eof() {
        let (a, b) = tokio::io::duplex(64);
        drop(b);
        let mut conn = Connection::new(a);
        let err = conn.recv_int().await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }
}
