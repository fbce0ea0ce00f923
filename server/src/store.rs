//! Persistence for registered players.
//!
//! The on-disk format is one `username,password,rankScore` record per line.
//! The whole file is rewritten on every save.

use log::debug;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerRecord {
    pub username: String,
    pub password: String,
    pub rank_points: u32,
}

impl PlayerRecord {
    pub fn new(username: impl Into<String>, password: impl Into<String>, rank_points: u32) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            rank_points,
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("player store I/O failed: {0}")]
    Io(#[from] io::Error),
    #[error("malformed player record on line {line}: {reason}")]
    Malformed { line: usize, reason: String },
}

/// Loads and saves the registered-player list as a whole.
pub trait PlayerStore: Send + Sync {
    fn load(&self) -> Result<Vec<PlayerRecord>, StoreError>;
    fn save(&self, records: &[PlayerRecord]) -> Result<(), StoreError>;
}

/// Line-oriented CSV file.
pub struct CsvPlayerStore {
    path: PathBuf,
}

impl CsvPlayerStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl PlayerStore for CsvPlayerStore {
    fn load(&self) -> Result<Vec<PlayerRecord>, StoreError> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => parse_records(&contents),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("No player file at {}, starting empty", self.path.display());
                Ok(Vec::new())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, records: &[PlayerRecord]) -> Result<(), StoreError> {
        fs::write(&self.path, render_records(records))?;
        Ok(())
    }
}

/// Keeps records in memory only; used for ephemeral servers and tests.
#[derive(Default)]
pub struct MemoryPlayerStore {
    records: Mutex<Vec<PlayerRecord>>,
}

impl MemoryPlayerStore {
    pub fn new(records: Vec<PlayerRecord>) -> Self {
        Self {
            records: Mutex::new(records),
        }
    }

    pub fn records(&self) -> Vec<PlayerRecord> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }
}

impl PlayerStore for MemoryPlayerStore {
    fn load(&self) -> Result<Vec<PlayerRecord>, StoreError> {
        Ok(self.records())
    }

    fn save(&self, records: &[PlayerRecord]) -> Result<(), StoreError> {
        let mut stored = self
            .records
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "player store lock poisoned"))?;
        *stored = records.to_vec();
        Ok(())
    }
}

pub fn render_records(records: &[PlayerRecord]) -> String {
    let mut out = String::new();
    for record in records {
        out.push_str(&format!(
            "{},{},{}\n",
            record.username, record.password, record.rank_points
        ));
    }
    out
}

pub fn parse_records(contents: &str) -> Result<Vec<PlayerRecord>, StoreError> {
    let mut records = Vec::new();

    for (index, line) in contents.lines().enumerate() {
        let line_number = index + 1;
        if line.trim().is_empty() {
            continue;
        }

        let fields: Vec<&str> = line.split(',').collect();
        if fields.len() != 3 {
            return Err(StoreError::Malformed {
                line: line_number,
                reason: format!("expected 3 fields, found {}", fields.len()),
            });
        }

        let rank_points = fields[2].trim().parse::<u32>().map_err(|e| StoreError::Malformed {
            line: line_number,
            reason: format!("bad rank score {:?}: {}", fields[2], e),
        })?;

        records.push(PlayerRecord::new(fields[0], fields[1], rank_points));
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn roster() -> Vec<PlayerRecord> {
        vec![
            PlayerRecord::new("ana", "pw1", 0),
            PlayerRecord::new("bruno", "secret", 1250),
            PlayerRecord::new("carla", "x", 2600),
        ]
    }

    #[test]
    fn test_render_format() {
        assert_eq!(
            render_records(&roster()),
            "ana,pw1,0\nbruno,secret,1250\ncarla,x,2600\n"
        );
    }

    #[test]
    fn test_parse_skips_blank_lines() {
        let records = parse_records("ana,pw1,0\n\nbruno,secret,1250\n").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1], PlayerRecord::new("bruno", "secret", 1250));
    }

    #[test]
    fn test_parse_rejects_malformed_lines() {
        match parse_records("ana,pw1,0\nbroken\n") {
            Err(StoreError::Malformed { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected malformed error, got {:?}", other),
        }

        match parse_records("ana,pw1,-5\n") {
            Err(StoreError::Malformed { line, reason }) => {
                assert_eq!(line, 1);
                assert!(reason.contains("rank score"));
            }
            other => panic!("expected malformed error, got {:?}", other),
        }
    }

    #[test]
    fn test_csv_store_save_and_load() {
        let dir = TempDir::new().unwrap();
        let store = CsvPlayerStore::new(dir.path().join("players.csv"));

        store.save(&roster()).unwrap();
        assert_eq!(store.load().unwrap(), roster());
    }

    #[test]
    fn test_repeated_saves_are_byte_identical() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("players.csv");
        let store = CsvPlayerStore::new(&path);

        store.save(&roster()).unwrap();
        let first = fs::read(&path).unwrap();
        store.save(&roster()).unwrap();
        store.save(&roster()).unwrap();
        let last = fs::read(&path).unwrap();

        assert_eq!(first, last);
    }

    #[test]
    fn test_missing_file_loads_empty() {
        let dir = TempDir::new().unwrap();
        let store = CsvPlayerStore::new(dir.path().join("players.csv"));
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryPlayerStore::default();
        assert!(store.load().unwrap().is_empty());
        store.save(&roster()).unwrap();
        assert_eq!(store.load().unwrap(), roster());
        assert_eq!(store.records().len(), 3);
    }
}
