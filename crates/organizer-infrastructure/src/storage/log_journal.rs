// ============================================================================
// Organizer Infrastructure - Append-only Action Journal
// File: crates/organizer-infrastructure/src/storage/log_journal.rs
// ============================================================================
//! One append-only log per identity.
//!
//! Each line is `<sha256 hex> <json record>`. A record either appends an
//! action or removes one by id. Loading replays the log and stops at the
//! first line whose checksum or JSON does not hold, which is where a torn
//! write would end. Once enough removals pile up the live set is rewritten
//! into a fresh log.

use async_trait::async_trait;
use organizer_core::domain::OfflineAction;
use organizer_core::error::StorageError;
use organizer_core::repositories::ActionJournal;
use organizer_shared::{EntityId, Identity};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use uuid::Uuid;

const EXTENSION: &str = "log";

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
enum Record {
    Append { action: OfflineAction },
    Remove { id: EntityId },
}

/// Live state recovered from one log.
#[derive(Debug, Default)]
struct Replayed {
    actions: Vec<OfflineAction>,
    removals: usize,
    /// Recovery stopped before the end of the file.
    torn: bool,
}

pub struct LogJournal {
    dir: PathBuf,
    compact_threshold: usize,
}

impl LogJournal {
    pub async fn open(dir: impl AsRef<Path>, compact_threshold: usize) -> Result<Self, StorageError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).await?;
        Ok(Self {
            dir,
            compact_threshold: compact_threshold.max(1),
        })
    }

    fn path_for(&self, identity: &Identity) -> PathBuf {
        self.dir.join(format!("{}.{}", identity, EXTENSION))
    }

    async fn replay(&self, identity: &Identity) -> Result<Replayed, StorageError> {
        let raw = match fs::read(self.path_for(identity)).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Replayed::default()),
            Err(e) => return Err(e.into()),
        };

        let mut replayed = Replayed::default();
        let lines = raw.split(|b| *b == b'\n').filter(|line| !line.is_empty());
        for (line_no, line) in lines.enumerate() {
            let Some(record) = decode_line(line) else {
                warn!(identity = %identity, line = line_no + 1, "Journal recovery stopped at a damaged record");
                replayed.torn = true;
                break;
            };
            match record {
                Record::Append { action } => replayed.actions.push(action),
                Record::Remove { id } => {
                    replayed.actions.retain(|a| a.id != id);
                    replayed.removals += 1;
                }
            }
        }
        Ok(replayed)
    }

    async fn write_record(&self, identity: &Identity, record: &Record) -> Result<(), StorageError> {
        let line = encode_line(record)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path_for(identity))
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.sync_data().await?;
        Ok(())
    }

    /// Rewrite the log so it holds only the live actions.
    async fn compact(&self, identity: &Identity, live: &[OfflineAction]) -> Result<(), StorageError> {
        let path = self.path_for(identity);
        if live.is_empty() {
            return match fs::remove_file(&path).await {
                Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
                _ => Ok(()),
            };
        }

        let mut content = String::new();
        for action in live {
            content.push_str(&encode_line(&Record::Append { action: action.clone() })?);
        }
        let tmp = path.with_extension("compact");
        fs::write(&tmp, content).await?;
        fs::rename(&tmp, &path).await?;
        debug!(identity = %identity, live = live.len(), "Journal compacted");
        Ok(())
    }
}

fn checksum(json: &str) -> String {
    hex::encode(Sha256::digest(json.as_bytes()))
}

fn encode_line(record: &Record) -> Result<String, StorageError> {
    let json = serde_json::to_string(record)?;
    Ok(format!("{} {}\n", checksum(&json), json))
}

/// A line cut inside a multi-byte character is not UTF-8 and counts as torn.
fn decode_line(line: &[u8]) -> Option<Record> {
    let line = std::str::from_utf8(line).ok()?;
    let (sum, json) = line.split_once(' ')?;
    if checksum(json) != sum {
        return None;
    }
    serde_json::from_str(json).ok()
}

#[async_trait]
impl ActionJournal for LogJournal {
    async fn load(&self, identity: &Identity) -> Result<Vec<OfflineAction>, StorageError> {
        Ok(self.replay(identity).await?.actions)
    }

    async fn append(&self, action: &OfflineAction) -> Result<(), StorageError> {
        let identity = action.identity;
        let replayed = self.replay(&identity).await?;
        // Records written after a damaged line would never be read back.
        if replayed.torn {
            info!(identity = %identity, "Rewriting damaged journal before append");
            self.compact(&identity, &replayed.actions).await?;
        }
        self.write_record(&identity, &Record::Append { action: action.clone() }).await
    }

    async fn remove(&self, identity: &Identity, action_id: &EntityId) -> Result<bool, StorageError> {
        let mut replayed = self.replay(identity).await?;
        let before = replayed.actions.len();
        replayed.actions.retain(|a| a.id != *action_id);
        if replayed.actions.len() == before {
            return Ok(false);
        }

        if replayed.torn || replayed.actions.is_empty() || replayed.removals + 1 >= self.compact_threshold {
            self.compact(identity, &replayed.actions).await?;
        } else {
            self.write_record(identity, &Record::Remove { id: *action_id }).await?;
        }
        Ok(true)
    }

    async fn identities(&self) -> Result<Vec<Identity>, StorageError> {
        let mut entries = fs::read_dir(&self.dir).await?;
        let mut identities = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            if let Some(id) = path.file_stem().and_then(|s| s.to_str()).and_then(|s| Uuid::parse_str(s).ok()) {
                identities.push(id);
            }
        }
        identities.sort();
        Ok(identities)
    }
}
