use std::fmt;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rocket::serde::json::serde_json;
use rocket::tokio::{
    fs::{self, File, OpenOptions},
    io::AsyncWriteExt,
    sync::Mutex,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::common::{CandidateId, Identity, SessionId, VoterId, Weight};

/// A committed ledger mutation. Replaying every entry in order rebuilds the
/// ledger exactly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Entry {
    /// Always the first entry; fixes the owner.
    Genesis {
        owner: Identity,
    },
    AddAdmin {
        identity: Identity,
    },
    AddVoter {
        identity: Identity,
    },
    CreateSession {
        name: String,
        at: DateTime<Utc>,
    },
    RegisterCandidate {
        session: SessionId,
        name: String,
        description: String,
        image_ref: String,
    },
    RegisterVoter {
        session: SessionId,
        voter: VoterId,
        weight: Weight,
    },
    AdvancePhase {
        session: SessionId,
        at: DateTime<Utc>,
    },
    CastVote {
        session: SessionId,
        voter: VoterId,
        candidate: CandidateId,
    },
}

/// Durable storage for ledger entries.
///
/// An entry is only applied to the in-memory ledger once `append` has
/// returned successfully.
#[rocket::async_trait]
pub trait Journal: Send + Sync {
    async fn append(&self, entry: &Entry) -> Result<()>;
}

/// A volatile journal, for tests and deployments without a journal path.
#[derive(Debug, Default)]
pub struct MemoryJournal {
    entries: Mutex<Vec<Entry>>,
}

impl MemoryJournal {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn entries(&self) -> Vec<Entry> {
        self.entries.lock().await.clone()
    }
}

#[rocket::async_trait]
impl Journal for MemoryJournal {
    async fn append(&self, entry: &Entry) -> Result<()> {
        self.entries.lock().await.push(entry.clone());
        Ok(())
    }
}

/// The writable end of a journal file.
#[rocket::async_trait]
trait JournalFile: Send {
    /// Write a whole line and make it durable.
    async fn write_line(&mut self, line: &[u8]) -> io::Result<()>;

    /// Cut the file back to `len` bytes and make that durable.
    async fn truncate(&mut self, len: u64) -> io::Result<()>;
}

#[rocket::async_trait]
impl JournalFile for File {
    async fn write_line(&mut self, line: &[u8]) -> io::Result<()> {
        self.write_all(line).await?;
        self.flush().await?;
        self.sync_data().await
    }

    async fn truncate(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len).await?;
        self.sync_data().await
    }
}

struct Tail {
    file: Box<dyn JournalFile>,
    /// Length of the file up to the end of the last durable entry.
    len: u64,
    /// Set when a failed append could not be rolled back. The file may then
    /// hold a partial entry, so nothing more is written until it is reopened.
    poisoned: bool,
}

/// An append-only file of JSON entries, one per line.
///
/// An append either lands whole or leaves the file as it was.
pub struct FileJournal {
    path: PathBuf,
    tail: Mutex<Tail>,
}

impl FileJournal {
    /// Open the journal at the given path, creating it if necessary, and
    /// return the entries it already holds.
    ///
    /// An unterminated final line is the remains of an interrupted append.
    /// It was never acknowledged, so it is discarded.
    pub async fn open(path: impl AsRef<Path>) -> Result<(Self, Vec<Entry>)> {
        let path = path.as_ref().to_path_buf();
        let unavailable = |err: io::Error| {
            Error::Unavailable(format!("Cannot open journal {}: {err}", path.display()))
        };

        let contents = match fs::read(&path).await {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => Vec::new(),
            Err(err) => return Err(unavailable(err)),
        };
        let complete = contents
            .iter()
            .rposition(|&byte| byte == b'\n')
            .map_or(0, |end| end + 1);
        if complete < contents.len() {
            warn!(
                "Discarding unterminated entry at the end of journal {}: {:?}",
                path.display(),
                String::from_utf8_lossy(&contents[complete..])
            );
        }
        let text = std::str::from_utf8(&contents[..complete]).map_err(|err| {
            Error::Unavailable(format!("{}: corrupt journal ({err})", path.display()))
        })?;
        let entries = text
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(index, line)| {
                serde_json::from_str(line).map_err(|err| {
                    Error::Unavailable(format!(
                        "{}, line {}: corrupt entry ({err})",
                        path.display(),
                        index + 1
                    ))
                })
            })
            .collect::<Result<Vec<Entry>>>()?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(unavailable)?;
        let len = complete as u64;
        if len < contents.len() as u64 {
            JournalFile::truncate(&mut file, len)
                .await
                .map_err(unavailable)?;
        }
        debug!("Opened journal {} with {} entries", path.display(), entries.len());

        Ok((Self::from_file(path, Box::new(file), len), entries))
    }

    fn from_file(path: PathBuf, file: Box<dyn JournalFile>, len: u64) -> Self {
        Self {
            path,
            tail: Mutex::new(Tail {
                file,
                len,
                poisoned: false,
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl fmt::Debug for FileJournal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileJournal")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

#[rocket::async_trait]
impl Journal for FileJournal {
    async fn append(&self, entry: &Entry) -> Result<()> {
        let mut line = serde_json::to_string(entry)
            .map_err(|err| Error::Unavailable(format!("Cannot encode journal entry: {err}")))?;
        line.push('\n');

        let mut tail = self.tail.lock().await;
        if tail.poisoned {
            return Err(Error::Unavailable(format!(
                "Journal {} holds an unrecoverable partial entry and must be reopened",
                self.path.display()
            )));
        }

        if let Err(err) = tail.file.write_line(line.as_bytes()).await {
            error!("Failed to append to journal {}: {err}", self.path.display());
            let len = tail.len;
            if let Err(rollback) = tail.file.truncate(len).await {
                error!(
                    "Failed to roll back journal {} to {len} bytes: {rollback}",
                    self.path.display()
                );
                tail.poisoned = true;
            }
            return Err(Error::Unavailable(format!("Cannot write journal: {err}")));
        }
        tail.len += line.len() as u64;
        Ok(())
    }
}
