// jsonl.rs — Tamper-evident JSONL subscriber sink.
//
// An AuditSink that mirrors the trail to disk: one JSON object per
// line, each record linked to the previous one via a SHA-256
// `previous_hash`, so inserting, deleting, or editing a line breaks
// the chain and is detectable by `verify_chain`.
//
// This is an observer of the trail, not its storage — the in-memory
// trail stays authoritative, and a sink write failure only costs the
// mirror (the dispatcher logs it and moves on).

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::dispatch::{AuditSink, LogEvent};
use crate::entry::AuditLogEntry;
use crate::error::AuditError;

/// One line of the mirror file: the entry plus its chain link.
#[derive(Debug, Serialize, Deserialize)]
struct ChainedRecord {
    /// SHA-256 of the previous line's raw JSON; None on the first line.
    previous_hash: Option<String>,
    entry: AuditLogEntry,
}

struct SinkState {
    writer: BufWriter<File>,
    last_hash: Option<String>,
}

/// Append-only JSONL mirror of the audit trail with a hash chain.
pub struct JsonlSink {
    path: PathBuf,
    state: Mutex<SinkState>,
}

impl JsonlSink {
    /// Open (or create) the mirror file at `path`.
    ///
    /// If the file already has content, the last line's hash is recovered
    /// so new records continue the chain across restarts.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, AuditError> {
        let path = path.as_ref().to_path_buf();

        let last_hash = if path.exists() {
            read_last_hash(&path)?
        } else {
            None
        };

        // Append mode — existing records are never overwritten.
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| AuditError::OpenFailed {
                path: path.clone(),
                source,
            })?;

        Ok(Self {
            path,
            state: Mutex::new(SinkState {
                writer: BufWriter::new(file),
                last_hash,
            }),
        })
    }

    /// The path of the mirror file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read all entries back from a mirror file, oldest first.
    pub fn read_all(path: impl AsRef<Path>) -> Result<Vec<AuditLogEntry>, AuditError> {
        let file = File::open(path.as_ref()).map_err(|source| AuditError::OpenFailed {
            path: path.as_ref().to_path_buf(),
            source,
        })?;
        let reader = BufReader::new(file);
        let mut entries = Vec::new();

        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let record: ChainedRecord = serde_json::from_str(&line)?;
            entries.push(record.entry);
        }

        Ok(entries)
    }

    /// Verify a mirror file's hash chain.
    ///
    /// Each record's `previous_hash` must equal the SHA-256 of the raw
    /// preceding line. Returns the record count on success.
    pub fn verify_chain(path: impl AsRef<Path>) -> Result<usize, AuditError> {
        let file = File::open(path.as_ref()).map_err(|source| AuditError::OpenFailed {
            path: path.as_ref().to_path_buf(),
            source,
        })?;
        let reader = BufReader::new(file);
        let mut previous_hash: Option<String> = None;
        let mut count = 0;

        for (line_num, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }

            let record: ChainedRecord = serde_json::from_str(&line)?;
            if record.previous_hash != previous_hash {
                return Err(AuditError::IntegrityViolation {
                    line: line_num + 1,
                    expected: previous_hash.unwrap_or_else(|| "None".to_string()),
                    actual: record.previous_hash.unwrap_or_else(|| "None".to_string()),
                });
            }

            // Hash the raw line, not a re-serialization, so field order
            // cannot perturb the chain.
            previous_hash = Some(hash_str(&line));
            count += 1;
        }

        Ok(count)
    }
}

impl AuditSink for JsonlSink {
    fn deliver(&self, event: &LogEvent) -> Result<(), AuditError> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());

        let record = ChainedRecord {
            previous_hash: state.last_hash.clone(),
            entry: event.data.clone(),
        };
        let json = serde_json::to_string(&record)?;
        state.last_hash = Some(hash_str(&json));

        writeln!(state.writer, "{}", json)?;
        state.writer.flush()?;
        Ok(())
    }
}

/// SHA-256 of a string, hex-encoded.
fn hash_str(s: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(s.as_bytes());
    hex::encode(hasher.finalize())
}

/// Recover the hash of the last non-empty line of an existing file.
fn read_last_hash(path: &Path) -> Result<Option<String>, AuditError> {
    let file = File::open(path).map_err(|source| AuditError::OpenFailed {
        path: path.to_path_buf(),
        source,
    })?;
    let reader = BufReader::new(file);
    let mut last_line: Option<String> = None;

    for line in reader.lines() {
        let line = line?;
        if !line.trim().is_empty() {
            last_line = Some(line);
        }
    }

    Ok(last_line.map(|line| hash_str(&line)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{AuditAction, AuditLogEntry};
    use tempfile::tempdir;

    fn event(agent: &str) -> LogEvent {
        LogEvent::log(AuditLogEntry::new(agent, AuditAction::Denied))
    }

    #[test]
    fn deliver_and_read_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");

        let sink = JsonlSink::open(&path).unwrap();
        sink.deliver(&event("agent-1")).unwrap();
        sink.deliver(&event("agent-2")).unwrap();

        let entries = JsonlSink::read_all(&path).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].agent_id, "agent-1");
        assert_eq!(entries[1].agent_id, "agent-2");
    }

    #[test]
    fn chain_verifies_clean_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");

        let sink = JsonlSink::open(&path).unwrap();
        for i in 0..5 {
            sink.deliver(&event(&format!("agent-{}", i))).unwrap();
        }

        assert_eq!(JsonlSink::verify_chain(&path).unwrap(), 5);
    }

    #[test]
    fn reopen_continues_chain() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");

        {
            let sink = JsonlSink::open(&path).unwrap();
            sink.deliver(&event("agent-1")).unwrap();
        }
        {
            let sink = JsonlSink::open(&path).unwrap();
            sink.deliver(&event("agent-2")).unwrap();
        }

        assert_eq!(JsonlSink::verify_chain(&path).unwrap(), 2);
    }

    #[test]
    fn tampered_line_breaks_chain() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");

        let sink = JsonlSink::open(&path).unwrap();
        sink.deliver(&event("agent-1")).unwrap();
        sink.deliver(&event("agent-2")).unwrap();
        drop(sink);

        // Remove the first line — the second record's link now dangles.
        let content = std::fs::read_to_string(&path).unwrap();
        let tampered: String = content.lines().skip(1).collect::<Vec<_>>().join("\n");
        std::fs::write(&path, tampered).unwrap();

        assert!(matches!(
            JsonlSink::verify_chain(&path),
            Err(AuditError::IntegrityViolation { .. })
        ));
    }

    #[test]
    fn first_record_has_no_previous_hash() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");

        let sink = JsonlSink::open(&path).unwrap();
        sink.deliver(&event("agent-1")).unwrap();
        drop(sink);

        let content = std::fs::read_to_string(&path).unwrap();
        let record: serde_json::Value =
            serde_json::from_str(content.lines().next().unwrap()).unwrap();
        assert!(record["previous_hash"].is_null());
    }
}
