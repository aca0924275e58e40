// SPDX-License-Identifier: MIT

//! Append-only write-ahead log of [`StoreOp`]s. One JSON object per line;
//! `seq` is a monotonic counter assigned on append. A torn last line (a
//! partial write from a crash mid-append) is dropped rather than failing
//! recovery.

use crate::ops::StoreOp;
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WalError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone)]
pub struct WalEntry {
    pub seq: u64,
    pub op: StoreOp,
}

pub struct Wal {
    path: PathBuf,
    file: File,
    write_seq: u64,
    processed_seq: u64,
}

impl Wal {
    /// Open (creating if absent) the WAL at `path`. `processed_seq` is the
    /// sequence number already reflected in the last-loaded snapshot;
    /// entries at or below it are skipped by `entries_after`.
    pub fn open(path: impl AsRef<Path>, processed_seq: u64) -> Result<Self, WalError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new().create(true).read(true).append(true).open(&path)?;

        let write_seq = Self::recover_write_seq(&mut file)?;

        Ok(Self { path, file, write_seq, processed_seq })
    }

    /// Scan the file to find the highest `seq` written, truncating a torn
    /// trailing line if the last write was interrupted mid-append.
    fn recover_write_seq(file: &mut File) -> Result<u64, WalError> {
        file.seek(SeekFrom::Start(0))?;
        let mut max_seq = 0u64;
        let mut valid_len: u64 = 0;
        let reader = BufReader::new(&mut *file);
        for line in reader.lines() {
            let line = match line {
                Ok(l) => l,
                Err(_) => break,
            };
            if line.trim().is_empty() {
                valid_len += line.len() as u64 + 1;
                continue;
            }
            match serde_json::from_str::<WalLine>(&line) {
                Ok(parsed) => {
                    max_seq = max_seq.max(parsed.seq);
                    valid_len += line.len() as u64 + 1;
                }
                Err(_) => break, // torn / corrupt trailing line
            }
        }
        file.set_len(valid_len)?;
        file.seek(SeekFrom::End(0))?;
        Ok(max_seq)
    }

    pub fn write_seq(&self) -> u64 {
        self.write_seq
    }

    pub fn processed_seq(&self) -> u64 {
        self.processed_seq
    }

    pub fn mark_processed(&mut self, seq: u64) {
        self.processed_seq = self.processed_seq.max(seq);
    }

    /// Append one op, returning its assigned sequence number. Does not
    /// fsync by itself; call [`Wal::flush`] for durability.
    pub fn append(&mut self, op: &StoreOp) -> Result<u64, WalError> {
        self.write_seq += 1;
        let line = WalLine { seq: self.write_seq, op: op.clone() };
        let json = serde_json::to_string(&line)?;
        writeln!(self.file, "{json}")?;
        Ok(self.write_seq)
    }

    pub fn flush(&mut self) -> Result<(), WalError> {
        self.file.flush()?;
        self.file.sync_data()?;
        Ok(())
    }

    /// All entries with `seq > processed_seq` (i.e. not yet reflected in
    /// the loaded snapshot), in file order.
    pub fn entries_after(&self, processed_seq: u64) -> Result<Vec<WalEntry>, WalError> {
        let mut file = File::open(&self.path)?;
        file.seek(SeekFrom::Start(0))?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;
        let mut out = Vec::new();
        for line in contents.lines() {
            if line.trim().is_empty() {
                continue;
            }
            let parsed: WalLine = match serde_json::from_str(line) {
                Ok(p) => p,
                Err(_) => continue,
            };
            if parsed.seq > processed_seq {
                out.push(WalEntry { seq: parsed.seq, op: parsed.op });
            }
        }
        Ok(out)
    }
}

#[derive(serde::Serialize, serde::Deserialize)]
struct WalLine {
    seq: u64,
    op: StoreOp,
}

#[cfg(test)]
mod tests {
    use super::*;
    use swarm_core::{Task, TaskId};
    use tempfile::tempdir;

    fn op(id: &str) -> StoreOp {
        let mut t = Task::new("x", "generic", 0);
        t.id = TaskId::from_string(id);
        StoreOp::TaskSaved { task: t }
    }

    #[test]
    fn open_creates_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wal.log");
        let wal = Wal::open(&path, 0).unwrap();
        assert!(path.exists());
        assert_eq!(wal.write_seq(), 0);
    }

    #[test]
    fn append_assigns_monotonic_seq() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wal.log");
        let mut wal = Wal::open(&path, 0).unwrap();
        assert_eq!(wal.append(&op("a")).unwrap(), 1);
        assert_eq!(wal.append(&op("b")).unwrap(), 2);
        wal.flush().unwrap();
    }

    #[test]
    fn entries_after_skips_already_processed() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wal.log");
        let mut wal = Wal::open(&path, 0).unwrap();
        wal.append(&op("a")).unwrap();
        wal.append(&op("b")).unwrap();
        wal.flush().unwrap();
        let entries = wal.entries_after(1).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].seq, 2);
    }

    #[test]
    fn reopen_recovers_write_seq_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wal.log");
        {
            let mut wal = Wal::open(&path, 0).unwrap();
            wal.append(&op("a")).unwrap();
            wal.append(&op("b")).unwrap();
            wal.flush().unwrap();
        }
        let wal = Wal::open(&path, 0).unwrap();
        assert_eq!(wal.write_seq(), 2);
    }

    #[test]
    fn torn_trailing_line_is_dropped_on_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wal.log");
        {
            let mut wal = Wal::open(&path, 0).unwrap();
            wal.append(&op("a")).unwrap();
            wal.flush().unwrap();
        }
        // Simulate a torn write: append a partial JSON line with no newline.
        {
            let mut f = OpenOptions::new().append(true).open(&path).unwrap();
            write!(f, "{{\"seq\":2,\"op\":{{\"op\":\"TaskSav").unwrap();
        }
        let wal = Wal::open(&path, 0).unwrap();
        assert_eq!(wal.write_seq(), 1);
        let entries = wal.entries_after(0).unwrap();
        assert_eq!(entries.len(), 1);
    }
}
