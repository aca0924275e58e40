// SPDX-License-Identifier: MIT

//! Disk persistence for `MaterializedState` snapshots, with a sha256
//! checksum (I3: equal checksums denote equal state) and a rotating
//! `.bak` history so a crash mid-write never loses the previous good copy.

use crate::state::MaterializedState;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

const MAX_BAK_FILES: usize = 3;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateSnapshotFile {
    pub version: u32,
    /// WAL sequence number this snapshot was taken at; WAL replay resumes
    /// strictly after this.
    pub seq: u64,
    pub state: MaterializedState,
    pub checksum: String,
    pub created_at_epoch_ms: u64,
}

/// sha256 of the canonical (field-order) JSON encoding of `state`.
pub fn checksum_of(state: &MaterializedState) -> Result<String, SnapshotError> {
    let bytes = serde_json::to_vec(state)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}

pub fn save(
    path: impl AsRef<Path>,
    state: &MaterializedState,
    seq: u64,
    created_at_epoch_ms: u64,
) -> Result<(), SnapshotError> {
    let path = path.as_ref();
    let checksum = checksum_of(state)?;
    let file = StateSnapshotFile { version: state.version, seq, state: state.clone(), checksum, created_at_epoch_ms };
    let json = serde_json::to_vec_pretty(&file)?;

    if path.exists() {
        rotate_baks(path)?;
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, &json)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

pub fn load(path: impl AsRef<Path>) -> Result<Option<StateSnapshotFile>, SnapshotError> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(None);
    }
    let bytes = fs::read(path)?;
    let file: StateSnapshotFile = serde_json::from_slice(&bytes)?;
    let actual = checksum_of(&file.state)?;
    if actual != file.checksum {
        return Err(SnapshotError::ChecksumMismatch { expected: file.checksum, actual });
    }
    Ok(Some(file))
}

/// Shift `path`, `path.bak1`, `path.bak2` forward one slot, dropping
/// anything past `MAX_BAK_FILES`.
fn rotate_baks(path: &Path) -> Result<(), SnapshotError> {
    for i in (1..MAX_BAK_FILES).rev() {
        let src = bak_path(path, i);
        let dst = bak_path(path, i + 1);
        if src.exists() {
            fs::rename(&src, &dst)?;
        }
    }
    fs::copy(path, bak_path(path, 1))?;
    Ok(())
}

fn bak_path(path: &Path, n: usize) -> PathBuf {
    let mut s = path.as_os_str().to_os_string();
    s.push(format!(".bak{n}"));
    PathBuf::from(s)
}
