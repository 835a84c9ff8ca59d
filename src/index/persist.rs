//! Versioned, checksummed index artifact
//!
//! Layout: magic (4) + format version (u32 LE) + SHA-256 of payload (32) +
//! bincode payload. Written to a temporary file, synced and renamed over the
//! target, so a reader never observes a half-written index.

use super::{IndexError, IndexResult, IndexSnapshot};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use tracing::{debug, info};

const MAGIC: &[u8; 4] = b"RGIX";

/// Current artifact format version
pub const FORMAT_VERSION: u32 = 1;

const HEADER_LEN: usize = 4 + 4 + 32;

/// Writes a snapshot atomically; returns the artifact size in bytes
pub fn save_snapshot(path: &Path, snapshot: &IndexSnapshot) -> IndexResult<u64> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }

    let payload =
        bincode::serialize(snapshot).map_err(|e| IndexError::Encoding(e.to_string()))?;
    let checksum = Sha256::digest(&payload);

    let mut buf = Vec::with_capacity(HEADER_LEN + payload.len());
    buf.extend_from_slice(MAGIC);
    buf.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    buf.extend_from_slice(&checksum);
    buf.extend_from_slice(&payload);

    let tmp_path = path.with_extension("tmp");
    {
        let mut file = File::create(&tmp_path)?;
        file.write_all(&buf)?;
        file.sync_all()?;
    }
    fs::rename(&tmp_path, path)?;

    info!(
        "Saved index ({} documents, {} bytes) to {}",
        snapshot.index.document_count(),
        buf.len(),
        path.display()
    );
    Ok(buf.len() as u64)
}

/// Reads and fully verifies a snapshot
///
/// Any mismatch in magic, checksum, encoding or index statistics is
/// reported as [`IndexError::Corrupt`]; the snapshot is never returned
/// half-checked.
pub fn load_snapshot(path: &Path) -> IndexResult<IndexSnapshot> {
    if !path.exists() {
        return Err(IndexError::NotFound(path.to_path_buf()));
    }
    let buf = fs::read(path)?;

    if buf.len() < HEADER_LEN {
        return Err(IndexError::Corrupt(format!(
            "artifact too small ({} bytes)",
            buf.len()
        )));
    }
    if &buf[0..4] != MAGIC {
        return Err(IndexError::Corrupt("bad magic".to_string()));
    }

    let mut version = [0u8; 4];
    version.copy_from_slice(&buf[4..8]);
    let version = u32::from_le_bytes(version);
    if version != FORMAT_VERSION {
        return Err(IndexError::VersionMismatch {
            found: version,
            expected: FORMAT_VERSION,
        });
    }

    let payload = &buf[HEADER_LEN..];
    if Sha256::digest(payload).as_slice() != &buf[8..HEADER_LEN] {
        return Err(IndexError::Corrupt("checksum mismatch".to_string()));
    }

    let snapshot: IndexSnapshot = bincode::deserialize(payload)
        .map_err(|e| IndexError::Corrupt(format!("decode error: {}", e)))?;
    snapshot.verify()?;

    debug!(
        "Loaded index with {} documents from {}",
        snapshot.index.document_count(),
        path.display()
    );
    Ok(snapshot)
}
