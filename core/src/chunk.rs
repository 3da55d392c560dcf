//! Chunk files: a 4-byte magic, a format version byte and a bincode body.
//!
//! Writes go to `<name>.tmp` first and are renamed over the live file, so
//! the rename is the only step that changes what a reader sees.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{DecoderError, Result};

/// Body layout version shared by all chunk kinds.
pub const CHUNK_VERSION: u8 = 1;

const HEADER_LEN: usize = 5;

pub fn encode<T: Serialize>(magic: &[u8; 4], value: &T) -> Result<Vec<u8>> {
    let body = bincode::serialize(value)?;
    let mut buf = Vec::with_capacity(HEADER_LEN + body.len());
    buf.extend_from_slice(magic);
    buf.push(CHUNK_VERSION);
    buf.extend_from_slice(&body);
    Ok(buf)
}

pub fn decode<T: DeserializeOwned>(magic: &[u8; 4], path: &Path, bytes: &[u8]) -> Result<T> {
    let invalid = |reason| DecoderError::InvalidChunk {
        path: path.to_path_buf(),
        reason,
    };
    if bytes.len() < HEADER_LEN {
        return Err(invalid("too short"));
    }
    if &bytes[0..4] != magic {
        return Err(invalid("bad magic"));
    }
    if bytes[4] != CHUNK_VERSION {
        return Err(invalid("unsupported version"));
    }
    Ok(bincode::deserialize(&bytes[HEADER_LEN..])?)
}

/// Read a mandatory chunk.
pub fn load<T: DeserializeOwned>(magic: &[u8; 4], path: &Path) -> Result<T> {
    let bytes = fs::read(path).map_err(|e| DecoderError::io(path, e))?;
    decode(magic, path, &bytes)
}

/// Read a chunk that may legitimately be absent.
pub fn load_optional<T: DeserializeOwned>(magic: &[u8; 4], path: &Path) -> Result<Option<T>> {
    match fs::read(path) {
        Ok(bytes) => decode(magic, path, &bytes).map(Some),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(DecoderError::io(path, e)),
    }
}

/// `<path>.tmp`, next to the live file.
pub fn temp_path(path: &Path) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

/// Remove a file, treating "already gone" as success.
pub fn remove_if_exists(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(DecoderError::io(path, e)),
    }
}

/// Write `bytes` to the temporary sibling of `path` and flush it to disk.
///
/// A stale temporary left by an earlier crash is removed first. Returns the
/// temporary path for [`commit`].
pub fn stage(path: &Path, bytes: &[u8]) -> Result<PathBuf> {
    let tmp = temp_path(path);
    remove_if_exists(&tmp)?;
    let mut f = File::create(&tmp).map_err(|e| DecoderError::io(&tmp, e))?;
    f.write_all(bytes).map_err(|e| DecoderError::io(&tmp, e))?;
    f.sync_all().map_err(|e| DecoderError::io(&tmp, e))?;
    Ok(tmp)
}

/// Atomically replace `path` with a staged temporary.
pub fn commit(tmp: &Path, path: &Path) -> Result<()> {
    fs::rename(tmp, path).map_err(|e| DecoderError::io(path, e))
}

/// Stage and commit in one step.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = stage(path, bytes)?;
    commit(&tmp, path)
}
