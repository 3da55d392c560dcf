//! Dictionary overlay store: system partitions plus the user's deltas.
//!
//! Layout of a user directory:
//!
//! - `version`: the format marker, written last on every save
//! - `<partition>.dbin`: difference log of each partition
//! - `user.db`: the user bigram store
//!
//! The system directory holds `<partition>.bin` for every configured
//! partition and an optional `bigram.db`. System files are never written.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::bigram::Bigram;
use crate::chunk;
use crate::error::{DecoderError, Result};
use crate::phrase_index::{PartitionChunk, PhraseIndex, PhraseIndexLog};
use crate::token::PartitionId;
use crate::PartitionConfig;

/// Format marker of user overlay files, terminator included.
pub const FORMAT_VERSION: &[u8] = b"libchinese-decoder overlay 1\0";

pub const VERSION_FILE: &str = "version";
pub const USER_BIGRAM_FILE: &str = "user.db";
pub const SYSTEM_BIGRAM_FILE: &str = "bigram.db";

#[derive(Debug, Clone)]
pub struct OverlayStore {
    system_dir: PathBuf,
    user_dir: Option<PathBuf>,
    partitions: Vec<PartitionConfig>,
}

impl OverlayStore {
    /// Partitions are kept in ascending id order.
    pub fn new(system_dir: PathBuf, user_dir: Option<PathBuf>, partitions: &[PartitionConfig]) -> Self {
        let mut partitions = partitions.to_vec();
        partitions.sort_by_key(|p| p.id);
        Self {
            system_dir,
            user_dir,
            partitions,
        }
    }

    pub fn system_dir(&self) -> &Path {
        &self.system_dir
    }

    pub fn user_dir(&self) -> Option<&Path> {
        self.user_dir.as_deref()
    }

    pub fn partitions(&self) -> &[PartitionConfig] {
        &self.partitions
    }

    pub fn system_chunk_path(&self, partition: &PartitionConfig) -> PathBuf {
        self.system_dir.join(format!("{}.bin", partition.name))
    }

    pub fn system_bigram_path(&self) -> PathBuf {
        self.system_dir.join(SYSTEM_BIGRAM_FILE)
    }

    pub fn user_log_path(&self, partition: &PartitionConfig) -> Option<PathBuf> {
        self.user_dir
            .as_ref()
            .map(|d| d.join(format!("{}.dbin", partition.name)))
    }

    pub fn user_bigram_path(&self) -> Option<PathBuf> {
        self.user_dir.as_ref().map(|d| d.join(USER_BIGRAM_FILE))
    }

    fn config_for(&self, id: PartitionId) -> Result<&PartitionConfig> {
        self.partitions
            .iter()
            .find(|p| p.id == id)
            .ok_or(DecoderError::UnknownPartition(id))
    }

    /// Every overlay file this store may write, in save order.
    fn overlay_files(&self, user_dir: &Path) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = self
            .partitions
            .iter()
            .map(|p| user_dir.join(format!("{}.dbin", p.name)))
            .collect();
        files.push(user_dir.join(USER_BIGRAM_FILE));
        files
    }

    /// Check the version marker and discard every overlay file when it is
    /// missing or differs. Stale temporaries are removed either way.
    ///
    /// Returns whether the marker matched. Without a user directory there is
    /// nothing to check and the result is `true`.
    pub fn verify_or_reset(&self) -> Result<bool> {
        let Some(user_dir) = self.user_dir.as_deref() else {
            return Ok(true);
        };

        let marker = user_dir.join(VERSION_FILE);
        let matched = match fs::read(&marker) {
            Ok(bytes) => bytes == FORMAT_VERSION,
            Err(e) if e.kind() == io::ErrorKind::NotFound => false,
            Err(e) => return Err(DecoderError::io(&marker, e)),
        };

        for file in self.overlay_files(user_dir) {
            chunk::remove_if_exists(&chunk::temp_path(&file))?;
            if !matched && chunk::remove_if_exists(&file)? {
                debug!(path = %file.display(), "removed stale overlay file");
            }
        }
        chunk::remove_if_exists(&chunk::temp_path(&marker))?;

        if !matched {
            warn!(
                dir = %user_dir.display(),
                error = %DecoderError::FormatVersionMismatch,
                "user overlay reset"
            );
        }
        Ok(matched)
    }

    /// Load partition `id` from its system chunk and merge the user log on
    /// top. The system chunk is mandatory, the log is not.
    pub fn load(&self, index: &mut PhraseIndex, id: PartitionId) -> Result<()> {
        let partition = self.config_for(id)?;
        let system_path = self.system_chunk_path(partition);
        let base = PartitionChunk::load(&system_path)?;
        if base.partition != id {
            return Err(DecoderError::InvalidChunk {
                path: system_path,
                reason: "partition id mismatch",
            });
        }
        index.load(base)?;

        if let Some(log_path) = self.user_log_path(partition) {
            let log = PhraseIndexLog::load(id, &log_path)?;
            if log.partition != id {
                return Err(DecoderError::InvalidChunk {
                    path: log_path,
                    reason: "partition id mismatch",
                });
            }
            if !log.is_empty() {
                debug!(partition = id, records = log.records.len(), "merging user log");
            }
            index.merge(&log)?;
        }
        info!(partition = id, name = %partition.name, "partition loaded");
        Ok(())
    }

    /// Load every configured partition in ascending id order.
    pub fn load_all(&self, index: &mut PhraseIndex) -> Result<()> {
        for id in self.partitions.iter().map(|p| p.id) {
            self.load(index, id)?;
        }
        Ok(())
    }

    /// Difference log of partition `id` against its system chunk on disk.
    pub fn diff(&self, index: &PhraseIndex, id: PartitionId) -> Result<PhraseIndexLog> {
        let partition = self.config_for(id)?;
        let original = PartitionChunk::load(self.system_chunk_path(partition))?;
        index.diff(&original)
    }

    /// Persist the overlay: every partition log, then the user bigram store,
    /// then the version marker. Each file is staged and renamed into place.
    pub fn save(&self, index: &PhraseIndex, user_bigram: &Bigram) -> Result<()> {
        let user_dir = self.user_dir.as_deref().ok_or(DecoderError::NoUserDirectory)?;
        fs::create_dir_all(user_dir).map_err(|e| DecoderError::io(user_dir, e))?;

        for partition in &self.partitions {
            let log = self.diff(index, partition.id)?;
            let path = user_dir.join(format!("{}.dbin", partition.name));
            chunk::write_atomic(&path, &log.to_bytes()?)?;
            debug!(partition = partition.id, records = log.records.len(), "partition log saved");
        }

        let bigram_path = user_dir.join(USER_BIGRAM_FILE);
        let tmp = chunk::temp_path(&bigram_path);
        chunk::remove_if_exists(&tmp)?;
        user_bigram.save_db(&tmp)?;
        chunk::commit(&tmp, &bigram_path)?;

        chunk::write_atomic(&user_dir.join(VERSION_FILE), FORMAT_VERSION)?;
        info!(dir = %user_dir.display(), "user overlay saved");
        Ok(())
    }
}
