//! Shared engine context.
//!
//! A [`Context`] owns the loaded dictionary (system partitions with user
//! logs merged), the indexes derived from it, the bigram model and the
//! modification flag. Sessions borrow it: shared for candidate expansion and
//! sentence guessing, exclusively for training, overlay edits and saving.

use std::path::Path;

use tracing::{debug, info, warn};

use crate::bigram::{Bigram, BigramModel};
use crate::divided::{DividedTable, PinyinDividedTable};
use crate::error::{DecoderError, Result};
use crate::key::PhoneticKey;
use crate::overlay::OverlayStore;
use crate::phonetic_index::PhoneticIndex;
use crate::phrase_index::{PhraseIndex, PhraseItem, PhraseTable};
use crate::session::Session;
use crate::token::{partition_of, PartitionId, Token};
use crate::training;
use crate::DecoderConfig;

pub struct Context {
    config: DecoderConfig,
    overlay: OverlayStore,
    phrase_index: PhraseIndex,
    phonetic_index: PhoneticIndex,
    phrase_table: PhraseTable,
    bigram: BigramModel,
    divided: Box<dyn DividedTable + Send + Sync>,
    modified: bool,
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("config", &self.config)
            .field("overlay", &self.overlay)
            .field("phonetic_keys", &self.phonetic_index.len())
            .field("modified", &self.modified)
            .finish()
    }
}

impl Context {
    /// Open a system directory and an optional user directory.
    ///
    /// Stale user overlays are discarded before anything is loaded. Fails
    /// if a system partition chunk is missing or unreadable; a missing
    /// system bigram store only disables system bigram statistics. System
    /// files are read once and not held open, so any number of contexts
    /// may share one system directory.
    pub fn init<P: AsRef<Path>>(
        system_dir: P,
        user_dir: Option<&Path>,
        config: DecoderConfig,
    ) -> Result<Self> {
        config.validate()?;
        let overlay = OverlayStore::new(
            system_dir.as_ref().to_path_buf(),
            user_dir.map(Path::to_path_buf),
            &config.partitions,
        );
        overlay.verify_or_reset()?;

        let mut phrase_index = PhraseIndex::new();
        overlay.load_all(&mut phrase_index)?;

        let system_bigram_path = overlay.system_bigram_path();
        let system_bigram = if system_bigram_path.exists() {
            Some(Bigram::load_db(&system_bigram_path)?)
        } else {
            warn!(path = %system_bigram_path.display(), "no system bigram store");
            None
        };
        let user_bigram = match overlay.user_bigram_path() {
            Some(path) => Bigram::load_db(path)?,
            None => Bigram::new(),
        };
        let bigram = BigramModel::new(system_bigram, user_bigram, config.context_cache_size);

        let phonetic_index = PhoneticIndex::build(&phrase_index)?;
        let phrase_table = PhraseTable::build(&phrase_index);
        info!(
            spellings = phonetic_index.len(),
            total_freq = phrase_index.total_freq(),
            "context initialised"
        );

        Ok(Self {
            config,
            overlay,
            phrase_index,
            phonetic_index,
            phrase_table,
            bigram,
            divided: Box::new(PinyinDividedTable),
            modified: false,
        })
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Replace the options. The partition list is fixed at init.
    pub fn set_config(&mut self, config: DecoderConfig) -> Result<()> {
        config.validate()?;
        let mut partitions = config.partitions.clone();
        partitions.sort_by_key(|p| p.id);
        if partitions != self.overlay.partitions() {
            return Err(DecoderError::InvalidConfig(
                "partitions cannot change after init".into(),
            ));
        }
        self.config = config;
        Ok(())
    }

    pub fn phrase_index(&self) -> &PhraseIndex {
        &self.phrase_index
    }

    pub fn phonetic_index(&self) -> &PhoneticIndex {
        &self.phonetic_index
    }

    pub fn bigram(&self) -> &BigramModel {
        &self.bigram
    }

    pub fn divided_table(&self) -> &dyn DividedTable {
        self.divided.as_ref()
    }

    pub fn set_divided_table(&mut self, table: Box<dyn DividedTable + Send + Sync>) {
        self.divided = table;
    }

    pub fn user_dir(&self) -> Option<&Path> {
        self.overlay.user_dir()
    }

    /// Whether anything changed since the last successful save.
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// Token of the phrase whose text is exactly `text`, if any.
    pub fn search_phrase(&self, text: &str) -> Option<Token> {
        self.phrase_table.search(text)
    }

    /// Phrase text of `token`.
    pub fn translate_token(&self, token: Token) -> Option<String> {
        self.phrase_index
            .get_phrase_item(token)
            .map(|item| item.text().to_string())
    }

    pub fn new_session(&self) -> Session {
        Session::new()
    }

    /// Release a session. Dropping it has the same effect.
    pub fn free_session(&self, session: Session) {
        drop(session);
    }

    /// Persist the overlay if anything changed. Failures are logged and
    /// reported as `false`.
    pub fn save(&mut self) -> bool {
        match self.try_save() {
            Ok(saved) => saved,
            Err(e) => {
                warn!(error = %e, "save failed");
                false
            }
        }
    }

    /// Persist the overlay. `Ok(false)` means there was nothing to do and no
    /// file was touched.
    pub fn try_save(&mut self) -> Result<bool> {
        if self.overlay.user_dir().is_none() {
            return Err(DecoderError::NoUserDirectory);
        }
        if !self.modified {
            debug!("nothing to save");
            return Ok(false);
        }
        self.overlay.save(&self.phrase_index, self.bigram.user())?;
        self.modified = false;
        Ok(true)
    }

    /// Release the context without saving.
    pub fn finalize(self) {
        if self.modified {
            debug!("finalizing with unsaved changes");
        }
    }

    /// Add a phrase to `partition` with one pronunciation.
    ///
    /// An existing phrase with the same text in that partition gains the
    /// pronunciation and frequency instead of a new token. `keys` must hold
    /// one key per character of `text`.
    pub fn add_phrase(
        &mut self,
        partition: PartitionId,
        text: &str,
        keys: Vec<PhoneticKey>,
        freq: u32,
    ) -> Result<Token> {
        if keys.is_empty() || keys.len() != text.chars().count() {
            return Err(DecoderError::InvalidPronunciation {
                text: text.to_string(),
                keys: keys.len(),
            });
        }
        let existing = self
            .phrase_index
            .partition(partition)
            .ok_or(DecoderError::UnknownPartition(partition))?
            .iter()
            .find(|(_, item)| item.text() == text)
            .map(|(token, item)| (token, item.clone()));

        let token = match existing {
            Some((token, mut item)) => {
                item.add_pronunciation(keys, freq);
                self.phrase_index.add_phrase_item(token, item)?;
                self.phrase_index.add_unigram_frequency(token, freq);
                token
            }
            None => {
                let token = self.phrase_index.next_token(partition)?;
                let item = PhraseItem::new(text, freq).with_pronunciation(keys, freq);
                self.phrase_index.add_phrase_item(token, item)?;
                token
            }
        };
        self.refresh_indexes()?;
        self.modified = true;
        Ok(token)
    }

    /// Remove a phrase. Returns whether it existed.
    pub fn remove_phrase(&mut self, token: Token) -> Result<bool> {
        if self.phrase_index.remove_phrase_item(token).is_none() {
            return Ok(false);
        }
        self.refresh_indexes()?;
        self.modified = true;
        Ok(true)
    }

    /// Add to a phrase's unigram frequency. Returns false if absent.
    pub fn add_unigram_frequency(&mut self, token: Token, delta: u32) -> bool {
        let found = self.phrase_index.add_unigram_frequency(token, delta);
        if found {
            self.modified = true;
        } else {
            debug!(token, partition = partition_of(token), "no phrase to adjust");
        }
        found
    }

    /// Reinforce the user model with decoded match results.
    pub(crate) fn train_results(&mut self, results: &[Token]) -> Result<usize> {
        if self.overlay.user_dir().is_none() {
            return Err(DecoderError::NoUserDirectory);
        }
        self.modified = true;
        training::train_results(
            &mut self.bigram,
            &mut self.phrase_index,
            &self.config.training,
            results,
        )
    }

    fn refresh_indexes(&mut self) -> Result<()> {
        self.phonetic_index = PhoneticIndex::build(&self.phrase_index)?;
        self.phrase_table = PhraseTable::build(&self.phrase_index);
        Ok(())
    }
}
