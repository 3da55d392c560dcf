//! Bigram stores and the merged system/user context model.
//!
//! A [`Bigram`] maps a context token to the [`SingleGram`] of tokens observed
//! after it. Both the system and the user store are copied into memory from
//! their `redb` files, so no database handle (and no file lock) outlives
//! loading; only the user store is ever saved back.

use std::collections::BTreeMap;
use std::fmt;
use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::Mutex;

use lru::LruCache;
use redb::{Database, ReadableTable, TableDefinition};
use tracing::debug;

use crate::chunk;
use crate::error::{DecoderError, Result};
use crate::single_gram::SingleGram;
use crate::token::{Token, NULL_TOKEN};

const BIGRAM_TABLE: TableDefinition<u32, &[u8]> = TableDefinition::new("bigram");

/// Open flags for attaching a bigram store.
///
/// `read_only` and `read_write` are mutually exclusive; `create` creates a
/// missing file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AttachFlags {
    pub read_only: bool,
    pub read_write: bool,
    pub create: bool,
}

impl AttachFlags {
    pub const READ_ONLY: AttachFlags = AttachFlags {
        read_only: true,
        read_write: false,
        create: false,
    };

    pub const READ_WRITE: AttachFlags = AttachFlags {
        read_only: false,
        read_write: true,
        create: false,
    };

    pub fn with_create(self) -> Self {
        Self {
            create: true,
            ..self
        }
    }

    fn validate(self) -> Result<()> {
        if self.read_only == self.read_write {
            return Err(DecoderError::InvalidAttachFlags);
        }
        Ok(())
    }
}

enum Backend {
    Attached { db: Database, writable: bool },
    Memory(BTreeMap<Token, SingleGram>),
}

pub struct Bigram {
    backend: Backend,
}

impl fmt::Debug for Bigram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.backend {
            Backend::Attached { writable, .. } => f
                .debug_struct("Bigram")
                .field("attached", &true)
                .field("writable", writable)
                .finish(),
            Backend::Memory(map) => f
                .debug_struct("Bigram")
                .field("contexts", &map.len())
                .finish(),
        }
    }
}

impl Default for Bigram {
    fn default() -> Self {
        Self::new()
    }
}

impl Bigram {
    /// Empty in-memory store.
    pub fn new() -> Self {
        Self {
            backend: Backend::Memory(BTreeMap::new()),
        }
    }

    /// Attach an on-disk store.
    pub fn attach<P: AsRef<Path>>(path: P, flags: AttachFlags) -> Result<Self> {
        flags.validate()?;
        let path = path.as_ref();
        let db = if flags.create {
            Database::create(path).map_err(redb::Error::from)?
        } else {
            if !path.exists() {
                return Err(DecoderError::io(
                    path,
                    std::io::Error::from(std::io::ErrorKind::NotFound),
                ));
            }
            Database::open(path).map_err(redb::Error::from)?
        };
        Ok(Self {
            backend: Backend::Attached {
                db,
                writable: flags.read_write,
            },
        })
    }

    /// Copy an on-disk store into memory. A missing file yields an empty store.
    pub fn load_db<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!(path = %path.display(), "no bigram store, starting empty");
            return Ok(Self::new());
        }
        let attached = Self::attach(path, AttachFlags::READ_ONLY)?;
        let mut map = BTreeMap::new();
        attached.for_each(|token, gram| {
            map.insert(token, gram);
        })?;
        Ok(Self {
            backend: Backend::Memory(map),
        })
    }

    /// Write every context into a fresh store at `path`, replacing any file
    /// already there.
    pub fn save_db<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        chunk::remove_if_exists(path)?;
        let db = Database::create(path).map_err(redb::Error::from)?;

        let mut grams = Vec::new();
        self.for_each(|token, gram| grams.push((token, gram)))?;
        let encoded = grams
            .iter()
            .map(|(token, gram)| Ok((*token, bincode::serialize(gram)?)))
            .collect::<Result<Vec<_>>>()?;
        write_all(&db, &encoded)?;
        Ok(())
    }

    /// The gram observed after `token`, if any.
    pub fn load(&self, token: Token) -> Result<Option<SingleGram>> {
        match &self.backend {
            Backend::Memory(map) => Ok(map.get(&token).cloned()),
            Backend::Attached { db, .. } => match read_one(db, token)? {
                Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
                None => Ok(None),
            },
        }
    }

    pub fn store(&mut self, token: Token, gram: SingleGram) -> Result<()> {
        match &mut self.backend {
            Backend::Memory(map) => {
                map.insert(token, gram);
                Ok(())
            }
            Backend::Attached { writable: false, .. } => Err(DecoderError::ReadOnlyStore),
            Backend::Attached { db, .. } => {
                let bytes = bincode::serialize(&gram)?;
                write_all(db, &[(token, bytes)])?;
                Ok(())
            }
        }
    }

    /// Visit every `(context, gram)` pair in ascending context order.
    pub fn for_each<F: FnMut(Token, SingleGram)>(&self, mut f: F) -> Result<()> {
        match &self.backend {
            Backend::Memory(map) => {
                for (token, gram) in map {
                    f(*token, gram.clone());
                }
            }
            Backend::Attached { db, .. } => {
                for (token, bytes) in read_all(db)? {
                    f(token, bincode::deserialize(&bytes)?);
                }
            }
        }
        Ok(())
    }
}

fn read_one(db: &Database, token: Token) -> Result<Option<Vec<u8>>, redb::Error> {
    let txn = db.begin_read()?;
    let table = match txn.open_table(BIGRAM_TABLE) {
        Ok(t) => t,
        Err(redb::TableError::TableDoesNotExist(_)) => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    Ok(table.get(token)?.map(|v| v.value().to_vec()))
}

fn read_all(db: &Database) -> Result<Vec<(Token, Vec<u8>)>, redb::Error> {
    let txn = db.begin_read()?;
    let table = match txn.open_table(BIGRAM_TABLE) {
        Ok(t) => t,
        Err(redb::TableError::TableDoesNotExist(_)) => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    let mut out = Vec::new();
    for item in table.iter()? {
        let (k, v) = item?;
        out.push((k.value(), v.value().to_vec()));
    }
    Ok(out)
}

fn write_all(db: &Database, entries: &[(Token, Vec<u8>)]) -> Result<(), redb::Error> {
    let txn = db.begin_write()?;
    {
        let mut table = txn.open_table(BIGRAM_TABLE)?;
        for (token, bytes) in entries {
            table.insert(*token, bytes.as_slice())?;
        }
    }
    txn.commit()?;
    Ok(())
}

/// System and user bigram statistics for context lookups.
///
/// Merged context models are cached per preceding token; reinforcing a
/// context evicts its entry.
pub struct BigramModel {
    system: Option<Bigram>,
    user: Bigram,
    merged_cache: Mutex<LruCache<Token, SingleGram>>,
}

impl fmt::Debug for BigramModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BigramModel")
            .field("system", &self.system)
            .field("user", &self.user)
            .finish()
    }
}

impl BigramModel {
    pub fn new(system: Option<Bigram>, user: Bigram, cache_size: usize) -> Self {
        let cap = NonZeroUsize::new(cache_size).unwrap_or(NonZeroUsize::MIN);
        Self {
            system,
            user,
            merged_cache: Mutex::new(LruCache::new(cap)),
        }
    }

    pub fn user(&self) -> &Bigram {
        &self.user
    }

    fn cache(&self) -> std::sync::MutexGuard<'_, LruCache<Token, SingleGram>> {
        self.merged_cache
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Merged statistics of tokens following `preceding`.
    ///
    /// `None` for `NULL_TOKEN` without touching storage; otherwise the
    /// count-wise merge of both stores, empty when neither has the context.
    pub fn context_model(&self, preceding: Token) -> Result<Option<SingleGram>> {
        if preceding == NULL_TOKEN {
            return Ok(None);
        }
        if let Some(hit) = self.cache().get(&preceding) {
            return Ok(Some(hit.clone()));
        }
        let system = match &self.system {
            Some(store) => store.load(preceding)?,
            None => None,
        };
        let user = self.user.load(preceding)?;
        let merged = SingleGram::merge(system.as_ref(), user.as_ref());
        self.cache().put(preceding, merged.clone());
        Ok(Some(merged))
    }

    /// Add `increment` to the user count of `following` after `preceding`.
    pub(crate) fn reinforce(&mut self, preceding: Token, following: Token, increment: u32) -> Result<()> {
        let mut gram = self.user.load(preceding)?.unwrap_or_default();
        gram.increase_freq(following, increment);
        self.user.store(preceding, gram)?;
        self.cache().pop(&preceding);
        Ok(())
    }
}
