//! Package handles: open, lookup, iteration, teardown.

use std::fmt;
use std::fs::File;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

use npk_crypto::TeaKey;

use crate::entity::{Entity, EntityId};
use crate::error::{Error, Result};
use crate::index::Directory;
use crate::io::PackageSource;
use crate::parser;
use crate::progress::Progress;

const NO_LAST_RESOLVED: usize = usize::MAX;

/// Open-time options.
#[derive(Debug, Default, Clone)]
pub struct PackageOptions {
    /// Disable the name hash index; lookups fall back to a linear scan
    /// with identical results.
    pub disable_hash_index: bool,
    /// Advisory per-read progress callback.
    pub progress: Option<Progress>,
}

/// One open archive: the shared file handle and the parsed, immutable
/// entity directory.
///
/// A package never changes after a successful open; the only mutable
/// state is the last-resolved hint slot and the seek cursor, both of
/// which are internally guarded.
pub struct Package {
    source: PackageSource,
    key: TeaKey,
    version: u32,
    modified: Option<u64>,
    directory_offset: u32,
    directory: Directory,
    /// Hint slot recording the most recent successful lookup. Concurrent
    /// lookups may overwrite each other; nothing depends on the value.
    last_resolved: AtomicUsize,
}

impl fmt::Debug for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Package")
            .field("version", &self.version)
            .field("entities", &self.directory.len())
            .field("directory_offset", &self.directory_offset)
            .finish_non_exhaustive()
    }
}

impl Package {
    /// Open a package file with default options.
    pub fn open<P: AsRef<Path>>(path: P, key: &TeaKey) -> Result<Self> {
        Self::open_with(path, key, PackageOptions::default())
    }

    /// Open a package file.
    pub fn open_with<P: AsRef<Path>>(path: P, key: &TeaKey, options: PackageOptions) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let label = path.display().to_string();
        let source = PackageSource::new(file, 0, false, options.progress);
        Self::build(source, None, key, options.disable_hash_index, &label)
    }

    /// Open a package embedded in an already-open file.
    ///
    /// `offset` is where the package starts inside `file` and is added to
    /// every subsequent seek; `size` is the package's byte length when
    /// known (required information when other data follows the package).
    /// The descriptor is adopted, not owned: [`into_inner`](Self::into_inner)
    /// hands it back instead of closing it.
    pub fn from_file(
        file: File,
        offset: u64,
        size: Option<u64>,
        key: &TeaKey,
        options: PackageOptions,
    ) -> Result<Self> {
        let source = PackageSource::new(file, offset, true, options.progress);
        Self::build(source, size, key, options.disable_hash_index, "<embedded>")
    }

    fn build(
        source: PackageSource,
        known_size: Option<u64>,
        key: &TeaKey,
        disable_hash_index: bool,
        label: &str,
    ) -> Result<Self> {
        // Any failure here drops the source (and with it an owned
        // descriptor) and every entity decoded so far.
        let parsed = parser::parse_package(&source, known_size, key, !disable_hash_index, label)?;
        Ok(Self {
            source,
            key: *key,
            version: parsed.version,
            modified: parsed.modified,
            directory_offset: parsed.directory_offset,
            directory: parsed.directory,
            last_resolved: AtomicUsize::new(NO_LAST_RESOLVED),
        })
    }

    /// Format version of this package.
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Package modification time (Unix seconds), recorded since v24.
    pub fn modified(&self) -> Option<u64> {
        self.modified
    }

    /// Live entity count, rebuilt at open time from validated records.
    pub fn len(&self) -> usize {
        self.directory.len()
    }

    pub fn is_empty(&self) -> bool {
        self.directory.len() == 0
    }

    /// Resolve an entity by name (case-insensitive unless the
    /// `case-sensitive` feature is on). A hit updates the last-resolved
    /// hint; a miss changes nothing.
    pub fn entity(&self, name: &str) -> Result<EntityId> {
        match self.directory.lookup(name) {
            Some(id) => {
                self.last_resolved.store(id.0 as usize, Ordering::Relaxed);
                Ok(id)
            }
            None => Err(Error::NotFound(name.to_string())),
        }
    }

    /// Entity for a previously resolved id.
    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.directory.get(id)
    }

    /// Entities in on-disk directory order, independent of hashing mode.
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.directory.iter().map(|(_, e)| e)
    }

    /// Ids and entities in on-disk directory order.
    pub fn iter(&self) -> impl Iterator<Item = (EntityId, &Entity)> {
        self.directory.iter()
    }

    /// The most recently resolved entity, if any. A non-authoritative
    /// hint: concurrent lookups race on it benignly.
    pub fn last_resolved(&self) -> Option<EntityId> {
        match self.last_resolved.load(Ordering::Relaxed) {
            NO_LAST_RESOLVED => None,
            id => Some(EntityId(id as u32)),
        }
    }

    /// File offset of the entity directory.
    pub fn directory_offset(&self) -> u32 {
        self.directory_offset
    }

    pub(crate) fn source(&self) -> &PackageSource {
        &self.source
    }

    pub(crate) fn key(&self) -> &TeaKey {
        &self.key
    }

    /// Tear the package down. Entities and the directory are freed with
    /// the handle; an owned descriptor is closed, an adopted one is
    /// closed too unless recovered first via [`into_inner`](Self::into_inner).
    pub fn close(self) {
        debug!("closing npk package ({} entities)", self.len());
        drop(self);
    }

    /// Tear the package down and hand back the underlying descriptor.
    ///
    /// This is how an adopted descriptor is returned to its owner instead
    /// of being closed.
    pub fn into_inner(self) -> File {
        debug!(
            "releasing npk package descriptor (adopted: {})",
            self.source.adopted()
        );
        self.source.into_file()
    }
}
