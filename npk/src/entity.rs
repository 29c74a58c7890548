//! Entities: the named blobs inside a package.

use crate::format::{EntityFlags, EntityRecord};

/// Stable handle to an entity within its package.
///
/// Ids are indices into the package's directory, assigned in on-disk
/// order at open time, and stay valid for the life of the package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntityId(pub(crate) u32);

/// One packed object: its name and the directory record that locates and
/// describes its data.
#[derive(Debug, Clone)]
pub struct Entity {
    name: String,
    offset: u32,
    size: u32,
    original_size: u32,
    flags: EntityFlags,
    modified: u64,
}

impl Entity {
    pub(crate) fn from_record(record: &EntityRecord, name: String) -> Self {
        Self {
            name,
            offset: record.offset,
            size: record.size,
            original_size: record.original_size,
            flags: record.flags,
            modified: record.modified,
        }
    }

    /// Entity name. Unique within the package under the directory's
    /// comparison mode (case-insensitive by default).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Raw data offset relative to the package start.
    pub fn offset(&self) -> u32 {
        self.offset
    }

    /// Stored (possibly compressed) size in bytes.
    pub fn stored_size(&self) -> u32 {
        self.size
    }

    /// Original (decompressed) size in bytes. Buffers passed to the full
    /// read path must be exactly this long.
    pub fn original_size(&self) -> u32 {
        self.original_size
    }

    pub fn flags(&self) -> EntityFlags {
        self.flags
    }

    /// Modification time, Unix seconds.
    pub fn modified(&self) -> u64 {
        self.modified
    }
}
