//! On-disk format definitions for npk packages.
//!
//! Several generations of the format are in the wild. The version line
//! this reader cares about:
//!
//! - `21` — the refactoring revision. Anything older has no decoder here.
//! - `23` — entity records switch from a Windows FILETIME pair to Unix
//!   seconds.
//! - `24` — the package header gains a modification timestamp.
//! - `25` — the entity directory becomes one contiguous encrypted block
//!   instead of a per-entity encrypted stream. Also the current version.
//!
//! All integers are little-endian.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

use crate::{Error, Result};

/// Current package signature.
pub const MAGIC: [u8; 4] = *b"NPAK";
/// Signature written by pre-refactoring packers; still accepted.
pub const MAGIC_LEGACY: [u8; 4] = *b"npak";

/// Oldest version with a decoder.
pub const VERSION_REFACTORING: u32 = 21;
/// Entity records carry Unix time from this version on.
pub const VERSION_UNIX_TIME: u32 = 23;
/// The package header carries its own timestamp from this version on.
pub const VERSION_PACKAGE_TIMESTAMP: u32 = 24;
/// The entity directory is a single encrypted block from this version on.
pub const VERSION_SINGLE_DIRECTORY: u32 = 25;
/// Version written by current packers.
pub const VERSION_CURRENT: u32 = VERSION_SINGLE_DIRECTORY;

/// Entities smaller than this are stored raw even when flagged compressed;
/// the packer never ran them through the compressor.
pub const MIN_SIZE_COMPRESSABLE: u32 = 256;

/// Fixed bucket count of the name hash index.
pub const HASH_BUCKETS: usize = 256;

/// Names longer than this are rejected as corrupt (the packer caps them).
pub const MAX_NAME_LEN: u32 = 512;

/// Size of the fixed package header on disk.
pub const HEADER_LEN: usize = 16;
/// Size of one entity-info record on disk (both generations).
pub const ENTITY_RECORD_LEN: usize = 28;

// Offset between the FILETIME epoch (1601-01-01) and the Unix epoch, in
// 100ns ticks.
const FILETIME_UNIX_DIFF: u64 = 116_444_736_000_000_000;

/// Convert a Windows FILETIME (100ns ticks since 1601) to Unix seconds.
pub fn filetime_to_unix(low: u32, high: u32) -> u64 {
    let ticks = (u64::from(high) << 32) | u64::from(low);
    ticks.saturating_sub(FILETIME_UNIX_DIFF) / 10_000_000
}

/// Convert Unix seconds to a FILETIME (low, high) pair.
pub fn unix_to_filetime(unix: u64) -> (u32, u32) {
    let ticks = unix * 10_000_000 + FILETIME_UNIX_DIFF;
    (ticks as u32, (ticks >> 32) as u32)
}

/// Per-entity flag bitmask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EntityFlags(u32);

impl EntityFlags {
    /// Entity payload went through the compressor (if large enough).
    pub const COMPRESS: u32 = 0x0000_0001;
    /// Entity payload is TEA-encrypted.
    pub const ENCRYPT: u32 = 0x0000_0002;
    /// Decrypt happens before decompression (packers since v21); without
    /// this, decrypt runs after decompression over the original bytes.
    pub const REVERSE: u32 = 0x0000_0004;

    pub fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn is_compressed(self) -> bool {
        self.0 & Self::COMPRESS != 0
    }

    pub fn is_encrypted(self) -> bool {
        self.0 & Self::ENCRYPT != 0
    }

    pub fn is_reverse(self) -> bool {
        self.0 & Self::REVERSE != 0
    }

    /// True when the payload cannot be consumed without the whole-entity
    /// decode pipeline.
    pub fn needs_whole_read(self) -> bool {
        self.0 & (Self::COMPRESS | Self::ENCRYPT) != 0
    }
}

/// The fixed package header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageHeader {
    pub magic: [u8; 4],
    pub version: u32,
    /// On-disk entity count. Treated as a hint; the live count is
    /// rebuilt while the directory is validated.
    pub entity_count: u32,
    /// File offset of the entity directory, relative to the package start.
    pub directory_offset: u32,
}

impl PackageHeader {
    /// Parse the header at the reader's current position.
    ///
    /// Accepts the current and the legacy signature; anything else fails
    /// as not-a-valid-package.
    pub fn parse<R: Read>(r: &mut R) -> Result<Self> {
        let mut magic = [0u8; 4];
        r.read_exact(&mut magic)?;
        if magic != MAGIC && magic != MAGIC_LEGACY {
            return Err(Error::FormatMismatch(magic));
        }

        Ok(Self {
            magic,
            version: r.read_u32::<LittleEndian>()?,
            entity_count: r.read_u32::<LittleEndian>()?,
            directory_offset: r.read_u32::<LittleEndian>()?,
        })
    }

    /// Write the header. The read path does not use this; package fixtures
    /// and external packers do.
    pub fn write_to<W: Write>(&self, w: &mut W) -> Result<()> {
        w.write_all(&self.magic)?;
        w.write_u32::<LittleEndian>(self.version)?;
        w.write_u32::<LittleEndian>(self.entity_count)?;
        w.write_u32::<LittleEndian>(self.directory_offset)?;
        Ok(())
    }
}

/// One entity-info record from the directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityRecord {
    /// Raw data offset, relative to the package start.
    pub offset: u32,
    /// Stored (possibly compressed) size.
    pub size: u32,
    /// Original (decompressed) size.
    pub original_size: u32,
    pub flags: EntityFlags,
    /// Modification time, Unix seconds.
    pub modified: u64,
    /// Length of the raw name bytes that follow the record.
    pub name_len: u32,
}

impl EntityRecord {
    /// Parse a modern (v23+) record.
    pub fn parse<R: Read>(r: &mut R) -> Result<Self> {
        Ok(Self {
            offset: r.read_u32::<LittleEndian>()?,
            size: r.read_u32::<LittleEndian>()?,
            original_size: r.read_u32::<LittleEndian>()?,
            flags: EntityFlags::from_bits(r.read_u32::<LittleEndian>()?),
            modified: r.read_u64::<LittleEndian>()?,
            name_len: r.read_u32::<LittleEndian>()?,
        })
    }

    /// Parse a pre-v23 record, mapping its FILETIME pair to Unix time.
    pub fn parse_legacy<R: Read>(r: &mut R) -> Result<Self> {
        let offset = r.read_u32::<LittleEndian>()?;
        let size = r.read_u32::<LittleEndian>()?;
        let original_size = r.read_u32::<LittleEndian>()?;
        let flags = EntityFlags::from_bits(r.read_u32::<LittleEndian>()?);
        let ft_low = r.read_u32::<LittleEndian>()?;
        let ft_high = r.read_u32::<LittleEndian>()?;
        let name_len = r.read_u32::<LittleEndian>()?;

        Ok(Self {
            offset,
            size,
            original_size,
            flags,
            modified: filetime_to_unix(ft_low, ft_high),
            name_len,
        })
    }

    /// Write a modern record.
    pub fn write_to<W: Write>(&self, w: &mut W) -> Result<()> {
        w.write_u32::<LittleEndian>(self.offset)?;
        w.write_u32::<LittleEndian>(self.size)?;
        w.write_u32::<LittleEndian>(self.original_size)?;
        w.write_u32::<LittleEndian>(self.flags.bits())?;
        w.write_u64::<LittleEndian>(self.modified)?;
        w.write_u32::<LittleEndian>(self.name_len)?;
        Ok(())
    }

    /// Write a pre-v23 record with the FILETIME pair.
    pub fn write_legacy_to<W: Write>(&self, w: &mut W) -> Result<()> {
        let (ft_low, ft_high) = unix_to_filetime(self.modified);
        w.write_u32::<LittleEndian>(self.offset)?;
        w.write_u32::<LittleEndian>(self.size)?;
        w.write_u32::<LittleEndian>(self.original_size)?;
        w.write_u32::<LittleEndian>(self.flags.bits())?;
        w.write_u32::<LittleEndian>(ft_low)?;
        w.write_u32::<LittleEndian>(ft_high)?;
        w.write_u32::<LittleEndian>(self.name_len)?;
        Ok(())
    }
}
