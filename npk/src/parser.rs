//! The multi-version header and entity-directory parser.
//!
//! Open-time only: reads the fixed header, gates on signature and version,
//! then decodes the directory in whichever shape the version prescribes.
//! v25+ packages keep the whole directory as one contiguous TEA-encrypted
//! block; older packages encrypt each record and name individually, and
//! pre-v23 records need their FILETIME mapped to Unix time.

use std::io::{Cursor, Read};
use tracing::{debug, trace};

use npk_crypto::TeaKey;

use crate::entity::Entity;
use crate::error::{Error, Result};
use crate::format::{
    ENTITY_RECORD_LEN, EntityRecord, HEADER_LEN, MAX_NAME_LEN, PackageHeader,
    VERSION_PACKAGE_TIMESTAMP, VERSION_REFACTORING, VERSION_SINGLE_DIRECTORY, VERSION_UNIX_TIME,
};
use crate::index::Directory;
use crate::io::PackageSource;
use crate::progress::ProgressKind;

/// Everything the parser hands to the package constructor.
pub(crate) struct ParsedPackage {
    pub version: u32,
    /// Package timestamp, present from v24 on.
    pub modified: Option<u64>,
    pub directory_offset: u32,
    pub directory: Directory,
}

fn truncated() -> Error {
    Error::Corrupt("entity directory truncated".into())
}

/// Parse a package from `source`.
///
/// `known_size` is the package's total byte length when the caller knows
/// it (embedded packages); otherwise it is measured from the file.
pub(crate) fn parse_package(
    source: &PackageSource,
    known_size: Option<u64>,
    key: &TeaKey,
    use_hash_index: bool,
    label: &str,
) -> Result<ParsedPackage> {
    let mut header_buf = [0u8; HEADER_LEN];
    source.read_at(0, &mut header_buf, ProgressKind::PackageHeader, label)?;
    let header = PackageHeader::parse(&mut Cursor::new(&header_buf))?;

    if header.version < VERSION_REFACTORING {
        return Err(Error::UnsupportedVersion(header.version));
    }

    debug!(
        "opening npk package: version {}, {} entities, directory at {:#x}",
        header.version, header.entity_count, header.directory_offset
    );

    let modified = if header.version >= VERSION_PACKAGE_TIMESTAMP {
        let mut ts_buf = [0u8; 8];
        source.read_at(
            HEADER_LEN as u64,
            &mut ts_buf,
            ProgressKind::PackageHeader,
            label,
        )?;
        Some(u64::from_le_bytes(ts_buf))
    } else {
        None
    };

    let mut directory = Directory::new(use_hash_index);
    if header.version >= VERSION_SINGLE_DIRECTORY {
        parse_single_block(source, known_size, key, &header, &mut directory, label)?;
    } else {
        parse_per_entity(source, key, &header, &mut directory, label)?;
    }

    debug!("decoded {} entities", directory.len());

    Ok(ParsedPackage {
        version: header.version,
        modified,
        directory_offset: header.directory_offset,
        directory,
    })
}

/// v25+: one contiguous encrypted directory block at the header-given
/// offset, running to the end of the package.
fn parse_single_block(
    source: &PackageSource,
    known_size: Option<u64>,
    key: &TeaKey,
    header: &PackageHeader,
    directory: &mut Directory,
    label: &str,
) -> Result<()> {
    let total = match known_size {
        Some(size) => size,
        None => source.total_size()?,
    };
    let dir_offset = u64::from(header.directory_offset);
    if dir_offset > total {
        return Err(Error::Corrupt(format!(
            "directory offset {dir_offset} past end of package ({total} bytes)"
        )));
    }

    let dir_len = (total - dir_offset) as usize;
    let mut block = vec![0u8; dir_len];
    source.read_at_decrypt(
        dir_offset,
        &mut block,
        key,
        ProgressKind::EntityDirectory,
        label,
    )?;

    let mut cursor = Cursor::new(block.as_slice());
    for _ in 0..header.entity_count {
        let record = EntityRecord::parse(&mut cursor).map_err(|_| truncated())?;
        check_offset(&record, header)?;

        let name = read_name(&mut cursor, record.name_len)?;
        trace!("entity {:?}: {} stored bytes", name, record.size);
        directory.insert(Entity::from_record(&record, name));
    }
    Ok(())
}

/// Pre-v25: a per-entity stream of individually encrypted record and name
/// reads; pre-v23 records carry the shorter FILETIME layout.
fn parse_per_entity(
    source: &PackageSource,
    key: &TeaKey,
    header: &PackageHeader,
    directory: &mut Directory,
    label: &str,
) -> Result<()> {
    let legacy_time = header.version < VERSION_UNIX_TIME;
    let mut pos = u64::from(header.directory_offset);

    for _ in 0..header.entity_count {
        let mut record_buf = [0u8; ENTITY_RECORD_LEN];
        source.read_at_decrypt(
            pos,
            &mut record_buf,
            key,
            ProgressKind::EntityDirectory,
            label,
        )?;
        pos += ENTITY_RECORD_LEN as u64;

        let mut cursor = Cursor::new(&record_buf[..]);
        let record = if legacy_time {
            EntityRecord::parse_legacy(&mut cursor)?
        } else {
            EntityRecord::parse(&mut cursor)?
        };
        check_offset(&record, header)?;

        if record.name_len > MAX_NAME_LEN {
            return Err(Error::Corrupt(format!(
                "entity name length {} exceeds limit",
                record.name_len
            )));
        }
        let mut name_buf = vec![0u8; record.name_len as usize];
        source.read_at_decrypt(
            pos,
            &mut name_buf,
            key,
            ProgressKind::EntityDirectory,
            label,
        )?;
        pos += u64::from(record.name_len);

        let name = String::from_utf8(name_buf)
            .map_err(|_| Error::Corrupt("entity name is not valid UTF-8".into()))?;
        trace!("entity {:?}: {} stored bytes", name, record.size);
        directory.insert(Entity::from_record(&record, name));
    }
    Ok(())
}

/// Every entity's data must live below the directory. A violation means
/// the records decrypted to garbage, which is how a wrong key shows up.
fn check_offset(record: &EntityRecord, header: &PackageHeader) -> Result<()> {
    if record.offset >= header.directory_offset {
        return Err(Error::BadKey);
    }
    Ok(())
}

fn read_name(cursor: &mut Cursor<&[u8]>, name_len: u32) -> Result<String> {
    if name_len > MAX_NAME_LEN {
        return Err(Error::Corrupt(format!(
            "entity name length {name_len} exceeds limit"
        )));
    }
    let mut name_buf = vec![0u8; name_len as usize];
    cursor.read_exact(&mut name_buf).map_err(|_| truncated())?;
    String::from_utf8(name_buf).map_err(|_| Error::Corrupt("entity name is not valid UTF-8".into()))
}
