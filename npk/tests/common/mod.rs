//! Test fixture builder: emits npk package bytes in every supported
//! on-disk generation so the reader can be exercised against real layouts.

use flate2::Compression;
use flate2::write::ZlibEncoder;
use std::io::Write;

use npk::TeaKey;
use npk::format::{
    EntityFlags, EntityRecord, HEADER_LEN, MAGIC, MAGIC_LEGACY, MIN_SIZE_COMPRESSABLE,
    PackageHeader, VERSION_PACKAGE_TIMESTAMP, VERSION_SINGLE_DIRECTORY, VERSION_UNIX_TIME,
};
use npk_crypto::encrypt_tea;

pub const TEST_TIMESTAMP: u64 = 1_725_000_000;

pub fn test_key() -> TeaKey {
    TeaKey::new([0xDEAD_BEEF, 0x0BAD_F00D, 0x1234_5678, 0x9ABC_DEF0])
}

pub struct EntitySpec {
    pub name: String,
    pub data: Vec<u8>,
    pub compress: bool,
    pub encrypt: bool,
    pub reverse: bool,
    pub modified: u64,
    /// When set, the emitted record's offset field is replaced, for
    /// corruption tests.
    pub offset_override: Option<u32>,
    /// When set, the emitted record's original-size field is replaced,
    /// for tamper tests against the decode pipeline.
    pub original_size_override: Option<u32>,
}

pub struct PackageBuilder {
    version: u32,
    legacy_magic: bool,
    entities: Vec<EntitySpec>,
}

impl PackageBuilder {
    pub fn new(version: u32) -> Self {
        Self {
            version,
            legacy_magic: false,
            entities: Vec::new(),
        }
    }

    pub fn with_legacy_magic(mut self) -> Self {
        self.legacy_magic = true;
        self
    }

    pub fn plain(self, name: &str, data: &[u8]) -> Self {
        self.entity(name, data, false, false, false)
    }

    pub fn compressed(self, name: &str, data: &[u8]) -> Self {
        self.entity(name, data, true, false, false)
    }

    pub fn encrypted(self, name: &str, data: &[u8], reverse: bool) -> Self {
        self.entity(name, data, false, true, reverse)
    }

    pub fn entity(
        mut self,
        name: &str,
        data: &[u8],
        compress: bool,
        encrypt: bool,
        reverse: bool,
    ) -> Self {
        self.entities.push(EntitySpec {
            name: name.to_string(),
            data: data.to_vec(),
            compress,
            encrypt,
            reverse,
            modified: TEST_TIMESTAMP,
            offset_override: None,
            original_size_override: None,
        });
        self
    }

    pub fn push(mut self, spec: EntitySpec) -> Self {
        self.entities.push(spec);
        self
    }

    /// Serialize the package. The store-time transform is the exact
    /// inverse of the read pipeline: legacy encrypt, then compress, then
    /// reverse encrypt.
    pub fn build(&self, key: &TeaKey) -> Vec<u8> {
        let data_start =
            HEADER_LEN as u32 + if self.version >= VERSION_PACKAGE_TIMESTAMP { 8 } else { 0 };

        let mut payloads: Vec<Vec<u8>> = Vec::new();
        let mut records: Vec<EntityRecord> = Vec::new();
        let mut offset = data_start;

        for spec in &self.entities {
            let mut stored = spec.data.clone();

            if spec.encrypt && !spec.reverse {
                encrypt_tea(&mut stored, key);
            }
            if spec.compress && spec.data.len() as u32 >= MIN_SIZE_COMPRESSABLE {
                let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
                encoder.write_all(&stored).unwrap();
                stored = encoder.finish().unwrap();
            }
            if spec.encrypt && spec.reverse {
                encrypt_tea(&mut stored, key);
            }

            let mut flags = 0;
            if spec.compress {
                flags |= EntityFlags::COMPRESS;
            }
            if spec.encrypt {
                flags |= EntityFlags::ENCRYPT;
            }
            if spec.reverse {
                flags |= EntityFlags::REVERSE;
            }

            records.push(EntityRecord {
                offset: spec.offset_override.unwrap_or(offset),
                size: stored.len() as u32,
                original_size: spec
                    .original_size_override
                    .unwrap_or(spec.data.len() as u32),
                flags: EntityFlags::from_bits(flags),
                modified: spec.modified,
                name_len: spec.name.len() as u32,
            });
            offset += stored.len() as u32;
            payloads.push(stored);
        }

        let directory_offset = offset;
        let mut out = Vec::new();

        let header = PackageHeader {
            magic: if self.legacy_magic { MAGIC_LEGACY } else { MAGIC },
            version: self.version,
            entity_count: self.entities.len() as u32,
            directory_offset,
        };
        header.write_to(&mut out).unwrap();
        if self.version >= VERSION_PACKAGE_TIMESTAMP {
            out.extend_from_slice(&TEST_TIMESTAMP.to_le_bytes());
        }
        for payload in &payloads {
            out.extend_from_slice(payload);
        }

        if self.version >= VERSION_SINGLE_DIRECTORY {
            // One contiguous block, encrypted as a whole.
            let mut block = Vec::new();
            for (record, spec) in records.iter().zip(&self.entities) {
                record.write_to(&mut block).unwrap();
                block.extend_from_slice(spec.name.as_bytes());
            }
            encrypt_tea(&mut block, key);
            out.extend_from_slice(&block);
        } else {
            // Record and name encrypted individually, per entity.
            for (record, spec) in records.iter().zip(&self.entities) {
                let mut record_buf = Vec::new();
                if self.version >= VERSION_UNIX_TIME {
                    record.write_to(&mut record_buf).unwrap();
                } else {
                    record.write_legacy_to(&mut record_buf).unwrap();
                }
                encrypt_tea(&mut record_buf, key);
                out.extend_from_slice(&record_buf);

                let mut name_buf = spec.name.as_bytes().to_vec();
                encrypt_tea(&mut name_buf, key);
                out.extend_from_slice(&name_buf);
            }
        }

        out
    }

    /// Serialize and write to a file under `dir`, returning the path.
    pub fn write(&self, dir: &std::path::Path, filename: &str, key: &TeaKey) -> std::path::PathBuf {
        let path = dir.join(filename);
        std::fs::write(&path, self.build(key)).unwrap();
        path
    }
}

/// Compressible payload of the given length.
pub fn patterned(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i / 16) as u8).collect()
}
