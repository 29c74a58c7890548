//! The entity data decode pipeline.
//!
//! Locate the raw bytes, then apply decrypt and decompress in the order
//! the entity's flags record. Packers since v21 encrypt after compressing
//! (the reverse flag), so reading decrypts the stored bytes first; older
//! packages encrypted the original bytes, so decryption runs last, over
//! the decompressed output.

use flate2::read::ZlibDecoder;
use std::io::Read;
use tracing::trace;

use npk_crypto::decrypt_tea;

use crate::entity::{Entity, EntityId};
use crate::error::{Error, Result};
use crate::format::MIN_SIZE_COMPRESSABLE;
use crate::package::Package;
use crate::progress::ProgressKind;

impl Package {
    /// Read an entity's full plaintext into a fresh buffer.
    pub fn read(&self, id: EntityId) -> Result<Vec<u8>> {
        let original_size = self.entity_for(id)?.original_size() as usize;
        let mut buf = vec![0u8; original_size];
        self.read_into(id, &mut buf)?;
        Ok(buf)
    }

    /// Resolve a name and read the entity's full plaintext.
    pub fn read_by_name(&self, name: &str) -> Result<Vec<u8>> {
        let id = self.entity(name)?;
        self.read(id)
    }

    /// Read an entity's full plaintext into a caller buffer sized to its
    /// original size.
    ///
    /// On failure the buffer contents are unspecified but nothing else
    /// changes; the package stays usable.
    pub fn read_into(&self, id: EntityId, buf: &mut [u8]) -> Result<()> {
        let entity = self.entity_for(id)?;
        if buf.len() != entity.original_size() as usize {
            return Err(Error::SizeMismatch {
                expected: entity.original_size() as usize,
                actual: buf.len(),
            });
        }

        let flags = entity.flags();
        trace!(
            "reading entity {:?}: {} stored -> {} original, flags {:#x}",
            entity.name(),
            entity.stored_size(),
            entity.original_size(),
            flags.bits()
        );

        if flags.is_compressed() {
            // All raw I/O goes through a scratch buffer of the stored
            // size; the caller buffer only ever sees decoded bytes.
            let mut scratch = vec![0u8; entity.stored_size() as usize];
            self.fetch_raw(entity, 0, &mut scratch)?;

            if flags.is_encrypted() && flags.is_reverse() {
                decrypt_tea(&mut scratch, self.key());
            }

            if entity.original_size() >= MIN_SIZE_COMPRESSABLE {
                inflate_into(&scratch, buf)?;
            } else {
                // Below the worth-compressing threshold the packer stored
                // the bytes verbatim despite the flag.
                if scratch.len() != buf.len() {
                    return Err(Error::Codec(format!(
                        "entity below compression threshold but stored size {} != original size {}",
                        scratch.len(),
                        buf.len()
                    )));
                }
                buf.copy_from_slice(&scratch);
            }
        } else {
            if entity.stored_size() != entity.original_size() {
                return Err(Error::Corrupt(format!(
                    "uncompressed entity {:?} has stored size {} != original size {}",
                    entity.name(),
                    entity.stored_size(),
                    entity.original_size()
                )));
            }
            self.fetch_raw(entity, 0, buf)?;

            if flags.is_encrypted() && flags.is_reverse() {
                decrypt_tea(buf, self.key());
            }
        }

        if flags.is_encrypted() && !flags.is_reverse() {
            decrypt_tea(buf, self.key());
        }

        Ok(())
    }

    /// Read a raw byte range of a plain entity.
    ///
    /// Compressed or encrypted entities are rejected outright, whatever
    /// the range: a sub-range of their stored bytes cannot be decoded
    /// without materializing the whole entity first.
    pub fn read_partial(&self, id: EntityId, offset: u64, buf: &mut [u8]) -> Result<()> {
        let entity = self.entity_for(id)?;
        if entity.flags().needs_whole_read() {
            return Err(Error::PartialUnsupported(entity.name().to_string()));
        }
        match offset.checked_add(buf.len() as u64) {
            Some(end) if end <= u64::from(entity.stored_size()) => {}
            _ => {
                return Err(Error::InvalidRange {
                    offset,
                    len: buf.len(),
                    size: entity.stored_size(),
                });
            }
        }
        self.fetch_raw(entity, offset, buf)
    }

    fn entity_for(&self, id: EntityId) -> Result<&Entity> {
        self.get(id)
            .ok_or_else(|| Error::NotFound(format!("entity id {:?}", id)))
    }

    /// One guarded seek+read of the entity's stored bytes.
    fn fetch_raw(&self, entity: &Entity, offset: u64, buf: &mut [u8]) -> Result<()> {
        self.source().read_at(
            u64::from(entity.offset()) + offset,
            buf,
            ProgressKind::EntityData,
            entity.name(),
        )
    }
}

/// Inflate `stored` into exactly `buf`. Both a decoder failure and a
/// produced-length mismatch are codec failures.
///
/// The decode is capped one byte past the buffer: a stream that inflates
/// beyond the recorded original size is rejected without materializing it.
fn inflate_into(stored: &[u8], buf: &mut [u8]) -> Result<()> {
    let decoder = ZlibDecoder::new(stored);
    let mut decoded = Vec::with_capacity(buf.len());
    decoder
        .take(buf.len() as u64 + 1)
        .read_to_end(&mut decoded)
        .map_err(|e| Error::Codec(format!("zlib decompression failed: {e}")))?;

    if decoded.len() != buf.len() {
        return Err(Error::Codec(format!(
            "decompressed to {} or more bytes, expected {}",
            decoded.len(),
            buf.len()
        )));
    }
    buf.copy_from_slice(&decoded);
    Ok(())
}
