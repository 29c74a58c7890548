//! Byte-range access to the underlying package file.
//!
//! One open package shares one file descriptor and therefore one seek
//! cursor. Every seek+read pair runs under a per-package mutex so
//! concurrent entity reads cannot interleave on the cursor; parking_lot
//! keeps the uncontended path cheap.

use parking_lot::Mutex;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use tracing::trace;

use npk_crypto::{TeaKey, decrypt_tea};

use crate::Result;
use crate::progress::{Progress, ProgressKind};

/// The package's file handle plus everything a raw read needs: the
/// embedding offset added to every seek, the advisory progress callback,
/// and whether the descriptor was adopted from the caller.
pub(crate) struct PackageSource {
    file: Mutex<File>,
    offset_jump: u64,
    adopted: bool,
    progress: Option<Progress>,
}

impl PackageSource {
    pub(crate) fn new(
        file: File,
        offset_jump: u64,
        adopted: bool,
        progress: Option<Progress>,
    ) -> Self {
        Self {
            file: Mutex::new(file),
            offset_jump,
            adopted,
            progress,
        }
    }

    pub(crate) fn adopted(&self) -> bool {
        self.adopted
    }

    /// Recover the descriptor, e.g. to hand an adopted file back.
    pub(crate) fn into_file(self) -> File {
        self.file.into_inner()
    }

    /// Total package size in bytes, measured from the embedding offset.
    pub(crate) fn total_size(&self) -> Result<u64> {
        let mut file = self.file.lock();
        let end = file.seek(SeekFrom::End(0))?;
        Ok(end.saturating_sub(self.offset_jump))
    }

    /// Seek to `offset` (package-relative) and fill `buf`, as one guarded
    /// seek+read pair.
    pub(crate) fn read_at(
        &self,
        offset: u64,
        buf: &mut [u8],
        kind: ProgressKind,
        label: &str,
    ) -> Result<()> {
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(self.offset_jump + offset))?;
        trace!(
            "read {} bytes at package offset {} ({:?})",
            buf.len(),
            offset,
            kind
        );
        self.read_observed(&mut *file, buf, kind, label)
    }

    /// Like [`read_at`](Self::read_at), then TEA-decrypt what was read.
    pub(crate) fn read_at_decrypt(
        &self,
        offset: u64,
        buf: &mut [u8],
        key: &TeaKey,
        kind: ProgressKind,
        label: &str,
    ) -> Result<()> {
        self.read_at(offset, buf, kind, label)?;
        decrypt_tea(buf, key);
        Ok(())
    }

    fn read_observed(
        &self,
        file: &mut File,
        buf: &mut [u8],
        kind: ProgressKind,
        label: &str,
    ) -> Result<()> {
        let total = buf.len() as u64;
        match &self.progress {
            Some(progress) if progress.chunk_size() > 0 => {
                let chunk = progress.chunk_size();
                let mut done = 0usize;
                while done < buf.len() {
                    let end = (done + chunk).min(buf.len());
                    file.read_exact(&mut buf[done..end])?;
                    done = end;
                    progress.report(kind, label, done as u64, total);
                }
                Ok(())
            }
            Some(progress) => {
                file.read_exact(buf)?;
                progress.report(kind, label, total, total);
                Ok(())
            }
            None => {
                file.read_exact(buf)?;
                Ok(())
            }
        }
    }
}
