//! Random-access re-reads of deferred payloads.
//!
//! The streaming pass records `(offset, len)` for large free-text fields it
//! skips. This handle owns its own file cursor, so re-seeking never disturbs
//! the (already finished) streaming read, and the two phases stay decoupled.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use anyhow::{Context, Result};

use exodus_codec::DeferredPayload;

/// Independent seek-and-decode handle over the snapshot file
pub struct PayloadReader {
    file: File,
}

impl PayloadReader {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("failed to reopen snapshot {}", path.display()))?;
        Ok(Self { file })
    }

    /// Read the raw bytes of a deferred payload
    pub fn read_bytes(&mut self, payload: &DeferredPayload) -> Result<Vec<u8>> {
        self.file
            .seek(SeekFrom::Start(payload.offset))
            .with_context(|| format!("seeking to payload at offset {}", payload.offset))?;
        let mut buf = vec![0u8; payload.len as usize];
        self.file
            .read_exact(&mut buf)
            .with_context(|| format!("reading {} payload bytes", payload.len))?;
        Ok(buf)
    }

    /// Read a deferred payload as UTF-8 text
    pub fn read_string(&mut self, payload: &DeferredPayload) -> Result<String> {
        let bytes = self.read_bytes(payload)?;
        String::from_utf8(bytes)
            .with_context(|| format!("payload at offset {} is not UTF-8", payload.offset))
    }
}
