// SPDX-License-Identifier: Apache-2.0
// Copyright © 2026, Exodus team.

//! Sectioned, content-hashed output container.
//!
//! All output files (the genesis image and every event log) share one
//! container: a header declaring the section count, then sections of
//! ABI-encoded rows. Every byte written, header included, feeds a running
//! SHA-256. Writes go to a temp path; `finalize` verifies the declared
//! section counts, renames onto the target and reports the digest, so a
//! partial file never lands where a consumer could pick it up.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use tracing::info;

use exodus_common::{InvariantError, NewName};

use crate::abi::{AbiDef, AbiError, AbiValue};

/// Container magic, first eight bytes of every output file
pub const OUTPUT_MAGIC: [u8; 8] = *b"EXOGEN/1";

/// Container format version
pub const OUTPUT_VERSION: u32 = 1;

/// Write adapter feeding every written byte into a running SHA-256
struct HashingWriter<W: Write> {
    inner: W,
    hasher: Sha256,
}

impl<W: Write> HashingWriter<W> {
    fn new(inner: W) -> Self {
        Self {
            inner,
            hasher: Sha256::new(),
        }
    }

    /// Stop hashing, returning the inner writer and the hex digest
    fn finish(self) -> (W, String) {
        (self.inner, hex::encode(self.hasher.finalize()))
    }
}

impl<W: Write> Write for HashingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = self.inner.write(buf)?;
        self.hasher.update(&buf[..written]);
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

struct OpenSection {
    table: String,
    schema: String,
    declared: u32,
    inserted: u32,
}

/// Writer for one output file: declared number of sections, each holding
/// ABI-encoded rows for one (scope, table, schema) triple.
pub struct SectionWriter {
    out: HashingWriter<BufWriter<File>>,
    temp_path: PathBuf,
    target_path: PathBuf,
    abi: AbiDef,
    declared_sections: u32,
    written_sections: u32,
    open: Option<OpenSection>,
}

impl SectionWriter {
    /// Create the temp file and write the container header. The section
    /// count is declared up front and verified at finalize.
    pub fn create(path: &Path, abi: AbiDef, sections: u32) -> Result<Self> {
        let temp_path = temp_path_for(path);
        let file = File::create(&temp_path)
            .with_context(|| format!("failed to create {}", temp_path.display()))?;
        let mut out = HashingWriter::new(BufWriter::new(file));

        out.write_all(&OUTPUT_MAGIC)?;
        out.write_all(&OUTPUT_VERSION.to_le_bytes())?;
        out.write_all(&sections.to_le_bytes())?;

        Ok(Self {
            out,
            temp_path,
            target_path: path.to_path_buf(),
            abi,
            declared_sections: sections,
            written_sections: 0,
            open: None,
        })
    }

    /// Open a section. The schema must be registered; the row count is
    /// declared now and enforced on every insert.
    pub fn start_section(
        &mut self,
        scope: NewName,
        table: &str,
        schema: &str,
        row_count: u32,
    ) -> Result<()> {
        if let Some(open) = &self.open {
            return Err(InvariantError::SectionStillOpen {
                table: open.table.clone(),
            }
            .into());
        }
        if !self.abi.contains(schema) {
            return Err(AbiError::UnknownSchema {
                schema: schema.to_string(),
            }
            .into());
        }

        let table_name: NewName = table
            .parse()
            .with_context(|| format!("table name '{table}'"))?;
        let schema_name: NewName = schema
            .parse()
            .with_context(|| format!("schema name '{schema}'"))?;

        self.out.write_all(&scope.as_u64().to_le_bytes())?;
        self.out.write_all(&table_name.as_u64().to_le_bytes())?;
        self.out.write_all(&schema_name.as_u64().to_le_bytes())?;
        self.out.write_all(&row_count.to_le_bytes())?;

        self.open = Some(OpenSection {
            table: table.to_string(),
            schema: schema.to_string(),
            declared: row_count,
            inserted: 0,
        });
        Ok(())
    }

    /// Encode and write one row into the open section
    pub fn insert(&mut self, row: &AbiValue) -> Result<()> {
        let open = self.open.as_mut().ok_or(InvariantError::NoOpenSection)?;
        if open.inserted == open.declared {
            return Err(InvariantError::RowCountMismatch {
                table: open.table.clone(),
                declared: open.declared,
                inserted: open.inserted + 1,
            }
            .into());
        }
        let bytes = self.abi.encode(&open.schema, row)?;
        self.out.write_all(&bytes)?;
        open.inserted += 1;
        Ok(())
    }

    /// Close the open section, verifying the declared row count
    pub fn finish_section(&mut self) -> Result<()> {
        let open = self.open.take().ok_or(InvariantError::NoOpenSection)?;
        if open.inserted != open.declared {
            return Err(InvariantError::RowCountMismatch {
                table: open.table,
                declared: open.declared,
                inserted: open.inserted,
            }
            .into());
        }
        self.written_sections += 1;
        Ok(())
    }

    /// Verify the section counts, flush, rename the temp file onto the
    /// target path and return the hex digest of everything written.
    pub fn finalize(mut self) -> Result<String> {
        if let Some(open) = &self.open {
            return Err(InvariantError::SectionStillOpen {
                table: open.table.clone(),
            }
            .into());
        }
        if self.written_sections != self.declared_sections {
            return Err(InvariantError::SectionCountMismatch {
                declared: self.declared_sections,
                written: self.written_sections,
            }
            .into());
        }

        self.out.flush()?;
        let (buffered, digest) = self.out.finish();
        buffered
            .into_inner()
            .map_err(|e| e.into_error())
            .context("flushing output file")?;

        fs::rename(&self.temp_path, &self.target_path).with_context(|| {
            format!(
                "renaming {} to {}",
                self.temp_path.display(),
                self.target_path.display()
            )
        })?;

        info!(
            path = %self.target_path.display(),
            sections = self.written_sections,
            %digest,
            "output file finalized"
        );
        Ok(digest)
    }
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut os = path.as_os_str().to_owned();
    os.push(".part");
    PathBuf::from(os)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::AbiType;

    fn abi() -> AbiDef {
        AbiDef::new().with_struct("entry", vec![("value", AbiType::Uint32)])
    }

    fn row(value: u32) -> AbiValue {
        AbiValue::object(vec![("value", AbiValue::U32(value))])
    }

    fn scope() -> NewName {
        "gls".parse().unwrap()
    }

    #[test]
    fn writes_header_sections_and_digest() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out.bin");

        let mut writer = SectionWriter::create(&target, abi(), 1).unwrap();
        writer.start_section(scope(), "entry", "entry", 2).unwrap();
        writer.insert(&row(7)).unwrap();
        writer.insert(&row(8)).unwrap();
        writer.finish_section().unwrap();
        let digest = writer.finalize().unwrap();

        let bytes = fs::read(&target).unwrap();
        assert_eq!(&bytes[..8], &OUTPUT_MAGIC);
        assert_eq!(u32::from_le_bytes(bytes[8..12].try_into().unwrap()), OUTPUT_VERSION);
        assert_eq!(u32::from_le_bytes(bytes[12..16].try_into().unwrap()), 1);
        // Digest covers the whole file, header included
        assert_eq!(digest, hex::encode(Sha256::digest(&bytes)));
    }

    #[test]
    fn under_count_fails_at_finish() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = SectionWriter::create(&dir.path().join("out.bin"), abi(), 1).unwrap();
        writer.start_section(scope(), "entry", "entry", 3).unwrap();
        writer.insert(&row(1)).unwrap();
        writer.insert(&row(2)).unwrap();
        let err = writer.finish_section().unwrap_err();
        assert!(err.to_string().contains("declared 3"));
    }

    #[test]
    fn exact_count_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = SectionWriter::create(&dir.path().join("out.bin"), abi(), 1).unwrap();
        writer.start_section(scope(), "entry", "entry", 3).unwrap();
        for i in 0..3 {
            writer.insert(&row(i)).unwrap();
        }
        writer.finish_section().unwrap();
        assert!(writer.finalize().is_ok());
    }

    #[test]
    fn over_count_fails_at_insert() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = SectionWriter::create(&dir.path().join("out.bin"), abi(), 1).unwrap();
        writer.start_section(scope(), "entry", "entry", 3).unwrap();
        for i in 0..3 {
            writer.insert(&row(i)).unwrap();
        }
        assert!(writer.insert(&row(99)).is_err());
    }

    #[test]
    fn open_section_blocks_finalize() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out.bin");
        let mut writer = SectionWriter::create(&target, abi(), 1).unwrap();
        writer.start_section(scope(), "entry", "entry", 0).unwrap();
        assert!(writer.finalize().is_err());
        // Nothing landed on the target path
        assert!(!target.exists());
    }

    #[test]
    fn section_count_is_verified() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out.bin");
        let mut writer = SectionWriter::create(&target, abi(), 2).unwrap();
        writer.start_section(scope(), "entry", "entry", 0).unwrap();
        writer.finish_section().unwrap();
        assert!(writer.finalize().is_err());
        assert!(!target.exists());
    }

    #[test]
    fn unknown_schema_blocks_section_start() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = SectionWriter::create(&dir.path().join("out.bin"), abi(), 1).unwrap();
        assert!(writer
            .start_section(scope(), "mystery", "mystery", 0)
            .is_err());
    }

    #[test]
    fn insert_without_section_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = SectionWriter::create(&dir.path().join("out.bin"), abi(), 1).unwrap();
        assert!(writer.insert(&row(1)).is_err());
    }
}
