// SPDX-License-Identifier: Apache-2.0
// Copyright © 2026, Exodus team.

//! Streaming reader for the legacy snapshot.
//!
//! The snapshot is a header followed by typed sections, each declaring a
//! record type tag and a record count. The reader decodes exactly that many
//! records before expecting the next header and fails closed on truncation
//! or unknown tags. Reading is one pass only; records remember their start
//! offset so a separate [`PayloadReader`] handle can re-seek and decode the
//! payloads skipped on the way through.

mod maps;
mod payload;

pub use maps::NameMaps;
pub use payload::PayloadReader;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info};

use exodus_codec::{Cursor, Record, SNAPSHOT_MAGIC, SNAPSHOT_VERSION};
use exodus_common::{BlockNum, FormatError};

/// A decoded record together with where it started in the file
#[derive(Debug)]
pub struct DecodedRecord {
    pub record: Record,
    /// Absolute offset of the record's first payload byte
    pub offset: u64,
}

/// One-pass streaming reader over a snapshot file
#[derive(Debug)]
pub struct SnapshotReader {
    path: PathBuf,
    data: Vec<u8>,
    pos: usize,
    /// Current section: (type tag, records still to decode)
    section: Option<(u32, u32)>,
    /// Records with a block number beyond this are treated as not present
    last_block: Option<BlockNum>,
    finished: bool,
    records_read: u64,
}

impl SnapshotReader {
    /// Open and validate a snapshot file. `last_block` truncates the record
    /// stream at an arbitrary block height without re-exporting the
    /// snapshot; `None` reads everything.
    pub fn open(path: &Path, last_block: Option<BlockNum>) -> Result<Self> {
        let data = fs::read(path)
            .with_context(|| format!("failed to read snapshot {}", path.display()))?;

        let mut cur = Cursor::new(&data, 0);
        let magic = cur.read_bytes(SNAPSHOT_MAGIC.len(), "snapshot magic")?;
        if magic != SNAPSHOT_MAGIC {
            return Err(FormatError::BadMagic {
                path: path.display().to_string(),
                expected: String::from_utf8_lossy(&SNAPSHOT_MAGIC).into_owned(),
                found: String::from_utf8_lossy(magic).into_owned(),
            }
            .into());
        }
        let version = cur.read_u32()?;
        if version != SNAPSHOT_VERSION {
            return Err(FormatError::BadVersion {
                path: path.display().to_string(),
                expected: SNAPSHOT_VERSION,
                found: version,
            }
            .into());
        }

        info!(
            path = %path.display(),
            size = data.len(),
            version,
            "opened snapshot"
        );

        let pos = cur.pos() as usize;
        Ok(Self {
            path: path.to_path_buf(),
            data,
            pos,
            section: None,
            last_block,
            finished: false,
            records_read: 0,
        })
    }

    /// Load the companion name-map file (`<snapshot>.map`)
    pub fn read_maps(&self) -> Result<NameMaps> {
        let mut map_path = self.path.as_os_str().to_owned();
        map_path.push(exodus_codec::MAP_FILE_SUFFIX);
        NameMaps::load(Path::new(&map_path))
    }

    /// Decode the next record, or `Ok(None)` at a clean end of stream.
    /// The sequence is finite and non-restartable.
    pub fn next_record(&mut self) -> Result<Option<DecodedRecord>> {
        if self.finished {
            return Ok(None);
        }

        loop {
            match self.section {
                Some((_, 0)) | None => {
                    if self.pos >= self.data.len() {
                        self.finished = true;
                        info!(records = self.records_read, "snapshot read complete");
                        return Ok(None);
                    }
                    let mut cur = Cursor::new(&self.data, self.pos);
                    let tag = cur.read_u32().map_err(section_header_context)?;
                    let count = cur.read_u32().map_err(section_header_context)?;
                    self.pos = cur.pos() as usize;
                    debug!(tag, count, "section header");
                    self.section = Some((tag, count));
                    // Zero-record sections are legal, loop to the next header
                }
                Some((tag, remaining)) => {
                    let offset = self.pos as u64;
                    let mut cur = Cursor::new(&self.data, self.pos);
                    let record = Record::decode(tag, &mut cur).with_context(|| {
                        format!(
                            "decoding record with tag {tag} at offset {offset} \
                             ({remaining} remaining in section)"
                        )
                    })?;
                    self.pos = cur.pos() as usize;
                    self.section = Some((tag, remaining - 1));

                    if let (Some(cutoff), Some(block)) = (self.last_block, record.block_num()) {
                        if block > cutoff {
                            // Everything past the cutoff is "not yet present"
                            self.finished = true;
                            info!(
                                records = self.records_read,
                                cutoff, block, "stopped at block cutoff"
                            );
                            return Ok(None);
                        }
                    }

                    self.records_read += 1;
                    return Ok(Some(DecodedRecord { record, offset }));
                }
            }
        }
    }

    /// Open an independent re-seek handle over the same file, for decoding
    /// deferred payloads after the streaming pass.
    pub fn payload_reader(&self) -> Result<PayloadReader> {
        PayloadReader::open(&self.path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn section_header_context(err: FormatError) -> anyhow::Error {
    anyhow::Error::new(err).context("reading section header")
}

#[cfg(test)]
mod tests {
    use super::*;
    use exodus_common::{Asset, Symbol};
    use exodus_test_utils::{AccountFixture, SnapshotBuilder};

    fn symbols() -> (Symbol, Symbol, Symbol) {
        (
            Symbol::new(3, "GLS"),
            Symbol::new(3, "GBG"),
            Symbol::new(6, "GESTS"),
        )
    }

    fn write_builder(builder: &SnapshotBuilder) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = builder.write_to(dir.path(), "snapshot.bin").unwrap();
        (dir, path)
    }

    #[test]
    fn reads_sections_in_order() {
        let (primary, secondary, vesting) = symbols();
        let mut builder = SnapshotBuilder::new();
        let alice = builder.account_name("alice");
        let bob = builder.account_name("bob");
        builder.global_properties(
            100,
            Asset::new(3000, primary),
            Asset::zero(secondary),
            Asset::zero(primary),
            Asset::zero(vesting),
        );
        let mut a = AccountFixture::new(alice, primary, secondary, vesting);
        a.balance = Asset::new(1000, primary);
        let mut b = AccountFixture::new(bob, primary, secondary, vesting);
        b.balance = Asset::new(2000, primary);
        builder.account(&a).account(&b);

        let (_dir, path) = write_builder(&builder);
        let mut reader = SnapshotReader::open(&path, None).unwrap();
        let maps = reader.read_maps().unwrap();
        assert_eq!(maps.account(alice).unwrap(), "alice");
        assert_eq!(maps.account(bob).unwrap(), "bob");

        let first = reader.next_record().unwrap().unwrap();
        assert!(matches!(first.record, Record::GlobalProperties(_)));
        let second = reader.next_record().unwrap().unwrap();
        assert!(matches!(second.record, Record::Account(_)));
        let third = reader.next_record().unwrap().unwrap();
        assert!(matches!(third.record, Record::Account(_)));
        assert!(reader.next_record().unwrap().is_none());
        // Non-restartable: stays at end
        assert!(reader.next_record().unwrap().is_none());
    }

    #[test]
    fn bad_magic_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bogus.bin");
        fs::write(&path, b"NOTASNAPxxxx").unwrap();
        let err = SnapshotReader::open(&path, None).unwrap_err();
        assert!(err.to_string().contains("bad magic"), "{err}");
    }

    #[test]
    fn wrong_version_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bogus.bin");
        let mut data = Vec::new();
        data.extend_from_slice(&SNAPSHOT_MAGIC);
        data.extend_from_slice(&99u32.to_le_bytes());
        fs::write(&path, data).unwrap();
        let err = SnapshotReader::open(&path, None).unwrap_err();
        assert!(err.to_string().contains("version"), "{err}");
    }

    #[test]
    fn unknown_tag_is_fatal() {
        let mut builder = SnapshotBuilder::new();
        builder.raw_record(4242, vec![0u8; 16]);
        let (_dir, path) = write_builder(&builder);
        let mut reader = SnapshotReader::open(&path, None).unwrap();
        let err = reader.next_record().unwrap_err();
        assert!(err.to_string().contains("4242"), "{err}");
    }

    #[test]
    fn truncated_section_is_fatal() {
        let (primary, secondary, vesting) = symbols();
        let mut builder = SnapshotBuilder::new();
        let alice = builder.account_name("alice");
        builder.account(&AccountFixture::new(alice, primary, secondary, vesting));

        let mut data = builder.build_snapshot();
        data.truncate(data.len() - 10);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("truncated.bin");
        fs::write(&path, data).unwrap();

        let mut reader = SnapshotReader::open(&path, None).unwrap();
        assert!(reader.next_record().is_err());
    }

    #[test]
    fn block_cutoff_terminates_early() {
        let (primary, ..) = symbols();
        let mut builder = SnapshotBuilder::new();
        let alice = builder.account_name("alice");
        let bob = builder.account_name("bob");
        builder
            .transfer_event(10, alice, bob, Asset::new(5, primary), "a")
            .transfer_event(20, alice, bob, Asset::new(5, primary), "b")
            .transfer_event(30, alice, bob, Asset::new(5, primary), "c");

        let (_dir, path) = write_builder(&builder);
        let mut reader = SnapshotReader::open(&path, Some(20)).unwrap();
        assert!(reader.next_record().unwrap().is_some());
        assert!(reader.next_record().unwrap().is_some());
        // Block 30 exceeds the cutoff: treated as not present
        assert!(reader.next_record().unwrap().is_none());
    }

    #[test]
    fn deferred_payloads_reread_through_fresh_handle() {
        let mut builder = SnapshotBuilder::new();
        let alice = builder.account_name("alice");
        let link = builder.permalink("first-post");
        builder.comment(alice, link, None, "hello snapshot world");

        let (_dir, path) = write_builder(&builder);
        let mut reader = SnapshotReader::open(&path, None).unwrap();
        let decoded = reader.next_record().unwrap().unwrap();
        let Record::Comment(comment) = decoded.record else {
            panic!("expected comment");
        };

        let mut payloads = reader.payload_reader().unwrap();
        assert_eq!(
            payloads.read_string(&comment.body).unwrap(),
            "hello snapshot world"
        );
    }
}
