//! Snapshot container constants shared by the reader and test fixtures.

/// Fixed magic bytes opening a snapshot file
pub const SNAPSHOT_MAGIC: [u8; 8] = *b"EXOSNAP1";

/// Snapshot format version this codec understands
pub const SNAPSHOT_VERSION: u32 = 2;

/// Name-map kind tag: account names
pub const MAP_TAG_ACCOUNTS: u8 = 0x01;

/// Name-map kind tag: permalink strings
pub const MAP_TAG_PERMALINKS: u8 = 0x02;

/// Suffix appended to the snapshot path to find its name-map file
pub const MAP_FILE_SUFFIX: &str = ".map";
