//! Error taxonomy shared across the migration pipeline.
//!
//! Format errors describe a snapshot we cannot read; invariant errors
//! describe a snapshot (or our own model of it) that fails conservation or
//! structural checks. Both are fatal: the pipeline aborts before any output
//! file is finalized. Soft skips are not errors and are surfaced as counters
//! in the run summary instead.

use thiserror::Error;

/// Errors reading the legacy snapshot or its name maps
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("bad magic in {path}: expected {expected:?}, found {found:?}")]
    BadMagic {
        path: String,
        expected: String,
        found: String,
    },

    #[error("unsupported snapshot version {found} in {path} (expected {expected})")]
    BadVersion {
        path: String,
        expected: u32,
        found: u32,
    },

    #[error("unknown record type tag {tag} at offset {offset}")]
    UnknownTypeTag { tag: u32, offset: u64 },

    #[error("truncated {what} at offset {offset}: needed {needed} bytes, {available} available")]
    Truncated {
        what: &'static str,
        offset: u64,
        needed: usize,
        available: usize,
    },

    #[error("invalid UTF-8 in string at offset {offset}")]
    InvalidString { offset: u64 },

    #[error("bad name-map kind tag {found:#04x} (expected {expected:#04x})")]
    BadMapTag { expected: u8, found: u8 },

    #[error("bad presence byte {found:#04x} at offset {offset}")]
    BadPresenceByte { found: u8, offset: u64 },

    #[error("{map} map index {index} out of range ({len} entries)")]
    IndexOutOfRange {
        map: &'static str,
        index: u32,
        len: usize,
    },
}

/// Fatal violations of the migration's economic and structural invariants
#[derive(Debug, Error)]
pub enum InvariantError {
    #[error(
        "conservation mismatch for {currency} ({category}): declared {declared}, \
         accumulated {accumulated}, delta {delta}"
    )]
    Conservation {
        currency: String,
        category: String,
        declared: i64,
        accumulated: i64,
        delta: i64,
    },

    #[error(
        "vesting conservation mismatch: declared {declared}, accumulated {accumulated}, \
         delta {delta}"
    )]
    VestingConservation {
        declared: i64,
        accumulated: i64,
        delta: i64,
    },

    #[error("unsupported currency {symbol} on {record} record for account {account}")]
    UnknownCurrency {
        symbol: String,
        record: &'static str,
        account: String,
    },

    #[error("proxy chain for account {account} exceeds maximum depth {max}")]
    ProxyDepthExceeded { account: String, max: u32 },

    #[error("account {account} holds {count} witness votes, exceeding the maximum of {max}")]
    TooManyVotes {
        account: String,
        count: usize,
        max: usize,
    },

    #[error(
        "vote weight cross-check failed for witness {witness}: recorded {recorded}, \
         recomputed {recomputed}"
    )]
    VoteWeightMismatch {
        witness: String,
        recorded: u64,
        recomputed: u64,
    },

    #[error("withdraw route for account {account} points back at itself")]
    SelfWithdrawRoute { account: String },

    #[error("section {table} declared {declared} rows but {inserted} were inserted")]
    RowCountMismatch {
        table: String,
        declared: u32,
        inserted: u32,
    },

    #[error("section {table} still open at finalize")]
    SectionStillOpen { table: String },

    #[error("output declared {declared} sections but {written} were written")]
    SectionCountMismatch { declared: u32, written: u32 },

    #[error("no open section for insert")]
    NoOpenSection,

    #[error("global properties record missing from snapshot")]
    MissingGlobalProperties,
}
