//! Name-map loading.
//!
//! The map file keeps the snapshot compact: records reference accounts and
//! permalinks by dense integer index into these arrays. Loaded once before
//! record decoding begins and shared read-only afterwards.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use exodus_codec::{Cursor, MAP_TAG_ACCOUNTS, MAP_TAG_PERMALINKS};
use exodus_common::{AccIdx, FormatError, PermIdx};

/// Index-addressed string arrays for accounts and permalinks
#[derive(Debug, Default)]
pub struct NameMaps {
    accounts: Vec<String>,
    permalinks: Vec<String>,
}

impl NameMaps {
    /// Load both maps, in fixed order: accounts then permalinks
    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read(path)
            .with_context(|| format!("failed to read name map {}", path.display()))?;
        let mut cur = Cursor::new(&data, 0);

        let accounts = read_map(&mut cur, MAP_TAG_ACCOUNTS).context("reading account map")?;
        let permalinks =
            read_map(&mut cur, MAP_TAG_PERMALINKS).context("reading permalink map")?;

        info!(
            accounts = accounts.len(),
            permalinks = permalinks.len(),
            "loaded name maps"
        );
        Ok(Self {
            accounts,
            permalinks,
        })
    }

    /// Resolve an account index to its legacy name
    pub fn account(&self, idx: AccIdx) -> Result<&str, FormatError> {
        self.accounts
            .get(idx as usize)
            .map(String::as_str)
            .ok_or(FormatError::IndexOutOfRange {
                map: "account",
                index: idx,
                len: self.accounts.len(),
            })
    }

    /// Resolve a permalink index to its string
    pub fn permalink(&self, idx: PermIdx) -> Result<&str, FormatError> {
        self.permalinks
            .get(idx as usize)
            .map(String::as_str)
            .ok_or(FormatError::IndexOutOfRange {
                map: "permalink",
                index: idx,
                len: self.permalinks.len(),
            })
    }

    pub fn account_count(&self) -> usize {
        self.accounts.len()
    }

    pub fn permalink_count(&self) -> usize {
        self.permalinks.len()
    }

    /// Check that an account index is resolvable without borrowing the name
    pub fn check_account(&self, idx: AccIdx) -> Result<(), FormatError> {
        self.account(idx).map(|_| ())
    }

    pub fn check_permalink(&self, idx: PermIdx) -> Result<(), FormatError> {
        self.permalink(idx).map(|_| ())
    }

    #[cfg(test)]
    pub fn for_tests(accounts: Vec<String>, permalinks: Vec<String>) -> Self {
        Self {
            accounts,
            permalinks,
        }
    }
}

/// One map: kind tag, u32 count, then that many NUL-terminated strings
fn read_map(cur: &mut Cursor, expected_tag: u8) -> Result<Vec<String>> {
    let found = cur.read_u8()?;
    if found != expected_tag {
        return Err(FormatError::BadMapTag {
            expected: expected_tag,
            found,
        }
        .into());
    }
    let count = cur.read_u32()? as usize;
    let mut strings = Vec::with_capacity(count.min(65536));
    for i in 0..count {
        strings.push(read_cstr(cur).with_context(|| format!("map entry {i}"))?);
    }
    Ok(strings)
}

fn read_cstr(cur: &mut Cursor) -> Result<String, FormatError> {
    let offset = cur.pos();
    let mut bytes = Vec::new();
    loop {
        let b = cur.read_u8()?;
        if b == 0 {
            break;
        }
        bytes.push(b);
    }
    String::from_utf8(bytes).map_err(|_| FormatError::InvalidString { offset })
}
