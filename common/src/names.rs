// SPDX-License-Identifier: Apache-2.0
// Copyright © 2026, Exodus team.

//! New-chain account names.
//!
//! The target storage layer addresses accounts by a base-32 name packed into
//! a u64 (up to 12 characters from `.12345a-z`, plus a 4-bit 13th). Legacy
//! account names rarely fit that alphabet, so migrated accounts get a minted
//! name derived from a SHA-256 of the legacy name: stable across reruns with
//! no allocation table to persist.

use std::fmt;
use std::str::FromStr;

use anyhow::{bail, Error, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Characters legal in a packed name, in symbol-value order
const NAME_CHARS: &[u8; 32] = b".12345abcdefghijklmnopqrstuvwxyz";

/// Mint alphabet: the name charset without '.', so minted names never
/// contain dots and never collide with sub-name scopes
const MINT_CHARS: &[u8; 31] = b"12345abcdefghijklmnopqrstuvwxyz";

/// Number of characters in a minted name
const MINT_LEN: usize = 12;

/// A new-chain account name, packed into a u64
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct NewName(pub u64);

fn char_to_symbol(c: u8) -> Option<u64> {
    match c {
        b'.' => Some(0),
        b'1'..=b'5' => Some((c - b'1' + 1) as u64),
        b'a'..=b'z' => Some((c - b'a' + 6) as u64),
        _ => None,
    }
}

impl NewName {
    pub fn as_u64(&self) -> u64 {
        self.0
    }

    /// Deterministically mint a name for a legacy account. The same legacy
    /// name always maps to the same new name, so reruns reproduce identical
    /// output without persisting an allocation table.
    pub fn mint(legacy_name: &str) -> Self {
        let digest = Sha256::digest(legacy_name.as_bytes());
        let mut minted = String::with_capacity(MINT_LEN);
        for byte in digest.iter().take(MINT_LEN) {
            minted.push(MINT_CHARS[(*byte as usize) % MINT_CHARS.len()] as char);
        }
        // The mint alphabet is a strict subset of the name alphabet
        minted.parse().unwrap_or_default()
    }
}

impl FromStr for NewName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let bytes = s.as_bytes();
        if bytes.len() > 13 {
            bail!("name '{s}' is longer than 13 characters");
        }
        let mut value: u64 = 0;
        for (i, &c) in bytes.iter().enumerate() {
            let Some(sym) = char_to_symbol(c) else {
                bail!("name '{s}' contains illegal character '{}'", c as char);
            };
            if i < 12 {
                value |= (sym & 0x1f) << (64 - 5 * (i + 1));
            } else {
                if sym & 0x0f != sym {
                    bail!("13th character of '{s}' must be one of '.1-5a-j'");
                }
                value |= sym & 0x0f;
            }
        }
        Ok(NewName(value))
    }
}

impl fmt::Display for NewName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut chars = [b'.'; 13];
        let mut value = self.0;
        for i in (0..13).rev() {
            if i == 12 {
                chars[i] = NAME_CHARS[(value & 0x0f) as usize];
                value >>= 4;
            } else {
                chars[i] = NAME_CHARS[(value & 0x1f) as usize];
                value >>= 5;
            }
        }
        let trimmed = chars.iter().rposition(|&c| c != b'.').map_or(0, |p| p + 1);
        for &c in &chars[..trimmed] {
            write!(f, "{}", c as char)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn parse_display_round_trip() {
        for name in ["alice", "witness.one", "a1b2c3", "zzzzzzzzzzzz"] {
            let parsed: NewName = name.parse().unwrap();
            assert_eq!(parsed.to_string(), name);
        }
    }

    #[test]
    fn illegal_characters_rejected() {
        assert!("Alice".parse::<NewName>().is_err());
        assert!("under_score".parse::<NewName>().is_err());
        assert!("0zero".parse::<NewName>().is_err());
        assert!("waytoolongforaname".parse::<NewName>().is_err());
    }

    #[test]
    fn minting_is_stable() {
        let a = NewName::mint("legacy-account-9000");
        let b = NewName::mint("legacy-account-9000");
        assert_eq!(a, b);
        assert_ne!(a, NewName::mint("legacy-account-9001"));
    }

    #[test]
    fn minted_names_round_trip_and_avoid_dots() {
        for i in 0..200 {
            let minted = NewName::mint(&format!("user{i}"));
            let rendered = minted.to_string();
            assert_eq!(rendered.len(), 12);
            assert!(!rendered.contains('.'));
            assert_eq!(rendered.parse::<NewName>().unwrap(), minted);
        }
    }

    #[test]
    fn minted_names_are_collision_free_over_fixture_set() {
        let mut seen = HashSet::new();
        for i in 0..10_000 {
            assert!(seen.insert(NewName::mint(&format!("account-{i}"))));
        }
    }
}
