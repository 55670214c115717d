//! Core type definitions for the Exodus migration engine

use std::fmt;

use serde::{Deserialize, Serialize};

/// Dense index into the account name map
pub type AccIdx = u32;

/// Dense index into the permalink name map
pub type PermIdx = u32;

/// Legacy block number
pub type BlockNum = u32;

/// Seconds since the Unix epoch, as the legacy chain stores them
pub type Timestamp = u32;

/// Basis points (10000 = 100%)
pub type BasisPoints = u16;

/// One basis-point whole (100%)
pub const FULL_PERCENT: BasisPoints = 10000;

/// Maximum number of witnesses a single account may vote for
pub const MAX_WITNESS_VOTES: usize = 30;

/// Maximum proxy chain depth (level 0 = witness, levels 1..=4 = voters)
pub const MAX_PROXY_DEPTH: u32 = 4;

/// An asset symbol, packed EOSIO-style: decimal precision in the low byte,
/// up to seven ASCII characters of currency code above it.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Symbol(pub u64);

impl Symbol {
    /// Build from a precision and an uppercase code of at most 7 characters
    pub fn new(decimals: u8, code: &str) -> Self {
        let mut value = decimals as u64;
        for (i, b) in code.bytes().take(7).enumerate() {
            value |= (b as u64) << (8 * (i + 1));
        }
        Symbol(value)
    }

    /// Decimal precision
    pub fn decimals(&self) -> u8 {
        (self.0 & 0xff) as u8
    }

    /// Currency code as a string
    pub fn code(&self) -> String {
        let mut code = String::new();
        let mut v = self.0 >> 8;
        while v != 0 {
            code.push((v & 0xff) as u8 as char);
            v >>= 8;
        }
        code
    }

    /// The multiplier that converts whole units to smallest units
    pub fn unit(&self) -> i64 {
        10i64.pow(self.decimals() as u32)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.decimals(), self.code())
    }
}

impl Serialize for Symbol {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Symbol {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s: String = Deserialize::deserialize(deserializer)?;
        let (decimals, code) = s
            .split_once(',')
            .ok_or_else(|| serde::de::Error::custom("symbol must be '<decimals>,<CODE>'"))?;
        let decimals: u8 = decimals.parse().map_err(serde::de::Error::custom)?;
        Ok(Symbol::new(decimals, code))
    }
}

/// A quantity of some currency, in smallest units
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Hash,
)]
pub struct Asset {
    /// Amount in smallest units (may be negative mid-calculation)
    pub amount: i64,

    /// Currency symbol
    pub symbol: Symbol,
}

impl Asset {
    pub fn new(amount: i64, symbol: Symbol) -> Self {
        Self { amount, symbol }
    }

    /// Zero of the given currency
    pub fn zero(symbol: Symbol) -> Self {
        Self { amount: 0, symbol }
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let unit = self.symbol.unit();
        let whole = self.amount / unit;
        let frac = (self.amount % unit).unsigned_abs();
        write!(
            f,
            "{}.{:0width$} {}",
            whole,
            frac,
            self.symbol.code(),
            width = self.symbol.decimals() as usize
        )
    }
}

/// The two legacy currencies being migrated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Currency {
    /// The legacy chain's core token
    Primary,
    /// The legacy chain's pegged debt token
    Secondary,
}

impl Currency {
    pub const COUNT: usize = 2;

    pub fn index(&self) -> usize {
        match self {
            Currency::Primary => 0,
            Currency::Secondary => 1,
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Currency::Primary => write!(f, "primary"),
            Currency::Secondary => write!(f, "secondary"),
        }
    }
}

/// The symbols the migration recognises, from configuration
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CurrencySet {
    pub primary: Symbol,
    pub secondary: Symbol,
    pub vesting: Symbol,
}

impl CurrencySet {
    /// Which migrated currency a symbol belongs to, if any
    pub fn classify(&self, symbol: Symbol) -> Option<Currency> {
        if symbol == self.primary {
            Some(Currency::Primary)
        } else if symbol == self.secondary {
            Some(Currency::Secondary)
        } else {
            None
        }
    }

    pub fn is_vesting(&self, symbol: Symbol) -> bool {
        symbol == self.vesting
    }
}

/// Origin category of a balance bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BalanceCategory {
    /// Freely spendable balance
    Open,
    /// Savings balance
    Savings,
    /// Locked in an open market order
    OrderEscrow,
    /// Locked in an in-flight currency conversion
    Conversion,
    /// Held by an escrow agreement
    Escrow,
    /// Pending escrow agent fee
    EscrowFee,
    /// Savings withdrawal in its cool-down window
    SavingsWithdrawal,
}

impl BalanceCategory {
    pub const COUNT: usize = 7;

    pub const ALL: [BalanceCategory; Self::COUNT] = [
        BalanceCategory::Open,
        BalanceCategory::Savings,
        BalanceCategory::OrderEscrow,
        BalanceCategory::Conversion,
        BalanceCategory::Escrow,
        BalanceCategory::EscrowFee,
        BalanceCategory::SavingsWithdrawal,
    ];

    pub fn index(&self) -> usize {
        match self {
            BalanceCategory::Open => 0,
            BalanceCategory::Savings => 1,
            BalanceCategory::OrderEscrow => 2,
            BalanceCategory::Conversion => 3,
            BalanceCategory::Escrow => 4,
            BalanceCategory::EscrowFee => 5,
            BalanceCategory::SavingsWithdrawal => 6,
        }
    }
}

impl fmt::Display for BalanceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BalanceCategory::Open => "open",
            BalanceCategory::Savings => "savings",
            BalanceCategory::OrderEscrow => "order-escrow",
            BalanceCategory::Conversion => "conversion",
            BalanceCategory::Escrow => "escrow",
            BalanceCategory::EscrowFee => "escrow-fee",
            BalanceCategory::SavingsWithdrawal => "savings-withdrawal",
        };
        write!(f, "{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbol_round_trip() {
        let sym = Symbol::new(3, "GLS");
        assert_eq!(sym.decimals(), 3);
        assert_eq!(sym.code(), "GLS");
        assert_eq!(sym.to_string(), "3,GLS");
        assert_eq!(sym.unit(), 1000);
    }

    #[test]
    fn asset_display() {
        let sym = Symbol::new(3, "GLS");
        assert_eq!(Asset::new(1000, sym).to_string(), "1.000 GLS");
        assert_eq!(Asset::new(1, sym).to_string(), "0.001 GLS");
        assert_eq!(Asset::new(123456, sym).to_string(), "123.456 GLS");
    }

    #[test]
    fn category_indices_are_dense() {
        for (i, cat) in BalanceCategory::ALL.iter().enumerate() {
            assert_eq!(cat.index(), i);
        }
    }
}
