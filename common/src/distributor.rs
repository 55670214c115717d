// SPDX-License-Identifier: Apache-2.0
// Copyright © 2026, Exodus team.

//! Remainder-carrying currency converter ("supply distributor").
//!
//! Converting N balances independently with per-balance rounding loses or
//! gains value systematically. This converter keeps the truncated fraction of
//! every conversion and rolls it into the next one, so the sum of the
//! converted outputs differs from the directly converted total by at most one
//! smallest unit. One instance per distribution pass: separate instances for
//! balance conversion and delegation conversion keep their rounding streams
//! independent.

use anyhow::{bail, Result};

use crate::types::Asset;

/// Extra low bits of sub-unit precision carried between calls
const REST_BITS: u32 = 18;

const REST_MASK: u128 = (1 << REST_BITS) - 1;

/// Integer price converter with carried remainder
#[derive(Debug, Clone)]
pub struct SupplyDistributor {
    /// Price denominator, in base smallest units
    base: u64,

    /// Price numerator, in quote smallest units
    quote: u64,

    /// Carried sub-unit remainder, always < 1 whole unit
    rest: u128,
}

impl SupplyDistributor {
    /// Construct from a price pair: `amount` of base converts to
    /// `amount * quote / base` of quote.
    pub fn new(base: Asset, quote: Asset) -> Result<Self> {
        if base.amount <= 0 {
            bail!("price base must be positive, got {base}");
        }
        if quote.amount < 0 {
            bail!("price quote must be non-negative, got {quote}");
        }
        let mut distributor = Self {
            base: base.amount as u64,
            quote: quote.amount as u64,
            rest: 0,
        };
        distributor.reset();
        Ok(distributor)
    }

    /// Identity converter (1:1), still carrying remainders so it composes
    /// with scaled prices in tests.
    pub fn identity() -> Self {
        let mut distributor = Self {
            base: 1,
            quote: 1,
            rest: 0,
        };
        distributor.reset();
        distributor
    }

    /// Convert one amount, carrying the truncated remainder into the next
    /// call. The multiply runs in u128 so a 64-bit amount times a 64-bit
    /// scaled price cannot overflow.
    pub fn convert(&mut self, amount: u64) -> u64 {
        let scaled = ((amount as u128) * (self.quote as u128)) << REST_BITS;
        let value = scaled / (self.base as u128) + self.rest;
        self.rest = value & REST_MASK;
        (value >> REST_BITS) as u64
    }

    /// Re-arm the carried remainder to the "round up once" sentinel, used
    /// when starting a fresh distribution pass.
    pub fn reset(&mut self) {
        self.rest = REST_MASK;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Symbol;

    fn sym(code: &str) -> Symbol {
        Symbol::new(3, code)
    }

    fn distributor(base: i64, quote: i64) -> SupplyDistributor {
        SupplyDistributor::new(Asset::new(base, sym("GLS")), Asset::new(quote, sym("NEW")))
            .unwrap()
    }

    #[test]
    fn identity_preserves_amounts() {
        let mut d = SupplyDistributor::identity();
        assert_eq!(d.convert(0), 0);
        assert_eq!(d.convert(1), 1);
        assert_eq!(d.convert(12345), 12345);
    }

    #[test]
    fn zero_base_rejected() {
        let result =
            SupplyDistributor::new(Asset::new(0, sym("GLS")), Asset::new(1, sym("NEW")));
        assert!(result.is_err());
    }

    #[test]
    fn split_conversion_conserves_total() {
        // 3:1 price, amounts that don't divide evenly
        let mut piecewise = distributor(3, 1);
        let mut whole = distributor(3, 1);

        let parts = [1u64, 1, 1, 2, 2, 2, 5, 7, 100, 1000];
        let total: u64 = parts.iter().sum();

        let converted_sum: u64 = parts.iter().map(|&p| piecewise.convert(p)).sum();
        let converted_total = whole.convert(total);

        let delta = converted_sum.abs_diff(converted_total);
        assert!(delta <= 1, "sum {converted_sum} vs total {converted_total}");
    }

    #[test]
    fn remainder_carrying_over_random_amounts() {
        // Deterministic pseudo-random sequence, no external RNG needed
        let mut seed: u64 = 0x2545_f491_4f6c_dd1d;
        let mut next = || {
            seed ^= seed << 13;
            seed ^= seed >> 7;
            seed ^= seed << 17;
            seed % 997 + 1
        };

        let amounts: Vec<u64> = (0..1000).map(|_| next()).collect();
        let total: u64 = amounts.iter().sum();

        let mut piecewise = distributor(7919, 104729);
        let mut whole = distributor(7919, 104729);

        let converted_sum: u64 = amounts.iter().map(|&a| piecewise.convert(a)).sum();
        let converted_total = whole.convert(total);

        assert!(converted_sum.abs_diff(converted_total) <= 1);
    }

    #[test]
    fn reset_decouples_passes() {
        let mut d = distributor(3, 2);
        let first = d.convert(10);
        d.reset();
        let second = d.convert(10);
        // Same input after reset converts identically
        assert_eq!(first, second);
    }

    #[test]
    fn large_amounts_do_not_overflow() {
        let mut d = distributor(1_000_000, 999_983);
        let amount = i64::MAX as u64 / 2;
        let converted = d.convert(amount);
        assert!(converted < amount);
        assert!(converted > amount / 2);
    }
}
