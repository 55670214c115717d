//! Conservation-of-value gate.
//!
//! These are integer fixed-point ledger quantities: any non-zero delta means
//! a modeling bug or a corrupt snapshot, not float noise, so there is no
//! tolerance band and no recovery. The gate runs after accumulation and
//! before any output is produced.

use tracing::info;

use exodus_common::{BalanceCategory, Currency, InvariantError};

use crate::model::LedgerState;

/// Assert that accumulated totals exactly match the declared chain-wide
/// totals, for both currencies and for vesting.
pub fn check_invariants(state: &LedgerState) -> Result<(), InvariantError> {
    let model = &state.model;
    let global = model.global.as_ref().ok_or(InvariantError::MissingGlobalProperties)?;

    for (currency, declared) in [
        (Currency::Primary, global.total_primary.amount),
        (Currency::Secondary, global.total_secondary.amount),
    ] {
        let accumulated = model.currency_total(currency);
        if accumulated != declared {
            // Name the first category with a non-zero share to make the
            // report concrete; the overall delta is what matters
            let category = largest_category(model.totals[currency.index()]);
            return Err(InvariantError::Conservation {
                currency: currency.to_string(),
                category: category.to_string(),
                declared,
                accumulated,
                delta: declared - accumulated,
            });
        }
        info!(%currency, total = accumulated, "conservation check passed");
    }

    let declared_vesting = global.total_vesting_shares.amount;
    if model.total_vesting != declared_vesting {
        return Err(InvariantError::VestingConservation {
            declared: declared_vesting,
            accumulated: model.total_vesting,
            delta: declared_vesting - model.total_vesting,
        });
    }
    info!(total = model.total_vesting, "vesting conservation check passed");

    Ok(())
}

fn largest_category(totals: [i64; BalanceCategory::COUNT]) -> BalanceCategory {
    let mut best = BalanceCategory::Open;
    let mut best_value = i64::MIN;
    for category in BalanceCategory::ALL {
        if totals[category.index()] > best_value {
            best_value = totals[category.index()];
            best = category;
        }
    }
    best
}
