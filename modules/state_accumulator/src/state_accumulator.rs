// SPDX-License-Identifier: Apache-2.0
// Copyright © 2026, Exodus team.

//! Single-pass accumulation of the legacy ledger into an in-memory model,
//! plus the conservation-of-value gate that must pass before any output is
//! produced.

mod accumulator;
mod checker;
mod model;

pub use accumulator::Accumulator;
pub use checker::check_invariants;
pub use model::{AccountEntry, LedgerModel, LedgerState, WitnessEntry};
