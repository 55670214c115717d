//! The in-memory ledger model.
//!
//! Built once by the accumulator, then handed by value through the pipeline:
//! invariant checker, delegation tree builder, genesis and event writers.
//! All cross-references are dense indices into the name maps; names are
//! resolved to strings only at output time.

use std::collections::BTreeMap;

use serde::Serialize;

use exodus_codec::{
    AuthorRewardEventRecord, CommentRecord, CurationRewardEventRecord, DeferredPayload,
    FollowRecord, GlobalPropertiesRecord, SavingsWithdrawalRecord, TransferEventRecord,
    VestingDelegationExpirationRecord, VestingDelegationRecord,
};
use exodus_common::{AccIdx, BalanceCategory, Currency, CurrencySet, Timestamp};
use exodus_module_snapshot_reader::NameMaps;

/// Per-account ledger entry. Balance buckets are indexed
/// `[currency][category]`, in smallest units.
#[derive(Debug, Clone, Serialize)]
pub struct AccountEntry {
    pub idx: AccIdx,
    pub created: Timestamp,
    /// True once an account record seeded this entry
    pub present: bool,

    pub balances: [[i64; BalanceCategory::COUNT]; Currency::COUNT],

    /// Own vesting shares
    pub vesting: i64,
    /// Vesting delegated out to others
    pub delegated_vesting: i64,
    /// Vesting received from others
    pub received_vesting: i64,

    /// Account whose aggregate decisions this account defers to
    pub proxy: Option<AccIdx>,
    pub recovery: Option<AccIdx>,

    /// Witnesses this account votes for directly
    pub witness_votes: Vec<AccIdx>,

    /// 100%-redirect withdraw route target, if any
    pub withdraw_route: Option<AccIdx>,
    pub route_auto_stake: bool,

    /// JSON metadata skipped on the streaming pass
    pub metadata: Option<DeferredPayload>,
}

impl AccountEntry {
    pub fn new(idx: AccIdx) -> Self {
        Self {
            idx,
            created: 0,
            present: false,
            balances: [[0; BalanceCategory::COUNT]; Currency::COUNT],
            vesting: 0,
            delegated_vesting: 0,
            received_vesting: 0,
            proxy: None,
            recovery: None,
            witness_votes: Vec::new(),
            withdraw_route: None,
            route_auto_stake: false,
            metadata: None,
        }
    }

    pub fn balance(&self, currency: Currency, category: BalanceCategory) -> i64 {
        self.balances[currency.index()][category.index()]
    }

    pub fn add_balance(&mut self, currency: Currency, category: BalanceCategory, amount: i64) {
        self.balances[currency.index()][category.index()] += amount;
    }

    /// Stake this account controls for voting purposes: its own vesting,
    /// minus what it delegated away, plus what it received.
    pub fn effective_vesting(&self) -> i64 {
        self.vesting - self.delegated_vesting + self.received_vesting
    }
}

/// A witness (validator candidate) known to the snapshot
#[derive(Debug, Clone, Serialize)]
pub struct WitnessEntry {
    pub owner: AccIdx,
    pub created: Timestamp,
    pub url: String,
    pub signing_key: Vec<u8>,
    /// Vote weight as recorded by the legacy node; cross-checked against an
    /// independently accumulated total before output
    pub recorded_weight: u64,
}

/// Everything accumulated from one pass over the snapshot
#[derive(Debug, Default)]
pub struct LedgerModel {
    /// Arena of per-account entries, indexed by acc_idx
    pub accounts: Vec<AccountEntry>,

    /// Witnesses keyed by owner account, iteration order deterministic
    pub witnesses: BTreeMap<AccIdx, WitnessEntry>,

    /// Grand totals per `[currency][category]`, in smallest units
    pub totals: [[i64; BalanceCategory::COUNT]; Currency::COUNT],

    /// Sum of all per-account own vesting
    pub total_vesting: i64,

    /// Raw global-properties record (declared totals, price peg)
    pub global: Option<GlobalPropertiesRecord>,

    /// Active delegation edges
    pub delegations: Vec<VestingDelegationRecord>,

    /// Delegations winding down
    pub expiring_delegations: Vec<VestingDelegationExpirationRecord>,

    /// Ledger accumulation is complete once the first expiration record is
    /// seen (balance data precedes them in file order)
    pub ledger_complete: bool,

    /// Partial-percentage withdraw routes dropped, surfaced for manual audit
    pub skipped_routes: u32,

    // Raw record lists drained by the event writer
    pub messages: Vec<CommentRecord>,
    pub follows: Vec<FollowRecord>,
    pub transfers: Vec<TransferEventRecord>,
    pub author_rewards: Vec<AuthorRewardEventRecord>,
    pub curation_rewards: Vec<CurationRewardEventRecord>,
    pub savings_withdrawals: Vec<SavingsWithdrawalRecord>,
}

impl LedgerModel {
    pub fn with_account_capacity(count: usize) -> Self {
        let mut model = Self::default();
        model.accounts = (0..count as u32).map(AccountEntry::new).collect();
        model
    }

    pub fn account(&self, idx: AccIdx) -> &AccountEntry {
        &self.accounts[idx as usize]
    }

    pub fn account_mut(&mut self, idx: AccIdx) -> &mut AccountEntry {
        &mut self.accounts[idx as usize]
    }

    /// Sum of one currency over all category grand totals
    pub fn currency_total(&self, currency: Currency) -> i64 {
        self.totals[currency.index()].iter().sum()
    }
}

/// The accumulated model together with the name maps it indexes into.
/// Ownership of this value moves stage to stage; nothing is shared.
#[derive(Debug)]
pub struct LedgerState {
    pub model: LedgerModel,
    pub names: NameMaps,
    pub currencies: CurrencySet,
}
