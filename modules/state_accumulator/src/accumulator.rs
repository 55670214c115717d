//! The one-pass record visitor.
//!
//! Each decoded record is folded into the ledger model exactly once.
//! Balance-bearing records contribute to exactly one (account, category,
//! currency) bucket chosen by the record's currency code; an unrecognised
//! code is fatal since it means either a decoding bug or an unsupported
//! legacy asset. Kinds with no ledger meaning are deliberate no-ops.

use anyhow::Result;
use tracing::{info, warn};

use exodus_codec::Record;
use exodus_common::{
    Asset, BalanceCategory, Currency, CurrencySet, InvariantError,
};
use exodus_module_snapshot_reader::{DecodedRecord, NameMaps};

use crate::model::{LedgerModel, LedgerState, WitnessEntry};

/// Folds the decoded record stream into a [`LedgerModel`]
pub struct Accumulator {
    model: LedgerModel,
    names: NameMaps,
    currencies: CurrencySet,
    max_votes: usize,
}

impl Accumulator {
    pub fn new(names: NameMaps, currencies: CurrencySet, max_votes: usize) -> Self {
        Self {
            model: LedgerModel::with_account_capacity(names.account_count()),
            names,
            currencies,
            max_votes,
        }
    }

    /// Classify a balance-bearing asset or fail on an unsupported symbol
    fn currency_of(&self, asset: Asset, record: &'static str, account: u32) -> Result<Currency> {
        self.currencies.classify(asset.symbol).ok_or_else(|| {
            InvariantError::UnknownCurrency {
                symbol: asset.symbol.to_string(),
                record,
                account: self
                    .names
                    .account(account)
                    .unwrap_or("<unresolved>")
                    .to_string(),
            }
            .into()
        })
    }

    /// Add into one (account, currency, category) bucket and the matching
    /// grand total.
    fn credit(
        &mut self,
        account: u32,
        currency: Currency,
        category: BalanceCategory,
        amount: i64,
    ) -> Result<()> {
        self.names.check_account(account)?;
        self.model.account_mut(account).add_balance(currency, category, amount);
        self.model.totals[currency.index()][category.index()] += amount;
        Ok(())
    }

    fn credit_asset(
        &mut self,
        account: u32,
        asset: Asset,
        category: BalanceCategory,
        record: &'static str,
    ) -> Result<()> {
        let currency = self.currency_of(asset, record, account)?;
        self.credit(account, currency, category, asset.amount)
    }

    /// Visit one decoded record, mutating the model in place
    pub fn accept(&mut self, decoded: DecodedRecord) -> Result<()> {
        match decoded.record {
            Record::GlobalProperties(gpo) => {
                info!(
                    head_block = gpo.head_block_num,
                    total_primary = %gpo.total_primary,
                    total_secondary = %gpo.total_secondary,
                    "global properties"
                );
                self.model.global = Some(gpo);
            }

            Record::Account(acc) => {
                self.names.check_account(acc.idx)?;
                if let Some(proxy) = acc.proxy {
                    self.names.check_account(proxy)?;
                }

                self.credit_asset(acc.idx, acc.balance, BalanceCategory::Open, "account")?;
                self.credit_asset(
                    acc.idx,
                    acc.savings_balance,
                    BalanceCategory::Savings,
                    "account",
                )?;
                self.credit_asset(
                    acc.idx,
                    acc.secondary_balance,
                    BalanceCategory::Open,
                    "account",
                )?;
                self.credit_asset(
                    acc.idx,
                    acc.savings_secondary_balance,
                    BalanceCategory::Savings,
                    "account",
                )?;

                for vesting_field in [
                    acc.vesting_shares,
                    acc.delegated_vesting,
                    acc.received_vesting,
                ] {
                    if !self.currencies.is_vesting(vesting_field.symbol) {
                        return Err(InvariantError::UnknownCurrency {
                            symbol: vesting_field.symbol.to_string(),
                            record: "account vesting",
                            account: self.names.account(acc.idx)?.to_string(),
                        }
                        .into());
                    }
                }

                self.model.total_vesting += acc.vesting_shares.amount;

                let entry = self.model.account_mut(acc.idx);
                entry.present = true;
                entry.created = acc.created;
                entry.vesting = acc.vesting_shares.amount;
                entry.delegated_vesting = acc.delegated_vesting.amount;
                entry.received_vesting = acc.received_vesting.amount;
                entry.proxy = acc.proxy;
                entry.recovery = acc.recovery;
            }

            // Authority material is not part of the migrated economics
            Record::AccountAuthority(_) => {}

            Record::AccountMetadata(meta) => {
                self.names.check_account(meta.account)?;
                self.model.account_mut(meta.account).metadata = Some(meta.json);
            }

            Record::Witness(w) => {
                self.names.check_account(w.owner)?;
                self.model.witnesses.insert(
                    w.owner,
                    WitnessEntry {
                        owner: w.owner,
                        created: w.created,
                        url: w.url,
                        signing_key: w.signing_key,
                        recorded_weight: w.total_weight,
                    },
                );
            }

            Record::WitnessVote(vote) => {
                self.names.check_account(vote.account)?;
                self.names.check_account(vote.witness)?;
                let max_votes = self.max_votes;
                let entry = self.model.account_mut(vote.account);
                entry.witness_votes.push(vote.witness);
                if entry.witness_votes.len() > max_votes {
                    let count = entry.witness_votes.len();
                    return Err(InvariantError::TooManyVotes {
                        account: self.names.account(vote.account)?.to_string(),
                        count,
                        max: max_votes,
                    }
                    .into());
                }
            }

            // The new chain derives its schedule from genesis stake
            Record::WitnessSchedule(_) => {}

            Record::VestingDelegation(d) => {
                self.names.check_account(d.delegator)?;
                self.names.check_account(d.delegatee)?;
                self.model.delegations.push(d);
            }

            Record::VestingDelegationExpiration(e) => {
                self.names.check_account(e.delegator)?;
                // All balance data precedes these in file order
                if !self.model.ledger_complete {
                    self.model.ledger_complete = true;
                    info!("ledger accumulation complete, expirations follow");
                }
                self.model.expiring_delegations.push(e);
            }

            Record::WithdrawRoute(route) => {
                self.names.check_account(route.from)?;
                self.names.check_account(route.to)?;
                if route.from == route.to {
                    return Err(InvariantError::SelfWithdrawRoute {
                        account: self.names.account(route.from)?.to_string(),
                    }
                    .into());
                }
                if route.percent == exodus_common::FULL_PERCENT {
                    let entry = self.model.account_mut(route.from);
                    entry.withdraw_route = Some(route.to);
                    entry.route_auto_stake = route.auto_stake;
                } else {
                    // Partial-percentage routes are out of scope; counted
                    // and surfaced for manual audit
                    self.model.skipped_routes += 1;
                    warn!(
                        from = self.names.account(route.from)?,
                        to = self.names.account(route.to)?,
                        percent = route.percent,
                        "skipping partial-percentage withdraw route"
                    );
                }
            }

            Record::LimitOrder(order) => {
                let for_sale = Asset::new(order.for_sale, order.sell_price_base.symbol);
                self.credit_asset(
                    order.seller,
                    for_sale,
                    BalanceCategory::OrderEscrow,
                    "limit-order",
                )?;
            }

            Record::ConversionRequest(req) => {
                self.credit_asset(
                    req.owner,
                    req.amount,
                    BalanceCategory::Conversion,
                    "conversion-request",
                )?;
            }

            Record::Escrow(escrow) => {
                self.credit_asset(
                    escrow.from,
                    escrow.primary_balance,
                    BalanceCategory::Escrow,
                    "escrow",
                )?;
                self.credit_asset(
                    escrow.from,
                    escrow.secondary_balance,
                    BalanceCategory::Escrow,
                    "escrow",
                )?;
                self.credit_asset(
                    escrow.from,
                    escrow.pending_fee,
                    BalanceCategory::EscrowFee,
                    "escrow",
                )?;
            }

            Record::SavingsWithdrawal(withdrawal) => {
                self.names.check_account(withdrawal.to)?;
                self.credit_asset(
                    withdrawal.from,
                    withdrawal.amount,
                    BalanceCategory::SavingsWithdrawal,
                    "savings-withdrawal",
                )?;
                self.model.savings_withdrawals.push(withdrawal);
            }

            Record::Comment(comment) => {
                self.names.check_account(comment.author)?;
                self.names.check_permalink(comment.permlink)?;
                if let Some((parent_author, parent_permlink)) = comment.parent {
                    self.names.check_account(parent_author)?;
                    self.names.check_permalink(parent_permlink)?;
                }
                self.model.messages.push(comment);
            }

            Record::Follow(follow) => {
                self.names.check_account(follow.follower)?;
                self.names.check_account(follow.following)?;
                self.model.follows.push(follow);
            }

            // Event records resolve names only at export time, so their
            // indices are validated here like everything else
            Record::TransferEvent(t) => {
                self.names.check_account(t.from)?;
                self.names.check_account(t.to)?;
                self.model.transfers.push(t);
            }
            Record::AuthorRewardEvent(r) => {
                self.names.check_account(r.author)?;
                self.names.check_permalink(r.permlink)?;
                self.model.author_rewards.push(r);
            }
            Record::CurationRewardEvent(r) => {
                self.names.check_account(r.curator)?;
                self.names.check_account(r.author)?;
                self.names.check_permalink(r.permlink)?;
                self.model.curation_rewards.push(r);
            }
        }
        Ok(())
    }

    /// Finish accumulation, transferring ownership of the model downstream
    pub fn into_state(self) -> Result<LedgerState> {
        if self.model.global.is_none() {
            return Err(InvariantError::MissingGlobalProperties.into());
        }
        if self.model.skipped_routes > 0 {
            warn!(
                skipped = self.model.skipped_routes,
                "partial-percentage withdraw routes were dropped"
            );
        }
        Ok(LedgerState {
            model: self.model,
            names: self.names,
            currencies: self.currencies,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exodus_common::Symbol;
    use exodus_module_snapshot_reader::SnapshotReader;
    use exodus_test_utils::{AccountFixture, SnapshotBuilder};

    fn currencies() -> CurrencySet {
        CurrencySet {
            primary: Symbol::new(3, "GLS"),
            secondary: Symbol::new(3, "GBG"),
            vesting: Symbol::new(6, "GESTS"),
        }
    }

    fn accumulate(builder: &SnapshotBuilder) -> Result<LedgerState> {
        let dir = tempfile::tempdir().unwrap();
        let path = builder.write_to(dir.path(), "snapshot.bin").unwrap();
        let mut reader = SnapshotReader::open(&path, None).unwrap();
        let maps = reader.read_maps().unwrap();
        let mut acc = Accumulator::new(maps, currencies(), 30);
        while let Some(decoded) = reader.next_record()? {
            acc.accept(decoded)?;
        }
        acc.into_state()
    }

    fn base_builder() -> (SnapshotBuilder, u32, u32) {
        let c = currencies();
        let mut builder = SnapshotBuilder::new();
        let alice = builder.account_name("alice");
        let bob = builder.account_name("bob");
        builder.global_properties(
            100,
            Asset::new(10_000, c.primary),
            Asset::new(500, c.secondary),
            Asset::new(1_000, c.primary),
            Asset::new(2_000_000, c.vesting),
        );
        (builder, alice, bob)
    }

    #[test]
    fn account_seeds_buckets_and_totals() {
        let c = currencies();
        let (mut builder, alice, _) = base_builder();
        let mut fixture = AccountFixture::new(alice, c.primary, c.secondary, c.vesting);
        fixture.balance = Asset::new(7_000, c.primary);
        fixture.savings_balance = Asset::new(3_000, c.primary);
        fixture.secondary_balance = Asset::new(500, c.secondary);
        fixture.vesting_shares = Asset::new(2_000_000, c.vesting);
        builder.account(&fixture);

        let state = accumulate(&builder).unwrap();
        let entry = state.model.account(alice);
        assert_eq!(entry.balance(Currency::Primary, BalanceCategory::Open), 7_000);
        assert_eq!(
            entry.balance(Currency::Primary, BalanceCategory::Savings),
            3_000
        );
        assert_eq!(
            entry.balance(Currency::Secondary, BalanceCategory::Open),
            500
        );
        assert_eq!(state.model.currency_total(Currency::Primary), 10_000);
        assert_eq!(state.model.currency_total(Currency::Secondary), 500);
        assert_eq!(state.model.total_vesting, 2_000_000);
    }

    #[test]
    fn unknown_currency_is_fatal() {
        let c = currencies();
        let (mut builder, alice, _) = base_builder();
        builder.account(&AccountFixture::new(alice, c.primary, c.secondary, c.vesting));
        builder.conversion_request(alice, 1, Asset::new(100, Symbol::new(3, "XXX")));
        let err = accumulate(&builder).unwrap_err();
        assert!(err.to_string().contains("unsupported currency"), "{err}");
    }

    #[test]
    fn partial_withdraw_route_is_skipped_with_count() {
        let c = currencies();
        let (mut builder, alice, bob) = base_builder();
        builder.account(&AccountFixture::new(alice, c.primary, c.secondary, c.vesting));
        builder.account(&AccountFixture::new(bob, c.primary, c.secondary, c.vesting));
        builder.withdraw_route(alice, bob, 5000, false); // partial: skipped
        builder.withdraw_route(bob, alice, 10000, true); // full: kept

        let state = accumulate(&builder).unwrap();
        assert_eq!(state.model.skipped_routes, 1);
        assert_eq!(state.model.account(alice).withdraw_route, None);
        assert_eq!(state.model.account(bob).withdraw_route, Some(alice));
        assert!(state.model.account(bob).route_auto_stake);
    }

    #[test]
    fn self_withdraw_route_is_fatal() {
        let c = currencies();
        let (mut builder, alice, _) = base_builder();
        builder.account(&AccountFixture::new(alice, c.primary, c.secondary, c.vesting));
        builder.withdraw_route(alice, alice, 10000, false);
        let err = accumulate(&builder).unwrap_err();
        assert!(err.to_string().contains("points back at itself"), "{err}");
    }

    #[test]
    fn vote_cap_overflow_is_fatal() {
        let c = currencies();
        let (mut builder, alice, _) = base_builder();
        builder.account(&AccountFixture::new(alice, c.primary, c.secondary, c.vesting));
        let witnesses: Vec<u32> =
            (0..31).map(|i| builder.account_name(&format!("witness{i}"))).collect();
        for w in &witnesses {
            builder.witness_vote(alice, *w);
        }
        let err = accumulate(&builder).unwrap_err();
        assert!(err.to_string().contains("witness votes"), "{err}");
    }

    #[test]
    fn event_record_indices_are_bounds_checked() {
        let c = currencies();
        let (mut builder, alice, _) = base_builder();
        builder.account(&AccountFixture::new(alice, c.primary, c.secondary, c.vesting));
        // Recipient 99 is not in the account map
        builder.transfer_event(10, alice, 99, Asset::new(1, c.primary), "x");
        let err = accumulate(&builder).unwrap_err();
        assert!(err.to_string().contains("out of range"), "{err}");
    }

    #[test]
    fn reward_permalink_indices_are_bounds_checked() {
        let c = currencies();
        let (mut builder, alice, _) = base_builder();
        builder.account(&AccountFixture::new(alice, c.primary, c.secondary, c.vesting));
        builder.author_reward_event(
            10,
            alice,
            7, // not in the permalink map
            Asset::new(1, c.primary),
            Asset::zero(c.secondary),
            Asset::zero(c.vesting),
        );
        let err = accumulate(&builder).unwrap_err();
        assert!(err.to_string().contains("out of range"), "{err}");
    }

    #[test]
    fn expiration_marks_ledger_complete() {
        let c = currencies();
        let (mut builder, alice, bob) = base_builder();
        builder.account(&AccountFixture::new(alice, c.primary, c.secondary, c.vesting));
        builder.account(&AccountFixture::new(bob, c.primary, c.secondary, c.vesting));
        builder.vesting_delegation(alice, bob, Asset::new(100, c.vesting), 0);
        builder.vesting_delegation_expiration(alice, Asset::new(50, c.vesting), 999);

        let state = accumulate(&builder).unwrap();
        assert!(state.model.ledger_complete);
        assert_eq!(state.model.delegations.len(), 1);
        assert_eq!(state.model.expiring_delegations.len(), 1);
    }

    #[test]
    fn missing_global_properties_is_fatal() {
        let c = currencies();
        let mut builder = SnapshotBuilder::new();
        let alice = builder.account_name("alice");
        builder.account(&AccountFixture::new(alice, c.primary, c.secondary, c.vesting));
        assert!(accumulate(&builder).is_err());
    }
}
