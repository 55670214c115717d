//! Fixture builders for Exodus module tests.
//!
//! [`SnapshotBuilder`] assembles a syntactically valid legacy snapshot and
//! its companion name-map file in memory, grouping consecutive records of the
//! same kind into sections the way the legacy exporter does.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;

use exodus_codec::{
    tags, MAP_TAG_ACCOUNTS, MAP_TAG_PERMALINKS, SNAPSHOT_MAGIC, SNAPSHOT_VERSION,
};
use exodus_common::{AccIdx, Asset, BasisPoints, PermIdx, Symbol, Timestamp};

fn put_u16(buf: &mut Vec<u8>, v: u16) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn put_u32(buf: &mut Vec<u8>, v: u32) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn put_u64(buf: &mut Vec<u8>, v: u64) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn put_i64(buf: &mut Vec<u8>, v: i64) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn put_asset(buf: &mut Vec<u8>, asset: Asset) {
    put_i64(buf, asset.amount);
    put_u64(buf, asset.symbol.0);
}

fn put_string(buf: &mut Vec<u8>, s: &str) {
    put_u32(buf, s.len() as u32);
    buf.extend_from_slice(s.as_bytes());
}

fn put_opt_u32(buf: &mut Vec<u8>, v: Option<u32>) {
    match v {
        Some(v) => {
            buf.push(1);
            put_u32(buf, v);
        }
        None => buf.push(0),
    }
}

/// Account record fixture with everything defaulted to zero
#[derive(Debug, Clone)]
pub struct AccountFixture {
    pub idx: AccIdx,
    pub created: Timestamp,
    pub balance: Asset,
    pub savings_balance: Asset,
    pub secondary_balance: Asset,
    pub savings_secondary_balance: Asset,
    pub vesting_shares: Asset,
    pub delegated_vesting: Asset,
    pub received_vesting: Asset,
    pub proxy: Option<AccIdx>,
    pub recovery: Option<AccIdx>,
}

impl AccountFixture {
    pub fn new(idx: AccIdx, primary: Symbol, secondary: Symbol, vesting: Symbol) -> Self {
        Self {
            idx,
            created: 0,
            balance: Asset::zero(primary),
            savings_balance: Asset::zero(primary),
            secondary_balance: Asset::zero(secondary),
            savings_secondary_balance: Asset::zero(secondary),
            vesting_shares: Asset::zero(vesting),
            delegated_vesting: Asset::zero(vesting),
            received_vesting: Asset::zero(vesting),
            proxy: None,
            recovery: None,
        }
    }
}

/// Builds snapshot + name-map images for tests
pub struct SnapshotBuilder {
    accounts: Vec<String>,
    permalinks: Vec<String>,
    records: Vec<(u32, Vec<u8>)>,
}

impl Default for SnapshotBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotBuilder {
    pub fn new() -> Self {
        Self {
            accounts: Vec::new(),
            permalinks: Vec::new(),
            records: Vec::new(),
        }
    }

    /// Register a legacy account name, returning its dense index
    pub fn account_name(&mut self, name: &str) -> AccIdx {
        self.accounts.push(name.to_string());
        (self.accounts.len() - 1) as AccIdx
    }

    /// Register a permalink string, returning its dense index
    pub fn permalink(&mut self, link: &str) -> PermIdx {
        self.permalinks.push(link.to_string());
        (self.permalinks.len() - 1) as PermIdx
    }

    pub fn global_properties(
        &mut self,
        head_block_num: u32,
        total_primary: Asset,
        total_secondary: Asset,
        total_vesting_fund: Asset,
        total_vesting_shares: Asset,
    ) -> &mut Self {
        let mut buf = Vec::new();
        put_u32(&mut buf, head_block_num);
        put_u32(&mut buf, 0); // time
        put_asset(&mut buf, total_primary);
        put_asset(&mut buf, total_secondary);
        put_asset(&mut buf, total_vesting_fund);
        put_asset(&mut buf, total_vesting_shares);
        put_u16(&mut buf, 1000); // interest rate
        self.records.push((tags::GLOBAL_PROPERTIES, buf));
        self
    }

    pub fn account(&mut self, fixture: &AccountFixture) -> &mut Self {
        let mut buf = Vec::new();
        put_u32(&mut buf, fixture.idx);
        put_u32(&mut buf, fixture.created);
        put_asset(&mut buf, fixture.balance);
        put_asset(&mut buf, fixture.savings_balance);
        put_asset(&mut buf, fixture.secondary_balance);
        put_asset(&mut buf, fixture.savings_secondary_balance);
        put_asset(&mut buf, fixture.vesting_shares);
        put_asset(&mut buf, fixture.delegated_vesting);
        put_asset(&mut buf, fixture.received_vesting);
        put_opt_u32(&mut buf, fixture.proxy);
        put_opt_u32(&mut buf, fixture.recovery);
        self.records.push((tags::ACCOUNT, buf));
        self
    }

    pub fn witness(&mut self, owner: AccIdx, url: &str, total_weight: u64) -> &mut Self {
        let mut buf = Vec::new();
        put_u32(&mut buf, owner);
        put_u32(&mut buf, 0); // created
        put_string(&mut buf, url);
        put_u64(&mut buf, total_weight);
        buf.extend_from_slice(&[0u8; 33]); // signing key
        self.records.push((tags::WITNESS, buf));
        self
    }

    pub fn witness_vote(&mut self, account: AccIdx, witness: AccIdx) -> &mut Self {
        let mut buf = Vec::new();
        put_u32(&mut buf, account);
        put_u32(&mut buf, witness);
        self.records.push((tags::WITNESS_VOTE, buf));
        self
    }

    pub fn witness_schedule(&mut self, max_voted: u16) -> &mut Self {
        let mut buf = Vec::new();
        put_u16(&mut buf, max_voted);
        put_u16(&mut buf, 1);
        put_u16(&mut buf, 1);
        put_u16(&mut buf, 17);
        self.records.push((tags::WITNESS_SCHEDULE, buf));
        self
    }

    pub fn vesting_delegation(
        &mut self,
        delegator: AccIdx,
        delegatee: AccIdx,
        vesting_shares: Asset,
        interest_rate: BasisPoints,
    ) -> &mut Self {
        let mut buf = Vec::new();
        put_u32(&mut buf, delegator);
        put_u32(&mut buf, delegatee);
        put_asset(&mut buf, vesting_shares);
        put_u32(&mut buf, 0); // min delegation time
        put_u16(&mut buf, interest_rate);
        buf.push(0); // payout strategy: to delegator
        self.records.push((tags::VESTING_DELEGATION, buf));
        self
    }

    pub fn vesting_delegation_expiration(
        &mut self,
        delegator: AccIdx,
        vesting_shares: Asset,
        expiration: Timestamp,
    ) -> &mut Self {
        let mut buf = Vec::new();
        put_u32(&mut buf, delegator);
        put_asset(&mut buf, vesting_shares);
        put_u32(&mut buf, expiration);
        self.records.push((tags::VESTING_DELEGATION_EXPIRATION, buf));
        self
    }

    pub fn withdraw_route(
        &mut self,
        from: AccIdx,
        to: AccIdx,
        percent: BasisPoints,
        auto_stake: bool,
    ) -> &mut Self {
        let mut buf = Vec::new();
        put_u32(&mut buf, from);
        put_u32(&mut buf, to);
        put_u16(&mut buf, percent);
        buf.push(auto_stake as u8);
        self.records.push((tags::WITHDRAW_ROUTE, buf));
        self
    }

    pub fn limit_order(
        &mut self,
        seller: AccIdx,
        order_id: u32,
        for_sale: i64,
        base: Asset,
        quote: Asset,
    ) -> &mut Self {
        let mut buf = Vec::new();
        put_u32(&mut buf, seller);
        put_u32(&mut buf, order_id);
        put_i64(&mut buf, for_sale);
        put_asset(&mut buf, base);
        put_asset(&mut buf, quote);
        put_u32(&mut buf, 0); // created
        put_u32(&mut buf, 0); // expiration
        self.records.push((tags::LIMIT_ORDER, buf));
        self
    }

    pub fn conversion_request(&mut self, owner: AccIdx, request_id: u32, amount: Asset) -> &mut Self {
        let mut buf = Vec::new();
        put_u32(&mut buf, owner);
        put_u32(&mut buf, request_id);
        put_asset(&mut buf, amount);
        put_u32(&mut buf, 0); // conversion date
        self.records.push((tags::CONVERSION_REQUEST, buf));
        self
    }

    #[allow(clippy::too_many_arguments)]
    pub fn escrow(
        &mut self,
        escrow_id: u32,
        from: AccIdx,
        to: AccIdx,
        agent: AccIdx,
        primary_balance: Asset,
        secondary_balance: Asset,
        pending_fee: Asset,
    ) -> &mut Self {
        let mut buf = Vec::new();
        put_u32(&mut buf, escrow_id);
        put_u32(&mut buf, from);
        put_u32(&mut buf, to);
        put_u32(&mut buf, agent);
        put_asset(&mut buf, primary_balance);
        put_asset(&mut buf, secondary_balance);
        put_asset(&mut buf, pending_fee);
        put_u32(&mut buf, 0); // ratification deadline
        self.records.push((tags::ESCROW, buf));
        self
    }

    pub fn savings_withdrawal(
        &mut self,
        from: AccIdx,
        to: AccIdx,
        request_id: u32,
        amount: Asset,
    ) -> &mut Self {
        let mut buf = Vec::new();
        put_u32(&mut buf, from);
        put_u32(&mut buf, to);
        put_u32(&mut buf, request_id);
        put_asset(&mut buf, amount);
        put_u32(&mut buf, 0); // complete
        put_string(&mut buf, "");
        self.records.push((tags::SAVINGS_WITHDRAWAL, buf));
        self
    }

    pub fn comment(
        &mut self,
        author: AccIdx,
        permlink: PermIdx,
        parent: Option<(AccIdx, PermIdx)>,
        body: &str,
    ) -> &mut Self {
        let mut buf = Vec::new();
        put_u32(&mut buf, author);
        put_u32(&mut buf, permlink);
        match parent {
            Some((pa, pp)) => {
                buf.push(1);
                put_u32(&mut buf, pa);
                put_u32(&mut buf, pp);
            }
            None => buf.push(0),
        }
        put_u32(&mut buf, 0); // created
        put_i64(&mut buf, 0); // net_rshares
        put_string(&mut buf, body);
        self.records.push((tags::COMMENT, buf));
        self
    }

    pub fn account_metadata(&mut self, account: AccIdx, json: &str) -> &mut Self {
        let mut buf = Vec::new();
        put_u32(&mut buf, account);
        put_string(&mut buf, json);
        self.records.push((tags::ACCOUNT_METADATA, buf));
        self
    }

    pub fn follow(&mut self, follower: AccIdx, following: AccIdx, relation: u8) -> &mut Self {
        let mut buf = Vec::new();
        put_u32(&mut buf, follower);
        put_u32(&mut buf, following);
        buf.push(relation);
        self.records.push((tags::FOLLOW, buf));
        self
    }

    pub fn transfer_event(
        &mut self,
        block_num: u32,
        from: AccIdx,
        to: AccIdx,
        amount: Asset,
        memo: &str,
    ) -> &mut Self {
        let mut buf = Vec::new();
        put_u32(&mut buf, block_num);
        put_u32(&mut buf, from);
        put_u32(&mut buf, to);
        put_asset(&mut buf, amount);
        put_string(&mut buf, memo);
        self.records.push((tags::TRANSFER_EVENT, buf));
        self
    }

    pub fn author_reward_event(
        &mut self,
        block_num: u32,
        author: AccIdx,
        permlink: PermIdx,
        primary_payout: Asset,
        secondary_payout: Asset,
        vesting_payout: Asset,
    ) -> &mut Self {
        let mut buf = Vec::new();
        put_u32(&mut buf, block_num);
        put_u32(&mut buf, author);
        put_u32(&mut buf, permlink);
        put_asset(&mut buf, primary_payout);
        put_asset(&mut buf, secondary_payout);
        put_asset(&mut buf, vesting_payout);
        self.records.push((tags::AUTHOR_REWARD_EVENT, buf));
        self
    }

    pub fn curation_reward_event(
        &mut self,
        block_num: u32,
        curator: AccIdx,
        reward: Asset,
        author: AccIdx,
        permlink: PermIdx,
    ) -> &mut Self {
        let mut buf = Vec::new();
        put_u32(&mut buf, block_num);
        put_u32(&mut buf, curator);
        put_asset(&mut buf, reward);
        put_u32(&mut buf, author);
        put_u32(&mut buf, permlink);
        self.records.push((tags::CURATION_REWARD_EVENT, buf));
        self
    }

    /// Push a raw record under an arbitrary tag, for corruption tests
    pub fn raw_record(&mut self, tag: u32, payload: Vec<u8>) -> &mut Self {
        self.records.push((tag, payload));
        self
    }

    /// Assemble the snapshot image: header, then consecutive same-tag runs
    /// folded into `(type_tag, record_count)` sections.
    pub fn build_snapshot(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&SNAPSHOT_MAGIC);
        put_u32(&mut out, SNAPSHOT_VERSION);

        let mut i = 0;
        while i < self.records.len() {
            let tag = self.records[i].0;
            let mut j = i;
            while j < self.records.len() && self.records[j].0 == tag {
                j += 1;
            }
            put_u32(&mut out, tag);
            put_u32(&mut out, (j - i) as u32);
            for (_, payload) in &self.records[i..j] {
                out.extend_from_slice(payload);
            }
            i = j;
        }
        out
    }

    /// Assemble the name-map image: accounts then permalinks
    pub fn build_maps(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for (tag, strings) in [
            (MAP_TAG_ACCOUNTS, &self.accounts),
            (MAP_TAG_PERMALINKS, &self.permalinks),
        ] {
            out.push(tag);
            put_u32(&mut out, strings.len() as u32);
            for s in strings {
                out.extend_from_slice(s.as_bytes());
                out.push(0);
            }
        }
        out
    }

    /// Write snapshot and map files next to each other, returning the
    /// snapshot path.
    pub fn write_to(&self, dir: &Path, stem: &str) -> Result<PathBuf> {
        let snapshot_path = dir.join(stem);
        fs::write(&snapshot_path, self.build_snapshot())?;
        fs::write(
            dir.join(format!("{stem}{}", exodus_codec::MAP_FILE_SUFFIX)),
            self.build_maps(),
        )?;
        Ok(snapshot_path)
    }
}
