// SPDX-License-Identifier: Apache-2.0
// Copyright © 2026, Exodus team.

//! Per-domain event logs for the migrated history.
//!
//! Each domain gets its own output file in the same sectioned, hashed
//! container as the genesis image: accounts, funds, transfers, rewards,
//! messages, pins, blocks, withdrawals, delegations. Domains can be toggled
//! off individually; a disabled domain produces no file at all. The
//! messages and accounts domains re-read the free-text payloads that were
//! skipped on the streaming pass.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use exodus_common::{Asset, Currency, IdAllocator, InvariantError, NewName, SupplyDistributor};
use exodus_module_genesis_writer::{
    primary_distributor, secondary_distributor, vesting_distributor, AbiDef, AbiType, AbiValue,
    GenesisParams, SectionWriter,
};
use exodus_module_snapshot_reader::PayloadReader;
use exodus_module_state_accumulator::LedgerState;

/// Which event domains to export. All enabled by default.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EventConfig {
    pub accounts: bool,
    pub funds: bool,
    pub transfers: bool,
    pub rewards: bool,
    pub messages: bool,
    pub pins: bool,
    pub blocks: bool,
    pub withdrawals: bool,
    pub delegations: bool,
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            accounts: true,
            funds: true,
            transfers: true,
            rewards: true,
            messages: true,
            pins: true,
            blocks: true,
            withdrawals: true,
            delegations: true,
        }
    }
}

/// One finalized event file
#[derive(Debug, Clone)]
pub struct EventDigest {
    pub domain: &'static str,
    pub path: PathBuf,
    pub digest: String,
}

/// Row schemas of the event log tables
pub fn events_abi() -> AbiDef {
    AbiDef::new()
        .with_struct(
            "account",
            vec![
                ("name", AbiType::Name),
                ("legacy", AbiType::Str),
                ("created", AbiType::TimePointSec),
                ("json_metadata", AbiType::Str),
            ],
        )
        .with_struct(
            "fund",
            vec![
                ("owner", AbiType::Name),
                ("liquid", AbiType::Asset),
                ("savings", AbiType::Asset),
            ],
        )
        .with_struct(
            "transfer",
            vec![
                ("id", AbiType::Uint64),
                ("block", AbiType::Uint32),
                ("from", AbiType::Name),
                ("to", AbiType::Name),
                ("quantity", AbiType::Asset),
                ("memo", AbiType::Str),
            ],
        )
        .with_struct(
            "reward",
            vec![
                ("id", AbiType::Uint64),
                ("block", AbiType::Uint32),
                ("kind", AbiType::Uint8),
                ("account", AbiType::Name),
                ("permlink", AbiType::Str),
                ("quantity", AbiType::Asset),
            ],
        )
        .with_struct(
            "message",
            vec![
                ("id", AbiType::Uint64),
                ("author", AbiType::Name),
                ("permlink", AbiType::Str),
                ("parent", AbiType::Optional(Box::new(AbiType::Name))),
                ("parent_permlink", AbiType::Optional(Box::new(AbiType::Str))),
                ("created", AbiType::TimePointSec),
                ("net_rshares", AbiType::Int64),
                ("body", AbiType::Str),
            ],
        )
        .with_struct(
            "pin",
            vec![("pinner", AbiType::Name), ("pinning", AbiType::Name)],
        )
        .with_struct(
            "block",
            vec![("blocker", AbiType::Name), ("blocking", AbiType::Name)],
        )
        .with_struct(
            "withdrawal",
            vec![
                ("id", AbiType::Uint64),
                ("from", AbiType::Name),
                ("to", AbiType::Name),
                ("quantity", AbiType::Asset),
                ("complete", AbiType::TimePointSec),
                ("memo", AbiType::Str),
            ],
        )
        .with_struct(
            "delegation",
            vec![
                ("id", AbiType::Uint64),
                ("delegator", AbiType::Name),
                ("delegatee", AbiType::Name),
                ("quantity", AbiType::Asset),
                ("interest_rate", AbiType::Uint16),
                ("min_time", AbiType::TimePointSec),
                ("payout_strategy", AbiType::Uint8),
            ],
        )
        .with_struct(
            "delegation.exp",
            vec![
                ("delegator", AbiType::Name),
                ("quantity", AbiType::Asset),
                ("expiration", AbiType::TimePointSec),
            ],
        )
}

/// Converters for amounts appearing in event records, one rounding stream
/// per currency per domain pass.
struct EventConverters {
    primary: SupplyDistributor,
    secondary: SupplyDistributor,
    vesting: SupplyDistributor,
}

impl EventConverters {
    fn new(state: &LedgerState, params: &GenesisParams) -> Result<Self> {
        let global = state
            .model
            .global
            .as_ref()
            .ok_or(InvariantError::MissingGlobalProperties)?;
        Ok(Self {
            primary: primary_distributor(params)?,
            secondary: secondary_distributor(params)?,
            vesting: vesting_distributor(global, params)?,
        })
    }

    /// Convert any recognised legacy amount into the new token
    fn convert(&mut self, state: &LedgerState, amount: Asset) -> Result<u64> {
        let value = amount.amount.max(0) as u64;
        if state.currencies.is_vesting(amount.symbol) {
            return Ok(self.vesting.convert(value));
        }
        match state.currencies.classify(amount.symbol) {
            Some(Currency::Primary) => Ok(self.primary.convert(value)),
            Some(Currency::Secondary) => Ok(self.secondary.convert(value)),
            None => Err(InvariantError::UnknownCurrency {
                symbol: amount.symbol.to_string(),
                record: "event",
                account: String::new(),
            }
            .into()),
        }
    }
}

/// Write all enabled event domains. Returns one digest per written file.
pub fn write_events(
    state: &LedgerState,
    payloads: &mut PayloadReader,
    out_dir: &Path,
    params: &GenesisParams,
    config: &EventConfig,
) -> Result<Vec<EventDigest>> {
    let scope: NewName = params
        .scope
        .parse()
        .with_context(|| format!("event scope '{}'", params.scope))?;
    let minted = exodus_module_genesis_writer::mint_names(state)?;

    let mut digests = Vec::new();
    let mut emit = |domain: &'static str, digest: String, path: PathBuf| {
        info!(domain, %digest, "event log written");
        digests.push(EventDigest {
            domain,
            path,
            digest,
        });
    };

    if config.accounts {
        let path = out_dir.join("accounts.bin");
        let digest = write_accounts(state, payloads, &path, scope, &minted)?;
        emit("accounts", digest, path);
    }
    if config.funds {
        let path = out_dir.join("funds.bin");
        let digest = write_funds(state, &path, scope, &minted, params)?;
        emit("funds", digest, path);
    }
    if config.transfers {
        let path = out_dir.join("transfers.bin");
        let digest = write_transfers(state, &path, scope, &minted, params)?;
        emit("transfers", digest, path);
    }
    if config.rewards {
        let path = out_dir.join("rewards.bin");
        let digest = write_rewards(state, &path, scope, &minted, params)?;
        emit("rewards", digest, path);
    }
    if config.messages {
        let path = out_dir.join("messages.bin");
        let digest = write_messages(state, payloads, &path, scope, &minted)?;
        emit("messages", digest, path);
    }
    if config.pins {
        let path = out_dir.join("pins.bin");
        let digest = write_follows(state, &path, scope, &minted, true)?;
        emit("pins", digest, path);
    }
    if config.blocks {
        let path = out_dir.join("blocks.bin");
        let digest = write_follows(state, &path, scope, &minted, false)?;
        emit("blocks", digest, path);
    }
    if config.withdrawals {
        let path = out_dir.join("withdrawals.bin");
        let digest = write_withdrawals(state, &path, scope, &minted, params)?;
        emit("withdrawals", digest, path);
    }
    if config.delegations {
        let path = out_dir.join("delegations.bin");
        let digest = write_delegations(state, &path, scope, &minted, params)?;
        emit("delegations", digest, path);
    }

    Ok(digests)
}

fn write_accounts(
    state: &LedgerState,
    payloads: &mut PayloadReader,
    path: &Path,
    scope: NewName,
    minted: &[NewName],
) -> Result<String> {
    let present: Vec<_> = state.model.accounts.iter().filter(|a| a.present).collect();
    let mut writer = SectionWriter::create(path, events_abi(), 1)?;
    writer.start_section(scope, "account", "account", present.len() as u32)?;
    for entry in present {
        let mut json = match &entry.metadata {
            Some(span) => payloads
                .read_string(span)
                .with_context(|| format!("metadata of account {}", entry.idx))?,
            None => String::new(),
        };
        // The legacy chain never validated metadata; drop anything that is
        // not well-formed JSON rather than poison the new chain's tables
        if !json.is_empty() && serde_json::from_str::<serde_json::Value>(&json).is_err() {
            warn!(account = entry.idx, "dropping malformed account metadata");
            json.clear();
        }
        writer.insert(&AbiValue::object(vec![
            ("name", AbiValue::Name(minted[entry.idx as usize])),
            (
                "legacy",
                AbiValue::Str(state.names.account(entry.idx)?.to_string()),
            ),
            ("created", AbiValue::Time(entry.created)),
            ("json_metadata", AbiValue::Str(json)),
        ]))?;
    }
    writer.finish_section()?;
    writer.finalize()
}

fn write_funds(
    state: &LedgerState,
    path: &Path,
    scope: NewName,
    minted: &[NewName],
    params: &GenesisParams,
) -> Result<String> {
    use exodus_common::BalanceCategory as Cat;

    let liquid_cats = [
        Cat::Open,
        Cat::OrderEscrow,
        Cat::Conversion,
        Cat::Escrow,
        Cat::EscrowFee,
    ];
    let savings_cats = [Cat::Savings, Cat::SavingsWithdrawal];
    let sum = |entry: &exodus_module_state_accumulator::AccountEntry,
               currency: Currency,
               cats: &[Cat]| {
        cats.iter()
            .map(|c| entry.balance(currency, *c).max(0) as u64)
            .sum::<u64>()
    };

    let mut converters = EventConverters::new(state, params)?;
    let present: Vec<_> = state.model.accounts.iter().filter(|a| a.present).collect();

    let mut writer = SectionWriter::create(path, events_abi(), 1)?;
    writer.start_section(scope, "fund", "fund", present.len() as u32)?;
    for entry in present {
        let liquid = converters
            .primary
            .convert(sum(entry, Currency::Primary, &liquid_cats))
            + converters
                .secondary
                .convert(sum(entry, Currency::Secondary, &liquid_cats));
        let savings = converters
            .primary
            .convert(sum(entry, Currency::Primary, &savings_cats))
            + converters
                .secondary
                .convert(sum(entry, Currency::Secondary, &savings_cats));
        writer.insert(&AbiValue::object(vec![
            ("owner", AbiValue::Name(minted[entry.idx as usize])),
            (
                "liquid",
                AbiValue::Asset(Asset::new(liquid as i64, params.new_symbol)),
            ),
            (
                "savings",
                AbiValue::Asset(Asset::new(savings as i64, params.new_symbol)),
            ),
        ]))?;
    }
    writer.finish_section()?;
    writer.finalize()
}

fn write_transfers(
    state: &LedgerState,
    path: &Path,
    scope: NewName,
    minted: &[NewName],
    params: &GenesisParams,
) -> Result<String> {
    let mut converters = EventConverters::new(state, params)?;
    let mut ids = IdAllocator::new("transfer", 1);

    let mut writer = SectionWriter::create(path, events_abi(), 1)?;
    writer.start_section(scope, "transfer", "transfer", state.model.transfers.len() as u32)?;
    for transfer in &state.model.transfers {
        let quantity = converters.convert(state, transfer.amount)?;
        writer.insert(&AbiValue::object(vec![
            ("id", AbiValue::U64(ids.assign())),
            ("block", AbiValue::U32(transfer.block_num)),
            ("from", AbiValue::Name(minted[transfer.from as usize])),
            ("to", AbiValue::Name(minted[transfer.to as usize])),
            (
                "quantity",
                AbiValue::Asset(Asset::new(quantity as i64, params.new_symbol)),
            ),
            ("memo", AbiValue::Str(transfer.memo.clone())),
        ]))?;
    }
    writer.finish_section()?;
    writer.finalize()
}

fn write_rewards(
    state: &LedgerState,
    path: &Path,
    scope: NewName,
    minted: &[NewName],
    params: &GenesisParams,
) -> Result<String> {
    let mut converters = EventConverters::new(state, params)?;
    let mut ids = IdAllocator::new("reward", 1);

    let rows = state.model.author_rewards.len() + state.model.curation_rewards.len();
    let mut writer = SectionWriter::create(path, events_abi(), 1)?;
    writer.start_section(scope, "reward", "reward", rows as u32)?;

    for reward in &state.model.author_rewards {
        // One row per reward, the three legacy payout assets folded into
        // a single new-token quantity
        let quantity = converters.convert(state, reward.primary_payout)?
            + converters.convert(state, reward.secondary_payout)?
            + converters.convert(state, reward.vesting_payout)?;
        writer.insert(&AbiValue::object(vec![
            ("id", AbiValue::U64(ids.assign())),
            ("block", AbiValue::U32(reward.block_num)),
            ("kind", AbiValue::U8(0)),
            ("account", AbiValue::Name(minted[reward.author as usize])),
            (
                "permlink",
                AbiValue::Str(state.names.permalink(reward.permlink)?.to_string()),
            ),
            (
                "quantity",
                AbiValue::Asset(Asset::new(quantity as i64, params.new_symbol)),
            ),
        ]))?;
    }
    for reward in &state.model.curation_rewards {
        let quantity = converters.convert(state, reward.reward)?;
        writer.insert(&AbiValue::object(vec![
            ("id", AbiValue::U64(ids.assign())),
            ("block", AbiValue::U32(reward.block_num)),
            ("kind", AbiValue::U8(1)),
            ("account", AbiValue::Name(minted[reward.curator as usize])),
            (
                "permlink",
                AbiValue::Str(state.names.permalink(reward.permlink)?.to_string()),
            ),
            (
                "quantity",
                AbiValue::Asset(Asset::new(quantity as i64, params.new_symbol)),
            ),
        ]))?;
    }
    writer.finish_section()?;
    writer.finalize()
}

fn write_messages(
    state: &LedgerState,
    payloads: &mut PayloadReader,
    path: &Path,
    scope: NewName,
    minted: &[NewName],
) -> Result<String> {
    let mut ids = IdAllocator::new("message", 1);

    let mut writer = SectionWriter::create(path, events_abi(), 1)?;
    writer.start_section(scope, "message", "message", state.model.messages.len() as u32)?;
    for message in &state.model.messages {
        let body = payloads
            .read_string(&message.body)
            .with_context(|| format!("body of message by account {}", message.author))?;
        let (parent, parent_permlink) = match message.parent {
            Some((author, permlink)) => (
                Some(AbiValue::Name(minted[author as usize])),
                Some(AbiValue::Str(state.names.permalink(permlink)?.to_string())),
            ),
            None => (None, None),
        };
        writer.insert(&AbiValue::object(vec![
            ("id", AbiValue::U64(ids.assign())),
            ("author", AbiValue::Name(minted[message.author as usize])),
            (
                "permlink",
                AbiValue::Str(state.names.permalink(message.permlink)?.to_string()),
            ),
            ("parent", AbiValue::optional(parent)),
            ("parent_permlink", AbiValue::optional(parent_permlink)),
            ("created", AbiValue::Time(message.created)),
            ("net_rshares", AbiValue::I64(message.net_rshares)),
            ("body", AbiValue::Str(body)),
        ]))?;
    }
    writer.finish_section()?;
    writer.finalize()
}

/// Pins and blocks share the follow list, filtered by relation bit
fn write_follows(
    state: &LedgerState,
    path: &Path,
    scope: NewName,
    minted: &[NewName],
    pins: bool,
) -> Result<String> {
    let selected: Vec<_> = state
        .model
        .follows
        .iter()
        .filter(|f| if pins { f.is_pin() } else { f.is_block() })
        .collect();
    let (table, fields) = if pins {
        ("pin", ("pinner", "pinning"))
    } else {
        ("block", ("blocker", "blocking"))
    };

    let mut writer = SectionWriter::create(path, events_abi(), 1)?;
    writer.start_section(scope, table, table, selected.len() as u32)?;
    for follow in selected {
        writer.insert(&AbiValue::object(vec![
            (fields.0, AbiValue::Name(minted[follow.follower as usize])),
            (fields.1, AbiValue::Name(minted[follow.following as usize])),
        ]))?;
    }
    writer.finish_section()?;
    writer.finalize()
}

fn write_withdrawals(
    state: &LedgerState,
    path: &Path,
    scope: NewName,
    minted: &[NewName],
    params: &GenesisParams,
) -> Result<String> {
    let mut converters = EventConverters::new(state, params)?;
    let mut ids = IdAllocator::new("withdrawal", 1);

    let mut writer = SectionWriter::create(path, events_abi(), 1)?;
    writer.start_section(
        scope,
        "withdrawal",
        "withdrawal",
        state.model.savings_withdrawals.len() as u32,
    )?;
    for withdrawal in &state.model.savings_withdrawals {
        let quantity = converters.convert(state, withdrawal.amount)?;
        writer.insert(&AbiValue::object(vec![
            ("id", AbiValue::U64(ids.assign())),
            ("from", AbiValue::Name(minted[withdrawal.from as usize])),
            ("to", AbiValue::Name(minted[withdrawal.to as usize])),
            (
                "quantity",
                AbiValue::Asset(Asset::new(quantity as i64, params.new_symbol)),
            ),
            ("complete", AbiValue::Time(withdrawal.complete)),
            ("memo", AbiValue::Str(withdrawal.memo.clone())),
        ]))?;
    }
    writer.finish_section()?;
    writer.finalize()
}

/// Active delegations, then the expiring set winding down
fn write_delegations(
    state: &LedgerState,
    path: &Path,
    scope: NewName,
    minted: &[NewName],
    params: &GenesisParams,
) -> Result<String> {
    let mut converters = EventConverters::new(state, params)?;
    let mut ids = IdAllocator::new("delegation", 1);

    let mut writer = SectionWriter::create(path, events_abi(), 2)?;
    writer.start_section(
        scope,
        "delegation",
        "delegation",
        state.model.delegations.len() as u32,
    )?;
    for delegation in &state.model.delegations {
        let quantity = converters.convert(state, delegation.vesting_shares)?;
        writer.insert(&AbiValue::object(vec![
            ("id", AbiValue::U64(ids.assign())),
            (
                "delegator",
                AbiValue::Name(minted[delegation.delegator as usize]),
            ),
            (
                "delegatee",
                AbiValue::Name(minted[delegation.delegatee as usize]),
            ),
            (
                "quantity",
                AbiValue::Asset(Asset::new(quantity as i64, params.new_symbol)),
            ),
            ("interest_rate", AbiValue::U16(delegation.interest_rate)),
            ("min_time", AbiValue::Time(delegation.min_delegation_time)),
            ("payout_strategy", AbiValue::U8(delegation.payout_strategy)),
        ]))?;
    }
    writer.finish_section()?;

    writer.start_section(
        scope,
        "delegation.exp",
        "delegation.exp",
        state.model.expiring_delegations.len() as u32,
    )?;
    for expiring in &state.model.expiring_delegations {
        let quantity = converters.convert(state, expiring.vesting_shares)?;
        writer.insert(&AbiValue::object(vec![
            (
                "delegator",
                AbiValue::Name(minted[expiring.delegator as usize]),
            ),
            (
                "quantity",
                AbiValue::Asset(Asset::new(quantity as i64, params.new_symbol)),
            ),
            ("expiration", AbiValue::Time(expiring.expiration)),
        ]))?;
    }
    writer.finish_section()?;
    writer.finalize()
}
