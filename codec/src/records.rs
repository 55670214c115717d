// SPDX-License-Identifier: Apache-2.0
// Copyright © 2026, Exodus team.

//! Tagged-union record types for the legacy snapshot.
//!
//! Every record kind has a u32 type tag; a section header declares the tag
//! and how many records of it follow. Decoding reads the tag first, then the
//! payload specific to that tag. Unknown tags are rejected, never skipped:
//! the record framing carries no per-record length, so skipping would
//! desynchronise the stream.
//!
//! Large free-text payloads (account JSON metadata, comment bodies) are not
//! decoded on the streaming pass: their byte span is recorded as a
//! [`DeferredPayload`] and read back later through a separate handle.

use serde::Serialize;

use exodus_common::{AccIdx, Asset, BlockNum, FormatError, PermIdx, Timestamp};

use crate::cursor::Cursor;

/// Byte span of a payload skipped on the streaming pass
#[derive(Debug, Clone, Copy, Serialize)]
pub struct DeferredPayload {
    /// Absolute offset of the payload bytes in the snapshot file
    pub offset: u64,
    /// Payload length in bytes
    pub len: u32,
}

/// A key or account entry in an authority, with its voting weight
#[derive(Debug, Clone, Serialize)]
pub struct AuthorityEntry<K> {
    pub key: K,
    pub weight: u16,
}

/// A weighted-threshold authority
#[derive(Debug, Clone, Serialize)]
pub struct Authority {
    pub weight_threshold: u32,
    /// Public keys (33 raw bytes each) with weights
    pub keys: Vec<AuthorityEntry<Vec<u8>>>,
    /// Other accounts (by acc_idx) with weights
    pub accounts: Vec<AuthorityEntry<AccIdx>>,
}

/// Chain-wide totals declared by the legacy node at export time
#[derive(Debug, Clone, Serialize)]
pub struct GlobalPropertiesRecord {
    pub head_block_num: BlockNum,
    pub time: Timestamp,
    /// Declared liquid total of the primary currency, across all categories
    pub total_primary: Asset,
    /// Declared liquid total of the secondary currency
    pub total_secondary: Asset,
    /// Primary currency backing the vesting pool
    pub total_vesting_fund: Asset,
    /// Declared total of vesting shares
    pub total_vesting_shares: Asset,
    /// Legacy savings interest rate, basis points
    pub interest_rate: u16,
}

#[derive(Debug, Clone, Serialize)]
pub struct AccountRecord {
    /// This account's own index in the account name map
    pub idx: AccIdx,
    pub created: Timestamp,
    pub balance: Asset,
    pub savings_balance: Asset,
    pub secondary_balance: Asset,
    pub savings_secondary_balance: Asset,
    pub vesting_shares: Asset,
    pub delegated_vesting: Asset,
    pub received_vesting: Asset,
    /// Account whose votes this account defers to, if any
    pub proxy: Option<AccIdx>,
    pub recovery: Option<AccIdx>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AccountAuthorityRecord {
    pub account: AccIdx,
    pub owner: Authority,
    pub active: Authority,
    pub posting: Authority,
}

#[derive(Debug, Clone, Serialize)]
pub struct AccountMetadataRecord {
    pub account: AccIdx,
    /// JSON metadata, skipped on first pass
    pub json: DeferredPayload,
}

#[derive(Debug, Clone, Serialize)]
pub struct WitnessRecord {
    pub owner: AccIdx,
    pub created: Timestamp,
    pub url: String,
    /// Vote weight accumulated by the legacy node
    pub total_weight: u64,
    /// Block signing key, 33 raw bytes
    pub signing_key: Vec<u8>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WitnessVoteRecord {
    pub account: AccIdx,
    pub witness: AccIdx,
}

/// Shuffle parameters for the legacy witness schedule. Decoded so the stream
/// stays aligned, ignored by the accumulator.
#[derive(Debug, Clone, Serialize)]
pub struct WitnessScheduleRecord {
    pub max_voted_witnesses: u16,
    pub max_miner_witnesses: u16,
    pub max_runner_witnesses: u16,
    pub hardfork_required_witnesses: u16,
}

#[derive(Debug, Clone, Serialize)]
pub struct VestingDelegationRecord {
    pub delegator: AccIdx,
    pub delegatee: AccIdx,
    pub vesting_shares: Asset,
    pub min_delegation_time: Timestamp,
    /// Share of delegatee earnings returned to the delegator, basis points
    pub interest_rate: u16,
    /// 0 = to delegator, 1 = to delegatee, 2 = restake
    pub payout_strategy: u8,
}

#[derive(Debug, Clone, Serialize)]
pub struct VestingDelegationExpirationRecord {
    pub delegator: AccIdx,
    pub vesting_shares: Asset,
    pub expiration: Timestamp,
}

#[derive(Debug, Clone, Serialize)]
pub struct WithdrawRouteRecord {
    pub from: AccIdx,
    pub to: AccIdx,
    /// Share routed, basis points; only 10000 (100%) routes are migrated
    pub percent: u16,
    pub auto_stake: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct LimitOrderRecord {
    pub seller: AccIdx,
    pub order_id: u32,
    /// Amount still for sale, in sell_price_base smallest units
    pub for_sale: i64,
    pub sell_price_base: Asset,
    pub sell_price_quote: Asset,
    pub created: Timestamp,
    pub expiration: Timestamp,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConversionRequestRecord {
    pub owner: AccIdx,
    pub request_id: u32,
    pub amount: Asset,
    pub conversion_date: Timestamp,
}

#[derive(Debug, Clone, Serialize)]
pub struct EscrowRecord {
    pub escrow_id: u32,
    pub from: AccIdx,
    pub to: AccIdx,
    pub agent: AccIdx,
    pub primary_balance: Asset,
    pub secondary_balance: Asset,
    pub pending_fee: Asset,
    pub ratification_deadline: Timestamp,
}

#[derive(Debug, Clone, Serialize)]
pub struct SavingsWithdrawalRecord {
    pub from: AccIdx,
    pub to: AccIdx,
    pub request_id: u32,
    pub amount: Asset,
    pub complete: Timestamp,
    pub memo: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommentRecord {
    pub author: AccIdx,
    pub permlink: PermIdx,
    pub parent: Option<(AccIdx, PermIdx)>,
    pub created: Timestamp,
    pub net_rshares: i64,
    /// Body text, skipped on first pass
    pub body: DeferredPayload,
}

#[derive(Debug, Clone, Serialize)]
pub struct FollowRecord {
    pub follower: AccIdx,
    pub following: AccIdx,
    /// Bit 0 = pin (follow), bit 1 = block (ignore)
    pub relation: u8,
}

impl FollowRecord {
    pub fn is_pin(&self) -> bool {
        self.relation & 0x01 != 0
    }

    pub fn is_block(&self) -> bool {
        self.relation & 0x02 != 0
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TransferEventRecord {
    pub block_num: BlockNum,
    pub from: AccIdx,
    pub to: AccIdx,
    pub amount: Asset,
    pub memo: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthorRewardEventRecord {
    pub block_num: BlockNum,
    pub author: AccIdx,
    pub permlink: PermIdx,
    pub primary_payout: Asset,
    pub secondary_payout: Asset,
    pub vesting_payout: Asset,
}

#[derive(Debug, Clone, Serialize)]
pub struct CurationRewardEventRecord {
    pub block_num: BlockNum,
    pub curator: AccIdx,
    pub reward: Asset,
    pub author: AccIdx,
    pub permlink: PermIdx,
}

/// One decoded snapshot record
#[derive(Debug, Clone, Serialize)]
pub enum Record {
    GlobalProperties(GlobalPropertiesRecord),
    Account(AccountRecord),
    AccountAuthority(AccountAuthorityRecord),
    AccountMetadata(AccountMetadataRecord),
    Witness(WitnessRecord),
    WitnessVote(WitnessVoteRecord),
    WitnessSchedule(WitnessScheduleRecord),
    VestingDelegation(VestingDelegationRecord),
    VestingDelegationExpiration(VestingDelegationExpirationRecord),
    WithdrawRoute(WithdrawRouteRecord),
    LimitOrder(LimitOrderRecord),
    ConversionRequest(ConversionRequestRecord),
    Escrow(EscrowRecord),
    SavingsWithdrawal(SavingsWithdrawalRecord),
    Comment(CommentRecord),
    Follow(FollowRecord),
    TransferEvent(TransferEventRecord),
    AuthorRewardEvent(AuthorRewardEventRecord),
    CurationRewardEvent(CurationRewardEventRecord),
}

/// Type tags as they appear in section headers
pub mod tags {
    pub const GLOBAL_PROPERTIES: u32 = 1;
    pub const ACCOUNT: u32 = 2;
    pub const ACCOUNT_AUTHORITY: u32 = 3;
    pub const ACCOUNT_METADATA: u32 = 4;
    pub const WITNESS: u32 = 5;
    pub const WITNESS_VOTE: u32 = 6;
    pub const WITNESS_SCHEDULE: u32 = 7;
    pub const VESTING_DELEGATION: u32 = 8;
    pub const VESTING_DELEGATION_EXPIRATION: u32 = 9;
    pub const WITHDRAW_ROUTE: u32 = 10;
    pub const LIMIT_ORDER: u32 = 11;
    pub const CONVERSION_REQUEST: u32 = 12;
    pub const ESCROW: u32 = 13;
    pub const SAVINGS_WITHDRAWAL: u32 = 14;
    pub const COMMENT: u32 = 15;
    pub const FOLLOW: u32 = 16;
    pub const TRANSFER_EVENT: u32 = 17;
    pub const AUTHOR_REWARD_EVENT: u32 = 18;
    pub const CURATION_REWARD_EVENT: u32 = 19;
}

fn read_authority(cur: &mut Cursor) -> Result<Authority, FormatError> {
    let weight_threshold = cur.read_u32()?;
    let keys = cur.read_vec(|c| {
        let key = c.read_bytes(33, "public key")?.to_vec();
        let weight = c.read_u16()?;
        Ok(AuthorityEntry { key, weight })
    })?;
    let accounts = cur.read_vec(|c| {
        let key = c.read_u32()?;
        let weight = c.read_u16()?;
        Ok(AuthorityEntry { key, weight })
    })?;
    Ok(Authority {
        weight_threshold,
        keys,
        accounts,
    })
}

impl Record {
    /// Decode one record of the given type tag from the cursor. The tag has
    /// already been read from the section header.
    pub fn decode(tag: u32, cur: &mut Cursor) -> Result<Record, FormatError> {
        let record = match tag {
            tags::GLOBAL_PROPERTIES => Record::GlobalProperties(GlobalPropertiesRecord {
                head_block_num: cur.read_u32()?,
                time: cur.read_u32()?,
                total_primary: cur.read_asset()?,
                total_secondary: cur.read_asset()?,
                total_vesting_fund: cur.read_asset()?,
                total_vesting_shares: cur.read_asset()?,
                interest_rate: cur.read_u16()?,
            }),
            tags::ACCOUNT => Record::Account(AccountRecord {
                idx: cur.read_u32()?,
                created: cur.read_u32()?,
                balance: cur.read_asset()?,
                savings_balance: cur.read_asset()?,
                secondary_balance: cur.read_asset()?,
                savings_secondary_balance: cur.read_asset()?,
                vesting_shares: cur.read_asset()?,
                delegated_vesting: cur.read_asset()?,
                received_vesting: cur.read_asset()?,
                proxy: cur.read_optional(|c| c.read_u32())?,
                recovery: cur.read_optional(|c| c.read_u32())?,
            }),
            tags::ACCOUNT_AUTHORITY => Record::AccountAuthority(AccountAuthorityRecord {
                account: cur.read_u32()?,
                owner: read_authority(cur)?,
                active: read_authority(cur)?,
                posting: read_authority(cur)?,
            }),
            tags::ACCOUNT_METADATA => {
                let account = cur.read_u32()?;
                let (offset, len) = cur.skip_payload()?;
                Record::AccountMetadata(AccountMetadataRecord {
                    account,
                    json: DeferredPayload { offset, len },
                })
            }
            tags::WITNESS => Record::Witness(WitnessRecord {
                owner: cur.read_u32()?,
                created: cur.read_u32()?,
                url: cur.read_string()?,
                total_weight: cur.read_u64()?,
                signing_key: cur.read_bytes(33, "signing key")?.to_vec(),
            }),
            tags::WITNESS_VOTE => Record::WitnessVote(WitnessVoteRecord {
                account: cur.read_u32()?,
                witness: cur.read_u32()?,
            }),
            tags::WITNESS_SCHEDULE => Record::WitnessSchedule(WitnessScheduleRecord {
                max_voted_witnesses: cur.read_u16()?,
                max_miner_witnesses: cur.read_u16()?,
                max_runner_witnesses: cur.read_u16()?,
                hardfork_required_witnesses: cur.read_u16()?,
            }),
            tags::VESTING_DELEGATION => Record::VestingDelegation(VestingDelegationRecord {
                delegator: cur.read_u32()?,
                delegatee: cur.read_u32()?,
                vesting_shares: cur.read_asset()?,
                min_delegation_time: cur.read_u32()?,
                interest_rate: cur.read_u16()?,
                payout_strategy: cur.read_u8()?,
            }),
            tags::VESTING_DELEGATION_EXPIRATION => {
                Record::VestingDelegationExpiration(VestingDelegationExpirationRecord {
                    delegator: cur.read_u32()?,
                    vesting_shares: cur.read_asset()?,
                    expiration: cur.read_u32()?,
                })
            }
            tags::WITHDRAW_ROUTE => Record::WithdrawRoute(WithdrawRouteRecord {
                from: cur.read_u32()?,
                to: cur.read_u32()?,
                percent: cur.read_u16()?,
                auto_stake: cur.read_bool()?,
            }),
            tags::LIMIT_ORDER => Record::LimitOrder(LimitOrderRecord {
                seller: cur.read_u32()?,
                order_id: cur.read_u32()?,
                for_sale: cur.read_i64()?,
                sell_price_base: cur.read_asset()?,
                sell_price_quote: cur.read_asset()?,
                created: cur.read_u32()?,
                expiration: cur.read_u32()?,
            }),
            tags::CONVERSION_REQUEST => Record::ConversionRequest(ConversionRequestRecord {
                owner: cur.read_u32()?,
                request_id: cur.read_u32()?,
                amount: cur.read_asset()?,
                conversion_date: cur.read_u32()?,
            }),
            tags::ESCROW => Record::Escrow(EscrowRecord {
                escrow_id: cur.read_u32()?,
                from: cur.read_u32()?,
                to: cur.read_u32()?,
                agent: cur.read_u32()?,
                primary_balance: cur.read_asset()?,
                secondary_balance: cur.read_asset()?,
                pending_fee: cur.read_asset()?,
                ratification_deadline: cur.read_u32()?,
            }),
            tags::SAVINGS_WITHDRAWAL => Record::SavingsWithdrawal(SavingsWithdrawalRecord {
                from: cur.read_u32()?,
                to: cur.read_u32()?,
                request_id: cur.read_u32()?,
                amount: cur.read_asset()?,
                complete: cur.read_u32()?,
                memo: cur.read_string()?,
            }),
            tags::COMMENT => {
                let author = cur.read_u32()?;
                let permlink = cur.read_u32()?;
                let parent = cur.read_optional(|c| {
                    let author = c.read_u32()?;
                    let permlink = c.read_u32()?;
                    Ok((author, permlink))
                })?;
                let created = cur.read_u32()?;
                let net_rshares = cur.read_i64()?;
                let (offset, len) = cur.skip_payload()?;
                Record::Comment(CommentRecord {
                    author,
                    permlink,
                    parent,
                    created,
                    net_rshares,
                    body: DeferredPayload { offset, len },
                })
            }
            tags::FOLLOW => Record::Follow(FollowRecord {
                follower: cur.read_u32()?,
                following: cur.read_u32()?,
                relation: cur.read_u8()?,
            }),
            tags::TRANSFER_EVENT => Record::TransferEvent(TransferEventRecord {
                block_num: cur.read_u32()?,
                from: cur.read_u32()?,
                to: cur.read_u32()?,
                amount: cur.read_asset()?,
                memo: cur.read_string()?,
            }),
            tags::AUTHOR_REWARD_EVENT => Record::AuthorRewardEvent(AuthorRewardEventRecord {
                block_num: cur.read_u32()?,
                author: cur.read_u32()?,
                permlink: cur.read_u32()?,
                primary_payout: cur.read_asset()?,
                secondary_payout: cur.read_asset()?,
                vesting_payout: cur.read_asset()?,
            }),
            tags::CURATION_REWARD_EVENT => Record::CurationRewardEvent(CurationRewardEventRecord {
                block_num: cur.read_u32()?,
                curator: cur.read_u32()?,
                reward: cur.read_asset()?,
                author: cur.read_u32()?,
                permlink: cur.read_u32()?,
            }),
            tag => {
                return Err(FormatError::UnknownTypeTag {
                    tag,
                    offset: cur.pos(),
                })
            }
        };
        Ok(record)
    }

    /// Human-readable kind name, for error context
    pub fn kind_name(&self) -> &'static str {
        match self {
            Record::GlobalProperties(_) => "global-properties",
            Record::Account(_) => "account",
            Record::AccountAuthority(_) => "account-authority",
            Record::AccountMetadata(_) => "account-metadata",
            Record::Witness(_) => "witness",
            Record::WitnessVote(_) => "witness-vote",
            Record::WitnessSchedule(_) => "witness-schedule",
            Record::VestingDelegation(_) => "vesting-delegation",
            Record::VestingDelegationExpiration(_) => "vesting-delegation-expiration",
            Record::WithdrawRoute(_) => "withdraw-route",
            Record::LimitOrder(_) => "limit-order",
            Record::ConversionRequest(_) => "conversion-request",
            Record::Escrow(_) => "escrow",
            Record::SavingsWithdrawal(_) => "savings-withdrawal",
            Record::Comment(_) => "comment",
            Record::Follow(_) => "follow",
            Record::TransferEvent(_) => "transfer-event",
            Record::AuthorRewardEvent(_) => "author-reward-event",
            Record::CurationRewardEvent(_) => "curation-reward-event",
        }
    }

    /// Per-block sequence number, for record kinds exported from the
    /// operation history. Used by the reader's last-block cutoff.
    pub fn block_num(&self) -> Option<BlockNum> {
        match self {
            Record::TransferEvent(r) => Some(r.block_num),
            Record::AuthorRewardEvent(r) => Some(r.block_num),
            Record::CurationRewardEvent(r) => Some(r.block_num),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_tag_is_rejected() {
        let data = vec![0u8; 64];
        let mut cur = Cursor::new(&data, 0);
        match Record::decode(999, &mut cur) {
            Err(FormatError::UnknownTypeTag { tag, .. }) => assert_eq!(tag, 999),
            other => panic!("expected unknown tag error, got {other:?}"),
        }
    }

    #[test]
    fn decode_witness_vote() {
        let mut data = Vec::new();
        data.extend_from_slice(&7u32.to_le_bytes());
        data.extend_from_slice(&3u32.to_le_bytes());
        let mut cur = Cursor::new(&data, 0);
        match Record::decode(tags::WITNESS_VOTE, &mut cur).unwrap() {
            Record::WitnessVote(vote) => {
                assert_eq!(vote.account, 7);
                assert_eq!(vote.witness, 3);
            }
            other => panic!("wrong record kind {}", other.kind_name()),
        }
    }

    #[test]
    fn comment_body_is_deferred() {
        let mut data = Vec::new();
        data.extend_from_slice(&1u32.to_le_bytes()); // author
        data.extend_from_slice(&2u32.to_le_bytes()); // permlink
        data.push(0); // no parent
        data.extend_from_slice(&1234u32.to_le_bytes()); // created
        data.extend_from_slice(&99i64.to_le_bytes()); // net_rshares
        data.extend_from_slice(&5u32.to_le_bytes()); // body length
        data.extend_from_slice(b"hello");

        let mut cur = Cursor::new(&data, 0);
        let Record::Comment(comment) = Record::decode(tags::COMMENT, &mut cur).unwrap() else {
            panic!("expected comment");
        };
        assert_eq!(comment.body.len, 5);
        assert_eq!(&data[comment.body.offset as usize..][..5], b"hello");
        assert!(cur.at_end());
    }

    #[test]
    fn truncated_record_fails_closed() {
        let data = vec![0u8; 6];
        let mut cur = Cursor::new(&data, 0);
        assert!(Record::decode(tags::ACCOUNT, &mut cur).is_err());
    }
}
