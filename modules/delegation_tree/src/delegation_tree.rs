// SPDX-License-Identifier: Apache-2.0
// Copyright © 2026, Exodus team.

//! Converts the legacy direct-democracy-with-proxies voting model into the
//! new chain's layered agent/grant representation.
//!
//! Level 0 is a witness candidate: terminal, receives grants but originates
//! none. Levels 1 to 4 are voters; an account proxied through another sits
//! one level above its proxy. A chain that would push an account past level
//! 4 is fatal, as is any cycle (a cycle never reaches a fixed point, so it
//! trips the depth bound).

use std::collections::BTreeMap;

use anyhow::Result;
use serde::Serialize;
use tracing::info;

use exodus_common::{
    AccIdx, BasisPoints, InvariantError, FULL_PERCENT, MAX_PROXY_DEPTH,
};
use exodus_module_state_accumulator::LedgerState;

/// An account able to receive delegated weight in the new chain
#[derive(Debug, Clone, Serialize)]
pub struct Agent {
    pub account: AccIdx,
    /// 0 = witness (terminal), 1..=4 = voter
    pub level: u32,
    /// The account's own effective stake, in vesting share units
    pub own_stake: i64,
    /// Stake that arrived through proxy grants
    pub proxied: i64,
}

/// A directed, percent-weighted stake edge between two agents
#[derive(Debug, Clone, Serialize)]
pub struct Grant {
    pub from: AccIdx,
    pub to: AccIdx,
    /// Stake moved, in vesting share units
    pub amount: i64,
    /// Share of the granter's balance, basis points; grants from one
    /// account always sum to exactly 10000
    pub percent: BasisPoints,
}

/// The normalized agent/grant graph
#[derive(Debug, Default)]
pub struct StakeGraph {
    pub agents: Vec<Agent>,
    pub grants: Vec<Grant>,
}

/// Classify accounts into proxy levels and emit grants, highest level
/// first. Runs once the full vote graph is known; takes the state by
/// reference but is the only stage running at that point.
pub fn build_stake_graph(state: &LedgerState) -> Result<StakeGraph> {
    let levels = classify_levels(state)?;

    let mut agents: BTreeMap<AccIdx, Agent> = BTreeMap::new();
    for (idx, level) in &levels {
        let entry = state.model.account(*idx);
        agents.insert(
            *idx,
            Agent {
                account: *idx,
                level: *level,
                own_stake: entry.effective_vesting().max(0),
                proxied: 0,
            },
        );
    }

    let mut grants = Vec::new();

    // Highest (most indirect) levels first, so proxied weight has arrived
    // at an agent before that agent's own grant is emitted
    for level in (1..=MAX_PROXY_DEPTH).rev() {
        let at_level: Vec<AccIdx> = agents
            .values()
            .filter(|a| a.level == level)
            .map(|a| a.account)
            .collect();

        for idx in at_level {
            let entry = state.model.account(idx);
            let balance = agents[&idx].own_stake + agents[&idx].proxied;

            let resolved_proxy =
                entry.proxy.filter(|p| state.model.account(*p).present);
            if let Some(proxy) = resolved_proxy {
                // Entire effective balance moves to the proxy's agent at
                // whatever lower level it occupies
                grants.push(Grant {
                    from: idx,
                    to: proxy,
                    amount: balance,
                    percent: FULL_PERCENT,
                });
                if let Some(target) = agents.get_mut(&proxy) {
                    target.proxied += balance;
                }
            } else if level == 1 && !entry.witness_votes.is_empty() {
                split_direct_votes(state, idx, balance, &entry.witness_votes, &mut grants)?;
            }
        }
    }

    cross_check_witness_weights(state, &agents)?;

    let graph = StakeGraph {
        agents: agents.into_values().collect(),
        grants,
    };
    info!(
        agents = graph.agents.len(),
        grants = graph.grants.len(),
        "stake graph built"
    );
    Ok(graph)
}

/// Walk every account's proxy chain to a fixed point. Witnesses are level
/// 0; an account with no proxy is level 1; otherwise one above its proxy.
fn classify_levels(state: &LedgerState) -> Result<BTreeMap<AccIdx, u32>> {
    let mut levels = BTreeMap::new();

    for entry in &state.model.accounts {
        if !entry.present {
            continue;
        }
        let idx = entry.idx;

        if state.model.witnesses.contains_key(&idx) {
            levels.insert(idx, 0);
            continue;
        }

        // Count proxy hops to the chain's fixed point: no proxy, an
        // unresolved proxy, or a witness terminal
        let mut hops: u32 = 0;
        let mut cursor = idx;
        loop {
            let current = state.model.account(cursor);
            let Some(proxy) = current.proxy else {
                break;
            };
            if !state.model.account(proxy).present {
                break; // unresolved proxy: treat as the fixed point
            }
            hops += 1;
            if hops > MAX_PROXY_DEPTH - 1 {
                return Err(InvariantError::ProxyDepthExceeded {
                    account: state.names.account(idx)?.to_string(),
                    max: MAX_PROXY_DEPTH,
                }
                .into());
            }
            if state.model.witnesses.contains_key(&proxy) {
                break;
            }
            cursor = proxy;
        }

        levels.insert(idx, hops + 1);
    }

    Ok(levels)
}

/// Split a direct voter's balance evenly across its voted witnesses. The
/// last recipient absorbs the integer remainder of the amount and of the
/// percentage, so both sums are exact.
fn split_direct_votes(
    state: &LedgerState,
    voter: AccIdx,
    balance: i64,
    votes: &[AccIdx],
    grants: &mut Vec<Grant>,
) -> Result<()> {
    let n = votes.len() as i64;
    debug_assert!(n > 0);
    if votes.len() > exodus_common::MAX_WITNESS_VOTES {
        return Err(InvariantError::TooManyVotes {
            account: state.names.account(voter)?.to_string(),
            count: votes.len(),
            max: exodus_common::MAX_WITNESS_VOTES,
        }
        .into());
    }

    let share = balance / n;
    let amount_remainder = balance - share * n;
    let percent_share = (FULL_PERCENT as i64 / n) as BasisPoints;
    let percent_remainder = FULL_PERCENT - percent_share * n as BasisPoints;

    for (i, witness) in votes.iter().enumerate() {
        let last = i == votes.len() - 1;
        grants.push(Grant {
            from: voter,
            to: *witness,
            amount: if last { share + amount_remainder } else { share },
            percent: if last {
                percent_share + percent_remainder
            } else {
                percent_share
            },
        });
    }
    Ok(())
}

/// Independently recompute each witness's vote weight from the vote and
/// proxy graphs and compare with the weight the legacy node recorded.
///
/// Every unproxied account with votes contributes, witnesses voting for
/// themselves included; a proxied account's own votes are inert since its
/// weight travels through the proxy's votes instead.
fn cross_check_witness_weights(
    state: &LedgerState,
    agents: &BTreeMap<AccIdx, Agent>,
) -> Result<()> {
    let mut recomputed: BTreeMap<AccIdx, u64> = BTreeMap::new();

    for agent in agents.values() {
        let entry = state.model.account(agent.account);
        if entry.witness_votes.is_empty() {
            continue;
        }
        if entry.proxy.is_some_and(|p| state.model.account(p).present) {
            continue;
        }
        // A direct vote carries the voter's full weight, proxied stake
        // included, to every witness it names
        let weight = (agent.own_stake + agent.proxied).max(0) as u64;
        for witness in &entry.witness_votes {
            *recomputed.entry(*witness).or_insert(0) += weight;
        }
    }

    for witness in state.model.witnesses.values() {
        let recomputed_weight = recomputed.get(&witness.owner).copied().unwrap_or(0);
        if witness.recorded_weight != recomputed_weight {
            return Err(InvariantError::VoteWeightMismatch {
                witness: state.names.account(witness.owner)?.to_string(),
                recorded: witness.recorded_weight,
                recomputed: recomputed_weight,
            }
            .into());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use exodus_common::{Asset, CurrencySet, Symbol};
    use exodus_module_snapshot_reader::SnapshotReader;
    use exodus_module_state_accumulator::Accumulator;
    use exodus_test_utils::{AccountFixture, SnapshotBuilder};

    fn currencies() -> CurrencySet {
        CurrencySet {
            primary: Symbol::new(3, "GLS"),
            secondary: Symbol::new(3, "GBG"),
            vesting: Symbol::new(6, "GESTS"),
        }
    }

    fn accumulate(builder: &SnapshotBuilder) -> LedgerState {
        let dir = tempfile::tempdir().unwrap();
        let path = builder.write_to(dir.path(), "snapshot.bin").unwrap();
        let mut reader = SnapshotReader::open(&path, None).unwrap();
        let maps = reader.read_maps().unwrap();
        let mut acc = Accumulator::new(maps, currencies(), 30);
        while let Some(decoded) = reader.next_record().unwrap() {
            acc.accept(decoded).unwrap();
        }
        acc.into_state().unwrap()
    }

    fn builder_with_globals() -> SnapshotBuilder {
        let c = currencies();
        let mut builder = SnapshotBuilder::new();
        builder.global_properties(
            1,
            Asset::zero(c.primary),
            Asset::zero(c.secondary),
            Asset::zero(c.primary),
            Asset::zero(c.vesting),
        );
        builder
    }

    fn voter(builder: &mut SnapshotBuilder, idx: u32, stake: i64, proxy: Option<u32>) {
        let c = currencies();
        let mut fixture = AccountFixture::new(idx, c.primary, c.secondary, c.vesting);
        fixture.vesting_shares = Asset::new(stake, c.vesting);
        fixture.proxy = proxy;
        builder.account(&fixture);
    }

    #[test]
    fn direct_vote_split_is_exact() {
        let mut builder = builder_with_globals();
        let alice = builder.account_name("alice");
        let witnesses: Vec<u32> =
            (0..7).map(|i| builder.account_name(&format!("witness{i}"))).collect();

        // 1000 does not divide by 7: remainder lands on the last grant
        voter(&mut builder, alice, 1000, None);
        for w in &witnesses {
            voter(&mut builder, *w, 0, None);
            builder.witness(*w, "https://example.com", 1000);
            builder.witness_vote(alice, *w);
        }

        // Fix the declared vesting total so accumulation stays consistent
        let state = accumulate(&builder);
        let graph = build_stake_graph(&state).unwrap();

        let from_alice: Vec<&Grant> =
            graph.grants.iter().filter(|g| g.from == alice).collect();
        assert_eq!(from_alice.len(), 7);
        assert_eq!(from_alice.iter().map(|g| g.amount).sum::<i64>(), 1000);
        assert_eq!(
            from_alice.iter().map(|g| g.percent as u32).sum::<u32>(),
            FULL_PERCENT as u32
        );
        // Everyone but the last gets the even share
        assert!(from_alice[..6].iter().all(|g| g.amount == 142));
        assert_eq!(from_alice[6].amount, 1000 - 142 * 6);
    }

    #[test]
    fn proxied_account_emits_single_full_grant() {
        let mut builder = builder_with_globals();
        let witness = builder.account_name("witone");
        let direct = builder.account_name("direct");
        let proxied = builder.account_name("proxied");

        voter(&mut builder, witness, 0, None);
        voter(&mut builder, direct, 600, None);
        voter(&mut builder, proxied, 400, Some(direct));
        // Direct voter carries its own stake plus the proxied 400
        builder.witness(witness, "https://example.com", 1000);
        builder.witness_vote(direct, witness);

        let state = accumulate(&builder);
        let graph = build_stake_graph(&state).unwrap();

        let proxy_grant = graph.grants.iter().find(|g| g.from == proxied).unwrap();
        assert_eq!(proxy_grant.to, direct);
        assert_eq!(proxy_grant.amount, 400);
        assert_eq!(proxy_grant.percent, FULL_PERCENT);

        let vote_grant = graph.grants.iter().find(|g| g.from == direct).unwrap();
        assert_eq!(vote_grant.amount, 1000);
    }

    #[test]
    fn depth_five_chain_is_fatal() {
        let mut builder = builder_with_globals();
        let indices: Vec<u32> =
            (0..6).map(|i| builder.account_name(&format!("chain{i}"))).collect();

        // chain0 <- chain1 <- ... <- chain5: five proxy hops
        voter(&mut builder, indices[0], 10, None);
        for i in 1..6 {
            voter(&mut builder, indices[i], 10, Some(indices[i - 1]));
        }

        let state = accumulate(&builder);
        let err = build_stake_graph(&state).unwrap_err();
        assert!(err.to_string().contains("depth"), "{err}");
    }

    #[test]
    fn depth_four_levels_are_accepted() {
        let mut builder = builder_with_globals();
        let indices: Vec<u32> =
            (0..4).map(|i| builder.account_name(&format!("chain{i}"))).collect();

        voter(&mut builder, indices[0], 10, None);
        for i in 1..4 {
            voter(&mut builder, indices[i], 10, Some(indices[i - 1]));
        }

        let state = accumulate(&builder);
        let graph = build_stake_graph(&state).unwrap();
        let top = graph.agents.iter().find(|a| a.account == indices[3]).unwrap();
        assert_eq!(top.level, 4);
    }

    #[test]
    fn self_voting_witness_weight_is_counted() {
        let mut builder = builder_with_globals();
        let steward = builder.account_name("steward");
        let alice = builder.account_name("alice");

        // The witness votes for itself with its own 500000, on top of
        // alice's direct 300000
        voter(&mut builder, steward, 500_000, None);
        voter(&mut builder, alice, 300_000, None);
        builder.witness(steward, "https://example.com", 800_000);
        builder.witness_vote(steward, steward);
        builder.witness_vote(alice, steward);

        let state = accumulate(&builder);
        let graph = build_stake_graph(&state).unwrap();
        let agent = graph.agents.iter().find(|a| a.account == steward).unwrap();
        assert_eq!(agent.level, 0);
    }

    #[test]
    fn witness_weight_mismatch_is_fatal() {
        let mut builder = builder_with_globals();
        let witness = builder.account_name("witone");
        let alice = builder.account_name("alice");

        voter(&mut builder, witness, 0, None);
        voter(&mut builder, alice, 500, None);
        // Legacy node recorded 9999 but the votes only carry 500
        builder.witness(witness, "https://example.com", 9999);
        builder.witness_vote(alice, witness);

        let state = accumulate(&builder);
        let err = build_stake_graph(&state).unwrap_err();
        assert!(err.to_string().contains("cross-check"), "{err}");
    }
}
