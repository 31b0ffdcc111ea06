//! Provenance discovery: recursively chains per-transaction probability
//! solutions across ancestor transactions.
//!
//! The walk builds a tree of hubs, one hub per traced output. Hubs live in
//! an arena and reference each other through integer handles; the only
//! mutable state during construction is the cursor bookkeeping that drives
//! the backtracking.

use super::combinations::{round8, to_atoms};
use super::error::AnalyzerError;
use super::probability::funds_flow_probability;
use super::solver::{extract_amounts, transaction_funds_flow};
use super::types::{FlowProbability, Hub, InputSets, MatchedSet};
use super::Cancel;
use crate::rpc::types::Transaction;
use crate::rpc::TxSource;

type HubId = usize;

#[derive(Debug, Default)]
struct HubNode {
    tx_hash: String,
    vout: u32,
    amount: f64,
    address: String,
    level_probability: f64,
    path_probability: f64,
    matched: Vec<SetNode>,
    set_cursor: usize,
    expanded: bool,
}

#[derive(Debug, Default)]
struct SetNode {
    inputs: Vec<HubId>,
    level_percent: f64,
    status_msg: String,
    hub_cursor: usize,
}

#[derive(Debug, Default)]
struct HubArena {
    hubs: Vec<HubNode>,
}

impl HubArena {
    fn push(&mut self, hub: HubNode) -> HubId {
        self.hubs.push(hub);
        self.hubs.len() - 1
    }

    // Resolves a hub subtree into its owned, serializable form,
    // accumulating the path share of inputs top-down.
    fn resolve(&self, id: HubId, path_percent: f64) -> Hub {
        let node = &self.hubs[id];
        Hub {
            address: node.address.clone(),
            amount: node.amount,
            tx_hash: node.tx_hash.clone(),
            path_probability: node.path_probability,
            level_probability: node.level_probability,
            vout: node.vout,
            matched: node
                .matched
                .iter()
                .map(|set| {
                    let set_path_percent = round8(path_percent * set.level_percent);
                    MatchedSet {
                        inputs: set
                            .inputs
                            .iter()
                            .map(|&input| self.resolve(input, set_path_percent))
                            .collect(),
                        level_percent_of_inputs: set.level_percent,
                        path_percent_of_inputs: set_path_percent,
                        status_msg: set.status_msg.clone(),
                    }
                })
                .collect(),
        }
    }
}

/// Fetches a transaction from the node and returns it in the normalized
/// shape. An empty hash yields an empty transaction, the terminal marker
/// of a provenance path.
pub fn retrieve_tx_data(
    source: &dyn TxSource,
    tx_hash: &str,
    cancel: &Cancel,
) -> Result<Transaction, AnalyzerError> {
    if tx_hash.is_empty() {
        return Ok(Transaction::default());
    }

    if cancel.is_cancelled() {
        return Err(AnalyzerError::Cancelled);
    }

    log::info!("Retrieving data for transaction: {tx_hash}");

    Ok(source.transaction(tx_hash)?)
}

/// Returns the per-output linking probabilities of a transaction along
/// with its normalized data.
pub fn retrieve_tx_probability(
    source: &dyn TxSource,
    tx_hash: &str,
    endpoint_cutoff: usize,
    cancel: &Cancel,
) -> Result<(Vec<FlowProbability>, Transaction), AnalyzerError> {
    let tx = retrieve_tx_data(source, tx_hash, cancel)?;

    let solutions = transaction_funds_flow(&tx, endpoint_cutoff, cancel)?;
    let (inputs, outputs) = extract_amounts(&tx);
    let probability = funds_flow_probability(&solutions, &inputs, &outputs);

    Ok((probability, tx))
}

/// Discovers the funds-flow paths leading into the outputs of the given
/// transaction, up to `depth` ancestor levels. With an output index only
/// that output is traced; an index beyond the last output clamps to the
/// last one. Returns the root hubs and the transaction's block time.
pub fn chain_discovery(
    source: &dyn TxSource,
    tx_hash: &str,
    output_index: Option<usize>,
    depth: usize,
    endpoint_cutoff: usize,
    cancel: &Cancel,
) -> Result<(Vec<Hub>, i64), AnalyzerError> {
    let tx = retrieve_tx_data(source, tx_hash, cancel)?;
    if tx.outpoints.is_empty() {
        return Err(AnalyzerError::InvalidTransaction(
            "chain discovery needs a transaction with outputs",
        ));
    }

    let outpoints: Vec<_> = match output_index {
        Some(index) => {
            let index = index.min(tx.outpoints.len() - 1);
            vec![tx.outpoints[index].clone()]
        }
        None => tx.outpoints.clone(),
    };

    let mut hubs_chain = Vec::with_capacity(outpoints.len());

    for outpoint in outpoints {
        let mut arena = HubArena::default();
        let root = arena.push(HubNode {
            tx_hash: tx.tx_id.clone(),
            vout: outpoint.index,
            amount: round8(outpoint.value),
            address: outpoint.addresses.first().cloned().unwrap_or_default(),
            ..Default::default()
        });

        handle_depths(&mut arena, source, root, depth, endpoint_cutoff, cancel)?;

        hubs_chain.push(arena.resolve(root, 1.0));
    }

    log::info!("Finished auto chain(s) discovery and appending all needed data");

    Ok((hubs_chain, tx.block_time))
}

// Depth-first walk over the hub tree. Every visited hub is expanded one
// ancestor level; a path terminates on a deterministic link, a missing
// predecessor or an exhausted depth budget, after which the cursors
// backtrack to the next unprocessed input hub.
fn handle_depths(
    arena: &mut HubArena,
    source: &dyn TxSource,
    root: HubId,
    depth: usize,
    endpoint_cutoff: usize,
    cancel: &Cancel,
) -> Result<(), AnalyzerError> {
    let mut stack: Vec<HubId> = Vec::new();
    let mut current = root;
    let mut count = 1usize;
    let mut total_odds = 1.0f64;

    loop {
        expand_hub(arena, source, current, endpoint_cutoff, cancel)?;

        let level = arena.hubs[current].level_probability;
        if level > 0.0 {
            total_odds = round8(total_odds * level);
            arena.hubs[current].path_probability = total_odds;
        }

        let terminal = level == 1.0
            || count == depth
            || arena.hubs[current].tx_hash.is_empty()
            || arena.hubs[current].matched.is_empty();

        if terminal {
            if level > 0.0 {
                total_odds = round8(total_odds / level);
            }

            // Backtrack till we find an unprocessed hub.
            loop {
                count = count.saturating_sub(1);
                current = match stack.pop() {
                    Some(hub) => hub,
                    None => return Ok(()),
                };

                let hub = &mut arena.hubs[current];
                let set = hub.set_cursor;
                if hub.matched[set].hub_cursor + 1 < hub.matched[set].inputs.len() {
                    hub.matched[set].hub_cursor += 1;
                    break;
                } else if set + 1 < hub.matched.len() {
                    hub.set_cursor += 1;
                    break;
                }

                if stack.is_empty() {
                    return Ok(());
                }
            }
        }

        stack.push(current);
        let hub = &arena.hubs[current];
        let set = &hub.matched[hub.set_cursor];
        current = set.inputs[set.hub_cursor];
        count += 1;
    }
}

// Resolves one hub's output a single ancestor level up: runs the engine on
// the hub's transaction and reconstructs every probable input set of the
// matching output amount into hubs of predecessor outputs.
fn expand_hub(
    arena: &mut HubArena,
    source: &dyn TxSource,
    id: HubId,
    endpoint_cutoff: usize,
    cancel: &Cancel,
) -> Result<(), AnalyzerError> {
    if arena.hubs[id].tx_hash.is_empty() || arena.hubs[id].expanded {
        return Ok(());
    }
    arena.hubs[id].expanded = true;

    let tx_hash = arena.hubs[id].tx_hash.clone();
    let (probability, tx) = retrieve_tx_probability(source, &tx_hash, endpoint_cutoff, cancel)?;

    let amount_key = to_atoms(arena.hubs[id].amount);
    for item in &probability {
        if to_atoms(item.output_amount) != amount_key {
            continue;
        }
        for entry in &item.probable_inputs {
            let set = build_set(arena, source, &tx, entry, cancel)?;
            arena.hubs[id].level_probability = item.linking_probability;
            arena.hubs[id].matched.push(set);
        }
    }

    Ok(())
}

// The probable input sets only carry amounts; reconstruct the upstream
// hubs by claiming matching inputs of the transaction and resolving each
// one's paying address from its predecessor output.
fn build_set(
    arena: &mut HubArena,
    source: &dyn TxSource,
    tx: &Transaction,
    matched_inputs: &InputSets,
    cancel: &Cancel,
) -> Result<SetNode, AnalyzerError> {
    let mut available = tx.inpoints.clone();
    let mut set = SetNode {
        level_percent: matched_inputs.percent_of_inputs,
        status_msg: matched_inputs.status_msg.clone(),
        ..Default::default()
    };

    for item in &matched_inputs.set {
        for _ in 0..item.possible_inputs.max(1) {
            let position = available
                .iter()
                .position(|input| to_atoms(input.value_in) == to_atoms(item.amount));

            let input = match position {
                Some(position) => available.remove(position),
                None => break,
            };

            let mut hub = HubNode {
                amount: round8(input.value_in),
                tx_hash: input.prev_tx_hash.clone(),
                vout: input.prev_vout,
                ..Default::default()
            };

            // The paying address lives on the predecessor's output.
            let prev_tx = retrieve_tx_data(source, &input.prev_tx_hash, cancel)?;
            if let Some(outpoint) = prev_tx
                .outpoints
                .iter()
                .find(|out| out.index == input.prev_vout)
            {
                hub.address = outpoint.addresses.first().cloned().unwrap_or_default();
            }

            let id = arena.push(hub);
            set.inputs.push(id);
        }
    }

    Ok(set)
}
