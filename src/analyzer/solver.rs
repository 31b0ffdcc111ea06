//! The funds-flow partition solver.
//!
//! Builds every maximally granular partition of a transaction into
//! buckets: trivially matching equal amounts first, enumerating subset
//! combinations of what remains, matching input subsets against output
//! subsets within the fee tolerance, and assembling candidate buckets into
//! complete partitions whose fees add up to the exact transaction fee.

use std::collections::HashMap;

use super::combinations::{
    append_dups_count, generate_combinations, get_total_combinations, grouped_values,
    multiset_diff, round8, seq_equal, to_atoms,
};
use super::error::AnalyzerError;
use super::sum_tree::SumTree;
use super::types::{AllFundsFlows, GroupedValues, TxFundsFlow, COMPLEX_TX_STATUS};
use super::Cancel;
use crate::rpc::types::Transaction;

/// Sorted input and output amounts of a transaction.
pub(crate) fn extract_amounts(tx: &Transaction) -> (Vec<f64>, Vec<f64>) {
    let mut inputs: Vec<f64> = tx.inpoints.iter().map(|i| round8(i.value_in)).collect();
    let mut outputs: Vec<f64> = tx.outpoints.iter().map(|o| round8(o.value)).collect();

    inputs.sort_by(f64::total_cmp);
    outputs.sort_by(f64::total_cmp);

    log::debug!(
        "The transaction has {} inputs and {} outputs amounts respectively",
        inputs.len(),
        outputs.len()
    );

    (inputs, outputs)
}

/// Pairs equal input and output amounts into trivial zero-fee buckets
/// before any combinatorial work, shrinking the problem. Returns the
/// prefabricated buckets and the reduced input and output multisets,
/// which afterwards share no common amount value.
pub fn prefabricated_buckets(
    inputs: &[f64],
    outputs: &[f64],
) -> (Vec<TxFundsFlow>, Vec<f64>, Vec<f64>) {
    let mut buckets = Vec::new();
    let mut new_inputs = inputs.to_vec();
    let mut new_outputs = outputs.to_vec();

    let mut i = 0;
    while i < new_inputs.len() {
        let wanted = to_atoms(new_inputs[i]);
        match new_outputs.iter().position(|&o| to_atoms(o) == wanted) {
            Some(out) => {
                buckets.push(TxFundsFlow {
                    fee: 0.0,
                    inputs: grouped_values(&new_inputs[i..i + 1]),
                    matched_outputs: grouped_values(&new_outputs[out..out + 1]),
                });
                new_inputs.remove(i);
                new_outputs.remove(out);
            }
            None => i += 1,
        }
    }

    (buckets, new_inputs, new_outputs)
}

/// The synthesized whole-transaction partition: one bucket holding every
/// input and every output, paying the full fee.
fn trivial_solution(inputs: &[f64], outputs: &[f64], fee: f64, status_msg: &str) -> AllFundsFlows {
    AllFundsFlows {
        solution: 0,
        total_fees: round8(fee),
        funds_flow: vec![TxFundsFlow {
            fee: round8(fee),
            inputs: grouped_values(inputs),
            matched_outputs: grouped_values(outputs),
        }],
        status_msg: status_msg.to_string(),
    }
}

/// Calculates the funds flow between a transaction's inputs and outputs,
/// returning every maximally granular partition. `endpoint_cutoff` bounds
/// the combinatorial work: transactions whose reduced endpoint count
/// exceeds it resolve to the whole-transaction partition with a
/// low-traceability status.
pub fn transaction_funds_flow(
    tx: &Transaction,
    endpoint_cutoff: usize,
    cancel: &Cancel,
) -> Result<Vec<AllFundsFlows>, AnalyzerError> {
    let (inputs, outputs) = extract_amounts(tx);
    if inputs.is_empty() || outputs.is_empty() {
        return Err(AnalyzerError::InvalidTransaction(
            "funds flow check needs both input(s) and output(s) of a transaction",
        ));
    }

    let fee = round8(tx.fees);

    let (prefab, reduced_in, reduced_out) = prefabricated_buckets(&inputs, &outputs);

    if reduced_in.is_empty() && reduced_out.is_empty() {
        // Fully prefabricated, the identity pairing is the only solution.
        let solution = AllFundsFlows {
            solution: 1,
            total_fees: fee,
            funds_flow: prefab,
            status_msg: String::new(),
        };
        verify_solutions(std::slice::from_ref(&solution), &inputs, &outputs, fee)?;
        return Ok(vec![solution]);
    }

    if reduced_in.is_empty() || reduced_out.is_empty() {
        // One side consumed entirely by equal-amount pairs; nothing is
        // left to match the other side against.
        return Ok(vec![trivial_solution(&inputs, &outputs, fee, "")]);
    }

    if reduced_in.len() + reduced_out.len() > endpoint_cutoff {
        log::info!(
            "Aborting analysis: {} endpoints exceed the cutoff of {}",
            reduced_in.len() + reduced_out.len(),
            endpoint_cutoff
        );
        return Ok(vec![trivial_solution(
            &inputs,
            &outputs,
            fee,
            COMPLEX_TX_STATUS,
        )]);
    }

    log::info!("Calculating all possible sum combinations for both inputs and outputs");

    let input_combinations = get_total_combinations(&append_dups_count(&reduced_in));
    let output_combinations = get_total_combinations(&append_dups_count(&reduced_out));

    log::debug!(
        "Found {} input and {} output possible sum combinations",
        input_combinations.len(),
        output_combinations.len()
    );

    let mut tree = SumTree::new();
    tree.insert(output_combinations);

    log::info!("Searching for matching sums between inputs and outputs amounts");

    let matched_sum = tree.find_all(&input_combinations, fee);

    let mut solutions = assemble_solutions(&matched_sum, &reduced_in, &reduced_out, fee, cancel)?;

    if solutions.is_empty() {
        return Ok(vec![trivial_solution(&inputs, &outputs, fee, "")]);
    }

    for (index, solution) in solutions.iter_mut().enumerate() {
        solution.funds_flow.extend(prefab.iter().cloned());
        solution.solution = index + 1;
        solution.total_fees = fee;
    }

    log::info!("Found {} matching solution(s)", solutions.len());

    verify_solutions(&solutions, &inputs, &outputs, fee)?;

    Ok(solutions)
}

// Post-assembly conservation check. A violation here is a solver defect,
// not bad input.
fn verify_solutions(
    solutions: &[AllFundsFlows],
    inputs: &[f64],
    outputs: &[f64],
    fee: f64,
) -> Result<(), AnalyzerError> {
    for solution in solutions {
        let mut fee_sum = 0.0;
        let mut all_inputs = Vec::new();
        let mut all_outputs = Vec::new();
        for bucket in &solution.funds_flow {
            fee_sum = round8(fee_sum + bucket.fee);
            all_inputs.extend_from_slice(&bucket.inputs.values);
            all_outputs.extend_from_slice(&bucket.matched_outputs.values);
        }
        all_inputs.sort_by(f64::total_cmp);
        all_outputs.sort_by(f64::total_cmp);

        if to_atoms(fee_sum) != to_atoms(fee)
            || !seq_equal(&all_inputs, inputs)
            || !seq_equal(&all_outputs, outputs)
        {
            log::error!(
                "Solution {} violates conservation: fees {} vs {}",
                solution.solution,
                fee_sum,
                fee
            );
            return Err(AnalyzerError::InternalInvariant(
                "assembled solution does not conserve the transaction amounts",
            ));
        }
    }
    Ok(())
}

/// Using the fee target, returns the most granular solution(s) the
/// candidate buckets can assemble: every solution consumes the remaining
/// input and output multisets exactly and its bucket fees sum to the
/// transaction fee. Only solutions with the maximum bucket count survive,
/// deduplicated.
fn assemble_solutions(
    matched_sum: &[TxFundsFlow],
    inputs: &[f64],
    outputs: &[f64],
    fee: f64,
    cancel: &Cancel,
) -> Result<Vec<AllFundsFlows>, AnalyzerError> {
    let mut max_buckets = 0usize;
    let mut accepted: HashMap<usize, Vec<AllFundsFlows>> = HashMap::new();

    // Probe every rotation of the candidate list, starting with the
    // identity rotation and then walking the start index down from the
    // tail; the fruitful candidates tend to sit at the end of the list.
    for index in 0..matched_sum.len() {
        if cancel.is_cancelled() {
            return Err(AnalyzerError::Cancelled);
        }

        let start = matched_sum.len() - index;
        let rotation = matched_sum[start..].iter().chain(matched_sum[..start].iter());

        probe_rotation(
            rotation,
            inputs,
            outputs,
            fee,
            &mut accepted,
            &mut max_buckets,
        );
    }

    Ok(accepted.remove(&max_buckets).unwrap_or_default())
}

// Walks one rotation of the candidate buckets, consuming amounts from
// working copies of the multisets. A candidate only qualifies while its
// fee fits into what is left of the fee target; failed consumption rolls
// both working copies back.
fn probe_rotation<'a>(
    rotation: impl Iterator<Item = &'a TxFundsFlow>,
    inputs: &[f64],
    outputs: &[f64],
    fee: f64,
    accepted: &mut HashMap<usize, Vec<AllFundsFlows>>,
    max_buckets: &mut usize,
) {
    let mut input_copy = inputs.to_vec();
    let mut output_copy = outputs.to_vec();
    let mut tmp: Vec<TxFundsFlow> = Vec::new();
    let mut sum_fees = 0.0f64;

    for candidate in rotation {
        if candidate.fee <= round8(fee - sum_fees) {
            let input_snapshot = input_copy.clone();
            let output_snapshot = output_copy.clone();

            if consume(&candidate.inputs.values, &mut input_copy)
                && consume(&candidate.matched_outputs.values, &mut output_copy)
            {
                sum_fees += candidate.fee;
                tmp.push(TxFundsFlow {
                    fee: round8(candidate.fee),
                    inputs: candidate.inputs.clone(),
                    matched_outputs: candidate.matched_outputs.clone(),
                });
            } else {
                input_copy = input_snapshot;
                output_copy = output_snapshot;
            }
        }

        sum_fees = round8(sum_fees);

        if to_atoms(sum_fees) == to_atoms(fee) && input_copy.is_empty() && output_copy.is_empty() {
            // Split the funds-flow buckets into their most granular form.
            let granular = split_funds_flow(tmp.clone());

            if granular.len() >= *max_buckets {
                let item = AllFundsFlows {
                    solution: 0,
                    total_fees: round8(sum_fees),
                    funds_flow: granular,
                    status_msg: String::new(),
                };

                let is_duplicate = accepted
                    .values()
                    .flatten()
                    .any(|existing| existing.equals(&item));

                *max_buckets = item.funds_flow.len();

                if !is_duplicate {
                    accepted.entry(item.funds_flow.len()).or_default().push(item);
                }
            }
        }

        // No further matching can happen once either side is empty.
        if input_copy.is_empty() || output_copy.is_empty() {
            return;
        }
    }
}

// Removes one occurrence from `working` per element of `values`. On a
// missing element the caller restores from its snapshots.
fn consume(values: &[f64], working: &mut Vec<f64>) -> bool {
    for value in values {
        match working.iter().position(|w| to_atoms(*w) == to_atoms(*value)) {
            Some(i) => {
                working.remove(i);
            }
            None => return false,
        }
    }
    true
}

/// Breaks composite buckets down into their most granular form. The
/// combination generator suppresses duplicate subsets, so splits between
/// equal-amount groups are only recoverable here, where the candidate set
/// is already small. A bucket with at least two inputs and two outputs is
/// replaced by any sub-pairing that conserves its fee; the scan restarts
/// until no further split applies.
pub(crate) fn split_funds_flow(mut combined: Vec<TxFundsFlow>) -> Vec<TxFundsFlow> {
    'scan: loop {
        for i in 0..combined.len() {
            let bucket = &combined[i];
            if bucket.inputs.values.len() < 2 || bucket.matched_outputs.values.len() < 2 {
                continue;
            }

            let input_combinations =
                get_total_combinations(&append_dups_count(&bucket.inputs.values));
            let output_source = append_dups_count(&bucket.matched_outputs.values);

            for k in 1..bucket.matched_outputs.values.len() {
                let output_combinations = generate_combinations(&output_source, k);

                for ci in &input_combinations {
                    for co in &output_combinations {
                        let diff = round8(ci.sum - co.sum);
                        if diff >= 0.0 && diff < bucket.fee {
                            let (rest_out, rest_out_sum) =
                                multiset_diff(&co.values, &bucket.matched_outputs.values);
                            let (rest_in, rest_in_sum) =
                                multiset_diff(&ci.values, &bucket.inputs.values);

                            let remainder = TxFundsFlow {
                                fee: round8(rest_in_sum - rest_out_sum),
                                inputs: GroupedValues {
                                    sum: rest_in_sum,
                                    values: rest_in,
                                },
                                matched_outputs: GroupedValues {
                                    sum: rest_out_sum,
                                    values: rest_out,
                                },
                            };

                            combined[i] = TxFundsFlow {
                                fee: diff,
                                inputs: ci.clone(),
                                matched_outputs: co.clone(),
                            };
                            combined.push(remainder);

                            continue 'scan;
                        }
                    }
                }
            }
        }

        return combined;
    }
}

impl AllFundsFlows {
    /// Solution equality: every bucket of one solution has a bucket in the
    /// other whose input values and output values match element-wise. Works
    /// effectively because bucket values are kept sorted.
    pub fn equals(&self, other: &AllFundsFlows) -> bool {
        if self.funds_flow.len() != other.funds_flow.len() {
            return false;
        }

        other.funds_flow.iter().all(|bucket| {
            self.funds_flow.iter().any(|own| {
                seq_equal(&own.inputs.values, &bucket.inputs.values)
                    && seq_equal(&own.matched_outputs.values, &bucket.matched_outputs.values)
            })
        })
    }
}
