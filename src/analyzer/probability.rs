//! Reduces raw partition solutions into per-output linking probabilities.

use std::collections::HashMap;

use super::combinations::{round8, to_atoms};
use super::types::{AllFundsFlows, AmountDetails, FlowProbability, InputSets};

/// Obtains the funds-flow probability for each distinct output amount in
/// relation to its possible matching input(s). `inputs` and `outputs` are
/// the transaction's full amount lists; input multiplicities weight the
/// linking probability and output multiplicities become the reported
/// count. Outputs carrying no value are skipped.
pub fn funds_flow_probability(
    solutions: &[AllFundsFlows],
    inputs: &[f64],
    outputs: &[f64],
) -> Vec<FlowProbability> {
    if solutions.is_empty() {
        return Vec::new();
    }

    log::debug!("Calculating the transaction funds flow probability");

    let input_counts = multiplicities(inputs);
    let output_counts = multiplicities(outputs);

    // Keyed by quantized output amount; insertion order kept for a
    // deterministic payload.
    let mut order: Vec<i64> = Vec::new();
    let mut results: HashMap<i64, FlowProbability> = HashMap::new();

    for solution in solutions {
        for bucket in &solution.funds_flow {
            let bucket_inputs = &bucket.inputs.values;
            let distinct_inputs = distinct(bucket_inputs);
            let bucket_outputs = distinct_with_counts(&bucket.matched_outputs.values);

            for &(output_amount, multiplicity) in &bucket_outputs {
                // Null-data outputs carry no value to trace.
                if output_amount <= 0.0 {
                    continue;
                }

                let key = to_atoms(output_amount);
                let entry = results.entry(key).or_insert_with(|| {
                    order.push(key);
                    FlowProbability {
                        output_amount,
                        count: output_counts.get(&key).copied().unwrap_or(0),
                        linking_probability: 0.0,
                        probable_inputs: Vec::new(),
                        status_msg: solution.status_msg.clone(),
                    }
                });

                if distinct_inputs.len() > 1 {
                    // Many-to-*: the whole input multiset backs this output
                    // with the share of the bucket outputs it represents.
                    let percent = round8(
                        (output_amount / bucket.matched_outputs.sum) * multiplicity as f64,
                    );
                    let set: Vec<AmountDetails> = distinct_with_counts(bucket_inputs)
                        .iter()
                        .map(|&(amount, actual)| AmountDetails {
                            amount,
                            possible_inputs: input_counts
                                .get(&to_atoms(amount))
                                .copied()
                                .unwrap_or(0),
                            actual,
                        })
                        .collect();
                    push_unique(
                        entry,
                        InputSets {
                            inputs_key: set_key(&set),
                            set,
                            percent_of_inputs: percent,
                            status_msg: solution.status_msg.clone(),
                        },
                    );
                } else {
                    // One-to-*: a single distinct input amount funds the
                    // whole bucket.
                    for &amount in &distinct_inputs {
                        let actual = bucket_inputs
                            .iter()
                            .filter(|v| to_atoms(**v) == to_atoms(amount))
                            .count();
                        let set = vec![AmountDetails {
                            amount,
                            possible_inputs: input_counts
                                .get(&to_atoms(amount))
                                .copied()
                                .unwrap_or(0),
                            actual,
                        }];
                        push_unique(
                            entry,
                            InputSets {
                                inputs_key: set_key(&set),
                                set,
                                percent_of_inputs: 1.0,
                                status_msg: solution.status_msg.clone(),
                            },
                        );
                    }
                }
            }
        }
    }

    let mut payload = Vec::with_capacity(order.len());
    for key in order {
        let mut entry = results.remove(&key).expect("entry inserted above");

        // A singleton amount occurring k times in the transaction has k
        // candidate origins; multi-input sets count once.
        let weight: f64 = entry
            .probable_inputs
            .iter()
            .map(|set| {
                if set.set.len() > 1 {
                    1.0
                } else {
                    set.set[0].possible_inputs.max(1) as f64
                }
            })
            .sum();
        entry.linking_probability = round8(1.0 / weight);

        for set in &mut entry.probable_inputs {
            set.set
                .sort_by(|a, b| b.possible_inputs.cmp(&a.possible_inputs));
        }

        payload.push(entry);
    }

    log::debug!("Finished calculating the tx probabilities");

    payload
}

// Quantized multiplicity map of an amount list.
fn multiplicities(values: &[f64]) -> HashMap<i64, usize> {
    let mut counts = HashMap::new();
    for &value in values {
        *counts.entry(to_atoms(value)).or_insert(0) += 1;
    }
    counts
}

// Distinct amounts in first-seen order.
fn distinct(values: &[f64]) -> Vec<f64> {
    let mut seen = Vec::new();
    for &value in values {
        if !seen.iter().any(|s| to_atoms(*s) == to_atoms(value)) {
            seen.push(value);
        }
    }
    seen
}

// Distinct amounts with their multiplicities, in first-seen order.
fn distinct_with_counts(values: &[f64]) -> Vec<(f64, usize)> {
    let mut counts: Vec<(f64, usize)> = Vec::new();
    for &value in values {
        match counts
            .iter_mut()
            .find(|(seen, _)| to_atoms(*seen) == to_atoms(value))
        {
            Some((_, count)) => *count += 1,
            None => counts.push((value, 1)),
        }
    }
    counts
}

// The deduplication key of a set: its sorted quantized amounts, expanded
// by their in-bucket multiplicity.
fn set_key(set: &[AmountDetails]) -> Vec<i64> {
    let mut key = Vec::new();
    for details in set {
        for _ in 0..details.actual.max(1) {
            key.push(to_atoms(details.amount));
        }
    }
    key.sort_unstable();
    key
}

// Sets with the same sorted amounts and the same output share are the
// same evidence; keep one.
fn push_unique(entry: &mut FlowProbability, candidate: InputSets) {
    let duplicate = entry.probable_inputs.iter().any(|existing| {
        existing.inputs_key == candidate.inputs_key
            && to_atoms(existing.percent_of_inputs) == to_atoms(candidate.percent_of_inputs)
    });
    if !duplicate {
        entry.probable_inputs.push(candidate);
    }
}
