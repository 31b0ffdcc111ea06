//! End-to-end engine scenarios driven through the node seam.

use std::collections::HashMap;

use chainflow::analyzer::{
    self, combinations::round8, combinations::to_atoms, AllFundsFlows, Cancel, GroupedValues,
    TxFundsFlow, COMPLEX_TX_STATUS,
};
use chainflow::rpc::{
    error::RpcError,
    types::{Transaction, TxInput, TxOutput},
    TxSource,
};

/// An in-memory node: transactions by hash.
struct StaticTxSource {
    txs: HashMap<String, Transaction>,
}

impl StaticTxSource {
    fn new(txs: Vec<Transaction>) -> Self {
        Self {
            txs: txs.into_iter().map(|tx| (tx.tx_id.clone(), tx)).collect(),
        }
    }
}

impl TxSource for StaticTxSource {
    fn transaction(&self, tx_hash: &str) -> Result<Transaction, RpcError> {
        self.txs
            .get(tx_hash)
            .cloned()
            .ok_or(RpcError::General("unknown transaction"))
    }
}

fn input(prev_tx_hash: &str, prev_vout: u32, value_in: f64) -> TxInput {
    TxInput {
        prev_tx_hash: prev_tx_hash.to_string(),
        prev_vout,
        value_in,
    }
}

fn output(value: f64, index: u32, address: &str) -> TxOutput {
    TxOutput {
        value,
        index,
        addresses: vec![address.to_string()],
    }
}

fn transaction(
    tx_id: &str,
    fees: f64,
    inpoints: Vec<TxInput>,
    outpoints: Vec<TxOutput>,
) -> Transaction {
    Transaction {
        tx_id: tx_id.to_string(),
        block_time: 1535276035,
        fees,
        inpoints,
        outpoints,
    }
}

fn grouped(values: &[f64]) -> GroupedValues {
    GroupedValues {
        sum: round8(values.iter().sum()),
        values: values.to_vec(),
    }
}

// The reference transaction: three inputs, four outputs, one duplicated
// output amount.
fn reference_tx() -> Transaction {
    transaction(
        "a1b2",
        0.000672,
        vec![
            input("f0f0", 0, 39.96949337),
            input("f1f1", 1, 40.9873785),
            input("f2f2", 0, 5076.66042217),
        ],
        vec![
            output(39.96907437, 0, "AddrOne"),
            output(40.9873785, 1, "AddrTwo"),
            output(40.9873785, 2, "AddrThree"),
            output(5035.67279067, 3, "AddrFour"),
        ],
    )
}

#[test]
fn three_bucket_partition() {
    let source = StaticTxSource::new(vec![reference_tx()]);
    let cancel = Cancel::new();

    let tx = analyzer::retrieve_tx_data(&source, "a1b2", &cancel).unwrap();
    let solutions = analyzer::transaction_funds_flow(&tx, 20, &cancel).unwrap();

    assert_eq!(solutions.len(), 1);

    let expected = AllFundsFlows {
        solution: 1,
        total_fees: 0.000672,
        funds_flow: vec![
            TxFundsFlow {
                fee: 0.000419,
                inputs: grouped(&[39.96949337]),
                matched_outputs: grouped(&[39.96907437]),
            },
            TxFundsFlow {
                fee: 0.0,
                inputs: grouped(&[40.9873785]),
                matched_outputs: grouped(&[40.9873785]),
            },
            TxFundsFlow {
                fee: 0.000253,
                inputs: grouped(&[5076.66042217]),
                matched_outputs: grouped(&[40.9873785, 5035.67279067]),
            },
        ],
        status_msg: String::new(),
    };

    assert!(
        solutions[0].equals(&expected),
        "unexpected partition: {:?}",
        solutions[0]
    );
}

#[test]
fn probability_of_reference_transaction() {
    let source = StaticTxSource::new(vec![reference_tx()]);
    let cancel = Cancel::new();

    let (probability, tx) =
        analyzer::retrieve_tx_probability(&source, "a1b2", 20, &cancel).unwrap();
    assert_eq!(tx.block_time, 1535276035);
    assert_eq!(probability.len(), 3);

    let by_amount = |amount: f64| {
        probability
            .iter()
            .find(|p| to_atoms(p.output_amount) == to_atoms(amount))
            .unwrap_or_else(|| panic!("missing output {amount}"))
    };

    let large = by_amount(5035.67279067);
    assert_eq!(large.linking_probability, 1.0);
    assert_eq!(large.probable_inputs.len(), 1);
    assert_eq!(large.probable_inputs[0].set[0].amount, 5076.66042217);

    let small = by_amount(39.96907437);
    assert_eq!(small.linking_probability, 1.0);
    assert_eq!(small.probable_inputs[0].set[0].amount, 39.96949337);

    let ambiguous = by_amount(40.9873785);
    assert_eq!(ambiguous.count, 2);
    assert_eq!(ambiguous.linking_probability, 0.5);
    let candidates: Vec<f64> = ambiguous
        .probable_inputs
        .iter()
        .map(|set| set.set[0].amount)
        .collect();
    assert!(candidates.contains(&40.9873785));
    assert!(candidates.contains(&5076.66042217));
}

#[test]
fn partitions_conserve_the_transaction() {
    let tx = transaction(
        "c3c3",
        0.2,
        vec![input("p0", 0, 2.0), input("p1", 0, 3.0), input("p2", 0, 7.0)],
        vec![
            output(1.9, 0, "AddrA"),
            output(2.9, 1, "AddrB"),
            output(7.0, 2, "AddrC"),
        ],
    );
    let solutions = analyzer::transaction_funds_flow(&tx, 20, &Cancel::new()).unwrap();
    assert!(!solutions.is_empty());

    let bucket_count = solutions[0].funds_flow.len();
    for solution in &solutions {
        // Maximality: every returned partition has the same bucket count.
        assert_eq!(solution.funds_flow.len(), bucket_count);

        let mut fee_sum = 0.0;
        let mut all_inputs = Vec::new();
        let mut all_outputs = Vec::new();
        for bucket in &solution.funds_flow {
            assert!(bucket.fee >= 0.0 && bucket.fee <= 0.2);
            fee_sum = round8(fee_sum + bucket.fee);
            all_inputs.extend_from_slice(&bucket.inputs.values);
            all_outputs.extend_from_slice(&bucket.matched_outputs.values);
        }
        assert_eq!(fee_sum, 0.2);

        all_inputs.sort_by(f64::total_cmp);
        all_outputs.sort_by(f64::total_cmp);
        assert_eq!(all_inputs, vec![2.0, 3.0, 7.0]);
        assert_eq!(all_outputs, vec![1.9, 2.9, 7.0]);
    }

    // The equal-amount pair resolves into its own zero-fee bucket.
    assert_eq!(bucket_count, 3);
    assert!(solutions.iter().all(|s| s
        .funds_flow
        .iter()
        .any(|b| b.fee == 0.0 && b.inputs.values == vec![7.0])));

    // Deduplication across returned partitions.
    for (i, a) in solutions.iter().enumerate() {
        for b in solutions.iter().skip(i + 1) {
            assert!(!a.equals(b));
        }
    }
}

#[test]
fn complex_transaction_propagates_status() {
    // No amount appears on both sides, so nothing prefabricates away and
    // all 22 endpoints hit the combinatorial stage.
    let inputs: Vec<TxInput> = (0..11)
        .map(|i| input("p", i, 100.5 + i as f64))
        .collect();
    let outputs: Vec<TxOutput> = (0..11)
        .map(|i| output(99.0 + i as f64, i, "Addr"))
        .collect();
    let fee = round8(
        inputs.iter().map(|i| i.value_in).sum::<f64>()
            - outputs.iter().map(|o| o.value).sum::<f64>(),
    );
    let tx = transaction("d4d4", fee, inputs, outputs);
    let source = StaticTxSource::new(vec![tx]);

    let (probability, _) =
        analyzer::retrieve_tx_probability(&source, "d4d4", 20, &Cancel::new()).unwrap();

    assert!(!probability.is_empty());
    for entry in &probability {
        assert_eq!(entry.status_msg, COMPLEX_TX_STATUS);
        assert!(entry.linking_probability > 0.0 && entry.linking_probability <= 1.0);
        for set in &entry.probable_inputs {
            assert_eq!(set.status_msg, COMPLEX_TX_STATUS);
        }
    }
}

// A two-level ancestry: the ambiguous transaction's equal outputs trace
// back through two equal inputs into deterministic parents.
fn ancestry_source() -> StaticTxSource {
    let tx_c = transaction(
        "txC",
        0.2,
        vec![input("txD", 0, 5.0), input("txE", 0, 5.0)],
        vec![output(4.9, 0, "AddrC0"), output(4.9, 1, "AddrC1")],
    );
    let tx_d = transaction(
        "txD",
        0.1,
        vec![input("", 0, 6.0)],
        vec![output(5.0, 0, "AddrD0"), output(0.9, 1, "AddrD1")],
    );
    let tx_e = transaction(
        "txE",
        0.1,
        vec![input("", 0, 6.0)],
        vec![output(5.0, 0, "AddrE0"), output(0.9, 1, "AddrE1")],
    );
    StaticTxSource::new(vec![tx_c, tx_d, tx_e])
}

#[test]
fn chain_discovery_walks_ancestors() {
    let source = ancestry_source();
    let (hubs, block_time) =
        analyzer::chain_discovery(&source, "txC", Some(0), 10, 20, &Cancel::new()).unwrap();

    assert_eq!(block_time, 1535276035);
    assert_eq!(hubs.len(), 1);

    let root = &hubs[0];
    assert_eq!(root.tx_hash, "txC");
    assert_eq!(root.vout, 0);
    assert_eq!(root.address, "AddrC0");
    assert_eq!(root.amount, 4.9);
    // Two equal candidate origins halve the linking odds.
    assert_eq!(root.level_probability, 0.5);
    assert_eq!(root.path_probability, 0.5);

    assert_eq!(root.matched.len(), 1);
    let set = &root.matched[0];
    assert_eq!(set.level_percent_of_inputs, 1.0);
    assert_eq!(set.path_percent_of_inputs, 1.0);
    assert_eq!(set.inputs.len(), 2);

    let hashes: Vec<&str> = set.inputs.iter().map(|h| h.tx_hash.as_str()).collect();
    assert!(hashes.contains(&"txD"));
    assert!(hashes.contains(&"txE"));

    for parent in &set.inputs {
        assert_eq!(parent.amount, 5.0);
        assert_eq!(parent.vout, 0);
        // Deterministic link one level up, discounted by the ambiguous
        // level below.
        assert_eq!(parent.level_probability, 1.0);
        assert_eq!(parent.path_probability, 0.5);
        assert!(parent.address == "AddrD0" || parent.address == "AddrE0");

        // The deterministic parent still lists its own funding input,
        // which has no predecessor and terminates the path.
        assert_eq!(parent.matched.len(), 1);
        let grand = &parent.matched[0].inputs[0];
        assert_eq!(grand.amount, 6.0);
        assert_eq!(grand.tx_hash, "");
        assert!(grand.matched.is_empty());
    }
}

#[test]
fn chain_discovery_traces_every_output_by_default() {
    let source = ancestry_source();
    let (hubs, _) =
        analyzer::chain_discovery(&source, "txC", None, 10, 20, &Cancel::new()).unwrap();

    assert_eq!(hubs.len(), 2);
    assert_eq!(hubs[0].vout, 0);
    assert_eq!(hubs[1].vout, 1);
    assert_eq!(hubs[1].address, "AddrC1");
}

#[test]
fn chain_discovery_clamps_output_index() {
    let source = ancestry_source();
    let (hubs, _) =
        analyzer::chain_discovery(&source, "txC", Some(10), 10, 20, &Cancel::new()).unwrap();

    assert_eq!(hubs.len(), 1);
    assert_eq!(hubs[0].vout, 1);
    assert_eq!(hubs[0].address, "AddrC1");
}

#[test]
fn chain_discovery_honors_depth_budget() {
    let source = ancestry_source();
    let (hubs, _) =
        analyzer::chain_discovery(&source, "txC", Some(0), 1, 20, &Cancel::new()).unwrap();

    // Depth one resolves the root level only; its parents are listed but
    // never expanded.
    let root = &hubs[0];
    assert_eq!(root.matched.len(), 1);
    assert!(root.matched[0]
        .inputs
        .iter()
        .all(|parent| parent.matched.is_empty()));
}

#[test]
fn cancellation_aborts_the_analysis() {
    let source = StaticTxSource::new(vec![reference_tx()]);
    let cancel = Cancel::new();
    cancel.cancel();

    assert!(matches!(
        analyzer::retrieve_tx_probability(&source, "a1b2", 20, &cancel),
        Err(analyzer::error::AnalyzerError::Cancelled)
    ));
}

#[test]
fn unknown_transaction_is_an_rpc_error() {
    let source = StaticTxSource::new(vec![]);
    assert!(matches!(
        analyzer::retrieve_tx_data(&source, "missing", &Cancel::new()),
        Err(analyzer::error::AnalyzerError::Rpc(_))
    ));
}
