//! Data types shared across the funds-flow engine.

use serde::Serialize;

/// Placeholder amount that guarantees accuracy when generating sum
/// combinations with no duplicates while the source list has its last
/// element duplicated. The generator refuses to emit any subset whose
/// final slot holds this value.
pub const DOPING: f64 = -1.0;

/// Status attached to solutions of transactions too complex to analyze
/// within the endpoint cutoff.
pub const COMPLEX_TX_STATUS: &str = "less than 5% traceable";

pub(crate) fn is_zero_f64(value: &f64) -> bool {
    *value == 0.0
}

pub(crate) fn is_zero_usize(value: &usize) -> bool {
    *value == 0
}

/// An amount together with its multiplicity in the source multiset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Counted {
    /// The amount value.
    pub amount: f64,
    /// How often the amount occurs in the source multiset.
    pub count: usize,
}

/// Clusters together values as duplicates or other grouped values. Holds
/// the total sum and the list of the grouped values, sorted ascending.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct GroupedValues {
    /// Sum of all grouped values, quantized to eight decimal places.
    #[serde(skip_serializing_if = "is_zero_f64")]
    pub sum: f64,
    /// The grouped amount values.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<f64>,
}

/// Links a subset of inputs with their matching subset of outputs. Also
/// known as a bucket: this subset of inputs plausibly paid for this subset
/// of outputs with the given fee.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct TxFundsFlow {
    /// The fee paid by this bucket, `inputs.sum - matched_outputs.sum`.
    pub fee: f64,
    /// The bucket's input amounts.
    pub inputs: GroupedValues,
    /// The bucket's output amounts.
    pub matched_outputs: GroupedValues,
}

/// One complete solution to the transaction's funds flow: a collection of
/// buckets that jointly consume all inputs and all outputs and whose fees
/// sum to the transaction fee.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct AllFundsFlows {
    /// Solution number, assigned in emission order starting at 1. The
    /// synthesized whole-transaction fallback is solution 0.
    pub solution: usize,
    /// Sum of all bucket fees, equal to the transaction fee.
    pub total_fees: f64,
    /// The buckets making up this solution.
    pub funds_flow: Vec<TxFundsFlow>,
    /// Status note attached when the analysis bailed out early.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub status_msg: String,
}

/// An input or output amount value and its duplicate counts.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct AmountDetails {
    /// The amount value.
    pub amount: f64,
    /// How often the amount occurs among the transaction's inputs, i.e.
    /// how many candidate origins it has.
    #[serde(skip_serializing_if = "is_zero_usize")]
    pub possible_inputs: usize,
    /// How often the amount was actually used within the bucket.
    #[serde(skip_serializing_if = "is_zero_usize")]
    pub actual: usize,
}

/// Groups probable inputs of an output into a set with its own share of
/// the bucket's outputs.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct InputSets {
    /// The input amounts of the set with their multiplicities.
    pub set: Vec<AmountDetails>,
    /// Fraction of the bucket's output sum represented by the output this
    /// set was collected for. Always 1 for single-input buckets.
    pub percent_of_inputs: f64,
    /// Status note propagated from the solution this set derives from.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub status_msg: String,
    /// Sorted quantized amounts, used to deduplicate sets.
    #[serde(skip)]
    pub(crate) inputs_key: Vec<i64>,
}

/// The funds-flow probability of one distinct output amount: every input
/// set that could have funded it and the overall linking probability.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct FlowProbability {
    /// The output amount.
    pub output_amount: f64,
    /// Multiplicity of the amount among the transaction's outputs.
    #[serde(skip_serializing_if = "is_zero_usize")]
    pub count: usize,
    /// Reciprocal of the weighted number of distinct possible input sets.
    pub linking_probability: f64,
    /// All input sets that could have funded this output.
    pub probable_inputs: Vec<InputSets>,
    /// Status note propagated from the underlying solutions.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub status_msg: String,
}

/// A node of the provenance graph: one transaction output whose possible
/// origins have been resolved one level up.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Hub {
    /// Address the output pays to.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub address: String,
    /// The output amount.
    #[serde(skip_serializing_if = "is_zero_f64")]
    pub amount: f64,
    /// Hash of the transaction carrying the output.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub tx_hash: String,
    /// Product of the level probabilities from the walk root to this hub.
    #[serde(skip_serializing_if = "is_zero_f64")]
    pub path_probability: f64,
    /// Linking probability of this hub's output within its transaction.
    #[serde(skip_serializing_if = "is_zero_f64")]
    pub level_probability: f64,
    /// Index of the output within its transaction.
    pub vout: u32,
    /// The matched input sets, each resolved into upstream hubs.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub matched: Vec<MatchedSet>,
}

/// One input set of a hub, resolved into the hubs of the predecessor
/// outputs that funded it.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct MatchedSet {
    /// The upstream hubs this set consists of.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub inputs: Vec<Hub>,
    /// The set's share of its bucket outputs at this level.
    #[serde(skip_serializing_if = "is_zero_f64")]
    pub level_percent_of_inputs: f64,
    /// Product of the level shares from the walk root to this set.
    #[serde(skip_serializing_if = "is_zero_f64")]
    pub path_percent_of_inputs: f64,
    /// Status note propagated from the probability solution.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub status_msg: String,
}
