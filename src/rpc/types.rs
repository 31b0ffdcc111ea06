//! Normalized transaction shapes consumed by the engine and their
//! extraction from the node's verbose wire format.

use serde::Deserialize;

use crate::analyzer::combinations::round8;

/// Generic transaction data holding both the input and output amounts the
/// engine works on.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transaction {
    /// The transaction hash.
    pub tx_id: String,
    /// Unix time of the block carrying the transaction, zero while
    /// unconfirmed.
    pub block_time: i64,
    /// Transaction fee: sum of inputs minus sum of outputs.
    pub fees: f64,
    /// The transaction's inputs.
    pub inpoints: Vec<TxInput>,
    /// The transaction's outputs.
    pub outpoints: Vec<TxOutput>,
}

/// One input of a transaction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TxInput {
    /// Hash of the transaction whose output this input spends. Empty for
    /// generated coins.
    pub prev_tx_hash: String,
    /// Index of the spent output within its transaction.
    pub prev_vout: u32,
    /// The amount this input contributes.
    pub value_in: f64,
}

/// One output of a transaction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TxOutput {
    /// The output amount.
    pub value: f64,
    /// Index of the output within the transaction.
    pub index: u32,
    /// Addresses the output pays to.
    pub addresses: Vec<String>,
}

// The node's verbose raw transaction result, trimmed to the fields the
// normalized shape needs.
#[derive(Debug, Deserialize)]
pub(crate) struct RawTransaction {
    pub txid: String,
    #[serde(default)]
    pub blocktime: i64,
    #[serde(default)]
    pub vin: Vec<RawVin>,
    #[serde(default)]
    pub vout: Vec<RawVout>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawVin {
    #[serde(default)]
    pub txid: String,
    #[serde(default)]
    pub vout: u32,
    #[serde(default, rename = "amountin")]
    pub amount_in: f64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawVout {
    #[serde(default)]
    pub value: f64,
    pub n: u32,
    #[serde(default, rename = "scriptPubKey")]
    pub script_pub_key: RawScriptPubKey,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawScriptPubKey {
    #[serde(default)]
    pub addresses: Vec<String>,
}

/// Extracts the normalized transaction with all its inputs and outputs
/// from the verbose raw transaction data.
pub(crate) fn extract_transaction(raw: RawTransaction) -> Transaction {
    let mut spent = 0.0f64;
    let mut sent = 0.0f64;

    let inpoints: Vec<TxInput> = raw
        .vin
        .iter()
        .map(|vin| {
            spent += vin.amount_in;
            TxInput {
                prev_tx_hash: vin.txid.clone(),
                prev_vout: vin.vout,
                value_in: vin.amount_in,
            }
        })
        .collect();

    let outpoints: Vec<TxOutput> = raw
        .vout
        .iter()
        .map(|vout| {
            sent += vout.value;
            TxOutput {
                value: vout.value,
                index: vout.n,
                addresses: vout.script_pub_key.addresses.clone(),
            }
        })
        .collect();

    Transaction {
        tx_id: raw.txid,
        block_time: raw.blocktime,
        fees: round8(spent - sent),
        inpoints,
        outpoints,
    }
}
