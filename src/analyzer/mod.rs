//! The transaction funds-flow analysis engine.
//!
//! Recovers the most granular plausible partitions of one transaction into
//! internal sub-transfers, derives per-output linking probabilities from
//! them, and optionally walks ancestor transactions into a provenance
//! graph. Each analysis is request scoped: nothing is shared or persisted
//! between runs.

use std::sync::{
    atomic::{AtomicBool, Ordering::Relaxed},
    Arc,
};
use std::time::{Duration, Instant};

pub mod chain;
pub mod combinations;
pub mod error;
pub mod probability;
pub mod solver;
pub mod sum_tree;
pub mod types;

pub use chain::{chain_discovery, retrieve_tx_data, retrieve_tx_probability};
pub use probability::funds_flow_probability;
pub use solver::transaction_funds_flow;
pub use types::{
    AllFundsFlows, AmountDetails, Counted, FlowProbability, GroupedValues, Hub, InputSets,
    MatchedSet, TxFundsFlow, COMPLEX_TX_STATUS, DOPING,
};

/// Cooperative cancellation token handed to every top-level engine
/// operation. Checked between assembler rotations and before every
/// upstream RPC call.
#[derive(Debug, Clone, Default)]
pub struct Cancel {
    flag: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl Cancel {
    /// A token that only cancels when [`Cancel::cancel`] is called.
    pub fn new() -> Self {
        Self::default()
    }

    /// A token that additionally cancels once `timeout` has elapsed.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            deadline: Some(Instant::now() + timeout),
        }
    }

    /// Fires the token.
    pub fn cancel(&self) {
        self.flag.store(true, Relaxed);
    }

    /// Whether the token has fired or its deadline has passed.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Relaxed)
            || self
                .deadline
                .map(|deadline| Instant::now() >= deadline)
                .unwrap_or(false)
    }
}
