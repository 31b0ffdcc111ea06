//! A binary search tree keyed on subset sums.
//!
//! The matcher inserts every output-subset combination once and then runs
//! one ranged lookup per input-subset combination, which beats the naive
//! cartesian product while still enumerating every in-tolerance match.
//! The tree is read-only after its insert batch completes.

use super::combinations::round8;
use super::types::{GroupedValues, TxFundsFlow};

#[derive(Debug)]
struct Node {
    value: GroupedValues,
    left: Option<Box<Node>>,
    right: Option<Box<Node>>,
}

/// Ordered collection of grouped values, keyed by their sums.
#[derive(Debug, Default)]
pub struct SumTree {
    root: Option<Box<Node>>,
}

impl SumTree {
    /// Creates an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends every element of the batch into the tree. The first element
    /// of the first batch becomes the root node; sums equal to an existing
    /// node attach to its left subtree, which the matching predicate
    /// relies on.
    pub fn insert(&mut self, batch: Vec<GroupedValues>) {
        for value in batch {
            match self.root {
                None => {
                    self.root = Some(Box::new(Node {
                        value,
                        left: None,
                        right: None,
                    }))
                }
                Some(ref mut root) => root.insert(value),
            }
        }
    }

    /// In-order traversal of all stored values.
    pub fn traverse(&self) -> Vec<&GroupedValues> {
        let mut list = Vec::new();
        if let Some(ref root) = self.root {
            root.traverse(&mut list);
        }
        list
    }

    /// For every query, collects each stored subset whose sum lies within
    /// `[query.sum - fee, query.sum]`, emitting a bucket per match with the
    /// difference as its fee.
    pub fn find_all(&self, queries: &[GroupedValues], fee: f64) -> Vec<TxFundsFlow> {
        let mut matches = Vec::new();
        let root = match self.root {
            Some(ref root) => root,
            None => return matches,
        };

        for query in queries {
            root.find(query, fee, &mut |stored| {
                matches.push(TxFundsFlow {
                    fee: round8(query.sum - stored.sum),
                    inputs: GroupedValues {
                        sum: round8(query.sum),
                        values: query.values.clone(),
                    },
                    matched_outputs: GroupedValues {
                        sum: round8(stored.sum),
                        values: stored.values.clone(),
                    },
                });
            });
        }

        matches
    }
}

impl Node {
    fn insert(&mut self, value: GroupedValues) {
        if value.sum <= self.value.sum {
            match self.left {
                None => {
                    self.left = Some(Box::new(Node {
                        value,
                        left: None,
                        right: None,
                    }))
                }
                Some(ref mut left) => left.insert(value),
            }
        } else {
            match self.right {
                None => {
                    self.right = Some(Box::new(Node {
                        value,
                        left: None,
                        right: None,
                    }))
                }
                Some(ref mut right) => right.insert(value),
            }
        }
    }

    fn traverse<'a>(&'a self, list: &mut Vec<&'a GroupedValues>) {
        if let Some(ref left) = self.left {
            left.traverse(list);
        }
        list.push(&self.value);
        if let Some(ref right) = self.right {
            right.traverse(list);
        }
    }

    // Pre-order descent. Smaller sums live left, so the left subtree is
    // only worth visiting while the difference can still shrink into
    // tolerance, and the right subtree only while it stays non-negative.
    fn find(&self, query: &GroupedValues, fee: f64, visit: &mut impl FnMut(&GroupedValues)) {
        let diff = round8(query.sum - self.value.sum);
        if diff >= 0.0 && diff <= fee {
            visit(&self.value);
        }

        if diff < fee {
            if let Some(ref left) = self.left {
                left.find(query, fee, visit);
            }
        }

        if diff > 0.0 {
            if let Some(ref right) = self.right {
                right.find(query, fee, visit);
            }
        }
    }
}
