//! Quantized arithmetic, multiset helpers and the subset-sum combination
//! generator feeding the matcher.

use std::collections::HashMap;

use super::types::{Counted, GroupedValues, DOPING};

/// Rounds off the amount to a value with eight decimal places. Every sum,
/// fee, difference and equality check in the engine goes through this
/// quantization first.
pub fn round8(value: f64) -> f64 {
    (value * 1e8).round() / 1e8
}

/// The quantized integer form of an amount, usable as an exact map key.
pub fn to_atoms(value: f64) -> i64 {
    (value * 1e8).round() as i64
}

/// Converts a slice of amounts into a [`GroupedValues`] with its
/// quantized sum.
pub(crate) fn grouped_values(values: &[f64]) -> GroupedValues {
    GroupedValues {
        sum: round8(values.iter().sum()),
        values: values.to_vec(),
    }
}

/// Groups duplicates, mapping each quantized amount to the sum and list
/// of its occurrences.
pub fn group_duplicates(list: &[f64]) -> HashMap<i64, GroupedValues> {
    let mut map: HashMap<i64, GroupedValues> = HashMap::new();
    for &value in list {
        let entry = map.entry(to_atoms(value)).or_default();
        entry.sum = round8(entry.sum + value);
        entry.values.push(value);
    }
    map
}

/// Expands each element of the sorted list into a [`Counted`] carrying its
/// multiplicity. When the final two elements are duplicates a
/// `(DOPING, 1)` sentinel is appended so the combination generator can
/// still skip the trailing duplicates correctly at its base case.
pub fn append_dups_count(list: &[f64]) -> Vec<Counted> {
    let groups = group_duplicates(list);

    let mut details: Vec<Counted> = list
        .iter()
        .map(|&value| Counted {
            amount: value,
            count: groups[&to_atoms(value)].values.len(),
        })
        .collect();

    if list.len() > 1 && to_atoms(list[list.len() - 1]) == to_atoms(list[list.len() - 2]) {
        details.push(Counted {
            amount: DOPING,
            count: 1,
        });
    }

    details
}

/// Returns `from - take` as a multiset difference: one occurrence is
/// removed from `from` for every element of `take`. When any element of
/// `take` is not present the remainder is empty with a zero sum. Both
/// slices are expected sorted ascending.
pub fn multiset_diff(take: &[f64], from: &[f64]) -> (Vec<f64>, f64) {
    let mut remainder = from.to_vec();

    for &wanted in take {
        let mut removed = false;
        for i in 0..remainder.len() {
            if to_atoms(remainder[i]) == to_atoms(wanted) {
                remainder.remove(i);
                removed = true;
                break;
            }
            // Sorted remainder, no later match possible.
            if remainder[i] > wanted {
                break;
            }
        }
        if !removed {
            return (Vec::new(), 0.0);
        }
    }

    let sum = round8(remainder.iter().sum());
    (remainder, sum)
}

/// Element-wise equality of two ordered amount sequences.
pub fn seq_equal(a: &[f64], b: &[f64]) -> bool {
    a.len() == b.len()
        && a.iter()
            .zip(b.iter())
            .all(|(x, y)| to_atoms(*x) == to_atoms(*y))
}

/// Generates all size-`r` subsets of the multiset underlying `source`,
/// without duplicate subsets except when `r` is 1, where every element
/// yields its own singleton. `source` must be sorted ascending with the
/// optional trailing doping sentinel from [`append_dups_count`].
pub fn generate_combinations(source: &[Counted], r: usize) -> Vec<GroupedValues> {
    let mut results = Vec::new();
    if r == 0 || source.is_empty() {
        return results;
    }
    let mut data = vec![0.0; r];
    combinatorics(&mut results, source, r, 0, 0, &mut data);
    results
}

// The recursive subset walk: at every position the current source element
// is either taken into the next slot or skipped. For r > 1 the source
// index jumps past consecutive duplicates of the value already placed in
// the current slot, which is what suppresses duplicate subsets. The base
// case refuses subsets ending in the doping sentinel.
fn combinatorics(
    results: &mut Vec<GroupedValues>,
    source: &[Counted],
    r: usize,
    new_ind: usize,
    mut src_ind: usize,
    data: &mut Vec<f64>,
) {
    if new_ind == r {
        if data[r - 1] != DOPING {
            results.push(grouped_values(data));
        }
        return;
    }

    if src_ind >= source.len() {
        return;
    }

    // When r = 1 keep all the duplicates, else jump till end of duplicates.
    if r > 1 {
        while data[new_ind] == source[src_ind].amount && src_ind + 1 < source.len() {
            src_ind += 1;
            if source[src_ind - 1].amount != source[src_ind].amount {
                break;
            }
        }
    }

    data[new_ind] = source[src_ind].amount;

    combinatorics(results, source, r, new_ind + 1, src_ind + 1, data);
    combinatorics(results, source, r, new_ind, src_ind + 1, data);
}

/// All subset combinations of the source multiset from size `n - 1` down
/// to 1. Whole-set subsets are excluded, a bucket spanning the entire
/// transaction conveys no partition information.
pub fn get_total_combinations(source: &[Counted]) -> Vec<GroupedValues> {
    let mut total = Vec::new();
    for r in (1..source.len()).rev() {
        total.extend(generate_combinations(source, r));
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round8() {
        assert_eq!(round8(0.1 + 0.2), 0.3);
        assert_eq!(round8(5076.66042217 - 40.9873785 - 5035.67279067), 0.000253);
        // Idempotence.
        let value = 39.96949337;
        assert_eq!(round8(round8(value)), round8(value));
    }

    #[test]
    fn test_group_duplicates() {
        let result = group_duplicates(&[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(result.len(), 4);
        assert_eq!(result[&to_atoms(3.0)].sum, 3.0);
        assert_eq!(result[&to_atoms(3.0)].values, vec![3.0]);

        let list = [
            1.0, 3.0, 5.0, 7.0, 8.0, 1.0, 1.0, 1.0, 3.0, 3.0, 3.0, 4.0, 4.0, 4.0, 9.0, 9.0,
            9.0, 9.0, 7.0, 5.0, 1.0, 3.0, 9.0,
        ];
        let result = group_duplicates(&list);
        assert_eq!(result[&to_atoms(9.0)].sum, 45.0);
        assert_eq!(result[&to_atoms(9.0)].values.len(), 5);
        assert_eq!(result[&to_atoms(1.0)].sum, 5.0);
        assert_eq!(result[&to_atoms(8.0)].values, vec![8.0]);
    }

    #[test]
    fn test_append_dups_count() {
        let details = append_dups_count(&[1.0, 2.0, 3.0, 4.0]);
        let expected: Vec<Counted> = [1.0, 2.0, 3.0, 4.0]
            .iter()
            .map(|&amount| Counted { amount, count: 1 })
            .collect();
        assert_eq!(details, expected);

        // A trailing duplicate appends the doping sentinel.
        let details = append_dups_count(&[1.0, 1.0, 2.0, 2.0, 2.0, 3.0, 4.0, 4.0, 4.0]);
        let counts: Vec<usize> = details.iter().map(|d| d.count).collect();
        assert_eq!(counts, vec![2, 2, 3, 3, 3, 1, 3, 3, 3, 1]);
        assert_eq!(details.last().unwrap().amount, DOPING);
    }

    #[test]
    fn test_multiset_diff() {
        let (remainder, sum) = multiset_diff(&[2.0, 3.0], &[1.0, 2.0, 3.0, 3.0, 5.0]);
        assert_eq!(remainder, vec![1.0, 3.0, 5.0]);
        assert_eq!(sum, 9.0);

        // Elements not fully removable yield an empty remainder.
        let (remainder, sum) = multiset_diff(&[2.0, 6.0], &[1.0, 2.0, 3.0]);
        assert!(remainder.is_empty());
        assert_eq!(sum, 0.0);
    }

    #[test]
    fn test_seq_equal() {
        assert!(seq_equal(&[1.0, 2.0], &[1.0, 2.0]));
        assert!(!seq_equal(&[1.0, 2.0], &[2.0, 1.0]));
        assert!(!seq_equal(&[1.0], &[1.0, 1.0]));
    }

    fn counted(entries: &[(f64, usize)]) -> Vec<Counted> {
        entries
            .iter()
            .map(|&(amount, count)| Counted { amount, count })
            .collect()
    }

    fn values(results: &[GroupedValues]) -> Vec<Vec<f64>> {
        results.iter().map(|g| g.values.clone()).collect()
    }

    #[test]
    fn test_generate_combinations_distinct() {
        let source = counted(&[(1.0, 1), (2.0, 1), (3.0, 1), (4.0, 1)]);
        let results = generate_combinations(&source, 2);
        assert_eq!(
            values(&results),
            vec![
                vec![1.0, 2.0],
                vec![1.0, 3.0],
                vec![1.0, 4.0],
                vec![2.0, 3.0],
                vec![2.0, 4.0],
                vec![3.0, 4.0],
            ]
        );
        assert_eq!(results[0].sum, 3.0);
        assert_eq!(results[5].sum, 7.0);
    }

    #[test]
    fn test_generate_combinations_leading_duplicates() {
        let source = counted(&[(1.0, 2), (1.0, 2), (2.0, 1), (3.0, 1)]);
        let results = generate_combinations(&source, 2);
        assert_eq!(
            values(&results),
            vec![
                vec![1.0, 1.0],
                vec![1.0, 2.0],
                vec![1.0, 3.0],
                vec![2.0, 3.0],
            ]
        );
    }

    #[test]
    fn test_generate_combinations_inner_duplicates() {
        let source = counted(&[(1.0, 1), (2.0, 2), (2.0, 2), (3.0, 1)]);
        let results = generate_combinations(&source, 2);
        assert_eq!(
            values(&results),
            vec![
                vec![1.0, 2.0],
                vec![1.0, 3.0],
                vec![2.0, 2.0],
                vec![2.0, 3.0],
            ]
        );
    }

    #[test]
    fn test_generate_combinations_trailing_duplicates_doped() {
        let source = counted(&[(1.0, 1), (2.0, 3), (2.0, 3), (2.0, 3), (DOPING, 1)]);
        let results = generate_combinations(&source, 2);
        assert_eq!(values(&results), vec![vec![1.0, 2.0], vec![2.0, 2.0]]);
    }

    #[test]
    fn test_generate_combinations_all_runs_duplicated() {
        let source = counted(&[
            (1.0, 3),
            (1.0, 3),
            (1.0, 3),
            (2.0, 3),
            (2.0, 3),
            (2.0, 3),
            (3.0, 1),
        ]);
        let results = generate_combinations(&source, 2);
        assert_eq!(
            values(&results),
            vec![
                vec![1.0, 1.0],
                vec![1.0, 2.0],
                vec![1.0, 3.0],
                vec![2.0, 2.0],
                vec![2.0, 3.0],
            ]
        );
    }

    #[test]
    fn test_generate_combinations_triples_with_doping() {
        let source = counted(&[
            (5.0, 2),
            (5.0, 2),
            (6.0, 2),
            (6.0, 2),
            (7.0, 2),
            (7.0, 2),
            (DOPING, 1),
        ]);
        let results = generate_combinations(&source, 3);
        assert_eq!(
            values(&results),
            vec![
                vec![5.0, 5.0, 6.0],
                vec![5.0, 5.0, 7.0],
                vec![5.0, 6.0, 6.0],
                vec![5.0, 6.0, 7.0],
                vec![5.0, 7.0, 7.0],
                vec![6.0, 6.0, 7.0],
                vec![6.0, 7.0, 7.0],
            ]
        );
        assert_eq!(results[6].sum, 20.0);
    }

    #[test]
    fn test_generate_combinations_larger_subsets() {
        let source = counted(&[
            (1.0, 1),
            (2.0, 1),
            (3.0, 1),
            (4.0, 1),
            (5.0, 1),
            (6.0, 1),
        ]);
        let results = generate_combinations(&source, 4);
        // C(6, 4) distinct subsets.
        assert_eq!(results.len(), 15);
        assert_eq!(results[0].values, vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(results[14].values, vec![3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_generate_combinations_uniqueness() {
        let source = append_dups_count(&[1.0, 1.0, 2.0, 2.0, 2.0, 3.0, 4.0, 4.0, 4.0]);
        for r in 2..9 {
            let results = generate_combinations(&source, r);
            for (i, a) in results.iter().enumerate() {
                for b in results.iter().skip(i + 1) {
                    assert!(
                        !seq_equal(&a.values, &b.values),
                        "duplicate subset {:?} for r = {}",
                        a.values,
                        r
                    );
                }
            }
        }
    }

    #[test]
    fn test_singletons_keep_duplicates() {
        let source = append_dups_count(&[1.0, 2.0, 2.0]);
        let results = generate_combinations(&source, 1);
        assert_eq!(
            values(&results),
            vec![vec![1.0], vec![2.0], vec![2.0]]
        );
    }

    #[test]
    fn test_get_total_combinations() {
        let source = counted(&[(1.0, 1), (2.0, 1), (3.0, 1)]);
        let total = get_total_combinations(&source);
        // r = 2 first, then r = 1; the full set is never produced.
        assert_eq!(
            values(&total),
            vec![
                vec![1.0, 2.0],
                vec![1.0, 3.0],
                vec![2.0, 3.0],
                vec![1.0],
                vec![2.0],
                vec![3.0],
            ]
        );
    }
}
