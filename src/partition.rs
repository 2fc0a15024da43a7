//! Adaptive bisection of date ranges under the search result quota.

use crate::errors::HarvestError;
use crate::intervals::DateInterval;

/// Interval plus the total-result count a probe reported for it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CountedInterval {
    /// The probed interval.
    pub interval: DateInterval,
    /// Results the search reports for it.
    pub count: u64,
}

/// Splits `interval` until every piece counts under `threshold`.
///
/// Pieces come back chronologically ordered, pairwise disjoint, and with a
/// union equal to `interval`. `count_fn` is invoked once per examined
/// interval and its errors propagate unchanged; there are no retries. A
/// single-day interval still at or over the threshold surfaces as
/// [`HarvestError::UnsplittableInterval`].
pub fn partition(
    interval: DateInterval,
    threshold: u64,
    mut count_fn: impl FnMut(&DateInterval) -> Result<u64, HarvestError>,
) -> Result<Vec<CountedInterval>, HarvestError> {
    let mut leaves = Vec::new();
    // Depth-first with the earlier half on top of the stack, so leaves pop
    // off in chronological order.
    let mut pending = vec![interval];
    while let Some(current) = pending.pop() {
        let count = count_fn(&current)?;
        if count < threshold {
            leaves.push(CountedInterval {
                interval: current,
                count,
            });
            continue;
        }
        match current.split() {
            Some((first, second)) => {
                pending.push(second);
                pending.push(first);
            }
            None => {
                return Err(HarvestError::UnsplittableInterval {
                    interval: current.to_string(),
                    count,
                });
            }
        }
    }
    Ok(leaves)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn interval(start: (i32, u32, u32), end: (i32, u32, u32)) -> DateInterval {
        DateInterval::new(date(start.0, start.1, start.2), date(end.0, end.1, end.2)).unwrap()
    }

    // Ten results per day forces splitting until pieces are short enough.
    fn dense_counts(iv: &DateInterval) -> Result<u64, HarvestError> {
        Ok(iv.width_days() * 10)
    }

    #[test]
    fn leaves_tile_the_input_chronologically() {
        let full = interval((2000, 1, 1), (2004, 1, 1));
        let leaves = partition(full, 2000, dense_counts).unwrap();
        assert!(leaves.len() > 1);
        assert_eq!(leaves.first().unwrap().interval.start(), full.start());
        assert_eq!(leaves.last().unwrap().interval.end(), full.end());
        for pair in leaves.windows(2) {
            assert_eq!(pair[0].interval.end(), pair[1].interval.start());
        }
        let total_days: u64 = leaves.iter().map(|leaf| leaf.interval.width_days()).sum();
        assert_eq!(total_days, full.width_days());
    }

    #[test]
    fn every_leaf_counts_under_the_threshold() {
        let leaves = partition(interval((2000, 1, 1), (2010, 1, 1)), 2000, dense_counts).unwrap();
        for leaf in &leaves {
            assert!(leaf.count < 2000, "leaf {} counted {}", leaf.interval, leaf.count);
        }
    }

    #[test]
    fn quiet_interval_stays_whole() {
        let full = interval((2003, 1, 1), (2004, 1, 1));
        let leaves = partition(full, 2000, |_| Ok(17)).unwrap();
        assert_eq!(leaves.len(), 1);
        assert_eq!(leaves[0].interval, full);
        assert_eq!(leaves[0].count, 17);
    }

    #[test]
    fn count_at_threshold_forces_a_split() {
        let full = interval((2003, 1, 1), (2003, 1, 3));
        let leaves = partition(full, 2000, |iv| {
            Ok(if *iv == full { 2000 } else { 5 })
        })
        .unwrap();
        assert_eq!(leaves.len(), 2);
    }

    #[test]
    fn count_errors_propagate_without_retry() {
        let mut probes = 0;
        let result = partition(interval((2003, 1, 1), (2004, 1, 1)), 2000, |_| {
            probes += 1;
            Err(HarvestError::Upstream {
                scope: "test".to_string(),
                reason: "boom".to_string(),
            })
        });
        assert!(matches!(result, Err(HarvestError::Upstream { .. })));
        assert_eq!(probes, 1);
    }

    #[test]
    fn overfull_single_day_is_a_policy_error() {
        let result = partition(interval((2003, 1, 1), (2003, 1, 2)), 2000, |_| Ok(5000));
        assert!(matches!(
            result,
            Err(HarvestError::UnsplittableInterval { count: 5000, .. })
        ));
    }
}
