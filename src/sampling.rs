//! Deterministic sampling primitives.
//!
//! Every draw flows through a splitmix64 generator seeded per period, so a
//! period's sample depends only on its own seed and pool, never on which
//! other periods a run happens to touch.

use indexmap::{IndexMap, IndexSet};
use rand::RngCore;
use rand::seq::{IndexedRandom, index};
use tracing::warn;

use crate::config::ShortfallPolicy;
use crate::errors::HarvestError;
use crate::intervals::DateInterval;
use crate::paging::PageWindow;
use crate::types::{DocumentId, MainClass, Year};

/// Splitmix64 generator; identical seeds replay identical draw sequences
/// across runs and platforms.
#[derive(Clone, Debug)]
pub struct DeterministicRng {
    state: u64,
}

impl DeterministicRng {
    /// Creates a generator from a raw seed.
    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    fn next_u64_internal(&mut self) -> u64 {
        let mut z = self.state.wrapping_add(0x9E3779B97F4A7C15);
        self.state = z;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
        z ^ (z >> 31)
    }
}

impl RngCore for DeterministicRng {
    fn next_u32(&mut self) -> u32 {
        self.next_u64_internal() as u32
    }

    fn next_u64(&mut self) -> u64 {
        self.next_u64_internal()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        for chunk in dest.chunks_mut(8) {
            let bytes = self.next_u64_internal().to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
    }
}

/// Generator for one period: seeded with `period + base_seed`.
pub fn period_rng(base_seed: u64, period: Year) -> DeterministicRng {
    DeterministicRng::new(base_seed.wrapping_add(period as i64 as u64))
}

/// Draws `desired` distinct items from `pool`, skipping anything in
/// `already_chosen`, and records what it returns there so later strata
/// never re-draw the same document.
///
/// Pool order is part of the contract: callers pass a stably ordered pool
/// so identical seeds reproduce identical draws. When fewer than `desired`
/// items are eligible the shortfall policy decides between failing and
/// taking everything that is left.
pub fn draw_without_replacement(
    pool: &[DocumentId],
    desired: usize,
    already_chosen: &mut IndexSet<DocumentId>,
    policy: ShortfallPolicy,
    stratum: &str,
    rng: &mut DeterministicRng,
) -> Result<Vec<DocumentId>, HarvestError> {
    let eligible: Vec<&DocumentId> = pool
        .iter()
        .filter(|id| !already_chosen.contains(*id))
        .collect();
    let chosen: Vec<DocumentId> = if eligible.len() < desired {
        match policy {
            ShortfallPolicy::Fail => {
                return Err(HarvestError::SampleShortfall {
                    stratum: stratum.to_string(),
                    wanted: desired,
                    available: eligible.len(),
                });
            }
            ShortfallPolicy::Degrade => {
                warn!(
                    "[harvest:sample] stratum '{stratum}' wants {desired} but only {} are eligible, taking all of them",
                    eligible.len()
                );
                eligible.into_iter().cloned().collect()
            }
        }
    } else {
        eligible
            .choose_multiple(rng, desired)
            .map(|id| (*id).clone())
            .collect()
    };
    for id in &chosen {
        already_chosen.insert(id.clone());
    }
    Ok(chosen)
}

/// `count` distinct one-based result indices out of `total`, ascending.
pub fn sample_result_indices(
    total: usize,
    count: usize,
    rng: &mut DeterministicRng,
) -> Vec<usize> {
    let mut picked: Vec<usize> = index::sample(rng, total, count.min(total))
        .into_iter()
        .map(|zero_based| zero_based + 1)
        .collect();
    picked.sort_unstable();
    picked
}

/// Groups ascending indices so each group spans at most `span` indices;
/// one group becomes one page request covering `[first, last]`.
pub fn coalesce_indices(sorted: &[usize], span: usize) -> Vec<PageWindow> {
    let span = span.max(1);
    let mut windows = Vec::new();
    let mut iter = sorted.iter().copied();
    let Some(first) = iter.next() else {
        return windows;
    };
    let mut begin = first;
    let mut last = first;
    for idx in iter {
        if idx - begin > span - 1 {
            windows.push(PageWindow { begin, end: last });
            begin = idx;
        }
        last = idx;
    }
    windows.push(PageWindow { begin, end: last });
    windows
}

/// Distributes `total` draws uniformly (with replacement) across `weeks`;
/// the returned map keeps first-drawn order.
pub fn allocate_weeks(
    weeks: &[DateInterval],
    total: usize,
    rng: &mut DeterministicRng,
) -> IndexMap<DateInterval, usize> {
    let mut allocation = IndexMap::new();
    for _ in 0..total {
        if let Some(week) = weeks.choose(rng) {
            *allocation.entry(*week).or_insert(0) += 1;
        }
    }
    allocation
}

/// Allocates `draws` class samples with the two-stage rule: first a uniform
/// draw over eligible documents, then one of that document's occurring
/// classes weighted by the class's count in `top_counts`.
///
/// A document is eligible when at least one of its classes appears in
/// `top_counts`; occurrences keep their multiplicity, so a document listing
/// a class twice weights it twice. Classes outside the table are never
/// emitted.
pub fn allocate_class_draws(
    doc_classes: &IndexMap<DocumentId, Vec<MainClass>>,
    top_counts: &IndexMap<MainClass, u64>,
    draws: usize,
    stratum: &str,
    rng: &mut DeterministicRng,
) -> Result<IndexMap<MainClass, usize>, HarvestError> {
    let mut eligible: Vec<Vec<(&MainClass, u64)>> = Vec::new();
    for classes in doc_classes.values() {
        let occurring: Vec<(&MainClass, u64)> = classes
            .iter()
            .filter_map(|class| top_counts.get(class).map(|count| (class, *count)))
            .collect();
        if !occurring.is_empty() {
            eligible.push(occurring);
        }
    }

    let mut allocation: IndexMap<MainClass, usize> = IndexMap::new();
    if draws == 0 {
        return Ok(allocation);
    }
    if eligible.is_empty() {
        return Err(HarvestError::SampleShortfall {
            stratum: stratum.to_string(),
            wanted: draws,
            available: 0,
        });
    }
    for _ in 0..draws {
        if let Some(occurring) = eligible.choose(rng) {
            let (class, _) = occurring
                .choose_weighted(rng, |(_, count)| *count as f64)
                .map_err(|err| {
                    HarvestError::Configuration(format!(
                        "weighted class draw for '{stratum}' failed: {err}"
                    ))
                })?;
            *allocation.entry((*class).clone()).or_insert(0) += 1;
        }
    }
    Ok(allocation)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn pool(names: &[&str]) -> Vec<DocumentId> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn identical_seeds_replay_identical_sequences() {
        let mut a = DeterministicRng::new(1729);
        let mut b = DeterministicRng::new(1729);
        for _ in 0..32 {
            assert_eq!(a.next_u64(), b.next_u64());
        }
    }

    #[test]
    fn period_rng_depends_only_on_period_and_base() {
        let mut first = period_rng(1729, 2003);
        let mut second = period_rng(1729, 2003);
        let mut other = period_rng(1729, 2004);
        assert_eq!(first.next_u64(), second.next_u64());
        assert_ne!(first.next_u64(), other.next_u64());
    }

    #[test]
    fn draw_never_returns_already_chosen_items() {
        let pool = pool(&["EP1.A1", "EP2.A1", "EP3.A1", "EP4.A1"]);
        let mut chosen = IndexSet::new();
        chosen.insert("EP2.A1".to_string());
        let mut rng = DeterministicRng::new(7);
        let picked = draw_without_replacement(
            &pool,
            3,
            &mut chosen,
            ShortfallPolicy::Fail,
            "test",
            &mut rng,
        )
        .unwrap();
        assert_eq!(picked.len(), 3);
        assert!(!picked.contains(&"EP2.A1".to_string()));
    }

    #[test]
    fn sequential_draws_sharing_the_set_are_disjoint() {
        let pool = pool(&["EP1.A1", "EP2.A1", "EP3.A1", "EP4.A1", "EP5.A1", "EP6.A1"]);
        let mut chosen = IndexSet::new();
        let mut rng = DeterministicRng::new(11);
        let first = draw_without_replacement(
            &pool,
            3,
            &mut chosen,
            ShortfallPolicy::Fail,
            "a",
            &mut rng,
        )
        .unwrap();
        let second = draw_without_replacement(
            &pool,
            3,
            &mut chosen,
            ShortfallPolicy::Fail,
            "b",
            &mut rng,
        )
        .unwrap();
        assert!(first.iter().all(|id| !second.contains(id)));
        assert_eq!(chosen.len(), 6);
    }

    #[test]
    fn shortfall_fails_or_degrades_by_policy() {
        let pool = pool(&["EP1.A1", "EP2.A1"]);
        let mut chosen = IndexSet::new();
        let mut rng = DeterministicRng::new(3);
        let result = draw_without_replacement(
            &pool,
            5,
            &mut chosen,
            ShortfallPolicy::Fail,
            "short",
            &mut rng,
        );
        assert!(matches!(
            result,
            Err(HarvestError::SampleShortfall {
                wanted: 5,
                available: 2,
                ..
            })
        ));

        let mut chosen = IndexSet::new();
        let picked = draw_without_replacement(
            &pool,
            5,
            &mut chosen,
            ShortfallPolicy::Degrade,
            "short",
            &mut rng,
        )
        .unwrap();
        assert_eq!(picked, pool);
    }

    #[test]
    fn result_indices_are_distinct_sorted_and_in_bounds() {
        let mut rng = DeterministicRng::new(5);
        let indices = sample_result_indices(500, 40, &mut rng);
        assert_eq!(indices.len(), 40);
        assert!(indices.windows(2).all(|p| p[0] < p[1]));
        assert!(indices.iter().all(|&i| (1..=500).contains(&i)));
    }

    #[test]
    fn coalesced_groups_span_at_most_the_page_width() {
        let indices = [1, 3, 99, 100, 101, 250, 340, 900];
        let windows = coalesce_indices(&indices, 100);
        assert_eq!(
            windows,
            vec![
                PageWindow { begin: 1, end: 100 },
                PageWindow { begin: 101, end: 101 },
                PageWindow { begin: 250, end: 340 },
                PageWindow { begin: 900, end: 900 },
            ]
        );
        for window in &windows {
            assert!(window.end - window.begin < 100);
        }
        assert!(coalesce_indices(&[], 100).is_empty());
    }

    #[test]
    fn week_allocation_totals_match_and_replay() {
        let weeks = DateInterval::new(
            NaiveDate::from_ymd_opt(2003, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2004, 1, 1).unwrap(),
        )
        .unwrap()
        .weeks();
        let mut rng = period_rng(1729, 2003);
        let allocation = allocate_weeks(&weeks, 120, &mut rng);
        assert_eq!(allocation.values().sum::<usize>(), 120);

        let mut rng = period_rng(1729, 2003);
        assert_eq!(allocate_weeks(&weeks, 120, &mut rng), allocation);
    }

    #[test]
    fn class_draws_stay_inside_the_top_table() {
        let mut docs = IndexMap::new();
        docs.insert(
            "EP1.A1".to_string(),
            vec!["A61K".to_string(), "G06F".to_string()],
        );
        docs.insert("EP2.A1".to_string(), vec!["H01L".to_string()]);
        docs.insert("EP3.A1".to_string(), vec!["Z99Z".to_string()]);
        let mut top = IndexMap::new();
        top.insert("A61K".to_string(), 120u64);
        top.insert("G06F".to_string(), 80u64);
        top.insert("H01L".to_string(), 40u64);

        let mut rng = DeterministicRng::new(1729);
        let allocation = allocate_class_draws(&docs, &top, 50, "2003", &mut rng).unwrap();
        assert_eq!(allocation.values().sum::<usize>(), 50);
        assert!(allocation.keys().all(|class| top.contains_key(class)));
        assert!(!allocation.contains_key("Z99Z"));
    }

    #[test]
    fn class_draws_replay_with_the_same_seed() {
        let mut docs = IndexMap::new();
        docs.insert("EP1.A1".to_string(), vec!["A61K".to_string()]);
        docs.insert(
            "EP2.A1".to_string(),
            vec!["G06F".to_string(), "A61K".to_string()],
        );
        let mut top = IndexMap::new();
        top.insert("A61K".to_string(), 10u64);
        top.insert("G06F".to_string(), 5u64);

        let mut first_rng = DeterministicRng::new(42);
        let mut second_rng = DeterministicRng::new(42);
        let first = allocate_class_draws(&docs, &top, 30, "2003", &mut first_rng).unwrap();
        let second = allocate_class_draws(&docs, &top, 30, "2003", &mut second_rng).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn class_draws_with_no_eligible_documents_fail() {
        let mut docs = IndexMap::new();
        docs.insert("EP1.A1".to_string(), vec!["Z99Z".to_string()]);
        let top = IndexMap::from([("A61K".to_string(), 10u64)]);
        let mut rng = DeterministicRng::new(1);
        let result = allocate_class_draws(&docs, &top, 3, "2003", &mut rng);
        assert!(matches!(
            result,
            Err(HarvestError::SampleShortfall { available: 0, .. })
        ));
        assert!(
            allocate_class_draws(&docs, &top, 0, "2003", &mut rng)
                .unwrap()
                .is_empty()
        );
    }
}
