//! IPC classification pairs and per-year tallies.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use indexmap::IndexMap;
use serde::Serialize;

use crate::errors::HarvestError;
use crate::types::{DocumentId, MainClass, SubClass, Year};

/// One IPC assignment, split into its main class and subclass.
///
/// Example: `ClassPair("A61K".into(), "38/44".into())` renders as
/// `A61K 38/44` and serializes as `["A61K", "38/44"]`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ClassPair(pub MainClass, pub SubClass);

impl ClassPair {
    /// Main class, e.g. `A61K`.
    pub fn main(&self) -> &MainClass {
        &self.0
    }

    /// Subclass, e.g. `38/44`.
    pub fn sub(&self) -> &SubClass {
        &self.1
    }
}

impl fmt::Display for ClassPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.0, self.1)
    }
}

/// Splits an IPC text field into its class pair.
///
/// The field carries the main class and subclass as the first two
/// whitespace-separated tokens, followed by edition and qualifier columns
/// that are ignored here.
pub fn parse_classification(document: &DocumentId, text: &str) -> Result<ClassPair, HarvestError> {
    let mut tokens = text.split_whitespace();
    match (tokens.next(), tokens.next()) {
        (Some(main), Some(sub)) => Ok(ClassPair(main.to_string(), sub.to_string())),
        _ => Err(HarvestError::MalformedDocument {
            document: document.clone(),
            details: format!("classification text '{}' lacks a main class and subclass", text.trim()),
        }),
    }
}

/// Accumulates per-year patent and classification counts.
///
/// Counts keep multiplicity: a patent listing the same class twice weighs
/// it twice, matching how the allocation draw treats repeated listings.
#[derive(Clone, Debug, Default)]
pub struct ClassTally {
    patents_by_year: BTreeMap<Year, BTreeSet<DocumentId>>,
    fine_by_year: BTreeMap<Year, IndexMap<ClassPair, u64>>,
    doc_classes_by_year: BTreeMap<Year, IndexMap<DocumentId, Vec<MainClass>>>,
}

impl ClassTally {
    /// Folds one patent's classifications into the tally.
    pub fn observe(&mut self, year: Year, document: &DocumentId, classes: &[ClassPair]) {
        self.patents_by_year
            .entry(year)
            .or_default()
            .insert(document.clone());
        let fine = self.fine_by_year.entry(year).or_default();
        for pair in classes {
            *fine.entry(pair.clone()).or_insert(0) += 1;
        }
        self.doc_classes_by_year
            .entry(year)
            .or_default()
            .insert(document.clone(), classes.iter().map(|p| p.main().clone()).collect());
    }

    /// Distinct patents seen per year.
    pub fn patents_by_year(&self) -> &BTreeMap<Year, BTreeSet<DocumentId>> {
        &self.patents_by_year
    }

    /// Fine-grained pair counts per year.
    pub fn fine_by_year(&self) -> &BTreeMap<Year, IndexMap<ClassPair, u64>> {
        &self.fine_by_year
    }

    /// Per-document main-class listings per year, multiplicity intact.
    pub fn doc_classes_by_year(&self) -> &BTreeMap<Year, IndexMap<DocumentId, Vec<MainClass>>> {
        &self.doc_classes_by_year
    }

    /// Main-class counts per year, folded down from the fine pairs.
    pub fn coarse_by_year(&self) -> BTreeMap<Year, IndexMap<MainClass, u64>> {
        self.fine_by_year
            .iter()
            .map(|(year, fine)| {
                let mut coarse: IndexMap<MainClass, u64> = IndexMap::new();
                for (pair, count) in fine {
                    *coarse.entry(pair.main().clone()).or_insert(0) += count;
                }
                (*year, coarse)
            })
            .collect()
    }

    /// Fine-grained pair counts summed over all years.
    pub fn overall_fine(&self) -> IndexMap<ClassPair, u64> {
        let mut overall: IndexMap<ClassPair, u64> = IndexMap::new();
        for fine in self.fine_by_year.values() {
            for (pair, count) in fine {
                *overall.entry(pair.clone()).or_insert(0) += count;
            }
        }
        overall
    }

    /// Main-class counts summed over all years.
    pub fn overall_coarse(&self) -> IndexMap<MainClass, u64> {
        let mut overall: IndexMap<MainClass, u64> = IndexMap::new();
        for coarse in self.coarse_by_year().values() {
            for (class, count) in coarse {
                *overall.entry(class.clone()).or_insert(0) += count;
            }
        }
        overall
    }
}

/// Entries of `map` ranked by descending count; ties keep first-seen order.
pub fn rank_by_count<K: Clone>(map: &IndexMap<K, u64>) -> Vec<(K, u64)> {
    let mut ranked: Vec<(K, u64)> = map.iter().map(|(k, v)| (k.clone(), *v)).collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    ranked
}

/// The `k` highest-count entries of `map`, in rank order.
pub fn top_classes<K: Clone + std::hash::Hash + Eq>(map: &IndexMap<K, u64>, k: usize) -> IndexMap<K, u64> {
    rank_by_count(map).into_iter().take(k).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_text_splits_into_main_and_sub() {
        let doc = "EP1000000.A1".to_string();
        let pair =
            parse_classification(&doc, "A61K  38/44          20060101AFI20051220RMEP  ").unwrap();
        assert_eq!(pair, ClassPair("A61K".to_string(), "38/44".to_string()));
        assert_eq!(pair.to_string(), "A61K 38/44");
    }

    #[test]
    fn one_token_classification_is_malformed() {
        let doc = "EP1000000.A1".to_string();
        let err = parse_classification(&doc, "  A61K  ").unwrap_err();
        assert!(matches!(err, HarvestError::MalformedDocument { .. }));
    }

    #[test]
    fn tally_keeps_multiplicity_and_distinct_patents() {
        let mut tally = ClassTally::default();
        let a61k = ClassPair("A61K".to_string(), "38/44".to_string());
        let a61k_other = ClassPair("A61K".to_string(), "9/00".to_string());
        let g06f = ClassPair("G06F".to_string(), "17/30".to_string());
        tally.observe(2003, &"EP1.A1".to_string(), &[a61k.clone(), a61k_other.clone()]);
        tally.observe(2003, &"EP2.A1".to_string(), &[a61k.clone(), g06f.clone()]);
        tally.observe(2004, &"EP3.A1".to_string(), &[g06f.clone()]);

        assert_eq!(tally.patents_by_year()[&2003].len(), 2);
        assert_eq!(tally.patents_by_year()[&2004].len(), 1);
        assert_eq!(tally.fine_by_year()[&2003][&a61k], 2);
        assert_eq!(tally.fine_by_year()[&2003][&a61k_other], 1);

        let coarse = tally.coarse_by_year();
        assert_eq!(coarse[&2003]["A61K"], 3);
        assert_eq!(coarse[&2003]["G06F"], 1);
        assert_eq!(tally.overall_coarse()["G06F"], 2);
        assert_eq!(tally.doc_classes_by_year()[&2003]["EP1.A1"], vec!["A61K", "A61K"]);
    }

    #[test]
    fn ranking_is_stable_for_equal_counts() {
        let mut map = IndexMap::new();
        map.insert("B01D".to_string(), 4u64);
        map.insert("A61K".to_string(), 9u64);
        map.insert("C07C".to_string(), 4u64);
        let ranked = rank_by_count(&map);
        assert_eq!(
            ranked,
            vec![
                ("A61K".to_string(), 9),
                ("B01D".to_string(), 4),
                ("C07C".to_string(), 4),
            ]
        );
        let top = top_classes(&map, 2);
        assert_eq!(top.len(), 2);
        assert!(top.contains_key("A61K") && top.contains_key("B01D"));
    }
}
