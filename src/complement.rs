//! Complement sampling over the class-scan pools.
//!
//! The complement is drawn from ids the class scans found but the netto
//! download never covered. Each year and main class gets the number of
//! draws the allocation asks for, and an id drawn for one stratum is never
//! drawn again for another.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use indexmap::IndexSet;
use tracing::info;

use crate::config::SamplingSettings;
use crate::constants::reports;
use crate::coverage::{MarkerKind, scan_markers};
use crate::errors::HarvestError;
use crate::retrieval::read_document_list;
use crate::sampling::{draw_without_replacement, period_rng};
use crate::types::{DocumentId, MainClass, Year};

/// Reads the netto id list into a set for exclusion lookups.
pub fn read_netto_list(path: &Path) -> Result<BTreeSet<DocumentId>, HarvestError> {
    Ok(read_document_list(path)?.into_iter().collect())
}

/// Gathers class-scan markers into per-year, per-class candidate pools,
/// keyed by the year each range starts in.
///
/// Ids on the netto list are dropped, the rest are deduplicated and
/// sorted, which is what makes the later draws reproducible.
pub fn collate_class_candidates(
    marker_dir: &Path,
    netto: &BTreeSet<DocumentId>,
) -> Result<BTreeMap<Year, BTreeMap<MainClass, Vec<DocumentId>>>, HarvestError> {
    let mut pools: BTreeMap<Year, BTreeMap<MainClass, BTreeSet<DocumentId>>> = BTreeMap::new();
    for record in scan_markers(marker_dir) {
        if record.kind != MarkerKind::ClassRange {
            continue;
        }
        let ids = read_document_list(&record.path)?;
        pools
            .entry(record.interval.start_year())
            .or_default()
            .entry(record.scope.clone())
            .or_default()
            .extend(ids.into_iter().filter(|id| !netto.contains(id)));
    }
    let pools = pools
        .into_iter()
        .map(|(year, classes)| {
            let classes = classes
                .into_iter()
                .map(|(class, ids)| (class, ids.into_iter().collect()))
                .collect();
            (year, classes)
        })
        .collect();
    Ok(pools)
}

/// The drawn complement, per stratum and flattened.
#[derive(Clone, Debug, Default)]
pub struct ComplementSample {
    /// Drawn ids per year and class, each list in draw order.
    pub by_year: BTreeMap<Year, BTreeMap<MainClass, Vec<DocumentId>>>,
    /// Every drawn id, in draw order.
    pub all: IndexSet<DocumentId>,
}

/// Draws the complement for `allocation` out of `pools`.
///
/// Years are processed in order, each with its own `year + base_seed`
/// generator, and classes alphabetically within a year. A stratum whose
/// pool (less what earlier strata took) cannot fill its count follows the
/// shortfall policy.
pub fn build_complement(
    pools: &BTreeMap<Year, BTreeMap<MainClass, Vec<DocumentId>>>,
    allocation: &BTreeMap<Year, BTreeMap<MainClass, usize>>,
    settings: &SamplingSettings,
) -> Result<ComplementSample, HarvestError> {
    let mut sample = ComplementSample::default();
    for (year, class_counts) in allocation {
        let mut rng = period_rng(settings.base_seed, *year);
        let year_pools = pools.get(year);
        for (class, desired) in class_counts {
            let pool = year_pools
                .and_then(|classes| classes.get(class))
                .map(Vec::as_slice)
                .unwrap_or(&[]);
            let stratum = format!("{class} {year}");
            let drawn = draw_without_replacement(
                pool,
                *desired,
                &mut sample.all,
                settings.shortfall,
                &stratum,
                &mut rng,
            )?;
            sample
                .by_year
                .entry(*year)
                .or_default()
                .insert(class.clone(), drawn);
        }
    }
    Ok(sample)
}

/// Writes the complement as the by-year JSON, the flat sorted list, and
/// one `sampled_complement_year_{year}.txt` per year grouped by class.
pub fn write_complement(sample: &ComplementSample, output_dir: &Path) -> Result<(), HarvestError> {
    fs::create_dir_all(output_dir)?;
    fs::write(
        output_dir.join(reports::COMPLEMENT_BY_YEAR_FILE),
        serde_json::to_string_pretty(&sample.by_year)?,
    )?;

    let mut flat: Vec<&str> = sample.all.iter().map(String::as_str).collect();
    flat.sort_unstable();
    fs::write(output_dir.join(reports::COMPLEMENT_FLAT_FILE), flat.join("\n"))?;

    for (year, classes) in &sample.by_year {
        let mut lines = String::new();
        for ids in classes.values() {
            for id in ids {
                lines.push_str(id);
                lines.push('\n');
            }
        }
        fs::write(
            output_dir.join(format!("sampled_complement_year_{year}.txt")),
            lines,
        )?;
    }

    info!(
        "[harvest:complement] sampled {} complement document(s)",
        sample.all.len()
    );
    Ok(())
}
