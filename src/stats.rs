//! Classification statistics over downloaded archives and the desired
//! sampling allocation derived from them.
//!
//! One pass over a directory of publication archives produces the class
//! tallies; the report writers turn those into the fixed set of summary
//! files, and the allocation draw decides how many complement documents
//! each year and main class should contribute.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use tracing::{info, warn};

use crate::archive::{extract_patent_info, patent_archive_paths};
use crate::classes::{ClassTally, rank_by_count, top_classes};
use crate::config::SamplingSettings;
use crate::constants::{reports, sampling};
use crate::errors::HarvestError;
use crate::sampling::{allocate_class_draws, period_rng};
use crate::types::{DocumentId, MainClass, Year};

/// Everything one pass over a netto archive directory produced.
#[derive(Clone, Debug, Default)]
pub struct NettoScan {
    /// Tallies over every archive that parsed.
    pub tally: ClassTally,
    /// Display paths of archives that failed to open or parse.
    pub errors: Vec<String>,
}

/// Walks every patent archive under `dir` and tallies its classifications.
///
/// An archive that fails to open or parse lands in the error list instead
/// of aborting the pass; the error file records it for a later retry.
pub fn scan_netto_archives(dir: &Path) -> Result<NettoScan, HarvestError> {
    let mut scan = NettoScan::default();
    for path in patent_archive_paths(dir)? {
        let outcome = extract_patent_info(&path)
            .and_then(|info| info.publication_year().map(|year| (year, info)));
        match outcome {
            Ok((year, info)) => {
                scan.tally.observe(year, &info.document_number, &info.ipc_classes);
            }
            Err(err) => {
                warn!("[harvest:stats] skipping {}: {err}", path.display());
                scan.errors.push(path.display().to_string());
            }
        }
    }
    info!(
        "[harvest:stats] tallied {} archive(s), {} unreadable",
        scan.tally.patents_by_year().values().map(BTreeSet::len).sum::<usize>(),
        scan.errors.len()
    );
    Ok(scan)
}

/// Writes the summary reports for one netto scan into `output_dir`.
///
/// `top_class_count` sizes the per-year top tables; the overall
/// most-common list is always the global top 20 its filename promises.
pub fn write_reports(
    scan: &NettoScan,
    output_dir: &Path,
    top_class_count: usize,
) -> Result<(), HarvestError> {
    fs::create_dir_all(output_dir)?;
    let tally = &scan.tally;

    // The error file is written even when empty, so a clean run is
    // distinguishable from one that never got this far.
    fs::write(
        output_dir.join(reports::ERROR_PATENTS_FILE),
        scan.errors.join("\n"),
    )?;

    let netto: BTreeSet<&DocumentId> = tally.patents_by_year().values().flatten().collect();
    let lines: Vec<&str> = netto.iter().map(|id| id.as_str()).collect();
    fs::write(output_dir.join(reports::NETTO_PATENTS_FILE), lines.join("\n"))?;

    fs::write(
        output_dir.join(reports::YEARLY_PATENTS_FILE),
        serde_json::to_string_pretty(tally.patents_by_year())?,
    )?;

    let fine_named: BTreeMap<Year, BTreeMap<String, u64>> = tally
        .fine_by_year()
        .iter()
        .map(|(year, fine)| {
            let named = fine.iter().map(|(pair, count)| (pair.to_string(), *count)).collect();
            (*year, named)
        })
        .collect();
    fs::write(
        output_dir.join(reports::YEARLY_CLASSES_FILE),
        serde_json::to_string_pretty(&fine_named)?,
    )?;

    let coarse_sorted: BTreeMap<Year, BTreeMap<MainClass, u64>> = tally
        .coarse_by_year()
        .iter()
        .map(|(year, counts)| (*year, counts.iter().map(|(c, n)| (c.clone(), *n)).collect()))
        .collect();
    fs::write(
        output_dir.join(reports::YEARLY_COARSE_CLASSES_FILE),
        serde_json::to_string_pretty(&coarse_sorted)?,
    )?;

    let mut ranks = csv::Writer::from_path(output_dir.join(reports::FINE_RANK_FILE))?;
    ranks.write_record(["main_class", "sub_class", "count"])?;
    for (pair, count) in rank_by_count(&tally.overall_fine()) {
        let count = count.to_string();
        ranks.write_record([pair.main().as_str(), pair.sub().as_str(), count.as_str()])?;
    }
    ranks.flush()?;

    let top_names: Vec<MainClass> = rank_by_count(&tally.overall_coarse())
        .into_iter()
        .take(sampling::TOP_CLASS_COUNT)
        .map(|(class, _)| class)
        .collect();
    fs::write(output_dir.join(reports::TOP_COARSE_FILE), top_names.join("\n"))?;

    let top_by_year: BTreeMap<Year, BTreeMap<MainClass, u64>> = tally
        .coarse_by_year()
        .iter()
        .map(|(year, counts)| {
            let top = top_classes(counts, top_class_count).into_iter().collect();
            (*year, top)
        })
        .collect();
    fs::write(
        output_dir.join(reports::TOP_BY_YEAR_FILE),
        serde_json::to_string_pretty(&top_by_year)?,
    )?;

    info!(
        "[harvest:stats] wrote reports for {} year(s) into {}",
        tally.patents_by_year().len(),
        output_dir.display()
    );
    Ok(())
}

/// How many complement draws each year and main class should get.
///
/// Per year, `|patents| * ratio` draws run against that year's top class
/// table, each draw picking a uniform document and then one of its listed
/// top classes weighted by the table counts. Years whose draw count rounds
/// to zero are omitted. Every year uses its own `year + base_seed`
/// generator, so adding a year never shifts another year's allocation.
pub fn desired_allocation(
    tally: &ClassTally,
    ratio: f64,
    settings: &SamplingSettings,
) -> Result<BTreeMap<Year, IndexMap<MainClass, usize>>, HarvestError> {
    let coarse = tally.coarse_by_year();
    let mut allocation = BTreeMap::new();
    for (year, patents) in tally.patents_by_year() {
        let draws = (patents.len() as f64 * ratio) as usize;
        if draws == 0 {
            continue;
        }
        let Some(doc_classes) = tally.doc_classes_by_year().get(year) else {
            continue;
        };
        let top = coarse
            .get(year)
            .map(|counts| top_classes(counts, settings.top_class_count))
            .unwrap_or_default();
        let mut rng = period_rng(settings.base_seed, *year);
        let drawn = allocate_class_draws(doc_classes, &top, draws, &year.to_string(), &mut rng)?;
        allocation.insert(*year, drawn);
    }
    Ok(allocation)
}

/// Filename the allocation is stored under; the ratio is spelled the way
/// it was given, so `1.0` and `0.5` stay distinguishable.
pub fn allocation_filename(ratio: f64) -> String {
    format!("desired__max_k_sample_ratio{ratio:?}.json")
}

/// Writes the allocation with alphabetically sorted class keys, returning
/// the path written.
pub fn write_allocation(
    allocation: &BTreeMap<Year, IndexMap<MainClass, usize>>,
    ratio: f64,
    output_dir: &Path,
) -> Result<PathBuf, HarvestError> {
    fs::create_dir_all(output_dir)?;
    let sorted: BTreeMap<Year, BTreeMap<&MainClass, &usize>> = allocation
        .iter()
        .map(|(year, counts)| (*year, counts.iter().collect()))
        .collect();
    let path = output_dir.join(allocation_filename(ratio));
    fs::write(&path, serde_json::to_string_pretty(&sorted)?)?;
    Ok(path)
}

/// Reads an allocation file back into its per-year class counts.
pub fn read_allocation(
    path: &Path,
) -> Result<BTreeMap<Year, BTreeMap<MainClass, usize>>, HarvestError> {
    let parsed: BTreeMap<String, BTreeMap<MainClass, usize>> =
        serde_json::from_str(&fs::read_to_string(path)?)?;
    let mut allocation = BTreeMap::new();
    for (year, counts) in parsed {
        let year: Year = year.parse().map_err(|_| {
            HarvestError::Configuration(format!("allocation key '{year}' is not a year"))
        })?;
        allocation.insert(year, counts);
    }
    Ok(allocation)
}

/// Sums each year's class counts in an allocation file, which is the
/// per-year total the weekly scan draws.
pub fn read_yearly_totals(path: &Path) -> Result<BTreeMap<Year, usize>, HarvestError> {
    let totals = read_allocation(path)?
        .into_iter()
        .map(|(year, counts)| (year, counts.values().sum()))
        .collect();
    Ok(totals)
}
