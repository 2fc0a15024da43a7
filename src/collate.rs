//! Collation of weekly sample markers into per-year id lists.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use tracing::info;

use crate::constants::reports::YEARLY_DOCS_FILE;
use crate::coverage::{MarkerKind, scan_markers};
use crate::errors::HarvestError;
use crate::retrieval::read_document_list;
use crate::types::{DocumentId, Year};

/// Gathers every weekly sample marker under `marker_dir` into per-year id
/// sets, keyed by the year each sampled week starts in. Ids appearing in
/// several markers collapse to one entry.
pub fn collate_weekly_markers(
    marker_dir: &Path,
) -> Result<BTreeMap<Year, BTreeSet<DocumentId>>, HarvestError> {
    let mut yearly: BTreeMap<Year, BTreeSet<DocumentId>> = BTreeMap::new();
    for record in scan_markers(marker_dir) {
        if record.kind != MarkerKind::WeeklySample {
            continue;
        }
        let ids = read_document_list(&record.path)?;
        yearly
            .entry(record.interval.start_year())
            .or_default()
            .extend(ids);
    }
    Ok(yearly)
}

/// Writes the collated ids as `yearly_docs.json` plus one sorted
/// `collated_docs_{year}.txt` per year.
pub fn write_collated(
    yearly: &BTreeMap<Year, BTreeSet<DocumentId>>,
    output_dir: &Path,
) -> Result<(), HarvestError> {
    fs::create_dir_all(output_dir)?;
    fs::write(
        output_dir.join(YEARLY_DOCS_FILE),
        serde_json::to_string_pretty(yearly)?,
    )?;
    for (year, ids) in yearly {
        let lines: Vec<&str> = ids.iter().map(String::as_str).collect();
        fs::write(
            output_dir.join(format!("collated_docs_{year}.txt")),
            lines.join("\n"),
        )?;
    }
    info!(
        "[harvest:collate] collated {} year(s) of sampled ids",
        yearly.len()
    );
    Ok(())
}
