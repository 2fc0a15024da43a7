//! Scan workflows that turn search queries into on-disk marker files.
//!
//! Class scans fill the coverage gaps a range is still missing, splitting
//! any date range that counts at or over the result quota. Weekly scans
//! draw a seeded random sample of each year's publications. Both leave one
//! marker file per completed range, which is what makes reruns cheap.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Instant;

use tracing::{info, warn};

use crate::api::SearchClient;
use crate::config::{SamplingSettings, SearchSettings, ShortfallPolicy};
use crate::coverage::{MarkerKind, class_marker_name, missing_ranges, scan_markers, weekly_marker_name};
use crate::errors::HarvestError;
use crate::intervals::DateInterval;
use crate::paging::collect_interval;
use crate::partition::partition;
use crate::sampling::{DeterministicRng, allocate_weeks, coalesce_indices, period_rng, sample_result_indices};
use crate::types::{CqlQuery, DocumentId, Year};

/// CQL matching one IPC class inside a publication-date window.
pub fn class_query(class: &str, country: &str, interval: &DateInterval) -> CqlQuery {
    format!(
        "ipc={class} and pn={country} and pd=\"{}\"",
        interval.cql_window()
    )
}

/// CQL matching every publication inside a date window.
pub fn window_query(country: &str, interval: &DateInterval) -> CqlQuery {
    format!("pn={country} and pd=\"{}\"", interval.cql_window())
}

/// Scans one class across `full`, filling only the gaps earlier runs left
/// behind. Each leaf interval that pages through cleanly writes one marker
/// file holding its ids; the number of markers written comes back.
///
/// An upstream failure abandons the current gap for a later run and moves
/// on. Splitting failures abort, since rerunning would hit them again.
pub fn scan_class(
    client: &dyn SearchClient,
    class: &str,
    full: &DateInterval,
    output_dir: &Path,
    settings: &SearchSettings,
    overwrite: bool,
) -> Result<usize, HarvestError> {
    fs::create_dir_all(output_dir)?;
    let covered: Vec<DateInterval> = if overwrite {
        Vec::new()
    } else {
        scan_markers(output_dir)
            .into_iter()
            .filter(|record| record.kind == MarkerKind::ClassRange && record.scope == class)
            .map(|record| record.interval)
            .collect()
    };
    let gaps = missing_ranges(&covered, full);
    if gaps.is_empty() {
        info!("[harvest:scan] class {class} already covers {full}");
        return Ok(0);
    }
    info!(
        "[harvest:scan] class {class}: filling {} gap(s) in {full}",
        gaps.len()
    );

    let mut written = 0;
    for gap in gaps {
        match fill_gap(client, class, &gap, output_dir, settings) {
            Ok(markers) => written += markers,
            Err(HarvestError::Upstream { scope, reason }) => {
                warn!(
                    "[harvest:scan] leaving gap {gap} of class {class} for a later run: {scope}: {reason}"
                );
            }
            Err(err) => return Err(err),
        }
    }
    Ok(written)
}

fn fill_gap(
    client: &dyn SearchClient,
    class: &str,
    gap: &DateInterval,
    output_dir: &Path,
    settings: &SearchSettings,
) -> Result<usize, HarvestError> {
    let leaves = partition(*gap, settings.quota, |interval| {
        client.count(&class_query(class, &settings.country, interval))
    })?;
    let mut written = 0;
    for leaf in leaves {
        let query = class_query(class, &settings.country, &leaf.interval);
        let ids = collect_interval(
            &leaf.interval,
            settings.quota,
            settings.page_width,
            |window| client.page(&query, window),
        )?;
        fs::write(
            output_dir.join(class_marker_name(class, &leaf.interval)),
            ids.join("\n"),
        )?;
        written += 1;
    }
    Ok(written)
}

/// Runs [`scan_class`] for every listed class over the same range.
pub fn scan_classes(
    client: &dyn SearchClient,
    classes: &[String],
    full: &DateInterval,
    output_dir: &Path,
    settings: &SearchSettings,
    overwrite: bool,
) -> Result<usize, HarvestError> {
    let mut written = 0;
    let started = Instant::now();
    for (index, class) in classes.iter().enumerate() {
        written += scan_class(client, class, full, output_dir, settings, overwrite)?;
        eprintln!(
            "[harvest:scan] {}/{} classes ({:.1}s elapsed)",
            index + 1,
            classes.len(),
            started.elapsed().as_secs_f64()
        );
    }
    Ok(written)
}

/// Draws each year's allocation of random publication ids, one marker file
/// per sampled week.
///
/// Each year gets its own generator seeded with `year + base_seed`, so a
/// year's draw never depends on which other years run. A week whose marker
/// is already on disk is skipped before any of that week's randomness is
/// consumed, matching how an interrupted run left the stream.
pub fn scan_weekly(
    client: &dyn SearchClient,
    yearly_totals: &BTreeMap<Year, usize>,
    output_dir: &Path,
    search: &SearchSettings,
    sampling: &SamplingSettings,
    overwrite: bool,
) -> Result<usize, HarvestError> {
    fs::create_dir_all(output_dir)?;
    let mut written = 0;
    for (&year, &total) in yearly_totals {
        let mut rng = period_rng(sampling.base_seed, year);
        let weeks = DateInterval::year(year)?.weeks();
        let allocation = allocate_weeks(&weeks, total, &mut rng);
        info!(
            "[harvest:scan] year {year}: {total} draw(s) across {} week(s)",
            allocation.len()
        );
        for (week, count) in &allocation {
            let marker = output_dir.join(weekly_marker_name(week));
            if !overwrite && marker.exists() {
                continue;
            }
            match sample_week(client, week, *count, search, sampling.shortfall, &mut rng) {
                Ok(ids) => {
                    fs::write(&marker, ids.join("\n"))?;
                    written += 1;
                }
                Err(HarvestError::Upstream { scope, reason }) => {
                    warn!(
                        "[harvest:scan] leaving week {week} for a later run: {scope}: {reason}"
                    );
                }
                Err(err) => return Err(err),
            }
        }
    }
    Ok(written)
}

/// Samples `count` ids uniformly from the reachable results of one week.
///
/// Only the first `quota` results of a window are reachable, so the draw is
/// over `min(total, quota)`. The sampled result indices are coalesced into
/// page-sized request windows before anything is fetched.
fn sample_week(
    client: &dyn SearchClient,
    week: &DateInterval,
    count: usize,
    settings: &SearchSettings,
    policy: ShortfallPolicy,
    rng: &mut DeterministicRng,
) -> Result<Vec<DocumentId>, HarvestError> {
    let query = window_query(&settings.country, week);
    let total = client.count(&query)?;
    let reachable = total.min(settings.quota) as usize;
    if reachable < count {
        match policy {
            ShortfallPolicy::Fail => {
                return Err(HarvestError::SampleShortfall {
                    stratum: week.to_string(),
                    wanted: count,
                    available: reachable,
                });
            }
            ShortfallPolicy::Degrade => warn!(
                "[harvest:scan] week {week} wants {count} draw(s) but only {reachable} results are reachable, sampling all of them"
            ),
        }
    }

    let indices = sample_result_indices(reachable, count, rng);
    let windows = coalesce_indices(&indices, settings.page_width);
    let mut sampled = Vec::new();
    let mut cursor = 0;
    for window in windows {
        let page = client.page(&query, window)?;
        while cursor < indices.len() && indices[cursor] <= window.end {
            match page.ids.get(indices[cursor] - window.begin) {
                Some(id) => sampled.push(id.clone()),
                None => warn!(
                    "[harvest:scan] result {} of week {week} fell outside the served page",
                    indices[cursor]
                ),
            }
            cursor += 1;
        }
    }
    Ok(sampled)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use crate::api::ScriptedSearch;

    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn interval(start: (i32, u32, u32), end: (i32, u32, u32)) -> DateInterval {
        DateInterval::new(date(start.0, start.1, start.2), date(end.0, end.1, end.2)).unwrap()
    }

    fn ids(prefix: &str, count: usize) -> Vec<DocumentId> {
        (1..=count).map(|n| format!("EP{prefix}{n:04}.A1")).collect()
    }

    #[test]
    fn queries_render_the_inclusive_date_window() {
        let iv = interval((2003, 1, 1), (2003, 1, 8));
        assert_eq!(
            class_query("A61K", "EP", &iv),
            "ipc=A61K and pn=EP and pd=\"20030101 20030107\""
        );
        assert_eq!(window_query("EP", &iv), "pn=EP and pd=\"20030101 20030107\"");
    }

    #[test]
    fn quiet_class_writes_one_marker_and_reruns_stay_offline() {
        let dir = tempfile::tempdir().unwrap();
        let full = DateInterval::year(2003).unwrap();
        let settings = SearchSettings::default();
        let listed = ids("A", 3);
        let client =
            ScriptedSearch::new().with_results(class_query("A61K", "EP", &full), listed.clone());

        let written = scan_class(&client, "A61K", &full, dir.path(), &settings, false).unwrap();
        assert_eq!(written, 1);
        let marker = dir.path().join(class_marker_name("A61K", &full));
        assert_eq!(fs::read_to_string(&marker).unwrap(), listed.join("\n"));

        let requests_before = client.served_windows().len();
        let rerun = scan_class(&client, "A61K", &full, dir.path(), &settings, false).unwrap();
        assert_eq!(rerun, 0);
        assert_eq!(client.served_windows().len(), requests_before);
        assert_eq!(client.counted_queries().len(), 1);
    }

    #[test]
    fn overfull_range_splits_and_markers_tile_it() {
        let dir = tempfile::tempdir().unwrap();
        let full = DateInterval::year(2003).unwrap();
        let (first, second) = full.split().unwrap();
        let settings = SearchSettings::default();
        let client = ScriptedSearch::new()
            .with_results(class_query("G06F", "EP", &full), ids("F", 2000))
            .with_results(class_query("G06F", "EP", &first), ids("G", 2))
            .with_results(class_query("G06F", "EP", &second), ids("H", 1));

        let written = scan_class(&client, "G06F", &full, dir.path(), &settings, false).unwrap();
        assert_eq!(written, 2);
        assert!(dir.path().join(class_marker_name("G06F", &first)).exists());
        assert!(dir.path().join(class_marker_name("G06F", &second)).exists());
        assert_eq!(
            client.counted_queries(),
            vec![
                class_query("G06F", "EP", &full),
                class_query("G06F", "EP", &first),
                class_query("G06F", "EP", &second),
            ]
        );
    }

    #[test]
    fn upstream_failure_keeps_earlier_gap_markers() {
        let dir = tempfile::tempdir().unwrap();
        let full = interval((2003, 1, 1), (2003, 1, 31));
        let covered = interval((2003, 1, 10), (2003, 1, 20));
        let settings = SearchSettings::default();
        fs::create_dir_all(dir.path()).unwrap();
        fs::write(
            dir.path().join(class_marker_name("A61K", &covered)),
            "EP0.A1",
        )
        .unwrap();

        // Only the leading gap is scripted; the trailing gap fails upstream.
        let leading = interval((2003, 1, 1), (2003, 1, 10));
        let client = ScriptedSearch::new()
            .with_results(class_query("A61K", "EP", &leading), ids("L", 2));

        let written = scan_class(&client, "A61K", &full, dir.path(), &settings, false).unwrap();
        assert_eq!(written, 1);
        assert!(dir.path().join(class_marker_name("A61K", &leading)).exists());
        let trailing = interval((2003, 1, 20), (2003, 1, 31));
        assert!(!dir.path().join(class_marker_name("A61K", &trailing)).exists());
    }

    #[test]
    fn weekly_markers_match_the_allocation_and_replay() {
        let search = SearchSettings::default();
        let sampling = SamplingSettings::default();
        let totals = BTreeMap::from([(2003, 4usize)]);

        // Replaying the year's generator tells us which weeks get drawn.
        let weeks = DateInterval::year(2003).unwrap().weeks();
        let mut preview = period_rng(sampling.base_seed, 2003);
        let allocation = allocate_weeks(&weeks, 4, &mut preview);

        let mut client = ScriptedSearch::new();
        for week in allocation.keys() {
            client = client.with_results(window_query("EP", week), ids("W", 30));
        }

        let first_dir = tempfile::tempdir().unwrap();
        let written =
            scan_weekly(&client, &totals, first_dir.path(), &search, &sampling, false).unwrap();
        assert_eq!(written, allocation.len());
        for (week, count) in &allocation {
            let contents =
                fs::read_to_string(first_dir.path().join(weekly_marker_name(week))).unwrap();
            assert_eq!(contents.lines().count(), *count);
        }

        // An identical run into a fresh directory samples identical ids.
        let second_dir = tempfile::tempdir().unwrap();
        scan_weekly(&client, &totals, second_dir.path(), &search, &sampling, false).unwrap();
        for week in allocation.keys() {
            let name = weekly_marker_name(week);
            assert_eq!(
                fs::read_to_string(first_dir.path().join(&name)).unwrap(),
                fs::read_to_string(second_dir.path().join(&name)).unwrap()
            );
        }

        // A rerun over the finished directory stays offline.
        let requests_before = client.served_windows().len();
        let rerun =
            scan_weekly(&client, &totals, first_dir.path(), &search, &sampling, false).unwrap();
        assert_eq!(rerun, 0);
        assert_eq!(client.served_windows().len(), requests_before);
    }

    #[test]
    fn empty_weeks_degrade_to_empty_markers_or_fail() {
        let search = SearchSettings::default();
        let degrade = SamplingSettings::default();
        let totals = BTreeMap::from([(2003, 3usize)]);

        let weeks = DateInterval::year(2003).unwrap().weeks();
        let mut preview = period_rng(degrade.base_seed, 2003);
        let allocation = allocate_weeks(&weeks, 3, &mut preview);

        let mut client = ScriptedSearch::new();
        for week in allocation.keys() {
            client = client.with_results(window_query("EP", week), Vec::new());
        }

        let dir = tempfile::tempdir().unwrap();
        let written = scan_weekly(&client, &totals, dir.path(), &search, &degrade, false).unwrap();
        assert_eq!(written, allocation.len());
        for week in allocation.keys() {
            let contents =
                fs::read_to_string(dir.path().join(weekly_marker_name(week))).unwrap();
            assert!(contents.is_empty());
        }

        let fail = SamplingSettings {
            shortfall: ShortfallPolicy::Fail,
            ..SamplingSettings::default()
        };
        let fail_dir = tempfile::tempdir().unwrap();
        let result = scan_weekly(&client, &totals, fail_dir.path(), &search, &fail, false);
        assert!(matches!(
            result,
            Err(HarvestError::SampleShortfall { wanted: _, available: 0, .. })
        ));
    }
}
