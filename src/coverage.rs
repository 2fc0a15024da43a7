//! On-disk range markers and coverage gap detection.
//!
//! Completed scans leave one marker file per finished range. Before a run
//! touches the network, the requested range is diffed against the markers
//! already on disk and only the gaps are queried again.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;
use walkdir::WalkDir;

use crate::intervals::DateInterval;
use crate::types::ScopeLabel;

/// Scope label carried by weekly sample markers.
pub const WEEKLY_SCOPE: &str = "random_sample";

/// Compact date form used inside marker filenames.
const MARKER_DATE: &str = "%Y%m%d";

/// Which scan family wrote a marker.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MarkerKind {
    /// `{class}_{begin}-{end}.csv` written by class scans.
    ClassRange,
    /// `random_sample_{begin}_{end}.txt` written by weekly scans.
    WeeklySample,
}

/// One completed range recovered from a marker filename.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SavedRangeRecord {
    /// Stratum the range belongs to (IPC class or the weekly scope).
    pub scope: ScopeLabel,
    /// Half-open range the marker covers.
    pub interval: DateInterval,
    /// Filename family the marker was parsed from.
    pub kind: MarkerKind,
    /// Where the marker lives; its lines are the collected ids.
    pub path: PathBuf,
}

/// Marker filename for a completed class range.
pub fn class_marker_name(class: &str, interval: &DateInterval) -> String {
    format!(
        "{class}_{}-{}.csv",
        interval.start().format(MARKER_DATE),
        interval.end().format(MARKER_DATE)
    )
}

/// Marker filename for a completed weekly sample.
pub fn weekly_marker_name(interval: &DateInterval) -> String {
    format!(
        "{WEEKLY_SCOPE}_{}_{}.txt",
        interval.start().format(MARKER_DATE),
        interval.end().format(MARKER_DATE)
    )
}

fn class_marker_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\w+)_(\d{8})-(\d{8})\.csv$").unwrap())
}

fn weekly_marker_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\w+)_(\d{8})_(\d{8})\.txt$").unwrap())
}

fn marker_date(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text, MARKER_DATE).ok()
}

/// Parses a marker filename; `None` for anything that is not a marker.
pub fn parse_marker_name(name: &str) -> Option<(ScopeLabel, DateInterval, MarkerKind)> {
    let (captures, kind) = if let Some(captures) = class_marker_re().captures(name) {
        (captures, MarkerKind::ClassRange)
    } else if let Some(captures) = weekly_marker_re().captures(name) {
        (captures, MarkerKind::WeeklySample)
    } else {
        return None;
    };
    let scope = captures.get(1)?.as_str().to_string();
    let start = marker_date(captures.get(2)?.as_str())?;
    let end = marker_date(captures.get(3)?.as_str())?;
    let interval = DateInterval::new(start, end).ok()?;
    Some((scope, interval, kind))
}

/// Reads every marker directly under `dir`, sorted by filename. Entries
/// that are unreadable or not marker-shaped are skipped.
pub fn scan_markers(dir: &Path) -> Vec<SavedRangeRecord> {
    let mut records = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
    {
        let Some(name) = entry.file_name().to_str() else {
            continue;
        };
        if let Some((scope, interval, kind)) = parse_marker_name(name) {
            records.push(SavedRangeRecord {
                scope,
                interval,
                kind,
                path: entry.path().to_path_buf(),
            });
        }
    }
    records
}

/// Sub-intervals of `full` not covered by `existing`.
///
/// Records outside `full` are ignored; the rest are merged (touching counts
/// as merged) and the gaps between them come back disjoint and sorted.
/// Together with the merged coverage they tile `full` exactly.
pub fn missing_ranges(existing: &[DateInterval], full: &DateInterval) -> Vec<DateInterval> {
    // Zero-width sentinels pin the merge to the endpoints of `full`, so
    // leading and trailing gaps fall out of the same pass as interior ones.
    let mut spans: Vec<(NaiveDate, NaiveDate)> = vec![
        (full.start(), full.start()),
        (full.end(), full.end()),
    ];
    spans.extend(
        existing
            .iter()
            .filter(|interval| interval.overlaps(full))
            .map(|interval| (interval.start(), interval.end())),
    );
    spans.sort();

    let mut merged: Vec<(NaiveDate, NaiveDate)> = Vec::new();
    for (start, end) in spans {
        match merged.last_mut() {
            Some(last) if start <= last.1 => last.1 = last.1.max(end),
            _ => merged.push((start, end)),
        }
    }

    let mut gaps = Vec::new();
    for pair in merged.windows(2) {
        let (prev_end, next_start) = (pair[0].1, pair[1].0);
        if prev_end < next_start
            && let Ok(gap) = DateInterval::new(prev_end, next_start)
        {
            gaps.push(gap);
        }
    }
    gaps
}
