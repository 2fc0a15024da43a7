//! Per-document retrieval with resumable status markers.
//!
//! Every document owns a directory holding its endpoint payloads, drawing
//! pages, and a status marker. Reruns consult the marker first and the
//! individual files second, so an interrupted run picks up where it
//! stopped without refetching anything already on disk.

use std::fs;
use std::path::Path;
use std::time::Instant;

use serde_json::Value;
use tracing::{info, warn};

use crate::api::ops::{parse_count, singleton_or_list};
use crate::api::{DocumentClient, eps_document_code};
use crate::constants::endpoints::DOCUMENT_ENDPOINTS;
use crate::constants::retrieval::{
    DRAWING_DESC, DRAWING_DIR, STATUS_DONE, STATUS_FILENAME, STATUS_MISSING,
};
use crate::errors::HarvestError;
use crate::types::DocumentId;

/// What happened to one document during a retrieval pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Every endpoint payload and drawing page is on disk; marked done.
    Fetched,
    /// A status marker from an earlier run short-circuited the fetch.
    Skipped,
    /// The upstream reported an error for an endpoint; marked missing so
    /// later runs skip the document.
    Missing,
}

/// Tally across one retrieval run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RetrievalReport {
    /// Documents fetched to completion in this run.
    pub fetched: usize,
    /// Documents short-circuited by a status marker or existing file.
    pub skipped: usize,
    /// Documents newly marked missing.
    pub missing: usize,
    /// Documents left unfinished by an upstream error.
    pub failed: usize,
}

/// Reads document ids from a list file, one per line, skipping blanks.
pub fn read_document_list(path: &Path) -> Result<Vec<DocumentId>, HarvestError> {
    let contents = fs::read_to_string(path)?;
    Ok(contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

fn read_status(dir: &Path) -> Result<Option<String>, HarvestError> {
    let path = dir.join(STATUS_FILENAME);
    if !path.exists() {
        return Ok(None);
    }
    Ok(Some(fs::read_to_string(path)?))
}

fn write_status(dir: &Path, status: &str) -> Result<(), HarvestError> {
    fs::write(dir.join(STATUS_FILENAME), status)?;
    Ok(())
}

/// Fetches one document's endpoint payloads and drawing pages into
/// `output_dir/{document}/`.
///
/// A `Missing EPO document` marker always short-circuits; `Done
/// processing` short-circuits unless `overwrite` is set. An upstream error
/// on any endpoint marks the document missing and abandons it, leaving
/// whatever was already written in place.
pub fn fetch_document(
    client: &dyn DocumentClient,
    document: &DocumentId,
    output_dir: &Path,
    overwrite: bool,
) -> Result<FetchOutcome, HarvestError> {
    let doc_dir = output_dir.join(document);
    fs::create_dir_all(&doc_dir)?;

    if let Some(status) = read_status(&doc_dir)? {
        if status == STATUS_MISSING {
            return Ok(FetchOutcome::Skipped);
        }
        if status == STATUS_DONE && !overwrite {
            return Ok(FetchOutcome::Skipped);
        }
    }

    for endpoint in DOCUMENT_ENDPOINTS {
        let path = doc_dir.join(format!("{endpoint}.json"));
        if !overwrite && path.exists() {
            continue;
        }
        match client.endpoint_json(document, endpoint) {
            Ok(payload) => fs::write(&path, payload)?,
            Err(HarvestError::Upstream { scope, reason }) => {
                warn!("[harvest:retrieve] upstream error for {scope}: {reason}");
                write_status(&doc_dir, STATUS_MISSING)?;
                return Ok(FetchOutcome::Missing);
            }
            Err(err) => return Err(err),
        }
    }

    fetch_drawings(client, document, &doc_dir, overwrite)?;
    write_status(&doc_dir, STATUS_DONE)?;
    Ok(FetchOutcome::Fetched)
}

/// Walks the image inquiry already on disk and fetches every page of the
/// drawing instances into `Drawing/{page:02}.tiff`.
fn fetch_drawings(
    client: &dyn DocumentClient,
    document: &DocumentId,
    doc_dir: &Path,
    overwrite: bool,
) -> Result<(), HarvestError> {
    let inquiry: Value = serde_json::from_str(&fs::read_to_string(doc_dir.join("images.json"))?)?;
    let instances = &inquiry["ops:world-patent-data"]["ops:document-inquiry"]
        ["ops:inquiry-result"]["ops:document-instance"];
    if instances.is_null() {
        return Err(HarvestError::MalformedDocument {
            document: document.clone(),
            details: "image inquiry lacks a document-instance list".to_string(),
        });
    }

    for instance in singleton_or_list(instances) {
        if instance["@desc"].as_str() != Some(DRAWING_DESC) {
            continue;
        }
        let pages = parse_count(&instance["@number-of-pages"]).ok_or_else(|| {
            HarvestError::MalformedDocument {
                document: document.clone(),
                details: "drawing instance lacks a page count".to_string(),
            }
        })?;
        let Some(link) = instance["@link"].as_str() else {
            return Err(HarvestError::MalformedDocument {
                document: document.clone(),
                details: "drawing instance lacks a link".to_string(),
            });
        };
        let drawing_dir = doc_dir.join(DRAWING_DIR);
        fs::create_dir_all(&drawing_dir)?;
        for page in 1..=pages {
            let path = drawing_dir.join(format!("{page:02}.tiff"));
            if !overwrite && path.exists() {
                continue;
            }
            let bytes = client.drawing_page(link, page as u32)?;
            fs::write(&path, bytes)?;
        }
    }
    Ok(())
}

/// Fetches each listed document in order, tallying outcomes.
///
/// Upstream errors raised past the endpoint stage (drawing pages) leave
/// the document unfinished for the next run instead of aborting the walk;
/// anything else aborts.
pub fn retrieve_documents(
    client: &dyn DocumentClient,
    documents: &[DocumentId],
    output_dir: &Path,
    overwrite: bool,
) -> Result<RetrievalReport, HarvestError> {
    fs::create_dir_all(output_dir)?;
    info!(
        "[harvest:retrieve] fetching {} documents into {}",
        documents.len(),
        output_dir.display()
    );
    let mut report = RetrievalReport::default();
    let started = Instant::now();
    for (index, document) in documents.iter().enumerate() {
        match fetch_document(client, document, output_dir, overwrite) {
            Ok(FetchOutcome::Fetched) => report.fetched += 1,
            Ok(FetchOutcome::Skipped) => report.skipped += 1,
            Ok(FetchOutcome::Missing) => report.missing += 1,
            Err(HarvestError::Upstream { scope, reason }) => {
                warn!("[harvest:retrieve] leaving {document} unfinished: {scope}: {reason}");
                report.failed += 1;
            }
            Err(err) => return Err(err),
        }
        if (index + 1).is_multiple_of(50) {
            eprintln!(
                "[harvest:retrieve] {}/{} documents ({:.1}s elapsed)",
                index + 1,
                documents.len(),
                started.elapsed().as_secs_f64()
            );
        }
    }
    info!(
        "[harvest:retrieve] done: {} fetched, {} skipped, {} missing, {} failed",
        report.fetched, report.skipped, report.missing, report.failed
    );
    Ok(report)
}

/// Downloads one publication archive as `{code}.zip` under `output_dir`,
/// writing through a `.part` file so interrupted downloads never leave a
/// plausible-looking archive behind. Returns whether anything was fetched.
pub fn fetch_publication_archive(
    client: &dyn DocumentClient,
    document: &DocumentId,
    output_dir: &Path,
    overwrite: bool,
) -> Result<bool, HarvestError> {
    let target = output_dir.join(format!("{}.zip", eps_document_code(document)));
    if !overwrite && target.exists() {
        return Ok(false);
    }
    let bytes = client.publication_archive(document)?;
    let temp_target = target.with_extension("part");
    fs::write(&temp_target, &bytes)?;
    fs::rename(&temp_target, &target)?;
    Ok(true)
}

/// Downloads the publication archive for each listed document in order.
///
/// Upstream errors skip the document and keep walking, so one missing
/// archive does not strand the rest of the list.
pub fn fetch_publication_archives(
    client: &dyn DocumentClient,
    documents: &[DocumentId],
    output_dir: &Path,
    overwrite: bool,
) -> Result<RetrievalReport, HarvestError> {
    fs::create_dir_all(output_dir)?;
    info!(
        "[harvest:retrieve] fetching {} publication archives into {}",
        documents.len(),
        output_dir.display()
    );
    let mut report = RetrievalReport::default();
    let started = Instant::now();
    for (index, document) in documents.iter().enumerate() {
        match fetch_publication_archive(client, document, output_dir, overwrite) {
            Ok(true) => report.fetched += 1,
            Ok(false) => report.skipped += 1,
            Err(HarvestError::Upstream { scope, reason }) => {
                warn!("[harvest:retrieve] skipping archive for {scope}: {reason}");
                report.failed += 1;
            }
            Err(err) => return Err(err),
        }
        if (index + 1).is_multiple_of(50) {
            eprintln!(
                "[harvest:retrieve] {}/{} archives ({:.1}s elapsed)",
                index + 1,
                documents.len(),
                started.elapsed().as_secs_f64()
            );
        }
    }
    info!(
        "[harvest:retrieve] done: {} fetched, {} skipped, {} failed",
        report.fetched, report.skipped, report.failed
    );
    Ok(report)
}
