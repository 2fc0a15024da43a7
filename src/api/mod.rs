//! Patent office service interfaces.
//!
//! Ownership model:
//! - `SearchClient` answers count probes and serves result windows for a
//!   query; paging math stays with the caller.
//! - `DocumentClient` fetches per-document endpoint payloads, drawing
//!   pages, and whole publication archives.
//! - `OpsClient` implements both against the production REST services;
//!   the scripted variants replay fixed payloads for tests and dry runs.

use std::cell::RefCell;

use indexmap::IndexMap;

use crate::errors::HarvestError;
use crate::paging::{PageWindow, SearchPage};
use crate::types::{CqlQuery, DocumentId};

/// REST implementations.
pub mod ops;
pub use ops::OpsClient;

/// Published-data search interface.
pub trait SearchClient {
    /// Total number of results the query matches.
    fn count(&self, query: &CqlQuery) -> Result<u64, HarvestError>;
    /// One result window, one-based and inclusive on both ends.
    fn page(&self, query: &CqlQuery, window: PageWindow) -> Result<SearchPage, HarvestError>;
}

/// Per-document retrieval interface.
pub trait DocumentClient {
    /// Raw payload of one published-data endpoint for a document.
    fn endpoint_json(&self, document: &DocumentId, endpoint: &str)
    -> Result<Vec<u8>, HarvestError>;
    /// One drawing page behind an inquiry link.
    fn drawing_page(&self, link: &str, page: u32) -> Result<Vec<u8>, HarvestError>;
    /// Full publication archive for a document.
    fn publication_archive(&self, document: &DocumentId) -> Result<Vec<u8>, HarvestError>;
}

/// Document code used by the publication server, with the kind separator
/// replaced: `EP1326370.A1` becomes `EP1326370NWA1`.
pub fn eps_document_code(document: &DocumentId) -> String {
    document.replace('.', "NW")
}

/// In-memory search backend for tests and dry runs.
///
/// Holds the complete result list per query and records every window it
/// serves, in request order.
#[derive(Default)]
pub struct ScriptedSearch {
    results: IndexMap<CqlQuery, Vec<DocumentId>>,
    counted: RefCell<Vec<CqlQuery>>,
    served: RefCell<Vec<(CqlQuery, PageWindow)>>,
}

impl ScriptedSearch {
    /// Creates an empty backend; queries it does not know fail as upstream
    /// errors.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the full result list for one query.
    pub fn with_results(mut self, query: impl Into<CqlQuery>, ids: Vec<DocumentId>) -> Self {
        self.results.insert(query.into(), ids);
        self
    }

    /// Queries counted so far, in request order.
    pub fn counted_queries(&self) -> Vec<CqlQuery> {
        self.counted.borrow().clone()
    }

    /// Windows served so far, in request order.
    pub fn served_windows(&self) -> Vec<(CqlQuery, PageWindow)> {
        self.served.borrow().clone()
    }

    fn lookup(&self, query: &CqlQuery) -> Result<&Vec<DocumentId>, HarvestError> {
        self.results.get(query).ok_or_else(|| HarvestError::Upstream {
            scope: query.clone(),
            reason: "no scripted results for this query".to_string(),
        })
    }
}

impl SearchClient for ScriptedSearch {
    fn count(&self, query: &CqlQuery) -> Result<u64, HarvestError> {
        let ids = self.lookup(query)?;
        self.counted.borrow_mut().push(query.clone());
        Ok(ids.len() as u64)
    }

    fn page(&self, query: &CqlQuery, window: PageWindow) -> Result<SearchPage, HarvestError> {
        let ids = self.lookup(query)?;
        self.served.borrow_mut().push((query.clone(), window));
        let begin = window.begin.saturating_sub(1);
        let end = window.end.min(ids.len());
        let page_ids = if begin < end {
            ids[begin..end].to_vec()
        } else {
            Vec::new()
        };
        Ok(SearchPage {
            total: ids.len() as u64,
            ids: page_ids,
        })
    }
}

/// In-memory document backend for tests and dry runs.
///
/// Anything not scripted fails as an upstream error, which is how the real
/// services report unknown documents.
#[derive(Default)]
pub struct ScriptedDocuments {
    endpoints: IndexMap<DocumentId, IndexMap<String, Vec<u8>>>,
    drawings: IndexMap<String, Vec<Vec<u8>>>,
    archives: IndexMap<DocumentId, Vec<u8>>,
}

impl ScriptedDocuments {
    /// Creates an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers one endpoint payload for a document.
    pub fn with_endpoint(
        mut self,
        document: impl Into<DocumentId>,
        endpoint: impl Into<String>,
        payload: impl Into<Vec<u8>>,
    ) -> Self {
        self.endpoints
            .entry(document.into())
            .or_default()
            .insert(endpoint.into(), payload.into());
        self
    }

    /// Registers the drawing pages behind an inquiry link, page 1 first.
    pub fn with_drawing_pages(mut self, link: impl Into<String>, pages: Vec<Vec<u8>>) -> Self {
        self.drawings.insert(link.into(), pages);
        self
    }

    /// Registers the publication archive bytes for a document.
    pub fn with_archive(
        mut self,
        document: impl Into<DocumentId>,
        bytes: impl Into<Vec<u8>>,
    ) -> Self {
        self.archives.insert(document.into(), bytes.into());
        self
    }
}

impl DocumentClient for ScriptedDocuments {
    fn endpoint_json(
        &self,
        document: &DocumentId,
        endpoint: &str,
    ) -> Result<Vec<u8>, HarvestError> {
        self.endpoints
            .get(document)
            .and_then(|payloads| payloads.get(endpoint))
            .cloned()
            .ok_or_else(|| HarvestError::Upstream {
                scope: format!("{document} {endpoint}"),
                reason: "no scripted payload".to_string(),
            })
    }

    fn drawing_page(&self, link: &str, page: u32) -> Result<Vec<u8>, HarvestError> {
        self.drawings
            .get(link)
            .and_then(|pages| pages.get(page.checked_sub(1)? as usize))
            .cloned()
            .ok_or_else(|| HarvestError::Upstream {
                scope: format!("{link} page {page}"),
                reason: "no scripted drawing page".to_string(),
            })
    }

    fn publication_archive(&self, document: &DocumentId) -> Result<Vec<u8>, HarvestError> {
        self.archives
            .get(document)
            .cloned()
            .ok_or_else(|| HarvestError::Upstream {
                scope: document.clone(),
                reason: "no scripted archive".to_string(),
            })
    }
}
