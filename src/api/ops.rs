//! REST clients for the published-data search, document retrieval, and
//! publication-server archive services.

use std::io::Read;

use serde_json::Value;
use tracing::debug;

use crate::constants::endpoints::{
    EPS_URL_PREFIX, EPS_URL_SUFFIX, OPS_BASE_URL, PUBLISHED_DATA_PATH, RANGE_HEADER, SEARCH_PATH,
};
use crate::constants::paging::COUNT_PROBE_WIDTH;
use crate::constants::retrieval::TIFF_FORMAT;
use crate::errors::HarvestError;
use crate::paging::{PageWindow, SearchPage};
use crate::types::{CqlQuery, DocumentId};

use super::{DocumentClient, SearchClient, eps_document_code};

/// Client for the production REST services.
///
/// Counting costs one search request with a minimal window; the total
/// result count ships in every search response header block.
pub struct OpsClient {
    base_url: String,
    eps_prefix: String,
}

impl OpsClient {
    /// Client against the production service locations.
    pub fn new() -> Self {
        Self {
            base_url: OPS_BASE_URL.to_string(),
            eps_prefix: EPS_URL_PREFIX.to_string(),
        }
    }

    /// Overrides the search and published-data base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Overrides the publication-server URL prefix.
    pub fn with_eps_prefix(mut self, eps_prefix: impl Into<String>) -> Self {
        self.eps_prefix = eps_prefix.into();
        self
    }

    fn search(&self, query: &CqlQuery, window: PageWindow) -> Result<SearchPage, HarvestError> {
        let url = format!("{}/{}", self.base_url, SEARCH_PATH);
        debug!("[harvest:api] search '{query}' window {window}");
        let response = ureq::get(&url)
            .query("q", query)
            .header("Accept", "application/json")
            .header(RANGE_HEADER, &window.to_string())
            .call()
            .map_err(|err| HarvestError::Upstream {
                scope: query.clone(),
                reason: format!("search request failed: {err}"),
            })?;
        let body = response
            .into_body()
            .read_to_string()
            .map_err(|err| HarvestError::Upstream {
                scope: query.clone(),
                reason: format!("failed reading search response body: {err}"),
            })?;
        decode_search_page(query, &body)
    }
}

impl Default for OpsClient {
    fn default() -> Self {
        Self::new()
    }
}

impl SearchClient for OpsClient {
    fn count(&self, query: &CqlQuery) -> Result<u64, HarvestError> {
        let probe = PageWindow {
            begin: 1,
            end: COUNT_PROBE_WIDTH,
        };
        Ok(self.search(query, probe)?.total)
    }

    fn page(&self, query: &CqlQuery, window: PageWindow) -> Result<SearchPage, HarvestError> {
        self.search(query, window)
    }
}

impl DocumentClient for OpsClient {
    fn endpoint_json(
        &self,
        document: &DocumentId,
        endpoint: &str,
    ) -> Result<Vec<u8>, HarvestError> {
        let url = format!("{}/{}/{document}/{endpoint}", self.base_url, PUBLISHED_DATA_PATH);
        let scope = format!("{document} {endpoint}");
        debug!("[harvest:api] fetching {url}");
        let response = ureq::get(&url)
            .header("Accept", "application/json")
            .call()
            .map_err(|err| HarvestError::Upstream {
                scope: scope.clone(),
                reason: format!("endpoint request failed: {err}"),
            })?;
        read_all(response.into_body().into_reader(), &scope)
    }

    fn drawing_page(&self, link: &str, page: u32) -> Result<Vec<u8>, HarvestError> {
        let url = format!("{}/{link}", self.base_url);
        let scope = format!("{link} page {page}");
        debug!("[harvest:api] fetching {url} page {page}");
        let response = ureq::get(&url)
            .header("Accept", TIFF_FORMAT)
            .header(RANGE_HEADER, &page.to_string())
            .call()
            .map_err(|err| HarvestError::Upstream {
                scope: scope.clone(),
                reason: format!("image request failed: {err}"),
            })?;
        read_all(response.into_body().into_reader(), &scope)
    }

    fn publication_archive(&self, document: &DocumentId) -> Result<Vec<u8>, HarvestError> {
        let url = format!("{}{}{EPS_URL_SUFFIX}", self.eps_prefix, eps_document_code(document));
        debug!("[harvest:api] fetching {url}");
        let response = ureq::get(&url).call().map_err(|err| HarvestError::Upstream {
            scope: document.clone(),
            reason: format!("archive request failed: {err}"),
        })?;
        read_all(response.into_body().into_reader(), document)
    }
}

fn read_all(mut reader: impl Read, scope: &str) -> Result<Vec<u8>, HarvestError> {
    let mut bytes = Vec::new();
    reader
        .read_to_end(&mut bytes)
        .map_err(|err| HarvestError::Upstream {
            scope: scope.to_string(),
            reason: format!("failed reading response body: {err}"),
        })?;
    Ok(bytes)
}

/// Decodes one search response into its total count and document ids.
///
/// A window holding a single result ships the publication reference as a
/// lone object rather than a list; both shapes decode the same way.
pub(crate) fn decode_search_page(
    query: &CqlQuery,
    body: &str,
) -> Result<SearchPage, HarvestError> {
    let json: Value = serde_json::from_str(body).map_err(|err| HarvestError::Upstream {
        scope: query.clone(),
        reason: format!("failed parsing search response: {err}"),
    })?;
    let biblio = &json["ops:world-patent-data"]["ops:biblio-search"];
    let total = parse_count(&biblio["@total-result-count"]).ok_or_else(|| {
        HarvestError::Upstream {
            scope: query.clone(),
            reason: "search response lacks @total-result-count".to_string(),
        }
    })?;

    let references = &biblio["ops:search-result"]["ops:publication-reference"];
    let mut ids = Vec::new();
    for reference in singleton_or_list(references) {
        let document_id = &reference["document-id"];
        let country = dollar_str(&document_id["country"]);
        let number = dollar_str(&document_id["doc-number"]);
        let kind = dollar_str(&document_id["kind"]);
        match (country, number, kind) {
            (Some(country), Some(number), Some(kind)) => {
                ids.push(format!("{country}{number}.{kind}"));
            }
            _ => {
                return Err(HarvestError::Upstream {
                    scope: query.clone(),
                    reason: "publication reference lacks a complete document id".to_string(),
                });
            }
        }
    }
    Ok(SearchPage { total, ids })
}

/// Normalizes the single-result object form to a one-element list.
pub(crate) fn singleton_or_list(value: &Value) -> Vec<&Value> {
    match value {
        Value::Array(items) => items.iter().collect(),
        Value::Null => Vec::new(),
        other => vec![other],
    }
}

/// Counts arrive as strings or numbers depending on the service.
pub(crate) fn parse_count(value: &Value) -> Option<u64> {
    match value {
        Value::String(text) => text.parse().ok(),
        Value::Number(number) => number.as_u64(),
        _ => None,
    }
}

/// Text leaves are wrapped as `{"$": "..."}` in the JSON rendering.
pub(crate) fn dollar_str(value: &Value) -> Option<&str> {
    match value {
        Value::Object(map) => map.get("$").and_then(Value::as_str),
        Value::String(text) => Some(text),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_a_listed_search_page() {
        let body = r#"{
            "ops:world-patent-data": {
                "ops:biblio-search": {
                    "@total-result-count": "524",
                    "ops:query": {"$": "pd within \"20030101 20030107\""},
                    "ops:range": {"@begin": "1", "@end": "2"},
                    "ops:search-result": {
                        "ops:publication-reference": [
                            {
                                "@family-id": "8185719",
                                "document-id": {
                                    "@document-id-type": "epodoc",
                                    "country": {"$": "EP"},
                                    "doc-number": {"$": "1326370"},
                                    "kind": {"$": "A1"}
                                }
                            },
                            {
                                "document-id": {
                                    "country": {"$": "EP"},
                                    "doc-number": {"$": "1326371"},
                                    "kind": {"$": "A2"}
                                }
                            }
                        ]
                    }
                }
            }
        }"#;
        let page = decode_search_page(&"q".to_string(), body).unwrap();
        assert_eq!(page.total, 524);
        assert_eq!(page.ids, vec!["EP1326370.A1".to_string(), "EP1326371.A2".to_string()]);
    }

    #[test]
    fn single_result_object_decodes_as_one_entry() {
        let body = r#"{
            "ops:world-patent-data": {
                "ops:biblio-search": {
                    "@total-result-count": 1,
                    "ops:search-result": {
                        "ops:publication-reference": {
                            "document-id": {
                                "country": {"$": "EP"},
                                "doc-number": {"$": "1000000"},
                                "kind": {"$": "B1"}
                            }
                        }
                    }
                }
            }
        }"#;
        let page = decode_search_page(&"q".to_string(), body).unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.ids, vec!["EP1000000.B1".to_string()]);
    }

    #[test]
    fn count_probe_responses_need_no_references() {
        let body = r#"{
            "ops:world-patent-data": {
                "ops:biblio-search": {
                    "@total-result-count": "0"
                }
            }
        }"#;
        let page = decode_search_page(&"q".to_string(), body).unwrap();
        assert_eq!(page.total, 0);
        assert!(page.ids.is_empty());
    }

    #[test]
    fn missing_total_count_is_an_upstream_error() {
        let body = r#"{"ops:world-patent-data": {}}"#;
        let err = decode_search_page(&"q".to_string(), body).unwrap_err();
        assert!(matches!(err, HarvestError::Upstream { .. }));
    }

    #[test]
    fn incomplete_document_ids_are_upstream_errors() {
        let body = r#"{
            "ops:world-patent-data": {
                "ops:biblio-search": {
                    "@total-result-count": "1",
                    "ops:search-result": {
                        "ops:publication-reference": {
                            "document-id": {"country": {"$": "EP"}}
                        }
                    }
                }
            }
        }"#;
        let err = decode_search_page(&"q".to_string(), body).unwrap_err();
        assert!(matches!(err, HarvestError::Upstream { .. }));
    }

    #[test]
    fn counts_decode_from_strings_and_numbers() {
        assert_eq!(parse_count(&serde_json::json!("2000")), Some(2000));
        assert_eq!(parse_count(&serde_json::json!(17)), Some(17));
        assert_eq!(parse_count(&serde_json::json!("x")), None);
        assert_eq!(parse_count(&serde_json::json!(null)), None);
    }
}
