use std::io;

use thiserror::Error;

/// Error type for upstream requests, quota violations, sampling, and
/// filesystem failures.
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("upstream request for {scope} failed: {reason}")]
    Upstream { scope: String, reason: String },
    #[error("interval {interval} holds {count} results, at or over the {limit} result quota")]
    QuotaExceeded {
        interval: String,
        count: u64,
        limit: u64,
    },
    #[error("interval {interval} still holds {count} results but cannot be split further")]
    UnsplittableInterval { interval: String, count: u64 },
    #[error("stratum '{stratum}' wants {wanted} samples but only {available} are eligible")]
    SampleShortfall {
        stratum: String,
        wanted: usize,
        available: usize,
    },
    #[error("malformed document {document}: {details}")]
    MalformedDocument { document: String, details: String },
    #[error("archive failure: {0}")]
    Archive(String),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("json failure: {0}")]
    Json(#[from] serde_json::Error),
    #[error("csv failure: {0}")]
    Csv(#[from] csv::Error),
    #[error("configuration error: {0}")]
    Configuration(String),
}
