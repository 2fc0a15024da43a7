#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

/// Search and retrieval clients for the upstream patent API.
pub mod api;
/// Reusable CLI runners shared by the binaries.
pub mod apps;
/// Publication archive extraction, checking, and packaging.
pub mod archive;
/// Classification pairs and per-year tallies.
pub mod classes;
/// Collation of weekly sample markers into per-year lists.
pub mod collate;
/// Complement sampling against the netto list.
pub mod complement;
/// Search and sampling configuration types.
pub mod config;
/// Centralized constants used across scanning, retrieval, and reports.
pub mod constants;
/// Range marker files and coverage gap detection.
pub mod coverage;
/// Patent info extraction from document XML.
pub mod extract;
/// Half-open date intervals and calendar helpers.
pub mod intervals;
/// Paged result collection under a result quota.
pub mod paging;
/// Adaptive date-range partitioning.
pub mod partition;
/// Per-document retrieval with resumable status markers.
pub mod retrieval;
/// Deterministic drawing primitives shared by the samplers.
pub mod sampling;
/// Class and weekly scans over the search API.
pub mod scan;
/// Classification statistics and the desired allocation.
pub mod stats;
/// Shared type aliases.
pub mod types;

mod errors;

pub use api::{DocumentClient, OpsClient, SearchClient};
pub use classes::{ClassPair, ClassTally};
pub use config::{SamplingSettings, SearchSettings, ShortfallPolicy};
pub use coverage::{MarkerKind, SavedRangeRecord};
pub use errors::HarvestError;
pub use extract::PatentInfo;
pub use intervals::DateInterval;
pub use paging::{PageWindow, SearchPage};
pub use partition::CountedInterval;
pub use retrieval::{FetchOutcome, RetrievalReport};
pub use types::{CqlQuery, DocumentId, MainClass, ScopeLabel, SubClass, Year};
