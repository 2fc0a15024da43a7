/// Paging and quota limits imposed by the published-data search endpoint.
pub mod paging {
    /// Max ids a single search window may span.
    pub const RESULT_WINDOW: usize = 100;
    /// Hard cap on reachable results per query; an interval counting at or
    /// over this must be split before paging.
    pub const RESULT_QUOTA: u64 = 2000;
    /// Window width used when only the total-result count is needed.
    pub const COUNT_PROBE_WIDTH: usize = 2;
}

/// Upstream service locations and per-document resource names.
pub mod endpoints {
    /// Base URL for Open Patent Services REST calls.
    pub const OPS_BASE_URL: &str = "https://ops.epo.org/3.2/rest-services";
    /// Search path under the OPS base.
    pub const SEARCH_PATH: &str = "published-data/search";
    /// Path prefix for per-document published-data resources (epodoc ids).
    pub const PUBLISHED_DATA_PATH: &str = "published-data/publication/epodoc";
    /// Per-document resources fetched during retrieval, in this order.
    pub const DOCUMENT_ENDPOINTS: [&str; 5] =
        ["fulltext", "biblio", "description", "claims", "images"];
    /// Header carrying a one-based inclusive result window as `begin-end`,
    /// or a single page number for image requests.
    pub const RANGE_HEADER: &str = "X-OPS-Range";
    /// Publication-server URL prefix; the NW-joined document code goes
    /// between prefix and suffix.
    pub const EPS_URL_PREFIX: &str = "https://data.epo.org/publication-server/rest/v1.2/patents/";
    /// Publication-server URL suffix.
    pub const EPS_URL_SUFFIX: &str = "/document.zip";
}

/// Per-document status markers and drawing layout.
pub mod retrieval {
    /// Marker file consulted before fetching a document.
    pub const STATUS_FILENAME: &str = "status.txt";
    /// Status for documents the upstream reported an error for; always
    /// skipped on later runs.
    pub const STATUS_MISSING: &str = "Missing EPO document";
    /// Status for fully retrieved documents; skipped unless overwriting.
    pub const STATUS_DONE: &str = "Done processing";
    /// Subdirectory drawing pages are written to.
    pub const DRAWING_DIR: &str = "Drawing";
    /// Instance description marking drawing image sets.
    pub const DRAWING_DESC: &str = "Drawing";
    /// Media type requested for drawing pages.
    pub const TIFF_FORMAT: &str = "application/tiff";
    /// Subdirectory broken archives are quarantined into.
    pub const BROKEN_DIR: &str = "broken_files";
}

/// Seeds and table sizes for stratified sampling.
pub mod sampling {
    /// Base seed added to the period number when deriving per-period RNGs.
    pub const DEFAULT_SEED: u64 = 1729;
    /// Number of top coarse classes kept in frequency tables.
    pub const TOP_CLASS_COUNT: usize = 20;
    /// Days per sampling week.
    pub const WEEK_DAYS: u64 = 7;
}

/// Fixed report filenames written by the statistics and complement stages.
pub mod reports {
    /// Sorted ids of every archive that scanned cleanly.
    pub const NETTO_PATENTS_FILE: &str = "downloaded_netto_patents.txt";
    /// Archives that failed to scan, one path per line.
    pub const ERROR_PATENTS_FILE: &str = "error_loading_patents.txt";
    /// Year to sorted document ids.
    pub const YEARLY_PATENTS_FILE: &str = "yearly_patents.json";
    /// Year to fine-grained class counts.
    pub const YEARLY_CLASSES_FILE: &str = "yearly_patent_classes.json";
    /// Year to coarse class counts.
    pub const YEARLY_COARSE_CLASSES_FILE: &str = "yearly_coarse_patent_classes.json";
    /// Fine-grained classes by descending count.
    pub const FINE_RANK_FILE: &str = "fine_grained_by_rank.csv";
    /// Top coarse classes overall, rank order.
    pub const TOP_COARSE_FILE: &str = "most_common_20_main_classes.txt";
    /// Year to its top coarse class counts.
    pub const TOP_BY_YEAR_FILE: &str = "most_common_by_year.json";
    /// Year to class to sampled complement ids.
    pub const COMPLEMENT_BY_YEAR_FILE: &str = "sampled_complement_patents_by_year.json";
    /// Flat sorted complement ids.
    pub const COMPLEMENT_FLAT_FILE: &str = "sampled_complement_patents.txt";
    /// Year to sorted document ids collated from weekly samples.
    pub const YEARLY_DOCS_FILE: &str = "yearly_docs.json";
}
