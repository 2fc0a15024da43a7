use crate::constants::{paging, sampling};

/// Behavior when a stratum's eligible pool is smaller than its desired count.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShortfallPolicy {
    /// Surface a shortfall error and abort the run.
    Fail,
    /// Log a warning and take every eligible item.
    Degrade,
}

impl Default for ShortfallPolicy {
    fn default() -> Self {
        Self::Degrade
    }
}

/// Search-side limits and filters.
#[derive(Clone, Debug)]
pub struct SearchSettings {
    /// Reachable-results quota; intervals counting at or over this are split.
    pub quota: u64,
    /// Ids per page window.
    pub page_width: usize,
    /// Publication-number country filter in CQL queries.
    pub country: String,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            quota: paging::RESULT_QUOTA,
            page_width: paging::RESULT_WINDOW,
            country: "EP".to_string(),
        }
    }
}

/// Seeds and policies shared by the weekly, allocation, and complement stages.
#[derive(Clone, Debug)]
pub struct SamplingSettings {
    /// Added to the period number when deriving each period's RNG, so one
    /// period's draw is independent of which other periods run.
    pub base_seed: u64,
    /// What to do when a stratum cannot fill its desired count.
    pub shortfall: ShortfallPolicy,
    /// Size of the top coarse-class frequency table.
    pub top_class_count: usize,
}

impl Default for SamplingSettings {
    fn default() -> Self {
        Self {
            base_seed: sampling::DEFAULT_SEED,
            shortfall: ShortfallPolicy::default(),
            top_class_count: sampling::TOP_CLASS_COUNT,
        }
    }
}
