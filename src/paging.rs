//! Quota-aware page walking over search results.

use std::fmt;

use crate::errors::HarvestError;
use crate::intervals::DateInterval;
use crate::types::DocumentId;

/// One-based inclusive `[begin, end]` window into a result list.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageWindow {
    /// First result index in the window.
    pub begin: usize,
    /// Last result index in the window.
    pub end: usize,
}

impl fmt::Display for PageWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.begin, self.end)
    }
}

/// Ordered ids for one window plus the authoritative total.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SearchPage {
    /// Total results the query matches, independent of the window.
    pub total: u64,
    /// Ids in result order for the requested window.
    pub ids: Vec<DocumentId>,
}

/// Windows covering `total` results: `[1,w], [w+1,2w]…`, the final window
/// clamped to `total`.
pub fn page_windows(total: u64, width: usize) -> Vec<PageWindow> {
    let mut windows = Vec::new();
    if width == 0 {
        return windows;
    }
    let total = total as usize;
    let mut begin = 1usize;
    while begin <= total {
        let end = (begin + width - 1).min(total);
        windows.push(PageWindow { begin, end });
        begin = end + 1;
    }
    windows
}

/// Walks every page of a leaf interval's results, in order.
///
/// The first window `[1, width]` carries the authoritative total. A total at
/// or over `quota` means the interval was never a leaf, which aborts with
/// [`HarvestError::QuotaExceeded`]. Any page error surfaces immediately and
/// the ids collected so far for the interval are discarded with it.
pub fn collect_interval(
    interval: &DateInterval,
    quota: u64,
    width: usize,
    mut fetch_page: impl FnMut(PageWindow) -> Result<SearchPage, HarvestError>,
) -> Result<Vec<DocumentId>, HarvestError> {
    let first = fetch_page(PageWindow {
        begin: 1,
        end: width,
    })?;
    if first.total >= quota {
        return Err(HarvestError::QuotaExceeded {
            interval: interval.to_string(),
            count: first.total,
            limit: quota,
        });
    }
    let mut ids = first.ids;
    for window in page_windows(first.total, width).into_iter().skip(1) {
        let page = fetch_page(window)?;
        ids.extend(page.ids);
    }
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn leaf() -> DateInterval {
        DateInterval::new(
            NaiveDate::from_ymd_opt(2003, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2003, 2, 1).unwrap(),
        )
        .unwrap()
    }

    fn scripted_ids(count: usize) -> Vec<DocumentId> {
        (1..=count).map(|n| format!("EP{n:07}.A1")).collect()
    }

    fn serve(ids: &[DocumentId], window: PageWindow) -> SearchPage {
        let begin = (window.begin - 1).min(ids.len());
        let end = window.end.min(ids.len());
        SearchPage {
            total: ids.len() as u64,
            ids: ids[begin..end].to_vec(),
        }
    }

    #[test]
    fn window_math_clamps_the_final_window() {
        assert_eq!(
            page_windows(250, 100),
            vec![
                PageWindow { begin: 1, end: 100 },
                PageWindow { begin: 101, end: 200 },
                PageWindow { begin: 201, end: 250 },
            ]
        );
        assert_eq!(page_windows(0, 100), Vec::new());
        assert_eq!(page_windows(100, 100), vec![PageWindow { begin: 1, end: 100 }]);
    }

    #[test]
    fn collects_250_results_with_three_requests() {
        let ids = scripted_ids(250);
        let mut requested = Vec::new();
        let collected = collect_interval(&leaf(), 2000, 100, |window| {
            requested.push(window);
            Ok(serve(&ids, window))
        })
        .unwrap();
        assert_eq!(
            requested,
            vec![
                PageWindow { begin: 1, end: 100 },
                PageWindow { begin: 101, end: 200 },
                PageWindow { begin: 201, end: 250 },
            ]
        );
        assert_eq!(collected, ids);
    }

    #[test]
    fn single_page_needs_one_request() {
        let ids = scripted_ids(40);
        let mut requests = 0;
        let collected = collect_interval(&leaf(), 2000, 100, |window| {
            requests += 1;
            Ok(serve(&ids, window))
        })
        .unwrap();
        assert_eq!(requests, 1);
        assert_eq!(collected, ids);
    }

    #[test]
    fn over_quota_total_aborts_the_walk() {
        let result = collect_interval(&leaf(), 2000, 100, |_| {
            Ok(SearchPage {
                total: 2000,
                ids: scripted_ids(100),
            })
        });
        assert!(matches!(
            result,
            Err(HarvestError::QuotaExceeded {
                count: 2000,
                limit: 2000,
                ..
            })
        ));
    }

    #[test]
    fn page_error_discards_collected_prefix() {
        let ids = scripted_ids(250);
        let result = collect_interval(&leaf(), 2000, 100, |window| {
            if window.begin > 100 {
                Err(HarvestError::Upstream {
                    scope: "test".to_string(),
                    reason: "window failed".to_string(),
                })
            } else {
                Ok(serve(&ids, window))
            }
        });
        assert!(matches!(result, Err(HarvestError::Upstream { .. })));
    }
}
