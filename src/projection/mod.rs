// SPDX-License-Identifier: MIT
//! Projection Engine — derives the visible page from a cache snapshot.
//!
//! `project` is a pure function of (snapshot, filter, page, limit): same
//! inputs, same output, no caching of intermediate results. It runs on
//! every cache change, which is fine at the target scale of hundreds of
//! items (one O(n) pass).

pub mod pager;

use serde::{Deserialize, Serialize};

use crate::model::{Filter, Page, Task};

/// What to do when the requested page exceeds the available pages —
/// e.g. after a mutation shrank the filtered set out from under the
/// current page index. Decided once per session, applied at every call
/// site.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PagePolicy {
    /// Clamp to the last non-empty page (page 1 for an empty set). The
    /// returned `Page.page` is the effective index.
    #[default]
    Clamp,
    /// Surface [`ProjectionError::PageOutOfRange`] so the caller can
    /// render an explicit "no such page" state.
    Strict,
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ProjectionError {
    #[error("page {requested} is out of range (last page is {last})")]
    PageOutOfRange { requested: u32, last: u32 },
    #[error("page size must be at least 1")]
    InvalidLimit,
}

/// Number of the last page for a filtered set of `filtered_total` items.
/// An empty set still has page 1 (an empty one).
pub fn last_page(filtered_total: usize, limit: u32) -> u32 {
    if filtered_total == 0 {
        1
    } else {
        (filtered_total as u32).div_ceil(limit)
    }
}

/// Filter, then slice `[(page-1)*limit, page*limit)`.
///
/// `page` is 1-based; page 0 is treated as out of range. Under
/// [`PagePolicy::Clamp`] an overshooting page index (or 0) is clamped
/// and the effective index is reported in the returned page.
pub fn project(
    tasks: &[Task],
    filter: Filter,
    page: u32,
    limit: u32,
    policy: PagePolicy,
) -> Result<Page, ProjectionError> {
    if limit == 0 {
        return Err(ProjectionError::InvalidLimit);
    }

    let filtered: Vec<&Task> = tasks.iter().filter(|t| filter.matches(t)).collect();
    let total = filtered.len();
    let last = last_page(total, limit);

    let effective = if (1..=last).contains(&page) {
        page
    } else {
        match policy {
            PagePolicy::Clamp => page.clamp(1, last),
            PagePolicy::Strict => {
                return Err(ProjectionError::PageOutOfRange {
                    requested: page,
                    last,
                })
            }
        }
    };

    let start = ((effective - 1) * limit) as usize;
    let items: Vec<Task> = filtered
        .into_iter()
        .skip(start)
        .take(limit as usize)
        .cloned()
        .collect();

    Ok(Page {
        items,
        total,
        page: effective,
        limit,
    })
}
