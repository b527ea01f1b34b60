//! Offset pagination and the 429 retry guard.
//!
//! Paged connectors compose the two: every page fetch is wrapped in
//! [`retry_rate_limited`], and [`paginate`] walks offsets until a short page.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use nodecatalog_shared::Result;

/// Fetch pages at offsets `0, page_size, 2 * page_size, …` and concatenate them.
///
/// Stops after the first page shorter than `page_size`, or once the next
/// offset would reach `max_offset`. Pages are requested strictly one after
/// another; any error aborts the whole walk.
pub async fn paginate<T, F, Fut>(page_size: usize, max_offset: usize, mut fetch_page: F) -> Result<Vec<T>>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<Vec<T>>>,
{
    let mut items = Vec::new();
    if page_size == 0 {
        return Ok(items);
    }

    let mut offset = 0;
    while offset < max_offset {
        let page = fetch_page(offset).await?;
        let received = page.len();
        items.extend(page);

        debug!(offset, received, total = items.len(), "page accepted");

        if received < page_size {
            break;
        }
        offset += page_size;
    }

    Ok(items)
}

/// Run `attempt` until it succeeds or fails with something other than HTTP 429.
///
/// Throttled attempts wait `backoff` and repeat the identical request; there
/// is no attempt limit.
pub async fn retry_rate_limited<T, F, Fut>(backoff: Duration, mut attempt: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    loop {
        match attempt().await {
            Err(e) if e.is_rate_limited() => {
                warn!(error = %e, backoff_ms = backoff.as_millis() as u64, "rate limited, backing off");
                tokio::time::sleep(backoff).await;
            }
            other => return other,
        }
    }
}

/// 1-based page number for page-numbered APIs.
pub fn page_number(offset: usize, page_size: usize) -> usize {
    offset / page_size.max(1) + 1
}
