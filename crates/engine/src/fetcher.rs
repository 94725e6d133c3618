//! Paginated `position_event` fetcher with adaptive page size
//!
//! Pages are requested strictly one after another. A failed page is retried
//! at the same offset with half the page size until the size drops to the
//! floor; a failure at or below the floor aborts the whole fetch.

use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::error::QueryError;
use crate::types::PositionEvent;

pub const DEFAULT_PAGE_SIZE: u32 = 500;
pub const MIN_PAGE_SIZE: u32 = 50;
const PAGE_DELAY_MS: u64 = 100;

/// Anything that can serve `position_event` pages by `(limit, offset)`
#[async_trait]
pub trait PositionEventSource: Send + Sync {
    async fn fetch_page(&self, limit: u32, offset: u64) -> Result<Vec<PositionEvent>, QueryError>;
}

#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Starting page size
    pub page_size: u32,
    /// Page size at or below which a failure is terminal
    pub min_page_size: u32,
    /// Pause between successful pages
    pub page_delay: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            min_page_size: MIN_PAGE_SIZE,
            page_delay: Duration::from_millis(PAGE_DELAY_MS),
        }
    }
}

impl FetchConfig {
    /// Default config, with the starting page size taken from
    /// `POSITION_EVENT_PAGE_LIMIT` when it is a positive integer
    pub fn from_env() -> Self {
        let page_size = std::env::var("POSITION_EVENT_PAGE_LIMIT")
            .ok()
            .and_then(|v| parse_page_limit(&v))
            .unwrap_or(DEFAULT_PAGE_SIZE);
        Self {
            page_size,
            ..Self::default()
        }
    }
}

fn parse_page_limit(raw: &str) -> Option<u32> {
    raw.trim().parse::<u32>().ok().filter(|n| *n > 0)
}

/// Fetch every qualifying event from `source`.
///
/// `offset` only advances after a successful page, and by the limit that
/// page was requested with, so shrinking the page mid-run neither skips nor
/// repeats rows. A page shorter than its limit is the last one.
pub async fn fetch_all_position_events<S>(
    source: &S,
    config: &FetchConfig,
) -> Result<Vec<PositionEvent>>
where
    S: PositionEventSource + ?Sized,
{
    let floor = config.min_page_size.max(1);
    let mut offset: u64 = 0;
    let mut current_limit = config.page_size.max(1);
    let mut all_events: Vec<PositionEvent> = Vec::new();

    info!(page_size = current_limit, "Starting to fetch position events");

    loop {
        debug!(offset, limit = current_limit, "Fetching position_event page");

        match source.fetch_page(current_limit, offset).await {
            Ok(events) => {
                let fetched = events.len();
                all_events.extend(events);
                debug!(fetched, total = all_events.len(), "Fetched position events");

                offset += u64::from(current_limit);
                if fetched < current_limit as usize {
                    break;
                }

                if !config.page_delay.is_zero() {
                    tokio::time::sleep(config.page_delay).await;
                }
            }
            Err(err) => {
                error!(offset, limit = current_limit, error = %err, "Error fetching position events");

                if current_limit > floor {
                    current_limit /= 2;
                    warn!(
                        offset,
                        limit = current_limit,
                        "Reducing page size and retrying same offset"
                    );
                    continue;
                }

                return Err(anyhow::Error::new(err).context(format!(
                    "position_event fetch failed at offset {} with page size {}",
                    offset, current_limit
                )));
            }
        }
    }

    info!(total = all_events.len(), "Total position events fetched");
    Ok(all_events)
}
