use chrono::Local;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::DumpConfig;
use crate::error::{FetchError, PageError};
use crate::parse::Page;
use crate::request::QueryEndpoint;
use crate::result::AggregateResult;
use crate::retry::RetryPolicy;
use crate::template::QueryTemplate;
use crate::{info_time, Error, Result};

/// One paginated fetch: the query template, the operator's estimate of the
/// total number of rows and the page size.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub template: QueryTemplate,
    /// Hint for progress reporting and for the number of pages to plan.
    pub total_expected: i64,
    pub page_size: i64,
    /// Keep requesting pages past the planned count while they come back full.
    /// `None` uses the aggregator's configured default.
    pub open_ended: Option<bool>,
}

impl FetchRequest {
    pub fn new(template: QueryTemplate, total_expected: i64, page_size: i64) -> Self {
        Self {
            template,
            total_expected,
            page_size,
            open_ended: None,
        }
    }

    pub fn open_ended(mut self, open_ended: bool) -> Self {
        self.open_ended = Some(open_ended);
        self
    }

    /// Returns `(total_expected, page_size)` once both are known to be usable.
    fn validate(&self) -> Result<(u64, u64)> {
        if self.page_size <= 0 {
            return Err(Error::InvalidRequest(format!(
                "page size must be positive, got {}",
                self.page_size
            )));
        }
        if self.total_expected < 0 {
            return Err(Error::InvalidRequest(format!(
                "total expected must not be negative, got {}",
                self.total_expected
            )));
        }
        Ok((self.total_expected as u64, self.page_size as u64))
    }
}

/// Progress of a single run, handed to the observer after every page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchProgress {
    pub next_offset: u64,
    pub rows_collected: u64,
    pub pages_completed: u64,
    /// Failed submissions, retries included.
    pub pages_failed: u64,
    /// Number of pages the declared total implies.
    pub pages_planned: u64,
    pub total_expected: u64,
}

/// Fetches a whole result set page by page from a `QueryEndpoint`.
///
/// Pages are requested strictly one after the other. The aggregator keeps no
/// state between runs; every `fetch` is independent.
pub struct Aggregator<E> {
    endpoint: E,
    retry: RetryPolicy,
    open_ended: bool,
    max_pages: Option<u64>,
}

impl<E: QueryEndpoint> Aggregator<E> {
    pub fn new(endpoint: E) -> Self {
        Self::with_config(endpoint, &DumpConfig::default())
    }

    pub fn with_config(endpoint: E, config: &DumpConfig) -> Self {
        Self {
            endpoint,
            retry: config.retry.clone(),
            open_ended: config.open_ended,
            max_pages: config.max_pages,
        }
    }

    pub fn retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn open_ended(mut self, open_ended: bool) -> Self {
        self.open_ended = open_ended;
        self
    }

    pub fn max_pages(mut self, max_pages: Option<u64>) -> Self {
        self.max_pages = max_pages;
        self
    }

    pub fn endpoint(&self) -> &E {
        &self.endpoint
    }

    pub async fn fetch(&self, request: &FetchRequest) -> Result<AggregateResult> {
        self.fetch_with(request, &CancellationToken::new(), |_| {}).await
    }

    /// Runs the page loop until a short or empty page, or until the planned
    /// page count is reached (unless open-ended).
    ///
    /// `cancel` is checked before each submission and interrupts retry
    /// backoff; a page already in flight always completes. `on_progress` is called after every page.
    pub async fn fetch_with<F>(
        &self,
        request: &FetchRequest,
        cancel: &CancellationToken,
        mut on_progress: F,
    ) -> Result<AggregateResult>
    where
        F: FnMut(&FetchProgress),
    {
        let (total_expected, page_size) = request.validate()?;
        let open_ended = request.open_ended.unwrap_or(self.open_ended);
        let pages_planned = total_expected.div_ceil(page_size).max(1);
        let start_time = Local::now();

        info!(
            total_expected,
            page_size, pages_planned, open_ended, "Started paginated fetch"
        );

        let mut result = AggregateResult::default();
        let mut progress = FetchProgress {
            pages_planned,
            total_expected,
            ..FetchProgress::default()
        };

        let mut last_page_full = false;
        for page_index in 0.. {
            if page_index >= pages_planned && !open_ended {
                debug!(page_index, "Reached planned page count");
                break;
            }
            if self.max_pages.is_some_and(|max| page_index >= max) {
                warn!(
                    page_index,
                    rows = progress.rows_collected,
                    "Reached max page count while pages were still full, stopping"
                );
                break;
            }

            let offset = page_index * page_size;
            let query = request.template.instantiate(offset, page_size);
            let page = self
                .fetch_page(&query, page_index, offset, cancel, &mut progress)
                .await?;

            let rows = page.row_count() as u64;
            if rows > 0 {
                result.merge(page);
            }
            progress.pages_completed += 1;
            progress.rows_collected += rows;
            progress.next_offset = offset + page_size;
            info!(
                page = page_index,
                offset,
                rows,
                rows_collected = progress.rows_collected,
                total_expected,
                "Fetched page"
            );
            on_progress(&progress);
            last_page_full = rows == page_size;

            if rows == 0 {
                info_time!("Found EMPTY page at offset {}", offset);
                break;
            }
            if rows < page_size {
                debug!(page_index, rows, "Short page, end of results");
                break;
            }
        }

        if truncation_suspected(open_ended, last_page_full) {
            warn!(
                rows = progress.rows_collected,
                total_expected,
                pages_planned,
                "Stopped at the planned page count on a full page, results may be truncated"
            );
        } else if progress.rows_collected != total_expected {
            info!(
                rows = progress.rows_collected,
                total_expected, "Row count differs from the declared total"
            );
        }
        info_time!(
            start_time,
            "DONE: {} rows in {} pages, Expected: {}",
            progress.rows_collected,
            progress.pages_completed,
            total_expected
        );
        Ok(result)
    }

    /// Submits one page, retrying within the budget of the latest error class.
    async fn fetch_page(
        &self,
        query: &str,
        page_index: u64,
        offset: u64,
        cancel: &CancellationToken,
        progress: &mut FetchProgress,
    ) -> Result<Page> {
        let mut attempts = 0;
        loop {
            if cancel.is_cancelled() {
                warn!(page_index, offset, "Fetch cancelled");
                return Err(cancelled(progress));
            }

            attempts += 1;
            let err = match self.endpoint.submit_page(query).await {
                Ok(page) => return Ok(page),
                Err(err) => err,
            };
            progress.pages_failed += 1;

            if !self.retry.should_retry(&err, attempts) {
                error!(
                    page = page_index,
                    offset,
                    attempts,
                    rows_collected = progress.rows_collected,
                    error = %err,
                    "Page failed, aborting fetch"
                );
                return Err(self.fetch_error(page_index, offset, attempts, progress, err));
            }

            let delay = self.retry.delay_for(attempts);
            warn!(
                page = page_index,
                offset,
                attempt = attempts,
                budget = self.retry.budget_for(&err),
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Page failed, retrying"
            );
            tokio::select! {
                _ = cancel.cancelled() => {
                    warn!(page_index, offset, "Fetch cancelled during retry backoff");
                    return Err(cancelled(progress));
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    fn fetch_error(
        &self,
        page_index: u64,
        offset: u64,
        attempts: u32,
        progress: &FetchProgress,
        cause: PageError,
    ) -> Error {
        FetchError {
            page_index,
            offset,
            attempts,
            pages_completed: progress.pages_completed,
            rows_collected: progress.rows_collected,
            cause,
        }
        .into()
    }
}

/// A strict run that ends on a full page has probably cut off rows the
/// declared total did not account for.
fn truncation_suspected(open_ended: bool, last_page_full: bool) -> bool {
    !open_ended && last_page_full
}

fn cancelled(progress: &FetchProgress) -> Error {
    Error::Cancelled {
        pages_completed: progress.pages_completed,
        rows_collected: progress.rows_collected,
    }
}
