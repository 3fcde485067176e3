/// Log scanner - bounded newest-first search of the identity topic
use crate::{
    binding::event::BindingRecord,
    ledger::{Envelope, LogIndexer, LogPage},
    metrics,
};
use std::{sync::Arc, time::Duration, time::Instant};
use tracing::{debug, warn};

pub const DEFAULT_PAGE_SIZE: u32 = 100;
pub const DEFAULT_PAGE_TIMEOUT: Duration = Duration::from_millis(2_500);

/// How a single page fetch ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageStatus {
    Fetched,
    TimedOut,
    Failed,
}

impl PageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PageStatus::Fetched => "fetched",
            PageStatus::TimedOut => "timed_out",
            PageStatus::Failed => "failed",
        }
    }

    pub fn is_degraded(&self) -> bool {
        !matches!(self, PageStatus::Fetched)
    }
}

/// Newest matching binding and where it was found
#[derive(Debug, Clone, PartialEq)]
pub struct ScanMatch {
    pub record: BindingRecord,
    pub envelope: Envelope,
    pub pages: Vec<PageStatus>,
}

/// Scan that ended without a match
#[derive(Debug, Clone, PartialEq)]
pub struct ScanSummary {
    pub pages_fetched: usize,
    pub statuses: Vec<PageStatus>,
    /// The log ran out of continuation tokens before the page bound
    pub exhausted: bool,
}

impl ScanSummary {
    pub fn degraded_pages(&self) -> usize {
        self.statuses.iter().filter(|s| s.is_degraded()).count()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScanOutcome {
    Found(ScanMatch),
    NotFound(ScanSummary),
}

/// Walks the topic newest-first, one page at a time
pub struct LogScanner {
    indexer: Arc<dyn LogIndexer>,
    topic_id: String,
    page_size: u32,
    page_timeout: Duration,
}

impl LogScanner {
    pub fn new(indexer: Arc<dyn LogIndexer>, topic_id: impl Into<String>) -> Self {
        Self {
            indexer,
            topic_id: topic_id.into(),
            page_size: DEFAULT_PAGE_SIZE,
            page_timeout: DEFAULT_PAGE_TIMEOUT,
        }
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_page_timeout(mut self, page_timeout: Duration) -> Self {
        self.page_timeout = page_timeout;
        self
    }

    pub fn topic_id(&self) -> &str {
        &self.topic_id
    }

    /// Find the newest binding event for the pair within `max_pages` pages
    ///
    /// Fetch failures and timeouts end the scan like an empty last page; they
    /// are reported through the page statuses rather than as errors.
    pub async fn scan_for_match(&self, world_id: &str, address: &str, max_pages: usize) -> ScanOutcome {
        let started = Instant::now();
        let mut statuses = Vec::new();
        let mut continuation: Option<String> = None;
        let mut exhausted = false;

        while statuses.len() < max_pages {
            let (status, page) = self.fetch(continuation.as_deref()).await;
            statuses.push(status);
            metrics::record_scan_page(status.as_str());

            if let Some((record, envelope)) = find_match(&page, world_id, address) {
                metrics::record_scan_duration(started.elapsed().as_secs_f64());
                debug!(
                    world_id,
                    address,
                    pages = statuses.len(),
                    sequence_number = envelope.sequence_number,
                    "Binding found"
                );
                return ScanOutcome::Found(ScanMatch {
                    record,
                    envelope,
                    pages: statuses,
                });
            }

            match page.next {
                Some(next) => continuation = Some(next),
                None => {
                    exhausted = status == PageStatus::Fetched;
                    break;
                }
            }
        }

        metrics::record_scan_duration(started.elapsed().as_secs_f64());

        ScanOutcome::NotFound(ScanSummary {
            pages_fetched: statuses.len(),
            statuses,
            exhausted,
        })
    }

    async fn fetch(&self, continuation: Option<&str>) -> (PageStatus, LogPage) {
        let request = self
            .indexer
            .fetch_page(&self.topic_id, self.page_size, continuation);

        match tokio::time::timeout(self.page_timeout, request).await {
            Ok(Ok(page)) => (PageStatus::Fetched, page),
            Ok(Err(e)) => {
                warn!(topic_id = %self.topic_id, error = %e, "Topic page fetch failed");
                (PageStatus::Failed, LogPage::default())
            }
            Err(_) => {
                warn!(
                    topic_id = %self.topic_id,
                    timeout_ms = self.page_timeout.as_millis() as u64,
                    "Topic page fetch timed out"
                );
                (PageStatus::TimedOut, LogPage::default())
            }
        }
    }
}

fn find_match(page: &LogPage, world_id: &str, address: &str) -> Option<(BindingRecord, Envelope)> {
    page.messages.iter().find_map(|envelope| {
        BindingRecord::decode(&envelope.message)
            .filter(|record| record.matches(world_id, address))
            .map(|record| (record, envelope.clone()))
    })
}
