//! Change polling over the monitored collections.
//!
//! Each collection keeps a watermark, the newest edit time seen so far.  A
//! cycle announces every fetched record edited strictly after the watermark
//! and then moves the watermark forward.  Watermarks live in memory only, so a
//! restart starts again from process-start time.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use reportbridge_notion::{Page, WorkspaceApi};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{NotifyError, PollFetchError};
use crate::notifier::Notifier;

#[derive(Debug, Default)]
pub struct WatermarkTable {
    marks: Mutex<HashMap<String, Arc<Mutex<Option<DateTime<Utc>>>>>>,
}

impl WatermarkTable {
    pub fn new() -> Self {
        Self::default()
    }

    async fn slot(&self, collection: &str) -> Arc<Mutex<Option<DateTime<Utc>>>> {
        self.marks
            .lock()
            .await
            .entry(collection.to_string())
            .or_default()
            .clone()
    }

    pub async fn get(&self, collection: &str) -> Option<DateTime<Utc>> {
        let slot = self.marks.lock().await.get(collection).cloned()?;
        let mark = *slot.lock().await;
        mark
    }

    /// Move the watermark to `to` unless it already is at or past it.
    /// Returns the resulting watermark.
    pub async fn advance(&self, collection: &str, to: DateTime<Utc>) -> DateTime<Utc> {
        let slot = self.slot(collection).await;
        let mut mark = slot.lock().await;
        advance_mark(&mut mark, to)
    }
}

fn advance_mark(mark: &mut Option<DateTime<Utc>>, to: DateTime<Utc>) -> DateTime<Utc> {
    match *mark {
        Some(current) if current >= to => current,
        _ => {
            *mark = Some(to);
            to
        }
    }
}

/// Outcome of one collection's cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollReport {
    pub collection: String,
    pub fetched: usize,
    /// Ids of the records announced this cycle, newest first.
    pub announced: Vec<String>,
    pub watermark: Option<DateTime<Utc>>,
}

/// Newest first; ties on edit time fall back to descending id so a cycle
/// always walks records in the same order.
fn sort_newest_first(pages: &mut [Page]) {
    pages.sort_by(|a, b| {
        b.last_edited_time
            .cmp(&a.last_edited_time)
            .then_with(|| b.id.cmp(&a.id))
    });
}

#[derive(Clone)]
pub struct ChangePoller {
    workspace: Arc<dyn WorkspaceApi>,
    notifier: Notifier,
    watermarks: Arc<WatermarkTable>,
    collections: Vec<String>,
    page_size: usize,
    started_at: DateTime<Utc>,
}

impl ChangePoller {
    pub fn new(
        workspace: Arc<dyn WorkspaceApi>,
        notifier: Notifier,
        collections: Vec<String>,
        page_size: usize,
    ) -> Self {
        Self {
            workspace,
            notifier,
            watermarks: Arc::new(WatermarkTable::new()),
            collections,
            page_size,
            started_at: Utc::now(),
        }
    }

    /// Override the lower bound used before a collection's first cycle.
    pub fn with_started_at(mut self, started_at: DateTime<Utc>) -> Self {
        self.started_at = started_at;
        self
    }

    pub fn collections(&self) -> &[String] {
        &self.collections
    }

    pub fn watermarks(&self) -> &WatermarkTable {
        &self.watermarks
    }

    pub async fn poll_once(&self, collection: &str) -> Result<PollReport, PollFetchError> {
        // Held for the whole cycle so two cycles over one collection never
        // interleave their announcements.
        let slot = self.watermarks.slot(collection).await;
        let mut mark = slot.lock().await;
        let since = mark.unwrap_or(self.started_at);

        let mut pages = self
            .workspace
            .query_recently_edited(collection, self.page_size)
            .await
            .map_err(|source| PollFetchError {
                collection: collection.to_string(),
                source,
            })?;

        let mut report = PollReport {
            collection: collection.to_string(),
            fetched: pages.len(),
            announced: Vec::new(),
            watermark: *mark,
        };
        if pages.is_empty() {
            debug!(collection = %collection, "no records returned");
            return Ok(report);
        }

        sort_newest_first(&mut pages);
        for page in &pages {
            if page.last_edited_time <= since {
                break;
            }
            match self.notifier.announce(page, collection).await {
                Ok(_) => report.announced.push(page.id.clone()),
                Err(NotifyError::ChannelMissing) => {
                    warn!(collection = %collection, "notification channel not configured; skipping announcements");
                    break;
                }
                Err(err) => {
                    warn!(?err, collection = %collection, record = %page.id, "failed to announce record");
                }
            }
        }

        let newest = pages[0].last_edited_time;
        report.watermark = Some(advance_mark(&mut mark, newest));
        if !report.announced.is_empty() {
            info!(
                collection = %collection,
                announced = report.announced.len(),
                "poll cycle announced changes"
            );
        }
        Ok(report)
    }

    /// One cycle over every collection, in order.  A failing collection is
    /// logged and does not stop the others.
    pub async fn poll_all(&self) -> Vec<Result<PollReport, PollFetchError>> {
        let mut results = Vec::with_capacity(self.collections.len());
        for collection in &self.collections {
            let result = self.poll_once(collection).await;
            if let Err(err) = &result {
                warn!(?err, collection = %collection, "poll failed");
            }
            results.push(result);
        }
        results
    }
}
