//! Remote source abstraction and bounded pagination.

use crate::{PageNumber, RemoteCollector, RemoteSnapshot, SkippedRecord};
use serde_json::Value;
use std::collections::HashSet;
use std::future::Future;
use thiserror::Error;
use tracing::debug;

/// One page of raw records from the remote source.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub records: Vec<Value>,
    /// Whether the source reports further pages
    pub has_more: bool,
}

impl Page {
    pub fn new(records: Vec<Value>, has_more: bool) -> Self {
        Self { records, has_more }
    }
}

/// A paginated remote catalog.
///
/// Page numbers start at 1. Any non-success response must surface as an
/// error; an empty `Page` means the page genuinely had no records.
pub trait RemoteSource {
    type Error: std::error::Error + Send + Sync + 'static;

    fn fetch_page(
        &mut self,
        page: PageNumber,
    ) -> impl Future<Output = Result<Page, Self::Error>> + Send;
}

/// The remote catalog gathered by [`fetch_all`].
#[derive(Debug, Clone, Default)]
pub struct FetchedCatalog {
    pub snapshot: RemoteSnapshot,
    /// Records excluded from the snapshot
    pub skipped: Vec<SkippedRecord>,
    pub pages_fetched: PageNumber,
    /// Total raw records received, skipped ones included
    pub records_seen: usize,
    /// The page bound stopped the loop while the source reported more pages
    pub truncated: bool,
}

/// A page request that failed part way through pagination.
#[derive(Debug, Error)]
#[error("fetching page {page} failed: {source}")]
pub struct FetchFailure<E: std::error::Error + 'static> {
    pub page: PageNumber,
    /// Raw records received before the failure
    pub records_seen: usize,
    #[source]
    pub source: E,
}

/// Fetch pages sequentially until the source reports no more pages or
/// `max_pages` pages have been fetched.
///
/// Page `n + 1` is requested only after page `n` completed. A bound of zero is
/// treated as one.
pub async fn fetch_all<R: RemoteSource>(
    source: &mut R,
    max_pages: PageNumber,
) -> Result<FetchedCatalog, FetchFailure<R::Error>> {
    let max_pages = max_pages.max(1);
    let mut collector = RemoteCollector::new();
    let mut records_seen = 0;
    let mut pages_fetched = 0;
    let mut has_more = true;

    while has_more && pages_fetched < max_pages {
        let page_number = pages_fetched + 1;
        let page = source
            .fetch_page(page_number)
            .await
            .map_err(|source| FetchFailure {
                page: page_number,
                records_seen,
                source,
            })?;

        debug!(
            page = page_number,
            records = page.records.len(),
            has_more = page.has_more,
            "fetched remote page"
        );

        records_seen += page.records.len();
        for record in page.records {
            collector.push(page_number, record);
        }
        pages_fetched = page_number;
        has_more = page.has_more;
    }

    let (snapshot, skipped) = collector.finish();
    Ok(FetchedCatalog {
        snapshot,
        skipped,
        pages_fetched,
        records_seen,
        truncated: has_more,
    })
}

/// Failure raised by [`MemorySource`] on a page scheduled to fail.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("simulated failure fetching page {0}")]
pub struct MemorySourceError(pub PageNumber);

/// In-memory remote source serving fixed pages.
///
/// The last page reports `has_more = false` unless [`MemorySource::endless`]
/// is set, in which case every page claims more are available.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    pages: Vec<Vec<Value>>,
    endless: bool,
    failing: HashSet<PageNumber>,
    requested: Vec<PageNumber>,
}

impl MemorySource {
    pub fn new(pages: Vec<Vec<Value>>) -> Self {
        Self {
            pages,
            ..Self::default()
        }
    }

    /// Split `records` into pages of `per_page` records.
    pub fn paged(records: Vec<Value>, per_page: usize) -> Self {
        let pages = records
            .chunks(per_page.max(1))
            .map(<[Value]>::to_vec)
            .collect();
        Self::new(pages)
    }

    /// Report `has_more` on every page, like a looping remote.
    pub fn endless(mut self) -> Self {
        self.endless = true;
        self
    }

    /// Make requests for `page` fail.
    pub fn fail_on_page(mut self, page: PageNumber) -> Self {
        self.failing.insert(page);
        self
    }

    /// Page numbers requested so far, in order.
    pub fn requested(&self) -> &[PageNumber] {
        &self.requested
    }
}

impl RemoteSource for MemorySource {
    type Error = MemorySourceError;

    async fn fetch_page(&mut self, page: PageNumber) -> Result<Page, Self::Error> {
        self.requested.push(page);
        if self.failing.contains(&page) {
            return Err(MemorySourceError(page));
        }

        let index = page.saturating_sub(1) as usize;
        let records = self.pages.get(index).cloned().unwrap_or_default();
        let has_more = self.endless || index + 1 < self.pages.len();
        Ok(Page::new(records, has_more))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn records(range: std::ops::Range<u32>) -> Vec<Value> {
        range
            .map(|i| json!({"item_id": i.to_string(), "name": format!("item {}", i)}))
            .collect()
    }

    #[tokio::test]
    async fn fetches_until_no_more_pages() {
        let mut source = MemorySource::paged(records(0..5), 2);

        let catalog = fetch_all(&mut source, 10).await.unwrap();

        assert_eq!(source.requested(), &[1, 2, 3]);
        assert_eq!(catalog.pages_fetched, 3);
        assert_eq!(catalog.records_seen, 5);
        assert_eq!(catalog.snapshot.len(), 5);
        assert!(!catalog.truncated);
    }

    #[tokio::test]
    async fn page_bound_truncates() {
        let mut source = MemorySource::paged(records(0..3), 1).endless();

        let catalog = fetch_all(&mut source, 2).await.unwrap();

        assert_eq!(source.requested(), &[1, 2]);
        assert_eq!(catalog.snapshot.len(), 2);
        assert!(catalog.truncated);
    }

    #[tokio::test]
    async fn bound_on_final_page_is_not_truncation() {
        let mut source = MemorySource::paged(records(0..4), 2);

        let catalog = fetch_all(&mut source, 2).await.unwrap();
        assert!(!catalog.truncated);
        assert_eq!(catalog.snapshot.len(), 4);
    }

    #[tokio::test]
    async fn failure_reports_page_and_progress() {
        let mut source = MemorySource::paged(records(0..6), 2).fail_on_page(2);

        let err = fetch_all(&mut source, 10).await.unwrap_err();

        assert_eq!(err.page, 2);
        assert_eq!(err.records_seen, 2);
        assert_eq!(err.source, MemorySourceError(2));
        assert_eq!(
            err.to_string(),
            "fetching page 2 failed: simulated failure fetching page 2"
        );
    }

    #[tokio::test]
    async fn empty_source_is_one_empty_page() {
        let mut source = MemorySource::new(vec![]);

        let catalog = fetch_all(&mut source, 0).await.unwrap();

        assert_eq!(catalog.pages_fetched, 1);
        assert!(catalog.snapshot.is_empty());
        assert!(!catalog.truncated);
    }

    #[tokio::test]
    async fn bad_records_are_skipped_with_page() {
        let mut source = MemorySource::new(vec![
            vec![json!({"item_id": "1"})],
            vec![json!({"name": "orphan"}), json!({"item_id": "1"})],
        ]);

        let catalog = fetch_all(&mut source, 10).await.unwrap();

        assert_eq!(catalog.snapshot.len(), 1);
        assert_eq!(catalog.records_seen, 3);
        assert_eq!(catalog.skipped.len(), 2);
        assert!(catalog.skipped.iter().all(|s| s.page == 2));
    }
}
