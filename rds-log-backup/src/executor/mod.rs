//! Sync engine - Orchestrates one incremental log backup run.
//!
//! Ties together:
//! - Destination check and watermark load
//! - Paginated log file listing
//! - Signed downloads, one file at a time
//! - Writes under the run prefix
//! - Watermark commit and event emission
//!
//! The run is strictly sequential. For every descriptor the candidate
//! watermark is advanced before the download is attempted.

pub mod events;
pub mod run;

use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use crate::destination::{ObjectStore, StoreError};
use crate::invocation::SyncRequest;
use crate::source::{ListingFilter, LogFetcher, LogFileDescriptor, LogFileLister};
use crate::transfer::progress::size_difference_percent;
use crate::utils::{Result, SyncError};
use crate::watermark::{watermark_key, WatermarkStore};
pub use events::SyncEvent;
pub use run::{BackupRun, FailedFile, RunState, SyncSummary};

/// Maximum number of queued events per subscriber
const EVENT_CAPACITY: usize = 1000;

/// Main sync engine
pub struct SyncEngine {
    lister: Arc<dyn LogFileLister>,
    fetcher: Arc<dyn LogFetcher>,
    store: Arc<dyn ObjectStore>,
    watermarks: WatermarkStore,
    events: broadcast::Sender<SyncEvent>,
}

impl SyncEngine {
    pub fn new(
        lister: Arc<dyn LogFileLister>,
        fetcher: Arc<dyn LogFetcher>,
        store: Arc<dyn ObjectStore>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            lister,
            fetcher,
            watermarks: WatermarkStore::new(store.clone()),
            store,
            events,
        }
    }

    /// Receive the events of subsequent runs.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    /// Run one backup now.
    pub async fn run(&self, request: &SyncRequest) -> Result<SyncSummary> {
        self.run_at(request, Utc::now()).await
    }

    /// Run one backup with an explicit start time (names the run prefix).
    pub async fn run_at(
        &self,
        request: &SyncRequest,
        started_at: DateTime<Utc>,
    ) -> Result<SyncSummary> {
        match self.execute(request, started_at).await {
            Ok(summary) => Ok(summary),
            Err(e) => {
                error!("Backup of {} aborted: {}", request.instance_name, e);
                self.emit(SyncEvent::SyncAborted {
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn execute(&self, request: &SyncRequest, started_at: DateTime<Utc>) -> Result<SyncSummary> {
        request.validate()?;

        self.check_destination().await?;

        let prior = self.watermarks.load(&request.instance_name).await?;
        let min_size = match prior {
            Some(watermark) => {
                info!(
                    "Retrieving files with last written time after {} and min size {} B",
                    watermark, request.min_size
                );
                request.min_size
            }
            None => {
                // A size threshold has no meaning before anything was copied.
                info!("It appears this is the first log import, all files will be retrieved from RDS");
                self.emit(SyncEvent::FirstRun {
                    instance: request.instance_name.clone(),
                });
                0
            }
        };

        let mut run = BackupRun::new(&request.instance_name, started_at, prior);
        self.emit(SyncEvent::SyncStarted {
            instance: request.instance_name.clone(),
            bucket: self.store.bucket().to_string(),
            run_prefix: run.prefix.clone(),
            prior_watermark: prior,
            min_size,
        });

        if let Err(e) = self.copy_all(&mut run, request, min_size).await {
            run.transition(RunState::Aborted);
            return Err(e);
        }

        Ok(self.finalize(run).await)
    }

    async fn check_destination(&self) -> Result<()> {
        let bucket = self.store.bucket().to_string();
        self.store.head_bucket().await.map_err(|e| {
            let reason = match e {
                StoreError::NotFound(_) => "bucket not found".to_string(),
                StoreError::AccessError(message) => format!("unable to access bucket: {}", message),
                StoreError::Other(message) => message,
            };
            SyncError::DestinationUnavailable { bucket, reason }
        })
    }

    async fn copy_all(&self, run: &mut BackupRun, request: &SyncRequest, min_size: u64) -> Result<()> {
        let filter = ListingFilter {
            instance_id: request.instance_name.clone(),
            name_contains: request.name_prefix.clone(),
            min_size,
            modified_since: run.prior_watermark.unwrap_or(0),
        };

        let mut cursor: Option<String> = None;
        let mut page_number = 0;

        loop {
            run.transition(RunState::Listing);
            let page = self.lister.list_page(&filter, cursor.as_deref()).await?;
            page_number += 1;

            let next = page.continuation().map(str::to_string);
            self.emit(SyncEvent::PageListed {
                page: page_number,
                descriptors: page.descriptors.len(),
                has_more: next.is_some(),
            });

            run.transition(RunState::Copying);
            for descriptor in &page.descriptors {
                self.copy_file(run, request, descriptor).await?;
            }

            match next {
                Some(marker) => cursor = Some(marker),
                None => return Ok(()),
            }
        }
    }

    async fn copy_file(
        &self,
        run: &mut BackupRun,
        request: &SyncRequest,
        descriptor: &LogFileDescriptor,
    ) -> Result<()> {
        run.observe(descriptor);
        let file_number = run.observed;

        info!(
            "File {}: downloading {} (last written {}, {} bytes)",
            file_number, descriptor.name, descriptor.last_modified, descriptor.size_bytes
        );

        let body: Bytes = match self
            .fetcher
            .fetch(descriptor, &request.instance_name, &request.region)
            .await
        {
            Ok(body) => body,
            Err(e) if !e.is_fatal() => {
                warn!("File '{}' download failed: {}", descriptor.name, e);
                self.emit(SyncEvent::FileFailed {
                    file_number,
                    filename: descriptor.name.clone(),
                    error: e.to_string(),
                });
                run.record_failure(&descriptor.name, e.to_string());
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        let compressed_bytes = body.len() as u64;
        let difference = size_difference_percent(descriptor.size_bytes, compressed_bytes);
        match difference {
            Some(percent) => info!(
                "Compressed log file size: {} bytes ({}% difference)",
                compressed_bytes, percent
            ),
            None => info!("Compressed log file size: {} bytes", compressed_bytes),
        }

        let key = run.object_key(&descriptor.name);
        self.store
            .put(&key, body)
            .await
            .map_err(|e| SyncError::DestinationWriteFailed {
                key: key.clone(),
                reason: e.to_string(),
            })?;
        run.stats.record(descriptor.size_bytes, compressed_bytes);

        info!("Uploaded log file {} to bucket {}", key, self.store.bucket());
        self.emit(SyncEvent::FileCopied {
            file_number,
            filename: descriptor.name.clone(),
            key,
            size_bytes: descriptor.size_bytes,
            compressed_bytes,
            size_difference_percent: difference,
        });

        Ok(())
    }

    /// Commit the watermark. A failed commit is reported, not propagated:
    /// the files of this run are already in place.
    async fn finalize(&self, mut run: BackupRun) -> SyncSummary {
        run.transition(RunState::Finalizing);

        info!("Copied to {}: {}", self.store.bucket(), run.stats);
        if !run.failed.is_empty() {
            warn!("{} file(s) could not be downloaded", run.failed.len());
        }

        let key = watermark_key(&run.instance);
        let committed = match run.watermark_to_commit() {
            Some(value) => match self.watermarks.store(&run.instance, value).await {
                Ok(()) => {
                    info!(
                        "Wrote new last written watermark to {} in bucket {} with timestamp {}",
                        key,
                        self.store.bucket(),
                        value
                    );
                    self.emit(SyncEvent::WatermarkCommitted { key, value });
                    true
                }
                Err(e) => {
                    error!("{}", e);
                    self.emit(SyncEvent::WatermarkCommitFailed {
                        key,
                        error: e.to_string(),
                    });
                    false
                }
            },
            None => false,
        };

        run.transition(RunState::Done);
        let summary = run.into_summary(committed);
        self.emit(SyncEvent::SyncCompleted {
            copied: summary.copied,
            failed: summary.failed.len(),
            observed: summary.observed,
            watermark: summary.watermark,
        });
        info!("Log file export complete");

        summary
    }

    fn emit(&self, event: SyncEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::destination::testing::MemoryStore;
    use crate::source::ListingPage;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use proptest::prelude::*;
    use std::collections::HashSet;
    use std::sync::Mutex;

    const INSTANCE: &str = "orders-db";
    const PREFIX: &str = "orders-db/backup_2024-01-15T10:30:00.000000/";

    fn started_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap()
    }

    fn file(name: &str, size_bytes: u64, last_modified: u64) -> LogFileDescriptor {
        LogFileDescriptor {
            name: name.to_string(),
            size_bytes,
            last_modified,
        }
    }

    fn page(descriptors: Vec<LogFileDescriptor>, next_cursor: Option<&str>) -> ListingPage {
        ListingPage {
            descriptors,
            next_cursor: next_cursor.map(str::to_string),
        }
    }

    /// Serves pages in order; records every query.
    struct ScriptedLister {
        pages: Mutex<Vec<ListingPage>>,
        calls: Mutex<Vec<(ListingFilter, Option<String>)>>,
        fail: bool,
    }

    impl ScriptedLister {
        fn new(pages: Vec<ListingPage>) -> Self {
            Self {
                pages: Mutex::new(pages),
                calls: Mutex::new(Vec::new()),
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::new(Vec::new())
            }
        }

        fn calls(&self) -> Vec<(ListingFilter, Option<String>)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl LogFileLister for ScriptedLister {
        async fn list_page(&self, filter: &ListingFilter, cursor: Option<&str>) -> Result<ListingPage> {
            self.calls
                .lock()
                .unwrap()
                .push((filter.clone(), cursor.map(str::to_string)));
            if self.fail {
                return Err(SyncError::ListingFailed("throttled".to_string()));
            }
            let mut pages = self.pages.lock().unwrap();
            if pages.is_empty() {
                return Ok(ListingPage::default());
            }
            Ok(pages.remove(0))
        }
    }

    /// Lists a fixed set of files, honouring the filter like the real API.
    struct StaticLister {
        files: Vec<LogFileDescriptor>,
    }

    #[async_trait]
    impl LogFileLister for StaticLister {
        async fn list_page(&self, filter: &ListingFilter, _cursor: Option<&str>) -> Result<ListingPage> {
            let descriptors = self
                .files
                .iter()
                .filter(|f| f.last_modified >= filter.modified_since)
                .filter(|f| f.size_bytes >= filter.min_size)
                .filter(|f| f.name.contains(&filter.name_contains))
                .cloned()
                .collect();
            Ok(page(descriptors, None))
        }
    }

    #[derive(Default)]
    struct FakeFetcher {
        failing: HashSet<String>,
        no_credentials: bool,
        calls: Mutex<Vec<String>>,
    }

    impl FakeFetcher {
        fn failing(names: &[&str]) -> Self {
            Self {
                failing: names.iter().map(|n| n.to_string()).collect(),
                ..Self::default()
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl LogFetcher for FakeFetcher {
        async fn fetch(
            &self,
            descriptor: &LogFileDescriptor,
            instance_id: &str,
            region: &str,
        ) -> Result<Bytes> {
            assert_eq!(instance_id, INSTANCE);
            assert_eq!(region, "eu-west-1");
            self.calls.lock().unwrap().push(descriptor.name.clone());

            if self.no_credentials {
                return Err(SyncError::CredentialsUnavailable("expired".to_string()));
            }
            if self.failing.contains(&descriptor.name) {
                return Err(SyncError::DownloadFailed {
                    filename: descriptor.name.clone(),
                    cause: "HTTP error status 404".to_string(),
                });
            }
            Ok(Bytes::from(format!("gz:{}", descriptor.name)))
        }
    }

    fn request(min_size: u64) -> SyncRequest {
        SyncRequest::new(INSTANCE, "db-logs", "eu-west-1").with_min_size(min_size)
    }

    fn engine(
        lister: Arc<dyn LogFileLister>,
        fetcher: Arc<dyn LogFetcher>,
        store: Arc<MemoryStore>,
    ) -> SyncEngine {
        SyncEngine::new(lister, fetcher, store)
    }

    fn drain(rx: &mut broadcast::Receiver<SyncEvent>) -> Vec<SyncEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_first_run_ignores_min_size() {
        let lister = Arc::new(ScriptedLister::new(vec![page(
            vec![file("a.log", 50, 1000), file("b.log", 200, 2000)],
            None,
        )]));
        let fetcher = Arc::new(FakeFetcher::default());
        let store = Arc::new(MemoryStore::default());

        let summary = engine(lister.clone(), fetcher.clone(), store.clone())
            .run_at(&request(100), started_at())
            .await
            .unwrap();

        let calls = lister.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0.min_size, 0);
        assert_eq!(calls[0].0.modified_since, 0);
        assert_eq!(calls[0].1, None);

        assert_eq!(fetcher.calls(), vec!["a.log", "b.log"]);
        assert_eq!(summary.copied, 2);
        assert_eq!(summary.observed, 2);
        assert_eq!(summary.prior_watermark, None);
        assert_eq!(summary.watermark, Some(2001));
        assert!(summary.watermark_committed);
        assert_eq!(summary.run_prefix, PREFIX);

        assert_eq!(
            store.object(&format!("{}a.log.gz", PREFIX)).unwrap(),
            Bytes::from("gz:a.log")
        );
        assert!(store.object(&format!("{}b.log.gz", PREFIX)).is_some());
        assert_eq!(store.object("orders-db/backup_config").unwrap(), Bytes::from("2001"));
    }

    #[tokio::test]
    async fn test_second_run_with_nothing_new() {
        let lister = Arc::new(ScriptedLister::new(vec![page(vec![], None)]));
        let fetcher = Arc::new(FakeFetcher::default());
        let store = Arc::new(MemoryStore::with_object("orders-db/backup_config", b"2001"));

        let summary = engine(lister.clone(), fetcher.clone(), store.clone())
            .run_at(&request(100), started_at())
            .await
            .unwrap();

        let calls = lister.calls();
        assert_eq!(calls[0].0.modified_since, 2001);
        assert_eq!(calls[0].0.min_size, 100);

        assert_eq!(summary.copied, 0);
        assert!(fetcher.calls().is_empty());
        assert_eq!(summary.watermark, Some(2001));
        assert!(summary.watermark_committed);
        // unchanged value is still written
        assert_eq!(
            store.put_log.lock().unwrap().clone(),
            vec!["orders-db/backup_config".to_string()]
        );
        assert_eq!(store.object("orders-db/backup_config").unwrap(), Bytes::from("2001"));
    }

    #[tokio::test]
    async fn test_first_run_with_no_files_writes_nothing() {
        let lister = Arc::new(ScriptedLister::new(vec![page(vec![], None)]));
        let store = Arc::new(MemoryStore::default());

        let summary = engine(lister, Arc::new(FakeFetcher::default()), store.clone())
            .run_at(&request(0), started_at())
            .await
            .unwrap();

        assert_eq!(summary.watermark, None);
        assert!(!summary.watermark_committed);
        assert!(store.keys().is_empty());
    }

    #[tokio::test]
    async fn test_follows_cursors_in_order() {
        let lister = Arc::new(ScriptedLister::new(vec![
            page(vec![file("1.log", 10, 100), file("2.log", 10, 200)], Some("m1")),
            page(vec![], Some("m2")),
            page(vec![file("3.log", 10, 150)], Some("")),
            page(vec![file("never.log", 10, 999)], None),
        ]));
        let fetcher = Arc::new(FakeFetcher::default());
        let store = Arc::new(MemoryStore::default());

        let summary = engine(lister.clone(), fetcher.clone(), store)
            .run_at(&request(0), started_at())
            .await
            .unwrap();

        let cursors: Vec<Option<String>> = lister.calls().into_iter().map(|(_, c)| c).collect();
        assert_eq!(
            cursors,
            vec![None, Some("m1".to_string()), Some("m2".to_string())]
        );
        assert_eq!(fetcher.calls(), vec!["1.log", "2.log", "3.log"]);
        assert_eq!(summary.watermark, Some(201));
    }

    #[tokio::test]
    async fn test_download_failure_is_isolated() {
        let lister = Arc::new(ScriptedLister::new(vec![page(
            vec![
                file("a.log", 10, 100),
                file("broken.log", 10, 900),
                file("c.log", 10, 300),
            ],
            None,
        )]));
        let fetcher = Arc::new(FakeFetcher::failing(&["broken.log"]));
        let store = Arc::new(MemoryStore::default());

        let summary = engine(lister, fetcher.clone(), store.clone())
            .run_at(&request(0), started_at())
            .await
            .unwrap();

        assert_eq!(fetcher.calls(), vec!["a.log", "broken.log", "c.log"]);
        assert_eq!(summary.copied, 2);
        assert_eq!(summary.observed, 3);
        assert_eq!(
            summary.failed,
            vec![FailedFile {
                filename: "broken.log".to_string(),
                cause: "Download of broken.log failed: HTTP error status 404".to_string(),
            }]
        );
        // the broken file still moves the watermark
        assert_eq!(summary.watermark, Some(901));
        assert!(store.object(&format!("{}broken.log.gz", PREFIX)).is_none());
    }

    #[tokio::test]
    async fn test_write_failure_aborts_before_next_file() {
        let lister = Arc::new(ScriptedLister::new(vec![page(
            vec![file("a.log", 10, 100), file("b.log", 10, 200), file("c.log", 10, 300)],
            None,
        )]));
        let fetcher = Arc::new(FakeFetcher::default());
        let store = Arc::new(MemoryStore::default());
        store.fail_put(&format!("{}b.log.gz", PREFIX));

        let mut engine = engine(lister, fetcher.clone(), store.clone());
        let mut rx = engine.subscribe();
        let err = engine.run_at(&request(0), started_at()).await.unwrap_err();

        assert!(matches!(err, SyncError::DestinationWriteFailed { .. }));
        assert_eq!(fetcher.calls(), vec!["a.log", "b.log"]);
        // earlier copies stay, no watermark is written
        assert_eq!(store.keys(), vec![format!("{}a.log.gz", PREFIX)]);

        let events = drain(&mut rx);
        assert!(matches!(events.last(), Some(SyncEvent::SyncAborted { .. })));
        engine = SyncEngine::new(
            Arc::new(ScriptedLister::new(vec![])),
            Arc::new(FakeFetcher::default()),
            store.clone(),
        );
        // first run again: nothing was committed
        assert!(engine.run_at(&request(0), started_at()).await.unwrap().prior_watermark.is_none());
    }

    #[tokio::test]
    async fn test_missing_bucket_aborts_before_listing() {
        let lister = Arc::new(ScriptedLister::new(vec![]));
        let store = Arc::new(MemoryStore::default());
        *store.head_error.lock().unwrap() = Some(StoreError::NotFound("db-logs".to_string()));

        let err = engine(lister.clone(), Arc::new(FakeFetcher::default()), store)
            .run_at(&request(0), started_at())
            .await
            .unwrap_err();

        match err {
            SyncError::DestinationUnavailable { bucket, reason } => {
                assert_eq!(bucket, "test-bucket");
                assert_eq!(reason, "bucket not found");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(lister.calls().is_empty());
    }

    #[tokio::test]
    async fn test_inaccessible_bucket_is_distinguished() {
        let store = Arc::new(MemoryStore::default());
        *store.head_error.lock().unwrap() = Some(StoreError::AccessError("403 Forbidden".to_string()));

        let err = engine(
            Arc::new(ScriptedLister::new(vec![])),
            Arc::new(FakeFetcher::default()),
            store,
        )
        .run_at(&request(0), started_at())
        .await
        .unwrap_err();

        assert_eq!(
            err.to_string(),
            "Destination bucket test-bucket unavailable: unable to access bucket: 403 Forbidden"
        );
    }

    #[tokio::test]
    async fn test_missing_credentials_abort_run() {
        let lister = Arc::new(ScriptedLister::new(vec![page(
            vec![file("a.log", 10, 100), file("b.log", 10, 200)],
            None,
        )]));
        let fetcher = Arc::new(FakeFetcher {
            no_credentials: true,
            ..FakeFetcher::default()
        });
        let store = Arc::new(MemoryStore::default());

        let err = engine(lister, fetcher.clone(), store.clone())
            .run_at(&request(0), started_at())
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::CredentialsUnavailable(_)));
        assert_eq!(fetcher.calls(), vec!["a.log"]);
        assert!(store.keys().is_empty());
    }

    #[tokio::test]
    async fn test_listing_failure_is_fatal() {
        let store = Arc::new(MemoryStore::default());
        let err = engine(
            Arc::new(ScriptedLister::failing()),
            Arc::new(FakeFetcher::default()),
            store.clone(),
        )
        .run_at(&request(0), started_at())
        .await
        .unwrap_err();

        assert!(matches!(err, SyncError::ListingFailed(_)));
        assert!(store.keys().is_empty());
    }

    #[tokio::test]
    async fn test_watermark_commit_failure_keeps_copies() {
        let lister = Arc::new(ScriptedLister::new(vec![page(vec![file("a.log", 10, 100)], None)]));
        let store = Arc::new(MemoryStore::default());
        store.fail_put("orders-db/backup_config");

        let engine = engine(lister, Arc::new(FakeFetcher::default()), store.clone());
        let mut rx = engine.subscribe();
        let summary = engine.run_at(&request(0), started_at()).await.unwrap();

        assert_eq!(summary.copied, 1);
        assert_eq!(summary.watermark, Some(101));
        assert!(!summary.watermark_committed);
        assert!(store.object(&format!("{}a.log.gz", PREFIX)).is_some());

        let events = drain(&mut rx);
        assert!(events
            .iter()
            .any(|e| matches!(e, SyncEvent::WatermarkCommitFailed { .. })));
    }

    #[tokio::test]
    async fn test_unreadable_watermark_aborts() {
        let store = Arc::new(MemoryStore::with_object("orders-db/backup_config", b"not-a-number"));
        let lister = Arc::new(ScriptedLister::new(vec![]));

        let err = engine(lister.clone(), Arc::new(FakeFetcher::default()), store)
            .run_at(&request(0), started_at())
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::WatermarkUnreadable { .. }));
        assert!(lister.calls().is_empty());
    }

    #[tokio::test]
    async fn test_rerun_without_changes_copies_nothing() {
        let lister = Arc::new(StaticLister {
            files: vec![file("a.log", 50, 1000), file("b.log", 200, 2000)],
        });
        let store = Arc::new(MemoryStore::default());
        let engine = engine(lister, Arc::new(FakeFetcher::default()), store.clone());

        let first = engine.run_at(&request(0), started_at()).await.unwrap();
        assert_eq!(first.copied, 2);

        let later = started_at() + chrono::Duration::hours(1);
        let second = engine.run_at(&request(0), later).await.unwrap();
        assert_eq!(second.copied, 0);
        assert_eq!(second.prior_watermark, Some(2001));
        assert_eq!(second.watermark, Some(2001));
    }

    #[tokio::test]
    async fn test_event_stream() {
        let lister = Arc::new(ScriptedLister::new(vec![page(
            vec![file("a.log", 200, 1000), file("b.log", 10, 1500)],
            None,
        )]));
        let engine = engine(
            lister,
            Arc::new(FakeFetcher::failing(&["b.log"])),
            Arc::new(MemoryStore::default()),
        );
        let mut rx = engine.subscribe();
        engine.run_at(&request(0), started_at()).await.unwrap();

        let events = drain(&mut rx);
        assert_eq!(
            events,
            vec![
                SyncEvent::FirstRun {
                    instance: INSTANCE.to_string()
                },
                SyncEvent::SyncStarted {
                    instance: INSTANCE.to_string(),
                    bucket: "test-bucket".to_string(),
                    run_prefix: PREFIX.to_string(),
                    prior_watermark: None,
                    min_size: 0,
                },
                SyncEvent::PageListed {
                    page: 1,
                    descriptors: 2,
                    has_more: false
                },
                SyncEvent::FileCopied {
                    file_number: 1,
                    filename: "a.log".to_string(),
                    key: format!("{}a.log.gz", PREFIX),
                    size_bytes: 200,
                    compressed_bytes: 8,
                    size_difference_percent: Some(-96),
                },
                SyncEvent::FileFailed {
                    file_number: 2,
                    filename: "b.log".to_string(),
                    error: "Download of b.log failed: HTTP error status 404".to_string(),
                },
                SyncEvent::WatermarkCommitted {
                    key: "orders-db/backup_config".to_string(),
                    value: 1501,
                },
                SyncEvent::SyncCompleted {
                    copied: 1,
                    failed: 1,
                    observed: 2,
                    watermark: Some(1501),
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_invalid_request_rejected() {
        let lister = Arc::new(ScriptedLister::new(vec![]));
        let err = engine(
            lister.clone(),
            Arc::new(FakeFetcher::default()),
            Arc::new(MemoryStore::default()),
        )
        .run_at(&SyncRequest::new("", "db-logs", "eu-west-1"), started_at())
        .await
        .unwrap_err();

        assert!(matches!(err, SyncError::InvalidRequest(_)));
        assert!(lister.calls().is_empty());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_visits_every_descriptor_once_in_order(
            pages in proptest::collection::vec(
                proptest::collection::vec(0u64..10_000, 0..5),
                1..6,
            ),
            prior in proptest::option::of(0u64..10_000),
        ) {
            let page_count = pages.len();
            let mut expected = Vec::new();
            let mut listing = Vec::new();
            for (p, stamps) in pages.iter().enumerate() {
                let descriptors: Vec<LogFileDescriptor> = stamps
                    .iter()
                    .enumerate()
                    .map(|(i, stamp)| file(&format!("p{}-f{}.log", p, i), 10, *stamp))
                    .collect();
                expected.extend(descriptors.iter().map(|d| d.name.clone()));
                let cursor = (p + 1 < page_count).then(|| format!("m{}", p + 1));
                listing.push(ListingPage { descriptors, next_cursor: cursor });
            }

            let store = Arc::new(match prior {
                Some(value) => MemoryStore::with_object("orders-db/backup_config", value.to_string().as_bytes()),
                None => MemoryStore::default(),
            });
            let fetcher = Arc::new(FakeFetcher::default());
            let engine = engine(Arc::new(ScriptedLister::new(listing)), fetcher.clone(), store);

            let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
            let summary = runtime.block_on(engine.run_at(&request(0), started_at())).unwrap();

            prop_assert_eq!(fetcher.calls(), expected.clone());
            prop_assert_eq!(summary.observed, expected.len());
            if let (Some(old), Some(new)) = (prior, summary.watermark) {
                prop_assert!(new >= old);
            }
            if prior.is_some() {
                prop_assert!(summary.watermark.is_some());
            }
        }
    }
}
