//! Crawl orchestration: fetch, extract, build, store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::error::{FetchError, FetchResult, WorkerError};
use crate::extract::builder::{PageMetadata, PolicyRecordBuilder};
use crate::extract::normalize::TextNormalizer;
use crate::traits::ai::Embedder;
use crate::traits::fetcher::{PageFetcher, RawPage};
use crate::traits::store::{PolicyStore, UpsertOutcome, VectorIndex};
use crate::types::config::CrawlConfig;
use crate::types::policy::PolicyRecord;

/// One page to crawl.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrawlTarget {
    pub url: String,

    /// Fallback title when the page has none
    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub category: String,

    /// Source jurisdiction; empty means national
    #[serde(default)]
    pub region: String,
}

impl CrawlTarget {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: String::new(),
            category: String::new(),
            region: String::new(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    /// A linked page inherits category and region, not title.
    fn discovered(&self, url: String) -> Self {
        Self {
            url,
            title: String::new(),
            category: self.category.clone(),
            region: self.region.clone(),
        }
    }
}

/// Why a target produced no record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Fetch,
    Status,
    Timeout,
    InvalidUrl,
    TooShort,
    Worker,
    Storage,
}

impl From<&FetchError> for FailureKind {
    fn from(err: &FetchError) -> Self {
        match err {
            FetchError::Http(_) | FetchError::Transport(_) => Self::Fetch,
            FetchError::Status { .. } => Self::Status,
            FetchError::Timeout { .. } => Self::Timeout,
            FetchError::InvalidUrl { .. } => Self::InvalidUrl,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetFailure {
    pub url: String,
    pub kind: FailureKind,
    pub reason: String,
}

/// Outcome of one crawl run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlReport {
    pub run_id: Uuid,
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub new_records: usize,
    pub updated_records: usize,
    pub records: Vec<PolicyRecord>,
    pub failures: Vec<TargetFailure>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub cancelled: bool,

    /// Set when a fetcher failure stopped the run before every target was tried
    #[serde(default)]
    pub aborted: Option<String>,
}

impl CrawlReport {
    fn start() -> Self {
        let now = Utc::now();
        Self {
            run_id: Uuid::new_v4(),
            attempted: 0,
            succeeded: 0,
            failed: 0,
            new_records: 0,
            updated_records: 0,
            records: Vec::new(),
            failures: Vec::new(),
            started_at: now,
            finished_at: now,
            cancelled: false,
            aborted: None,
        }
    }

    fn record_failure(&mut self, url: &str, kind: FailureKind, reason: impl Into<String>) {
        let reason = reason.into();
        warn!(url = %url, kind = ?kind, reason = %reason, "target failed");
        self.failed += 1;
        self.failures.push(TargetFailure {
            url: url.to_string(),
            kind,
            reason,
        });
    }

    fn record_success(&mut self, record: PolicyRecord, outcome: UpsertOutcome) {
        self.succeeded += 1;
        match outcome {
            UpsertOutcome::Inserted => self.new_records += 1,
            UpsertOutcome::Updated => self.updated_records += 1,
        }
        self.records.push(record);
    }

    fn finish(mut self) -> Self {
        self.finished_at = Utc::now();
        self
    }
}

/// Output of one extraction job.
#[derive(Debug, Clone)]
pub struct ProcessedPage {
    pub record: PolicyRecord,

    /// Length of the normalized text in characters
    pub text_chars: usize,

    pub policy_links: Vec<String>,
}

/// Bounded pool running normalization and extraction off the async runtime.
#[derive(Clone)]
pub struct ExtractionPool {
    permits: Arc<Semaphore>,
    normalizer: Arc<TextNormalizer>,
    builder: Arc<PolicyRecordBuilder>,
}

impl ExtractionPool {
    pub fn new(workers: usize, normalizer: TextNormalizer, builder: PolicyRecordBuilder) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(workers.max(1))),
            normalizer: Arc::new(normalizer),
            builder: Arc::new(builder),
        }
    }

    pub fn available_workers(&self) -> usize {
        self.permits.available_permits()
    }

    /// Normalize and extract one page on the blocking pool.
    pub async fn process(
        &self,
        meta: PageMetadata,
        page: RawPage,
    ) -> Result<ProcessedPage, WorkerError> {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| WorkerError::Closed)?;
        let normalizer = self.normalizer.clone();
        let builder = self.builder.clone();

        let handle = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            let normalized = normalizer.normalize(&page.body, Some(&page.url));
            let record = builder.build_from_page(&meta, &normalized);
            ProcessedPage {
                record,
                text_chars: normalized.text.chars().count(),
                policy_links: normalized.policy_links,
            }
        });

        handle.await.map_err(|e| {
            if e.is_panic() {
                WorkerError::Panicked(e.to_string())
            } else {
                WorkerError::Cancelled
            }
        })
    }
}

/// Runs crawl targets in order and feeds the corpus.
pub struct CrawlOrchestrator {
    fetcher: Arc<dyn PageFetcher>,
    store: Arc<dyn PolicyStore>,
    index: Option<Arc<dyn VectorIndex>>,
    embedder: Option<Arc<dyn Embedder>>,
    pool: ExtractionPool,
    config: CrawlConfig,
    embed_timeout: Duration,
    max_discovered: usize,
}

impl CrawlOrchestrator {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        store: Arc<dyn PolicyStore>,
        builder: PolicyRecordBuilder,
        config: CrawlConfig,
    ) -> Self {
        let builder = builder.with_targeting(config.default_targeting.clone());
        let pool = ExtractionPool::new(config.extraction_workers, TextNormalizer::new(), builder);
        Self {
            fetcher,
            store,
            index: None,
            embedder: None,
            pool,
            config,
            embed_timeout: Duration::from_secs(15),
            max_discovered: 0,
        }
    }

    /// Embed each stored record into `index`.
    pub fn with_embeddings(
        mut self,
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
    ) -> Self {
        self.embedder = Some(embedder);
        self.index = Some(index);
        self
    }

    pub fn with_embed_timeout(mut self, timeout: Duration) -> Self {
        self.embed_timeout = timeout;
        self
    }

    /// Follow up to `max` policy links found on crawled pages.
    pub fn with_link_discovery(mut self, max: usize) -> Self {
        self.max_discovered = max;
        self
    }

    pub fn config(&self) -> &CrawlConfig {
        &self.config
    }

    pub async fn crawl(&self, targets: &[CrawlTarget]) -> CrawlReport {
        self.crawl_with_cancel(targets, &CancellationToken::new())
            .await
    }

    /// Crawl `targets` in order.
    ///
    /// Per-target failures land in the report. A transport failure stops the
    /// run; the partial report comes back with `aborted` set and the records
    /// stored so far kept. On cancellation the partial report is returned
    /// with `cancelled = true`.
    #[instrument(skip(self, targets, cancel), fields(targets = targets.len(), fetcher = self.fetcher.name()))]
    pub async fn crawl_with_cancel(
        &self,
        targets: &[CrawlTarget],
        cancel: &CancellationToken,
    ) -> CrawlReport {
        let mut report = CrawlReport::start();
        let mut queue: VecDeque<CrawlTarget> = targets.iter().cloned().collect();
        let mut seen: HashSet<String> = queue.iter().map(|t| t.url.clone()).collect();
        let mut discovered = 0usize;

        info!(run_id = %report.run_id, targets = queue.len(), "crawl starting");

        while let Some(target) = queue.pop_front() {
            if report.attempted > 0 {
                tokio::select! {
                    _ = cancel.cancelled() => {}
                    _ = tokio::time::sleep(self.config.delay()) => {}
                }
            }
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }

            let fetched = tokio::select! {
                _ = cancel.cancelled() => {
                    report.cancelled = true;
                    break;
                }
                result = self.fetch(&target.url) => result,
            };
            report.attempted += 1;

            let page = match fetched {
                Ok(page) => page,
                Err(e) if e.is_fatal() => {
                    error!(url = %target.url, error = %e, "fetcher unavailable, aborting crawl");
                    report.record_failure(&target.url, FailureKind::from(&e), e.to_string());
                    report.aborted = Some(e.to_string());
                    break;
                }
                Err(e) => {
                    report.record_failure(&target.url, FailureKind::from(&e), e.to_string());
                    continue;
                }
            };
            if !page.has_content() {
                report.record_failure(&target.url, FailureKind::TooShort, "empty response body");
                continue;
            }

            let meta = PageMetadata::new(target.url.clone())
                .with_fallback_title(target.title.clone())
                .with_category(target.category.clone())
                .with_region(target.region.clone())
                .with_fetched_at(page.fetched_at);

            let processed = match self.pool.process(meta, page).await {
                Ok(processed) => processed,
                Err(e) => {
                    report.record_failure(&target.url, FailureKind::Worker, e.to_string());
                    continue;
                }
            };

            for link in processed.policy_links.iter() {
                if discovered >= self.max_discovered {
                    break;
                }
                if seen.insert(link.clone()) {
                    debug!(from = %target.url, link = %link, "policy link discovered");
                    queue.push_back(target.discovered(link.clone()));
                    discovered += 1;
                }
            }

            if processed.text_chars < self.config.min_content_chars {
                report.record_failure(
                    &target.url,
                    FailureKind::TooShort,
                    format!(
                        "content too short: {} < {} characters",
                        processed.text_chars, self.config.min_content_chars
                    ),
                );
                continue;
            }

            let record = processed.record;
            let key = record.identity_key();
            let outcome = match self.store.upsert(record.clone()).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    report.record_failure(&target.url, FailureKind::Storage, e.to_string());
                    continue;
                }
            };
            let stored = match self.store.find_by_identity(&key).await {
                Ok(Some(stored)) => stored,
                _ => record,
            };

            self.index_record(&stored).await;

            info!(
                url = %target.url,
                id = %stored.id,
                outcome = ?outcome,
                placeholders = stored.provenance.any_defaulted(),
                "policy stored"
            );
            report.record_success(stored, outcome);
        }

        let report = report.finish();
        info!(
            run_id = %report.run_id,
            attempted = report.attempted,
            succeeded = report.succeeded,
            failed = report.failed,
            new_records = report.new_records,
            updated_records = report.updated_records,
            cancelled = report.cancelled,
            aborted = report.aborted.is_some(),
            "crawl finished"
        );
        report
    }

    async fn fetch(&self, url: &str) -> FetchResult<RawPage> {
        match tokio::time::timeout(self.config.fetch_timeout(), self.fetcher.fetch(url)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout {
                url: url.to_string(),
            }),
        }
    }

    /// Embedding failures are logged and otherwise ignored.
    async fn index_record(&self, record: &PolicyRecord) {
        let (Some(embedder), Some(index)) = (&self.embedder, &self.index) else {
            return;
        };

        let text = record.embedding_text();

        let embedding = match tokio::time::timeout(self.embed_timeout, embedder.embed(&text)).await {
            Ok(Ok(embedding)) => embedding,
            Ok(Err(e)) => {
                warn!(id = %record.id, error = %e, "embedding failed");
                return;
            }
            Err(_) => {
                warn!(id = %record.id, "embedding timed out");
                return;
            }
        };

        if let Err(e) = index.upsert_embedding(&record.id, &embedding).await {
            warn!(id = %record.id, error = %e, "failed to index embedding");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::MemoryStore;
    use crate::testing::{MockEmbedder, MockFetcher};
    use crate::types::policy::SupportType;

    const XUHUI_PAGE: &str = r#"<html><head><title>徐汇区人工智能产业扶持办法 | 徐汇区人民政府</title></head>
<body><nav>首页 政策</nav>
<div class="content">
<p>为加快推进徐汇区人工智能产业高质量发展，现就有关支持措施通知如下。</p>
<p>一、申请条件：企业注册地在徐汇区；从事人工智能相关业务；企业信用状况良好</p>
<p>二、支持标准：对符合条件的企业给予研发补贴，最高补贴50万元。</p>
<p>三、申报截止日期：2024年6月30日。</p>
<p>联系部门：徐汇区科学技术委员会</p>
</div></body></html>"#;

    fn quick_config() -> CrawlConfig {
        CrawlConfig::default()
            .with_delay_ms(0)
            .with_fetch_timeout_secs(5)
            .with_min_content_chars(20)
    }

    fn orchestrator(fetcher: MockFetcher, store: Arc<MemoryStore>) -> CrawlOrchestrator {
        CrawlOrchestrator::new(
            Arc::new(fetcher),
            store,
            PolicyRecordBuilder::default(),
            quick_config(),
        )
    }

    #[tokio::test]
    async fn test_crawl_stores_extracted_record() {
        let url = "https://www.xuhui.gov.cn/zcwj/ai.html";
        let fetcher = MockFetcher::new().with_page(url, XUHUI_PAGE);
        let store = Arc::new(MemoryStore::new());

        let report = orchestrator(fetcher, store.clone())
            .crawl(&[CrawlTarget::new(url)
                .with_region("上海市徐汇区")
                .with_category("产业扶持")])
            .await;

        assert_eq!(report.attempted, 1);
        assert_eq!(report.succeeded, 1);
        assert_eq!(report.new_records, 1);
        assert!(!report.cancelled);

        let record = &report.records[0];
        assert_eq!(record.title, "徐汇区人工智能产业扶持办法");
        assert_eq!(record.support_type, SupportType::Subsidy);
        assert_eq!(record.max_amount, Some(500_000));
        assert_eq!(record.department, "徐汇区科学技术委员会");
        assert_eq!(
            record.requirements[..2],
            ["企业注册地在徐汇区".to_string(), "从事人工智能相关业务".to_string()]
        );
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_failures_do_not_stop_the_run() {
        let ok = "https://www.xuhui.gov.cn/zcwj/ai.html";
        let fetcher = MockFetcher::new()
            .with_page(ok, XUHUI_PAGE)
            .with_status("https://www.xuhui.gov.cn/missing", 404)
            .with_page("https://www.xuhui.gov.cn/thin", "<p>短</p>");
        let store = Arc::new(MemoryStore::new());

        let report = orchestrator(fetcher, store)
            .crawl(&[
                CrawlTarget::new("https://www.xuhui.gov.cn/missing"),
                CrawlTarget::new("https://www.xuhui.gov.cn/thin"),
                CrawlTarget::new("https://www.xuhui.gov.cn/unknown"),
                CrawlTarget::new(ok),
            ])
            .await;

        assert_eq!(report.attempted, 4);
        assert_eq!(report.succeeded, 1);
        assert_eq!(report.failed, 3);
        let kinds: Vec<_> = report.failures.iter().map(|f| f.kind).collect();
        assert_eq!(
            kinds,
            [FailureKind::Status, FailureKind::TooShort, FailureKind::Status]
        );
    }

    #[tokio::test]
    async fn test_transport_failure_keeps_partial_report() {
        let ok = "https://www.xuhui.gov.cn/zcwj/ai.html";
        let fetcher = MockFetcher::new()
            .with_page(ok, XUHUI_PAGE)
            .with_transport_failure("https://a.gov.cn/1", "offline")
            .with_page("https://a.gov.cn/2", XUHUI_PAGE);
        let store = Arc::new(MemoryStore::new());

        let report = orchestrator(fetcher, store.clone())
            .crawl(&[
                CrawlTarget::new(ok).with_region("上海市徐汇区"),
                CrawlTarget::new("https://a.gov.cn/1"),
                CrawlTarget::new("https://a.gov.cn/2"),
            ])
            .await;

        assert_eq!(report.aborted.as_deref(), Some("transport unavailable: offline"));
        assert_eq!(report.attempted, 2);
        assert_eq!(report.succeeded, 1);
        assert_eq!(report.new_records, 1);
        assert_eq!(report.records.len(), 1);
        assert_eq!(report.failures[0].kind, FailureKind::Fetch);
        assert!(!report.cancelled);
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_empty_body_is_too_short() {
        let url = "https://www.xuhui.gov.cn/blank";
        let fetcher = MockFetcher::new().with_page(url, " \n\t ");
        let store = Arc::new(MemoryStore::new());

        let report = orchestrator(fetcher, store.clone())
            .crawl(&[CrawlTarget::new(url)])
            .await;

        assert_eq!(report.failed, 1);
        assert_eq!(report.failures[0].kind, FailureKind::TooShort);
        assert_eq!(report.failures[0].reason, "empty response body");
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_slow_embedding_is_skipped() {
        let url = "https://www.xuhui.gov.cn/zcwj/ai.html";
        let store = Arc::new(MemoryStore::new());
        let embedder = MockEmbedder::new().with_latency(Duration::from_secs(5));

        let report = orchestrator(MockFetcher::new().with_page(url, XUHUI_PAGE), store.clone())
            .with_embeddings(Arc::new(embedder), store.clone())
            .with_embed_timeout(Duration::from_millis(10))
            .crawl(&[CrawlTarget::new(url)])
            .await;

        assert_eq!(report.succeeded, 1);
        assert_eq!(store.count().await.unwrap(), 1);
        assert_eq!(store.embedding_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_recrawl_updates_in_place() {
        let url = "https://www.xuhui.gov.cn/zcwj/ai.html";
        let store = Arc::new(MemoryStore::new());
        let targets = [CrawlTarget::new(url).with_region("上海市徐汇区")];

        let first = orchestrator(MockFetcher::new().with_page(url, XUHUI_PAGE), store.clone())
            .crawl(&targets)
            .await;
        let revised = XUHUI_PAGE.replace("最高补贴50万元", "最高补贴80万元");
        let second = orchestrator(MockFetcher::new().with_page(url, &revised), store.clone())
            .crawl(&targets)
            .await;

        assert_eq!(second.updated_records, 1);
        assert_eq!(store.count().await.unwrap(), 1);
        assert_eq!(second.records[0].id, first.records[0].id);
        assert_eq!(second.records[0].max_amount, Some(800_000));
        assert_eq!(second.records[0].crawl_time, first.records[0].crawl_time);
    }

    #[tokio::test]
    async fn test_slow_fetch_times_out() {
        let url = "https://slow.gov.cn/";
        let fetcher = MockFetcher::new()
            .with_page(url, XUHUI_PAGE)
            .with_latency(Duration::from_secs(5));
        let store = Arc::new(MemoryStore::new());
        let config = quick_config().with_fetch_timeout_secs(0);

        let report = CrawlOrchestrator::new(
            Arc::new(fetcher),
            store,
            PolicyRecordBuilder::default(),
            config,
        )
        .crawl(&[CrawlTarget::new(url)])
        .await;

        assert_eq!(report.failures[0].kind, FailureKind::Timeout);
    }

    #[tokio::test]
    async fn test_cancelled_before_start_returns_empty_report() {
        let store = Arc::new(MemoryStore::new());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let report = orchestrator(MockFetcher::new(), store)
            .crawl_with_cancel(&[CrawlTarget::new("https://a.gov.cn/1")], &cancel)
            .await;

        assert!(report.cancelled);
        assert_eq!(report.attempted, 0);
    }

    #[tokio::test]
    async fn test_embeddings_indexed() {
        let url = "https://www.xuhui.gov.cn/zcwj/ai.html";
        let store = Arc::new(MemoryStore::new());

        let report = orchestrator(MockFetcher::new().with_page(url, XUHUI_PAGE), store.clone())
            .with_embeddings(Arc::new(MockEmbedder::new()), store.clone())
            .crawl(&[CrawlTarget::new(url)])
            .await;

        assert_eq!(report.succeeded, 1);
        assert_eq!(store.embedding_count().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_link_discovery_follows_policy_links() {
        let index = "https://www.xuhui.gov.cn/zcwj/index.html";
        let detail = "https://www.xuhui.gov.cn/zcwj/ai.html";
        let listing = r#"<html><body><ul>
<li><a href="/zcwj/ai.html">关于人工智能扶持政策的通知</a></li>
<li><a href="/about.html">关于我们</a></li>
</ul></body></html>"#;
        let fetcher = MockFetcher::new()
            .with_page(index, listing)
            .with_page(detail, XUHUI_PAGE);
        let store = Arc::new(MemoryStore::new());

        let report = orchestrator(fetcher, store)
            .with_link_discovery(10)
            .crawl(&[CrawlTarget::new(index).with_region("上海市徐汇区")])
            .await;

        assert_eq!(report.attempted, 2);
        assert_eq!(report.succeeded, 1);
        assert_eq!(report.records[0].source_url, detail);
        assert_eq!(report.records[0].region, "上海市徐汇区");
    }

    #[tokio::test]
    async fn test_pool_bounds_workers() {
        let pool = ExtractionPool::new(0, TextNormalizer::new(), PolicyRecordBuilder::default());
        assert_eq!(pool.available_workers(), 1);

        let processed = pool
            .process(
                PageMetadata::new("https://a.gov.cn/1"),
                RawPage::new("https://a.gov.cn/1", "最高补贴50万元"),
            )
            .await
            .unwrap();
        assert_eq!(processed.record.max_amount, Some(500_000));
        assert_eq!(pool.available_workers(), 1);
    }
}
