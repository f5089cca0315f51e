//! Testing utilities including mock implementations.
//!
//! Useful for exercising crawl and match flows without network access or
//! real model calls.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use crate::error::{FetchError, FetchResult, ServiceError, ServiceResult};
use crate::traits::ai::{CompletionRequest, CompletionResponse, Embedder, LanguageModel};
use crate::traits::fetcher::{PageFetcher, RawPage};
use crate::types::company::{
    Certification, CompanyProfile, IndustryCategory, RdIntensity, ScaleClass,
};
use crate::types::policy::{
    FieldProvenance, IdentityKey, PolicyRecord, PolicyTargeting, SupportType,
};

/// A fully populated Xuhui AI subsidy record with the given title.
pub fn sample_policy(title: &str) -> PolicyRecord {
    let source_url = "https://www.xuhui.gov.cn/zcwj/policy.html";
    let key = IdentityKey::new(title, source_url);
    let crawled = DateTime::<Utc>::from_timestamp(1_714_550_400, 0).unwrap_or_default();

    PolicyRecord {
        id: key.record_id(),
        title: key.title,
        region: "上海市徐汇区".into(),
        category: "产业扶持".into(),
        department: "徐汇区科学技术委员会".into(),
        support_type: SupportType::Subsidy,
        max_amount: Some(500_000),
        deadline: NaiveDate::from_ymd_opt(2025, 12, 31),
        industry_tags: vec!["人工智能".into(), "科技创新".into()],
        requirements: vec![
            "企业注册地在徐汇区".into(),
            "从事人工智能相关业务".into(),
            "企业信用状况良好".into(),
        ],
        raw_content: "对注册在徐汇区的人工智能企业给予研发补贴，最高补贴50万元。".into(),
        source_url: key.source_url,
        pdf_url: None,
        targeting: PolicyTargeting::default(),
        provenance: FieldProvenance::default(),
        crawl_time: crawled,
        updated_at: crawled,
    }
}

/// A Xuhui AI company that fits [`sample_policy`] on every factor.
pub fn sample_company() -> CompanyProfile {
    CompanyProfile::new(
        "上海智算科技有限公司",
        "上海市徐汇区",
        IndustryCategory::Ai,
        ScaleClass::Medium,
        RdIntensity::High,
    )
    .with_patents(12)
    .with_certification(Certification::HighTech)
    .with_credit_status("良好")
    .with_operating_status("正常经营")
}

#[derive(Debug, Clone)]
enum MockResponse {
    Page(String),
    Status(u16),
    Transport(String),
}

/// A mock fetcher for testing.
///
/// Serves predefined bodies by URL; unknown URLs answer 404.
#[derive(Default)]
pub struct MockFetcher {
    responses: Arc<RwLock<HashMap<String, MockResponse>>>,

    /// Delay before every response
    latency: Option<Duration>,

    /// Call tracking
    calls: Arc<RwLock<Vec<String>>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `body` for `url`.
    pub fn with_page(self, url: impl Into<String>, body: impl Into<String>) -> Self {
        self.responses
            .write()
            .unwrap()
            .insert(url.into(), MockResponse::Page(body.into()));
        self
    }

    /// Answer `url` with a non-success status.
    pub fn with_status(self, url: impl Into<String>, status: u16) -> Self {
        self.responses
            .write()
            .unwrap()
            .insert(url.into(), MockResponse::Status(status));
        self
    }

    /// Fail `url` as if the fetcher could not operate at all.
    pub fn with_transport_failure(self, url: impl Into<String>, reason: impl Into<String>) -> Self {
        self.responses
            .write()
            .unwrap()
            .insert(url.into(), MockResponse::Transport(reason.into()));
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// URLs fetched so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.read().unwrap().clone()
    }
}

#[async_trait]
impl PageFetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> FetchResult<RawPage> {
        self.calls.write().unwrap().push(url.to_string());

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let response = self.responses.read().unwrap().get(url).cloned();
        match response {
            Some(MockResponse::Page(body)) => Ok(RawPage::new(url, body)),
            Some(MockResponse::Status(status)) => Err(FetchError::Status {
                url: url.to_string(),
                status,
            }),
            Some(MockResponse::Transport(reason)) => Err(FetchError::Transport(reason)),
            None => Err(FetchError::Status {
                url: url.to_string(),
                status: 404,
            }),
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Deterministic embedder: hashed character counts, L2-normalized.
///
/// Texts sharing many characters end up close, which is enough for
/// retrieval tests.
pub struct MockEmbedder {
    dimension: usize,
    failure: Option<ServiceError>,
    latency: Option<Duration>,
    calls: Arc<RwLock<Vec<String>>>,
}

impl Default for MockEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEmbedder {
    pub fn new() -> Self {
        Self {
            dimension: 64,
            failure: None,
            latency: None,
            calls: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = dimension.max(1);
        self
    }

    /// Fail every call with `error`.
    pub fn failing(mut self, error: ServiceError) -> Self {
        self.failure = Some(error);
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.read().unwrap().clone()
    }

    fn bucket(&self, ch: char) -> usize {
        let mut buf = [0u8; 4];
        let digest = Sha256::digest(ch.encode_utf8(&mut buf).as_bytes());
        u16::from_be_bytes([digest[0], digest[1]]) as usize % self.dimension
    }
}

#[async_trait]
impl Embedder for MockEmbedder {
    async fn embed(&self, text: &str) -> ServiceResult<Vec<f32>> {
        self.calls.write().unwrap().push(text.to_string());
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if let Some(error) = &self.failure {
            return Err(error.clone());
        }

        let mut vector = vec![0.0f32; self.dimension];
        for ch in text.chars().filter(|c| !c.is_whitespace()) {
            vector[self.bucket(ch)] += 1.0;
        }
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|v| *v /= norm);
        }
        Ok(vector)
    }

    fn dimension(&self) -> Option<usize> {
        Some(self.dimension)
    }
}

/// Language model that plays back scripted replies in order.
///
/// When the script runs out, the fallback reply (if any) is used; otherwise
/// calls fail as unavailable.
#[derive(Default)]
pub struct ScriptedLanguageModel {
    script: Arc<RwLock<VecDeque<ServiceResult<String>>>>,
    fallback: Option<String>,
    latency: Option<Duration>,
    requests: Arc<RwLock<Vec<CompletionRequest>>>,
}

impl ScriptedLanguageModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reply(self, reply: impl Into<String>) -> Self {
        self.script.write().unwrap().push_back(Ok(reply.into()));
        self
    }

    pub fn with_error(self, error: ServiceError) -> Self {
        self.script.write().unwrap().push_back(Err(error));
        self
    }

    /// Reply used once the script is exhausted.
    pub fn with_fallback_reply(mut self, reply: impl Into<String>) -> Self {
        self.fallback = Some(reply.into());
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.read().unwrap().clone()
    }
}

#[async_trait]
impl LanguageModel for ScriptedLanguageModel {
    async fn complete(&self, request: CompletionRequest) -> ServiceResult<CompletionResponse> {
        self.requests.write().unwrap().push(request);

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let next = self.script.write().unwrap().pop_front();
        match next {
            Some(reply) => reply.map(CompletionResponse::text),
            None => self
                .fallback
                .clone()
                .map(CompletionResponse::text)
                .ok_or_else(|| ServiceError::Unavailable("script exhausted".into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::store::cosine_similarity;

    #[tokio::test]
    async fn test_mock_fetcher_records_calls() {
        let fetcher = MockFetcher::new().with_page("https://a.gov.cn/1", "正文");
        assert_eq!(fetcher.fetch("https://a.gov.cn/1").await.unwrap().body, "正文");
        assert!(matches!(
            fetcher.fetch("https://a.gov.cn/2").await,
            Err(FetchError::Status { status: 404, .. })
        ));
        assert_eq!(fetcher.calls(), ["https://a.gov.cn/1", "https://a.gov.cn/2"]);
    }

    #[tokio::test]
    async fn test_mock_embedder_is_deterministic() {
        let embedder = MockEmbedder::new();
        let a = embedder.embed("徐汇区人工智能补贴").await.unwrap();
        let b = embedder.embed("徐汇区人工智能补贴").await.unwrap();
        let c = embedder.embed("农业种植保险").await.unwrap();

        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(cosine_similarity(&a, &b) > 0.999);
        assert!(cosine_similarity(&a, &c) < cosine_similarity(&a, &b));
    }

    #[tokio::test]
    async fn test_scripted_model_plays_back_in_order() {
        let model = ScriptedLanguageModel::new()
            .with_reply("一")
            .with_error(ServiceError::Timeout);
        let request = CompletionRequest {
            model: "m".into(),
            messages: vec![],
            temperature: 0.3,
            max_tokens: 10,
        };

        assert_eq!(model.complete(request.clone()).await.unwrap().content, "一");
        assert!(matches!(
            model.complete(request.clone()).await,
            Err(ServiceError::Timeout)
        ));
        assert!(matches!(
            model.complete(request).await,
            Err(ServiceError::Unavailable(_))
        ));
        assert_eq!(model.requests().len(), 3);
    }
}
