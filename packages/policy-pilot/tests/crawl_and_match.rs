//! End-to-end: crawl mock pages into the memory store, then match.

use std::sync::Arc;

use policy_pilot::testing::{sample_company, MockEmbedder, MockFetcher, ScriptedLanguageModel};
use policy_pilot::{
    CorpusStats, CrawlConfig, CrawlOrchestrator, CrawlTarget, FailureKind, HeuristicScorer,
    MatchConfig, MemoryStore, PolicyFilter, PolicyRecordBuilder, PolicyStore, ScoreSource,
    SemanticMatcher, SupportType,
};

const AI_PAGE: &str = r#"<html><head><title>徐汇区人工智能产业扶持办法</title></head>
<body><div class="content">
<p>为加快推进徐汇区人工智能产业高质量发展，现就有关支持措施通知如下。</p>
<p>一、申请条件：企业注册地在徐汇区；从事人工智能相关业务；企业信用状况良好</p>
<p>二、支持标准：对符合条件的企业给予研发补贴，最高补贴50万元。</p>
<p>三、申报截止日期：2025年6月30日。</p>
<p>联系部门：徐汇区科学技术委员会</p>
</div></body></html>"#;

const TAX_PAGE: &str = r#"<html><head><title>高新技术企业所得税优惠政策解读</title></head>
<body><div class="content">
<p>经认定的高新技术企业，减按15%的税率征收企业所得税。本政策适用于全国范围内的科技型企业。</p>
<p>申请条件：企业须注册成立一年以上；研发费用占销售收入比例符合规定。</p>
<p>发布单位：国家税务总局</p>
</div></body></html>"#;

const FARM_PAGE: &str = r#"<html><head><title>海淀区农业种植保险补助办法</title></head>
<body><div class="content">
<p>对在海淀区从事农业种植的经营主体给予保险保费补助，最高补助20万元。</p>
<p>申请条件：在海淀区登记的农业合作社或家庭农场；具备完整的种植记录。</p>
</div></body></html>"#;

fn crawl_config() -> CrawlConfig {
    CrawlConfig::default()
        .with_delay_ms(0)
        .with_fetch_timeout_secs(5)
        .with_min_content_chars(20)
}

fn targets() -> Vec<CrawlTarget> {
    vec![
        CrawlTarget::new("https://www.xuhui.gov.cn/zcwj/ai.html")
            .with_region("上海市徐汇区")
            .with_category("产业扶持"),
        CrawlTarget::new("https://www.chinatax.gov.cn/zcfg/hitech.html").with_category("税收优惠"),
        CrawlTarget::new("https://www.bjhd.gov.cn/zwgk/farm.html")
            .with_region("北京市海淀区")
            .with_category("农业"),
        CrawlTarget::new("https://www.bjhd.gov.cn/zwgk/missing.html").with_region("北京市海淀区"),
    ]
}

fn fetcher() -> MockFetcher {
    MockFetcher::new()
        .with_page("https://www.xuhui.gov.cn/zcwj/ai.html", AI_PAGE)
        .with_page("https://www.chinatax.gov.cn/zcfg/hitech.html", TAX_PAGE)
        .with_page("https://www.bjhd.gov.cn/zwgk/farm.html", FARM_PAGE)
}

async fn crawled_store() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    let orchestrator = CrawlOrchestrator::new(
        Arc::new(fetcher()),
        store.clone(),
        PolicyRecordBuilder::default(),
        crawl_config(),
    );
    orchestrator.crawl(&targets()).await;
    store
}

#[tokio::test]
async fn crawl_reports_successes_and_failures() {
    let store = Arc::new(MemoryStore::new());
    let orchestrator = CrawlOrchestrator::new(
        Arc::new(fetcher()),
        store.clone(),
        PolicyRecordBuilder::default(),
        crawl_config(),
    );

    let report = orchestrator.crawl(&targets()).await;

    assert_eq!(report.attempted, 4);
    assert_eq!(report.succeeded, 3);
    assert_eq!(report.failed, 1);
    assert_eq!(report.failures[0].kind, FailureKind::Status);
    assert_eq!(store.count().await.unwrap(), 3);

    let tax = store
        .list(&PolicyFilter::new().with_support_type(SupportType::Tax))
        .await
        .unwrap();
    assert_eq!(tax.len(), 1);
    assert_eq!(tax[0].region, "全国");
}

#[tokio::test]
async fn recrawl_updates_in_place() {
    let store = Arc::new(MemoryStore::new());
    let orchestrator = CrawlOrchestrator::new(
        Arc::new(fetcher()),
        store.clone(),
        PolicyRecordBuilder::default(),
        crawl_config(),
    );

    let first = orchestrator.crawl(&targets()).await;
    let second = orchestrator.crawl(&targets()).await;

    assert_eq!(first.new_records, 3);
    assert_eq!(second.new_records, 0);
    assert_eq!(second.updated_records, 3);
    assert_eq!(store.count().await.unwrap(), 3);

    let ids: Vec<_> = first.records.iter().map(|r| r.id.clone()).collect();
    assert!(second.records.iter().all(|r| ids.contains(&r.id)));
}

#[tokio::test]
async fn heuristic_match_prefers_local_ai_policy() {
    let store = crawled_store().await;
    let corpus = store.snapshot().unwrap();
    let company = sample_company();

    let outcome = SemanticMatcher::new(MatchConfig::default())
        .match_company(&company, &corpus, 5, 0.0)
        .await
        .unwrap();

    assert!(outcome.capabilities.heuristic_only());
    assert_eq!(outcome.matches.len(), 3);
    assert_eq!(outcome.matches[0].result().policy_title, "徐汇区人工智能产业扶持办法");
    assert!(outcome.matches[0].score() > outcome.matches[2].score());
    assert_eq!(
        outcome.matches.last().unwrap().result().policy_title,
        "海淀区农业种植保险补助办法"
    );

    let expected = HeuristicScorer::new().rank(&company, &corpus, 5, 0.0);
    let results: Vec<_> = outcome.results().cloned().collect();
    assert_eq!(results, expected);
}

#[tokio::test]
async fn semantic_match_with_embeddings_and_model() {
    let store = Arc::new(MemoryStore::new());
    let embedder = Arc::new(MockEmbedder::new());
    let orchestrator = CrawlOrchestrator::new(
        Arc::new(fetcher()),
        store.clone(),
        PolicyRecordBuilder::default(),
        crawl_config(),
    )
    .with_embeddings(embedder.clone(), store.clone());
    orchestrator.crawl(&targets()).await;
    assert_eq!(store.embedding_count().unwrap(), 3);

    let model = ScriptedLanguageModel::new()
        .with_reply("{\"match_score\": 0.92, \"recommendation\": \"优先申报\"}")
        .with_reply("无法判断")
        .with_fallback_reply("{\"match_score\": 0.35}");

    let corpus = store.snapshot().unwrap();
    let outcome = SemanticMatcher::new(MatchConfig::default())
        .with_embedder(embedder)
        .with_index(store.clone())
        .with_language_model(Arc::new(model))
        .match_company(&sample_company(), &corpus, 2, 0.3)
        .await
        .unwrap();

    assert!(outcome.capabilities.can_retrieve());
    assert_eq!(outcome.candidates_considered, 3);
    assert_eq!(outcome.fallbacks, 1);
    assert_eq!(outcome.matches.len(), 2);
    assert_eq!(outcome.matches[0].score(), 0.92);
    assert_eq!(outcome.matches[0].source(), ScoreSource::Semantic);
}

#[tokio::test]
async fn corpus_stats_over_crawled_records() {
    let store = crawled_store().await;
    let today = chrono::NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();

    let stats = CorpusStats::from_records(&store.snapshot().unwrap(), today);

    assert_eq!(stats.total, 3);
    assert_eq!(stats.by_region.get("全国"), Some(&1));
    // The AI page's stated deadline has passed; the other two state none.
    assert_eq!(stats.active, 2);
    assert_eq!(stats.with_placeholders, 2);
}

#[tokio::test]
async fn paragraph_requirements_do_not_absorb_following_text() {
    let store = crawled_store().await;
    let tax = store
        .snapshot()
        .unwrap()
        .into_iter()
        .find(|r| r.support_type == SupportType::Tax)
        .unwrap();

    assert_eq!(
        tax.requirements,
        vec!["企业须注册成立一年以上", "研发费用占销售收入比例符合规定"]
    );
    assert!(tax.provenance.deadline_defaulted);
}
