// Command-line entry point: crawl policy pages, match companies, report stats.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use policy_pilot::{
    CompanyProfile, CorpusStats, CrawlOrchestrator, CrawlTarget, Embedder, FieldExtractor,
    HttpFetcher, MemoryStore, OpenAiService, PilotConfig, PolicyRecord,
    PolicyRecordBuilder, SemanticMatcher, VectorIndex,
};

#[derive(Parser)]
#[command(name = "pilot", about = "Policy crawling and company matching")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Crawl targets into a corpus file
    Crawl {
        /// JSON array of crawl targets
        #[arg(long)]
        targets: PathBuf,

        /// Corpus file to update (created if missing)
        #[arg(long)]
        corpus: PathBuf,

        /// Follow up to this many policy links found on crawled pages
        #[arg(long, default_value_t = 0)]
        discover: usize,
    },

    /// Match a company profile against a corpus
    Match {
        /// JSON company profile
        #[arg(long)]
        profile: PathBuf,

        #[arg(long)]
        corpus: PathBuf,

        #[arg(long)]
        top_k: Option<usize>,

        #[arg(long)]
        min_score: Option<f64>,

        /// Skip the language model even when credentials are set
        #[arg(long)]
        heuristic_only: bool,
    },

    /// Summarize a corpus
    Stats {
        #[arg(long)]
        corpus: PathBuf,

        /// Date for the active count (defaults to today)
        #[arg(long)]
        today: Option<NaiveDate>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,policy_pilot=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = PilotConfig::from_env().context("Failed to load configuration")?;

    match cli.command {
        Command::Crawl {
            targets,
            corpus,
            discover,
        } => crawl(&config, &targets, &corpus, discover).await,
        Command::Match {
            profile,
            corpus,
            top_k,
            min_score,
            heuristic_only,
        } => {
            let top_k = top_k.unwrap_or(config.matching.top_k);
            let min_score = min_score.unwrap_or(config.matching.min_score);
            match_company(&config, &profile, &corpus, top_k, min_score, heuristic_only).await
        }
        Command::Stats { corpus, today } => {
            let today = today.unwrap_or_else(|| chrono::Local::now().date_naive());
            let records = read_corpus(&corpus)?;
            let stats = CorpusStats::from_records(&records, today);
            println!("{}", serde_json::to_string_pretty(&stats)?);
            Ok(())
        }
    }
}

async fn crawl(config: &PilotConfig, targets: &Path, corpus: &Path, discover: usize) -> Result<()> {
    let raw = std::fs::read_to_string(targets)
        .with_context(|| format!("Failed to read targets from {}", targets.display()))?;
    let targets: Vec<CrawlTarget> =
        serde_json::from_str(&raw).context("Failed to parse crawl targets")?;

    let existing = if corpus.exists() {
        read_corpus(corpus)?
    } else {
        Vec::new()
    };
    let store = Arc::new(MemoryStore::from_records(existing));

    let fetcher = HttpFetcher::from_config(&config.crawl).context("Failed to build HTTP fetcher")?;
    let builder = PolicyRecordBuilder::new(FieldExtractor::new(config.extractor.clone()));
    let orchestrator = CrawlOrchestrator::new(
        Arc::new(fetcher),
        store.clone(),
        builder,
        config.crawl.clone(),
    )
    .with_link_discovery(discover);

    let cancel = cancel_on_ctrl_c();
    let report = orchestrator.crawl_with_cancel(&targets, &cancel).await;

    write_corpus(corpus, &store.snapshot()?)?;
    tracing::info!(
        run_id = %report.run_id,
        succeeded = report.succeeded,
        failed = report.failed,
        new_records = report.new_records,
        updated_records = report.updated_records,
        corpus = %corpus.display(),
        "corpus written"
    );
    if let Some(reason) = &report.aborted {
        tracing::error!(reason = %reason, "crawl stopped early, partial corpus kept");
    }

    let summary = serde_json::json!({
        "run_id": report.run_id,
        "attempted": report.attempted,
        "succeeded": report.succeeded,
        "failed": report.failed,
        "new_records": report.new_records,
        "updated_records": report.updated_records,
        "failures": report.failures,
        "cancelled": report.cancelled,
        "aborted": report.aborted,
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

async fn match_company(
    config: &PilotConfig,
    profile: &Path,
    corpus: &Path,
    top_k: usize,
    min_score: f64,
    heuristic_only: bool,
) -> Result<()> {
    let raw = std::fs::read_to_string(profile)
        .with_context(|| format!("Failed to read profile from {}", profile.display()))?;
    let company: CompanyProfile =
        serde_json::from_str(&raw).context("Failed to parse company profile")?;
    let records = read_corpus(corpus)?;

    let mut matcher = SemanticMatcher::new(config.matching.clone());
    match (&config.llm, heuristic_only) {
        (Some(credentials), false) => {
            let mut service = OpenAiService::from_credentials(credentials)
                .with_timeout(config.matching.llm_timeout());
            if let Some(model) = &config.embedding_model {
                service = service.with_embedding_model(model.clone());
            }
            let service = Arc::new(service);
            matcher = matcher.with_language_model(service.clone());

            if service.embedding_model().is_some() {
                let index = Arc::new(MemoryStore::new());
                index_corpus(service.as_ref(), index.as_ref(), &records).await;
                matcher = matcher.with_embedder(service).with_index(index);
            }
        }
        (None, false) => tracing::info!("LLM_API_KEY not set, using heuristic scoring"),
        (_, true) => tracing::info!("heuristic scoring requested"),
    }

    let cancel = cancel_on_ctrl_c();
    let outcome = matcher
        .match_with_cancel(&company, &records, top_k, min_score, &cancel)
        .await
        .context("Match failed")?;

    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

/// Embed every record; failures leave the record out of retrieval.
async fn index_corpus(embedder: &dyn Embedder, index: &dyn VectorIndex, records: &[PolicyRecord]) {
    for record in records {
        match embedder.embed(&record.embedding_text()).await {
            Ok(embedding) => {
                if let Err(e) = index.upsert_embedding(&record.id, &embedding).await {
                    tracing::warn!(id = %record.id, error = %e, "failed to index record");
                }
            }
            Err(e) => tracing::warn!(id = %record.id, error = %e, "embedding failed"),
        }
    }
}

fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, finishing current step");
            token.cancel();
        }
    });
    cancel
}

fn read_corpus(path: &Path) -> Result<Vec<PolicyRecord>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read corpus from {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Failed to parse corpus {}", path.display()))
}

fn write_corpus(path: &Path, records: &[PolicyRecord]) -> Result<()> {
    let json = serde_json::to_string_pretty(records)?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write corpus to {}", path.display()))
}
