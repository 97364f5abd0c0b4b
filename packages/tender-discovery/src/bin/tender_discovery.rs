//! Command-line tender browser.
//!
//! Runs the discovery engine against the live procurement listing with
//! browsing state kept in SQLite, so successive `more` invocations continue
//! the same session.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tender_discovery::sources::{PccConfig, PccSource};
use tender_discovery::stores::SqliteStateStore;
use tender_discovery::{Batch, Category, DiscoveryConfig, DiscoveryEngine, NextPage};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(name = "tender-discovery")]
#[command(about = "Browse government tenders page by page without repeats")]
struct Cli {
    /// Browsing session owner
    #[arg(long, env = "DISCOVERY_CONSUMER", default_value = "cli")]
    consumer: String,

    /// SQLite database holding browsing state
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = "sqlite://./tender-discovery.db?mode=rwc"
    )]
    database_url: String,

    /// Extra relevance keywords (repeatable)
    #[arg(long = "keyword", short = 'k')]
    keywords: Vec<String>,

    /// Accept invalid TLS certificates from the listing
    #[arg(long)]
    insecure: bool,

    /// Print batches as JSON
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a new session with the latest tenders
    First {
        /// 工程, 財物, 勞務, 不限 or works, goods, services, unrestricted
        #[arg(value_parser = parse_category)]
        category: Category,

        #[arg(long, short = 'n', default_value_t = 10)]
        count: usize,
    },

    /// Continue the session with tenders not shown yet
    More {
        #[arg(value_parser = parse_category)]
        category: Category,

        #[arg(long, short = 'n', default_value_t = 10)]
        count: usize,
    },

    /// Forget the session
    Reset,

    /// Search tender names, outside any session
    Search {
        /// Terms that must all appear in the tender name
        #[arg(required = true)]
        terms: Vec<String>,

        #[arg(long, value_parser = parse_category, default_value = "unrestricted")]
        category: Category,

        #[arg(long, short = 'n', default_value_t = 10)]
        count: usize,
    },

    /// Best ranked tenders of the last few days, outside any session
    Latest {
        #[arg(value_parser = parse_category, default_value = "unrestricted")]
        category: Category,

        #[arg(long, short = 'n', default_value_t = 10)]
        count: usize,
    },

    /// Largest budgets of the last few days, outside any session
    HighValue {
        #[arg(value_parser = parse_category, default_value = "unrestricted")]
        category: Category,

        #[arg(long, short = 'n', default_value_t = 10)]
        count: usize,

        /// Budget floor in NT$
        #[arg(long)]
        min_amount: Option<u64>,
    },
}

fn parse_category(text: &str) -> std::result::Result<Category, String> {
    Category::from_label(text).ok_or_else(|| format!("unknown category: {}", text))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tender_discovery=debug,sqlx=warn".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_line_number(true),
        )
        .init();

    let cli = Cli::parse();

    let mut config = DiscoveryConfig::from_env().context("Failed to load configuration")?;
    if !cli.keywords.is_empty() {
        config = config.with_keywords(cli.keywords.clone());
    }
    if let Commands::HighValue {
        min_amount: Some(amount),
        ..
    } = cli.command
    {
        config.search.high_value_min_amount = amount;
    }

    let source = PccSource::new(
        PccConfig::default()
            .with_timeout_secs(config.walk.fetch_timeout_secs)
            .accept_invalid_certs(cli.insecure),
    )
    .context("Failed to create listing client")?;

    let store = SqliteStateStore::new(&cli.database_url)
        .await
        .with_context(|| format!("Failed to open state database {}", cli.database_url))?;

    let engine = DiscoveryEngine::new(source, store, config);

    match cli.command {
        Commands::First { category, count } => {
            let batch = engine.first_page(&cli.consumer, category, count).await;
            print_batch(&format!("最新{}標案", category.label()), &batch, cli.json)?;
        }
        Commands::More { category, count } => {
            match engine.next_page(&cli.consumer, category, count).await {
                NextPage::Batch(batch) => {
                    print_batch(&format!("更多{}標案", category.label()), &batch, cli.json)?;
                }
                NextPage::NoBaseline => {
                    println!(
                        "No {} session yet. Run `tender-discovery first {}` first.",
                        category.label(),
                        category.as_str()
                    );
                }
            }
        }
        Commands::Reset => {
            engine.reset(&cli.consumer).await;
            println!("Browsing session cleared for {}", cli.consumer);
        }
        Commands::Search {
            terms,
            category,
            count,
        } => {
            let batch = engine.search(category, &terms, count).await;
            print_batch(&format!("「{}」搜尋結果", terms.join(" ")), &batch, cli.json)?;
        }
        Commands::Latest { category, count } => {
            let batch = engine.latest(category, count).await;
            print_batch(&format!("最新{}標案", category.label()), &batch, cli.json)?;
        }
        Commands::HighValue {
            category, count, ..
        } => {
            let batch = engine.high_value(category, count).await;
            print_batch(&format!("高金額{}標案", category.label()), &batch, cli.json)?;
        }
    }

    Ok(())
}

fn print_batch(title: &str, batch: &Batch, json: bool) -> Result<()> {
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(batch).context("Failed to serialize batch")?
        );
        return Ok(());
    }

    if batch.is_empty() {
        println!("目前沒有找到新的政府採購資訊。");
        return Ok(());
    }

    println!("📊 {} (共{}筆)", title, batch.len());
    if let Some(date) = batch.search_date {
        println!("📅 查詢日期：{} (當日無資料，已自動往前查詢)", date.format("%Y/%m/%d"));
    }
    println!();

    for (i, record) in batch.records.iter().enumerate() {
        println!(
            "{}. 【{}，{}】",
            i + 1,
            record.org_name,
            format_budget(record.budget_amount)
        );
        println!("{}", record.tender_name);
        if !record.tender_url.is_empty() {
            println!("🔗 {}", record.tender_url);
        }
        println!();
    }
    Ok(())
}

/// 1.2億, 350萬, or the plain amount.
fn format_budget(amount: Option<u64>) -> String {
    match amount {
        Some(a) if a >= 100_000_000 => format!("{:.1}億", a as f64 / 100_000_000.0),
        Some(a) if a >= 10_000 => format!("{:.0}萬", a as f64 / 10_000.0),
        Some(a) if a > 0 => a.to_string(),
        _ => "未公告".to_string(),
    }
}
