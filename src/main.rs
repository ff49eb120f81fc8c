use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use clap::{ArgGroup, Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing_subscriber::{fmt, EnvFilter};
use uuid::Uuid;

mod auth;
mod config;
mod db;
mod error;
mod models;
mod quality;
mod report;
mod routes;
mod seed;
mod server;
mod service;
mod store;

use config::Config;
use models::Period;
use service::Page;
use store::{MemoryStore, QualityStore};

#[derive(Parser)]
#[command(name = "provider-quality-index")]
#[command(about = "Service Quality Index scoring for marketplace providers", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Import appointments from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Calculate and save quality scores
    #[command(group(
        ArgGroup::new("scope")
            .args(["provider", "all"])
            .required(true)
            .multiple(false)
    ))]
    Calculate {
        #[arg(long)]
        provider: Option<Uuid>,
        #[arg(long)]
        all: bool,
        #[arg(long, default_value_t = Period::Monthly)]
        period: Period,
    },
    /// Generate a markdown quality report for one provider
    Report {
        #[arg(long)]
        provider: Uuid,
        #[arg(long, default_value_t = Period::Monthly)]
        period: Period,
        #[arg(long, default_value = "quality-report.md")]
        out: PathBuf,
    },
    /// Print cross-provider benchmarks
    Benchmarks {
        #[arg(long, default_value_t = Period::Monthly)]
        period: Period,
    },
    /// Run the HTTP API
    Serve {
        /// Use an in-memory store loaded with demo data instead of Postgres
        #[arg(long)]
        memory: bool,
    },
}

async fn connect(config: &Config) -> anyhow::Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(config.require_database_url()?)
        .await
        .context("failed to connect to Postgres")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    if let Commands::Serve { memory: true } = cli.command {
        let store = MemoryStore::from_dataset(seed::demo_dataset(Utc::now())?);
        return server::start_server(&config, Arc::new(store)).await;
    }

    let pool = connect(&config).await?;
    let store = db::PgStore::new(pool.clone());

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::Import { csv } => {
            let inserted = db::import_csv(&pool, &csv).await?;
            println!("Inserted {inserted} appointments from {}.", csv.display());
        }
        Commands::Calculate {
            provider,
            all,
            period,
        } => {
            let provider_ids = match provider {
                Some(id) => vec![id],
                None if all => store.provider_ids().await?,
                None => Vec::new(),
            };

            if provider_ids.is_empty() {
                println!("No providers to score.");
                return Ok(());
            }

            println!("Quality scores ({period}):");
            for provider_id in provider_ids {
                let score = service::calculate_and_save(&store, provider_id, period, Utc::now())
                    .await
                    .with_context(|| format!("failed to score provider {provider_id}"))?;
                println!(
                    "- {} sqi {:.2} ({}) completion {:.1}% complaints {:.1}%",
                    provider_id,
                    score.sqi(),
                    score.classification(),
                    score.metrics.appointment_completion_rate,
                    score.metrics.complaint_rate
                );
            }
        }
        Commands::Report {
            provider,
            period,
            out,
        } => {
            let details = service::require_provider(&store, provider).await?;
            let score = service::current_score(&store, provider, period).await?;
            let (history, _) =
                service::score_history(&store, provider, period, Page::new(None, None)?).await?;
            let report = report::build_report(&details, &score, &history);
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
        Commands::Benchmarks { period } => {
            let summary = service::benchmarks_for(&store, period).await?;
            if summary.provider_count == 0 {
                println!("No active {period} scores yet.");
                return Ok(());
            }

            println!("Benchmarks across {} providers ({period}):", summary.provider_count);
            let stats = [
                ("average", summary.average_sqi),
                ("p25", summary.p25),
                ("median", summary.median),
                ("p75", summary.p75),
                ("p90", summary.p90),
            ];
            for (label, value) in stats {
                if let Some(value) = value {
                    println!("- {label}: {value:.2}");
                }
            }
            println!(
                "- tiers: {} excellent, {} good, {} average, {} poor",
                summary.tiers.excellent,
                summary.tiers.good,
                summary.tiers.average,
                summary.tiers.poor
            );
        }
        Commands::Serve { .. } => {
            let state: Arc<dyn QualityStore> = Arc::new(store);
            server::start_server(&config, state).await?;
        }
    }

    Ok(())
}
