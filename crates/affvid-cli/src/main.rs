use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod catalog;
mod clients;
mod run;

#[derive(Debug, Parser)]
#[command(name = "affvid-cli")]
#[command(about = "Affiliate video pipeline command line interface")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Database maintenance
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
    /// Scrape every product URL listed in a CSV file into the catalog
    Ingest {
        /// CSV file with a `url` column
        #[arg(long)]
        csv: PathBuf,
        /// List the URLs that would be ingested without fetching anything
        #[arg(long)]
        dry_run: bool,
    },
    /// Scrape a single product page into the catalog
    Scrape {
        /// Product page URL
        url: String,
    },
    /// Ingest marketplace search results into the catalog
    Search {
        #[arg(long)]
        keyword: String,
        /// Items per listing page
        #[arg(long, default_value = "40")]
        limit: u32,
        /// Number of listing pages to fetch
        #[arg(long, default_value = "1")]
        pages: u32,
    },
    /// Produce and publish videos for unpublished products
    Run {
        /// Maximum number of products to process
        #[arg(long, default_value = "10")]
        limit: i64,
        /// List the products that would be processed without calling any
        /// external service
        #[arg(long)]
        dry_run: bool,
    },
    /// Show recent ingest and pipeline runs
    Status {
        #[arg(long, default_value = "20")]
        limit: i64,
    },
}

#[derive(Debug, Subcommand)]
enum DbCommands {
    Ping,
    Migrate,
}

async fn connect(config: &affvid_core::AppConfig) -> anyhow::Result<sqlx::PgPool> {
    let pool = affvid_db::connect_pool(
        &config.database_url,
        affvid_db::PoolConfig::from_app_config(config),
    )
    .await?;
    Ok(pool)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let Some(command) = cli.command else {
        println!("affvid-cli: no command given; see --help");
        return Ok(());
    };

    let config = affvid_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();
    tracing::debug!(
        env = %config.env,
        data_dir = %config.data_dir.display(),
        "configuration loaded"
    );

    match command {
        Commands::Db {
            command: DbCommands::Ping,
        } => {
            let pool = connect(&config).await?;
            affvid_db::health_check(&pool).await?;
            println!("database ok");
        }
        Commands::Db {
            command: DbCommands::Migrate,
        } => {
            let pool = connect(&config).await?;
            let applied = affvid_db::run_migrations(&pool).await?;
            println!("applied {applied} migration(s)");
        }
        Commands::Ingest { csv, dry_run } => {
            if dry_run {
                catalog::preview_ingest(&csv)?;
            } else {
                let pool = connect(&config).await?;
                catalog::run_ingest(&pool, &config, &csv).await?;
            }
        }
        Commands::Scrape { url } => {
            let pool = connect(&config).await?;
            catalog::run_scrape(&pool, &config, &url).await?;
        }
        Commands::Search {
            keyword,
            limit,
            pages,
        } => {
            let pool = connect(&config).await?;
            catalog::run_search(&pool, &config, &keyword, limit, pages).await?;
        }
        Commands::Run { limit, dry_run } => {
            let pool = connect(&config).await?;
            if dry_run {
                run::preview_batch(&pool, limit).await?;
            } else {
                run::run_batch(&pool, &config, limit).await?;
            }
        }
        Commands::Status { limit } => {
            let pool = connect(&config).await?;
            run::run_status(&pool, limit).await?;
        }
    }

    Ok(())
}
