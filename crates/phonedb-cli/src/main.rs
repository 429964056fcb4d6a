mod clean;
mod jobs;
mod scrape;

use std::sync::Arc;

use clap::{CommandFactory, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "phonedb-cli")]
#[command(about = "Phone marketplace scraper command line interface")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Scrape one marketplace, or every enabled one with `all`
    Scrape {
        /// Marketplace name from the marketplace table, or `all`
        target: String,
    },
    /// Re-classify recent catalog entries and fix category, brand and model
    Clean {
        #[arg(short, long, default_value = "ouedkniss", conflicts_with = "all")]
        marketplace: String,
        #[arg(short, long, default_value_t = 100)]
        limit: i64,
        /// Report changes without writing them
        #[arg(short, long)]
        dry_run: bool,
        /// Clean entries from every marketplace
        #[arg(short, long)]
        all: bool,
    },
    /// Show scheduled job status, or recent run logs for one marketplace
    Jobs {
        #[arg(long)]
        logs: Option<String>,
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
}

#[derive(Debug, Subcommand)]
enum DbCommands {
    Ping,
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        return Ok(());
    };

    let config = phonedb_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool_config = phonedb_db::PoolConfig::from_app_config(&config);
    let pool = phonedb_db::connect_pool(&config.database_url, pool_config).await?;

    match command {
        Commands::Scrape { target } => {
            let mut marketplaces = phonedb_core::load_marketplaces(&config.marketplaces_path)?;
            marketplaces.apply_env_overrides(|key| std::env::var(key))?;
            scrape::run_scrape(pool, &config, Arc::new(marketplaces), &target).await?;
        }
        Commands::Clean {
            marketplace,
            limit,
            dry_run,
            all,
        } => {
            let scope = if all { None } else { Some(marketplace.as_str()) };
            clean::run_clean(&pool, &config, scope, limit, dry_run).await?;
        }
        Commands::Jobs { logs, limit } => match logs {
            Some(marketplace) => jobs::print_job_logs(&pool, &marketplace, limit).await?,
            None => jobs::print_jobs(&pool).await?,
        },
        Commands::Db { command } => match command {
            DbCommands::Ping => {
                phonedb_db::ping(&pool).await?;
                println!("database connection ok");
            }
            DbCommands::Migrate => {
                let applied = phonedb_db::run_migrations(&pool).await?;
                println!("applied {applied} migration(s)");
            }
        },
    }

    Ok(())
}
