use std::sync::Arc;

use phonedb_scheduler::{fixed_offset, JobManager, JobSpec, PgJobStore, Pipeline};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = phonedb_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let mut marketplaces = phonedb_core::load_marketplaces(&config.marketplaces_path)?;
    marketplaces.apply_env_overrides(|key| std::env::var(key))?;
    let marketplaces = Arc::new(marketplaces);

    let pool_config = phonedb_db::PoolConfig::from_app_config(&config);
    let pool = phonedb_db::connect_pool(&config.database_url, pool_config).await?;
    phonedb_db::run_migrations(&pool).await?;

    let pipeline = Pipeline::new(pool.clone(), Arc::clone(&marketplaces), config.scraping());
    let manager = JobManager::new(
        Arc::new(PgJobStore::new(pool)),
        Arc::new(pipeline),
        JobSpec::from_marketplaces(&marketplaces),
        fixed_offset(config.timezone_offset_hours)?,
    );

    tracing::info!(env = %config.env, "scheduler: starting");
    manager.initialize_jobs().await?;

    shutdown_signal().await;

    manager.stop_all();
    tracing::info!("scheduler: waiting for in-flight runs to finish");
    manager.wait_idle().await;
    tracing::info!("scheduler: stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for ctrl-c");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
}
