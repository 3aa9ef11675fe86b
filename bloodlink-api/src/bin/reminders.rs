//! One-shot reminder run, meant to be started by cron.

use chrono::Utc;

use bloodlink_api::config::AppConfig;
use bloodlink_api::services::reminder_service;
use bloodlink_shared::clients::db::create_pool;
use bloodlink_shared::middleware::init_tracing;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing("bloodlink-reminders");

    let config = AppConfig::load()?;
    let pool = create_pool(&config.database_url, 2)?;

    let report = tokio::task::spawn_blocking(move || -> anyhow::Result<_> {
        let mut conn = pool.get()?;
        Ok(reminder_service::run(&mut conn, Utc::now())?)
    })
    .await??;

    tracing::info!(total = report.total(), "reminder run finished");
    Ok(())
}
