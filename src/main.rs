mod app;
mod auth;
mod config;
mod db;
mod error;
mod images;
mod products;
mod state;
mod storage;
#[cfg(test)]
mod test_support;
mod validation;

use crate::config::AppConfig;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    if config.log.json {
        tracing_subscriber::fmt()
            .with_env_filter(config.log.filter.as_str())
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(config.log.filter.as_str())
            .init();
    }
    tracing::info!(environment = ?config.environment, upload_dir = %config.upload_dir.display(), "configuration loaded");

    let addr = config.bind_addr()?;
    let db = db::connect(&config.database_url).await?;
    db::migrate(&db).await;

    let app = app::build_app(AppState::init(config, db));
    app::serve(app, addr).await
}
