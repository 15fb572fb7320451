use anyhow::{Context, Result};
use flappy_board::config::Config;
use flappy_board::leaderboard::{ScoreStore, server};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::load()?;
    let path = &config.server.store_path;
    let store = ScoreStore::open(path).with_context(|| format!("opening {}", path.display()))?;
    log::info!("{} scores loaded from {}", store.len(), path.display());

    let listener = server::bind(&config.server.bind)
        .await
        .with_context(|| format!("binding {}", config.server.bind))?;
    let read_timeout = Duration::from_secs(config.server.read_timeout_secs);
    server::serve(listener, Arc::new(Mutex::new(store)), read_timeout).await?;
    Ok(())
}
