use std::error::Error;

use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Load environment variables from .env file.
    // Fails if .env file not found, not readable or invalid.
    dotenvy::dotenv()?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info,retrieval=info,bundler=info"))
        .unwrap();

    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let state = api::AppState::from_env()?;

    // Periodic garbage collection of idle sessions; expiry is also detected
    // lazily on access.
    let sessions = state.sessions.clone();
    let sweep_interval = sessions.ttl() / 2;
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(sweep_interval.max(std::time::Duration::from_secs(1)));
        loop {
            ticker.tick().await;
            let collected = sessions.sweep().await;
            if collected > 0 {
                tracing::debug!(target: "backend", collected, "session sweep");
            }
        }
    });

    api::start(state).await?;

    Ok(())
}
