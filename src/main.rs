mod config;
mod extract;
mod fetch;
mod models;
mod server;

use config::Config;
use fetch::Fetcher;
use server::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = Config::from_env()?;
    let fetcher = Fetcher::new(&config.fetch)?;
    let app = server::app(AppState::new(fetcher));

    let listener = tokio::net::TcpListener::bind(config.socket_addr()).await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
