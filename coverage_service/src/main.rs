use axum::Router;
use coverage_service::{routes, AppState, Config, SqliteStore};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env();

    info!(
        database = config.database_url.as_str(),
        bind_address = config.bind_address.as_str(),
        badge_base_url = config.badge_base_url.as_str(),
        "Starting coverage service"
    );

    let store = SqliteStore::connect(&config.database_url).await?;
    let state = AppState::new(store, &config);

    let app = Router::new()
        .merge(routes::<SqliteStore>())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    info!(bind_address = config.bind_address.as_str(), "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(signal())
        .await?;
    Ok(())
}

async fn signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received, terminating...");
}
