use arko::api::{handlers::AppState, routes};
use arko::config::Config;
use arko::db::Database;
use arko::obs;
use std::net::SocketAddr;
use std::sync::Arc;

/// Starts the HTTP server.
///
/// Loads configuration, connects to the database (applying migrations) and
/// serves the HTML views, the JSON API and its documentation.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    obs::init_tracing("arko=debug,tower_http=debug");

    let config = Config::from_env()?;

    let db = Database::new(&config.database_url).await?;
    tracing::info!("Database connection pool established");

    let state = Arc::new(AppState::new(db.pool.clone(), config.clone()));
    tracing::info!(
        "Session store initialized (TTL {}s)",
        config.session_ttl_secs
    );

    let app = routes::app(state, true)?;

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
