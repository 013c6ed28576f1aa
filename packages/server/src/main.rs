use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use iib_server::config::AppConfig;
use iib_server::database::init_db;
use iib_server::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load().context("Failed to load configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log.level)),
        )
        .init();

    let db = init_db(&config.database)
        .await
        .context("Failed to initialize database")?;

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = AppState { db, config };
    let app = iib_server::build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("IIB API listening on http://{}", addr);
    info!("Swagger UI available at http://{}/swagger-ui", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
