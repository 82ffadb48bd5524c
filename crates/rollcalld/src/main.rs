use anyhow::Result;
use tracing_subscriber::EnvFilter;

use rollcalld::{app, state, Config};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = Config::from_env();
    tracing::info!(
        bind = %config.http_bind,
        face_api = %config.face_api_url,
        db = %config.db_path.display(),
        "rollcalld starting"
    );

    let state = state::init(&config).await?;
    let router = app(state);

    let listener = tokio::net::TcpListener::bind(&config.http_bind).await?;
    tracing::info!("rollcalld listening on http://{}", config.http_bind);

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    tracing::info!("rollcalld shutting down");
    Ok(())
}
