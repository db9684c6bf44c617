use std::path::PathBuf;

use taskboard_server::{build_router, storage, AppConfig, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "taskboard_server=info,tower_http=info".into()),
        )
        .init();

    let data_dir = std::env::var("TASKBOARD_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("data"));

    tracing::info!("data directory: {}", data_dir.display());

    let db = storage::init_db(&data_dir)?;
    tracing::info!("database initialized");

    let config = AppConfig::from_env()?;
    let base_url = config.base_url.clone();
    let app = build_router(AppState::new(db, config));

    tracing::info!("starting server at {base_url}");

    let port = std::env::var("PORT").unwrap_or_else(|_| "3000".into());
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
