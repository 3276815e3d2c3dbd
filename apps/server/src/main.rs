use std::path::Path;

use tenderdesk_server::{api::app_router, build_state, config::Config, init_tracing};
use tower_http::services::{ServeDir, ServeFile};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    init_tracing();
    let state = build_state(&config).await?;

    // Unknown paths fall back to index.html so client-side routes resolve.
    let index = Path::new(&config.static_dir).join("index.html");
    let static_files = ServeDir::new(&config.static_dir).fallback(ServeFile::new(index));
    let router = app_router(state, &config).fallback_service(static_files);

    tracing::info!("Listening on {}", config.listen_addr);
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    axum::serve(listener, router).await?;
    Ok(())
}
