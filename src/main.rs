use std::error::Error;

use recipe_backend::{jwt::SessionKeys, postgres::PgStore, routes, AppState, Config, MediaStore};
use sqlx::postgres::PgPoolOptions;
use tokio::signal::ctrl_c;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenvy::dotenv().ok();
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let config = Config::from_env()?;

    log::info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await?;
    let store = PgStore::new(pool);
    store.migrate().await?;

    let media = MediaStore::new(&config.media_root, &config.media_url);
    media.prepare().await?;

    let keys = SessionKeys::new(&config.jwt_secret, config.session_ttl_hours)?;
    let state = AppState::new(store, media, keys, config.max_upload_bytes);

    let (address, server) =
        warp::serve(routes(state)).try_bind_with_graceful_shutdown(config.bind_addr, async {
            if let Err(e) = ctrl_c().await {
                log::error!("Failed to listen for Ctrl+C: {e}");
            }
            log::info!("Received Ctrl+C, shutting down");
        })?;

    log::info!("Server running on {address}");
    server.await;

    Ok(())
}
