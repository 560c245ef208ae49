use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

use territory_backend::config::Config;
use territory_backend::hub::MapHub;
use territory_backend::{api, db, metrics};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let config = Config::load();
    metrics::register_metrics();

    let db = db::Database::new(&config.database_url)
        .await
        .expect("Failed to initialize database");
    let db = Arc::new(db);
    let hub = Arc::new(MapHub::new());

    let mut app = api::router(db, hub);
    if let Some(dir) = &config.static_dir {
        tracing::info!("Serving static files from {}", dir.display());
        app = app.fallback_service(ServeDir::new(dir));
    }
    if config.cors_permissive {
        app = app.layer(CorsLayer::permissive());
    }

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| panic!("Failed to bind to {addr}: {e}"));

    tracing::info!("Territory backend listening on {addr}");
    axum::serve(listener, app)
        .await
        .expect("Failed to start server");
}
