pub mod db;
pub mod error;
pub mod models;
pub mod routes;
pub mod storage;

use axum::{Router, response::IntoResponse, routing::get};
use sqlx::SqlitePool;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use routes::{auth_routes, comments_routes, resources_routes, users_routes};

pub fn app(pool: SqlitePool) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .nest("/api/auth", auth_routes())
        .nest("/api/users", users_routes())
        .nest("/api/resources", resources_routes())
        .nest("/api/resources", comments_routes())
        .route("/api/health", get(health_check))
        .layer(axum::extract::DefaultBodyLimit::max(
            55 * 1024 * 1024,
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(pool)
}

async fn health_check() -> impl IntoResponse {
    axum::Json(serde_json::json!({
        "status": "Server is running",
        "timestamp": chrono::Utc::now(),
    }))
}
