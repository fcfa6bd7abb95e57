use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use educate_backend::{app, db};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "educate_backend=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment variables
    dotenvy::dotenv().ok();

    // Database setup
    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://educate.db".to_string());

    let pool = db::init_db(&database_url).await?;
    tracing::info!("Database initialized");

    let app = app(pool);

    let port = std::env::var("PORT").unwrap_or_else(|_| "3020".to_string());
    let addr = format!("0.0.0.0:{}", port);
    tracing::info!("Server running on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
