use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post, put},
    Router,
};
use sqlx::sqlite::SqlitePool;
use std::sync::Arc;
use tower_cookies::CookieManagerLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod auth;
mod state;

use catalog_backend::{config, db};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "catalog_backend=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration / 加载配置
    let app_config = config::load_config().map_err(anyhow::Error::msg)?;
    config::init_config(app_config.clone());
    tracing::info!(
        "Server will listen on {}:{}",
        app_config.server.host,
        app_config.server.port
    );

    // Create data directory if not exists / 创建数据目录
    let data_dir = app_config.get_data_dir();
    if !data_dir.exists() {
        std::fs::create_dir_all(&data_dir)?;
        tracing::info!("Created data directory: {:?}", data_dir);
    }

    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| app_config.get_database_url());

    let pool = SqlitePool::connect(&database_url).await?;

    db::run_migrations(&pool).await?;
    tracing::info!("Database ready at {}", database_url);

    let state = Arc::new(AppState::new(pool));

    let app = Router::new()
        .route("/api/health", get(api::server::health_check))
        // 公开目录接口 / public catalog surface
        .route("/api/products", get(api::products::list_products))
        .route("/api/products/:id", get(api::products::get_product))
        .route("/api/search", get(api::search::search))
        .route("/api/suggestions", get(api::search::suggestions))
        .route("/api/categories", get(api::search::categories))
        .route("/api/domains", get(api::search::domains))
        // 认证 / auth
        .route("/api/auth/login", post(api::auth::login))
        .route("/api/auth/logout", post(api::auth::logout))
        .route("/api/auth/verify", get(api::auth::verify))
        .route("/api/auth/register", post(api::auth::register))
        .route("/api/auth/change-password", post(api::auth::change_password))
        // 管理端 / admin surface
        .route("/api/admin/products", post(api::products::create_product))
        .route("/api/admin/products/bulk", post(api::products::bulk_import))
        .route("/api/admin/products/:id", put(api::products::update_product))
        .route("/api/admin/products/:id", delete(api::products::delete_product))
        .route("/api/admin/analytics", get(api::analytics::analytics))
        .route("/api/upload/image", post(api::upload::upload_image))
        .route("/api/upload/list", get(api::upload::list_images))
        .route("/api/upload/delete/:id", delete(api::upload::delete_image))
        // base64 入库，留足 multipart 余量
        .layer(DefaultBodyLimit::max(8 * 1024 * 1024))
        .layer(CookieManagerLayer::new())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let bind_addr = app_config.get_bind_address();
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    tracing::info!("Server running at http://{}", bind_addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await?;

    Ok(())
}
