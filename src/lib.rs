use std::{io, sync::Arc};

use axum::{http::StatusCode, routing::get, routing::get_service, Extension, Router};
use deadpool::managed::Pool;
use diesel_async::{pooled_connection::AsyncDieselConnectionManager, AsyncPgConnection};
use tower_http::{limit::RequestBodyLimitLayer, services::ServeDir, trace::TraceLayer};

pub mod api;
pub mod auth;
pub mod chat;
pub mod config;
pub mod countdown;
pub mod email;
pub mod error;
pub mod forms;
pub mod matching;
pub mod models;
pub mod resume;
pub mod schema;
pub mod storage;
pub mod telemetry;

use chat::ChatHub;
use config::Config;
use email::Mailer;
use storage::Storage;

pub type DbPool = Pool<AsyncDieselConnectionManager<AsyncPgConnection>>;

/// Request body seen by every route once the upload limit is applied.
pub type RequestBody = http_body::Limited<axum::body::Body>;

/// Builds the pool without opening a connection; the first query connects.
pub fn connect_to_db(db_url: &str) -> anyhow::Result<DbPool> {
    let db_config = AsyncDieselConnectionManager::<AsyncPgConnection>::new(db_url);
    Ok(Pool::builder(db_config).build()?)
}

/// The whole service with its shared state attached.
pub fn app(config: &Config, pool: DbPool, mailer: Option<Mailer>) -> Router {
    let storage = Storage::new(
        &config.storage_dir,
        config.public_url(),
        &config.placeholder_image,
    );
    let serve = get_service(ServeDir::new(&config.storage_dir)).handle_error(handle_error);

    Router::<RequestBody>::new()
        .route("/", get(welcome))
        .nest("/api", api::app())
        .nest("/files", serve)
        .layer(Extension(pool))
        .layer(Extension(Arc::new(storage)))
        .layer(Extension(Arc::new(ChatHub::new(config.chat_buffer))))
        .layer(Extension(Arc::new(config.clone())))
        .layer(Extension(mailer.map(Arc::new)))
        .layer(TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(config.max_upload_bytes))
}

async fn welcome() -> &'static str {
    "Welcome to Clubhouse Backend!"
}

async fn handle_error(e: io::Error) -> error::AppError {
    tracing::warn!(error = %e, "failed to serve stored file");
    error::AppError::from(StatusCode::INTERNAL_SERVER_ERROR, "failed to fetch file")
}
