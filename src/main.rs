use axum::http::Method;
use clubhouse::{auth::ensure_jwt_secret_is_valid, config::Config, connect_to_db, email::Mailer, telemetry};
use envconfig::Envconfig;
use std::net::SocketAddr;
use tower_http::cors::{Any, CorsLayer};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let config = Config::init_from_env()?;
    telemetry::init(&config.log_format);
    ensure_jwt_secret_is_valid();

    let mailer = Mailer::from_config(&config)?;
    match &mailer {
        Some(mailer) => {
            if let Err(e) = mailer.sanity_check().await {
                tracing::warn!(error = %e, "email sanity check failed. forgot password will not work");
            }
        }
        None => tracing::warn!("no email account configured. forgot password is disabled"),
    }

    tokio::fs::create_dir_all(&config.storage_dir).await?;

    let pool = connect_to_db(&config.db_url)?;
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any)
        .allow_origin(Any);
    let app = clubhouse::app(&config, pool, mailer).layer(cors);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!(%addr, "listening");
    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await?;

    Ok(())
}
