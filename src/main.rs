use std::process::ExitCode;
use std::sync::Arc;

use chatbot_hub::app::{Stores, build_router};
use chatbot_hub::core::auth::{JwtService, PasswordHasher};
use chatbot_hub::core::completion::OpenAiClient;
use chatbot_hub::core::config::Config;
use chatbot_hub::core::db::{DbConfig, create_pool_with_migrations};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file (if exists)
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Invalid configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    // Log config status (without revealing secrets)
    tracing::info!(
        "Config loaded: database={}, cors_origin={}, completion_base={}",
        config.has_database(),
        config.cors_allowed_origin.is_some(),
        config.completion.api_base
    );

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("Server error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(config: Config) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let stores = match &config.database_url {
        Some(url) => {
            let pool = create_pool_with_migrations(&DbConfig::new(url.clone())).await?;
            Stores::postgres(pool)
        }
        None => {
            tracing::warn!("DATABASE_URL not set; data is kept in memory only");
            Stores::memory()
        }
    };

    let jwt_service = JwtService::new(config.jwt.clone())?;
    let completion = OpenAiClient::new(config.completion.clone())?;

    let app = build_router(
        stores,
        jwt_service,
        PasswordHasher::new(),
        Arc::new(completion),
        config.cors_allowed_origin.as_deref(),
    );

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!("listening on http://{}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}
