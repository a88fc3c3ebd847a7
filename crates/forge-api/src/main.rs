//! Forge API Service
//!
//! Serves the customization form and turns submissions into branded
//! URL shortener packages or Azure deployments.

use anyhow::{Context, Result};
use cloud_deploy::{AzCliDeployer, AzureClient, FallbackDeployer, NoFallback, Orchestrator};
use forge_api::{create_router, AppState, Config, Pipeline, ProcessState};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "forge_api=debug,site_customizer=debug,cloud_deploy=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Forge API Service");

    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    config.check_template();
    info!("Template directory: {}", config.template_dir.display());
    info!(
        "Azure deployment: {} (region {}, {} upload attempts)",
        if config.azure.enabled { "enabled" } else { "disabled" },
        config.deploy.region,
        config.deploy.retry.max_attempts
    );

    let fallback: Arc<dyn FallbackDeployer> = if config.cli_fallback {
        Arc::new(AzCliDeployer::default())
    } else {
        Arc::new(NoFallback)
    };
    let orchestrator = Orchestrator::new(
        Arc::new(AzureClient::new(config.azure.clone())),
        fallback,
        config.deploy.clone(),
    );

    let pipeline = Pipeline::new(
        config.template_dir.clone(),
        config.font_dirs.clone(),
        Arc::new(orchestrator),
    );
    let process = ProcessState::new(config.template_dir.clone(), config.font_dirs.clone());
    let app = create_router(AppState::new(pipeline, process, config.max_upload_bytes));

    // Start server
    let listener = TcpListener::bind(&config.api_address())
        .await
        .with_context(|| format!("Failed to bind to {}", config.api_address()))?;

    info!("Forge API listening on {}", config.api_address());
    info!("Health check: http://{}/health", config.api_address());

    axum::serve(listener, app)
        .await
        .context("Server error")?;

    Ok(())
}
