use blog_service::config::BlogConfig;
use blog_service::services::metrics::init_metrics;
use blog_service::startup::Application;
use service_core::error::AppError;
use service_core::observability::init_tracing;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // Load configuration - fail fast if invalid
    let config = BlogConfig::load()?;

    let _tracing = init_tracing(
        "blog-service",
        &config.common.log_level,
        config.common.otlp_endpoint.as_deref(),
    )
    .map_err(AppError::ConfigError)?;

    init_metrics()?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        allowed_origin = %config.cors.allowed_origin,
        rate_limit = config.rate_limit.requests,
        rate_limit_window_seconds = config.rate_limit.window_seconds,
        "Starting blog service"
    );

    let app = Application::build(config).await?;
    app.run_until_stopped().await?;

    tracing::info!("Blog service stopped");
    Ok(())
}
