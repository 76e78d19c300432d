pub mod config;
pub mod db;
pub mod error;
pub mod normalize;
pub mod ocr;
pub mod routes;
pub mod services;
pub mod types;

use config::Settings;
use routes::AppState;
use services::notify::{Notifier, WebhookNotifier};
use services::storage::S3ImageStore;
use std::sync::Arc;
use tracing::info;

/// Builds every client from `settings` and serves the API until the process is stopped.
pub async fn run(settings: Settings) -> anyhow::Result<()> {
    let aws_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(aws_sdk_s3::config::Region::new(settings.aws_region.clone()))
        .load()
        .await;
    let images = S3ImageStore::new(
        aws_sdk_s3::Client::new(&aws_config),
        settings.s3_bucket.clone(),
        settings.aws_region.clone(),
    );

    let analyzer = ocr::AzureOcr::new(&settings)?;
    let db = db::Db::new(settings.database_path.clone())?;
    info!(path = %settings.database_path.display(), "database ready");

    let notifier: Arc<dyn Notifier> = match &settings.webhook_url {
        Some(url) => Arc::new(WebhookNotifier::new(url.clone())?),
        None => {
            info!("N8N_WEBHOOK_URL not set, notifications disabled");
            Arc::new(WebhookNotifier::disabled())
        }
    };

    let state = AppState {
        images: Arc::new(images),
        analyzer: Arc::new(analyzer),
        db: Arc::new(db),
        notifier,
    };
    let app = routes::router(state, settings.max_upload_bytes);

    let listener = tokio::net::TcpListener::bind(settings.bind_addr).await?;
    info!("Lab report API listening on http://{}", settings.bind_addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}
