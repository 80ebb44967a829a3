use std::sync::Arc;

use tracing::{info, warn};

use guardian_api::auth::{AppState, AppStateInner, JwtVerifier};
use guardian_api::ingest::IngestWorkflow;
use guardian_classifier::ClarifaiClient;
use guardian_db::Database;
use guardian_server::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "guardian=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;
    info!("Loaded config: {:?}", config);

    // Process-wide collaborators, built once and dropped at exit
    let db = Arc::new(Database::open(&config.db_path)?);
    let classifier = Arc::new(ClarifaiClient::new(config.classifier.clone())?);
    let verifier = Arc::new(JwtVerifier::new(
        &config.auth.secret,
        config.auth.issuer.as_deref(),
        config.auth.audience.as_deref(),
    ));

    let state: AppState = Arc::new(AppStateInner {
        workflow: IngestWorkflow::new(db.clone(), classifier, config.policy()),
        db,
        verifier,
    });

    let app = guardian_server::app(state, config.max_upload_bytes);

    let addr = config.addr()?;
    info!("Guardian listening on {}", addr);
    info!(
        "Classifier endpoint {} (threshold {})",
        config.classifier.endpoint(),
        config.confidence_threshold
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Guardian stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
