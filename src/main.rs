use dotenvy::dotenv;
use log::{error, info, warn};
use std::sync::Arc;
use tokio::sync::broadcast;

use skillup_session::services::ConnectivityMonitor;
use skillup_session::utils::read_env;
use skillup_session::{
    AppError, AppResult, ClientConfig, LoginCredentials, SessionEvent, SessionManager,
    SessionPhase,
};

#[tokio::main]
async fn main() {
    dotenv().ok();

    // RUST_LOG=debug shows every request and refresh decision
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp(Some(env_logger::fmt::TimestampPrecision::Millis))
        .format_module_path(true)
        .format_target(false)
        .init();

    if let Err(e) = run().await {
        error!("Session monitor failed: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> AppResult<()> {
    let config = ClientConfig::from_env()?;
    let manager = Arc::new(SessionManager::build(config.clone())?);
    tokio::spawn(log_session_events(manager.subscribe()));

    let restored = manager.restore().await;
    if restored.has_token() {
        info!("Validating persisted session");
    }
    let mut phase = manager.validate_on_load().await;
    info!("Session phase after startup: {:?}", phase);

    if phase == SessionPhase::Unauthenticated {
        let email = read_env("SKILLUP_EMAIL", "", true);
        let password = read_env("SKILLUP_PASSWORD", "", true);
        if !email.is_empty() && !password.is_empty() {
            let user = manager.login(&LoginCredentials { email, password }).await?;
            info!("Signed in as {} <{}>", user.name, user.email);
            phase = manager.phase();
        } else {
            info!("No session; set SKILLUP_EMAIL and SKILLUP_PASSWORD to sign in");
        }
    }

    let connectivity = Arc::new(ConnectivityMonitor::from_config(&config)?);
    let connectivity_handle = Arc::clone(&connectivity).start();
    let monitor_handle = manager.start_monitor();
    info!("Running in phase {:?}; press Ctrl-C to stop", phase);

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| AppError::InternalError(format!("Failed to listen for Ctrl-C: {}", e)))?;

    info!("Shutting down");
    monitor_handle.shutdown().await;
    connectivity_handle.shutdown().await;
    Ok(())
}

async fn log_session_events(mut events: broadcast::Receiver<SessionEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => match serde_json::to_string(&event) {
                Ok(json) => info!("Session event: {}", json),
                Err(_) => info!("Session event: {}", event.event_type()),
            },
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!("Session event log skipped {} event(s)", skipped);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
