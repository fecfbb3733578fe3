use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Notify, watch};
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info, instrument, warn};

use crate::api_clients::transport::{ApiRequest, HttpTransport, ReqwestTransport};
use crate::config::ClientConfig;
use crate::constants::HEALTH_PATH;
use crate::error::AppResult;

/// Last known reachability of the API server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectivityStatus {
    /// `None` until the first check completes.
    pub is_api_reachable: Option<bool>,
    pub last_checked: Option<DateTime<Utc>>,
}

/// Periodic `HEAD /api/health` probe.
#[derive(Debug)]
pub struct ConnectivityMonitor {
    transport: Arc<dyn HttpTransport>,
    check_interval: Duration,
    status_tx: watch::Sender<ConnectivityStatus>,
}

impl ConnectivityMonitor {
    /// `transport` should carry the health-check timeout rather than the
    /// general request timeout.
    pub fn new(transport: Arc<dyn HttpTransport>, check_interval: Duration) -> Self {
        let (status_tx, _) = watch::channel(ConnectivityStatus::default());
        Self {
            transport,
            check_interval,
            status_tx,
        }
    }

    /// Probe the configured API with the health-check timeout and interval.
    pub fn from_config(config: &ClientConfig) -> AppResult<Self> {
        let transport =
            ReqwestTransport::new(config.base_url.clone(), config.health_check_timeout)?;
        Ok(Self::new(Arc::new(transport), config.health_check_interval))
    }

    pub fn status(&self) -> ConnectivityStatus {
        self.status_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectivityStatus> {
        self.status_tx.subscribe()
    }

    /// Probe the health endpoint once and publish the result.
    pub async fn check(&self) -> bool {
        let request = ApiRequest::head(HEALTH_PATH)
            .without_auth()
            .header("Cache-Control", "no-cache");
        let reachable = match self.transport.execute(&request).await {
            Ok(response) => response.is_success(),
            Err(e) => {
                warn!("API connectivity check failed: {}", e);
                false
            }
        };

        let previous = self.status_tx.borrow().is_api_reachable;
        if previous != Some(reachable) {
            info!("API reachable: {}", reachable);
        } else {
            debug!("API reachable: {}", reachable);
        }
        self.status_tx.send_replace(ConnectivityStatus {
            is_api_reachable: Some(reachable),
            last_checked: Some(Utc::now()),
        });
        reachable
    }

    /// Check immediately, then on every interval tick until stopped.
    pub fn start(self: Arc<Self>) -> ConnectivityMonitorHandle {
        let shutdown = Arc::new(Notify::new());
        let stop = Arc::clone(&shutdown);
        let task = tokio::spawn(async move { self.run(stop).await });
        ConnectivityMonitorHandle { shutdown, task }
    }

    #[instrument(skip_all)]
    async fn run(&self, shutdown: Arc<Notify>) {
        info!("Starting API connectivity monitor");
        let mut ticker = interval(self.check_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.notified() => break,
                _ = ticker.tick() => {
                    self.check().await;
                }
            }
        }
        info!("API connectivity monitor stopped");
    }
}

#[derive(Debug)]
pub struct ConnectivityMonitorHandle {
    shutdown: Arc<Notify>,
    task: JoinHandle<()>,
}

impl ConnectivityMonitorHandle {
    pub async fn shutdown(self) {
        self.shutdown.notify_one();
        if let Err(e) = self.task.await {
            warn!("Connectivity monitor task ended abnormally: {}", e);
        }
    }
}
