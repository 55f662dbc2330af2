//! Background scheduled tasks.
//!
//! Currently only the reservation expiry sweep. Call `spawn_all` once during
//! startup; `BackgroundTasks::shutdown` waits for an in-flight sweep to finish.

use crate::services::ExpiryService;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

pub struct BackgroundTasks {
    shutdown_tx: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl BackgroundTasks {
    /// 通知所有任务退出并等待结束
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        for handle in self.handles {
            if let Err(e) = handle.await {
                log::error!("Background task terminated abnormally: {e}");
            }
        }
        log::info!("Background tasks stopped");
    }
}

/// Spawn all background tasks.
pub fn spawn_all(expiry_service: ExpiryService, sweep_interval: Duration) -> BackgroundTasks {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut handles = Vec::new();

    // 预留过期扫描
    {
        let svc = expiry_service;
        let mut shutdown = shutdown_rx.clone();
        handles.push(tokio::spawn(async move {
            loop {
                match svc.sweep().await {
                    Ok(report) if report.expired_orders > 0 || report.failed_orders > 0 => {
                        log::info!(
                            "Expired reservations processed: {} orders, {} units released, {} failed",
                            report.expired_orders,
                            report.released_units,
                            report.failed_orders
                        )
                    }
                    Ok(_) => {}
                    Err(e) => log::error!("Failed to sweep expired reservations: {e:?}"),
                }
                tokio::select! {
                    _ = tokio::time::sleep(sweep_interval) => {}
                    _ = shutdown.changed() => break,
                }
            }
        }));
    }

    BackgroundTasks {
        shutdown_tx,
        handles,
    }
}
