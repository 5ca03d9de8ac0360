//! Background tasks for the application.
//!
//! This module centralizes the long-running jobs behind order synchronization:
//! the change feed listener, the reconciliation poll, and the notification
//! delivery worker. Call `spawn_all` once during startup to launch them.

use crate::services::{NotificationWorker, SyncService};

/// Spawn all background tasks.
///
/// Notes
/// - The feed listener and the poll loop share one `SyncService`; applying
///   the same change twice is harmless.
/// - This function detaches tasks via `tokio::spawn`; it does not block.
pub fn spawn_all(
    sync_service: SyncService,
    notification_worker: NotificationWorker,
    poll_interval_secs: u64,
) {
    // 变更总线监听，事件到达即更新内存视图
    {
        let listener = sync_service.clone();
        tokio::spawn(listener.run());
    }

    // 周期轮询，兜底总线丢失的变更
    {
        let poller = sync_service.clone();
        tokio::spawn(async move {
            loop {
                log::debug!("Start order reconciliation poll");
                match poller.poll_once().await {
                    Ok(n) if n > 0 => log::info!("Reconciliation poll emitted {n} changes"),
                    Ok(_) => {}
                    Err(e) => log::error!("Failed to poll orders: {e:?}"),
                }
                tokio::time::sleep(std::time::Duration::from_secs(poll_interval_secs)).await;
            }
        });
    }

    // 通知投递队列
    tokio::spawn(notification_worker.run());
}
