use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{info, warn};

use shared_config::AppConfig;

use crate::services::notification::NotificationService;

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);
const SWEEP_BATCH: u64 = 50;

/// Handle for waking the delivery loop after queueing a notification.
#[derive(Clone)]
pub struct DispatchHandle {
    sender: mpsc::UnboundedSender<String>,
}

impl DispatchHandle {
    pub fn nudge(&self, notification_id: &str) {
        if self.sender.send(notification_id.to_string()).is_err() {
            warn!("Notification dispatcher is not running, {} stays queued", notification_id);
        }
    }
}

/// Start the background delivery loop.
///
/// The loop drains nudges as they arrive and sweeps the outbox for
/// never-attempted rows on an interval, which also picks up rows queued
/// before a restart.
pub fn spawn_dispatcher(config: Arc<AppConfig>) -> DispatchHandle {
    let (sender, mut receiver) = mpsc::unbounded_channel::<String>();

    tokio::spawn(async move {
        let service = NotificationService::new(&config);
        let mut sweep = tokio::time::interval(SWEEP_INTERVAL);
        info!("Notification dispatcher started");

        loop {
            tokio::select! {
                nudge = receiver.recv() => {
                    match nudge {
                        Some(notification_id) => {
                            if let Err(err) = service.deliver(&notification_id).await {
                                warn!("Delivery of {} failed: {}", notification_id, err);
                            }
                        }
                        None => {
                            info!("Notification dispatcher channel closed, stopping");
                            break;
                        }
                    }
                }
                _ = sweep.tick() => {
                    match service.pending_unattempted(SWEEP_BATCH).await {
                        Ok(pending) => {
                            for notification_id in pending {
                                if let Err(err) = service.deliver(&notification_id).await {
                                    warn!("Delivery of {} failed: {}", notification_id, err);
                                }
                            }
                        }
                        Err(err) => warn!("Outbox sweep failed: {}", err),
                    }
                }
            }
        }
    });

    DispatchHandle { sender }
}
