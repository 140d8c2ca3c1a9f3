//! Backend status polling.

use std::time::Duration;

use formats::BackendStatus;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::client::LiveClient;

/// Poll cadence while live rendering is enabled.
pub const STATUS_POLL_INTERVAL_MS: u64 = 300;

/// Spawn the status poller. The receiver always holds the latest snapshot,
/// `None` while the backend is unreachable. The task exits when every
/// receiver is dropped.
pub fn spawn_status_poller(
    client: LiveClient,
) -> (watch::Receiver<Option<BackendStatus>>, JoinHandle<()>) {
    let (tx, rx) = watch::channel(None);
    let handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_millis(STATUS_POLL_INTERVAL_MS));
        loop {
            ticker.tick().await;
            let status = client.status().await;
            if tx.send(status).is_err() {
                debug!("status poller shutting down");
                break;
            }
        }
    });
    (rx, handle)
}
