//! Background fetch pool.
//!
//! Dispatch commands from the scheduler become spawned fetch tasks; results
//! come back over an unbounded channel the main loop drains between frames.
//! In-flight work is never cancelled — the orchestrator drops stale results
//! at ingestion instead.

use foundation::TileCoord;
use streaming::{Dispatch, Lane};
use tokio::sync::mpsc;
use tracing::warn;

use crate::client::{Fetcher, LiveClient, LiveFetch};

/// Raw fetch result; decoding happens at the host boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchPayload {
    Bytes(Vec<u8>),
    Busy,
    Failed { status: Option<u16> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct FetchComplete {
    pub coord: TileCoord,
    pub lane: Lane,
    pub payload: FetchPayload,
}

#[derive(Debug, Clone)]
pub struct FetchPool {
    fetcher: Fetcher,
    live: LiveClient,
    dataset_id: String,
    tx: mpsc::UnboundedSender<FetchComplete>,
}

impl FetchPool {
    pub fn new(
        fetcher: Fetcher,
        live: LiveClient,
        dataset_id: impl Into<String>,
    ) -> (Self, mpsc::UnboundedReceiver<FetchComplete>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                fetcher,
                live,
                dataset_id: dataset_id.into(),
                tx,
            },
            rx,
        )
    }

    /// Execute one dispatch on a background task.
    pub fn execute(&self, dispatch: Dispatch) {
        let pool = self.clone();
        tokio::spawn(async move {
            let payload = match dispatch.lane {
                Lane::Static => match pool
                    .fetcher
                    .static_tile(&pool.dataset_id, &dispatch.coord)
                    .await
                {
                    Ok(bytes) => FetchPayload::Bytes(bytes),
                    Err(e) => {
                        warn!(key = %dispatch.coord, error = %e, "static tile fetch failed");
                        FetchPayload::Failed { status: None }
                    }
                },
                Lane::Live => {
                    match pool.live.live_tile(&pool.dataset_id, &dispatch.coord).await {
                        LiveFetch::Bytes(bytes) => FetchPayload::Bytes(bytes),
                        LiveFetch::Busy => FetchPayload::Busy,
                        LiveFetch::Failed { status } => FetchPayload::Failed {
                            status: Some(status),
                        },
                    }
                }
            };
            // A closed channel means the session is over; the result is moot.
            let _ = pool.tx.send(FetchComplete {
                coord: dispatch.coord,
                lane: dispatch.lane,
                payload,
            });
        });
    }
}
