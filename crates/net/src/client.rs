//! HTTP adapters for the dataset store and the live-render backend.

use std::fmt;

use formats::{BackendStatus, DatasetConfig, DatasetIndex, PathFile, TileManifest};
use foundation::TileCoord;
use serde::de::DeserializeOwned;
use tracing::warn;

#[derive(Debug)]
pub enum NetError {
    Http { status: u16, url: String },
    Transport(String),
    Parse(String),
}

impl fmt::Display for NetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetError::Http { status, url } => write!(f, "http {status} fetching {url}"),
            NetError::Transport(msg) => write!(f, "transport error: {msg}"),
            NetError::Parse(msg) => write!(f, "response parse error: {msg}"),
        }
    }
}

impl std::error::Error for NetError {}

/// Read-only client for the static dataset store.
#[derive(Debug, Clone)]
pub struct Fetcher {
    http: reqwest::Client,
    base_url: String,
}

impl Fetcher {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get_json<T: DeserializeOwned>(&self, url: String) -> Result<T, NetError> {
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| NetError::Transport(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(NetError::Http {
                status: status.as_u16(),
                url,
            });
        }
        resp.json::<T>()
            .await
            .map_err(|e| NetError::Parse(e.to_string()))
    }

    pub async fn dataset_index(&self) -> Result<DatasetIndex, NetError> {
        self.get_json(format!("{}/datasets/index.json", self.base_url))
            .await
    }

    pub async fn dataset_config(&self, dataset_id: &str) -> Result<DatasetConfig, NetError> {
        self.get_json(format!("{}/datasets/{dataset_id}/config.json", self.base_url))
            .await
    }

    /// The `tiles.json` manifest. A missing manifest degrades to an empty set
    /// (every tile routes to the live lane), logged once per dataset here.
    pub async fn tile_manifest(&self, dataset_id: &str) -> Result<TileManifest, NetError> {
        let url = format!("{}/datasets/{dataset_id}/tiles.json", self.base_url);
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| NetError::Transport(e.to_string()))?;
        let status = resp.status();
        if status.as_u16() == 404 {
            warn!(%dataset_id, "tile manifest missing, requesting all tiles");
            return Ok(TileManifest::new());
        }
        if !status.is_success() {
            return Err(NetError::Http {
                status: status.as_u16(),
                url,
            });
        }
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| NetError::Transport(e.to_string()))?;
        TileManifest::from_slice(&bytes).map_err(|e| NetError::Parse(e.to_string()))
    }

    /// Optional standalone `paths.json`; `None` when the dataset has none.
    pub async fn path_file(&self, dataset_id: &str) -> Result<Option<PathFile>, NetError> {
        let url = format!("{}/datasets/{dataset_id}/paths.json", self.base_url);
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| NetError::Transport(e.to_string()))?;
        let status = resp.status();
        if status.as_u16() == 404 {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(NetError::Http {
                status: status.as_u16(),
                url,
            });
        }
        resp.json::<PathFile>()
            .await
            .map(Some)
            .map_err(|e| NetError::Parse(e.to_string()))
    }

    pub async fn static_tile(
        &self,
        dataset_id: &str,
        coord: &TileCoord,
    ) -> Result<Vec<u8>, NetError> {
        let url = format!(
            "{}/datasets/{dataset_id}/{}/{}/{}.webp",
            self.base_url, coord.level, coord.x, coord.y
        );
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| NetError::Transport(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(NetError::Http {
                status: status.as_u16(),
                url,
            });
        }
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| NetError::Transport(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

/// One fetch against the live-render backend.
#[derive(Debug, Clone, PartialEq)]
pub enum LiveFetch {
    Bytes(Vec<u8>),
    /// Backend overloaded or unreachable; retry after the holdoff.
    Busy,
    /// Hard failure; the tile renders blank.
    Failed { status: u16 },
}

/// Sort a live response status into the retry taxonomy.
pub fn classify_live_status(status: u16) -> LiveFetch {
    match status {
        200..=299 => LiveFetch::Bytes(Vec::new()),
        503 => LiveFetch::Busy,
        other => LiveFetch::Failed { status: other },
    }
}

#[derive(Debug, Clone)]
pub struct LiveClient {
    http: reqwest::Client,
    base_url: String,
}

impl LiveClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `GET /live/{dataset}/{level}/{x}/{y}.webp`. Transport errors count as
    /// busy: the backend may simply be restarting mid-render.
    pub async fn live_tile(&self, dataset_id: &str, coord: &TileCoord) -> LiveFetch {
        let url = format!(
            "{}/live/{dataset_id}/{}/{}/{}.webp",
            self.base_url, coord.level, coord.x, coord.y
        );
        let resp = match self.http.get(&url).send().await {
            Ok(resp) => resp,
            Err(e) => {
                warn!(%url, error = %e, "live fetch transport error");
                return LiveFetch::Busy;
            }
        };
        match classify_live_status(resp.status().as_u16()) {
            LiveFetch::Bytes(_) => match resp.bytes().await {
                Ok(bytes) => LiveFetch::Bytes(bytes.to_vec()),
                Err(e) => {
                    warn!(error = %e, "live fetch body error");
                    LiveFetch::Busy
                }
            },
            other => other,
        }
    }

    /// `GET /status`; `None` while the backend is unreachable.
    pub async fn status(&self) -> Option<BackendStatus> {
        let url = format!("{}/status", self.base_url);
        let resp = self.http.get(&url).send().await.ok()?;
        if !resp.status().is_success() {
            return None;
        }
        resp.json::<BackendStatus>().await.ok()
    }
}
