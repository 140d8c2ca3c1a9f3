use serde::{Deserialize, Serialize};

/// Snapshot of the live-render backend, polled while live rendering is on.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct BackendStatus {
    pub up: bool,
    #[serde(default)]
    pub active_renders: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<String>,
}
