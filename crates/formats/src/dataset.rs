use serde::{Deserialize, Serialize};

use crate::path::PathSpec;

/// Logical tile size assumed when a dataset config omits one.
pub const DEFAULT_TILE_SIZE: u32 = 512;

/// Tile image extension served by both the static store and the live backend.
pub const TILE_EXTENSION: &str = "webp";

/// `index.json`: the list of datasets a deployment serves.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DatasetIndex {
    pub datasets: Vec<DatasetEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DatasetEntry {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Per-dataset `config.json`.
///
/// The backend stores renderer plumbing (`renderer`, `renderer_args`) in the
/// same file; the client tolerates and ignores those fields.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DatasetConfig {
    pub id: String,
    pub name: String,
    #[serde(default = "default_tile_size")]
    pub tile_size: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub render_config: Option<RenderConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct RenderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_level: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathSpec>,
}

fn default_tile_size() -> u32 {
    DEFAULT_TILE_SIZE
}

#[cfg(test)]
mod tests {
    use super::{DEFAULT_TILE_SIZE, DatasetConfig, DatasetIndex};

    #[test]
    fn index_round_trips() {
        let raw = r#"{"datasets":[{"id":"mb","name":"Mandelbrot","description":"classic"},{"id":"grid","name":"Grid"}]}"#;
        let idx: DatasetIndex = serde_json::from_str(raw).unwrap();
        assert_eq!(idx.datasets.len(), 2);
        assert_eq!(idx.datasets[0].id, "mb");
        assert!(idx.datasets[1].description.is_none());
    }

    #[test]
    fn config_tolerates_backend_fields() {
        let raw = r#"{
            "id": "mb",
            "name": "Mandelbrot",
            "tile_size": 512,
            "renderer": "renderers/mandelbrot_renderer.py",
            "renderer_args": {"max_iter": 5000},
            "render_config": {"max_level": 120.0}
        }"#;
        let cfg: DatasetConfig = serde_json::from_str(raw).unwrap();
        assert_eq!(cfg.tile_size, 512);
        assert_eq!(cfg.render_config.unwrap().max_level, Some(120.0));
    }

    #[test]
    fn tile_size_defaults() {
        let cfg: DatasetConfig = serde_json::from_str(r#"{"id":"a","name":"A"}"#).unwrap();
        assert_eq!(cfg.tile_size, DEFAULT_TILE_SIZE);
    }
}
