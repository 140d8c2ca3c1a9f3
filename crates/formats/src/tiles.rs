use std::collections::BTreeSet;
use std::fmt;

/// The set of tile keys known to exist in a dataset's static store.
///
/// Keys are `"level/x/y"` with unbounded decimal index digits. The set grows
/// monotonically at runtime as live renders complete.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TileManifest {
    keys: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestError {
    Parse(String),
}

impl fmt::Display for ManifestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ManifestError::Parse(msg) => write!(f, "tile manifest parse error: {msg}"),
        }
    }
}

impl std::error::Error for ManifestError {}

impl TileManifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a `tiles.json` payload: a flat JSON array of `"L/X/Y"` strings.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, ManifestError> {
        let keys: Vec<String> =
            serde_json::from_slice(bytes).map_err(|e| ManifestError::Parse(e.to_string()))?;
        Ok(Self::from_keys(keys))
    }

    pub fn from_keys(keys: impl IntoIterator<Item = String>) -> Self {
        Self {
            keys: keys.into_iter().collect(),
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    /// Admit a freshly rendered tile so later visits route to the static lane.
    pub fn insert(&mut self, key: String) -> bool {
        self.keys.insert(key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
