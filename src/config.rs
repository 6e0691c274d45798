use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Lateral gap between parallel connections sharing an endpoint pair.
    pub splay_padding: f32,
    /// Largest absolute splay offset; further siblings clamp here.
    pub max_splay: f32,
    /// Length of the straight run leaving/entering a port.
    pub stub_length: f32,
    /// Obstacle bounds are inflated by this margin before bend testing.
    pub obstacle_margin: f32,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            splay_padding: 6.0,
            max_splay: 30.0,
            stub_length: 12.0,
            obstacle_margin: 4.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Commits with an equal coalescing key within this window merge into
    /// one undo step.
    pub coalesce_window_ms: u64,
    /// Maximum retained entries, oldest evicted first. Zero disables the cap.
    pub max_depth: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            coalesce_window_ms: 750,
            max_depth: 200,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Grid cell edge length for the spatial index buckets.
    pub cell_size: f32,
    /// Incremental updates tolerated before a full repack of the grid.
    pub rebuild_threshold: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            cell_size: 64.0,
            rebuild_threshold: 256,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    pub router: RouterConfig,
    pub history: HistoryConfig,
    pub index: IndexConfig,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct RouterConfigFile {
    splay_padding: Option<f32>,
    max_splay: Option<f32>,
    stub_length: Option<f32>,
    obstacle_margin: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct HistoryConfigFile {
    coalesce_window_ms: Option<u64>,
    max_depth: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct IndexConfigFile {
    cell_size: Option<f32>,
    rebuild_threshold: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    router: Option<RouterConfigFile>,
    history: Option<HistoryConfigFile>,
    index: Option<IndexConfigFile>,
}

fn apply_config_file(config: &mut EngineConfig, parsed: ConfigFile) {
    if let Some(router) = parsed.router {
        if let Some(value) = router.splay_padding {
            config.router.splay_padding = value;
        }
        if let Some(value) = router.max_splay {
            config.router.max_splay = value;
        }
        if let Some(value) = router.stub_length {
            config.router.stub_length = value;
        }
        if let Some(value) = router.obstacle_margin {
            config.router.obstacle_margin = value;
        }
    }
    if let Some(history) = parsed.history {
        if let Some(value) = history.coalesce_window_ms {
            config.history.coalesce_window_ms = value;
        }
        if let Some(value) = history.max_depth {
            config.history.max_depth = value;
        }
    }
    if let Some(index) = parsed.index {
        if let Some(value) = index.cell_size {
            config.index.cell_size = value;
        }
        if let Some(value) = index.rebuild_threshold {
            config.index.rebuild_threshold = value;
        }
    }
}

/// Loads an engine configuration, overlaying an optional JSON file onto the
/// built-in defaults. A `None` path yields the defaults unchanged.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<EngineConfig> {
    let mut config = EngineConfig::default();
    let Some(path) = path else {
        return Ok(config);
    };

    let contents = std::fs::read_to_string(path)?;
    let parsed: ConfigFile = serde_json::from_str(&contents)?;
    apply_config_file(&mut config, parsed);
    Ok(config)
}
