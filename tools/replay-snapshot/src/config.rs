use anyhow::{Context, Result};
use gtfs_replay_transit::SimulationConfig;
use serde::Deserialize;
use std::path::Path;

/// Contents of the optional `--config` YAML file.
///
/// ```yaml
/// simulation:
///   bucket_size_secs: 600
///   default_route_color: "#ff6600"
/// output:
///   shapes: true
///   pick_radius_m: 50
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SnapshotConfig {
    pub simulation: SimulationConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Include processed shapes as LineStrings
    pub shapes: bool,
    /// Include stops as Points
    pub stops: bool,
    /// Include every precomputed trip path as a LineString
    pub paths: bool,
    /// Search radius for `--pick`, in meters
    pub pick_radius_m: f64,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            shapes: false,
            stops: false,
            paths: false,
            pick_radius_m: 100.0,
        }
    }
}

impl SnapshotConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    fn parse(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }
}
