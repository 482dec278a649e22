use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::orientation::Orientation;

/// Spacing and convergence parameters for the layout solvers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutConfig {
    /// Minimum border-to-border gap between sibling rectangles.
    pub min_spacing: f32,
    /// Radial separation between consecutive rings.
    pub ring_spacing: f32,
    /// Radius of the first ring before any capacity growth.
    pub base_radius: f32,
    /// Horizontal gap between a parent and its children in the linear modes.
    pub level_indent: f32,
    /// Vertical gap between stacked sibling blocks in the linear modes.
    pub sibling_gap: f32,
    /// Damping applied to each relaxation step.
    pub relaxation_factor: f32,
    /// Largest per-iteration adjustment, in pixels, at which relaxation
    /// counts as converged.
    pub convergence_threshold: f32,
    /// Relaxation iteration cap per ring.
    pub max_iterations: usize,
    /// Effective-size scale used by the crowded-ring fallback.
    pub shrink_factor: f32,
    /// A sibling's angular budget is floored at `range / (count * divisor)`.
    pub sector_floor_divisor: f32,
    /// Gap between cells of the multi-node drop grid.
    pub grid_gap: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            min_spacing: 20.0,
            ring_spacing: 140.0,
            base_radius: 100.0,
            level_indent: 54.0,
            sibling_gap: 46.0,
            relaxation_factor: 0.3,
            convergence_threshold: 0.5,
            max_iterations: 32,
            shrink_factor: 0.9,
            sector_floor_divisor: 4.0,
            grid_gap: 24.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub orientation: Orientation,
    pub layout: LayoutConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            orientation: Orientation::Clockwise,
            layout: LayoutConfig::default(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    orientation: Option<Orientation>,
    layout: Option<LayoutConfigFile>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LayoutConfigFile {
    min_spacing: Option<f32>,
    ring_spacing: Option<f32>,
    base_radius: Option<f32>,
    level_indent: Option<f32>,
    sibling_gap: Option<f32>,
    relaxation_factor: Option<f32>,
    convergence_threshold: Option<f32>,
    max_iterations: Option<usize>,
    shrink_factor: Option<f32>,
    sector_floor_divisor: Option<f32>,
    grid_gap: Option<f32>,
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let mut config = Config::default();
    let Some(path) = path else {
        return Ok(config);
    };

    let contents = std::fs::read_to_string(path)?;
    let parsed: ConfigFile = serde_json::from_str(&contents)?;

    if let Some(orientation) = parsed.orientation {
        config.orientation = orientation;
    }
    if let Some(layout) = parsed.layout {
        if let Some(v) = layout.min_spacing {
            config.layout.min_spacing = v;
        }
        if let Some(v) = layout.ring_spacing {
            config.layout.ring_spacing = v;
        }
        if let Some(v) = layout.base_radius {
            config.layout.base_radius = v;
        }
        if let Some(v) = layout.level_indent {
            config.layout.level_indent = v;
        }
        if let Some(v) = layout.sibling_gap {
            config.layout.sibling_gap = v;
        }
        if let Some(v) = layout.relaxation_factor {
            config.layout.relaxation_factor = v;
        }
        if let Some(v) = layout.convergence_threshold {
            config.layout.convergence_threshold = v;
        }
        if let Some(v) = layout.max_iterations {
            config.layout.max_iterations = v;
        }
        if let Some(v) = layout.shrink_factor {
            config.layout.shrink_factor = v;
        }
        if let Some(v) = layout.sector_floor_divisor {
            config.layout.sector_floor_divisor = v;
        }
        if let Some(v) = layout.grid_gap {
            config.layout.grid_gap = v;
        }
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_path_yields_defaults() {
        let config = load_config(None).unwrap();
        assert_eq!(config.layout.min_spacing, 20.0);
        assert_eq!(config.orientation, Orientation::Clockwise);
    }

    #[test]
    fn partial_file_overrides_merge_over_defaults() {
        let parsed: ConfigFile =
            serde_json::from_str(r#"{"orientation":"left-to-right","layout":{"minSpacing":8}}"#)
                .unwrap();
        assert_eq!(parsed.orientation, Some(Orientation::LeftToRight));
        assert_eq!(parsed.layout.unwrap().min_spacing, Some(8.0));
    }
}
