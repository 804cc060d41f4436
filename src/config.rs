//! Canvas and layout parameters
//!
//! All layout engines take their tuning from an explicit [`CanvasConfig`]
//! value; nothing is read from process-wide state. Every field has a default
//! and out-of-range values are rejected by [`CanvasConfig::validate`].

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default canvas width in pixels
pub const DEFAULT_WIDTH: f64 = 960.0;

/// Default canvas height in pixels
pub const DEFAULT_HEIGHT: f64 = 600.0;

/// Default horizontal thickness of a flow node
pub const DEFAULT_NODE_THICKNESS: f64 = 15.0;

/// Default vertical gap between nodes of a flow column
pub const DEFAULT_NODE_PADDING: f64 = 10.0;

/// Default number of flow relaxation passes
pub const DEFAULT_FLOW_ITERATIONS: usize = 32;

/// Default spring rest length
pub const DEFAULT_LINK_DISTANCE: f64 = 60.0;

/// Default many-body strength (negative = repulsion)
pub const DEFAULT_CHARGE_STRENGTH: f64 = -300.0;

/// Minimum drawn thickness of a flow link
pub const DEFAULT_MIN_STROKE: f64 = 0.5;

/// Default horizontal curvature of flow links (0 = straight, 1 = square)
pub const DEFAULT_LINK_CURVATURE: f64 = 0.5;

/// Default fraction of velocity kept per tick
pub const DEFAULT_VELOCITY_DECAY: f64 = 0.6;

/// Default number of ticks for alpha to cool down (D3 uses 300)
pub const DEFAULT_TICK_BUDGET: usize = 300;

/// Default simulation ticks per second
pub const DEFAULT_TICK_RATE: f64 = 60.0;

/// Slowest accepted tick rate (one tick every 100 s)
pub const MIN_TICK_RATE: f64 = 0.01;

/// Fastest accepted tick rate (one tick per millisecond)
pub const MAX_TICK_RATE: f64 = 1000.0;

/// Errors raised while loading or validating configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A parameter is outside its admissible range
    #[error("{field} must be {expected}, got {value}")]
    OutOfRange {
        field: &'static str,
        value: f64,
        expected: &'static str,
    },

    #[error("could not read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not parse config: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// Canvas size plus flow and force tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct CanvasConfig {
    pub width: f64,
    pub height: f64,

    /// Flow node width (the horizontal extent of every flow node)
    pub node_thickness: f64,

    /// Vertical gap between stacked flow nodes
    pub node_padding: f64,

    /// Relaxation passes of the flow layout
    pub flow_iterations: usize,

    /// Spring rest length of the force layout
    pub link_distance: f64,

    /// Pairwise charge of the force layout (negative = repulsion)
    pub charge_strength: f64,

    /// Thinnest drawn flow link, so zero-weight flows stay selectable
    pub min_stroke: f64,

    pub link_curvature: f64,

    /// Fraction of velocity kept each tick (D3's `1 - velocityDecay`)
    pub velocity_decay: f64,

    /// Keep the force layout's centroid at the canvas centre
    pub center_force: bool,

    /// Ticks for the force layout to cool from alpha 1 to its minimum
    pub tick_budget: usize,

    /// Ticks per second when the simulation is driven live
    pub tick_rate: f64,

    /// Clamp dragged force nodes to the canvas
    pub clamp_force_drag: bool,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            node_thickness: DEFAULT_NODE_THICKNESS,
            node_padding: DEFAULT_NODE_PADDING,
            flow_iterations: DEFAULT_FLOW_ITERATIONS,
            link_distance: DEFAULT_LINK_DISTANCE,
            charge_strength: DEFAULT_CHARGE_STRENGTH,
            min_stroke: DEFAULT_MIN_STROKE,
            link_curvature: DEFAULT_LINK_CURVATURE,
            velocity_decay: DEFAULT_VELOCITY_DECAY,
            center_force: true,
            tick_budget: DEFAULT_TICK_BUDGET,
            tick_rate: DEFAULT_TICK_RATE,
            clamp_force_drag: false,
        }
    }
}

impl CanvasConfig {
    /// Default configuration for a canvas of the given size
    pub fn with_size(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            ..Default::default()
        }
    }

    /// Load from a YAML (or JSON) file and validate
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml(&text)
    }

    /// Parse from YAML (JSON is accepted too) and validate
    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        let config: CanvasConfig = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Fail fast on parameters no layout can work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("width", self.width)?;
        positive("height", self.height)?;
        positive("nodeThickness", self.node_thickness)?;
        non_negative("nodePadding", self.node_padding)?;
        positive("linkDistance", self.link_distance)?;
        finite("chargeStrength", self.charge_strength)?;
        non_negative("minStroke", self.min_stroke)?;
        finite("tickRate", self.tick_rate)?;
        if !(MIN_TICK_RATE..=MAX_TICK_RATE).contains(&self.tick_rate) {
            return Err(ConfigError::OutOfRange {
                field: "tickRate",
                value: self.tick_rate,
                expected: "within [0.01, 1000]",
            });
        }

        if !(0.0..=1.0).contains(&self.link_curvature) {
            return Err(ConfigError::OutOfRange {
                field: "linkCurvature",
                value: self.link_curvature,
                expected: "within [0, 1]",
            });
        }
        if !(self.velocity_decay > 0.0 && self.velocity_decay <= 1.0) {
            return Err(ConfigError::OutOfRange {
                field: "velocityDecay",
                value: self.velocity_decay,
                expected: "within (0, 1]",
            });
        }
        if self.tick_budget == 0 {
            return Err(ConfigError::OutOfRange {
                field: "tickBudget",
                value: 0.0,
                expected: "at least 1",
            });
        }
        Ok(())
    }
}

fn finite(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            value,
            expected: "finite",
        })
    }
}

fn positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    finite(field, value)?;
    if value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            value,
            expected: "greater than 0",
        })
    }
}

fn non_negative(field: &'static str, value: f64) -> Result<(), ConfigError> {
    finite(field, value)?;
    if value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            value,
            expected: "at least 0",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = CanvasConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.flow_iterations, 32);
        assert_eq!(config.link_distance, 60.0);
        assert_eq!(config.charge_strength, -300.0);
    }

    #[test]
    fn negative_size_fails_fast() {
        let config = CanvasConfig::with_size(-10.0, 400.0);
        let err = config.validate().unwrap_err();
        assert_eq!(err.to_string(), "width must be greater than 0, got -10");
    }

    #[test]
    fn negative_padding_fails_fast() {
        let config = CanvasConfig {
            node_padding: -1.0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::OutOfRange {
                field: "nodePadding",
                ..
            })
        ));
    }

    #[test]
    fn curvature_outside_unit_range_fails() {
        let config = CanvasConfig {
            link_curvature: 1.5,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn non_finite_charge_fails() {
        let config = CanvasConfig {
            charge_strength: f64::NEG_INFINITY,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn tick_rate_is_bounded() {
        for rate in [0.0, 1e-300, 1e-3, 1e4, f64::INFINITY] {
            let config = CanvasConfig {
                tick_rate: rate,
                ..Default::default()
            };
            assert!(
                matches!(
                    config.validate(),
                    Err(ConfigError::OutOfRange {
                        field: "tickRate",
                        ..
                    })
                ),
                "tickRate {rate} was accepted"
            );
        }

        let err = CanvasConfig::from_yaml("tickRate: 10000\n").unwrap_err();
        assert_eq!(
            err.to_string(),
            "tickRate must be within [0.01, 1000], got 10000"
        );
        assert!(CanvasConfig::from_yaml("tickRate: 1000\n").is_ok());
        assert!(CanvasConfig::from_yaml("tickRate: 0.01\n").is_ok());
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let config = CanvasConfig::from_yaml("width: 800\nnodePadding: 4\nchargeStrength: -120\n")
            .unwrap();

        assert_eq!(config.width, 800.0);
        assert_eq!(config.node_padding, 4.0);
        assert_eq!(config.charge_strength, -120.0);
        assert_eq!(config.height, DEFAULT_HEIGHT);
        assert_eq!(config.tick_budget, DEFAULT_TICK_BUDGET);
    }

    #[test]
    fn json_is_accepted() {
        let config = CanvasConfig::from_yaml(r#"{"height": 500, "linkDistance": 80}"#).unwrap();
        assert_eq!(config.height, 500.0);
        assert_eq!(config.link_distance, 80.0);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = CanvasConfig::from_yaml("colour: red\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn invalid_values_in_file_are_rejected() {
        let err = CanvasConfig::from_yaml("height: 0\n").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::OutOfRange {
                field: "height",
                ..
            }
        ));
    }
}
