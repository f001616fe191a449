//! Static table of rendering algorithms and the parameters each one
//! exposes to a front end.
//!
//! Front ends list [`ALGORITHMS`] (serialized to JSON without the entry
//! points) to build their controls, then call the selected entry's
//! [`render`](AlgorithmDescriptor::render) with the parameter map the
//! user filled in.

use serde::Serialize;

use crate::params::Parameters;
use crate::types::{RenderConfig, RenderError, RgbImage};

/// Signature shared by every registered algorithm.
pub type RenderFn = fn(&[u8], &Parameters) -> Result<RgbImage, RenderError>;

/// The control a front end should render for a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ParameterKind {
    /// Numeric slider over an inclusive range.
    Slider {
        /// Smallest selectable value.
        min: f64,
        /// Largest selectable value.
        max: f64,
        /// Initial value. May sit outside `min..=max` when it is a
        /// sentinel such as `0` for "automatic".
        default: f64,
    },
    /// On/off toggle.
    Checkbox {
        /// Initial state.
        default: bool,
    },
}

/// One user-facing parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ParameterSchema {
    /// Key in the parameter map.
    pub name: &'static str,
    /// Short label for the control.
    pub label: &'static str,
    /// One-sentence help text.
    pub description: &'static str,
    /// Control type and bounds.
    #[serde(flatten)]
    pub kind: ParameterKind,
}

/// A registered algorithm.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct AlgorithmDescriptor {
    /// Stable lookup key.
    pub key: &'static str,
    /// Display name.
    pub name: &'static str,
    /// One-sentence summary.
    pub description: &'static str,
    /// Credit line.
    pub author: &'static str,
    /// Algorithm version.
    pub version: &'static str,
    /// Parameters the algorithm reads from its map.
    pub parameters: &'static [ParameterSchema],
    /// Entry point.
    #[serde(skip)]
    pub render: RenderFn,
}

/// Key of the gradient-guided stroke algorithm.
pub const RONCHETTI: &str = "ronchetti";

#[allow(clippy::cast_lossless)]
const RONCHETTI_PARAMETERS: &[ParameterSchema] = &[
    ParameterSchema {
        name: "palette_size",
        label: "Color Palette Size",
        description: "Number of colors in the base palette",
        kind: ParameterKind::Slider {
            min: 5.0,
            max: 50.0,
            default: RenderConfig::DEFAULT_PALETTE_SIZE as f64,
        },
    },
    ParameterSchema {
        name: "stroke_scale",
        label: "Stroke Scale",
        description: "Scale of brush strokes (0 = automatic)",
        kind: ParameterKind::Slider {
            min: 1.0,
            max: 20.0,
            default: 0.0,
        },
    },
    ParameterSchema {
        name: "gradient_smoothing",
        label: "Gradient Smoothing",
        description: "Gradient smoothing radius (0 = automatic)",
        kind: ParameterKind::Slider {
            min: 0.0,
            max: 20.0,
            default: 0.0,
        },
    },
    ParameterSchema {
        name: "grid_scale",
        label: "Grid Density",
        description: "Spacing of the stroke grid",
        kind: ParameterKind::Slider {
            min: 1.0,
            max: 10.0,
            default: RenderConfig::DEFAULT_GRID_SCALE as f64,
        },
    },
    ParameterSchema {
        name: "color_randomness",
        label: "Color Randomness",
        description: "Lower values give more randomness in color selection",
        kind: ParameterKind::Slider {
            min: 1.0,
            max: 20.0,
            default: RenderConfig::DEFAULT_COLOR_RANDOMNESS,
        },
    },
    ParameterSchema {
        name: "use_median_blur",
        label: "Apply Median Blur",
        description: "Paint over a median-filtered copy for a softer look",
        kind: ParameterKind::Checkbox {
            default: RenderConfig::DEFAULT_USE_MEDIAN_BLUR,
        },
    },
];

/// Every available algorithm.
pub static ALGORITHMS: &[AlgorithmDescriptor] = &[AlgorithmDescriptor {
    key: RONCHETTI,
    name: "Ronchetti Original",
    description: "Gradient-guided elliptical strokes with probabilistic palette colors",
    author: "Matteo Ronchetti (adapted)",
    version: "1.0.0",
    parameters: RONCHETTI_PARAMETERS,
    render: crate::render,
}];

/// Look up an algorithm by key.
#[must_use]
pub fn find(key: &str) -> Option<&'static AlgorithmDescriptor> {
    ALGORITHMS.iter().find(|a| a.key == key)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn ronchetti_is_registered() {
        let algo = find(RONCHETTI).unwrap();
        assert_eq!(algo.name, "Ronchetti Original");
        assert_eq!(algo.parameters.len(), 6);
    }

    #[test]
    fn unknown_key_is_absent() {
        assert!(find("simple").is_none());
    }

    #[test]
    fn keys_are_unique() {
        for (i, a) in ALGORITHMS.iter().enumerate() {
            assert!(ALGORITHMS[i + 1..].iter().all(|b| b.key != a.key));
        }
    }

    #[test]
    fn schema_defaults_match_config_defaults() {
        let algo = find(RONCHETTI).unwrap();
        let slider_default = |name: &str| {
            algo.parameters
                .iter()
                .find(|p| p.name == name)
                .and_then(|p| match p.kind {
                    ParameterKind::Slider { default, .. } => Some(default),
                    ParameterKind::Checkbox { .. } => None,
                })
                .unwrap()
        };
        assert!((slider_default("palette_size") - 20.0).abs() < f64::EPSILON);
        assert!((slider_default("grid_scale") - 3.0).abs() < f64::EPSILON);
        assert!((slider_default("color_randomness") - 9.0).abs() < f64::EPSILON);
        assert!(slider_default("stroke_scale").abs() < f64::EPSILON);
    }

    #[test]
    fn serializes_without_entry_point() {
        let json = serde_json::to_value(ALGORITHMS).unwrap();
        let entry = &json[0];
        assert_eq!(entry["key"], "ronchetti");
        assert!(entry.get("render").is_none());
        let blur = &entry["parameters"][5];
        assert_eq!(blur["name"], "use_median_blur");
        assert_eq!(blur["type"], "checkbox");
        assert_eq!(blur["default"], true);
        let palette = &entry["parameters"][0];
        assert_eq!(palette["type"], "slider");
        assert_eq!(palette["min"], 5.0);
    }

    #[test]
    fn registered_entry_point_rejects_empty_input() {
        let algo = find(RONCHETTI).unwrap();
        let err = (algo.render)(&[], &Parameters::new()).unwrap_err();
        assert_eq!(err.kind(), crate::types::ErrorKind::InvalidInput);
    }
}
