//! Loose parameter maps: turn a JSON object of user-facing parameters
//! into a [`RenderConfig`].
//!
//! Values may arrive as JSON numbers and booleans, or as strings when
//! they come from a form-encoded transport (`"12"`, `"0.5"`, `"on"`).
//! Unrecognized keys are ignored and missing or `null` keys keep their
//! defaults. A `0` for `stroke_scale` or `gradient_smoothing` selects
//! the automatic, size-derived value.

use serde_json::Value;

use crate::types::{PipelineError, RenderConfig};

/// A user-facing parameter map, keyed by parameter name.
pub type Parameters = serde_json::Map<String, Value>;

/// Build a config from `params`, starting from the defaults.
///
/// Range checks beyond "is this a number of the right shape" are left
/// to [`RenderConfig::validate`].
///
/// # Errors
///
/// Returns [`PipelineError::InvalidParameter`] naming the first key
/// whose value cannot be read as the expected type.
pub fn config_from_parameters(params: &Parameters) -> Result<RenderConfig, PipelineError> {
    let mut config = RenderConfig::default();

    if let Some(v) = lookup(params, "palette_size") {
        config.palette_size = to_u32("palette_size", v)?;
    }
    if let Some(v) = lookup(params, "stroke_scale") {
        config.stroke_scale = Some(to_u32("stroke_scale", v)?).filter(|&s| s != 0);
    }
    if let Some(v) = lookup(params, "gradient_smoothing") {
        config.gradient_smoothing = Some(to_u32("gradient_smoothing", v)?).filter(|&s| s != 0);
    }
    if let Some(v) = lookup(params, "grid_scale") {
        config.grid_scale = to_u32("grid_scale", v)?;
    }
    if let Some(v) = lookup(params, "color_randomness") {
        config.color_randomness = to_f64("color_randomness", v)?;
    }
    if let Some(v) = lookup(params, "use_median_blur") {
        config.use_median_blur = to_bool("use_median_blur", v)?;
    }
    if let Some(v) = lookup(params, "seed") {
        config.seed = to_u64("seed", v)?;
    }

    Ok(config)
}

fn lookup<'a>(params: &'a Parameters, name: &str) -> Option<&'a Value> {
    params.get(name).filter(|v| !v.is_null())
}

fn to_u64(name: &str, value: &Value) -> Result<u64, PipelineError> {
    let invalid = || {
        PipelineError::invalid(name, format!("expected a non-negative integer, got {value}"))
    };
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().and_then(integral))
            .ok_or_else(invalid),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<u64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(integral))
                .ok_or_else(invalid)
        }
        _ => Err(invalid()),
    }
}

fn to_u32(name: &str, value: &Value) -> Result<u32, PipelineError> {
    let wide = to_u64(name, value)?;
    u32::try_from(wide).map_err(|_| PipelineError::invalid(name, format!("{wide} is too large")))
}

fn to_f64(name: &str, value: &Value) -> Result<f64, PipelineError> {
    let invalid = || PipelineError::invalid(name, format!("expected a number, got {value}"));
    match value {
        Value::Number(n) => n.as_f64().ok_or_else(invalid),
        Value::String(s) => s.trim().parse::<f64>().map_err(|_| invalid()),
        _ => Err(invalid()),
    }
}

fn to_bool(name: &str, value: &Value) -> Result<bool, PipelineError> {
    let invalid = || PipelineError::invalid(name, format!("expected a boolean, got {value}"));
    match value {
        Value::Bool(b) => Ok(*b),
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).ok_or_else(invalid),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "on" | "yes" | "1" => Ok(true),
            "false" | "off" | "no" | "0" | "" => Ok(false),
            _ => Err(invalid()),
        },
        _ => Err(invalid()),
    }
}

/// A finite, non-negative float with no fractional part, as `u64`.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]
fn integral(f: f64) -> Option<u64> {
    (f.is_finite() && f >= 0.0 && f.fract() == 0.0 && f <= u64::MAX as f64).then_some(f as u64)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    fn params(value: Value) -> Parameters {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn empty_map_gives_defaults() {
        let config = config_from_parameters(&Parameters::new()).unwrap();
        assert_eq!(config, RenderConfig::default());
    }

    #[test]
    fn numbers_and_bools_are_read() {
        let config = config_from_parameters(&params(json!({
            "palette_size": 12,
            "stroke_scale": 3,
            "gradient_smoothing": 4,
            "grid_scale": 5,
            "color_randomness": 2.5,
            "use_median_blur": false,
            "seed": 42,
        })))
        .unwrap();
        assert_eq!(config.palette_size, 12);
        assert_eq!(config.stroke_scale, Some(3));
        assert_eq!(config.gradient_smoothing, Some(4));
        assert_eq!(config.grid_scale, 5);
        assert!((config.color_randomness - 2.5).abs() < f64::EPSILON);
        assert!(!config.use_median_blur);
        assert_eq!(config.seed, 42);
    }

    #[test]
    fn form_strings_are_read() {
        let config = config_from_parameters(&params(json!({
            "palette_size": "12",
            "color_randomness": "0.5",
            "grid_scale": " 4 ",
            "use_median_blur": "on",
        })))
        .unwrap();
        assert_eq!(config.palette_size, 12);
        assert!((config.color_randomness - 0.5).abs() < f64::EPSILON);
        assert_eq!(config.grid_scale, 4);
        assert!(config.use_median_blur);
    }

    #[test]
    fn integral_floats_are_accepted_as_integers() {
        let config =
            config_from_parameters(&params(json!({ "palette_size": 8.0, "grid_scale": "2.0" })))
                .unwrap();
        assert_eq!(config.palette_size, 8);
        assert_eq!(config.grid_scale, 2);
    }

    #[test]
    fn zero_selects_automatic_values() {
        let config = config_from_parameters(&params(json!({
            "stroke_scale": 0,
            "gradient_smoothing": "0",
        })))
        .unwrap();
        assert_eq!(config.stroke_scale, None);
        assert_eq!(config.gradient_smoothing, None);
    }

    #[test]
    fn bool_spellings() {
        for (raw, expected) in [
            (json!(true), true),
            (json!("true"), true),
            (json!("1"), true),
            (json!(1), true),
            (json!("off"), false),
            (json!("False"), false),
            (json!(0), false),
        ] {
            let config =
                config_from_parameters(&params(json!({ "use_median_blur": raw.clone() }))).unwrap();
            assert_eq!(config.use_median_blur, expected, "{raw}");
        }
    }

    #[test]
    fn unknown_and_null_keys_are_ignored() {
        let config = config_from_parameters(&params(json!({
            "dot_size": 5,
            "algorithm": "ronchetti",
            "palette_size": null,
        })))
        .unwrap();
        assert_eq!(config, RenderConfig::default());
    }

    #[test]
    fn malformed_values_name_the_key() {
        for (key, raw) in [
            ("palette_size", json!("many")),
            ("palette_size", json!(-3)),
            ("grid_scale", json!(2.5)),
            ("color_randomness", json!("fast")),
            ("use_median_blur", json!("maybe")),
            ("seed", json!([1])),
            ("stroke_scale", json!(5_000_000_000_u64)),
        ] {
            let err = config_from_parameters(&params(json!({ key: raw.clone() }))).unwrap_err();
            assert!(
                matches!(err, PipelineError::InvalidParameter { ref name, .. } if name == key),
                "{key}={raw}: {err}"
            );
        }
    }

    #[test]
    fn range_checks_are_left_to_validation() {
        let config = config_from_parameters(&params(json!({ "palette_size": 0 }))).unwrap();
        assert!(config.validate().is_err());
    }
}
