use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MOBILE_WIDTH_THRESHOLD: u32 = 768;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] ron::error::SpannedError),
    #[error("invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FluidConfig {
    pub sim_resolution: u32,
    pub dye_resolution: u32,
    pub density_dissipation: f32,
    pub velocity_dissipation: f32,
    pub pressure: f32,
    pub pressure_iterations: u32,
    pub curl: f32,
    pub splat_radius: f32,
    pub splat_force: f32,
    pub max_dt: f32,
    pub initial_splash_delay: f32,
    pub mouse_force_scale: f32,
    pub touch_force_scale: f32,
    pub require_half_float: bool,
}

impl Default for FluidConfig {
    fn default() -> Self {
        Self {
            sim_resolution: 128,
            dye_resolution: 1024,
            density_dissipation: 2.5,
            velocity_dissipation: 1.0,
            pressure: 0.8,
            pressure_iterations: 20,
            curl: 20.0,
            splat_radius: 0.15,
            splat_force: 1.0,
            max_dt: 0.016,
            initial_splash_delay: 0.5,
            mouse_force_scale: 5.0,
            touch_force_scale: 8.0,
            require_half_float: false,
        }
    }
}

impl FluidConfig {
    pub fn mobile() -> Self {
        Self {
            sim_resolution: 64,
            dye_resolution: 512,
            pressure_iterations: 10,
            splat_radius: 0.2,
            ..Self::default()
        }
    }

    pub fn for_surface_width(width: u32) -> Self {
        if width < MOBILE_WIDTH_THRESHOLD {
            Self::mobile()
        } else {
            Self::default()
        }
    }

    pub fn from_ron(text: &str) -> Result<Self, ConfigError> {
        let config: Self = ron::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_ron(&text)
    }

    pub fn splat_radius_normalized(&self) -> f32 {
        self.splat_radius / 100.0
    }

    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(value) = parse_override(&lookup, "INKFLOW_SIM_RESOLUTION", "sim_resolution")? {
            self.sim_resolution = value;
        }
        if let Some(value) = parse_override(&lookup, "INKFLOW_DYE_RESOLUTION", "dye_resolution")? {
            self.dye_resolution = value;
        }
        if let Some(value) =
            parse_override(&lookup, "INKFLOW_PRESSURE_ITERATIONS", "pressure_iterations")?
        {
            self.pressure_iterations = value;
        }
        if let Some(value) = parse_override(&lookup, "INKFLOW_CURL", "curl")? {
            self.curl = value;
        }
        if let Some(value) = parse_override(&lookup, "INKFLOW_SPLAT_RADIUS", "splat_radius")? {
            self.splat_radius = value;
        }
        self.validate()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sim_resolution == 0 {
            return Err(invalid("sim_resolution", "must be > 0"));
        }
        if self.dye_resolution == 0 {
            return Err(invalid("dye_resolution", "must be > 0"));
        }
        if self.pressure_iterations == 0 {
            return Err(invalid("pressure_iterations", "must be > 0"));
        }
        if !(0.0..1.0).contains(&self.pressure) {
            return Err(invalid("pressure", "must be in [0, 1)"));
        }
        if !self.splat_radius.is_finite() || self.splat_radius <= 0.0 {
            return Err(invalid("splat_radius", "must be a finite value > 0"));
        }
        if self.density_dissipation < 0.0 || !self.density_dissipation.is_finite() {
            return Err(invalid("density_dissipation", "must be >= 0"));
        }
        if self.velocity_dissipation < 0.0 || !self.velocity_dissipation.is_finite() {
            return Err(invalid("velocity_dissipation", "must be >= 0"));
        }
        if !self.max_dt.is_finite() || self.max_dt <= 0.0 {
            return Err(invalid("max_dt", "must be a finite value > 0"));
        }
        if !self.curl.is_finite() {
            return Err(invalid("curl", "must be finite"));
        }
        let forces = [
            ("splat_force", self.splat_force),
            ("mouse_force_scale", self.mouse_force_scale),
            ("touch_force_scale", self.touch_force_scale),
        ];
        for (field, value) in forces {
            if !value.is_finite() {
                return Err(invalid(field, "must be finite"));
            }
        }
        if !self.initial_splash_delay.is_finite() || self.initial_splash_delay < 0.0 {
            return Err(invalid("initial_splash_delay", "must be a finite value >= 0"));
        }
        Ok(())
    }
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.to_string(),
    }
}

fn parse_override<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &str,
    field: &'static str,
) -> Result<Option<T>, ConfigError> {
    let Some(raw) = lookup(var) else {
        return Ok(None);
    };
    raw.trim()
        .parse::<T>()
        .map(Some)
        .map_err(|_| ConfigError::Invalid {
            field,
            reason: format!("{var}={raw:?} is not a valid number"),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_are_valid() {
        FluidConfig::default().validate().unwrap();
        FluidConfig::mobile().validate().unwrap();
    }

    #[test]
    fn narrow_surfaces_pick_mobile_preset() {
        let config = FluidConfig::for_surface_width(600);
        assert_eq!(config.sim_resolution, 64);
        assert_eq!(config.dye_resolution, 512);
        assert_eq!(config.pressure_iterations, 10);
        assert_eq!(FluidConfig::for_surface_width(1280), FluidConfig::default());
    }

    #[test]
    fn splat_radius_is_percent() {
        let config = FluidConfig {
            splat_radius: 0.25,
            ..FluidConfig::default()
        };
        assert!((config.splat_radius_normalized() - 0.0025).abs() < 1e-9);
    }

    #[test]
    fn partial_ron_fills_in_defaults() {
        let config = FluidConfig::from_ron("(curl: 35.0, pressure_iterations: 40)").unwrap();
        assert_eq!(config.curl, 35.0);
        assert_eq!(config.pressure_iterations, 40);
        assert_eq!(config.sim_resolution, FluidConfig::default().sim_resolution);
    }

    #[test]
    fn malformed_ron_is_a_parse_error() {
        let err = FluidConfig::from_ron("(curl: )").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn validation_rejects_zero_radius() {
        let config = FluidConfig {
            splat_radius: 0.0,
            ..FluidConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "splat_radius", .. }));
    }

    #[test]
    fn validation_rejects_pressure_at_or_above_one() {
        let config = FluidConfig {
            pressure: 1.0,
            ..FluidConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn validation_rejects_zero_iterations() {
        let config = FluidConfig {
            pressure_iterations: 0,
            ..FluidConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn validation_rejects_non_finite_forces_and_delay() {
        let cases = [
            ("splat_force", FluidConfig { splat_force: f32::NAN, ..FluidConfig::default() }),
            (
                "mouse_force_scale",
                FluidConfig { mouse_force_scale: f32::INFINITY, ..FluidConfig::default() },
            ),
            (
                "touch_force_scale",
                FluidConfig { touch_force_scale: f32::NEG_INFINITY, ..FluidConfig::default() },
            ),
            (
                "initial_splash_delay",
                FluidConfig { initial_splash_delay: f32::NAN, ..FluidConfig::default() },
            ),
            (
                "initial_splash_delay",
                FluidConfig { initial_splash_delay: -1.0, ..FluidConfig::default() },
            ),
        ];
        for (expected, config) in cases {
            match config.validate() {
                Err(ConfigError::Invalid { field, .. }) => assert_eq!(field, expected),
                other => panic!("expected {expected} to be rejected, got {other:?}"),
            }
        }
    }

    #[test]
    fn overrides_replace_fields() {
        let vars: HashMap<&str, &str> = [
            ("INKFLOW_SIM_RESOLUTION", "96"),
            ("INKFLOW_CURL", " 12.5 "),
        ]
        .into_iter()
        .collect();
        let mut config = FluidConfig::default();
        config
            .apply_overrides(|name| vars.get(name).map(|value| value.to_string()))
            .unwrap();
        assert_eq!(config.sim_resolution, 96);
        assert_eq!(config.curl, 12.5);
        assert_eq!(config.dye_resolution, 1024);
    }

    #[test]
    fn unparsable_override_names_the_variable() {
        let mut config = FluidConfig::default();
        let err = config
            .apply_overrides(|name| (name == "INKFLOW_PRESSURE_ITERATIONS").then(|| "many".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("INKFLOW_PRESSURE_ITERATIONS"));
    }
}
