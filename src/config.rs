//! Tunable constants, loaded from TOML.
//!
//! Every section and field has a default so a file only needs to name what it overrides.
//!
//! ```
//! use thrust_control::FlightConfig;
//!
//! let config = FlightConfig::from_toml_str(
//!     r#"
//!     [rcs]
//!     max_iterations = 20
//!
//!     [authority]
//!     cooldown = 0.5
//!     "#,
//! )
//! .unwrap();
//!
//! assert_eq!(config.rcs.max_iterations, 20);
//! assert_eq!(config.engines.max_iterations, 50);
//! assert_eq!(config.authority.cooldown, 0.5);
//! ```

use crate::error::ConfigError;
use serde::{de::Error as _, Deserialize, Deserializer, Serialize};
use std::path::Path;

/// Complete configuration of a [`FlightCore`](crate::FlightCore).
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct FlightConfig {
    pub engines: AllocatorConfig,
    pub rcs: AllocatorConfig,
    pub attitude: AttitudeConfig,
    pub authority: AuthorityConfig,
    /// Control loop rate in Hz.
    pub loop_rate_hz: u32,
}

impl Default for FlightConfig {
    fn default() -> Self {
        Self {
            engines: AllocatorConfig::engines(),
            rcs: AllocatorConfig::rcs(),
            attitude: AttitudeConfig::default(),
            authority: AuthorityConfig::default(),
            loop_rate_hz: 50,
        }
    }
}

impl FlightConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: FlightConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let s = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&s)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.engines.validate("engines")?;
        self.rcs.validate("rcs")?;
        self.attitude.validate()?;
        self.authority.validate()?;
        if self.loop_rate_hz == 0 {
            return Err(invalid("loop_rate_hz must be positive"));
        }
        Ok(())
    }
}

/// Parameters of one [`ControlAllocator`](crate::ControlAllocator).
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct AllocatorConfig {
    /// Hard cap on iterations per call.
    pub max_iterations: usize,
    /// Relative precision used for convergence and the maneuver nudge.
    pub precision: f32,
    /// Largest angle in degrees between imbalance and demand that still counts as success.
    pub angle_cutoff: f32,
    /// Largest angular acceleration error that still counts as success.
    pub torque_cutoff: f32,
    /// Exponent of the torque ratio curve.
    pub torque_ratio_factor: f32,
    /// Below this max limit thrust is reported as disabled.
    pub min_limit: f32,
    /// Squared steering magnitude below which no torque is demanded.
    pub steering_dead_zone: f32,
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self::engines()
    }
}

impl AllocatorConfig {
    pub fn engines() -> Self {
        Self {
            max_iterations: 50,
            precision: 0.01,
            angle_cutoff: 45.,
            torque_cutoff: 1.,
            torque_ratio_factor: 0.1,
            min_limit: 0.01,
            steering_dead_zone: 0.01,
        }
    }

    pub fn rcs() -> Self {
        Self {
            angle_cutoff: 5.,
            torque_cutoff: 0.1,
            ..Self::engines()
        }
    }

    fn validate(&self, section: &str) -> Result<(), ConfigError> {
        if self.max_iterations == 0 {
            return Err(invalid(format!("{section}.max_iterations must be positive")));
        }
        check_positive(section, "precision", self.precision)?;
        check_positive(section, "angle_cutoff", self.angle_cutoff)?;
        check_positive(section, "torque_cutoff", self.torque_cutoff)?;
        check_finite(section, "torque_ratio_factor", self.torque_ratio_factor)?;
        check_finite(section, "min_limit", self.min_limit)?;
        check_finite(section, "steering_dead_zone", self.steering_dead_zone)
    }
}

/// Gain curves of the fast regime, where most torque responds instantly.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct FastTuning {
    pub at_p_err_threshold: f32,
    pub at_p_err_curve: f32,
    pub at_p_low_aa_scale: f32,
    pub at_p_low_aa_curve: f32,
    pub at_d_low_aa_scale: f32,
    pub at_d_low_aa_curve: f32,
    pub at_p_high_aa_scale: f32,
    pub at_p_high_aa_curve: f32,
    pub at_p_high_aa_max: f32,
    pub at_d_high_aa_scale: f32,
    pub at_d_high_aa_curve: f32,
    pub at_i_scale: f32,
    pub at_i_av_scale: f32,
    pub at_i_err_threshold: f32,
    pub at_i_err_curve: f32,
    pub av_p_intersect: f32,
    pub av_p_inclination: f32,
    pub av_p_curve: f32,
    pub av_p_min: f32,
    pub av_i_scale: f32,
}

impl Default for FastTuning {
    fn default() -> Self {
        Self {
            at_p_err_threshold: 0.7,
            at_p_err_curve: 0.5,
            at_p_low_aa_scale: 1.2,
            at_p_low_aa_curve: 0.8,
            at_d_low_aa_scale: 1.,
            at_d_low_aa_curve: 0.5,
            at_p_high_aa_scale: 0.2,
            at_p_high_aa_curve: 0.3,
            at_p_high_aa_max: 4.,
            at_d_high_aa_scale: 1.,
            at_d_high_aa_curve: 0.4,
            at_i_scale: 1.,
            at_i_av_scale: 10.,
            at_i_err_threshold: 0.8,
            at_i_err_curve: 2.,
            av_p_intersect: 5.,
            av_p_inclination: 0.4,
            av_p_curve: 0.8,
            av_p_min: 0.2,
            av_i_scale: 0.4,
        }
    }
}

impl FastTuning {
    /// Fast regime curves retuned for a mostly instant torque mix.
    pub fn mixed_plus() -> Self {
        Self {
            at_p_err_threshold: 0.8,
            at_p_low_aa_scale: 0.2,
            at_p_low_aa_curve: 1.2,
            at_d_low_aa_scale: 1.2,
            at_d_low_aa_curve: 0.6,
            ..Self::default()
        }
    }
}

/// Velocity stage curves of the mixed regime.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct MixedTuning {
    pub av_p_a: f32,
    pub av_p_b: f32,
    pub av_p_c: f32,
    pub av_p_d: f32,
    pub av_d_a: f32,
    pub av_d_b: f32,
    pub av_d_c: f32,
    pub av_d_d: f32,
    pub av_i_scale: f32,
}

impl Default for MixedTuning {
    fn default() -> Self {
        Self {
            av_p_a: 100.,
            av_p_b: 0.04,
            av_p_c: -100.,
            av_p_d: 0.7,
            av_d_a: 0.65,
            av_d_b: -0.01,
            av_d_c: 0.5,
            av_d_d: 0.7,
            av_i_scale: 0.03,
        }
    }
}

/// Velocity stage curves of the slow regime, where torque lags behind the command.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct SlowTuning {
    pub av_p_high_aa_scale: f32,
    pub av_d_high_aa_intersect: f32,
    pub av_d_high_aa_inclination: f32,
    pub av_d_high_aa_max: f32,
    pub av_p_low_aa_scale: f32,
    pub av_d_low_aa_intersect: f32,
    pub av_d_low_aa_inclination: f32,
    pub av_i_scale: f32,
    pub slow_torque_factor: f32,
}

impl Default for SlowTuning {
    fn default() -> Self {
        Self {
            av_p_high_aa_scale: 5.,
            av_d_high_aa_intersect: 10.,
            av_d_high_aa_inclination: 2.,
            av_d_high_aa_max: 2.,
            av_p_low_aa_scale: 8.,
            av_d_low_aa_intersect: 25.,
            av_d_low_aa_inclination: 10.,
            av_i_scale: 0.005,
            slow_torque_factor: 0.2,
        }
    }
}

/// Instant torque ratios that select the gain regime.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct RegimeThresholds {
    pub fast: f32,
    pub mixed: f32,
    pub slow: f32,
}

impl Default for RegimeThresholds {
    fn default() -> Self {
        Self {
            fast: 0.7,
            mixed: 0.3,
            slow: 0.005,
        }
    }
}

/// Blending of angular velocity towards the rotation axis.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct AxisCorrection {
    /// Cap on the blend weight.
    pub max_weight: f32,
    /// Multiplier of the normalized attitude error.
    pub error_scale: f32,
}

impl Default for AxisCorrection {
    fn default() -> Self {
        Self {
            max_weight: 0.5,
            error_scale: 3.,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct AttitudeConfig {
    pub fast: FastTuning,
    /// Used when the instant ratio is between the mixed and fast thresholds.
    #[serde(
        default = "FastTuning::mixed_plus",
        deserialize_with = "mixed_plus_overrides"
    )]
    pub mixed_plus: FastTuning,
    pub mixed: MixedTuning,
    pub slow: SlowTuning,
    pub thresholds: RegimeThresholds,
    pub axis_correction: AxisCorrection,
    pub output_filter: OutputFilter,
}

/// Low pass filter on the velocity stage output.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct OutputFilter {
    /// Time constant in control ticks.
    pub ticks: f32,
}

impl Default for OutputFilter {
    fn default() -> Self {
        Self { ticks: 3. }
    }
}

impl Default for AttitudeConfig {
    fn default() -> Self {
        Self {
            fast: FastTuning::default(),
            mixed_plus: FastTuning::mixed_plus(),
            mixed: MixedTuning::default(),
            slow: SlowTuning::default(),
            thresholds: RegimeThresholds::default(),
            axis_correction: AxisCorrection::default(),
            output_filter: OutputFilter::default(),
        }
    }
}

impl AttitudeConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if !(self.output_filter.ticks > 0.) {
            return Err(invalid("attitude.output_filter.ticks must be positive"));
        }
        let thresholds = &self.thresholds;
        for (name, value) in [
            ("fast", thresholds.fast),
            ("mixed", thresholds.mixed),
            ("slow", thresholds.slow),
        ] {
            check_finite("attitude.thresholds", name, value)?;
        }
        if !(thresholds.slow <= thresholds.mixed && thresholds.mixed <= thresholds.fast) {
            return Err(invalid(
                "attitude.thresholds must be ordered slow <= mixed <= fast",
            ));
        }
        check_finite(
            "attitude.axis_correction",
            "max_weight",
            self.axis_correction.max_weight,
        )?;
        check_finite(
            "attitude.axis_correction",
            "error_scale",
            self.axis_correction.error_scale,
        )
    }
}

/// Hysteresis of the control authority flag. Angles in degrees, times in seconds.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct AuthorityConfig {
    /// Above this error authority may be revoked.
    pub max_attitude_error: f32,
    /// Below this error authority is regranted.
    pub attitude_error_threshold: f32,
    /// Below this error authority is regranted while the error is shrinking in time.
    pub converging_error_threshold: f32,
    /// How long a condition has to hold before the flag changes.
    pub cooldown: f32,
}

impl Default for AuthorityConfig {
    fn default() -> Self {
        Self {
            max_attitude_error: 10.,
            attitude_error_threshold: 3.,
            converging_error_threshold: 6.,
            cooldown: 1.,
        }
    }
}

impl AuthorityConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        check_finite("authority", "max_attitude_error", self.max_attitude_error)?;
        check_finite(
            "authority",
            "attitude_error_threshold",
            self.attitude_error_threshold,
        )?;
        check_finite(
            "authority",
            "converging_error_threshold",
            self.converging_error_threshold,
        )?;
        if !(self.attitude_error_threshold < self.converging_error_threshold
            && self.converging_error_threshold < self.max_attitude_error)
        {
            return Err(invalid(
                "authority thresholds must be ordered attitude_error_threshold < converging_error_threshold < max_attitude_error",
            ));
        }
        if !(self.cooldown >= 0.) || !self.cooldown.is_finite() {
            return Err(invalid("authority.cooldown must be a non-negative number"));
        }
        Ok(())
    }
}

/// Deserialize a `[attitude.mixed_plus]` table on top of [`FastTuning::mixed_plus`],
/// so fields the table leaves out keep their mixed-plus values.
fn mixed_plus_overrides<'de, D>(deserializer: D) -> Result<FastTuning, D::Error>
where
    D: Deserializer<'de>,
{
    let overrides = toml::Table::deserialize(deserializer)?;
    let mut table = match toml::Value::try_from(FastTuning::mixed_plus()) {
        Ok(toml::Value::Table(table)) => table,
        Ok(_) => return Err(D::Error::custom("mixed_plus defaults are not a table")),
        Err(e) => return Err(D::Error::custom(e)),
    };
    table.extend(overrides);
    FastTuning::deserialize(toml::Value::Table(table)).map_err(D::Error::custom)
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid(message.into())
}

fn check_finite(section: &str, name: &str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(invalid(format!("{section}.{name} must be finite")))
    }
}

fn check_positive(section: &str, name: &str, value: f32) -> Result<(), ConfigError> {
    check_finite(section, name, value)?;
    if value > 0. {
        Ok(())
    } else {
        Err(invalid(format!("{section}.{name} must be positive")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let config = FlightConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.rcs.angle_cutoff, 5.);
        assert_eq!(config.rcs.torque_cutoff, 0.1);
        assert_eq!(config.attitude.mixed_plus, FastTuning::mixed_plus());
    }

    #[test]
    fn empty_document_is_default() {
        assert_eq!(FlightConfig::from_toml_str("").unwrap(), FlightConfig::default());
    }

    #[test]
    fn partial_section_keeps_other_defaults() {
        let config = FlightConfig::from_toml_str(
            r#"
            [attitude.mixed_plus]
            at_p_err_threshold = 0.9

            [attitude.output_filter]
            ticks = 5.0
            "#,
        )
        .unwrap();

        let mixed_plus = &config.attitude.mixed_plus;
        assert_eq!(mixed_plus.at_p_err_threshold, 0.9);
        // Omitted fields keep the mixed-plus curves, not the fast ones
        assert_eq!(mixed_plus.at_p_low_aa_scale, 0.2);
        assert_eq!(mixed_plus.at_p_low_aa_curve, 1.2);
        assert_eq!(mixed_plus.at_d_low_aa_scale, 1.2);
        assert_eq!(mixed_plus.at_d_low_aa_curve, 0.6);
        assert_eq!(mixed_plus.at_i_av_scale, FastTuning::default().at_i_av_scale);
        assert_eq!(config.attitude.output_filter.ticks, 5.);
        assert_eq!(config.attitude.fast, FastTuning::default());
    }

    #[test]
    fn mixed_plus_table_overrides_only_what_it_names() {
        let config =
            FlightConfig::from_toml_str("[attitude.mixed_plus]\nat_p_err_threshold = 0.8").unwrap();
        assert_eq!(config.attitude.mixed_plus, FastTuning::mixed_plus());

        let config = FlightConfig::from_toml_str("[attitude.mixed_plus]").unwrap();
        assert_eq!(config.attitude.mixed_plus, FastTuning::mixed_plus());
    }

    #[test]
    fn zero_iterations_are_rejected() {
        let err = FlightConfig::from_toml_str("[engines]\nmax_iterations = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        assert!(err.to_string().contains("engines.max_iterations"));
    }

    #[test]
    fn unordered_authority_thresholds_are_rejected() {
        let err = FlightConfig::from_toml_str(
            "[authority]\nattitude_error_threshold = 8.0\nconverging_error_threshold = 6.0",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn malformed_document_is_a_parse_error() {
        let err = FlightConfig::from_toml_str("[rcs]\nprecision = \"high\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "loop_rate_hz = 100\n[engines]\nprecision = 0.05").unwrap();

        let config = FlightConfig::load(file.path()).unwrap();
        assert_eq!(config.loop_rate_hz, 100);
        assert_eq!(config.engines.precision, 0.05);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = FlightConfig::load(dir.path().join("missing.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
