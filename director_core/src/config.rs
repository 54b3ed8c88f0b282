//! Tuning for the cinematography controller, loadable from TOML.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::signals::{SignalType, SignalWeights};

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Inclusive range of seconds a random duration is drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DurationRange {
    pub min: f32,
    pub max: f32,
}

impl DurationRange {
    pub const fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    /// Draw a duration uniformly from the range.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f32 {
        if self.max <= self.min {
            return self.min;
        }
        rng.random_range(self.min..=self.max)
    }

    fn check(&self, name: &str) -> Result<(), ConfigError> {
        if self.min < 0.0 || self.min > self.max {
            return Err(ConfigError::Invalid(format!(
                "{name}: range {}..={} is empty or negative",
                self.min, self.max
            )));
        }
        Ok(())
    }
}

/// Signal detection and accumulation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalConfig {
    /// Intensity lost per second by non-sustained signals.
    pub decay_rate: f32,

    /// Signals weaker than this are removed.
    pub min_intensity: f32,

    /// Total intensity is only republished when it moves by more than this.
    pub publish_hysteresis: f32,

    /// Total intensity below this counts as quiet.
    pub quiet_threshold: f32,

    /// Seconds of quiet before an ISOLATION signal is injected.
    pub quiet_duration: f32,

    pub isolation_intensity: f32,

    /// Speed change (m/s) from the reference that produces a SPEED_CHANGE signal.
    pub speed_delta_threshold: f32,

    /// Slope change (degrees) from the reference that produces a SLOPE_CHANGE signal.
    pub slope_delta_threshold: f32,

    /// Body fatigue levels that produce a FATIGUE_SPIKE when crossed upward.
    pub fatigue_thresholds: Vec<f32>,

    /// Edges farther than this (meters) do not register.
    pub cliff_range: f32,

    /// Per-type weight overrides on top of the built-in table.
    pub weights: BTreeMap<SignalType, f32>,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            decay_rate: 0.15,
            min_intensity: 0.05,
            publish_hysteresis: 0.05,
            quiet_threshold: 0.2,
            quiet_duration: 10.0,
            isolation_intensity: 0.3,
            speed_delta_threshold: 2.0,
            slope_delta_threshold: 8.0,
            fatigue_thresholds: vec![0.5, 0.7, 0.9],
            cliff_range: 30.0,
            weights: BTreeMap::new(),
        }
    }
}

impl SignalConfig {
    /// Built-in weights with overrides applied.
    pub fn weight_table(&self) -> SignalWeights {
        let mut table = SignalWeights::default();
        for (signal_type, weight) in &self.weights {
            table.set(*signal_type, *weight);
        }
        table
    }
}

/// Pacing analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RhythmConfig {
    /// Smoothing factor; the interpolation rate per tick is `smoothing * dt * 5`.
    pub smoothing: f32,

    /// HIGH held longer than this requests a release.
    pub max_high_duration: f32,

    /// PEAK held longer than this requests a release and forces rest.
    pub max_peak_duration: f32,

    /// Length of the forced rest window after a peak.
    pub min_rest_after_peak: f32,

    /// Raw intensity multiplier during forced rest.
    pub rest_multiplier: f32,

    /// Seconds of intensity history kept.
    pub history_window: f32,

    /// The "recent" average covers this many seconds.
    pub recent_window: f32,

    /// The reference average covers from `recent_window` back to this many seconds.
    pub reference_window: f32,

    pub trend_threshold: f32,

    /// Flat trends above this intensity are a plateau, below it rest.
    pub plateau_threshold: f32,

    /// A cut is recommended this soon after a phase change.
    pub cut_window: f32,

    /// A cut is recommended when raw and smoothed intensity diverge by more than this.
    pub divergence_threshold: f32,

    /// Window for the pacing average.
    pub pacing_window: f32,

    /// Average intensity the pacing factor steers toward.
    pub target_intensity: f32,

    pub pacing_gain: f32,
    pub pacing_min: f32,
    pub pacing_max: f32,
}

impl Default for RhythmConfig {
    fn default() -> Self {
        Self {
            smoothing: 0.3,
            max_high_duration: 20.0,
            max_peak_duration: 8.0,
            min_rest_after_peak: 6.0,
            rest_multiplier: 0.3,
            history_window: 60.0,
            recent_window: 5.0,
            reference_window: 15.0,
            trend_threshold: 0.1,
            plateau_threshold: 0.5,
            cut_window: 0.5,
            divergence_threshold: 0.3,
            pacing_window: 30.0,
            target_intensity: 0.4,
            pacing_gain: 1.5,
            pacing_min: 0.6,
            pacing_max: 1.6,
        }
    }
}

/// Shot intent selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IntentConfig {
    pub min_intent_duration: f32,
    pub max_intent_duration: f32,
    pub commitment_threshold: f32,
    pub tension_threshold: f32,

    /// Intensity rise over the trend interval that counts as rising.
    pub rising_delta: f32,

    /// Intensity drop over the trend interval that counts as a sharp fall.
    pub falling_delta: f32,

    /// Seconds of low intensity in CONSEQUENCE before moving to RELEASE.
    pub consequence_settle: f32,

    /// Seconds of inactivity before returning to CONTEXT.
    pub inactivity_timeout: f32,

    /// Intensity below this counts as inactive.
    pub inactivity_threshold: f32,

    /// Re-selecting an intent is blocked for half of this window after it ended.
    pub variety_window: f32,

    /// Seconds between intensity reference samples used for deltas.
    pub trend_interval: f32,

    pub history_capacity: usize,
}

impl Default for IntentConfig {
    fn default() -> Self {
        Self {
            min_intent_duration: 2.0,
            max_intent_duration: 20.0,
            commitment_threshold: 0.6,
            tension_threshold: 0.3,
            rising_delta: 0.05,
            falling_delta: 0.3,
            consequence_settle: 5.0,
            inactivity_timeout: 8.0,
            inactivity_threshold: 0.15,
            variety_window: 30.0,
            trend_interval: 1.0,
            history_capacity: 16,
        }
    }
}

/// Cut execution and imperfection scheduling.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectorConfig {
    pub log_capacity: usize,

    /// Cut anyway once the selector's intent has been off-screen this long.
    pub max_cut_delay: f32,

    pub base_miss_rate: f32,
    pub base_late_rate: f32,
    pub base_hesitate_rate: f32,

    /// Share of the operator's late rate applied to ordinary cuts.
    pub late_on_cut_factor: f32,

    /// Subject speed (m/s) at which late arrivals take twice as long.
    pub late_speed_reference: f32,

    /// Cut again to the same intent once a shot outlives its recommended length.
    pub recut_expired_shots: bool,

    /// Delay between scheduling an imperfection and executing it.
    pub reaction_delay: DurationRange,

    pub miss_duration: DurationRange,
    pub late_duration: DurationRange,
    pub hesitate_duration: DurationRange,
    pub overcorrect_duration: DurationRange,
    pub drift_duration: DurationRange,
    pub reframe_duration: DurationRange,
}

impl Default for DirectorConfig {
    fn default() -> Self {
        Self {
            log_capacity: 100,
            max_cut_delay: 2.0,
            base_miss_rate: 0.05,
            base_late_rate: 0.15,
            base_hesitate_rate: 0.1,
            late_on_cut_factor: 0.5,
            late_speed_reference: 10.0,
            recut_expired_shots: false,
            reaction_delay: DurationRange::new(0.1, 0.4),
            miss_duration: DurationRange::new(0.8, 1.5),
            late_duration: DurationRange::new(0.3, 0.8),
            hesitate_duration: DurationRange::new(0.2, 0.5),
            overcorrect_duration: DurationRange::new(0.3, 0.6),
            drift_duration: DurationRange::new(1.5, 4.0),
            reframe_duration: DurationRange::new(0.5, 1.2),
        }
    }
}

/// Virtual camera operator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OperatorConfig {
    /// Operator skill (0.0 - 1.0); higher reduces imperfection rates.
    pub skill_level: f32,

    /// Fatigue gained per second in mild conditions.
    pub fatigue_rate: f32,
    pub cold_fatigue_gain: f32,
    pub wind_fatigue_gain: f32,

    /// Stress lost per second.
    pub stress_decay: f32,

    /// Stress gained per second per unit of intensity above the threshold.
    pub stress_gain: f32,
    pub stress_intensity_threshold: f32,

    /// Stress added by a fully sudden event.
    pub event_stress_spike: f32,

    /// Sessions shorter than this are "early".
    pub early_session: f32,

    /// Sessions longer than this are "long".
    pub long_session: f32,

    /// Fraction of the rate removed at full skill.
    pub skill_reduction: f32,

    /// Fraction of the rate added at full fatigue.
    pub fatigue_amplification: f32,

    pub drift_base: f32,
    pub drift_fatigue_gain: f32,

    /// Frequency of the sinusoidal drift component (Hz).
    pub drift_frequency: f32,

    /// Random walk step scale per second.
    pub drift_walk_rate: f32,

    /// Fraction of random walk retained per second.
    pub drift_walk_retention: f32,

    /// Fraction the ambient interval shrinks at full fatigue.
    pub ambient_compression: f32,

    /// Number of recent ambient imperfection types that cannot repeat.
    pub no_repeat_memory: usize,

    /// Interval between ambient imperfections at zero fatigue.
    pub ambient_interval: DurationRange,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            skill_level: 0.5,
            fatigue_rate: 0.0015,
            cold_fatigue_gain: 1.5,
            wind_fatigue_gain: 1.0,
            stress_decay: 0.05,
            stress_gain: 0.4,
            stress_intensity_threshold: 0.6,
            event_stress_spike: 0.35,
            early_session: 120.0,
            long_session: 600.0,
            skill_reduction: 0.6,
            fatigue_amplification: 0.8,
            drift_base: 0.02,
            drift_fatigue_gain: 0.1,
            drift_frequency: 0.35,
            drift_walk_rate: 0.5,
            drift_walk_retention: 0.8,
            ambient_compression: 0.5,
            no_repeat_memory: 3,
            ambient_interval: DurationRange::new(5.0, 30.0),
        }
    }
}

/// Complete controller configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CinematographyConfig {
    /// Fixed random seed. When unset each run derives one from its id.
    pub seed: Option<u64>,

    pub signals: SignalConfig,
    pub rhythm: RhythmConfig,
    pub intent: IntentConfig,
    pub director: DirectorConfig,
    pub operator: OperatorConfig,
}

impl CinematographyConfig {
    /// Parse and validate a TOML document. Missing keys keep their defaults.
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let config: CinematographyConfig = toml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let unit = |name: &str, value: f32| {
            if (0.0..=1.0).contains(&value) {
                Ok(())
            } else {
                Err(ConfigError::Invalid(format!(
                    "{name} must be within 0..=1, got {value}"
                )))
            }
        };
        let positive = |name: &str, value: f32| {
            if value > 0.0 {
                Ok(())
            } else {
                Err(ConfigError::Invalid(format!(
                    "{name} must be positive, got {value}"
                )))
            }
        };

        unit("signals.min_intensity", self.signals.min_intensity)?;
        unit("signals.quiet_threshold", self.signals.quiet_threshold)?;
        unit("signals.isolation_intensity", self.signals.isolation_intensity)?;
        positive("signals.quiet_duration", self.signals.quiet_duration)?;
        for threshold in &self.signals.fatigue_thresholds {
            unit("signals.fatigue_thresholds", *threshold)?;
        }

        positive("rhythm.smoothing", self.rhythm.smoothing)?;
        unit("rhythm.rest_multiplier", self.rhythm.rest_multiplier)?;
        if self.rhythm.recent_window >= self.rhythm.reference_window {
            return Err(ConfigError::Invalid(
                "rhythm.recent_window must be shorter than rhythm.reference_window".into(),
            ));
        }
        if self.rhythm.reference_window > self.rhythm.history_window {
            return Err(ConfigError::Invalid(
                "rhythm.reference_window must fit inside rhythm.history_window".into(),
            ));
        }
        if self.rhythm.pacing_min > self.rhythm.pacing_max || self.rhythm.pacing_min <= 0.0 {
            return Err(ConfigError::Invalid(
                "rhythm.pacing_min must be positive and not exceed rhythm.pacing_max".into(),
            ));
        }

        if self.intent.min_intent_duration >= self.intent.max_intent_duration {
            return Err(ConfigError::Invalid(
                "intent.min_intent_duration must be shorter than intent.max_intent_duration"
                    .into(),
            ));
        }
        positive("intent.trend_interval", self.intent.trend_interval)?;
        if self.intent.history_capacity == 0 {
            return Err(ConfigError::Invalid(
                "intent.history_capacity must be at least 1".into(),
            ));
        }

        if self.director.log_capacity == 0 {
            return Err(ConfigError::Invalid(
                "director.log_capacity must be at least 1".into(),
            ));
        }
        unit("director.base_miss_rate", self.director.base_miss_rate)?;
        unit("director.base_late_rate", self.director.base_late_rate)?;
        unit("director.base_hesitate_rate", self.director.base_hesitate_rate)?;
        self.director.reaction_delay.check("director.reaction_delay")?;
        self.director.miss_duration.check("director.miss_duration")?;
        self.director.late_duration.check("director.late_duration")?;
        self.director.hesitate_duration.check("director.hesitate_duration")?;
        self.director
            .overcorrect_duration
            .check("director.overcorrect_duration")?;
        self.director.drift_duration.check("director.drift_duration")?;
        self.director.reframe_duration.check("director.reframe_duration")?;
        positive(
            "director.late_speed_reference",
            self.director.late_speed_reference,
        )?;

        unit("operator.skill_level", self.operator.skill_level)?;
        unit("operator.drift_walk_retention", self.operator.drift_walk_retention)?;
        unit("operator.ambient_compression", self.operator.ambient_compression)?;
        self.operator
            .ambient_interval
            .check("operator.ambient_interval")?;
        positive("operator.ambient_interval.min", self.operator.ambient_interval.min)?;
        if self.operator.early_session > self.operator.long_session {
            return Err(ConfigError::Invalid(
                "operator.early_session must not exceed operator.long_session".into(),
            ));
        }

        Ok(())
    }
}

/// The default configuration rendered as TOML, for writing a starter file.
pub fn default_config_toml() -> Result<String, ConfigError> {
    CinematographyConfig::default().to_toml_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(CinematographyConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = CinematographyConfig::from_toml_str(
            r#"
seed = 42

[rhythm]
max_peak_duration = 10.0

[signals.weights]
ISOLATION = 0.5
"#,
        )
        .unwrap();

        assert_eq!(config.seed, Some(42));
        assert_eq!(config.rhythm.max_peak_duration, 10.0);
        assert_eq!(config.rhythm.max_high_duration, 20.0);
        assert_eq!(config.intent.min_intent_duration, 2.0);
        assert_eq!(config.signals.weight_table().get(SignalType::Isolation), 0.5);
        assert_eq!(config.signals.weight_table().get(SignalType::SlideEntry), 1.0);
    }

    #[test]
    fn test_default_toml_parses_back() {
        let rendered = default_config_toml().unwrap();
        let parsed = CinematographyConfig::from_toml_str(&rendered).unwrap();

        assert_eq!(parsed.director.log_capacity, 100);
        assert_eq!(parsed.signals.fatigue_thresholds, vec![0.5, 0.7, 0.9]);
    }

    #[test]
    fn test_rejects_inverted_hold_times() {
        let result = CinematographyConfig::from_toml_str(
            r#"
[intent]
min_intent_duration = 30.0
"#,
        );
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_rejects_bad_probability() {
        let mut config = CinematographyConfig::default();
        config.director.base_miss_rate = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_empty_range() {
        let mut config = CinematographyConfig::default();
        config.operator.ambient_interval = DurationRange::new(10.0, 5.0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_error() {
        let result = CinematographyConfig::from_toml_str("seed = \"many\"");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_missing_file() {
        let result = CinematographyConfig::load("/definitely/not/here.toml");
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }
}
