//! Rhythm engine - pacing over the signal detector's raw intensity.
//!
//! Smooths the raw intensity, buckets it into an [`IntensityLevel`], keeps a
//! rolling history for the [`RhythmPhase`], and enforces the pacing limits:
//! forced rest after a peak, and a release request when high intensity has
//! been held too long.

mod history;

pub use history::*;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::config::RhythmConfig;
use crate::events::DirectorEvent;

/// Smoothed intensity bucketed at 0.2 / 0.4 / 0.6 / 0.8.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IntensityLevel {
    #[default]
    Quiet,
    Low,
    Medium,
    High,
    Peak,
}

impl IntensityLevel {
    /// Bucket a smoothed intensity into its level.
    pub fn from_intensity(intensity: f32) -> Self {
        if intensity >= 0.8 {
            IntensityLevel::Peak
        } else if intensity >= 0.6 {
            IntensityLevel::High
        } else if intensity >= 0.4 {
            IntensityLevel::Medium
        } else if intensity >= 0.2 {
            IntensityLevel::Low
        } else {
            IntensityLevel::Quiet
        }
    }

    /// Shot length before pacing is applied, in seconds.
    pub fn base_shot_duration(self) -> f32 {
        match self {
            IntensityLevel::Peak => 1.5,
            IntensityLevel::High => 3.0,
            IntensityLevel::Medium => 5.0,
            IntensityLevel::Low => 8.0,
            IntensityLevel::Quiet => 12.0,
        }
    }

    /// Camera movement speed multiplier for this level.
    pub fn camera_speed_factor(self) -> f32 {
        match self {
            IntensityLevel::Peak => 1.5,
            IntensityLevel::High => 1.25,
            IntensityLevel::Medium => 1.0,
            IntensityLevel::Low => 0.8,
            IntensityLevel::Quiet => 0.6,
        }
    }

    /// QUIET or LOW.
    pub fn is_calm(self) -> bool {
        self <= IntensityLevel::Low
    }
}

impl std::fmt::Display for IntensityLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            IntensityLevel::Quiet => "QUIET",
            IntensityLevel::Low => "LOW",
            IntensityLevel::Medium => "MEDIUM",
            IntensityLevel::High => "HIGH",
            IntensityLevel::Peak => "PEAK",
        };
        f.write_str(name)
    }
}

pub struct RhythmEngine {
    config: RhythmConfig,
    clock: f32,

    /// Input after the forced-rest multiplier.
    raw_intensity: f32,
    current_intensity: f32,

    level: IntensityLevel,
    time_in_level: f32,
    /// `None` until the first peak.
    time_since_peak: Option<f32>,
    rest_remaining: f32,
    release_needed: bool,

    phase: RhythmPhase,
    time_in_phase: f32,
    history: IntensityHistory,

    events: Vec<DirectorEvent>,
}

impl RhythmEngine {
    /// Create an engine at rest with an empty history.
    pub fn new(config: RhythmConfig) -> Self {
        let history = IntensityHistory::new(config.history_window);
        Self {
            config,
            clock: 0.0,
            raw_intensity: 0.0,
            current_intensity: 0.0,
            level: IntensityLevel::Quiet,
            time_in_level: 0.0,
            time_since_peak: None,
            rest_remaining: 0.0,
            release_needed: false,
            phase: RhythmPhase::Rest,
            time_in_phase: 0.0,
            history,
            events: Vec::new(),
        }
    }

    /// Create an engine with the default configuration.
    pub fn with_defaults() -> Self {
        Self::new(RhythmConfig::default())
    }

    /// Advance one tick with the detector's raw intensity.
    pub fn update(&mut self, raw_intensity: f32, dt: f32) {
        let dt = dt.max(0.0);
        self.clock += dt;

        let mut input = raw_intensity.clamp(0.0, 1.0);
        if self.rest_remaining > 0.0 {
            input *= self.config.rest_multiplier;
            self.rest_remaining = (self.rest_remaining - dt).max(0.0);
        }
        self.raw_intensity = input;

        let alpha = (self.config.smoothing * dt * 5.0).clamp(0.0, 1.0);
        self.current_intensity = (self.current_intensity
            + (input - self.current_intensity) * alpha)
            .clamp(0.0, 1.0);

        self.update_level(dt);
        self.check_constraints();
        self.update_phase(dt);

        trace!(
            raw = self.raw_intensity,
            current = self.current_intensity,
            level = %self.level,
            phase = %self.phase,
            "rhythm tick"
        );
    }

    fn update_level(&mut self, dt: f32) {
        let level = IntensityLevel::from_intensity(self.current_intensity);

        if level != self.level {
            let previous = self.level;
            if previous == IntensityLevel::Peak {
                self.enter_rest();
            }

            debug!(from = %previous, to = %level, "intensity level changed");
            self.events.push(DirectorEvent::IntensityLevelChanged {
                from: previous,
                to: level,
                timestamp: self.clock,
            });
            self.level = level;
            self.time_in_level = dt;
        } else {
            self.time_in_level += dt;
        }

        self.time_since_peak = if level == IntensityLevel::Peak {
            Some(0.0)
        } else {
            self.time_since_peak.map(|t| t + dt)
        };
    }

    fn check_constraints(&mut self) {
        match self.level {
            IntensityLevel::High if self.time_in_level >= self.config.max_high_duration => {
                self.raise_release();
            }
            IntensityLevel::Peak if self.time_in_level >= self.config.max_peak_duration => {
                self.raise_release();
                self.enter_rest();
            }
            level if level.is_calm() => self.release_needed = false,
            _ => {}
        }
    }

    fn update_phase(&mut self, dt: f32) {
        self.history.push(self.clock, self.current_intensity);
        let phase = classify(&self.history, self.phase_thresholds());

        if phase != self.phase {
            debug!(from = %self.phase, to = %phase, "rhythm beat");
            self.events.push(DirectorEvent::RhythmBeat {
                from: self.phase,
                to: phase,
                timestamp: self.clock,
            });
            self.phase = phase;
            self.time_in_phase = 0.0;
        } else {
            self.time_in_phase += dt;
        }
    }

    fn raise_release(&mut self) {
        if self.release_needed {
            return;
        }
        self.release_needed = true;
        debug!(level = %self.level, held_for = self.time_in_level, "release needed");
        self.events.push(DirectorEvent::ReleaseNeeded {
            level: self.level,
            held_for: self.time_in_level,
            timestamp: self.clock,
        });
    }

    fn enter_rest(&mut self) {
        self.rest_remaining = self.config.min_rest_after_peak;
    }

    fn phase_thresholds(&self) -> PhaseThresholds {
        PhaseThresholds {
            recent_window: self.config.recent_window,
            reference_window: self.config.reference_window,
            trend: self.config.trend_threshold,
            plateau: self.config.plateau_threshold,
        }
    }

    /// Smoothed intensity.
    pub fn current_intensity(&self) -> f32 {
        self.current_intensity
    }

    /// Last input after the rest multiplier.
    pub fn raw_intensity(&self) -> f32 {
        self.raw_intensity
    }

    /// Current intensity level.
    pub fn level(&self) -> IntensityLevel {
        self.level
    }

    /// Current rhythm phase.
    pub fn phase(&self) -> RhythmPhase {
        self.phase
    }

    /// Seconds spent in the current level.
    pub fn time_in_level(&self) -> f32 {
        self.time_in_level
    }

    /// Seconds spent in the current phase.
    pub fn time_in_phase(&self) -> f32 {
        self.time_in_phase
    }

    /// Seconds since PEAK was last held.
    pub fn time_since_peak(&self) -> Option<f32> {
        self.time_since_peak
    }

    /// Whether a pacing limit asks for a release.
    pub fn release_needed(&self) -> bool {
        self.release_needed
    }

    /// Whether the post-peak rest window is damping input.
    pub fn is_resting(&self) -> bool {
        self.rest_remaining > 0.0
    }

    /// Rolling intensity history.
    pub fn history(&self) -> &IntensityHistory {
        &self.history
    }

    /// Cadence multiplier steering average intensity toward the target.
    /// Above 1.0 shortens shots, below 1.0 lengthens them.
    pub fn pacing_factor(&self) -> f32 {
        let Some(average) = self.history.average_by_age(0.0, self.config.pacing_window) else {
            return 1.0;
        };
        (1.0 + (self.config.target_intensity - average) * self.config.pacing_gain)
            .clamp(self.config.pacing_min, self.config.pacing_max)
    }

    /// Shot length for the current level, adjusted by pacing.
    pub fn recommended_shot_duration(&self) -> f32 {
        self.level.base_shot_duration() / self.pacing_factor()
    }

    /// Camera speed multiplier for the current level.
    pub fn recommended_camera_speed(&self) -> f32 {
        self.level.camera_speed_factor()
    }

    /// True right after a phase change, or while the smoothed intensity lags
    /// far behind the raw input.
    pub fn is_cut_recommended(&self) -> bool {
        self.time_in_phase < self.config.cut_window
            || (self.raw_intensity - self.current_intensity).abs()
                > self.config.divergence_threshold
    }

    /// False during a peak, within the rest window after one, or once high
    /// intensity has been held for half its limit.
    pub fn can_support_dramatic_moment(&self) -> bool {
        let just_peaked = self
            .time_since_peak
            .is_some_and(|t| t < self.config.min_rest_after_peak);
        let sustained_high = self.level == IntensityLevel::High
            && self.time_in_level > self.config.max_high_duration * 0.5;

        !(self.level == IntensityLevel::Peak || just_peaked || sustained_high)
    }

    /// Take the events produced since the last drain.
    pub fn drain_events(&mut self) -> Vec<DirectorEvent> {
        std::mem::take(&mut self.events)
    }

    /// Clear the history and all timers.
    pub fn reset(&mut self) {
        let config = self.config.clone();
        *self = Self::new(config);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn release_events(events: &[DirectorEvent]) -> Vec<f32> {
        events
            .iter()
            .filter_map(|event| match event {
                DirectorEvent::ReleaseNeeded { timestamp, .. } => Some(*timestamp),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_level_thresholds() {
        assert_eq!(IntensityLevel::from_intensity(0.0), IntensityLevel::Quiet);
        assert_eq!(IntensityLevel::from_intensity(0.2), IntensityLevel::Low);
        assert_eq!(IntensityLevel::from_intensity(0.45), IntensityLevel::Medium);
        assert_eq!(IntensityLevel::from_intensity(0.6), IntensityLevel::High);
        assert_eq!(IntensityLevel::from_intensity(0.95), IntensityLevel::Peak);
    }

    #[test]
    fn test_smoothing_approaches_input() {
        let mut rhythm = RhythmEngine::with_defaults();

        rhythm.update(1.0, 0.1);
        // alpha = 0.3 * 0.1 * 5 = 0.15
        assert!((rhythm.current_intensity() - 0.15).abs() < 0.001);

        for _ in 0..100 {
            rhythm.update(0.5, 0.1);
        }
        assert!((rhythm.current_intensity() - 0.5).abs() < 0.01);
    }

    #[test]
    fn test_peak_overrun_raises_release_once() {
        let config = RhythmConfig {
            smoothing: 1.0,
            max_peak_duration: 10.0,
            ..RhythmConfig::default()
        };
        let mut rhythm = RhythmEngine::new(config);
        let mut fired_at = Vec::new();

        for _ in 0..44 {
            rhythm.update(0.9, 0.25);
            fired_at.extend(release_events(&rhythm.drain_events()));
        }

        assert_eq!(fired_at, vec![10.0]);
    }

    #[test]
    fn test_peak_overrun_forces_rest() {
        let config = RhythmConfig {
            smoothing: 1.0,
            max_peak_duration: 2.0,
            ..RhythmConfig::default()
        };
        let mut rhythm = RhythmEngine::new(config);

        for _ in 0..8 {
            rhythm.update(1.0, 0.25);
        }
        assert!(rhythm.release_needed());
        assert!(rhythm.is_resting());

        rhythm.update(1.0, 0.25);
        assert!((rhythm.raw_intensity() - 0.3).abs() < 0.001);
        // Dropped to LOW, which clears the request.
        assert!(!rhythm.release_needed());
        assert!(!rhythm.can_support_dramatic_moment());
    }

    #[test]
    fn test_high_overrun_raises_release_without_rest() {
        let config = RhythmConfig {
            smoothing: 1.0,
            max_high_duration: 4.0,
            ..RhythmConfig::default()
        };
        let mut rhythm = RhythmEngine::new(config);

        for _ in 0..20 {
            rhythm.update(0.7, 0.25);
        }

        assert_eq!(rhythm.level(), IntensityLevel::High);
        assert!(rhythm.release_needed());
        assert!(!rhythm.is_resting());
    }

    #[test]
    fn test_leaving_peak_enters_rest() {
        let config = RhythmConfig {
            smoothing: 1.0,
            ..RhythmConfig::default()
        };
        let mut rhythm = RhythmEngine::new(config);

        rhythm.update(0.9, 0.25);
        assert_eq!(rhythm.level(), IntensityLevel::Peak);

        rhythm.update(0.5, 0.25);
        assert_eq!(rhythm.level(), IntensityLevel::Medium);
        assert!(rhythm.is_resting());
        assert_eq!(rhythm.time_since_peak(), Some(0.25));

        rhythm.update(0.5, 0.25);
        assert!((rhythm.raw_intensity() - 0.15).abs() < 0.001);
    }

    #[test]
    fn test_shot_duration_scales_with_pacing() {
        let mut rhythm = RhythmEngine::with_defaults();
        assert_eq!(rhythm.recommended_shot_duration(), 12.0);

        // Long quiet stretch: average 0 < target 0.4, cadence speeds up.
        for _ in 0..40 {
            rhythm.update(0.0, 0.5);
        }
        let factor = rhythm.pacing_factor();
        assert!((factor - 1.6).abs() < 0.001);
        assert!((rhythm.recommended_shot_duration() - 12.0 / 1.6).abs() < 0.001);
    }

    #[test]
    fn test_camera_speed_follows_level() {
        let config = RhythmConfig {
            smoothing: 1.0,
            ..RhythmConfig::default()
        };
        let mut rhythm = RhythmEngine::new(config);
        assert_eq!(rhythm.recommended_camera_speed(), 0.6);

        for (input, level, speed) in [
            (0.3, IntensityLevel::Low, 0.8),
            (0.5, IntensityLevel::Medium, 1.0),
            (0.7, IntensityLevel::High, 1.25),
            (0.9, IntensityLevel::Peak, 1.5),
        ] {
            rhythm.update(input, 0.25);
            assert_eq!(rhythm.level(), level);
            assert_eq!(rhythm.recommended_camera_speed(), speed);
        }
    }

    #[test]
    fn test_dramatic_moment_when_calm() {
        let mut rhythm = RhythmEngine::with_defaults();
        for _ in 0..10 {
            rhythm.update(0.1, 0.5);
        }

        assert!(rhythm.level().is_calm());
        assert_eq!(rhythm.time_since_peak(), None);
        assert!(rhythm.can_support_dramatic_moment());
    }

    #[test]
    fn test_dramatic_moment_blocked_by_sustained_high() {
        let config = RhythmConfig {
            smoothing: 1.0,
            max_high_duration: 4.0,
            ..RhythmConfig::default()
        };
        let mut rhythm = RhythmEngine::new(config);

        for _ in 0..4 {
            rhythm.update(0.7, 0.25);
        }
        assert_eq!(rhythm.level(), IntensityLevel::High);
        assert!(rhythm.can_support_dramatic_moment());

        // Past half the HIGH limit, before release is requested.
        for _ in 0..8 {
            rhythm.update(0.7, 0.25);
        }
        assert!(!rhythm.release_needed());
        assert!(!rhythm.can_support_dramatic_moment());
    }

    #[test]
    fn test_dramatic_moment_returns_after_rest() {
        let config = RhythmConfig {
            smoothing: 1.0,
            ..RhythmConfig::default()
        };
        let mut rhythm = RhythmEngine::new(config);

        rhythm.update(0.9, 0.25);
        assert!(!rhythm.can_support_dramatic_moment());

        for _ in 0..4 {
            rhythm.update(0.1, 0.25);
        }
        assert!(!rhythm.can_support_dramatic_moment());

        for _ in 0..24 {
            rhythm.update(0.1, 0.25);
        }
        assert!(rhythm.can_support_dramatic_moment());
    }

    #[test]
    fn test_cut_recommended_on_divergence() {
        let mut rhythm = RhythmEngine::with_defaults();
        for _ in 0..10 {
            rhythm.update(0.0, 0.1);
        }
        assert!(!rhythm.is_cut_recommended());

        rhythm.update(1.0, 0.1);
        assert!(rhythm.is_cut_recommended());
    }

    #[test]
    fn test_reset() {
        let mut rhythm = RhythmEngine::with_defaults();
        for _ in 0..10 {
            rhythm.update(0.9, 0.5);
        }
        rhythm.reset();

        assert_eq!(rhythm.current_intensity(), 0.0);
        assert_eq!(rhythm.level(), IntensityLevel::Quiet);
        assert!(rhythm.history().is_empty());
    }
}
