//! Operator model - the virtual person behind the camera.
//!
//! Fatigue builds over the session, stress follows what is on screen, and
//! together they bias how often and how badly the operator slips.

use descent_rules::{EnvironmentState, GameplayEvent, Vec3};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::f32::consts::TAU;
use tracing::debug;

use crate::config::OperatorConfig;
use crate::director::{ImperfectionRates, ImperfectionType};
use crate::events::DirectorEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperatorState {
    Alert,
    Focused,
    #[default]
    Routine,
    Fatigued,
    Stressed,
}

impl OperatorState {
    /// Multiplier applied to base imperfection rates.
    pub fn rate_multiplier(self) -> f32 {
        match self {
            OperatorState::Alert => 0.5,
            OperatorState::Focused => 0.3,
            OperatorState::Routine => 1.0,
            OperatorState::Fatigued => 1.5,
            OperatorState::Stressed => 1.2,
        }
    }
}

impl std::fmt::Display for OperatorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            OperatorState::Alert => "ALERT",
            OperatorState::Focused => "FOCUSED",
            OperatorState::Routine => "ROUTINE",
            OperatorState::Fatigued => "FATIGUED",
            OperatorState::Stressed => "STRESSED",
        };
        f.write_str(name)
    }
}

pub struct OperatorModel {
    config: OperatorConfig,
    session_time: f32,

    fatigue: f32,
    stress: f32,
    state: OperatorState,
    environment: EnvironmentState,

    drift_phase: f32,
    drift_walk: Vec3,
    drift_offset: Vec3,

    /// `None` until the first ambient interval is drawn.
    ambient_timer: Option<f32>,
    recent_ambient: VecDeque<ImperfectionType>,

    events: Vec<DirectorEvent>,
}

impl OperatorModel {
    /// Create a rested operator at the start of a session.
    pub fn new(config: OperatorConfig) -> Self {
        let mut model = Self {
            config,
            session_time: 0.0,
            fatigue: 0.0,
            stress: 0.0,
            state: OperatorState::Routine,
            environment: EnvironmentState::default(),
            drift_phase: 0.0,
            drift_walk: Vec3::ZERO,
            drift_offset: Vec3::ZERO,
            ambient_timer: None,
            recent_ambient: VecDeque::new(),
            events: Vec::new(),
        };
        model.state = model.derive_state();
        model
    }

    /// Create an operator with the default configuration.
    pub fn with_defaults() -> Self {
        Self::new(OperatorConfig::default())
    }

    /// Advance one tick. Returns an ambient imperfection when its timer runs
    /// out. MISS is never chosen while `fatal_active` is set.
    pub fn update<R: Rng + ?Sized>(
        &mut self,
        intensity: f32,
        fatal_active: bool,
        dt: f32,
        rng: &mut R,
    ) -> Option<ImperfectionType> {
        let dt = dt.max(0.0);
        self.session_time += dt;

        let exposure = 1.0
            + self.environment.cold_exposure() * self.config.cold_fatigue_gain
            + self.environment.wind_exposure() * self.config.wind_fatigue_gain;
        self.fatigue = (self.fatigue + self.config.fatigue_rate * exposure * dt).clamp(0.0, 1.0);

        let mut stress = self.stress - self.config.stress_decay * dt;
        let excess = intensity.clamp(0.0, 1.0) - self.config.stress_intensity_threshold;
        if excess > 0.0 {
            stress += self.config.stress_gain * excess * dt;
        }
        self.stress = stress.clamp(0.0, 1.0);

        self.refresh_state();
        self.update_drift(dt, rng);
        self.tick_ambient(fatal_active, dt, rng)
    }

    /// React to a gameplay event: sudden events spike stress, weather
    /// changes feed the fatigue rate.
    pub fn observe(&mut self, event: &GameplayEvent) {
        if let GameplayEvent::WeatherChanged { environment } = event {
            self.environment = *environment;
        }

        let suddenness = event.suddenness();
        if suddenness > 0.0 {
            self.set_stress(self.stress + suddenness * self.config.event_stress_spike);
        }
    }

    /// Update the cold and wind exposure that speeds up fatigue.
    pub fn set_environment(&mut self, environment: EnvironmentState) {
        self.environment = environment;
    }

    /// Override fatigue (clamped) and re-derive the state.
    pub fn set_fatigue(&mut self, fatigue: f32) {
        self.fatigue = fatigue.clamp(0.0, 1.0);
        self.refresh_state();
    }

    /// Override stress (clamped) and re-derive the state.
    pub fn set_stress(&mut self, stress: f32) {
        self.stress = stress.clamp(0.0, 1.0);
        self.refresh_state();
    }

    /// Base rates scaled by the state multiplier only.
    pub fn state_adjusted_rates(&self, base: ImperfectionRates) -> ImperfectionRates {
        base.scaled(self.state.rate_multiplier())
    }

    /// Base rates after state, skill and fatigue, in that order.
    pub fn imperfection_rates(&self, base: ImperfectionRates) -> ImperfectionRates {
        let skill = 1.0 - self.config.skill_level.clamp(0.0, 1.0) * self.config.skill_reduction;
        let tiredness = 1.0 + self.fatigue * self.config.fatigue_amplification;
        self.state_adjusted_rates(base).scaled(skill * tiredness)
    }

    /// Clear fatigue, stress and timers for a fresh run.
    pub fn reset(&mut self) {
        let config = self.config.clone();
        *self = Self::new(config);
    }

    fn derive_state(&self) -> OperatorState {
        let config = &self.config;
        if self.stress > 0.7 {
            OperatorState::Stressed
        } else if self.fatigue < 0.1 && self.session_time < config.early_session {
            OperatorState::Alert
        } else if self.fatigue > 0.6 {
            OperatorState::Fatigued
        } else if self.session_time > config.long_session && self.stress < 0.3 && self.fatigue < 0.4 {
            OperatorState::Focused
        } else {
            OperatorState::Routine
        }
    }

    fn refresh_state(&mut self) {
        let state = self.derive_state();
        if state != self.state {
            debug!(from = %self.state, to = %state, fatigue = self.fatigue, stress = self.stress, "operator state changed");
            self.events.push(DirectorEvent::OperatorStateChanged {
                from: self.state,
                to: state,
                timestamp: self.session_time,
            });
            self.state = state;
        }
    }

    fn update_drift<R: Rng + ?Sized>(&mut self, dt: f32, rng: &mut R) {
        let config = &self.config;
        let amplitude = config.drift_base + self.fatigue * config.drift_fatigue_gain;

        self.drift_phase = (self.drift_phase + dt * config.drift_frequency * TAU) % TAU;

        let retention = config.drift_walk_retention.clamp(0.0, 1.0).powf(dt);
        let step = config.drift_walk_rate * dt;
        self.drift_walk = Vec3::new(
            self.drift_walk.x * retention + rng.random_range(-1.0_f32..=1.0) * step,
            self.drift_walk.y * retention + rng.random_range(-1.0_f32..=1.0) * step,
            self.drift_walk.z * retention + rng.random_range(-1.0_f32..=1.0) * step,
        );

        let sway = Vec3::new(
            self.drift_phase.sin(),
            (self.drift_phase * 0.7).cos() * 0.5,
            0.0,
        );
        self.drift_offset = (sway + self.drift_walk) * amplitude;
    }

    fn tick_ambient<R: Rng + ?Sized>(
        &mut self,
        fatal_active: bool,
        dt: f32,
        rng: &mut R,
    ) -> Option<ImperfectionType> {
        let remaining = match self.ambient_timer {
            Some(timer) => timer - dt,
            None => {
                self.ambient_timer = Some(self.next_ambient_interval(rng));
                return None;
            }
        };

        if remaining > 0.0 {
            self.ambient_timer = Some(remaining);
            return None;
        }

        self.ambient_timer = Some(self.next_ambient_interval(rng));
        let kind = self.choose_ambient(fatal_active, rng)?;

        self.recent_ambient.push_back(kind);
        while self.recent_ambient.len() > self.config.no_repeat_memory {
            self.recent_ambient.pop_front();
        }
        Some(kind)
    }

    fn next_ambient_interval<R: Rng + ?Sized>(&self, rng: &mut R) -> f32 {
        let compression = 1.0 - self.fatigue * self.config.ambient_compression;
        (self.config.ambient_interval.sample(rng) * compression.clamp(0.1, 1.0)).max(0.1)
    }

    /// Relative odds of each ambient mistake.
    pub fn ambient_weight(&self, kind: ImperfectionType) -> f32 {
        match kind {
            ImperfectionType::Miss => 0.5 + self.stress,
            ImperfectionType::Late => 1.0 + self.fatigue,
            ImperfectionType::Hesitate => 0.5 + 1.5 * self.stress,
            ImperfectionType::Overcorrect => 0.5 + self.stress,
            ImperfectionType::Drift => 1.0 + 2.0 * self.fatigue,
            ImperfectionType::Reframe => 1.0,
        }
    }

    fn choose_ambient<R: Rng + ?Sized>(&self, fatal_active: bool, rng: &mut R) -> Option<ImperfectionType> {
        let candidates: Vec<(ImperfectionType, f32)> = ImperfectionType::ALL
            .into_iter()
            .filter(|kind| !self.recent_ambient.contains(kind))
            .filter(|kind| !(fatal_active && *kind == ImperfectionType::Miss))
            .map(|kind| (kind, self.ambient_weight(kind)))
            .collect();

        let total: f32 = candidates.iter().map(|(_, weight)| weight).sum();
        if candidates.is_empty() || total <= 0.0 {
            return None;
        }

        let mut roll = rng.random::<f32>() * total;
        for (kind, weight) in &candidates {
            if roll < *weight {
                return Some(*kind);
            }
            roll -= weight;
        }
        candidates.last().map(|(kind, _)| *kind)
    }

    /// Current fatigue in [0, 1].
    pub fn fatigue(&self) -> f32 {
        self.fatigue
    }

    /// Current stress in [0, 1].
    pub fn stress(&self) -> f32 {
        self.stress
    }

    /// Current derived operator state.
    pub fn state(&self) -> OperatorState {
        self.state
    }

    /// Seconds since the session started.
    pub fn session_time(&self) -> f32 {
        self.session_time
    }

    /// Positional wobble for the rig to add to its framing.
    pub fn drift_offset(&self) -> Vec3 {
        self.drift_offset
    }

    /// Seconds until the next ambient imperfection, once armed.
    pub fn ambient_timer(&self) -> Option<f32> {
        self.ambient_timer
    }

    /// Take the events produced since the last drain.
    pub fn drain_events(&mut self) -> Vec<DirectorEvent> {
        std::mem::take(&mut self.events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use descent_rules::Weather;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_starts_alert() {
        let operator = OperatorModel::with_defaults();
        assert_eq!(operator.state(), OperatorState::Alert);
    }

    #[test]
    fn test_state_precedence() {
        let mut operator = OperatorModel::with_defaults();

        operator.set_fatigue(0.65);
        assert_eq!(operator.state(), OperatorState::Fatigued);

        operator.set_stress(0.8);
        assert_eq!(operator.state(), OperatorState::Stressed);

        operator.set_stress(0.0);
        operator.set_fatigue(0.3);
        assert_eq!(operator.state(), OperatorState::Routine);
    }

    #[test]
    fn test_focused_in_long_calm_session() {
        let config = OperatorConfig {
            long_session: 5.0,
            fatigue_rate: 0.0,
            ..OperatorConfig::default()
        };
        let mut operator = OperatorModel::new(config);
        operator.set_fatigue(0.2);
        let mut rng = ChaCha8Rng::seed_from_u64(3);

        for _ in 0..60 {
            operator.update(0.1, false, 0.1, &mut rng);
        }
        assert_eq!(operator.state(), OperatorState::Focused);
    }

    #[test]
    fn test_rates_apply_state_first() {
        let mut operator = OperatorModel::with_defaults();
        operator.set_fatigue(0.65);
        let base = ImperfectionRates::new(0.1, 0.2, 0.1);

        let adjusted = operator.state_adjusted_rates(base);
        assert!((adjusted.miss - 0.15).abs() < 0.0001);
        assert!((adjusted.late - 0.3).abs() < 0.0001);

        // skill 0.5 * 0.6 => x0.7, fatigue 0.65 * 0.8 => x1.52
        let full = operator.imperfection_rates(base);
        assert!((full.miss - 0.15 * 0.7 * 1.52).abs() < 0.0001);
    }

    #[test]
    fn test_cold_and_wind_speed_up_fatigue() {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let mut sheltered = OperatorModel::with_defaults();
        let mut exposed = OperatorModel::with_defaults();
        exposed.set_environment(EnvironmentState {
            weather: Weather::Storm,
            temperature: -15.0,
            wind_speed: 20.0,
            visibility: 0.2,
        });

        for _ in 0..100 {
            sheltered.update(0.0, false, 1.0, &mut rng);
            exposed.update(0.0, false, 1.0, &mut rng);
        }

        assert!(exposed.fatigue() > sheltered.fatigue() * 2.0);
        assert!(exposed.fatigue() <= 1.0);
    }

    #[test]
    fn test_stress_spikes_and_decays() {
        let mut operator = OperatorModel::with_defaults();
        let mut rng = ChaCha8Rng::seed_from_u64(5);

        operator.observe(&GameplayEvent::SlideStarted { speed: 6.0 });
        let spiked = operator.stress();
        assert!(spiked > 0.3);

        for _ in 0..20 {
            operator.update(0.0, false, 0.5, &mut rng);
        }
        assert!(operator.stress() < spiked);
        assert!(operator.stress() >= 0.0);
    }

    #[test]
    fn test_ambient_imperfections_fire_without_repeats() {
        let mut operator = OperatorModel::with_defaults();
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let mut fired = Vec::new();

        for _ in 0..(600 * 4) {
            if let Some(kind) = operator.update(0.2, false, 0.25, &mut rng) {
                fired.push(kind);
            }
        }

        assert!(fired.len() >= 10);
        for window in fired.windows(4) {
            assert!(!window[1..].contains(&window[0]));
        }
    }

    #[test]
    fn test_no_ambient_miss_during_fatal() {
        let mut operator = OperatorModel::with_defaults();
        operator.set_stress(0.9);
        let mut rng = ChaCha8Rng::seed_from_u64(9);

        for _ in 0..(600 * 4) {
            let kind = operator.update(0.9, true, 0.25, &mut rng);
            assert_ne!(kind, Some(ImperfectionType::Miss));
        }
    }

    #[test]
    fn test_drift_grows_with_fatigue() {
        let mut rng = ChaCha8Rng::seed_from_u64(21);
        let mut fresh = OperatorModel::with_defaults();
        let mut tired = OperatorModel::with_defaults();
        tired.set_fatigue(1.0);

        let mut fresh_peak: f32 = 0.0;
        let mut tired_peak: f32 = 0.0;
        for _ in 0..200 {
            fresh.update(0.0, false, 0.1, &mut rng);
            tired.update(0.0, false, 0.1, &mut rng);
            fresh_peak = fresh_peak.max(fresh.drift_offset().length());
            tired_peak = tired_peak.max(tired.drift_offset().length());
        }

        assert!(tired_peak > fresh_peak);
    }
}
