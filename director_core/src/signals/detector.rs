//! Signal detector - turns gameplay events into decaying, weighted signals.

use descent_rules::{FatalPhase, GameplayEvent, MovementState, Posture, Vec3};
use tracing::{debug, trace};

use super::{Signal, SignalType, SignalWeights};
use crate::config::SignalConfig;
use crate::events::DirectorEvent;

/// A continuous value sampled by the game. Changes are measured against a
/// reference that moves only when a change is reported.
#[derive(Debug, Clone, Copy, Default)]
struct SampledChannel {
    reference: Option<f32>,
    latest: Option<f32>,
}

impl SampledChannel {
    fn sample(&mut self, value: f32) {
        self.latest = Some(value);
    }

    /// Returns the change since the reference if it reaches `threshold`,
    /// re-basing the reference when it does.
    fn take_delta(&mut self, threshold: f32) -> Option<f32> {
        let latest = self.latest?;
        let Some(reference) = self.reference else {
            self.reference = Some(latest);
            return None;
        };

        let delta = latest - reference;
        if delta.abs() >= threshold {
            self.reference = Some(latest);
            Some(delta)
        } else {
            None
        }
    }
}

/// A change of `threshold * CONTINUOUS_FULL_SCALE` maps to full intensity.
const CONTINUOUS_FULL_SCALE: f32 = 4.0;

/// Owns every active signal and the accumulated intensity.
pub struct SignalDetector {
    config: SignalConfig,
    weights: SignalWeights,

    /// One slot per signal type.
    active: [Option<Signal>; SignalType::COUNT],

    clock: f32,
    raw_total: f32,
    published_total: f32,
    quiet_time: f32,
    position: Vec3,

    speed: SampledChannel,
    slope: SampledChannel,
    body_fatigue: f32,
    fatigue_thresholds_crossed: usize,

    events: Vec<DirectorEvent>,
}

impl SignalDetector {
    pub fn new(config: SignalConfig) -> Self {
        let weights = config.weight_table();
        let mut thresholds = config.fatigue_thresholds.clone();
        thresholds.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        Self {
            config: SignalConfig {
                fatigue_thresholds: thresholds,
                ..config
            },
            weights,
            active: [None; SignalType::COUNT],
            clock: 0.0,
            raw_total: 0.0,
            published_total: 0.0,
            quiet_time: 0.0,
            position: Vec3::ZERO,
            speed: SampledChannel::default(),
            slope: SampledChannel::default(),
            body_fatigue: 0.0,
            fatigue_thresholds_crossed: 0,
            events: Vec::new(),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(SignalConfig::default())
    }

    /// Emit a signal. An existing signal of the same type keeps the stronger
    /// intensity and gets a fresh timestamp.
    pub fn emit(&mut self, signal_type: SignalType, intensity: f32, sustained: bool) {
        let mut signal = Signal::new(signal_type, intensity, self.clock).with_position(self.position);
        if sustained {
            signal = signal.sustained();
        }

        let slot = &mut self.active[signal_type.index()];
        match slot {
            Some(existing) => existing.merge(&signal),
            None => {
                if signal.intensity < self.config.min_intensity {
                    return;
                }
                debug!(signal = %signal_type, intensity = signal.intensity, sustained, "signal raised");
                *slot = Some(signal);
                self.events.push(DirectorEvent::SignalRaised {
                    signal_type,
                    intensity: signal.intensity,
                    timestamp: self.clock,
                });
            }
        }

        self.recompute_total();
    }

    /// Remove a signal regardless of intensity. Returns it if it was active.
    pub fn clear(&mut self, signal_type: SignalType) -> Option<Signal> {
        let removed = self.active[signal_type.index()].take();
        if removed.is_some() {
            self.notify_cleared(signal_type);
            self.recompute_total();
        }
        removed
    }

    /// Advance by one tick: decay, prune, run continuous detectors and the
    /// quiet-time accumulator.
    pub fn update(&mut self, dt: f32) {
        let dt = dt.max(0.0);
        self.clock += dt;

        let decay = self.config.decay_rate * dt;
        for signal_type in SignalType::ALL {
            let slot = &mut self.active[signal_type.index()];
            let Some(signal) = slot else { continue };

            signal.decay(decay);
            if signal.intensity < self.config.min_intensity {
                *slot = None;
                self.notify_cleared(signal_type);
            }
        }

        self.run_continuous_detectors();
        self.recompute_total();
        self.update_quiet_time(dt);

        trace!(total = self.published_total, raw = self.raw_total, "signal detector tick");
    }

    /// Translate a gameplay event into signals.
    pub fn observe(&mut self, event: &GameplayEvent) {
        match event {
            GameplayEvent::MovementStateChanged { to, .. } => match to {
                MovementState::Falling => self.emit(SignalType::StabilityLoss, 0.9, false),
                MovementState::Arresting => self.emit(SignalType::StabilityLoss, 0.6, false),
                MovementState::Rappelling => self.emit(SignalType::RopeEvent, 0.3, false),
                _ => {}
            },
            GameplayEvent::SlopeSampled { angle } => self.slope.sample(*angle),
            GameplayEvent::SpeedSampled { speed } => self.speed.sample(*speed),
            GameplayEvent::StabilityChanged { stability } => {
                if *stability < 0.5 {
                    self.emit(SignalType::StabilityLoss, 1.0 - stability, false);
                }
            }
            GameplayEvent::PostureChanged { posture } => {
                // Turning in to face the slope means the ground got steep.
                if *posture == Posture::FacingIn {
                    self.emit(SignalType::SlopeChange, 0.35, false);
                }
            }
            GameplayEvent::MicroSlip { severity } => {
                self.emit(SignalType::MicroSlip, *severity, false)
            }
            GameplayEvent::SlideStarted { .. } => self.emit(SignalType::SlideEntry, 1.0, true),
            GameplayEvent::SlideEnded { outcome } => {
                self.clear(SignalType::SlideEntry);
                self.emit(SignalType::SlideExit, outcome.severity(), false);
            }
            GameplayEvent::TerrainZoneChanged { to, .. } => {
                self.emit(SignalType::TerrainTransition, 0.2 + to.hazard() * 0.5, false)
            }
            GameplayEvent::CliffProximityChanged { distance } => {
                let intensity = match distance {
                    Some(d) if *d < self.config.cliff_range => 1.0 - d.max(0.0) / self.config.cliff_range,
                    _ => 0.0,
                };
                self.set_sustained_level(SignalType::CliffProximity, intensity);
            }
            GameplayEvent::FatigueThresholdCrossed { threshold } => {
                self.emit(SignalType::FatigueSpike, *threshold, false)
            }
            GameplayEvent::FatigueSampled { fatigue } => {
                self.body_fatigue = fatigue.clamp(0.0, 1.0)
            }
            GameplayEvent::Injured { severity } => {
                self.emit(SignalType::Injury, severity.intensity(), false)
            }
            GameplayEvent::WeatherChanged { environment } => {
                let harshness = environment.cold_exposure().max(environment.wind_exposure());
                self.emit(SignalType::WeatherShift, 0.2 + harshness * 0.5, false);
            }
            GameplayEvent::TimeMilestone { .. } => self.emit(SignalType::TimeMilestone, 0.3, false),
            GameplayEvent::Rope { action } => {
                self.emit(SignalType::RopeEvent, action.intensity(), false)
            }
            GameplayEvent::AnchorPlaced { quality } => {
                if *quality < 0.6 {
                    self.emit(SignalType::AnchorConcern, 1.0 - quality, false);
                }
            }
            GameplayEvent::RiskLevelChanged { to, .. } => {
                self.set_sustained_level(SignalType::RiskEscalation, to.intensity())
            }
            GameplayEvent::PointOfNoReturn => self.emit(SignalType::PointOfNoReturn, 0.9, false),
            GameplayEvent::FatalEventPhase { phase } => match phase {
                FatalPhase::Aftermath => {
                    self.clear(SignalType::FatalMoment);
                }
                _ => self.emit(SignalType::FatalMoment, 1.0, true),
            },
            GameplayEvent::SubjectMoved { position } => self.position = *position,
        }
    }

    /// Published total intensity (changes in steps larger than the hysteresis).
    pub fn total_intensity(&self) -> f32 {
        self.published_total
    }

    /// Exact weighted sum, before hysteresis.
    pub fn raw_intensity(&self) -> f32 {
        self.raw_total
    }

    pub fn signal(&self, signal_type: SignalType) -> Option<&Signal> {
        self.active[signal_type.index()].as_ref()
    }

    pub fn is_active(&self, signal_type: SignalType) -> bool {
        self.active[signal_type.index()].is_some()
    }

    pub fn active_signals(&self) -> impl Iterator<Item = &Signal> {
        self.active.iter().flatten()
    }

    pub fn active_count(&self) -> usize {
        self.active_signals().count()
    }

    /// Seconds total intensity has stayed below the quiet threshold.
    pub fn quiet_time(&self) -> f32 {
        self.quiet_time
    }

    pub fn clock(&self) -> f32 {
        self.clock
    }

    pub fn drain_events(&mut self) -> Vec<DirectorEvent> {
        std::mem::take(&mut self.events)
    }

    /// Forget every signal and sample.
    pub fn reset(&mut self) {
        let config = self.config.clone();
        *self = Self::new(config);
    }

    /// Set a sustained signal that mirrors a continuous game state. Unlike
    /// [`emit`](Self::emit) the level may go down; zero clears it.
    fn set_sustained_level(&mut self, signal_type: SignalType, intensity: f32) {
        let intensity = intensity.clamp(0.0, 1.0);
        if intensity < self.config.min_intensity {
            self.clear(signal_type);
            return;
        }

        if let Some(existing) = &mut self.active[signal_type.index()] {
            existing.intensity = intensity;
            existing.timestamp = self.clock;
            existing.source_position = self.position;
            existing.sustained = true;
            self.recompute_total();
        } else {
            self.emit(signal_type, intensity, true);
        }
    }

    fn run_continuous_detectors(&mut self) {
        if let Some(delta) = self.speed.take_delta(self.config.speed_delta_threshold) {
            let intensity =
                delta.abs() / (self.config.speed_delta_threshold * CONTINUOUS_FULL_SCALE);
            self.emit(SignalType::SpeedChange, intensity, false);
        }

        if let Some(delta) = self.slope.take_delta(self.config.slope_delta_threshold) {
            let intensity =
                delta.abs() / (self.config.slope_delta_threshold * CONTINUOUS_FULL_SCALE);
            self.emit(SignalType::SlopeChange, intensity, false);
        }

        let crossed = self
            .config
            .fatigue_thresholds
            .iter()
            .filter(|threshold| self.body_fatigue >= **threshold)
            .count();
        if crossed > self.fatigue_thresholds_crossed {
            let threshold = self.config.fatigue_thresholds[crossed - 1];
            self.emit(SignalType::FatigueSpike, threshold, false);
        }
        self.fatigue_thresholds_crossed = crossed;
    }

    fn update_quiet_time(&mut self, dt: f32) {
        if self.published_total < self.config.quiet_threshold {
            self.quiet_time += dt;
            if self.quiet_time >= self.config.quiet_duration {
                debug!(quiet_for = self.quiet_time, "quiet stretch, injecting isolation");
                self.emit(SignalType::Isolation, self.config.isolation_intensity, true);
                self.quiet_time = 0.0;
            }
        } else {
            self.quiet_time = 0.0;
            if self.is_active(SignalType::Isolation) {
                self.clear(SignalType::Isolation);
            }
        }
    }

    fn recompute_total(&mut self) {
        let sum: f32 = self
            .active_signals()
            .map(|signal| signal.intensity * self.weights.get(signal.signal_type))
            .sum();
        self.raw_total = sum.clamp(0.0, 1.0);

        let emptied = self.active_count() == 0 && self.published_total != 0.0;
        let moved = (self.raw_total - self.published_total).abs() > self.config.publish_hysteresis;
        if emptied || moved {
            self.published_total = self.raw_total;
            self.events.push(DirectorEvent::IntensityUpdated {
                total: self.published_total,
                timestamp: self.clock,
            });
        }
    }

    fn notify_cleared(&mut self, signal_type: SignalType) {
        debug!(signal = %signal_type, "signal cleared");
        self.events.push(DirectorEvent::SignalCleared {
            signal_type,
            timestamp: self.clock,
        });
    }
}
