//! Cinematographer - owns the pipeline for one descent.
//!
//! Routes gameplay events, runs the fixed-order tick
//! (detector, rhythm, selector, operator, director) with one delta time, and
//! manages the run lifecycle and its seeded random source. Outside a descent
//! every query degrades to zero intensity and CONTEXT, and no rig command is
//! issued.

use descent_rules::{GameplayEvent, PhaseTransition, RunId, RunPhase, RunState};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info};

use crate::camera::CameraRig;
use crate::config::CinematographyConfig;
use crate::director::{DecisionLogEntry, Director, EventKind};
use crate::events::DirectorEvent;
use crate::intent::{forced_intent_for_event, forced_intent_for_signal, IntentSelector, ShotIntent};
use crate::operator::OperatorModel;
use crate::rhythm::RhythmEngine;
use crate::signals::{SignalDetector, SignalType};

pub struct Cinematographer {
    config: CinematographyConfig,
    run: RunState,
    run_id: RunId,
    seed: u64,
    rng: ChaCha8Rng,

    detector: SignalDetector,
    rhythm: RhythmEngine,
    selector: IntentSelector,
    operator: OperatorModel,
    director: Director,

    /// Decision log of the last run ended through a phase change.
    finished_log: Vec<DecisionLogEntry>,
    events: Vec<DirectorEvent>,
}

impl Cinematographer {
    pub fn new(config: CinematographyConfig) -> Self {
        Self {
            detector: SignalDetector::new(config.signals.clone()),
            rhythm: RhythmEngine::new(config.rhythm.clone()),
            selector: IntentSelector::new(config.intent.clone()),
            operator: OperatorModel::new(config.operator.clone()),
            director: Director::new(config.director.clone()),
            config,
            run: RunState::new(),
            run_id: RunId::nil(),
            seed: 0,
            rng: ChaCha8Rng::seed_from_u64(0),
            finished_log: Vec::new(),
            events: Vec::new(),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(CinematographyConfig::default())
    }

    /// Begin a fresh descent and frame the opening shot. The seed is the
    /// explicit one, else the configured one, else derived from the new run
    /// id. Returns the seed used.
    pub fn start_descent(&mut self, seed: Option<u64>, rig: &mut dyn CameraRig) -> u64 {
        self.run = RunState::new();
        self.run.transition(RunPhase::Descent);
        self.begin_run(seed, rig);
        self.seed
    }

    /// Cancel the descent: pending imperfections are dropped, the operator is
    /// rested and the decision log is returned.
    pub fn end_descent(&mut self) -> Vec<DecisionLogEntry> {
        if self.run.phase.is_descent() || self.run.phase == RunPhase::Paused {
            self.run.transition(RunPhase::Completed);
        }
        self.finish_run()
    }

    /// Follow the game's phase. Starting, ending and pausing a descent are
    /// derived from the transition.
    pub fn set_phase(&mut self, phase: RunPhase, rig: &mut dyn CameraRig) -> PhaseTransition {
        let transition = self.run.transition(phase);
        match transition {
            PhaseTransition::DescentStarted => self.begin_run(None, rig),
            PhaseTransition::DescentEnded | PhaseTransition::ReturnedToMenu => {
                if self.director.is_active() {
                    self.finished_log = self.finish_run();
                }
            }
            PhaseTransition::Suspended | PhaseTransition::Resumed => {
                debug!(?transition, "descent suspended or resumed");
            }
            PhaseTransition::Unchanged => {}
        }
        transition
    }

    /// Whether the pipeline is running (descending and not paused).
    pub fn is_active(&self) -> bool {
        self.director.is_active() && self.run.phase.is_descent()
    }

    pub fn handle_event(&mut self, event: &GameplayEvent, rig: &mut dyn CameraRig) {
        if !self.is_active() {
            return;
        }

        match event {
            GameplayEvent::SubjectMoved { position } => {
                self.run.subject_position = *position;
                self.director.set_subject_position(*position);
            }
            GameplayEvent::WeatherChanged { environment } => self.run.environment = *environment,
            _ => {}
        }

        self.detector.observe(event);
        self.operator.observe(event);

        if let Some(intent) = forced_intent_for_event(event) {
            self.director
                .force_intent(&mut self.selector, intent, event.name(), rig);
        }
        if let Some(kind) = EventKind::classify(event) {
            self.director
                .check_imperfection(kind, &self.operator, &mut self.rng);
        }

        self.collect_events();
    }

    /// Emit a signal directly. Signals tied to discrete moments force their
    /// intent and run an imperfection check, as the matching events do.
    pub fn emit_signal(
        &mut self,
        signal_type: SignalType,
        intensity: f32,
        sustained: bool,
        rig: &mut dyn CameraRig,
    ) {
        if !self.is_active() {
            return;
        }

        self.detector.emit(signal_type, intensity, sustained);

        if let Some(intent) = forced_intent_for_signal(signal_type) {
            self.director
                .force_intent(&mut self.selector, intent, signal_type.as_str(), rig);
        }
        if let Some(kind) = EventKind::for_signal(signal_type) {
            self.director
                .check_imperfection(kind, &self.operator, &mut self.rng);
        }

        self.collect_events();
    }

    pub fn clear_signal(&mut self, signal_type: SignalType) {
        if !self.is_active() {
            return;
        }
        self.detector.clear(signal_type);
        self.collect_events();
    }

    /// Scripted override of the intent, cut immediately.
    pub fn force_intent(&mut self, intent: ShotIntent, reason: &str, rig: &mut dyn CameraRig) {
        if !self.is_active() {
            return;
        }
        self.director
            .force_intent(&mut self.selector, intent, reason, rig);
        self.collect_events();
    }

    pub fn begin_sequence(&mut self, duration: Option<f32>, reason: &str) {
        self.director.begin_sequence(duration, reason);
        self.collect_events();
    }

    pub fn end_sequence(&mut self) {
        self.director.end_sequence();
        self.collect_events();
    }

    /// One frame: detector, rhythm, selector, operator, director.
    pub fn tick(&mut self, dt: f32, rig: &mut dyn CameraRig) {
        if !self.is_active() {
            return;
        }
        let dt = dt.max(0.0);
        self.run.advance(dt);

        self.detector.update(dt);
        let total = self.detector.total_intensity();

        self.rhythm.update(total, dt);
        self.selector
            .update(total, self.rhythm.release_needed(), dt);

        let fatal_active = self.detector.is_active(SignalType::FatalMoment);
        let ambient = self.operator.update(
            self.rhythm.current_intensity(),
            fatal_active,
            dt,
            &mut self.rng,
        );

        self.director.update(
            dt,
            fatal_active,
            &self.rhythm,
            &self.selector,
            &self.operator,
            &mut self.rng,
            rig,
        );
        if let Some(kind) = ambient {
            self.director
                .schedule_ambient(kind, fatal_active, &mut self.rng);
        }

        self.collect_events();
    }

    pub fn total_intensity(&self) -> f32 {
        if self.is_active() {
            self.detector.total_intensity()
        } else {
            0.0
        }
    }

    pub fn current_intent(&self) -> ShotIntent {
        if self.is_active() {
            self.selector.current()
        } else {
            ShotIntent::Context
        }
    }

    pub fn drain_events(&mut self) -> Vec<DirectorEvent> {
        std::mem::take(&mut self.events)
    }

    /// Decision log of the last run ended by [`set_phase`](Self::set_phase).
    pub fn take_finished_log(&mut self) -> Vec<DecisionLogEntry> {
        std::mem::take(&mut self.finished_log)
    }

    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn run_state(&self) -> &RunState {
        &self.run
    }

    pub fn config(&self) -> &CinematographyConfig {
        &self.config
    }

    pub fn detector(&self) -> &SignalDetector {
        &self.detector
    }

    pub fn rhythm(&self) -> &RhythmEngine {
        &self.rhythm
    }

    pub fn selector(&self) -> &IntentSelector {
        &self.selector
    }

    pub fn operator(&self) -> &OperatorModel {
        &self.operator
    }

    pub fn operator_mut(&mut self) -> &mut OperatorModel {
        &mut self.operator
    }

    pub fn director(&self) -> &Director {
        &self.director
    }

    fn begin_run(&mut self, seed: Option<u64>, rig: &mut dyn CameraRig) {
        self.run_id = RunId::new();
        self.seed = seed
            .or(self.config.seed)
            .unwrap_or_else(|| self.run_id.to_seed());
        self.rng = ChaCha8Rng::seed_from_u64(self.seed);

        self.detector.reset();
        self.rhythm.reset();
        self.selector.reset();
        self.operator.reset();
        self.events.clear();
        self.director.activate(rig);

        info!(run_id = %self.run_id, seed = self.seed, "descent started");
        self.collect_events();
    }

    fn finish_run(&mut self) -> Vec<DecisionLogEntry> {
        let log = self.director.deactivate();
        self.operator.reset();
        self.detector.reset();
        self.rhythm.reset();
        self.selector.reset();
        self.collect_events();

        info!(run_id = %self.run_id, decisions = log.len(), "descent ended");
        log
    }

    fn collect_events(&mut self) {
        self.events.extend(self.detector.drain_events());
        self.events.extend(self.rhythm.drain_events());
        self.events.extend(self.selector.drain_events());
        self.events.extend(self.operator.drain_events());
        self.events.extend(self.director.drain_events());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{CameraCommand, RecordingRig};
    use crate::director::ImperfectionType;
    use crate::events::events_to_json_lines;
    use crate::operator::OperatorState;
    use descent_rules::{FatalPhase, SlideOutcome, Vec3};

    fn started(config: CinematographyConfig, seed: u64) -> (Cinematographer, RecordingRig) {
        let mut cinematographer = Cinematographer::new(config);
        let mut rig = RecordingRig::new();
        cinematographer.start_descent(Some(seed), &mut rig);
        (cinematographer, rig)
    }

    #[test]
    fn test_degraded_before_descent() {
        let mut cinematographer = Cinematographer::with_defaults();
        let mut rig = RecordingRig::new();

        cinematographer.emit_signal(SignalType::Injury, 1.0, false, &mut rig);
        cinematographer.handle_event(&GameplayEvent::SlideStarted { speed: 4.0 }, &mut rig);
        for _ in 0..20 {
            cinematographer.tick(0.1, &mut rig);
        }

        assert!(!cinematographer.is_active());
        assert_eq!(cinematographer.total_intensity(), 0.0);
        assert_eq!(cinematographer.current_intent(), ShotIntent::Context);
        assert!(rig.commands().is_empty());
        assert!(cinematographer.drain_events().is_empty());
    }

    #[test]
    fn test_start_frames_opening_shot() {
        let (mut cinematographer, rig) = started(CinematographyConfig::default(), 1);

        assert!(cinematographer.is_active());
        assert_eq!(cinematographer.seed(), 1);
        assert_eq!(rig.intents(), vec![ShotIntent::Context]);

        let events = cinematographer.drain_events();
        assert!(events
            .iter()
            .any(|e| matches!(e, DirectorEvent::ShotStarted { shot: 1, .. })));
    }

    #[test]
    fn test_seed_falls_back_to_config_then_run_id() {
        let config = CinematographyConfig {
            seed: Some(77),
            ..CinematographyConfig::default()
        };
        let mut cinematographer = Cinematographer::new(config);
        let mut rig = RecordingRig::new();
        assert_eq!(cinematographer.start_descent(None, &mut rig), 77);

        let mut unseeded = Cinematographer::with_defaults();
        let seed = unseeded.start_descent(None, &mut rig);
        assert_eq!(seed, unseeded.run_id().to_seed());
    }

    #[test]
    fn test_same_seed_same_commands() {
        let play = || {
            let (mut cinematographer, mut rig) = started(CinematographyConfig::default(), 2024);
            for step in 0..600 {
                if step % 40 == 0 {
                    cinematographer.handle_event(&GameplayEvent::MicroSlip { severity: 0.6 }, &mut rig);
                }
                if step == 200 {
                    cinematographer.handle_event(&GameplayEvent::SlideStarted { speed: 5.0 }, &mut rig);
                }
                if step == 260 {
                    cinematographer.handle_event(
                        &GameplayEvent::SlideEnded {
                            outcome: SlideOutcome::Arrested,
                        },
                        &mut rig,
                    );
                }
                cinematographer.tick(0.1, &mut rig);
            }
            rig.take()
        };

        assert_eq!(play(), play());
    }

    #[test]
    fn test_slide_entry_forces_commitment() {
        let (mut cinematographer, mut rig) = started(CinematographyConfig::default(), 5);

        cinematographer.emit_signal(SignalType::SlideEntry, 1.0, true, &mut rig);

        assert_eq!(cinematographer.current_intent(), ShotIntent::Commitment);
        assert_eq!(cinematographer.director().on_screen(), ShotIntent::Commitment);
        assert_eq!(rig.last_intent(), Some(ShotIntent::Commitment));

        let events = cinematographer.drain_events();
        assert!(events.iter().any(|e| matches!(
            e,
            DirectorEvent::IntentChanged {
                to: ShotIntent::Commitment,
                forced: true,
                ..
            }
        )));
    }

    #[test]
    fn test_sustained_peak_requests_release_once_at_limit() {
        let mut config = CinematographyConfig::default();
        config.rhythm.smoothing = 1.0;
        config.rhythm.max_peak_duration = 10.0;
        config.signals.weights.insert(SignalType::CliffProximity, 0.9);
        let (mut cinematographer, mut rig) = started(config, 6);

        cinematographer.emit_signal(SignalType::CliffProximity, 1.0, true, &mut rig);
        assert!((cinematographer.total_intensity() - 0.9).abs() < 0.001);

        let mut requests = Vec::new();
        for _ in 0..44 {
            cinematographer.tick(0.25, &mut rig);
            for event in cinematographer.drain_events() {
                if let DirectorEvent::ReleaseNeeded { timestamp, .. } = event {
                    requests.push(timestamp);
                }
            }
        }

        assert_eq!(requests, vec![10.0]);
    }

    #[test]
    fn test_fatal_moment_is_never_missed() {
        let mut config = CinematographyConfig::default();
        config.director.base_miss_rate = 1.0;
        let (mut cinematographer, mut rig) = started(config, 7);
        cinematographer.operator_mut().set_fatigue(1.0);
        cinematographer.operator_mut().set_stress(1.0);

        cinematographer.handle_event(
            &GameplayEvent::FatalEventPhase {
                phase: FatalPhase::Onset,
            },
            &mut rig,
        );

        let odds = cinematographer.director().last_odds().unwrap();
        assert_eq!(odds.miss, 0.0);

        for _ in 0..100 {
            cinematographer.tick(0.1, &mut rig);
        }
        assert!(!rig
            .commands()
            .iter()
            .any(|c| matches!(c, CameraCommand::MissShot { .. })));
    }

    #[test]
    fn test_miss_queued_before_fatal_moment_is_cancelled() {
        let mut config = CinematographyConfig::default();
        config.director.base_miss_rate = 1.0;
        let (mut cinematographer, mut rig) = started(config, 11);

        assert!(cinematographer.director.schedule_ambient(
            ImperfectionType::Miss,
            false,
            &mut cinematographer.rng,
        ));
        cinematographer.handle_event(
            &GameplayEvent::FatalEventPhase {
                phase: FatalPhase::Onset,
            },
            &mut rig,
        );
        assert!(cinematographer.detector().is_active(SignalType::FatalMoment));
        assert_ne!(
            cinematographer
                .director()
                .pending_imperfection()
                .map(|pending| pending.kind),
            Some(ImperfectionType::Miss)
        );

        for _ in 0..10 {
            cinematographer.tick(0.1, &mut rig);
        }
        assert!(!rig
            .commands()
            .iter()
            .any(|c| matches!(c, CameraCommand::MissShot { .. })));
    }

    #[test]
    fn test_quiet_stretch_injects_one_isolation() {
        let (mut cinematographer, mut rig) = started(CinematographyConfig::default(), 8);
        cinematographer.drain_events();

        for _ in 0..20 {
            cinematographer.tick(0.5, &mut rig);
        }

        let isolations = cinematographer
            .drain_events()
            .into_iter()
            .filter(|e| {
                matches!(
                    e,
                    DirectorEvent::SignalRaised {
                        signal_type: SignalType::Isolation,
                        ..
                    }
                )
            })
            .count();
        assert_eq!(isolations, 1);
        assert_eq!(cinematographer.detector().quiet_time(), 0.0);
        assert!(cinematographer.detector().is_active(SignalType::Isolation));
    }

    #[test]
    fn test_fatigued_operator_scales_base_rates() {
        let (mut cinematographer, _rig) = started(CinematographyConfig::default(), 9);
        cinematographer.operator_mut().set_fatigue(0.65);

        let operator = cinematographer.operator();
        assert_eq!(operator.state(), OperatorState::Fatigued);

        let base = cinematographer.director().base_rates();
        let adjusted = operator.state_adjusted_rates(base);
        assert!((adjusted.miss - base.miss * 1.5).abs() < 0.0001);
        assert!((adjusted.late - base.late * 1.5).abs() < 0.0001);
        assert!((adjusted.hesitate - base.hesitate * 1.5).abs() < 0.0001);
    }

    #[test]
    fn test_end_descent_cancels_run() {
        let (mut cinematographer, mut rig) = started(CinematographyConfig::default(), 10);
        cinematographer.operator_mut().set_stress(0.9);
        cinematographer.emit_signal(SignalType::Injury, 0.9, false, &mut rig);
        cinematographer.director.schedule_ambient(
            ImperfectionType::Drift,
            false,
            &mut cinematographer.rng,
        );

        let log = cinematographer.end_descent();

        assert!(!log.is_empty());
        assert!(!cinematographer.is_active());
        assert_eq!(cinematographer.operator().stress(), 0.0);
        assert_eq!(cinematographer.operator().fatigue(), 0.0);
        assert!(cinematographer.director().pending_imperfection().is_none());
        assert!(cinematographer.director().log().is_empty());

        rig.clear();
        cinematographer.tick(0.1, &mut rig);
        assert!(rig.commands().is_empty());
    }

    #[test]
    fn test_phase_changes_drive_lifecycle() {
        let mut cinematographer = Cinematographer::with_defaults();
        let mut rig = RecordingRig::new();

        cinematographer.set_phase(RunPhase::Planning, &mut rig);
        assert!(!cinematographer.is_active());

        let transition = cinematographer.set_phase(RunPhase::Descent, &mut rig);
        assert_eq!(transition, PhaseTransition::DescentStarted);
        assert!(cinematographer.is_active());

        // Pausing keeps the run but stops ticking.
        assert_eq!(
            cinematographer.set_phase(RunPhase::Paused, &mut rig),
            PhaseTransition::Suspended
        );
        assert!(!cinematographer.is_active());
        assert!(cinematographer.director().is_active());

        cinematographer.set_phase(RunPhase::Descent, &mut rig);
        cinematographer.tick(1.0, &mut rig);
        assert!((cinematographer.run_state().elapsed - 1.0).abs() < 0.001);

        assert_eq!(
            cinematographer.set_phase(RunPhase::Dead, &mut rig),
            PhaseTransition::DescentEnded
        );
        assert!(!cinematographer.is_active());
        assert!(!cinematographer.take_finished_log().is_empty());
    }

    #[test]
    fn test_subject_position_reaches_rig() {
        let (mut cinematographer, mut rig) = started(CinematographyConfig::default(), 12);
        let position = Vec3::new(3.0, 2100.0, -8.0);

        cinematographer.handle_event(&GameplayEvent::SubjectMoved { position }, &mut rig);
        cinematographer.force_intent(ShotIntent::Release, "summit reached", &mut rig);

        assert!(rig.commands().contains(&CameraCommand::PositionForIntent {
            intent: ShotIntent::Release,
            subject: position,
        }));
        assert_eq!(cinematographer.run_state().subject_position, position);
    }

    #[test]
    fn test_events_export_as_json_lines() {
        let (mut cinematographer, mut rig) = started(CinematographyConfig::default(), 13);
        cinematographer.handle_event(&GameplayEvent::SlideStarted { speed: 4.0 }, &mut rig);
        for _ in 0..10 {
            cinematographer.tick(0.1, &mut rig);
        }

        let events = cinematographer.drain_events();
        let json = events_to_json_lines(&events).unwrap();
        assert_eq!(json.lines().count(), events.len());
        assert!(json.contains("\"event\":\"cut_executed\""));
    }
}
