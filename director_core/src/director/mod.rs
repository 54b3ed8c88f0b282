//! Director - turns intent and rhythm into cuts and camera commands.
//!
//! The director mirrors the selector's intent onto the screen when the rhythm
//! allows a cut, keeps the decision log, and schedules the operator's
//! mistakes through a single pending slot.

mod imperfection;
mod log;

pub use imperfection::*;
pub use log::*;

use descent_rules::Vec3;
use rand::Rng;
use tracing::{debug, info};

use crate::camera::CameraRig;
use crate::config::{DirectorConfig, DurationRange};
use crate::events::DirectorEvent;
use crate::intent::{IntentSelector, ShotIntent};
use crate::operator::OperatorModel;
use crate::rhythm::RhythmEngine;

pub struct Director {
    config: DirectorConfig,
    clock: f32,
    active: bool,

    on_screen: ShotIntent,
    shot_started_at: f32,
    shot_counter: u32,
    /// Seconds the selector has disagreed with the screen.
    mismatch_time: f32,

    log: DecisionLog,
    pending: Option<PendingImperfection>,
    last_odds: Option<ImperfectionRates>,

    in_sequence: bool,
    sequence_remaining: Option<f32>,

    subject_position: Vec3,
    previous_position: Option<Vec3>,
    subject_velocity: Vec3,

    events: Vec<DirectorEvent>,
}

impl Director {
    /// Create an inactive director.
    pub fn new(config: DirectorConfig) -> Self {
        let log = DecisionLog::new(config.log_capacity);
        Self {
            config,
            clock: 0.0,
            active: false,
            on_screen: ShotIntent::Context,
            shot_started_at: 0.0,
            shot_counter: 0,
            mismatch_time: 0.0,
            log,
            pending: None,
            last_odds: None,
            in_sequence: false,
            sequence_remaining: None,
            subject_position: Vec3::ZERO,
            previous_position: None,
            subject_velocity: Vec3::ZERO,
            events: Vec::new(),
        }
    }

    /// Create a director with the default configuration.
    pub fn with_defaults() -> Self {
        Self::new(DirectorConfig::default())
    }

    /// Start directing and frame the opening CONTEXT shot.
    pub fn activate(&mut self, rig: &mut dyn CameraRig) {
        *self = Self::new(self.config.clone());
        self.active = true;

        self.start_shot(ShotIntent::Context, rig);
        self.record_decision("descent_started", "opening context shot");
    }

    /// Stop directing. Pending work is cancelled and the decision log is
    /// handed back.
    pub fn deactivate(&mut self) -> Vec<DecisionLogEntry> {
        if self.active {
            info!(shots = self.shot_counter, decisions = self.log.len(), "director deactivated");
        }
        self.active = false;
        self.pending = None;
        self.in_sequence = false;
        self.sequence_remaining = None;
        self.log.drain()
    }

    /// Advance one tick: velocity, sequence timer, the pending imperfection,
    /// then the cut decision. A pending MISS is dropped while `fatal_active`.
    #[allow(clippy::too_many_arguments)]
    pub fn update<R: Rng + ?Sized>(
        &mut self,
        dt: f32,
        fatal_active: bool,
        rhythm: &RhythmEngine,
        selector: &IntentSelector,
        operator: &OperatorModel,
        rng: &mut R,
        rig: &mut dyn CameraRig,
    ) {
        if !self.active {
            return;
        }
        let dt = dt.max(0.0);
        self.clock += dt;

        if dt > 0.0 {
            if let Some(previous) = self.previous_position {
                self.subject_velocity = (self.subject_position - previous) * (1.0 / dt);
            }
        }
        self.previous_position = Some(self.subject_position);

        if let Some(remaining) = self.sequence_remaining {
            let remaining = remaining - dt;
            if remaining <= 0.0 {
                self.end_sequence();
            } else {
                self.sequence_remaining = Some(remaining);
            }
        }

        if fatal_active {
            self.drop_pending_miss("fatal moment on screen");
        }
        self.tick_pending(dt, rig);

        if self.in_sequence {
            return;
        }

        let should_cut = selector.should_cut(self.on_screen);
        if should_cut {
            self.mismatch_time += dt;
        } else {
            self.mismatch_time = 0.0;
        }

        let shot_age = self.clock - self.shot_started_at;
        let shot_expired =
            self.config.recut_expired_shots && shot_age >= rhythm.recommended_shot_duration();
        let opportunity = rhythm.is_cut_recommended() && (should_cut || shot_expired);
        let overdue = should_cut && self.mismatch_time >= self.config.max_cut_delay;

        if !(opportunity || overdue) {
            return;
        }

        let reason = if should_cut && !opportunity {
            format!("overdue after {:.1}s", self.mismatch_time)
        } else if should_cut {
            format!("intent {} -> {}", self.on_screen, selector.current())
        } else {
            format!("shot held {shot_age:.1}s at {}", rhythm.level())
        };
        self.cut(selector.current(), "cut", &reason, rig);

        let late = operator.imperfection_rates(self.base_rates()).late * self.config.late_on_cut_factor;
        if rng.random_bool(f64::from(late.clamp(0.0, 1.0))) {
            self.schedule(ImperfectionType::Late, rng);
        }
    }

    /// Bypass the selector's gating: force it onto `intent` and cut now.
    pub fn force_intent(
        &mut self,
        selector: &mut IntentSelector,
        intent: ShotIntent,
        reason: &str,
        rig: &mut dyn CameraRig,
    ) {
        selector.force_intent(intent);
        if !self.active {
            return;
        }
        if self.on_screen != intent {
            self.cut(intent, "forced", reason, rig);
        } else {
            self.record_decision("forced", reason);
        }
    }

    /// Run the imperfection check for a discrete event. Returns the type
    /// queued, if any.
    pub fn check_imperfection<R: Rng + ?Sized>(
        &mut self,
        kind: EventKind,
        operator: &OperatorModel,
        rng: &mut R,
    ) -> Option<ImperfectionType> {
        if !self.active {
            return None;
        }
        if kind == EventKind::Fatal {
            self.drop_pending_miss("fatal moment");
        }
        let odds = imperfection_odds(kind, operator.imperfection_rates(self.base_rates()));
        self.last_odds = Some(odds);

        let rolled = roll_imperfection(odds, rng)?;
        self.schedule(rolled, rng).then_some(rolled)
    }

    /// Queue an ambient imperfection from the operator. MISS is dropped while
    /// a fatal moment is on screen.
    pub fn schedule_ambient<R: Rng + ?Sized>(
        &mut self,
        kind: ImperfectionType,
        fatal_active: bool,
        rng: &mut R,
    ) -> bool {
        if !self.active || (fatal_active && kind == ImperfectionType::Miss) {
            return false;
        }
        self.schedule(kind, rng)
    }

    /// Queue an imperfection unless one is already pending.
    fn schedule<R: Rng + ?Sized>(&mut self, kind: ImperfectionType, rng: &mut R) -> bool {
        if self.pending.is_some() {
            return false;
        }

        let delay = self.config.reaction_delay.sample(rng);
        let mut duration = self.duration_range(kind).sample(rng);
        if kind == ImperfectionType::Late && self.config.late_speed_reference > 0.0 {
            let speed = self.subject_velocity.length();
            duration *= 1.0 + (speed / self.config.late_speed_reference).min(1.0);
        }

        debug!(%kind, delay, duration, "imperfection scheduled");
        self.pending = Some(PendingImperfection {
            kind,
            countdown: delay,
            duration,
        });
        self.events.push(DirectorEvent::ImperfectionScheduled {
            kind,
            delay,
            timestamp: self.clock,
        });
        true
    }

    fn drop_pending_miss(&mut self, reason: &str) {
        if !self.pending.is_some_and(|p| p.kind == ImperfectionType::Miss) {
            return;
        }
        self.pending = None;
        debug!(reason, "pending miss dropped");
        self.record_decision("imperfection_dropped", &format!("MISS cancelled: {reason}"));
    }

    fn tick_pending(&mut self, dt: f32, rig: &mut dyn CameraRig) {
        let Some(mut pending) = self.pending else {
            return;
        };

        pending.countdown -= dt;
        if pending.countdown > 0.0 {
            self.pending = Some(pending);
            return;
        }

        self.pending = None;
        match pending.kind {
            ImperfectionType::Miss => rig.miss_shot(pending.duration),
            ImperfectionType::Late => rig.arrive_late(pending.duration),
            ImperfectionType::Hesitate => rig.hesitate(pending.duration),
            ImperfectionType::Overcorrect => rig.overcorrect(pending.duration),
            ImperfectionType::Drift => rig.drift(pending.duration),
            ImperfectionType::Reframe => rig.reframe(pending.duration),
        }

        debug!(kind = %pending.kind, duration = pending.duration, "imperfection executed");
        self.events.push(DirectorEvent::ImperfectionExecuted {
            kind: pending.kind,
            duration: pending.duration,
            timestamp: self.clock,
        });
        self.record_decision("imperfection", &format!("{} for {:.2}s", pending.kind, pending.duration));
    }

    fn cut(&mut self, to: ShotIntent, label: &str, reason: &str, rig: &mut dyn CameraRig) {
        let from = self.on_screen;
        self.events.push(DirectorEvent::ShotEnded {
            shot: self.shot_counter,
            intent: from,
            duration: self.clock - self.shot_started_at,
            timestamp: self.clock,
        });

        self.start_shot(to, rig);

        info!(shot = self.shot_counter, %from, %to, reason, "cut");
        self.events.push(DirectorEvent::CutExecuted {
            shot: self.shot_counter,
            from,
            to,
            timestamp: self.clock,
        });
        self.record_decision(label, reason);
    }

    fn start_shot(&mut self, intent: ShotIntent, rig: &mut dyn CameraRig) {
        rig.set_shot_intent(intent);
        rig.position_for_intent(intent, self.subject_position);

        self.on_screen = intent;
        self.shot_counter += 1;
        self.shot_started_at = self.clock;
        self.mismatch_time = 0.0;
        self.events.push(DirectorEvent::ShotStarted {
            shot: self.shot_counter,
            intent,
            timestamp: self.clock,
        });
    }

    fn record_decision(&mut self, label: &str, reason: &str) {
        self.log.record(self.clock, label, reason, self.on_screen);
        self.events.push(DirectorEvent::DirectorDecision {
            label: label.to_string(),
            reason: reason.to_string(),
            intent: self.on_screen,
            timestamp: self.clock,
        });
    }

    fn duration_range(&self, kind: ImperfectionType) -> DurationRange {
        match kind {
            ImperfectionType::Miss => self.config.miss_duration,
            ImperfectionType::Late => self.config.late_duration,
            ImperfectionType::Hesitate => self.config.hesitate_duration,
            ImperfectionType::Overcorrect => self.config.overcorrect_duration,
            ImperfectionType::Drift => self.config.drift_duration,
            ImperfectionType::Reframe => self.config.reframe_duration,
        }
    }

    /// Configured miss, late and hesitate rates before operator adjustment.
    pub fn base_rates(&self) -> ImperfectionRates {
        ImperfectionRates::new(
            self.config.base_miss_rate,
            self.config.base_late_rate,
            self.config.base_hesitate_rate,
        )
    }

    /// Suspend automatic cuts, optionally for a fixed number of seconds.
    pub fn begin_sequence(&mut self, duration: Option<f32>, reason: &str) {
        self.in_sequence = true;
        self.sequence_remaining = duration.map(|d| d.max(0.0));
        if self.active {
            self.record_decision("sequence_started", reason);
        }
    }

    /// Resume automatic cuts.
    pub fn end_sequence(&mut self) {
        if !self.in_sequence {
            return;
        }
        self.in_sequence = false;
        self.sequence_remaining = None;
        if self.active {
            self.record_decision("sequence_ended", "automatic cuts resumed");
        }
    }

    /// Latest subject position, used for framing and velocity.
    pub fn set_subject_position(&mut self, position: Vec3) {
        self.subject_position = position;
    }

    /// Whether a descent is being directed.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Intent of the shot on screen.
    pub fn on_screen(&self) -> ShotIntent {
        self.on_screen
    }

    /// Number of shots started this run.
    pub fn shot_counter(&self) -> u32 {
        self.shot_counter
    }

    /// Seconds since the current shot started.
    pub fn shot_age(&self) -> f32 {
        self.clock - self.shot_started_at
    }

    /// Whether a scripted sequence suspends cuts.
    pub fn in_sequence(&self) -> bool {
        self.in_sequence
    }

    /// The queued imperfection, if any.
    pub fn pending_imperfection(&self) -> Option<PendingImperfection> {
        self.pending
    }

    /// Odds used by the most recent discrete-event check.
    pub fn last_odds(&self) -> Option<ImperfectionRates> {
        self.last_odds
    }

    /// Finite-difference subject velocity (m/s).
    pub fn subject_velocity(&self) -> Vec3 {
        self.subject_velocity
    }

    /// Decision log of the current run.
    pub fn log(&self) -> &DecisionLog {
        &self.log
    }

    /// Take the events produced since the last drain.
    pub fn drain_events(&mut self) -> Vec<DirectorEvent> {
        std::mem::take(&mut self.events)
    }

    /// Return to the inactive state.
    pub fn reset(&mut self) {
        *self = Self::new(self.config.clone());
    }
}
