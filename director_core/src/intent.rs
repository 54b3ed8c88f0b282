//! Intent selector - which narrative shot intent should be running.
//!
//! Automatic changes are gated by a minimum hold, a maximum hold with a
//! cyclic fallback, and a variety window. Forced changes skip every gate.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::{debug, info};

use descent_rules::{FatalPhase, GameplayEvent};

use crate::config::IntentConfig;
use crate::events::DirectorEvent;
use crate::signals::SignalType;

/// The narrative purpose of the shot on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShotIntent {
    /// Where are we: wide, establishing.
    #[default]
    Context,
    /// Something is about to happen.
    Tension,
    /// The climber is committed to a move or a slide.
    Commitment,
    /// What just happened.
    Consequence,
    /// Let the audience breathe.
    Release,
}

impl ShotIntent {
    pub const CYCLE: [ShotIntent; 5] = [
        ShotIntent::Context,
        ShotIntent::Tension,
        ShotIntent::Commitment,
        ShotIntent::Consequence,
        ShotIntent::Release,
    ];

    /// Next intent in the fallback cycle.
    pub fn next(self) -> Self {
        match self {
            ShotIntent::Context => ShotIntent::Tension,
            ShotIntent::Tension => ShotIntent::Commitment,
            ShotIntent::Commitment => ShotIntent::Consequence,
            ShotIntent::Consequence => ShotIntent::Release,
            ShotIntent::Release => ShotIntent::Context,
        }
    }

    /// Upper-case name used in logs and exports.
    pub fn as_str(self) -> &'static str {
        match self {
            ShotIntent::Context => "CONTEXT",
            ShotIntent::Tension => "TENSION",
            ShotIntent::Commitment => "COMMITMENT",
            ShotIntent::Consequence => "CONSEQUENCE",
            ShotIntent::Release => "RELEASE",
        }
    }
}

impl std::fmt::Display for ShotIntent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why the intent changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentReason {
    ReleaseNeeded,
    HighIntensity,
    RisingIntensity,
    SharpDrop,
    SettledAfterConsequence,
    Inactivity,
    MaxHold,
    Forced,
}

impl std::fmt::Display for IntentReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            IntentReason::ReleaseNeeded => "release needed",
            IntentReason::HighIntensity => "high intensity",
            IntentReason::RisingIntensity => "rising intensity",
            IntentReason::SharpDrop => "sharp drop after elevated intensity",
            IntentReason::SettledAfterConsequence => "settled after consequence",
            IntentReason::Inactivity => "inactivity",
            IntentReason::MaxHold => "maximum hold exceeded",
            IntentReason::Forced => "forced",
        };
        f.write_str(text)
    }
}

/// A committed intent change.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntentChange {
    pub from: ShotIntent,
    pub to: ShotIntent,
    pub reason: IntentReason,
    pub forced: bool,
}

/// Intent a signal forces the moment it is emitted, if any.
pub fn forced_intent_for_signal(signal_type: SignalType) -> Option<ShotIntent> {
    match signal_type {
        SignalType::SlideEntry => Some(ShotIntent::Commitment),
        SignalType::SlideExit | SignalType::FatalMoment => Some(ShotIntent::Consequence),
        _ => None,
    }
}

/// Intent a discrete gameplay event forces, if any.
pub fn forced_intent_for_event(event: &GameplayEvent) -> Option<ShotIntent> {
    match event {
        GameplayEvent::SlideStarted { .. } => Some(ShotIntent::Commitment),
        GameplayEvent::SlideEnded { outcome } => Some(if outcome.is_consequential() {
            ShotIntent::Consequence
        } else {
            ShotIntent::Release
        }),
        GameplayEvent::FatalEventPhase { phase } => Some(match phase {
            FatalPhase::Onset | FatalPhase::Fall => ShotIntent::Commitment,
            FatalPhase::Impact => ShotIntent::Consequence,
            FatalPhase::Aftermath => ShotIntent::Release,
        }),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy)]
struct RecentIntent {
    intent: ShotIntent,
    /// Seconds until the intent may be selected automatically again.
    blocked_for: f32,
}

pub struct IntentSelector {
    config: IntentConfig,
    clock: f32,

    current: ShotIntent,
    time_in_intent: f32,
    pending: Option<(ShotIntent, IntentReason)>,

    /// Intensity sampled at the last trend interval.
    reference_intensity: f32,
    trend_timer: f32,
    delta: f32,

    inactivity_time: f32,
    low_time: f32,

    recent: VecDeque<RecentIntent>,
    events: Vec<DirectorEvent>,
}

impl IntentSelector {
    /// Create a selector showing CONTEXT.
    pub fn new(config: IntentConfig) -> Self {
        Self {
            config,
            clock: 0.0,
            current: ShotIntent::Context,
            time_in_intent: 0.0,
            pending: None,
            reference_intensity: 0.0,
            trend_timer: 0.0,
            delta: 0.0,
            inactivity_time: 0.0,
            low_time: 0.0,
            recent: VecDeque::new(),
            events: Vec::new(),
        }
    }

    /// Create a selector with the default configuration.
    pub fn with_defaults() -> Self {
        Self::new(IntentConfig::default())
    }

    /// Evaluate the rules for this tick and commit the recommendation once the
    /// minimum hold has passed, provided it still holds.
    pub fn update(&mut self, intensity: f32, release_needed: bool, dt: f32) -> Option<IntentChange> {
        let dt = dt.max(0.0);
        let intensity = intensity.clamp(0.0, 1.0);
        self.clock += dt;
        self.time_in_intent += dt;

        for entry in &mut self.recent {
            entry.blocked_for -= dt;
        }
        self.recent.retain(|entry| entry.blocked_for > 0.0);

        self.delta = intensity - self.reference_intensity;
        self.trend_timer += dt;
        let prior = self.reference_intensity;
        if self.trend_timer >= self.config.trend_interval {
            self.trend_timer = 0.0;
            self.reference_intensity = intensity;
        }

        if intensity < self.config.inactivity_threshold {
            self.inactivity_time += dt;
        } else {
            self.inactivity_time = 0.0;
        }
        if intensity < self.config.tension_threshold {
            self.low_time += dt;
        } else {
            self.low_time = 0.0;
        }

        // Re-evaluated every tick; a recommendation whose rule lapsed is dropped.
        self.pending = self.recommend(intensity, prior, release_needed);

        if self.time_in_intent < self.config.min_intent_duration {
            return None;
        }

        let (intent, reason) = self.pending.take()?;
        if !self.variety_allows(intent) {
            return None;
        }
        Some(self.change_intent(intent, reason, false))
    }

    /// Switch immediately, ignoring hold times and variety.
    pub fn force_intent(&mut self, intent: ShotIntent) -> Option<IntentChange> {
        self.pending = None;
        if intent == self.current {
            return None;
        }
        info!(from = %self.current, to = %intent, "intent forced");
        Some(self.change_intent(intent, IntentReason::Forced, true))
    }

    /// Whether the director's on-screen intent lags behind this selector.
    pub fn should_cut(&self, on_screen: ShotIntent) -> bool {
        self.current != on_screen
    }

    fn recommend(
        &self,
        intensity: f32,
        prior: f32,
        release_needed: bool,
    ) -> Option<(ShotIntent, IntentReason)> {
        if let Some((intent, reason)) = self.match_rule(intensity, prior, release_needed) {
            if intent != self.current && self.variety_allows(intent) {
                return Some((intent, reason));
            }
        }

        if self.time_in_intent >= self.config.max_intent_duration {
            return self
                .cyclic_fallback()
                .map(|intent| (intent, IntentReason::MaxHold));
        }

        None
    }

    fn match_rule(
        &self,
        intensity: f32,
        prior: f32,
        release_needed: bool,
    ) -> Option<(ShotIntent, IntentReason)> {
        let config = &self.config;

        if release_needed {
            Some((ShotIntent::Release, IntentReason::ReleaseNeeded))
        } else if intensity >= config.commitment_threshold {
            Some((ShotIntent::Commitment, IntentReason::HighIntensity))
        } else if intensity >= config.tension_threshold && self.delta > config.rising_delta {
            Some((ShotIntent::Tension, IntentReason::RisingIntensity))
        } else if self.delta < -config.falling_delta && prior > config.tension_threshold {
            Some((ShotIntent::Consequence, IntentReason::SharpDrop))
        } else if self.current == ShotIntent::Consequence && self.low_time > config.consequence_settle {
            Some((ShotIntent::Release, IntentReason::SettledAfterConsequence))
        } else if self.inactivity_time > config.inactivity_timeout {
            Some((ShotIntent::Context, IntentReason::Inactivity))
        } else {
            None
        }
    }

    /// First intent after the current one, in cycle order, that variety allows.
    fn cyclic_fallback(&self) -> Option<ShotIntent> {
        let mut candidate = self.current.next();
        while candidate != self.current {
            if self.variety_allows(candidate) {
                return Some(candidate);
            }
            candidate = candidate.next();
        }
        None
    }

    fn variety_allows(&self, intent: ShotIntent) -> bool {
        !self.recent.iter().any(|entry| entry.intent == intent)
    }

    fn change_intent(&mut self, to: ShotIntent, reason: IntentReason, forced: bool) -> IntentChange {
        let from = self.current;

        self.recent.push_back(RecentIntent {
            intent: from,
            blocked_for: self.config.variety_window * 0.5,
        });
        while self.recent.len() > self.config.history_capacity {
            self.recent.pop_front();
        }

        self.current = to;
        self.time_in_intent = 0.0;
        self.pending = None;

        debug!(%from, %to, %reason, forced, "intent changed");
        self.events.push(DirectorEvent::IntentChanged {
            from,
            to,
            reason,
            forced,
            timestamp: self.clock,
        });

        IntentChange {
            from,
            to,
            reason,
            forced,
        }
    }

    /// The intent the selector has committed to.
    pub fn current(&self) -> ShotIntent {
        self.current
    }

    /// Seconds since the last intent change.
    pub fn time_in_intent(&self) -> f32 {
        self.time_in_intent
    }

    /// Recommendation waiting for the minimum hold, if any.
    pub fn pending(&self) -> Option<ShotIntent> {
        self.pending.map(|(intent, _)| intent)
    }

    /// Change in intensity since the last trend sample.
    pub fn intensity_delta(&self) -> f32 {
        self.delta
    }

    /// Take the events produced since the last drain.
    pub fn drain_events(&mut self) -> Vec<DirectorEvent> {
        std::mem::take(&mut self.events)
    }

    /// Return to CONTEXT with empty history.
    pub fn reset(&mut self) {
        let config = self.config.clone();
        *self = Self::new(config);
    }
}
