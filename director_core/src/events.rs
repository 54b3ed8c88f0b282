//! Observability events published by the controller.
//!
//! Every component keeps its own outbox; the [`Cinematographer`](crate::Cinematographer)
//! drains them in tick order into a single queue.

use serde::{Deserialize, Serialize};

use crate::director::ImperfectionType;
use crate::intent::{IntentReason, ShotIntent};
use crate::operator::OperatorState;
use crate::rhythm::{IntensityLevel, RhythmPhase};
use crate::signals::SignalType;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DirectorEvent {
    SignalRaised {
        signal_type: SignalType,
        intensity: f32,
        timestamp: f32,
    },
    SignalCleared {
        signal_type: SignalType,
        timestamp: f32,
    },
    IntensityUpdated {
        total: f32,
        timestamp: f32,
    },
    IntensityLevelChanged {
        from: IntensityLevel,
        to: IntensityLevel,
        timestamp: f32,
    },
    RhythmBeat {
        from: RhythmPhase,
        to: RhythmPhase,
        timestamp: f32,
    },
    ReleaseNeeded {
        level: IntensityLevel,
        held_for: f32,
        timestamp: f32,
    },
    IntentChanged {
        from: ShotIntent,
        to: ShotIntent,
        reason: IntentReason,
        forced: bool,
        timestamp: f32,
    },
    ShotStarted {
        shot: u32,
        intent: ShotIntent,
        timestamp: f32,
    },
    ShotEnded {
        shot: u32,
        intent: ShotIntent,
        duration: f32,
        timestamp: f32,
    },
    CutExecuted {
        shot: u32,
        from: ShotIntent,
        to: ShotIntent,
        timestamp: f32,
    },
    DirectorDecision {
        label: String,
        reason: String,
        intent: ShotIntent,
        timestamp: f32,
    },
    OperatorStateChanged {
        from: OperatorState,
        to: OperatorState,
        timestamp: f32,
    },
    ImperfectionScheduled {
        kind: ImperfectionType,
        delay: f32,
        timestamp: f32,
    },
    ImperfectionExecuted {
        kind: ImperfectionType,
        duration: f32,
        timestamp: f32,
    },
}

impl DirectorEvent {
    pub fn name(&self) -> &'static str {
        match self {
            DirectorEvent::SignalRaised { .. } => "signal_raised",
            DirectorEvent::SignalCleared { .. } => "signal_cleared",
            DirectorEvent::IntensityUpdated { .. } => "intensity_updated",
            DirectorEvent::IntensityLevelChanged { .. } => "intensity_level_changed",
            DirectorEvent::RhythmBeat { .. } => "rhythm_beat",
            DirectorEvent::ReleaseNeeded { .. } => "release_needed",
            DirectorEvent::IntentChanged { .. } => "intent_changed",
            DirectorEvent::ShotStarted { .. } => "shot_started",
            DirectorEvent::ShotEnded { .. } => "shot_ended",
            DirectorEvent::CutExecuted { .. } => "cut_executed",
            DirectorEvent::DirectorDecision { .. } => "director_decision",
            DirectorEvent::OperatorStateChanged { .. } => "operator_state_changed",
            DirectorEvent::ImperfectionScheduled { .. } => "imperfection_scheduled",
            DirectorEvent::ImperfectionExecuted { .. } => "imperfection_executed",
        }
    }

    /// Seconds since the descent started.
    pub fn timestamp(&self) -> f32 {
        match self {
            DirectorEvent::SignalRaised { timestamp, .. }
            | DirectorEvent::SignalCleared { timestamp, .. }
            | DirectorEvent::IntensityUpdated { timestamp, .. }
            | DirectorEvent::IntensityLevelChanged { timestamp, .. }
            | DirectorEvent::RhythmBeat { timestamp, .. }
            | DirectorEvent::ReleaseNeeded { timestamp, .. }
            | DirectorEvent::IntentChanged { timestamp, .. }
            | DirectorEvent::ShotStarted { timestamp, .. }
            | DirectorEvent::ShotEnded { timestamp, .. }
            | DirectorEvent::CutExecuted { timestamp, .. }
            | DirectorEvent::DirectorDecision { timestamp, .. }
            | DirectorEvent::OperatorStateChanged { timestamp, .. }
            | DirectorEvent::ImperfectionScheduled { timestamp, .. }
            | DirectorEvent::ImperfectionExecuted { timestamp, .. } => *timestamp,
        }
    }
}

/// Serialize events as JSON lines, one event per line.
pub fn events_to_json_lines(events: &[DirectorEvent]) -> Result<String, serde_json::Error> {
    let mut out = String::new();
    for event in events {
        out.push_str(&serde_json::to_string(event)?);
        out.push('\n');
    }
    Ok(out)
}
