//! Gameplay events - the typed input channel published by the simulation.
//!
//! Every producer (movement controller, terrain, weather, rope system, body
//! condition) reports through [`GameplayEvent`]. Consumers never query the
//! producers directly.

use serde::{Deserialize, Serialize};

use crate::mechanics::{
    FatalPhase, InjurySeverity, MovementState, Posture, RiskLevel, RopeAction, SlideOutcome,
    TerrainZone,
};
use crate::world_state::{EnvironmentState, Vec3};

/// A noteworthy thing that happened on the mountain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GameplayEvent {
    MovementStateChanged {
        from: MovementState,
        to: MovementState,
    },

    /// Periodic slope sample under the climber, in degrees.
    SlopeSampled { angle: f32 },

    /// Periodic ground speed sample, in m/s.
    SpeedSampled { speed: f32 },

    /// Balance from 0.0 (falling over) to 1.0 (planted).
    StabilityChanged { stability: f32 },

    PostureChanged { posture: Posture },

    /// A foot skated but the climber stayed up. Severity 0.0 - 1.0.
    MicroSlip { severity: f32 },

    SlideStarted { speed: f32 },

    SlideEnded { outcome: SlideOutcome },

    TerrainZoneChanged { from: TerrainZone, to: TerrainZone },

    /// Distance to the nearest unprotected drop, in meters. `None` when no
    /// edge is in range.
    CliffProximityChanged { distance: Option<f32> },

    /// Body fatigue crossed one of the body model's thresholds.
    FatigueThresholdCrossed { threshold: f32 },

    /// Continuous body fatigue sample (0.0 - 1.0).
    FatigueSampled { fatigue: f32 },

    Injured { severity: InjurySeverity },

    WeatherChanged { environment: EnvironmentState },

    /// In-game clock passed a notable hour (sunset, nightfall...).
    TimeMilestone { hour: u8 },

    Rope { action: RopeAction },

    /// Anchor built, quality from 0.0 (will fail) to 1.0 (bombproof).
    AnchorPlaced { quality: f32 },

    RiskLevelChanged { from: RiskLevel, to: RiskLevel },

    PointOfNoReturn,

    FatalEventPhase { phase: FatalPhase },

    SubjectMoved { position: Vec3 },
}

impl GameplayEvent {
    /// Short stable name, used for logging and decision reasons.
    pub fn name(&self) -> &'static str {
        match self {
            GameplayEvent::MovementStateChanged { .. } => "movement_state_changed",
            GameplayEvent::SlopeSampled { .. } => "slope_sampled",
            GameplayEvent::SpeedSampled { .. } => "speed_sampled",
            GameplayEvent::StabilityChanged { .. } => "stability_changed",
            GameplayEvent::PostureChanged { .. } => "posture_changed",
            GameplayEvent::MicroSlip { .. } => "micro_slip",
            GameplayEvent::SlideStarted { .. } => "slide_started",
            GameplayEvent::SlideEnded { .. } => "slide_ended",
            GameplayEvent::TerrainZoneChanged { .. } => "terrain_zone_changed",
            GameplayEvent::CliffProximityChanged { .. } => "cliff_proximity_changed",
            GameplayEvent::FatigueThresholdCrossed { .. } => "fatigue_threshold_crossed",
            GameplayEvent::FatigueSampled { .. } => "fatigue_sampled",
            GameplayEvent::Injured { .. } => "injured",
            GameplayEvent::WeatherChanged { .. } => "weather_changed",
            GameplayEvent::TimeMilestone { .. } => "time_milestone",
            GameplayEvent::Rope { .. } => "rope",
            GameplayEvent::AnchorPlaced { .. } => "anchor_placed",
            GameplayEvent::RiskLevelChanged { .. } => "risk_level_changed",
            GameplayEvent::PointOfNoReturn => "point_of_no_return",
            GameplayEvent::FatalEventPhase { .. } => "fatal_event_phase",
            GameplayEvent::SubjectMoved { .. } => "subject_moved",
        }
    }

    /// Whether this is a continuous sample rather than a discrete occurrence.
    pub fn is_sample(&self) -> bool {
        matches!(
            self,
            GameplayEvent::SlopeSampled { .. }
                | GameplayEvent::SpeedSampled { .. }
                | GameplayEvent::FatigueSampled { .. }
                | GameplayEvent::SubjectMoved { .. }
        )
    }

    /// How startling the event is to someone watching (0.0 - 1.0).
    ///
    /// Samples and slow changes are never sudden.
    pub fn suddenness(&self) -> f32 {
        let value = match self {
            GameplayEvent::MicroSlip { severity } => 0.3 + severity * 0.4,
            GameplayEvent::SlideStarted { .. } => 0.9,
            GameplayEvent::SlideEnded { outcome } => outcome.severity() * 0.6,
            GameplayEvent::StabilityChanged { stability } if *stability < 0.3 => 0.5,
            GameplayEvent::MovementStateChanged { to, .. } if to.is_uncontrolled() => 0.8,
            GameplayEvent::Injured { severity } => severity.intensity(),
            GameplayEvent::Rope {
                action: RopeAction::ShockLoaded,
            } => 0.7,
            GameplayEvent::FatalEventPhase {
                phase: FatalPhase::Onset,
            } => 1.0,
            GameplayEvent::FatalEventPhase {
                phase: FatalPhase::Impact,
            } => 0.8,
            _ => 0.0,
        };
        value.clamp(0.0, 1.0)
    }
}

/// Parse a recorded event stream (one JSON event per line, blank lines skipped).
pub fn parse_event_log(input: &str) -> Result<Vec<GameplayEvent>, serde_json::Error> {
    input
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(serde_json::from_str)
        .collect()
}
