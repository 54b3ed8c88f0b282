//! Descent mechanics: movement states, terrain zones, slide outcomes, risk, etc.

use serde::{Deserialize, Serialize};

/// Locomotion state of the climber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum MovementState {
    #[default]
    Standing,
    Walking,
    Downclimbing,
    Traversing,
    Sliding,
    Arresting,
    Falling,
    Rappelling,
    Resting,
}

impl MovementState {
    /// Whether the climber is out of control in this state.
    pub fn is_uncontrolled(&self) -> bool {
        matches!(self, MovementState::Sliding | MovementState::Falling)
    }

    /// Whether the climber is deliberately stationary.
    pub fn is_at_rest(&self) -> bool {
        matches!(self, MovementState::Standing | MovementState::Resting)
    }
}

/// Body posture reported by the movement controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Posture {
    #[default]
    Upright,
    Crouched,
    Braced,
    /// Facing into the slope, using hands.
    FacingIn,
    Sitting,
}

/// Terrain zone types along the descent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TerrainZone {
    Trail,
    Scree,
    Snowfield,
    Ice,
    Rock,
    Ridge,
    CliffBand,
}

impl TerrainZone {
    /// Baseline hazard of the zone from 0.0 (benign) to 1.0 (lethal exposure).
    pub fn hazard(&self) -> f32 {
        match self {
            TerrainZone::Trail => 0.0,
            TerrainZone::Scree => 0.3,
            TerrainZone::Snowfield => 0.4,
            TerrainZone::Rock => 0.5,
            TerrainZone::Ice => 0.7,
            TerrainZone::Ridge => 0.7,
            TerrainZone::CliffBand => 0.9,
        }
    }
}

/// How a slide ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlideOutcome {
    /// Self-arrest succeeded.
    Arrested,
    /// Slope eased out and the climber stopped on their own.
    RanOut,
    /// Stopped, but hurt.
    Injured,
    /// The slide carried over an edge.
    Fatal,
}

impl SlideOutcome {
    /// Dramatic weight of the outcome (0.0 - 1.0).
    pub fn severity(&self) -> f32 {
        match self {
            SlideOutcome::Arrested => 0.4,
            SlideOutcome::RanOut => 0.3,
            SlideOutcome::Injured => 0.8,
            SlideOutcome::Fatal => 1.0,
        }
    }

    /// Whether the aftermath is a consequence beat rather than relief.
    pub fn is_consequential(&self) -> bool {
        matches!(self, SlideOutcome::Injured | SlideOutcome::Fatal)
    }
}

/// Phases of a fatal event, announced in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FatalPhase {
    /// The moment control is irrecoverably lost.
    Onset,
    /// The fall itself.
    Fall,
    Impact,
    /// Stillness after the event.
    Aftermath,
}

/// Assessed risk of the current situation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub enum RiskLevel {
    #[default]
    Low,
    Moderate,
    High,
    Extreme,
}

impl RiskLevel {
    /// Signal intensity corresponding to this risk level.
    pub fn intensity(&self) -> f32 {
        match self {
            RiskLevel::Low => 0.0,
            RiskLevel::Moderate => 0.35,
            RiskLevel::High => 0.65,
            RiskLevel::Extreme => 0.9,
        }
    }
}

/// Injury severity categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum InjurySeverity {
    Minor,
    Moderate,
    Severe,
    Critical,
}

impl InjurySeverity {
    /// Signal intensity for an injury of this severity.
    pub fn intensity(&self) -> f32 {
        match self {
            InjurySeverity::Minor => 0.3,
            InjurySeverity::Moderate => 0.55,
            InjurySeverity::Severe => 0.8,
            InjurySeverity::Critical => 1.0,
        }
    }
}

/// Rope work actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RopeAction {
    RappelStarted,
    RappelFinished,
    RopeJammed,
    /// Rope came taut under load.
    ShockLoaded,
    RopeRetrieved,
}

impl RopeAction {
    /// Signal intensity for this rope action.
    pub fn intensity(&self) -> f32 {
        match self {
            RopeAction::RappelStarted => 0.4,
            RopeAction::RappelFinished => 0.2,
            RopeAction::RopeJammed => 0.5,
            RopeAction::ShockLoaded => 0.8,
            RopeAction::RopeRetrieved => 0.15,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_risk_ordering() {
        assert!(RiskLevel::Extreme > RiskLevel::High);
        assert!(RiskLevel::Moderate > RiskLevel::Low);
        assert_eq!(RiskLevel::Low.intensity(), 0.0);
    }

    #[test]
    fn test_slide_outcome_consequence() {
        assert!(SlideOutcome::Fatal.is_consequential());
        assert!(SlideOutcome::Injured.is_consequential());
        assert!(!SlideOutcome::Arrested.is_consequential());
        assert!(SlideOutcome::Fatal.severity() > SlideOutcome::Arrested.severity());
    }

    #[test]
    fn test_movement_state_flags() {
        assert!(MovementState::Sliding.is_uncontrolled());
        assert!(MovementState::Falling.is_uncontrolled());
        assert!(!MovementState::Rappelling.is_uncontrolled());
        assert!(MovementState::Resting.is_at_rest());
    }
}
