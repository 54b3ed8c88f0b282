//! Signal definitions - typed, weighted, decaying records of gameplay moments.

use descent_rules::Vec3;
use serde::{Deserialize, Serialize};

/// Every kind of signal the detector can hold. At most one active signal
/// exists per type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalType {
    SlopeChange,
    SpeedChange,
    SlideEntry,
    SlideExit,
    MicroSlip,
    StabilityLoss,
    CliffProximity,
    TerrainTransition,
    FatigueSpike,
    Injury,
    WeatherShift,
    TimeMilestone,
    RopeEvent,
    AnchorConcern,
    RiskEscalation,
    PointOfNoReturn,
    FatalMoment,
    Isolation,
}

impl SignalType {
    pub const COUNT: usize = 18;

    pub const ALL: [SignalType; SignalType::COUNT] = [
        SignalType::SlopeChange,
        SignalType::SpeedChange,
        SignalType::SlideEntry,
        SignalType::SlideExit,
        SignalType::MicroSlip,
        SignalType::StabilityLoss,
        SignalType::CliffProximity,
        SignalType::TerrainTransition,
        SignalType::FatigueSpike,
        SignalType::Injury,
        SignalType::WeatherShift,
        SignalType::TimeMilestone,
        SignalType::RopeEvent,
        SignalType::AnchorConcern,
        SignalType::RiskEscalation,
        SignalType::PointOfNoReturn,
        SignalType::FatalMoment,
        SignalType::Isolation,
    ];

    /// Slot of this type in per-type tables.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Contribution of this type to total intensity.
    pub fn default_weight(self) -> f32 {
        match self {
            SignalType::SlopeChange => 0.3,
            SignalType::SpeedChange => 0.4,
            SignalType::SlideEntry => 1.0,
            SignalType::SlideExit => 0.6,
            SignalType::MicroSlip => 0.5,
            SignalType::StabilityLoss => 0.6,
            SignalType::CliffProximity => 0.7,
            SignalType::TerrainTransition => 0.3,
            SignalType::FatigueSpike => 0.4,
            SignalType::Injury => 0.8,
            SignalType::WeatherShift => 0.3,
            SignalType::TimeMilestone => 0.2,
            SignalType::RopeEvent => 0.5,
            SignalType::AnchorConcern => 0.6,
            SignalType::RiskEscalation => 0.6,
            SignalType::PointOfNoReturn => 0.9,
            SignalType::FatalMoment => 1.0,
            SignalType::Isolation => 0.2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SignalType::SlopeChange => "SLOPE_CHANGE",
            SignalType::SpeedChange => "SPEED_CHANGE",
            SignalType::SlideEntry => "SLIDE_ENTRY",
            SignalType::SlideExit => "SLIDE_EXIT",
            SignalType::MicroSlip => "MICRO_SLIP",
            SignalType::StabilityLoss => "STABILITY_LOSS",
            SignalType::CliffProximity => "CLIFF_PROXIMITY",
            SignalType::TerrainTransition => "TERRAIN_TRANSITION",
            SignalType::FatigueSpike => "FATIGUE_SPIKE",
            SignalType::Injury => "INJURY",
            SignalType::WeatherShift => "WEATHER_SHIFT",
            SignalType::TimeMilestone => "TIME_MILESTONE",
            SignalType::RopeEvent => "ROPE_EVENT",
            SignalType::AnchorConcern => "ANCHOR_CONCERN",
            SignalType::RiskEscalation => "RISK_ESCALATION",
            SignalType::PointOfNoReturn => "POINT_OF_NO_RETURN",
            SignalType::FatalMoment => "FATAL_MOMENT",
            SignalType::Isolation => "ISOLATION",
        }
    }
}

impl std::fmt::Display for SignalType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-type weight table, indexed by [`SignalType::index`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalWeights([f32; SignalType::COUNT]);

impl Default for SignalWeights {
    fn default() -> Self {
        let mut weights = [0.0; SignalType::COUNT];
        for signal_type in SignalType::ALL {
            weights[signal_type.index()] = signal_type.default_weight();
        }
        Self(weights)
    }
}

impl SignalWeights {
    pub fn get(&self, signal_type: SignalType) -> f32 {
        self.0[signal_type.index()]
    }

    /// Override the weight of one type. Negative weights are treated as zero.
    pub fn set(&mut self, signal_type: SignalType, weight: f32) {
        self.0[signal_type.index()] = weight.max(0.0);
    }
}

/// An active signal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub signal_type: SignalType,

    /// Current intensity (0.0 - 1.0).
    pub intensity: f32,

    /// Where the subject was when the signal was last refreshed.
    pub source_position: Vec3,

    /// Detector clock time of the last refresh.
    pub timestamp: f32,

    /// Sustained signals hold their intensity until cleared.
    pub sustained: bool,
}

impl Signal {
    pub fn new(signal_type: SignalType, intensity: f32, timestamp: f32) -> Self {
        Self {
            signal_type,
            intensity: intensity.clamp(0.0, 1.0),
            source_position: Vec3::ZERO,
            timestamp,
            sustained: false,
        }
    }

    pub fn with_position(mut self, position: Vec3) -> Self {
        self.source_position = position;
        self
    }

    pub fn sustained(mut self) -> Self {
        self.sustained = true;
        self
    }

    /// Merge a new emission of the same type: the stronger intensity wins and
    /// the timestamp is refreshed. A sustained emission makes the signal sustained.
    pub fn merge(&mut self, other: &Signal) {
        self.intensity = self.intensity.max(other.intensity).clamp(0.0, 1.0);
        self.timestamp = other.timestamp;
        self.source_position = other.source_position;
        self.sustained |= other.sustained;
    }

    /// Apply linear decay. Sustained signals are unaffected.
    pub fn decay(&mut self, amount: f32) {
        if !self.sustained {
            self.intensity = (self.intensity - amount).clamp(0.0, 1.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_types_indexed_in_order() {
        for (slot, signal_type) in SignalType::ALL.iter().enumerate() {
            assert_eq!(signal_type.index(), slot);
        }
    }

    #[test]
    fn test_weights_table() {
        let mut weights = SignalWeights::default();
        assert_eq!(weights.get(SignalType::FatalMoment), 1.0);

        weights.set(SignalType::Isolation, -1.0);
        assert_eq!(weights.get(SignalType::Isolation), 0.0);
    }

    #[test]
    fn test_signal_clamps_intensity() {
        let signal = Signal::new(SignalType::Injury, 1.7, 0.0);
        assert_eq!(signal.intensity, 1.0);

        let signal = Signal::new(SignalType::Injury, -0.2, 0.0);
        assert_eq!(signal.intensity, 0.0);
    }

    #[test]
    fn test_merge_keeps_max() {
        let mut signal = Signal::new(SignalType::MicroSlip, 0.7, 1.0);
        signal.merge(&Signal::new(SignalType::MicroSlip, 0.4, 2.0));

        assert!((signal.intensity - 0.7).abs() < 0.001);
        assert_eq!(signal.timestamp, 2.0);
    }

    #[test]
    fn test_sustained_does_not_decay() {
        let mut sustained = Signal::new(SignalType::CliffProximity, 0.6, 0.0).sustained();
        let mut transient = Signal::new(SignalType::MicroSlip, 0.6, 0.0);

        sustained.decay(0.5);
        transient.decay(0.5);

        assert!((sustained.intensity - 0.6).abs() < 0.001);
        assert!((transient.intensity - 0.1).abs() < 0.001);
    }
}
