//! Imperfection types, event modifiers and the probability roll.

use descent_rules::GameplayEvent;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::signals::SignalType;

/// A deliberate operator mistake executed by the camera rig.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ImperfectionType {
    Miss,
    Late,
    Hesitate,
    Overcorrect,
    Drift,
    Reframe,
}

impl ImperfectionType {
    pub const ALL: [ImperfectionType; 6] = [
        ImperfectionType::Miss,
        ImperfectionType::Late,
        ImperfectionType::Hesitate,
        ImperfectionType::Overcorrect,
        ImperfectionType::Drift,
        ImperfectionType::Reframe,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ImperfectionType::Miss => "MISS",
            ImperfectionType::Late => "LATE",
            ImperfectionType::Hesitate => "HESITATE",
            ImperfectionType::Overcorrect => "OVERCORRECT",
            ImperfectionType::Drift => "DRIFT",
            ImperfectionType::Reframe => "REFRAME",
        }
    }
}

impl std::fmt::Display for ImperfectionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-check probabilities of the three event-driven imperfections.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImperfectionRates {
    pub miss: f32,
    pub late: f32,
    pub hesitate: f32,
}

impl ImperfectionRates {
    pub fn new(miss: f32, late: f32, hesitate: f32) -> Self {
        Self {
            miss: miss.clamp(0.0, 1.0),
            late: late.clamp(0.0, 1.0),
            hesitate: hesitate.clamp(0.0, 1.0),
        }
    }

    /// Multiply every rate by `factor`, clamping the result.
    pub fn scaled(self, factor: f32) -> Self {
        Self::new(self.miss * factor, self.late * factor, self.hesitate * factor)
    }
}

/// Discrete events that trigger an imperfection check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Slide,
    Stumble,
    Fatal,
    Other,
}

/// Multipliers applied to (miss, late, hesitate).
pub const SLIDE_MODIFIERS: (f32, f32, f32) = (1.5, 2.0, 1.0);
pub const STUMBLE_MODIFIERS: (f32, f32, f32) = (2.0, 1.0, 1.0);
pub const FATAL_MODIFIERS: (f32, f32, f32) = (0.0, 0.5, 1.0);
pub const NEUTRAL_MODIFIERS: (f32, f32, f32) = (1.0, 1.0, 1.0);

impl EventKind {
    /// Which kind of check a gameplay event triggers. Samples and calm events
    /// trigger none.
    pub fn classify(event: &GameplayEvent) -> Option<Self> {
        match event {
            GameplayEvent::SlideStarted { .. } => Some(EventKind::Slide),
            GameplayEvent::MicroSlip { .. } => Some(EventKind::Stumble),
            GameplayEvent::StabilityChanged { .. } if event.suddenness() > 0.0 => {
                Some(EventKind::Stumble)
            }
            GameplayEvent::FatalEventPhase { .. } => Some(EventKind::Fatal),
            _ if event.suddenness() > 0.0 => Some(EventKind::Other),
            _ => None,
        }
    }

    /// Check triggered by emitting a signal directly.
    pub fn for_signal(signal_type: SignalType) -> Option<Self> {
        match signal_type {
            SignalType::SlideEntry => Some(EventKind::Slide),
            SignalType::MicroSlip | SignalType::StabilityLoss => Some(EventKind::Stumble),
            SignalType::FatalMoment => Some(EventKind::Fatal),
            _ => None,
        }
    }

    pub fn modifiers(self) -> (f32, f32, f32) {
        match self {
            EventKind::Slide => SLIDE_MODIFIERS,
            EventKind::Stumble => STUMBLE_MODIFIERS,
            EventKind::Fatal => FATAL_MODIFIERS,
            EventKind::Other => NEUTRAL_MODIFIERS,
        }
    }
}

/// Probabilities for one event check. A fatal moment is never missed.
pub fn imperfection_odds(kind: EventKind, rates: ImperfectionRates) -> ImperfectionRates {
    let (miss, late, hesitate) = kind.modifiers();
    let odds = ImperfectionRates::new(rates.miss * miss, rates.late * late, rates.hesitate * hesitate);

    if kind == EventKind::Fatal {
        ImperfectionRates { miss: 0.0, ..odds }
    } else {
        odds
    }
}

/// Roll miss, then late, then hesitate. The first hit wins.
pub fn roll_imperfection<R: Rng + ?Sized>(odds: ImperfectionRates, rng: &mut R) -> Option<ImperfectionType> {
    [
        (ImperfectionType::Miss, odds.miss),
        (ImperfectionType::Late, odds.late),
        (ImperfectionType::Hesitate, odds.hesitate),
    ]
    .into_iter()
    .find(|(_, p)| rng.random_bool(f64::from(p.clamp(0.0, 1.0))))
    .map(|(kind, _)| kind)
}

/// The single queued imperfection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PendingImperfection {
    pub kind: ImperfectionType,
    /// Seconds until execution.
    pub countdown: f32,
    /// How long the rig should hold the mistake.
    pub duration: f32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use descent_rules::{FatalPhase, SlideOutcome};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_fatal_never_missed() {
        let saturated = ImperfectionRates::new(1.0, 1.0, 1.0);
        let odds = imperfection_odds(EventKind::Fatal, saturated);

        assert_eq!(odds.miss, 0.0);
        assert!((odds.late - 0.5).abs() < 0.001);

        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..500 {
            assert_ne!(roll_imperfection(odds, &mut rng), Some(ImperfectionType::Miss));
        }
    }

    #[test]
    fn test_slide_and_stumble_modifiers() {
        let rates = ImperfectionRates::new(0.1, 0.2, 0.1);

        let slide = imperfection_odds(EventKind::Slide, rates);
        assert!((slide.miss - 0.15).abs() < 0.001);
        assert!((slide.late - 0.4).abs() < 0.001);

        let stumble = imperfection_odds(EventKind::Stumble, rates);
        assert!((stumble.miss - 0.2).abs() < 0.001);
        assert!((stumble.late - 0.2).abs() < 0.001);
    }

    #[test]
    fn test_rates_clamped() {
        let odds = imperfection_odds(EventKind::Slide, ImperfectionRates::new(0.9, 0.9, 0.9));
        assert_eq!(odds.miss, 1.0);
        assert_eq!(odds.late, 1.0);
    }

    #[test]
    fn test_roll_order() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let certain_miss = ImperfectionRates::new(1.0, 1.0, 1.0);
        assert_eq!(roll_imperfection(certain_miss, &mut rng), Some(ImperfectionType::Miss));

        let never = ImperfectionRates::new(0.0, 0.0, 0.0);
        assert_eq!(roll_imperfection(never, &mut rng), None);

        let only_hesitate = ImperfectionRates::new(0.0, 0.0, 1.0);
        assert_eq!(
            roll_imperfection(only_hesitate, &mut rng),
            Some(ImperfectionType::Hesitate)
        );
    }

    #[test]
    fn test_classify_events() {
        assert_eq!(
            EventKind::classify(&GameplayEvent::SlideStarted { speed: 3.0 }),
            Some(EventKind::Slide)
        );
        assert_eq!(
            EventKind::classify(&GameplayEvent::MicroSlip { severity: 0.2 }),
            Some(EventKind::Stumble)
        );
        assert_eq!(
            EventKind::classify(&GameplayEvent::FatalEventPhase {
                phase: FatalPhase::Aftermath
            }),
            Some(EventKind::Fatal)
        );
        assert_eq!(
            EventKind::classify(&GameplayEvent::SlideEnded {
                outcome: SlideOutcome::Injured
            }),
            Some(EventKind::Other)
        );
        assert_eq!(EventKind::classify(&GameplayEvent::SpeedSampled { speed: 9.0 }), None);
    }
}
