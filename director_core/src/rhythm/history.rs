//! Rolling intensity history and the rhythm phase classifier.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Where the pacing currently sits in the build/hold/release cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RhythmPhase {
    Buildup,
    Plateau,
    Release,
    #[default]
    Rest,
}

impl std::fmt::Display for RhythmPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RhythmPhase::Buildup => "BUILDUP",
            RhythmPhase::Plateau => "PLATEAU",
            RhythmPhase::Release => "RELEASE",
            RhythmPhase::Rest => "REST",
        };
        f.write_str(name)
    }
}

/// One smoothed intensity sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntensitySample {
    pub time: f32,
    pub intensity: f32,
}

/// Samples covering the last `window` seconds.
#[derive(Debug, Clone)]
pub struct IntensityHistory {
    window: f32,
    samples: VecDeque<IntensitySample>,
}

impl IntensityHistory {
    pub fn new(window: f32) -> Self {
        Self {
            window,
            samples: VecDeque::new(),
        }
    }

    /// Append a sample and evict everything older than the window.
    pub fn push(&mut self, time: f32, intensity: f32) {
        self.samples.push_back(IntensitySample {
            time,
            intensity: intensity.clamp(0.0, 1.0),
        });

        let horizon = time - self.window;
        while let Some(front) = self.samples.front() {
            if front.time < horizon {
                self.samples.pop_front();
            } else {
                break;
            }
        }
    }

    pub fn latest(&self) -> Option<IntensitySample> {
        self.samples.back().copied()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> impl Iterator<Item = &IntensitySample> {
        self.samples.iter()
    }

    /// Average of samples whose age (relative to the latest sample) lies in
    /// `(min_age, max_age]`, or in `[0, max_age]` when `min_age` is zero.
    pub fn average_by_age(&self, min_age: f32, max_age: f32) -> Option<f32> {
        let now = self.latest()?.time;
        let (sum, count) = self
            .samples
            .iter()
            .filter(|sample| {
                let age = now - sample.time;
                let after_min = if min_age <= 0.0 { age >= 0.0 } else { age > min_age };
                after_min && age <= max_age
            })
            .fold((0.0_f32, 0_usize), |(sum, count), sample| {
                (sum + sample.intensity, count + 1)
            });

        (count > 0).then(|| sum / count as f32)
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

/// Thresholds for [`classify`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhaseThresholds {
    pub recent_window: f32,
    pub reference_window: f32,
    pub trend: f32,
    pub plateau: f32,
}

/// Classify the rhythm phase from the history alone.
///
/// The trend is the average over the recent window minus the average over the
/// preceding stretch up to the reference window. Without a preceding stretch
/// the trend is zero.
pub fn classify(history: &IntensityHistory, thresholds: PhaseThresholds) -> RhythmPhase {
    let Some(latest) = history.latest() else {
        return RhythmPhase::Rest;
    };

    let recent = history
        .average_by_age(0.0, thresholds.recent_window)
        .unwrap_or(latest.intensity);
    let trend = history
        .average_by_age(thresholds.recent_window, thresholds.reference_window)
        .map(|reference| recent - reference)
        .unwrap_or(0.0);

    if trend > thresholds.trend {
        RhythmPhase::Buildup
    } else if trend < -thresholds.trend {
        RhythmPhase::Release
    } else if latest.intensity > thresholds.plateau {
        RhythmPhase::Plateau
    } else {
        RhythmPhase::Rest
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thresholds() -> PhaseThresholds {
        PhaseThresholds {
            recent_window: 5.0,
            reference_window: 15.0,
            trend: 0.1,
            plateau: 0.5,
        }
    }

    fn history_from(values: &[(f32, f32)]) -> IntensityHistory {
        let mut history = IntensityHistory::new(60.0);
        for (time, value) in values {
            history.push(*time, *value);
        }
        history
    }

    #[test]
    fn test_window_eviction() {
        let mut history = IntensityHistory::new(10.0);
        for step in 0..=30 {
            history.push(step as f32, 0.5);
        }

        assert_eq!(history.len(), 11);
        assert_eq!(history.samples().next().unwrap().time, 20.0);
    }

    #[test]
    fn test_empty_history_is_rest() {
        let history = IntensityHistory::new(60.0);
        assert_eq!(classify(&history, thresholds()), RhythmPhase::Rest);
    }

    #[test]
    fn test_rising_is_buildup() {
        let history = history_from(&[(0.0, 0.1), (5.0, 0.1), (8.0, 0.5), (10.0, 0.6)]);
        assert_eq!(classify(&history, thresholds()), RhythmPhase::Buildup);
    }

    #[test]
    fn test_falling_is_release() {
        let history = history_from(&[(0.0, 0.9), (4.0, 0.9), (8.0, 0.3), (10.0, 0.2)]);
        assert_eq!(classify(&history, thresholds()), RhythmPhase::Release);
    }

    #[test]
    fn test_flat_high_is_plateau_flat_low_is_rest() {
        let high = history_from(&[(0.0, 0.7), (5.0, 0.7), (10.0, 0.7)]);
        assert_eq!(classify(&high, thresholds()), RhythmPhase::Plateau);

        let low = history_from(&[(0.0, 0.2), (5.0, 0.2), (10.0, 0.2)]);
        assert_eq!(classify(&low, thresholds()), RhythmPhase::Rest);
    }

    #[test]
    fn test_classification_is_pure() {
        let history = history_from(&[(0.0, 0.1), (7.0, 0.4), (12.0, 0.8)]);
        let first = classify(&history, thresholds());
        let second = classify(&history.clone(), thresholds());
        assert_eq!(first, second);
    }
}
