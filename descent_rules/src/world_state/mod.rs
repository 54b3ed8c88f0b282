//! Run state - phase of the run, environment and the subject's position.

use serde::{Deserialize, Serialize};
use std::ops::{Add, Mul, Sub};
use uuid::Uuid;

/// Unique identifier for a descent run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn nil() -> Self {
        Self(Uuid::nil())
    }

    /// Fold the id into a 64-bit value, used when no explicit seed is given.
    pub fn to_seed(&self) -> u64 {
        let (hi, lo) = self.0.as_u64_pair();
        hi ^ lo.rotate_left(17)
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// World-space position (meters).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn length(&self) -> f32 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }
}

impl Add for Vec3 {
    type Output = Vec3;

    fn add(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vec3 {
    type Output = Vec3;

    fn sub(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f32> for Vec3 {
    type Output = Vec3;

    fn mul(self, rhs: f32) -> Vec3 {
        Vec3::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

/// Top-level phase of the game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum RunPhase {
    #[default]
    MainMenu,
    Planning,
    /// On the mountain. The only phase the camera director is active in.
    Descent,
    Paused,
    Completed,
    Dead,
}

impl RunPhase {
    pub fn is_descent(&self) -> bool {
        matches!(self, RunPhase::Descent)
    }
}

/// Result of a phase change, from the point of view of the descent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseTransition {
    /// Entered the descent from some other phase.
    DescentStarted,
    /// Left the descent for something other than the main menu.
    DescentEnded,
    ReturnedToMenu,
    /// Descent paused; state is kept.
    Suspended,
    Resumed,
    Unchanged,
}

/// Weather conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Weather {
    #[default]
    Clear,
    Cloudy,
    Windy,
    Snowing,
    Whiteout,
    Storm,
}

/// Environment state published by the weather collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentState {
    pub weather: Weather,
    /// Temperature in Celsius.
    pub temperature: f32,
    /// Wind speed in m/s.
    pub wind_speed: f32,
    /// Visibility from 0.0 (none) to 1.0 (perfect).
    pub visibility: f32,
}

impl Default for EnvironmentState {
    fn default() -> Self {
        Self {
            weather: Weather::Clear,
            temperature: 5.0,
            wind_speed: 2.0,
            visibility: 1.0,
        }
    }
}

impl EnvironmentState {
    /// Cold exposure from 0.0 (at or above freezing) to 1.0 (-20C or colder).
    pub fn cold_exposure(&self) -> f32 {
        (-self.temperature / 20.0).clamp(0.0, 1.0)
    }

    /// Wind exposure from 0.0 (calm) to 1.0 (25 m/s or more).
    pub fn wind_exposure(&self) -> f32 {
        let gust_modifier = match self.weather {
            Weather::Storm => 0.2,
            Weather::Whiteout => 0.1,
            _ => 0.0,
        };

        (self.wind_speed / 25.0 + gust_modifier).clamp(0.0, 1.0)
    }
}

/// The externally owned state of a run, as far as the camera layer cares.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RunState {
    pub phase: RunPhase,

    /// Seconds since the descent started.
    pub elapsed: f32,

    pub environment: EnvironmentState,

    pub subject_position: Vec3,
}

impl RunState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move to a new phase and report what it means for the descent.
    pub fn transition(&mut self, next: RunPhase) -> PhaseTransition {
        let previous = self.phase;
        self.phase = next;

        if previous == next {
            return PhaseTransition::Unchanged;
        }

        match (previous, next) {
            (_, RunPhase::MainMenu) => {
                *self = RunState::new();
                PhaseTransition::ReturnedToMenu
            }
            (RunPhase::Descent, RunPhase::Paused) => PhaseTransition::Suspended,
            (RunPhase::Paused, RunPhase::Descent) => PhaseTransition::Resumed,
            (_, RunPhase::Descent) => {
                self.elapsed = 0.0;
                PhaseTransition::DescentStarted
            }
            (RunPhase::Descent | RunPhase::Paused, _) => PhaseTransition::DescentEnded,
            _ => PhaseTransition::Unchanged,
        }
    }

    /// Advance the run clock while descending.
    pub fn advance(&mut self, dt: f32) {
        if self.phase.is_descent() {
            self.elapsed += dt.max(0.0);
        }
    }
}
