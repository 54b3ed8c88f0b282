//! Camera rig seam - the commands the director issues.
//!
//! The rig decides how a shot looks; the director only says which intent to
//! frame and when to fumble.

use descent_rules::Vec3;
use serde::{Deserialize, Serialize};

use crate::intent::ShotIntent;

/// Something that can physically frame shots.
pub trait CameraRig {
    fn set_shot_intent(&mut self, intent: ShotIntent);

    fn position_for_intent(&mut self, intent: ShotIntent, subject: Vec3);

    fn miss_shot(&mut self, duration: f32);

    fn arrive_late(&mut self, duration: f32);

    fn hesitate(&mut self, duration: f32);

    fn overcorrect(&mut self, _duration: f32) {}

    fn drift(&mut self, _duration: f32) {}

    fn reframe(&mut self, _duration: f32) {}
}

/// A command as issued to a rig.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum CameraCommand {
    SetShotIntent { intent: ShotIntent },
    PositionForIntent { intent: ShotIntent, subject: Vec3 },
    MissShot { duration: f32 },
    ArriveLate { duration: f32 },
    Hesitate { duration: f32 },
    Overcorrect { duration: f32 },
    Drift { duration: f32 },
    Reframe { duration: f32 },
}

/// Rig that records every command, for tests and replays.
#[derive(Debug, Clone, Default)]
pub struct RecordingRig {
    commands: Vec<CameraCommand>,
}

impl RecordingRig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> &[CameraCommand] {
        &self.commands
    }

    /// Intents set so far, in order.
    pub fn intents(&self) -> Vec<ShotIntent> {
        self.commands
            .iter()
            .filter_map(|command| match command {
                CameraCommand::SetShotIntent { intent } => Some(*intent),
                _ => None,
            })
            .collect()
    }

    pub fn last_intent(&self) -> Option<ShotIntent> {
        self.intents().last().copied()
    }

    pub fn take(&mut self) -> Vec<CameraCommand> {
        std::mem::take(&mut self.commands)
    }

    pub fn clear(&mut self) {
        self.commands.clear();
    }
}

impl CameraRig for RecordingRig {
    fn set_shot_intent(&mut self, intent: ShotIntent) {
        self.commands.push(CameraCommand::SetShotIntent { intent });
    }

    fn position_for_intent(&mut self, intent: ShotIntent, subject: Vec3) {
        self.commands
            .push(CameraCommand::PositionForIntent { intent, subject });
    }

    fn miss_shot(&mut self, duration: f32) {
        self.commands.push(CameraCommand::MissShot { duration });
    }

    fn arrive_late(&mut self, duration: f32) {
        self.commands.push(CameraCommand::ArriveLate { duration });
    }

    fn hesitate(&mut self, duration: f32) {
        self.commands.push(CameraCommand::Hesitate { duration });
    }

    fn overcorrect(&mut self, duration: f32) {
        self.commands.push(CameraCommand::Overcorrect { duration });
    }

    fn drift(&mut self, duration: f32) {
        self.commands.push(CameraCommand::Drift { duration });
    }

    fn reframe(&mut self, duration: f32) {
        self.commands.push(CameraCommand::Reframe { duration });
    }
}

/// Rig for when no camera is attached. Drops every command.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullRig;

impl CameraRig for NullRig {
    fn set_shot_intent(&mut self, _intent: ShotIntent) {}

    fn position_for_intent(&mut self, _intent: ShotIntent, _subject: Vec3) {}

    fn miss_shot(&mut self, _duration: f32) {}

    fn arrive_late(&mut self, _duration: f32) {}

    fn hesitate(&mut self, _duration: f32) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_rig() {
        let mut rig = RecordingRig::new();
        rig.set_shot_intent(ShotIntent::Tension);
        rig.position_for_intent(ShotIntent::Tension, Vec3::new(1.0, 2.0, 3.0));
        rig.drift(2.0);

        assert_eq!(rig.commands().len(), 3);
        assert_eq!(rig.last_intent(), Some(ShotIntent::Tension));

        let json = serde_json::to_string(&rig.commands()[2]).unwrap();
        assert_eq!(json, r#"{"command":"drift","duration":2.0}"#);

        assert_eq!(rig.take().len(), 3);
        assert!(rig.commands().is_empty());
    }

    #[test]
    fn test_optional_commands_default_to_noop() {
        let mut rig = NullRig;
        rig.overcorrect(1.0);
        rig.reframe(1.0);
        rig.set_shot_intent(ShotIntent::Release);
    }
}
