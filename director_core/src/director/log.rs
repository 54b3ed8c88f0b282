//! Decision log - bounded record of what the director did and why.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::intent::ShotIntent;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionLogEntry {
    pub timestamp: f32,
    pub label: String,
    pub reason: String,
    /// Intent on screen when the decision was taken.
    pub intent: ShotIntent,
}

/// Ring buffer of decisions. The oldest entry is dropped on overflow.
#[derive(Debug, Clone)]
pub struct DecisionLog {
    capacity: usize,
    entries: VecDeque<DecisionLogEntry>,
}

impl DecisionLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: VecDeque::with_capacity(capacity.max(1)),
        }
    }

    pub fn push(&mut self, entry: DecisionLogEntry) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    pub fn record(&mut self, timestamp: f32, label: impl Into<String>, reason: impl Into<String>, intent: ShotIntent) {
        self.push(DecisionLogEntry {
            timestamp,
            label: label.into(),
            reason: reason.into(),
            intent,
        });
    }

    pub fn entries(&self) -> impl Iterator<Item = &DecisionLogEntry> {
        self.entries.iter()
    }

    pub fn last(&self) -> Option<&DecisionLogEntry> {
        self.entries.back()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Remove and return every entry, oldest first.
    pub fn drain(&mut self) -> Vec<DecisionLogEntry> {
        self.entries.drain(..).collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// One JSON object per line, oldest first.
    pub fn to_json_lines(&self) -> Result<String, serde_json::Error> {
        let mut out = String::new();
        for entry in &self.entries {
            out.push_str(&serde_json::to_string(entry)?);
            out.push('\n');
        }
        Ok(out)
    }
}
