//! # Descent Rules
//!
//! The vocabulary of a Long Home descent: gameplay events, movement and terrain
//! mechanics, and run state. This crate is what the simulation publishes and
//! does not contain any camera or pacing logic.

pub mod events;
pub mod mechanics;
pub mod world_state;

pub use events::*;
pub use mechanics::*;
pub use world_state::*;
