//! # Director Core
//!
//! The synthetic cinematographer for a Long Home descent. This crate consumes
//! `descent_rules` gameplay events, infers emotional pacing, and decides which
//! narrative shot should be on screen and when the virtual operator fumbles.
//!
//! ## Core Components
//!
//! - **signals**: Weighted, decaying signals and the total intensity
//! - **rhythm**: Smoothed intensity levels, rhythm phases and pacing limits
//! - **intent**: The shot intent state machine
//! - **operator**: Operator fatigue, stress, drift and ambient mistakes
//! - **director**: Cuts, the decision log and imperfection scheduling
//! - **cinematographer**: Owns the pipeline and the run lifecycle
//!
//! ## Design Philosophy
//!
//! - **Fixed order**: Every tick runs detector, rhythm, selector, operator, director
//! - **Single writer**: Each component owns its state; others only read it
//! - **Never fails**: Outside a descent everything degrades to a quiet no-op

pub mod camera;
pub mod cinematographer;
pub mod config;
pub mod director;
pub mod events;
pub mod intent;
pub mod operator;
pub mod rhythm;
pub mod signals;

pub use camera::*;
pub use cinematographer::*;
pub use config::*;
pub use director::*;
pub use events::*;
pub use intent::*;
pub use operator::*;
pub use rhythm::*;
pub use signals::*;
