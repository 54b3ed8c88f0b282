//! Signals - weighted, decaying records of what just happened on the mountain.
//!
//! - **Signal**: one active record per [`SignalType`], merged by max intensity
//! - **SignalDetector**: owns the active set, decay and the total intensity

mod detector;
mod signal;

pub use detector::*;
pub use signal::*;
