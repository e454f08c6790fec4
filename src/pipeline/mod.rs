//! Pipeline entry points.
//!
//! - `decide`: compare the newest record against the watermark
//! - `Pipeline::run_once`: one fetch → detect → publish → record attempt

pub mod detect;
pub mod run;

pub use detect::{Decision, decide};
pub use run::{Pipeline, RunReport, RunState};
