//! Result interpretation
//!
//! Turns captured output into a structured or textual outcome.

pub mod outcome;

pub use outcome::{Outcome, ResultPipeline};
