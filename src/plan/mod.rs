//! Request geometry planning.
//!
//! Turns a [`ScaleRequest`] plus a resolution set into either a raw file
//! delivery or an immutable [`crate::backend::TransformJob`] for the worker
//! pool.

mod planner;
mod request;

pub use planner::{plan, Plan, PlannerConfig};
pub use request::{OutputFormat, ResolutionPreference, ScaleMode, ScaleRequest, SendMode};
