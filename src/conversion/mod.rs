//! Batch conversion pipeline.
//!
//! This module turns submitted payloads into WebP results:
//!
//! - `engine` drives one task through decode -> encode with a bounded
//!   encode wait
//! - `manager` fans conversion requests out over eligible tasks and
//!   exposes the collaborator command surface
//! - `settle` detects when a dispatched wave has fully settled, via an
//!   in-flight counter rather than a timing heuristic

mod engine;
mod manager;
mod settle;

pub use engine::{ConversionEngine, ENCODE_TIMEOUT};
pub use manager::{ConversionManager, NOTIFICATION_TTL};
pub use settle::WaveTracker;
