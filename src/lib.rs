//! Webpforge - concurrent batch image conversion to WebP.
//!
//! Collaborators submit raw image payloads, dispatch them as a batch, and
//! observe per-task progress, results, and failures through an in-memory
//! task store. All state is scoped to one session; there is no persistence
//! and no network surface.

pub mod codec;
pub mod conversion;
pub mod error;
pub mod export;
pub mod state;
