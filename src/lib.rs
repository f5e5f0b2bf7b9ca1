// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod buffer;
pub mod chunker;
pub mod config;
pub mod ingest;
pub mod telemetry;
pub mod publish;
pub mod scheduler;
pub mod summary;

// ---- Re-exports for stable public API ----
pub use crate::buffer::AlertBuffer;
pub use crate::chunker::chunk;
pub use crate::ingest::sse::EventSource;
pub use crate::ingest::types::{AlertEvent, AlertSource};
pub use crate::publish::Poster;
