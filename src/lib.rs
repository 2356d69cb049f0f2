// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod api;
pub mod config;
pub mod engine;
pub mod enrich;
pub mod format;
pub mod ingest;
pub mod ledger;
pub mod logging;
pub mod metrics;
pub mod normalize;
pub mod publish;
pub mod quality;
pub mod scheduler;
pub mod service;
pub mod state;
pub mod types;

// ---- Re-exports for stable public API ----
pub use crate::api::router;
pub use crate::engine::{SelectOptions, SelectionEngine};
pub use crate::service::{PublishOutcome, PublishService};
pub use crate::types::{CandidateItem, FormattedPost};
