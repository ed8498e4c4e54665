//! Ingestion services
//!
//! Leaf-first: the normalizer is a pure transform, the upsert engine, session
//! tracker and field updater each own a pool handle, and the facade sequences
//! them per request.

pub mod ingestion;
pub mod normalizer;
pub mod session_tracker;
pub mod session_updater;
pub mod upsert_engine;

pub use ingestion::IngestionService;
pub use normalizer::{normalize, resolve};
pub use session_tracker::SessionTracker;
pub use session_updater::{SessionPatch, SessionUpdater, SESSION_FIELDS};
pub use upsert_engine::UpsertEngine;
