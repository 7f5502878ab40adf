//! Core data models: blob keys and stored blob metadata, and the live graph
//! whose references decide which blobs are still in use.
//!
//! Models serialize as JSON via `serde`; `Blob` maps to the `blobs` table via
//! `sqlx::FromRow`.

pub mod blob;
pub mod graph;
