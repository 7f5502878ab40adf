//! Blob store with orphan sweeping.
//!
//! Blobs referenced by a live graph of chat sessions, messages and settings
//! are kept; picture and file blobs nothing points at any more are deleted
//! by [`services::sweep_service::Sweeper`].

pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
