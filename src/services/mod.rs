//! Services: the blob store and graph adapters, reachability, the sweep
//! itself, and its scheduler.

pub mod graph_source;
pub mod reachability;
pub mod scheduler;
pub mod storage_service;
pub mod sweep_service;
