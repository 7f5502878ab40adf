//! Shared state handed to every handler.

use crate::services::{
    graph_source::GraphSource, storage_service::LocalBlobStore, sweep_service::Sweeper,
};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub store: LocalBlobStore,
    pub graph: Arc<dyn GraphSource>,
    pub sweeper: Arc<Sweeper>,
}
