//! Defines routes for the blob store, the live graph and the sweep.
//!
//! ## Structure
//! - **Health**
//!   - `GET    /healthz`, `GET /readyz`
//!
//! - **Blob endpoints**
//!   - `GET    /blobs` — list blobs (supports prefix, max-keys, continuation-token)
//!   - `PUT    /blobs/{*key}` — upload blob
//!   - `GET    /blobs/{*key}` — download blob
//!   - `HEAD   /blobs/{*key}` — retrieve metadata only
//!   - `DELETE /blobs/{*key}` — delete blob
//!
//! - **Live graph and sweep**
//!   - `GET    /state`, `PUT /state` — read or replace the live graph
//!   - `POST   /sweep` — run one sweep and return its report

use crate::{
    handlers::{
        blob_handlers::{delete_blob, get_blob, head_blob, list_blobs, put_blob},
        health_handlers::{healthz, readyz},
        sweep_handlers::{get_state, put_state, run_sweep},
    },
    state::AppState,
};
use axum::{
    Router,
    routing::{get, post, put},
};

/// Build the router. Handlers share `AppState`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/blobs", get(list_blobs))
        .route(
            "/blobs/{*key}",
            put(put_blob)
                .get(get_blob)
                .head(head_blob)
                .delete(delete_blob),
        )
        .route("/state", get(get_state).put(put_state))
        .route("/sweep", post(run_sweep))
}
