pub mod blob_handlers;
pub mod health_handlers;
pub mod sweep_handlers;
