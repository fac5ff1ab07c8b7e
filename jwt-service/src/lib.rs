pub mod app;
pub mod config;
pub mod handlers;
pub mod metrics;

pub use app::{router, AppState};
