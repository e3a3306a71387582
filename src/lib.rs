// ============================================================================
// leak-lab Library
// ============================================================================

pub mod app;
pub mod config;
pub mod driver;
pub mod error;
pub mod handlers;
pub mod jobs;
pub mod leak;
pub mod models;
pub mod random;
pub mod repository;
pub mod snapshot;
pub mod state;

pub use app::build_router;
pub use error::{AppError, AppResult};
