//! HTTP API for subtask suggestions.
//!
//! ## Endpoints
//!
//! - `POST /api/ai/suggest-subtasks` - Split a task into subtasks
//! - `GET /api/health` - Health check with provider details
//! - `GET /` - Plain-text liveness message

mod error;
mod routes;
pub mod types;

pub use error::ApiError;
pub use routes::{router, serve, AppState};
pub use types::*;
