//! HTTP server for Tallybook licensing and administrator account security.
//!
//! The binary wires the core services onto a SQLite database and serves:
//! - `GET  /api/health`
//! - `GET  /api/license/status`
//! - `POST /api/license/activate`
//! - `POST /api/license/generate-trial`
//! - `GET  /api/auth/emergency-status/{identity}`
//! - `POST /api/auth/emergency-reset`
//! - `POST /api/auth/login`

pub mod api;
pub mod config;
pub mod error;
pub mod keys;
pub mod state;

pub use api::build_router;
pub use config::ServerConfig;
pub use error::{ApiError, ErrorBody};
pub use state::AppState;
