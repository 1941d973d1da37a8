//! Derator customer portal
//!
//! Backend-for-frontend for the customers of a pest-control provider:
//! - Session gate in front of every protected page and API route
//! - Per-session customer context with explicit account switching
//! - Scoped fetchers that drop responses meant for a previous customer
//! - Pure table/chart shaping of inspection, trend and schedule records
//! - Document relay for signed view URLs and attachment downloads

pub mod config;
pub mod error;
pub mod fetcher;
pub mod gate;
pub mod relay;
pub mod render;
pub mod server;
pub mod services;
pub mod session;
pub mod upstream;
pub mod utils;
pub mod views;

// Re-exports for convenience
pub use config::PortalConfig;
pub use error::{PortalError, PortalResult};
pub use server::{router, run_server, AppState};
