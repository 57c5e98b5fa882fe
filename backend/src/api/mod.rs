//! HTTP API module.
//!
//! Upload endpoint, run listing and the SSE log stream.

pub mod server;
pub mod types;

pub use server::{router, start_server, AppState};
pub use types::*;
