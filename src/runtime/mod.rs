//! # Runtime
//!
//! Process wiring for the controller.
//!
//! - `initialization`: rustls, tracing, metrics, HTTP server and client setup
//! - `watch_loop`: Controller watch loop with restart handling
//! - `error_policy`: Requeue policy for failed reconciliations and stream errors

pub mod error_policy;
pub mod initialization;
pub mod watch_loop;

pub use initialization::{initialize, InitializationResult};
pub use watch_loop::run_watch_loop;
