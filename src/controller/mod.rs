//! # Controller
//!
//! Core controller modules for the GeneratedSecret controller.
//!
//! - `reconciler`: Lifecycle state machine, classification, fan-out and cleanup
//! - `retry`: Refetch-and-retry writes under optimistic concurrency

pub mod reconciler;
pub mod retry;
