//! Generated Secret Controller Library
//!
//! This library provides the core functionality for the Generated Secret Controller:
//! a Kubernetes controller that generates credentials once per `GeneratedSecret`
//! and keeps identical copies of them as Secrets in every target namespace.
//!
//! ## Quick Start
//!
//! ```rust
//! use generated_secret_controller::prelude::*;
//! ```
//!
//! This brings commonly used types and traits into scope. For more specific imports,
//! use the individual modules.

pub mod config;
pub mod constants;
pub mod controller;
pub mod crd;
pub mod events;
pub mod generation;
pub mod observability;
pub mod prelude;
pub mod runtime;
pub mod server;
pub mod store;
