//! # Generated Secret Controller
//!
//! A Kubernetes controller that generates credentials once and propagates them
//! as identical Secrets across namespaces.
//!
//! ## Overview
//!
//! For every `GeneratedSecret` the controller:
//!
//! 1. **Generates the payload** - Random passwords, static values and values templated from an input secret
//! 2. **Fans out copies** - Creates one Secret per target namespace, all carrying the same data
//! 3. **Heals drift** - Restores copies modified or deleted outside the controller
//! 4. **Resyncs metadata** - Keeps labels and annotations of the copies in line with the resource
//! 5. **Cleans up** - Deletes or retains the copies when the resource is deleted
//!
//! ## Features
//!
//! - **Finalizer driven cleanup** with `Delete` and `Retain` policies
//! - **Prometheus metrics** on `/metrics`
//! - **Health probes** on `/healthz` and `/readyz`
//! - **Kubernetes events** for every copy created, updated or failed

use anyhow::Result;
use generated_secret_controller::runtime::{initialize, run_watch_loop};

#[tokio::main]
async fn main() -> Result<()> {
    let init = initialize().await?;
    run_watch_loop(init.client, init.reconciler, init.server_state).await
}
