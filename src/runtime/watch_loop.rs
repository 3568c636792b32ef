//! # Watch Loop
//!
//! Controller watch loop that monitors GeneratedSecret resources, and the
//! secrets they own, and triggers reconciliation when changes are detected.

use crate::config::ControllerConfig;
use crate::constants::{LABEL_OWNER_NAME, LABEL_OWNER_NAMESPACE};
use crate::controller::reconciler::{reconcile, Reconciler};
use crate::crd::GeneratedSecret;
use crate::runtime::error_policy::{
    classify_stream_error, handle_reconciliation_error, WatchErrorAction,
};
use crate::server::ServerState;
use futures::StreamExt;
use k8s_openapi::api::core::v1::Secret;
use kube::api::Api;
use kube::runtime::reflector::ObjectRef;
use kube::{Client, ResourceExt};
use kube_runtime::{controller, watcher, Controller};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Map a secret event back to the GeneratedSecret owning the secret
#[must_use]
pub fn owner_of(secret: &Secret) -> Option<ObjectRef<GeneratedSecret>> {
    let labels = secret.labels();
    let name = labels.get(LABEL_OWNER_NAME)?;
    let namespace = labels.get(LABEL_OWNER_NAMESPACE)?;
    Some(ObjectRef::new(name).within(namespace))
}

/// GeneratedSecret API scoped to `WATCH_NAMESPACE`, or all namespaces
#[must_use]
pub fn resource_api(client: Client, config: &ControllerConfig) -> Api<GeneratedSecret> {
    match config.watch_namespace.as_deref() {
        Some(namespace) => Api::namespaced(client, namespace),
        None => Api::all(client),
    }
}

/// Run the controller watch loop
///
/// Reconciles GeneratedSecrets on every change and whenever a secret carrying
/// ownership labels changes, so out-of-band edits and deletions of copies are
/// caught. Handles graceful shutdown and restarts the controller when its
/// stream ends.
pub async fn run_watch_loop(
    client: Client,
    reconciler: Arc<Reconciler>,
    server_state: Arc<ServerState>,
) -> Result<(), anyhow::Error> {
    let config = Arc::clone(&reconciler.config);
    let restart_delay = config.watch_restart_delay_duration();

    // Mark server as not ready when SIGTERM/SIGINT is received
    let shutdown_server_state = Arc::clone(&server_state);
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("Received shutdown signal (SIGINT/SIGTERM), initiating graceful shutdown...");
        shutdown_server_state.set_ready(false);
    });

    loop {
        if !server_state.is_ready() {
            info!("Shutdown requested, exiting watch loop");
            break;
        }

        let resources = resource_api(client.clone(), &config);
        let secrets: Api<Secret> = Api::all(client.clone());

        info!(
            namespace = config.watch_namespace.as_deref().unwrap_or("*"),
            concurrency = config.max_concurrent_reconciliations,
            "Starting controller watch loop..."
        );
        Controller::new(resources, watcher::Config::default())
            .watches(
                secrets,
                watcher::Config::default().labels(LABEL_OWNER_NAME),
                |secret| owner_of(&secret),
            )
            .with_config(
                controller::Config::default().concurrency(config.max_concurrent_reconciliations),
            )
            .shutdown_on_signal()
            .run(reconcile, handle_reconciliation_error, Arc::clone(&reconciler))
            .for_each(|result| async move {
                match result {
                    Ok((object, action)) => {
                        debug!(
                            resource.name = %object.name,
                            resource.namespace = object.namespace.as_deref().unwrap_or(""),
                            action = ?action,
                            "watch.event.reconciled"
                        );
                    }
                    Err(e) => {
                        let error_string = format!("{e:?}");
                        if let WatchErrorAction::Backoff(delay) =
                            classify_stream_error(&error_string, restart_delay)
                        {
                            tokio::time::sleep(delay).await;
                        }
                    }
                }
            })
            .await;

        if !server_state.is_ready() {
            info!("Shutdown requested, exiting watch loop");
            break;
        }

        warn!(
            "Controller watch stream ended, restarting in {} seconds...",
            restart_delay.as_secs()
        );
        tokio::time::sleep(restart_delay).await;
    }

    info!("Controller stopped gracefully");
    Ok(())
}
