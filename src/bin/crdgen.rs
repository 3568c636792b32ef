//! # CRD Generator
//!
//! Generates the Kubernetes CustomResourceDefinition YAML for the
//! `GeneratedSecret` resource from its Rust type definitions.
//!
//! ## Usage
//!
//! ```bash
//! # Print the CRD
//! cargo run --bin crdgen > config/crd/generatedsecret.yaml
//!
//! # Write it to a file
//! cargo run --bin crdgen -- --output config/crd/generatedsecret.yaml
//!
//! # Generate and apply directly
//! cargo run --bin crdgen | kubectl apply -f -
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use generated_secret_controller::crd::GeneratedSecret;
use kube::CustomResourceExt;

#[derive(Debug, Parser)]
#[command(name = "crdgen", about = "Generate the GeneratedSecret CRD YAML")]
struct Cli {
    /// Write the CRD to this file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let yaml = serde_yaml::to_string(&GeneratedSecret::crd())
        .context("Failed to serialize CRD to YAML")?;

    match cli.output {
        Some(path) => std::fs::write(&path, yaml)
            .with_context(|| format!("Failed to write CRD to {}", path.display()))?,
        None => print!("{yaml}"),
    }
    Ok(())
}
