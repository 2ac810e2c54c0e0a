#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Command-line entry point for quiet-map.
//!
//! Wires the R2-backed document store and namespace configuration from
//! the environment and exposes every core operation: submit, list, zones,
//! transition, nearby, sweep, and aggregate. The sweep and aggregate
//! subcommands are what the production timer triggers invoke on their
//! hourly/nightly schedules.

use std::sync::Arc;

use clap::{Parser, Subcommand};
use quiet_map_lifecycle::{TransitionAction, proximity};
use quiet_map_repository::{Namespaces, ReportRepository};
use quiet_map_store::BlobStore;

#[derive(Parser)]
#[command(name = "quiet-map", about = "Crowd-sourced noise map toolchain")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Submit a new noise report
    Submit {
        /// Latitude in decimal degrees
        lat: f64,
        /// Longitude in decimal degrees
        lon: f64,
        /// Measured sound level in dB
        decibel: f64,
        /// Optional free-text annotation
        #[arg(long)]
        reason: Option<String>,
    },
    /// List active reports, newest first
    List,
    /// Print the published zones document
    Zones,
    /// Apply a lifecycle action (refresh|inactive) to one report
    Transition {
        /// Report id
        id: String,
        /// Action token: refresh or inactive
        action: String,
    },
    /// List active reports near a location, optionally transitioning them
    Nearby {
        /// Latitude in decimal degrees
        lat: f64,
        /// Longitude in decimal degrees
        lon: f64,
        /// Apply this action (refresh|inactive) to every match
        #[arg(long)]
        apply: Option<String>,
    },
    /// Archive expired or rejected reports (hourly timer job)
    Sweep,
    /// Rebuild the zones summary from the archive (nightly timer job)
    Aggregate,
}

fn parse_action(token: &str) -> Result<TransitionAction, String> {
    token
        .parse()
        .map_err(|_| format!("Unrecognized action: {token} (expected refresh or inactive)"))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init_custom_env("RUST_LOG");

    let cli = Cli::parse();

    let store = Arc::new(BlobStore::from_env()?);
    let repo = ReportRepository::new(store, Namespaces::from_env());
    repo.ensure_namespaces().await?;

    match cli.command {
        Command::Submit {
            lat,
            lon,
            decibel,
            reason,
        } => {
            let report = quiet_map_ingest::submit_report(
                &repo,
                &quiet_map_ingest::NewReport {
                    lat,
                    lon,
                    decibel,
                    reason,
                },
            )
            .await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::List => {
            let listing = quiet_map_query::list_active_reports(&repo).await?;
            println!("{}", serde_json::to_string_pretty(&listing)?);
        }
        Command::Zones => {
            let zones = quiet_map_query::get_zones(&repo).await?;
            println!("{}", serde_json::to_string_pretty(&zones)?);
        }
        Command::Transition { id, action } => {
            let action = parse_action(&action)?;
            let outcome = quiet_map_lifecycle::transition_report(&repo, &id, action).await?;
            println!(
                "{}",
                serde_json::json!({
                    "ok": true,
                    "action": action.as_ref(),
                    "archived": outcome.archived,
                })
            );
        }
        Command::Nearby { lat, lon, apply } => {
            if let Some(token) = apply {
                let action = parse_action(&token)?;
                let transitioned = proximity::apply_nearby(&repo, lat, lon, action).await?;
                println!(
                    "{}",
                    serde_json::json!({
                        "ok": true,
                        "action": action.as_ref(),
                        "transitioned": transitioned,
                    })
                );
            } else {
                let matches = proximity::find_nearby_active(&repo, lat, lon).await?;
                println!("{}", serde_json::to_string_pretty(&matches)?);
            }
        }
        Command::Sweep => {
            let archived = quiet_map_lifecycle::run_expiry_sweep(&repo).await?;
            log::info!("sweep complete");
            println!("{}", serde_json::json!({ "archived": archived }));
        }
        Command::Aggregate => {
            let zones = quiet_map_aggregate::run_aggregation(&repo).await?;
            log::info!("aggregation complete");
            println!("{}", serde_json::json!({ "zones": zones }));
        }
    }

    Ok(())
}
