// Copyright (c) 2025 Cloudflare, Inc.
// Licensed under the BSD-3-Clause license found in the LICENSE file or at https://opensource.org/licenses/BSD-3-Clause

//! Verifies key transparency responses saved as JSON and records the accepted tree heads.
//!
//! ```text
//! kt --config kt.json --state kt-state.json search --request req.json --response resp.json
//! ```
//!
//! On success the verified result is printed to stdout and the state file is updated. A
//! rejected response leaves the state untouched and exits with status 2.

use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use kt_verify::{
    verify_distinguished, verify_monitor, verify_search, DistinguishedRequest,
    DistinguishedResponse, LastSeen, MonitorRequest, MonitorResponse, SearchRequest,
    SearchResponse, TrustState, VerificationError,
};
use log::{error, info};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

mod checkpoint;
mod logs;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Verifier configuration
    #[arg(long, default_value = "kt.json")]
    config: PathBuf,
    /// Tree heads accepted so far; created on first use
    #[arg(long, default_value = "kt-state.json")]
    state: PathBuf,
    /// Logging level (error, warn, info, debug, trace), overriding the configured one
    #[arg(long)]
    log_level: Option<String>,
    /// Evaluation time as RFC 3339; defaults to the current time
    #[arg(long)]
    now: Option<DateTime<Utc>>,
}

#[derive(Subcommand, Clone, Debug)]
enum Commands {
    /// Verify a distinguished-key response
    Distinguished(Exchange),
    /// Verify a search response
    Search(Exchange),
    /// Verify a monitoring response
    Monitor(Exchange),
}

#[derive(Args, Clone, Debug)]
struct Exchange {
    /// The request as sent to the service
    #[arg(long)]
    request: PathBuf,
    /// The service's response
    #[arg(long)]
    response: PathBuf,
}

/// Verifies the exchange named by `command`, returning the report and the state to persist.
fn verify(command: &Commands, trust: &TrustState<'_>) -> Result<(Value, LastSeen)> {
    let last_seen = trust.last_seen;
    Ok(match command {
        Commands::Distinguished(x) => {
            let request: DistinguishedRequest = checkpoint::read_json(&x.request)?;
            let response: DistinguishedResponse = checkpoint::read_json(&x.response)?;
            let head = verify_distinguished(&request, &response, trust)?;
            (serde_json::to_value(head)?, last_seen.accept_distinguished(head))
        }
        Commands::Search(x) => {
            let request: SearchRequest = checkpoint::read_json(&x.request)?;
            let response: SearchResponse = checkpoint::read_json(&x.response)?;
            let result = verify_search(&request, &response, trust)?;
            (serde_json::to_value(&result)?, last_seen.accept(result.tree_head))
        }
        Commands::Monitor(x) => {
            let request: MonitorRequest = checkpoint::read_json(&x.request)?;
            let response: MonitorResponse = checkpoint::read_json(&x.response)?;
            let result = verify_monitor(&request, &response, trust)?;
            (serde_json::to_value(&result)?, last_seen.accept(result.tree_head))
        }
    })
}

fn run(cli: &Cli) -> Result<Value> {
    let conf = checkpoint::load_config(&cli.config)?;
    logs::init(cli.log_level.as_deref().or(conf.logging_level.as_deref()));
    let config = checkpoint::public_config(&conf)?;
    let trust = TrustState {
        config: &config,
        last_seen: checkpoint::load_state(&cli.state)?,
        now: cli.now.unwrap_or_else(Utc::now).timestamp_millis(),
    };

    verify_and_record(&cli.command, &trust, &cli.state)
}

/// Verifies the exchange and, only once it is accepted, replaces the state at `state`.
fn verify_and_record(command: &Commands, trust: &TrustState<'_>, state: &Path) -> Result<Value> {
    let (report, next) = verify(command, trust)?;
    checkpoint::save_state(state, &next)?;
    if let Some(head) = next.last {
        info!(tree_size = head.tree_size, timestamp = head.timestamp; "response accepted");
    }
    Ok(report)
}

/// The report for a response the verifier rejected, or `None` if `err` is not a rejection.
fn rejection_report(err: &anyhow::Error) -> Option<Value> {
    let rejected = err.downcast_ref::<VerificationError>()?;
    Some(json!({
        "accepted": false,
        "kind": format!("{:?}", rejected.kind()),
        "error": rejected.to_string(),
    }))
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(&cli) {
        Ok(report) => {
            println!("{report:#}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            logs::init(cli.log_level.as_deref());
            match rejection_report(&err) {
                Some(report) => {
                    println!("{report:#}");
                    ExitCode::from(2)
                }
                None => {
                    error!("{err:#}");
                    ExitCode::FAILURE
                }
            }
        }
    }
}
