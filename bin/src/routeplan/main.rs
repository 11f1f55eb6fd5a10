// Copyright 2021 Rayhaan Jaufeerally.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use eyre::{bail, Result, WrapErr};
use routeplan_policy::{compile_str, CompileError, ListKind, StateFile};
use tracing::{error, info};
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[clap(
    author = "Rayhaan Jaufeerally <rayhaan@rayhaan.ch>",
    version = "0.1",
    about = "Compiles router configuration into routing policy"
)]
struct Cli {
    /// Runtime list state file.
    #[arg(long, global = true, default_value = "/var/lib/routeplan/state.json")]
    state: PathBuf,

    #[clap(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure compiles the router configuration into a policy document.
    Configure {
        /// YAML router configuration.
        #[arg(long, default_value = "/etc/routeplan/routeplan.yaml")]
        config: PathBuf,
        /// Where to write the policy document. Printed to stdout if unset.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Manage the graceful shutdown peer list.
    GracefulShutdown {
        #[clap(subcommand)]
        action: ListAction,
    },
    /// Manage the quarantine peer list.
    Quarantine {
        #[clap(subcommand)]
        action: ListAction,
    },
}

#[derive(Subcommand)]
enum ListAction {
    /// Show the peers in the list.
    List,
    /// Add a peer, `*` matches any run of characters.
    Add { peer: String },
    /// Remove a peer.
    Remove { peer: String },
}

fn configure(state: &StateFile, config: PathBuf, output: Option<PathBuf>) -> Result<ExitCode> {
    let lists = state.load()?;
    let text = fs::read_to_string(&config)
        .wrap_err_with(|| format!("Failed to read {}", config.display()))?;

    let document = match compile_str(&text, &lists) {
        Ok(document) => document,
        Err(CompileError::Validation(errors)) => {
            for failure in &errors.0 {
                eprintln!("{}", failure);
            }
            error!("Configuration has {} validation failure(s)", errors.0.len());
            return Ok(ExitCode::FAILURE);
        }
        Err(e) => return Err(e.into()),
    };

    let json = document.to_json()?;
    match output {
        Some(path) => {
            fs::write(&path, json + "\n")
                .wrap_err_with(|| format!("Failed to write {}", path.display()))?;
            info!("Wrote policy for {} to {}", document.router_id, path.display());
        }
        None => println!("{}", json),
    }
    Ok(ExitCode::SUCCESS)
}

fn manage(state: &StateFile, kind: ListKind, action: ListAction) -> Result<()> {
    match action {
        ListAction::List => {
            for peer in state.list(kind)? {
                println!("{}", peer);
            }
        }
        ListAction::Add { peer } => state.add(kind, &peer)?,
        ListAction::Remove { peer } => state.remove(kind, &peer)?,
    }
    Ok(())
}

fn main() -> Result<ExitCode> {
    let args = Cli::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("routeplan=info,routeplan_policy=info")),
        )
        .init();

    let state = StateFile::new(&args.state);
    match args.command {
        Some(Commands::Configure { config, output }) => return configure(&state, config, output),
        Some(Commands::GracefulShutdown { action }) => {
            manage(&state, ListKind::GracefulShutdown, action)?
        }
        Some(Commands::Quarantine { action }) => manage(&state, ListKind::Quarantine, action)?,
        None => bail!("A subcommand must be specified."),
    };

    Ok(ExitCode::SUCCESS)
}
