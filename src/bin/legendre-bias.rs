// Copyright 2025 Mikael Lund
//
// Licensed under the Apache license, version 2.0 (the "license");
// you may not use this file except in compliance with the license.
// You may obtain a copy of the license at
//
//     http://www.apache.org/licenses/license-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the license is distributed on an "as is" basis,
// without warranties or conditions of any kind, either express or implied.
// See the license for the specific language governing permissions and
// limitations under the license.

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use indicatif::ProgressBar;
use legendre_bias::{
    communicator::{Communicator, SingleWalker, WalkerGroup},
    dynamics::{BrownianDynamics, RunSummary},
    input::Input,
    snapshot::SystemSnapshot,
    BasisError, Method,
};
use pretty_env_logger::env_logger::DEFAULT_FILTER_ENV;
use serde::Serialize;
use std::{io::Write, path::PathBuf};

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run Brownian dynamics with a basis-function bias
    #[clap(arg_required_else_help = true)]
    Run {
        /// Input file in YAML format
        #[clap(long, short = 'i')]
        input: PathBuf,
        /// Number of cooperating walkers, each in its own thread
        #[clap(long, short = 'w', default_value_t = 1)]
        walkers: usize,
    },
}

#[derive(Parser)]
#[clap(version, about, long_about = None)]
pub struct Args {
    #[clap(subcommand)]
    pub command: Commands,

    /// Verbose output. See more with e.g. RUST_LOG=Trace
    #[clap(long, short = 'v', action)]
    pub verbose: bool,
    /// Output file in YAML format
    #[clap(long, short = 'o', default_value = "output.yaml")]
    pub output: PathBuf,
}

fn main() {
    if let Err(err) = do_main() {
        eprintln!("Error: {}", &err);
        std::process::exit(1);
    }
}

fn do_main() -> Result<()> {
    let args = Args::parse();
    if args.verbose && std::env::var(DEFAULT_FILTER_ENV).is_err() {
        std::env::set_var(DEFAULT_FILTER_ENV, "Debug");
    }
    pretty_env_logger::init();

    let mut yaml_output = std::fs::File::create(args.output)?;

    match args.command {
        Commands::Run { input, walkers } => {
            run(input, walkers, &mut yaml_output)?;
        }
    }
    Ok(())
}

/// Helper function to serialize data to an existing YAML file
fn write_yaml<T: serde::Serialize>(
    data: &T,
    output: &mut std::fs::File,
    key: Option<&str>,
) -> Result<()> {
    match key {
        Some(key) => {
            let mut wrapper = std::collections::BTreeMap::new();
            wrapper.insert(key.to_string(), data);
            let yaml = serde_yaml::to_string(&wrapper)?;
            output.write_all(yaml.as_bytes())?;
        }
        None => {
            let yaml = serde_yaml::to_string(data)?;
            output.write_all(yaml.as_bytes())?;
        }
    }
    Ok(())
}

/// What one walker reports at the end of a run.
#[derive(Debug, Serialize)]
struct WalkerReport {
    rank: usize,
    summary: RunSummary,
    method: Option<serde_yaml::Value>,
}

fn run_walker(
    input: &Input,
    system: &BrownianDynamics,
    communicator: Box<dyn Communicator>,
    progress: &ProgressBar,
) -> Result<WalkerReport> {
    let rank = communicator.rank();
    let mut method = input.method.build(input.grid(), communicator)?;
    let mut cvs = input.build_cvs(system.num_particles())?;
    let summary = system.run(&mut method, &mut cvs, rank, |iteration| {
        if rank == 0 {
            progress.set_position(iteration as u64);
        }
    })?;
    Ok(WalkerReport {
        rank,
        summary,
        method: Method::<SystemSnapshot>::to_yaml(&method),
    })
}

fn run(input: PathBuf, walkers: usize, yaml_output: &mut std::fs::File) -> Result<()> {
    if walkers == 0 {
        anyhow::bail!("at least one walker is required");
    }
    let input = Input::from_file(&input)?;
    let system = input.system.build()?;
    log::info!(
        "{} walker(s), {} particle(s), {} step(s)",
        walkers,
        system.num_particles(),
        system.steps()
    );

    write_yaml(&input.grid, yaml_output, Some("grid"))?;
    write_yaml(&input.method, yaml_output, Some("method"))?;

    let progress = ProgressBar::new(system.steps() as u64);
    let results: Vec<Result<WalkerReport>> = if walkers == 1 {
        vec![run_walker(&input, &system, Box::new(SingleWalker), &progress)]
    } else {
        std::thread::scope(|scope| {
            let threads: Vec<_> = WalkerGroup::new(walkers)
                .into_iter()
                .map(|walker| {
                    let (input, system, progress) = (&input, &system, &progress);
                    scope.spawn(move || {
                        let peers = walker.clone();
                        run_walker(input, system, Box::new(walker), progress).inspect_err(|err| {
                            // release walkers still waiting for this one
                            peers.abort(&err.to_string());
                        })
                    })
                })
                .collect();
            threads
                .into_iter()
                .map(|thread| {
                    thread
                        .join()
                        .unwrap_or_else(|_| Err(anyhow!("walker thread panicked")))
                })
                .collect()
        })
    };
    progress.finish();

    let (reports, errors): (Vec<_>, Vec<_>) = results.into_iter().partition(Result::is_ok);
    if !errors.is_empty() {
        // report the cause rather than the abort it triggered in other walkers
        let mut errors: Vec<anyhow::Error> = errors.into_iter().filter_map(Result::err).collect();
        let is_abort = |err: &anyhow::Error| {
            matches!(
                err.downcast_ref::<BasisError>(),
                Some(BasisError::Aborted { .. })
            )
        };
        let cause = errors.iter().position(|err| !is_abort(err)).unwrap_or(0);
        return Err(errors.swap_remove(cause));
    }
    let reports: Vec<WalkerReport> = reports.into_iter().filter_map(Result::ok).collect();
    write_yaml(&reports, yaml_output, Some("walkers"))?;
    Ok(())
}
