use std::{collections::BTreeMap, path::PathBuf, time::Duration};

use anyhow::{Context, Error, anyhow, bail};
use clap::{Parser, Subcommand};
use medtrial::{
    eval::InputValues,
    garble::lower,
    program::Program,
    registry::{self, Registration},
    session::{SessionConfig, run_session},
};
use serde_json::json;
use tokio::fs;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// Inspect, lower and simulate programs for privacy-preserving clinical trial matching.
#[derive(Debug, Parser)]
#[command(name = "medtrial", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Prints the computation graph of a program as JSON, together with its fingerprint.
    Graph {
        /// The name of the registered program.
        #[arg(long, default_value = "medical_research")]
        program: String,
    },
    /// Prints the Garble source code computing the outputs of a single party.
    Garble {
        /// The name of the party whose view is lowered.
        #[arg(long)]
        party: String,
        /// The name of the registered program.
        #[arg(long, default_value = "medical_research")]
        program: String,
    },
    /// Simulates a session with a trusted evaluator and prints the outputs of every party.
    Run {
        /// A JSON file mapping party names to their inputs, e.g. `{"Party1": {"age": 30}}`.
        #[arg(long)]
        inputs: PathBuf,
        /// The name of the registered program.
        #[arg(long, default_value = "medical_research")]
        program: String,
        /// Only prints the outputs of this party.
        #[arg(long)]
        party: Option<String>,
        /// Seconds a participant waits for a message before giving up.
        #[arg(long, default_value_t = 60)]
        timeout: u64,
    },
}

fn load(name: &str) -> Result<(Program, &'static Registration), Error> {
    let Some(registered) = registry::lookup(name) else {
        let known = registry::names().collect::<Vec<_>>().join(", ");
        bail!("unknown program '{name}', expected one of: {known}");
    };
    let prg = (registered.entry)();
    prg.check()
        .with_context(|| format!("program '{name}' is malformed"))?;
    debug!(
        program = name,
        nodes = prg.nodes().len(),
        outputs = prg.outputs().len(),
        "loaded program"
    );
    Ok((prg, registered))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();
    match cli.command {
        Command::Graph { program } => {
            let (prg, _) = load(&program)?;
            let fingerprint = prg.fingerprint().context("could not fingerprint program")?;
            let graph = json!({
                "name": program,
                "fingerprint": fingerprint,
                "program": prg,
            });
            println!("{}", serde_json::to_string_pretty(&graph)?);
        }
        Command::Garble { party, program } => {
            let (prg, _) = load(&program)?;
            let Some(id) = prg.party_id(&party) else {
                let known: Vec<_> = prg.parties().iter().map(|p| p.name.as_str()).collect();
                let known = known.join(", ");
                bail!("unknown party '{party}', expected one of: {known}");
            };
            let lowered = lower(&prg, id)
                .with_context(|| format!("could not lower the view of '{party}'"))?;
            lowered
                .compile()
                .with_context(|| format!("the view of '{party}' does not compile"))?;
            print!("{}", lowered.source);
        }
        Command::Run {
            inputs,
            program,
            party,
            timeout,
        } => {
            let (prg, registered) = load(&program)?;
            let json = fs::read_to_string(&inputs)
                .await
                .with_context(|| format!("could not read '{}'", inputs.display()))?;
            let values: InputValues = serde_json::from_str(&json)
                .with_context(|| format!("'{}' has an invalid format", inputs.display()))?;
            for warning in (registered.input_check)(&values) {
                eprintln!("warning: {warning}");
            }
            let config = SessionConfig {
                recv_timeout: Duration::from_secs(timeout),
                ..Default::default()
            };
            let mut outputs = run_session(&prg, &values, &config)
                .await
                .context("session failed")?;
            info!("received outputs of {} parties", outputs.len());
            let outputs = match party {
                Some(party) => {
                    let view = outputs
                        .remove(&party)
                        .ok_or_else(|| anyhow!("unknown party '{party}'"))?;
                    BTreeMap::from([(party, view)])
                }
                None => outputs,
            };
            println!("{}", serde_json::to_string_pretty(&outputs)?);
        }
    }
    Ok(())
}
