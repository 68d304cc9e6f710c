use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Once;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use common::SimConfig;
use svc_sim::Simulator;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let format = std::env::var("SVCSIM_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

        if format.eq_ignore_ascii_case("json") {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter.clone())
                .with_target(true)
                .with_writer(std::io::stderr)
                .json()
                .flatten_event(true)
                .init();
        } else {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_target(true)
                .with_writer(std::io::stderr)
                .compact()
                .init();
        }
    });
}

#[derive(Parser)]
#[command(name = "svcctl")]
#[command(about = "Drive an in-process Storwize/SVC CLI simulator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Default)]
struct SimArgs {
    /// YAML file seeding systems, pools and nodes
    #[arg(long)]
    config: Option<PathBuf>,
    /// Arm a one-shot fault, e.g. `lsfcmap=speed_up` or `mkvdisk=CMMVC6035E`
    #[arg(long = "inject", value_name = "CMD=FAULT")]
    inject: Vec<String>,
    /// Print every store as JSON once the commands have run
    #[arg(long)]
    dump_state: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single command
    Exec {
        #[command(flatten)]
        sim: SimArgs,
        /// Command tokens, after `--`
        #[arg(last = true, required = true)]
        tokens: Vec<String>,
    },
    /// Run one command per line of a file
    Script {
        /// Script path; blank lines and `#` comments are skipped
        #[arg(short, long)]
        file: PathBuf,
        #[command(flatten)]
        sim: SimArgs,
        /// Carry on after a failing command
        #[arg(long)]
        keep_going: bool,
    },
}

fn build_simulator(args: &SimArgs) -> Result<Simulator> {
    let config = match &args.config {
        Some(path) => SimConfig::load(path)
            .with_context(|| format!("Failed to load simulator config {}", path.display()))?,
        None => SimConfig::default(),
    };
    let mut sim = Simulator::new(config).context("Invalid simulator config")?;
    for entry in &args.inject {
        let Some((cmd, fault)) = entry.split_once('=') else {
            bail!("--inject expects CMD=FAULT, got `{}`", entry);
        };
        sim.error_injection(cmd, fault)
            .with_context(|| format!("Cannot inject `{}`", entry))?;
        debug!(cmd, fault, "fault armed from command line");
    }
    Ok(sim)
}

/// Split a script line on whitespace. Double quotes group words and stay
/// on the token, so `-mdiskgrp "openstack"` reaches the simulator quoted.
fn split_line(line: &str) -> Result<Vec<String>> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    for ch in line.chars() {
        match ch {
            '"' => {
                quoted = !quoted;
                current.push(ch);
            }
            c if c.is_whitespace() && !quoted => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if quoted {
        bail!("Unterminated quote in `{}`", line);
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    Ok(tokens)
}

/// Run one command and echo its output. Returns whether it succeeded.
fn run_command(sim: &mut Simulator, tokens: &[String]) -> Result<bool> {
    let output = sim
        .execute(tokens, false)
        .with_context(|| format!("Command rejected: {}", tokens.join(" ")))?;
    if !output.stdout.is_empty() {
        println!("{}", output.stdout);
    }
    if !output.stderr.is_empty() {
        eprintln!("{}", output.stderr);
    }
    Ok(output.is_success())
}

/// Run every command in `script`; stops at the first failure unless
/// `keep_going`. Returns the number of failed commands.
fn run_script(sim: &mut Simulator, script: &str, keep_going: bool) -> Result<usize> {
    let mut failures = 0;
    for (idx, line) in script.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let tokens = split_line(line).with_context(|| format!("Line {}", idx + 1))?;
        if !run_command(sim, &tokens).with_context(|| format!("Line {}", idx + 1))? {
            failures += 1;
            if !keep_going {
                break;
            }
        }
    }
    Ok(failures)
}

fn dump_state(sim: &Simulator) -> Result<()> {
    let json = serde_json::to_string_pretty(&sim.snapshot()).context("Failed to serialise state")?;
    println!("{}", json);
    Ok(())
}

fn main() -> Result<ExitCode> {
    init_tracing();
    let cli = Cli::parse();

    let (sim, dump, failures) = match cli.command {
        Commands::Exec { sim: args, tokens } => {
            let mut sim = build_simulator(&args)?;
            let failures = usize::from(!run_command(&mut sim, &tokens)?);
            (sim, args.dump_state, failures)
        }
        Commands::Script {
            file,
            sim: args,
            keep_going,
        } => {
            let script = fs::read_to_string(&file)
                .with_context(|| format!("Failed to read script {}", file.display()))?;
            let mut sim = build_simulator(&args)?;
            let failures = run_script(&mut sim, &script, keep_going)?;
            info!(script = %file.display(), failures, "script finished");
            (sim, args.dump_state, failures)
        }
    };

    if dump {
        dump_state(&sim)?;
    }
    Ok(if failures == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
