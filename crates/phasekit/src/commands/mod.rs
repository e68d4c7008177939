//! Command implementations.
//!
//! Each submodule builds the probes and controllers for one command; the
//! replay itself and the reporting it shares live here.

mod count;
mod regions;
mod sample;

use std::fs::{self, File};
use std::io::BufReader;

use phasekit::replay::{Replay, ReplayConfig, ReplaySummary, StopReason};
use phasekit::Result;
use tracing::error;

use crate::cli::{Cli, Commands, EXIT_FAILURE, EXIT_SUCCESS, ReplayArgs};
use crate::terminal::{self, Spinner};

/// Dispatch CLI command to the appropriate handler.
pub fn run_command(cli: &Cli) -> i32 {
    let result = match &cli.command {
        Commands::Count {
            replay,
            targets,
            insts,
            update_threshold,
            on_target,
        } => count::cmd_count(replay, targets, *insts, *update_threshold, *on_target),
        Commands::Regions {
            replay,
            region,
            top,
        } => regions::cmd_regions(replay, region, *top),
        Commands::Simpoint {
            replay,
            starts,
            warmup,
        } => sample::cmd_simpoint(replay, starts, *warmup),
        Commands::Looppoint {
            replay,
            region,
            budget,
            update_relatives,
        } => sample::cmd_looppoint(replay, region, *budget, *update_relatives),
        Commands::Smarts {
            replay,
            k,
            unit,
            warmup,
            log,
        } => sample::cmd_smarts(replay, *k, *unit, *warmup, log.as_deref()),
    };

    match result {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            error!(error = %e, "command failed");
            terminal::error(&e.to_string());
            EXIT_FAILURE
        }
    }
}

/// Base replay config from the shared arguments.
fn base_config(args: &ReplayArgs) -> ReplayConfig {
    ReplayConfig::default()
        .with_cores(args.cores)
        .with_costs(args.costs())
        .with_max_insts(args.max_insts)
}

/// Replay the trace, then write recorded statistics into the output directory.
fn execute(args: &ReplayArgs, mut replay: Replay) -> Result<(Replay, ReplaySummary)> {
    fs::create_dir_all(&args.outdir)?;
    let reader = BufReader::new(File::open(&args.trace)?);

    let spinner = Spinner::new(format!("Replaying {}", args.trace.display()));
    let summary = match replay.run(reader) {
        Ok(summary) => summary,
        Err(e) => {
            spinner.finish_with_failure("Replay failed");
            return Err(e);
        }
    };
    spinner.finish_with_success(&describe(&summary));

    if !replay.host().dumps().is_empty() {
        let path = args.outdir.join("stats.txt");
        replay.host().write_stats(&path)?;
        terminal::info(&format!("Statistics written to {}", path.display()));
    }
    Ok((replay, summary))
}

fn describe(summary: &ReplaySummary) -> String {
    let insts: u64 = summary.insts.iter().sum();
    let stop = match summary.stop {
        StopReason::TraceEnd => "trace end".to_string(),
        StopReason::Exit(event) => format!("{event} exit"),
    };
    format!(
        "Replayed {insts} instructions on {} cores in {} ticks (stopped at {stop})",
        summary.insts.len(),
        summary.tick
    )
}

fn print_checkpoints(summary: &ReplaySummary) {
    if summary.checkpoints.is_empty() {
        println!("No checkpoints taken.");
        return;
    }
    println!("Checkpoints:");
    for path in &summary.checkpoints {
        println!("  {}", path.display());
    }
}
