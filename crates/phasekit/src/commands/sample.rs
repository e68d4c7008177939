//! SimPoint, LoopPoint and SMARTS commands.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use phasekit::replay::{CoreMode, Replay};
use phasekit::{
    Error, ExitDispatcher, ExitEvent, RegionCheckpoints, Result, SAMPLE_DATA_KEY, SampleLog,
    SimPointCheckpoints, SmartsParams, SystematicSampler,
};

use super::{base_config, execute, print_checkpoints};
use crate::cli::{RegionArgs, ReplayArgs};
use crate::terminal;

pub fn cmd_simpoint(args: &ReplayArgs, starts: &[u64], warmup: u64) -> Result<()> {
    let mut starts: Vec<u64> = starts.iter().map(|s| s.saturating_sub(warmup)).collect();
    starts.sort_unstable();
    let simpoints = SimPointCheckpoints::new(&args.outdir, starts)?;

    let config = base_config(args).with_initial_exits(simpoints.exit_offsets());
    let dispatcher = ExitDispatcher::new(&args.outdir).on(ExitEvent::SimPoint, simpoints);
    let (_, summary) = execute(args, Replay::new(&config, dispatcher)?)?;
    print_checkpoints(&summary);
    Ok(())
}

pub fn cmd_looppoint(
    args: &ReplayArgs,
    region: &RegionArgs,
    budget: Option<u64>,
    update_relatives: bool,
) -> Result<()> {
    let config = base_config(args).with_region(region.to_config());
    let mut replay = Replay::new(&config, ExitDispatcher::new(&args.outdir))?;
    let manager = replay
        .regions()
        .map(Arc::clone)
        .ok_or_else(|| Error::InvalidConfig("region detection is not configured".into()))?;
    let controller = match budget {
        Some(budget) => RegionCheckpoints::bounded(&args.outdir, manager, budget),
        None => RegionCheckpoints::unbounded(&args.outdir, manager),
    }
    .with_update_relatives(update_relatives);
    replay
        .dispatcher_mut()
        .set(ExitEvent::Region, Box::new(controller));

    let (replay, summary) = execute(args, replay)?;
    print_checkpoints(&summary);

    if update_relatives && let Some(manager) = replay.regions() {
        let manager = manager.lock();
        for region in manager.regions() {
            if let Some(rel) = region.relative {
                println!(
                    "  Region{}: marker {:#x} total {} relative {}",
                    region.id, rel.pc, rel.total, rel.relative
                );
            }
        }
    }
    Ok(())
}

pub fn cmd_smarts(
    args: &ReplayArgs,
    k: u64,
    unit: u64,
    warmup: u64,
    log: Option<&Path>,
) -> Result<()> {
    let params = SmartsParams::new(k, unit, warmup);
    let log_path = log.map_or_else(|| args.outdir.join("smarts.json"), Path::to_path_buf);
    let sampler = SystematicSampler::new(params, SampleLog::open(&log_path)?)?;

    let config = base_config(args)
        .with_start_mode(CoreMode::Fast)
        .with_initial_exits(vec![sampler.first_exit_offset()]);
    let dispatcher = ExitDispatcher::new(&args.outdir).on(ExitEvent::SimPoint, sampler);
    execute(args, Replay::new(&config, dispatcher)?)?;

    match fs::read(&log_path) {
        Ok(bytes) => {
            let doc: serde_json::Value = serde_json::from_slice(&bytes)
                .map_err(|e| Error::Sample(e.into()))?;
            let samples = doc[SAMPLE_DATA_KEY].as_object().map_or(0, serde_json::Map::len);
            terminal::info(&format!(
                "{samples} samples written to {}",
                log_path.display()
            ));
        }
        Err(_) => terminal::info("No complete sampling interval in this trace"),
    }
    Ok(())
}
