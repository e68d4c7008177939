//! Count command.

use phasekit::replay::Replay;
use phasekit::{
    CounterConfig, ExitDispatcher, ExitEvent, ExitNow, InstCountConfig, PcCountPair, Result,
    SaveCheckpoint, StatsAction, StatsController,
};

use super::{base_config, execute, print_checkpoints};
use crate::cli::{OnTargetArg, ReplayArgs};

pub fn cmd_count(
    args: &ReplayArgs,
    targets: &[PcCountPair],
    insts: Option<u64>,
    update_threshold: u64,
    on_target: OnTargetArg,
) -> Result<()> {
    let mut config = base_config(args);
    if !targets.is_empty() {
        config = config.with_counter(CounterConfig {
            targets: targets.to_vec(),
            update_threshold,
            ..CounterConfig::default()
        });
    }
    if let Some(target) = insts {
        config = config
            .with_inst_count(InstCountConfig::new(target).with_update_threshold(update_threshold));
    }

    let dispatcher = ExitDispatcher::new(&args.outdir);
    let dispatcher = match on_target {
        OnTargetArg::Exit => dispatcher.on(ExitEvent::SignificantPc, ExitNow),
        OnTargetArg::Stats => dispatcher.on(
            ExitEvent::SignificantPc,
            StatsController::new(StatsAction::DumpReset),
        ),
        OnTargetArg::Checkpoint => dispatcher.on(
            ExitEvent::SignificantPc,
            SaveCheckpoint::new(&args.outdir),
        ),
    };

    let (replay, summary) = execute(args, Replay::new(&config, dispatcher)?)?;

    println!("Targets reached: {}", summary.significant_events);
    println!("{:<20}{:>16}{:>16}", "pc", "target", "count");
    if let Some(global) = replay.aggregator() {
        let global = global.lock();
        let mut targets: Vec<_> = global.targets().collect();
        targets.sort_by_key(|p| p.pc);
        for pair in targets {
            println!(
                "{:<20}{:>16}{:>16}",
                format!("{:#x}", pair.pc),
                pair.count,
                global.count(pair.pc)
            );
        }
    }
    if let Some(global) = replay.inst_counter() {
        let global = global.lock();
        println!("{:<20}{:>16}{:>16}", "(any)", global.target(), global.count());
    }
    if matches!(on_target, OnTargetArg::Checkpoint) {
        print_checkpoints(&summary);
    }
    Ok(())
}
