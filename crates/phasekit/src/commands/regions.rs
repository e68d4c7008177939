//! Regions command.

use phasekit::replay::Replay;
use phasekit::{ExitDispatcher, ExitEvent, Result, StatsAction, StatsController};

use super::{base_config, execute};
use crate::cli::{RegionArgs, ReplayArgs};

pub fn cmd_regions(args: &ReplayArgs, region: &RegionArgs, top: usize) -> Result<()> {
    let config = base_config(args).with_region(region.to_config());
    let dispatcher = ExitDispatcher::new(&args.outdir).on(
        ExitEvent::Region,
        StatsController::new(StatsAction::Skip),
    );

    let (replay, summary) = execute(args, Replay::new(&config, dispatcher)?)?;
    let Some(manager) = replay.regions() else {
        return Ok(());
    };
    let manager = manager.lock();

    println!("Regions closed: {}", summary.regions);
    for region in manager.regions() {
        println!(
            "Region{} ({}, {} insts, last pc {:#x}, {} blocks)",
            region.id,
            region.cause.as_str(),
            region.inst_count,
            region.most_recent_pc,
            region.bbv.len()
        );
        let mut blocks: Vec<_> = region.bbv.iter().collect();
        blocks.sort_by(|a, b| b.1.cmp(a.1).then(a.0.cmp(b.0)));
        for (block, count) in blocks.into_iter().take(top) {
            println!("  {:<20}{count}", format!("{block:#x}"));
        }
    }
    println!(
        "Open region: {} insts, {} blocks",
        manager.running_count(),
        manager.global_bbv().len()
    );

    if !manager.marker_hits().is_empty() {
        println!("Marker hits:");
        let mut markers: Vec<_> = manager.marker_hits().iter().collect();
        markers.sort();
        for (pc, hits) in markers {
            println!("  {:<20}{hits}", format!("{pc:#x}"));
        }
    }
    Ok(())
}
