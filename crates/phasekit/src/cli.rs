//! CLI definitions and argument types.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use phasekit::replay::TickCosts;
use phasekit::{
    AddrRange, DEFAULT_REGION_LEN, DEFAULT_UPDATE_THRESHOLD, PcCountPair, RegionConfig,
    RegionPolicy,
};

/// Exit code for success.
pub const EXIT_SUCCESS: i32 = 0;
/// Exit code for failure.
pub const EXIT_FAILURE: i32 = 1;

#[derive(Parser)]
#[command(name = "phasekit")]
#[command(about = "Replay retire traces through PC-count probes, region detection and sampling controllers")]
#[command(version)]
pub struct Cli {
    /// Show metrics summary after execution
    #[arg(long, global = true)]
    pub metrics: bool,

    /// Enable verbose output (sets RUST_LOG=debug)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress output (only show errors)
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub silent: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Count how often target PCs (or all instructions) retire across all cores
    Count {
        #[command(flatten)]
        replay: ReplayArgs,

        /// Target PC and count, e.g. 0x80001000:1000000 (repeatable)
        #[arg(
            long = "target",
            value_name = "PC:COUNT",
            required_unless_present = "insts",
            value_parser = parse_target
        )]
        targets: Vec<PcCountPair>,

        /// Also fire each time all cores together retire this many instructions
        #[arg(long, value_name = "COUNT")]
        insts: Option<u64>,

        /// Local hits per target before a core flushes to the global count
        #[arg(long, default_value_t = DEFAULT_UPDATE_THRESHOLD)]
        update_threshold: u64,

        /// What to do when a target is reached
        #[arg(long, value_enum, default_value = "exit")]
        on_target: OnTargetArg,
    },
    /// Detect regions and print their basic-block vectors
    Regions {
        #[command(flatten)]
        replay: ReplayArgs,

        #[command(flatten)]
        region: RegionArgs,

        /// Blocks to show per region
        #[arg(long, default_value = "5")]
        top: usize,
    },
    /// Checkpoint at SimPoint start offsets
    Simpoint {
        #[command(flatten)]
        replay: ReplayArgs,

        /// Start offsets in core-0 instructions (comma separated)
        #[arg(long = "start", value_delimiter = ',', required = true)]
        starts: Vec<u64>,

        /// Warmup length subtracted from each start
        #[arg(long, default_value = "0")]
        warmup: u64,
    },
    /// Checkpoint at region boundaries
    Looppoint {
        #[command(flatten)]
        replay: ReplayArgs,

        #[command(flatten)]
        region: RegionArgs,

        /// Stop after this many checkpoints (unbounded if omitted)
        #[arg(long)]
        budget: Option<u64>,

        /// Record marker hit counts for each checkpointed region
        #[arg(long)]
        update_relatives: bool,
    },
    /// Systematic sampling with detailed warmup (SMARTS)
    Smarts {
        #[command(flatten)]
        replay: ReplayArgs,

        /// Interval length in units
        #[arg(short, default_value = "1000")]
        k: u64,

        /// Unit size in instructions
        #[arg(short = 'u', long, default_value = "1000")]
        unit: u64,

        /// Detailed warmup length in instructions
        #[arg(short = 'w', long, default_value = "2000")]
        warmup: u64,

        /// Sample log (default: <OUTDIR>/smarts.json)
        #[arg(long)]
        log: Option<PathBuf>,
    },
}

/// Options shared by every replay command.
#[derive(Args)]
pub struct ReplayArgs {
    /// Commit-log trace to replay
    #[arg(value_name = "TRACE")]
    pub trace: PathBuf,

    /// Number of cores in the trace
    #[arg(long, default_value = "1")]
    pub cores: usize,

    /// Output directory for checkpoints and statistics
    #[arg(short, long, default_value = "phasekit-out")]
    pub outdir: PathBuf,

    /// Raise a max-instructions exit after this many core-0 instructions
    #[arg(long)]
    pub max_insts: Option<u64>,

    /// Ticks per instruction on the fast implementation
    #[arg(long, default_value = "1")]
    pub fast_cost: u64,

    /// Ticks per instruction on the detailed implementation
    #[arg(long, default_value = "4")]
    pub detailed_cost: u64,
}

impl ReplayArgs {
    pub const fn costs(&self) -> TickCosts {
        TickCosts {
            fast: self.fast_cost,
            detailed: self.detailed_cost,
        }
    }
}

/// Region detection options.
#[derive(Args)]
pub struct RegionArgs {
    /// Counted instructions per region
    #[arg(long, default_value_t = DEFAULT_REGION_LEN)]
    pub region_len: u64,

    /// Basic-block range START..END (hex; default: everything)
    #[arg(long, value_name = "RANGE")]
    pub bb_range: Option<AddrRange>,

    /// Marker range START..END (hex; default: none). Only addresses outside
    /// the basic-block range are treated as markers, so this needs --bb-range
    #[arg(long, value_name = "RANGE", requires = "bb_range")]
    pub marker_range: Option<AddrRange>,

    /// Excluded range START..END (hex, repeatable)
    #[arg(long = "exclude", value_name = "RANGE")]
    pub excluded: Vec<AddrRange>,

    /// When regions close
    #[arg(long, value_enum, default_value = "length-or-marker")]
    pub policy: PolicyArg,
}

impl RegionArgs {
    pub fn to_config(&self) -> RegionConfig {
        let mut config = RegionConfig::default()
            .with_region_len(self.region_len)
            .with_policy(self.policy.into());
        if let Some(range) = self.bb_range {
            config = config.with_bb_range(range);
        }
        if let Some(range) = self.marker_range {
            config = config.with_marker_range(range);
        }
        for range in &self.excluded {
            config = config.with_excluded(*range);
        }
        config
    }
}

#[derive(Clone, Copy, ValueEnum)]
pub enum PolicyArg {
    /// Close on length or on any marker
    LengthOrMarker,
    /// Close on length only
    Length,
    /// Close on markers only
    Marker,
    /// Close on the first marker once the length is reached
    MarkerAfterLength,
}

impl From<PolicyArg> for RegionPolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::LengthOrMarker => Self::LengthOrMarker,
            PolicyArg::Length => Self::Length,
            PolicyArg::Marker => Self::Marker,
            PolicyArg::MarkerAfterLength => Self::MarkerAfterLength,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
pub enum OnTargetArg {
    /// Stop the replay
    Exit,
    /// Dump and reset statistics, then continue
    Stats,
    /// Checkpoint, then continue
    Checkpoint,
}

/// Parse `PC:COUNT` with a hex PC and a decimal count.
fn parse_target(s: &str) -> Result<PcCountPair, String> {
    let (pc, count) = s
        .split_once(':')
        .ok_or_else(|| format!("expected PC:COUNT, got '{s}'"))?;
    let pc = pc.trim().trim_start_matches("0x").trim_start_matches("0X");
    let pc = u64::from_str_radix(pc, 16).map_err(|e| format!("bad PC '{pc}': {e}"))?;
    let count = count
        .trim()
        .parse()
        .map_err(|e| format!("bad count '{count}': {e}"))?;
    Ok(PcCountPair::new(pc, count))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use phasekit::ConfigError;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_target() {
        let pair = parse_target("0x80001000:1000").unwrap();
        assert_eq!(pair, PcCountPair::new(0x8000_1000, 1000));
        assert_eq!(parse_target("400:7").unwrap(), PcCountPair::new(0x400, 7));
        assert!(parse_target("0x400").is_err());
        assert!(parse_target("0xzz:1").is_err());
        assert!(parse_target("0x400:many").is_err());
    }

    #[test]
    fn test_region_args() {
        let cli = Cli::parse_from([
            "phasekit",
            "looppoint",
            "trace.log",
            "--region-len",
            "500",
            "--bb-range",
            "0x1000..0x2000",
            "--marker-range",
            "0x8000..0x9000",
            "--exclude",
            "0x0..0x100",
            "--exclude",
            "0x200..0x300",
            "--policy",
            "marker-after-length",
            "--budget",
            "3",
        ]);
        let Commands::Looppoint { region, budget, .. } = cli.command else {
            panic!("expected looppoint");
        };
        let config = region.to_config();
        assert_eq!(config.region_len, 500);
        assert_eq!(config.marker_range, AddrRange::new(0x8000, 0x9000).unwrap());
        assert_eq!(config.bb_range, AddrRange::new(0x1000, 0x2000).unwrap());
        assert_eq!(config.excluded.len(), 2);
        assert_eq!(config.policy, RegionPolicy::MarkerAfterLength);
        assert!(config.validate().is_ok());
        assert_eq!(budget, Some(3));
    }

    #[test]
    fn test_count_needs_a_target() {
        assert!(Cli::try_parse_from(["phasekit", "count", "trace.log"]).is_err());

        let cli = Cli::parse_from(["phasekit", "count", "trace.log", "--insts", "5000"]);
        let Commands::Count { targets, insts, .. } = cli.command else {
            panic!("expected count");
        };
        assert!(targets.is_empty());
        assert_eq!(insts, Some(5000));

        let cli = Cli::parse_from(["phasekit", "count", "trace.log", "--target", "0x400:3"]);
        let Commands::Count { targets, insts, .. } = cli.command else {
            panic!("expected count");
        };
        assert_eq!(targets, vec![PcCountPair::new(0x400, 3)]);
        assert_eq!(insts, None);
    }

    #[test]
    fn test_marker_range_needs_bb_range() {
        let parsed = Cli::try_parse_from([
            "phasekit",
            "looppoint",
            "trace.log",
            "--marker-range",
            "0x8000..0x9000",
        ]);
        assert!(parsed.is_err());

        let cli = Cli::parse_from(["phasekit", "regions", "trace.log"]);
        let Commands::Regions { region, .. } = cli.command else {
            panic!("expected regions");
        };
        let config = region.to_config();
        assert_eq!(config.bb_range, AddrRange::all());
        assert!(config.marker_range.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_shadowed_marker_range_rejected() {
        let cli = Cli::parse_from([
            "phasekit",
            "looppoint",
            "trace.log",
            "--bb-range",
            "0x0..0x10000",
            "--marker-range",
            "0x8000..0x9000",
        ]);
        let Commands::Looppoint { region, .. } = cli.command else {
            panic!("expected looppoint");
        };
        assert!(matches!(
            region.to_config().validate(),
            Err(ConfigError::MarkerRangeShadowed { .. })
        ));
    }
}
