//! Command line flags. Anything given here overrides the config file.

use clap::Parser;
use std::path::PathBuf;

use crate::config::DaemonConfig;

#[derive(Debug, Parser)]
#[command(name = "multitick-daemon", version, about = "Broadcast a phase-aligned ticker to several subscribers")]
pub struct Args {
    /// Config file (default: <config dir>/multitick/config.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Base tick interval in milliseconds
    #[arg(long)]
    pub interval_ms: Option<u64>,

    /// Phase offset within each interval in milliseconds
    #[arg(long, conflicts_with = "no_align")]
    pub offset_ms: Option<u64>,

    /// Start ticking immediately instead of aligning to an offset
    #[arg(long)]
    pub no_align: bool,

    /// Choose the offset at random
    #[arg(long, conflicts_with_all = ["offset_ms", "no_align"])]
    pub random_offset: bool,

    /// Forward one random tick per this many milliseconds
    #[arg(long)]
    pub sample_ms: Option<u64>,

    /// Seed for the random offset and the sampler
    #[arg(long)]
    pub seed: Option<u64>,

    /// Number of subscribers
    #[arg(long)]
    pub subscribers: Option<usize>,

    /// Stop after subscriber 0 has received this many ticks
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub count: Option<u64>,
}

impl Args {
    /// Apply command line overrides on top of a loaded config
    pub fn apply(&self, config: &mut DaemonConfig) {
        if let Some(interval_ms) = self.interval_ms {
            config.interval_ms = interval_ms;
        }
        if let Some(offset_ms) = self.offset_ms {
            config.offset_ms = offset_ms;
            config.align = true;
            config.random_offset = false;
        }
        if self.no_align {
            config.align = false;
            config.random_offset = false;
        }
        if self.random_offset {
            config.random_offset = true;
        }
        if let Some(sample_ms) = self.sample_ms {
            config.sample_interval_ms = sample_ms;
        }
        if let Some(seed) = self.seed {
            config.seed = Some(seed);
        }
        if let Some(subscribers) = self.subscribers {
            config.subscribers = subscribers;
        }
    }
}
