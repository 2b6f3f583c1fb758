//! Command-line surface of the `swarmsim` binary.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use swarmsim_core::{BehaviorKind, InitialDistribution, ObstacleLayout, SwarmConfig};

use crate::knobs::{KnobUpdate, apply_updates, list_knobs};
use crate::run::{RunOptions, run_headless};

#[derive(Parser, Debug)]
#[command(
    name = "swarmsim",
    version,
    about = "Run swarm robot behaviors without a display"
)]
pub struct Cli {
    /// JSON configuration file; missing fields take their defaults.
    #[arg(long, short, global = true, env = "SWARMSIM_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: ConfigOverrides,

    #[command(subcommand)]
    pub command: Command,
}

/// Flags layered over the configuration file, before `--set` knobs.
#[derive(Args, Debug, Default, Clone)]
pub struct ConfigOverrides {
    #[arg(long, global = true, value_enum)]
    pub behavior: Option<BehaviorArg>,
    #[arg(long, global = true, value_enum)]
    pub distribution: Option<DistributionArg>,
    #[arg(long, global = true, value_enum)]
    pub obstacles: Option<ObstaclesArg>,
    #[arg(long, global = true)]
    pub robots: Option<usize>,
    #[arg(long, global = true)]
    pub seed: Option<u64>,
    /// Override any knob by dot path, e.g. `--set aggregation.wait_time=200`. Repeatable.
    #[arg(long = "set", global = true, value_name = "PATH=VALUE")]
    pub knobs: Vec<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Step the world headlessly and print a JSON report.
    Run {
        #[arg(long, default_value_t = 1_000)]
        ticks: u64,
        /// Progress log interval in ticks (0 disables).
        #[arg(long, default_value_t = 100)]
        log_every: u64,
        /// Include the final world snapshot in the report.
        #[arg(long)]
        snapshot: bool,
    },
    /// List every configuration knob and its resolved value.
    Knobs,
    /// Print the fully resolved configuration as JSON.
    Config,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BehaviorArg {
    CollisionAvoidance,
    WallFollower,
    VacuumCoverage,
    BasicAggregation,
    TimedAggregation,
    AdaptiveAggregation,
}

impl From<BehaviorArg> for BehaviorKind {
    fn from(value: BehaviorArg) -> Self {
        match value {
            BehaviorArg::CollisionAvoidance => BehaviorKind::CollisionAvoidance,
            BehaviorArg::WallFollower => BehaviorKind::WallFollower,
            BehaviorArg::VacuumCoverage => BehaviorKind::VacuumCoverage,
            BehaviorArg::BasicAggregation => BehaviorKind::BasicAggregation,
            BehaviorArg::TimedAggregation => BehaviorKind::TimedAggregation,
            BehaviorArg::AdaptiveAggregation => BehaviorKind::AdaptiveAggregation,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistributionArg {
    Random,
    Grid,
    Circle,
}

impl From<DistributionArg> for InitialDistribution {
    fn from(value: DistributionArg) -> Self {
        match value {
            DistributionArg::Random => InitialDistribution::Random,
            DistributionArg::Grid => InitialDistribution::Grid,
            DistributionArg::Circle => InitialDistribution::Circle,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObstaclesArg {
    Open,
    Blocks,
}

impl From<ObstaclesArg> for ObstacleLayout {
    fn from(value: ObstaclesArg) -> Self {
        match value {
            ObstaclesArg::Open => ObstacleLayout::Open,
            ObstaclesArg::Blocks => ObstacleLayout::Blocks,
        }
    }
}

impl ConfigOverrides {
    fn apply(&self, config: &mut SwarmConfig) {
        if let Some(behavior) = self.behavior {
            config.behavior = behavior.into();
        }
        if let Some(distribution) = self.distribution {
            config.initial_distribution = distribution.into();
        }
        if let Some(obstacles) = self.obstacles {
            config.obstacle_layout = obstacles.into();
        }
        if let Some(robots) = self.robots {
            config.robot_count = robots;
        }
        if let Some(seed) = self.seed {
            config.rng_seed = Some(seed);
        }
    }
}

impl Cli {
    /// Resolve the configuration: file, then flags, then `--set` knobs.
    pub fn load_config(&self) -> Result<SwarmConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let raw = fs::read_to_string(path)
                    .with_context(|| format!("failed to read config {}", path.display()))?;
                serde_json::from_str(&raw)
                    .with_context(|| format!("failed to parse config {}", path.display()))?
            }
            None => SwarmConfig::default(),
        };
        self.overrides.apply(&mut config);

        let updates = self
            .overrides
            .knobs
            .iter()
            .map(|raw| KnobUpdate::parse(raw))
            .collect::<Result<Vec<_>, _>>()
            .context("invalid --set argument")?;
        if !updates.is_empty() {
            config = apply_updates(&config, &updates).context("failed to apply knob overrides")?;
        }
        config.validate().context("configuration rejected")?;
        Ok(config)
    }

    /// Execute the selected command and return its JSON output.
    pub fn execute(&self) -> Result<String> {
        let config = self.load_config()?;
        let output = match &self.command {
            Command::Run {
                ticks,
                log_every,
                snapshot,
            } => {
                let options = RunOptions {
                    ticks: *ticks,
                    log_every: *log_every,
                    include_snapshot: *snapshot,
                };
                serde_json::to_string_pretty(&run_headless(config, &options)?)?
            }
            Command::Knobs => serde_json::to_string_pretty(&list_knobs(&config)?)?,
            Command::Config => serde_json::to_string_pretty(&config)?,
        };
        Ok(output)
    }
}
