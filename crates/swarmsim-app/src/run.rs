//! Headless simulation loop.

use anyhow::{Context, Result};
use serde::Serialize;
use std::time::Instant;
use swarmsim_core::{BehaviorKind, SwarmConfig, SwarmWorld, TickSummary, WorldSnapshot};
use tracing::{debug, info};

/// How long to run and what to report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    pub ticks: u64,
    /// Emit a progress line every this many ticks; zero disables progress logging.
    pub log_every: u64,
    /// Attach the final world snapshot to the report.
    pub include_snapshot: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            ticks: 1_000,
            log_every: 100,
            include_snapshot: false,
        }
    }
}

/// Largest values seen across a run.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct RunPeaks {
    pub stopped: usize,
    pub leaving: usize,
    pub cluster_count: usize,
    pub largest_cluster: usize,
    pub bounces: usize,
}

impl RunPeaks {
    fn observe(&mut self, summary: &TickSummary) {
        self.stopped = self.stopped.max(summary.stopped);
        self.leaving = self.leaving.max(summary.leaving);
        self.cluster_count = self.cluster_count.max(summary.cluster_count);
        self.largest_cluster = self.largest_cluster.max(summary.largest_cluster);
        self.bounces = self.bounces.max(summary.bounces);
    }
}

/// Result of a headless run, printed as JSON by the binary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub behavior: BehaviorKind,
    pub seed: Option<u64>,
    pub robot_count: usize,
    pub ticks: u64,
    pub total_bounces: usize,
    pub peaks: RunPeaks,
    pub last: TickSummary,
    /// Summaries still held in the world's bounded history.
    pub history_len: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<WorldSnapshot>,
}

/// Build a world from `config` and step it `options.ticks` times.
pub fn run_headless(config: SwarmConfig, options: &RunOptions) -> Result<RunReport> {
    let seed = config.rng_seed;
    let mut world = SwarmWorld::new(config).context("failed to build swarm world")?;
    info!(
        behavior = %world.behavior(),
        robots = world.robots().len(),
        ticks = options.ticks,
        "starting headless run"
    );

    let started = Instant::now();
    let mut peaks = RunPeaks::default();
    let mut total_bounces = 0;
    for _ in 0..options.ticks {
        let summary = world.step();
        peaks.observe(&summary);
        total_bounces += summary.bounces;
        if options.log_every > 0 && summary.tick.0 % options.log_every == 0 {
            info!(
                tick = summary.tick.0,
                moving = summary.moving,
                stopped = summary.stopped,
                leaving = summary.leaving,
                clusters = summary.cluster_count,
                largest = summary.largest_cluster,
                "progress"
            );
        }
    }
    debug!(elapsed_ms = started.elapsed().as_millis() as u64, "run finished");

    Ok(RunReport {
        behavior: world.behavior(),
        seed,
        robot_count: world.robots().len(),
        ticks: world.tick().0,
        total_bounces,
        peaks,
        last: world.last_summary().clone(),
        history_len: world.history().count(),
        snapshot: options.include_snapshot.then(|| world.snapshot()),
    })
}
