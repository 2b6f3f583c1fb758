//! Headless runner for swarm simulations: configuration layering, dot-path
//! knobs and a JSON run report.

pub mod cli;
pub mod knobs;
pub mod run;

pub use cli::{Cli, Command, ConfigOverrides};
pub use knobs::{KnobEntry, KnobError, KnobKind, KnobUpdate, apply_updates, list_knobs};
pub use run::{RunOptions, RunPeaks, RunReport, run_headless};
