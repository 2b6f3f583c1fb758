//! Initial robot placement.

use std::f32::consts::TAU;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::Position;
use crate::geometry::Arena;

/// How robots are laid out when a world is created or reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitialDistribution {
    /// Uniformly random inside the arena margin.
    #[default]
    Random,
    /// Evenly spaced rows and columns.
    Grid,
    /// Evenly spaced on a circle around the arena center.
    Circle,
}

/// Explicit starting pose for one robot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    pub position: Position,
    pub heading: f32,
}

impl Placement {
    #[must_use]
    pub const fn new(position: Position, heading: f32) -> Self {
        Self { position, heading }
    }
}

fn axis<R: Rng + ?Sized>(rng: &mut R, lo: f32, hi: f32) -> f32 {
    if lo < hi {
        rng.random_range(lo..hi)
    } else {
        (lo + hi) * 0.5
    }
}

/// Generate `count` poses for `mode`, keeping every robot `margin` away from the walls.
///
/// Headings are always drawn uniformly from the RNG.
pub fn generate<R: Rng + ?Sized>(
    mode: InitialDistribution,
    count: usize,
    arena: &Arena,
    margin: f32,
    rng: &mut R,
) -> Vec<Placement> {
    let (width, height) = (arena.width(), arena.height());
    let mut placements = Vec::with_capacity(count);
    match mode {
        InitialDistribution::Random => {
            for _ in 0..count {
                let x = axis(rng, margin, width - margin);
                let y = axis(rng, margin, height - margin);
                let heading = rng.random_range(0.0..TAU);
                placements.push(Placement::new(Position::new(x, y), heading));
            }
        }
        InitialDistribution::Grid => {
            let usable_w = (width - 2.0 * margin).max(0.0);
            let usable_h = (height - 2.0 * margin).max(0.0);
            let aspect = if usable_h > 0.0 { usable_w / usable_h } else { 1.0 };
            let cols = ((count as f32 * aspect).sqrt().ceil() as usize).clamp(1, count.max(1));
            let rows = count.div_ceil(cols).max(1);
            let cell_w = usable_w / cols as f32;
            let cell_h = usable_h / rows as f32;
            for idx in 0..count {
                let (row, col) = (idx / cols, idx % cols);
                let x = margin + (col as f32 + 0.5) * cell_w;
                let y = margin + (row as f32 + 0.5) * cell_h;
                let heading = rng.random_range(0.0..TAU);
                placements.push(Placement::new(Position::new(x, y), heading));
            }
        }
        InitialDistribution::Circle => {
            let center = arena.center();
            let radius = (0.35 * width.min(height))
                .min(center.x - margin)
                .min(center.y - margin)
                .max(0.0);
            for idx in 0..count {
                let angle = TAU * idx as f32 / count.max(1) as f32;
                let position = Position::new(
                    center.x + radius * angle.cos(),
                    center.y + radius * angle.sin(),
                );
                let heading = rng.random_range(0.0..TAU);
                placements.push(Placement::new(position, heading));
            }
        }
    }
    placements
}
