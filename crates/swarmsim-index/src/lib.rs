//! Spatial indexing abstractions for robot neighborhood queries.

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors emitted by spatial index implementations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IndexError {
    /// Indicates configuration values that cannot be used (e.g., non-positive cell size).
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
    /// A position fed to `rebuild` was NaN or infinite.
    #[error("position {index} is not finite")]
    NonFinitePosition { index: usize },
}

/// Common behaviour exposed by neighborhood indices.
///
/// Implementations are rebuilt from a frozen position snapshot once per tick and
/// then queried concurrently, hence the `Send + Sync` bound.
pub trait NeighborhoodIndex: Send + Sync {
    /// Rebuild internal structures from robot positions.
    fn rebuild(&mut self, positions: &[(f32, f32)]) -> Result<(), IndexError>;

    /// Visit neighbors of `agent_idx` within the provided squared radius (inclusive).
    ///
    /// The queried agent itself is never visited.
    fn neighbors_within(
        &self,
        agent_idx: usize,
        radius_sq: f32,
        visitor: &mut dyn FnMut(usize, OrderedFloat<f32>),
    );

    /// Number of positions captured by the last rebuild.
    fn len(&self) -> usize;

    /// Whether the last rebuild captured no positions.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn validate_positions(positions: &[(f32, f32)]) -> Result<(), IndexError> {
    match positions
        .iter()
        .position(|(x, y)| !x.is_finite() || !y.is_finite())
    {
        Some(index) => Err(IndexError::NonFinitePosition { index }),
        None => Ok(()),
    }
}

#[inline]
fn distance_sq(a: (f32, f32), b: (f32, f32)) -> f32 {
    let dx = a.0 - b.0;
    let dy = a.1 - b.1;
    dx * dx + dy * dy
}

/// Linear-scan index. Quadratic, but exact and trivially correct at swarm scale.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BruteForceIndex {
    #[serde(skip)]
    positions: Vec<(f32, f32)>,
}

impl BruteForceIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl NeighborhoodIndex for BruteForceIndex {
    fn rebuild(&mut self, positions: &[(f32, f32)]) -> Result<(), IndexError> {
        validate_positions(positions)?;
        self.positions.clear();
        self.positions.extend_from_slice(positions);
        Ok(())
    }

    fn neighbors_within(
        &self,
        agent_idx: usize,
        radius_sq: f32,
        visitor: &mut dyn FnMut(usize, OrderedFloat<f32>),
    ) {
        let Some(&origin) = self.positions.get(agent_idx) else {
            return;
        };
        for (other_idx, &other) in self.positions.iter().enumerate() {
            if other_idx == agent_idx {
                continue;
            }
            let dist_sq = distance_sq(origin, other);
            if dist_sq <= radius_sq {
                visitor(other_idx, OrderedFloat(dist_sq));
            }
        }
    }

    fn len(&self) -> usize {
        self.positions.len()
    }
}

/// Uniform grid index bucketing robots into square cells.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UniformGridIndex {
    /// Edge length of each grid cell used for bucketing robots.
    pub cell_size: f32,
    #[serde(skip)]
    positions: Vec<(f32, f32)>,
    #[serde(skip)]
    origin: (f32, f32),
    #[serde(skip)]
    columns: usize,
    #[serde(skip)]
    rows: usize,
    #[serde(skip)]
    cells: Vec<Vec<usize>>,
}

impl UniformGridIndex {
    /// Create a new uniform grid with the provided cell size.
    #[must_use]
    pub fn new(cell_size: f32) -> Self {
        Self {
            cell_size,
            positions: Vec::new(),
            origin: (0.0, 0.0),
            columns: 0,
            rows: 0,
            cells: Vec::new(),
        }
    }

    fn cell_coords(&self, point: (f32, f32)) -> (isize, isize) {
        let cx = ((point.0 - self.origin.0) / self.cell_size).floor() as isize;
        let cy = ((point.1 - self.origin.1) / self.cell_size).floor() as isize;
        (cx, cy)
    }

    /// Number of occupied buckets, useful for diagnostics.
    #[must_use]
    pub fn occupied_cells(&self) -> usize {
        self.cells.iter().filter(|cell| !cell.is_empty()).count()
    }
}

impl Default for UniformGridIndex {
    fn default() -> Self {
        Self::new(50.0)
    }
}

impl NeighborhoodIndex for UniformGridIndex {
    fn rebuild(&mut self, positions: &[(f32, f32)]) -> Result<(), IndexError> {
        if self.cell_size <= 0.0 || !self.cell_size.is_finite() {
            return Err(IndexError::InvalidConfig("cell_size must be positive"));
        }
        validate_positions(positions)?;

        self.positions.clear();
        self.positions.extend_from_slice(positions);
        for cell in &mut self.cells {
            cell.clear();
        }
        if positions.is_empty() {
            self.columns = 0;
            self.rows = 0;
            return Ok(());
        }

        let (mut min_x, mut min_y) = (f32::INFINITY, f32::INFINITY);
        let (mut max_x, mut max_y) = (f32::NEG_INFINITY, f32::NEG_INFINITY);
        for &(x, y) in positions {
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }
        self.origin = (min_x, min_y);
        self.columns = ((max_x - min_x) / self.cell_size).floor() as usize + 1;
        self.rows = ((max_y - min_y) / self.cell_size).floor() as usize + 1;
        let cell_count = self.columns * self.rows;
        if self.cells.len() < cell_count {
            self.cells.resize_with(cell_count, Vec::new);
        }

        for (idx, &point) in positions.iter().enumerate() {
            let (cx, cy) = self.cell_coords(point);
            let slot = cy as usize * self.columns + cx as usize;
            self.cells[slot].push(idx);
        }
        Ok(())
    }

    fn neighbors_within(
        &self,
        agent_idx: usize,
        radius_sq: f32,
        visitor: &mut dyn FnMut(usize, OrderedFloat<f32>),
    ) {
        let Some(&origin) = self.positions.get(agent_idx) else {
            return;
        };
        if radius_sq < 0.0 || self.columns == 0 {
            return;
        }
        let reach = (radius_sq.sqrt() / self.cell_size).ceil() as isize;
        let (cx, cy) = self.cell_coords(origin);
        let max_col = self.columns as isize - 1;
        let max_row = self.rows as isize - 1;

        for row in (cy - reach).max(0)..=(cy + reach).min(max_row) {
            for col in (cx - reach).max(0)..=(cx + reach).min(max_col) {
                let slot = row as usize * self.columns + col as usize;
                for &other_idx in &self.cells[slot] {
                    if other_idx == agent_idx {
                        continue;
                    }
                    let dist_sq = distance_sq(origin, self.positions[other_idx]);
                    if dist_sq <= radius_sq {
                        visitor(other_idx, OrderedFloat(dist_sq));
                    }
                }
            }
        }
    }

    fn len(&self) -> usize {
        self.positions.len()
    }
}
