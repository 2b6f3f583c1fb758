//! Core types and the tick pipeline for swarm robot simulations.

pub mod behavior;
pub mod config;
pub mod geometry;
pub mod kinematics;
pub mod neighbors;
pub mod placement;
pub mod sensors;

use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;

use rand::rngs::SmallRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use swarmsim_index::{BruteForceIndex, IndexError, NeighborhoodIndex, UniformGridIndex};
use thiserror::Error;
use tracing::{debug, trace, warn};

pub use behavior::{BehaviorKind, BehaviorState, Decision, MotionCommand, MotionPhase};
pub use config::{
    AggregationSettings, AvoidanceSettings, CoverageSettings, MotionSettings, SensorSettings,
    SwarmConfig, WallFollowSettings,
};
pub use geometry::{Arena, ObstacleLayout, Segment};
pub use kinematics::MotionLimits;
pub use neighbors::{ClusterMap, ClusterView, Neighbor, NeighborSet};
pub use placement::{InitialDistribution, Placement};
pub use sensors::{SensorArray, SensorReadings, SensorSample};

use behavior::{Observation, PolicyContext};
use sensors::WorldView;

/// Simulation clock (ticks processed since the last reset).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct Tick(pub u64);

impl Tick {
    /// Returns the next sequential tick.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }

    #[must_use]
    pub const fn zero() -> Self {
        Self(0)
    }
}

/// Point in arena coordinates (y grows downward).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    #[must_use]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    #[must_use]
    pub fn distance(self, other: Position) -> f32 {
        (other.x - self.x).hypot(other.y - self.y)
    }

    #[must_use]
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// World-space displacement per tick.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Velocity {
    pub vx: f32,
    pub vy: f32,
}

impl Velocity {
    #[must_use]
    pub const fn new(vx: f32, vy: f32) -> Self {
        Self { vx, vy }
    }

    #[must_use]
    pub fn speed(self) -> f32 {
        self.vx.hypot(self.vy)
    }
}

/// Stable robot identity; also the robot's index in the world for the run.
#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord,
)]
pub struct RobotId(pub u32);

impl RobotId {
    /// Robot counts are capped at `u32::MAX` by validation.
    #[must_use]
    pub const fn from_index(index: usize) -> Self {
        Self(index as u32)
    }

    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for RobotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "robot#{}", self.0)
    }
}

/// Fixed-capacity ring of recent positions; the oldest entry is evicted first.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Trail {
    capacity: usize,
    points: VecDeque<Position>,
}

impl Trail {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            points: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, point: Position) {
        if self.capacity == 0 {
            return;
        }
        if self.points.len() == self.capacity {
            self.points.pop_front();
        }
        self.points.push_back(point);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn latest(&self) -> Option<Position> {
        self.points.back().copied()
    }

    /// Points from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &Position> {
        self.points.iter()
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }
}

/// Everything the world tracks about one robot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobotState {
    pub id: RobotId,
    pub position: Position,
    /// Radians, kept within `[-PI, PI)` by the integrator.
    pub heading: f32,
    pub velocity: Velocity,
    pub behavior: BehaviorState,
    /// Readings from the most recent tick; empty before the first tick.
    pub readings: SensorReadings,
    pub trail: Trail,
}

impl RobotState {
    #[must_use]
    pub fn new(id: RobotId, position: Position, heading: f32, trail_capacity: usize) -> Self {
        Self {
            id,
            position,
            heading,
            velocity: Velocity::default(),
            behavior: BehaviorState::default(),
            readings: SensorReadings::default(),
            trail: Trail::new(trail_capacity),
        }
    }
}

/// Errors raised while constructing or resetting a world.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SwarmError {
    /// Indicates an invalid configuration value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
    #[error("invalid robot count {count}: {reason}")]
    InvalidRobotCount { count: usize, reason: &'static str },
    #[error(transparent)]
    Index(#[from] IndexError),
}

impl SwarmError {
    pub(crate) fn check_robot_count(count: usize) -> Result<(), SwarmError> {
        if count == 0 {
            return Err(SwarmError::InvalidRobotCount {
                count,
                reason: "at least one robot is required",
            });
        }
        if u32::try_from(count).is_err() {
            return Err(SwarmError::InvalidRobotCount {
                count,
                reason: "robot ids are limited to 32 bits",
            });
        }
        Ok(())
    }
}

/// Aggregate statistics for one tick.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TickSummary {
    pub tick: Tick,
    pub robot_count: usize,
    pub moving: usize,
    pub stopped: usize,
    pub leaving: usize,
    /// Clusters with at least two members.
    pub cluster_count: usize,
    pub largest_cluster: usize,
    pub mean_trail_length: f32,
    /// Robots that hit a wall this tick.
    pub bounces: usize,
}

/// Read-only copy of the world handed to display and reporting layers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    pub tick: Tick,
    /// Sum of elapsed-time hints passed to [`SwarmWorld::advance`].
    pub elapsed: Duration,
    pub behavior: BehaviorKind,
    pub robots: Vec<RobotState>,
    pub summary: TickSummary,
}

/// What one robot perceived during the read pass.
struct Perception {
    readings: SensorReadings,
    neighbors: NeighborSet,
    clusters: Vec<ClusterView>,
    own_cluster_size: usize,
}

impl Perception {
    fn observation(&self) -> Observation<'_> {
        Observation {
            readings: &self.readings,
            neighbors: &self.neighbors,
            clusters: &self.clusters,
            own_cluster_size: self.own_cluster_size,
        }
    }
}

/// A running swarm: arena, robots, RNG and the neighbor index.
///
/// Between ticks the index and cluster map always describe the current robot
/// positions, which are the snapshot the next tick reads from.
pub struct SwarmWorld {
    config: SwarmConfig,
    arena: Arena,
    sensors: SensorArray,
    limits: MotionLimits,
    behavior: BehaviorKind,
    tick: Tick,
    elapsed: Duration,
    rng: SmallRng,
    robots: Vec<RobotState>,
    index: Box<dyn NeighborhoodIndex>,
    index_ready: bool,
    clusters: ClusterMap,
    last_summary: TickSummary,
    history: VecDeque<TickSummary>,
}

impl fmt::Debug for SwarmWorld {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SwarmWorld")
            .field("behavior", &self.behavior)
            .field("tick", &self.tick)
            .field("robot_count", &self.robots.len())
            .field("index_ready", &self.index_ready)
            .finish()
    }
}

impl SwarmWorld {
    /// Build a world with a uniform grid index sized to the neighbor radius.
    pub fn new(config: SwarmConfig) -> Result<Self, SwarmError> {
        let cell_size = config.neighbor_query_radius();
        Self::with_index(config, Box::new(UniformGridIndex::new(cell_size)))
    }

    /// Build a world around a caller-supplied neighbor index.
    pub fn with_index(
        config: SwarmConfig,
        index: Box<dyn NeighborhoodIndex>,
    ) -> Result<Self, SwarmError> {
        config.validate()?;
        let arena = Arena::new(
            config.arena_width,
            config.arena_height,
            config.obstacle_segments(),
        );
        let sensors = SensorArray::from_degrees(
            &config.sensors.angles_deg,
            config.sensors.range,
            config.motion.robot_size,
        );
        let limits = MotionLimits::from(&config.motion);
        let history_capacity = config.history_capacity;
        let mut world = Self {
            sensors,
            limits,
            behavior: config.behavior,
            tick: Tick::zero(),
            elapsed: Duration::ZERO,
            rng: config.seeded_rng(),
            robots: Vec::new(),
            index,
            index_ready: false,
            clusters: ClusterMap::default(),
            last_summary: TickSummary::default(),
            history: VecDeque::with_capacity(history_capacity),
            arena,
            config,
        };
        let mode = world.config.initial_distribution;
        let count = world.config.robot_count;
        world.reset(mode, count)?;
        Ok(world)
    }

    /// Replace every robot with `count` fresh robots laid out by `mode`.
    ///
    /// Clears the tick counter, elapsed time and history. Call between ticks only.
    pub fn reset(&mut self, mode: InitialDistribution, count: usize) -> Result<(), SwarmError> {
        SwarmError::check_robot_count(count)?;
        let margin = 2.0 * self.config.motion.robot_size;
        let placements = placement::generate(mode, count, &self.arena, margin, &mut self.rng);
        self.install(&placements);
        debug!(?mode, count, behavior = %self.behavior, "swarm reset");
        Ok(())
    }

    /// Replace every robot with one robot per explicit placement.
    pub fn place_robots(&mut self, placements: &[Placement]) -> Result<(), SwarmError> {
        SwarmError::check_robot_count(placements.len())?;
        let radius = self.config.motion.robot_size;
        if placements.iter().any(|placement| {
            !placement.heading.is_finite()
                || !placement.position.is_finite()
                || !self.arena.contains(placement.position, radius)
        }) {
            return Err(SwarmError::InvalidConfig(
                "placements must be finite and keep the robot body inside the arena",
            ));
        }
        self.install(placements);
        debug!(count = placements.len(), "robots placed explicitly");
        Ok(())
    }

    /// Switch every robot to `kind`, restarting behavior state and trails.
    pub fn set_behavior(&mut self, kind: BehaviorKind) {
        let initial = kind.initial_state(&self.config);
        for robot in &mut self.robots {
            robot.behavior = initial;
            robot.trail.clear();
        }
        debug!(from = %self.behavior, to = %kind, "behavior switched");
        self.behavior = kind;
        self.last_summary = self.summarize(0);
    }

    fn install(&mut self, placements: &[Placement]) {
        let initial = self.behavior.initial_state(&self.config);
        let trail_capacity = self.config.coverage.trail_length;
        self.robots = placements
            .iter()
            .enumerate()
            .map(|(idx, placement)| {
                let mut robot = RobotState::new(
                    RobotId::from_index(idx),
                    placement.position,
                    kinematics::wrap_angle(placement.heading),
                    trail_capacity,
                );
                robot.behavior = initial;
                robot
            })
            .collect();
        self.tick = Tick::zero();
        self.elapsed = Duration::ZERO;
        self.history.clear();
        self.refresh_index();
        self.last_summary = self.summarize(0);
    }

    /// Rebuild the neighbor index and cluster map from the current positions.
    fn refresh_index(&mut self) {
        let positions = self.positions();
        let pairs: Vec<(f32, f32)> = positions.iter().map(|p| (p.x, p.y)).collect();
        self.index_ready = match self.index.rebuild(&pairs) {
            Ok(()) => true,
            Err(err) => {
                warn!(tick = self.tick.0, error = %err, "neighbor index rebuild failed; next tick runs without neighbors");
                false
            }
        };
        self.clusters = if self.index_ready {
            ClusterMap::build(
                &positions,
                self.index.as_ref(),
                self.config.aggregation.aggregation_distance,
            )
        } else {
            ClusterMap::default()
        };
    }

    fn positions(&self) -> Vec<Position> {
        self.robots.iter().map(|robot| robot.position).collect()
    }

    /// Read pass: sense and gather neighbors for every robot from the frozen snapshot.
    fn stage_perceive(&self) -> Vec<Perception> {
        let positions = self.positions();
        let fallback = BruteForceIndex::new();
        let index: &dyn NeighborhoodIndex = if self.index_ready {
            self.index.as_ref()
        } else {
            &fallback
        };
        let view = WorldView {
            arena: &self.arena,
            positions: &positions,
            index,
        };
        let sensors = &self.sensors;
        let clusters = &self.clusters;
        let neighbor_radius = self.config.neighbor_query_radius();

        self.robots
            .par_iter()
            .enumerate()
            .map(|(idx, robot)| {
                let readings = sensors.sense(idx, robot.heading, view);
                let neighbors = NeighborSet::gather(idx, neighbor_radius, &positions, index);
                let visible = clusters.visible_from(idx, robot.position, &neighbors);
                Perception {
                    readings,
                    neighbors,
                    clusters: visible,
                    own_cluster_size: clusters.size_of_robot(idx),
                }
            })
            .collect()
    }

    /// Decide every robot in id order so RNG draws are reproducible.
    fn stage_decide(&mut self, next_tick: Tick, perceptions: &[Perception]) -> Vec<Decision> {
        let ctx = PolicyContext {
            config: &self.config,
            tick: next_tick,
            arena_center: self.arena.center(),
        };
        let mut decisions = Vec::with_capacity(self.robots.len());
        for (robot, perception) in self.robots.iter().zip(perceptions) {
            let decision = behavior::decide(
                self.behavior,
                robot,
                &perception.observation(),
                &ctx,
                &mut self.rng,
            );
            if decision.state.label() != robot.behavior.label() {
                trace!(
                    robot = robot.id.0,
                    tick = next_tick.0,
                    from = robot.behavior.label(),
                    to = decision.state.label(),
                    "behavior transition"
                );
            }
            decisions.push(decision);
        }
        decisions
    }

    /// Write pass: record trails, commit states and integrate motion.
    fn stage_actuation(&mut self, decisions: Vec<Decision>, perceptions: Vec<Perception>) -> usize {
        let arena = &self.arena;
        let limits = &self.limits;
        self.robots
            .par_iter_mut()
            .zip(decisions.into_par_iter().zip(perceptions.into_par_iter()))
            .map(|(robot, (decision, perception))| {
                if decision.record_trail {
                    robot.trail.push(robot.position);
                }
                robot.behavior = decision.state;
                robot.readings = perception.readings;
                kinematics::integrate(robot, decision.command, arena, limits)
            })
            .filter(|&bounced| bounced)
            .count()
    }

    fn summarize(&self, bounces: usize) -> TickSummary {
        let mut summary = TickSummary {
            tick: self.tick,
            robot_count: self.robots.len(),
            cluster_count: self.clusters.count_at_least(2),
            largest_cluster: self.clusters.largest(),
            bounces,
            ..TickSummary::default()
        };
        let mut trail_total = 0usize;
        for robot in &self.robots {
            match robot.behavior.phase() {
                MotionPhase::Moving => summary.moving += 1,
                MotionPhase::Stopped => summary.stopped += 1,
                MotionPhase::Leaving => summary.leaving += 1,
            }
            trail_total += robot.trail.len();
        }
        if !self.robots.is_empty() {
            summary.mean_trail_length = trail_total as f32 / self.robots.len() as f32;
        }
        summary
    }

    fn push_history(&mut self, summary: TickSummary) {
        if self.history.len() >= self.config.history_capacity {
            self.history.pop_front();
        }
        self.history.push_back(summary);
    }

    /// Execute one sense, decide, act tick and return its summary.
    pub fn step(&mut self) -> TickSummary {
        let next_tick = self.tick.next();
        let perceptions = self.stage_perceive();
        let decisions = self.stage_decide(next_tick, &perceptions);
        let bounces = self.stage_actuation(decisions, perceptions);

        self.tick = next_tick;
        self.refresh_index();
        let summary = self.summarize(bounces);
        self.push_history(summary.clone());
        self.last_summary = summary.clone();
        summary
    }

    /// Advance one tick, accumulating an optional wall-clock hint, and return the new snapshot.
    ///
    /// The hint is bookkeeping only; dynamics are tick-based.
    pub fn advance(&mut self, elapsed_hint: Option<Duration>) -> WorldSnapshot {
        if let Some(hint) = elapsed_hint {
            self.elapsed = self.elapsed.saturating_add(hint);
        }
        self.step();
        self.snapshot()
    }

    #[must_use]
    pub fn snapshot(&self) -> WorldSnapshot {
        WorldSnapshot {
            tick: self.tick,
            elapsed: self.elapsed,
            behavior: self.behavior,
            robots: self.robots.clone(),
            summary: self.last_summary.clone(),
        }
    }

    #[must_use]
    pub fn config(&self) -> &SwarmConfig {
        &self.config
    }

    #[must_use]
    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    #[must_use]
    pub fn sensors(&self) -> &SensorArray {
        &self.sensors
    }

    #[must_use]
    pub const fn behavior(&self) -> BehaviorKind {
        self.behavior
    }

    #[must_use]
    pub const fn tick(&self) -> Tick {
        self.tick
    }

    #[must_use]
    pub fn robots(&self) -> &[RobotState] {
        &self.robots
    }

    #[must_use]
    pub fn robot(&self, id: RobotId) -> Option<&RobotState> {
        self.robots.get(id.index())
    }

    /// Cluster labels for the current positions.
    #[must_use]
    pub fn clusters(&self) -> &ClusterMap {
        &self.clusters
    }

    /// Most recent summary (tick zero right after construction or reset).
    #[must_use]
    pub fn last_summary(&self) -> &TickSummary {
        &self.last_summary
    }

    /// Iterator over recent tick summaries, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &TickSummary> {
        self.history.iter()
    }
}
