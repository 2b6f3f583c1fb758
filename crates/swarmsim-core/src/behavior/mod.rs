//! Per-robot control policies.
//!
//! Every policy is a pure function of the robot's own state, its observation of
//! the pre-tick snapshot and the world RNG. Policies never see other robots'
//! post-tick state, so the order in which robots are decided only affects the
//! sequence of random draws.

mod aggregation;
mod avoidance;
mod coverage;
mod wall_follow;

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::SwarmConfig;
use crate::kinematics::wrap_angle;
use crate::neighbors::{ClusterView, NeighborSet};
use crate::sensors::SensorReadings;
use crate::{Position, RobotState, Tick};

/// Selectable control policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BehaviorKind {
    #[default]
    CollisionAvoidance,
    WallFollower,
    VacuumCoverage,
    BasicAggregation,
    TimedAggregation,
    AdaptiveAggregation,
}

impl BehaviorKind {
    pub const ALL: [BehaviorKind; 6] = [
        BehaviorKind::CollisionAvoidance,
        BehaviorKind::WallFollower,
        BehaviorKind::VacuumCoverage,
        BehaviorKind::BasicAggregation,
        BehaviorKind::TimedAggregation,
        BehaviorKind::AdaptiveAggregation,
    ];

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            BehaviorKind::CollisionAvoidance => "collision_avoidance",
            BehaviorKind::WallFollower => "wall_follower",
            BehaviorKind::VacuumCoverage => "vacuum_coverage",
            BehaviorKind::BasicAggregation => "basic_aggregation",
            BehaviorKind::TimedAggregation => "timed_aggregation",
            BehaviorKind::AdaptiveAggregation => "adaptive_aggregation",
        }
    }

    #[must_use]
    pub const fn is_aggregation(self) -> bool {
        matches!(
            self,
            BehaviorKind::BasicAggregation
                | BehaviorKind::TimedAggregation
                | BehaviorKind::AdaptiveAggregation
        )
    }

    /// State a robot starts in under this policy.
    #[must_use]
    pub fn initial_state(self, config: &SwarmConfig) -> BehaviorState {
        match self {
            BehaviorKind::CollisionAvoidance => BehaviorState::Idle,
            BehaviorKind::WallFollower => BehaviorState::Searching,
            BehaviorKind::VacuumCoverage => BehaviorState::Spiraling {
                radius: config.coverage.initial_radius,
            },
            BehaviorKind::BasicAggregation
            | BehaviorKind::TimedAggregation
            | BehaviorKind::AdaptiveAggregation => BehaviorState::Moving { isolated_for: 0 },
        }
    }
}

impl fmt::Display for BehaviorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Policy-specific state carried by each robot between ticks.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum BehaviorState {
    /// Stateless policies.
    #[default]
    Idle,
    /// Wall follower looking for a wall.
    Searching,
    /// Wall follower tracking a wall; counts ticks without one in range.
    Following { lost_for: u32 },
    /// Coverage spiral with its current radius.
    Spiraling { radius: f32 },
    /// Aggregation: wandering; counts ticks with no neighbor in range.
    Moving { isolated_for: u32 },
    /// Aggregation: stopped since `since`, optionally parked next to a cluster centroid.
    Stopped {
        since: Tick,
        anchor: Option<Position>,
    },
    /// Aggregation: departing along `heading_bias` since `since`.
    Leaving { since: Tick, heading_bias: f32 },
}

/// Coarse phase used for summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MotionPhase {
    Moving,
    Stopped,
    Leaving,
}

impl BehaviorState {
    #[must_use]
    pub const fn phase(&self) -> MotionPhase {
        match self {
            BehaviorState::Stopped { .. } => MotionPhase::Stopped,
            BehaviorState::Leaving { .. } => MotionPhase::Leaving,
            _ => MotionPhase::Moving,
        }
    }

    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            BehaviorState::Idle => "idle",
            BehaviorState::Searching => "searching",
            BehaviorState::Following { .. } => "following",
            BehaviorState::Spiraling { .. } => "spiraling",
            BehaviorState::Moving { .. } => "moving",
            BehaviorState::Stopped { .. } => "stopped",
            BehaviorState::Leaving { .. } => "leaving",
        }
    }
}

/// Requested heading change and speed change for one tick.
///
/// Unclamped; the integrator enforces the motion limits.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MotionCommand {
    /// Heading change in radians; positive is clockwise in screen coordinates.
    pub turn: f32,
    /// Speed change.
    pub throttle: f32,
}

impl MotionCommand {
    #[must_use]
    pub const fn new(turn: f32, throttle: f32) -> Self {
        Self { turn, throttle }
    }

    /// Turn while steering speed toward `target_speed`.
    #[must_use]
    pub fn cruise(turn: f32, current_speed: f32, target_speed: f32) -> Self {
        Self::new(turn, target_speed - current_speed)
    }

    /// Brake to a standstill.
    #[must_use]
    pub fn halt(current_speed: f32) -> Self {
        Self::new(0.0, -current_speed)
    }
}

/// Output of one policy evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decision {
    pub command: MotionCommand,
    pub state: BehaviorState,
    /// Append the pre-move position to the robot's trail.
    pub record_trail: bool,
}

impl Decision {
    #[must_use]
    pub const fn new(command: MotionCommand, state: BehaviorState) -> Self {
        Self {
            command,
            state,
            record_trail: false,
        }
    }

    #[must_use]
    pub const fn with_trail(mut self) -> Self {
        self.record_trail = true;
        self
    }
}

/// What one robot perceived of the pre-tick snapshot.
#[derive(Debug, Clone, Copy)]
pub struct Observation<'a> {
    pub readings: &'a SensorReadings,
    pub neighbors: &'a NeighborSet,
    /// Clusters other than the robot's own with a member in `neighbors`, nearest centroid first.
    pub clusters: &'a [ClusterView],
    /// Size of the robot's own cluster, itself included.
    pub own_cluster_size: usize,
}

/// Shared inputs for every decision of one tick.
#[derive(Debug, Clone, Copy)]
pub struct PolicyContext<'a> {
    pub config: &'a SwarmConfig,
    /// The tick being computed.
    pub tick: Tick,
    pub arena_center: Position,
}

/// Evaluate `kind` for one robot.
pub fn decide<R: Rng + ?Sized>(
    kind: BehaviorKind,
    robot: &RobotState,
    observation: &Observation<'_>,
    ctx: &PolicyContext<'_>,
    rng: &mut R,
) -> Decision {
    match kind {
        BehaviorKind::CollisionAvoidance => avoidance::decide(robot, observation, ctx, rng),
        BehaviorKind::WallFollower => wall_follow::decide(robot, observation, ctx, rng),
        BehaviorKind::VacuumCoverage => coverage::decide(robot, observation, ctx, rng),
        BehaviorKind::BasicAggregation
        | BehaviorKind::TimedAggregation
        | BehaviorKind::AdaptiveAggregation => {
            aggregation::decide(kind, robot, observation, ctx, rng)
        }
    }
}

/// Uniform heading noise in `[-amplitude, amplitude]`.
fn jitter<R: Rng + ?Sized>(rng: &mut R, amplitude: f32) -> f32 {
    if amplitude > 0.0 {
        rng.random_range(-amplitude..=amplitude)
    } else {
        0.0
    }
}

/// Signed turn that points `heading` at `target`.
fn steer_toward(heading: f32, target: f32) -> f32 {
    wrap_angle(target - heading)
}

/// Absolute bearing from `from` to `to`, or `None` if they coincide.
fn bearing(from: Position, to: Position) -> Option<f32> {
    let (dx, dy) = (to.x - from.x, to.y - from.y);
    (dx.abs() > f32::EPSILON || dy.abs() > f32::EPSILON).then(|| dy.atan2(dx))
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::RobotId;
    use crate::neighbors::Neighbor;
    use crate::sensors::SensorSample;

    pub fn readings(distances: &[f32]) -> SensorReadings {
        let angles = [-45.0_f32, -30.0, -15.0, 0.0, 15.0, 30.0, 45.0];
        let samples = distances
            .iter()
            .zip(angles)
            .map(|(&distance, deg)| SensorSample {
                angle_offset: deg.to_radians(),
                distance,
            })
            .collect();
        SensorReadings::new(samples, 100.0)
    }

    pub fn clear() -> SensorReadings {
        readings(&[100.0; 7])
    }

    pub fn neighbors(entries: &[(u32, f32, Position)]) -> NeighborSet {
        NeighborSet::from_neighbors(
            entries
                .iter()
                .map(|&(id, distance, position)| Neighbor {
                    id: RobotId(id),
                    distance,
                    position,
                })
                .collect(),
        )
    }

    pub fn robot(state: BehaviorState, speed: f32) -> RobotState {
        let mut robot = RobotState::new(RobotId(0), Position::new(500.0, 400.0), 0.0, 16);
        robot.behavior = state;
        robot.velocity = crate::Velocity::new(speed, 0.0);
        robot
    }

    pub fn observe<'a>(
        readings: &'a SensorReadings,
        neighbors: &'a NeighborSet,
        clusters: &'a [ClusterView],
        own_cluster_size: usize,
    ) -> Observation<'a> {
        Observation {
            readings,
            neighbors,
            clusters,
            own_cluster_size,
        }
    }

    pub fn context(config: &SwarmConfig, tick: u64) -> PolicyContext<'_> {
        PolicyContext {
            config,
            tick: Tick(tick),
            arena_center: Position::new(config.arena_width * 0.5, config.arena_height * 0.5),
        }
    }
}
