//! Static, validated configuration for a swarm run.

use std::f32::consts::{FRAC_PI_4, PI};

use rand::{SeedableRng, rngs::SmallRng};
use serde::{Deserialize, Serialize};

use crate::SwarmError;
use crate::behavior::BehaviorKind;
use crate::geometry::{ObstacleLayout, Segment};
use crate::placement::InitialDistribution;

/// Static configuration for a swarm world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwarmConfig {
    /// Width of the arena in world units.
    pub arena_width: f32,
    /// Height of the arena in world units.
    pub arena_height: f32,
    /// Named obstacle preset, scaled to the arena.
    pub obstacle_layout: ObstacleLayout,
    /// Extra obstacle segments added on top of the preset.
    pub obstacles: Vec<Segment>,
    /// Number of robots created at construction.
    pub robot_count: usize,
    /// Placement policy used at construction.
    pub initial_distribution: InitialDistribution,
    /// Policy every robot runs.
    pub behavior: BehaviorKind,
    /// Optional RNG seed for reproducible runs.
    pub rng_seed: Option<u64>,
    /// Maximum number of recent tick summaries retained in-memory.
    pub history_capacity: usize,
    pub motion: MotionSettings,
    pub sensors: SensorSettings,
    pub avoidance: AvoidanceSettings,
    pub wall_follow: WallFollowSettings,
    pub coverage: CoverageSettings,
    pub aggregation: AggregationSettings,
}

impl Default for SwarmConfig {
    fn default() -> Self {
        Self {
            arena_width: 1_000.0,
            arena_height: 800.0,
            obstacle_layout: ObstacleLayout::Open,
            obstacles: Vec::new(),
            robot_count: 20,
            initial_distribution: InitialDistribution::Random,
            behavior: BehaviorKind::CollisionAvoidance,
            rng_seed: None,
            history_capacity: 256,
            motion: MotionSettings::default(),
            sensors: SensorSettings::default(),
            avoidance: AvoidanceSettings::default(),
            wall_follow: WallFollowSettings::default(),
            coverage: CoverageSettings::default(),
            aggregation: AggregationSettings::default(),
        }
    }
}

/// Body size and actuation limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionSettings {
    /// Radius of the robot body.
    pub robot_size: f32,
    /// Forward speed behaviors aim for while moving.
    pub cruise_speed: f32,
    /// Hard cap on speed enforced by the integrator.
    pub max_speed: f32,
    /// Largest heading change per tick, in radians.
    pub max_turn_rate: f32,
    /// Largest speed change per tick.
    pub max_acceleration: f32,
    /// Fraction of speed kept after bouncing off a wall.
    pub bounce_damping: f32,
}

impl Default for MotionSettings {
    fn default() -> Self {
        Self {
            robot_size: 10.0,
            cruise_speed: 2.0,
            max_speed: 3.0,
            max_turn_rate: PI,
            max_acceleration: 3.0,
            bounce_damping: 0.8,
        }
    }
}

/// Range sensor fan and neighbor sensing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorSettings {
    /// Maximum ray length.
    pub range: f32,
    /// Ray offsets from heading in degrees, most negative (left) first.
    pub angles_deg: Vec<f32>,
    /// Radius within which other robots count as neighbors.
    pub neighbor_radius: f32,
}

impl Default for SensorSettings {
    fn default() -> Self {
        Self {
            range: 100.0,
            angles_deg: vec![-45.0, -30.0, -15.0, 0.0, 15.0, 30.0, 45.0],
            neighbor_radius: 50.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AvoidanceSettings {
    /// Front readings below this distance trigger an avoidance turn.
    pub collision_threshold: f32,
    /// Heading change applied per tick while avoiding.
    pub turn_step: f32,
    /// Amplitude of the uniform heading jitter in free space.
    pub jitter: f32,
}

impl Default for AvoidanceSettings {
    fn default() -> Self {
        Self {
            collision_threshold: 40.0,
            turn_step: 0.1,
            jitter: 0.02,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WallFollowSettings {
    /// Distance to keep between the side sensor and the wall.
    pub desired_distance: f32,
    /// Dead band around `desired_distance`.
    pub margin: f32,
    /// Any reading below this switches from searching to following.
    pub detect_threshold: f32,
    /// Front readings below this trigger the corner turn.
    pub corner_threshold: f32,
    pub corner_turn: f32,
    pub correction_turn: f32,
    pub search_jitter: f32,
    /// Index of the ray watching the followed wall.
    pub side_sensor: usize,
    /// Consecutive ticks without any reading below `detect_threshold` before
    /// giving up on the wall and searching again.
    pub lost_ticks: u32,
}

impl Default for WallFollowSettings {
    fn default() -> Self {
        Self {
            desired_distance: 40.0,
            margin: 10.0,
            detect_threshold: 50.0,
            corner_threshold: 30.0,
            corner_turn: 0.1,
            correction_turn: 0.05,
            search_jitter: 0.05,
            side_sensor: 5,
            lost_ticks: 90,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoverageSettings {
    /// Any reading below this triggers a quarter turn.
    pub obstacle_threshold: f32,
    /// Spiral radius on the first tick.
    pub initial_radius: f32,
    /// Spiral radius gained per tick.
    pub radius_growth: f32,
    /// Chance per tick of an extra random heading perturbation.
    pub perturb_probability: f32,
    /// Amplitude of that perturbation in radians.
    pub perturb_max: f32,
    /// Capacity of each robot's trail ring buffer.
    pub trail_length: usize,
}

impl Default for CoverageSettings {
    fn default() -> Self {
        Self {
            obstacle_threshold: 30.0,
            initial_radius: 40.0,
            radius_growth: 0.1,
            perturb_probability: 0.05,
            perturb_max: FRAC_PI_4,
            trail_length: 500,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationSettings {
    /// Neighbors strictly closer than this stop a moving robot.
    pub aggregation_distance: f32,
    /// Ticks a timed robot stays stopped before it may consider leaving.
    pub wait_time: u64,
    /// Timed: chance of leaving a cluster that is large enough to stay in.
    pub leave_probability: f32,
    /// Timed: clusters with fewer close neighbors than this are always left.
    pub min_cluster_size: usize,
    /// Ticks spent in the leaving state before moving freely again.
    pub leave_duration: u64,
    /// Speed multiplier applied to `cruise_speed` while leaving.
    pub leave_speed_factor: f32,
    /// Heading jitter amplitude while moving.
    pub wander_jitter: f32,
    /// Adaptive: numerator of the per-tick leave probability `base / (size + 1)`.
    pub adaptive_base_probability: f32,
    /// Adaptive: clusters larger than this use `large_cluster_probability`.
    pub large_cluster_size: usize,
    pub large_cluster_probability: f32,
    /// Adaptive: clusters larger than this pull in moving or leaving robots.
    pub rejoin_cluster_size: usize,
    /// Ticks without any neighbor before heading is biased toward the center.
    pub isolation_ticks: u32,
    /// Fraction of the center bearing error corrected per tick when isolated.
    pub center_bias: f32,
}

impl Default for AggregationSettings {
    fn default() -> Self {
        Self {
            aggregation_distance: 30.0,
            wait_time: 120,
            leave_probability: 0.1,
            min_cluster_size: 3,
            leave_duration: 30,
            leave_speed_factor: 1.5,
            wander_jitter: 0.1,
            adaptive_base_probability: 0.01,
            large_cluster_size: 10,
            large_cluster_probability: 0.0005,
            rejoin_cluster_size: 8,
            isolation_ticks: 60,
            center_bias: 0.1,
        }
    }
}

fn positive(value: f32) -> bool {
    value.is_finite() && value > 0.0
}

fn non_negative(value: f32) -> bool {
    value.is_finite() && value >= 0.0
}

fn probability(value: f32) -> bool {
    (0.0..=1.0).contains(&value)
}

impl SwarmConfig {
    /// Validates every parameter, returning the first problem found.
    pub fn validate(&self) -> Result<(), SwarmError> {
        if !positive(self.arena_width) || !positive(self.arena_height) {
            return Err(SwarmError::InvalidConfig(
                "arena dimensions must be positive",
            ));
        }
        if self.obstacles.iter().any(|segment| !segment.is_finite()) {
            return Err(SwarmError::InvalidConfig(
                "obstacle coordinates must be finite",
            ));
        }
        if self.history_capacity == 0 {
            return Err(SwarmError::InvalidConfig(
                "history_capacity must be non-zero",
            ));
        }

        let motion = &self.motion;
        if !positive(motion.robot_size) {
            return Err(SwarmError::InvalidConfig("robot_size must be positive"));
        }
        if self.arena_width <= 2.0 * motion.robot_size
            || self.arena_height <= 2.0 * motion.robot_size
        {
            return Err(SwarmError::InvalidConfig(
                "arena must be larger than one robot diameter",
            ));
        }
        if !positive(motion.max_speed)
            || !non_negative(motion.cruise_speed)
            || motion.cruise_speed > motion.max_speed
        {
            return Err(SwarmError::InvalidConfig(
                "speeds must satisfy 0 <= cruise_speed <= max_speed, max_speed > 0",
            ));
        }
        if !positive(motion.max_turn_rate) || !positive(motion.max_acceleration) {
            return Err(SwarmError::InvalidConfig(
                "max_turn_rate and max_acceleration must be positive",
            ));
        }
        if !probability(motion.bounce_damping) {
            return Err(SwarmError::InvalidConfig(
                "bounce_damping must be within [0, 1]",
            ));
        }

        let sensors = &self.sensors;
        if sensors.angles_deg.is_empty() {
            return Err(SwarmError::InvalidConfig(
                "at least one sensor angle is required",
            ));
        }
        if sensors.angles_deg.iter().any(|angle| !angle.is_finite()) {
            return Err(SwarmError::InvalidConfig("sensor angles must be finite"));
        }
        if !positive(sensors.range) || !positive(sensors.neighbor_radius) {
            return Err(SwarmError::InvalidConfig(
                "sensor range and neighbor_radius must be positive",
            ));
        }

        let avoidance = &self.avoidance;
        if !non_negative(avoidance.collision_threshold)
            || !non_negative(avoidance.turn_step)
            || !non_negative(avoidance.jitter)
        {
            return Err(SwarmError::InvalidConfig(
                "avoidance parameters must be non-negative",
            ));
        }

        let wall = &self.wall_follow;
        if !non_negative(wall.desired_distance)
            || !non_negative(wall.margin)
            || !non_negative(wall.detect_threshold)
            || !non_negative(wall.corner_threshold)
            || !non_negative(wall.corner_turn)
            || !non_negative(wall.correction_turn)
            || !non_negative(wall.search_jitter)
        {
            return Err(SwarmError::InvalidConfig(
                "wall follow parameters must be non-negative",
            ));
        }
        if wall.side_sensor >= sensors.angles_deg.len() {
            return Err(SwarmError::InvalidConfig(
                "wall follow side_sensor must index an existing sensor",
            ));
        }
        if wall.lost_ticks == 0 {
            return Err(SwarmError::InvalidConfig(
                "wall follow lost_ticks must be non-zero",
            ));
        }

        let coverage = &self.coverage;
        if !non_negative(coverage.obstacle_threshold)
            || !positive(coverage.initial_radius)
            || !non_negative(coverage.radius_growth)
            || !non_negative(coverage.perturb_max)
        {
            return Err(SwarmError::InvalidConfig(
                "coverage distances must be non-negative and initial_radius positive",
            ));
        }
        if !probability(coverage.perturb_probability) {
            return Err(SwarmError::InvalidConfig(
                "coverage perturb_probability must be within [0, 1]",
            ));
        }
        if coverage.trail_length == 0 {
            return Err(SwarmError::InvalidConfig("trail_length must be non-zero"));
        }

        let aggregation = &self.aggregation;
        if !positive(aggregation.aggregation_distance) {
            return Err(SwarmError::InvalidConfig(
                "aggregation_distance must be positive",
            ));
        }
        if !probability(aggregation.leave_probability)
            || !probability(aggregation.adaptive_base_probability)
            || !probability(aggregation.large_cluster_probability)
        {
            return Err(SwarmError::InvalidConfig(
                "leave probabilities must be within [0, 1]",
            ));
        }
        let smallest_inverse = aggregation.adaptive_base_probability
            / (aggregation.large_cluster_size as f32 + 1.0);
        if aggregation.large_cluster_probability > smallest_inverse {
            return Err(SwarmError::InvalidConfig(
                "large_cluster_probability must not exceed adaptive_base_probability / (large_cluster_size + 1)",
            ));
        }
        if !positive(aggregation.leave_speed_factor)
            || !non_negative(aggregation.wander_jitter)
            || !probability(aggregation.center_bias)
        {
            return Err(SwarmError::InvalidConfig(
                "leave_speed_factor must be positive, wander_jitter non-negative, center_bias within [0, 1]",
            ));
        }

        SwarmError::check_robot_count(self.robot_count)
    }

    /// Radius each robot's neighbor set is gathered at.
    ///
    /// Covers `aggregation_distance` so the stop trigger never misses a robot
    /// sitting between the two radii.
    #[must_use]
    pub fn neighbor_query_radius(&self) -> f32 {
        self.sensors
            .neighbor_radius
            .max(self.aggregation.aggregation_distance)
    }

    /// All obstacle segments: the preset followed by the explicit list.
    #[must_use]
    pub fn obstacle_segments(&self) -> Vec<Segment> {
        let mut segments = self
            .obstacle_layout
            .segments(self.arena_width, self.arena_height);
        segments.extend_from_slice(&self.obstacles);
        segments
    }

    /// Returns the configured RNG seed, generating one from entropy if absent.
    pub(crate) fn seeded_rng(&self) -> SmallRng {
        match self.rng_seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => {
                let seed: u64 = rand::random();
                SmallRng::seed_from_u64(seed)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(SwarmConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_sensors_is_rejected() {
        let mut config = SwarmConfig::default();
        config.sensors.angles_deg.clear();
        assert!(matches!(
            config.validate(),
            Err(SwarmError::InvalidConfig(_))
        ));
    }

    #[test]
    fn negative_range_is_rejected() {
        let mut config = SwarmConfig::default();
        config.sensors.range = -1.0;
        assert!(matches!(
            config.validate(),
            Err(SwarmError::InvalidConfig(_))
        ));
    }

    #[test]
    fn side_sensor_must_exist() {
        let mut config = SwarmConfig::default();
        config.sensors.angles_deg = vec![-15.0, 0.0, 15.0];
        assert!(config.validate().is_err());
        config.wall_follow.side_sensor = 2;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_robots_is_an_invalid_count() {
        let config = SwarmConfig {
            robot_count: 0,
            ..SwarmConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(SwarmError::InvalidRobotCount { count: 0, .. })
        ));
    }

    #[test]
    fn probabilities_are_bounded() {
        let mut config = SwarmConfig::default();
        config.aggregation.leave_probability = 1.5;
        assert!(config.validate().is_err());
        config.aggregation.leave_probability = 1.0;
        config.coverage.perturb_probability = -0.1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn tiny_arena_is_rejected() {
        let config = SwarmConfig {
            arena_width: 15.0,
            ..SwarmConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn neighbor_query_radius_covers_aggregation_distance() {
        let mut config = SwarmConfig::default();
        assert_eq!(config.neighbor_query_radius(), 50.0);
        config.aggregation.aggregation_distance = 80.0;
        assert_eq!(config.neighbor_query_radius(), 80.0);
    }

    #[test]
    fn large_cluster_probability_must_stay_below_the_inverse_curve() {
        let mut config = SwarmConfig::default();
        config.aggregation.large_cluster_probability = 0.001;
        assert!(matches!(config.validate(), Err(SwarmError::InvalidConfig(_))));
        config.aggregation.large_cluster_size = 5;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: SwarmConfig = serde_json::from_str(
            r#"{ "robot_count": 3, "behavior": "timed_aggregation", "aggregation": { "wait_time": 10 } }"#,
        )
        .expect("parse");
        assert_eq!(config.robot_count, 3);
        assert_eq!(config.behavior, BehaviorKind::TimedAggregation);
        assert_eq!(config.aggregation.wait_time, 10);
        assert_eq!(config.aggregation.aggregation_distance, 30.0);
        assert_eq!(config.sensors.angles_deg.len(), 7);
    }

    #[test]
    fn obstacle_segments_combine_preset_and_explicit() {
        let config = SwarmConfig {
            obstacle_layout: ObstacleLayout::Blocks,
            obstacles: Segment::rectangle(10.0, 10.0, 5.0, 5.0).to_vec(),
            ..SwarmConfig::default()
        };
        assert_eq!(config.obstacle_segments().len(), 16);
    }
}
