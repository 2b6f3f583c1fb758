//! Stop-near-neighbors aggregation and its timed and adaptive variants.

use rand::Rng;

use super::{
    BehaviorKind, BehaviorState, Decision, MotionCommand, Observation, PolicyContext, bearing,
    jitter, steer_toward,
};
use crate::config::AggregationSettings;
use crate::geometry::direction;
use crate::neighbors::ClusterView;
use crate::{Position, RobotState, Tick};

pub(super) fn decide<R: Rng + ?Sized>(
    kind: BehaviorKind,
    robot: &RobotState,
    observation: &Observation<'_>,
    ctx: &PolicyContext<'_>,
    rng: &mut R,
) -> Decision {
    match robot.behavior {
        BehaviorState::Stopped { since, anchor } => {
            stopped(kind, robot, observation, ctx, rng, since, anchor)
        }
        BehaviorState::Leaving {
            since,
            heading_bias,
        } => leaving(kind, robot, observation, ctx, rng, since, heading_bias),
        BehaviorState::Moving { isolated_for } => {
            moving(kind, robot, observation, ctx, rng, isolated_for)
        }
        _ => moving(kind, robot, observation, ctx, rng, 0),
    }
}

fn moving<R: Rng + ?Sized>(
    kind: BehaviorKind,
    robot: &RobotState,
    observation: &Observation<'_>,
    ctx: &PolicyContext<'_>,
    rng: &mut R,
    isolated_for: u32,
) -> Decision {
    let settings = &ctx.config.aggregation;
    if kind == BehaviorKind::AdaptiveAggregation
        && let Some(cluster) = rejoin_target(observation.clusters, settings, robot.position, None)
    {
        return rejoin(robot, cluster, ctx.tick);
    }

    if observation.neighbors.count_within(settings.aggregation_distance) > 0 {
        return Decision::new(
            MotionCommand::halt(robot.velocity.speed()),
            BehaviorState::Stopped {
                since: ctx.tick,
                anchor: None,
            },
        );
    }

    wander(robot, observation, ctx, rng, isolated_for)
}

fn stopped<R: Rng + ?Sized>(
    kind: BehaviorKind,
    robot: &RobotState,
    observation: &Observation<'_>,
    ctx: &PolicyContext<'_>,
    rng: &mut R,
    since: Tick,
    anchor: Option<Position>,
) -> Decision {
    let settings = &ctx.config.aggregation;
    let halt = MotionCommand::halt(robot.velocity.speed());
    let stay = Decision::new(halt, BehaviorState::Stopped { since, anchor });

    match kind {
        BehaviorKind::TimedAggregation => {
            if ctx.tick.0.saturating_sub(since.0) < settings.wait_time {
                return stay;
            }
            let close = observation
                .neighbors
                .count_within(settings.aggregation_distance);
            if close < settings.min_cluster_size || rng.random::<f32>() < settings.leave_probability
            {
                depart(robot, observation, ctx, anchor)
            } else {
                // Stay for another full wait.
                Decision::new(
                    halt,
                    BehaviorState::Stopped {
                        since: ctx.tick,
                        anchor,
                    },
                )
            }
        }
        BehaviorKind::AdaptiveAggregation => {
            let size = effective_cluster_size(observation, anchor);
            if rng.random::<f32>() < adaptive_leave_probability(size, settings) {
                depart(robot, observation, ctx, anchor)
            } else {
                stay
            }
        }
        _ => stay,
    }
}

fn leaving<R: Rng + ?Sized>(
    kind: BehaviorKind,
    robot: &RobotState,
    observation: &Observation<'_>,
    ctx: &PolicyContext<'_>,
    rng: &mut R,
    since: Tick,
    heading_bias: f32,
) -> Decision {
    let settings = &ctx.config.aggregation;
    if kind == BehaviorKind::AdaptiveAggregation
        && let Some(cluster) = rejoin_target(
            observation.clusters,
            settings,
            robot.position,
            Some(heading_bias),
        )
    {
        return rejoin(robot, cluster, ctx.tick);
    }

    if ctx.tick.0.saturating_sub(since.0) >= settings.leave_duration {
        return wander(robot, observation, ctx, rng, 0);
    }

    Decision::new(
        MotionCommand::cruise(
            steer_toward(robot.heading, heading_bias),
            robot.velocity.speed(),
            leave_speed(ctx),
        ),
        BehaviorState::Leaving {
            since,
            heading_bias,
        },
    )
}

/// Free movement with heading noise, drifting toward the arena center once
/// the robot has been alone for `isolation_ticks`.
fn wander<R: Rng + ?Sized>(
    robot: &RobotState,
    observation: &Observation<'_>,
    ctx: &PolicyContext<'_>,
    rng: &mut R,
    isolated_for: u32,
) -> Decision {
    let settings = &ctx.config.aggregation;
    let alone = observation
        .neighbors
        .count_within(ctx.config.sensors.neighbor_radius)
        == 0;
    let isolated_for = if alone {
        isolated_for.saturating_add(1)
    } else {
        0
    };

    let mut turn = jitter(rng, settings.wander_jitter);
    if isolated_for >= settings.isolation_ticks
        && let Some(center) = bearing(robot.position, ctx.arena_center)
    {
        turn += settings.center_bias * steer_toward(robot.heading, center);
    }

    Decision::new(
        MotionCommand::cruise(
            turn,
            robot.velocity.speed(),
            ctx.config.motion.cruise_speed,
        ),
        BehaviorState::Moving { isolated_for },
    )
}

fn depart(
    robot: &RobotState,
    observation: &Observation<'_>,
    ctx: &PolicyContext<'_>,
    anchor: Option<Position>,
) -> Decision {
    let settings = &ctx.config.aggregation;
    let away_from = observation
        .neighbors
        .centroid_within(settings.aggregation_distance)
        .or(anchor);
    // A centroid on top of the robot gives no direction; keep the current heading.
    let heading_bias = away_from
        .and_then(|point| bearing(point, robot.position))
        .unwrap_or(robot.heading);

    Decision::new(
        MotionCommand::cruise(
            steer_toward(robot.heading, heading_bias),
            robot.velocity.speed(),
            leave_speed(ctx),
        ),
        BehaviorState::Leaving {
            since: ctx.tick,
            heading_bias,
        },
    )
}

fn rejoin(robot: &RobotState, cluster: &ClusterView, tick: Tick) -> Decision {
    let turn = bearing(robot.position, cluster.centroid)
        .map_or(0.0, |target| steer_toward(robot.heading, target));
    Decision::new(
        MotionCommand::new(turn, -robot.velocity.speed()),
        BehaviorState::Stopped {
            since: tick,
            anchor: Some(cluster.centroid),
        },
    )
}

/// Nearest visible cluster large enough to pull the robot in.
///
/// With `ahead_of`, only clusters whose centroid lies in front of that heading count.
fn rejoin_target<'a>(
    clusters: &'a [ClusterView],
    settings: &AggregationSettings,
    position: Position,
    ahead_of: Option<f32>,
) -> Option<&'a ClusterView> {
    clusters
        .iter()
        .filter(|cluster| cluster.size > settings.rejoin_cluster_size)
        .find(|cluster| match ahead_of {
            None => true,
            Some(heading) => {
                let (dx, dy) = direction(heading);
                (cluster.centroid.x - position.x) * dx + (cluster.centroid.y - position.y) * dy
                    > 0.0
            }
        })
}

/// Own cluster size, or the size of the cluster the robot parked beside when larger.
fn effective_cluster_size(observation: &Observation<'_>, anchor: Option<Position>) -> usize {
    let parked_beside = anchor.and_then(|anchor| {
        observation
            .clusters
            .iter()
            .min_by(|a, b| {
                anchor
                    .distance(a.centroid)
                    .total_cmp(&anchor.distance(b.centroid))
            })
            .map(|cluster| cluster.size)
    });
    observation
        .own_cluster_size
        .max(parked_beside.unwrap_or(0))
}

/// Per-tick chance that a stopped adaptive robot leaves a cluster of `size`.
///
/// `base / (size + 1)` up to `large_cluster_size`, then the fixed
/// `large_cluster_probability`. Validation keeps the fixed value at or below
/// the curve, so the result never grows with `size`.
pub(crate) fn adaptive_leave_probability(size: usize, settings: &AggregationSettings) -> f32 {
    if size > settings.large_cluster_size {
        settings.large_cluster_probability
    } else {
        settings.adaptive_base_probability / (size as f32 + 1.0)
    }
}

fn leave_speed(ctx: &PolicyContext<'_>) -> f32 {
    let motion = &ctx.config.motion;
    (motion.cruise_speed * ctx.config.aggregation.leave_speed_factor).min(motion.max_speed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behavior::test_support::*;
    use crate::config::SwarmConfig;
    use crate::neighbors::NeighborSet;
    use rand::{SeedableRng, rngs::SmallRng};
    use std::f32::consts::FRAC_PI_2;

    fn at(x: f32, y: f32) -> Position {
        Position::new(x, y)
    }

    fn cluster(label: usize, size: usize, centroid: Position, from: Position) -> ClusterView {
        ClusterView {
            label,
            size,
            centroid,
            distance: from.distance(centroid),
        }
    }

    fn run(
        kind: BehaviorKind,
        config: &SwarmConfig,
        robot: &RobotState,
        neighbors: &NeighborSet,
        clusters: &[ClusterView],
        tick: u64,
        rng: &mut SmallRng,
    ) -> Decision {
        let readings = clear();
        decide(
            kind,
            robot,
            &observe(&readings, neighbors, clusters, 1),
            &context(config, tick),
            rng,
        )
    }

    #[test]
    fn basic_stops_only_below_aggregation_distance() {
        let config = SwarmConfig::default();
        let mut rng = SmallRng::seed_from_u64(1);
        let moving = robot(BehaviorState::Moving { isolated_for: 0 }, 2.0);

        let near = neighbors(&[(1, 29.0, at(529.0, 400.0))]);
        let decision = run(
            BehaviorKind::BasicAggregation,
            &config,
            &moving,
            &near,
            &[],
            4,
            &mut rng,
        );
        assert_eq!(
            decision.state,
            BehaviorState::Stopped {
                since: Tick(4),
                anchor: None
            }
        );
        assert_eq!(decision.command, MotionCommand::halt(2.0));

        let far = neighbors(&[(1, 31.0, at(531.0, 400.0))]);
        let decision = run(
            BehaviorKind::BasicAggregation,
            &config,
            &moving,
            &far,
            &[],
            4,
            &mut rng,
        );
        assert_eq!(decision.state, BehaviorState::Moving { isolated_for: 0 });
    }

    #[test]
    fn basic_never_leaves() {
        let mut config = SwarmConfig::default();
        config.aggregation.leave_probability = 1.0;
        let mut rng = SmallRng::seed_from_u64(1);
        let stopped = robot(
            BehaviorState::Stopped {
                since: Tick(0),
                anchor: None,
            },
            0.0,
        );
        let alone = neighbors(&[]);
        for tick in [1, 500, 10_000] {
            let decision = run(
                BehaviorKind::BasicAggregation,
                &config,
                &stopped,
                &alone,
                &[],
                tick,
                &mut rng,
            );
            assert_eq!(decision.state, stopped.behavior);
        }
    }

    #[test]
    fn timed_gate_holds_until_wait_time() {
        let mut config = SwarmConfig::default();
        config.aggregation.leave_probability = 1.0;
        config.aggregation.min_cluster_size = 100;
        let mut rng = SmallRng::seed_from_u64(9);
        let stopped = robot(
            BehaviorState::Stopped {
                since: Tick(0),
                anchor: None,
            },
            0.0,
        );
        let pair = neighbors(&[(1, 15.0, at(515.0, 400.0))]);

        for tick in 1..config.aggregation.wait_time {
            let decision = run(
                BehaviorKind::TimedAggregation,
                &config,
                &stopped,
                &pair,
                &[],
                tick,
                &mut rng,
            );
            assert_eq!(decision.state, stopped.behavior, "left early at tick {tick}");
        }

        let decision = run(
            BehaviorKind::TimedAggregation,
            &config,
            &stopped,
            &pair,
            &[],
            config.aggregation.wait_time,
            &mut rng,
        );
        match decision.state {
            BehaviorState::Leaving {
                since,
                heading_bias,
            } => {
                assert_eq!(since, Tick(config.aggregation.wait_time));
                // Neighbor sits to the east, so the robot heads west.
                assert!((heading_bias.abs() - std::f32::consts::PI).abs() < 1e-4);
            }
            other => panic!("expected Leaving, got {other:?}"),
        }
    }

    #[test]
    fn timed_restarts_the_wait_in_a_large_cluster() {
        let mut config = SwarmConfig::default();
        config.aggregation.leave_probability = 0.0;
        let mut rng = SmallRng::seed_from_u64(9);
        let stopped = robot(
            BehaviorState::Stopped {
                since: Tick(0),
                anchor: None,
            },
            0.0,
        );
        let crowd = neighbors(&[
            (1, 12.0, at(512.0, 400.0)),
            (2, 12.0, at(488.0, 400.0)),
            (3, 12.0, at(500.0, 412.0)),
        ]);
        let decision = run(
            BehaviorKind::TimedAggregation,
            &config,
            &stopped,
            &crowd,
            &[],
            200,
            &mut rng,
        );
        assert_eq!(
            decision.state,
            BehaviorState::Stopped {
                since: Tick(200),
                anchor: None
            }
        );
    }

    #[test]
    fn leaving_runs_fast_then_resumes_moving() {
        let config = SwarmConfig::default();
        let mut rng = SmallRng::seed_from_u64(2);
        let leaving = robot(
            BehaviorState::Leaving {
                since: Tick(10),
                heading_bias: 0.0,
            },
            0.0,
        );
        let alone = neighbors(&[]);
        let decision = run(
            BehaviorKind::TimedAggregation,
            &config,
            &leaving,
            &alone,
            &[],
            11,
            &mut rng,
        );
        assert_eq!(decision.command.throttle, 3.0);
        assert_eq!(decision.state, leaving.behavior);

        let decision = run(
            BehaviorKind::TimedAggregation,
            &config,
            &leaving,
            &alone,
            &[],
            10 + config.aggregation.leave_duration,
            &mut rng,
        );
        assert_eq!(decision.state, BehaviorState::Moving { isolated_for: 1 });
    }

    #[test]
    fn adaptive_rejoins_the_large_cluster() {
        let config = SwarmConfig::default();
        let mut rng = SmallRng::seed_from_u64(4);
        let moving = robot(BehaviorState::Moving { isolated_for: 0 }, 2.0);
        let here = moving.position;
        let big_centroid = at(500.0, 445.0);
        let clusters = [
            cluster(1, 2, at(520.0, 400.0), here),
            cluster(2, 12, big_centroid, here),
        ];
        // A member of the small cluster is close enough to trigger a plain stop.
        let nearby = neighbors(&[(1, 15.0, at(515.0, 400.0)), (5, 35.0, at(500.0, 435.0))]);
        let decision = run(
            BehaviorKind::AdaptiveAggregation,
            &config,
            &moving,
            &nearby,
            &clusters,
            7,
            &mut rng,
        );
        assert_eq!(
            decision.state,
            BehaviorState::Stopped {
                since: Tick(7),
                anchor: Some(big_centroid)
            }
        );
        // Turns to face the cluster, which lies straight down.
        assert!((decision.command.turn - FRAC_PI_2).abs() < 1e-4);
    }

    #[test]
    fn adaptive_prefers_the_nearest_qualifying_centroid() {
        let config = SwarmConfig::default();
        let mut rng = SmallRng::seed_from_u64(4);
        let moving = robot(BehaviorState::Moving { isolated_for: 0 }, 2.0);
        let here = moving.position;
        let clusters = [
            cluster(1, 12, at(540.0, 400.0), here),
            cluster(2, 30, at(455.0, 400.0), here),
        ];
        let nearby = neighbors(&[(3, 40.0, at(540.0, 400.0))]);
        let decision = run(
            BehaviorKind::AdaptiveAggregation,
            &config,
            &moving,
            &nearby,
            &clusters,
            1,
            &mut rng,
        );
        assert!(matches!(
            decision.state,
            BehaviorState::Stopped { anchor: Some(anchor), .. } if anchor == at(540.0, 400.0)
        ));
    }

    #[test]
    fn adaptive_leaving_only_rejoins_clusters_ahead() {
        let config = SwarmConfig::default();
        let mut rng = SmallRng::seed_from_u64(4);
        let leaving = robot(
            BehaviorState::Leaving {
                since: Tick(0),
                heading_bias: 0.0,
            },
            3.0,
        );
        let here = leaving.position;
        let behind = [cluster(1, 20, at(460.0, 400.0), here)];
        let nearby = neighbors(&[(2, 35.0, at(465.0, 400.0))]);
        let decision = run(
            BehaviorKind::AdaptiveAggregation,
            &config,
            &leaving,
            &nearby,
            &behind,
            3,
            &mut rng,
        );
        assert_eq!(decision.state, leaving.behavior);

        let ahead = [cluster(1, 20, at(540.0, 400.0), here)];
        let decision = run(
            BehaviorKind::AdaptiveAggregation,
            &config,
            &leaving,
            &nearby,
            &ahead,
            3,
            &mut rng,
        );
        assert!(matches!(decision.state, BehaviorState::Stopped { .. }));
    }

    #[test]
    fn adaptive_leave_probability_never_grows_with_size() {
        let settings = AggregationSettings::default();
        assert_eq!(adaptive_leave_probability(1, &settings), 0.005);
        let mut previous = f32::INFINITY;
        for size in 1..40 {
            let p = adaptive_leave_probability(size, &settings);
            assert!(p <= previous, "size {size}: {p} > {previous}");
            if size > settings.large_cluster_size {
                assert_eq!(p, settings.large_cluster_probability, "size {size}");
            }
            previous = p;
        }
    }

    #[test]
    fn isolated_robots_drift_toward_the_center() {
        let mut config = SwarmConfig::default();
        config.aggregation.wander_jitter = 0.0;
        let mut rng = SmallRng::seed_from_u64(4);
        let mut lonely = robot(
            BehaviorState::Moving {
                isolated_for: config.aggregation.isolation_ticks - 1,
            },
            2.0,
        );
        lonely.position = at(100.0, 400.0);
        lonely.heading = FRAC_PI_2;
        let alone = neighbors(&[]);
        let decision = run(
            BehaviorKind::BasicAggregation,
            &config,
            &lonely,
            &alone,
            &[],
            1,
            &mut rng,
        );
        assert!((decision.command.turn + 0.1 * FRAC_PI_2).abs() < 1e-4);

        lonely.behavior = BehaviorState::Moving { isolated_for: 0 };
        let decision = run(
            BehaviorKind::BasicAggregation,
            &config,
            &lonely,
            &alone,
            &[],
            1,
            &mut rng,
        );
        assert_eq!(decision.command.turn, 0.0);
    }
}
