use rand::Rng;

use super::{BehaviorState, Decision, MotionCommand, Observation, PolicyContext, jitter};
use crate::RobotState;
use crate::config::WallFollowSettings;
use crate::sensors::SensorReadings;

pub(super) fn decide<R: Rng + ?Sized>(
    robot: &RobotState,
    observation: &Observation<'_>,
    ctx: &PolicyContext<'_>,
    rng: &mut R,
) -> Decision {
    let settings = &ctx.config.wall_follow;
    let readings = observation.readings;
    let speed = robot.velocity.speed();
    let cruise = ctx.config.motion.cruise_speed;
    let wall_in_range = readings.min_distance() < settings.detect_threshold;

    let lost_for = match robot.behavior {
        BehaviorState::Following { .. } if wall_in_range => Some(0),
        BehaviorState::Following { lost_for } => Some(lost_for.saturating_add(1)),
        _ if wall_in_range => Some(0),
        _ => None,
    };

    match lost_for {
        Some(lost_for) if lost_for < settings.lost_ticks => Decision::new(
            MotionCommand::cruise(follow_turn(readings, settings), speed, cruise),
            BehaviorState::Following { lost_for },
        ),
        _ => Decision::new(
            MotionCommand::cruise(jitter(rng, settings.search_jitter), speed, cruise),
            BehaviorState::Searching,
        ),
    }
}

/// Keep the side sensor near the desired distance, turning away at corners.
fn follow_turn(readings: &SensorReadings, settings: &WallFollowSettings) -> f32 {
    let side = readings.samples().get(settings.side_sensor).copied();
    let (side_distance, toward_wall) = match side {
        Some(sample) if sample.angle_offset < 0.0 => (sample.distance, -1.0),
        Some(sample) => (sample.distance, 1.0),
        None => (readings.range(), 1.0),
    };

    if readings.front() < settings.corner_threshold {
        -toward_wall * settings.corner_turn
    } else if side_distance > settings.desired_distance + settings.margin {
        toward_wall * settings.correction_turn
    } else if side_distance < settings.desired_distance - settings.margin {
        -toward_wall * settings.correction_turn
    } else {
        0.0
    }
}
