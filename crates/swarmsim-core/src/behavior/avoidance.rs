use rand::Rng;

use super::{BehaviorState, Decision, MotionCommand, Observation, PolicyContext, jitter};
use crate::RobotState;
use crate::sensors::{mean_of, min_of};

/// Turn away from the more crowded side when something is close ahead,
/// otherwise drift forward with a little heading noise.
pub(super) fn decide<R: Rng + ?Sized>(
    robot: &RobotState,
    observation: &Observation<'_>,
    ctx: &PolicyContext<'_>,
    rng: &mut R,
) -> Decision {
    let settings = &ctx.config.avoidance;
    let readings = observation.readings;
    let range = readings.range();

    let front = min_of(readings.front_three()).unwrap_or(range);
    let turn = if front < settings.collision_threshold {
        let left = mean_of(readings.left_half()).unwrap_or(range);
        let right = mean_of(readings.right_half()).unwrap_or(range);
        // Ties turn left.
        if left < right {
            settings.turn_step
        } else {
            -settings.turn_step
        }
    } else {
        jitter(rng, settings.jitter)
    };

    Decision::new(
        MotionCommand::cruise(turn, robot.velocity.speed(), ctx.config.motion.cruise_speed),
        BehaviorState::Idle,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behavior::test_support::*;
    use crate::config::SwarmConfig;
    use rand::{SeedableRng, rngs::SmallRng};

    #[test]
    fn crowded_left_turns_right() {
        let config = SwarmConfig::default();
        let readings = readings(&[20.0, 25.0, 30.0, 35.0, 90.0, 95.0, 100.0]);
        let neighbors = neighbors(&[]);
        let decision = decide(
            &robot(BehaviorState::Idle, 2.0),
            &observe(&readings, &neighbors, &[], 1),
            &context(&config, 1),
            &mut SmallRng::seed_from_u64(3),
        );
        assert_eq!(decision.command.turn, 0.1);
        assert_eq!(decision.command.throttle, 0.0);
    }

    #[test]
    fn crowded_right_or_tie_turns_left() {
        let config = SwarmConfig::default();
        let neighbors = neighbors(&[]);
        let mut rng = SmallRng::seed_from_u64(3);
        for distances in [
            [100.0, 95.0, 90.0, 35.0, 30.0, 25.0, 20.0],
            [30.0, 30.0, 30.0, 30.0, 30.0, 30.0, 30.0],
        ] {
            let readings = readings(&distances);
            let decision = decide(
                &robot(BehaviorState::Idle, 2.0),
                &observe(&readings, &neighbors, &[], 1),
                &context(&config, 1),
                &mut rng,
            );
            assert_eq!(decision.command.turn, -0.1);
        }
    }

    #[test]
    fn free_space_jitter_is_bounded() {
        let config = SwarmConfig::default();
        let readings = clear();
        let neighbors = neighbors(&[]);
        let mut rng = SmallRng::seed_from_u64(11);
        for _ in 0..200 {
            let decision = decide(
                &robot(BehaviorState::Idle, 0.0),
                &observe(&readings, &neighbors, &[], 1),
                &context(&config, 1),
                &mut rng,
            );
            assert!(decision.command.turn.abs() <= 0.02);
            assert_eq!(decision.command.throttle, 2.0);
            assert!(!decision.record_trail);
        }
    }
}
