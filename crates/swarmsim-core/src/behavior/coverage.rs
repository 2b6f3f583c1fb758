use std::f32::consts::FRAC_PI_2;

use rand::Rng;

use super::{BehaviorState, Decision, MotionCommand, Observation, PolicyContext, jitter};
use crate::RobotState;

/// Outward spiral with random kicks and a quarter turn at obstacles.
///
/// The spiral radius only ever grows; turning at obstacles does not reset it.
pub(super) fn decide<R: Rng + ?Sized>(
    robot: &RobotState,
    observation: &Observation<'_>,
    ctx: &PolicyContext<'_>,
    rng: &mut R,
) -> Decision {
    let settings = &ctx.config.coverage;
    let cruise = ctx.config.motion.cruise_speed;

    let radius = match robot.behavior {
        BehaviorState::Spiraling { radius } => radius,
        _ => settings.initial_radius,
    }
    .max(settings.initial_radius);

    let mut turn = if observation.readings.min_distance() < settings.obstacle_threshold {
        FRAC_PI_2
    } else {
        cruise / radius
    };
    if rng.random::<f32>() < settings.perturb_probability {
        turn += jitter(rng, settings.perturb_max);
    }

    Decision::new(
        MotionCommand::cruise(turn, robot.velocity.speed(), cruise),
        BehaviorState::Spiraling {
            radius: radius + settings.radius_growth,
        },
    )
    .with_trail()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behavior::BehaviorKind;
    use crate::behavior::test_support::*;
    use crate::config::SwarmConfig;
    use rand::{SeedableRng, rngs::SmallRng};

    fn quiet_config() -> SwarmConfig {
        let mut config = SwarmConfig::default();
        config.coverage.perturb_probability = 0.0;
        config
    }

    #[test]
    fn spiral_loosens_every_tick() {
        let config = quiet_config();
        let readings = clear();
        let neighbors = neighbors(&[]);
        let mut state = BehaviorKind::VacuumCoverage.initial_state(&config);
        let mut last_turn = f32::INFINITY;
        let mut rng = SmallRng::seed_from_u64(2);
        for tick in 1..50 {
            let decision = decide(
                &robot(state, 2.0),
                &observe(&readings, &neighbors, &[], 1),
                &context(&config, tick),
                &mut rng,
            );
            assert!(decision.record_trail);
            assert!(decision.command.turn < last_turn);
            last_turn = decision.command.turn;
            state = decision.state;
        }
    }

    #[test]
    fn obstacle_forces_quarter_turn_and_keeps_growing() {
        let config = quiet_config();
        let readings = readings(&[100.0, 100.0, 100.0, 25.0, 100.0, 100.0, 100.0]);
        let neighbors = neighbors(&[]);
        let decision = decide(
            &robot(BehaviorState::Spiraling { radius: 60.0 }, 2.0),
            &observe(&readings, &neighbors, &[], 1),
            &context(&config, 1),
            &mut SmallRng::seed_from_u64(2),
        );
        assert_eq!(decision.command.turn, FRAC_PI_2);
        assert_eq!(
            decision.state,
            BehaviorState::Spiraling {
                radius: 60.0 + config.coverage.radius_growth
            }
        );
    }

    #[test]
    fn perturbation_stays_within_amplitude() {
        let mut config = SwarmConfig::default();
        config.coverage.perturb_probability = 1.0;
        let readings = clear();
        let neighbors = neighbors(&[]);
        let mut rng = SmallRng::seed_from_u64(8);
        let base = config.motion.cruise_speed / 100.0;
        for _ in 0..100 {
            let decision = decide(
                &robot(BehaviorState::Spiraling { radius: 100.0 }, 2.0),
                &observe(&readings, &neighbors, &[], 1),
                &context(&config, 1),
                &mut rng,
            );
            assert!((decision.command.turn - base).abs() <= config.coverage.perturb_max + 1e-6);
        }
    }
}
