//! Speed, turn and boundary constraints applied to every motion command.

use std::f32::consts::PI;

use serde::{Deserialize, Serialize};

use crate::behavior::MotionCommand;
use crate::config::MotionSettings;
use crate::geometry::{Arena, direction};
use crate::{Position, RobotState, Velocity};

/// Physical limits enforced on every robot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionLimits {
    pub max_speed: f32,
    pub max_turn_rate: f32,
    pub max_acceleration: f32,
    pub body_radius: f32,
    pub bounce_damping: f32,
}

impl From<&MotionSettings> for MotionLimits {
    fn from(settings: &MotionSettings) -> Self {
        Self {
            max_speed: settings.max_speed,
            max_turn_rate: settings.max_turn_rate,
            max_acceleration: settings.max_acceleration,
            body_radius: settings.robot_size,
            bounce_damping: settings.bounce_damping,
        }
    }
}

/// Wrap an angle into `[-PI, PI)`.
#[must_use]
pub fn wrap_angle(angle: f32) -> f32 {
    (angle + PI).rem_euclid(2.0 * PI) - PI
}

/// Clamp without panicking when `lo > hi`.
fn clamp_axis(value: f32, lo: f32, hi: f32) -> f32 {
    value.max(lo).min(hi)
}

fn finite_or_zero(value: f32) -> f32 {
    if value.is_finite() { value } else { 0.0 }
}

/// Apply `command` to `robot`, returning whether it bounced off a wall.
///
/// Turn and throttle are clamped to the limits first, then speed is clamped to
/// `[0, max_speed]`. A robot whose next position would leave the arena is
/// reflected (`PI - heading` on the x axis, `-heading` on the y axis), clamped
/// back inside by its body radius and slowed by `bounce_damping`.
pub fn integrate(
    robot: &mut RobotState,
    command: MotionCommand,
    arena: &Arena,
    limits: &MotionLimits,
) -> bool {
    let turn = finite_or_zero(command.turn).clamp(-limits.max_turn_rate, limits.max_turn_rate);
    let throttle =
        finite_or_zero(command.throttle).clamp(-limits.max_acceleration, limits.max_acceleration);

    let mut heading = wrap_angle(robot.heading + turn);
    let mut speed = (robot.velocity.speed() + throttle).clamp(0.0, limits.max_speed);

    let (dx, dy) = direction(heading);
    let mut x = robot.position.x + dx * speed;
    let mut y = robot.position.y + dy * speed;

    let radius = limits.body_radius;
    let (max_x, max_y) = (arena.width() - radius, arena.height() - radius);
    let mut bounced = false;
    if x < radius || x > max_x {
        heading = wrap_angle(PI - heading);
        x = clamp_axis(x, radius, max_x);
        bounced = true;
    }
    if y < radius || y > max_y {
        heading = wrap_angle(-heading);
        y = clamp_axis(y, radius, max_y);
        bounced = true;
    }
    if bounced {
        speed *= limits.bounce_damping;
    }

    let (vx, vy) = direction(heading);
    robot.heading = heading;
    robot.position = Position::new(x, y);
    robot.velocity = Velocity::new(vx * speed, vy * speed);
    bounced
}
