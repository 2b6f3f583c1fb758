//! Arena bounds, obstacle segments and ray intersection queries.

use serde::{Deserialize, Serialize};

use crate::Position;

/// Cross products below this magnitude (relative to segment length) count as parallel.
const PARALLEL_EPSILON: f32 = 1e-6;

#[inline]
fn cross(ax: f32, ay: f32, bx: f32, by: f32) -> f32 {
    ax * by - ay * bx
}

/// Unit direction vector for a heading in radians.
#[inline]
#[must_use]
pub fn direction(heading: f32) -> (f32, f32) {
    (heading.cos(), heading.sin())
}

/// Static line segment obstacle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub start: Position,
    pub end: Position,
}

impl Segment {
    #[must_use]
    pub const fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    /// Outline of an axis-aligned rectangle as four segments.
    #[must_use]
    pub fn rectangle(x: f32, y: f32, width: f32, height: f32) -> [Segment; 4] {
        let top_left = Position::new(x, y);
        let top_right = Position::new(x + width, y);
        let bottom_right = Position::new(x + width, y + height);
        let bottom_left = Position::new(x, y + height);
        [
            Segment::new(top_left, top_right),
            Segment::new(top_right, bottom_right),
            Segment::new(bottom_right, bottom_left),
            Segment::new(bottom_left, top_left),
        ]
    }

    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.start.x.is_finite()
            && self.start.y.is_finite()
            && self.end.x.is_finite()
            && self.end.y.is_finite()
    }

    #[must_use]
    pub fn length(&self) -> f32 {
        self.start.distance(self.end)
    }

    /// Distance along a unit `direction` from `origin` to this segment.
    ///
    /// Rays parallel to the segment (including collinear ones) and zero-length
    /// segments report no intersection.
    #[must_use]
    pub fn ray_distance(&self, origin: Position, direction: (f32, f32)) -> Option<f32> {
        let (dx, dy) = direction;
        let ex = self.end.x - self.start.x;
        let ey = self.end.y - self.start.y;
        let denom = cross(dx, dy, ex, ey);
        if denom.abs() <= PARALLEL_EPSILON * self.length().max(1.0) {
            return None;
        }
        let wx = self.start.x - origin.x;
        let wy = self.start.y - origin.y;
        let t = cross(wx, wy, ex, ey) / denom;
        let u = cross(wx, wy, dx, dy) / denom;
        if t >= 0.0 && (0.0..=1.0).contains(&u) {
            Some(t)
        } else {
            None
        }
    }
}

/// Distance along a unit `direction` from `origin` to the boundary of a circle.
///
/// An origin inside the circle reports `0.0`.
#[must_use]
pub fn ray_circle_distance(
    origin: Position,
    direction: (f32, f32),
    center: Position,
    radius: f32,
) -> Option<f32> {
    let fx = origin.x - center.x;
    let fy = origin.y - center.y;
    let c = fx * fx + fy * fy - radius * radius;
    if c <= 0.0 {
        return Some(0.0);
    }
    let b = fx * direction.0 + fy * direction.1;
    if b > 0.0 {
        // Pointing away from a circle we are outside of.
        return None;
    }
    let discriminant = b * b - c;
    if discriminant < 0.0 {
        return None;
    }
    Some(-b - discriminant.sqrt())
}

/// Named obstacle presets.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ObstacleLayout {
    /// Bare rectangle, walls only.
    #[default]
    Open,
    /// Three rectangular blocks, scaled to the arena size.
    Blocks,
}

impl ObstacleLayout {
    /// Obstacle segments for an arena of the given size.
    #[must_use]
    pub fn segments(self, width: f32, height: f32) -> Vec<Segment> {
        match self {
            ObstacleLayout::Open => Vec::new(),
            ObstacleLayout::Blocks => {
                // Laid out on an 800x600 reference floor.
                let sx = width / 800.0;
                let sy = height / 600.0;
                [
                    (200.0, 200.0, 100.0, 20.0),
                    (500.0, 300.0, 20.0, 100.0),
                    (300.0, 400.0, 80.0, 80.0),
                ]
                .into_iter()
                .flat_map(|(x, y, w, h)| Segment::rectangle(x * sx, y * sy, w * sx, h * sy))
                .collect()
            }
        }
    }
}

/// Bounded rectangle `[0, width] x [0, height]` plus static obstacle segments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Arena {
    width: f32,
    height: f32,
    obstacles: Vec<Segment>,
}

impl Arena {
    #[must_use]
    pub fn new(width: f32, height: f32, obstacles: Vec<Segment>) -> Self {
        Self {
            width,
            height,
            obstacles,
        }
    }

    #[must_use]
    pub const fn width(&self) -> f32 {
        self.width
    }

    #[must_use]
    pub const fn height(&self) -> f32 {
        self.height
    }

    #[must_use]
    pub fn obstacles(&self) -> &[Segment] {
        &self.obstacles
    }

    #[must_use]
    pub fn center(&self) -> Position {
        Position::new(self.width * 0.5, self.height * 0.5)
    }

    /// The four walls enclosing the arena.
    #[must_use]
    pub fn boundary(&self) -> [Segment; 4] {
        Segment::rectangle(0.0, 0.0, self.width, self.height)
    }

    /// Whether `point` lies inside the arena shrunk by `margin` on every side.
    #[must_use]
    pub fn contains(&self, point: Position, margin: f32) -> bool {
        point.x >= margin
            && point.x <= self.width - margin
            && point.y >= margin
            && point.y <= self.height - margin
    }

    /// Distance to the nearest wall or obstacle along a ray, clamped to `max_range`.
    #[must_use]
    pub fn ray_distance(&self, origin: Position, direction: (f32, f32), max_range: f32) -> f32 {
        self.boundary()
            .iter()
            .chain(self.obstacles.iter())
            .filter_map(|segment| segment.ray_distance(origin, direction))
            .fold(max_range, f32::min)
    }
}
