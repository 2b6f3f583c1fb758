//! Fan-shaped range sensors.
//!
//! A [`SensorArray`] casts one ray per configured angle offset from a robot's
//! heading and reports the distance to the first wall, obstacle segment or
//! other robot body. Readings keep the configured order (most negative offset
//! first), and behaviors index into them by position.

use serde::{Deserialize, Serialize};
use swarmsim_index::NeighborhoodIndex;

use crate::Position;
use crate::geometry::{Arena, direction, ray_circle_distance};

/// One ray result.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorSample {
    /// Offset from the robot heading in radians; negative is left of heading.
    pub angle_offset: f32,
    /// Distance to the first obstruction, at most the sensor range.
    pub distance: f32,
}

/// Ordered distances for every ray of a [`SensorArray`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SensorReadings {
    samples: Vec<SensorSample>,
    range: f32,
}

impl SensorReadings {
    #[must_use]
    pub fn new(samples: Vec<SensorSample>, range: f32) -> Self {
        Self { samples, range }
    }

    /// Readings with every ray at full range.
    #[must_use]
    pub fn unobstructed(array: &SensorArray) -> Self {
        let samples = array
            .offsets()
            .iter()
            .map(|&angle_offset| SensorSample {
                angle_offset,
                distance: array.range(),
            })
            .collect();
        Self::new(samples, array.range())
    }

    #[must_use]
    pub fn samples(&self) -> &[SensorSample] {
        &self.samples
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    #[must_use]
    pub const fn range(&self) -> f32 {
        self.range
    }

    /// Distance reported by ray `index`, if it exists.
    #[must_use]
    pub fn distance(&self, index: usize) -> Option<f32> {
        self.samples.get(index).map(|sample| sample.distance)
    }

    /// Index of the center ray (the front-most for a symmetric fan).
    #[must_use]
    pub fn center_index(&self) -> usize {
        self.samples.len() / 2
    }

    /// Distance straight ahead.
    #[must_use]
    pub fn front(&self) -> f32 {
        self.distance(self.center_index()).unwrap_or(self.range)
    }

    /// The center ray and its immediate neighbours.
    #[must_use]
    pub fn front_three(&self) -> &[SensorSample] {
        if self.samples.is_empty() {
            return &self.samples;
        }
        let center = self.center_index();
        let start = center.saturating_sub(1);
        let end = (center + 2).min(self.samples.len());
        &self.samples[start..end]
    }

    /// Rays strictly left of center.
    #[must_use]
    pub fn left_half(&self) -> &[SensorSample] {
        &self.samples[..self.samples.len() / 2]
    }

    /// Rays strictly right of center.
    #[must_use]
    pub fn right_half(&self) -> &[SensorSample] {
        &self.samples[self.samples.len().div_ceil(2)..]
    }

    /// Shortest distance over all rays, or the range if there are none.
    #[must_use]
    pub fn min_distance(&self) -> f32 {
        min_of(&self.samples).unwrap_or(self.range)
    }
}

/// Shortest distance in a slice of samples.
#[must_use]
pub fn min_of(samples: &[SensorSample]) -> Option<f32> {
    samples.iter().map(|sample| sample.distance).reduce(f32::min)
}

/// Mean distance in a slice of samples.
#[must_use]
pub fn mean_of(samples: &[SensorSample]) -> Option<f32> {
    if samples.is_empty() {
        return None;
    }
    let sum: f32 = samples.iter().map(|sample| sample.distance).sum();
    Some(sum / samples.len() as f32)
}

/// Read-only view of the pre-tick world used while sensing.
#[derive(Clone, Copy)]
pub struct WorldView<'a> {
    pub arena: &'a Arena,
    pub positions: &'a [Position],
    pub index: &'a dyn NeighborhoodIndex,
}

/// Fixed fan of range sensors shared by every robot of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorArray {
    offsets: Vec<f32>,
    range: f32,
    body_radius: f32,
}

impl SensorArray {
    /// Build an array from offsets in radians.
    #[must_use]
    pub fn new(offsets: Vec<f32>, range: f32, body_radius: f32) -> Self {
        Self {
            offsets,
            range,
            body_radius,
        }
    }

    /// Build an array from offsets in degrees.
    #[must_use]
    pub fn from_degrees(offsets_deg: &[f32], range: f32, body_radius: f32) -> Self {
        Self::new(
            offsets_deg.iter().map(|deg| deg.to_radians()).collect(),
            range,
            body_radius,
        )
    }

    #[must_use]
    pub fn offsets(&self) -> &[f32] {
        &self.offsets
    }

    #[must_use]
    pub const fn range(&self) -> f32 {
        self.range
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Cast every ray for robot `robot_idx` facing `heading`.
    #[must_use]
    pub fn sense(&self, robot_idx: usize, heading: f32, view: WorldView<'_>) -> SensorReadings {
        let Some(&origin) = view.positions.get(robot_idx) else {
            return SensorReadings::unobstructed(self);
        };

        // Only bodies that can intersect a ray within range matter.
        let reach = self.range + self.body_radius;
        let mut bodies = Vec::new();
        view.index
            .neighbors_within(robot_idx, reach * reach, &mut |other_idx, _dist_sq| {
                bodies.push(view.positions[other_idx]);
            });

        let samples = self
            .offsets
            .iter()
            .map(|&angle_offset| {
                let dir = direction(heading + angle_offset);
                let distance = bodies
                    .iter()
                    .filter_map(|&center| {
                        ray_circle_distance(origin, dir, center, self.body_radius)
                    })
                    .fold(view.arena.ray_distance(origin, dir, self.range), f32::min);
                SensorSample {
                    angle_offset,
                    distance: distance.clamp(0.0, self.range),
                }
            })
            .collect();
        SensorReadings::new(samples, self.range)
    }
}
