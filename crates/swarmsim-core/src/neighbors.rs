//! Per-tick neighbor sets and transient cluster labelling.

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use swarmsim_index::NeighborhoodIndex;

use crate::{Position, RobotId};

/// Another robot seen within the neighbor radius.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Neighbor {
    pub id: RobotId,
    pub distance: f32,
    /// Position of the neighbor in the pre-tick snapshot.
    pub position: Position,
}

/// Robots within a radius of one robot, nearest first.
///
/// Rebuilt from scratch every tick; it holds copies, never references into the world.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NeighborSet {
    neighbors: Vec<Neighbor>,
}

impl NeighborSet {
    /// Collect every robot within `radius` of `robot_idx`, excluding itself.
    #[must_use]
    pub fn gather(
        robot_idx: usize,
        radius: f32,
        positions: &[Position],
        index: &dyn NeighborhoodIndex,
    ) -> Self {
        let mut neighbors = Vec::new();
        index.neighbors_within(robot_idx, radius * radius, &mut |other_idx, dist_sq| {
            if other_idx != robot_idx {
                neighbors.push(Neighbor {
                    id: RobotId::from_index(other_idx),
                    distance: dist_sq.into_inner().sqrt(),
                    position: positions[other_idx],
                });
            }
        });
        Self::from_neighbors(neighbors)
    }

    /// Build a set from arbitrary neighbors, normalising the order.
    #[must_use]
    pub fn from_neighbors(mut neighbors: Vec<Neighbor>) -> Self {
        neighbors.sort_by_key(|neighbor| (OrderedFloat(neighbor.distance), neighbor.id));
        Self { neighbors }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Neighbor> {
        self.neighbors.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.neighbors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.neighbors.is_empty()
    }

    #[must_use]
    pub fn nearest(&self) -> Option<&Neighbor> {
        self.neighbors.first()
    }

    /// Neighbors strictly closer than `radius`.
    pub fn within(&self, radius: f32) -> impl Iterator<Item = &Neighbor> {
        self.neighbors
            .iter()
            .take_while(move |neighbor| neighbor.distance < radius)
    }

    #[must_use]
    pub fn count_within(&self, radius: f32) -> usize {
        self.within(radius).count()
    }

    /// Mean position of the neighbors strictly closer than `radius`.
    #[must_use]
    pub fn centroid_within(&self, radius: f32) -> Option<Position> {
        centroid(self.within(radius).map(|neighbor| neighbor.position))
    }
}

fn centroid(points: impl Iterator<Item = Position>) -> Option<Position> {
    let (mut sum_x, mut sum_y, mut count) = (0.0_f32, 0.0_f32, 0usize);
    for point in points {
        sum_x += point.x;
        sum_y += point.y;
        count += 1;
    }
    (count > 0).then(|| Position::new(sum_x / count as f32, sum_y / count as f32))
}

/// A cluster as seen from one robot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClusterView {
    pub label: usize,
    pub size: usize,
    pub centroid: Position,
    /// Distance from the observer to the centroid.
    pub distance: f32,
}

/// Single-linkage cluster labels over one position snapshot.
///
/// Two robots share a cluster when a chain of robots connects them with every
/// link strictly shorter than the linkage distance. Labels are assigned in
/// order of the lowest robot index in each cluster.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ClusterMap {
    labels: Vec<usize>,
    sizes: Vec<usize>,
    centroids: Vec<Position>,
}

impl ClusterMap {
    #[must_use]
    pub fn build(positions: &[Position], index: &dyn NeighborhoodIndex, linkage: f32) -> Self {
        let count = positions.len();
        let mut parent: Vec<usize> = (0..count).collect();

        fn find(parent: &mut [usize], mut node: usize) -> usize {
            while parent[node] != node {
                parent[node] = parent[parent[node]];
                node = parent[node];
            }
            node
        }

        let linkage_sq = linkage * linkage;
        for idx in 0..count {
            let mut links = Vec::new();
            index.neighbors_within(idx, linkage_sq, &mut |other_idx, dist_sq| {
                if other_idx > idx && dist_sq.into_inner() < linkage_sq {
                    links.push(other_idx);
                }
            });
            for other_idx in links {
                let a = find(&mut parent, idx);
                let b = find(&mut parent, other_idx);
                if a != b {
                    parent[a.max(b)] = a.min(b);
                }
            }
        }

        let mut root_label = vec![usize::MAX; count];
        let mut labels = Vec::with_capacity(count);
        let mut sizes = Vec::new();
        let mut sums: Vec<(f32, f32)> = Vec::new();
        for (idx, position) in positions.iter().enumerate() {
            let root = find(&mut parent, idx);
            if root_label[root] == usize::MAX {
                root_label[root] = sizes.len();
                sizes.push(0);
                sums.push((0.0, 0.0));
            }
            let label = root_label[root];
            labels.push(label);
            sizes[label] += 1;
            sums[label].0 += position.x;
            sums[label].1 += position.y;
        }
        let centroids = sums
            .iter()
            .zip(&sizes)
            .map(|(&(x, y), &size)| Position::new(x / size as f32, y / size as f32))
            .collect();

        Self {
            labels,
            sizes,
            centroids,
        }
    }

    /// Cluster label of a robot.
    #[must_use]
    pub fn label(&self, robot_idx: usize) -> Option<usize> {
        self.labels.get(robot_idx).copied()
    }

    /// Number of robots in the cluster containing `robot_idx` (itself included).
    #[must_use]
    pub fn size_of_robot(&self, robot_idx: usize) -> usize {
        self.label(robot_idx)
            .and_then(|label| self.sizes.get(label).copied())
            .unwrap_or(1)
    }

    #[must_use]
    pub fn size(&self, label: usize) -> usize {
        self.sizes.get(label).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn centroid(&self, label: usize) -> Option<Position> {
        self.centroids.get(label).copied()
    }

    /// Number of clusters with at least `min_size` members.
    #[must_use]
    pub fn count_at_least(&self, min_size: usize) -> usize {
        self.sizes.iter().filter(|&&size| size >= min_size).count()
    }

    #[must_use]
    pub fn largest(&self) -> usize {
        self.sizes.iter().copied().max().unwrap_or(0)
    }

    /// Clusters that have at least one member in `neighbors`, other than the
    /// observer's own, ordered by centroid distance.
    #[must_use]
    pub fn visible_from(
        &self,
        robot_idx: usize,
        observer: Position,
        neighbors: &NeighborSet,
    ) -> Vec<ClusterView> {
        let own = self.label(robot_idx);
        let mut views: Vec<ClusterView> = Vec::new();
        for neighbor in neighbors.iter() {
            let Some(label) = self.label(neighbor.id.index()) else {
                continue;
            };
            if Some(label) == own || views.iter().any(|view| view.label == label) {
                continue;
            }
            let centroid = self.centroids[label];
            views.push(ClusterView {
                label,
                size: self.sizes[label],
                centroid,
                distance: observer.distance(centroid),
            });
        }
        views.sort_by_key(|view| (OrderedFloat(view.distance), view.label));
        views
    }
}
