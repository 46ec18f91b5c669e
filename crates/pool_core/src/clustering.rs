//! Density-based clustering (DBSCAN) of rider drop-off points.
//!
//! Points are compared by haversine distance. Neighbourhoods are computed by
//! brute force, which is O(n²) per flight; passenger counts per flight are in
//! the tens, so a spatial index would not pay for itself.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::geo::{centroid, haversine_km, Coordinate, GeoPoint};

/// Default neighbourhood radius in kilometres.
pub const DEFAULT_EPS_KM: f64 = 8.5;

/// Default minimum neighbourhood size (including the point itself) for a core point.
pub const DEFAULT_MIN_SAMPLES: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusteringConfig {
    pub eps_km: f64,
    pub min_samples: usize,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            eps_km: DEFAULT_EPS_KM,
            min_samples: DEFAULT_MIN_SAMPLES,
        }
    }
}

/// A group of nearby drop-off points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    pub id: usize,
    pub points: Vec<GeoPoint>,
    pub centroid: Coordinate,
}

impl Cluster {
    /// Build a cluster, computing the centroid. Returns `None` for an empty member list.
    pub fn from_points(id: usize, points: Vec<GeoPoint>) -> Option<Self> {
        let centroid = centroid(&points)?;
        Some(Self {
            id,
            points,
            centroid,
        })
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn booking_ids(&self) -> Vec<String> {
        self.points.iter().map(|p| p.booking_id.clone()).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClusteringStats {
    pub total_points: usize,
    pub cluster_count: usize,
    pub noise_count: usize,
    pub largest_cluster: usize,
    pub eps_km: f64,
    pub min_samples: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusteringResult {
    pub clusters: Vec<Cluster>,
    pub noise: Vec<GeoPoint>,
    pub stats: ClusteringStats,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Label {
    Unvisited,
    Noise,
    Member(usize),
}

/// DBSCAN over geographic points.
#[derive(Debug, Clone, Default)]
pub struct GeoClusterer {
    config: ClusteringConfig,
}

impl GeoClusterer {
    pub fn new(config: ClusteringConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ClusteringConfig {
        &self.config
    }

    /// Cluster with the configured `eps_km` and `min_samples`.
    pub fn cluster_points(&self, points: &[GeoPoint]) -> ClusteringResult {
        cluster(points, self.config.eps_km, self.config.min_samples)
    }
}

/// Indices of every other point within `eps_km` of `points[idx]`.
fn region_query(points: &[GeoPoint], idx: usize, eps_km: f64) -> Vec<usize> {
    let origin = points[idx].coordinate();
    points
        .iter()
        .enumerate()
        .filter(|(other, point)| {
            *other != idx && haversine_km(origin, point.coordinate()) <= eps_km
        })
        .map(|(other, _)| other)
        .collect()
}

/// Classic DBSCAN.
///
/// A point whose neighbourhood (excluding itself) holds fewer than
/// `min_samples - 1` points is provisionally noise; it may later be absorbed
/// as a border point of a cluster discovered from a core point. Clusters are
/// numbered in discovery order, members keep discovery order too.
pub fn cluster(points: &[GeoPoint], eps_km: f64, min_samples: usize) -> ClusteringResult {
    let required_neighbours = min_samples.saturating_sub(1);
    let mut labels = vec![Label::Unvisited; points.len()];
    let mut members: Vec<Vec<usize>> = Vec::new();

    for idx in 0..points.len() {
        if labels[idx] != Label::Unvisited {
            continue;
        }

        let neighbours = region_query(points, idx, eps_km);
        // A lone point can never seed a cluster, whatever min_samples says.
        if neighbours.is_empty() || neighbours.len() < required_neighbours {
            labels[idx] = Label::Noise;
            continue;
        }

        let cluster_id = members.len();
        labels[idx] = Label::Member(cluster_id);
        let mut cluster_members = vec![idx];
        let mut queue: VecDeque<usize> = neighbours.into();

        while let Some(candidate) = queue.pop_front() {
            match labels[candidate] {
                Label::Member(_) => continue,
                Label::Noise => {
                    // Border point: joins the cluster but does not expand it.
                    labels[candidate] = Label::Member(cluster_id);
                    cluster_members.push(candidate);
                }
                Label::Unvisited => {
                    labels[candidate] = Label::Member(cluster_id);
                    cluster_members.push(candidate);
                    let reachable = region_query(points, candidate, eps_km);
                    if reachable.len() >= required_neighbours {
                        queue.extend(
                            reachable
                                .into_iter()
                                .filter(|&n| !matches!(labels[n], Label::Member(_))),
                        );
                    }
                }
            }
        }

        members.push(cluster_members);
    }

    let clusters: Vec<Cluster> = members
        .into_iter()
        .enumerate()
        .filter_map(|(id, idxs)| {
            Cluster::from_points(id, idxs.into_iter().map(|i| points[i].clone()).collect())
        })
        .collect();

    let noise: Vec<GeoPoint> = points
        .iter()
        .zip(&labels)
        .filter(|(_, label)| **label == Label::Noise)
        .map(|(point, _)| point.clone())
        .collect();

    let stats = ClusteringStats {
        total_points: points.len(),
        cluster_count: clusters.len(),
        noise_count: noise.len(),
        largest_cluster: clusters.iter().map(Cluster::len).max().unwrap_or(0),
        eps_km,
        min_samples,
    };
    debug!(
        points = stats.total_points,
        clusters = stats.cluster_count,
        noise = stats.noise_count,
        "dbscan finished"
    );

    ClusteringResult {
        clusters,
        noise,
        stats,
    }
}
