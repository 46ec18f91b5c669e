//! Group-size business rules applied to raw DBSCAN clusters.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::clustering::Cluster;
use crate::geo::GeoPoint;

/// Smallest group worth sharing a vehicle.
pub const DEFAULT_MIN_GROUP_SIZE: usize = 2;

/// Seats available for riders in one vehicle.
pub const DEFAULT_MAX_GROUP_SIZE: usize = 7;

/// Size of the sub-groups an oversized cluster is cut into.
pub const DEFAULT_SPLIT_CHUNK_SIZE: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupRulesConfig {
    pub min_group_size: usize,
    pub max_group_size: usize,
    pub split_chunk_size: usize,
}

impl Default for GroupRulesConfig {
    fn default() -> Self {
        Self {
            min_group_size: DEFAULT_MIN_GROUP_SIZE,
            max_group_size: DEFAULT_MAX_GROUP_SIZE,
            split_chunk_size: DEFAULT_SPLIT_CHUNK_SIZE,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ClusterRuleFilter {
    config: GroupRulesConfig,
}

impl ClusterRuleFilter {
    pub fn new(config: GroupRulesConfig) -> Self {
        Self { config }
    }

    pub fn filter(&self, clusters: Vec<Cluster>) -> Vec<Cluster> {
        filter_clusters_with(clusters, &self.config)
    }
}

/// Apply the default rules: drop clusters under 2 riders, split clusters over 7.
pub fn filter_clusters_by_business_rules(clusters: Vec<Cluster>) -> Vec<Cluster> {
    filter_clusters_with(clusters, &GroupRulesConfig::default())
}

/// Output clusters all hold `min_group_size..=max_group_size` points and are
/// re-numbered from zero in output order.
pub fn filter_clusters_with(clusters: Vec<Cluster>, config: &GroupRulesConfig) -> Vec<Cluster> {
    let chunk_size = config.split_chunk_size.clamp(1, config.max_group_size.max(1));
    let mut groups: Vec<Vec<GeoPoint>> = Vec::new();

    for cluster in clusters {
        let size = cluster.len();
        if size < config.min_group_size {
            debug!(cluster = cluster.id, size, "dropping undersized cluster");
            continue;
        }
        if size <= config.max_group_size {
            groups.push(cluster.points);
            continue;
        }

        let mut members = cluster.points;
        members.sort_by(compare_latitude);
        for chunk in members.chunks(chunk_size) {
            if chunk.len() < config.min_group_size {
                let dropped: Vec<&str> = chunk.iter().map(|p| p.booking_id.as_str()).collect();
                warn!(
                    cluster = cluster.id,
                    ?dropped,
                    "split remainder below minimum group size, riders left unpooled"
                );
                continue;
            }
            groups.push(chunk.to_vec());
        }
        debug!(cluster = cluster.id, size, chunk_size, "split oversized cluster");
    }

    groups
        .into_iter()
        .enumerate()
        .filter_map(|(id, points)| Cluster::from_points(id, points))
        .collect()
}

/// South-to-north, ties broken by longitude. `sort_by` is stable, so exact
/// duplicates keep their input order.
fn compare_latitude(a: &GeoPoint, b: &GeoPoint) -> Ordering {
    a.latitude
        .partial_cmp(&b.latitude)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.longitude.partial_cmp(&b.longitude).unwrap_or(Ordering::Equal))
}
