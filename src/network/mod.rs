// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

//! Road data consumed by the planner.
//!
//! The planner only needs to know which roads pass through a given point and where
//! the closest road to an arbitrary position is. [RoadSource] captures exactly that,
//! and [RoadNetwork] implements it for roads kept in memory.

mod kd;
pub mod osm;

use std::collections::HashMap;
use std::sync::Arc;

use crate::distance::earth_distance;
use crate::road::{Point31, Road};

/// A specific point of a specific [Road].
#[derive(Debug, Clone)]
pub struct RoadPoint {
    pub road: Arc<Road>,
    pub point_index: usize,
}

impl RoadPoint {
    pub fn point(&self) -> Point31 {
        self.road.points[self.point_index]
    }
}

/// Source of roads for route planning.
pub trait RoadSource {
    /// Returns every road with a point exactly at the provided position,
    /// together with the index of that point.
    fn roads_at(&self, point: Point31) -> Vec<RoadPoint>;

    fn road(&self, id: i64) -> Option<Arc<Road>>;

    /// Returns the road point closest to the provided position, if there are any roads.
    fn nearest_road_point(&self, lat: f64, lon: f64) -> Option<RoadPoint>;
}

/// In-memory [RoadSource], indexing roads by their points.
#[derive(Debug, Clone, Default)]
pub struct RoadNetwork {
    roads: HashMap<i64, Arc<Road>>,
    at_point: HashMap<Point31, Vec<(i64, usize)>>,
    tree: Option<kd::KDTree>,
}

impl RoadNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a network with a k-d tree index for fast [RoadSource::nearest_road_point] lookups.
    pub fn from_roads<I: IntoIterator<Item = Arc<Road>>>(roads: I) -> Self {
        let mut n = Self::new();
        for road in roads {
            n.add_road(road);
        }
        n.build_index();
        return n;
    }

    pub fn len(&self) -> usize {
        self.roads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roads.is_empty()
    }

    pub fn roads(&self) -> impl Iterator<Item = &Arc<Road>> + '_ {
        self.roads.values()
    }

    /// Adds a road to the network, replacing any road with the same id.
    ///
    /// Drops the nearest-point index; call [RoadNetwork::build_index] after adding all roads.
    pub fn add_road(&mut self, road: Arc<Road>) {
        if let Some(old) = self.roads.remove(&road.id) {
            for p in &old.points {
                if let Some(list) = self.at_point.get_mut(p) {
                    list.retain(|&(id, _)| id != old.id);
                }
            }
        }

        for (idx, &p) in road.points.iter().enumerate() {
            self.at_point.entry(p).or_default().push((road.id, idx));
        }
        self.roads.insert(road.id, road);
        self.tree = None;
    }

    /// (Re)builds the k-d tree over all road points.
    pub fn build_index(&mut self) {
        let mut entries: Vec<kd::Entry> = self
            .roads
            .values()
            .flat_map(|road| {
                road.points.iter().enumerate().map(|(idx, &point)| kd::Entry {
                    point,
                    road_id: road.id,
                    point_index: idx,
                })
            })
            .collect();
        self.tree = kd::KDTree::build(&mut entries);
    }

    fn road_point(&self, road_id: i64, point_index: usize) -> Option<RoadPoint> {
        self.roads.get(&road_id).map(|road| RoadPoint {
            road: road.clone(),
            point_index,
        })
    }
}

impl RoadSource for RoadNetwork {
    fn roads_at(&self, point: Point31) -> Vec<RoadPoint> {
        self.at_point
            .get(&point)
            .map(|list| {
                list.iter()
                    .filter_map(|&(id, idx)| self.road_point(id, idx))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn road(&self, id: i64) -> Option<Arc<Road>> {
        self.roads.get(&id).cloned()
    }

    fn nearest_road_point(&self, lat: f64, lon: f64) -> Option<RoadPoint> {
        if let Some(tree) = self.tree.as_ref() {
            let nearest = tree.find_nearest(Point31::from_lat_lon(lat, lon));
            return self.road_point(nearest.road_id, nearest.point_index);
        }

        self.roads
            .values()
            .flat_map(|road| {
                road.points.iter().enumerate().map(move |(idx, p)| {
                    (earth_distance(lat, lon, p.lat(), p.lon()), road, idx)
                })
            })
            .min_by(|(a_dist, _, _), (b_dist, _, _)| a_dist.total_cmp(b_dist))
            .map(|(_, road, idx)| RoadPoint {
                road: road.clone(),
                point_index: idx,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{build_roads, RoadSpec};

    fn network() -> Vec<Arc<Road>> {
        build_roads(&[
            RoadSpec::new(1, &[(0.0, 0.0), (0.001, 0.0), (0.002, 0.0)], &[("highway", "primary")]),
            RoadSpec::new(2, &[(0.001, 0.0), (0.001, 0.001)], &[("highway", "residential")]),
        ])
    }

    #[test]
    fn roads_at_junction() {
        let n = RoadNetwork::from_roads(network());
        assert_eq!(n.len(), 2);

        let mut at = n.roads_at(Point31::from_lat_lon(0.001, 0.0));
        at.sort_by_key(|rp| rp.road.id);
        assert_eq!(at.len(), 2);
        assert_eq!((at[0].road.id, at[0].point_index), (1, 1));
        assert_eq!((at[1].road.id, at[1].point_index), (2, 0));

        assert!(n.roads_at(Point31::from_lat_lon(0.5, 0.5)).is_empty());
    }

    #[test]
    fn nearest_road_point() {
        let indexed = RoadNetwork::from_roads(network());
        let nearest = indexed.nearest_road_point(0.0011, 0.0009).unwrap();
        assert_eq!((nearest.road.id, nearest.point_index), (2, 1));

        let mut linear = RoadNetwork::new();
        for road in network() {
            linear.add_road(road);
        }
        let nearest = linear.nearest_road_point(0.0019, 0.0001).unwrap();
        assert_eq!((nearest.road.id, nearest.point_index), (1, 2));

        assert!(RoadNetwork::new().nearest_road_point(0.0, 0.0).is_none());
    }

    #[test]
    fn replacing_road() {
        let mut n = RoadNetwork::from_roads(network());
        let replacement = build_roads(&[RoadSpec::new(
            2,
            &[(0.002, 0.0), (0.002, 0.001)],
            &[("highway", "residential")],
        )]);
        n.add_road(replacement[0].clone());

        assert_eq!(n.roads_at(Point31::from_lat_lon(0.001, 0.0)).len(), 1);
        assert_eq!(n.roads_at(Point31::from_lat_lon(0.002, 0.0)).len(), 2);
        assert_eq!(n.road(2).unwrap().points.len(), 2);
    }
}
