// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

use std::sync::Arc;

use super::turns::TurnInfo;
use crate::distance::align_angle_difference;
use crate::road::Road;

/// A directed traversal of a single [Road], from point `start` to point `end`.
/// Points are traversed in decreasing order if `start > end`.
#[derive(Debug, Clone)]
pub struct RouteSegment {
    pub road: Arc<Road>,
    pub start: usize,
    pub end: usize,

    /// Other roads branching off at every traversed point, indexed by `|point - start|`.
    /// Only used to analyze turns; they don't take part in the route.
    pub attached_routes: Vec<Vec<RouteSegment>>,

    /// Travel time, in seconds
    pub time: f64,

    /// Travel speed, in m/s
    pub speed: f64,

    /// Length of the traversal, in meters
    pub distance: f64,

    pub turn: Option<TurnInfo>,
    pub description: String,
}

impl RouteSegment {
    pub fn new(road: Arc<Road>, start: usize, end: usize) -> Self {
        Self {
            road,
            start,
            end,
            attached_routes: vec![Vec::default(); start.abs_diff(end) + 1],
            time: 0.0,
            speed: 0.0,
            distance: 0.0,
            turn: None,
            description: String::default(),
        }
    }

    pub fn road_id(&self) -> i64 {
        self.road.id
    }

    pub fn is_increasing(&self) -> bool {
        self.start < self.end
    }

    /// Changes the traversed range. Attached routes stay indexed by distance from `start`,
    /// so they are only preserved if `start` doesn't change.
    pub fn set_range(&mut self, start: usize, end: usize) {
        self.start = start;
        self.end = end;
        self.attached_routes
            .resize(start.abs_diff(end) + 1, Vec::default());
    }

    /// Roads branching off at the provided point.
    pub fn attached_routes_at(&self, point: usize) -> &[RouteSegment] {
        self.attached_routes
            .get(point.abs_diff(self.start))
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn attach(&mut self, point: usize, segment: RouteSegment) {
        let idx = point.abs_diff(self.start);
        if idx >= self.attached_routes.len() {
            self.attached_routes.resize(idx + 1, Vec::default());
        }
        self.attached_routes[idx].push(segment);
    }

    /// Compass bearing (in degrees) of the road at `point`,
    /// looking forwards (`plus`) or backwards along the road's points.
    pub fn bearing(&self, point: usize, plus: bool) -> f64 {
        self.road.direction_route(point, plus).to_degrees()
    }

    /// Compass bearing (in degrees) at which the segment is entered.
    pub fn bearing_begin(&self) -> f64 {
        self.bearing(self.start, self.start < self.end)
    }

    /// Compass bearing (in degrees) at which the segment is left.
    pub fn bearing_end(&self) -> f64 {
        let backwards = self.road.direction_route(self.end, self.start > self.end);
        align_angle_difference(backwards - std::f64::consts::PI).to_degrees()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{build_roads, RoadSpec};

    fn close(a: f64, b: f64) -> bool {
        crate::distance::degrees_diff(a, b).abs() < 1.0
    }

    #[test]
    fn bearings() {
        // north, then east
        let roads = build_roads(&[RoadSpec::new(
            1,
            &[(0.0, 0.0), (0.001, 0.0), (0.001, 0.001)],
            &[("highway", "primary")],
        )]);

        let forward = RouteSegment::new(roads[0].clone(), 0, 2);
        assert!(close(forward.bearing_begin(), 0.0), "{}", forward.bearing_begin());
        assert!(close(forward.bearing_end(), 90.0), "{}", forward.bearing_end());

        let backward = RouteSegment::new(roads[0].clone(), 2, 0);
        assert!(close(backward.bearing_begin(), -90.0), "{}", backward.bearing_begin());
        assert!(close(backward.bearing_end(), 180.0), "{}", backward.bearing_end());
    }

    #[test]
    fn attached_routes_follow_range() {
        let roads = build_roads(&[RoadSpec::new(
            1,
            &[(0.0, 0.0), (0.001, 0.0), (0.002, 0.0), (0.003, 0.0)],
            &[("highway", "primary")],
        )]);

        let mut s = RouteSegment::new(roads[0].clone(), 3, 1);
        assert_eq!(s.attached_routes.len(), 3);
        assert!(!s.is_increasing());

        s.attach(2, RouteSegment::new(roads[0].clone(), 2, 3));
        assert_eq!(s.attached_routes_at(2).len(), 1);
        assert!(s.attached_routes_at(1).is_empty());

        s.set_range(3, 0);
        assert_eq!(s.attached_routes.len(), 4);
        assert_eq!(s.attached_routes_at(2).len(), 1);
    }
}
