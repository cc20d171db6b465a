// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use crate::distance::{
    distance_31, latitude_from_y31, longitude_from_x31, x31_from_longitude, x31_to_meters,
    y31_from_latitude, y31_to_meters,
};

/// How far ahead (in meters) [Road::direction_route] looks when computing a bearing.
pub const DIST_BEARING_DETECT: f64 = 5.0;

static NEXT_REGION_ID: AtomicU32 = AtomicU32::new(1);

/// An immutable `(tag, value)` pair, e.g. `highway=residential`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TagValue {
    pub tag: String,
    pub value: String,
}

impl TagValue {
    pub fn new<T: Into<String>, V: Into<String>>(tag: T, value: V) -> Self {
        Self {
            tag: tag.into(),
            value: value.into(),
        }
    }
}

impl std::fmt::Display for TagValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}={}", self.tag, self.value)
    }
}

/// Process-unique identifier of a [RoutingRegion].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegionId(u32);

/// A loaded map region together with its decoding table,
/// mapping raw numeric type codes used by its [Roads](Road) to [TagValues](TagValue).
///
/// Raw codes are only meaningful within their region - the same code
/// may mean different things in different regions.
#[derive(Debug)]
pub struct RoutingRegion {
    id: RegionId,
    name: String,
    decoding_rules: Vec<TagValue>,
    encoding_rules: HashMap<TagValue, u32>,
}

impl RoutingRegion {
    /// Creates a new region with an empty decoding table.
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            id: RegionId(NEXT_REGION_ID.fetch_add(1, Ordering::Relaxed)),
            name: name.into(),
            decoding_rules: Vec::default(),
            encoding_rules: HashMap::default(),
        }
    }

    pub fn id(&self) -> RegionId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.decoding_rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decoding_rules.is_empty()
    }

    /// Returns the raw code of the provided tag and value, adding it to the decoding table if necessary.
    pub fn encode(&mut self, tag: &str, value: &str) -> u32 {
        let key = TagValue::new(tag, value);
        if let Some(&code) = self.encoding_rules.get(&key) {
            return code;
        }

        let code = self.decoding_rules.len() as u32;
        self.decoding_rules.push(key.clone());
        self.encoding_rules.insert(key, code);
        return code;
    }

    /// Returns the raw code of an already known tag and value.
    pub fn find(&self, tag: &str, value: &str) -> Option<u32> {
        self.encoding_rules
            .get(&TagValue::new(tag, value))
            .cloned()
    }

    /// Decodes a raw type code into its tag and value.
    pub fn decode(&self, code: u32) -> Option<&TagValue> {
        self.decoding_rules.get(code as usize)
    }
}

/// Position in the 31-bit [Mercator tile](https://wiki.openstreetmap.org/wiki/Slippy_map_tilenames)
/// coordinate space. Two road points are considered the same junction
/// if and only if they have identical coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Point31 {
    pub x: u32,
    pub y: u32,
}

impl Point31 {
    pub fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    pub fn from_lat_lon(lat: f64, lon: f64) -> Self {
        Self {
            x: x31_from_longitude(lon),
            y: y31_from_latitude(lat),
        }
    }

    pub fn lat(&self) -> f64 {
        latitude_from_y31(self.y)
    }

    pub fn lon(&self) -> f64 {
        longitude_from_x31(self.x)
    }

    /// Great-circle distance to another point, in meters.
    pub fn distance(&self, other: &Point31) -> f64 {
        distance_31(self.x, self.y, other.x, other.y)
    }
}

/// Traffic direction allowed on a [Road], relative to the order of its points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RoadDirection {
    #[default]
    TwoWay,
    OneWayForward,
    OneWayReverse,
}

impl RoadDirection {
    /// Interprets a router "oneway" evaluation result: positive is forward,
    /// negative is reverse and zero allows both directions.
    pub fn from_oneway(oneway: i32) -> Self {
        match oneway.signum() {
            1 => Self::OneWayForward,
            -1 => Self::OneWayReverse,
            _ => Self::TwoWay,
        }
    }

    pub fn allows_forward(&self) -> bool {
        *self != Self::OneWayReverse
    }

    pub fn allows_backward(&self) -> bool {
        *self != Self::OneWayForward
    }
}

/// A routable road: a sequence of points with raw type codes for the whole road
/// and for individual points, decoded through the road's [RoutingRegion].
///
/// Roads are never mutated once built; they are shared between route segments with [Arc].
#[derive(Debug, Clone)]
pub struct Road {
    pub id: i64,
    pub region: Arc<RoutingRegion>,
    pub points: Vec<Point31>,
    pub types: Vec<u32>,

    /// Raw type codes of individual points (e.g. traffic signals).
    /// May be shorter than `points` - missing entries have no types.
    pub point_types: Vec<Vec<u32>>,

    /// Elevation of every point, in meters, if known.
    pub heights: Option<Vec<f64>>,
}

impl Road {
    pub fn new(id: i64, region: Arc<RoutingRegion>, points: Vec<Point31>, types: Vec<u32>) -> Self {
        Self {
            id,
            region,
            points,
            types,
            point_types: Vec::default(),
            heights: None,
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Raw type codes of the point at the provided index.
    pub fn point_types(&self, point: usize) -> &[u32] {
        self.point_types
            .get(point)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Iterates over decoded road-level tags.
    pub fn tags(&self) -> impl Iterator<Item = &TagValue> + '_ {
        self.types.iter().filter_map(|&code| self.region.decode(code))
    }

    /// Returns the value of the first road-level tag with the provided key.
    pub fn tag_value(&self, tag: &str) -> Option<&str> {
        self.tags()
            .find(|tv| tv.tag == tag)
            .map(|tv| tv.value.as_str())
    }

    /// Returns the `highway` class of the road, or an empty string.
    pub fn highway(&self) -> &str {
        self.tag_value("highway").unwrap_or("")
    }

    /// Returns the declared number of lanes, if any.
    pub fn lanes(&self) -> Option<u32> {
        self.tag_value("lanes").and_then(|v| v.trim().parse().ok())
    }

    /// Direction of traffic as declared by the road's own tags.
    pub fn direction(&self) -> RoadDirection {
        for tv in self.tags() {
            match (tv.tag.as_str(), tv.value.as_str()) {
                ("oneway", "yes" | "1" | "true") => return RoadDirection::OneWayForward,
                ("oneway", "-1" | "reverse") => return RoadDirection::OneWayReverse,
                ("junction", "roundabout") => return RoadDirection::OneWayForward,
                _ => {}
            }
        }
        RoadDirection::TwoWay
    }

    pub fn is_loop(&self) -> bool {
        self.points.len() > 1 && self.points.first() == self.points.last()
    }

    pub fn is_roundabout(&self) -> bool {
        if self.tags().any(|tv| tv.tag == "junction" && tv.value == "roundabout") {
            return true;
        }
        self.direction() != RoadDirection::TwoWay && self.is_loop()
    }

    /// Compass direction of the road from point `start`, looking forwards (`plus`)
    /// or backwards along the point sequence, at least [DIST_BEARING_DETECT] meters ahead.
    ///
    /// Returns the bearing in radians east of north, in the (-π, π] range.
    pub fn direction_route(&self, start: usize, plus: bool) -> f64 {
        self.direction_route_dist(start, plus, DIST_BEARING_DETECT)
    }

    pub fn direction_route_dist(&self, start: usize, plus: bool, dist: f64) -> f64 {
        let origin = self.points[start];
        let mut other = origin;
        let mut idx = start;
        let mut total = 0.0;

        loop {
            if plus {
                if idx + 1 >= self.points.len() {
                    break;
                }
                idx += 1;
            } else {
                if idx == 0 {
                    break;
                }
                idx -= 1;
            }

            other = self.points[idx];
            total += x31_to_meters(other.x.abs_diff(origin.x))
                + y31_to_meters(other.y.abs_diff(origin.y));
            if total >= dist {
                break;
            }
        }

        let dx = origin.x as f64 - other.x as f64;
        let dy = origin.y as f64 - other.y as f64;
        return -dx.atan2(dy);
    }

    /// Sum of distances (in meters) between consecutive points in `[from, to]`.
    pub fn distance(&self, from: usize, to: usize) -> f64 {
        let (a, b) = if from <= to { (from, to) } else { (to, from) };
        self.points[a..=b]
            .windows(2)
            .map(|pair| pair[0].distance(&pair[1]))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{build_roads, RoadSpec};

    #[test]
    fn region_encode_is_stable() {
        let mut region = RoutingRegion::new("test");
        let a = region.encode("highway", "primary");
        let b = region.encode("oneway", "yes");
        assert_eq!(region.encode("highway", "primary"), a);
        assert_ne!(a, b);
        assert_eq!(region.decode(b), Some(&TagValue::new("oneway", "yes")));
        assert_eq!(region.find("oneway", "no"), None);
    }

    #[test]
    fn regions_have_unique_ids() {
        assert_ne!(RoutingRegion::new("a").id(), RoutingRegion::new("b").id());
    }

    #[test]
    fn road_accessors() {
        let roads = build_roads(&[
            RoadSpec::new(
                1,
                &[(0.0, 0.0), (0.001, 0.0)],
                &[("highway", "primary"), ("lanes", "4"), ("oneway", "-1")],
            ),
            RoadSpec::new(
                2,
                &[(0.0, 0.0), (0.001, 0.001), (0.0, 0.002), (0.0, 0.0)],
                &[("highway", "tertiary"), ("junction", "roundabout")],
            ),
        ]);

        assert_eq!(roads[0].highway(), "primary");
        assert_eq!(roads[0].lanes(), Some(4));
        assert_eq!(roads[0].direction(), RoadDirection::OneWayReverse);
        assert!(!roads[0].is_roundabout());

        assert_eq!(roads[1].lanes(), None);
        assert_eq!(roads[1].direction(), RoadDirection::OneWayForward);
        assert!(roads[1].is_loop());
        assert!(roads[1].is_roundabout());
    }

    #[test]
    fn direction_route_compass() {
        // north, then east
        let roads = build_roads(&[RoadSpec::new(
            1,
            &[(0.0, 0.0), (0.001, 0.0), (0.001, 0.001)],
            &[("highway", "primary")],
        )]);
        let road = &roads[0];

        let north = road.direction_route(0, true).to_degrees();
        assert!(north.abs() < 1.0, "expected north, got {}", north);

        let east = road.direction_route(1, true).to_degrees();
        assert!((east - 90.0).abs() < 1.0, "expected east, got {}", east);

        let south = road.direction_route(1, false).to_degrees();
        assert!((south.abs() - 180.0).abs() < 1.0, "expected south, got {}", south);
    }

    #[test]
    fn road_distance() {
        let roads = build_roads(&[RoadSpec::new(
            1,
            &[(0.0, 0.0), (0.001, 0.0), (0.002, 0.0)],
            &[("highway", "primary")],
        )]);
        let d = roads[0].distance(2, 0);
        assert!((d - 222.4).abs() < 0.5, "unexpected distance {}", d);
        assert_eq!(roads[0].distance(1, 1), 0.0);
    }
}
