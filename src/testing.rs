// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

//! Helpers shared by unit tests.

use std::sync::Arc;

use crate::road::{Point31, Road, RoutingRegion};

/// Description of a road used to build test fixtures.
pub struct RoadSpec<'a> {
    pub id: i64,
    pub coords: &'a [(f64, f64)],
    pub tags: &'a [(&'a str, &'a str)],
    pub point_tags: &'a [(usize, &'a str, &'a str)],
}

impl<'a> RoadSpec<'a> {
    pub fn new(id: i64, coords: &'a [(f64, f64)], tags: &'a [(&'a str, &'a str)]) -> Self {
        Self {
            id,
            coords,
            tags,
            point_tags: &[],
        }
    }

    pub fn with_point_tags(mut self, point_tags: &'a [(usize, &'a str, &'a str)]) -> Self {
        self.point_tags = point_tags;
        self
    }
}

/// Builds all roads in a single, shared [RoutingRegion].
pub fn build_roads(specs: &[RoadSpec<'_>]) -> Vec<Arc<Road>> {
    let mut region = RoutingRegion::new("test");
    let encoded: Vec<(Vec<u32>, Vec<Vec<u32>>)> = specs
        .iter()
        .map(|spec| {
            let types = spec
                .tags
                .iter()
                .map(|(k, v)| region.encode(k, v))
                .collect();
            let mut point_types = vec![Vec::default(); spec.coords.len()];
            for &(idx, k, v) in spec.point_tags {
                point_types[idx].push(region.encode(k, v));
            }
            (types, point_types)
        })
        .collect();

    let region = Arc::new(region);
    specs
        .iter()
        .zip(encoded)
        .map(|(spec, (types, point_types))| {
            let points = spec
                .coords
                .iter()
                .map(|&(lat, lon)| Point31::from_lat_lon(lat, lon))
                .collect();
            let mut road = Road::new(spec.id, region.clone(), points, types);
            road.point_types = point_types;
            Arc::new(road)
        })
        .collect()
}

macro_rules! assert_almost_eq {
    ($a:expr, $b:expr) => {
        assert!(
            (($a - $b).abs() < 1e-4),
            "assertion failed: {} ≈ {}",
            $a,
            $b
        )
    };
}

pub(crate) use assert_almost_eq;
