// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

//! Route planning: searching for a route, turning the search outcome into
//! [RouteSegments](RouteSegment) and describing the maneuvers along the way.
//!
//! # Example
//!
//! ```no_run
//! use std::collections::HashMap;
//!
//! let network = roadrules::network::osm::load_network_from_file(
//!     "path/to/map.osm",
//!     roadrules::FileFormat::Xml,
//! ).expect("failed to load map.osm");
//! let builder = roadrules::config::parse_routing_configuration_from_file(
//!     "path/to/routing.xml",
//!     roadrules::FileFormat::Xml,
//! ).expect("failed to load routing.xml");
//!
//! let mut planner = roadrules::planner::RoutePlanner::new(&network, builder.build("car", &HashMap::default()));
//! let result = planner.route(52.2297, 21.0122, 52.2319, 21.0067);
//! for s in result.segments() {
//!     println!("{}", s.description);
//! }
//! ```

mod result;
mod search;
mod segment;
mod turns;

pub use result::{
    add_route_segment_to_route, attach_route_segments, calculate_time_speed_in_route,
    combine_two_segment_result, prepare_result, split_roads_and_attach_road_segments,
    validate_all_points_connected, RouteCalculationResult,
};
pub use search::{
    find_route, FinalSegment, RouteError, SearchArena, SearchSegment, SearchSegmentId,
    DEFAULT_STEP_LIMIT,
};
pub use segment::RouteSegment;
pub use turns::{
    add_turn_info_to_route, attach_keep_left_info_and_lanes, classify_turn, get_turn_info,
    process_roundabout_turn, SpeakPriorities, TurnInfo, TurnOptions, TurnType, MAX_SPEAK_PRIORITY,
    MIN_TURN_ANGLE, U_TURN_MERGE_DISTANCE,
};

use crate::config::RoutingConfiguration;
use crate::network::{RoadPoint, RoadSource};
use crate::router::GeneralRouter;

/// Calculates routes over a [RoadSource] with a [RoutingConfiguration].
pub struct RoutePlanner<'a, S: RoadSource + ?Sized> {
    source: &'a S,
    config: RoutingConfiguration,
    pub turns: TurnOptions,

    /// Reject routes whose consecutive segments don't meet at the same point.
    pub strict_validation: bool,

    pub step_limit: usize,
}

impl<'a, S: RoadSource + ?Sized> RoutePlanner<'a, S> {
    pub fn new(source: &'a S, config: RoutingConfiguration) -> Self {
        Self {
            source,
            config,
            turns: TurnOptions::default(),
            strict_validation: false,
            step_limit: DEFAULT_STEP_LIMIT,
        }
    }

    pub fn config(&self) -> &RoutingConfiguration {
        &self.config
    }

    pub fn router(&self) -> &GeneralRouter {
        &self.config.router
    }

    /// Finds a route between two positions and prepares its segments and turn instructions.
    ///
    /// Both positions are snapped to the closest point of a road usable by the router.
    /// Failures are reported through [RouteCalculationResult::error].
    pub fn route(&mut self, start_lat: f64, start_lon: f64, end_lat: f64, end_lon: f64) -> RouteCalculationResult {
        match self.search(start_lat, start_lon, end_lat, end_lon) {
            Ok((arena, final_segment)) => prepare_result(
                self.source,
                &mut self.config.router,
                &arena,
                &final_segment,
                &self.turns,
                self.strict_validation,
            ),

            Err(e) => {
                log::warn!("route calculation failed: {}", e);
                RouteCalculationResult::with_error(e.to_string())
            }
        }
    }

    fn search(
        &mut self,
        start_lat: f64,
        start_lon: f64,
        end_lat: f64,
        end_lon: f64,
    ) -> Result<(SearchArena, FinalSegment), RouteError> {
        let from = self.snap(start_lat, start_lon)?;
        let to = self.snap(end_lat, end_lon)?;
        log::debug!(
            "routing from {}({}) to {}({}) with {:?} router",
            from.road.id,
            from.point_index,
            to.road.id,
            to.point_index,
            self.config.router_name,
        );

        find_route(
            self.source,
            &mut self.config.router,
            &from,
            &to,
            self.config.heuristic_coefficient,
            self.step_limit,
        )
    }

    /// Returns the closest road point to the provided position,
    /// preferring a road accepted by the router at that point.
    fn snap(&mut self, lat: f64, lon: f64) -> Result<RoadPoint, RouteError> {
        let nearest = self
            .source
            .nearest_road_point(lat, lon)
            .ok_or(RouteError::NoRoadNearby)?;

        let router = &mut self.config.router;
        if router.accept_line(&nearest.road) {
            return Ok(nearest);
        }
        self.source
            .roads_at(nearest.point())
            .into_iter()
            .find(|rp| router.accept_line(&rp.road))
            .ok_or(RouteError::NoRoadNearby)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::config::parse_routing_configuration_from_buffer;
    use crate::network::osm::load_network_from_buffer;
    use crate::network::RoadNetwork;
    use crate::FileFormat;

    const SIMPLE_OSM: &[u8] = include_bytes!("../network/test_fixtures/simple.osm");
    const ROUTING_XML: &[u8] = include_bytes!("../config/test_fixtures/routing.xml");

    fn fixtures(profile: &str) -> (RoadNetwork, RoutingConfiguration) {
        let network = load_network_from_buffer(SIMPLE_OSM, FileFormat::Xml).unwrap();
        let config = parse_routing_configuration_from_buffer(ROUTING_XML, FileFormat::Xml)
            .unwrap()
            .build(profile, &HashMap::default());
        (network, config)
    }

    #[test]
    fn route_between_nodes() {
        let (network, config) = fixtures("car");
        let mut planner = RoutePlanner::new(&network, config);
        planner.strict_validation = true;

        let result = planner.route(52.0, 21.0, 52.002, 21.0015);
        assert!(result.is_calculated(), "{:?}", result.error());

        let ids: Vec<_> = result.segments().iter().map(|s| s.road_id()).collect();
        assert_eq!(ids, vec![100, 103]);

        let turns: Vec<_> = result
            .segments()
            .iter()
            .map(|s| s.turn.as_ref().map(|t| t.turn_type))
            .collect();
        assert_eq!(turns, vec![Some(TurnType::Continue), Some(TurnType::TurnRight)]);
        assert!(result.segments()[1].description.starts_with("Turn right and go "));

        // the primary road has traffic signals on the way
        assert!(result.segments()[0].time > 25.0);
        assert!(result.complete_distance() > 300.0);
    }

    #[test]
    fn snaps_to_accessible_roads() {
        let (network, config) = fixtures("car");
        let mut planner = RoutePlanner::new(&network, config);

        // closest point is at the end of a footway
        let result = planner.route(52.001, 20.9985, 52.002, 21.0);
        assert_eq!(result.error(), Some("no road nearby"));

        let snapped = planner.snap(52.001, 21.0).unwrap();
        assert_ne!(snapped.road.id, 104);
    }

    #[test]
    fn step_limit() {
        let (network, config) = fixtures("car");
        let mut planner = RoutePlanner::new(&network, config);
        planner.step_limit = 1;

        let result = planner.route(52.0, 21.0, 52.002, 21.0015);
        assert!(!result.is_calculated());
        assert!(result.segments().is_empty());
    }
}
