// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

use super::search::{FinalSegment, SearchArena};
use super::segment::RouteSegment;
use super::turns::{add_turn_info_to_route, TurnOptions, MIN_TURN_ANGLE};
use crate::distance::normalized_angle_degrees;
use crate::network::RoadSource;
use crate::road::RoadDirection;
use crate::router::GeneralRouter;

/// Outcome of a route calculation: the travelled [RouteSegments](RouteSegment),
/// or an error message if no usable route was found.
#[derive(Debug, Clone, Default)]
pub struct RouteCalculationResult {
    segments: Vec<RouteSegment>,
    error: Option<String>,
    disconnected_gaps: usize,
}

impl RouteCalculationResult {
    pub fn new(segments: Vec<RouteSegment>) -> Self {
        Self {
            segments,
            error: None,
            disconnected_gaps: 0,
        }
    }

    pub fn with_error<S: Into<String>>(error: S) -> Self {
        Self {
            error: Some(error.into()),
            ..Default::default()
        }
    }

    pub fn segments(&self) -> &[RouteSegment] {
        &self.segments
    }

    pub fn into_segments(self) -> Vec<RouteSegment> {
        self.segments
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_calculated(&self) -> bool {
        self.error.is_none()
    }

    /// Number of places where consecutive segments don't meet at the same point.
    pub fn disconnected_gaps(&self) -> usize {
        self.disconnected_gaps
    }

    /// Total travel time, in seconds.
    pub fn complete_time(&self) -> f64 {
        self.segments.iter().map(|s| s.time).sum()
    }

    /// Total route length, in meters.
    pub fn complete_distance(&self) -> f64 {
        self.segments.iter().map(|s| s.distance).sum()
    }
}

/// Turns the outcome of a search into a complete route:
/// reconstructs the travelled roads, validates that they are connected,
/// splits them at ambiguous junctions and attaches other roads at every point,
/// computes time and speed, and finally synthesizes turn instructions.
///
/// If `strict` is set, disconnected routes are rejected.
pub fn prepare_result<S: RoadSource + ?Sized>(
    source: &S,
    router: &mut GeneralRouter,
    arena: &SearchArena,
    final_segment: &FinalSegment,
    turns: &TurnOptions,
    strict: bool,
) -> RouteCalculationResult {
    let Some(opposite) = final_segment.opposite.map(|id| &arena[id]) else {
        return RouteCalculationResult::with_error("Route search has not met the opposite segment");
    };
    let reverse = final_segment.reverse_way_search;
    let mut route = Vec::default();

    // Roads from the opposite search direction
    let mut segment = if reverse {
        Some(final_segment.segment)
    } else {
        opposite.parent
    };
    let mut start = if reverse {
        opposite.point_index
    } else {
        opposite.parent_end_point_index
    };
    while let Some(s) = segment.map(|id| &arena[id]) {
        let rs = RouteSegment::new(s.road.clone(), start, s.point_index);
        start = s.parent_end_point_index;
        segment = s.parent;
        add_route_segment_to_route(&mut route, rs, false);
    }

    // Reverse it just to attach roads in the travel direction
    route.reverse();

    let mut segment = if reverse {
        opposite.parent
    } else {
        Some(final_segment.segment)
    };
    let mut end = if reverse {
        opposite.parent_end_point_index
    } else {
        opposite.point_index
    };
    while let Some(s) = segment.map(|id| &arena[id]) {
        let rs = RouteSegment::new(s.road.clone(), s.point_index, end);
        end = s.parent_end_point_index;
        segment = s.parent;
        add_route_segment_to_route(&mut route, rs, true);
    }
    route.reverse();

    let disconnected_gaps = validate_all_points_connected(&route);
    if disconnected_gaps > 0 && strict {
        return RouteCalculationResult::with_error("Calculated route has broken paths");
    }

    split_roads_and_attach_road_segments(source, router, &mut route);
    calculate_time_speed_in_route(router, &mut route);
    add_turn_info_to_route(&mut route, turns);

    let result = RouteCalculationResult {
        segments: route,
        error: None,
        disconnected_gaps,
    };
    log::debug!(
        "{} segment(s) in route, complete time {:.2} s, complete distance {:.2} m",
        result.segments.len(),
        result.complete_time(),
        result.complete_distance(),
    );
    for s in &result.segments {
        log::trace!(
            "segment id={} start={} end={} time={:.2} speed={:.2} distance={:.2} description={:?}",
            s.road_id(),
            s.start,
            s.end,
            s.time,
            s.speed,
            s.distance,
            s.description,
        );
    }
    return result;
}

/// Appends a segment to the route, merging it with the last segment if both traverse
/// adjacent stretches of the same road. Empty segments are skipped.
///
/// If `reverse` is set, the route is being built backwards, and `res` precedes the last segment.
pub fn add_route_segment_to_route(route: &mut Vec<RouteSegment>, res: RouteSegment, reverse: bool) {
    if res.start == res.end {
        return;
    }

    if let Some(last) = route.last_mut() {
        if last.road_id() == res.road_id() && combine_two_segment_result(&res, last, reverse) {
            return;
        }
    }
    route.push(res);
}

/// Tries to extend `previous` with `to_add`. Both segments must travel in the same direction,
/// and `to_add` must start where `previous` ends (or, if `reverse`, end where `previous` starts).
pub fn combine_two_segment_result(to_add: &RouteSegment, previous: &mut RouteSegment, reverse: bool) -> bool {
    if previous.is_increasing() != to_add.is_increasing() {
        return false;
    }

    if !reverse && to_add.start == previous.end {
        previous.set_range(previous.start, to_add.end);
        return true;
    }
    if reverse && to_add.end == previous.start {
        previous.set_range(to_add.start, previous.end);
        return true;
    }
    false
}

/// Checks that every segment starts exactly where the previous one ends,
/// returning the number of gaps found. Gaps are logged as errors.
pub fn validate_all_points_connected(route: &[RouteSegment]) -> usize {
    let mut gaps = 0;
    for pair in route.windows(2) {
        let (prev, s) = (&pair[0], &pair[1]);
        let d = prev.road.points[prev.end].distance(&s.road.points[s.start]);
        if d > 0.0 {
            log::error!(
                "Points are not connected : {}({}) -> {}({}) {:.2} meters",
                prev.road_id(),
                prev.end,
                s.road_id(),
                s.start,
                d,
            );
            gaps += 1;
        }
    }

    for s in route {
        log::debug!("Segment : {} {} {}", s.road_id(), s.start, s.end);
    }
    return gaps;
}

/// Attaches other roads at every traversed point of the route,
/// and splits segments at junctions where the way forward is ambiguous.
pub fn split_roads_and_attach_road_segments<S: RoadSource + ?Sized>(
    source: &S,
    router: &mut GeneralRouter,
    route: &mut Vec<RouteSegment>,
) {
    let mut i = 0;
    while i < route.len() {
        let increasing = route[i].is_increasing();
        let mut point = route[i].start;

        while point != route[i].end {
            let next = if increasing { point + 1 } else { point - 1 };

            if point == route[i].start {
                attach_route_segments(source, router, route, i, point);
            }
            if next != route[i].end {
                attach_route_segments(source, router, route, i, next);
            }

            if next != route[i].end && !route[i].road.is_roundabout() && needs_split(&route[i], next) {
                let s = &mut route[i];
                let split = RouteSegment::new(s.road.clone(), next, s.end);
                let start = s.start;
                s.set_range(start, next);

                // continue with the second part
                route.insert(i + 1, split);
                i += 1;
            }

            point = next;
        }

        i += 1;
    }
}

/// Checks if any road attached at the inner point `next` leaves it in a direction
/// which could be confused with continuing along the segment.
fn needs_split(s: &RouteSegment, next: usize) -> bool {
    let increasing = s.is_increasing();
    let before = s.bearing(next, !increasing);
    let after = s.bearing(next, increasing);
    let straight = normalized_angle_degrees(before + 180.0 - after).abs() < MIN_TURN_ANGLE;

    s.attached_routes_at(next).iter().any(|attached| {
        let diff = normalized_angle_degrees(before + 180.0 - attached.bearing_begin()).abs();
        diff <= MIN_TURN_ANGLE || (!straight && diff < 100.0)
    })
}

/// Attaches all roads passing through `point` of `route[i]` (other than the road itself
/// and the road of the previous segment) in every direction they can be travelled.
///
/// At the first point of a segment, the continuation of the previous segment's road
/// is attached as well.
pub fn attach_route_segments<S: RoadSource + ?Sized>(
    source: &S,
    router: &mut GeneralRouter,
    route: &mut [RouteSegment],
    i: usize,
    point: usize,
) {
    let road = route[i].road.clone();
    let next_l = road.points.get(point + 1).copied();
    let prev_l = point.checked_sub(1).map(|p| road.points[p]);
    let mut attached = Vec::default();

    let mut previous_road_id = road.id;
    if point == route[i].start && i > 0 {
        let prev = &route[i - 1];
        previous_road_id = prev.road_id();
        if previous_road_id != road.id {
            let last = prev.road.len() - 1;
            if prev.is_increasing() && prev.end < last {
                attached.push(RouteSegment::new(prev.road.clone(), prev.end, last));
            } else if !prev.is_increasing() && prev.end > 0 {
                attached.push(RouteSegment::new(prev.road.clone(), prev.end, 0));
            }
        }
    }

    for rp in source.roads_at(road.points[point]) {
        if rp.road.id == road.id || rp.road.id == previous_road_id {
            continue;
        }

        let direction = RoadDirection::from_oneway(router.is_one_way(&rp.road));
        let idx = rp.point_index;
        let last = rp.road.len() - 1;

        // skip roads sharing the same stretch as the current road
        let distinct = |other| Some(other) != next_l && Some(other) != prev_l;

        let mut candidate = None;
        if direction.allows_forward() && idx < last && distinct(rp.road.points[idx + 1]) {
            candidate = Some(RouteSegment::new(rp.road.clone(), idx, last));
        }
        if direction.allows_backward() && idx > 0 && distinct(rp.road.points[idx - 1]) {
            candidate = Some(RouteSegment::new(rp.road.clone(), idx, 0));
        }
        attached.extend(candidate);
    }

    for a in attached {
        route[i].attach(point, a);
    }
}

/// Computes travel time, speed and distance of every segment.
pub fn calculate_time_speed_in_route(router: &mut GeneralRouter, route: &mut [RouteSegment]) {
    for s in route.iter_mut() {
        let mut speed = router.define_vehicle_speed(&s.road);
        if speed == 0.0 {
            speed = router.default_speed();
        }

        let increasing = s.is_increasing();
        let mut time = 0.0;
        let mut distance = 0.0;
        let mut point = s.start;
        while point != s.end {
            let next = if increasing { point + 1 } else { point - 1 };
            let d = s.road.points[point].distance(&s.road.points[next]);
            let obstacle = router.define_obstacle(&s.road, point, increasing).max(0.0);

            distance += d;
            time += d / speed + obstacle;
            point = next;
        }

        s.time = time;
        s.speed = speed;
        s.distance = distance;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::network::RoadNetwork;
    use crate::planner::search::SearchSegment;
    use crate::planner::turns::TurnType;
    use crate::road::Road;
    use crate::router::{EvalRule, GeneralRouterProfile, RouteDataObjectAttribute, ValueType};
    use crate::testing::{assert_almost_eq, build_roads, RoadSpec};

    fn router() -> GeneralRouter {
        let mut r = GeneralRouter::new(GeneralRouterProfile::Car, [("maxDefaultSpeed", "130")]);

        let mut rule = EvalRule::new("1", ValueType::Number);
        rule.register_and_tag_value_condition(r.registry_mut(), "highway", "", false);
        r.add_rule(RouteDataObjectAttribute::Access, rule);

        let mut rule = EvalRule::new("36", ValueType::Speed);
        rule.register_and_tag_value_condition(r.registry_mut(), "highway", "", false);
        r.add_rule(RouteDataObjectAttribute::RoadSpeed, rule);

        let mut rule = EvalRule::new("20", ValueType::Number);
        rule.register_and_tag_value_condition(r.registry_mut(), "highway", "traffic_signals", false);
        r.add_rule(RouteDataObjectAttribute::Obstacles, rule);

        let mut rule = EvalRule::new("1", ValueType::Number);
        rule.register_and_tag_value_condition(r.registry_mut(), "oneway", "yes", false);
        r.add_rule(RouteDataObjectAttribute::Oneway, rule);
        r
    }

    fn road(id: i64, coords: &[(f64, f64)]) -> Arc<Road> {
        build_roads(&[RoadSpec::new(id, coords, &[("highway", "primary")])]).remove(0)
    }

    const LINE: [(f64, f64); 4] = [(0.0, 0.0), (0.001, 0.0), (0.002, 0.0), (0.003, 0.0)];

    #[test]
    fn merge_adjacent_stretches() {
        let r = road(1, &LINE);
        let mut route = Vec::default();
        add_route_segment_to_route(&mut route, RouteSegment::new(r.clone(), 0, 1), false);
        add_route_segment_to_route(&mut route, RouteSegment::new(r.clone(), 1, 3), false);
        assert_eq!(route.len(), 1);
        assert_eq!((route[0].start, route[0].end), (0, 3));
        assert_eq!(route[0].attached_routes.len(), 4);

        // opposite direction can't be merged
        add_route_segment_to_route(&mut route, RouteSegment::new(r.clone(), 3, 2), false);
        assert_eq!(route.len(), 2);

        // empty segments are skipped
        add_route_segment_to_route(&mut route, RouteSegment::new(r.clone(), 2, 2), false);
        assert_eq!(route.len(), 2);
    }

    #[test]
    fn merge_when_building_backwards() {
        let r = road(1, &LINE);
        let mut previous = RouteSegment::new(r.clone(), 2, 3);
        assert!(combine_two_segment_result(&RouteSegment::new(r.clone(), 0, 2), &mut previous, true));
        assert_eq!((previous.start, previous.end), (0, 3));

        // merging again changes nothing
        let mut again = previous.clone();
        assert!(!combine_two_segment_result(&RouteSegment::new(r.clone(), 0, 2), &mut again, true));
        assert_eq!((again.start, again.end), (0, 3));

        assert!(!combine_two_segment_result(&RouteSegment::new(r.clone(), 0, 1), &mut previous, false));
    }

    #[test]
    fn connectivity() {
        let a = road(1, &LINE);
        let b = road(2, &[(0.003, 0.0), (0.003, 0.001)]);
        let c = road(3, &[(0.005, 0.001), (0.006, 0.001)]);

        let connected = vec![RouteSegment::new(a.clone(), 0, 3), RouteSegment::new(b.clone(), 0, 1)];
        assert_eq!(validate_all_points_connected(&connected), 0);

        let broken = vec![
            RouteSegment::new(a.clone(), 0, 3),
            RouteSegment::new(b.clone(), 0, 1),
            RouteSegment::new(c.clone(), 0, 1),
        ];
        assert_eq!(validate_all_points_connected(&broken), 1);
    }

    #[test]
    fn time_and_speed() {
        let roads = build_roads(&[RoadSpec::new(1, &LINE, &[("highway", "primary")])
            .with_point_tags(&[(1, "highway", "traffic_signals")])]);
        let mut route = vec![RouteSegment::new(roads[0].clone(), 0, 2)];
        let mut r = router();

        calculate_time_speed_in_route(&mut r, &mut route);

        let d = roads[0].distance(0, 2);
        assert_almost_eq!(route[0].speed, 10.0);
        assert_almost_eq!(route[0].distance, d);
        assert_almost_eq!(route[0].time, d / 10.0 + 20.0);
    }

    //       5
    //       |
    // 1 --- 2 --- 3 --- 4     (road 1, then road 2 north from 3)
    //             |
    //             6
    fn junction_network() -> RoadNetwork {
        RoadNetwork::from_roads(build_roads(&[
            RoadSpec::new(1, &[(0.0, 0.0), (0.0, 0.001), (0.0, 0.002), (0.0, 0.003)], &[("highway", "primary")]),
            RoadSpec::new(2, &[(0.0, 0.002), (0.001, 0.002)], &[("highway", "primary")]),
            RoadSpec::new(3, &[(0.0, 0.001), (0.001, 0.001)], &[("highway", "primary"), ("oneway", "yes")]),
            RoadSpec::new(4, &[(-0.001, 0.002), (0.0, 0.002)], &[("highway", "primary"), ("oneway", "yes")]),
        ]))
    }

    #[test]
    fn attach_roads() {
        let n = junction_network();
        let mut r = router();
        let mut route = vec![
            RouteSegment::new(n.road(1).unwrap(), 0, 2),
            RouteSegment::new(n.road(2).unwrap(), 0, 1),
        ];

        split_roads_and_attach_road_segments(&n, &mut r, &mut route);
        assert_eq!(route.len(), 2);

        // one-way road 3 leaves the route at point 1
        let at_1: Vec<_> = route[0]
            .attached_routes_at(1)
            .iter()
            .map(|a| (a.road_id(), a.start, a.end))
            .collect();
        assert_eq!(at_1, vec![(3, 0, 1)]);

        // at the start of the second segment: continuation of road 1;
        // road 4 only leads into the junction
        let at_start: Vec<_> = route[1]
            .attached_routes_at(0)
            .iter()
            .map(|a| (a.road_id(), a.start, a.end))
            .collect();
        assert_eq!(at_start, vec![(1, 2, 3)]);
    }

    #[test]
    fn split_at_forks() {
        // road 1 continues north, road 2 forks off slightly to the east at point 1
        let n = RoadNetwork::from_roads(build_roads(&[
            RoadSpec::new(1, &[(0.0, 0.0), (0.001, 0.0), (0.002, 0.0)], &[("highway", "primary")]),
            RoadSpec::new(2, &[(0.001, 0.0), (0.002, 0.0005)], &[("highway", "primary")]),
        ]));
        let mut r = router();
        let mut route = vec![RouteSegment::new(n.road(1).unwrap(), 0, 2)];

        split_roads_and_attach_road_segments(&n, &mut r, &mut route);

        let ranges: Vec<_> = route.iter().map(|s| (s.road_id(), s.start, s.end)).collect();
        assert_eq!(ranges, vec![(1, 0, 1), (1, 1, 2)]);
        assert_eq!(route[0].attached_routes.len(), 2);
        assert_eq!(route[1].attached_routes_at(1).len(), 1);
    }

    #[test]
    fn roundabouts_are_not_split() {
        let n = RoadNetwork::from_roads(build_roads(&[
            RoadSpec::new(
                1,
                &[(0.0, 0.0), (0.001, 0.0), (0.002, 0.0)],
                &[("highway", "primary"), ("junction", "roundabout")],
            ),
            RoadSpec::new(2, &[(0.001, 0.0), (0.002, 0.0005)], &[("highway", "primary")]),
        ]));
        let mut r = router();
        let mut route = vec![RouteSegment::new(n.road(1).unwrap(), 0, 2)];

        split_roads_and_attach_road_segments(&n, &mut r, &mut route);
        assert_eq!(route.len(), 1);
        assert_eq!(route[0].attached_routes_at(1).len(), 1);
    }

    fn segment_ranges(result: &RouteCalculationResult) -> Vec<(i64, usize, usize)> {
        result.segments().iter().map(|s| (s.road_id(), s.start, s.end)).collect()
    }

    #[test]
    fn prepare_from_forward_search() {
        let n = junction_network();
        let mut arena = SearchArena::new();

        // search from the start reached the junction on road 1,
        // search from the destination came there along road 2
        let forward = arena.add(SearchSegment::new(n.road(1).unwrap(), 0));
        let destination = arena.add(SearchSegment::new(n.road(2).unwrap(), 1));
        let opposite = arena.add(SearchSegment {
            road: n.road(1).unwrap(),
            point_index: 2,
            parent: Some(destination),
            parent_end_point_index: 0,
        });

        let f = FinalSegment {
            segment: forward,
            opposite: Some(opposite),
            reverse_way_search: false,
        };
        let mut r = router();
        let result = prepare_result(&n, &mut r, &arena, &f, &TurnOptions::default(), true);

        assert!(result.is_calculated());
        assert_eq!(segment_ranges(&result), vec![(1, 0, 2), (2, 0, 1)]);
        assert_eq!(result.disconnected_gaps(), 0);

        let turns: Vec<_> = result
            .segments()
            .iter()
            .map(|s| s.turn.as_ref().map(|t| t.turn_type))
            .collect();
        assert_eq!(turns, vec![Some(TurnType::Continue), Some(TurnType::TurnLeft)]);
        assert!(result.complete_time() > 0.0);
        assert_almost_eq!(
            result.complete_distance(),
            n.road(1).unwrap().distance(0, 2) + n.road(2).unwrap().distance(0, 1)
        );
        assert!(result.segments()[0].description.starts_with("Go ahead and go "));
    }

    #[test]
    fn prepare_from_reverse_search() {
        let n = junction_network();
        let mut arena = SearchArena::new();

        // search from the destination reached the junction on road 2,
        // search from the start came there along road 1
        let reversed = arena.add(SearchSegment::new(n.road(2).unwrap(), 1));
        let start = arena.add(SearchSegment::new(n.road(1).unwrap(), 0));
        let opposite = arena.add(SearchSegment {
            road: n.road(2).unwrap(),
            point_index: 0,
            parent: Some(start),
            parent_end_point_index: 2,
        });

        let f = FinalSegment {
            segment: reversed,
            opposite: Some(opposite),
            reverse_way_search: true,
        };
        let mut r = router();
        let result = prepare_result(&n, &mut r, &arena, &f, &TurnOptions::default(), true);

        assert!(result.is_calculated());
        assert_eq!(segment_ranges(&result), vec![(1, 0, 2), (2, 0, 1)]);
    }

    #[test]
    fn missing_opposite_segment() {
        let n = junction_network();
        let mut arena = SearchArena::new();
        let forward = arena.add(SearchSegment::new(n.road(1).unwrap(), 0));
        let f = FinalSegment {
            segment: forward,
            opposite: None,
            reverse_way_search: false,
        };

        let mut r = router();
        let result = prepare_result(&n, &mut r, &arena, &f, &TurnOptions::default(), false);
        assert!(!result.is_calculated());
    }

    #[test]
    fn strict_validation() {
        let n = junction_network();
        let mut arena = SearchArena::new();

        // road 3 doesn't start where road 1 is left
        let forward = arena.add(SearchSegment::new(n.road(1).unwrap(), 0));
        let third = arena.add(SearchSegment {
            road: n.road(3).unwrap(),
            point_index: 0,
            parent: Some(forward),
            parent_end_point_index: 3,
        });
        let opposite = arena.add(SearchSegment::new(n.road(3).unwrap(), 1));
        let broken = FinalSegment {
            segment: third,
            opposite: Some(opposite),
            reverse_way_search: false,
        };

        let mut r = router();
        let lenient = prepare_result(&n, &mut r, &arena, &broken, &TurnOptions::default(), false);
        assert!(lenient.is_calculated());
        assert_eq!(segment_ranges(&lenient), vec![(1, 0, 3), (3, 0, 1)]);
        assert_eq!(lenient.disconnected_gaps(), 1);

        let strict = prepare_result(&n, &mut r, &arena, &broken, &TurnOptions::default(), true);
        assert_eq!(strict.error(), Some("Calculated route has broken paths"));
        assert!(strict.segments().is_empty());
    }
}
