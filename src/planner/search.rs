// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

use std::collections::{BinaryHeap, HashMap};
use std::ops::Index;
use std::sync::Arc;

use crate::network::{RoadPoint, RoadSource};
use crate::road::{Point31, Road, RoadDirection};
use crate::router::GeneralRouter;

/// Recommended number of allowed state expansions in [find_route]
/// before [RouteError::StepLimitExceeded] is returned.
pub const DEFAULT_STEP_LIMIT: usize = 1_000_000;

/// Error conditions which may occur during route search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteError {
    /// The start or end road doesn't exist in the road source.
    InvalidReference(i64),

    /// There are no roads close to the start or end position.
    NoRoadNearby,

    /// Route search has exceeded its limit of steps.
    /// Either the points are really far apart, or no route exists.
    ///
    /// Concluding that no route exists requires traversing the whole network,
    /// which can result in a denial-of-service. The step limit protects
    /// against resource exhaustion.
    StepLimitExceeded,

    /// All reachable roads were visited without arriving at the destination.
    NoRoute,
}

impl std::fmt::Display for RouteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidReference(road_id) => write!(f, "invalid road: {}", road_id),
            Self::NoRoadNearby => write!(f, "no road nearby"),
            Self::StepLimitExceeded => write!(f, "step limit exceeded"),
            Self::NoRoute => write!(f, "no route"),
        }
    }
}

impl std::error::Error for RouteError {}

/// Identifier of a [SearchSegment] in a [SearchArena].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SearchSegmentId(usize);

/// A road reached during route search.
///
/// `point_index` is where the search arrived on `road`, coming from `parent`,
/// which was left at its `parent_end_point_index`.
#[derive(Debug, Clone)]
pub struct SearchSegment {
    pub road: Arc<Road>,
    pub point_index: usize,
    pub parent: Option<SearchSegmentId>,
    pub parent_end_point_index: usize,
}

impl SearchSegment {
    pub fn new(road: Arc<Road>, point_index: usize) -> Self {
        Self {
            road,
            point_index,
            parent: None,
            parent_end_point_index: 0,
        }
    }
}

/// Owner of all [SearchSegments](SearchSegment) created during a search.
#[derive(Debug, Clone, Default)]
pub struct SearchArena(Vec<SearchSegment>);

impl SearchArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, s: SearchSegment) -> SearchSegmentId {
        self.0.push(s);
        SearchSegmentId(self.0.len() - 1)
    }

    pub fn get(&self, id: SearchSegmentId) -> Option<&SearchSegment> {
        self.0.get(id.0)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Index<SearchSegmentId> for SearchArena {
    type Output = SearchSegment;

    fn index(&self, id: SearchSegmentId) -> &SearchSegment {
        &self.0[id.0]
    }
}

/// Outcome of a search: the last segment of a chain of parents, meeting
/// the `opposite` chain (coming from the destination) at the point
/// where `opposite` was entered.
///
/// If `reverse_way_search` is set, `segment` belongs to the chain coming from the destination,
/// and `opposite` to the chain coming from the start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FinalSegment {
    pub segment: SearchSegmentId,
    pub opposite: Option<SearchSegmentId>,
    pub reverse_way_search: bool,
}

/// Search state: standing at a point of a road, travelling in
/// the direction of increasing (`forward`) or decreasing point indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct State {
    road: i64,
    point: usize,
    forward: bool,
}

#[derive(Debug, Clone, Copy)]
struct QueueItem {
    at: State,
    cost: f64,
    score: f64,
}

impl PartialEq for QueueItem {
    fn eq(&self, other: &Self) -> bool {
        self.score.eq(&other.score)
    }
}

impl PartialOrd for QueueItem {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Eq for QueueItem {}

impl Ord for QueueItem {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // NOTE: We revert the order of comparison,
        // as lower scores are considered better ("higher"),
        // and Rust's BinaryHeap is a max-heap.
        other.score.total_cmp(&self.score)
    }
}

fn reconstruct_path(came_from: &HashMap<State, State>, mut last: State) -> Vec<State> {
    let mut path = vec![last];

    while let Some(&st) = came_from.get(&last) {
        path.push(st);
        last = st;
    }

    path.reverse();
    return path;
}

/// Turns a path of states into a chain of [SearchSegments](SearchSegment), one per road stretch.
fn build_segments(
    path: &[State],
    roads: &HashMap<i64, Arc<Road>>,
    arena: &mut SearchArena,
) -> Result<FinalSegment, RouteError> {
    let road = |id: i64| roads.get(&id).cloned().ok_or(RouteError::InvalidReference(id));

    let first = path.first().ok_or(RouteError::NoRoute)?;
    let mut current = arena.add(SearchSegment::new(road(first.road)?, first.point));

    for pair in path.windows(2) {
        let (prev, st) = (pair[0], pair[1]);
        if prev.road == st.road {
            continue;
        }

        // Every road switch is immediately followed by a step along the new road
        let entry = if st.forward { st.point - 1 } else { st.point + 1 };
        current = arena.add(SearchSegment {
            road: road(st.road)?,
            point_index: entry,
            parent: Some(current),
            parent_end_point_index: prev.point,
        });
    }

    let last = path.last().unwrap_or(first);
    let opposite = arena.add(SearchSegment::new(road(last.road)?, last.point));
    Ok(FinalSegment {
        segment: current,
        opposite: Some(opposite),
        reverse_way_search: false,
    })
}

/// Cost of travelling along a road from point `from` to the adjacent point `to`,
/// or [None] if the road can't be used.
fn along_road_cost(router: &mut GeneralRouter, road: &Road, from: usize, to: usize) -> Option<f64> {
    let speed = router.define_routing_speed(road) * router.define_speed_priority(road);
    if speed <= 0.0 {
        return None;
    }

    let obstacle = router.define_routing_obstacle(road, to, from < to);
    if obstacle < 0.0 {
        return None;
    }

    let distance = road.points[from].distance(&road.points[to]);
    let height = router.define_height_obstacle(road, from, to);
    Some(distance / speed + obstacle + height)
}

/// Returns the index of the point after `point` when travelling in the provided direction.
fn step(road: &Road, point: usize, forward: bool) -> Option<usize> {
    if forward {
        Some(point + 1).filter(|&p| p < road.len())
    } else {
        point.checked_sub(1)
    }
}

/// Uses the [A* algorithm](https://en.wikipedia.org/wiki/A*_search_algorithm)
/// to find the fastest route between two road points.
///
/// Roads are filtered and weighted with the provided [GeneralRouter]: travel time along a road
/// comes from its routing speed and priority plus obstacles, and switching roads at a junction
/// costs [GeneralRouter::calculate_turn_time]. Turning around on the same road is not allowed.
///
/// `step_limit` limits how many states may be expanded during the search
/// before returning [RouteError::StepLimitExceeded]. The recommended value is [DEFAULT_STEP_LIMIT].
pub fn find_route<S: RoadSource + ?Sized>(
    source: &S,
    router: &mut GeneralRouter,
    from: &RoadPoint,
    to: &RoadPoint,
    heuristic_coefficient: f64,
    step_limit: usize,
) -> Result<(SearchArena, FinalSegment), RouteError> {
    let mut arena = SearchArena::new();
    if source.road(from.road.id).is_none() {
        return Err(RouteError::InvalidReference(from.road.id));
    }
    if source.road(to.road.id).is_none() {
        return Err(RouteError::InvalidReference(to.road.id));
    }

    let target = to.point();
    if from.point() == target {
        let s = arena.add(SearchSegment::new(from.road.clone(), from.point_index));
        let opposite = arena.add(SearchSegment::new(from.road.clone(), from.point_index));
        let f = FinalSegment {
            segment: s,
            opposite: Some(opposite),
            reverse_way_search: false,
        };
        return Ok((arena, f));
    }

    // Without a speed cap, no bound on the remaining time is known.
    let max_speed = if router.speed_limited() {
        router.max_speed().max(f64::EPSILON)
    } else {
        f64::INFINITY
    };
    let heuristic = |p: Point31| p.distance(&target) / max_speed * heuristic_coefficient;

    let mut roads: HashMap<i64, Arc<Road>> = HashMap::default();
    let mut queue: BinaryHeap<QueueItem> = BinaryHeap::default();
    let mut came_from: HashMap<State, State> = HashMap::default();
    let mut known_costs: HashMap<State, f64> = HashMap::default();
    let mut steps: usize = 0;

    for rp in source.roads_at(from.point()) {
        if !router.accept_line(&rp.road) {
            continue;
        }
        let direction = RoadDirection::from_oneway(router.is_one_way(&rp.road));
        for forward in [true, false] {
            let allowed = if forward {
                direction.allows_forward()
            } else {
                direction.allows_backward()
            };
            if allowed && step(&rp.road, rp.point_index, forward).is_some() {
                let at = State {
                    road: rp.road.id,
                    point: rp.point_index,
                    forward,
                };
                known_costs.insert(at, 0.0);
                queue.push(QueueItem {
                    at,
                    cost: 0.0,
                    score: heuristic(rp.point()),
                });
            }
        }
        roads.insert(rp.road.id, rp.road);
    }

    while let Some(item) = queue.pop() {
        let Some(road) = roads.get(&item.at.road).cloned() else {
            continue;
        };
        let point = road.points[item.at.point];

        if point == target {
            let path = reconstruct_path(&came_from, item.at);
            let f = build_segments(&path, &roads, &mut arena)?;
            return Ok((arena, f));
        }

        // Contrary to the wikipedia definition, we might keep multiple items in the queue for the same state.
        if item.cost > known_costs.get(&item.at).cloned().unwrap_or(f64::INFINITY) {
            continue;
        }

        steps += 1;
        if steps > step_limit {
            return Err(RouteError::StepLimitExceeded);
        }

        let mut neighbors: Vec<(State, f64)> = Vec::default();

        // Continue along the same road
        if let Some(next) = step(&road, item.at.point, item.at.forward) {
            if let Some(cost) = along_road_cost(router, &road, item.at.point, next) {
                let at = State {
                    point: next,
                    ..item.at
                };
                neighbors.push((at, cost));
            }
        }

        // Switch onto other roads at a junction; roads at the start point were all seeded
        if came_from.contains_key(&item.at) {
            let prev_start = if item.at.forward {
                item.at.point - 1
            } else {
                item.at.point + 1
            };

            for rp in source.roads_at(point) {
                if rp.road.id == road.id || !router.accept_line(&rp.road) {
                    continue;
                }
                let direction = RoadDirection::from_oneway(router.is_one_way(&rp.road));

                for forward in [true, false] {
                    let allowed = if forward {
                        direction.allows_forward()
                    } else {
                        direction.allows_backward()
                    };
                    let Some(next) = step(&rp.road, rp.point_index, forward).filter(|_| allowed) else {
                        continue;
                    };
                    let Some(cost) = along_road_cost(router, &rp.road, rp.point_index, next) else {
                        continue;
                    };

                    let turn = router.calculate_turn_time(
                        &rp.road,
                        rp.point_index,
                        next,
                        &road,
                        prev_start,
                        item.at.point,
                    );
                    let at = State {
                        road: rp.road.id,
                        point: next,
                        forward,
                    };
                    neighbors.push((at, turn + cost));
                }
                roads.insert(rp.road.id, rp.road);
            }
        }

        for (at, edge_cost) in neighbors {
            // Check if this is the cheapest way to the neighbor
            let neighbor_cost = item.cost + edge_cost;
            if neighbor_cost >= known_costs.get(&at).cloned().unwrap_or(f64::INFINITY) {
                continue;
            }

            let Some(neighbor_road) = roads.get(&at.road) else {
                continue;
            };
            let neighbor_point = neighbor_road.points[at.point];

            came_from.insert(at, item.at);
            known_costs.insert(at, neighbor_cost);
            queue.push(QueueItem {
                at,
                cost: neighbor_cost,
                score: neighbor_cost + heuristic(neighbor_point),
            });
        }
    }

    return Err(RouteError::NoRoute);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::RoadNetwork;
    use crate::router::{EvalRule, GeneralRouterProfile, RouteDataObjectAttribute, ValueType};
    use crate::testing::{build_roads, RoadSpec};

    fn router() -> GeneralRouter {
        with_rules(GeneralRouter::new(GeneralRouterProfile::Car, [("maxDefaultSpeed", "130")]))
    }

    fn with_rules(mut r: GeneralRouter) -> GeneralRouter {
        let mut rule = EvalRule::new("-1", ValueType::Number);
        rule.register_and_tag_value_condition(r.registry_mut(), "highway", "footway", false);
        r.add_rule(RouteDataObjectAttribute::Access, rule);
        let mut rule = EvalRule::new("1", ValueType::Number);
        rule.register_and_tag_value_condition(r.registry_mut(), "highway", "", false);
        r.add_rule(RouteDataObjectAttribute::Access, rule);

        for (value, speed) in [("primary", "50"), ("residential", "20")] {
            let mut rule = EvalRule::new(speed, ValueType::Speed);
            rule.register_and_tag_value_condition(r.registry_mut(), "highway", value, false);
            r.add_rule(RouteDataObjectAttribute::RoadSpeed, rule);
        }

        let mut rule = EvalRule::new("1", ValueType::Number);
        rule.register_and_tag_value_condition(r.registry_mut(), "oneway", "yes", false);
        r.add_rule(RouteDataObjectAttribute::Oneway, rule);
        r
    }

    //  3 ---103--- 5
    //  |           ^ 102 (oneway)
    //  2 ---101--- 4
    //  |
    //  1
    fn network(oneway_tag: &str) -> RoadNetwork {
        let p1 = (0.0, 0.0);
        let p2 = (0.001, 0.0);
        let p3 = (0.002, 0.0);
        let p4 = (0.001, 0.001);
        let p5 = (0.002, 0.001);
        RoadNetwork::from_roads(build_roads(&[
            RoadSpec::new(100, &[p1, p2, p3], &[("highway", "primary")]),
            RoadSpec::new(101, &[p2, p4], &[("highway", "primary")]),
            RoadSpec::new(102, &[p4, p5], &[("highway", "primary"), ("oneway", oneway_tag)]),
            RoadSpec::new(103, &[p3, p5], &[("highway", "residential")]),
            RoadSpec::new(104, &[(0.0, 0.001), p4], &[("highway", "footway")]),
        ]))
    }

    fn chain(arena: &SearchArena, f: &FinalSegment) -> Vec<(i64, usize, usize)> {
        let mut out = Vec::default();
        let mut end = arena[f.opposite.unwrap()].point_index;
        let mut segment = Some(f.segment);
        while let Some(id) = segment {
            let s = &arena[id];
            out.push((s.road.id, s.point_index, end));
            end = s.parent_end_point_index;
            segment = s.parent;
        }
        out.reverse();
        out
    }

    fn rp(n: &RoadNetwork, road: i64, idx: usize) -> RoadPoint {
        RoadPoint {
            road: n.road(road).unwrap(),
            point_index: idx,
        }
    }

    #[test]
    fn prefers_faster_roads() {
        let n = network("yes");
        let mut r = router();
        let (arena, f) = find_route(&n, &mut r, &rp(&n, 100, 0), &rp(&n, 102, 1), 1.0, DEFAULT_STEP_LIMIT)
            .unwrap();
        assert_eq!(chain(&arena, &f), vec![(100, 0, 1), (101, 0, 1), (102, 0, 1)]);
    }

    #[test]
    fn without_speed_limit() {
        let n = network("yes");
        let mut r = with_rules(GeneralRouter::new(GeneralRouterProfile::Car, []));
        assert!(!r.speed_limited());
        let (arena, f) = find_route(&n, &mut r, &rp(&n, 100, 0), &rp(&n, 102, 1), 1.5, DEFAULT_STEP_LIMIT)
            .unwrap();
        assert_eq!(chain(&arena, &f), vec![(100, 0, 1), (101, 0, 1), (102, 0, 1)]);
    }

    #[test]
    fn respects_one_way_roads() {
        let n = network("yes");
        let mut r = router();
        let (arena, f) = find_route(&n, &mut r, &rp(&n, 103, 1), &rp(&n, 101, 0), 1.0, DEFAULT_STEP_LIMIT)
            .unwrap();
        assert_eq!(chain(&arena, &f), vec![(103, 1, 0), (100, 2, 1)]);
    }

    #[test]
    fn inaccessible_destination() {
        let n = network("yes");
        let mut r = router();
        let err = find_route(&n, &mut r, &rp(&n, 100, 0), &rp(&n, 104, 0), 1.0, DEFAULT_STEP_LIMIT)
            .unwrap_err();
        assert_eq!(err, RouteError::NoRoute);
    }

    #[test]
    fn step_limit() {
        let n = network("yes");
        let mut r = router();
        let err = find_route(&n, &mut r, &rp(&n, 100, 0), &rp(&n, 102, 1), 1.0, 2).unwrap_err();
        assert_eq!(err, RouteError::StepLimitExceeded);
    }

    #[test]
    fn invalid_reference() {
        let n = network("yes");
        let other = build_roads(&[RoadSpec::new(7, &[(1.0, 1.0), (1.001, 1.0)], &[("highway", "primary")])]);
        let mut r = router();
        let from = RoadPoint {
            road: other[0].clone(),
            point_index: 0,
        };
        let err = find_route(&n, &mut r, &from, &rp(&n, 100, 0), 1.0, DEFAULT_STEP_LIMIT).unwrap_err();
        assert_eq!(err, RouteError::InvalidReference(7));
    }

    #[test]
    fn same_point() {
        let n = network("yes");
        let mut r = router();
        let (arena, f) = find_route(&n, &mut r, &rp(&n, 100, 1), &rp(&n, 101, 0), 1.0, DEFAULT_STEP_LIMIT)
            .unwrap();
        assert_eq!(chain(&arena, &f), vec![(100, 1, 1)]);
    }
}
