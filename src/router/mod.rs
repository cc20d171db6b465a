// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

//! Rule-driven evaluation of road attributes.
//!
//! A [GeneralRouter] holds one [RouteAttributeContext] per [RouteDataObjectAttribute],
//! each being an ordered list of [EvalRules](EvalRule) over interned road tags.
//! Routers are usually loaded from a routing profile (see [crate::config])
//! and then [built](GeneralRouter::build) for a concrete set of user parameters.

use std::borrow::Cow;
use std::collections::{HashMap, HashSet};

use crate::distance::align_angle_difference;
use crate::road::{RegionId, Road, RoutingRegion};

mod attribute;
mod context;
mod registry;
mod rule;
mod types;
mod value;

pub use attribute::{
    GeneralRouterProfile, RouteDataObjectAttribute, RoutingParameter, RoutingParameterType,
};
pub use context::{ParameterContext, RouteAttributeContext};
pub use registry::TagRegistry;
pub use rule::{Comparison, EvalRule, Expression, Operand, ParamCondition};
pub use types::{RuleId, TypeSet};
pub use value::{parse_value, ValueType};

/// Raw "no value" marker, for interoperability with data using the classic sentinel.
/// Evaluation results use [Option] instead.
pub const DOUBLE_MISSING: f64 = -1.1e9;

/// Maximum routing speed (in m/s) when looking for the shortest, instead of fastest, route.
pub const CAR_SHORTEST_DEFAULT_SPEED: f64 = 55.0 / 3.6;

pub const USE_SHORTEST_WAY: &str = "short_way";
pub const USE_HEIGHT_OBSTACLES: &str = "height_obstacles";
pub const ALLOW_PRIVATE: &str = "allow_private";
pub const DEFAULT_SPEED: &str = "default_speed";
pub const MIN_SPEED: &str = "min_speed";
pub const MAX_SPEED: &str = "max_speed";

type EvalCache = HashMap<(RegionId, Vec<u32>, bool), f64>;

/// Cost and behavior model of a single routing profile.
///
/// All evaluation methods take `&mut self`: tags seen for the first time are interned
/// into the router's [TagRegistry], and results are memoized per raw type list.
#[derive(Debug, Clone)]
pub struct GeneralRouter {
    profile: GeneralRouterProfile,
    attributes: HashMap<String, String>,
    parameters: HashMap<String, RoutingParameter>,
    parameters_order: Vec<String>,
    registry: TagRegistry,
    contexts: Vec<RouteAttributeContext>,
    cache: Vec<EvalCache>,
    impassable_road_ids: HashSet<i64>,

    restrictions_aware: bool,
    height_obstacles: bool,
    shortest_route: bool,
    allow_private: bool,

    /// Penalty (in seconds) for a sharp turn
    sharp_turn: f64,

    /// Penalty (in seconds) for a slight turn
    slight_turn: f64,

    /// Penalty (in seconds) for entering a roundabout
    roundabout_turn: f64,

    min_speed: f64,
    default_speed: f64,
    max_speed: f64,
    max_vehicle_speed: f64,

    /// Set once a maximum speed is configured. Until then evaluated speeds are not capped.
    speed_limited: bool,
}

impl Default for GeneralRouter {
    fn default() -> Self {
        Self {
            profile: GeneralRouterProfile::Car,
            attributes: HashMap::default(),
            parameters: HashMap::default(),
            parameters_order: Vec::default(),
            registry: TagRegistry::default(),
            contexts: vec![RouteAttributeContext::default(); RouteDataObjectAttribute::COUNT],
            cache: vec![EvalCache::default(); RouteDataObjectAttribute::COUNT],
            impassable_road_ids: HashSet::default(),
            restrictions_aware: true,
            height_obstacles: false,
            shortest_route: false,
            allow_private: false,
            sharp_turn: 0.0,
            slight_turn: 0.0,
            roundabout_turn: 0.0,
            min_speed: 0.28,
            default_speed: 1.0,
            max_speed: 10.0,
            max_vehicle_speed: 10.0,
            speed_limited: false,
        }
    }
}

impl GeneralRouter {
    /// Creates a router without any rules, applying the provided attributes
    /// with [GeneralRouter::add_attribute].
    pub fn new<'a, I>(profile: GeneralRouterProfile, attributes: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut router = Self {
            profile,
            ..Default::default()
        };
        for (k, v) in attributes {
            router.add_attribute(k, v);
        }
        return router;
    }

    /// Creates a router for the provided parameters.
    ///
    /// The derived router shares this router's attributes, interned tags and
    /// declared parameters, but only keeps rules whose parameter conditions
    /// are satisfied by `params`. Parameters bound to `:name` operands also come from `params`.
    pub fn build(&self, params: &HashMap<String, String>) -> GeneralRouter {
        let mut derived = Self {
            profile: self.profile,
            ..Default::default()
        };
        for (k, v) in &self.attributes {
            derived.add_attribute(k, v);
        }

        derived.registry = self.registry.clone();
        derived.parameters = self.parameters.clone();
        derived.parameters_order = self.parameters_order.clone();

        let param_context = ParameterContext::new(params.clone());
        derived.contexts = self
            .contexts
            .iter()
            .map(|ctx| RouteAttributeContext::derive(ctx, param_context.clone()))
            .collect();

        derived.allow_private = parse_bool(params.get(ALLOW_PRIVATE), false);
        derived.shortest_route = parse_bool(params.get(USE_SHORTEST_WAY), false);
        derived.height_obstacles = parse_bool(params.get(USE_HEIGHT_OBSTACLES), false);
        derived.default_speed = parse_float(params.get(DEFAULT_SPEED), derived.default_speed);
        derived.min_speed = parse_float(params.get(MIN_SPEED), derived.min_speed);
        if let Some(v) = params.get(MAX_SPEED).filter(|v| !v.is_empty()) {
            derived.max_speed = parse_float(Some(v), derived.max_speed);
            derived.speed_limited = true;
        }
        derived.max_vehicle_speed = derived.max_speed;
        if derived.shortest_route {
            derived.max_speed = CAR_SHORTEST_DEFAULT_SPEED.min(derived.max_speed);
            derived.speed_limited = true;
        }

        log::debug!(
            "derived {:?} router with {} parameter(s), {} rule(s) kept",
            derived.profile,
            params.len(),
            derived.contexts.iter().map(|c| c.rules().len()).sum::<usize>(),
        );
        return derived;
    }

    pub fn profile(&self) -> GeneralRouterProfile {
        self.profile
    }

    /// Sets a router attribute. Well-known keys also update the router's scalars;
    /// speeds are provided in km/h.
    pub fn add_attribute(&mut self, k: &str, v: &str) {
        self.attributes.insert(k.to_string(), v.to_string());
        let value = Some(&self.attributes[k]);
        match k {
            "restrictionsAware" => {
                self.restrictions_aware = parse_bool(value, self.restrictions_aware)
            }
            "sharpTurn" | "leftTurn" => self.sharp_turn = parse_float(value, self.sharp_turn),
            "slightTurn" | "rightTurn" => self.slight_turn = parse_float(value, self.slight_turn),
            "roundaboutTurn" => self.roundabout_turn = parse_float(value, self.roundabout_turn),
            "minDefaultSpeed" | "defaultSpeed" => {
                self.default_speed = parse_float(value, self.default_speed * 3.6) / 3.6
            }
            "minSpeed" => self.min_speed = parse_float(value, self.min_speed * 3.6) / 3.6,
            "maxDefaultSpeed" | "maxSpeed" => {
                self.max_speed = parse_float(value, self.max_speed * 3.6) / 3.6;
                self.max_vehicle_speed = self.max_speed;
                self.speed_limited = true;
            }
            _ => {}
        }
    }

    pub fn contains_attribute(&self, k: &str) -> bool {
        self.attributes.contains_key(k)
    }

    pub fn attribute(&self, k: &str) -> Option<&str> {
        self.attributes.get(k).map(|v| v.as_str())
    }

    pub fn attributes(&self) -> &HashMap<String, String> {
        &self.attributes
    }

    pub fn float_attribute(&self, k: &str, default: f64) -> f64 {
        parse_float(self.attributes.get(k), default)
    }

    pub fn int_attribute(&self, k: &str, default: i64) -> i64 {
        self.float_attribute(k, default as f64) as i64
    }

    /// Declares a user-facing parameter. Re-declaring a parameter replaces it,
    /// keeping its original position.
    pub fn register_parameter(&mut self, parameter: RoutingParameter) {
        if !self.parameters.contains_key(&parameter.id) {
            self.parameters_order.push(parameter.id.clone());
        }
        self.parameters.insert(parameter.id.clone(), parameter);
    }

    pub fn parameter(&self, id: &str) -> Option<&RoutingParameter> {
        self.parameters.get(id)
    }

    /// Iterates over declared parameters in declaration order.
    pub fn parameters(&self) -> impl Iterator<Item = &RoutingParameter> + '_ {
        self.parameters_order
            .iter()
            .filter_map(|id| self.parameters.get(id))
    }

    pub fn registry(&self) -> &TagRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut TagRegistry {
        &mut self.registry
    }

    pub fn context(&self, attr: RouteDataObjectAttribute) -> &RouteAttributeContext {
        &self.contexts[attr.index()]
    }

    /// Appends a rule to the context of the provided attribute.
    pub fn add_rule(&mut self, attr: RouteDataObjectAttribute, rule: EvalRule) {
        self.contexts[attr.index()].add_rule(rule);
        self.cache[attr.index()].clear();
    }

    pub fn impassable_road_ids(&self) -> &HashSet<i64> {
        &self.impassable_road_ids
    }

    pub fn add_impassable_road(&mut self, id: i64) {
        self.impassable_road_ids.insert(id);
    }

    pub fn restrictions_aware(&self) -> bool {
        self.restrictions_aware
    }

    pub fn allow_private(&self) -> bool {
        self.allow_private
    }

    pub fn shortest_route(&self) -> bool {
        self.shortest_route
    }

    pub fn height_obstacles(&self) -> bool {
        self.height_obstacles
    }

    pub fn default_speed(&self) -> f64 {
        self.default_speed
    }

    pub fn min_speed(&self) -> f64 {
        self.min_speed
    }

    pub fn max_speed(&self) -> f64 {
        self.max_speed
    }

    pub fn max_vehicle_speed(&self) -> f64 {
        self.max_vehicle_speed
    }

    /// Checks if speeds are capped by [GeneralRouter::max_speed].
    /// Routers without a configured maximum speed only apply [GeneralRouter::min_speed].
    pub fn speed_limited(&self) -> bool {
        self.speed_limited
    }

    /// Evaluates an attribute for raw type codes of a road or a road point,
    /// returning `default` if no rule applies.
    ///
    /// `dir` is the travel direction along the road (`true` for increasing point indices),
    /// used to drop point signs which only apply to the opposite direction.
    pub fn evaluate_cache(
        &mut self,
        attr: RouteDataObjectAttribute,
        region: &RoutingRegion,
        codes: &[u32],
        default: f64,
        dir: bool,
    ) -> f64 {
        let key = (region.id(), codes.to_vec(), dir);
        if let Some(&cached) = self.cache[attr.index()].get(&key) {
            return cached;
        }

        let filtered = filter_direction_tags(region, codes, dir);
        let types = self.registry.convert(region, &filtered);
        let result = self.contexts[attr.index()].evaluate_or(&types, &mut self.registry, default);

        self.cache[attr.index()].insert(key, result);
        return result;
    }

    fn evaluate_road(&mut self, attr: RouteDataObjectAttribute, road: &Road, default: f64) -> f64 {
        self.evaluate_cache(attr, &road.region, &road.types, default, false)
    }

    /// Checks if the road may be used at all.
    /// Roads not matched by any access rule are rejected.
    pub fn accept_line(&mut self, road: &Road) -> bool {
        let access = self.evaluate_road(RouteDataObjectAttribute::Access, road, DOUBLE_MISSING);
        if self.impassable_road_ids.contains(&road.id) {
            return false;
        }
        access >= 0.0
    }

    /// Returns +1 for one-way roads, -1 for reversed one-way roads and 0 for two-way roads.
    pub fn is_one_way(&mut self, road: &Road) -> i32 {
        self.evaluate_road(RouteDataObjectAttribute::Oneway, road, 0.0) as i32
    }

    pub fn is_area(&mut self, road: &Road) -> bool {
        self.evaluate_road(RouteDataObjectAttribute::Area, road, 0.0) as i32 == 1
    }

    /// Extra time (in seconds) spent passing the provided road point.
    pub fn define_obstacle(&mut self, road: &Road, point: usize, dir: bool) -> f64 {
        self.evaluate_point(RouteDataObjectAttribute::Obstacles, road, point, dir)
    }

    /// Extra routing cost of passing the provided road point.
    pub fn define_routing_obstacle(&mut self, road: &Road, point: usize, dir: bool) -> f64 {
        self.evaluate_point(RouteDataObjectAttribute::RoutingObstacles, road, point, dir)
    }

    fn evaluate_point(
        &mut self,
        attr: RouteDataObjectAttribute,
        road: &Road,
        point: usize,
        dir: bool,
    ) -> f64 {
        let codes = road.point_types(point);
        if codes.is_empty() {
            return 0.0;
        }
        self.evaluate_cache(attr, &road.region, codes, 0.0, dir)
    }

    /// Extra time (in seconds) spent climbing between the provided points,
    /// if elevation data is available and height obstacles are enabled.
    pub fn define_height_obstacle(&mut self, road: &Road, start: usize, end: usize) -> f64 {
        if !self.height_obstacles {
            return 0.0;
        }
        let Some(heights) = road.heights.as_ref() else {
            return 0.0;
        };
        if heights.len() < road.len() {
            return 0.0;
        }

        let idx = RouteDataObjectAttribute::ObstacleSrtmAltSpeed.index();
        let types = self.registry.convert(&road.region, &road.types);
        let mut sum = 0.0;
        let mut k = start;
        while k != end {
            let next = if start < end { k + 1 } else { k - 1 };
            let dist = road.points[k].distance(&road.points[next]);
            let diff = heights[next] - heights[k];

            if diff != 0.0 && dist > 0.0 {
                let incline = (diff / dist).abs();
                let mut percent = (incline * 100.0) as i32;
                percent = (percent + 2) / 3 * 3 - 2; // 1, 4, 7, 10, ...
                if percent >= 1 {
                    let signed = if diff > 0.0 { percent } else { -percent };
                    let ctx = &mut self.contexts[idx];
                    ctx.params.incline = Some(signed as f64);
                    sum += ctx.evaluate_or(&types, &mut self.registry, 0.0) * diff.abs();
                }
            }
            k = next;
        }

        self.contexts[idx].params.incline = None;
        return sum;
    }

    /// Speed (in m/s) used for choosing roads.
    pub fn define_routing_speed(&mut self, road: &Road) -> f64 {
        let speed = self.evaluate_road(RouteDataObjectAttribute::RoadSpeed, road, self.default_speed);
        self.clamp_speed(speed, self.max_speed)
    }

    /// Speed (in m/s) the vehicle actually travels with along the road.
    pub fn define_vehicle_speed(&mut self, road: &Road) -> f64 {
        let speed = self.evaluate_road(RouteDataObjectAttribute::RoadSpeed, road, self.default_speed);
        self.clamp_speed(speed, self.max_vehicle_speed)
    }

    fn clamp_speed(&self, speed: f64, max: f64) -> f64 {
        let speed = if self.speed_limited { speed.min(max) } else { speed };
        speed.max(self.min_speed)
    }

    pub fn define_speed_priority(&mut self, road: &Road) -> f64 {
        self.evaluate_road(RouteDataObjectAttribute::RoadPriorities, road, 1.0)
    }

    pub fn define_penalty_transition(&mut self, road: &Road) -> f64 {
        if self.context(RouteDataObjectAttribute::PenaltyTransition).is_empty() {
            return 0.0;
        }
        self.evaluate_road(RouteDataObjectAttribute::PenaltyTransition, road, 0.0)
    }

    /// Time penalty (in seconds) of switching from `prev` (traversed from `prev_start`
    /// to `prev_end`) onto `road` (traversed from `start` towards `end`).
    pub fn calculate_turn_time(
        &mut self,
        road: &Road,
        start: usize,
        end: usize,
        prev: &Road,
        prev_start: usize,
        prev_end: usize,
    ) -> f64 {
        let ts = self.define_penalty_transition(road);
        let prev_ts = self.define_penalty_transition(prev);

        let mut total = 0.0;
        if ts != prev_ts {
            total += (ts - prev_ts).abs() / 2.0;
        }

        if road.is_roundabout() && !prev.is_roundabout() {
            if self.roundabout_turn > 0.0 {
                total += self.roundabout_turn;
            }
        } else if self.sharp_turn > 0.0 || self.slight_turn > 0.0 {
            let a1 = road.direction_route(start, start < end);
            let a2 = prev.direction_route(prev_end, prev_end < prev_start);
            let diff = align_angle_difference(a1 - a2 - std::f64::consts::PI).abs();
            if diff > 2.0 * std::f64::consts::FRAC_PI_3 {
                total += self.sharp_turn;
            } else if diff > std::f64::consts::FRAC_PI_3 {
                total += self.slight_turn;
            }
        }

        return total;
    }

    /// Logs every rule of every context.
    pub fn print_rules(&self) {
        for (attr, ctx) in RouteDataObjectAttribute::ALL.iter().zip(&self.contexts) {
            log::info!("RouteAttributeContext {}", attr);
            for rule in ctx.rules() {
                log::info!(" {}", rule.describe(&self.registry));
            }
        }
    }
}

/// Drops stop, give-way and traffic-signal point types which apply only
/// to the direction opposite to `dir`.
fn filter_direction_tags<'a>(region: &RoutingRegion, codes: &'a [u32], dir: bool) -> Cow<'a, [u32]> {
    let opposite = if dir { -1 } else { 1 };
    let mut direction = 0;
    let mut signals_direction = 0;

    for tv in codes.iter().filter_map(|&c| region.decode(c)) {
        match (tv.tag.as_str(), tv.value.as_str()) {
            ("direction", "backward") => direction = -1,
            ("direction", "forward") => direction = 1,
            ("traffic_signals:direction", "backward") => signals_direction = -1,
            ("traffic_signals:direction", "forward") => signals_direction = 1,
            _ => {}
        }
    }

    if direction == 0 && signals_direction == 0 {
        return Cow::Borrowed(codes);
    }

    codes
        .iter()
        .copied()
        .filter(|&c| match region.decode(c) {
            Some(tv) if tv.tag == "highway" => match tv.value.as_str() {
                "stop" | "give_way" => direction != opposite,
                "traffic_signals" => signals_direction != opposite,
                _ => true,
            },
            _ => true,
        })
        .collect()
}

fn parse_bool(value: Option<&String>, default: bool) -> bool {
    match value {
        Some(v) if !v.is_empty() => v == "true",
        _ => default,
    }
}

fn parse_float(value: Option<&String>, default: f64) -> f64 {
    match value {
        Some(v) if !v.is_empty() => v.trim().parse().unwrap_or(default),
        _ => default,
    }
}
