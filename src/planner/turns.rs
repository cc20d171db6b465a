// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

use std::fmt;

use super::segment::RouteSegment;
use crate::distance::degrees_diff;
use crate::road::RoadDirection;

/// Bearing difference (in degrees) above which a change of heading is a turn.
pub const MIN_TURN_ANGLE: f64 = 45.0;

/// Two same-direction turns separated by a segment shorter than this (in meters)
/// are announced as a single U-turn.
pub const U_TURN_MERGE_DISTANCE: f64 = 35.0;

pub const MAX_SPEAK_PRIORITY: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TurnType {
    Continue,
    TurnLeft,
    TurnSlightlyLeft,
    TurnSharplyLeft,
    TurnRight,
    TurnSlightlyRight,
    TurnSharplyRight,
    KeepLeft,
    KeepRight,
    UTurn,
    RightUTurn,
    OffRoute,
    Roundabout,
    RoundaboutLeft,
}

impl TurnType {
    /// Numeric code of the maneuver, as used by navigation clients.
    pub fn code(self) -> u8 {
        match self {
            Self::Continue => 1,
            Self::TurnLeft => 2,
            Self::TurnSlightlyLeft => 3,
            Self::TurnSharplyLeft => 4,
            Self::TurnRight => 5,
            Self::TurnSlightlyRight => 6,
            Self::TurnSharplyRight => 7,
            Self::KeepLeft => 8,
            Self::KeepRight => 9,
            Self::UTurn => 10,
            Self::RightUTurn => 11,
            Self::OffRoute => 12,
            Self::Roundabout => 13,
            Self::RoundaboutLeft => 14,
        }
    }

    pub fn short_name(self) -> &'static str {
        match self {
            Self::Continue => "C",
            Self::TurnLeft => "TL",
            Self::TurnSlightlyLeft => "TSLL",
            Self::TurnSharplyLeft => "TSHL",
            Self::TurnRight => "TR",
            Self::TurnSlightlyRight => "TSLR",
            Self::TurnSharplyRight => "TSHR",
            Self::KeepLeft => "KL",
            Self::KeepRight => "KR",
            Self::UTurn => "TU",
            Self::RightUTurn => "TRU",
            Self::OffRoute => "OFFR",
            Self::Roundabout => "RNDB",
            Self::RoundaboutLeft => "RNLB",
        }
    }

    pub fn is_roundabout(self) -> bool {
        matches!(self, Self::Roundabout | Self::RoundaboutLeft)
    }
}

/// A maneuver to be announced at the beginning of a [RouteSegment].
#[derive(Debug, Clone, PartialEq)]
pub struct TurnInfo {
    pub turn_type: TurnType,

    /// Exit number, for roundabouts
    pub exit_out: u32,

    /// Clockwise head rotation, in degrees
    pub turn_angle: f64,

    /// Set for maneuvers which are obvious enough not to be announced
    pub skip_to_speak: bool,

    /// Lane occupancy from left to right; 1 marks lanes continuing on the route
    pub lanes: Vec<u32>,
}

impl TurnInfo {
    pub fn new(turn_type: TurnType) -> Self {
        Self {
            turn_type,
            exit_out: 0,
            turn_angle: 0.0,
            skip_to_speak: false,
            lanes: Vec::default(),
        }
    }

    pub fn exit(turn_type: TurnType, exit_out: u32, turn_angle: f64) -> Self {
        Self {
            exit_out,
            turn_angle,
            ..Self::new(turn_type)
        }
    }
}

impl fmt::Display for TurnInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.turn_type {
            TurnType::Roundabout | TurnType::RoundaboutLeft => {
                write!(f, "Take {} exit", self.exit_out)
            }
            TurnType::Continue => f.write_str("Go ahead"),
            TurnType::TurnSlightlyLeft => f.write_str("Turn slightly left"),
            TurnType::TurnLeft => f.write_str("Turn left"),
            TurnType::TurnSharplyLeft => f.write_str("Turn sharply left"),
            TurnType::TurnSlightlyRight => f.write_str("Turn slightly right"),
            TurnType::TurnRight => f.write_str("Turn right"),
            TurnType::TurnSharplyRight => f.write_str("Turn sharply right"),
            TurnType::UTurn | TurnType::RightUTurn => f.write_str("Make uturn"),
            TurnType::KeepLeft => f.write_str("Keep left"),
            TurnType::KeepRight => f.write_str("Keep right"),
            TurnType::OffRoute => f.write_str("Off route"),
        }
    }
}

/// Classifies roads by how worthy of an announcement a maneuver onto them is,
/// based on suffixes of their `highway` tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeakPriorities {
    /// Suffixes of minor roads, never worth announcing ([MAX_SPEAK_PRIORITY])
    pub minor: Vec<String>,

    /// Suffixes of low-importance roads (priority 1); everything else has priority 0
    pub low: Vec<String>,
}

impl Default for SpeakPriorities {
    fn default() -> Self {
        Self {
            minor: ["track", "services", "service", "path"]
                .map(String::from)
                .to_vec(),
            low: ["_link", "unclassified", "road", "living_street", "residential"]
                .map(String::from)
                .to_vec(),
        }
    }
}

impl SpeakPriorities {
    pub fn highway_speak_priority(&self, highway: &str) -> u32 {
        if highway.is_empty() || self.minor.iter().any(|s| highway.ends_with(s.as_str())) {
            MAX_SPEAK_PRIORITY
        } else if self.low.iter().any(|s| highway.ends_with(s.as_str())) {
            1
        } else {
            0
        }
    }
}

/// Options of the turn instruction synthesis.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnOptions {
    /// Set in countries driving on the left side of the road
    pub left_side_navigation: bool,

    pub speak_priorities: SpeakPriorities,

    /// `highway` values on which leaving a straight road is a "keep" rather than a slight turn
    pub motorway_highways: Vec<String>,
}

impl Default for TurnOptions {
    fn default() -> Self {
        Self {
            left_side_navigation: false,
            speak_priorities: SpeakPriorities::default(),
            motorway_highways: ["motorway", "motorway_link", "trunk", "trunk_link"]
                .map(String::from)
                .to_vec(),
        }
    }
}

impl TurnOptions {
    fn is_motorway(&self, s: &RouteSegment) -> bool {
        let highway = s.road.highway();
        self.motorway_highways.iter().any(|h| h == highway)
    }
}

/// Lanes usable in the direction of travel: two-way roads only contribute half of their lanes.
fn directional_lanes(s: &RouteSegment) -> u32 {
    let lanes = s.road.lanes().unwrap_or(0);
    if s.road.direction() == RoadDirection::TwoWay {
        (lanes + 1) / 2
    } else {
        lanes
    }
}

/// Figures out the maneuver at the beginning of `route[i]`.
/// Returns [None] if there is nothing to announce.
pub fn get_turn_info(route: &[RouteSegment], i: usize, options: &TurnOptions) -> Option<TurnInfo> {
    if i == 0 {
        return Some(TurnInfo::new(TurnType::Continue));
    }

    let prev = &route[i - 1];
    let current = &route[i];
    if prev.road.is_roundabout() {
        // exits were counted when entering the roundabout
        return None;
    }
    if current.road.is_roundabout() {
        return Some(process_roundabout_turn(route, i, options));
    }

    let mpi = degrees_diff(prev.bearing_end(), current.bearing_begin());
    let turn_type = classify_turn(mpi, options.left_side_navigation);

    let mut turn = match turn_type {
        Some(t) => TurnInfo::new(t),
        None => attach_keep_left_info_and_lanes(prev, current, options)?,
    };
    turn.turn_angle = -mpi;
    Some(turn)
}

/// Maps a bearing change (in degrees, positive to the left) onto a turn.
/// Changes smaller than [MIN_TURN_ANGLE] in either direction aren't turns.
pub fn classify_turn(mpi: f64, left_side: bool) -> Option<TurnType> {
    if mpi >= MIN_TURN_ANGLE {
        if mpi < 60.0 {
            Some(TurnType::TurnSlightlyLeft)
        } else if mpi < 120.0 {
            Some(TurnType::TurnLeft)
        } else if mpi < 135.0 || left_side {
            Some(TurnType::TurnSharplyLeft)
        } else {
            Some(TurnType::UTurn)
        }
    } else if mpi <= -MIN_TURN_ANGLE {
        if mpi > -60.0 {
            Some(TurnType::TurnSlightlyRight)
        } else if mpi > -120.0 {
            Some(TurnType::TurnRight)
        } else if mpi > -135.0 || !left_side {
            Some(TurnType::TurnSharplyRight)
        } else {
            Some(TurnType::RightUTurn)
        }
    } else {
        None
    }
}

/// Checks whether other roads branching off at the beginning of `current`
/// make continuing on it a "keep left" or "keep right" maneuver, and computes
/// lane occupancy for the announcement.
pub fn attach_keep_left_info_and_lanes(
    prev: &RouteSegment,
    current: &RouteSegment,
    options: &TurnOptions,
) -> Option<TurnInfo> {
    let priorities = &options.speak_priorities;
    let speak_priority = priorities
        .highway_speak_priority(prev.road.highway())
        .max(priorities.highway_speak_priority(current.road.highway()));

    let mut kl = false;
    let mut kr = false;
    let mut left = 0;
    let mut right = 0;
    let mut speak = false;

    for attached in current.attached_routes_at(current.start) {
        let ex = degrees_diff(attached.bearing_begin(), current.bearing_begin());
        let mpi = degrees_diff(prev.bearing_end(), attached.bearing_begin()).abs();
        let rs_speak_priority = priorities.highway_speak_priority(attached.road.highway());
        if rs_speak_priority == MAX_SPEAK_PRIORITY && speak_priority != MAX_SPEAK_PRIORITY {
            continue;
        }

        if (ex < MIN_TURN_ANGLE || mpi < MIN_TURN_ANGLE) && ex >= 0.0 {
            kl = true;
            right += directional_lanes(attached);
            speak = speak || rs_speak_priority <= speak_priority;
        } else if (ex > -MIN_TURN_ANGLE || mpi < MIN_TURN_ANGLE) && ex <= 0.0 {
            kr = true;
            left += directional_lanes(attached);
            speak = speak || rs_speak_priority <= speak_priority;
        }
    }

    if kr && left == 0 {
        left = 1;
    } else if kl && right == 0 {
        right = 1;
    }

    let current_lanes = directional_lanes(current).max(1);
    let lanes = (0..left + current_lanes + right)
        .map(|i| if i >= left && i < left + current_lanes { 1 } else { 0 })
        .collect();
    if current_lanes <= left + right && (left > 1 || right > 1) {
        speak = true;
    }

    let deviation = degrees_diff(prev.bearing_end(), current.bearing_begin()).abs();
    let make_slight_turn =
        deviation > 5.0 && (!options.is_motorway(prev) || !options.is_motorway(current));

    let turn_type = match (kl, kr) {
        (_, true) if make_slight_turn => TurnType::TurnSlightlyRight,
        (_, true) => TurnType::KeepRight,
        (true, false) if make_slight_turn => TurnType::TurnSlightlyLeft,
        (true, false) => TurnType::KeepLeft,
        (false, false) => return None,
    };

    Some(TurnInfo {
        skip_to_speak: !speak,
        lanes,
        ..TurnInfo::new(turn_type)
    })
}

/// Counts roundabout exits passed from `route[i]` onwards, until the route leaves the roundabout.
pub fn process_roundabout_turn(route: &[RouteSegment], i: usize, options: &TurnOptions) -> TurnInfo {
    let prev = &route[i - 1];
    let mut exit = 1;
    let mut last = &route[i];

    for s in &route[i..] {
        last = s;
        if !s.road.is_roundabout() {
            break;
        }

        let mut k = s.start;
        while k != s.end {
            if !s.attached_routes_at(k).is_empty() {
                exit += 1;
            }
            k = if s.is_increasing() { k + 1 } else { k - 1 };
        }
    }

    let turn_type = if options.left_side_navigation {
        TurnType::RoundaboutLeft
    } else {
        TurnType::Roundabout
    };
    let angle = degrees_diff(last.bearing_begin(), prev.bearing_end());
    TurnInfo::exit(turn_type, exit, angle)
}

/// Sets [RouteSegment::turn] on every segment starting with a maneuver, and describes
/// every maneuver together with the distance to the next one.
///
/// Two turns in the same direction separated by a very short segment become a single U-turn.
pub fn add_turn_info_to_route(route: &mut [RouteSegment], options: &TurnOptions) {
    let mut prev_segment: Option<usize> = None;
    let mut dist = 0.0;
    let mut i = 0;

    while i <= route.len() {
        let mut next = i + 1;
        let mut turn = None;

        if i < route.len() {
            turn = get_turn_info(route, i, options);
            if let Some(t) = turn.as_mut() {
                let merged = match t.turn_type {
                    TurnType::TurnLeft => Some(TurnType::UTurn),
                    TurnType::TurnRight => Some(TurnType::RightUTurn),
                    _ => None,
                };
                if let Some(merged) = merged {
                    if i + 1 < route.len() && route[i].distance < U_TURN_MERGE_DISTANCE {
                        let same_again = get_turn_info(route, i + 1, options)
                            .is_some_and(|n| n.turn_type == t.turn_type);
                        if same_again {
                            *t = TurnInfo::new(merged);
                            next = i + 2;
                        }
                    }
                }
            }
            route[i].turn = turn.clone();
        }

        if turn.is_some() || i == route.len() {
            if let Some(p) = prev_segment {
                route[p].description = describe(route[p].turn.as_ref(), dist);
            }
            prev_segment = Some(i);
            dist = 0.0;
        }

        let end = next.min(route.len());
        if i < end {
            dist += route[i..end].iter().map(|s| s.distance).sum::<f64>();
        }
        i = next;
    }
}

fn describe(turn: Option<&TurnInfo>, dist: f64) -> String {
    let Some(turn) = turn else {
        return String::default();
    };

    let mut s = turn.to_string();
    if !turn.lanes.is_empty() {
        s.push('{');
        for lane in &turn.lanes {
            s.push_str(&format!("{} ", lane));
        }
        s.push_str("} ");
    }
    s.push_str(&format!(" and go {:.2} meters", dist));

    if turn.skip_to_speak {
        s.insert_str(0, "-*");
    }
    return s;
}
