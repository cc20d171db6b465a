// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

/// Semantic attributes evaluated by a [GeneralRouter](super::GeneralRouter),
/// each backed by its own [RouteAttributeContext](super::RouteAttributeContext).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteDataObjectAttribute {
    /// Road speed, in m/s.
    RoadSpeed,

    /// Multiplier of the road speed used for choosing roads.
    RoadPriorities,

    /// Non-negative values allow using the road.
    Access,

    /// Extra time (in seconds) spent passing a road point.
    Obstacles,

    /// Extra cost of passing a road point, used only for choosing roads.
    RoutingObstacles,

    /// +1 for one-way roads, -1 for reversed one-way roads and 0 for two-way roads.
    Oneway,

    /// Cost of switching between roads with different values.
    PenaltyTransition,

    /// Time penalty per meter of climb, depending on the incline.
    ObstacleSrtmAltSpeed,

    /// 1 for area features.
    Area,
}

impl RouteDataObjectAttribute {
    /// Number of attributes.
    pub const COUNT: usize = 9;

    pub const ALL: [Self; Self::COUNT] = [
        Self::RoadSpeed,
        Self::RoadPriorities,
        Self::Access,
        Self::Obstacles,
        Self::RoutingObstacles,
        Self::Oneway,
        Self::PenaltyTransition,
        Self::ObstacleSrtmAltSpeed,
        Self::Area,
    ];

    pub fn index(&self) -> usize {
        *self as usize
    }

    /// Name of the attribute, as used by `<point attribute="...">` and `<way attribute="...">`.
    pub fn name(&self) -> &'static str {
        match self {
            Self::RoadSpeed => "speed",
            Self::RoadPriorities => "priority",
            Self::Access => "access",
            Self::Obstacles => "obstacle_time",
            Self::RoutingObstacles => "obstacle",
            Self::Oneway => "oneway",
            Self::PenaltyTransition => "penalty_transition",
            Self::ObstacleSrtmAltSpeed => "obstacle_srtm_alt_speed",
            Self::Area => "area",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().find(|a| a.name() == name).cloned()
    }
}

impl std::fmt::Display for RouteDataObjectAttribute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Base kind of vehicle a routing profile is built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum GeneralRouterProfile {
    #[default]
    Car,
    Pedestrian,
    Bicycle,
}

impl GeneralRouterProfile {
    /// Parses a `baseProfile` attribute, case-insensitively.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "car" => Some(Self::Car),
            "pedestrian" => Some(Self::Pedestrian),
            "bicycle" => Some(Self::Bicycle),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoutingParameterType {
    Numeric,
    Boolean,
    Symbolic,
}

/// User-facing switch or value declared by a routing profile,
/// e.g. "avoid toll roads" or "vehicle weight".
#[derive(Debug, Clone, PartialEq)]
pub struct RoutingParameter {
    pub id: String,
    pub group: String,
    pub name: String,
    pub description: String,
    pub type_: RoutingParameterType,
    pub possible_values: Vec<f64>,
    pub possible_value_descriptions: Vec<String>,
    pub default_boolean: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attribute_names_round_trip() {
        for (idx, attr) in RouteDataObjectAttribute::ALL.iter().enumerate() {
            assert_eq!(attr.index(), idx);
            assert_eq!(RouteDataObjectAttribute::from_name(attr.name()), Some(*attr));
        }
        assert_eq!(RouteDataObjectAttribute::from_name("unknown"), None);
    }

    #[test]
    fn profile_names() {
        assert_eq!(GeneralRouterProfile::from_name("Bicycle"), Some(GeneralRouterProfile::Bicycle));
        assert_eq!(GeneralRouterProfile::from_name("boat"), None);
    }
}
