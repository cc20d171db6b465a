// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

//! Syntax tree of a routing configuration file, before rules are compiled
//! into a [GeneralRouter](crate::router::GeneralRouter).

use crate::router::{RouteDataObjectAttribute, RoutingParameter};

/// Contents of an `<osmand_routing_config>` document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    /// `defaultProfile` attribute of the root element.
    pub default_profile: String,

    /// `<attribute>` elements outside of any `<routingProfile>`.
    pub attributes: Vec<(String, String)>,

    pub profiles: Vec<Profile>,
}

/// A `<routingProfile>` element.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Profile {
    pub name: String,
    pub base_profile: String,

    /// All attributes of the `<routingProfile>` element itself, followed by
    /// nested `<attribute>` elements, in document order.
    pub attributes: Vec<(String, String)>,

    pub parameters: Vec<RoutingParameter>,

    /// `<point>` and `<way>` blocks.
    pub blocks: Vec<AttributeBlock>,
}

/// A `<point>` or `<way>` element, grouping rules of a single attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeBlock {
    pub attribute: RouteDataObjectAttribute,

    /// Default `type` of nested rule elements.
    pub value_type: String,

    pub rules: Vec<RuleNode>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    Select,
    If,
    IfNot,
    Gt,
    Le,
    Eq,
}

impl RuleKind {
    pub fn from_tag(tag: &[u8]) -> Option<Self> {
        match tag {
            b"select" => Some(Self::Select),
            b"if" => Some(Self::If),
            b"ifnot" => Some(Self::IfNot),
            b"gt" => Some(Self::Gt),
            b"le" => Some(Self::Le),
            b"eq" => Some(Self::Eq),
            _ => None,
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Self::Select => "select",
            Self::If => "if",
            Self::IfNot => "ifnot",
            Self::Gt => "gt",
            Self::Le => "le",
            Self::Eq => "eq",
        }
    }
}

/// A `<select>`, `<if>`, `<ifnot>`, `<gt>`, `<le>` or `<eq>` element.
/// Missing attributes are represented by empty strings.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleNode {
    pub kind: RuleKind,
    pub t: String,
    pub v: String,
    pub param: String,
    pub value1: String,
    pub value2: String,
    pub value_type: String,

    /// Selected value - only meaningful for [RuleKind::Select].
    pub value: String,

    pub children: Vec<RuleNode>,
}

impl RuleNode {
    pub fn new(kind: RuleKind) -> Self {
        Self {
            kind,
            t: String::default(),
            v: String::default(),
            param: String::default(),
            value1: String::default(),
            value2: String::default(),
            value_type: String::default(),
            value: String::default(),
            children: Vec::default(),
        }
    }
}
