// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

use std::collections::BTreeSet;
use std::fmt::Write;

use super::context::ParameterContext;
use super::registry::TagRegistry;
use super::types::TypeSet;
use super::value::{parse_value, ValueType};

/// Source of a value used in a rule's [Expression] or as the rule's result.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// A constant, pre-parsed at construction. `None` if the literal could not be parsed.
    Literal(Option<f64>),

    /// `$tag` - value of the provided tag on the evaluated road.
    Tag(String),

    /// `:param` - value of a routing parameter.
    Param(String),

    /// `:incline` - incline (in percent) of the currently evaluated road stretch.
    Incline,
}

impl Operand {
    pub fn parse(s: &str, value_type: ValueType) -> Self {
        if let Some(tag) = s.strip_prefix('$') {
            Self::Tag(tag.to_string())
        } else if s == ":incline" {
            Self::Incline
        } else if let Some(param) = s.strip_prefix(':') {
            Self::Param(param.to_string())
        } else {
            Self::Literal(parse_value(s, value_type))
        }
    }

    /// Resolves the operand against a road's types, returning `None` if it's missing.
    pub fn resolve(
        &self,
        value_type: ValueType,
        types: &TypeSet,
        params: &ParameterContext,
        registry: &mut TagRegistry,
    ) -> Option<f64> {
        match self {
            Self::Literal(v) => *v,
            Self::Tag(tag) => {
                let id = registry.find_tag(tag, types)?;
                registry.parse_tag_value(id, value_type)
            }
            Self::Param(name) => params
                .vars
                .get(name)
                .and_then(|v| parse_value(v, value_type)),
            Self::Incline => params.incline,
        }
    }
}

impl std::fmt::Display for Operand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Literal(Some(v)) => write!(f, "{}", v),
            Self::Literal(None) => f.write_str("?"),
            Self::Tag(t) => write!(f, "${}", t),
            Self::Param(p) => write!(f, ":{}", p),
            Self::Incline => f.write_str(":incline"),
        }
    }
}

/// Relation checked by an [Expression].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    /// `value1 <= value2`
    LessOrEqual,

    /// `value1 >= value2`
    GreaterOrEqual,

    /// `value1 == value2`
    Equal,
}

/// A relational test between two [Operands](Operand).
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    pub left: Operand,
    pub right: Operand,
    pub comparison: Comparison,
    pub value_type: ValueType,
}

impl Expression {
    pub fn new(left: &str, right: &str, comparison: Comparison, value_type: ValueType) -> Self {
        Self {
            left: Operand::parse(left, value_type),
            right: Operand::parse(right, value_type),
            comparison,
            value_type,
        }
    }

    /// Checks the expression. Expressions with a missing operand never match.
    pub fn matches(
        &self,
        types: &TypeSet,
        params: &ParameterContext,
        registry: &mut TagRegistry,
    ) -> bool {
        let Some(f1) = self.left.resolve(self.value_type, types, params, registry) else {
            return false;
        };
        let Some(f2) = self.right.resolve(self.value_type, types, params, registry) else {
            return false;
        };

        match self.comparison {
            Comparison::LessOrEqual => f1 <= f2,
            Comparison::GreaterOrEqual => f1 >= f2,
            Comparison::Equal => f1 == f2,
        }
    }
}

/// Requirement for a routing parameter to be set (or, if `negated`, to be unset).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamCondition {
    pub name: String,
    pub negated: bool,
}

impl ParamCondition {
    /// Parses `name` or `-name` (negated).
    pub fn parse(s: &str) -> Self {
        match s.strip_prefix('-') {
            Some(name) => Self {
                name: name.to_string(),
                negated: true,
            },
            None => Self {
                name: s.to_string(),
                negated: false,
            },
        }
    }

    pub fn is_satisfied(&self, params: &ParameterContext) -> bool {
        params.vars.contains_key(&self.name) != self.negated
    }
}

/// One conditional branch of a [RouteAttributeContext](super::RouteAttributeContext).
///
/// A rule matches a [TypeSet] if all of the following hold, checked in order:
/// 1. every id from `filter_types` is present,
/// 2. no id from `filter_not_types` is present,
/// 3. every tag name from `only_tags` is present (with any value),
/// 4. no tag name from `only_not_tags` is present,
/// 5. every [Expression] holds.
///
/// Parameter conditions are not checked during matching - rules with unsatisfied
/// parameter conditions are removed when a router is [built](super::GeneralRouter::build)
/// for a concrete set of parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct EvalRule {
    select: Operand,
    select_type: ValueType,
    parameters: Vec<ParamCondition>,
    filter_types: TypeSet,
    filter_not_types: TypeSet,
    only_tags: BTreeSet<String>,
    only_not_tags: BTreeSet<String>,
    expressions: Vec<Expression>,
}

impl EvalRule {
    /// Creates a rule producing `select_value` - a literal, `$tag` or `:param`.
    pub fn new(select_value: &str, select_type: ValueType) -> Self {
        Self {
            select: Operand::parse(select_value, select_type),
            select_type,
            parameters: Vec::default(),
            filter_types: TypeSet::default(),
            filter_not_types: TypeSet::default(),
            only_tags: BTreeSet::default(),
            only_not_tags: BTreeSet::default(),
            expressions: Vec::default(),
        }
    }

    /// Requires the road to have (or, if `negated`, not to have) the provided tag.
    /// An empty `value` matches any value of the tag.
    pub fn register_and_tag_value_condition(
        &mut self,
        registry: &mut TagRegistry,
        tag: &str,
        value: &str,
        negated: bool,
    ) {
        if value.is_empty() {
            if negated {
                self.only_not_tags.insert(tag.to_string());
            } else {
                self.only_tags.insert(tag.to_string());
            }
        } else {
            let id = registry.register(tag, value);
            if negated {
                self.filter_not_types.insert(id);
            } else {
                self.filter_types.insert(id);
            }
        }
    }

    /// Requires the routing parameter to be set (or, if `negated`, unset).
    pub fn register_and_param_condition(&mut self, name: &str, negated: bool) {
        self.parameters.push(ParamCondition {
            name: name.to_string(),
            negated,
        });
    }

    /// Adds parameter conditions formatted as `param` or `-param`.
    pub fn register_param_conditions<S: AsRef<str>>(&mut self, params: &[S]) {
        self.parameters
            .extend(params.iter().map(|p| ParamCondition::parse(p.as_ref())));
    }

    pub fn register_expression(&mut self, expression: Expression) {
        self.expressions.push(expression);
    }

    /// Requires `value1 <= value2`.
    pub fn register_less_condition(&mut self, value1: &str, value2: &str, value_type: ValueType) {
        self.register_expression(Expression::new(
            value1,
            value2,
            Comparison::LessOrEqual,
            value_type,
        ));
    }

    /// Requires `value1 >= value2`.
    pub fn register_greater_condition(&mut self, value1: &str, value2: &str, value_type: ValueType) {
        self.register_expression(Expression::new(
            value1,
            value2,
            Comparison::GreaterOrEqual,
            value_type,
        ));
    }

    /// Requires `value1 == value2`.
    pub fn register_equal_condition(&mut self, value1: &str, value2: &str, value_type: ValueType) {
        self.register_expression(Expression::new(
            value1,
            value2,
            Comparison::Equal,
            value_type,
        ));
    }

    pub fn parameters(&self) -> &[ParamCondition] {
        &self.parameters
    }

    /// Checks whether all parameter conditions are satisfied by the provided parameters.
    pub fn check_parameters(&self, params: &ParameterContext) -> bool {
        self.parameters.iter().all(|p| p.is_satisfied(params))
    }

    pub fn matches(
        &self,
        types: &TypeSet,
        params: &ParameterContext,
        registry: &mut TagRegistry,
    ) -> bool {
        if !self.filter_types.is_subset(types) {
            return false;
        }
        if self.filter_not_types.intersects(types) {
            return false;
        }
        if !self.only_tags.iter().all(|t| registry.has_tag(t, types)) {
            return false;
        }
        if self.only_not_tags.iter().any(|t| registry.has_tag(t, types)) {
            return false;
        }
        self.expressions
            .iter()
            .all(|e| e.matches(types, params, registry))
    }

    /// Returns the rule's value if it matches, `None` otherwise.
    pub fn eval(
        &self,
        types: &TypeSet,
        params: &ParameterContext,
        registry: &mut TagRegistry,
    ) -> Option<f64> {
        if self.matches(types, params, registry) {
            self.calc_select_value(types, params, registry)
        } else {
            None
        }
    }

    pub fn calc_select_value(
        &self,
        types: &TypeSet,
        params: &ParameterContext,
        registry: &mut TagRegistry,
    ) -> Option<f64> {
        self.select
            .resolve(self.select_type, types, params, registry)
    }

    /// Human-readable summary of the rule, with interned ids resolved through `registry`.
    pub fn describe(&self, registry: &TagRegistry) -> String {
        let mut s = format!("Select {}", self.select);

        let list_types = |label: &str, set: &TypeSet, s: &mut String| {
            let names: Vec<String> = set
                .iter()
                .filter_map(|id| registry.tag_value(id))
                .map(|tv| format!("{}/{}", tv.tag, tv.value))
                .collect();
            if !names.is_empty() {
                _ = write!(s, " {} {}", label, names.join(" "));
            }
        };
        list_types("if", &self.filter_types, &mut s);
        list_types("ifnot", &self.filter_not_types, &mut s);

        for p in &self.parameters {
            _ = write!(s, " param={}{}", if p.negated { "-" } else { "" }, p.name);
        }
        if !self.only_tags.is_empty() {
            _ = write!(s, " match tag = {:?}", self.only_tags);
        }
        if !self.only_not_tags.is_empty() {
            _ = write!(s, " not match tag = {:?}", self.only_not_tags);
        }
        if !self.expressions.is_empty() {
            _ = write!(s, " subexpressions {}", self.expressions.len());
        }
        s
    }
}
