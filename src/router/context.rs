// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

use std::collections::HashMap;

use super::registry::TagRegistry;
use super::rule::EvalRule;
use super::types::TypeSet;
use super::value::ValueType;

/// Values bound to `:name` operands of a [RouteAttributeContext].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterContext {
    /// Routing parameters, as provided by the user.
    pub vars: HashMap<String, String>,

    /// Incline (in percent, signed by climb direction) of the road stretch
    /// currently being evaluated, bound to `:incline`.
    pub incline: Option<f64>,
}

impl ParameterContext {
    pub fn new(vars: HashMap<String, String>) -> Self {
        Self {
            vars,
            incline: None,
        }
    }
}

/// Ordered list of [EvalRules](EvalRule) computing a single
/// [RouteDataObjectAttribute](super::RouteDataObjectAttribute).
///
/// Evaluation returns the value of the first rule which matches and produces a value.
#[derive(Debug, Clone, Default)]
pub struct RouteAttributeContext {
    rules: Vec<EvalRule>,
    pub params: ParameterContext,
}

impl RouteAttributeContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a copy of `parent` bound to the provided parameters.
    /// Rules with parameter conditions not satisfied by `params` are dropped.
    pub fn derive(parent: &RouteAttributeContext, params: ParameterContext) -> Self {
        let rules = parent
            .rules
            .iter()
            .filter(|r| r.check_parameters(&params))
            .cloned()
            .collect();
        Self { rules, params }
    }

    pub fn rules(&self) -> &[EvalRule] {
        &self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Appends a new rule and returns it for registering conditions.
    pub fn new_rule(&mut self, select_value: &str, select_type: ValueType) -> &mut EvalRule {
        self.rules.push(EvalRule::new(select_value, select_type));
        let last = self.rules.len() - 1;
        &mut self.rules[last]
    }

    pub fn last_rule_mut(&mut self) -> Option<&mut EvalRule> {
        self.rules.last_mut()
    }

    pub fn add_rule(&mut self, rule: EvalRule) {
        self.rules.push(rule);
    }

    /// Returns the value of the first rule matching `types`, or `None` if no rule applies.
    pub fn evaluate(&self, types: &TypeSet, registry: &mut TagRegistry) -> Option<f64> {
        self.rules
            .iter()
            .find_map(|r| r.eval(types, &self.params, registry))
    }

    pub fn evaluate_or(&self, types: &TypeSet, registry: &mut TagRegistry, default: f64) -> f64 {
        self.evaluate(types, registry).unwrap_or(default)
    }
}
