// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

use super::ast::{AttributeBlock, Profile, RuleKind, RuleNode};
use crate::router::{EvalRule, GeneralRouter, GeneralRouterProfile, TagRegistry, ValueType};

/// Builds a [GeneralRouter] out of a parsed `<routingProfile>`.
pub(super) fn compile_profile(profile: &Profile) -> GeneralRouter {
    let base = GeneralRouterProfile::from_name(&profile.base_profile).unwrap_or_default();
    let mut router = GeneralRouter::new(
        base,
        profile
            .attributes
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str())),
    );

    for parameter in &profile.parameters {
        router.register_parameter(parameter.clone());
    }

    for block in &profile.blocks {
        let mut rules = Vec::default();
        let mut ancestors = Vec::default();
        for node in &block.rules {
            compile_node(node, block, &mut ancestors, &mut rules, router.registry_mut());
        }
        for rule in rules {
            router.add_rule(block.attribute, rule);
        }
    }

    return router;
}

/// Compiles a rule element and its descendants.
///
/// Every `<select>` creates a new rule with its own condition and the conditions of all
/// enclosing elements. A condition element directly inside a `<select>` adds to the most
/// recently created rule.
fn compile_node<'a>(
    node: &'a RuleNode,
    block: &AttributeBlock,
    ancestors: &mut Vec<&'a RuleNode>,
    rules: &mut Vec<EvalRule>,
    registry: &mut TagRegistry,
) {
    if node.kind == RuleKind::Select {
        let mut rule = EvalRule::new(&node.value, value_type(node, block));
        add_condition(&mut rule, node, block, registry);
        for ancestor in ancestors.iter() {
            add_condition(&mut rule, ancestor, block, registry);
        }
        rules.push(rule);
    } else if ancestors.last().map(|a| a.kind) == Some(RuleKind::Select) {
        if let Some(rule) = rules.last_mut() {
            add_condition(rule, node, block, registry);
        }
    }

    ancestors.push(node);
    for child in &node.children {
        compile_node(child, block, ancestors, rules, registry);
    }
    ancestors.pop();
}

fn add_condition(rule: &mut EvalRule, node: &RuleNode, block: &AttributeBlock, registry: &mut TagRegistry) {
    let negated = node.kind == RuleKind::IfNot;
    if !node.param.is_empty() {
        rule.register_and_param_condition(&node.param, negated);
    }
    if !node.t.is_empty() {
        rule.register_and_tag_value_condition(registry, &node.t, &node.v, negated);
    }

    let value_type = value_type(node, block);
    match node.kind {
        RuleKind::Gt => rule.register_greater_condition(&node.value1, &node.value2, value_type),
        RuleKind::Le => rule.register_less_condition(&node.value1, &node.value2, value_type),
        RuleKind::Eq => rule.register_equal_condition(&node.value1, &node.value2, value_type),
        _ => {}
    }
}

/// Type of a rule element, inherited from the enclosing block if not set.
fn value_type(node: &RuleNode, block: &AttributeBlock) -> ValueType {
    if node.value_type.is_empty() {
        ValueType::from_name(&block.value_type)
    } else {
        ValueType::from_name(&node.value_type)
    }
}
