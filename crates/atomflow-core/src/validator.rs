//! The plan validation pipeline.
//!
//! Five checks run unconditionally over every plan, in order:
//!
//! 1. syntax - plan identifiers, non-empty node list, unique node ids
//! 2. registry - referenced primitives exist and are usable
//! 3. interface - node inputs type-check against primitive interfaces
//! 4. dependencies - edges name real nodes and form a DAG
//! 5. policy - business rules and safety heuristics (warnings only)
//!
//! Plan problems never surface as errors from [`PlanValidator::validate`];
//! everything becomes a [`Violation`] on the report. Violations appear in
//! check order, and within a check in plan traversal order.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::diagnostics::{Severity, ValidationReport, Violation};
use crate::model::plan::{Plan, RiskLevel};
use crate::model::primitive::PrimitiveStatus;
use crate::policy::PolicyEngine;
use crate::registry::PrimitiveRegistry;

/// Validates plans against a primitive registry.
pub struct PlanValidator {
    registry: Arc<PrimitiveRegistry>,
    policy: PolicyEngine,
}

impl PlanValidator {
    pub fn new(registry: Arc<PrimitiveRegistry>) -> Self {
        Self {
            registry,
            policy: PolicyEngine::new(),
        }
    }

    pub fn with_policy(registry: Arc<PrimitiveRegistry>, policy: PolicyEngine) -> Self {
        Self { registry, policy }
    }

    pub fn policy(&self) -> &PolicyEngine {
        &self.policy
    }

    pub fn policy_mut(&mut self) -> &mut PolicyEngine {
        &mut self.policy
    }

    /// Run the full pipeline and produce a report.
    pub fn validate(&self, plan: &Plan) -> ValidationReport {
        let mut violations = Vec::new();
        self.check_syntax(plan, &mut violations);
        self.check_registry(plan, &mut violations);
        self.check_interface(plan, &mut violations);
        self.check_dependencies(plan, &mut violations);

        let mut warnings = Vec::new();
        self.check_policy(plan, &mut warnings);

        ValidationReport::new(violations, warnings)
    }

    fn check_syntax(&self, plan: &Plan, violations: &mut Vec<Violation>) {
        if plan.metadata.id.is_empty() {
            violations.push(Violation::error("MISSING_PLAN_ID", "Plan must have an ID"));
        }
        if plan.metadata.name.is_empty() {
            violations.push(Violation::error("MISSING_PLAN_NAME", "Plan must have a name"));
        }
        if plan.nodes.is_empty() {
            violations.push(Violation::error(
                "EMPTY_PLAN",
                "Plan must have at least one node",
            ));
        }

        let mut seen = HashSet::new();
        for node in &plan.nodes {
            if !seen.insert(node.id.as_str()) {
                violations.push(
                    Violation::error(
                        "DUPLICATE_NODE_ID",
                        format!("Duplicate node ID: {}", node.id),
                    )
                    .with_node(&node.id),
                );
            }
        }
    }

    fn check_registry(&self, plan: &Plan, violations: &mut Vec<Violation>) {
        for node in &plan.nodes {
            let Some(primitive_id) = &node.primitive_id else {
                if node.fallback.is_none() {
                    violations.push(
                        Violation::error(
                            "NO_PRIMITIVE_OR_FALLBACK",
                            "Node must have primitive_id or fallback",
                        )
                        .with_node(&node.id),
                    );
                } else if !plan.settings.allow_fallback {
                    violations.push(
                        Violation::error(
                            "FALLBACK_NOT_ALLOWED",
                            "Code fallback used but allow_fallback is false",
                        )
                        .with_node(&node.id),
                    );
                }
                continue;
            };

            // A load failure of any kind reads as "not found" here; the
            // report stays the single channel for plan problems.
            let Ok(primitive) = self.registry.get(primitive_id) else {
                violations.push(
                    Violation::error(
                        "PRIMITIVE_NOT_FOUND",
                        format!("Primitive not found: {primitive_id}"),
                    )
                    .with_node(&node.id),
                );
                continue;
            };

            match primitive.metadata.status {
                PrimitiveStatus::Deprecated => violations.push(
                    Violation::error(
                        "PRIMITIVE_DEPRECATED",
                        format!("Primitive is deprecated: {primitive_id}"),
                    )
                    .with_node(&node.id),
                ),
                PrimitiveStatus::Draft => violations.push(
                    Violation::error(
                        "PRIMITIVE_DRAFT",
                        format!("Cannot use draft primitive in production: {primitive_id}"),
                    )
                    .with_node(&node.id),
                ),
                PrimitiveStatus::Stable => {}
            }
        }
    }

    fn check_interface(&self, plan: &Plan, violations: &mut Vec<Violation>) {
        for node in &plan.nodes {
            let Some(primitive_id) = &node.primitive_id else {
                continue;
            };
            // Nodes whose primitive failed to resolve were already reported.
            let Ok(messages) = self.registry.validate_inputs(primitive_id, &node.inputs) else {
                continue;
            };
            for message in messages {
                violations
                    .push(Violation::error("INTERFACE_VIOLATION", message).with_node(&node.id));
            }
        }
    }

    fn check_dependencies(&self, plan: &Plan, violations: &mut Vec<Violation>) {
        let node_ids: HashSet<&str> = plan.nodes.iter().map(|n| n.id.as_str()).collect();
        for edge in &plan.edges {
            if !node_ids.contains(edge.from_node.as_str()) {
                violations.push(Violation::error(
                    "INVALID_EDGE_SOURCE",
                    format!("Edge references non-existent node: {}", edge.from_node),
                ));
            }
            if !node_ids.contains(edge.to_node.as_str()) {
                violations.push(Violation::error(
                    "INVALID_EDGE_TARGET",
                    format!("Edge references non-existent node: {}", edge.to_node),
                ));
            }
        }

        if has_cycle(plan) {
            violations.push(Violation::error(
                "CIRCULAR_DEPENDENCY",
                "Plan contains circular dependencies",
            ));
        }
    }

    fn check_policy(&self, plan: &Plan, warnings: &mut Vec<Violation>) {
        // Policy findings never block compilation: whatever severity a rule
        // declares, it lands on the report as a warning.
        for violation in self.policy.evaluate(plan) {
            warnings.push(Violation {
                level: Severity::Warning,
                ..violation
            });
        }

        let fallback_count = plan.fallback_count();
        if fallback_count > 0 {
            warnings.push(Violation::warning(
                "FALLBACK_USED",
                format!("Plan uses {fallback_count} code fallback(s) - requires review"),
            ));
        }

        for node in &plan.nodes {
            if let Some(fallback) = &node.fallback {
                if fallback.code.contains("eval(") || fallback.code.contains("exec(") {
                    warnings.push(
                        Violation::warning(
                            "UNSAFE_CODE",
                            "Fallback code contains potentially unsafe constructs",
                        )
                        .with_node(&node.id),
                    );
                }
            }
        }

        if plan.settings.risk_level == RiskLevel::High {
            warnings.push(Violation::warning(
                "HIGH_RISK_PLAN",
                "Plan is marked as high-risk - ensure proper approval",
            ));
        }
    }
}

/// Cycle detection over the edge relation.
///
/// Iterative depth-first search with an explicit frame stack; `on_stack`
/// marks the current path, so any edge back into it is a cycle. Reports a
/// boolean only - the validator emits one violation per plan no matter how
/// many cycles exist.
fn has_cycle(plan: &Plan) -> bool {
    let mut adjacency: HashMap<&str, Vec<&str>> = plan
        .nodes
        .iter()
        .map(|node| (node.id.as_str(), Vec::new()))
        .collect();
    for edge in &plan.edges {
        if let Some(next) = adjacency.get_mut(edge.from_node.as_str()) {
            next.push(edge.to_node.as_str());
        }
    }

    let mut visited: HashSet<&str> = HashSet::new();
    let mut on_stack: HashSet<&str> = HashSet::new();

    for node in &plan.nodes {
        let start = node.id.as_str();
        if visited.contains(start) {
            continue;
        }
        visited.insert(start);
        on_stack.insert(start);
        let mut stack: Vec<(&str, usize)> = vec![(start, 0)];

        while let Some(frame) = stack.last_mut() {
            let (current, child_index) = (frame.0, &mut frame.1);
            let next = adjacency
                .get(current)
                .and_then(|children| children.get(*child_index).copied());
            match next {
                Some(child) => {
                    *child_index += 1;
                    if on_stack.contains(child) {
                        return true;
                    }
                    if !visited.contains(child) {
                        visited.insert(child);
                        on_stack.insert(child);
                        stack.push((child, 0));
                    }
                }
                None => {
                    on_stack.remove(current);
                    stack.pop();
                }
            }
        }
    }

    false
}
