//! Business-rule evaluation for plans.
//!
//! Rules are named predicates over a whole plan. The engine ships four
//! built-ins and accepts custom rules at runtime; the validator files every
//! engine finding as a warning regardless of the severity a rule declares.

use serde::Serialize;
use std::panic::{AssertUnwindSafe, catch_unwind};

use crate::diagnostics::{Severity, Violation};
use crate::model::plan::{Plan, RiskLevel};

type PolicyPredicate = Box<dyn Fn(&Plan) -> bool + Send + Sync>;

/// A single policy rule: the predicate returns `true` when the plan passes.
pub struct PolicyRule {
    pub name: String,
    pub description: String,
    pub severity: Severity,
    pub message: String,
    predicate: PolicyPredicate,
}

impl PolicyRule {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        severity: Severity,
        message: impl Into<String>,
        predicate: impl Fn(&Plan) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            severity,
            message: message.into(),
            predicate: Box::new(predicate),
        }
    }
}

/// Metadata view of a registered rule.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleInfo {
    pub name: String,
    pub description: String,
    pub severity: Severity,
}

/// Registry of policy rules.
pub struct PolicyEngine {
    rules: Vec<PolicyRule>,
}

impl PolicyEngine {
    /// Engine pre-populated with the built-in rules.
    pub fn new() -> Self {
        let mut engine = Self::empty();
        engine.register_default_rules();
        engine
    }

    /// Engine with no rules registered.
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    fn register_default_rules(&mut self) {
        self.add_rule(PolicyRule::new(
            "max_nodes",
            "Plan should not exceed 50 nodes",
            Severity::Warning,
            "Plan has more than 50 nodes - consider breaking into sub-plans",
            |plan| plan.nodes.len() <= 50,
        ));
        self.add_rule(PolicyRule::new(
            "fallback_limit",
            "Limit code fallbacks to 3 per plan",
            Severity::Error,
            "Too many code fallbacks - create primitives instead",
            |plan| plan.fallback_count() <= 3,
        ));
        self.add_rule(PolicyRule::new(
            "no_high_risk_fallback",
            "No code fallback in high-risk plans",
            Severity::Error,
            "Code fallback not allowed in high-risk plans",
            |plan| !(plan.settings.risk_level == RiskLevel::High && plan.fallback_count() > 0),
        ));
        self.add_rule(PolicyRule::new(
            "trigger_required",
            "Production plans should have a trigger",
            Severity::Warning,
            "Plan has no trigger defined",
            |plan| plan.trigger.is_some() || plan.metadata.id.starts_with("test-"),
        ));
    }

    pub fn add_rule(&mut self, rule: PolicyRule) {
        self.rules.push(rule);
    }

    /// Remove a rule by name; true when something was removed.
    pub fn remove_rule(&mut self, name: &str) -> bool {
        let before = self.rules.len();
        self.rules.retain(|rule| rule.name != name);
        self.rules.len() < before
    }

    /// Metadata for every registered rule, in registration order.
    pub fn rules(&self) -> Vec<RuleInfo> {
        self.rules
            .iter()
            .map(|rule| RuleInfo {
                name: rule.name.clone(),
                description: rule.description.clone(),
                severity: rule.severity,
            })
            .collect()
    }

    /// Run every rule against a plan.
    ///
    /// Failing predicates produce `POLICY_<NAME>` violations with the rule's
    /// declared severity. A panicking predicate is caught and reported as
    /// `POLICY_EVAL_ERROR` instead of tearing down the caller.
    pub fn evaluate(&self, plan: &Plan) -> Vec<Violation> {
        let mut violations = Vec::new();
        for rule in &self.rules {
            match catch_unwind(AssertUnwindSafe(|| (rule.predicate)(plan))) {
                Ok(true) => {}
                Ok(false) => {
                    let message = if rule.message.is_empty() {
                        rule.description.clone()
                    } else {
                        rule.message.clone()
                    };
                    violations.push(Violation {
                        level: rule.severity,
                        code: format!("POLICY_{}", rule.name.to_uppercase()),
                        message,
                        node_id: None,
                        field: None,
                    });
                }
                Err(_) => {
                    violations.push(Violation::error(
                        "POLICY_EVAL_ERROR",
                        format!("Failed to evaluate rule {}", rule.name),
                    ));
                }
            }
        }
        violations
    }
}

impl Default for PolicyEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::plan::{CodeBlock, FallbackLanguage, PlanMetadata, PlanNode, PlanSettings};
    use std::collections::BTreeMap;

    fn plan_with_nodes(count: usize) -> Plan {
        Plan {
            metadata: PlanMetadata {
                id: "p1".to_string(),
                name: "test".to_string(),
                version: "1.0.0".to_string(),
                description: None,
            },
            settings: PlanSettings::default(),
            trigger: None,
            nodes: (0..count)
                .map(|i| PlanNode {
                    id: format!("n{i}"),
                    primitive_id: None,
                    inputs: BTreeMap::new(),
                    fallback: None,
                })
                .collect(),
            edges: Vec::new(),
        }
    }

    fn with_fallbacks(mut plan: Plan, count: usize) -> Plan {
        for node in plan.nodes.iter_mut().take(count) {
            node.fallback =
                Some(CodeBlock::new(FallbackLanguage::Javascript, "return 1", "t").unwrap());
        }
        plan
    }

    #[test]
    fn test_default_rules_registered() {
        let engine = PolicyEngine::new();
        let names: Vec<String> = engine.rules().into_iter().map(|r| r.name).collect();
        assert_eq!(
            names,
            vec![
                "max_nodes",
                "fallback_limit",
                "no_high_risk_fallback",
                "trigger_required"
            ]
        );
    }

    #[test]
    fn test_max_nodes_rule_fires_above_fifty() {
        let engine = PolicyEngine::new();
        let violations = engine.evaluate(&plan_with_nodes(51));
        assert!(violations.iter().any(|v| v.code == "POLICY_MAX_NODES"));

        let violations = engine.evaluate(&plan_with_nodes(50));
        assert!(!violations.iter().any(|v| v.code == "POLICY_MAX_NODES"));
    }

    #[test]
    fn test_fallback_limit_rule() {
        let engine = PolicyEngine::new();
        let plan = with_fallbacks(plan_with_nodes(4), 4);
        let violations = engine.evaluate(&plan);
        let hit = violations
            .iter()
            .find(|v| v.code == "POLICY_FALLBACK_LIMIT")
            .expect("rule should fire");
        assert_eq!(hit.level, Severity::Error);
    }

    #[test]
    fn test_no_high_risk_fallback_rule() {
        let engine = PolicyEngine::new();
        let mut plan = with_fallbacks(plan_with_nodes(1), 1);
        plan.settings.risk_level = RiskLevel::High;
        let violations = engine.evaluate(&plan);
        assert!(
            violations
                .iter()
                .any(|v| v.code == "POLICY_NO_HIGH_RISK_FALLBACK")
        );
    }

    #[test]
    fn test_trigger_required_exempts_test_plans() {
        let engine = PolicyEngine::new();
        let mut plan = plan_with_nodes(1);
        let violations = engine.evaluate(&plan);
        assert!(
            violations
                .iter()
                .any(|v| v.code == "POLICY_TRIGGER_REQUIRED")
        );

        plan.metadata.id = "test-plan".to_string();
        let violations = engine.evaluate(&plan);
        assert!(
            !violations
                .iter()
                .any(|v| v.code == "POLICY_TRIGGER_REQUIRED")
        );
    }

    #[test]
    fn test_add_and_remove_rule() {
        let mut engine = PolicyEngine::new();
        engine.add_rule(PolicyRule::new(
            "no_empty_name",
            "Plan name must be set",
            Severity::Warning,
            "Plan name is empty",
            |plan| !plan.metadata.name.is_empty(),
        ));
        assert_eq!(engine.rules().len(), 5);

        assert!(engine.remove_rule("no_empty_name"));
        assert!(!engine.remove_rule("no_empty_name"));
        assert_eq!(engine.rules().len(), 4);
    }

    #[test]
    fn test_panicking_rule_reports_eval_error() {
        let mut engine = PolicyEngine::empty();
        engine.add_rule(PolicyRule::new(
            "explodes",
            "Always panics",
            Severity::Warning,
            "unreachable",
            |_plan| panic!("boom"),
        ));
        let violations = engine.evaluate(&plan_with_nodes(1));
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].code, "POLICY_EVAL_ERROR");
        assert!(violations[0].message.contains("explodes"));
    }

    #[test]
    fn test_empty_message_falls_back_to_description() {
        let mut engine = PolicyEngine::empty();
        engine.add_rule(PolicyRule::new(
            "always_fails",
            "The described reason",
            Severity::Info,
            "",
            |_plan| false,
        ));
        let violations = engine.evaluate(&plan_with_nodes(1));
        assert_eq!(violations[0].message, "The described reason");
        assert_eq!(violations[0].level, Severity::Info);
    }
}
