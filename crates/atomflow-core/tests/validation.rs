//! Validation pipeline scenarios over the fixture registry.

mod common;

use std::sync::Arc;

use atomflow_core::{Plan, PlanValidator, PrimitiveRegistry, Severity};

fn validator() -> (tempfile::TempDir, PlanValidator) {
    let dir = common::fixture_registry();
    let registry =
        Arc::new(PrimitiveRegistry::new(Some(dir.path().to_path_buf())).expect("open registry"));
    (dir, PlanValidator::new(registry))
}

fn plan(yaml: &str) -> Plan {
    Plan::from_yaml_str(yaml).expect("fixture plan parses")
}

fn error_codes(report: &atomflow_core::ValidationReport) -> Vec<&str> {
    report.violations.iter().map(|v| v.code.as_str()).collect()
}

#[test]
fn test_happy_path_is_valid() {
    let (_dir, validator) = validator();
    let report = validator.validate(&plan(
        r#"
metadata: {id: p1, name: Hello}
trigger: {type: manual}
nodes:
  - id: log_it
    primitive_id: P010
    inputs: {level: info, message: hi}
edges: []
"#,
    ));
    assert!(report.valid, "unexpected violations: {:?}", report.violations);
    assert!(report.violations.is_empty());
}

#[test]
fn test_unknown_primitive_reported_once() {
    let (_dir, validator) = validator();
    let report = validator.validate(&plan(
        r#"
metadata: {id: p1, name: Unknown}
nodes:
  - id: mystery
    primitive_id: P999
    inputs: {anything: 1}
"#,
    ));
    assert!(!report.valid);
    let not_found = report.find("PRIMITIVE_NOT_FOUND").expect("reported");
    assert_eq!(not_found.node_id.as_deref(), Some("mystery"));
    // the interface check skips nodes whose primitive did not resolve
    assert_eq!(report.count("INTERFACE_VIOLATION"), 0);
}

#[test]
fn test_missing_required_input() {
    let (_dir, validator) = validator();
    let report = validator.validate(&plan(
        r#"
metadata: {id: p1, name: Fetch}
nodes:
  - id: fetch
    primitive_id: P001
    inputs: {method: GET}
"#,
    ));
    assert!(!report.valid);
    let violation = report.find("INTERFACE_VIOLATION").expect("reported");
    assert!(violation.message.contains("url"));
    assert_eq!(violation.node_id.as_deref(), Some("fetch"));
}

#[test]
fn test_cycle_reported_exactly_once() {
    let (_dir, validator) = validator();
    let report = validator.validate(&plan(
        r#"
metadata: {id: p1, name: Cycle}
nodes:
  - id: a
    primitive_id: P001
    inputs: {url: "https://example.com", method: GET}
  - id: b
    primitive_id: P001
    inputs: {url: "https://example.com", method: GET}
  - id: c
    primitive_id: P001
    inputs: {url: "https://example.com", method: GET}
edges:
  - {from_node: a, to_node: b}
  - {from_node: b, to_node: c}
  - {from_node: c, to_node: a}
"#,
    ));
    assert!(!report.valid);
    assert_eq!(report.count("CIRCULAR_DEPENDENCY"), 1);
}

#[test]
fn test_fallback_gated_by_settings() {
    let blocked = r#"
metadata: {id: p1, name: Fallback}
settings: {allow_fallback: false}
nodes:
  - id: custom
    fallback:
      language: javascript
      code: return 1
      description: t
"#;
    let (_dir, validator) = validator();
    let report = validator.validate(&plan(blocked));
    assert!(!report.valid);
    assert!(report.find("FALLBACK_NOT_ALLOWED").is_some());

    let allowed = blocked.replace("allow_fallback: false", "allow_fallback: true");
    let report = validator.validate(&plan(&allowed));
    assert!(report.valid, "unexpected violations: {:?}", report.violations);
    let used = report.find("FALLBACK_USED").expect("warned");
    assert_eq!(used.level, Severity::Warning);
}

#[test]
fn test_empty_plan() {
    let (_dir, validator) = validator();
    let report = validator.validate(&plan("metadata: {id: p1, name: Empty}\nnodes: []"));
    assert!(!report.valid);
    assert!(report.find("EMPTY_PLAN").is_some());
}

#[test]
fn test_missing_plan_identifiers() {
    let (_dir, validator) = validator();
    let report = validator.validate(&plan(
        "metadata: {}\nnodes:\n  - id: n\n    primitive_id: P010\n    inputs: {level: info, message: m}",
    ));
    let codes = error_codes(&report);
    assert_eq!(codes[0], "MISSING_PLAN_ID");
    assert_eq!(codes[1], "MISSING_PLAN_NAME");
}

#[test]
fn test_duplicate_node_ids() {
    let (_dir, validator) = validator();
    let report = validator.validate(&plan(
        r#"
metadata: {id: p1, name: Dup}
nodes:
  - id: same
    primitive_id: P010
    inputs: {level: info, message: one}
  - id: same
    primitive_id: P010
    inputs: {level: info, message: two}
"#,
    ));
    assert!(!report.valid);
    assert_eq!(report.count("DUPLICATE_NODE_ID"), 1);
}

#[test]
fn test_node_without_primitive_or_fallback() {
    let (_dir, validator) = validator();
    let report = validator.validate(&plan(
        "metadata: {id: p1, name: Hollow}\nnodes:\n  - id: hollow\n    inputs: {}",
    ));
    assert!(!report.valid);
    let violation = report.find("NO_PRIMITIVE_OR_FALLBACK").expect("reported");
    assert_eq!(violation.node_id.as_deref(), Some("hollow"));
}

#[test]
fn test_deprecated_and_draft_primitives_rejected() {
    let (_dir, validator) = validator();
    let report = validator.validate(&plan(
        r#"
metadata: {id: p1, name: Lifecycle}
nodes:
  - id: old
    primitive_id: P020
    inputs: {to: someone@example.com}
  - id: experimental
    primitive_id: P021
    inputs: {collection: embeddings}
"#,
    ));
    assert!(!report.valid);
    assert_eq!(
        report.find("PRIMITIVE_DEPRECATED").and_then(|v| v.node_id.as_deref()),
        Some("old")
    );
    assert_eq!(
        report.find("PRIMITIVE_DRAFT").and_then(|v| v.node_id.as_deref()),
        Some("experimental")
    );
}

#[test]
fn test_invalid_edge_endpoints() {
    let (_dir, validator) = validator();
    let report = validator.validate(&plan(
        r#"
metadata: {id: p1, name: Edges}
nodes:
  - id: real
    primitive_id: P010
    inputs: {level: info, message: m}
edges:
  - {from_node: ghost, to_node: real}
  - {from_node: real, to_node: phantom}
"#,
    ));
    assert!(!report.valid);
    assert!(report.find("INVALID_EDGE_SOURCE").is_some());
    assert!(report.find("INVALID_EDGE_TARGET").is_some());
}

#[test]
fn test_enum_violation() {
    let (_dir, validator) = validator();
    let report = validator.validate(&plan(
        r#"
metadata: {id: p1, name: Enum}
nodes:
  - id: shout
    primitive_id: P010
    inputs: {level: loudest, message: m}
"#,
    ));
    assert!(!report.valid);
    let violation = report.find("INTERFACE_VIOLATION").expect("reported");
    assert!(violation.message.contains("level"));
}

#[test]
fn test_reference_expression_bypasses_type_check() {
    let (_dir, validator) = validator();
    let report = validator.validate(&plan(
        r#"
metadata: {id: p1, name: Refs}
trigger: {type: manual}
nodes:
  - id: fetch
    primitive_id: P001
    inputs:
      url: "https://example.com"
      method: GET
      timeout: "{{ ref: config.timeout }}"
"#,
    ));
    assert!(report.valid, "unexpected violations: {:?}", report.violations);
}

#[test]
fn test_high_risk_plan_warns_but_stays_valid() {
    let (_dir, validator) = validator();
    let report = validator.validate(&plan(
        r#"
metadata: {id: p1, name: Risky}
settings: {risk_level: high}
trigger: {type: manual}
nodes:
  - id: log_it
    primitive_id: P010
    inputs: {level: warn, message: careful}
"#,
    ));
    assert!(report.valid);
    assert!(report.find("HIGH_RISK_PLAN").is_some());
}

#[test]
fn test_unsafe_fallback_code_warns() {
    let (_dir, validator) = validator();
    let report = validator.validate(&plan(
        r#"
metadata: {id: p1, name: Unsafe}
settings: {allow_fallback: true}
trigger: {type: manual}
nodes:
  - id: sketchy
    fallback:
      language: javascript
      code: "return eval(input);"
      description: evaluates input
"#,
    ));
    assert!(report.valid);
    let unsafe_warning = report.find("UNSAFE_CODE").expect("warned");
    assert_eq!(unsafe_warning.node_id.as_deref(), Some("sketchy"));
}

#[test]
fn test_policy_findings_are_filed_as_warnings() {
    // Four fallbacks break the fallback_limit policy rule (declared as an
    // error inside the engine) - at the validator seam it must surface as
    // a warning and leave the plan valid.
    let mut yaml = String::from(
        "metadata: {id: p1, name: Many}\nsettings: {allow_fallback: true}\ntrigger: {type: manual}\nnodes:\n",
    );
    for i in 0..4 {
        yaml.push_str(&format!(
            "  - id: fb{i}\n    fallback: {{language: javascript, code: return {i}, description: t}}\n"
        ));
    }
    let (_dir, validator) = validator();
    let report = validator.validate(&plan(&yaml));
    assert!(report.valid, "unexpected violations: {:?}", report.violations);
    let limit = report.find("POLICY_FALLBACK_LIMIT").expect("reported");
    assert_eq!(limit.level, Severity::Warning);
    assert!(report.warnings.iter().all(|w| w.level == Severity::Warning));
}

#[test]
fn test_missing_trigger_warns_outside_test_plans() {
    let (_dir, validator) = validator();
    let no_trigger = r#"
metadata: {id: p1, name: NoTrigger}
nodes:
  - id: log_it
    primitive_id: P010
    inputs: {level: info, message: m}
"#;
    let report = validator.validate(&plan(no_trigger));
    assert!(report.valid);
    assert!(report.find("POLICY_TRIGGER_REQUIRED").is_some());

    let test_plan = no_trigger.replace("id: p1", "id: test-p1");
    let report = validator.validate(&plan(&test_plan));
    assert!(report.find("POLICY_TRIGGER_REQUIRED").is_none());
}

#[test]
fn test_validate_is_pure() {
    let (_dir, validator) = validator();
    let p = plan(
        r#"
metadata: {id: p1, name: Pure}
settings: {risk_level: high}
nodes:
  - id: mystery
    primitive_id: P999
    inputs: {}
edges:
  - {from_node: mystery, to_node: ghost}
"#,
    );
    assert_eq!(validator.validate(&p), validator.validate(&p));
}

#[test]
fn test_violations_appear_in_check_order() {
    let (_dir, validator) = validator();
    let report = validator.validate(&plan(
        r#"
metadata: {id: p1, name: ""}
nodes:
  - id: mystery
    primitive_id: P999
    inputs: {}
edges:
  - {from_node: mystery, to_node: ghost}
"#,
    ));
    let codes = error_codes(&report);
    assert_eq!(
        codes,
        vec!["MISSING_PLAN_NAME", "PRIMITIVE_NOT_FOUND", "INVALID_EDGE_TARGET"]
    );
}
