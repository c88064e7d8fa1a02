//! Violation, report, and error types

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

pub type CoreResult<T> = Result<T, CoreError>;

/// Severity of a validation violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

/// A single validation diagnostic with a stable machine code.
///
/// Codes are short uppercase identifiers (e.g. `EMPTY_PLAN`,
/// `PRIMITIVE_NOT_FOUND`) that callers can match on; messages are for
/// humans and may change between releases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    pub level: Severity,
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl Violation {
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Self {
            level: Severity::Error,
            code: code.to_string(),
            message: message.into(),
            node_id: None,
            field: None,
        }
    }

    pub fn warning(code: &str, message: impl Into<String>) -> Self {
        Self {
            level: Severity::Warning,
            code: code.to_string(),
            message: message.into(),
            node_id: None,
            field: None,
        }
    }

    pub fn info(code: &str, message: impl Into<String>) -> Self {
        Self {
            level: Severity::Info,
            code: code.to_string(),
            message: message.into(),
            node_id: None,
            field: None,
        }
    }

    /// Attach the id of the plan node this violation refers to.
    pub fn with_node(mut self, node_id: impl Into<String>) -> Self {
        self.node_id = Some(node_id.into());
        self
    }

    /// Attach the input field name this violation refers to.
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }
}

/// Outcome of running a plan through the validation pipeline.
///
/// `violations` holds error-severity findings, `warnings` everything the
/// policy layer produced. `valid` is true exactly when no error-severity
/// entry exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub violations: Vec<Violation>,
    pub warnings: Vec<Violation>,
}

impl ValidationReport {
    pub fn new(violations: Vec<Violation>, warnings: Vec<Violation>) -> Self {
        let valid = !violations.iter().any(|v| v.level == Severity::Error);
        Self {
            valid,
            violations,
            warnings,
        }
    }

    /// Look up the first violation or warning carrying the given code.
    pub fn find(&self, code: &str) -> Option<&Violation> {
        self.violations
            .iter()
            .chain(self.warnings.iter())
            .find(|v| v.code == code)
    }

    /// Count violations and warnings carrying the given code.
    pub fn count(&self, code: &str) -> usize {
        self.violations
            .iter()
            .chain(self.warnings.iter())
            .filter(|v| v.code == code)
            .count()
    }
}

/// Toolchain errors
///
/// These are the exceptional failures of the pipeline; everything a plan
/// author can get wrong is reported through [`ValidationReport`] instead.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("No primitives directory found; searched {searched:?}")]
    RegistryNotFound { searched: Vec<PathBuf> },

    #[error("Primitive not found: {id}")]
    PrimitiveNotFound { id: String },

    #[error("Malformed primitive {id}: {reason}")]
    MalformedPrimitive { id: String, reason: String },

    #[error("Malformed registry index {path}: {reason}")]
    MalformedIndex { path: PathBuf, reason: String },

    #[error("Malformed plan: {reason}")]
    MalformedPlan { reason: String },

    #[error("Unsupported compilation target: {target}")]
    UnsupportedTarget { target: String },

    #[error("Cannot compile node {node_id}: no primitive or fallback")]
    UnsupportedNode { node_id: String },

    #[error("Failed to read file: {path}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_violation_error_level() {
        let v = Violation::error("EMPTY_PLAN", "Plan must have at least one node");
        assert_eq!(v.level, Severity::Error);
        assert_eq!(v.code, "EMPTY_PLAN");
        assert!(v.node_id.is_none());
        assert!(v.field.is_none());
    }

    #[test]
    fn test_violation_builder_chaining() {
        let v = Violation::error("INTERFACE_VIOLATION", "Missing required input: url")
            .with_node("fetch")
            .with_field("url");
        assert_eq!(v.node_id.as_deref(), Some("fetch"));
        assert_eq!(v.field.as_deref(), Some("url"));
    }

    #[test]
    fn test_report_valid_iff_no_errors() {
        let report = ValidationReport::new(vec![], vec![Violation::warning("FALLBACK_USED", "x")]);
        assert!(report.valid);

        let report = ValidationReport::new(vec![Violation::error("EMPTY_PLAN", "x")], vec![]);
        assert!(!report.valid);
    }

    #[test]
    fn test_report_find_searches_both_lists() {
        let report = ValidationReport::new(
            vec![Violation::error("DUPLICATE_NODE_ID", "dup")],
            vec![Violation::warning("HIGH_RISK_PLAN", "risky")],
        );
        assert!(report.find("DUPLICATE_NODE_ID").is_some());
        assert!(report.find("HIGH_RISK_PLAN").is_some());
        assert!(report.find("EMPTY_PLAN").is_none());
    }

    #[test]
    fn test_violation_serialization_shape() {
        let v = Violation::error("PRIMITIVE_NOT_FOUND", "Primitive not found: P999").with_node("n1");
        let json = serde_json::to_value(&v).expect("serialization should succeed");
        assert_eq!(json["level"], "error");
        assert_eq!(json["code"], "PRIMITIVE_NOT_FOUND");
        assert_eq!(json["node_id"], "n1");
        // absent locators are omitted from the wire format
        assert!(json.get("field").is_none());
    }

    #[test]
    fn test_report_serialization_roundtrip() {
        let original = ValidationReport::new(
            vec![Violation::error("EMPTY_PLAN", "Plan must have at least one node")],
            vec![Violation::warning("HIGH_RISK_PLAN", "risky").with_node("n2")],
        );
        let json = serde_json::to_string(&original).expect("serialization should succeed");
        let back: ValidationReport =
            serde_json::from_str(&json).expect("deserialization should succeed");
        assert_eq!(back, original);
        assert!(!back.valid);
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Error < Severity::Warning);
        assert!(Severity::Warning < Severity::Info);
    }
}
