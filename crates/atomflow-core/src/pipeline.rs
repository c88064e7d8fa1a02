//! The toolchain façade consumed by external surfaces.

use std::path::PathBuf;
use std::sync::Arc;

use crate::compiler;
use crate::diagnostics::{CoreResult, ValidationReport};
use crate::model::plan::Plan;
use crate::registry::PrimitiveRegistry;
use crate::validator::PlanValidator;

/// Validation report paired with the compiled document when the plan passed.
#[derive(Debug, Clone, PartialEq)]
pub struct CompileOutcome {
    pub report: ValidationReport,
    pub workflow: Option<serde_json::Value>,
}

/// Registry, validator, and compiler wired together.
///
/// External surfaces (CLI, RPC shells) construct one of these per process
/// and feed it parsed plan documents.
pub struct Toolchain {
    registry: Arc<PrimitiveRegistry>,
    validator: PlanValidator,
}

impl Toolchain {
    /// Build a toolchain over the given primitives root, or discover one.
    pub fn new(primitives_root: Option<PathBuf>) -> CoreResult<Self> {
        let registry = Arc::new(PrimitiveRegistry::new(primitives_root)?);
        let validator = PlanValidator::new(Arc::clone(&registry));
        Ok(Self {
            registry,
            validator,
        })
    }

    pub fn registry(&self) -> &PrimitiveRegistry {
        &self.registry
    }

    pub fn validator(&self) -> &PlanValidator {
        &self.validator
    }

    pub fn validator_mut(&mut self) -> &mut PlanValidator {
        &mut self.validator
    }

    /// Validate a plan against the registry.
    pub fn validate(&self, plan: &Plan) -> ValidationReport {
        self.validator.validate(plan)
    }

    /// Compile a plan for a target, presuming it already validated.
    pub fn compile(&self, plan: &Plan, target: &str) -> CoreResult<serde_json::Value> {
        compiler::compile(plan, target)
    }

    /// Validate, then compile only when the report comes back clean.
    pub fn check_and_compile(&self, plan: &Plan, target: &str) -> CoreResult<CompileOutcome> {
        let report = self.validate(plan);
        let workflow = if report.valid {
            Some(compiler::compile(plan, target)?)
        } else {
            None
        };
        Ok(CompileOutcome { report, workflow })
    }
}
