//! # atomflow-core
//!
//! A primitives-first workflow toolchain:
//!
//! - **Registry** - a typed, cached catalog of reusable workflow building
//!   blocks ("primitives") loaded from declarative YAML files.
//! - **Validator** - a five-check pipeline (syntax, registry, interface,
//!   dependencies, policy) producing a structured [`ValidationReport`] for a
//!   user-authored plan.
//! - **Compiler** - a lowering pass that rewrites a validated plan's DAG
//!   into the workflow JSON of a target engine (currently `n8n`).
//!
//! The core is synchronous and value-oriented: the only I/O is lazy file
//! reading inside the loader, plans are never mutated, and reports and
//! compiled documents are fresh values owned by the caller. Anything a plan
//! author can get wrong is reported as a [`Violation`]; only infrastructure
//! problems (missing registry, malformed definition files, unknown targets)
//! surface as [`CoreError`].

pub mod compiler;
pub mod diagnostics;
pub mod loader;
pub mod model;
pub mod pipeline;
pub mod policy;
pub mod reference;
pub mod registry;
pub mod validator;

pub use compiler::{N8nCompiler, compile};
pub use diagnostics::{CoreError, CoreResult, Severity, ValidationReport, Violation};
pub use loader::PrimitiveLoader;
pub use model::plan::{
    CodeBlock, Edge, FallbackLanguage, Plan, PlanMetadata, PlanNode, PlanSettings, RiskLevel,
    Trigger, TriggerKind,
};
pub use model::primitive::{
    Category, Interface, Primitive, PrimitiveId, PrimitiveKind, PrimitiveStatus, PrimitiveSummary,
};
pub use pipeline::{CompileOutcome, Toolchain};
pub use policy::{PolicyEngine, PolicyRule, RuleInfo};
pub use registry::{PrimitiveRegistry, SearchHit};
pub use validator::PlanValidator;
