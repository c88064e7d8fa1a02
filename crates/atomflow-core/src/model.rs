//! Data model: primitives, plans, and their building blocks.
//!
//! All model types are plain serde-backed values with structural equality.
//! The only logic lives in construction: primitive ids must match the
//! `^[PAMO][0-9]{3}$` shape, retry counts are bounded, and fallback code
//! blocks are capped at 500 characters. Everything else is validated by the
//! pipeline, not the parser.

pub mod plan;
pub mod primitive;

pub use plan::{
    CodeBlock, Edge, FallbackLanguage, Plan, PlanMetadata, PlanNode, PlanSettings, RiskLevel,
    Trigger, TriggerKind,
};
pub use primitive::{
    Category, CompilationTarget, CompositionStep, Constraints, ErrorDef, Example, FieldType,
    InputField, Interface, InvalidPrimitiveId, OutputField, Primitive, PrimitiveId, PrimitiveKind,
    PrimitiveMetadata, PrimitiveStatus, PrimitiveSummary, RegistryIndex,
};
