//! Lowering validated plans into target workflow documents.
//!
//! One backend per target engine; `n8n` is the only target today. The
//! compiler presumes its input already passed validation - it re-checks
//! nothing, and a node with neither primitive nor fallback is an error, not
//! a diagnostic.

pub mod n8n;

pub use n8n::N8nCompiler;

use crate::diagnostics::{CoreError, CoreResult};
use crate::model::plan::Plan;

/// Compile a validated plan for the named target engine.
pub fn compile(plan: &Plan, target: &str) -> CoreResult<serde_json::Value> {
    match target {
        "n8n" => {
            let workflow = N8nCompiler::new().compile(plan)?;
            Ok(serde_json::to_value(workflow)?)
        }
        other => Err(CoreError::UnsupportedTarget {
            target: other.to_string(),
        }),
    }
}
