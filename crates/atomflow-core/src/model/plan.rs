//! Plan documents: metadata, settings, trigger, nodes, and edges.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::diagnostics::{CoreError, CoreResult};
use crate::model::primitive::PrimitiveId;

/// Maximum number of characters allowed in a fallback code block.
pub const MAX_FALLBACK_CODE_LEN: usize = 500;

/// Declared risk level of a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    #[default]
    Low,
    Medium,
    High,
}

/// Plan trigger kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerKind {
    Webhook,
    Schedule,
    Manual,
    Event,
}

/// How a compiled workflow is started.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trigger {
    #[serde(rename = "type")]
    pub kind: TriggerKind,
    #[serde(default)]
    pub config: BTreeMap<String, serde_json::Value>,
}

/// Plan execution settings.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PlanSettings {
    #[serde(default)]
    pub allow_fallback: bool,
    #[serde(default)]
    pub risk_level: RiskLevel,
}

fn default_plan_version() -> String {
    "1.0.0".to_string()
}

/// Plan metadata block.
///
/// `id` and `name` default to empty so that an incomplete document still
/// parses; the validator reports `MISSING_PLAN_ID` / `MISSING_PLAN_NAME`
/// instead of the parser refusing the input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanMetadata {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_plan_version")]
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Language of a fallback code block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FallbackLanguage {
    Python,
    Javascript,
}

#[derive(Deserialize)]
struct RawCodeBlock {
    language: FallbackLanguage,
    code: String,
    description: String,
    #[serde(default)]
    inputs_schema: BTreeMap<String, String>,
    #[serde(default)]
    outputs_schema: BTreeMap<String, String>,
}

/// An inline code block substituting for a missing primitive.
///
/// Code is capped at [`MAX_FALLBACK_CODE_LEN`] characters at construction;
/// longer blocks are rejected before a plan value exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCodeBlock")]
pub struct CodeBlock {
    pub language: FallbackLanguage,
    pub code: String,
    pub description: String,
    pub inputs_schema: BTreeMap<String, String>,
    pub outputs_schema: BTreeMap<String, String>,
}

impl CodeBlock {
    pub fn new(
        language: FallbackLanguage,
        code: impl Into<String>,
        description: impl Into<String>,
    ) -> CoreResult<Self> {
        let code = code.into();
        if code.chars().count() > MAX_FALLBACK_CODE_LEN {
            return Err(CoreError::MalformedPlan {
                reason: format!(
                    "fallback code exceeds {MAX_FALLBACK_CODE_LEN} characters"
                ),
            });
        }
        Ok(Self {
            language,
            code,
            description: description.into(),
            inputs_schema: BTreeMap::new(),
            outputs_schema: BTreeMap::new(),
        })
    }
}

impl TryFrom<RawCodeBlock> for CodeBlock {
    type Error = CoreError;

    fn try_from(raw: RawCodeBlock) -> Result<Self, Self::Error> {
        let mut block = Self::new(raw.language, raw.code, raw.description)?;
        block.inputs_schema = raw.inputs_schema;
        block.outputs_schema = raw.outputs_schema;
        Ok(block)
    }
}

/// One step in a plan workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanNode {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primitive_id: Option<PrimitiveId>,
    #[serde(default)]
    pub inputs: BTreeMap<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<CodeBlock>,
}

/// A directed connection between two plan nodes.
///
/// `condition` is carried through the model but consumed by no current
/// compilation target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub from_node: String,
    pub to_node: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
}

/// A complete plan workflow definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub metadata: PlanMetadata,
    #[serde(default)]
    pub settings: PlanSettings,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger: Option<Trigger>,
    #[serde(default)]
    pub nodes: Vec<PlanNode>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl Plan {
    /// Parse a plan from a YAML document.
    pub fn from_yaml_str(text: &str) -> CoreResult<Self> {
        serde_yaml::from_str(text).map_err(|e| CoreError::MalformedPlan {
            reason: e.to_string(),
        })
    }

    /// Parse a plan from a JSON document.
    pub fn from_json_str(text: &str) -> CoreResult<Self> {
        serde_json::from_str(text).map_err(|e| CoreError::MalformedPlan {
            reason: e.to_string(),
        })
    }

    /// Number of nodes carrying a code fallback.
    pub fn fallback_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.fallback.is_some()).count()
    }
}
