//! Primitive definitions and the registry index that addresses them.

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;
use thiserror::Error;

static ID_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[PAMO][0-9]{3}$").expect("id pattern is valid"));

/// Error produced when a primitive id does not match `^[PAMO][0-9]{3}$`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid primitive ID: {0}")]
pub struct InvalidPrimitiveId(pub String);

/// A validated primitive identifier such as `P001` or `M042`.
///
/// The leading letter encodes the kind (particle, atom, molecule, organism);
/// construction rejects anything that does not match the id shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct PrimitiveId(String);

impl PrimitiveId {
    pub fn new(id: impl Into<String>) -> Result<Self, InvalidPrimitiveId> {
        let id = id.into();
        if ID_PATTERN.is_match(&id) {
            Ok(Self(id))
        } else {
            Err(InvalidPrimitiveId(id))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The kind implied by the leading letter.
    pub fn kind(&self) -> PrimitiveKind {
        match self.0.as_bytes()[0] {
            b'P' => PrimitiveKind::Particle,
            b'A' => PrimitiveKind::Atom,
            b'M' => PrimitiveKind::Molecule,
            _ => PrimitiveKind::Organism,
        }
    }
}

impl fmt::Display for PrimitiveId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for PrimitiveId {
    type Error = InvalidPrimitiveId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl std::str::FromStr for PrimitiveId {
    type Err = InvalidPrimitiveId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl From<PrimitiveId> for String {
    fn from(id: PrimitiveId) -> Self {
        id.0
    }
}

/// Kind of primitive, in ascending order of composition depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrimitiveKind {
    Particle,
    Atom,
    Molecule,
    Organism,
}

impl PrimitiveKind {
    /// Section name used in the registry index file.
    pub fn section(self) -> &'static str {
        match self {
            Self::Particle => "particles",
            Self::Atom => "atoms",
            Self::Molecule => "molecules",
            Self::Organism => "organisms",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Particle => "particle",
            Self::Atom => "atom",
            Self::Molecule => "molecule",
            Self::Organism => "organism",
        }
    }
}

impl fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Lifecycle status of a primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrimitiveStatus {
    Draft,
    Stable,
    Deprecated,
}

/// Closed set of primitive categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Data,
    Transform,
    Control,
    Storage,
    Messaging,
    Ai,
    Observability,
    Notify,
}

/// Declared type of an interface field.
///
/// Unknown type strings in primitive files deserialize as `String`, so a
/// registry authored against a newer type vocabulary still loads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    #[default]
    String,
    Number,
    Boolean,
    Object,
    Array,
    Any,
    Enum,
}

impl FieldType {
    pub fn name(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Object => "object",
            Self::Array => "array",
            Self::Any => "any",
            Self::Enum => "enum",
        }
    }
}

impl<'de> Deserialize<'de> for FieldType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(match raw.as_str() {
            "number" => Self::Number,
            "boolean" => Self::Boolean,
            "object" => Self::Object,
            "array" => Self::Array,
            "any" => Self::Any,
            "enum" => Self::Enum,
            _ => Self::String,
        })
    }
}

/// Definition of a primitive input field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputField {
    pub name: String,
    #[serde(rename = "type", default)]
    pub field_type: FieldType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Opaque constraint bag (range, length, pattern); not interpreted here.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<BTreeMap<String, serde_json::Value>>,
}

/// Definition of a primitive output field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputField {
    pub name: String,
    #[serde(rename = "type", default)]
    pub field_type: FieldType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A declared error code a primitive may surface at runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorDef {
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub retryable: bool,
}

/// The typed interface of a primitive.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Interface {
    #[serde(default)]
    pub inputs: Vec<InputField>,
    #[serde(default)]
    pub outputs: Vec<OutputField>,
    #[serde(default)]
    pub errors: Vec<ErrorDef>,
}

/// Per-target compilation descriptor.
///
/// Only `node_type` and `version` are meaningful to the compiler; anything
/// else the file carries is kept opaque.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CompilationTarget {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

fn default_timeout() -> String {
    "30s".to_string()
}

fn deserialize_retry_count<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let count = u8::deserialize(deserializer)?;
    if count > 10 {
        return Err(serde::de::Error::custom(format!(
            "retry_count must be between 0 and 10, got {count}"
        )));
    }
    Ok(count)
}

/// Declarative execution constraints; target engines may honor them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constraints {
    #[serde(default = "default_timeout")]
    pub timeout: String,
    #[serde(default, deserialize_with = "deserialize_retry_count")]
    pub retry_count: u8,
    #[serde(default)]
    pub idempotent: bool,
}

impl Default for Constraints {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            retry_count: 0,
            idempotent: false,
        }
    }
}

/// Primitive metadata block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrimitiveMetadata {
    pub id: PrimitiveId,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: PrimitiveKind,
    pub version: String,
    pub status: PrimitiveStatus,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Ids of lower-kind primitives this one builds on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depends_on: Option<Vec<String>>,
}

/// One step in composing a higher-kind primitive from lower ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositionStep {
    pub particle: String,
    #[serde(default)]
    pub inputs: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub outputs: BTreeMap<String, serde_json::Value>,
}

/// A usage example; consumed by documentation tooling only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Example {
    pub name: String,
    #[serde(default)]
    pub inputs: BTreeMap<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_outputs: Option<BTreeMap<String, serde_json::Value>>,
}

/// A complete primitive definition.
///
/// A single record covers all four kinds; composition is simply absent on
/// particles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Primitive {
    pub metadata: PrimitiveMetadata,
    #[serde(default)]
    pub interface: Interface,
    #[serde(default)]
    pub compilation_targets: BTreeMap<String, CompilationTarget>,
    #[serde(default)]
    pub constraints: Constraints,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub composition: Option<Vec<CompositionStep>>,
    #[serde(default)]
    pub examples: Vec<Example>,
}

fn default_status() -> PrimitiveStatus {
    PrimitiveStatus::Stable
}

/// Metadata-only view of a primitive, as recorded in the registry index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrimitiveSummary {
    pub id: PrimitiveId,
    pub path: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    #[serde(default = "default_status")]
    pub status: PrimitiveStatus,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// The parsed `_meta/registry.yaml` index.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RegistryIndex {
    #[serde(default)]
    pub particles: Vec<PrimitiveSummary>,
    #[serde(default)]
    pub atoms: Vec<PrimitiveSummary>,
    #[serde(default)]
    pub molecules: Vec<PrimitiveSummary>,
    #[serde(default)]
    pub organisms: Vec<PrimitiveSummary>,
}

impl RegistryIndex {
    pub fn section(&self, kind: PrimitiveKind) -> &[PrimitiveSummary] {
        match kind {
            PrimitiveKind::Particle => &self.particles,
            PrimitiveKind::Atom => &self.atoms,
            PrimitiveKind::Molecule => &self.molecules,
            PrimitiveKind::Organism => &self.organisms,
        }
    }

    /// All entries across every kind, in index order.
    pub fn entries(&self) -> impl Iterator<Item = &PrimitiveSummary> {
        self.particles
            .iter()
            .chain(self.atoms.iter())
            .chain(self.molecules.iter())
            .chain(self.organisms.iter())
    }
}
