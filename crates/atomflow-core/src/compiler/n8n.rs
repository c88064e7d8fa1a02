//! The n8n workflow backend.
//!
//! Lowers a plan DAG into the JSON document n8n's import endpoint accepts.
//! A synthetic trigger node is always emitted first; each plan node is
//! lowered through a dispatch table of declarative parameter maps and a
//! handful of custom handlers; connections mirror the plan edges with DAG
//! roots wired to the trigger.
//!
//! Everything except node ids and `versionId` (both uuid-shaped) is a pure
//! function of the plan, so golden tests compare documents with those
//! stripped.

use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value, json};
use std::collections::{BTreeMap, HashMap, HashSet};
use uuid::Uuid;

use crate::diagnostics::{CoreError, CoreResult};
use crate::model::plan::{CodeBlock, FallbackLanguage, Plan, PlanNode, TriggerKind};
use crate::model::primitive::PrimitiveId;
use crate::reference;

const X_START: i64 = 250;
const X_STEP: i64 = 250;
const Y_START: i64 = 300;
const Y_STEP: i64 = 100;
const TRIGGER_NAME: &str = "Trigger";

const CODE_NODE_TYPE: &str = "n8n-nodes-base.code";

/// One emitted workflow node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct N8nNode {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub node_type: String,
    pub position: [i64; 2],
    pub parameters: JsonMap<String, Value>,
    #[serde(rename = "typeVersion")]
    pub type_version: u32,
}

impl N8nNode {
    fn new(name: String, node_type: &str, parameters: JsonMap<String, Value>, type_version: u32) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name,
            node_type: node_type.to_string(),
            position: [0, 0],
            parameters,
            type_version,
        }
    }
}

/// One outgoing connection entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionTarget {
    pub node: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub index: u32,
}

impl ConnectionTarget {
    fn main(node: &str) -> Self {
        Self {
            node: node.to_string(),
            kind: "main".to_string(),
            index: 0,
        }
    }
}

/// All outgoing connections of one node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeConnections {
    pub main: Vec<Vec<ConnectionTarget>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowSettings {
    #[serde(rename = "executionOrder")]
    pub execution_order: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowMeta {
    pub atomflow_plan_id: String,
    pub atomflow_version: String,
}

/// A complete n8n workflow document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct N8nWorkflow {
    pub name: String,
    pub nodes: Vec<N8nNode>,
    pub connections: BTreeMap<String, NodeConnections>,
    pub active: bool,
    pub settings: WorkflowSettings,
    #[serde(rename = "versionId")]
    pub version_id: String,
    pub meta: WorkflowMeta,
}

/// How a primitive lowers into an n8n node.
enum Lowering {
    /// Declarative rename map from plan input names to n8n parameter names.
    /// Dotted targets build nested parameter objects.
    Map(&'static [(&'static str, &'static str)]),
    Transform,
    Branch,
    Loop,
    LlmCall,
    Log,
}

struct NodeSpec {
    node_type: &'static str,
    type_version: u32,
    lowering: Lowering,
}

/// Dispatch table from primitive id to its n8n lowering.
fn node_spec(primitive_id: &str) -> Option<NodeSpec> {
    let spec = match primitive_id {
        // http_call
        "P001" => NodeSpec {
            node_type: "n8n-nodes-base.httpRequest",
            type_version: 4,
            lowering: Lowering::Map(&[
                ("method", "method"),
                ("url", "url"),
                ("headers", "headerParameters"),
                ("body", "body"),
                ("query_params", "queryParameters"),
                ("timeout", "timeout"),
                ("auth", "authentication"),
            ]),
        },
        // db_query
        "P002" => NodeSpec {
            node_type: "n8n-nodes-base.postgres",
            type_version: 2,
            lowering: Lowering::Map(&[("query", "query"), ("operation", "operation")]),
        },
        // file_op
        "P003" => NodeSpec {
            node_type: "n8n-nodes-base.readWriteFile",
            type_version: 1,
            lowering: Lowering::Map(&[
                ("operation", "operation"),
                ("path", "filePath"),
                ("content", "fileContent"),
            ]),
        },
        "P004" => NodeSpec {
            node_type: CODE_NODE_TYPE,
            type_version: 2,
            lowering: Lowering::Transform,
        },
        "P005" => NodeSpec {
            node_type: "n8n-nodes-base.if",
            type_version: 2,
            lowering: Lowering::Branch,
        },
        "P006" => NodeSpec {
            node_type: "n8n-nodes-base.splitInBatches",
            type_version: 3,
            lowering: Lowering::Loop,
        },
        "P007" => NodeSpec {
            node_type: "@n8n/n8n-nodes-langchain.openAi",
            type_version: 1,
            lowering: Lowering::LlmCall,
        },
        // cache
        "P008" => NodeSpec {
            node_type: "n8n-nodes-base.redis",
            type_version: 1,
            lowering: Lowering::Map(&[
                ("operation", "operation"),
                ("key", "key"),
                ("value", "value"),
                ("ttl", "expire"),
            ]),
        },
        // queue
        "P009" => NodeSpec {
            node_type: "n8n-nodes-base.rabbitmq",
            type_version: 1,
            lowering: Lowering::Map(&[
                ("operation", "operation"),
                ("queue", "queue"),
                ("message", "content"),
            ]),
        },
        "P010" => NodeSpec {
            node_type: CODE_NODE_TYPE,
            type_version: 2,
            lowering: Lowering::Log,
        },
        _ => return None,
    };
    Some(spec)
}

/// Compiles plans to n8n workflow documents.
#[derive(Debug, Default)]
pub struct N8nCompiler;

impl N8nCompiler {
    pub fn new() -> Self {
        Self
    }

    /// Lower a validated plan into a workflow document.
    pub fn compile(&self, plan: &Plan) -> CoreResult<N8nWorkflow> {
        let mut nodes = Vec::with_capacity(plan.nodes.len() + 1);
        let mut emitted_names: HashMap<&str, String> = HashMap::new();

        let mut trigger = lower_trigger(plan);
        trigger.position = [X_START, Y_START];
        let trigger_name = trigger.name.clone();
        nodes.push(trigger);

        let mut x = X_START;
        for (index, plan_node) in plan.nodes.iter().enumerate() {
            x += X_STEP;
            let mut node = lower_node(plan_node)?;
            node.position = [x, Y_START + (index as i64 % 3) * Y_STEP];
            emitted_names.insert(plan_node.id.as_str(), node.name.clone());
            nodes.push(node);
        }

        let connections = build_connections(plan, &emitted_names, &trigger_name);

        Ok(N8nWorkflow {
            name: plan.metadata.name.clone(),
            nodes,
            connections,
            active: false,
            settings: WorkflowSettings {
                execution_order: "v1".to_string(),
            },
            version_id: Uuid::new_v4().to_string(),
            meta: WorkflowMeta {
                atomflow_plan_id: plan.metadata.id.clone(),
                atomflow_version: plan.metadata.version.clone(),
            },
        })
    }

    /// Compile and render as pretty-printed JSON.
    pub fn to_json(&self, plan: &Plan) -> CoreResult<String> {
        let workflow = self.compile(plan)?;
        Ok(serde_json::to_string_pretty(&workflow)?)
    }
}

fn lower_trigger(plan: &Plan) -> N8nNode {
    let (kind, config) = match &plan.trigger {
        Some(trigger) => (trigger.kind, Some(&trigger.config)),
        None => (TriggerKind::Manual, None),
    };

    let (node_type, type_version, mut parameters) = match kind {
        TriggerKind::Webhook => (
            "n8n-nodes-base.webhook",
            2,
            into_object(json!({
                "httpMethod": "POST",
                "path": "webhook",
                "responseMode": "responseNode",
            })),
        ),
        TriggerKind::Schedule => (
            "n8n-nodes-base.scheduleTrigger",
            1,
            into_object(json!({
                "rule": { "interval": [{ "field": "hours", "hoursInterval": 1 }] },
            })),
        ),
        TriggerKind::Manual => ("n8n-nodes-base.manualTrigger", 1, JsonMap::new()),
        TriggerKind::Event => (
            "n8n-nodes-base.webhook",
            2,
            into_object(json!({
                "httpMethod": "POST",
                "path": "event",
            })),
        ),
    };

    if let Some(config) = config {
        match kind {
            TriggerKind::Schedule => {
                if let Some(cron) = config.get("cron") {
                    parameters.insert("rule".to_string(), json!({ "cron": cron }));
                }
            }
            TriggerKind::Webhook => {
                if let Some(path) = config.get("path") {
                    parameters.insert("path".to_string(), path.clone());
                }
            }
            TriggerKind::Manual | TriggerKind::Event => {}
        }
    }

    N8nNode::new(TRIGGER_NAME.to_string(), node_type, parameters, type_version)
}

fn lower_node(node: &PlanNode) -> CoreResult<N8nNode> {
    if let Some(fallback) = &node.fallback {
        return Ok(lower_fallback(node, fallback));
    }

    let Some(primitive_id) = &node.primitive_id else {
        return Err(CoreError::UnsupportedNode {
            node_id: node.id.clone(),
        });
    };

    let Some(spec) = node_spec(primitive_id.as_str()) else {
        return Ok(lower_generic(node, primitive_id));
    };

    let node_name = display_name(&node.id);
    Ok(match spec.lowering {
        Lowering::Map(param_map) => {
            let parameters = map_parameters(&node.inputs, param_map);
            N8nNode::new(node_name, spec.node_type, parameters, spec.type_version)
        }
        Lowering::Transform => lower_transform(node),
        Lowering::Branch => N8nNode::new(
            node_name,
            spec.node_type,
            branch_parameters(),
            spec.type_version,
        ),
        Lowering::Loop => {
            let batch_size = node.inputs.get("batch_size").cloned().unwrap_or(json!(1));
            let parameters = into_object(json!({ "batchSize": batch_size, "options": {} }));
            N8nNode::new(node_name, spec.node_type, parameters, spec.type_version)
        }
        Lowering::LlmCall => lower_llm_call(node, spec.node_type, spec.type_version),
        Lowering::Log => lower_log(node),
    })
}

/// Map plan inputs onto n8n parameters through a rename table.
///
/// Inputs absent from the table pass through under their own name; string
/// values get reference placeholders rewritten; dotted targets build
/// nested objects.
fn map_parameters(
    inputs: &BTreeMap<String, Value>,
    param_map: &[(&str, &str)],
) -> JsonMap<String, Value> {
    let mut parameters = JsonMap::new();
    for (input_name, value) in inputs {
        let target = param_map
            .iter()
            .find(|(from, _)| *from == input_name.as_str())
            .map_or(input_name.as_str(), |(_, to)| *to);
        let value = match value {
            Value::String(s) => Value::String(reference::rewrite(s)),
            other => other.clone(),
        };
        insert_nested(&mut parameters, target, value);
    }
    parameters
}

/// Insert `value` at a dotted path, creating intermediate objects.
fn insert_nested(parameters: &mut JsonMap<String, Value>, dotted: &str, value: Value) {
    match dotted.split_once('.') {
        None => {
            parameters.insert(dotted.to_string(), value);
        }
        Some((head, rest)) => {
            let slot = parameters
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(JsonMap::new()));
            if !slot.is_object() {
                *slot = Value::Object(JsonMap::new());
            }
            if let Value::Object(inner) = slot {
                insert_nested(inner, rest, value);
            }
        }
    }
}

fn into_object(value: Value) -> JsonMap<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => JsonMap::new(),
    }
}

/// String form of a plan input for inlining into generated code.
fn input_str(node: &PlanNode, key: &str, default: &str) -> String {
    match node.inputs.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => default.to_string(),
        Some(other) => other.to_string(),
    }
}

fn code_parameters(code: String) -> JsonMap<String, Value> {
    into_object(json!({ "mode": "runOnceForAllItems", "jsCode": code }))
}

fn lower_transform(node: &PlanNode) -> N8nNode {
    let operation = input_str(node, "operation", "map");
    let source = reference::rewrite(&input_str(node, "source", "$input.all()"));
    let template = input_str(node, "template", "");
    let condition = input_str(node, "condition", "true");
    let initial = input_str(node, "initial", "{}");

    let code = match operation.as_str() {
        "map" => {
            let body = if template.is_empty() { "item" } else { template.as_str() };
            format!(
                "// Transform: Map operation\nconst items = {source};\nconst results = items.map(item => {{\n  return {body};\n}});\nreturn results.map(json => ({{json}}));"
            )
        }
        "filter" => format!(
            "// Transform: Filter operation\nconst items = {source};\nconst results = items.filter(item => {{\n  return {condition};\n}});\nreturn results.map(json => ({{json}}));"
        ),
        "reduce" => {
            let body = if template.is_empty() {
                "return acc;"
            } else {
                template.as_str()
            };
            format!(
                "// Transform: Reduce operation\nconst items = {source};\nconst result = items.reduce((acc, item) => {{\n  {body}\n}}, {initial});\nreturn [{{json: result}}];"
            )
        }
        "flatten" => format!(
            "// Transform: Flatten operation\nconst items = {source};\nconst results = items.flat();\nreturn results.map(json => ({{json}}));"
        ),
        other => format!(
            "// Transform: {other}\nconst items = {source};\nreturn items.map(json => ({{json}}));"
        ),
    };

    N8nNode::new(display_name(&node.id), CODE_NODE_TYPE, code_parameters(code), 2)
}

fn branch_parameters() -> JsonMap<String, Value> {
    into_object(json!({
        "conditions": {
            "options": { "caseSensitive": true, "leftValue": "" },
            "conditions": [{
                "leftValue": "={{ $json }}",
                "rightValue": "",
                "operator": { "type": "boolean", "operation": "true" },
            }],
            "combinator": "and",
        },
    }))
}

fn lower_llm_call(node: &PlanNode, node_type: &str, type_version: u32) -> N8nNode {
    let prompt = input_str(node, "prompt", "");
    let model = input_str(node, "model", "gpt-4");
    let system_prompt = input_str(node, "system_prompt", "");
    let temperature = node.inputs.get("temperature").cloned().unwrap_or(json!(0.7));
    let max_tokens = node.inputs.get("max_tokens").cloned().unwrap_or(json!(1000));

    let parameters = into_object(json!({
        "resource": "chat",
        "operation": "message",
        "model": model,
        "messages": {
            "values": [
                { "role": "system", "content": system_prompt },
                { "role": "user", "content": prompt },
            ]
        },
        "options": { "temperature": temperature, "maxTokens": max_tokens },
    }));

    N8nNode::new(display_name(&node.id), node_type, parameters, type_version)
}

fn lower_log(node: &PlanNode) -> N8nNode {
    let level = input_str(node, "level", "info").to_uppercase();
    let message = input_str(node, "message", "");
    let data = node.inputs.get("data").cloned().unwrap_or(json!({}));
    let data_json = serde_json::to_string(&data).unwrap_or_else(|_| "{}".to_string());

    let code = format!(
        "// Log: {level}\nconsole.log('{level}: {message}');\nconsole.log('Data:', {data_json});\n\n// Pass through input data\nreturn $input.all();"
    );

    N8nNode::new(display_name(&node.id), CODE_NODE_TYPE, code_parameters(code), 2)
}

/// Unmapped primitives become pass-through code nodes that keep the
/// original inputs visible for hand-finishing in the n8n editor.
fn lower_generic(node: &PlanNode, primitive_id: &PrimitiveId) -> N8nNode {
    let inputs_json =
        serde_json::to_string(&node.inputs).unwrap_or_else(|_| "{}".to_string());
    let code = format!(
        "// Generic node for primitive: {primitive_id}\n// Inputs: {inputs_json}\nreturn $input.all();"
    );
    N8nNode::new(display_name(&node.id), CODE_NODE_TYPE, code_parameters(code), 2)
}

fn lower_fallback(node: &PlanNode, fallback: &CodeBlock) -> N8nNode {
    let code = wrap_fallback_code(fallback);
    N8nNode::new(display_name(&node.id), CODE_NODE_TYPE, code_parameters(code), 2)
}

/// Wrap fallback code for execution inside an n8n code node.
///
/// Javascript runs as written. n8n has no native python execution, so
/// python blocks are embedded in a pass-through stub with a warning
/// comment; this is a documented limitation of the target.
fn wrap_fallback_code(fallback: &CodeBlock) -> String {
    let inputs = serde_json::to_string(&fallback.inputs_schema).unwrap_or_else(|_| "{}".into());
    let outputs = serde_json::to_string(&fallback.outputs_schema).unwrap_or_else(|_| "{}".into());
    match fallback.language {
        FallbackLanguage::Javascript => format!(
            "// Fallback code: {}\n// Inputs: {}\n// Outputs: {}\n\n{}",
            fallback.description, inputs, outputs, fallback.code
        ),
        FallbackLanguage::Python => format!(
            "// Fallback: Python code (requires external execution)\n// Description: {}\n// WARNING: Python fallback not directly executable in n8n\n\nconst pythonCode = `{}`;\n// TODO: Send to Python execution service\nreturn $input.all();",
            fallback.description, fallback.code
        ),
    }
}

/// Display name for an emitted node: underscores to spaces, title-cased.
fn display_name(node_id: &str) -> String {
    node_id
        .replace('_', " ")
        .split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// Build the connection map from plan edges.
///
/// Nodes with no incoming edge are the roots of the plan DAG and get wired
/// as outputs of the trigger node.
fn build_connections(
    plan: &Plan,
    emitted_names: &HashMap<&str, String>,
    trigger_name: &str,
) -> BTreeMap<String, NodeConnections> {
    let mut connections: BTreeMap<String, NodeConnections> = BTreeMap::new();

    let incoming: HashSet<&str> = plan.edges.iter().map(|e| e.to_node.as_str()).collect();
    let root_targets: Vec<ConnectionTarget> = plan
        .nodes
        .iter()
        .filter(|node| !incoming.contains(node.id.as_str()))
        .filter_map(|node| emitted_names.get(node.id.as_str()))
        .map(|name| ConnectionTarget::main(name))
        .collect();
    if !root_targets.is_empty() {
        connections.insert(
            trigger_name.to_string(),
            NodeConnections {
                main: vec![root_targets],
            },
        );
    }

    for edge in &plan.edges {
        let (Some(source), Some(target)) = (
            emitted_names.get(edge.from_node.as_str()),
            emitted_names.get(edge.to_node.as_str()),
        ) else {
            continue;
        };
        let entry = connections
            .entry(source.clone())
            .or_insert_with(|| NodeConnections {
                main: vec![Vec::new()],
            });
        if let Some(row) = entry.main.first_mut() {
            row.push(ConnectionTarget::main(target));
        }
    }

    connections
}
