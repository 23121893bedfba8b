use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use promptrun_utils::types::{Namespace, ToolDefinition};

/// Deployment status carried by tool descriptors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DescriptorStatus {
    Draft,
    Active,
    Deployed,
    Inactive,
    Archived,
}

impl DescriptorStatus {
    /// Whether a tool in this status may be offered to the model.
    #[must_use]
    pub const fn is_executable(&self) -> bool {
        matches!(self, Self::Active | Self::Deployed)
    }
}

impl fmt::Display for DescriptorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Draft => "DRAFT",
            Self::Active => "ACTIVE",
            Self::Deployed => "DEPLOYED",
            Self::Inactive => "INACTIVE",
            Self::Archived => "ARCHIVED",
        };
        f.write_str(s)
    }
}

/// Callable tool, activity, or workflow as seen by the model.
///
/// `external_name` is the function name the model calls; it must be unique
/// across all namespaces within one execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub id: String,
    pub external_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "empty_object_schema")]
    pub input_schema: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<DescriptorStatus>,
}

fn empty_object_schema() -> Value {
    serde_json::json!({ "type": "object", "properties": {} })
}

impl ToolDescriptor {
    #[must_use]
    pub fn new(id: impl Into<String>, external_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            external_name: external_name.into(),
            description: String::new(),
            input_schema: empty_object_schema(),
            output_schema: None,
            status: None,
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    #[must_use]
    pub fn with_input_schema(mut self, schema: Value) -> Self {
        self.input_schema = schema;
        self
    }

    #[must_use]
    pub fn with_status(mut self, status: DescriptorStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Function-calling definition advertised to the model.
    #[must_use]
    pub fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.external_name.clone(),
            description: self.description.clone(),
            parameters: self.input_schema.clone(),
        }
    }
}

/// Where a model tool call is routed, resolved once when the catalog is built.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CallTarget {
    Tool(String),
    Activity(String),
    Workflow(String),
}

impl CallTarget {
    #[must_use]
    pub fn new(namespace: Namespace, descriptor_id: impl Into<String>) -> Self {
        let id = descriptor_id.into();
        match namespace {
            Namespace::Tool => Self::Tool(id),
            Namespace::Activity => Self::Activity(id),
            Namespace::Workflow => Self::Workflow(id),
        }
    }

    #[must_use]
    pub fn namespace(&self) -> Namespace {
        match self {
            Self::Tool(_) => Namespace::Tool,
            Self::Activity(_) => Namespace::Activity,
            Self::Workflow(_) => Namespace::Workflow,
        }
    }

    #[must_use]
    pub fn descriptor_id(&self) -> &str {
        match self {
            Self::Tool(id) | Self::Activity(id) | Self::Workflow(id) => id,
        }
    }
}
