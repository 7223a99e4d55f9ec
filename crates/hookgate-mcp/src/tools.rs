// crates/hookgate-mcp/src/tools.rs
// ============================================================================
// Module: Tool Gateway
// Description: Named tools with declared parameters and a notifying decorator.
// Purpose: Validate and execute agent tool calls by name.
// Dependencies: async-trait, hookgate-broker, hookgate-core, serde_json
// ============================================================================

//! ## Overview
//! Tools implement [`Tool`] and are registered once at startup with the
//! [`ToolGateway`]. The gateway validates call parameters against the declared
//! [`ToolDefinition`] before execution and records every call to the audit
//! sink.
//!
//! [`NotifyingTool`] decorates any tool so that each successful call also
//! publishes an `mcp.tool.execute` event. The decorator exposes the inner
//! definition unchanged. Failed calls are returned to the caller and are not
//! published.
//!
//! Security posture: parameters are untrusted agent input.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::PoisonError;
use std::sync::RwLock;

use async_trait::async_trait;
use hookgate_broker::EventPublisher;
use hookgate_core::AuditSink;
use hookgate_core::Clock;
use hookgate_core::ToolCallAuditEvent;
use hookgate_core::WebhookEvent;
use hookgate_core::event_names;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;
use serde_json::json;
use thiserror::Error;

// ============================================================================
// SECTION: Definitions
// ============================================================================

/// JSON type accepted for a tool parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    /// JSON string.
    String,
    /// JSON number.
    Number,
    /// JSON boolean.
    Boolean,
    /// JSON object.
    Object,
    /// JSON array.
    Array,
    /// Any JSON value, including `null`.
    Any,
}

impl ParamType {
    /// Returns true when `value` has this type.
    #[must_use]
    pub fn accepts(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::Object => value.is_object(),
            Self::Array => value.is_array(),
            Self::Any => true,
        }
    }

    /// Returns the lowercase type name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Object => "object",
            Self::Array => "array",
            Self::Any => "any",
        }
    }
}

/// Declared shape of one tool parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterSpec {
    /// Accepted JSON type.
    #[serde(rename = "type")]
    pub param_type: ParamType,
    /// Human-readable description.
    pub description: String,
    /// Whether the parameter must be present.
    #[serde(default = "default_required")]
    pub required: bool,
}

/// Parameters are required unless declared otherwise.
const fn default_required() -> bool {
    true
}

impl ParameterSpec {
    /// Declares a required parameter.
    #[must_use]
    pub fn required(param_type: ParamType, description: impl Into<String>) -> Self {
        Self {
            param_type,
            description: description.into(),
            required: true,
        }
    }

    /// Declares an optional parameter.
    #[must_use]
    pub fn optional(param_type: ParamType, description: impl Into<String>) -> Self {
        Self {
            param_type,
            description: description.into(),
            required: false,
        }
    }
}

/// Advertised tool contract.
///
/// # Invariants
/// - `name` is unique within a [`ToolGateway`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// Declared parameters keyed by name.
    pub parameters: BTreeMap<String, ParameterSpec>,
}

impl ToolDefinition {
    /// Creates a definition with no parameters.
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: BTreeMap::new(),
        }
    }

    /// Adds a parameter declaration.
    #[must_use]
    pub fn param(mut self, name: impl Into<String>, spec: ParameterSpec) -> Self {
        self.parameters.insert(name.into(), spec);
        self
    }

    /// Validates `params` and returns them as an object.
    ///
    /// Unknown keys are rejected. `null` satisfies only `any`.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::InvalidParams`] when the object does not match.
    pub fn validate(&self, params: Value) -> Result<Map<String, Value>, ToolError> {
        let object = match params {
            Value::Object(object) => object,
            Value::Null => Map::new(),
            _ => return Err(ToolError::InvalidParams("parameters must be an object".to_string())),
        };
        if let Some(unknown) = object.keys().find(|key| !self.parameters.contains_key(*key)) {
            return Err(ToolError::InvalidParams(format!("unknown parameter: {unknown}")));
        }
        for (name, spec) in &self.parameters {
            match object.get(name) {
                None if spec.required => {
                    return Err(ToolError::InvalidParams(format!("missing parameter: {name}")));
                }
                Some(value) if !spec.param_type.accepts(value) => {
                    return Err(ToolError::InvalidParams(format!(
                        "parameter {name} must be {}",
                        spec.param_type.as_str()
                    )));
                }
                _ => {}
            }
        }
        Ok(object)
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Tool registration and execution errors.
///
/// # Invariants
/// - Variants are stable for JSON-RPC error mapping.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToolError {
    /// No tool is registered under the name.
    #[error("unknown tool: {0}")]
    UnknownTool(String),
    /// Parameters did not match the declared shape.
    #[error("invalid parameters: {0}")]
    InvalidParams(String),
    /// A tool with the same name is already registered.
    #[error("duplicate tool: {0}")]
    DuplicateTool(String),
    /// The tool ran and failed.
    #[error("tool {name} failed: {cause}")]
    ExecutionFailed {
        /// Tool name.
        name: String,
        /// Failure description.
        cause: String,
    },
}

impl ToolError {
    /// Builds an execution failure for `name`.
    #[must_use]
    pub fn failed(name: &str, cause: impl Into<String>) -> Self {
        Self::ExecutionFailed {
            name: name.to_string(),
            cause: cause.into(),
        }
    }

    /// Returns a stable label for audit records.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::UnknownTool(_) => "unknown_tool",
            Self::InvalidParams(_) => "invalid_params",
            Self::DuplicateTool(_) => "duplicate_tool",
            Self::ExecutionFailed {
                ..
            } => "execution_failed",
        }
    }
}

// ============================================================================
// SECTION: Tool Trait
// ============================================================================

/// Named callable tool.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Returns the advertised contract.
    fn definition(&self) -> &ToolDefinition;

    /// Executes the tool with parameters already validated against
    /// [`Tool::definition`].
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::ExecutionFailed`] when the tool cannot complete.
    async fn execute(&self, params: &Map<String, Value>) -> Result<Value, ToolError>;
}

// ============================================================================
// SECTION: Notifying Decorator
// ============================================================================

/// Decorator publishing `mcp.tool.execute` after each successful call.
pub struct NotifyingTool {
    /// Wrapped tool.
    inner: Arc<dyn Tool>,
    /// Event publisher.
    publisher: Arc<dyn EventPublisher>,
    /// Clock for event timestamps.
    clock: Arc<dyn Clock>,
}

impl NotifyingTool {
    /// Wraps `inner`.
    #[must_use]
    pub fn new(
        inner: Arc<dyn Tool>,
        publisher: Arc<dyn EventPublisher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            inner,
            publisher,
            clock,
        }
    }
}

#[async_trait]
impl Tool for NotifyingTool {
    fn definition(&self) -> &ToolDefinition {
        self.inner.definition()
    }

    async fn execute(&self, params: &Map<String, Value>) -> Result<Value, ToolError> {
        let result = self.inner.execute(params).await?;
        let event = WebhookEvent::new(
            event_names::TOOL_EXECUTE,
            json!({
                "toolName": self.inner.definition().name,
                "parameters": params,
                "result": result,
                "timestamp": self.clock.now_rfc3339(),
            }),
        );
        self.publisher.publish(event).await;
        Ok(result)
    }
}

// ============================================================================
// SECTION: Gateway
// ============================================================================

/// Registry and execution entry point for tools.
pub struct ToolGateway {
    /// Tools keyed by name.
    tools: RwLock<BTreeMap<String, Arc<dyn Tool>>>,
    /// Audit sink for tool calls.
    audit: Arc<dyn AuditSink>,
}

impl ToolGateway {
    /// Creates an empty gateway.
    #[must_use]
    pub fn new(audit: Arc<dyn AuditSink>) -> Self {
        Self {
            tools: RwLock::new(BTreeMap::new()),
            audit,
        }
    }

    /// Registers a tool under its definition name.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::DuplicateTool`] when the name is taken.
    pub fn register(&self, tool: Arc<dyn Tool>) -> Result<(), ToolError> {
        let name = tool.definition().name.clone();
        let mut guard = self.tools.write().unwrap_or_else(PoisonError::into_inner);
        if guard.contains_key(&name) {
            return Err(ToolError::DuplicateTool(name));
        }
        guard.insert(name, tool);
        Ok(())
    }

    /// Returns every definition ordered by name.
    #[must_use]
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let guard = self.tools.read().unwrap_or_else(PoisonError::into_inner);
        guard.values().map(|tool| tool.definition().clone()).collect()
    }

    /// Validates and executes the named tool.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError`] when the tool is unknown, the parameters are
    /// invalid, or execution fails.
    pub async fn execute(
        &self,
        session_id: Option<&str>,
        name: &str,
        params: Value,
    ) -> Result<Value, ToolError> {
        let result = self.run(name, params).await;
        self.audit.record_tool_call(&ToolCallAuditEvent::new(
            session_id.map(str::to_string),
            name.to_string(),
            result.as_ref().err().map(ToolError::kind),
        ));
        result
    }

    /// Looks up, validates, and runs a tool.
    async fn run(&self, name: &str, params: Value) -> Result<Value, ToolError> {
        let tool = {
            let guard = self.tools.read().unwrap_or_else(PoisonError::into_inner);
            guard.get(name).cloned()
        }
        .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;
        let params = tool.definition().validate(params)?;
        tool.execute(&params).await
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
