// crates/hookgate-mcp/src/catalog.rs
// ============================================================================
// Module: Built-in Catalog
// Description: Data-grid, chart, and finance tools plus advertised resources
//              and prompts.
// Purpose: Provide the capabilities advertised to agents at session start.
// Dependencies: serde_json
// ============================================================================

//! ## Overview
//! Data-grid tools describe edits the calling surface applies to its own
//! state, so their results echo the validated request. They are registered
//! behind [`NotifyingTool`] so every edit reaches webhook destinations.
//! Chart and finance tools are registered plain.
//!
//! `forecast_revenue` fits a least-squares line over the history and projects
//! it forward; identical inputs always produce identical forecasts.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use hookgate_broker::EventPublisher;
use hookgate_core::Clock;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;
use serde_json::json;

use crate::tools::NotifyingTool;
use crate::tools::ParamType;
use crate::tools::ParameterSpec;
use crate::tools::Tool;
use crate::tools::ToolDefinition;
use crate::tools::ToolError;
use crate::tools::ToolGateway;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Column types accepted by `add_column`.
const COLUMN_TYPES: [&str; 5] = ["text", "number", "date", "select", "media"];
/// Upper bound on `forecastPeriods`.
pub const MAX_FORECAST_PERIODS: u64 = 120;
/// Identifier of the schema resource.
pub const DATA_SCHEMA_RESOURCE: &str = "data_schema";

// ============================================================================
// SECTION: Built-in Tool
// ============================================================================

/// Synchronous handler body of a built-in tool.
type Handler = fn(&str, &Map<String, Value>) -> Result<Value, ToolError>;

/// Tool backed by a plain function.
struct BuiltinTool {
    /// Advertised contract.
    definition: ToolDefinition,
    /// Handler body.
    handler: Handler,
}

#[async_trait]
impl Tool for BuiltinTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn execute(&self, params: &Map<String, Value>) -> Result<Value, ToolError> {
        (self.handler)(&self.definition.name, params)
    }
}

/// Returns a parameter known to be present after validation.
fn field<'a>(params: &'a Map<String, Value>, name: &str) -> &'a Value {
    params.get(name).unwrap_or(&Value::Null)
}

/// Reads a validated numeric parameter as `f64`.
fn number(tool: &str, params: &Map<String, Value>, name: &str) -> Result<f64, ToolError> {
    field(params, name)
        .as_f64()
        .filter(|value| value.is_finite())
        .ok_or_else(|| ToolError::failed(tool, format!("{name} must be a finite number")))
}

// ============================================================================
// SECTION: Data Grid Tools
// ============================================================================

/// Echoes a cell edit.
fn update_cell(_tool: &str, params: &Map<String, Value>) -> Result<Value, ToolError> {
    Ok(json!({
        "success": true,
        "rowIndex": field(params, "rowIndex"),
        "columnId": field(params, "columnId"),
        "value": field(params, "value"),
    }))
}

/// Echoes a new row.
fn add_row(_tool: &str, params: &Map<String, Value>) -> Result<Value, ToolError> {
    Ok(json!({
        "success": true,
        "rowData": field(params, "rowData"),
    }))
}

/// Echoes a new column after checking its type.
fn add_column(tool: &str, params: &Map<String, Value>) -> Result<Value, ToolError> {
    let column_type = field(params, "columnType").as_str().unwrap_or_default();
    if !COLUMN_TYPES.contains(&column_type) {
        return Err(ToolError::failed(tool, format!("unsupported column type: {column_type}")));
    }
    Ok(json!({
        "success": true,
        "columnName": field(params, "columnName"),
        "columnType": column_type,
    }))
}

/// Summarizes the requested analysis.
fn analyze_data(tool: &str, params: &Map<String, Value>) -> Result<Value, ToolError> {
    let columns = field(params, "columns")
        .as_array()
        .map(|columns| columns.iter().filter_map(Value::as_str).collect::<Vec<_>>())
        .unwrap_or_default();
    if columns.is_empty() {
        return Err(ToolError::failed(tool, "columns must name at least one column"));
    }
    let analysis_type = field(params, "analysisType").as_str().unwrap_or_default();
    Ok(json!({
        "success": true,
        "insights": format!("Analysis of {} showing {analysis_type}", columns.join(", ")),
        "visualizationType": "chart",
    }))
}

/// Describes the enrichment applied to a column.
fn enrich_data(_tool: &str, params: &Map<String, Value>) -> Result<Value, ToolError> {
    let enrichment_type = field(params, "enrichmentType").as_str().unwrap_or_default();
    let column_id = field(params, "columnId").as_str().unwrap_or_default();
    let new_columns: Vec<String> =
        (1 ..= 2).map(|index| format!("{column_id}_{enrichment_type}_{index}")).collect();
    Ok(json!({
        "success": true,
        "message": format!("Enriched data using {enrichment_type}"),
        "newColumns": new_columns,
    }))
}

// ============================================================================
// SECTION: Chart Tools
// ============================================================================

/// Echoes a chart definition.
fn create_chart(_tool: &str, params: &Map<String, Value>) -> Result<Value, ToolError> {
    Ok(json!({
        "success": true,
        "chartType": field(params, "chartType"),
        "dataSource": field(params, "dataSource"),
        "options": params.get("options").cloned().unwrap_or_else(|| json!({})),
    }))
}

/// Echoes a chart change set.
fn update_chart(_tool: &str, params: &Map<String, Value>) -> Result<Value, ToolError> {
    Ok(json!({
        "success": true,
        "chartId": field(params, "chartId"),
        "changes": field(params, "changes"),
    }))
}

// ============================================================================
// SECTION: Finance Tools
// ============================================================================

/// Computes return on investment and its per-year average.
fn calculate_roi(tool: &str, params: &Map<String, Value>) -> Result<Value, ToolError> {
    let investment = number(tool, params, "investment")?;
    let returns = number(tool, params, "returns")?;
    let timeframe = number(tool, params, "timeframe")?;
    if investment == 0.0 {
        return Err(ToolError::failed(tool, "investment must be non-zero"));
    }
    if timeframe <= 0.0 {
        return Err(ToolError::failed(tool, "timeframe must be positive"));
    }
    let roi = (returns - investment) / investment * 100.0;
    Ok(json!({
        "success": true,
        "roi": roi,
        "annualizedRoi": roi / timeframe,
        "message": format!("ROI is {roi:.2}% over {timeframe} years"),
    }))
}

/// Returns `(intercept, slope)` of the least-squares line through `history`.
fn linear_trend(history: &[f64]) -> (f64, f64) {
    let n = history.len();
    if n < 2 {
        return (history.first().copied().unwrap_or(0.0), 0.0);
    }
    let xs: Vec<f64> = (0 .. n).map(|index| index as f64).collect();
    let count = xs.len() as f64;
    let mean_x = xs.iter().sum::<f64>() / count;
    let mean_y = history.iter().sum::<f64>() / count;
    let covariance: f64 =
        xs.iter().zip(history).map(|(x, y)| (x - mean_x) * (y - mean_y)).sum::<f64>();
    let variance: f64 = xs.iter().map(|x| (x - mean_x).powi(2)).sum::<f64>();
    let slope = covariance / variance;
    (mean_y - slope * mean_x, slope)
}

/// Projects a linear trend over `forecastPeriods` future periods.
fn forecast_revenue(tool: &str, params: &Map<String, Value>) -> Result<Value, ToolError> {
    let history = field(params, "historicalData")
        .as_array()
        .map(|values| values.iter().map(Value::as_f64).collect::<Option<Vec<f64>>>())
        .unwrap_or_default()
        .ok_or_else(|| ToolError::failed(tool, "historicalData must contain only numbers"))?;
    if history.is_empty() {
        return Err(ToolError::failed(tool, "historicalData must not be empty"));
    }
    let periods = field(params, "forecastPeriods")
        .as_u64()
        .filter(|periods| (1 ..= MAX_FORECAST_PERIODS).contains(periods))
        .ok_or_else(|| {
            ToolError::failed(
                tool,
                format!("forecastPeriods must be an integer in 1..={MAX_FORECAST_PERIODS}"),
            )
        })?;
    let (intercept, slope) = linear_trend(&history);
    let last_index = history.len() - 1;
    let forecast: Vec<Value> = (1 ..= periods)
        .map(|step| {
            let x = (last_index as f64) + step as f64;
            json!({
                "period": format!("Future {step}"),
                "value": intercept + slope * x,
            })
        })
        .collect();
    Ok(json!({
        "success": true,
        "trend": {"intercept": intercept, "slope": slope},
        "forecast": forecast,
    }))
}

// ============================================================================
// SECTION: Registration
// ============================================================================

/// Data-grid tool definitions with their handlers.
fn data_grid_tools() -> Vec<BuiltinTool> {
    vec![
        BuiltinTool {
            definition: ToolDefinition::new(
                "update_cell",
                "Update a cell in the data grid with a new value",
            )
            .param("rowIndex", ParameterSpec::required(ParamType::Number, "Row index (zero-based)"))
            .param("columnId", ParameterSpec::required(ParamType::String, "Column ID"))
            .param("value", ParameterSpec::required(ParamType::Any, "New cell value")),
            handler: update_cell,
        },
        BuiltinTool {
            definition: ToolDefinition::new("add_row", "Add a new row to the data grid").param(
                "rowData",
                ParameterSpec::required(ParamType::Object, "Data for the new row"),
            ),
            handler: add_row,
        },
        BuiltinTool {
            definition: ToolDefinition::new("add_column", "Add a new column to the data grid")
                .param(
                    "columnName",
                    ParameterSpec::required(ParamType::String, "Name of the new column"),
                )
                .param(
                    "columnType",
                    ParameterSpec::required(
                        ParamType::String,
                        "Type of the column (text, number, date, select, media)",
                    ),
                ),
            handler: add_column,
        },
        BuiltinTool {
            definition: ToolDefinition::new(
                "analyze_data",
                "Analyze data in the grid and return insights",
            )
            .param("columns", ParameterSpec::required(ParamType::Array, "Columns to analyze"))
            .param(
                "analysisType",
                ParameterSpec::required(
                    ParamType::String,
                    "Type of analysis (summary, trends, correlations)",
                ),
            ),
            handler: analyze_data,
        },
        BuiltinTool {
            definition: ToolDefinition::new("enrich_data", "Enrich data using external sources")
                .param(
                    "columnId",
                    ParameterSpec::required(ParamType::String, "Column ID to use as source"),
                )
                .param(
                    "enrichmentType",
                    ParameterSpec::required(
                        ParamType::String,
                        "Type of enrichment (company_info, person_details, location_data)",
                    ),
                ),
            handler: enrich_data,
        },
    ]
}

/// Chart and finance tool definitions with their handlers.
fn plain_tools() -> Vec<BuiltinTool> {
    vec![
        BuiltinTool {
            definition: ToolDefinition::new("create_chart", "Create a new chart visualization")
                .param(
                    "chartType",
                    ParameterSpec::required(
                        ParamType::String,
                        "Type of chart (bar, line, pie, scatter)",
                    ),
                )
                .param(
                    "dataSource",
                    ParameterSpec::required(ParamType::Object, "Data source for the chart"),
                )
                .param(
                    "options",
                    ParameterSpec::optional(ParamType::Object, "Chart configuration options"),
                ),
            handler: create_chart,
        },
        BuiltinTool {
            definition: ToolDefinition::new("update_chart", "Update an existing chart")
                .param(
                    "chartId",
                    ParameterSpec::required(ParamType::String, "ID of the chart to update"),
                )
                .param(
                    "changes",
                    ParameterSpec::required(ParamType::Object, "Changes to apply to the chart"),
                ),
            handler: update_chart,
        },
        BuiltinTool {
            definition: ToolDefinition::new("calculate_roi", "Calculate return on investment")
                .param(
                    "investment",
                    ParameterSpec::required(ParamType::Number, "Initial investment amount"),
                )
                .param("returns", ParameterSpec::required(ParamType::Number, "Return amount"))
                .param(
                    "timeframe",
                    ParameterSpec::required(ParamType::Number, "Investment time in years"),
                ),
            handler: calculate_roi,
        },
        BuiltinTool {
            definition: ToolDefinition::new(
                "forecast_revenue",
                "Generate revenue forecast based on historical data",
            )
            .param(
                "historicalData",
                ParameterSpec::required(ParamType::Array, "Historical revenue data"),
            )
            .param(
                "forecastPeriods",
                ParameterSpec::required(ParamType::Number, "Number of periods to forecast"),
            ),
            handler: forecast_revenue,
        },
    ]
}

/// Registers the built-in tools on `gateway`.
///
/// Data-grid tools are wrapped with [`NotifyingTool`]; chart and finance
/// tools are registered as-is.
///
/// # Errors
///
/// Returns [`ToolError::DuplicateTool`] when a built-in name is already taken.
pub fn register_builtin_tools(
    gateway: &ToolGateway,
    publisher: &Arc<dyn EventPublisher>,
    clock: &Arc<dyn Clock>,
) -> Result<(), ToolError> {
    for tool in data_grid_tools() {
        gateway.register(Arc::new(NotifyingTool::new(
            Arc::new(tool),
            Arc::clone(publisher),
            Arc::clone(clock),
        )))?;
    }
    for tool in plain_tools() {
        gateway.register(Arc::new(tool))?;
    }
    Ok(())
}

// ============================================================================
// SECTION: Resources
// ============================================================================

/// Advertised resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceDescriptor {
    /// Resource identifier.
    pub id: String,
    /// Resource kind.
    #[serde(rename = "type")]
    pub kind: String,
    /// MIME type of `content`.
    pub mime_type: String,
    /// Serialized resource content.
    pub content: String,
}

/// Column of the advertised data schema.
fn column(id: &str, kind: &str, label: &str) -> Value {
    json!({"id": id, "type": kind, "label": label})
}

/// Returns the advertised resources.
#[must_use]
pub fn builtin_resources() -> Vec<ResourceDescriptor> {
    let schema = json!({
        "tables": [
            {
                "name": "Contacts",
                "columns": [
                    column("name", "text", "Name"),
                    column("email", "text", "Email"),
                    column("company", "text", "Company"),
                    column("role", "text", "Role"),
                    column("status", "select", "Status"),
                    column("lastContacted", "date", "Last Contacted"),
                ],
            },
            {
                "name": "Deals",
                "columns": [
                    column("name", "text", "Deal Name"),
                    column("value", "number", "Value"),
                    column("company", "text", "Company"),
                    column("stage", "select", "Stage"),
                    column("closingDate", "date", "Closing Date"),
                    column("owner", "text", "Owner"),
                ],
            },
        ],
    });
    vec![ResourceDescriptor {
        id: DATA_SCHEMA_RESOURCE.to_string(),
        kind: "json".to_string(),
        mime_type: "application/json".to_string(),
        content: schema.to_string(),
    }]
}

// ============================================================================
// SECTION: Prompts
// ============================================================================

/// Advertised prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromptDescriptor {
    /// Prompt identifier.
    pub id: String,
    /// Display title.
    pub title: String,
    /// Human-readable description.
    pub description: String,
    /// Declared arguments.
    pub parameters: BTreeMap<String, ParameterSpec>,
}

impl PromptDescriptor {
    /// Validates prompt arguments against the declared parameters.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::InvalidParams`] when the arguments do not match.
    pub fn validate(&self, arguments: Value) -> Result<Map<String, Value>, ToolError> {
        let schema = ToolDefinition {
            name: self.id.clone(),
            description: self.description.clone(),
            parameters: self.parameters.clone(),
        };
        schema.validate(arguments)
    }
}

/// Builds a prompt descriptor.
fn prompt(
    id: &str,
    title: &str,
    description: &str,
    parameters: &[(&str, ParameterSpec)],
) -> PromptDescriptor {
    PromptDescriptor {
        id: id.to_string(),
        title: title.to_string(),
        description: description.to_string(),
        parameters: parameters
            .iter()
            .map(|(name, spec)| ((*name).to_string(), spec.clone()))
            .collect(),
    }
}

/// Returns the advertised prompts.
#[must_use]
pub fn builtin_prompts() -> Vec<PromptDescriptor> {
    vec![
        prompt(
            "data_analysis",
            "Analyze Data",
            "Analyze the provided data and suggest insights",
            &[
                (
                    "data",
                    ParameterSpec::required(
                        ParamType::String,
                        "Data to analyze in CSV or JSON format",
                    ),
                ),
                ("goal", ParameterSpec::required(ParamType::String, "Analysis goal")),
            ],
        ),
        prompt(
            "generate_report",
            "Generate Report",
            "Generate a report based on the provided data",
            &[
                (
                    "data",
                    ParameterSpec::required(
                        ParamType::String,
                        "Data to use for the report in CSV or JSON format",
                    ),
                ),
                ("reportType", ParameterSpec::required(ParamType::String, "Type of report")),
            ],
        ),
        prompt(
            "inhabit",
            "Inhabit Component",
            "Request AI to inhabit a specific component",
            &[
                (
                    "targetId",
                    ParameterSpec::required(ParamType::String, "ID of the component to inhabit"),
                ),
                (
                    "context",
                    ParameterSpec::optional(ParamType::Object, "Context data for the inhabitation"),
                ),
            ],
        ),
        prompt(
            "release",
            "Release Component",
            "Request AI to release a component",
            &[(
                "targetId",
                ParameterSpec::required(ParamType::String, "ID of the component to release"),
            )],
        ),
    ]
}

/// Renders the user message for a text prompt, or `None` for unknown ids.
#[must_use]
pub fn render_prompt(id: &str, arguments: &Map<String, Value>) -> Option<String> {
    let text = |name: &str| arguments.get(name).and_then(Value::as_str).unwrap_or_default();
    match id {
        "data_analysis" => Some(format!(
            "Analyze the following data and suggest insights. Goal: {}\n\n{}",
            text("goal"),
            text("data")
        )),
        "generate_report" => Some(format!(
            "Generate a {} report based on the following data.\n\n{}",
            text("reportType"),
            text("data")
        )),
        _ => None,
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
