//! 视觉工具目录：提供给 LLM 的三个工具及其参数 Schema，以及工具调用的严格解析
//!
//! LLM 必须只输出一个 JSON 对象 `{"tool": "...", "args": {...}}`（允许整体包在 ```json 代码块里）。
//! 工具名必须与目录中的某个名字完全一致，参数必须能反序列化为对应的类型且字段非空；
//! 不做任何从自由文本里找工具名的子串匹配。

use std::fmt;
use std::str::FromStr;

use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::classify::Backend;

/// 可调用的视觉工具（封闭集合）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisualTool {
    SearchStockMedia,
    GenerateImage,
    ComposeHybrid,
}

impl VisualTool {
    pub const ALL: [VisualTool; 3] = [
        VisualTool::SearchStockMedia,
        VisualTool::GenerateImage,
        VisualTool::ComposeHybrid,
    ];

    pub fn name(self) -> &'static str {
        match self {
            VisualTool::SearchStockMedia => "search_stock_media",
            VisualTool::GenerateImage => "generate_image",
            VisualTool::ComposeHybrid => "compose_hybrid",
        }
    }

    /// 工具描述（供 LLM 理解功能）
    pub fn description(self) -> &'static str {
        match self {
            VisualTool::SearchStockMedia => {
                "Search real stock video footage. Use for ANY scene that shows people, faces, hands, \
                 professions or human actions, and for real-world places."
            }
            VisualTool::GenerateImage => {
                "Generate an image from a prompt. Use ONLY for abstract or conceptual scenes with no \
                 people at all (logos, holograms, data visualisation, empty futuristic spaces)."
            }
            VisualTool::ComposeHybrid => {
                "Real stock footage as the base plus a small generated overlay (hologram, chart, \
                 digital interface). Use when real people or places appear together with abstract digital elements."
            }
        }
    }

    /// 参数 JSON Schema（供 LLM 生成正确的参数格式）
    pub fn parameters_schema(self) -> Value {
        let schema = match self {
            VisualTool::SearchStockMedia => schema_for!(SearchArgs),
            VisualTool::GenerateImage => schema_for!(GenerateArgs),
            VisualTool::ComposeHybrid => schema_for!(HybridArgs),
        };
        serde_json::to_value(&schema).unwrap_or(Value::Null)
    }

    pub fn backend(self) -> Backend {
        match self {
            VisualTool::SearchStockMedia => Backend::MediaSearch,
            VisualTool::GenerateImage => Backend::MediaGenerate,
            VisualTool::ComposeHybrid => Backend::Hybrid,
        }
    }
}

impl fmt::Display for VisualTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for VisualTool {
    type Err = ToolCallError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VisualTool::ALL
            .into_iter()
            .find(|t| t.name() == s.trim())
            .ok_or_else(|| ToolCallError::UnknownTool(s.to_string()))
    }
}

/// search_stock_media 参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct SearchArgs {
    /// Short English keywords for the stock search, e.g. "woman laptop office"
    pub keywords: String,
}

/// generate_image 参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct GenerateArgs {
    /// Detailed image prompt; must not describe people
    pub prompt: String,
}

/// compose_hybrid 参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct HybridArgs {
    /// Keywords for the real base footage
    pub keywords: String,
    /// Prompt for the small abstract overlay asset (no people)
    pub overlay_prompt: String,
}

/// 解析后的工具调用
#[derive(Debug, Clone, PartialEq)]
pub enum ToolInvocation {
    Search(SearchArgs),
    Generate(GenerateArgs),
    Hybrid(HybridArgs),
}

impl ToolInvocation {
    pub fn tool(&self) -> VisualTool {
        match self {
            ToolInvocation::Search(_) => VisualTool::SearchStockMedia,
            ToolInvocation::Generate(_) => VisualTool::GenerateImage,
            ToolInvocation::Hybrid(_) => VisualTool::ComposeHybrid,
        }
    }
}

/// 工具调用格式：`{"tool": "...", "args": {...}}`
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ToolCall {
    /// One of: search_stock_media, generate_image, compose_hybrid
    pub tool: String,
    /// Arguments object matching the selected tool's parameters
    pub args: Value,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ToolCallError {
    #[error("Not a single JSON tool call: {0}")]
    NotJson(String),

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid arguments for {tool}: {reason}")]
    InvalidArgs { tool: VisualTool, reason: String },
}

/// 去掉整体包裹的 ```json 代码块；不从散文中提取 JSON
fn strip_fence(output: &str) -> &str {
    let trimmed = output.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

fn non_empty(tool: VisualTool, field: &str, value: &str) -> Result<(), ToolCallError> {
    if value.trim().is_empty() {
        return Err(ToolCallError::InvalidArgs {
            tool,
            reason: format!("{field} is empty"),
        });
    }
    Ok(())
}

fn typed_args<T: for<'de> Deserialize<'de>>(tool: VisualTool, args: Value) -> Result<T, ToolCallError> {
    serde_json::from_value(args).map_err(|e| ToolCallError::InvalidArgs {
        tool,
        reason: e.to_string(),
    })
}

/// 严格解析 LLM 输出的工具调用
pub fn parse_tool_call(output: &str) -> Result<ToolInvocation, ToolCallError> {
    let body = strip_fence(output);
    if !(body.starts_with('{') && body.ends_with('}')) {
        return Err(ToolCallError::NotJson(preview(body)));
    }
    let call: ToolCall =
        serde_json::from_str(body).map_err(|e| ToolCallError::NotJson(format!("{e}: {}", preview(body))))?;
    let tool: VisualTool = call.tool.parse()?;

    match tool {
        VisualTool::SearchStockMedia => {
            let args: SearchArgs = typed_args(tool, call.args)?;
            non_empty(tool, "keywords", &args.keywords)?;
            Ok(ToolInvocation::Search(args))
        }
        VisualTool::GenerateImage => {
            let args: GenerateArgs = typed_args(tool, call.args)?;
            non_empty(tool, "prompt", &args.prompt)?;
            Ok(ToolInvocation::Generate(args))
        }
        VisualTool::ComposeHybrid => {
            let args: HybridArgs = typed_args(tool, call.args)?;
            non_empty(tool, "keywords", &args.keywords)?;
            non_empty(tool, "overlay_prompt", &args.overlay_prompt)?;
            Ok(ToolInvocation::Hybrid(args))
        }
    }
}

fn preview(s: &str) -> String {
    if s.chars().count() > 120 {
        format!("{}...", s.chars().take(120).collect::<String>())
    } else {
        s.to_string()
    }
}

/// 三个工具的目录 JSON（name / description / parameters），拼入 system prompt
pub fn catalog_json() -> String {
    let tools: Vec<Value> = VisualTool::ALL
        .iter()
        .map(|t| {
            serde_json::json!({
                "name": t.name(),
                "description": t.description(),
                "parameters": t.parameters_schema(),
            })
        })
        .collect();
    serde_json::to_string_pretty(&tools).unwrap_or_else(|_| "[]".to_string())
}

/// 工具调用格式本身的 JSON Schema
pub fn tool_call_schema_json() -> String {
    let schema = schema_for!(ToolCall);
    serde_json::to_string_pretty(&schema).unwrap_or_default()
}
