//! 工具层：提供给 LLM 的视觉工具目录与带超时/审计的后端执行器

pub mod catalog;
pub mod executor;

pub use catalog::{
    catalog_json, parse_tool_call, tool_call_schema_json, GenerateArgs, HybridArgs, SearchArgs,
    ToolCall, ToolCallError, ToolInvocation, VisualTool,
};
pub use executor::BackendExecutor;
