//! 工具：注册表与联网搜索

pub mod registry;
pub mod search;

pub use registry::{FunctionDefinition, Tool, ToolDefinition, ToolRegistry};
pub use search::{SearchOutcome, SearchResult, SearchTool, SEARCH_TOOL_NAME};
