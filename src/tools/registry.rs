//! 工具注册表
//!
//! 所有工具实现 Tool trait（name / description / parameters_schema / execute），由 ToolRegistry 按名注册与查找。
//! 注册表同时负责生成提供给模型的函数工具声明（OpenAI `tools` 数组中的条目）。

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

/// 工具 trait：名称、描述（供 LLM 理解）、参数 schema、异步执行（args 为 JSON）
#[async_trait]
pub trait Tool: Send + Sync {
    /// 工具名称（模型 tool_calls 中的 function.name）
    fn name(&self) -> &str;

    /// 工具描述（供 LLM 理解功能）
    fn description(&self) -> &str;

    /// 参数 JSON Schema；默认无参数
    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {},
            "required": []
        })
    }

    /// 提供给模型的工具声明
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::function(self.name(), self.description(), self.parameters_schema())
    }

    /// 执行工具，返回写入 tool 消息的文本（通常是 JSON）
    async fn execute(&self, args: Value) -> Result<String, String>;
}

/// 函数工具声明：`{"type": "function", "function": {name, description, parameters}}`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDefinition {
    #[serde(rename = "type")]
    pub kind: String,
    pub function: FunctionDefinition,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl ToolDefinition {
    pub fn function(name: &str, description: &str, parameters: Value) -> Self {
        Self {
            kind: "function".to_string(),
            function: FunctionDefinition {
                name: name.to_string(),
                description: description.to_string(),
                parameters,
            },
        }
    }
}

/// 工具注册表：按名称存储 Arc<dyn Tool>；按名称排序，保证声明顺序稳定
#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: impl Tool + 'static) {
        let name = tool.name().to_string();
        self.tools.insert(name, Arc::new(tool));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    /// 第一次生成时随请求发送的工具声明
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.definition()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Upper;

    #[async_trait]
    impl Tool for Upper {
        fn name(&self) -> &str {
            "upper"
        }

        fn description(&self) -> &str {
            "Uppercase text"
        }

        async fn execute(&self, args: Value) -> Result<String, String> {
            args.get("text")
                .and_then(|v| v.as_str())
                .map(|s| s.to_uppercase())
                .ok_or_else(|| "Missing text".to_string())
        }
    }

    #[tokio::test]
    async fn test_register_and_lookup() {
        let mut registry = ToolRegistry::new();
        assert!(registry.tool_names().is_empty());
        registry.register(Upper);
        assert_eq!(registry.tool_names(), vec!["upper".to_string()]);
        assert!(registry.get("lower").is_none());
        let tool = registry.get("upper").unwrap();
        let out = tool.execute(serde_json::json!({"text": "abc"})).await.unwrap();
        assert_eq!(out, "ABC");
    }

    #[test]
    fn test_definition_shape() {
        let mut registry = ToolRegistry::new();
        registry.register(Upper);
        let defs = serde_json::to_value(registry.definitions()).unwrap();
        assert_eq!(defs[0]["type"], "function");
        assert_eq!(defs[0]["function"]["name"], "upper");
        assert_eq!(defs[0]["function"]["parameters"]["type"], "object");
    }
}
