//! 模型交互的数据结构
//!
//! - 请求侧：[`ChatMessage`]（system / user / assistant / tool 四种角色）与 [`GenerationRequest`]
//! - 响应侧：流式分片的线上格式 [`ChatCompletionChunk`]，以及归一化后的 [`GenerationEvent`]
//!
//! 线上格式只声明用到的字段，未知字段一律忽略（视为缺失），不会导致解析失败。

use serde::{Deserialize, Serialize};

use crate::tools::ToolDefinition;

/// 对话中的一条消息，序列化为 OpenAI 兼容格式（`role` 作为标签）
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum ChatMessage {
    System {
        content: String,
    },
    User {
        content: String,
    },
    /// content 为空时序列化为 null（仅携带 tool_calls 的助手轮次）
    Assistant {
        content: Option<String>,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCallRequest>,
    },
    Tool {
        tool_call_id: String,
        content: String,
    },
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self::System {
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::User {
            content: content.into(),
        }
    }

    /// 携带工具调用的助手消息；空文本记为 None
    pub fn assistant_tool_calls(content: String, tool_calls: Vec<ToolCallRequest>) -> Self {
        Self::Assistant {
            content: Some(content).filter(|c| !c.is_empty()),
            tool_calls,
        }
    }

    pub fn tool(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::Tool {
            tool_call_id: tool_call_id.into(),
            content: content.into(),
        }
    }

    pub fn role(&self) -> &'static str {
        match self {
            Self::System { .. } => "system",
            Self::User { .. } => "user",
            Self::Assistant { .. } => "assistant",
            Self::Tool { .. } => "tool",
        }
    }
}

/// 组装完成的工具调用：同一 index 的所有分片合并而来
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolCallRequest {
    pub call_id: String,
    pub function_name: String,
    /// 拼接后的参数串；仅在该次生成流结束后才保证是完整 JSON
    pub arguments: String,
}

impl Serialize for ToolCallRequest {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Function<'a> {
            name: &'a str,
            arguments: &'a str,
        }
        #[derive(Serialize)]
        struct Wire<'a> {
            id: &'a str,
            #[serde(rename = "type")]
            kind: &'static str,
            function: Function<'a>,
        }
        Wire {
            id: &self.call_id,
            kind: "function",
            function: Function {
                name: &self.function_name,
                arguments: &self.arguments,
            },
        }
        .serialize(serializer)
    }
}

/// 一次生成请求：对话 + 可用工具（为空表示禁用工具）
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub messages: Vec<ChatMessage>,
    pub tools: Vec<ToolDefinition>,
}

/// 工具调用分片：id / name / arguments 可能分散在任意多个事件里
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolCallFragment {
    pub index: u32,
    pub call_id: Option<String>,
    pub function_name: Option<String>,
    pub argument_chunk: Option<String>,
}

/// 模型流中的一个事件（已归一化）
///
/// - `reasoning`：空串视为缺失
/// - `content`：空串保留为 `Some("")`，部分服务商用它标记思考结束
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationEvent {
    pub reasoning: Option<String>,
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCallFragment>,
}

impl GenerationEvent {
    pub fn reasoning(text: impl Into<String>) -> Self {
        Self {
            reasoning: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn content(text: impl Into<String>) -> Self {
        Self {
            content: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn tool_call(fragment: ToolCallFragment) -> Self {
        Self {
            tool_calls: vec![fragment],
            ..Self::default()
        }
    }
}

/// 流式响应分片（`chat.completion.chunk`）的线上格式
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatCompletionChunk {
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChunkChoice {
    #[serde(default)]
    pub delta: Option<ChunkDelta>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChunkDelta {
    #[serde(default)]
    pub reasoning_content: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub tool_calls: Option<Vec<ToolCallChunk>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ToolCallChunk {
    #[serde(default)]
    pub index: u32,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub function: Option<FunctionChunk>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FunctionChunk {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub arguments: Option<String>,
}

impl From<ChatCompletionChunk> for GenerationEvent {
    /// 只看第一个 choice；没有 delta 的分片（如仅含 usage）得到空事件
    fn from(chunk: ChatCompletionChunk) -> Self {
        let Some(delta) = chunk.choices.into_iter().next().and_then(|c| c.delta) else {
            return GenerationEvent::default();
        };
        GenerationEvent {
            reasoning: delta.reasoning_content.filter(|r| !r.is_empty()),
            content: delta.content,
            tool_calls: delta
                .tool_calls
                .unwrap_or_default()
                .into_iter()
                .map(|tc| {
                    let (function_name, argument_chunk) = match tc.function {
                        Some(f) => (f.name, f.arguments),
                        None => (None, None),
                    };
                    ToolCallFragment {
                        index: tc.index,
                        call_id: tc.id,
                        function_name,
                        argument_chunk,
                    }
                })
                .collect(),
        }
    }
}
