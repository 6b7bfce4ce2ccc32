//! 增量累加器：把一次生成的事件流还原为完整的思考文本、回答文本与工具调用列表
//!
//! 工具调用按 index 归并：同一 index 的分片中，非空的 id / name 覆盖旧值，非空的 arguments 追加。
//! arguments 在流结束前可能是半截 JSON，这里只拼接不解析。

use std::collections::BTreeMap;

use crate::llm::{GenerationEvent, ToolCallRequest};

/// 流结束后的完整结果
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Accumulated {
    pub reasoning: String,
    pub content: String,
    /// 按 index 升序
    pub tool_calls: Vec<ToolCallRequest>,
}

#[derive(Debug, Default)]
pub struct DeltaAccumulator {
    reasoning: String,
    content: String,
    tool_calls: BTreeMap<u32, ToolCallRequest>,
}

impl DeltaAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, event: &GenerationEvent) {
        if let Some(reasoning) = event.reasoning.as_deref().filter(|r| !r.is_empty()) {
            self.reasoning.push_str(reasoning);
        }

        if let Some(content) = event.content.as_deref() {
            self.content.push_str(content);
        }

        for fragment in &event.tool_calls {
            let entry = self.tool_calls.entry(fragment.index).or_default();
            if let Some(id) = fragment.call_id.as_deref().filter(|s| !s.is_empty()) {
                entry.call_id = id.to_string();
            }
            if let Some(name) = fragment.function_name.as_deref().filter(|s| !s.is_empty()) {
                entry.function_name = name.to_string();
            }
            if let Some(chunk) = fragment.argument_chunk.as_deref().filter(|s| !s.is_empty()) {
                entry.arguments.push_str(chunk);
            }
        }
    }

    pub fn finish(self) -> Accumulated {
        Accumulated {
            reasoning: self.reasoning,
            content: self.content,
            tool_calls: self.tool_calls.into_values().collect(),
        }
    }
}
