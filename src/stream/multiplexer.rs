//! 多路复用输出：把思考 / 回答两路文本合成一条纯文本流
//!
//! 思考内容包在 `<think>` 与 `</think>` 之间，每次生成最多各出现一次，且 close 一定在 open 之后。
//! 规则（逐事件）：
//! 1. 有思考片段：尚未 open 则先输出 `<think>`，再原样输出片段
//! 2. 否则若思考已 open 未 close，且出现 content（含空串）或工具调用分片：输出 `</think>`
//! 3. 有 content 则原样输出
//!
//! 生成结束时若仍未 close，由 [`Multiplexer::finish`] 补上 `</think>`。

use crate::llm::GenerationEvent;

pub const THINK_OPEN: &str = "<think>";
pub const THINK_CLOSE: &str = "</think>";

/// 两次生成之间发生了工具调用时插入的提示（作为普通回答文本）
pub const SEARCH_STATUS_MARKER: &str = "\n\n> 🔍 正在联网搜索...\n\n";

/// 思考段的开闭状态；close 至多一次，且只能在 open 之后
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct StreamState {
    reasoning_open: bool,
    reasoning_closed: bool,
}

impl StreamState {
    /// 已 open 且尚未 close
    fn is_thinking(&self) -> bool {
        self.reasoning_open && !self.reasoning_closed
    }

    /// 首次调用返回 true（调用方应输出 open 标记）
    fn open(&mut self) -> bool {
        if self.reasoning_open {
            return false;
        }
        self.reasoning_open = true;
        true
    }

    /// 仅在思考中时生效并返回 true（调用方应输出 close 标记）
    fn close(&mut self) -> bool {
        if !self.is_thinking() {
            return false;
        }
        self.reasoning_closed = true;
        true
    }
}

/// 单次生成的多路复用器；每次生成使用新的实例，状态互不影响
#[derive(Debug, Default)]
pub struct Multiplexer {
    state: StreamState,
}

impl Multiplexer {
    pub fn new() -> Self {
        Self::default()
    }

    /// 处理一个事件，按顺序返回要写出的片段（不含空串）
    pub fn push<'a>(&mut self, event: &'a GenerationEvent) -> Vec<&'a str> {
        let mut out = Vec::new();

        if let Some(reasoning) = event.reasoning.as_deref().filter(|r| !r.is_empty()) {
            if self.state.open() {
                out.push(THINK_OPEN);
            }
            out.push(reasoning);
        } else if (event.content.is_some() || !event.tool_calls.is_empty()) && self.state.close() {
            out.push(THINK_CLOSE);
        }

        if let Some(content) = event.content.as_deref().filter(|c| !c.is_empty()) {
            out.push(content);
        }

        out
    }

    /// 生成结束：思考段未闭合时返回 close 标记
    pub fn finish(&mut self) -> Option<&'static str> {
        self.state.close().then_some(THINK_CLOSE)
    }
}
