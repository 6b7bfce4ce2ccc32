//! 把保存的原始回答文本拆成思考部分与回答部分，供界面展示

use serde::Serialize;

use crate::stream::{THINK_CLOSE, THINK_OPEN};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Transcript {
    /// 所有 `<think>` 段的文本，以空行连接；没有思考段时为 None
    pub thinking: Option<String>,
    pub answer: String,
    /// 最后一个思考段已闭合（或根本没有思考段）
    pub thinking_complete: bool,
}

pub fn split_thinking(content: &str) -> Transcript {
    let mut blocks: Vec<&str> = Vec::new();
    let mut answer = String::new();
    let mut thinking_complete = true;
    let mut rest = content;

    while let Some(start) = rest.find(THINK_OPEN) {
        answer.push_str(&rest[..start]);
        let inner = &rest[start + THINK_OPEN.len()..];
        match inner.find(THINK_CLOSE) {
            Some(end) => {
                blocks.push(&inner[..end]);
                rest = &inner[end + THINK_CLOSE.len()..];
            }
            None => {
                blocks.push(inner);
                thinking_complete = false;
                rest = "";
            }
        }
    }
    answer.push_str(rest);

    Transcript {
        thinking: (!blocks.is_empty()).then(|| blocks.join("\n\n")),
        answer: answer.trim().to_string(),
        thinking_complete,
    }
}
