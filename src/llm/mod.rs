//! LLM 层：流式生成接口抽象与实现（OpenAI 兼容 / Mock）

pub mod mock;
pub mod openai;
pub mod traits;
pub mod types;

pub use mock::{MockLlmClient, ScriptedPass};
pub use openai::OpenAiClient;
pub use traits::{EventStream, LlmClient, LlmError};
pub use types::{
    ChatCompletionChunk, ChatMessage, GenerationEvent, GenerationRequest, ToolCallFragment,
    ToolCallRequest,
};
