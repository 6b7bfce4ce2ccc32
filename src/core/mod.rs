//! 核心编排层：错误类型、工具调用编排器、优雅关闭

pub mod error;
pub mod orchestrator;
pub mod shutdown;

pub use error::{ChatError, SessionError};
pub use orchestrator::{ChatOrchestrator, Exchange, Phase, TokenSink};
pub use shutdown::ShutdownManager;
