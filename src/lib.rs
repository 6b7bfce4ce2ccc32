//! Coach - 兴趣教练 Web 聊天服务
//!
//! 模块划分：
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误类型、工具调用编排器（两阶段生成）、优雅关闭
//! - **llm**: 模型流式接口抽象与实现（OpenAI 兼容 / Mock）
//! - **memory**: 会话存储（ChatSession 持久化）与展示投影
//! - **observability**: 日志初始化
//! - **stream**: 增量累加器与 `<think>` 多路复用输出
//! - **tools**: 工具注册表与联网搜索工具
//! - **web**: axum 路由与 HTTP 处理器

pub mod config;
pub mod core;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod stream;
pub mod tools;
pub mod web;
