//! Coach - 兴趣教练 Web 聊天服务
//!
//! 入口：初始化日志、加载配置、组装模型客户端 / 搜索工具 / 会话存储，启动 axum 服务。

use std::sync::Arc;

use anyhow::Context;
use coach::config::{load_config, load_system_prompt, AppConfig};
use coach::core::{ChatOrchestrator, ShutdownManager};
use coach::llm::{LlmClient, OpenAiClient};
use coach::memory::{JsonFileBackend, SessionStore};
use coach::tools::{SearchTool, ToolRegistry};
use coach::web::{router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    coach::observability::init();

    let cfg = load_config(None).unwrap_or_else(|e| {
        tracing::warn!("Failed to load config, using defaults: {}", e);
        AppConfig::default()
    });

    let sessions = Arc::new(SessionStore::open(JsonFileBackend::new(&cfg.sessions.path)));
    let shutdown = Arc::new(ShutdownManager::new());
    shutdown.install_signal_handlers();

    let mut state = AppState::new(sessions).with_shutdown(Arc::clone(&shutdown));
    match OpenAiClient::from_config(&cfg.llm) {
        Some(client) => {
            let llm: Arc<dyn LlmClient> = Arc::new(client);
            let mut tools = ToolRegistry::new();
            tools.register(SearchTool::from_config(&cfg.search));
            tracing::info!(tools = ?tools.tool_names(), "tools registered");
            let orchestrator =
                ChatOrchestrator::new(llm, Arc::new(tools), load_system_prompt(&cfg))
                    .with_idle_timeout(cfg.llm.timeouts.stream);
            state = state.with_orchestrator(orchestrator);
        }
        None => tracing::warn!(
            "No LLM API key configured (llm.api_key or {}); /api/chat will return 500",
            coach::config::LLM_API_KEY_ENV
        ),
    }

    let port = std::env::var("COACH_WEB_PORT")
        .ok()
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(cfg.web.port);
    let addr = format!("{}:{}", cfg.web.host, port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("Coach server listening on http://{}", addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown.wait_for_shutdown().await })
        .await?;

    tracing::info!("Coach server stopped");
    Ok(())
}
