//! 优雅关闭
//!
//! 进程级 CancellationToken：收到 Ctrl+C / SIGTERM 后取消，axum 停止接收新连接；
//! 每个流式请求持有它的子 token，关闭时正在进行的生成与搜索一并放弃。

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Default)]
pub struct ShutdownManager {
    root: CancellationToken,
}

impl ShutdownManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// 单个请求的子 token：进程关闭时随之取消，单独取消不影响其他请求
    pub fn request_token(&self) -> CancellationToken {
        self.root.child_token()
    }

    pub fn shutdown(&self) {
        self.root.cancel();
    }

    pub async fn wait_for_shutdown(&self) {
        self.root.cancelled().await;
    }

    /// Ctrl+C 与 SIGTERM（仅 unix）都触发关闭
    pub fn install_signal_handlers(self: &Arc<Self>) {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Received Ctrl+C, shutting down");
                manager.shutdown();
            }
        });

        #[cfg(unix)]
        {
            let manager = Arc::clone(self);
            tokio::spawn(async move {
                use tokio::signal::unix::{signal, SignalKind};
                match signal(SignalKind::terminate()) {
                    Ok(mut sigterm) => {
                        sigterm.recv().await;
                        tracing::info!("Received SIGTERM, shutting down");
                        manager.shutdown();
                    }
                    Err(e) => tracing::warn!("SIGTERM handler unavailable: {}", e),
                }
            });
        }
    }
}
