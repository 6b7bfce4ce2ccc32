//! 会话持久化后端
//!
//! 整个会话列表作为一个 JSON 数组存放在单一位置。文件不存在视为空列表。

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::session::ChatSession;

/// 持久化接口：整体读出 / 整体写入
pub trait SessionBackend: Send + Sync {
    fn load(&self) -> anyhow::Result<Vec<ChatSession>>;

    fn save(&self, sessions: &[ChatSession]) -> anyhow::Result<()>;
}

/// 单文件 JSON 后端
#[derive(Debug)]
pub struct JsonFileBackend {
    path: PathBuf,
}

impl JsonFileBackend {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl SessionBackend for JsonFileBackend {
    fn load(&self) -> anyhow::Result<Vec<ChatSession>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let data = std::fs::read_to_string(&self.path)?;
        if data.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&data)?)
    }

    /// 父目录不存在时自动创建
    fn save(&self, sessions: &[ChatSession]) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(sessions)?)?;
        Ok(())
    }
}

/// 内存后端：保存序列化后的文本，测试与无盘运行时使用
#[derive(Debug, Default)]
pub struct MemoryBackend {
    data: Mutex<Option<String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// 以已有的原始文本初始化（可为损坏数据）
    pub fn with_raw(raw: impl Into<String>) -> Self {
        Self {
            data: Mutex::new(Some(raw.into())),
        }
    }

    pub fn raw(&self) -> Option<String> {
        self.data.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl SessionBackend for MemoryBackend {
    fn load(&self) -> anyhow::Result<Vec<ChatSession>> {
        match self.raw() {
            Some(raw) if !raw.trim().is_empty() => Ok(serde_json::from_str(&raw)?),
            _ => Ok(Vec::new()),
        }
    }

    fn save(&self, sessions: &[ChatSession]) -> anyhow::Result<()> {
        let raw = serde_json::to_string(sessions)?;
        *self.data.lock().unwrap_or_else(|e| e.into_inner()) = Some(raw);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::Message;

    #[test]
    fn test_json_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let backend = JsonFileBackend::new(dir.path().join("nested/history.json"));
        assert!(backend.load().unwrap().is_empty());

        let mut session = ChatSession::new();
        session.messages.push(Message::user("How do I start oil painting?"));
        backend.save(std::slice::from_ref(&session)).unwrap();

        assert_eq!(backend.load().unwrap(), vec![session]);
    }

    #[test]
    fn test_json_file_corrupt_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(JsonFileBackend::new(&path).load().is_err());
    }

    #[test]
    fn test_memory_backend() {
        let backend = MemoryBackend::new();
        assert!(backend.load().unwrap().is_empty());
        backend.save(&[ChatSession::new()]).unwrap();
        assert_eq!(backend.load().unwrap().len(), 1);
        assert!(MemoryBackend::with_raw("[[").load().is_err());
    }
}
