//! 会话存储
//!
//! 维护会话列表（新建的排在最前）与当前活动会话。每次修改列表后立即整体写回后端；
//! 写回失败只记录警告，内存中的状态照常生效。列表永远不为空。

use std::sync::{Mutex, MutexGuard};

use super::persistence::SessionBackend;
use super::session::{ChatSession, Message};
use crate::core::SessionError;

struct Inner {
    sessions: Vec<ChatSession>,
    active_id: String,
}

pub struct SessionStore {
    backend: Box<dyn SessionBackend>,
    inner: Mutex<Inner>,
}

impl SessionStore {
    /// 从后端加载；数据为空或无法解析时以一个新会话开始
    pub fn open(backend: impl SessionBackend + 'static) -> Self {
        let mut sessions = match backend.load() {
            Ok(sessions) => sessions,
            Err(e) => {
                tracing::warn!("Failed to load chat history, starting fresh: {}", e);
                Vec::new()
            }
        };
        let fresh = sessions.is_empty();
        if fresh {
            sessions.push(ChatSession::new());
        }
        let active_id = sessions[0].id.clone();
        let store = Self {
            backend: Box::new(backend),
            inner: Mutex::new(Inner {
                sessions,
                active_id,
            }),
        };
        if fresh {
            store.persist(&store.lock().sessions);
        }
        store
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn persist(&self, sessions: &[ChatSession]) {
        if let Err(e) = self.backend.save(sessions) {
            tracing::warn!("Failed to persist chat history: {}", e);
        }
    }

    /// 在锁内修改会话列表，成功后写回
    fn mutate<T>(
        &self,
        f: impl FnOnce(&mut Inner) -> Result<T, SessionError>,
    ) -> Result<T, SessionError> {
        let mut inner = self.lock();
        let out = f(&mut inner)?;
        self.persist(&inner.sessions);
        Ok(out)
    }

    pub fn list_sessions(&self) -> Vec<ChatSession> {
        self.lock().sessions.clone()
    }

    pub fn active_id(&self) -> String {
        self.lock().active_id.clone()
    }

    pub fn active_session(&self) -> ChatSession {
        let inner = self.lock();
        inner
            .sessions
            .iter()
            .find(|s| s.id == inner.active_id)
            .or_else(|| inner.sessions.first())
            .cloned()
            .unwrap_or_default()
    }

    pub fn get(&self, id: &str) -> Option<ChatSession> {
        self.lock().sessions.iter().find(|s| s.id == id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.lock().sessions.iter().any(|s| s.id == id)
    }

    /// 新建会话：插到最前并设为活动会话
    pub fn create_session(&self) -> ChatSession {
        let session = ChatSession::new();
        let created = session.clone();
        let mut inner = self.lock();
        inner.active_id = session.id.clone();
        inner.sessions.insert(0, session);
        self.persist(&inner.sessions);
        created
    }

    pub fn switch_active(&self, id: &str) -> Result<(), SessionError> {
        let mut inner = self.lock();
        if !inner.sessions.iter().any(|s| s.id == id) {
            return Err(SessionError::SessionNotFound(id.to_string()));
        }
        inner.active_id = id.to_string();
        Ok(())
    }

    pub fn rename_session(&self, id: &str, title: &str) -> Result<ChatSession, SessionError> {
        self.mutate(|inner| {
            let session = find_mut(&mut inner.sessions, id)?;
            session.title = title.to_string();
            Ok(session.clone())
        })
    }

    /// 删除会话。删的是活动会话时改为第一个剩余会话；删空后自动补一个新会话
    pub fn delete_session(&self, id: &str) -> Result<(), SessionError> {
        self.mutate(|inner| {
            let pos = inner
                .sessions
                .iter()
                .position(|s| s.id == id)
                .ok_or_else(|| SessionError::SessionNotFound(id.to_string()))?;
            inner.sessions.remove(pos);
            if inner.sessions.is_empty() {
                inner.sessions.push(ChatSession::new());
            }
            if inner.active_id == id {
                inner.active_id = inner.sessions[0].id.clone();
            }
            Ok(())
        })
    }

    pub fn append_message(&self, session_id: &str, message: Message) -> Result<(), SessionError> {
        self.mutate(|inner| {
            find_mut(&mut inner.sessions, session_id)?.messages.push(message);
            Ok(())
        })
    }

    pub fn update_message_content(
        &self,
        session_id: &str,
        message_id: &str,
        content: &str,
    ) -> Result<(), SessionError> {
        self.mutate(|inner| {
            let message = find_mut(&mut inner.sessions, session_id)?
                .message_mut(message_id)
                .ok_or_else(|| SessionError::MessageNotFound(message_id.to_string()))?;
            message.content = content.to_string();
            Ok(())
        })
    }
}

fn find_mut<'a>(
    sessions: &'a mut [ChatSession],
    id: &str,
) -> Result<&'a mut ChatSession, SessionError> {
    sessions
        .iter_mut()
        .find(|s| s.id == id)
        .ok_or_else(|| SessionError::SessionNotFound(id.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{JsonFileBackend, MemoryBackend};
    use std::sync::Arc;

    /// 共享同一份数据的后端，便于检查写回结果
    #[derive(Clone, Default)]
    struct Shared(Arc<MemoryBackend>);

    impl SessionBackend for Shared {
        fn load(&self) -> anyhow::Result<Vec<ChatSession>> {
            self.0.load()
        }
        fn save(&self, sessions: &[ChatSession]) -> anyhow::Result<()> {
            self.0.save(sessions)
        }
    }

    struct FailingSave;

    impl SessionBackend for FailingSave {
        fn load(&self) -> anyhow::Result<Vec<ChatSession>> {
            Ok(Vec::new())
        }
        fn save(&self, _sessions: &[ChatSession]) -> anyhow::Result<()> {
            anyhow::bail!("disk full")
        }
    }

    #[test]
    fn test_first_use_creates_one_session() {
        let backend = Shared::default();
        let store = SessionStore::open(backend.clone());
        let sessions = store.list_sessions();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].title, "New Chat");
        assert_eq!(store.active_id(), sessions[0].id);
        assert_eq!(backend.load().unwrap(), sessions);
    }

    #[test]
    fn test_corrupt_data_starts_fresh() {
        let store = SessionStore::open(MemoryBackend::with_raw("{oops"));
        assert_eq!(store.list_sessions().len(), 1);
    }

    #[test]
    fn test_create_prepends_and_activates() {
        let store = SessionStore::open(MemoryBackend::new());
        let first = store.active_id();
        let created = store.create_session();
        let ids: Vec<_> = store.list_sessions().into_iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![created.id.clone(), first]);
        assert_eq!(store.active_id(), created.id);
    }

    #[test]
    fn test_switch_and_rename() {
        let store = SessionStore::open(MemoryBackend::new());
        let first = store.active_id();
        store.create_session();
        store.switch_active(&first).unwrap();
        assert_eq!(store.active_session().id, first);

        let renamed = store.rename_session(&first, "Oil painting").unwrap();
        assert_eq!(renamed.title, "Oil painting");
        assert_eq!(store.get(&first).unwrap().title, "Oil painting");

        assert_eq!(
            store.switch_active("nope"),
            Err(SessionError::SessionNotFound("nope".into()))
        );
        assert!(store.rename_session("nope", "x").is_err());
    }

    #[test]
    fn test_delete_never_leaves_zero_sessions() {
        let store = SessionStore::open(MemoryBackend::new());
        let only = store.active_id();
        store.delete_session(&only).unwrap();
        let sessions = store.list_sessions();
        assert_eq!(sessions.len(), 1);
        assert_ne!(sessions[0].id, only);
        assert_eq!(store.active_id(), sessions[0].id);
    }

    #[test]
    fn test_delete_active_switches_to_first_remaining() {
        let store = SessionStore::open(MemoryBackend::new());
        let a = store.active_id();
        let b = store.create_session().id;
        let c = store.create_session().id;
        // 顺序：c, b, a；活动为 c
        store.delete_session(&c).unwrap();
        assert_eq!(store.active_id(), b);

        // 删除非活动会话不改变活动会话
        store.delete_session(&a).unwrap();
        assert_eq!(store.active_id(), b);
        assert_eq!(store.list_sessions().len(), 1);

        assert!(store.delete_session("missing").is_err());
    }

    #[test]
    fn test_messages_append_and_update() {
        let backend = Shared::default();
        let store = SessionStore::open(backend.clone());
        let sid = store.active_id();
        let assistant = Message::assistant("");
        let mid = assistant.id.clone();
        store.append_message(&sid, Message::user("hi")).unwrap();
        store.append_message(&sid, assistant).unwrap();
        store
            .update_message_content(&sid, &mid, "<think>r</think>Hello")
            .unwrap();

        let persisted = backend.load().unwrap();
        assert_eq!(persisted[0].messages.len(), 2);
        assert_eq!(persisted[0].messages[1].content, "<think>r</think>Hello");

        assert_eq!(
            store.update_message_content(&sid, "nope", "x"),
            Err(SessionError::MessageNotFound("nope".into()))
        );
        assert!(store.append_message("nope", Message::user("x")).is_err());
    }

    #[test]
    fn test_persist_failure_keeps_memory_state() {
        let store = SessionStore::open(FailingSave);
        let created = store.create_session();
        assert_eq!(store.active_id(), created.id);
        assert_eq!(store.list_sessions().len(), 2);
    }

    #[test]
    fn test_reload_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chat_history.json");
        let (first, second) = {
            let store = SessionStore::open(JsonFileBackend::new(&path));
            let first = store.active_id();
            let second = store.create_session().id;
            store.rename_session(&first, "kept").unwrap();
            (first, second)
        };
        let store = SessionStore::open(JsonFileBackend::new(&path));
        let ids: Vec<_> = store.list_sessions().into_iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![second.clone(), first.clone()]);
        // 重新加载后活动会话为第一个
        assert_eq!(store.active_id(), second);
        assert_eq!(store.get(&first).unwrap().title, "kept");
    }
}
