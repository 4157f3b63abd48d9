//! In-memory store: one `RwLock` over both tables so a message append can
//! touch its session's `updated_at` in the same critical section.

use chrono::Utc;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use super::{
    ChatSession, Message, MessageStore, NewMessage, NewSession, SessionStore, StoreError,
};

const DEFAULT_SESSION_TITLE: &str = "New chat";

#[derive(Default)]
struct Tables {
    sessions: FxHashMap<String, ChatSession>,
    /// Per-session messages, kept in insertion (= `order_index`) order.
    messages: FxHashMap<String, Vec<Message>>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemoryStore {
    fn list_sessions(&self) -> Vec<ChatSession> {
        let tables = self.tables.read();
        let mut sessions: Vec<ChatSession> = tables.sessions.values().cloned().collect();
        sessions.sort_by(|a, b| {
            b.updated_at
                .cmp(&a.updated_at)
                .then_with(|| b.created_at.cmp(&a.created_at))
        });
        sessions
    }

    fn create_session(&self, new: NewSession) -> Result<ChatSession, StoreError> {
        let id = match new.id {
            Some(id) if !id.is_empty() => id,
            _ => uuid::Uuid::new_v4().to_string(),
        };
        let now = Utc::now();
        let session = ChatSession {
            id: id.clone(),
            title: new
                .title
                .unwrap_or_else(|| DEFAULT_SESSION_TITLE.to_string()),
            model: new.model,
            created_at: now,
            updated_at: now,
        };

        let mut tables = self.tables.write();
        if tables.sessions.contains_key(&id) {
            return Err(StoreError::DuplicateSession(id));
        }
        tables.sessions.insert(id, session.clone());
        Ok(session)
    }

    fn delete_session(&self, id: &str) -> Result<(), StoreError> {
        let mut tables = self.tables.write();
        if tables.sessions.remove(id).is_none() {
            return Err(StoreError::SessionNotFound(id.to_string()));
        }
        tables.messages.remove(id);
        Ok(())
    }
}

impl MessageStore for MemoryStore {
    fn list_messages(&self, session_id: &str) -> Vec<Message> {
        let tables = self.tables.read();
        tables
            .messages
            .get(session_id)
            .cloned()
            .unwrap_or_default()
    }

    fn create_message(&self, session_id: &str, new: NewMessage) -> Result<Message, StoreError> {
        let mut tables = self.tables.write();
        if !tables.sessions.contains_key(session_id) {
            return Err(StoreError::SessionNotFound(session_id.to_string()));
        }

        let now = Utc::now();
        let entries = tables.messages.entry(session_id.to_string()).or_default();
        let order_index = entries.last().map_or(0, |last| last.order_index + 1);
        let message = Message {
            id: uuid::Uuid::new_v4().to_string(),
            session_id: session_id.to_string(),
            role: new.role,
            content: new.content,
            reasoning_content: new.reasoning_content,
            images: new.images,
            order_index,
            created_at: now,
        };
        entries.push(message.clone());

        if let Some(session) = tables.sessions.get_mut(session_id) {
            session.updated_at = now;
        }
        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::MemoryStore;
    use crate::store::{
        ImageAttachment, MessageStore, NewMessage, NewSession, Role, SessionStore, StoreError,
    };

    fn new_session(id: Option<&str>, title: Option<&str>) -> NewSession {
        NewSession {
            id: id.map(String::from),
            title: title.map(String::from),
            model: "GPT-OSS-120B".to_string(),
        }
    }

    fn user_message(content: &str) -> NewMessage {
        NewMessage {
            role: Role::User,
            content: content.to_string(),
            reasoning_content: None,
            images: None,
        }
    }

    #[test]
    fn create_generates_uuid_when_id_absent_or_empty() {
        let store = MemoryStore::new();
        let generated = store.create_session(new_session(None, None)).expect("create");
        assert!(uuid::Uuid::parse_str(&generated.id).is_ok());

        let from_empty = store
            .create_session(new_session(Some(""), None))
            .expect("create");
        assert!(uuid::Uuid::parse_str(&from_empty.id).is_ok());
        assert_ne!(generated.id, from_empty.id);
    }

    #[test]
    fn create_honors_client_id_and_title() {
        let store = MemoryStore::new();
        let session = store
            .create_session(new_session(Some("abc"), Some("My chat")))
            .expect("create");
        assert_eq!(session.id, "abc");
        assert_eq!(session.title, "My chat");
        assert_eq!(session.model, "GPT-OSS-120B");
        assert_eq!(session.created_at, session.updated_at);
    }

    #[test]
    fn missing_title_defaults_but_empty_title_is_kept() {
        let store = MemoryStore::new();
        let defaulted = store
            .create_session(new_session(Some("a"), None))
            .expect("create");
        assert_eq!(defaulted.title, "New chat");

        let empty = store
            .create_session(new_session(Some("b"), Some("")))
            .expect("create");
        assert_eq!(empty.title, "");
    }

    #[test]
    fn duplicate_id_is_rejected() {
        let store = MemoryStore::new();
        store
            .create_session(new_session(Some("dup"), None))
            .expect("create");
        let err = store
            .create_session(new_session(Some("dup"), None))
            .expect_err("duplicate");
        assert!(matches!(err, StoreError::DuplicateSession(id) if id == "dup"));
    }

    #[test]
    fn list_orders_by_updated_at_descending() {
        let store = MemoryStore::new();
        store
            .create_session(new_session(Some("first"), None))
            .expect("create");
        store
            .create_session(new_session(Some("second"), None))
            .expect("create");
        store
            .create_session(new_session(Some("third"), None))
            .expect("create");

        // Appending a message bumps "first" to the top.
        store.create_message("first", user_message("hi")).expect("append");

        let ids: Vec<String> = store
            .list_sessions()
            .into_iter()
            .map(|session| session.id)
            .collect();
        assert_eq!(ids[0], "first");
        assert_eq!(ids.len(), 3);
    }

    #[test]
    fn order_index_is_contiguous_from_zero() {
        let store = MemoryStore::new();
        store
            .create_session(new_session(Some("s"), None))
            .expect("create");
        for expected in 0..3u32 {
            let message = store.create_message("s", user_message("m")).expect("append");
            assert_eq!(message.order_index, expected);
        }
        let listed = store.list_messages("s");
        let indexes: Vec<u32> = listed.iter().map(|m| m.order_index).collect();
        assert_eq!(indexes, [0, 1, 2]);
    }

    #[test]
    fn append_touches_session_updated_at() {
        let store = MemoryStore::new();
        let created = store
            .create_session(new_session(Some("s"), None))
            .expect("create");
        store.create_message("s", user_message("hi")).expect("append");

        let sessions = store.list_sessions();
        assert!(sessions[0].updated_at >= created.updated_at);
    }

    #[test]
    fn append_to_unknown_session_is_not_found() {
        let store = MemoryStore::new();
        let err = store
            .create_message("ghost", user_message("hi"))
            .expect_err("not found");
        assert!(matches!(err, StoreError::SessionNotFound(id) if id == "ghost"));
    }

    #[test]
    fn list_messages_of_unknown_session_is_empty() {
        let store = MemoryStore::new();
        assert!(store.list_messages("ghost").is_empty());
    }

    #[test]
    fn delete_cascades_to_messages() {
        let store = MemoryStore::new();
        store
            .create_session(new_session(Some("s"), None))
            .expect("create");
        store.create_message("s", user_message("hi")).expect("append");

        store.delete_session("s").expect("delete");
        assert!(store.list_sessions().is_empty());
        assert!(store.list_messages("s").is_empty());

        let err = store.delete_session("s").expect_err("second delete");
        assert!(matches!(err, StoreError::SessionNotFound(_)));
    }

    #[test]
    fn message_round_trips_reasoning_and_images() {
        let store = MemoryStore::new();
        store
            .create_session(new_session(Some("s"), None))
            .expect("create");
        let message = store
            .create_message(
                "s",
                NewMessage {
                    role: Role::Assistant,
                    content: "answer".to_string(),
                    reasoning_content: Some("because".to_string()),
                    images: Some(vec![ImageAttachment {
                        base64: "aGk=".to_string(),
                        mime_type: "image/png".to_string(),
                    }]),
                },
            )
            .expect("append");

        let listed = store.list_messages("s");
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0], message);
        assert_eq!(listed[0].reasoning_content.as_deref(), Some("because"));
        assert_eq!(
            listed[0].images.as_ref().map(|images| images.len()),
            Some(1)
        );
    }
}
