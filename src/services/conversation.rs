//! Conversation Service
//!
//! In-memory multi-turn conversation state keyed by an opaque UUID. Each
//! conversation keeps a bounded window of recent messages and expires after
//! a configurable idle TTL. Every read path consults the TTL, so an expired
//! conversation is invisible immediately; physical removal only happens in
//! the periodic cleanup sweep (reads filter, they never evict).

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::models::{Message, Role};

/// Errors that can occur during conversation operations
#[derive(Debug, Error)]
pub enum ConversationError {
    #[error("Conversation {0} not found or expired")]
    NotFound(String),

    #[error("Invalid conversation store configuration: {0}")]
    InvalidConfig(String),
}

/// Configuration for the conversation store
#[derive(Debug, Clone)]
pub struct ConversationConfig {
    /// Idle seconds after which a conversation expires (default: 30 minutes)
    pub ttl_secs: u64,
    /// Maximum retained turns; one turn is a user message plus an assistant
    /// reply, so the message window is `2 * max_turns`
    pub max_turns: usize,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 1800,
            max_turns: 10,
        }
    }
}

/// A single conversation with its bounded message history.
#[derive(Debug, Clone)]
pub struct Conversation {
    pub id: String,
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    max_turns: usize,
}

impl Conversation {
    fn new(id: String, now: DateTime<Utc>, max_turns: usize) -> Self {
        Self {
            id,
            messages: Vec::new(),
            created_at: now,
            last_activity: now,
            max_turns,
        }
    }

    fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.last_activity > ttl
    }

    /// Trim to the retention policy: every system message in original order,
    /// followed by the most recent `2 * max_turns` messages of the full
    /// sequence. System messages inside that tail are dropped from it rather
    /// than duplicated, since they are already carried in the prefix.
    fn trim(&mut self) {
        let max_messages = self.max_turns * 2;
        if self.messages.len() <= max_messages {
            return;
        }

        let tail_start = self.messages.len() - max_messages;
        let mut retained: Vec<Message> = self
            .messages
            .iter()
            .filter(|m| m.role == Role::System)
            .cloned()
            .collect();
        retained.extend(
            self.messages[tail_start..]
                .iter()
                .filter(|m| m.role != Role::System)
                .cloned(),
        );
        self.messages = retained;
    }
}

/// Conversation Service
///
/// One coarse lock guards the conversation map; `add_message` for a given id
/// therefore serializes, so the message sequence and `last_activity` never
/// see lost updates.
pub struct ConversationService {
    config: ConversationConfig,
    conversations: RwLock<HashMap<String, Conversation>>,
}

impl ConversationService {
    /// Create a conversation store, rejecting zero TTL or zero turns.
    pub fn new(config: ConversationConfig) -> Result<Self, ConversationError> {
        if config.ttl_secs == 0 {
            return Err(ConversationError::InvalidConfig(
                "ttl_secs must be at least 1".to_string(),
            ));
        }
        if config.max_turns == 0 {
            return Err(ConversationError::InvalidConfig(
                "max_turns must be at least 1".to_string(),
            ));
        }
        info!(
            ttl_secs = config.ttl_secs,
            max_turns = config.max_turns,
            "Conversation store initialized"
        );
        Ok(Self {
            config,
            conversations: RwLock::new(HashMap::new()),
        })
    }

    fn ttl(&self) -> Duration {
        Duration::seconds(self.config.ttl_secs as i64)
    }

    /// Create a new empty conversation and return its id.
    pub async fn create(&self) -> String {
        self.create_at(Utc::now()).await
    }

    pub async fn create_at(&self, now: DateTime<Utc>) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        let conversation = Conversation::new(id.clone(), now, self.config.max_turns);
        self.conversations
            .write()
            .await
            .insert(id.clone(), conversation);
        debug!(conversation_id = %id, "Conversation created");
        id
    }

    /// Append a message, bump `last_activity`, and apply the trim policy.
    ///
    /// Fails with [`ConversationError::NotFound`] when the id is absent or
    /// expired; a purged id is indistinguishable from one that never existed.
    pub async fn add_message(
        &self,
        conversation_id: &str,
        role: Role,
        content: impl Into<String>,
    ) -> Result<(), ConversationError> {
        self.add_message_at(conversation_id, role, content, Utc::now())
            .await
    }

    pub async fn add_message_at(
        &self,
        conversation_id: &str,
        role: Role,
        content: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<(), ConversationError> {
        let ttl = self.ttl();
        let mut conversations = self.conversations.write().await;
        let conversation = conversations
            .get_mut(conversation_id)
            .filter(|c| !c.is_expired(now, ttl))
            .ok_or_else(|| ConversationError::NotFound(conversation_id.to_string()))?;

        conversation.messages.push(Message {
            role,
            content: content.into(),
            timestamp: now,
        });
        conversation.last_activity = now;
        conversation.trim();
        Ok(())
    }

    /// Message history for a conversation; empty for unknown or expired ids.
    pub async fn get_history(&self, conversation_id: &str) -> Vec<Message> {
        self.get_history_at(conversation_id, Utc::now()).await
    }

    pub async fn get_history_at(
        &self,
        conversation_id: &str,
        now: DateTime<Utc>,
    ) -> Vec<Message> {
        let ttl = self.ttl();
        self.conversations
            .read()
            .await
            .get(conversation_id)
            .filter(|c| !c.is_expired(now, ttl))
            .map(|c| c.messages.clone())
            .unwrap_or_default()
    }

    /// Whether a non-expired conversation with this id is present.
    pub async fn exists(&self, conversation_id: &str) -> bool {
        self.exists_at(conversation_id, Utc::now()).await
    }

    pub async fn exists_at(&self, conversation_id: &str, now: DateTime<Utc>) -> bool {
        let ttl = self.ttl();
        self.conversations
            .read()
            .await
            .get(conversation_id)
            .is_some_and(|c| !c.is_expired(now, ttl))
    }

    /// Fetch a snapshot of a conversation; `None` for unknown or expired ids.
    pub async fn get(&self, conversation_id: &str) -> Option<Conversation> {
        let ttl = self.ttl();
        let now = Utc::now();
        self.conversations
            .read()
            .await
            .get(conversation_id)
            .filter(|c| !c.is_expired(now, ttl))
            .cloned()
    }

    /// Physically remove expired conversations and return the removed count.
    pub async fn cleanup_expired(&self) -> usize {
        self.cleanup_expired_at(Utc::now()).await
    }

    pub async fn cleanup_expired_at(&self, now: DateTime<Utc>) -> usize {
        let ttl = self.ttl();
        let mut conversations = self.conversations.write().await;
        let before = conversations.len();
        conversations.retain(|_, c| !c.is_expired(now, ttl));
        let removed = before - conversations.len();
        if removed > 0 {
            info!(removed, remaining = conversations.len(), "Expired conversations removed");
        }
        removed
    }

    /// Number of non-expired conversations currently held.
    pub async fn active_count(&self) -> usize {
        self.active_count_at(Utc::now()).await
    }

    pub async fn active_count_at(&self, now: DateTime<Utc>) -> usize {
        let ttl = self.ttl();
        self.conversations
            .read()
            .await
            .values()
            .filter(|c| !c.is_expired(now, ttl))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(ttl_secs: u64, max_turns: usize) -> ConversationService {
        ConversationService::new(ConversationConfig { ttl_secs, max_turns }).unwrap()
    }

    #[test]
    fn rejects_zero_config() {
        assert!(matches!(
            ConversationService::new(ConversationConfig {
                ttl_secs: 0,
                max_turns: 10
            }),
            Err(ConversationError::InvalidConfig(_))
        ));
        assert!(matches!(
            ConversationService::new(ConversationConfig {
                ttl_secs: 60,
                max_turns: 0
            }),
            Err(ConversationError::InvalidConfig(_))
        ));
    }

    #[tokio::test]
    async fn create_add_and_read_back() {
        let store = store(1800, 10);
        let id = store.create().await;

        store.add_message(&id, Role::User, "hi").await.unwrap();

        let history = store.get_history(&id).await;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].role, Role::User);
        assert_eq!(history[0].content, "hi");
    }

    #[tokio::test]
    async fn add_to_unknown_id_is_not_found() {
        let store = store(1800, 10);
        let err = store
            .add_message("bogus-id", Role::User, "x")
            .await
            .unwrap_err();
        assert!(matches!(err, ConversationError::NotFound(id) if id == "bogus-id"));
    }

    #[tokio::test]
    async fn ids_are_unique() {
        let store = store(1800, 10);
        let a = store.create().await;
        let b = store.create().await;
        assert_ne!(a, b);
        assert_eq!(store.active_count().await, 2);
    }

    #[tokio::test]
    async fn trims_to_most_recent_window() {
        // max_turns = 3: 20 appended messages leave exactly the last 6, in order.
        let store = store(1800, 3);
        let id = store.create().await;

        for i in 0..10 {
            store
                .add_message(&id, Role::User, format!("user-{i}"))
                .await
                .unwrap();
            store
                .add_message(&id, Role::Assistant, format!("assistant-{i}"))
                .await
                .unwrap();
        }

        let history = store.get_history(&id).await;
        assert_eq!(history.len(), 6);
        let contents: Vec<&str> = history.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(
            contents,
            vec![
                "user-7",
                "assistant-7",
                "user-8",
                "assistant-8",
                "user-9",
                "assistant-9"
            ]
        );
    }

    #[tokio::test]
    async fn system_messages_survive_trimming() {
        let store = store(1800, 3);
        let id = store.create().await;

        store
            .add_message(&id, Role::System, "persona")
            .await
            .unwrap();
        for i in 0..20 {
            store
                .add_message(&id, Role::User, format!("user-{i}"))
                .await
                .unwrap();
            store
                .add_message(&id, Role::Assistant, format!("assistant-{i}"))
                .await
                .unwrap();
        }

        let history = store.get_history(&id).await;
        // System prefix plus the 6 most recent non-system messages.
        assert_eq!(history.len(), 7);
        assert_eq!(history[0].role, Role::System);
        assert_eq!(history[0].content, "persona");
        assert_eq!(history[1].content, "user-17");
        assert_eq!(history[6].content, "assistant-19");
    }

    #[tokio::test]
    async fn recent_system_message_is_not_duplicated() {
        // A system message inside the trailing window appears once, carried
        // in the prefix rather than repeated in the tail.
        let store = store(1800, 2);
        let id = store.create().await;

        for i in 0..3 {
            store
                .add_message(&id, Role::User, format!("user-{i}"))
                .await
                .unwrap();
        }
        store
            .add_message(&id, Role::System, "late-system")
            .await
            .unwrap();
        for i in 3..6 {
            store
                .add_message(&id, Role::User, format!("user-{i}"))
                .await
                .unwrap();
        }

        let history = store.get_history(&id).await;
        let system_count = history
            .iter()
            .filter(|m| m.role == Role::System)
            .count();
        assert_eq!(system_count, 1);
        assert_eq!(history[0].content, "late-system");
    }

    #[tokio::test]
    async fn expired_conversations_are_invisible_and_swept() {
        let store = store(1, 10);
        let now = Utc::now();

        let id = store.create_at(now).await;
        store
            .add_message_at(&id, Role::User, "hi", now)
            .await
            .unwrap();

        // Two seconds idle with a one-second TTL: gone from every read.
        let later = now + Duration::seconds(2);
        assert!(!store.exists_at(&id, later).await);
        assert!(store.get_history_at(&id, later).await.is_empty());
        assert!(store
            .add_message_at(&id, Role::User, "again", later)
            .await
            .is_err());

        // Still physically present until the sweep runs.
        assert_eq!(store.active_count_at(later).await, 0);
        assert_eq!(store.cleanup_expired_at(later).await, 1);
        assert_eq!(store.cleanup_expired_at(later).await, 0);
    }

    #[tokio::test]
    async fn activity_refreshes_ttl() {
        let store = store(10, 10);
        let now = Utc::now();

        let id = store.create_at(now).await;
        let mid = now + Duration::seconds(8);
        store
            .add_message_at(&id, Role::User, "still here", mid)
            .await
            .unwrap();

        // 15s after creation but only 7s after the last message.
        let later = now + Duration::seconds(15);
        assert!(store.exists_at(&id, later).await);
    }

    #[tokio::test]
    async fn cleanup_keeps_live_conversations() {
        let store = store(60, 10);
        let now = Utc::now();

        let stale = store.create_at(now - Duration::seconds(120)).await;
        let live = store.create_at(now).await;

        assert_eq!(store.cleanup_expired_at(now).await, 1);
        assert!(!store.exists_at(&stale, now).await);
        assert!(store.exists_at(&live, now).await);
        assert_eq!(store.active_count_at(now).await, 1);
    }
}
