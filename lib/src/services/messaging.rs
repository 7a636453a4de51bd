// lib/src/services/messaging.rs

//! Direct messages between staff members.

use std::collections::BTreeMap;
use std::sync::Arc;

use models::errors::require_text;
use models::{conversation_id, new_document_id, ChatMessage, HospitalError, HospitalResult, StaffUser, ValidationError};
use serde::Serialize;
use serde_json::json;
use tracing::debug;

use crate::clock::Clock;
use crate::session::SessionContext;
use crate::storage_engine::{query_typed, to_document, Collection, DocumentStore, QueryFilter, WriteBatch};

use super::load;

pub const MAX_MESSAGE_CHARS: usize = 2000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    pub conversation_id: String,
    pub other_uid: String,
    pub last_message: ChatMessage,
    pub unread: usize,
}

#[derive(Debug, Clone)]
pub struct MessagingService {
    store: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
}

impl MessagingService {
    pub fn new(store: Arc<dyn DocumentStore>, clock: Arc<dyn Clock>) -> Self {
        MessagingService { store, clock }
    }

    pub async fn send(&self, session: &SessionContext, recipient_uid: &str, body: &str) -> HospitalResult<ChatMessage> {
        let body = require_text("message", body)?;
        if body.chars().count() > MAX_MESSAGE_CHARS {
            return Err(ValidationError::InvalidValue {
                field: "message".to_string(),
                reason: format!("longer than {} characters", MAX_MESSAGE_CHARS),
            }
            .into());
        }
        if recipient_uid == session.uid() {
            return Err(ValidationError::InvalidValue {
                field: "recipient".to_string(),
                reason: "cannot message yourself".to_string(),
            }
            .into());
        }
        let recipient: StaffUser = load(self.store.as_ref(), &Collection::Users.path(), recipient_uid, "Staff member").await?;
        if !recipient.active {
            return Err(HospitalError::invalid_state(format!("{} is no longer active", recipient.display_name)));
        }
        let message = ChatMessage {
            id: new_document_id(),
            conversation_id: conversation_id(session.uid(), recipient_uid),
            sender_uid: session.uid().to_string(),
            recipient_uid: recipient_uid.to_string(),
            body,
            sent_at: self.clock.now(),
            read: false,
        };
        let mut batch = WriteBatch::new();
        batch.create(Collection::Messages, message.id.clone(), to_document(&message)?);
        self.store.commit(batch).await?;
        debug!(conversation = %message.conversation_id, "Message sent");
        Ok(message)
    }

    /// Messages between two users, oldest first.
    pub async fn conversation(&self, uid_a: &str, uid_b: &str) -> HospitalResult<Vec<ChatMessage>> {
        let filters = [QueryFilter::eq("conversationId", conversation_id(uid_a, uid_b))];
        let mut messages: Vec<ChatMessage> = query_typed(self.store.as_ref(), &Collection::Messages.path(), &filters).await?;
        messages.sort_by(|a, b| a.sent_at.cmp(&b.sent_at));
        Ok(messages)
    }

    /// One summary per conversation `uid` takes part in, most recent first.
    pub async fn conversations(&self, uid: &str) -> HospitalResult<Vec<ConversationSummary>> {
        let path = Collection::Messages.path();
        let mut messages: Vec<ChatMessage> =
            query_typed(self.store.as_ref(), &path, &[QueryFilter::eq("senderUid", uid)]).await?;
        messages.extend(query_typed::<ChatMessage>(self.store.as_ref(), &path, &[QueryFilter::eq("recipientUid", uid)]).await?);

        let mut summaries: BTreeMap<String, ConversationSummary> = BTreeMap::new();
        for message in messages {
            let incoming_unread = message.recipient_uid == uid && !message.read;
            let other = if message.sender_uid == uid {
                message.recipient_uid.clone()
            } else {
                message.sender_uid.clone()
            };
            let summary = summaries.entry(message.conversation_id.clone()).or_insert_with(|| ConversationSummary {
                conversation_id: message.conversation_id.clone(),
                other_uid: other,
                last_message: message.clone(),
                unread: 0,
            });
            if incoming_unread {
                summary.unread += 1;
            }
            if message.sent_at > summary.last_message.sent_at {
                summary.last_message = message;
            }
        }
        let mut summaries: Vec<ConversationSummary> = summaries.into_values().collect();
        summaries.sort_by(|a, b| b.last_message.sent_at.cmp(&a.last_message.sent_at));
        Ok(summaries)
    }

    /// Marks the messages `other_uid` sent to the session user as read.
    pub async fn mark_conversation_read(&self, session: &SessionContext, other_uid: &str) -> HospitalResult<usize> {
        let unread: Vec<ChatMessage> = self
            .conversation(session.uid(), other_uid)
            .await?
            .into_iter()
            .filter(|m| m.recipient_uid == session.uid() && !m.read)
            .collect();
        if unread.is_empty() {
            return Ok(0);
        }
        let mut batch = WriteBatch::new();
        for message in &unread {
            batch.merge(Collection::Messages, message.id.clone(), [("read", json!(true))]);
        }
        self.store.commit(batch).await?;
        Ok(unread.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::storage_engine::InMemoryStore;
    use chrono::{Duration, Utc};
    use models::{Department, Role, StaffProfile};

    async fn seeded() -> (MessagingService, Arc<FixedClock>) {
        let store: Arc<dyn DocumentStore> = Arc::new(InMemoryStore::new());
        let clock = Arc::new(FixedClock::new(Utc::now()));
        let mut batch = WriteBatch::new();
        for uid in ["doc-1", "nurse-1"] {
            let user = StaffUser {
                uid: uid.to_string(),
                email: format!("{}@example.org", uid),
                display_name: uid.to_string(),
                department: Department::Medical,
                profile: StaffProfile::General { role: Role::Doctor },
                active: true,
                created_at: Utc::now(),
            };
            batch.create(Collection::Users, uid, to_document(&user).unwrap());
        }
        store.commit(batch).await.unwrap();
        (MessagingService::new(store, clock.clone()), clock)
    }

    fn session(uid: &str) -> SessionContext {
        let mut session = SessionContext::system();
        session.user.uid = uid.to_string();
        session
    }

    #[tokio::test]
    async fn should_reject_overlong_messages() {
        let (chat, _) = seeded().await;
        let body = "x".repeat(MAX_MESSAGE_CHARS + 1);
        assert!(chat.send(&session("doc-1"), "nurse-1", &body).await.is_err());
        assert!(chat.send(&session("doc-1"), "nurse-1", "   ").await.is_err());
    }

    #[tokio::test]
    async fn should_summarize_conversations_with_unread_counts() {
        let (chat, clock) = seeded().await;
        chat.send(&session("doc-1"), "nurse-1", "Bed 5 needs vitals").await.unwrap();
        clock.advance(Duration::minutes(1));
        chat.send(&session("doc-1"), "nurse-1", "Thanks").await.unwrap();

        let summaries = chat.conversations("nurse-1").await.unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].other_uid, "doc-1");
        assert_eq!(summaries[0].unread, 2);
        assert_eq!(summaries[0].last_message.body, "Thanks");

        assert_eq!(chat.mark_conversation_read(&session("nurse-1"), "doc-1").await.unwrap(), 2);
        assert_eq!(chat.conversations("nurse-1").await.unwrap()[0].unread, 0);
        assert_eq!(chat.conversation("nurse-1", "doc-1").await.unwrap().len(), 2);
    }
}
