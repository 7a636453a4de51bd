// models/src/medical/chat.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Conversation key shared by both participants, independent of who sends.
pub fn conversation_id(a: &str, b: &str) -> String {
    if a <= b {
        format!("{}_{}", a, b)
    } else {
        format!("{}_{}", b, a)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub conversation_id: String,
    pub sender_uid: String,
    pub recipient_uid: String,
    pub body: String,
    pub sent_at: DateTime<Utc>,
    #[serde(default)]
    pub read: bool,
}

#[cfg(test)]
mod tests {
    use super::conversation_id;

    #[test]
    fn should_key_conversations_symmetrically() {
        assert_eq!(conversation_id("u2", "u1"), conversation_id("u1", "u2"));
        assert_eq!(conversation_id("u1", "u2"), "u1_u2");
    }
}
