use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use time::OffsetDateTime;

/// Opaque identifier of a message in a conversation.
///
/// Stores hand out ids as strings or integers; both deserialize into a `MessageId`, which always
/// serializes back as a string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    /// Create a new `MessageId`.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MessageId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for MessageId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&MessageId> for MessageId {
    fn from(id: &MessageId) -> Self {
        id.clone()
    }
}

impl From<u64> for MessageId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl Borrow<str> for MessageId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for MessageId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::str::FromStr for MessageId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}

impl<'de> Deserialize<'de> for MessageId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawMessageId {
            Text(String),
            Number(u64),
        }

        Ok(match RawMessageId::deserialize(deserializer)? {
            RawMessageId::Text(id) => MessageId(id),
            RawMessageId::Number(id) => MessageId(id.to_string()),
        })
    }
}

/// A message record as read from the message store.
///
/// `content` is the text known when the record was read.  A message whose body is still being
/// generated usually arrives with empty content; its chunks are supplied separately as a
/// [`ContentSource`](crate::ContentSource).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Unique id of the message.
    pub id: MessageId,

    /// Id of the parent message, `None` for a root.
    #[serde(default, alias = "parentId", skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<MessageId>,

    /// Materialized text of the message.
    #[serde(default, alias = "message")]
    pub content: String,

    /// Author of the message, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,

    /// When the message was written, if known.
    #[serde(
        default,
        with = "crate::utils::time",
        skip_serializing_if = "Option::is_none"
    )]
    pub timestamp: Option<OffsetDateTime>,
}

impl Message {
    /// Create a new root message.
    pub fn new(id: impl Into<MessageId>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            parent_id: None,
            content: content.into(),
            author: None,
            timestamp: None,
        }
    }

    /// Create a new message replying to `parent_id`.
    pub fn reply(
        id: impl Into<MessageId>,
        parent_id: impl Into<MessageId>,
        content: impl Into<String>,
    ) -> Self {
        Self::new(id, content).with_parent(parent_id)
    }

    /// Set the parent of this message.
    pub fn with_parent(mut self, parent_id: impl Into<MessageId>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    /// Set the author of this message.
    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    /// Set the timestamp of this message.
    pub fn with_timestamp(mut self, timestamp: OffsetDateTime) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Returns true if this message has no parent.
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, to_value};
    use time::macros::datetime;

    #[test]
    fn message_serialization() {
        let message = Message::reply("2", "1", "A")
            .with_author("assistant")
            .with_timestamp(datetime!(2025-01-02 03:04:05 UTC));
        let json = to_value(&message).unwrap();

        assert_eq!(
            json,
            json!({
                "id": "2",
                "parent_id": "1",
                "content": "A",
                "author": "assistant",
                "timestamp": "2025-01-02T03:04:05Z"
            })
        );
    }

    #[test]
    fn root_omits_optional_fields() {
        let json = to_value(Message::new("1", "Hi")).unwrap();
        assert_eq!(json, json!({"id": "1", "content": "Hi"}));
    }

    #[test]
    fn message_deserialization_accepts_integer_ids_and_camel_case_parent() {
        let json = json!({
            "id": 3,
            "parentId": 1,
            "content": "B",
            "timestamp": null
        });

        let message: Message = serde_json::from_value(json).unwrap();
        assert_eq!(message.id.as_str(), "3");
        assert_eq!(message.parent_id, Some(MessageId::from("1")));
        assert!(message.timestamp.is_none());
        assert!(!message.is_root());
    }

    #[test]
    fn missing_content_defaults_to_empty() {
        let message: Message = serde_json::from_value(json!({"id": "pending"})).unwrap();
        assert_eq!(message.content, "");
        assert!(message.is_root());
    }

    #[test]
    fn invalid_timestamp_is_rejected() {
        let result: Result<Message, _> =
            serde_json::from_value(json!({"id": "1", "timestamp": "yesterday"}));
        assert!(result.is_err());
    }
}
