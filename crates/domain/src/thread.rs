//! Messaging-thread types shared by the thread store and the assistant.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::tool::Message;

/// Identifier of a message author (a partner in the host application).
pub type PartnerId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    Comment,
    Notification,
    /// A stored function-role result (empty body, payload carries it).
    BotFunction,
    /// A stored assistant tool call (empty body, payload carries it).
    BotFunctionRequest,
}

impl MessageType {
    /// Function entries are kept in history even though their body is empty.
    pub fn is_function(self) -> bool {
        matches!(self, MessageType::BotFunction | MessageType::BotFunctionRequest)
    }
}

/// A message as stored by the host thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadMessage {
    pub id: u64,
    pub body: String,
    pub author_id: PartnerId,
    pub message_type: MessageType,
    #[serde(default)]
    pub subtype: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_payload: Option<Message>,
    pub created_at: DateTime<Utc>,
}

/// A message about to be appended to a thread.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMessage {
    pub body: String,
    pub author_id: PartnerId,
    pub message_type: MessageType,
    pub subtype: Option<String>,
    pub function_payload: Option<Message>,
}

impl NewMessage {
    pub fn comment(body: impl Into<String>, author_id: PartnerId) -> Self {
        Self {
            body: body.into(),
            author_id,
            message_type: MessageType::Comment,
            subtype: None,
            function_payload: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    /// One-on-one direct conversation.
    Chat,
    /// Named multi-member channel.
    Channel,
    /// Ad-hoc group conversation.
    Group,
}

/// Where a message was posted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "target", rename_all = "snake_case")]
pub enum ThreadTarget {
    /// A discussion channel.
    Channel {
        id: String,
        kind: ChannelKind,
        #[serde(default)]
        member_ids: Vec<PartnerId>,
    },
    /// The chatter of a single business record.
    Record { model: String, id: i64 },
}

impl ThreadTarget {
    /// Stable key used to address the thread in the store.
    pub fn key(&self) -> String {
        match self {
            ThreadTarget::Channel { id, .. } => id.clone(),
            ThreadTarget::Record { model, id } => format!("{model}-{id}"),
        }
    }

    pub fn is_channel(&self) -> bool {
        matches!(self, ThreadTarget::Channel { .. })
    }
}

/// The thread lookup result the trigger gate decides on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadInfo {
    pub target: ThreadTarget,
    /// How many host records the thread lookup matched; the assistant only
    /// answers when this is exactly one.
    pub matched_records: usize,
}

impl ThreadInfo {
    pub fn single(target: ThreadTarget) -> Self {
        Self { target, matched_records: 1 }
    }
}

/// A candidate message as delivered by the messaging event dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingMessage {
    pub author_id: PartnerId,
    pub body: String,
    pub message_type: MessageType,
    /// Partners explicitly addressed (mentions).
    pub recipient_ids: Vec<PartnerId>,
    /// An explicit command supplied alongside the message, if any.
    pub command: Option<String>,
}

impl IncomingMessage {
    pub fn comment(author_id: PartnerId, body: impl Into<String>) -> Self {
        Self {
            author_id,
            body: body.into(),
            message_type: MessageType::Comment,
            recipient_ids: Vec::new(),
            command: None,
        }
    }
}
