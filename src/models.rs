//! Wire types shared by the room session and whoever renders it.
use chrono::{DateTime, Local, TimeZone};
use serde::{Deserialize, Serialize};

use crate::error::{ChatErr, ChatResult};

/// One message as the room server sends it, either alone or inside a
/// history array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub username:  String,
    pub content:   String,
    pub room_id:   String,
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_picture: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_id: Option<String>,
}

impl ChatMessage {
    /// Whether `me` wrote this message.
    ///
    /// A usable `senderId` decides on its own. Older history entries carry no
    /// id, so those fall back to comparing the display name.
    pub fn is_mine(&self, me: &Identity) -> bool {
        match (usable(self.sender_id.as_deref()), usable(me.user_id.as_deref())) {
            (Some(sender), Some(mine)) => sender == mine,
            (Some(_), None) => false,
            (None, _) => !me.display_name.is_empty() && self.username == me.display_name,
        }
    }
}

fn usable(id: Option<&str>) -> Option<&str> {
    id.filter(|s| !s.is_empty())
}

/// Outbound shape. There is no `senderPicture`: the server fills that in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingMessage {
    pub username:  String,
    pub content:   String,
    pub room_id:   String,
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_id: Option<String>,
}

impl OutgoingMessage {
    pub fn new<Tz: TimeZone>(me: &Identity, room_id: &str, content: &str, at: DateTime<Tz>) -> Self
    where
        Tz::Offset: std::fmt::Display,
    {
        Self {
            username:  me.display_name.clone(),
            content:   content.to_string(),
            room_id:   room_id.to_string(),
            timestamp: stamp(at),
            sender_id: me.user_id.clone(),
        }
    }

    pub fn now(me: &Identity, room_id: &str, content: &str) -> Self {
        Self::new(me, room_id, content, Local::now())
    }
}

/// 24-hour `HH:MM`, zero padded, no seconds.
pub fn stamp<Tz: TimeZone>(at: DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    at.format("%H:%M").to_string()
}

/// Local user as handed over by the auth collaborator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identity {
    pub display_name: String,
    pub user_id:      Option<String>,
}

impl Identity {
    pub fn new(display_name: impl Into<String>, user_id: Option<String>) -> Self {
        Self { display_name: display_name.into(), user_id }
    }
}

/// The two payload shapes that share one channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Sent once right after connect. Replaces the whole log.
    History(Vec<ChatMessage>),
    /// Every message after that. Appended.
    Live(ChatMessage),
}

impl Frame {
    /// Array first, then a single object. Anything else is a shape error
    /// carrying both failures.
    pub fn decode(raw: &str) -> ChatResult<Frame> {
        let history = match serde_json::from_str::<Vec<ChatMessage>>(raw) {
            Ok(list) => return Ok(Frame::History(list)),
            Err(e) => e,
        };
        serde_json::from_str::<ChatMessage>(raw)
            .map(Frame::Live)
            .map_err(|live| ChatErr::Shape { history, live })
    }
}
