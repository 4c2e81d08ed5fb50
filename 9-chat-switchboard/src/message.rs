use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Broadcast,
    Private,
}

/// A message in transit through a session's mailbox.
///
/// The body is carried exactly as the sender supplied it; attribution lives
/// in `from` and is only applied when the message is rendered.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub from: String,
    pub body: String,
    pub kind: MessageKind,
}

impl Message {
    pub fn broadcast(from: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            body: body.into(),
            kind: MessageKind::Broadcast,
        }
    }

    pub fn private(from: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            body: body.into(),
            kind: MessageKind::Private,
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            MessageKind::Broadcast => write!(f, "<{}> {}", self.from, self.body),
            MessageKind::Private => write!(f, "*{}* {}", self.from, self.body),
        }
    }
}
