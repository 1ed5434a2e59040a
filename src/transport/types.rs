use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::io::AsyncRead;

/// Identity of a chat participant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatId(pub i64);

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Transport-assigned message identifier, also used as correlation token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub i64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque reference to a file held by the transport
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PayloadHandle {
    pub file_id: String,
}

impl PayloadHandle {
    pub fn new(file_id: impl Into<String>) -> Self {
        Self {
            file_id: file_id.into(),
        }
    }
}

pub type PayloadReader = Box<dyn AsyncRead + Send + Unpin>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Document,
    Video,
}

/// A file or video message
#[derive(Debug, Clone)]
pub struct InboundFile {
    pub sender: ChatId,
    pub message_id: MessageId,
    pub reply_to: Option<MessageId>,
    pub payload: PayloadHandle,
    pub file_name: Option<String>,
    pub kind: FileKind,
    pub size_bytes: u64,
}

impl InboundFile {
    /// Name the file is stored under
    ///
    /// Videos sent without a name get a synthetic one derived from the
    /// transport's file id.
    pub fn effective_name(&self) -> String {
        match (&self.file_name, self.kind) {
            (Some(name), _) if !name.trim().is_empty() => name.clone(),
            _ => format!("video_{}.mp4", self.payload.file_id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Status,
    Cleanup,
}

impl Command {
    /// Parse a `/command` text; arguments and `@bot` suffixes are ignored
    pub fn parse(text: &str) -> Option<Self> {
        let word = text.trim().split_whitespace().next()?;
        let word = word.strip_prefix('/')?;
        let name = word.split('@').next().unwrap_or(word);
        match name {
            "start" => Some(Command::Start),
            "status" => Some(Command::Status),
            "cleanup" => Some(Command::Cleanup),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct InboundCommand {
    pub sender: ChatId,
    pub message_id: MessageId,
    pub command: Command,
}

#[derive(Debug, Clone)]
pub struct InboundText {
    pub sender: ChatId,
    pub message_id: MessageId,
    pub reply_to: Option<MessageId>,
    pub text: String,
}

#[derive(Debug, Clone)]
pub enum InboundEvent {
    File(InboundFile),
    Command(InboundCommand),
    Text(InboundText),
}

impl InboundEvent {
    /// Classify a text message as a known command or plain text
    pub fn from_text(
        sender: ChatId,
        message_id: MessageId,
        reply_to: Option<MessageId>,
        text: impl Into<String>,
    ) -> Self {
        let text = text.into();
        match Command::parse(&text) {
            Some(command) => InboundEvent::Command(InboundCommand {
                sender,
                message_id,
                command,
            }),
            None => InboundEvent::Text(InboundText {
                sender,
                message_id,
                reply_to,
                text,
            }),
        }
    }

    pub fn sender(&self) -> ChatId {
        match self {
            InboundEvent::File(file) => file.sender,
            InboundEvent::Command(command) => command.sender,
            InboundEvent::Text(text) => text.sender,
        }
    }

    pub fn message_id(&self) -> MessageId {
        match self {
            InboundEvent::File(file) => file.message_id,
            InboundEvent::Command(command) => command.message_id,
            InboundEvent::Text(text) => text.message_id,
        }
    }

    /// Text body, if this is a plain text message
    pub fn text(&self) -> Option<&str> {
        match self {
            InboundEvent::Text(text) => Some(&text.text),
            _ => None,
        }
    }
}
