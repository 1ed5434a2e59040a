//! Wire encoding of [`RelayMessage`]
//!
//! ```text
//! #upload_request
//! UserID:<requester>
//! Name:<file name>
//! Size:<human-readable size>
//!
//! #upload_done <requester> <file name>
//! #upload_error <requester> <reason text>
//! ```
//!
//! Everything after the requester token is taken as the file name or
//! reason, so names containing spaces survive the round trip.

use crate::relay::types::{ProtocolError, RelayMessage};
use crate::transport::ChatId;

pub const CONTROL_PREFIX: &str = "#upload_";

const TAG_REQUEST: &str = "#upload_request";
const TAG_DONE: &str = "#upload_done";
const TAG_ERROR: &str = "#upload_error";

/// Whether a chat text belongs to the relay control channel
pub fn is_relay_control(text: &str) -> bool {
    text.trim_start().starts_with(CONTROL_PREFIX)
}

impl RelayMessage {
    pub fn encode(&self) -> String {
        match self {
            RelayMessage::UploadRequest {
                requester,
                file_name,
                size,
            } => {
                let mut text = format!("{TAG_REQUEST}\nUserID:{requester}\nName:{file_name}");
                if let Some(size) = size {
                    text.push_str(&format!("\nSize:{size}"));
                }
                text
            }
            RelayMessage::UploadDone {
                requester,
                file_name,
            } => format!("{TAG_DONE} {requester} {file_name}"),
            RelayMessage::UploadError { requester, reason } => {
                format!("{TAG_ERROR} {requester} {reason}")
            }
        }
    }

    /// Parse a control text; never touches any state
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let text = text.trim();
        if !text.starts_with(CONTROL_PREFIX) {
            return Err(ProtocolError::NotControl);
        }

        let tag = text
            .split(|c: char| c.is_whitespace())
            .next()
            .unwrap_or_default();

        match tag {
            TAG_REQUEST => parse_request(text),
            TAG_DONE => {
                let (requester, file_name) = split_requester(text, TAG_DONE)?;
                if file_name.is_empty() {
                    return Err(ProtocolError::MissingField {
                        tag: TAG_DONE,
                        field: "file name",
                    });
                }
                Ok(RelayMessage::UploadDone {
                    requester,
                    file_name: file_name.to_string(),
                })
            }
            TAG_ERROR => {
                let (requester, reason) = split_requester(text, TAG_ERROR)?;
                Ok(RelayMessage::UploadError {
                    requester,
                    reason: reason.to_string(),
                })
            }
            other => Err(ProtocolError::UnknownTag(other.to_string())),
        }
    }
}

fn parse_requester(raw: &str) -> Result<ChatId, ProtocolError> {
    raw.trim()
        .parse::<i64>()
        .map(ChatId)
        .map_err(|_| ProtocolError::InvalidRequester(raw.to_string()))
}

/// `<tag> <requester> <rest>` with `rest` possibly empty
fn split_requester<'a>(
    text: &'a str,
    tag: &'static str,
) -> Result<(ChatId, &'a str), ProtocolError> {
    let rest = text[tag.len()..].trim_start();
    if rest.is_empty() {
        return Err(ProtocolError::MissingField {
            tag,
            field: "requester",
        });
    }

    let (requester, rest) = rest.split_once(' ').unwrap_or((rest, ""));
    Ok((parse_requester(requester)?, rest.trim()))
}

fn field<'a>(text: &'a str, key: &str) -> Option<&'a str> {
    text.lines()
        .find_map(|line| line.trim().strip_prefix(key))
        .map(str::trim)
}

fn parse_request(text: &str) -> Result<RelayMessage, ProtocolError> {
    let requester = field(text, "UserID:").ok_or(ProtocolError::MissingField {
        tag: TAG_REQUEST,
        field: "UserID",
    })?;
    let file_name = field(text, "Name:")
        .filter(|name| !name.is_empty())
        .ok_or(ProtocolError::MissingField {
            tag: TAG_REQUEST,
            field: "Name",
        })?;
    let size = field(text, "Size:")
        .filter(|size| !size.is_empty())
        .map(str::to_string);

    Ok(RelayMessage::UploadRequest {
        requester: parse_requester(requester)?,
        file_name: file_name.to_string(),
        size,
    })
}
