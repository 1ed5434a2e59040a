//! Chat transport interface
//!
//! The chat network itself is an external collaborator. The core only
//! sends texts, forwards payloads and opens payload streams through the
//! [`ChatTransport`] trait. [`LoopbackHub`] is an in-process implementation
//! used by the console binary and the tests.

mod error;
mod loopback;
mod types;

pub use error::{TransportError, TransportResult};
pub use loopback::{LoopbackHub, LoopbackTransport, Mailbox};
pub use types::{
    ChatId, Command, FileKind, InboundCommand, InboundEvent, InboundFile, InboundText,
    MessageId, PayloadHandle, PayloadReader,
};

use async_trait::async_trait;

/// Outbound side of the chat network
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Send a plain-text message, returning the id the transport assigned to it
    async fn send_text(
        &self,
        to: ChatId,
        text: &str,
        reply_to: Option<MessageId>,
    ) -> TransportResult<MessageId>;

    /// Forward a previously received payload to another identity
    async fn forward_payload(
        &self,
        to: ChatId,
        payload: &PayloadHandle,
        reply_to: Option<MessageId>,
    ) -> TransportResult<MessageId>;

    /// Open the byte stream behind a payload handle
    async fn open_payload(&self, payload: &PayloadHandle) -> TransportResult<PayloadReader>;
}
