//! Relay process
//!
//! Receives upload requests from the intake identity, waits for the
//! payload that replies to each request, stores it in the shared storage
//! root and answers with a completion or failure message.

use crate::relay::codec::is_relay_control;
use crate::relay::types::{RelayError, RelayMessage, RelayResult};
use crate::storage::{StorageManager, StoredFile};
use crate::transport::{ChatId, ChatTransport, InboundEvent, InboundFile, MessageId};
use dashmap::DashMap;
use std::sync::Arc;

/// What the relay remembers about a request until its payload arrives
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayContext {
    pub requester: ChatId,
    pub file_name: String,
}

pub struct RelayAgent {
    transport: Arc<dyn ChatTransport>,
    storage: Arc<StorageManager>,
    intake: ChatId,
    contexts: DashMap<MessageId, RelayContext>,
}

impl RelayAgent {
    pub fn new(
        transport: Arc<dyn ChatTransport>,
        storage: Arc<StorageManager>,
        intake: ChatId,
    ) -> Self {
        Self {
            transport,
            storage,
            intake,
            contexts: DashMap::new(),
        }
    }

    /// Requests still waiting for their payload
    pub fn queued(&self) -> usize {
        self.contexts.len()
    }

    pub async fn handle(&self, event: InboundEvent) -> RelayResult<()> {
        if event.sender() != self.intake {
            tracing::debug!(sender = %event.sender(), "Ignoring message from unknown sender");
            return Ok(());
        }

        match event {
            InboundEvent::Text(text) if is_relay_control(&text.text) => {
                match RelayMessage::parse(&text.text)? {
                    RelayMessage::UploadRequest {
                        requester,
                        file_name,
                        size,
                    } => {
                        tracing::info!(
                            %requester,
                            file = %file_name,
                            size = size.as_deref().unwrap_or("unknown"),
                            request = %text.message_id,
                            "Queued file for download"
                        );
                        self.contexts.insert(
                            text.message_id,
                            RelayContext {
                                requester,
                                file_name,
                            },
                        );
                    }
                    other => {
                        tracing::warn!(message = ?other, "Ignoring relay answer sent to the relay");
                    }
                }
                Ok(())
            }
            InboundEvent::File(file) => self.handle_payload(file).await,
            _ => Ok(()),
        }
    }

    async fn handle_payload(&self, file: InboundFile) -> RelayResult<()> {
        let Some((request, context)) = file
            .reply_to
            .and_then(|request| self.contexts.remove(&request))
        else {
            tracing::warn!(message = %file.message_id, "Received file with no matching context");
            return Ok(());
        };

        tracing::info!(
            file = %context.file_name,
            bytes = file.size_bytes,
            "Downloading large file"
        );

        let answer = match self.download(&file, &context).await {
            Ok(stored) => {
                tracing::info!(file = %stored.name, "File downloaded and confirmed");
                RelayMessage::UploadDone {
                    requester: context.requester,
                    file_name: stored.name,
                }
            }
            Err(e) => {
                tracing::error!(file = %context.file_name, error = %e, "Download failed");
                RelayMessage::UploadError {
                    requester: context.requester,
                    reason: e.to_string(),
                }
            }
        };

        self.transport
            .send_text(self.intake, &answer.encode(), Some(request))
            .await?;
        Ok(())
    }

    async fn download(&self, file: &InboundFile, context: &RelayContext) -> RelayResult<StoredFile> {
        let mut reader = self.transport.open_payload(&file.payload).await?;
        self.storage
            .store(&context.file_name, &mut reader)
            .await
            .map_err(RelayError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{FileKind, InboundText, LoopbackHub, Mailbox, PayloadHandle};
    use std::time::Duration;
    use tempfile::TempDir;

    const OPERATOR: ChatId = ChatId(100);
    const BOT: ChatId = ChatId(200);
    const RELAY: ChatId = ChatId(300);

    struct Fixture {
        _dir: TempDir,
        hub: LoopbackHub,
        bot: Mailbox,
        relay: Mailbox,
        agent: RelayAgent,
        storage: Arc<StorageManager>,
    }

    async fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let storage = Arc::new(
            StorageManager::open(dir.path(), Duration::from_secs(3600))
                .await
                .unwrap(),
        );
        let hub = LoopbackHub::new();
        let bot = hub.register(BOT);
        let relay = hub.register(RELAY);
        let agent = RelayAgent::new(Arc::new(hub.transport(RELAY)), storage.clone(), BOT);

        Fixture {
            _dir: dir,
            hub,
            bot,
            relay,
            agent,
            storage,
        }
    }

    /// Bot sends a request and forwards a payload, relay processes both
    async fn request_and_forward(fx: &mut Fixture, name: &str, payload: &PayloadHandle) -> MessageId {
        let bot = fx.hub.transport(BOT);
        let request = RelayMessage::UploadRequest {
            requester: OPERATOR,
            file_name: name.to_string(),
            size: None,
        };
        let token = bot.send_text(RELAY, &request.encode(), None).await.unwrap();
        bot.forward_payload(RELAY, payload, Some(token)).await.unwrap();

        let event = fx.relay.recv().await.unwrap();
        fx.agent.handle(event).await.unwrap();
        assert_eq!(fx.agent.queued(), 1);

        let event = fx.relay.recv().await.unwrap();
        fx.agent.handle(event).await.unwrap();
        assert_eq!(fx.agent.queued(), 0);

        token
    }

    async fn operator_payload(fx: &mut Fixture, data: &[u8]) -> PayloadHandle {
        fx.hub
            .upload_bytes(OPERATOR, BOT, Some("movie.mkv"), FileKind::Video, data.to_vec())
            .unwrap();
        match fx.bot.recv().await.unwrap() {
            InboundEvent::File(file) => file.payload,
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_request_then_payload_stores_and_confirms() {
        let mut fx = fixture().await;
        let payload = operator_payload(&mut fx, b"large movie").await;

        let token = request_and_forward(&mut fx, "movie.mkv", &payload).await;

        let stored = std::fs::read(fx.storage.root().join("movie.mkv")).unwrap();
        assert_eq!(stored, b"large movie");

        match fx.bot.recv().await.unwrap() {
            InboundEvent::Text(text) => {
                assert_eq!(text.reply_to, Some(token));
                assert_eq!(
                    RelayMessage::parse(&text.text).unwrap(),
                    RelayMessage::UploadDone {
                        requester: OPERATOR,
                        file_name: "movie.mkv".into()
                    }
                );
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_store_failure_reports_error() {
        let mut fx = fixture().await;
        let payload = operator_payload(&mut fx, b"data").await;

        request_and_forward(&mut fx, "../escape.mkv", &payload).await;

        let answer = fx.bot.recv().await.unwrap();
        match RelayMessage::parse(answer.text().unwrap()).unwrap() {
            RelayMessage::UploadError { requester, reason } => {
                assert_eq!(requester, OPERATOR);
                assert!(reason.contains("Invalid file name"));
            }
            other => panic!("unexpected answer: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_payload_without_context_is_dropped() {
        let mut fx = fixture().await;
        let payload = operator_payload(&mut fx, b"data").await;

        fx.hub
            .transport(BOT)
            .forward_payload(RELAY, &payload, Some(MessageId(12345)))
            .await
            .unwrap();
        let event = fx.relay.recv().await.unwrap();
        fx.agent.handle(event).await.unwrap();

        assert!(fx.bot.try_recv().is_none());
        assert!(std::fs::read_dir(fx.storage.root()).unwrap().next().is_none());
    }

    #[tokio::test]
    async fn test_ignores_other_senders() {
        let fx = fixture().await;
        let event = InboundEvent::Text(InboundText {
            sender: OPERATOR,
            message_id: MessageId(1),
            reply_to: None,
            text: "#upload_request\nUserID:100\nName:a.pdf".into(),
        });

        fx.agent.handle(event).await.unwrap();
        assert_eq!(fx.agent.queued(), 0);
    }

    #[tokio::test]
    async fn test_malformed_request_is_an_error() {
        let fx = fixture().await;
        let event = InboundEvent::Text(InboundText {
            sender: BOT,
            message_id: MessageId(1),
            reply_to: None,
            text: "#upload_request\nName:a.pdf".into(),
        });

        let result = fx.agent.handle(event).await;
        assert!(matches!(result, Err(RelayError::Protocol(_))));
        assert_eq!(fx.agent.queued(), 0);
    }
}
