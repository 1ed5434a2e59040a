//! Inbound event dispatch for the intake identity

use crate::bot::error::{BotError, BotResult};
use crate::bot::progress::ChatProgress;
use crate::config::{AccessPolicy, Principal, Settings};
use crate::messages;
use crate::relay::{is_relay_control, RelayCoordinator, RelayError, RelayResolution};
use crate::routing::{IntakeRejection, Route, RoutingPolicy};
use crate::storage::{
    expires_at, format_expiry, public_link, StorageError, StorageManager, SweepMode, SweepOutcome,
};
use crate::transport::{
    ChatId, ChatTransport, Command, InboundCommand, InboundEvent, InboundFile, InboundText,
    MessageId,
};
use std::sync::Arc;

pub struct IntakeBot {
    transport: Arc<dyn ChatTransport>,
    policy: AccessPolicy,
    routing: RoutingPolicy,
    storage: Arc<StorageManager>,
    relay: RelayCoordinator,
    base_url: String,
}

impl IntakeBot {
    pub fn new(
        transport: Arc<dyn ChatTransport>,
        policy: AccessPolicy,
        routing: RoutingPolicy,
        storage: Arc<StorageManager>,
        base_url: impl Into<String>,
    ) -> Self {
        let base_url = base_url.into();
        let relay = RelayCoordinator::new(
            transport.clone(),
            policy.relay(),
            storage.ttl(),
            base_url.clone(),
        );

        Self {
            transport,
            policy,
            routing,
            storage,
            relay,
            base_url,
        }
    }

    pub fn from_settings(
        settings: &Settings,
        transport: Arc<dyn ChatTransport>,
        storage: Arc<StorageManager>,
    ) -> Self {
        Self::new(
            transport,
            settings.access_policy(),
            RoutingPolicy::from_settings(settings),
            storage,
            settings.base_url.clone(),
        )
    }

    pub fn relay(&self) -> &RelayCoordinator {
        &self.relay
    }

    pub async fn handle(&self, event: InboundEvent) -> BotResult<()> {
        let sender = event.sender();
        match (self.policy.classify(sender), event) {
            (_, InboundEvent::Command(InboundCommand { command: Command::Start, message_id, .. })) => {
                self.reply(sender, message_id, &messages::welcome()).await
            }
            (Principal::Stranger, event) => {
                tracing::warn!(%sender, "Unauthorized access attempt");
                self.reply(sender, event.message_id(), &messages::unauthorized())
                    .await
            }
            (Principal::Operator, InboundEvent::File(file)) => self.handle_file(file).await,
            (Principal::Operator, InboundEvent::Command(command)) => {
                self.handle_command(command).await
            }
            (Principal::Relay, InboundEvent::Text(text)) => self.handle_relay_text(text).await,
            (principal, event) => {
                tracing::debug!(?principal, %sender, message = %event.message_id(), "Ignoring event");
                Ok(())
            }
        }
    }

    async fn handle_file(&self, file: InboundFile) -> BotResult<()> {
        let name = file.effective_name();
        let route = match self.routing.admit(&name, file.size_bytes) {
            Ok(route) => route,
            Err(rejection) => {
                tracing::info!(file = %name, bytes = file.size_bytes, %rejection, "Rejected upload");
                let text = match rejection {
                    IntakeRejection::OversizeForTransport { ceiling, .. } => {
                        messages::too_large(ceiling)
                    }
                    IntakeRejection::InvalidFileType(_) => messages::invalid_file_type(),
                };
                return self.reply(file.sender, file.message_id, &text).await;
            }
        };

        match route {
            Route::Direct => self.store_direct(&file, &name).await,
            Route::Relay => self.start_relay(&file, &name).await,
        }
    }

    async fn store_direct(&self, file: &InboundFile, name: &str) -> BotResult<()> {
        let text = match self.download(file, name).await {
            Ok(link) => {
                let expires = format_expiry(&expires_at(self.storage.ttl()));
                messages::file_uploaded(&link, &expires)
            }
            Err(BotError::Storage(StorageError::InvalidName(_))) => messages::invalid_file_name(),
            Err(e) => {
                tracing::error!(file = %name, error = %e, "Direct upload failed");
                messages::upload_failed()
            }
        };
        self.reply(file.sender, file.message_id, &text).await
    }

    async fn download(&self, file: &InboundFile, name: &str) -> BotResult<String> {
        // Reject bad names before pulling any bytes
        self.storage.path_for(name)?;

        let mut reader = self.transport.open_payload(&file.payload).await?;
        let stored = self.storage.store(name, &mut reader).await?;
        Ok(public_link(&self.base_url, &stored.name)?)
    }

    async fn start_relay(&self, file: &InboundFile, name: &str) -> BotResult<()> {
        if let Err(e) = self.storage.path_for(name) {
            tracing::info!(file = %name, error = %e, "Rejected upload");
            return self
                .reply(file.sender, file.message_id, &messages::invalid_file_name())
                .await;
        }

        let text = match self
            .relay
            .begin_relay(file.sender, name, file.size_bytes, &file.payload)
            .await
        {
            Ok(_) => messages::relay_started(name, file.size_bytes),
            Err(e) => {
                tracing::error!(file = %name, error = %e, "Relay handoff failed");
                messages::relay_unavailable()
            }
        };
        self.reply(file.sender, file.message_id, &text).await
    }

    async fn handle_command(&self, command: InboundCommand) -> BotResult<()> {
        let InboundCommand {
            sender,
            message_id,
            command,
        } = command;

        let text = match command {
            Command::Start => messages::welcome(),
            Command::Status => match self.storage.usage_summary().await {
                Ok(summary) => {
                    messages::status(&summary, self.relay.pending_count(), self.ttl_hours())
                }
                Err(e) => {
                    tracing::error!(error = %e, "Status failed");
                    messages::status_unavailable()
                }
            },
            Command::Cleanup => {
                let progress = ChatProgress::new(self.transport.clone(), sender, Some(message_id));
                match self.storage.sweep(SweepMode::All, &progress).await {
                    SweepOutcome::Completed { deleted, total } if deleted < total => {
                        tracing::warn!(
                            deleted,
                            failed = total - deleted,
                            "Manual cleanup left files behind"
                        );
                        messages::cleanup_incomplete(deleted, total - deleted)
                    }
                    SweepOutcome::Completed { deleted, .. } => messages::cleanup_done(deleted),
                    SweepOutcome::Skipped => messages::cleanup_busy(),
                    SweepOutcome::Aborted {
                        deleted, reason, ..
                    } => {
                        tracing::error!(%reason, deleted, "Manual cleanup aborted");
                        messages::cleanup_aborted(deleted)
                    }
                }
            }
        };
        self.reply(sender, message_id, &text).await
    }

    async fn handle_relay_text(&self, text: InboundText) -> BotResult<()> {
        if !is_relay_control(&text.text) {
            let notice = messages::relay_notice(&text.text);
            self.transport
                .send_text(self.policy.operator(), &notice, None)
                .await?;
            return Ok(());
        }

        match self.relay.handle_control(&text).await {
            Ok(RelayResolution::Unmatched) | Ok(RelayResolution::Ignored) => Ok(()),
            Ok(resolution) => {
                tracing::debug!(?resolution, "Relay answer applied");
                Ok(())
            }
            // Already logged; malformed control text is dropped
            Err(RelayError::Protocol(_)) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn reply(&self, to: ChatId, message_id: MessageId, text: &str) -> BotResult<()> {
        self.transport.send_text(to, text, Some(message_id)).await?;
        Ok(())
    }

    fn ttl_hours(&self) -> u64 {
        self.storage.ttl().as_secs() / 3600
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::RelayMessage;
    use crate::transport::{FileKind, LoopbackHub, Mailbox};
    use std::time::Duration;
    use tempfile::TempDir;

    const OPERATOR: ChatId = ChatId(100);
    const BOT: ChatId = ChatId(200);
    const RELAY: ChatId = ChatId(300);
    const STRANGER: ChatId = ChatId(666);
    const BASE_URL: &str = "https://drop.example.com";

    struct Fixture {
        _dir: TempDir,
        hub: LoopbackHub,
        operator: Mailbox,
        inbox: Mailbox,
        relay: Mailbox,
        stranger: Mailbox,
        storage: Arc<StorageManager>,
        bot: IntakeBot,
    }

    async fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let storage = Arc::new(
            StorageManager::open(dir.path().join("files"), Duration::from_secs(24 * 3600))
                .await
                .unwrap(),
        );

        let hub = LoopbackHub::new();
        let operator = hub.register(OPERATOR);
        let inbox = hub.register(BOT);
        let relay = hub.register(RELAY);
        let stranger = hub.register(STRANGER);

        let bot = IntakeBot::new(
            Arc::new(hub.transport(BOT)),
            AccessPolicy::new(OPERATOR, RELAY),
            RoutingPolicy::new(16, 1024, ["pdf", "mkv", "mp4"]),
            storage.clone(),
            BASE_URL,
        );

        Fixture {
            _dir: dir,
            hub,
            operator,
            inbox,
            relay,
            stranger,
            storage,
            bot,
        }
    }

    impl Fixture {
        async fn upload(&mut self, from: ChatId, name: &str, data: &[u8]) {
            self.hub
                .upload_bytes(from, BOT, Some(name), FileKind::Document, data.to_vec())
                .unwrap();
            self.deliver().await;
        }

        async fn say(&mut self, from: ChatId, text: &str, reply_to: Option<MessageId>) {
            self.hub
                .transport(from)
                .send_text(BOT, text, reply_to)
                .await
                .unwrap();
            self.deliver().await;
        }

        async fn deliver(&mut self) {
            let event = self.inbox.recv().await.unwrap();
            self.bot.handle(event).await.unwrap();
        }

        fn stored(&self) -> Vec<String> {
            let mut names: Vec<String> = std::fs::read_dir(self.storage.root())
                .unwrap()
                .map(|entry| entry.unwrap().file_name().into_string().unwrap())
                .collect();
            names.sort();
            names
        }
    }

    #[tokio::test]
    async fn test_direct_upload_replies_with_link() {
        let mut fx = fixture().await;
        fx.upload(OPERATOR, "report.pdf", b"%PDF-1.7").await;

        assert_eq!(fx.stored(), vec!["report.pdf"]);
        let texts = fx.operator.drain_texts();
        assert_eq!(texts.len(), 1);
        assert!(texts[0].contains("https://drop.example.com/files/report.pdf"));
        assert!(texts[0].contains("Link expires: "));
    }

    #[tokio::test]
    async fn test_rejects_disallowed_type() {
        let mut fx = fixture().await;
        fx.upload(OPERATOR, "setup.exe", b"MZ").await;

        assert!(fx.stored().is_empty());
        assert_eq!(fx.operator.drain_texts(), vec![messages::invalid_file_type()]);
    }

    #[tokio::test]
    async fn test_oversize_is_never_relayed() {
        let mut fx = fixture().await;
        fx.upload(OPERATOR, "huge.mkv", &[0u8; 2048]).await;

        assert!(fx.stored().is_empty());
        assert_eq!(fx.operator.drain_texts(), vec![messages::too_large(1024)]);
        assert!(fx.relay.try_recv().is_none());
        assert_eq!(fx.bot.relay().pending_count(), 0);
    }

    #[tokio::test]
    async fn test_large_file_goes_to_relay() {
        let mut fx = fixture().await;
        fx.upload(OPERATOR, "movie.mkv", &[7u8; 64]).await;

        assert!(fx.stored().is_empty());
        assert_eq!(
            fx.operator.drain_texts(),
            vec![messages::relay_started("movie.mkv", 64)]
        );

        let request = fx.relay.recv().await.unwrap();
        assert!(matches!(
            RelayMessage::parse(request.text().unwrap()).unwrap(),
            RelayMessage::UploadRequest { requester: OPERATOR, .. }
        ));
        match fx.relay.recv().await.unwrap() {
            InboundEvent::File(file) => assert_eq!(file.reply_to, Some(request.message_id())),
            other => panic!("unexpected event: {other:?}"),
        }
        assert_eq!(fx.bot.relay().pending_count(), 1);
    }

    #[tokio::test]
    async fn test_relay_answer_reaches_operator() {
        let mut fx = fixture().await;
        fx.upload(OPERATOR, "movie.mkv", &[7u8; 64]).await;
        fx.operator.drain_texts();
        let token = fx.relay.recv().await.unwrap().message_id();

        fx.say(RELAY, "#upload_done 100 movie.mkv", Some(token)).await;

        let texts = fx.operator.drain_texts();
        assert_eq!(texts.len(), 1);
        assert!(texts[0].contains("https://drop.example.com/files/movie.mkv"));
        assert_eq!(fx.bot.relay().pending_count(), 0);
    }

    #[tokio::test]
    async fn test_relay_failure_reason_is_passed_on() {
        let mut fx = fixture().await;
        fx.upload(OPERATOR, "movie.mkv", &[7u8; 64]).await;
        fx.operator.drain_texts();
        let token = fx.relay.recv().await.unwrap().message_id();

        fx.say(RELAY, "#upload_error 100 disk full", Some(token)).await;

        assert_eq!(
            fx.operator.drain_texts(),
            vec![messages::relay_failed("disk full")]
        );
        assert_eq!(fx.bot.relay().pending_count(), 0);
    }

    #[tokio::test]
    async fn test_malformed_relay_text_is_dropped() {
        let mut fx = fixture().await;
        fx.upload(OPERATOR, "movie.mkv", &[7u8; 64]).await;
        fx.operator.drain_texts();

        fx.say(RELAY, "#upload_done", None).await;
        fx.say(RELAY, "#upload_done abc movie.mkv", None).await;

        assert!(fx.operator.drain_texts().is_empty());
        assert_eq!(fx.bot.relay().pending_count(), 1);
    }

    #[tokio::test]
    async fn test_plain_relay_text_is_forwarded() {
        let mut fx = fixture().await;
        fx.say(RELAY, "relay restarted", None).await;

        assert_eq!(
            fx.operator.drain_texts(),
            vec![messages::relay_notice("relay restarted")]
        );
    }

    #[tokio::test]
    async fn test_stranger_is_denied_everything_but_start() {
        let mut fx = fixture().await;
        fx.storage.store("keep.pdf", &mut &b"x"[..]).await.unwrap();

        fx.upload(STRANGER, "report.pdf", b"data").await;
        fx.say(STRANGER, "/cleanup", None).await;
        fx.say(STRANGER, "/status", None).await;
        fx.say(STRANGER, "hello", None).await;
        fx.say(STRANGER, "/start", None).await;

        let texts = fx.stranger.drain_texts();
        assert_eq!(texts.len(), 5);
        assert!(texts[..4].iter().all(|text| *text == messages::unauthorized()));
        assert_eq!(texts[4], messages::welcome());

        assert_eq!(fx.stored(), vec!["keep.pdf"]);
        assert!(fx.operator.drain_texts().is_empty());
    }

    #[tokio::test]
    async fn test_status_counts_files_and_pending() {
        let mut fx = fixture().await;
        fx.upload(OPERATOR, "a.pdf", &[1u8; 10]).await;
        fx.upload(OPERATOR, "movie.mkv", &[7u8; 64]).await;
        fx.operator.drain_texts();

        fx.say(OPERATOR, "/status", None).await;

        let texts = fx.operator.drain_texts();
        assert_eq!(texts.len(), 1);
        assert!(texts[0].contains("1 files"));
        assert!(texts[0].contains("1 large file(s) in transit"));
        assert!(texts[0].contains("24h"));
    }

    #[tokio::test]
    async fn test_manual_cleanup_reports_progress() {
        let mut fx = fixture().await;
        for name in ["a.pdf", "b.pdf", "c.pdf", "d.pdf"] {
            fx.storage.store(name, &mut &b"x"[..]).await.unwrap();
        }

        fx.say(OPERATOR, "/cleanup", None).await;

        let texts = fx.operator.drain_texts();
        assert_eq!(texts.first().unwrap(), &messages::cleanup_started(4));
        assert_eq!(texts.last().unwrap(), &messages::cleanup_done(4));
        // start, 25/50/75/100%, done
        assert_eq!(texts.len(), 6);
        assert!(fx.stored().is_empty());
    }

    #[tokio::test]
    async fn test_manual_cleanup_reports_failed_deletes() {
        let mut fx = fixture().await;
        fx.storage.store("a.pdf", &mut &b"x"[..]).await.unwrap();
        // Listed by the sweep but refused by delete_one
        std::fs::write(fx.storage.root().join("odd\\name.pdf"), b"x").unwrap();

        fx.say(OPERATOR, "/cleanup", None).await;

        let texts = fx.operator.drain_texts();
        assert_eq!(texts.first().unwrap(), &messages::cleanup_started(2));
        assert_eq!(texts.last().unwrap(), &messages::cleanup_incomplete(1, 1));
        assert!(texts.last().unwrap().contains("1 could not be deleted"));
        assert_eq!(fx.stored(), vec!["odd\\name.pdf"]);
    }

    #[tokio::test]
    async fn test_operator_small_talk_is_ignored() {
        let mut fx = fixture().await;
        fx.say(OPERATOR, "thanks", None).await;
        assert!(fx.operator.drain_texts().is_empty());
    }
}
