//! Intake side of the relay handoff
//!
//! Per handoff: `Routed -> Pending -> {Resolved, Failed}`. A pending entry
//! is keyed by the id the transport assigned to the upload request and is
//! removed exactly once, by whichever answer arrives first.

use crate::messages;
use crate::relay::types::{PendingRelayRequest, RelayError, RelayMessage, RelayResult};
use crate::storage::{expires_at, format_expiry, human_size, public_link};
use crate::transport::{ChatId, ChatTransport, InboundText, MessageId, PayloadHandle};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// What happened to a relay answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayResolution {
    /// Requester was told the file is ready
    Resolved {
        requester: ChatId,
        file_name: String,
        notification: MessageId,
    },

    /// Requester was told the relay failed
    Failed {
        requester: ChatId,
        reason: String,
        notification: MessageId,
    },

    /// No pending entry matched; nothing was sent
    Unmatched,

    /// Control text that needs no action here
    Ignored,
}

pub struct RelayCoordinator {
    transport: Arc<dyn ChatTransport>,
    relay: ChatId,
    ttl: Duration,
    base_url: String,
    pending: DashMap<MessageId, PendingRelayRequest>,
}

impl RelayCoordinator {
    pub fn new(
        transport: Arc<dyn ChatTransport>,
        relay: ChatId,
        ttl: Duration,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            relay,
            ttl,
            base_url: base_url.into(),
            pending: DashMap::new(),
        }
    }

    /// Send the upload request, record it as pending, then forward the payload
    ///
    /// The pending entry exists before the payload leaves, so the relay
    /// cannot answer a request this side does not know about yet.
    pub async fn begin_relay(
        &self,
        requester: ChatId,
        file_name: &str,
        size_bytes: u64,
        payload: &PayloadHandle,
    ) -> RelayResult<MessageId> {
        let request = RelayMessage::UploadRequest {
            requester,
            file_name: file_name.to_string(),
            size: Some(human_size(size_bytes)),
        };

        let correlation = self
            .transport
            .send_text(self.relay, &request.encode(), None)
            .await?;

        self.pending.insert(
            correlation,
            PendingRelayRequest {
                correlation,
                requester,
                file_name: file_name.to_string(),
                size_bytes,
                started_at: Instant::now(),
            },
        );
        crate::metrics::set_relay_pending(self.pending.len());

        if let Err(e) = self
            .transport
            .forward_payload(self.relay, payload, Some(correlation))
            .await
        {
            self.pending.remove(&correlation);
            crate::metrics::set_relay_pending(self.pending.len());
            return Err(e.into());
        }

        crate::metrics::record_relay_started();
        tracing::info!(
            %requester,
            %correlation,
            file = %file_name,
            bytes = size_bytes,
            "Handed large file to relay"
        );

        Ok(correlation)
    }

    /// Complete a pending handoff and send the download link
    ///
    /// The advertised expiry counts from now, not from when the relay
    /// finished writing the file.
    pub async fn resolve(
        &self,
        correlation: MessageId,
        file_name: &str,
    ) -> RelayResult<RelayResolution> {
        let Some(pending) = self.take(correlation) else {
            tracing::warn!(%correlation, file = %file_name, "Upload completion with no pending request");
            return Ok(RelayResolution::Unmatched);
        };

        if pending.file_name != file_name {
            tracing::warn!(
                %correlation,
                requested = %pending.file_name,
                stored = %file_name,
                "Relay stored the file under a different name"
            );
        }

        let link = public_link(&self.base_url, file_name)?;
        let expires = format_expiry(&expires_at(self.ttl));
        let notification = self
            .transport
            .send_text(
                pending.requester,
                &messages::relay_ready(file_name, &link, &expires),
                None,
            )
            .await?;

        crate::metrics::record_relay_resolved();
        tracing::info!(
            requester = %pending.requester,
            %correlation,
            file = %file_name,
            elapsed_ms = pending.started_at.elapsed().as_millis() as u64,
            "Large file ready"
        );

        Ok(RelayResolution::Resolved {
            requester: pending.requester,
            file_name: file_name.to_string(),
            notification,
        })
    }

    /// Fail a pending handoff, passing the relay's reason on verbatim
    pub async fn fail(&self, correlation: MessageId, reason: &str) -> RelayResult<RelayResolution> {
        let Some(pending) = self.take(correlation) else {
            tracing::warn!(%correlation, %reason, "Upload failure with no pending request");
            return Ok(RelayResolution::Unmatched);
        };

        let notification = self
            .transport
            .send_text(pending.requester, &messages::relay_failed(reason), None)
            .await?;

        crate::metrics::record_relay_failed();
        tracing::warn!(
            requester = %pending.requester,
            %correlation,
            file = %pending.file_name,
            %reason,
            "Relay reported failure"
        );

        Ok(RelayResolution::Failed {
            requester: pending.requester,
            reason: reason.to_string(),
            notification,
        })
    }

    fn take(&self, correlation: MessageId) -> Option<PendingRelayRequest> {
        let removed = self.pending.remove(&correlation).map(|(_, pending)| pending);
        crate::metrics::set_relay_pending(self.pending.len());
        removed
    }

    /// Find the pending entry an answer belongs to
    ///
    /// A reply reference is authoritative. Without one, the oldest pending
    /// entry of the same requester is used (and, for completions, the same
    /// file name).
    pub fn correlate(
        &self,
        reply_to: Option<MessageId>,
        message: &RelayMessage,
    ) -> Option<MessageId> {
        if let Some(correlation) = reply_to {
            return self.pending.contains_key(&correlation).then_some(correlation);
        }

        let requester = message.requester();
        let file_name = match message {
            RelayMessage::UploadDone { file_name, .. } => Some(file_name.as_str()),
            _ => None,
        };

        self.pending
            .iter()
            .filter(|entry| entry.requester == requester)
            .filter(|entry| file_name.map_or(true, |name| entry.file_name == name))
            .min_by_key(|entry| entry.started_at)
            .map(|entry| entry.correlation)
    }

    /// Parse and apply a control text received from the relay
    ///
    /// Malformed texts are logged and returned as errors; no entry is
    /// removed and nobody is notified.
    pub async fn handle_control(&self, text: &InboundText) -> RelayResult<RelayResolution> {
        let message = match RelayMessage::parse(&text.text) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(error = %e, text = %text.text, "Discarding malformed relay message");
                return Err(RelayError::Protocol(e));
            }
        };

        if let RelayMessage::UploadRequest { .. } = message {
            tracing::warn!("Ignoring upload request sent to the intake side");
            return Ok(RelayResolution::Ignored);
        }

        let Some(correlation) = self.correlate(text.reply_to, &message) else {
            tracing::warn!(?message, reply_to = ?text.reply_to, "Relay answer matches no pending request");
            return Ok(RelayResolution::Unmatched);
        };

        if let Some(pending) = self.pending.get(&correlation) {
            if pending.requester != message.requester() {
                tracing::warn!(
                    %correlation,
                    expected = %pending.requester,
                    received = %message.requester(),
                    "Relay answer names a different requester; notifying the recorded requester"
                );
            }
        }

        match message {
            RelayMessage::UploadDone { file_name, .. } => self.resolve(correlation, &file_name).await,
            RelayMessage::UploadError { reason, .. } => self.fail(correlation, &reason).await,
            RelayMessage::UploadRequest { .. } => Ok(RelayResolution::Ignored),
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn pending(&self, correlation: MessageId) -> Option<PendingRelayRequest> {
        self.pending.get(&correlation).map(|entry| entry.value().clone())
    }
}
