//! In-process chat network
//!
//! Every registered identity owns a mailbox. Message ids come from a single
//! counter shared by all participants, so a correlation token seen by the
//! sender is the same token the recipient sees.
//!
//! Payloads are single-use: a blob is dropped from the hub once it has been
//! opened. Uploads that nobody opens stay registered until the hub goes
//! away, so the hub is meant for tests and the console runner.

use crate::transport::error::{TransportError, TransportResult};
use crate::transport::types::{
    ChatId, FileKind, InboundEvent, InboundFile, MessageId, PayloadHandle, PayloadReader,
};
use crate::transport::ChatTransport;
use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Debug, Clone)]
enum BlobSource {
    Memory(Bytes),
    Path(PathBuf),
}

#[derive(Debug, Clone)]
struct Blob {
    file_name: Option<String>,
    kind: FileKind,
    size_bytes: u64,
    source: BlobSource,
}

struct HubInner {
    next_message_id: AtomicI64,
    next_blob_id: AtomicU64,
    mailboxes: DashMap<ChatId, mpsc::UnboundedSender<InboundEvent>>,
    blobs: DashMap<String, Blob>,
}

/// Shared in-memory chat network
#[derive(Clone)]
pub struct LoopbackHub {
    inner: Arc<HubInner>,
}

impl Default for LoopbackHub {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopbackHub {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(HubInner {
                next_message_id: AtomicI64::new(1),
                next_blob_id: AtomicU64::new(1),
                mailboxes: DashMap::new(),
                blobs: DashMap::new(),
            }),
        }
    }

    /// Register an identity and return its mailbox
    ///
    /// Registering the same identity twice replaces the previous mailbox.
    pub fn register(&self, id: ChatId) -> Mailbox {
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.mailboxes.insert(id, tx);
        Mailbox { owner: id, rx }
    }

    /// Transport endpoint acting on behalf of `id`
    pub fn transport(&self, id: ChatId) -> LoopbackTransport {
        LoopbackTransport {
            hub: self.clone(),
            me: id,
        }
    }

    /// Deliver an in-memory file from `from` to `to`
    pub fn upload_bytes(
        &self,
        from: ChatId,
        to: ChatId,
        file_name: Option<&str>,
        kind: FileKind,
        data: impl Into<Bytes>,
    ) -> TransportResult<MessageId> {
        let data = data.into();
        let blob = Blob {
            file_name: file_name.map(str::to_string),
            kind,
            size_bytes: data.len() as u64,
            source: BlobSource::Memory(data),
        };
        let payload = self.add_blob(blob);
        self.deliver_payload(from, to, &payload, None)
    }

    /// Deliver a local file from `from` to `to` without reading it up front
    pub async fn upload_path(
        &self,
        from: ChatId,
        to: ChatId,
        path: impl AsRef<Path>,
    ) -> TransportResult<MessageId> {
        let path = path.as_ref();
        let metadata = tokio::fs::metadata(path).await?;
        let blob = Blob {
            file_name: path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned()),
            kind: FileKind::Document,
            size_bytes: metadata.len(),
            source: BlobSource::Path(path.to_path_buf()),
        };
        let payload = self.add_blob(blob);
        self.deliver_payload(from, to, &payload, None)
    }

    fn add_blob(&self, blob: Blob) -> PayloadHandle {
        let id = self.inner.next_blob_id.fetch_add(1, Ordering::Relaxed);
        let payload = PayloadHandle::new(format!("blob{id}"));
        self.inner.blobs.insert(payload.file_id.clone(), blob);
        payload
    }

    fn allocate_id(&self) -> MessageId {
        MessageId(self.inner.next_message_id.fetch_add(1, Ordering::Relaxed))
    }

    fn deliver(&self, to: ChatId, event: InboundEvent) -> TransportResult<()> {
        let mailbox = self
            .inner
            .mailboxes
            .get(&to)
            .ok_or(TransportError::UnknownRecipient(to))?;
        mailbox.send(event).map_err(|_| TransportError::Closed(to))
    }

    fn deliver_text(
        &self,
        from: ChatId,
        to: ChatId,
        text: &str,
        reply_to: Option<MessageId>,
    ) -> TransportResult<MessageId> {
        let message_id = self.allocate_id();
        self.deliver(to, InboundEvent::from_text(from, message_id, reply_to, text))?;
        Ok(message_id)
    }

    fn deliver_payload(
        &self,
        from: ChatId,
        to: ChatId,
        payload: &PayloadHandle,
        reply_to: Option<MessageId>,
    ) -> TransportResult<MessageId> {
        let blob = self
            .inner
            .blobs
            .get(&payload.file_id)
            .map(|blob| blob.value().clone())
            .ok_or_else(|| TransportError::PayloadNotFound(payload.file_id.clone()))?;

        let message_id = self.allocate_id();
        let event = InboundEvent::File(InboundFile {
            sender: from,
            message_id,
            reply_to,
            payload: payload.clone(),
            file_name: blob.file_name,
            kind: blob.kind,
            size_bytes: blob.size_bytes,
        });
        self.deliver(to, event)?;
        Ok(message_id)
    }

    async fn open(&self, payload: &PayloadHandle) -> TransportResult<PayloadReader> {
        let source = self
            .inner
            .blobs
            .remove(&payload.file_id)
            .map(|(_, blob)| blob.source)
            .ok_or_else(|| TransportError::PayloadNotFound(payload.file_id.clone()))?;

        match source {
            BlobSource::Memory(data) => Ok(Box::new(std::io::Cursor::new(data))),
            BlobSource::Path(path) => {
                let file = tokio::fs::File::open(&path).await?;
                Ok(Box::new(file))
            }
        }
    }
}

/// A participant's view of the [`LoopbackHub`]
#[derive(Clone)]
pub struct LoopbackTransport {
    hub: LoopbackHub,
    me: ChatId,
}

impl LoopbackTransport {
    pub fn id(&self) -> ChatId {
        self.me
    }
}

#[async_trait]
impl ChatTransport for LoopbackTransport {
    async fn send_text(
        &self,
        to: ChatId,
        text: &str,
        reply_to: Option<MessageId>,
    ) -> TransportResult<MessageId> {
        self.hub.deliver_text(self.me, to, text, reply_to)
    }

    async fn forward_payload(
        &self,
        to: ChatId,
        payload: &PayloadHandle,
        reply_to: Option<MessageId>,
    ) -> TransportResult<MessageId> {
        self.hub.deliver_payload(self.me, to, payload, reply_to)
    }

    async fn open_payload(&self, payload: &PayloadHandle) -> TransportResult<PayloadReader> {
        self.hub.open(payload).await
    }
}

/// Receiving end of a registered identity
pub struct Mailbox {
    owner: ChatId,
    rx: mpsc::UnboundedReceiver<InboundEvent>,
}

impl Mailbox {
    pub fn owner(&self) -> ChatId {
        self.owner
    }

    pub async fn recv(&mut self) -> Option<InboundEvent> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<InboundEvent> {
        self.rx.try_recv().ok()
    }

    /// Drain everything queued so far and keep only the texts
    pub fn drain_texts(&mut self) -> Vec<String> {
        let mut texts = Vec::new();
        while let Some(event) = self.try_recv() {
            if let Some(text) = event.text() {
                texts.push(text.to_string());
            }
        }
        texts
    }
}
