//! Sweep progress reported to a chat

use crate::messages;
use crate::storage::{ObserverError, SweepObserver, SweepProgress};
use crate::transport::{ChatId, ChatTransport, MessageId};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;

const STEP_PERCENT: u32 = 25;

/// Sends a start message, then one update per 25% boundary crossed
pub struct ChatProgress {
    transport: Arc<dyn ChatTransport>,
    recipient: ChatId,
    reply_to: Option<MessageId>,
    last_step: Mutex<u32>,
}

impl ChatProgress {
    pub fn new(
        transport: Arc<dyn ChatTransport>,
        recipient: ChatId,
        reply_to: Option<MessageId>,
    ) -> Self {
        Self {
            transport,
            recipient,
            reply_to,
            last_step: Mutex::new(0),
        }
    }

    fn crosses_boundary(&self, progress: &SweepProgress) -> bool {
        let step = progress.percent() / STEP_PERCENT;
        let mut last = self.last_step.lock();
        if step > *last {
            *last = step;
            true
        } else {
            false
        }
    }
}

#[async_trait]
impl SweepObserver for ChatProgress {
    async fn on_progress(&self, progress: &SweepProgress) -> Result<(), ObserverError> {
        let text = if progress.processed == 0 {
            messages::cleanup_started(progress.total)
        } else if self.crosses_boundary(progress) {
            messages::cleanup_progress(progress)
        } else {
            return Ok(());
        };

        self.transport
            .send_text(self.recipient, &text, self.reply_to)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SweepMode;
    use crate::transport::LoopbackHub;

    const OPERATOR: ChatId = ChatId(1);
    const BOT: ChatId = ChatId(2);

    fn progress(total: usize, processed: usize) -> SweepProgress {
        SweepProgress {
            mode: SweepMode::All,
            total,
            processed,
            deleted: processed,
        }
    }

    #[tokio::test]
    async fn test_reports_each_quarter_once() {
        let hub = LoopbackHub::new();
        let mut operator = hub.register(OPERATOR);
        let observer = ChatProgress::new(Arc::new(hub.transport(BOT)), OPERATOR, None);

        for processed in 0..=8 {
            observer.on_progress(&progress(8, processed)).await.unwrap();
        }

        let texts = operator.drain_texts();
        assert_eq!(texts.len(), 5);
        assert!(texts[0].contains("8 file(s)"));
        assert!(texts[1].contains("25%"));
        assert!(texts[4].contains("100%"));
    }

    #[tokio::test]
    async fn test_small_sweep_skips_to_boundaries() {
        let hub = LoopbackHub::new();
        let mut operator = hub.register(OPERATOR);
        let observer = ChatProgress::new(Arc::new(hub.transport(BOT)), OPERATOR, None);

        for processed in 0..=3 {
            observer.on_progress(&progress(3, processed)).await.unwrap();
        }

        // 33%, 66%, 100%
        assert_eq!(operator.drain_texts().len(), 4);
    }

    #[tokio::test]
    async fn test_send_failure_surfaces_to_sweep() {
        let hub = LoopbackHub::new();
        let observer = ChatProgress::new(Arc::new(hub.transport(BOT)), OPERATOR, None);
        assert!(observer.on_progress(&progress(1, 0)).await.is_err());
    }
}
