use schema::DiagnosisResult;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::watch;

/// One publication in the mailbox.
#[derive(Debug, Clone)]
pub struct Published {
    /// 1-based count of publications up to and including this one.
    pub sequence: u64,
    pub result: Arc<DiagnosisResult>,
}

/// Single-slot, newest-wins store for the latest live result.
///
/// Publishing replaces the slot; readers never see a queue, only the most
/// recent completed result. Clones share the same slot.
#[derive(Clone)]
pub struct LatestResult {
    tx: Arc<watch::Sender<Option<Published>>>,
    sequence: Arc<AtomicU64>,
}

impl LatestResult {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self {
            tx: Arc::new(tx),
            sequence: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Replace the slot. Returns the sequence number assigned.
    pub fn publish(&self, result: DiagnosisResult) -> u64 {
        let sequence = self.sequence.fetch_add(1, Ordering::AcqRel) + 1;
        self.tx.send_replace(Some(Published {
            sequence,
            result: Arc::new(result),
        }));
        sequence
    }

    pub fn latest(&self) -> Option<Published> {
        self.tx.borrow().clone()
    }

    /// Number of publications so far.
    pub fn sequence(&self) -> u64 {
        self.sequence.load(Ordering::Acquire)
    }

    pub fn subscribe(&self) -> MailboxReader {
        MailboxReader {
            rx: self.tx.subscribe(),
        }
    }
}

impl Default for LatestResult {
    fn default() -> Self {
        Self::new()
    }
}

pub struct MailboxReader {
    rx: watch::Receiver<Option<Published>>,
}

impl MailboxReader {
    /// Wait for a publication newer than the last one this reader saw.
    /// Returns `None` once every writer is gone.
    pub async fn changed(&mut self) -> Option<Published> {
        loop {
            self.rx.changed().await.ok()?;
            if let Some(published) = self.rx.borrow_and_update().clone() {
                return Some(published);
            }
        }
    }

    pub fn latest(&self) -> Option<Published> {
        self.rx.borrow().clone()
    }
}
