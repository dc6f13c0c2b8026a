//! Bounded per-connection mailbox.
//!
//! A bounded `mpsc` channel carries the messages; a separate close token
//! carries the "connection is done" signal, because producers hold sender
//! clones and the channel alone would never report closed while any of them
//! is alive. Once closed, the receiving side closes the channel, drains what
//! is already buffered, and then reports the end.

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;

use wsrelay_core::error::{RelayError, Result};
use wsrelay_core::protocol::Message;

pub const DEFAULT_CAPACITY: usize = 16;

/// Create a mailbox with fixed `capacity` (clamped to at least 1).
pub(crate) fn mailbox(capacity: usize) -> (MailboxSink, Mailbox) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let closed = CancellationToken::new();
    (
        MailboxSink {
            tx,
            closed: closed.clone(),
        },
        Mailbox {
            rx,
            closed,
            draining: false,
        },
    )
}

/// Producer half. Cheap to clone; every clone feeds the same FIFO.
#[derive(Debug, Clone)]
pub struct MailboxSink {
    tx: mpsc::Sender<Message>,
    closed: CancellationToken,
}

impl MailboxSink {
    /// Enqueue, waiting for space while the mailbox is full.
    ///
    /// Fails with `Cancelled` if `cancel` fires first and with
    /// `MailboxClosed` if the mailbox is (or gets) closed. Either way the
    /// message is dropped and the delivery loop is unaffected.
    pub async fn send(&self, msg: Message, cancel: &CancellationToken) -> Result<()> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(RelayError::Cancelled),
            _ = self.closed.cancelled() => Err(RelayError::MailboxClosed),
            res = self.tx.send(msg) => res.map_err(|_| RelayError::MailboxClosed),
        }
    }

    /// Enqueue without waiting.
    pub fn try_send(&self, msg: Message) -> Result<()> {
        if self.closed.is_cancelled() {
            return Err(RelayError::MailboxClosed);
        }
        self.tx.try_send(msg).map_err(|e| match e {
            TrySendError::Full(_) => RelayError::MailboxFull,
            TrySendError::Closed(_) => RelayError::MailboxClosed,
        })
    }

    pub fn capacity(&self) -> usize {
        self.tx.max_capacity()
    }

    /// Messages currently buffered.
    pub fn pending(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled() || self.tx.is_closed()
    }

    pub(crate) fn close(&self) {
        self.closed.cancel();
    }
}

/// Consumer half, owned by the delivery loop.
#[derive(Debug)]
pub(crate) struct Mailbox {
    rx: mpsc::Receiver<Message>,
    closed: CancellationToken,
    draining: bool,
}

impl Mailbox {
    /// Next message in FIFO order; `None` once the mailbox is closed and
    /// empty. Cancel-safe.
    pub(crate) async fn next(&mut self) -> Option<Message> {
        loop {
            if self.draining {
                return self.rx.recv().await;
            }
            tokio::select! {
                biased;
                _ = self.closed.cancelled() => {
                    // Wakes producers blocked on a full channel; buffered
                    // messages stay receivable.
                    self.rx.close();
                    self.draining = true;
                }
                msg = self.rx.recv() => return msg,
            }
        }
    }
}
