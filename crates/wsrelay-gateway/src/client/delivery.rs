//! Delivery loop: drains one client's mailbox into its endpoint.

use std::sync::Mutex;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use wsrelay_core::error::{RelayError, Result};

use super::mailbox::Mailbox;
use super::{Client, LoopSlot};

/// Observable state of a client's delivery loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryState {
    /// Not started yet.
    Idle,
    Running,
    /// Terminal. `None` means the mailbox was closed and drained; otherwise
    /// the error code the loop stopped with.
    Stopped(Option<&'static str>),
}

/// Marks the slot stopped however the loop future ends, including being
/// dropped mid-await.
struct SlotGuard<'a> {
    slot: &'a Mutex<LoopSlot>,
    exit: Option<&'static str>,
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut slot) = self.slot.lock() {
            *slot = LoopSlot::Stopped(self.exit);
        }
    }
}

impl Client {
    /// Run until the mailbox is closed (`Ok`), a write fails (that error), or
    /// `ctx` is cancelled (`Cancelled`).
    ///
    /// Blocks for the life of the connection; spawn it on its own task. A
    /// handle serves exactly one loop: later calls fail with `LoopRunning` or
    /// `LoopFinished`.
    pub async fn run_delivery_loop(&self, ctx: &CancellationToken) -> Result<()> {
        let mut mailbox = self.take_mailbox()?;
        let mut guard = SlotGuard {
            slot: &self.slot,
            exit: Some("ABORTED"),
        };
        tracing::debug!(client_id = %self.id, "delivery loop started");

        let res = self.deliver(&mut mailbox, ctx).await;
        guard.exit = res.as_ref().err().map(RelayError::code);
        drop(mailbox);

        match &res {
            Ok(()) => tracing::debug!(client_id = %self.id, "mailbox closed, delivery loop done"),
            Err(e) if e.is_cancellation() => {
                tracing::debug!(client_id = %self.id, "delivery loop cancelled")
            }
            Err(e) => tracing::warn!(
                client_id = %self.id,
                code = e.code(),
                error = %e,
                "delivery loop failed"
            ),
        }
        if let Some(m) = self.metrics() {
            let code = guard.exit.unwrap_or("CLOSED");
            m.loop_exits.inc(&[("code", code)]);
        }
        res
    }

    /// Current loop state.
    pub fn delivery_state(&self) -> DeliveryState {
        match self.slot.lock() {
            Ok(slot) => match &*slot {
                LoopSlot::Ready(_) => DeliveryState::Idle,
                LoopSlot::Running => DeliveryState::Running,
                LoopSlot::Stopped(code) => DeliveryState::Stopped(*code),
            },
            Err(_) => DeliveryState::Stopped(Some("INTERNAL")),
        }
    }

    fn take_mailbox(&self) -> Result<Mailbox> {
        let mut slot = self
            .slot
            .lock()
            .map_err(|_| RelayError::Internal("client loop slot poisoned".into()))?;
        match std::mem::replace(&mut *slot, LoopSlot::Running) {
            LoopSlot::Ready(mailbox) => Ok(mailbox),
            LoopSlot::Running => Err(RelayError::LoopRunning),
            prev @ LoopSlot::Stopped(_) => {
                *slot = prev;
                Err(RelayError::LoopFinished)
            }
        }
    }

    async fn deliver(&self, mailbox: &mut Mailbox, ctx: &CancellationToken) -> Result<()> {
        loop {
            // One wait per iteration; cancellation wins ties.
            let msg = tokio::select! {
                biased;
                _ = ctx.cancelled() => return Err(RelayError::Cancelled),
                next = mailbox.next() => match next {
                    Some(msg) => msg,
                    None => return Ok(()),
                },
            };

            let started = Instant::now();
            match self.write_timeout(ctx, self.timeout, &msg).await {
                Ok(()) => {
                    if let Some(m) = self.metrics() {
                        m.messages_delivered.inc(&[]);
                        m.write_duration.observe(&[], started.elapsed());
                    }
                }
                Err(RelayError::Encode(reason)) => {
                    // The connection is still healthy; only this message is bad.
                    tracing::warn!(
                        client_id = %self.id,
                        msg_type = %msg.msg_type,
                        %reason,
                        "skipping unencodable message"
                    );
                    if let Some(m) = self.metrics() {
                        m.messages_skipped.inc(&[("code", "ENCODE")]);
                    }
                }
                Err(e) => {
                    let elapsed_ms =
                        u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
                    tracing::debug!(
                        client_id = %self.id,
                        elapsed_ms,
                        code = e.code(),
                        "write failed"
                    );
                    return Err(e);
                }
            }
        }
    }
}
