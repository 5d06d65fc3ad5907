// ── Priority command queue ──
//
// Four bands (high/normal/low/bulk), FIFO within a band, strict
// priority between bands with one escape hatch: after YIELD_AFTER
// consecutive dispatches that bypassed a non-empty lower band, one
// command from the highest waiting lower band is dispatched. Every band
// makes progress under sustained interactive traffic without ever
// competing with it for more than that slot, and the yield itself
// respects band order (Low before Bulk).

use std::collections::VecDeque;
use std::sync::Mutex;

use tokio::sync::Notify;
use tracing::debug;

use crate::command::{CommandEnvelope, Priority};
use crate::error::CoreError;

/// Consecutive higher-band dispatches allowed while a lower band waits.
pub(crate) const YIELD_AFTER: u32 = 8;

pub(crate) struct CommandQueue {
    inner: Mutex<Inner>,
    notify: Notify,
}

struct Inner {
    bands: [VecDeque<CommandEnvelope>; Priority::COUNT],
    closed: bool,
    /// Consecutive dispatches that bypassed a waiting lower band.
    bypass_run: u32,
}

impl Inner {
    /// Pick the next envelope per the scheduling rule.
    fn take_next(&mut self) -> Option<CommandEnvelope> {
        let highest = self.bands.iter().position(|b| !b.is_empty())?;
        // First non-empty band strictly below the one about to be
        // served; the yield slot goes there, not to the bottom.
        let next_lower = self
            .bands
            .iter()
            .enumerate()
            .skip(highest + 1)
            .find(|(_, b)| !b.is_empty())
            .map(|(band, _)| band);

        let band = match next_lower {
            Some(lower) if self.bypass_run >= YIELD_AFTER => {
                self.bypass_run = 0;
                lower
            }
            Some(_) => {
                self.bypass_run += 1;
                highest
            }
            None => {
                self.bypass_run = 0;
                highest
            }
        };

        self.bands[band].pop_front()
    }

    fn pending(&self) -> usize {
        self.bands.iter().map(VecDeque::len).sum()
    }
}

impl CommandQueue {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                bands: std::array::from_fn(|_| VecDeque::new()),
                closed: false,
                bypass_run: 0,
            }),
            notify: Notify::new(),
        }
    }

    /// Enqueue one envelope. If the queue is already torn down the
    /// envelope is completed immediately with `Cancelled`.
    pub fn push(&self, envelope: CommandEnvelope, priority: Priority) {
        let rejected = {
            let mut inner = self.inner.lock().expect("queue mutex poisoned");
            if inner.closed {
                Some(envelope)
            } else {
                inner.bands[priority.band()].push_back(envelope);
                None
            }
        };

        match rejected {
            Some(envelope) => {
                let _ = envelope.response_tx.send(Err(CoreError::Cancelled));
            }
            None => self.notify.notify_one(),
        }
    }

    /// Enqueue a batch atomically: all envelopes land in the band in
    /// submission order before any can be dispatched. Results are still
    /// per command -- the device has no transaction primitive.
    pub fn push_batch(&self, envelopes: Vec<CommandEnvelope>, priority: Priority) {
        let rejected = {
            let mut inner = self.inner.lock().expect("queue mutex poisoned");
            if inner.closed {
                Some(envelopes)
            } else {
                inner.bands[priority.band()].extend(envelopes);
                None
            }
        };

        match rejected {
            Some(envelopes) => {
                for envelope in envelopes {
                    let _ = envelope.response_tx.send(Err(CoreError::Cancelled));
                }
            }
            None => self.notify.notify_one(),
        }
    }

    /// Wait for the next dispatchable envelope. Returns `None` once the
    /// queue is closed and drained.
    pub async fn pop(&self) -> Option<CommandEnvelope> {
        loop {
            // Register interest before checking, so a push between the
            // check and the await still wakes us.
            let notified = self.notify.notified();
            {
                let mut inner = self.inner.lock().expect("queue mutex poisoned");
                if let Some(envelope) = inner.take_next() {
                    // More work may remain for other waiters.
                    if inner.pending() > 0 {
                        self.notify.notify_one();
                    }
                    return Some(envelope);
                }
                if inner.closed {
                    return None;
                }
            }
            notified.await;
        }
    }

    /// Tear down: cancel everything not yet dispatched. Commands already
    /// handed to the executor are ambiguous and left to reconciliation.
    pub fn close(&self) {
        let drained: Vec<CommandEnvelope> = {
            let mut inner = self.inner.lock().expect("queue mutex poisoned");
            inner.closed = true;
            inner.bands.iter_mut().flat_map(std::mem::take).collect()
        };

        if !drained.is_empty() {
            debug!(cancelled = drained.len(), "cancelling undispatched commands");
        }
        for envelope in drained {
            let _ = envelope.response_tx.send(Err(CoreError::Cancelled));
        }
        self.notify.notify_waiters();
    }

    /// Undispatched command count (for stats).
    pub fn pending(&self) -> usize {
        self.inner.lock().expect("queue mutex poisoned").pending()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Command;
    use tokio::sync::oneshot;
    use tokio::time::Instant;

    fn envelope(
        tag: &str,
    ) -> (
        CommandEnvelope,
        oneshot::Receiver<Result<crate::command::CommandResult, CoreError>>,
    ) {
        let (tx, rx) = oneshot::channel();
        (
            CommandEnvelope {
                command: Command::DeleteUser {
                    kind: crate::model::ObjectKind::HotspotUser,
                    name: tag.to_owned(),
                },
                submitted_at: Instant::now(),
                response_tx: tx,
            },
            rx,
        )
    }

    fn name_of(envelope: &CommandEnvelope) -> String {
        match &envelope.command {
            Command::DeleteUser { name, .. } => name.clone(),
            _ => unreachable!(),
        }
    }

    #[tokio::test]
    async fn fifo_within_a_band() {
        let queue = CommandQueue::new();
        for tag in ["a", "b", "c"] {
            let (env, _rx) = envelope(tag);
            queue.push(env, Priority::Normal);
        }

        for expected in ["a", "b", "c"] {
            let env = queue.pop().await.expect("queued envelope");
            assert_eq!(name_of(&env), expected);
        }
    }

    #[tokio::test]
    async fn higher_band_drains_before_lower_band_starts() {
        let queue = CommandQueue::new();
        let (bulk, _r1) = envelope("bulk");
        queue.push(bulk, Priority::Bulk);
        let (high, _r2) = envelope("high");
        queue.push(high, Priority::High);
        let (normal, _r3) = envelope("normal");
        queue.push(normal, Priority::Normal);

        assert_eq!(name_of(&queue.pop().await.expect("env")), "high");
        assert_eq!(name_of(&queue.pop().await.expect("env")), "normal");
        assert_eq!(name_of(&queue.pop().await.expect("env")), "bulk");
    }

    #[tokio::test]
    async fn bulk_is_dispatched_within_the_yield_bound() {
        let queue = CommandQueue::new();
        let (bulk, _rx) = envelope("bulk");
        queue.push(bulk, Priority::Bulk);

        let mut receivers = Vec::new();
        for i in 0..2 * YIELD_AFTER {
            let (env, rx) = envelope(&format!("high-{i}"));
            queue.push(env, Priority::High);
            receivers.push(rx);
        }

        let mut bulk_position = None;
        for position in 0..=2 * YIELD_AFTER {
            let env = queue.pop().await.expect("env");
            if name_of(&env) == "bulk" {
                bulk_position = Some(position);
                break;
            }
        }

        let position = bulk_position.expect("bulk command never dispatched");
        assert!(
            position <= YIELD_AFTER,
            "bulk waited {position} dispatches, bound is {YIELD_AFTER}"
        );
    }

    #[tokio::test]
    async fn yield_slot_goes_to_the_highest_waiting_lower_band() {
        let queue = CommandQueue::new();
        let (low, _r1) = envelope("low");
        queue.push(low, Priority::Low);
        let (bulk, _r2) = envelope("bulk");
        queue.push(bulk, Priority::Bulk);

        let mut receivers = Vec::new();
        for i in 0..2 * YIELD_AFTER {
            let (env, rx) = envelope(&format!("high-{i}"));
            queue.push(env, Priority::High);
            receivers.push(rx);
        }

        let mut order = Vec::new();
        for _ in 0..2 * YIELD_AFTER + 2 {
            order.push(name_of(&queue.pop().await.expect("env")));
        }

        // The first yield must serve Low (the highest waiting lower
        // band), not skip straight to Bulk.
        let first_lower = order
            .iter()
            .find(|name| !name.starts_with("high"))
            .expect("a lower band was served");
        assert_eq!(first_lower, "low");
        assert!(order.iter().any(|name| name == "bulk"));
    }

    #[tokio::test]
    async fn batch_preserves_submission_order() {
        let queue = CommandQueue::new();
        let mut batch = Vec::new();
        let mut receivers = Vec::new();
        for tag in ["b1", "b2", "b3"] {
            let (env, rx) = envelope(tag);
            batch.push(env);
            receivers.push(rx);
        }
        queue.push_batch(batch, Priority::Bulk);

        for expected in ["b1", "b2", "b3"] {
            assert_eq!(name_of(&queue.pop().await.expect("env")), expected);
        }
    }

    #[tokio::test]
    async fn close_cancels_undispatched_commands() {
        let queue = CommandQueue::new();
        let (env, rx) = envelope("pending");
        queue.push(env, Priority::Normal);

        queue.close();

        let result = rx.await.expect("response delivered");
        assert!(matches!(result, Err(CoreError::Cancelled)));
        assert!(queue.pop().await.is_none());

        // Pushes after teardown cancel immediately.
        let (late, late_rx) = envelope("late");
        queue.push(late, Priority::High);
        assert!(matches!(
            late_rx.await.expect("response delivered"),
            Err(CoreError::Cancelled)
        ));
    }
}
