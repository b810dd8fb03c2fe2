use super::event::EventPayload;
use super::sink::{DeliveryError, EventSink};
use crate::metrics::{EVENTS_DELIVERED, EVENTS_DROPPED, EVENTS_FAILED, QUEUE_DEPTH};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueSettings {
    // flush as soon as this many events are waiting
    pub batch_size: usize,
    // flush this long after the first unflushed event
    pub flush_delay: Duration,
    // oldest events are dropped beyond this
    pub max_queue: usize,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            batch_size: 10,
            flush_delay: Duration::from_secs(5),
            max_queue: 1000,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlushReport {
    pub attempted: usize,
    pub delivered: usize,
    pub requeued: usize,
    pub dropped: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStats {
    pub pending: usize,
    pub flushes: u64,
    pub delivered: u64,
    pub failed: u64,
    pub dropped: u64,
}

/// In-memory analytics buffer that flushes to an [`EventSink`] off the
/// request path.
///
/// A flush starts when `batch_size` events are waiting, or `flush_delay`
/// after the first unflushed event (a single timer is armed at a time).
/// Only one flush runs at once and at most one size-triggered flush waits
/// behind it. A flush delivers up to `batch_size` payloads concurrently and
/// stops early when a whole batch fails transiently. Payloads whose delivery
/// fails transiently go back to the front of the queue for the next flush;
/// anything else is dropped. Delivery is best effort: events can be lost or counted twice if
/// the process exits mid-flush.
pub struct AnalyticsQueue<S: EventSink> {
    inner: Arc<Inner<S>>,
}

impl<S: EventSink> Clone for AnalyticsQueue<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct Inner<S> {
    sink: S,
    settings: QueueSettings,
    pending: Mutex<VecDeque<EventPayload>>,
    timer: Mutex<Option<JoinHandle<()>>>,
    flush_lock: Mutex<()>,
    // a size-triggered flush task exists
    auto_flush: AtomicBool,
    flushes: AtomicU64,
    delivered: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
}

impl<S: EventSink> AnalyticsQueue<S> {
    pub fn new(sink: S, settings: QueueSettings) -> Self {
        Self {
            inner: Arc::new(Inner {
                sink,
                settings,
                pending: Mutex::new(VecDeque::new()),
                timer: Mutex::new(None),
                flush_lock: Mutex::new(()),
                auto_flush: AtomicBool::new(false),
                flushes: AtomicU64::new(0),
                delivered: AtomicU64::new(0),
                failed: AtomicU64::new(0),
                dropped: AtomicU64::new(0),
            }),
        }
    }

    #[cfg(test)]
    pub(crate) fn sink(&self) -> &S {
        &self.inner.sink
    }

    /// Queue one payload. Never waits on the network.
    pub async fn enqueue(&self, payload: EventPayload) {
        let depth = {
            let mut pending = self.inner.pending.lock().await;
            pending.push_back(payload);
            self.inner.trim(&mut pending);
            QUEUE_DEPTH.set(pending.len() as i64);
            pending.len()
        };

        if depth >= self.inner.settings.batch_size
            && !self.inner.auto_flush.swap(true, Ordering::AcqRel)
        {
            self.inner.cancel_timer().await;
            let inner = Arc::clone(&self.inner);
            tokio::spawn(async move {
                inner.flush().await;
                inner.auto_flush.store(false, Ordering::Release);
            });
        } else {
            // a pending flush may already have drained; the timer picks up the rest
            arm_timer(&self.inner).await;
        }
    }

    // Deliver everything queued right now
    pub async fn flush(&self) -> FlushReport {
        self.inner.flush().await
    }

    pub async fn len(&self) -> usize {
        self.inner.pending.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn stats(&self) -> QueueStats {
        QueueStats {
            pending: self.len().await,
            flushes: self.inner.flushes.load(Ordering::Relaxed),
            delivered: self.inner.delivered.load(Ordering::Relaxed),
            failed: self.inner.failed.load(Ordering::Relaxed),
            dropped: self.inner.dropped.load(Ordering::Relaxed),
        }
    }
}

async fn arm_timer<S: EventSink>(inner: &Arc<Inner<S>>) {
    let mut timer = inner.timer.lock().await;
    if timer.as_ref().is_some_and(|h| !h.is_finished()) {
        return;
    }

    let deadline = tokio::time::Instant::now() + inner.settings.flush_delay;
    let task_inner = Arc::clone(inner);
    *timer = Some(tokio::spawn(async move {
        tokio::time::sleep_until(deadline).await;
        // clear our own slot first so the flush below does not abort us
        task_inner.timer.lock().await.take();
        task_inner.flush().await;
    }));
}

impl<S: EventSink> Inner<S> {
    // One concurrent delivery per payload, results back in queue order.
    // Also returns how many payloads were lost to a panicking sink.
    async fn deliver_all(
        self: &Arc<Self>,
        chunk: Vec<EventPayload>,
    ) -> (Vec<(EventPayload, Result<(), DeliveryError>)>, usize) {
        let mut tasks = JoinSet::new();
        for (index, payload) in chunk.into_iter().enumerate() {
            let inner = Arc::clone(self);
            tasks.spawn(async move {
                let result = inner.sink.deliver(&payload).await;
                (index, payload, result)
            });
        }

        let mut outcomes = Vec::with_capacity(tasks.len());
        let mut lost = 0;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    warn!(error = %e, "analytics delivery task failed");
                    lost += 1;
                }
            }
        }
        outcomes.sort_by_key(|(index, ..)| *index);
        let outcomes = outcomes
            .into_iter()
            .map(|(_, payload, result)| (payload, result))
            .collect();
        (outcomes, lost)
    }

    async fn cancel_timer(&self) {
        if let Some(handle) = self.timer.lock().await.take() {
            handle.abort();
        }
    }

    // drop the oldest payloads past max_queue
    fn trim(&self, pending: &mut VecDeque<EventPayload>) {
        let overflow = pending.len().saturating_sub(self.settings.max_queue);
        if overflow == 0 {
            return;
        }
        pending.drain(..overflow);
        self.dropped.fetch_add(overflow as u64, Ordering::Relaxed);
        EVENTS_DROPPED.inc_by(overflow as u64);
        warn!(dropped = overflow, "analytics queue full, dropped oldest events");
    }

    async fn flush(self: &Arc<Self>) -> FlushReport {
        let _in_flight = self.flush_lock.lock().await;
        self.cancel_timer().await;

        let batch: Vec<EventPayload> = self.pending.lock().await.drain(..).collect();
        if batch.is_empty() {
            return FlushReport::default();
        }
        self.flushes.fetch_add(1, Ordering::Relaxed);

        let mut report = FlushReport {
            attempted: batch.len(),
            ..Default::default()
        };
        let mut retry = Vec::new();
        let mut remaining = batch.into_iter();

        loop {
            let chunk: Vec<EventPayload> = remaining
                .by_ref()
                .take(self.settings.batch_size.max(1))
                .collect();
            if chunk.is_empty() {
                break;
            }

            let (outcomes, lost) = self.deliver_all(chunk).await;
            report.dropped += lost;
            let collector_down = !outcomes.is_empty()
                && outcomes
                    .iter()
                    .all(|(_, result)| matches!(result, Err(e) if e.is_retryable()));

            for (payload, result) in outcomes {
                match result {
                    Ok(()) => report.delivered += 1,
                    Err(e) if e.is_retryable() => {
                        debug!(error = %e, code = e.api_error("collector").kind().code(), event = ?payload.first_event_name(), "delivery failed, will retry");
                        retry.push(payload);
                    }
                    Err(e) => {
                        warn!(error = %e, code = e.api_error("collector").kind().code(), event = ?payload.first_event_name(), "delivery rejected, dropping event");
                        report.dropped += 1;
                    }
                }
            }

            if collector_down {
                // whole batch failed, keep the rest for the next flush
                retry.extend(remaining.by_ref());
                break;
            }
        }

        report.requeued = retry.len();
        self.delivered.fetch_add(report.delivered as u64, Ordering::Relaxed);
        self.failed.fetch_add(report.requeued as u64, Ordering::Relaxed);
        self.dropped.fetch_add(report.dropped as u64, Ordering::Relaxed);
        EVENTS_DELIVERED.inc_by(report.delivered as u64);
        EVENTS_FAILED.inc_by(report.requeued as u64);
        EVENTS_DROPPED.inc_by(report.dropped as u64);

        let mut pending = self.pending.lock().await;
        // failed payloads go back in front, in the order they were sent
        for payload in retry.into_iter().rev() {
            pending.push_front(payload);
        }
        self.trim(&mut pending);
        QUEUE_DEPTH.set(pending.len() as i64);

        if report.requeued > 0 || report.dropped > 0 {
            warn!(
                delivered = report.delivered,
                requeued = report.requeued,
                dropped = report.dropped,
                "analytics flush incomplete"
            );
        } else {
            info!(delivered = report.delivered, "analytics flushed");
        }
        report
    }
}
