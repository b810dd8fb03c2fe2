use crate::analytics::{EventSink, ServerAnalytics};
use crate::rate_limit::RateLimiter;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info};

/// Background maintenance, one tick per `every`: sweep the rate limit store
/// and push out whatever the analytics queue still holds (including events
/// re-queued by a failed flush).
pub fn start<S: EventSink>(
    limiter: Arc<RateLimiter>,
    analytics: Arc<ServerAnalytics<S>>,
    every: Duration,
) -> JoinHandle<()> {
    info!("Housekeeping started (interval: {:?})", every);

    tokio::spawn(async move {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // first tick completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;
            run_once(&limiter, &analytics).await;
        }
    })
}

pub async fn run_once<S: EventSink>(limiter: &RateLimiter, analytics: &ServerAnalytics<S>) {
    let purged = limiter.sweep();

    let Some(queue) = analytics.queue() else {
        debug!(purged, "housekeeping tick");
        return;
    };
    if queue.is_empty().await {
        debug!(purged, "housekeeping tick");
        return;
    }
    let report = queue.flush().await;
    debug!(
        purged,
        delivered = report.delivered,
        requeued = report.requeued,
        "housekeeping tick"
    );
}
