mod event;
mod queue;
mod sink;
mod tracker;

pub use event::{EventPayload, ServerEvent, UserProperty, client_id, hash_value};
pub use queue::{AnalyticsQueue, FlushReport, QueueSettings, QueueStats};
pub use sink::{CollectorTarget, DeliveryError, EventSink, GA4_DEBUG_ENDPOINT, GA4_ENDPOINT, HttpSink};
pub use tracker::{
    ChatAction, EmailAction, EventContext, JobStatus, SearchType, ServerAnalytics,
    VerificationAction, VersionAction,
};
