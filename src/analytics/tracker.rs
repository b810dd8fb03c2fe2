use super::event::{EventPayload, ServerEvent, UserProperty, client_id, hash_value};
use super::queue::AnalyticsQueue;
use super::sink::{EventSink, HttpSink};
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchType {
    Article,
    Glossary,
    Template,
    Web,
}

impl SearchType {
    fn as_str(self) -> &'static str {
        match self {
            SearchType::Article => "article",
            SearchType::Glossary => "glossary",
            SearchType::Template => "template",
            SearchType::Web => "web",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatAction {
    Created,
    MessageSent,
    Exported,
    Deleted,
}

impl ChatAction {
    fn as_str(self) -> &'static str {
        match self {
            ChatAction::Created => "created",
            ChatAction::MessageSent => "message_sent",
            ChatAction::Exported => "exported",
            ChatAction::Deleted => "deleted",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionAction {
    Created,
    Restored,
    Compared,
}

impl VersionAction {
    fn as_str(self) -> &'static str {
        match self {
            VersionAction::Created => "created",
            VersionAction::Restored => "restored",
            VersionAction::Compared => "compared",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationAction {
    Started,
    Submitted,
    Approved,
    Rejected,
}

impl VerificationAction {
    fn as_str(self) -> &'static str {
        match self {
            VerificationAction::Started => "started",
            VerificationAction::Submitted => "submitted",
            VerificationAction::Approved => "approved",
            VerificationAction::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailAction {
    Sent,
    Opened,
    Clicked,
    Bounced,
}

impl EmailAction {
    fn as_str(self) -> &'static str {
        match self {
            EmailAction::Sent => "sent",
            EmailAction::Opened => "opened",
            EmailAction::Clicked => "clicked",
            EmailAction::Bounced => "bounced",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Started,
    Completed,
    Failed,
}

impl JobStatus {
    fn as_str(self) -> &'static str {
        match self {
            JobStatus::Started => "started",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

// Who an event is about; everything optional
#[derive(Debug, Clone, Default)]
pub struct EventContext {
    pub client_id: Option<String>,
    pub user_id: Option<String>,
    pub user_properties: Map<String, Value>,
}

impl EventContext {
    pub fn user(user_id: &str) -> Self {
        let mut user_properties = Map::new();
        user_properties.insert("app_user_id".into(), json!(user_id));
        Self {
            client_id: None,
            user_id: Some(user_id.to_string()),
            user_properties,
        }
    }

    fn maybe_user(user_id: Option<&str>) -> Self {
        user_id.map(Self::user).unwrap_or_default()
    }

    fn with_property(mut self, key: &str, value: Value) -> Self {
        self.user_properties.insert(key.to_string(), value);
        self
    }
}

/// Builds server-side analytics events and hands them to the queue.
///
/// With no collector configured every call is a logged no-op.
pub struct ServerAnalytics<S: EventSink = HttpSink> {
    queue: Option<AnalyticsQueue<S>>,
    environment: String,
    warned_unconfigured: AtomicBool,
}

impl<S: EventSink> ServerAnalytics<S> {
    pub fn new(queue: Option<AnalyticsQueue<S>>, environment: impl Into<String>) -> Self {
        Self {
            queue,
            environment: environment.into(),
            warned_unconfigured: AtomicBool::new(false),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.queue.is_some()
    }

    pub fn queue(&self) -> Option<&AnalyticsQueue<S>> {
        self.queue.as_ref()
    }

    // Shape an event into a collector payload
    pub fn build_payload(&self, name: &str, params: Map<String, Value>, ctx: EventContext) -> EventPayload {
        let now = chrono::Utc::now();

        let mut params = params;
        params.insert("tracking_source".into(), json!("server"));
        params.insert("server_timestamp".into(), json!(now.timestamp_millis()));
        params.insert("environment".into(), json!(self.environment));

        let client_id = ctx
            .client_id
            .unwrap_or_else(|| client_id(ctx.user_id.as_deref(), None));

        let user_properties: BTreeMap<String, UserProperty> = ctx
            .user_properties
            .into_iter()
            .filter(|(_, v)| !v.is_null())
            .map(|(k, value)| (k, UserProperty { value }))
            .collect();

        EventPayload {
            client_id,
            user_id: ctx.user_id,
            timestamp_micros: now.timestamp_micros(),
            events: vec![ServerEvent {
                name: name.to_string(),
                params,
            }],
            user_properties,
        }
    }

    pub async fn track_event(&self, name: &str, params: Map<String, Value>, ctx: EventContext) {
        let Some(queue) = &self.queue else {
            if !self.warned_unconfigured.swap(true, Ordering::Relaxed) {
                warn!("server analytics not configured, events are discarded");
            }
            return;
        };
        let payload = self.build_payload(name, params, ctx);
        queue.enqueue(payload).await;
    }

    pub async fn track_api_call(
        &self,
        endpoint: &str,
        method: &str,
        status: u16,
        duration_ms: u64,
        user_id: Option<&str>,
        error: Option<&str>,
    ) {
        let mut params = object(json!({
            "api_endpoint": endpoint,
            "api_method": method,
            "api_status_code": status,
            "api_duration_ms": duration_ms,
            "api_success": status < 400,
        }));
        if let Some(error) = error {
            params.insert("api_error".into(), json!(error));
        }
        self.track_event("api_call", params, EventContext::maybe_user(user_id))
            .await;
    }

    pub async fn track_search(
        &self,
        query: &str,
        result_count: usize,
        search_type: SearchType,
        user_id: Option<&str>,
    ) {
        let params = object(json!({
            "search_term": query,
            "search_results_count": result_count,
            "search_type": search_type.as_str(),
            "search_location": "server",
        }));
        self.track_event("search", params, EventContext::maybe_user(user_id))
            .await;
    }

    pub async fn track_chat_session(
        &self,
        action: ChatAction,
        session_id: &str,
        user_id: Option<&str>,
        message_count: Option<u32>,
    ) {
        let mut params = object(json!({
            "chat_action": action.as_str(),
            "chat_session_id": session_id,
        }));
        if let Some(count) = message_count {
            params.insert("message_count".into(), json!(count));
        }
        self.track_event("chat_session", params, EventContext::maybe_user(user_id))
            .await;
    }

    pub async fn track_content_version(
        &self,
        action: VersionAction,
        article_id: &str,
        version_id: &str,
        user_id: &str,
    ) {
        let params = object(json!({
            "version_action": action.as_str(),
            "article_id": article_id,
            "version_id": version_id,
        }));
        let ctx = EventContext::user(user_id).with_property("user_type", json!("admin"));
        self.track_event("content_version", params, ctx).await;
    }

    // GDC registration numbers are hashed, never sent in the clear
    pub async fn track_professional_verification(
        &self,
        action: VerificationAction,
        user_id: &str,
        gdc_number: Option<&str>,
        verification_id: Option<&str>,
    ) {
        let mut params = object(json!({ "verification_action": action.as_str() }));
        if let Some(id) = verification_id {
            params.insert("verification_id".into(), json!(id));
        }
        if let Some(gdc) = gdc_number {
            params.insert("gdc_number_hash".into(), json!(hash_value(gdc)));
        }
        let ctx = EventContext::user(user_id).with_property("user_type", json!("professional"));
        self.track_event("professional_verification", params, ctx)
            .await;
    }

    pub async fn track_email(
        &self,
        action: EmailAction,
        email_type: &str,
        recipient_id: Option<&str>,
        email_id: Option<&str>,
    ) {
        let mut params = object(json!({
            "email_action": action.as_str(),
            "email_type": email_type,
        }));
        if let Some(id) = email_id {
            params.insert("email_id".into(), json!(id));
        }
        // recipients are reported under user_id, not app_user_id
        let ctx = recipient_id
            .map(|id| EventContext {
                client_id: None,
                user_id: Some(id.to_string()),
                user_properties: object(json!({ "user_id": id })),
            })
            .unwrap_or_default();
        self.track_event("email_event", params, ctx).await;
    }

    pub async fn track_scheduled_job(
        &self,
        job_name: &str,
        status: JobStatus,
        duration_ms: Option<u64>,
        error: Option<&str>,
    ) {
        let mut params = object(json!({
            "job_name": job_name,
            "job_status": status.as_str(),
        }));
        if let Some(ms) = duration_ms {
            params.insert("job_duration_ms".into(), json!(ms));
        }
        if let Some(error) = error {
            params.insert("job_error".into(), json!(error));
        }
        self.track_event("scheduled_job", params, EventContext::default())
            .await;
    }
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::queue::QueueSettings;
    use crate::analytics::sink::DeliveryError;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Collected(Mutex<Vec<EventPayload>>);

    impl EventSink for Collected {
        async fn deliver(&self, payload: &EventPayload) -> Result<(), DeliveryError> {
            self.0.lock().unwrap().push(payload.clone());
            Ok(())
        }
    }

    fn tracker() -> ServerAnalytics<Collected> {
        let settings = QueueSettings {
            batch_size: 100,
            ..Default::default()
        };
        ServerAnalytics::new(
            Some(AnalyticsQueue::new(Collected::default(), settings)),
            "test",
        )
    }

    async fn sent(analytics: &ServerAnalytics<Collected>) -> Vec<EventPayload> {
        let queue = analytics.queue().unwrap();
        queue.flush().await;
        queue.sink().0.lock().unwrap().clone()
    }

    #[tokio::test]
    async fn api_call_carries_server_context() {
        let analytics = tracker();
        analytics
            .track_api_call("/api/search", "GET", 500, 12, Some("user_9"), Some("boom"))
            .await;

        let payloads = sent(&analytics).await;
        assert_eq!(payloads.len(), 1);
        let payload = &payloads[0];
        assert_eq!(payload.user_id.as_deref(), Some("user_9"));
        assert_eq!(payload.client_id, client_id(Some("user_9"), None));
        assert_eq!(payload.user_properties["app_user_id"].value, json!("user_9"));

        let params = &payload.events[0].params;
        assert_eq!(payload.events[0].name, "api_call");
        assert_eq!(params["api_success"], json!(false));
        assert_eq!(params["api_error"], json!("boom"));
        assert_eq!(params["tracking_source"], json!("server"));
        assert_eq!(params["environment"], json!("test"));
    }

    #[tokio::test]
    async fn verification_hashes_gdc_number() {
        let analytics = tracker();
        analytics
            .track_professional_verification(
                VerificationAction::Submitted,
                "user_1",
                Some("GDC-555"),
                None,
            )
            .await;

        let payloads = sent(&analytics).await;
        let params = &payloads[0].events[0].params;
        assert_eq!(params["gdc_number_hash"], json!(hash_value("GDC-555")));
        assert!(!params.values().any(|v| v == "GDC-555"));
        assert_eq!(payloads[0].user_properties["user_type"].value, json!("professional"));
    }

    #[tokio::test]
    async fn anonymous_events_have_no_user() {
        let analytics = tracker();
        analytics
            .track_scheduled_job("sitemap", JobStatus::Completed, Some(40), None)
            .await;
        analytics
            .track_search("wisdom tooth", 3, SearchType::Article, None)
            .await;

        let payloads = sent(&analytics).await;
        assert_eq!(payloads.len(), 2);
        assert!(payloads.iter().all(|p| p.user_id.is_none() && p.user_properties.is_empty()));
        let search = payloads
            .iter()
            .find(|p| p.first_event_name() == Some("search"))
            .unwrap();
        assert_eq!(search.events[0].params["search_type"], json!("article"));
    }

    #[tokio::test]
    async fn email_recipient_is_reported_as_user_id() {
        let analytics = tracker();
        analytics
            .track_email(EmailAction::Sent, "digest", Some("user_4"), Some("mail_1"))
            .await;

        let payloads = sent(&analytics).await;
        let payload = &payloads[0];
        assert_eq!(payload.user_id.as_deref(), Some("user_4"));
        assert_eq!(payload.user_properties["user_id"].value, json!("user_4"));
        assert!(!payload.user_properties.contains_key("app_user_id"));
        assert_eq!(payload.events[0].params["email_id"], json!("mail_1"));
    }

    #[tokio::test]
    async fn unconfigured_tracker_discards() {
        let analytics: ServerAnalytics<Collected> = ServerAnalytics::new(None, "test");
        assert!(!analytics.is_configured());
        analytics
            .track_chat_session(ChatAction::Created, "s1", None, None)
            .await;
        assert!(analytics.queue().is_none());
    }
}
