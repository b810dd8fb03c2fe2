use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

static SEED_SEQ: AtomicU64 = AtomicU64::new(0);

// One named event with its parameters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerEvent {
    pub name: String,
    #[serde(default)]
    pub params: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserProperty {
    pub value: Value,
}

/// Measurement Protocol request body. The collector gets one of these per
/// HTTP call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EventPayload {
    pub client_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub timestamp_micros: i64,
    pub events: Vec<ServerEvent>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub user_properties: BTreeMap<String, UserProperty>,
}

impl EventPayload {
    pub fn first_event_name(&self) -> Option<&str> {
        self.events.first().map(|e| e.name.as_str())
    }
}

// 32 hex chars derived from the user or session id, random-ish otherwise
pub fn client_id(user_id: Option<&str>, session_id: Option<&str>) -> String {
    let seed = match user_id.or(session_id) {
        Some(id) => id.to_string(),
        None => format!(
            "{}-{}",
            chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default(),
            SEED_SEQ.fetch_add(1, Ordering::Relaxed)
        ),
    };
    let mut hasher = Sha256::new();
    hasher.update(seed.as_bytes());
    let mut hex = format!("{:x}", hasher.finalize());
    hex.truncate(32);
    hex
}

// Hash a sensitive value (emails, registration numbers) before it leaves
pub fn hash_value(value: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value.trim().to_lowercase().as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn client_id_is_stable_for_a_user() {
        let a = client_id(Some("user_1"), None);
        assert_eq!(a.len(), 32);
        assert_eq!(a, client_id(Some("user_1"), Some("session")));
        assert_eq!(client_id(None, Some("s1")), client_id(None, Some("s1")));
        assert_ne!(client_id(None, None), client_id(None, None));
    }

    #[test]
    fn hash_value_normalises_input() {
        assert_eq!(hash_value(" GDC123 "), hash_value("gdc123"));
        assert_eq!(hash_value("x").len(), 64);
    }

    #[test]
    fn payload_serialises_in_collector_shape() {
        let mut props = BTreeMap::new();
        props.insert("user_type".to_string(), UserProperty { value: json!("admin") });
        let payload = EventPayload {
            client_id: "abc".into(),
            user_id: None,
            timestamp_micros: 1,
            events: vec![ServerEvent { name: "search".into(), params: Map::new() }],
            user_properties: props,
        };
        let body = serde_json::to_value(&payload).unwrap();
        assert!(body.get("user_id").is_none());
        assert_eq!(body["user_properties"]["user_type"]["value"], "admin");
        assert_eq!(body["events"][0]["name"], "search");
    }
}
