//! Inbound message validation and decoding
//!
//! A message is accepted only when it comes from the bridge's own browsing
//! context and, if an expected origin is configured, from exactly that origin.
//! Both checks must pass; a missing source never matches.

use crate::types::{ContextHandle, InboundMessage};
use serde_json::Value;

/// Transforms or rejects an accepted raw payload
///
/// Returning `None` suppresses the notification.
pub trait MessageDecoder {
    fn decode(&self, raw: &Value) -> Option<Value>;
}

impl<F> MessageDecoder for F
where
    F: Fn(&Value) -> Option<Value>,
{
    fn decode(&self, raw: &Value) -> Option<Value> {
        self(raw)
    }
}

/// Decodes string payloads holding JSON documents
///
/// Players commonly `postMessage(JSON.stringify(...))`. Strings that are not
/// JSON and all other payloads pass through unchanged; empty payloads and
/// documents that decode to empty values are dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonDecoder;

impl MessageDecoder for JsonDecoder {
    fn decode(&self, raw: &Value) -> Option<Value> {
        let decoded = match raw {
            Value::String(text) => {
                serde_json::from_str::<Value>(text).unwrap_or_else(|_| raw.clone())
            }
            other => other.clone(),
        };
        (!is_empty_payload(&decoded)).then_some(decoded)
    }
}

/// Whether a payload carries nothing worth reporting
pub fn is_empty_payload(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(fields) => fields.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

/// Source and origin check for one browsing context
#[derive(Debug, Clone, Copy)]
pub struct MessageFilter<'a> {
    handle: ContextHandle,
    expected_origin: Option<&'a str>,
}

impl<'a> MessageFilter<'a> {
    pub fn new(handle: ContextHandle, expected_origin: Option<&'a str>) -> Self {
        Self {
            handle,
            expected_origin,
        }
    }

    /// Whether `message` passes both the source and the origin check
    pub fn accepts(&self, message: &InboundMessage) -> bool {
        if message.source != Some(self.handle) {
            return false;
        }

        match self.expected_origin {
            Some(origin) => message.origin == origin,
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const OWN: ContextHandle = ContextHandle(1);
    const OTHER: ContextHandle = ContextHandle(2);

    fn message(source: Option<ContextHandle>, origin: &str) -> InboundMessage {
        InboundMessage {
            source,
            origin: origin.to_string(),
            data: json!({"event": "ready"}),
        }
    }

    #[test]
    fn test_foreign_source_rejected_for_any_origin() {
        let open = MessageFilter::new(OWN, None);
        let pinned = MessageFilter::new(OWN, Some("https://player.example"));

        for origin in ["https://player.example", "https://evil.example", "", "null"] {
            assert!(!open.accepts(&message(Some(OTHER), origin)));
            assert!(!open.accepts(&message(None, origin)));
            assert!(!pinned.accepts(&message(Some(OTHER), origin)));
        }
    }

    #[test]
    fn test_origin_must_match_exactly() {
        let pinned = MessageFilter::new(OWN, Some("https://player.example"));

        assert!(pinned.accepts(&message(Some(OWN), "https://player.example")));
        assert!(!pinned.accepts(&message(Some(OWN), "https://evil.example")));
        assert!(!pinned.accepts(&message(Some(OWN), "https://player.example/")));
        assert!(!pinned.accepts(&message(Some(OWN), "http://player.example")));
    }

    #[test]
    fn test_no_expected_origin_accepts_own_source() {
        let open = MessageFilter::new(OWN, None);
        assert!(open.accepts(&message(Some(OWN), "https://anything.example")));
    }

    #[test]
    fn test_json_decoder() {
        let decoder = JsonDecoder;
        assert_eq!(
            decoder.decode(&json!(r#"{"event":"play"}"#)),
            Some(json!({"event": "play"}))
        );
        assert_eq!(decoder.decode(&json!("plain text")), Some(json!("plain text")));
        assert_eq!(decoder.decode(&json!({"a": 1})), Some(json!({"a": 1})));
        assert_eq!(decoder.decode(&json!("")), None);
        assert_eq!(decoder.decode(&json!("{}")), None);
        assert_eq!(decoder.decode(&Value::Null), None);
    }

    #[test]
    fn test_closure_decoder() {
        let decoder = |raw: &Value| raw.get("event").cloned();
        assert_eq!(decoder.decode(&json!({"event": "pause"})), Some(json!("pause")));
        assert_eq!(decoder.decode(&json!({"other": 1})), None);
    }

    #[test]
    fn test_empty_payloads() {
        assert!(is_empty_payload(&Value::Null));
        assert!(is_empty_payload(&json!("")));
        assert!(is_empty_payload(&json!([])));
        assert!(!is_empty_payload(&json!(0)));
        assert!(!is_empty_payload(&json!(false)));
        assert!(!is_empty_payload(&json!("x")));
    }
}
