//! Core types for Kino Embed

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Identifier assigned to an embed instance when it is constructed
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct InstanceId(pub u64);

impl InstanceId {
    /// DOM-addressable id of the instance's browsing context
    pub fn dom_id(&self) -> String {
        format!("kino-embed-{}", self.0)
    }
}

impl std::fmt::Display for InstanceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque identity of a browsing context, issued by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContextHandle(pub u64);

impl std::fmt::Display for ContextHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ctx#{}", self.0)
    }
}

/// Value of a single embed URL parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl std::fmt::Display for ParamValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParamValue::Bool(b) => write!(f, "{}", b),
            ParamValue::Int(n) => write!(f, "{}", n),
            ParamValue::Float(n) => write!(f, "{}", n),
            ParamValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        ParamValue::Bool(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        ParamValue::Int(value)
    }
}

impl From<i32> for ParamValue {
    fn from(value: i32) -> Self {
        ParamValue::Int(value.into())
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        ParamValue::Float(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Text(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Text(value)
    }
}

/// Embed URL parameters, ordered by key so composition is deterministic
pub type EmbedParams = BTreeMap<String, ParamValue>;

/// Embed bridge lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BridgeState {
    /// Constructed, not yet started
    Idle,
    /// Started; browsing context exists without a source
    Configured,
    /// Lazy embed waiting for the element to enter the viewport
    WaitingForViewport,
    /// Browsing context has been given its source
    Armed,
    /// Browsing context reported its content loaded
    Loaded,
    /// Stopped; no further callbacks are delivered
    Terminated,
}

impl BridgeState {
    /// Check if transition to new state is valid
    pub fn can_transition_to(&self, new_state: BridgeState) -> bool {
        use BridgeState::*;

        matches!(
            (self, new_state),
            (Idle, Configured)
                | (Configured, WaitingForViewport)
                | (Configured, Armed)
                | (WaitingForViewport, Armed)
                | (Armed, Loaded)
                | (Loaded, Armed)
                | (_, Terminated)
        )
    }

    /// Whether the browsing context may hold a source
    pub fn is_armed(&self) -> bool {
        matches!(self, BridgeState::Armed | BridgeState::Loaded)
    }

    /// Whether `start()` has run and `stop()` has not
    pub fn is_active(&self) -> bool {
        !matches!(self, BridgeState::Idle | BridgeState::Terminated)
    }
}

impl std::fmt::Display for BridgeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BridgeState::Idle => write!(f, "idle"),
            BridgeState::Configured => write!(f, "configured"),
            BridgeState::WaitingForViewport => write!(f, "waiting_for_viewport"),
            BridgeState::Armed => write!(f, "armed"),
            BridgeState::Loaded => write!(f, "loaded"),
            BridgeState::Terminated => write!(f, "terminated"),
        }
    }
}

/// Message delivered by the host from some browsing context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Context the message claims to come from (`None` when the host could not
    /// attribute it to a known context)
    pub source: Option<ContextHandle>,
    /// Origin reported by the host, e.g. `https://player.example`
    pub origin: String,
    /// Raw payload
    pub data: serde_json::Value,
}

impl InboundMessage {
    pub fn new(source: ContextHandle, origin: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            source: Some(source),
            origin: origin.into(),
            data,
        }
    }
}

/// Notifications emitted by an embed bridge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EmbedEvent {
    /// Composed source URL changed
    SourceChanged { url: String },
    /// Validated (and decoded) message from the embedded content
    MessageReceived { payload: serde_json::Value },
    /// Embedded content finished loading
    Loaded,
}
