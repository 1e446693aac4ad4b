//! Kino Embed - iframe embed bridge for third-party players
//!
//! This crate wraps a third-party player loaded inside an isolated browsing
//! context:
//! - Deferred loading until the embed enters the viewport
//! - Connection warm-up that never hints the same host twice
//! - Source- and origin-validated inbound messages
//! - Fire-and-forget outbound messages
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         Kino Embed                              │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐           │
//! │  │     URL      │  │  Connection  │  │   Viewport   │           │
//! │  │   Composer   │  │    Hinter    │  │     Gate     │           │
//! │  └──────┬───────┘  └──────┬───────┘  └──────┬───────┘           │
//! │         │                 │                 │                   │
//! │         └─────────────────┼─────────────────┘                   │
//! │                           │                                     │
//! │                    ┌──────┴──────┐                              │
//! │                    │    Embed    │◀──── EmbedContext (shared)   │
//! │                    │   Bridge    │                              │
//! │                    └──────┬──────┘                              │
//! │                           │                                     │
//! │  ┌──────────────┐  ┌──────┴──────┐  ┌──────────────┐            │
//! │  │   Message    │  │    Host     │  │    Event     │            │
//! │  │    Filter    │  │   Traits    │  │   Channel    │            │
//! │  └──────────────┘  └─────────────┘  └──────────────┘            │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust
//! use std::rc::Rc;
//! use kino_embed::{EmbedBridge, EmbedConfig, EmbedContext, EmbedEvent};
//! use kino_embed::headless::HeadlessHost;
//!
//! let host = Rc::new(HeadlessHost::new());
//! let ctx = EmbedContext::new(host.clone());
//!
//! let config = EmbedConfig::new("https://player.example/embed/abc").with_param("autoplay", 1);
//! let (bridge, mut events) = EmbedBridge::new(ctx, config);
//! bridge.start().unwrap();
//!
//! host.set_visible(&bridge.dom_id(), true);
//! assert_eq!(
//!     events.try_recv().unwrap(),
//!     EmbedEvent::SourceChanged { url: "https://player.example/embed/abc?autoplay=1".into() }
//! );
//! ```

pub mod error;
pub mod types;
pub mod compose;
pub mod config;
pub mod host;
pub mod hints;
pub mod viewport;
pub mod messages;
pub mod context;
pub mod bridge;
#[cfg(feature = "headless")]
pub mod headless;

pub use error::{Error, Result};
pub use types::*;
pub use compose::{compose, destination};
pub use config::EmbedConfig;
pub use host::EmbedHost;
pub use hints::ConnectionHinter;
pub use viewport::{ViewportGate, ViewportSubscription};
pub use messages::{JsonDecoder, MessageDecoder, MessageFilter};
pub use context::EmbedContext;
pub use bridge::{EmbedBridge, EmbedEvents};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Log library initialization
pub fn init() {
    tracing::info!(version = VERSION, "Kino Embed initialized");
}
