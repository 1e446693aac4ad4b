//! Host environment collaborators
//!
//! The bridge never touches a document, a network stack or a window directly.
//! Everything it needs from the environment goes through these traits; the
//! browser implementation lives in `kino-embed-wasm` and an in-memory one in
//! [`crate::headless`].
//!
//! All callbacks run on the host's single UI thread, so nothing here is `Send`.

use crate::types::{ContextHandle, InboundMessage};
use crate::Result;
use std::rc::Rc;

/// Receives visibility changes for a watched element
pub type VisibilityListener = Rc<dyn Fn(bool)>;

/// Receives messages for a subscribed browsing context
pub type MessageListener = Rc<dyn Fn(InboundMessage)>;

/// Invoked each time a browsing context finishes loading content
pub type LoadListener = Rc<dyn Fn()>;

/// Registration token returned by [`VisibilitySource::watch`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatchId(pub u64);

/// Registration token returned by [`MessageChannel::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// Issues network preconnection hints
pub trait Preconnector {
    /// Best-effort warm-up of a connection to `url`
    fn preconnect(&self, url: &str) -> Result<()>;
}

/// Reports element visibility within the viewport
pub trait VisibilitySource {
    /// Start reporting visibility changes of the element with `element_id`.
    ///
    /// Implementations may invoke `listener` synchronously from inside this call
    /// when the element is already visible.
    fn watch(&self, element_id: &str, listener: VisibilityListener) -> WatchId;

    /// Stop reporting for `id`. Unknown ids are ignored.
    fn unwatch(&self, id: WatchId);
}

/// An isolated browsing context (an iframe on the web)
///
/// Dropping the value releases the context.
pub trait BrowsingContext {
    /// Identity used to attribute inbound messages
    fn handle(&self) -> ContextHandle;

    /// Point the context at `url`, starting the network fetch
    fn set_source(&self, url: &str);

    /// Accessible label of the context
    fn set_title(&self, title: &str);

    /// Post serialized `data` into the context
    fn post(&self, data: &str, target_origin: &str) -> Result<()>;
}

/// Creates browsing contexts
pub trait FrameFactory {
    /// Create a context with no source. `on_load` runs every time the context
    /// reports loaded content.
    fn create_frame(
        &self,
        element_id: &str,
        title: &str,
        on_load: LoadListener,
    ) -> Result<Box<dyn BrowsingContext>>;
}

/// Delivers cross-context messages
pub trait MessageChannel {
    /// Subscribe to messages coming from `handle`
    fn subscribe(&self, handle: ContextHandle, listener: MessageListener) -> SubscriptionId;

    /// Cancel a subscription. Unknown ids are ignored.
    fn unsubscribe(&self, id: SubscriptionId);
}

/// Everything the bridge needs from its environment
pub trait EmbedHost: Preconnector + VisibilitySource + FrameFactory + MessageChannel {}

impl<T> EmbedHost for T where T: Preconnector + VisibilitySource + FrameFactory + MessageChannel {}
