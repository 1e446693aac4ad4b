//! Embed Bridge - owns one embedded player's browsing context
//!
//! Coordinates:
//! - Deferred source assignment (lazy loading behind the viewport gate)
//! - Connection warm-up while the load is still deferred
//! - Source and origin validation of inbound messages
//! - Outbound messaging into the embedded player
//!
//! ```text
//! Idle ──start()──▶ Configured ──lazy──▶ WaitingForViewport ──enter──▶ Armed ◀──▶ Loaded
//!                        └──────────────eager──────────────────────────▶ ┘
//! any ──stop()──▶ Terminated
//! ```

use crate::{
    compose::{compose, destination},
    config::EmbedConfig,
    context::EmbedContext,
    host::{BrowsingContext, SubscriptionId},
    messages::{is_empty_payload, MessageDecoder, MessageFilter},
    types::*,
    viewport::ViewportSubscription,
    Error, Result,
};
use serde::Serialize;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, instrument, trace, warn};

/// Receiving end of a bridge's notifications
pub type EmbedEvents = mpsc::UnboundedReceiver<EmbedEvent>;

/// Bridge between the application and one embedded player
///
/// Dropping the bridge stops it.
pub struct EmbedBridge {
    inner: Rc<BridgeInner>,
}

struct BridgeInner {
    /// Instance ID
    id: InstanceId,
    /// Shared context
    ctx: Rc<EmbedContext>,
    /// Last-seen configuration
    config: RefCell<EmbedConfig>,
    /// `config.src` with `config.params` appended
    composed: RefCell<String>,
    /// Set once the embed entered the viewport; never reset
    viewport_entered: Cell<bool>,
    /// Current lifecycle state
    state: Cell<BridgeState>,
    /// State change broadcaster
    state_tx: watch::Sender<BridgeState>,
    /// Outward notifications
    events_tx: mpsc::UnboundedSender<EmbedEvent>,
    /// Owned browsing context, present between start and stop
    frame: RefCell<Option<Box<dyn BrowsingContext>>>,
    handle: Cell<Option<ContextHandle>>,
    /// Pending viewport observation
    viewport: RefCell<Option<ViewportSubscription>>,
    /// Message subscription scoped to `handle`
    subscription: Cell<Option<SubscriptionId>>,
}

impl EmbedBridge {
    /// Create a bridge; nothing happens in the host until [`start`](Self::start)
    pub fn new(ctx: Rc<EmbedContext>, config: EmbedConfig) -> (Self, EmbedEvents) {
        let (state_tx, _) = watch::channel(BridgeState::Idle);
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let composed = config.composed_url();

        let inner = BridgeInner {
            id: ctx.next_instance_id(),
            ctx,
            config: RefCell::new(config),
            composed: RefCell::new(composed),
            viewport_entered: Cell::new(false),
            state: Cell::new(BridgeState::Idle),
            state_tx,
            events_tx,
            frame: RefCell::new(None),
            handle: Cell::new(None),
            viewport: RefCell::new(None),
            subscription: Cell::new(None),
        };

        (
            Self {
                inner: Rc::new(inner),
            },
            events_rx,
        )
    }

    /// Get instance ID
    pub fn id(&self) -> InstanceId {
        self.inner.id
    }

    /// DOM id of the browsing context
    pub fn dom_id(&self) -> String {
        self.inner.id.dom_id()
    }

    /// Get current state
    pub fn state(&self) -> BridgeState {
        self.inner.state.get()
    }

    /// Subscribe to state changes
    pub fn subscribe_state(&self) -> watch::Receiver<BridgeState> {
        self.inner.state_tx.subscribe()
    }

    /// Current composed source URL
    pub fn composed_url(&self) -> String {
        self.inner.composed.borrow().clone()
    }

    pub fn viewport_entered(&self) -> bool {
        self.inner.viewport_entered.get()
    }

    /// Handle of the owned browsing context while started
    pub fn context_handle(&self) -> Option<ContextHandle> {
        self.inner.handle.get()
    }

    /// Snapshot of the current configuration
    pub fn config(&self) -> EmbedConfig {
        self.inner.config.borrow().clone()
    }

    /// Attach the embed: create the browsing context and either arm it or wait
    /// for the viewport. Calling it again is a no-op.
    #[instrument(skip(self), fields(id = %self.inner.id))]
    pub fn start(&self) -> Result<()> {
        let inner = &self.inner;
        let state = inner.state.get();
        if state != BridgeState::Idle {
            debug!(%state, "Embed already started");
            return Ok(());
        }

        let dom_id = inner.id.dom_id();
        let title = inner.config.borrow().title.clone();

        let weak = Rc::downgrade(inner);
        let frame = inner.ctx.frames().create_frame(
            &dom_id,
            &title,
            Rc::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.content_loaded();
                }
            }),
        )?;
        let handle = frame.handle();
        *inner.frame.borrow_mut() = Some(frame);
        inner.handle.set(Some(handle));

        let weak = Rc::downgrade(inner);
        let subscription = inner.ctx.messages().subscribe(
            handle,
            Rc::new(move |message| {
                if let Some(inner) = weak.upgrade() {
                    inner.receive(message);
                }
            }),
        );
        inner.subscription.set(Some(subscription));

        inner.set_state(BridgeState::Configured)?;
        info!(dom_id = %dom_id, handle = %handle, "Embed attached");

        let url = inner.composed.borrow().clone();
        if !url.is_empty() {
            inner.emit(EmbedEvent::SourceChanged { url: url.clone() });
        }

        let (lazy, hints) = {
            let config = inner.config.borrow();
            (config.lazy, config.preconnect_hints.clone())
        };

        if !lazy {
            return inner.arm();
        }

        inner.set_state(BridgeState::WaitingForViewport)?;
        inner.warm_up(&url);
        inner.hint_all(&hints);

        let weak = Rc::downgrade(inner);
        let subscription = inner.ctx.gate().observe(&dom_id, move || {
            if let Some(inner) = weak.upgrade() {
                inner.enter_viewport();
            }
        });

        // The gate fires synchronously when the element is already visible
        if inner.state.get() == BridgeState::WaitingForViewport {
            *inner.viewport.borrow_mut() = Some(subscription);
        }

        Ok(())
    }

    /// Detach the embed. The viewport observation is disposed first, then the
    /// message subscription, then the browsing context. Idempotent.
    #[instrument(skip(self), fields(id = %self.inner.id))]
    pub fn stop(&self) {
        let inner = &self.inner;
        if inner.state.get() == BridgeState::Terminated {
            return;
        }

        let viewport = inner.viewport.borrow_mut().take();
        if let Some(viewport) = viewport {
            viewport.dispose();
        }

        if let Some(subscription) = inner.subscription.take() {
            inner.ctx.messages().unsubscribe(subscription);
        }

        let frame = inner.frame.borrow_mut().take();
        drop(frame);
        inner.handle.set(None);

        if let Err(e) = inner.set_state(BridgeState::Terminated) {
            warn!(error = %e, "Failed to mark embed detached");
        }
        info!("Embed detached");
    }

    /// Apply a configuration change and react to what changed
    #[instrument(skip_all, fields(id = %self.inner.id))]
    pub fn reconfigure(&self, update: impl FnOnce(&mut EmbedConfig)) {
        let inner = &self.inner;
        if inner.state.get() == BridgeState::Terminated {
            warn!("Ignoring reconfiguration of a detached embed");
            return;
        }

        let previous = inner.config.borrow().clone();
        update(&mut *inner.config.borrow_mut());
        let current = inner.config.borrow().clone();

        inner.apply_changes(&previous, &current);
    }

    pub fn set_src(&self, src: impl Into<String>) {
        let src = src.into();
        self.reconfigure(|config| config.src = src);
    }

    pub fn set_title(&self, title: impl Into<String>) {
        let title = title.into();
        self.reconfigure(|config| config.title = title);
    }

    pub fn set_lazy(&self, lazy: bool) {
        self.reconfigure(|config| config.lazy = lazy);
    }

    pub fn set_params(&self, params: EmbedParams) {
        self.reconfigure(|config| config.params = params);
    }

    pub fn set_param(&self, key: impl Into<String>, value: impl Into<ParamValue>) {
        let (key, value) = (key.into(), value.into());
        self.reconfigure(|config| {
            config.params.insert(key, value);
        });
    }

    pub fn set_origin(&self, origin: Option<String>) {
        self.reconfigure(|config| config.origin = origin);
    }

    pub fn set_preconnect_hints(&self, hints: Vec<String>) {
        self.reconfigure(|config| config.preconnect_hints = hints);
    }

    pub fn set_decoder(&self, decoder: Option<Rc<dyn MessageDecoder>>) {
        self.reconfigure(|config| config.decoder = decoder);
    }

    /// Serialize `message` as JSON and post it into the embedded player.
    ///
    /// `target` defaults to `*`. Before the context has a source, or after
    /// stop, nothing is sent. Delivery is fire-and-forget.
    pub fn post_message<T>(&self, message: &T, target: Option<&str>) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        let inner = &self.inner;
        let state = inner.state.get();
        if !state.is_armed() {
            debug!(id = %inner.id, %state, "Embed not armed, message not sent");
            return Ok(());
        }

        let data = serde_json::to_string(message)?;
        if let Some(frame) = inner.frame.borrow().as_ref() {
            if let Err(e) = frame.post(&data, target.unwrap_or("*")) {
                warn!(id = %inner.id, error = %e, "Message delivery failed");
            }
        }
        Ok(())
    }
}

impl Drop for EmbedBridge {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for EmbedBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbedBridge")
            .field("id", &self.inner.id)
            .field("state", &self.inner.state.get())
            .field("composed", &self.inner.composed.borrow())
            .field("viewport_entered", &self.inner.viewport_entered.get())
            .finish()
    }
}

impl BridgeInner {
    /// Transition to new state
    fn set_state(&self, new_state: BridgeState) -> Result<()> {
        let current = self.state.get();
        if current == new_state {
            return Ok(());
        }

        if !current.can_transition_to(new_state) {
            return Err(Error::InvalidStateTransition {
                from: current.to_string(),
                to: new_state.to_string(),
            });
        }

        self.state.set(new_state);
        self.state_tx.send_replace(new_state);

        debug!(id = %self.id, from = %current, to = %new_state, "State transition");
        Ok(())
    }

    fn emit(&self, event: EmbedEvent) {
        if self.events_tx.send(event).is_err() {
            trace!(id = %self.id, "Event receiver dropped");
        }
    }

    /// Loading is still deferred, so warm-up is worthwhile
    fn awaiting_load(&self) -> bool {
        !self.viewport_entered.get() && self.state.get() == BridgeState::WaitingForViewport
    }

    fn warm_up(&self, url: &str) {
        if !url.is_empty() {
            self.ctx.hinter().hint(&destination(url));
        }
    }

    fn hint_all(&self, hints: &[String]) {
        for hint in hints {
            self.ctx.hinter().hint(hint);
        }
    }

    /// Give the browsing context its source
    fn arm(&self) -> Result<()> {
        self.set_state(BridgeState::Armed)?;
        let url = self.composed.borrow().clone();
        self.load_source(&url);
        Ok(())
    }

    fn load_source(&self, url: &str) {
        if url.is_empty() {
            return;
        }
        if let Some(frame) = self.frame.borrow().as_ref() {
            info!(id = %self.id, url, "Loading embed source");
            frame.set_source(url);
        }
    }

    fn enter_viewport(&self) {
        if self.viewport_entered.replace(true) {
            return;
        }
        let fired = self.viewport.borrow_mut().take();
        drop(fired);

        debug!(id = %self.id, "Embed entered viewport");
        if self.state.get() == BridgeState::WaitingForViewport {
            if let Err(e) = self.arm() {
                warn!(id = %self.id, error = %e, "Failed to arm embed");
            }
        }
    }

    fn content_loaded(&self) {
        let state = self.state.get();
        if !state.is_armed() {
            // e.g. the initial about:blank document
            debug!(id = %self.id, %state, "Ignoring load before source assignment");
            return;
        }

        if let Err(e) = self.set_state(BridgeState::Loaded) {
            warn!(id = %self.id, error = %e, "Unexpected load");
            return;
        }
        info!(id = %self.id, "Embed loaded");
        self.emit(EmbedEvent::Loaded);
    }

    fn receive(&self, message: InboundMessage) {
        if !self.state.get().is_active() {
            return;
        }
        let Some(handle) = self.handle.get() else {
            return;
        };

        let (accepted, decoder) = {
            let config = self.config.borrow();
            let filter = MessageFilter::new(handle, config.origin.as_deref());
            (filter.accepts(&message), config.decoder.clone())
        };

        if !accepted {
            debug!(id = %self.id, origin = %message.origin, "Dropped message from unexpected source");
            return;
        }

        let payload = match decoder {
            Some(decoder) => decoder.decode(&message.data),
            None => Some(message.data),
        }
        .filter(|payload| !is_empty_payload(payload));

        match payload {
            Some(payload) => self.emit(EmbedEvent::MessageReceived { payload }),
            None => trace!(id = %self.id, "Message had nothing to report"),
        }
    }

    /// Diff-and-react step of reconfiguration
    fn apply_changes(&self, previous: &EmbedConfig, current: &EmbedConfig) {
        let composed = compose(&current.src, &current.params);
        let source_changed = *self.composed.borrow() != composed;
        if source_changed {
            *self.composed.borrow_mut() = composed.clone();
            self.source_changed(&composed);
        }

        if previous.preconnect_hints != current.preconnect_hints && self.awaiting_load() {
            self.hint_all(&current.preconnect_hints);
        }

        if previous.title != current.title {
            if let Some(frame) = self.frame.borrow().as_ref() {
                frame.set_title(&current.title);
            }
        }

        if previous.lazy && !current.lazy && self.state.get() == BridgeState::WaitingForViewport {
            let pending = self.viewport.borrow_mut().take();
            drop(pending);

            info!(id = %self.id, "Lazy loading disabled, loading now");
            if let Err(e) = self.arm() {
                warn!(id = %self.id, error = %e, "Failed to arm embed");
            }
        }
    }

    fn source_changed(&self, url: &str) {
        let state = self.state.get();
        if !state.is_active() {
            // `start()` announces whatever URL is current by then
            return;
        }

        self.emit(EmbedEvent::SourceChanged {
            url: url.to_string(),
        });

        if state.is_armed() {
            if state == BridgeState::Loaded {
                if let Err(e) = self.set_state(BridgeState::Armed) {
                    warn!(id = %self.id, error = %e, "Failed to re-arm embed");
                }
            }
            self.load_source(url);
        } else if self.awaiting_load() {
            self.warm_up(url);
        }
    }
}
