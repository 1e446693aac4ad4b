//! One-shot viewport entry detection

use crate::host::{VisibilitySource, WatchId};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use tracing::trace;

/// Wraps a [`VisibilitySource`] so each registration fires at most once
pub struct ViewportGate {
    source: Rc<dyn VisibilitySource>,
}

impl ViewportGate {
    pub fn new(source: Rc<dyn VisibilitySource>) -> Self {
        Self { source }
    }

    /// Call `on_enter` the first time `element_id` becomes visible.
    ///
    /// The element is unwatched right after `on_enter` runs. Disposing (or
    /// dropping) the returned subscription before that cancels the callback.
    pub fn observe(&self, element_id: &str, on_enter: impl FnOnce() + 'static) -> ViewportSubscription {
        let slot = Rc::new(GateSlot {
            source: Rc::clone(&self.source),
            on_enter: RefCell::new(Some(Box::new(on_enter))),
            watch: Cell::new(None),
            done: Cell::new(false),
        });

        let listener_slot = Rc::clone(&slot);
        let id = self
            .source
            .watch(element_id, Rc::new(move |visible| listener_slot.visibility_changed(visible)));

        // The host may have reported visibility synchronously from `watch`
        if slot.done.get() {
            self.source.unwatch(id);
        } else {
            slot.watch.set(Some(id));
        }

        trace!(element_id, "Viewport observation started");
        ViewportSubscription { slot }
    }
}

struct GateSlot {
    source: Rc<dyn VisibilitySource>,
    on_enter: RefCell<Option<Box<dyn FnOnce()>>>,
    watch: Cell<Option<WatchId>>,
    done: Cell<bool>,
}

impl GateSlot {
    fn visibility_changed(&self, visible: bool) {
        if !visible || self.done.get() {
            return;
        }
        self.done.set(true);
        self.release();

        let on_enter = self.on_enter.borrow_mut().take();
        if let Some(on_enter) = on_enter {
            on_enter();
        }
    }

    fn dispose(&self) {
        self.done.set(true);
        let pending = self.on_enter.borrow_mut().take();
        drop(pending);
        self.release();
    }

    fn release(&self) {
        if let Some(id) = self.watch.take() {
            self.source.unwatch(id);
        }
    }
}

/// Handle to a pending viewport observation
pub struct ViewportSubscription {
    slot: Rc<GateSlot>,
}

impl ViewportSubscription {
    /// Cancel the observation. No-op once the callback has fired.
    pub fn dispose(&self) {
        self.slot.dispose();
    }

    /// Whether the observation has fired or been disposed
    pub fn is_finished(&self) -> bool {
        self.slot.done.get()
    }
}

impl Drop for ViewportSubscription {
    fn drop(&mut self) {
        self.slot.dispose();
    }
}
