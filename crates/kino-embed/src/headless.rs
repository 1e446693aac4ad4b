//! In-memory host
//!
//! Implements every host collaborator without a browser. Each call the bridge
//! makes is recorded as a [`HostOp`], and the environment side (visibility,
//! load completion, inbound messages) is driven explicitly. Used by the test
//! suite and by `kino-embed preview`.

use crate::host::{
    BrowsingContext, FrameFactory, LoadListener, MessageChannel, MessageListener, Preconnector,
    SubscriptionId, VisibilityListener, VisibilitySource, WatchId,
};
use crate::types::{ContextHandle, InboundMessage};
use crate::{Error, Result};
use serde::Serialize;
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashSet};
use std::rc::Rc;

/// A host operation performed on behalf of a bridge
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum HostOp {
    Preconnect { url: String },
    Watch { element_id: String },
    Unwatch { element_id: String },
    CreateFrame { element_id: String, handle: ContextHandle },
    SetSource { handle: ContextHandle, url: String },
    SetTitle { handle: ContextHandle, title: String },
    Post { handle: ContextHandle, data: String, target_origin: String },
    Subscribe { handle: ContextHandle },
    Unsubscribe { handle: ContextHandle },
    ReleaseFrame { handle: ContextHandle },
}

impl std::fmt::Display for HostOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HostOp::Preconnect { url } => write!(f, "preconnect {}", url),
            HostOp::Watch { element_id } => write!(f, "watch #{}", element_id),
            HostOp::Unwatch { element_id } => write!(f, "unwatch #{}", element_id),
            HostOp::CreateFrame { element_id, handle } => {
                write!(f, "create frame #{} ({})", element_id, handle)
            }
            HostOp::SetSource { handle, url } => write!(f, "{} src = {}", handle, url),
            HostOp::SetTitle { handle, title } => write!(f, "{} title = {:?}", handle, title),
            HostOp::Post {
                handle,
                data,
                target_origin,
            } => write!(f, "post to {} [{}]: {}", handle, target_origin, data),
            HostOp::Subscribe { handle } => write!(f, "subscribe {}", handle),
            HostOp::Unsubscribe { handle } => write!(f, "unsubscribe {}", handle),
            HostOp::ReleaseFrame { handle } => write!(f, "release {}", handle),
        }
    }
}

/// Observable state of a headless browsing context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameSnapshot {
    pub element_id: String,
    pub title: String,
    /// Every source the frame was pointed at, oldest first
    pub sources: Vec<String>,
    /// `(data, target_origin)` pairs posted into the frame
    pub posted: Vec<(String, String)>,
    pub released: bool,
}

impl FrameSnapshot {
    /// Current source, if any was assigned
    pub fn source(&self) -> Option<&str> {
        self.sources.last().map(String::as_str)
    }
}

struct FrameRecord {
    snapshot: FrameSnapshot,
    on_load: LoadListener,
}

#[derive(Default)]
struct Shared {
    ops: RefCell<Vec<HostOp>>,
    last_id: Cell<u64>,
    fail_preconnect: Cell<bool>,
    fail_frames: Cell<bool>,
    visible: RefCell<HashSet<String>>,
    watchers: RefCell<BTreeMap<u64, (String, VisibilityListener)>>,
    frames: RefCell<BTreeMap<u64, FrameRecord>>,
    subscriptions: RefCell<BTreeMap<u64, (ContextHandle, MessageListener)>>,
}

impl Shared {
    fn next_id(&self) -> u64 {
        let id = self.last_id.get() + 1;
        self.last_id.set(id);
        id
    }

    fn record(&self, op: HostOp) {
        self.ops.borrow_mut().push(op);
    }
}

/// Host environment kept entirely in memory
#[derive(Default)]
pub struct HeadlessHost {
    shared: Rc<Shared>,
}

impl HeadlessHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent preconnects fail
    pub fn fail_preconnects(&self, fail: bool) {
        self.shared.fail_preconnect.set(fail);
    }

    /// Make subsequent frame creation fail
    pub fn fail_frame_creation(&self, fail: bool) {
        self.shared.fail_frames.set(fail);
    }

    /// Change the visibility of `element_id` and notify its watchers
    pub fn set_visible(&self, element_id: &str, visible: bool) {
        if visible {
            self.shared.visible.borrow_mut().insert(element_id.to_string());
        } else {
            self.shared.visible.borrow_mut().remove(element_id);
        }

        let listeners: Vec<VisibilityListener> = self
            .shared
            .watchers
            .borrow()
            .values()
            .filter(|(id, _)| id == element_id)
            .map(|(_, listener)| Rc::clone(listener))
            .collect();

        for listener in listeners {
            listener(visible);
        }
    }

    /// Report that the frame `handle` finished loading its content
    pub fn complete_load(&self, handle: ContextHandle) {
        let on_load = self
            .shared
            .frames
            .borrow()
            .get(&handle.0)
            .filter(|record| !record.snapshot.released)
            .map(|record| Rc::clone(&record.on_load));

        if let Some(on_load) = on_load {
            on_load();
        }
    }

    /// Deliver `message` to subscribers of its source context only
    pub fn dispatch(&self, message: InboundMessage) {
        self.deliver(message, true);
    }

    /// Deliver `message` to every subscriber regardless of scope, the way a
    /// page-wide message listener would see it
    pub fn broadcast(&self, message: InboundMessage) {
        self.deliver(message, false);
    }

    fn deliver(&self, message: InboundMessage, scoped: bool) {
        let listeners: Vec<MessageListener> = self
            .shared
            .subscriptions
            .borrow()
            .values()
            .filter(|(handle, _)| !scoped || message.source == Some(*handle))
            .map(|(_, listener)| Rc::clone(listener))
            .collect();

        for listener in listeners {
            listener(message.clone());
        }
    }

    /// Handle of the live frame created for `element_id`
    pub fn frame_for(&self, element_id: &str) -> Option<ContextHandle> {
        self.shared
            .frames
            .borrow()
            .iter()
            .find(|(_, record)| {
                record.snapshot.element_id == element_id && !record.snapshot.released
            })
            .map(|(id, _)| ContextHandle(*id))
    }

    pub fn frame(&self, handle: ContextHandle) -> Option<FrameSnapshot> {
        self.shared
            .frames
            .borrow()
            .get(&handle.0)
            .map(|record| record.snapshot.clone())
    }

    /// All operations performed so far, in order
    pub fn ops(&self) -> Vec<HostOp> {
        self.shared.ops.borrow().clone()
    }

    /// URLs a preconnect was requested for, in order
    pub fn preconnects(&self) -> Vec<String> {
        self.shared
            .ops
            .borrow()
            .iter()
            .filter_map(|op| match op {
                HostOp::Preconnect { url } => Some(url.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn watcher_count(&self) -> usize {
        self.shared.watchers.borrow().len()
    }

    pub fn subscription_count(&self) -> usize {
        self.shared.subscriptions.borrow().len()
    }
}

impl Preconnector for HeadlessHost {
    fn preconnect(&self, url: &str) -> Result<()> {
        self.shared.record(HostOp::Preconnect {
            url: url.to_string(),
        });

        if self.shared.fail_preconnect.get() {
            return Err(Error::Preconnect {
                url: url.to_string(),
                reason: "preconnect disabled".to_string(),
            });
        }
        Ok(())
    }
}

impl VisibilitySource for HeadlessHost {
    fn watch(&self, element_id: &str, listener: VisibilityListener) -> WatchId {
        let id = self.shared.next_id();
        self.shared.record(HostOp::Watch {
            element_id: element_id.to_string(),
        });
        self.shared
            .watchers
            .borrow_mut()
            .insert(id, (element_id.to_string(), Rc::clone(&listener)));

        // Observers report the initial state right away
        let visible = self.shared.visible.borrow().contains(element_id);
        if visible {
            listener(true);
        }

        WatchId(id)
    }

    fn unwatch(&self, id: WatchId) {
        let removed = self.shared.watchers.borrow_mut().remove(&id.0);
        if let Some((element_id, _)) = removed {
            self.shared.record(HostOp::Unwatch { element_id });
        }
    }
}

impl FrameFactory for HeadlessHost {
    fn create_frame(
        &self,
        element_id: &str,
        title: &str,
        on_load: LoadListener,
    ) -> Result<Box<dyn BrowsingContext>> {
        if self.shared.fail_frames.get() {
            return Err(Error::frame("frame creation disabled"));
        }

        let handle = ContextHandle(self.shared.next_id());
        self.shared.record(HostOp::CreateFrame {
            element_id: element_id.to_string(),
            handle,
        });
        self.shared.frames.borrow_mut().insert(
            handle.0,
            FrameRecord {
                snapshot: FrameSnapshot {
                    element_id: element_id.to_string(),
                    title: title.to_string(),
                    sources: Vec::new(),
                    posted: Vec::new(),
                    released: false,
                },
                on_load,
            },
        );

        Ok(Box::new(HeadlessFrame {
            handle,
            shared: Rc::clone(&self.shared),
        }))
    }
}

impl MessageChannel for HeadlessHost {
    fn subscribe(&self, handle: ContextHandle, listener: MessageListener) -> SubscriptionId {
        let id = self.shared.next_id();
        self.shared.record(HostOp::Subscribe { handle });
        self.shared
            .subscriptions
            .borrow_mut()
            .insert(id, (handle, listener));
        SubscriptionId(id)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        let removed = self.shared.subscriptions.borrow_mut().remove(&id.0);
        if let Some((handle, _)) = removed {
            self.shared.record(HostOp::Unsubscribe { handle });
        }
    }
}

struct HeadlessFrame {
    handle: ContextHandle,
    shared: Rc<Shared>,
}

impl HeadlessFrame {
    fn update(&self, f: impl FnOnce(&mut FrameSnapshot)) {
        if let Some(record) = self.shared.frames.borrow_mut().get_mut(&self.handle.0) {
            f(&mut record.snapshot);
        }
    }
}

impl BrowsingContext for HeadlessFrame {
    fn handle(&self) -> ContextHandle {
        self.handle
    }

    fn set_source(&self, url: &str) {
        self.shared.record(HostOp::SetSource {
            handle: self.handle,
            url: url.to_string(),
        });
        self.update(|frame| frame.sources.push(url.to_string()));
    }

    fn set_title(&self, title: &str) {
        self.shared.record(HostOp::SetTitle {
            handle: self.handle,
            title: title.to_string(),
        });
        self.update(|frame| frame.title = title.to_string());
    }

    fn post(&self, data: &str, target_origin: &str) -> Result<()> {
        self.shared.record(HostOp::Post {
            handle: self.handle,
            data: data.to_string(),
            target_origin: target_origin.to_string(),
        });
        self.update(|frame| {
            frame
                .posted
                .push((data.to_string(), target_origin.to_string()))
        });
        Ok(())
    }
}

impl Drop for HeadlessFrame {
    fn drop(&mut self) {
        self.shared.record(HostOp::ReleaseFrame {
            handle: self.handle,
        });
        self.update(|frame| frame.released = true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scoped_dispatch() {
        let host = HeadlessHost::new();
        let seen = Rc::new(RefCell::new(Vec::new()));

        for handle in [ContextHandle(1), ContextHandle(2)] {
            let seen = Rc::clone(&seen);
            host.subscribe(
                handle,
                Rc::new(move |_msg: InboundMessage| seen.borrow_mut().push(handle)),
            );
        }

        host.dispatch(InboundMessage::new(ContextHandle(2), "https://p.example", json!(1)));
        assert_eq!(*seen.borrow(), vec![ContextHandle(2)]);

        seen.borrow_mut().clear();
        host.broadcast(InboundMessage::new(ContextHandle(2), "https://p.example", json!(1)));
        assert_eq!(seen.borrow().len(), 2);
    }

    #[test]
    fn test_frame_release_on_drop() {
        let host = HeadlessHost::new();
        let frame = host.create_frame("kino-embed-1", "Trailer", Rc::new(|| {})).unwrap();
        let handle = frame.handle();

        frame.set_source("https://player.example/embed/abc");
        assert_eq!(
            host.frame(handle).unwrap().source(),
            Some("https://player.example/embed/abc")
        );

        drop(frame);
        assert!(host.frame(handle).unwrap().released);
        assert_eq!(host.frame_for("kino-embed-1"), None);
    }
}
