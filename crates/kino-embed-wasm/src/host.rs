//! Browser host - the embed collaborators on top of web-sys
//!
//! Preconnects become `<link rel="preconnect">` tags, visibility comes from an
//! `IntersectionObserver` per watched element, frames are `<iframe>` elements
//! appended to the element carrying the embed's DOM id, and inbound messages are
//! read from the window `message` event.

use kino_embed::host::{
    BrowsingContext, FrameFactory, LoadListener, MessageChannel, MessageListener, Preconnector,
    SubscriptionId, VisibilityListener, VisibilitySource, WatchId,
};
use kino_embed::{ContextHandle, Error, InboundMessage, Result};
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{
    Document, HtmlIFrameElement, HtmlLinkElement, IntersectionObserver, IntersectionObserverEntry,
    MessageEvent, Window,
};

type FrameRegistry = Rc<RefCell<HashMap<ContextHandle, HtmlIFrameElement>>>;
type SubscriptionRegistry = Rc<RefCell<HashMap<SubscriptionId, (ContextHandle, MessageListener)>>>;

struct Watch {
    observer: IntersectionObserver,
    _callback: Closure<dyn FnMut(js_sys::Array, IntersectionObserver)>,
}

/// Embed host backed by the page's window and document
pub struct WebHost {
    document: Document,
    window: Window,
    frames: FrameRegistry,
    subscriptions: SubscriptionRegistry,
    watches: RefCell<HashMap<WatchId, Watch>>,
    // Disconnected watches whose callback may still be on the stack
    retired: RefCell<Vec<Watch>>,
    on_message: Closure<dyn FnMut(MessageEvent)>,
    last_id: Cell<u64>,
}

impl WebHost {
    /// Attach to the current window
    pub fn new() -> Result<Self> {
        let window = web_sys::window().ok_or_else(|| Error::Unsupported("no window".into()))?;
        let document = window
            .document()
            .ok_or_else(|| Error::Unsupported("no document".into()))?;

        let frames: FrameRegistry = Rc::default();
        let subscriptions: SubscriptionRegistry = Rc::default();

        let on_message = {
            let frames = frames.clone();
            let subscriptions = subscriptions.clone();
            Closure::wrap(Box::new(move |event: MessageEvent| {
                route_message(&frames, &subscriptions, &event);
            }) as Box<dyn FnMut(MessageEvent)>)
        };
        window
            .add_event_listener_with_callback("message", on_message.as_ref().unchecked_ref())
            .map_err(js_error)?;

        Ok(Self {
            document,
            window,
            frames,
            subscriptions,
            watches: RefCell::default(),
            retired: RefCell::default(),
            on_message,
            last_id: Cell::new(0),
        })
    }

    fn next_id(&self) -> u64 {
        let id = self.last_id.get() + 1;
        self.last_id.set(id);
        id
    }
}

impl Drop for WebHost {
    fn drop(&mut self) {
        let _ = self.window.remove_event_listener_with_callback(
            "message",
            self.on_message.as_ref().unchecked_ref(),
        );
        for (_, watch) in self.watches.borrow_mut().drain() {
            watch.observer.disconnect();
        }
    }
}

/// Attribute a window message to one of our frames and hand it to the
/// subscribers of that frame.
fn route_message(frames: &FrameRegistry, subscriptions: &SubscriptionRegistry, event: &MessageEvent) {
    let Some(source) = event.source() else {
        return;
    };
    let handle = frames.borrow().iter().find_map(|(handle, iframe)| {
        let window = iframe.content_window()?;
        js_sys::Object::is(&source, &window).then_some(*handle)
    });
    let Some(handle) = handle else {
        return;
    };

    let data: Value = serde_wasm_bindgen::from_value(event.data()).unwrap_or(Value::Null);
    let message = InboundMessage::new(handle, event.origin(), data);

    // Listeners may subscribe or unsubscribe while running
    let listeners: Vec<MessageListener> = subscriptions
        .borrow()
        .values()
        .filter(|(scope, _)| *scope == handle)
        .map(|(_, listener)| listener.clone())
        .collect();
    for listener in listeners {
        listener(message.clone());
    }
}

fn js_error(value: JsValue) -> Error {
    Error::Unsupported(value.as_string().unwrap_or_else(|| format!("{:?}", value)))
}

impl Preconnector for WebHost {
    fn preconnect(&self, url: &str) -> Result<()> {
        let head = self
            .document
            .head()
            .ok_or_else(|| Error::Preconnect {
                url: url.to_string(),
                reason: "document has no <head>".into(),
            })?;
        let link: HtmlLinkElement = self
            .document
            .create_element("link")
            .and_then(|el| el.dyn_into::<HtmlLinkElement>().map_err(JsValue::from))
            .map_err(|e| Error::Preconnect {
                url: url.to_string(),
                reason: format!("{:?}", e),
            })?;
        link.set_rel("preconnect");
        link.set_href(url);
        head.append_child(&link).map_err(|e| Error::Preconnect {
            url: url.to_string(),
            reason: format!("{:?}", e),
        })?;
        Ok(())
    }
}

impl VisibilitySource for WebHost {
    fn watch(&self, element_id: &str, listener: VisibilityListener) -> WatchId {
        let id = WatchId(self.next_id());
        self.retired.borrow_mut().clear();

        let Some(element) = self.document.get_element_by_id(element_id) else {
            // Stays deferred: mount the container before starting the embed
            tracing::warn!(element_id, "Watched element not in document");
            web_sys::console::warn_1(
                &format!("[Kino Embed] no element #{} to observe, embed stays deferred", element_id).into(),
            );
            return id;
        };

        let on_change = listener.clone();
        let callback = Closure::wrap(Box::new(move |entries: js_sys::Array, _: IntersectionObserver| {
            for entry in entries.iter() {
                if let Ok(entry) = entry.dyn_into::<IntersectionObserverEntry>() {
                    on_change(entry.is_intersecting());
                }
            }
        }) as Box<dyn FnMut(js_sys::Array, IntersectionObserver)>);

        match IntersectionObserver::new(callback.as_ref().unchecked_ref()) {
            Ok(observer) => {
                observer.observe(&element);
                self.watches.borrow_mut().insert(
                    id,
                    Watch {
                        observer,
                        _callback: callback,
                    },
                );
            }
            Err(_) => {
                // No observer support: load as if visible
                drop(callback);
                listener(true);
            }
        }
        id
    }

    fn unwatch(&self, id: WatchId) {
        let removed = self.watches.borrow_mut().remove(&id);
        if let Some(watch) = removed {
            watch.observer.disconnect();
            self.retired.borrow_mut().push(watch);
        }
    }
}

impl FrameFactory for WebHost {
    fn create_frame(
        &self,
        element_id: &str,
        title: &str,
        on_load: LoadListener,
    ) -> Result<Box<dyn BrowsingContext>> {
        let mount = self
            .document
            .get_element_by_id(element_id)
            .ok_or_else(|| Error::frame(format!("no element with id {:?}", element_id)))?;
        let iframe: HtmlIFrameElement = self
            .document
            .create_element("iframe")
            .and_then(|el| el.dyn_into::<HtmlIFrameElement>().map_err(JsValue::from))
            .map_err(|e| Error::frame(format!("{:?}", e)))?;

        iframe.set_title(title);
        iframe.set_allow_fullscreen(true);
        let _ = iframe.set_attribute("frameborder", "0");
        let _ = iframe.set_attribute(
            "allow",
            "accelerometer; autoplay; encrypted-media; gyroscope; picture-in-picture",
        );

        let load_callback = Closure::wrap(Box::new(move || on_load()) as Box<dyn FnMut()>);
        iframe
            .add_event_listener_with_callback("load", load_callback.as_ref().unchecked_ref())
            .map_err(|e| Error::frame(format!("{:?}", e)))?;
        mount
            .append_child(&iframe)
            .map_err(|e| Error::frame(format!("{:?}", e)))?;

        let handle = ContextHandle(self.next_id());
        self.frames.borrow_mut().insert(handle, iframe.clone());

        Ok(Box::new(WebFrame {
            handle,
            iframe,
            frames: self.frames.clone(),
            on_load: load_callback,
        }))
    }
}

impl MessageChannel for WebHost {
    fn subscribe(&self, handle: ContextHandle, listener: MessageListener) -> SubscriptionId {
        let id = SubscriptionId(self.next_id());
        self.subscriptions.borrow_mut().insert(id, (handle, listener));
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.subscriptions.borrow_mut().remove(&id);
    }
}

/// An `<iframe>` owned by one embed. Dropping it removes the element.
struct WebFrame {
    handle: ContextHandle,
    iframe: HtmlIFrameElement,
    frames: FrameRegistry,
    on_load: Closure<dyn FnMut()>,
}

impl BrowsingContext for WebFrame {
    fn handle(&self) -> ContextHandle {
        self.handle
    }

    fn set_source(&self, url: &str) {
        self.iframe.set_src(url);
    }

    fn set_title(&self, title: &str) {
        self.iframe.set_title(title);
    }

    fn post(&self, data: &str, target_origin: &str) -> Result<()> {
        let window = self
            .iframe
            .content_window()
            .ok_or_else(|| Error::Delivery("frame has no window".into()))?;
        let message = js_sys::JSON::parse(data).unwrap_or_else(|_| JsValue::from_str(data));
        window
            .post_message(&message, target_origin)
            .map_err(|e| Error::Delivery(format!("{:?}", e)))
    }
}

impl Drop for WebFrame {
    fn drop(&mut self) {
        let _ = self
            .iframe
            .remove_event_listener_with_callback("load", self.on_load.as_ref().unchecked_ref());
        self.iframe.remove();
        self.frames.borrow_mut().remove(&self.handle);
    }
}
