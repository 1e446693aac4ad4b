//! KinoEmbed - the embed bridge exposed to JavaScript
//!
//! ```javascript
//! const ctx = new KinoEmbedContext();
//! const embed = new KinoEmbed(ctx, { src: "https://player.example/embed/abc", params: { autoplay: 1 } });
//! embed.on_message((payload) => console.log(payload));
//! embed.start(document.querySelector("#player"));
//! ```

use crate::host::WebHost;
use js_sys::Function;
use kino_embed::{
    EmbedBridge, EmbedConfig, EmbedContext, EmbedEvent, EmbedEvents, JsonDecoder, MessageDecoder,
    ParamValue,
};
use serde::Serialize;
use serde_json::Value;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::spawn_local;

fn to_js(err: kino_embed::Error) -> JsValue {
    JsValue::from_str(&format!("{} ({})", err, err.error_code()))
}

fn to_value<T: Serialize + ?Sized>(value: &T) -> Result<JsValue, serde_wasm_bindgen::Error> {
    value.serialize(&serde_wasm_bindgen::Serializer::json_compatible())
}

/// Shared state for every embed on the page
#[wasm_bindgen]
pub struct KinoEmbedContext {
    inner: Rc<EmbedContext>,
}

#[wasm_bindgen]
impl KinoEmbedContext {
    #[wasm_bindgen(constructor)]
    pub fn new() -> Result<KinoEmbedContext, JsValue> {
        let host = WebHost::new().map_err(to_js)?;
        Ok(Self {
            inner: EmbedContext::new(Rc::new(host)),
        })
    }

    /// Number of distinct hosts already preconnected
    #[wasm_bindgen(getter)]
    pub fn hinted(&self) -> usize {
        self.inner.hinter().len()
    }
}

#[derive(Default)]
struct Callbacks {
    source_changed: Option<Function>,
    message: Option<Function>,
    loaded: Option<Function>,
}

/// One embedded third-party player
#[wasm_bindgen]
pub struct KinoEmbed {
    bridge: EmbedBridge,
    callbacks: Rc<RefCell<Callbacks>>,
}

#[wasm_bindgen]
impl KinoEmbed {
    /// Create an embed from a configuration object (`src`, `title`, `lazy`,
    /// `params`, `origin`, `preconnectHints`)
    #[wasm_bindgen(constructor)]
    pub fn new(context: &KinoEmbedContext, config: JsValue) -> Result<KinoEmbed, JsValue> {
        let config: EmbedConfig = if config.is_undefined() || config.is_null() {
            EmbedConfig::default()
        } else {
            serde_wasm_bindgen::from_value(config)?
        };

        let (bridge, events) = EmbedBridge::new(context.inner.clone(), config);
        let callbacks = Rc::new(RefCell::new(Callbacks::default()));
        spawn_local(forward_events(events, callbacks.clone()));

        Ok(Self { bridge, callbacks })
    }

    #[wasm_bindgen(getter)]
    pub fn dom_id(&self) -> String {
        self.bridge.dom_id()
    }

    #[wasm_bindgen(getter)]
    pub fn state(&self) -> String {
        self.bridge.state().to_string()
    }

    #[wasm_bindgen(getter)]
    pub fn composed_url(&self) -> String {
        self.bridge.composed_url()
    }

    /// Attach the embed to `container` and start it. The container takes the
    /// embed's DOM id.
    pub fn start(&self, container: &web_sys::Element) -> Result<(), JsValue> {
        container.set_id(&self.bridge.dom_id());
        self.bridge.start().map_err(to_js)
    }

    pub fn stop(&self) {
        self.bridge.stop();
    }

    pub fn set_src(&self, src: String) {
        self.bridge.set_src(src);
    }

    pub fn set_title(&self, title: String) {
        self.bridge.set_title(title);
    }

    pub fn set_lazy(&self, lazy: bool) {
        self.bridge.set_lazy(lazy);
    }

    /// Replace all parameters with the entries of a plain object
    pub fn set_params(&self, params: JsValue) -> Result<(), JsValue> {
        let params: BTreeMap<String, ParamValue> = serde_wasm_bindgen::from_value(params)?;
        self.bridge.set_params(params);
        Ok(())
    }

    pub fn set_param(&self, key: String, value: JsValue) -> Result<(), JsValue> {
        let value: ParamValue = serde_wasm_bindgen::from_value(value)?;
        self.bridge.set_param(key, value);
        Ok(())
    }

    pub fn set_origin(&self, origin: Option<String>) {
        self.bridge.set_origin(origin);
    }

    pub fn set_preconnect_hints(&self, hints: Vec<String>) {
        self.bridge.set_preconnect_hints(hints);
    }

    /// Install a JS decoder: it receives the raw payload and returns the value
    /// to surface, or `undefined`/`null` to drop the message.
    pub fn set_decoder(&self, decoder: Option<Function>) {
        let decoder = decoder.map(|f| Rc::new(JsDecoder(f)) as Rc<dyn MessageDecoder>);
        self.bridge.set_decoder(decoder);
    }

    /// Decode JSON string payloads before surfacing them
    pub fn use_json_decoder(&self) {
        self.bridge.set_decoder(Some(Rc::new(JsonDecoder)));
    }

    /// Post a message into the player. `target_origin` defaults to `*`.
    pub fn post_message(&self, message: JsValue, target_origin: Option<String>) -> Result<(), JsValue> {
        let message: Value = serde_wasm_bindgen::from_value(message)?;
        self.bridge
            .post_message(&message, target_origin.as_deref())
            .map_err(to_js)
    }

    /// `callback(url)` when the composed source changes
    pub fn on_source_changed(&self, callback: Option<Function>) {
        self.callbacks.borrow_mut().source_changed = callback;
    }

    /// `callback(payload)` for each accepted message
    pub fn on_message(&self, callback: Option<Function>) {
        self.callbacks.borrow_mut().message = callback;
    }

    /// `callback()` when the player finishes loading
    pub fn on_load(&self, callback: Option<Function>) {
        self.callbacks.borrow_mut().loaded = callback;
    }
}

struct JsDecoder(Function);

impl MessageDecoder for JsDecoder {
    fn decode(&self, data: &Value) -> Option<Value> {
        let input = to_value(data).ok()?;
        let output = match self.0.call1(&JsValue::NULL, &input) {
            Ok(output) => output,
            Err(e) => {
                web_sys::console::error_2(&"[Kino Embed] decoder threw".into(), &e);
                return None;
            }
        };
        if output.is_undefined() || output.is_null() {
            return None;
        }
        serde_wasm_bindgen::from_value(output).ok()
    }
}

async fn forward_events(mut events: EmbedEvents, callbacks: Rc<RefCell<Callbacks>>) {
    while let Some(event) = events.recv().await {
        let result = {
            let callbacks = callbacks.borrow();
            match &event {
                EmbedEvent::SourceChanged { url } => callbacks
                    .source_changed
                    .clone()
                    .map(|f| (f, Some(JsValue::from_str(url)))),
                EmbedEvent::MessageReceived { payload } => callbacks
                    .message
                    .clone()
                    .map(|f| (f, Some(to_value(payload).unwrap_or(JsValue::NULL)))),
                EmbedEvent::Loaded => callbacks.loaded.clone().map(|f| (f, None)),
            }
        };

        let Some((callback, arg)) = result else {
            continue;
        };
        let outcome = match arg {
            Some(arg) => callback.call1(&JsValue::NULL, &arg),
            None => callback.call0(&JsValue::NULL),
        };
        if let Err(e) = outcome {
            web_sys::console::error_2(&"[Kino Embed] event callback threw".into(), &e);
        }
    }
}
