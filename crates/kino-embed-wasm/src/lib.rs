//! Kino Embed WASM - third-party player embeds for the browser
//!
//! Binds the `kino-embed` bridge to the DOM:
//! - `<link rel="preconnect">` warm-up, once per host per page
//! - `IntersectionObserver`-driven deferred loading
//! - `<iframe>` frames with origin-validated `message` events
//!
//! ## Usage
//!
//! ```javascript
//! import init, { KinoEmbed, KinoEmbedContext } from '@kino/embed';
//!
//! await init();
//! const ctx = new KinoEmbedContext();
//! const embed = new KinoEmbed(ctx, {
//!   src: 'https://player.example/embed/abc',
//!   origin: 'https://player.example',
//!   preconnectHints: ['https://cdn.player.example'],
//! });
//! embed.on_load(() => embed.post_message({ cmd: 'play' }));
//! embed.start(document.getElementById('player'));
//! ```

use wasm_bindgen::prelude::*;

mod embed;
mod host;

pub use embed::{KinoEmbed, KinoEmbedContext};
pub use host::WebHost;

/// Initialize the WASM module
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
    web_sys::console::log_1(
        &format!("[Kino Embed] Initialized v{}", kino_embed::VERSION).into(),
    );
}

/// Library version
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
