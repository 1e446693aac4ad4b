//! Embed configuration
//!
//! # Usage
//!
//! ```rust
//! use kino_embed::EmbedConfig;
//!
//! let config = EmbedConfig::new("https://player.example/embed/abc")
//!     .with_title("Launch trailer")
//!     .with_param("autoplay", 1)
//!     .with_origin("https://player.example");
//! assert!(config.lazy);
//! ```

use crate::compose::compose;
use crate::messages::MessageDecoder;
use crate::types::{EmbedParams, ParamValue};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::rc::Rc;

/// Configuration of a single embed
#[derive(Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EmbedConfig {
    /// Base URL of the embedded player
    pub src: String,
    /// Accessible label of the browsing context
    pub title: String,
    /// Defer loading until the embed enters the viewport
    pub lazy: bool,
    /// Query parameters appended to `src`
    pub params: EmbedParams,
    /// Only accept messages from this exact origin
    pub origin: Option<String>,
    /// Extra hosts to warm up before the embed loads
    pub preconnect_hints: Vec<String>,
    /// Transforms or rejects accepted message payloads
    #[serde(skip)]
    pub decoder: Option<Rc<dyn MessageDecoder>>,
}

impl Default for EmbedConfig {
    fn default() -> Self {
        Self {
            src: String::new(),
            title: String::new(),
            lazy: true,
            params: EmbedParams::new(),
            origin: None,
            preconnect_hints: Vec::new(),
            decoder: None,
        }
    }
}

impl EmbedConfig {
    /// Lazy embed of `src`
    pub fn new(src: impl Into<String>) -> Self {
        Self {
            src: src.into(),
            ..Default::default()
        }
    }

    /// Embed of `src` that loads as soon as it starts
    pub fn eager(src: impl Into<String>) -> Self {
        Self {
            src: src.into(),
            lazy: false,
            ..Default::default()
        }
    }

    /// Parse a JSON configuration document
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_lazy(mut self, lazy: bool) -> Self {
        self.lazy = lazy;
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn with_params(mut self, params: EmbedParams) -> Self {
        self.params = params;
        self
    }

    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    pub fn with_preconnect_hints<I, S>(mut self, hints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.preconnect_hints = hints.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_decoder(mut self, decoder: impl MessageDecoder + 'static) -> Self {
        self.decoder = Some(Rc::new(decoder));
        self
    }

    /// `src` with `params` appended
    pub fn composed_url(&self) -> String {
        compose(&self.src, &self.params)
    }

    /// Human-readable problems with this configuration.
    ///
    /// The bridge itself never rejects a configuration; an unusable URL just
    /// never loads. This is for tooling that wants to catch that early.
    pub fn lint(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.src.is_empty() {
            warnings.push("src is empty; the embed will never load".to_string());
        } else if let Err(e) = url::Url::parse(&self.src) {
            warnings.push(format!("src is not an absolute URL: {}", e));
        }

        if self.title.is_empty() {
            warnings.push("title is empty; the frame has no accessible label".to_string());
        }

        if let Some(origin) = &self.origin {
            match url::Url::parse(origin) {
                Ok(parsed) if parsed.origin().ascii_serialization() == *origin => {}
                _ => warnings.push(format!(
                    "origin {:?} is not a serialized origin; no message will ever match it",
                    origin
                )),
            }
        }

        for hint in &self.preconnect_hints {
            if url::Url::parse(hint).is_err() {
                warnings.push(format!("preconnect hint {:?} is not an absolute URL", hint));
            }
        }

        warnings
    }
}

impl std::fmt::Debug for EmbedConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbedConfig")
            .field("src", &self.src)
            .field("title", &self.title)
            .field("lazy", &self.lazy)
            .field("params", &self.params)
            .field("origin", &self.origin)
            .field("preconnect_hints", &self.preconnect_hints)
            .field("decoder", &self.decoder.is_some())
            .finish()
    }
}
