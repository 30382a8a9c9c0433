#![forbid(unsafe_code)]

//! Session defaults.
//!
//! [`SheetConfig`] seeds a session's attributes and its reason resolver. With
//! the `policy-config` feature it can be loaded from TOML or JSON:
//!
//! ```toml
//! inference_window_ms = 400
//! initial_detent = 1
//! grabber_visible = false
//! background_interaction = { upThrough = 0 }
//!
//! [[detents]]
//! type = "fraction"
//! value = 0.3
//! identifier = "peek"
//!
//! [[detents]]
//! type = "semantic"
//! value = "large"
//! ```
//!
//! Every field is optional in a file; missing fields keep their defaults.

use std::time::Duration;

use sheet_core::{
    BackgroundInteraction, DEFAULT_INFERENCE_WINDOW, RawDetent, ReasonResolver, SheetAttributes,
};

/// Defaults applied to every session built from this config.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetConfig {
    /// Backdrop-tap inference window.
    pub inference_window: Duration,
    pub detents: Vec<RawDetent>,
    pub initial_detent: usize,
    pub grabber_visible: bool,
    pub allow_swipe_to_dismiss: bool,
    pub expands_when_scrolled_to_edge: bool,
    pub background_interaction: BackgroundInteraction,
    pub corner_radius: Option<f64>,
}

impl Default for SheetConfig {
    fn default() -> Self {
        let attrs = SheetAttributes::default();
        Self {
            inference_window: DEFAULT_INFERENCE_WINDOW,
            detents: attrs.detents,
            initial_detent: attrs.initial_detent,
            grabber_visible: attrs.grabber_visible,
            allow_swipe_to_dismiss: attrs.allow_swipe_to_dismiss,
            expands_when_scrolled_to_edge: attrs.expands_when_scrolled_to_edge,
            background_interaction: attrs.background_interaction,
            corner_radius: attrs.corner_radius,
        }
    }
}

impl SheetConfig {
    /// Default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn inference_window(mut self, window: Duration) -> Self {
        self.inference_window = window;
        self
    }

    #[must_use]
    pub fn detents(mut self, detents: Vec<RawDetent>) -> Self {
        self.detents = detents;
        self
    }

    #[must_use]
    pub fn initial_detent(mut self, index: usize) -> Self {
        self.initial_detent = index;
        self
    }

    #[must_use]
    pub fn grabber_visible(mut self, visible: bool) -> Self {
        self.grabber_visible = visible;
        self
    }

    #[must_use]
    pub fn allow_swipe_to_dismiss(mut self, allow: bool) -> Self {
        self.allow_swipe_to_dismiss = allow;
        self
    }

    #[must_use]
    pub fn expands_when_scrolled_to_edge(mut self, expands: bool) -> Self {
        self.expands_when_scrolled_to_edge = expands;
        self
    }

    #[must_use]
    pub fn background_interaction(mut self, interaction: BackgroundInteraction) -> Self {
        self.background_interaction = interaction;
        self
    }

    #[must_use]
    pub fn corner_radius(mut self, radius: Option<f64>) -> Self {
        self.corner_radius = radius;
        self
    }

    /// Resolver using this config's inference window.
    #[must_use]
    pub fn resolver(&self) -> ReasonResolver {
        ReasonResolver::new(self.inference_window)
    }

    /// Initial attribute set of a fresh or recycled session.
    #[must_use]
    pub fn default_attributes(&self) -> SheetAttributes {
        SheetAttributes {
            detents: self.detents.clone(),
            initial_detent: self.initial_detent,
            grabber_visible: self.grabber_visible,
            allow_swipe_to_dismiss: self.allow_swipe_to_dismiss,
            expands_when_scrolled_to_edge: self.expands_when_scrolled_to_edge,
            background_interaction: self.background_interaction,
            corner_radius: self.corner_radius,
            ..SheetAttributes::default()
        }
    }
}

/// Error loading a [`SheetConfig`] from text.
#[derive(Debug)]
pub enum ConfigError {
    /// TOML syntax or shape error.
    Toml(String),
    /// JSON syntax or shape error.
    Json(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Toml(msg) => write!(f, "invalid TOML sheet config: {msg}"),
            Self::Json(msg) => write!(f, "invalid JSON sheet config: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(feature = "policy-config")]
mod file {
    use serde::Deserialize;

    use super::{BackgroundInteraction, ConfigError, Duration, RawDetent, SheetConfig};

    #[derive(Debug, Default, Deserialize)]
    #[serde(default, deny_unknown_fields)]
    struct SheetConfigFile {
        inference_window_ms: Option<u64>,
        detents: Option<Vec<RawDetent>>,
        initial_detent: Option<usize>,
        grabber_visible: Option<bool>,
        allow_swipe_to_dismiss: Option<bool>,
        expands_when_scrolled_to_edge: Option<bool>,
        background_interaction: Option<BackgroundInteraction>,
        corner_radius: Option<f64>,
    }

    impl SheetConfigFile {
        fn into_config(self) -> SheetConfig {
            let mut config = SheetConfig::default();
            if let Some(ms) = self.inference_window_ms {
                config.inference_window = Duration::from_millis(ms);
            }
            if let Some(detents) = self.detents {
                config.detents = detents;
            }
            if let Some(index) = self.initial_detent {
                config.initial_detent = index;
            }
            if let Some(v) = self.grabber_visible {
                config.grabber_visible = v;
            }
            if let Some(v) = self.allow_swipe_to_dismiss {
                config.allow_swipe_to_dismiss = v;
            }
            if let Some(v) = self.expands_when_scrolled_to_edge {
                config.expands_when_scrolled_to_edge = v;
            }
            if let Some(v) = self.background_interaction {
                config.background_interaction = v;
            }
            if self.corner_radius.is_some() {
                config.corner_radius = self.corner_radius;
            }
            config
        }
    }

    impl SheetConfig {
        /// Parse a TOML config document.
        pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
            let file: SheetConfigFile =
                toml::from_str(text).map_err(|e| ConfigError::Toml(e.to_string()))?;
            Ok(file.into_config())
        }

        /// Parse a JSON config document.
        pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
            let file: SheetConfigFile =
                serde_json::from_str(text).map_err(|e| ConfigError::Json(e.to_string()))?;
            Ok(file.into_config())
        }
    }
}
