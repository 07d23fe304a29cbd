//! Page renderer configuration.
//!
//! Always compiled (not behind the `browser` feature) so config parsing works
//! in builds without a rendering engine.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Settings for the headless rendering engine used by rendered-page channels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// Whether rendered-page channels may launch a browser at all.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_headless")]
    pub headless: bool,
    /// Connect to an already running browser over CDP instead of launching one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_url: Option<String>,
    /// Explicit Chrome/Chromium executable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chrome_path: Option<PathBuf>,
    /// How long to wait for dynamic price content after navigation.
    #[serde(default = "default_render_wait_secs")]
    pub render_wait_secs: u64,
}

fn default_enabled() -> bool {
    true
}

fn default_headless() -> bool {
    true
}

fn default_render_wait_secs() -> u64 {
    10
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            headless: default_headless(),
            remote_url: None,
            chrome_path: None,
            render_wait_secs: default_render_wait_secs(),
        }
    }
}
