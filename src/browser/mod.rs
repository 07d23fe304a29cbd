//! Page rendering for channels whose prices only appear after scripts run.
//!
//! [`PageRenderer`] is the seam the orchestrator drives. The chromiumoxide
//! implementation is compiled with the `browser` feature; without it, or
//! when rendering is disabled in config, rendered channels fail with
//! [`FetchError::RendererUnavailable`].

#[cfg(feature = "browser")]
mod chromium;

#[cfg(feature = "browser")]
pub use chromium::ChromiumRenderer;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::BrowserConfig;
use crate::error::FetchError;
use crate::models::Channel;

/// One page to render and the regions to capture from it.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderRequest {
    pub channel: Channel,
    pub url: String,
    /// Selector whose appearance signals that prices have loaded.
    pub wait_for: Option<String>,
    /// CSS selectors of candidate price regions, captured as visible text.
    pub regions: Vec<String>,
    pub user_agent: String,
    pub timeout: Duration,
}

/// Drives a rendering engine to a live page and captures region text.
#[async_trait]
pub trait PageRenderer: Send + Sync {
    /// Visible text of every element matching `regions`, in selector order.
    ///
    /// Falls back to the whole page body when no region matches.
    async fn render(&self, request: &RenderRequest) -> Result<Vec<String>, FetchError>;
}

/// The renderer configured for this build, if any.
pub fn default_renderer(config: &BrowserConfig) -> Option<Arc<dyn PageRenderer>> {
    if !config.enabled {
        return None;
    }

    #[cfg(feature = "browser")]
    {
        Some(Arc::new(ChromiumRenderer::new(config.clone())))
    }

    #[cfg(not(feature = "browser"))]
    {
        tracing::debug!("Browser support not compiled; rendered channels are unavailable");
        None
    }
}
