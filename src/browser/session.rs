//! Chromium-backed rendering sessions
//!
//! [`ChromiumEngine`] launches a fresh browser per scan; the
//! [`ChromiumSession`] it returns owns that browser until closed.

use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::Page;
use tracing::{debug, warn};
use url::Url;

use crate::browser::audit::{AuditReport, AuditRunner, AxeSource};
use crate::browser::controller::{BrowserConfig, BrowserController};
use crate::browser::navigation::{NavigationOptions, PageNavigator};
use crate::error::{AuditError, BrowserError, NavigationError};
use crate::scan::{RenderSession, RenderingEngine};

/// Launches one headless Chromium per scan
#[derive(Debug, Clone)]
pub struct ChromiumEngine {
    browser: BrowserConfig,
    axe: AxeSource,
}

impl ChromiumEngine {
    /// Create an engine with the given browser settings and audit source
    pub fn new(browser: BrowserConfig, axe: AxeSource) -> Self {
        Self { browser, axe }
    }
}

#[async_trait]
impl RenderingEngine for ChromiumEngine {
    async fn launch(&self) -> Result<Box<dyn RenderSession>, BrowserError> {
        let controller = BrowserController::launch(self.browser.clone()).await?;
        let page = match controller.new_page().await {
            Ok(page) => page,
            Err(e) => {
                if let Err(close_err) = controller.close().await {
                    warn!(error = %close_err, "Failed to close browser after page creation error");
                }
                return Err(e);
            }
        };

        Ok(Box::new(ChromiumSession {
            controller,
            page,
            axe: self.axe.clone(),
        }))
    }
}

/// One browser process with a single page
pub struct ChromiumSession {
    controller: BrowserController,
    page: Page,
    axe: AxeSource,
}

#[async_trait]
impl RenderSession for ChromiumSession {
    async fn navigate(&mut self, url: &Url, timeout: Duration) -> Result<(), NavigationError> {
        let options = NavigationOptions {
            timeout_ms: timeout.as_millis() as u64,
            ..NavigationOptions::default()
        };
        let result = PageNavigator::goto(&self.page, url, &options).await?;
        debug!(final_url = %result.final_url, title = ?result.title, "Page loaded");
        Ok(())
    }

    async fn audit(&mut self) -> Result<AuditReport, AuditError> {
        AuditRunner::run(&self.page, &self.axe).await
    }

    async fn close(self: Box<Self>) -> Result<(), BrowserError> {
        let ChromiumSession {
            controller, page, ..
        } = *self;
        if let Err(e) = page.close().await {
            debug!(error = %e, "Page close failed, closing browser anyway");
        }
        controller.close().await
    }
}
