use crate::{Error, Result};
use chromiumoxide::Page;
use chromiumoxide::browser::Browser;
use futures::StreamExt;
use std::time::Duration;
use tokio::task::JoinHandle;

const CONNECT_ATTEMPTS: u32 = 10;

/// Connects to a browser over the DevTools protocol
pub struct CdpSession {
    debugging_port: u16,
}

/// A live DevTools connection and the page it drives
pub struct ConnectedBrowser {
    browser: Browser,
    handler_task: JoinHandle<()>,
    pub page: Page,
}

impl CdpSession {
    pub fn new(debugging_port: u16) -> Self {
        Self { debugging_port }
    }

    /// Connect to the browser and take its first page
    ///
    /// The browser may still be starting, so the connection is retried.
    pub async fn connect(&self) -> Result<ConnectedBrowser> {
        tracing::info!(
            "CDP session: connecting to browser on port {}",
            self.debugging_port
        );

        let ws_url = format!("http://localhost:{}", self.debugging_port);
        let (browser, mut handler) = {
            let mut retries = CONNECT_ATTEMPTS;
            loop {
                tracing::debug!("Attempting CDP connection to {}...", ws_url);
                match Browser::connect(&ws_url).await {
                    Ok(result) => {
                        tracing::info!("CDP connection established");
                        break result;
                    }
                    Err(e) => {
                        retries -= 1;
                        if retries == 0 {
                            return Err(Error::Browser(format!(
                                "Failed to connect to browser after {} attempts: {}",
                                CONNECT_ATTEMPTS, e
                            )));
                        }
                        tracing::debug!(
                            "CDP connection attempt failed, retrying... ({} left)",
                            retries
                        );
                        tokio::time::sleep(Duration::from_millis(500)).await;
                    }
                }
            }
        };

        // Commands only complete while the handler is being polled
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!("CDP handler event error (continuing): {}", e);
                }
            }
        });

        // Give the browser a moment to open its initial page
        tokio::time::sleep(Duration::from_millis(500)).await;

        let page = match browser.pages().await?.into_iter().next() {
            Some(page) => {
                tracing::debug!("CDP: using existing page");
                page
            }
            None => {
                tracing::debug!("CDP: no existing pages, creating new page");
                browser.new_page("about:blank").await?
            }
        };

        Ok(ConnectedBrowser {
            browser,
            handler_task,
            page,
        })
    }
}

impl ConnectedBrowser {
    /// Close the browser and stop the protocol handler
    pub async fn close(mut self) {
        if let Err(e) = self.browser.close().await {
            tracing::debug!("Browser close failed: {}", e);
        }
        self.handler_task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cdp_session_creates() {
        let session = CdpSession::new(9222);
        assert_eq!(session.debugging_port, 9222);
    }

    #[tokio::test]
    async fn test_connect_fails_without_browser() {
        // Nothing listens on port 1
        let err = CdpSession::new(1).connect().await.err().unwrap();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("after 10 attempts"));
    }
}
