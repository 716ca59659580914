use crate::{Error, Result};
use changetracker_core::config::WindowSize;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};

/// Manages the browser process lifecycle
pub struct BrowserLauncher {
    browser_path: PathBuf,
    profile_path: PathBuf,
    initial_url: Option<String>,
    debugging_port: u16,
    window_size: WindowSize,
    headless: bool,
}

impl BrowserLauncher {
    /// Create a new BrowserLauncher
    pub fn new(browser_path: PathBuf, profile_path: PathBuf, initial_url: Option<String>) -> Self {
        Self {
            browser_path,
            profile_path,
            initial_url,
            debugging_port: 9222,
            window_size: WindowSize::default(),
            headless: false,
        }
    }

    pub fn with_debugging_port(mut self, port: u16) -> Self {
        self.debugging_port = port;
        self
    }

    pub fn with_window_size(mut self, window_size: WindowSize) -> Self {
        self.window_size = window_size;
        self
    }

    pub fn headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Launch the browser process
    pub fn launch(&self) -> Result<Child> {
        let args = self.build_args();
        tracing::debug!("Launching {} {:?}", self.browser_path.display(), args);

        Command::new(&self.browser_path)
            .args(&args)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| Error::Browser(format!("Failed to launch browser: {}", e)))
    }

    /// Build browser command-line arguments
    fn build_args(&self) -> Vec<String> {
        let mut args = vec![
            format!("--remote-debugging-port={}", self.debugging_port),
            "--no-first-run".to_string(),
            "--no-default-browser-check".to_string(),
            format!("--user-data-dir={}", self.profile_path.display()),
            format!(
                "--window-size={},{}",
                self.window_size.width, self.window_size.height
            ),
            "--disable-blink-features=AutomationControlled".to_string(),
            // Keep cross-origin iframes in the page's renderer so their
            // execution contexts are reachable from the page session
            "--disable-site-isolation-trials".to_string(),
            "--disable-features=IsolateOrigins,site-per-process".to_string(),
        ];

        if self.headless {
            args.push("--headless=new".to_string());
        }

        if let Some(url) = &self.initial_url {
            let url = if !url.starts_with("http://") && !url.starts_with("https://") {
                format!("https://{}", url)
            } else {
                url.clone()
            };
            args.push(url);
        } else {
            args.push("about:blank".to_string());
        }

        args
    }

    /// Get the debugging port
    pub fn debugging_port(&self) -> u16 {
        self.debugging_port
    }
}
