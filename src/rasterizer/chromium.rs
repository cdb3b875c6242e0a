//! Headless Chromium backend (feature `chromium`).
//!
//! The driver is synchronous, so each request runs on the blocking pool
//! with its own browser process.

use std::time::Duration;

use async_trait::async_trait;
use headless_chrome::protocol::cdp::Emulation;
use headless_chrome::types::PrintToPdfOptions;
use headless_chrome::{Browser, LaunchOptions};

use super::{Media, PdfRequest, RasterizeError, Rasterizer, WaitUntil};
use crate::pipeline::DEFAULT_TIMEOUT;

/// Quiet period after load when the request asks for network idle.
const SETTLE_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Clone)]
pub struct ChromiumRasterizer {
    sandbox: bool,
    timeout: Duration,
}

impl ChromiumRasterizer {
    pub fn new() -> Self {
        Self {
            sandbox: true,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Containers without user namespaces need the sandbox off.
    pub fn without_sandbox(mut self) -> Self {
        self.sandbox = false;
        self
    }

    /// Upper bound for each browser call (navigation, printing).
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn print(&self, request: PdfRequest) -> Result<Vec<u8>, RasterizeError> {
        let scratch = tempfile::Builder::new().suffix(".html").tempfile()?;
        std::fs::write(scratch.path(), &request.html)?;
        let url = format!("file://{}", scratch.path().display());

        let options = LaunchOptions::default_builder()
            .headless(true)
            .sandbox(self.sandbox)
            .idle_browser_timeout(self.timeout)
            .build()
            .map_err(|e| RasterizeError::Launch(e.to_string()))?;
        let browser = Browser::new(options).map_err(|e| RasterizeError::Launch(e.to_string()))?;
        let tab = browser.new_tab().map_err(browser_error)?;
        tab.set_default_timeout(self.timeout);

        tab.call_method(Emulation::SetEmulatedMedia {
            media: Some(emulated_media(request.media).to_string()),
            features: None,
        })
        .map_err(browser_error)?;

        tab.navigate_to(&url)
            .and_then(|tab| tab.wait_until_navigated())
            .map_err(browser_error)?;

        if let Some(delay) = settle_delay(request.wait_until) {
            std::thread::sleep(delay);
        }

        tracing::debug!(landscape = request.landscape, media = emulated_media(request.media), "printing page");
        tab.print_to_pdf(Some(pdf_options(request)))
            .map_err(browser_error)
    }
}

impl Default for ChromiumRasterizer {
    fn default() -> Self {
        Self::new()
    }
}

fn emulated_media(media: Media) -> &'static str {
    match media {
        Media::Print => "print",
        Media::Screen => "screen",
    }
}

fn settle_delay(wait_until: WaitUntil) -> Option<Duration> {
    match wait_until {
        WaitUntil::NetworkIdle => Some(SETTLE_DELAY),
        WaitUntil::Load => None,
    }
}

fn pdf_options(request: PdfRequest) -> PrintToPdfOptions {
    let (paper_width, paper_height) = request.paper_inches();
    PrintToPdfOptions {
        landscape: Some(request.landscape),
        display_header_footer: Some(request.display_header_footer),
        print_background: Some(request.print_background),
        paper_width: Some(paper_width),
        paper_height: Some(paper_height),
        margin_top: Some(request.margins.top.to_inches()),
        margin_bottom: Some(request.margins.bottom.to_inches()),
        margin_left: Some(request.margins.left.to_inches()),
        margin_right: Some(request.margins.right.to_inches()),
        header_template: Some(request.header_template),
        footer_template: Some(request.footer_template),
        ..Default::default()
    }
}

fn browser_error(e: impl std::fmt::Display) -> RasterizeError {
    RasterizeError::Browser(e.to_string())
}

#[async_trait]
impl Rasterizer for ChromiumRasterizer {
    async fn rasterize(&self, request: PdfRequest) -> Result<Vec<u8>, RasterizeError> {
        let rasterizer = self.clone();
        tokio::task::spawn_blocking(move || rasterizer.print(request))
            .await
            .map_err(|e| RasterizeError::Crashed(e.to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rasterizer::{PdfMargins, Pixels};
    use crate::report::PageFormat;

    fn request(media: Media, wait_until: WaitUntil) -> PdfRequest {
        PdfRequest {
            html: "<p>body</p>".into(),
            header_template: "<span class=\"title\"></span>".into(),
            footer_template: "<span class=\"pageNumber\"></span>".into(),
            format: PageFormat::A4,
            landscape: true,
            margins: PdfMargins {
                top: Pixels(96),
                bottom: Pixels(48),
                left: Pixels(0),
                right: Pixels(0),
            },
            print_background: true,
            display_header_footer: true,
            wait_until,
            media,
        }
    }

    #[test]
    fn test_media_is_emulated() {
        assert_eq!(emulated_media(Media::Print), "print");
        assert_eq!(emulated_media(Media::Screen), "screen");
    }

    #[test]
    fn test_network_idle_waits_before_printing() {
        assert_eq!(settle_delay(WaitUntil::NetworkIdle), Some(SETTLE_DELAY));
        assert_eq!(settle_delay(WaitUntil::Load), None);
    }

    #[test]
    fn test_pdf_options_carry_geometry() {
        let options = pdf_options(request(Media::Print, WaitUntil::Load));
        assert_eq!(options.landscape, Some(true));
        assert_eq!(options.margin_top, Some(1.0));
        assert_eq!(options.margin_bottom, Some(0.5));
        assert_eq!(options.print_background, Some(true));
        assert!(options.footer_template.unwrap().contains("pageNumber"));
        let width = options.paper_width.unwrap();
        assert!((width - 210.0 / 25.4).abs() < 1e-9);
    }

    #[test]
    fn test_timeout_defaults_and_overrides() {
        assert_eq!(ChromiumRasterizer::new().timeout, DEFAULT_TIMEOUT);
        let rasterizer = ChromiumRasterizer::new().with_timeout(Duration::from_secs(5));
        assert_eq!(rasterizer.timeout, Duration::from_secs(5));
    }
}
