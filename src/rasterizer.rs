//! Rasterizer Boundary - HTML to PDF bytes
//!
//! The core hands a fully-resolved [`PdfRequest`] to a [`Rasterizer`] and
//! gets bytes or an error back. Browser/process lifecycle lives behind the
//! trait.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::report::PageFormat;

#[cfg(feature = "chromium")]
mod chromium;
mod wkhtmltopdf;

#[cfg(feature = "chromium")]
pub use chromium::ChromiumRasterizer;
pub use wkhtmltopdf::WkhtmltopdfRasterizer;

const CSS_PX_PER_INCH: f64 = 96.0;
const MM_PER_INCH: f64 = 25.4;

#[derive(Debug, Error)]
pub enum RasterizeError {
    #[error("Failed to launch rasterizer: {0}")]
    Launch(String),

    #[error("Rasterizer exited with code {code:?}: {stderr}")]
    Process { code: Option<i32>, stderr: String },

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Rasterization timed out after {0:?}")]
    Timeout(Duration),

    #[error("Rasterizer crashed: {0}")]
    Crashed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A length in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pixels(pub u32);

impl Pixels {
    pub fn to_inches(self) -> f64 {
        f64::from(self.0) / CSS_PX_PER_INCH
    }

    pub fn to_mm(self) -> f64 {
        self.to_inches() * MM_PER_INCH
    }
}

impl std::fmt::Display for Pixels {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}px", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PdfMargins {
    pub top: Pixels,
    pub bottom: Pixels,
    pub left: Pixels,
    pub right: Pixels,
}

/// When the page counts as ready to snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitUntil {
    Load,
    /// No network activity for a short quiet period.
    NetworkIdle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Media {
    Print,
    Screen,
}

/// Everything a rasterizer needs to print one document.
#[derive(Debug, Clone, Serialize)]
pub struct PdfRequest {
    pub html: String,
    pub header_template: String,
    pub footer_template: String,
    pub format: PageFormat,
    pub landscape: bool,
    pub margins: PdfMargins,
    pub print_background: bool,
    pub display_header_footer: bool,
    pub wait_until: WaitUntil,
    pub media: Media,
}

impl PdfRequest {
    /// Paper size in inches as (width, height), before orientation.
    pub fn paper_inches(&self) -> (f64, f64) {
        (
            f64::from(self.format.width_mm) / MM_PER_INCH,
            f64::from(self.format.height_mm) / MM_PER_INCH,
        )
    }
}

#[async_trait]
pub trait Rasterizer: Send + Sync {
    async fn rasterize(&self, request: PdfRequest) -> Result<Vec<u8>, RasterizeError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pixel_conversions() {
        assert_eq!(Pixels(96).to_inches(), 1.0);
        assert!((Pixels(150).to_mm() - 39.6875).abs() < 1e-9);
        assert_eq!(Pixels(175).to_string(), "175px");
    }
}
