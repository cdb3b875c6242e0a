//! Rendering Pipeline - Single Entry Point
//!
//! CRITICAL: generate_pdf MUST call validate first. An invalid report never
//! reaches the rasterizer.
//!
//! Order per call:
//! 1. validate
//! 2. default options, then configure
//! 3. translate to a rasterizer request
//! 4. rasterize (bounded by a timeout) and wrap the result

use std::sync::Arc;
use std::time::Duration;

use tracing::Instrument;
use uuid::Uuid;

use crate::outcome::Outcome;
use crate::rasterizer::{
    Media, PdfMargins, PdfRequest, Pixels, RasterizeError, Rasterizer, WaitUntil,
};
use crate::report::{Layout, Margins, PageFormat, Report, ReportDefinition};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Header/footer used when the caller supplies none.
pub const EMPTY_TEMPLATE: &str = "<span></span>";

/// Per-call rendering input. Built fresh for every `generate_pdf`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderingOptions {
    pub html: String,
    pub header: String,
    pub footer: String,
    pub margins: Margins,
}

impl RenderingOptions {
    pub fn new(margins: Margins) -> Self {
        Self {
            html: String::new(),
            header: EMPTY_TEMPLATE.to_string(),
            footer: EMPTY_TEMPLATE.to_string(),
            margins,
        }
    }
}

impl Default for RenderingOptions {
    fn default() -> Self {
        Self::new(Margins::STANDARD)
    }
}

/// Translate options and report geometry into a rasterizer request.
pub fn build_request(options: RenderingOptions, layout: Layout, format: PageFormat) -> PdfRequest {
    PdfRequest {
        html: options.html,
        header_template: options.header,
        footer_template: options.footer,
        format,
        landscape: layout.is_landscape(),
        margins: PdfMargins {
            top: Pixels(options.margins.top),
            bottom: Pixels(options.margins.bottom),
            left: Pixels(options.margins.left),
            right: Pixels(options.margins.right),
        },
        print_background: true,
        display_header_footer: true,
        wait_until: WaitUntil::NetworkIdle,
        media: Media::Print,
    }
}

/// The rendering pipeline. Cheap to clone and safe to share between
/// concurrent callers; it holds no report state.
#[derive(Clone)]
pub struct RenderPipeline {
    rasterizer: Arc<dyn Rasterizer>,
    timeout: Duration,
}

impl RenderPipeline {
    pub fn new(rasterizer: Arc<dyn Rasterizer>) -> Self {
        Self {
            rasterizer,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Render a report to PDF bytes.
    ///
    /// Consumes the report. `configure` runs exactly once, after validation
    /// succeeded, and is where the caller injects HTML and overrides margins.
    pub async fn generate_pdf<D, F>(&self, report: Report<D>, configure: F) -> Outcome<Vec<u8>>
    where
        D: ReportDefinition,
        F: FnOnce(&mut RenderingOptions),
    {
        let span = tracing::info_span!(
            "generate_pdf",
            report = %report.name(),
            render_id = %Uuid::new_v4()
        );
        self.run(report, configure).instrument(span).await
    }

    async fn run<D, F>(&self, report: Report<D>, configure: F) -> Outcome<Vec<u8>>
    where
        D: ReportDefinition,
        F: FnOnce(&mut RenderingOptions),
    {
        // MANDATORY: validation gates everything below.
        if let Err(failure) = report.validate().into_result() {
            tracing::warn!(error = %failure, "report failed validation");
            return Outcome::from_failure(failure);
        }

        let mut options = RenderingOptions::new(report.margins());
        configure(&mut options);

        if options.html.trim().is_empty() {
            return Outcome::fail(format!(
                "No HTML body was supplied for the Report '{}'",
                report.name()
            ));
        }

        let request = build_request(options, report.layout(), report.format());
        tracing::debug!(
            format = %request.format,
            landscape = request.landscape,
            margin_top = %request.margins.top,
            "rasterizing"
        );

        match self.rasterize(request).await {
            Ok(bytes) => {
                tracing::info!(bytes = bytes.len(), "pdf generated");
                Outcome::success(bytes)
            }
            Err(e) => {
                tracing::error!(error = %e, "pdf generation failed");
                Outcome::fail(e.to_string())
            }
        }
    }

    /// Runs the rasterizer on its own task so a panic or a hang surfaces
    /// as an error instead of escaping to the caller.
    async fn rasterize(&self, request: PdfRequest) -> Result<Vec<u8>, RasterizeError> {
        let rasterizer = Arc::clone(&self.rasterizer);
        let mut task = tokio::spawn(async move { rasterizer.rasterize(request).await });

        match tokio::time::timeout(self.timeout, &mut task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join)) => Err(RasterizeError::Crashed(join.to_string())),
            Err(_) => {
                task.abort();
                Err(RasterizeError::Timeout(self.timeout))
            }
        }
    }
}

impl<D: ReportDefinition> Report<D> {
    /// Shorthand for [`RenderPipeline::generate_pdf`].
    pub async fn generate_pdf<F>(self, pipeline: &RenderPipeline, configure: F) -> Outcome<Vec<u8>>
    where
        F: FnOnce(&mut RenderingOptions),
    {
        pipeline.generate_pdf(self, configure).await
    }
}
