//! Contract Invariant Tests
//!
//! These tests verify the non-negotiable guarantees.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;

use reportpress_core::{
    pipeline::build_request,
    rasterizer::Pixels,
    registry::EntryKind,
    reports::sales::{self, ProductPerformance, ProductPerformanceItem, SalesSummary, SalesSummaryItem},
    DataSet, HandlebarsProvider, HtmlProvider, Layout, MemoryAssets, Outcome, OutcomeError,
    PageFormat, PdfRequest, RasterizeError, Rasterizer, RenderPipeline, RenderingOptions, Report,
    ReportContext, ReportData, ReportDefinition, ReportError, ReportView, RegistryError,
    SalesReport, ValidationError,
};

// ============================================================================
// Fixtures
// ============================================================================

/// Echoes the body back as the "PDF" and records every request.
#[derive(Default)]
struct RecordingRasterizer {
    calls: AtomicUsize,
    last: Mutex<Option<PdfRequest>>,
}

impl RecordingRasterizer {
    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn last(&self) -> PdfRequest {
        self.last.lock().unwrap().clone().expect("no request recorded")
    }
}

#[async_trait]
impl Rasterizer for RecordingRasterizer {
    async fn rasterize(&self, request: PdfRequest) -> Result<Vec<u8>, RasterizeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut pdf = b"%PDF-1.4\n".to_vec();
        pdf.extend_from_slice(request.html.as_bytes());
        *self.last.lock().unwrap() = Some(request);
        Ok(pdf)
    }
}

struct FailingRasterizer;

#[async_trait]
impl Rasterizer for FailingRasterizer {
    async fn rasterize(&self, _request: PdfRequest) -> Result<Vec<u8>, RasterizeError> {
        Err(RasterizeError::Process {
            code: Some(1),
            stderr: "boom".to_string(),
        })
    }
}

struct HangingRasterizer;

#[async_trait]
impl Rasterizer for HangingRasterizer {
    async fn rasterize(&self, _request: PdfRequest) -> Result<Vec<u8>, RasterizeError> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(Vec::new())
    }
}

struct PanickingRasterizer;

#[async_trait]
impl Rasterizer for PanickingRasterizer {
    async fn rasterize(&self, _request: PdfRequest) -> Result<Vec<u8>, RasterizeError> {
        panic!("rasterizer exploded");
    }
}

struct Probe {
    title: String,
    layout: Layout,
    valid: bool,
}

impl Probe {
    fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            layout: Layout::Vertical,
            valid: true,
        }
    }
}

#[async_trait]
impl ReportDefinition for Probe {
    fn name(&self) -> &str {
        "Probe"
    }

    fn layout(&self) -> Layout {
        self.layout
    }

    async fn init(&self, _ctx: &ReportContext, data: &mut ReportData) -> Result<(), ReportError> {
        data.add_parameter("Title", self.title.as_str())?;
        Ok(())
    }

    fn validate(&self, _data: &ReportData) -> Outcome {
        if self.valid {
            Outcome::ok()
        } else {
            Outcome::validation_failed([ValidationError::for_property(
                "Title",
                "The title is not accepted",
            )])
        }
    }
}

#[derive(Debug, Serialize)]
struct Regions {
    names: Vec<String>,
}

impl DataSet for Regions {
    const KIND: &'static str = "Regions";

    fn row_count(&self) -> usize {
        self.names.len()
    }
}

fn empty_ctx() -> ReportContext {
    ReportContext::new(Arc::new(MemoryAssets::new()))
}

fn sales_ctx() -> ReportContext {
    ReportContext::new(Arc::new(
        MemoryAssets::new().with(sales::LOGO_PATH, b"<svg xmlns=\"http://www.w3.org/2000/svg\"/>".to_vec()),
    ))
}

fn set_html(options: &mut RenderingOptions) {
    options.html = "<p>body</p>".to_string();
}

// ============================================================================
// Outcome
// ============================================================================

#[test]
fn invariant_outcome_success_and_failure_exclusive() {
    let outcomes: Vec<Outcome<u8>> = vec![
        Outcome::success(7),
        Outcome::fail("broken"),
        Outcome::validation_failed([ValidationError::new("bad")]),
    ];

    for outcome in &outcomes {
        if outcome.is_success() {
            assert!(outcome.error().is_none());
            assert!(outcome.validation_errors().is_empty());
            assert!(outcome.value().is_some());
        } else {
            assert!(outcome.error().is_some() || !outcome.validation_errors().is_empty());
            assert!(outcome.value().is_none());
        }
    }

    assert_eq!(
        Outcome::<u8>::from_parts(true, Some("e".into()), vec![], Some(1)).unwrap_err(),
        OutcomeError::SuccessWithError
    );
    assert_eq!(
        Outcome::<u8>::from_parts(false, None, vec![], None).unwrap_err(),
        OutcomeError::FailureWithoutError
    );
}

#[test]
#[should_panic]
fn invariant_failure_requires_message() {
    let _ = Outcome::<()>::fail("");
}

#[test]
#[should_panic]
fn invariant_validation_failure_requires_errors() {
    let _ = Outcome::<()>::validation_failed(Vec::new());
}

// ============================================================================
// Pipeline gating
// ============================================================================

#[tokio::test]
async fn invariant_invalid_report_never_rasterized() {
    let rasterizer = Arc::new(RecordingRasterizer::default());
    let pipeline = RenderPipeline::new(rasterizer.clone());

    let probe = Probe {
        valid: false,
        ..Probe::new("Rejected")
    };
    let report = Report::build(probe, &empty_ctx()).await.unwrap();
    let expected = report.validate();

    let mut configured = false;
    let outcome = report
        .generate_pdf(&pipeline, |options| {
            configured = true;
            set_html(options);
        })
        .await;

    // Must fail with exactly the validation failure
    assert!(outcome.is_failure());
    assert_eq!(outcome.error(), expected.error());
    assert_eq!(outcome.validation_errors(), expected.validation_errors());
    assert_eq!(outcome.validation_errors()[0].property, "Title");

    assert!(!configured);
    assert_eq!(rasterizer.calls(), 0);
}

#[tokio::test]
async fn invariant_missing_html_fails_without_rasterizing() {
    let rasterizer = Arc::new(RecordingRasterizer::default());
    let pipeline = RenderPipeline::new(rasterizer.clone());

    let report = Report::build(Probe::new("Empty"), &empty_ctx()).await.unwrap();
    let outcome = pipeline.generate_pdf(report, |_| {}).await;

    assert!(outcome.is_failure());
    assert!(outcome.error().unwrap().contains("No HTML body"));
    assert_eq!(rasterizer.calls(), 0);
}

#[tokio::test]
async fn invariant_defaults_preserved_unless_overridden() {
    let rasterizer = Arc::new(RecordingRasterizer::default());
    let pipeline = RenderPipeline::new(rasterizer.clone());

    let report = Report::build(Probe::new("Defaults"), &empty_ctx()).await.unwrap();
    let outcome = report.generate_pdf(&pipeline, set_html).await;
    assert!(outcome.is_success());

    let request = rasterizer.last();
    assert_eq!(request.margins.top, Pixels(150));
    assert_eq!(request.margins.bottom, Pixels(40));
    assert_eq!(request.margins.left, Pixels(0));
    assert_eq!(request.margins.right, Pixels(0));
    assert_eq!(request.header_template, "<span></span>");
    assert_eq!(request.footer_template, "<span></span>");
    assert_eq!(request.format, PageFormat::A4);
    assert!(!request.landscape);
    assert!(request.print_background);
    assert_eq!(rasterizer.calls(), 1);
}

#[tokio::test]
async fn invariant_margin_override_reaches_rasterizer() {
    let rasterizer = Arc::new(RecordingRasterizer::default());
    let pipeline = RenderPipeline::new(rasterizer.clone());

    let report = Report::build(Probe::new("Override"), &empty_ctx()).await.unwrap();
    let outcome = report
        .generate_pdf(&pipeline, |options| {
            set_html(options);
            options.header = "<header>h</header>".to_string();
            options.margins.top = 175;
        })
        .await;
    assert!(outcome.is_success());

    let request = rasterizer.last();
    assert_eq!(request.margins.top.to_string(), "175px");
    assert_eq!(request.margins.bottom, Pixels(40));
    assert_eq!(request.header_template, "<header>h</header>");
    assert_eq!(request.footer_template, "<span></span>");
}

#[test]
fn invariant_orientation_follows_layout() {
    for format in PageFormat::ALL {
        for layout in [Layout::Vertical, Layout::Horizontal] {
            let mut options = RenderingOptions::default();
            set_html(&mut options);
            let request = build_request(options, layout, format);
            assert_eq!(request.landscape, layout == Layout::Horizontal);
            assert_eq!(request.format, format);
        }
    }
}

#[tokio::test]
async fn invariant_horizontal_report_prints_landscape() {
    let rasterizer = Arc::new(RecordingRasterizer::default());
    let pipeline = RenderPipeline::new(rasterizer.clone());

    let probe = Probe {
        layout: Layout::Horizontal,
        ..Probe::new("Wide")
    };
    let report = Report::build(probe, &empty_ctx()).await.unwrap();
    assert!(report.generate_pdf(&pipeline, set_html).await.is_success());
    assert!(rasterizer.last().landscape);
}

// ============================================================================
// Rasterizer failures become outcomes
// ============================================================================

#[tokio::test]
async fn invariant_rasterizer_error_is_failure() {
    let pipeline = RenderPipeline::new(Arc::new(FailingRasterizer));
    let report = Report::build(Probe::new("Err"), &empty_ctx()).await.unwrap();

    let outcome = report.generate_pdf(&pipeline, set_html).await;
    assert!(outcome.is_failure());
    assert!(outcome.error().unwrap().contains("boom"));
}

#[tokio::test]
async fn invariant_rasterizer_timeout_is_failure() {
    let pipeline =
        RenderPipeline::new(Arc::new(HangingRasterizer)).with_timeout(Duration::from_millis(50));
    let report = Report::build(Probe::new("Slow"), &empty_ctx()).await.unwrap();

    let outcome = report.generate_pdf(&pipeline, set_html).await;
    assert!(outcome.is_failure());
    assert!(outcome.error().unwrap().contains("timed out"));
}

#[tokio::test]
async fn invariant_rasterizer_panic_is_failure() {
    let pipeline = RenderPipeline::new(Arc::new(PanickingRasterizer));
    let report = Report::build(Probe::new("Panic"), &empty_ctx()).await.unwrap();

    let outcome = report.generate_pdf(&pipeline, set_html).await;
    assert!(outcome.is_failure());
    assert!(outcome.error().unwrap().contains("crashed"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn invariant_concurrent_renders_are_independent() {
    let rasterizer = Arc::new(RecordingRasterizer::default());
    let pipeline = RenderPipeline::new(rasterizer.clone());

    let mut tasks = tokio::task::JoinSet::new();
    for i in 0..8 {
        let pipeline = pipeline.clone();
        tasks.spawn(async move {
            let title = format!("report-{}", i);
            let report = Report::build(Probe::new(&title), &empty_ctx()).await.unwrap();
            let html = format!("<h1>{}</h1>", report.parameter::<String>("Title").unwrap());
            let outcome = report
                .generate_pdf(&pipeline, |options| options.html = html)
                .await;
            (title, outcome)
        });
    }

    let mut finished = 0;
    while let Some(joined) = tasks.join_next().await {
        let (title, outcome) = joined.unwrap();
        let pdf = String::from_utf8(outcome.into_value().unwrap()).unwrap();
        assert!(pdf.ends_with(&format!("<h1>{}</h1>", title)));
        finished += 1;
    }
    assert_eq!(finished, 8);
    assert_eq!(rasterizer.calls(), 8);
}

// ============================================================================
// Registries
// ============================================================================

#[test]
fn invariant_duplicate_parameter_keeps_first() {
    let mut data = ReportData::new("Probe");
    data.add_parameter("SalesTarget", Decimal::new(1_500_000, 0)).unwrap();

    let err = data.add_parameter("SalesTarget", Decimal::ONE).unwrap_err();
    assert!(matches!(
        err,
        RegistryError::DuplicateKey { kind: EntryKind::Parameter, .. }
    ));
    assert_eq!(
        err.to_string(),
        "A parameter with the name 'SalesTarget' already exists for the Report 'Probe'"
    );
    assert_eq!(
        data.parameter::<Decimal>("SalesTarget").unwrap(),
        Decimal::new(1_500_000, 0)
    );
}

#[tokio::test]
async fn invariant_registry_misuse_is_reported() {
    let report = Report::build(SalesReport::sample(), &sales_ctx()).await.unwrap();

    let missing = report.parameter::<String>("Subtitle").unwrap_err();
    assert!(matches!(missing, RegistryError::NotFound { .. }));
    assert!(missing.to_string().contains("does not exist"));

    let mismatch = report.parameter::<i64>("ReportTitle").unwrap_err();
    assert!(matches!(mismatch, RegistryError::TypeMismatch { .. }));

    let absent = report.dataset::<Regions>().unwrap_err();
    assert!(matches!(
        absent,
        RegistryError::NotFound { kind: EntryKind::DataSet, .. }
    ));
}

#[tokio::test]
async fn invariant_missing_asset_aborts_construction() {
    let err = Report::build(SalesReport::sample(), &empty_ctx())
        .await
        .err()
        .expect("construction must fail");

    assert!(matches!(err, ReportError::AssetNotFound(_)));
    assert!(err.to_string().contains("does not contain a file"));
}

// ============================================================================
// Sales report
// ============================================================================

#[test]
fn invariant_aggregates_are_exact() {
    let summary = SalesSummary::new(vec![
        SalesSummaryItem::new("April", Decimal::new(450_000, 0), Decimal::new(12_000, 0), 45),
        SalesSummaryItem::new("May", Decimal::new(520_000, 0), Decimal::new(8_500, 0), 52),
        SalesSummaryItem::new("June", Decimal::new(500_000, 0), Decimal::new(9_500, 0), 63),
    ]);

    assert_eq!(summary.sum_total_sales(), Decimal::new(1_470_000, 0));
    assert_eq!(summary.sum_net_sales(), Decimal::new(1_440_000, 0));
}

#[test]
fn invariant_top_performer_resolution() {
    let revenue = [312_500, 196_000, 375_000, 234_000];
    let products = ProductPerformance::new(
        revenue
            .iter()
            .enumerate()
            .map(|(i, r)| {
                ProductPerformanceItem::new(
                    format!("P100{}", i + 1),
                    "Item",
                    100,
                    Decimal::new(*r, 0),
                    Decimal::ZERO,
                )
            })
            .collect(),
    );

    assert_eq!(products.top_performing_product_id(), Some("P1003"));
    assert_eq!(ProductPerformance::default().top_performing_product_id(), None);
}

#[tokio::test]
async fn invariant_under_target_is_informational() {
    let rasterizer = Arc::new(RecordingRasterizer::default());
    let pipeline = RenderPipeline::new(rasterizer.clone());

    let report = Report::build(SalesReport::sample(), &sales_ctx()).await.unwrap();

    // 1,470,000 against a 1,500,000 target: flagged, not failed
    assert!(report.validate().is_success());
    let derived = ReportView::derived_context(&report).unwrap();
    assert_eq!(derived.get("under_target"), Some(&Value::Bool(true)));

    let html = SalesReport::html_provider().unwrap().render(&report).unwrap();
    assert!(html.body.contains("under-target"));

    let outcome = report
        .generate_pdf(&pipeline, |options| {
            html.apply(options);
            options.margins.top = sales::DOWNLOAD_MARGIN_TOP;
        })
        .await;
    assert!(outcome.is_success());

    let request = rasterizer.last();
    assert_eq!(request.margins.top, Pixels(175));
    assert!(request.header_template.contains("Q2 2025 Sales Performance"));
}

// ============================================================================
// HTML provider
// ============================================================================

#[tokio::test]
async fn invariant_template_values_escaped() {
    let report = Report::build(Probe::new("<script>alert(1)</script>"), &empty_ctx())
        .await
        .unwrap();
    let provider =
        HandlebarsProvider::from_sources([("report", "<h1>{{parameters.Title}}</h1>")]).unwrap();

    let html = provider.render(&report).unwrap();
    assert!(html.body.contains("&lt;script&gt;"));
    assert!(!html.body.contains("<script>"));
}

#[tokio::test]
async fn invariant_preview_inlines_header() {
    let provider = HandlebarsProvider::from_sources([
        ("report", "{{{header_html}}}<p>body</p>"),
        ("header", "<header>{{report.name}}</header>"),
    ])
    .unwrap();

    let report = Report::build(Probe::new("Preview"), &empty_ctx()).await.unwrap();
    let printed = provider.render(&report).unwrap();
    assert_eq!(printed.body, "<p>body</p>");
    assert_eq!(printed.header.as_deref(), Some("<header>Probe</header>"));

    let report = report.with_preview(true);
    let preview = provider.render(&report).unwrap();
    assert_eq!(preview.body, "<header>Probe</header><p>body</p>");
}
