//! ReportPress CLI - Build, validate and render reports
//!
//! Commands: reports, validate, preview, render
//! Outputs JSON to stdout, logs to stderr
//! Returns 2 on validation or render failure

use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use reportpress_core::{
    config::Config,
    reports::{self, sales, CatalogEntry, ReportKind, SalesReport},
    FsAssetLoader, HtmlProvider, RenderPipeline, Report, ReportContext,
};

#[derive(Parser)]
#[command(name = "reportpress-cli")]
#[command(about = "ReportPress CLI - HTML to PDF reports")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding report assets (overrides configuration)
    #[arg(long, global = true)]
    assets_dir: Option<PathBuf>,

    /// Directory with one template folder per report (overrides configuration)
    #[arg(long, global = true)]
    templates_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// List available reports
    Reports,

    /// Build a report and run its validation
    Validate {
        #[arg(short, long)]
        report: String,
    },

    /// Write the preview-mode HTML of a report
    Preview {
        #[arg(short, long)]
        report: String,

        #[arg(short, long)]
        output: PathBuf,
    },

    /// Render a report to PDF
    Render {
        #[arg(short, long)]
        report: String,

        #[arg(short, long)]
        output: PathBuf,

        /// Top margin in CSS pixels
        #[arg(long)]
        margin_top: Option<u32>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    let mut config = match Config::load(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => return fail(format!("Failed to load configuration: {}", e)),
    };
    if let Some(dir) = cli.assets_dir {
        config.paths.assets_dir = dir;
    }
    if let Some(dir) = cli.templates_dir {
        config.paths.templates_dir = dir;
    }

    match cli.command {
        Commands::Reports => {
            let listing: Vec<_> = reports::catalog()
                .iter()
                .map(|r| {
                    json!({
                        "name": r.name,
                        "description": r.description,
                        "layout": r.layout,
                        "format": r.format.name,
                    })
                })
                .collect();

            emit(&json!(listing));
            ExitCode::SUCCESS
        }

        Commands::Validate { report } => {
            let (_, report) = match build(&report, &config).await {
                Ok(r) => r,
                Err(e) => return fail(e),
            };

            let outcome = report.validate();
            emit(&json!(outcome));
            if outcome.is_success() {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(2) // Validation failure
            }
        }

        Commands::Preview { report, output } => {
            let (entry, report) = match build(&report, &config).await {
                Ok(r) => r,
                Err(e) => return fail(e),
            };
            let report = report.with_preview(true);

            let html = match entry.html_provider(&config.paths.templates_dir).and_then(|p| p.render(&report)) {
                Ok(h) => h,
                Err(e) => return fail(format!("Failed to render HTML: {}", e)),
            };

            if let Err(e) = tokio::fs::write(&output, html.body.as_bytes()).await {
                return fail(format!("Failed to write '{}': {}", output.display(), e));
            }

            emit(&json!({
                "success": true,
                "report": report.name(),
                "output": output,
                "bytes": html.body.len(),
            }));
            ExitCode::SUCCESS
        }

        Commands::Render {
            report,
            output,
            margin_top,
        } => {
            let (entry, report) = match build(&report, &config).await {
                Ok(r) => r,
                Err(e) => return fail(e),
            };

            let html = match entry.html_provider(&config.paths.templates_dir).and_then(|p| p.render(&report)) {
                Ok(h) => h,
                Err(e) => return fail(format!("Failed to render HTML: {}", e)),
            };

            let rasterizer = match config.rasterizer() {
                Ok(r) => r,
                Err(e) => return fail(e.to_string()),
            };
            let pipeline = RenderPipeline::new(rasterizer).with_timeout(config.timeout());

            let name = report.name().to_string();
            let margin_top = margin_top.unwrap_or(sales::DOWNLOAD_MARGIN_TOP);
            let outcome = report
                .generate_pdf(&pipeline, |options| {
                    html.apply(options);
                    options.margins.top = margin_top;
                })
                .await;

            match outcome.into_result() {
                Ok(bytes) => {
                    if let Err(e) = tokio::fs::write(&output, &bytes).await {
                        return fail(format!("Failed to write '{}': {}", output.display(), e));
                    }

                    emit(&json!({
                        "success": true,
                        "report": name,
                        "output": output,
                        "bytes": bytes.len(),
                        "sha256": format!("{:x}", Sha256::digest(&bytes)),
                        "generated_at": chrono::Utc::now().to_rfc3339(),
                    }));
                    ExitCode::SUCCESS
                }
                Err(failure) => {
                    emit(&json!({
                        "success": false,
                        "report": name,
                        "error": failure.error(),
                        "validation_errors": failure.validation_errors(),
                    }));
                    ExitCode::from(2) // Validation or render failure
                }
            }
        }
    }
}

async fn build(name: &str, config: &Config) -> Result<(CatalogEntry, Report<SalesReport>), String> {
    let entry = reports::find(name).ok_or_else(|| format!("Unknown report '{}'", name))?;
    let ctx = ReportContext::new(Arc::new(FsAssetLoader::new(&config.paths.assets_dir)));

    let report = match entry.kind {
        ReportKind::Sales => Report::build(SalesReport::sample(), &ctx).await,
    };
    report
        .map(|r| (entry, r))
        .map_err(|e| format!("Failed to build report: {}", e))
}

fn emit(value: &Value) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{}", s),
        Err(_) => println!("{}", value),
    }
}

fn fail(message: impl Into<String>) -> ExitCode {
    let message = message.into();
    tracing::error!(error = %message, "command failed");
    emit(&json!({ "success": false, "error": message }));
    ExitCode::FAILURE
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,reportpress_core=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
