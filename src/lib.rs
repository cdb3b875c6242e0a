//! ReportPress Core - Report Model and HTML-to-PDF Rendering
//!
//! # Rendering Contract
//! 1. A report is built once: `init` populates parameters and data sets
//! 2. Registry reads are typed and fail loudly on misuse
//! 3. Validation gates rendering; an invalid report never reaches the rasterizer
//! 4. Failures come back as values (`Outcome`), never as panics
//! 5. Template values are HTML-escaped

pub mod assets;
pub mod config;
pub mod datasets;
pub mod html;
pub mod outcome;
pub mod parameters;
pub mod pipeline;
pub mod rasterizer;
pub mod registry;
pub mod report;
pub mod reports;

pub use assets::{AssetLoader, FsAssetLoader, MemoryAssets};
pub use datasets::{AnyDataSet, DataSet};
pub use html::{HandlebarsProvider, HtmlError, HtmlProvider, RenderedHtml};
pub use outcome::{Failure, Outcome, OutcomeError, ValidationError};
pub use parameters::{DateRange, FromParameter, ParameterValue, ReportParameter};
pub use pipeline::{RenderPipeline, RenderingOptions, DEFAULT_TIMEOUT};
pub use rasterizer::{PdfRequest, RasterizeError, Rasterizer, WkhtmltopdfRasterizer};
pub use registry::{DataSetRegistry, ParameterRegistry, RegistryError};
pub use reports::SalesReport;
pub use report::{
    Layout, Margins, PageFormat, Report, ReportContext, ReportData, ReportDefinition, ReportError,
    ReportView,
};

pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
