//! Report Model - Parameters, Data Sets and Page Geometry
//!
//! A report is built once per use: `init` runs exactly once inside
//! [`Report::build`], the registries are read-only afterwards, and
//! rendering consumes the report.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::assets::AssetLoader;
use crate::datasets::DataSet;
use crate::outcome::Outcome;
use crate::parameters::{FromParameter, ParameterValue, ReportParameter};
use crate::registry::{DataSetRegistry, ParameterRegistry, RegistryError};

#[derive(Debug, Error)]
pub enum ReportError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("The path '{}' does not contain a file.", .0.display())]
    AssetNotFound(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Report initialization failed: {0}")]
    Init(String),
}

/// Page orientation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    /// Portrait.
    #[default]
    Vertical,
    /// Landscape.
    Horizontal,
}

impl Layout {
    pub fn is_landscape(self) -> bool {
        matches!(self, Layout::Horizontal)
    }
}

/// Named physical page size, in millimetres (portrait orientation).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageFormat {
    pub name: &'static str,
    pub width_mm: u32,
    pub height_mm: u32,
}

impl PageFormat {
    pub const A3: PageFormat = PageFormat { name: "A3", width_mm: 297, height_mm: 420 };
    pub const A4: PageFormat = PageFormat { name: "A4", width_mm: 210, height_mm: 297 };
    pub const A5: PageFormat = PageFormat { name: "A5", width_mm: 148, height_mm: 210 };
    pub const LETTER: PageFormat = PageFormat { name: "Letter", width_mm: 216, height_mm: 279 };
    pub const LEGAL: PageFormat = PageFormat { name: "Legal", width_mm: 216, height_mm: 356 };

    pub const ALL: [PageFormat; 5] = [Self::A3, Self::A4, Self::A5, Self::LETTER, Self::LEGAL];

    pub fn by_name(name: &str) -> Option<PageFormat> {
        Self::ALL
            .into_iter()
            .find(|f| f.name.eq_ignore_ascii_case(name))
    }

    /// Width of the printable sheet once the orientation is applied.
    pub fn page_width_mm(&self, layout: Layout) -> u32 {
        match layout {
            Layout::Vertical => self.width_mm,
            Layout::Horizontal => self.height_mm,
        }
    }
}

impl std::fmt::Display for PageFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name)
    }
}

/// Page margins in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Margins {
    pub top: u32,
    pub bottom: u32,
    pub left: u32,
    pub right: u32,
}

impl Margins {
    /// Leaves room for a full-width header band.
    pub const STANDARD: Margins = Margins { top: 150, bottom: 40, left: 0, right: 0 };
    /// Dense single-table geometries with a slim header.
    pub const COMPACT: Margins = Margins { top: 60, bottom: 30, left: 20, right: 20 };
}

impl Default for Margins {
    fn default() -> Self {
        Self::STANDARD
    }
}

/// Collaborators a report may use while initializing.
#[derive(Clone)]
pub struct ReportContext {
    assets: Arc<dyn AssetLoader>,
}

impl ReportContext {
    pub fn new(assets: Arc<dyn AssetLoader>) -> Self {
        Self { assets }
    }

    pub fn assets(&self) -> &dyn AssetLoader {
        self.assets.as_ref()
    }
}

/// The parameter and data set registries of one report instance.
#[derive(Debug)]
pub struct ReportData {
    parameters: ParameterRegistry,
    datasets: DataSetRegistry,
}

impl ReportData {
    pub fn new(report: &str) -> Self {
        Self {
            parameters: ParameterRegistry::new(report),
            datasets: DataSetRegistry::new(report),
        }
    }

    pub fn add_parameter(
        &mut self,
        name: impl Into<String>,
        value: impl Into<ParameterValue>,
    ) -> Result<(), RegistryError> {
        self.parameters.add(ReportParameter::new(name, value))
    }

    pub fn add_dataset<T: DataSet>(&mut self, dataset: T) -> Result<(), RegistryError> {
        self.datasets.add(dataset)
    }

    pub fn parameter<T: FromParameter>(&self, name: &str) -> Result<T, RegistryError> {
        self.parameters.get(name)
    }

    pub fn dataset<T: DataSet>(&self) -> Result<&T, RegistryError> {
        self.datasets.get()
    }

    pub fn parameters(&self) -> &ParameterRegistry {
        &self.parameters
    }

    pub fn datasets(&self) -> &DataSetRegistry {
        &self.datasets
    }
}

/// What a concrete report declares: identity, geometry, data population
/// and its own validation rules.
#[async_trait]
pub trait ReportDefinition: Send + Sync + 'static {
    fn name(&self) -> &str;

    fn layout(&self) -> Layout {
        Layout::Vertical
    }

    fn format(&self) -> PageFormat {
        PageFormat::A4
    }

    /// Margins the rendering options start from.
    fn margins(&self) -> Margins {
        Margins::STANDARD
    }

    /// Populate parameters and data sets. Runs once, at construction.
    async fn init(&self, ctx: &ReportContext, data: &mut ReportData) -> Result<(), ReportError>;

    /// Must be pure and idempotent.
    fn validate(&self, _data: &ReportData) -> Outcome {
        Outcome::ok()
    }

    /// Extra values derived from parameters and data sets for templates.
    fn derived_context(&self, _data: &ReportData) -> Result<Map<String, Value>, RegistryError> {
        Ok(Map::new())
    }
}

/// Read-only view of a built report, independent of its definition type.
pub trait ReportView: Send + Sync {
    fn name(&self) -> &str;
    fn is_preview(&self) -> bool;
    fn layout(&self) -> Layout;
    fn format(&self) -> PageFormat;
    fn data(&self) -> &ReportData;
    fn derived_context(&self) -> Result<Map<String, Value>, RegistryError>;
}

/// An initialized report instance.
pub struct Report<D> {
    definition: D,
    preview: bool,
    data: ReportData,
}

impl<D: ReportDefinition> Report<D> {
    /// Construct and initialize. Any `init` error aborts construction.
    pub async fn build(definition: D, ctx: &ReportContext) -> Result<Self, ReportError> {
        let mut data = ReportData::new(definition.name());
        definition.init(ctx, &mut data).await?;

        tracing::debug!(
            report = definition.name(),
            parameters = data.parameters().len(),
            datasets = data.datasets().len(),
            "report initialized"
        );

        Ok(Self {
            definition,
            preview: false,
            data,
        })
    }

    pub fn with_preview(mut self, preview: bool) -> Self {
        self.preview = preview;
        self
    }

    pub fn name(&self) -> &str {
        self.definition.name()
    }

    pub fn is_preview(&self) -> bool {
        self.preview
    }

    pub fn layout(&self) -> Layout {
        self.definition.layout()
    }

    pub fn format(&self) -> PageFormat {
        self.definition.format()
    }

    pub fn margins(&self) -> Margins {
        self.definition.margins()
    }

    pub fn definition(&self) -> &D {
        &self.definition
    }

    pub fn data(&self) -> &ReportData {
        &self.data
    }

    pub fn parameter<T: FromParameter>(&self, name: &str) -> Result<T, RegistryError> {
        self.data.parameter(name)
    }

    pub fn dataset<T: DataSet>(&self) -> Result<&T, RegistryError> {
        self.data.dataset()
    }

    pub fn validate(&self) -> Outcome {
        self.definition.validate(&self.data)
    }
}

impl<D: ReportDefinition> ReportView for Report<D> {
    fn name(&self) -> &str {
        self.definition.name()
    }

    fn is_preview(&self) -> bool {
        self.preview
    }

    fn layout(&self) -> Layout {
        self.definition.layout()
    }

    fn format(&self) -> PageFormat {
        self.definition.format()
    }

    fn data(&self) -> &ReportData {
        &self.data
    }

    fn derived_context(&self) -> Result<Map<String, Value>, RegistryError> {
        self.definition.derived_context(&self.data)
    }
}
