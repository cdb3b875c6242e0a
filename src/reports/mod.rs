//! Built-in Reports

pub mod sales;

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::html::{HandlebarsProvider, HtmlError};
use crate::report::{Layout, PageFormat, ReportDefinition};

pub use sales::SalesReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportKind {
    Sales,
}

/// One report the CLI can build.
#[derive(Debug, Clone, Serialize)]
pub struct CatalogEntry {
    pub kind: ReportKind,
    pub name: String,
    pub description: &'static str,
    pub layout: Layout,
    pub format: PageFormat,
}

pub fn catalog() -> Vec<CatalogEntry> {
    let sales = SalesReport::sample();
    vec![CatalogEntry {
        kind: ReportKind::Sales,
        name: sales.name().to_string(),
        description: "Monthly sales summary and product performance",
        layout: sales.layout(),
        format: sales.format(),
    }]
}

/// Case-insensitive lookup by report name.
pub fn find(name: &str) -> Option<CatalogEntry> {
    catalog()
        .into_iter()
        .find(|entry| entry.name.eq_ignore_ascii_case(name))
}

impl CatalogEntry {
    /// `<root>/<report name, lowercase>`.
    pub fn template_dir(&self, root: &Path) -> PathBuf {
        root.join(self.name.to_ascii_lowercase())
    }

    /// Templates from `<root>/<report>` when that directory exists,
    /// otherwise the ones compiled into the crate.
    pub fn html_provider(&self, root: &Path) -> Result<HandlebarsProvider, HtmlError> {
        let dir = self.template_dir(root);
        if dir.is_dir() {
            tracing::debug!(report = %self.name, dir = %dir.display(), "using template directory");
            return HandlebarsProvider::from_dir(&dir);
        }

        tracing::debug!(report = %self.name, dir = %dir.display(), "template directory absent, using built-in templates");
        match self.kind {
            ReportKind::Sales => SalesReport::html_provider(),
        }
    }
}
