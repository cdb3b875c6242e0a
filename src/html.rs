//! HTML Provider - Report to Body/Header/Footer Markup
//!
//! Templates see the report through a JSON context. Values are HTML-escaped
//! on substitution; only markup the provider rendered itself is inlined raw.

use std::fs;
use std::path::Path;
use std::str::FromStr;

use handlebars::{Context, Handlebars, Helper, HelperResult, Output, RenderContext};
use rust_decimal::Decimal;
use serde_json::{json, Map, Value};
use thiserror::Error;

use crate::pipeline::RenderingOptions;
use crate::registry::RegistryError;
use crate::report::ReportView;

pub const BODY_TEMPLATE: &str = "report";
pub const HEADER_TEMPLATE: &str = "header";
pub const FOOTER_TEMPLATE: &str = "footer";

const TEMPLATE_EXTENSION: &str = "hbs";

#[derive(Debug, Error)]
pub enum HtmlError {
    #[error("Template '{0}' is missing")]
    MissingTemplate(String),

    #[error("Template error: {0}")]
    Template(#[from] handlebars::TemplateError),

    #[error("Render error: {0}")]
    Render(#[from] handlebars::RenderError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("Context error: {0}")]
    Context(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Final markup for one report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedHtml {
    pub body: String,
    pub header: Option<String>,
    pub footer: Option<String>,
}

impl RenderedHtml {
    /// Copy into rendering options; absent header/footer keep their defaults.
    pub fn apply(self, options: &mut RenderingOptions) {
        options.html = self.body;
        if let Some(header) = self.header {
            options.header = header;
        }
        if let Some(footer) = self.footer {
            options.footer = footer;
        }
    }
}

pub trait HtmlProvider: Send + Sync {
    fn render(&self, report: &dyn ReportView) -> Result<RenderedHtml, HtmlError>;
}

/// Handlebars-backed provider: `report` is required, `header` and
/// `footer` are optional. Other templates are usable as partials.
pub struct HandlebarsProvider {
    engine: Handlebars<'static>,
}

impl HandlebarsProvider {
    pub fn from_sources<'a>(
        sources: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Result<Self, HtmlError> {
        let mut engine = new_engine();
        for (name, source) in sources {
            engine.register_template_string(name, source)?;
        }
        Self::checked(engine)
    }

    /// Load every `*.hbs` file in `dir`, named by file stem.
    pub fn from_dir(dir: &Path) -> Result<Self, HtmlError> {
        let mut engine = new_engine();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().map_or(false, |e| e == TEMPLATE_EXTENSION) {
                if let Some(name) = path.file_stem().and_then(|s| s.to_str()) {
                    let source = fs::read_to_string(&path)?;
                    engine.register_template_string(name, source)?;
                    tracing::debug!(template = name, path = %path.display(), "template loaded");
                }
            }
        }
        Self::checked(engine)
    }

    fn checked(engine: Handlebars<'static>) -> Result<Self, HtmlError> {
        if !engine.has_template(BODY_TEMPLATE) {
            return Err(HtmlError::MissingTemplate(BODY_TEMPLATE.to_string()));
        }
        Ok(Self { engine })
    }

    fn render_optional(&self, name: &str, ctx: &Value) -> Result<Option<String>, HtmlError> {
        if !self.engine.has_template(name) {
            return Ok(None);
        }
        Ok(Some(self.engine.render(name, ctx)?))
    }
}

impl HtmlProvider for HandlebarsProvider {
    fn render(&self, report: &dyn ReportView) -> Result<RenderedHtml, HtmlError> {
        let mut ctx = template_context(report)?;

        let header = self.render_optional(HEADER_TEMPLATE, &ctx)?;
        let footer = self.render_optional(FOOTER_TEMPLATE, &ctx)?;

        // The preview page has no print header band, so the header goes inline.
        if report.is_preview() {
            ctx["header_html"] = Value::String(header.clone().unwrap_or_default());
        }
        let body = self.engine.render(BODY_TEMPLATE, &ctx)?;

        Ok(RenderedHtml { body, header, footer })
    }
}

/// JSON view of a report: geometry, parameters, data set contexts and
/// definition-derived values.
pub fn template_context(report: &dyn ReportView) -> Result<Value, HtmlError> {
    let layout = report.layout();
    let format = report.format();

    let parameters: Map<String, Value> = report
        .data()
        .parameters()
        .iter()
        .map(|p| (p.name.clone(), p.value.to_json()))
        .collect();

    let mut datasets = Map::new();
    for dataset in report.data().datasets().iter() {
        datasets.insert(dataset.kind().to_string(), dataset.context()?);
    }

    let derived = report.derived_context()?;

    Ok(json!({
        "report": {
            "name": report.name(),
            "preview": report.is_preview(),
            "layout": layout,
            "landscape": layout.is_landscape(),
            "format": format,
            "page_width_mm": format.page_width_mm(layout),
        },
        "parameters": parameters,
        "datasets": datasets,
        "derived": derived,
    }))
}

fn new_engine() -> Handlebars<'static> {
    let mut engine = Handlebars::new();
    engine.set_strict_mode(false);
    engine.register_helper("format_decimal", Box::new(format_decimal_helper));
    engine.register_helper("percent", Box::new(percent_helper));
    engine.register_helper("date_format", Box::new(date_format_helper));
    engine
}

/// `1470000` -> `1,470,000.00`.
pub fn format_decimal(value: Decimal, places: u32) -> String {
    let rounded = value.round_dp(places);
    let text = format!("{:.*}", places as usize, rounded.abs());
    let (int_part, frac_part) = match text.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (text.as_str(), None),
    };

    let mut grouped = String::with_capacity(text.len() + int_part.len() / 3 + 1);
    if rounded.is_sign_negative() && !rounded.is_zero() {
        grouped.push('-');
    }
    for (i, digit) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    if let Some(frac) = frac_part {
        grouped.push('.');
        grouped.push_str(frac);
    }
    grouped
}

fn decimal_from_json(value: &Value) -> Option<Decimal> {
    match value {
        Value::String(s) => Decimal::from_str(s).ok(),
        Value::Number(n) => Decimal::from_str(&n.to_string()).ok(),
        _ => None,
    }
}

fn format_decimal_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    let places = h.param(1).and_then(|v| v.value().as_u64()).unwrap_or(2) as u32;
    let formatted = h
        .param(0)
        .and_then(|v| decimal_from_json(v.value()))
        .map(|d| format_decimal(d, places))
        .unwrap_or_default();
    out.write(&formatted)?;
    Ok(())
}

fn percent_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    if let Some(d) = h.param(0).and_then(|v| decimal_from_json(v.value())) {
        out.write(&format!("{}%", format_decimal(d, 2)))?;
    }
    Ok(())
}

fn date_format_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    let raw = h.param(0).and_then(|v| v.value().as_str()).unwrap_or_default();
    let pattern = h.param(1).and_then(|v| v.value().as_str()).unwrap_or("%Y-%m-%d");

    let formatted = match chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        Ok(date) => date.format(pattern).to_string(),
        Err(_) => raw.to_string(),
    };
    out.write(&handlebars::html_escape(&formatted))?;
    Ok(())
}
