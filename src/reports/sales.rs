//! Sales Report - Quarterly Sales and Product Performance
//!
//! Under-target sales are not a validation failure. The template gets an
//! `under_target` flag and colours the totals row with it.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::datasets::DataSet;
use crate::html::{
    HandlebarsProvider, HtmlError, BODY_TEMPLATE, FOOTER_TEMPLATE, HEADER_TEMPLATE,
};
use crate::outcome::{Outcome, ValidationError};
use crate::parameters::DateRange;
use crate::registry::RegistryError;
use crate::report::{ReportContext, ReportData, ReportDefinition, ReportError};

pub const NAME: &str = "Sales";
pub const LOGO_PATH: &str = "img/logo.svg";

/// Top margin used when downloading, leaving room for the logo header.
pub const DOWNLOAD_MARGIN_TOP: u32 = 175;

const REPORT_TEMPLATE: &str = include_str!("../../templates/sales/report.hbs");
const HEADER_SOURCE: &str = include_str!("../../templates/sales/header.hbs");
const FOOTER_SOURCE: &str = include_str!("../../templates/sales/footer.hbs");

const fn ymd(year: i32, month: u32, day: u32) -> NaiveDate {
    match NaiveDate::from_ymd_opt(year, month, day) {
        Some(date) => date,
        None => panic!("invalid calendar date"),
    }
}

const PERIOD_START: NaiveDate = ymd(2025, 1, 1);
const PERIOD_END: NaiveDate = ymd(2025, 6, 25);

// ============================================================================
// Sales summary
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesSummaryItem {
    pub month: String,
    pub total_sales: Decimal,
    pub total_returns: Decimal,
    pub new_customers: u32,
}

impl SalesSummaryItem {
    pub fn new(
        month: impl Into<String>,
        total_sales: Decimal,
        total_returns: Decimal,
        new_customers: u32,
    ) -> Self {
        Self {
            month: month.into(),
            total_sales,
            total_returns,
            new_customers,
        }
    }

    pub fn net_sales(&self) -> Decimal {
        self.total_sales - self.total_returns
    }
}

/// Month-over-month direction of each column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RowTrend {
    pub sales_up: bool,
    pub returns_up: bool,
    pub customers_up: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SalesSummary {
    pub rows: Vec<SalesSummaryItem>,
}

impl SalesSummary {
    pub fn new(rows: Vec<SalesSummaryItem>) -> Self {
        Self { rows }
    }

    pub fn sum_total_sales(&self) -> Decimal {
        self.rows.iter().map(|r| r.total_sales).sum()
    }

    pub fn sum_total_returns(&self) -> Decimal {
        self.rows.iter().map(|r| r.total_returns).sum()
    }

    pub fn sum_net_sales(&self) -> Decimal {
        self.rows.iter().map(SalesSummaryItem::net_sales).sum()
    }

    pub fn sum_new_customers(&self) -> u64 {
        self.rows.iter().map(|r| u64::from(r.new_customers)).sum()
    }

    /// Each row against the previous one; the first row against zero.
    pub fn trends(&self) -> Vec<RowTrend> {
        let mut previous: Option<&SalesSummaryItem> = None;
        let mut trends = Vec::with_capacity(self.rows.len());

        for row in &self.rows {
            let (sales, returns, customers) = previous.map_or(
                (Decimal::ZERO, Decimal::ZERO, 0),
                |p| (p.total_sales, p.total_returns, p.new_customers),
            );
            trends.push(RowTrend {
                sales_up: row.total_sales > sales,
                returns_up: row.total_returns > returns,
                customers_up: row.new_customers > customers,
            });
            previous = Some(row);
        }
        trends
    }
}

impl DataSet for SalesSummary {
    const KIND: &'static str = "SalesSummary";

    fn row_count(&self) -> usize {
        self.rows.len()
    }

    fn context(&self) -> Result<Value, serde_json::Error> {
        let rows: Vec<Value> = self
            .rows
            .iter()
            .zip(self.trends())
            .map(|(row, trend)| {
                json!({
                    "month": row.month,
                    "total_sales": row.total_sales,
                    "total_returns": row.total_returns,
                    "net_sales": row.net_sales(),
                    "new_customers": row.new_customers,
                    "sales_up": trend.sales_up,
                    "returns_up": trend.returns_up,
                    "customers_up": trend.customers_up,
                })
            })
            .collect();

        Ok(json!({
            "rows": rows,
            "sum_total_sales": self.sum_total_sales(),
            "sum_total_returns": self.sum_total_returns(),
            "sum_net_sales": self.sum_net_sales(),
            "sum_new_customers": self.sum_new_customers(),
        }))
    }
}

// ============================================================================
// Product performance
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductPerformanceItem {
    pub product_id: String,
    pub product_name: String,
    pub units_sold: u32,
    pub revenue: Decimal,
    /// Fraction, e.g. `0.02` for 2%.
    pub return_rate: Decimal,
}

impl ProductPerformanceItem {
    pub fn new(
        product_id: impl Into<String>,
        product_name: impl Into<String>,
        units_sold: u32,
        revenue: Decimal,
        return_rate: Decimal,
    ) -> Self {
        Self {
            product_id: product_id.into(),
            product_name: product_name.into(),
            units_sold,
            revenue,
            return_rate,
        }
    }

    pub fn avg_price(&self) -> Decimal {
        if self.units_sold == 0 {
            return Decimal::ZERO;
        }
        self.revenue / Decimal::from(self.units_sold)
    }

    pub fn percentage_return_rate(&self) -> Decimal {
        self.return_rate * Decimal::ONE_HUNDRED
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductPerformance {
    pub rows: Vec<ProductPerformanceItem>,
}

impl ProductPerformance {
    pub fn new(rows: Vec<ProductPerformanceItem>) -> Self {
        Self { rows }
    }

    /// Highest revenue; the earliest row wins a tie.
    pub fn top_performing_product_id(&self) -> Option<&str> {
        let mut best: Option<&ProductPerformanceItem> = None;
        for row in &self.rows {
            if best.map_or(true, |b| row.revenue > b.revenue) {
                best = Some(row);
            }
        }
        best.map(|b| b.product_id.as_str())
    }
}

impl DataSet for ProductPerformance {
    const KIND: &'static str = "ProductPerformance";

    fn row_count(&self) -> usize {
        self.rows.len()
    }

    fn context(&self) -> Result<Value, serde_json::Error> {
        let top = self.top_performing_product_id();
        let rows: Vec<Value> = self
            .rows
            .iter()
            .map(|row| {
                json!({
                    "product_id": row.product_id,
                    "product_name": row.product_name,
                    "units_sold": row.units_sold,
                    "revenue": row.revenue,
                    "avg_price": row.avg_price(),
                    "return_rate": row.return_rate,
                    "percentage_return_rate": row.percentage_return_rate(),
                    "is_top": top == Some(row.product_id.as_str()),
                })
            })
            .collect();

        Ok(json!({
            "rows": rows,
            "top_performing_product_id": top,
        }))
    }
}

// ============================================================================
// Report definition
// ============================================================================

#[derive(Debug, Clone)]
pub struct SalesReport {
    title: String,
    company: String,
    period: DateRange,
    target: Decimal,
    summary: SalesSummary,
    products: ProductPerformance,
}

impl SalesReport {
    pub fn new(summary: SalesSummary, products: ProductPerformance) -> Self {
        Self {
            title: "Sales Performance".to_string(),
            company: "Report Press".to_string(),
            period: DateRange::new(PERIOD_START, PERIOD_END),
            target: Decimal::new(1_500_000, 0),
            summary,
            products,
        }
    }

    /// Q2 2025 figures.
    pub fn sample() -> Self {
        let summary = SalesSummary::new(vec![
            SalesSummaryItem::new("April", Decimal::new(450_000, 0), Decimal::new(12_000, 0), 45),
            SalesSummaryItem::new("May", Decimal::new(520_000, 0), Decimal::new(8_500, 0), 52),
            SalesSummaryItem::new("June", Decimal::new(500_000, 0), Decimal::new(9_500, 0), 63),
        ]);
        let products = ProductPerformance::new(vec![
            ProductPerformanceItem::new("P1001", "Widget Pro", 1250, Decimal::new(312_500, 0), Decimal::new(2, 2)),
            ProductPerformanceItem::new("P1002", "Gadget Lite", 980, Decimal::new(196_000, 0), Decimal::new(15, 3)),
            ProductPerformanceItem::new("P1003", "Super Tool", 750, Decimal::new(375_000, 0), Decimal::new(8, 3)),
            ProductPerformanceItem::new("P1004", "Basic Kit", 1560, Decimal::new(234_000, 0), Decimal::new(12, 3)),
        ]);

        Self::new(summary, products)
            .with_title("Q2 2025 Sales Performance")
            .with_company("Nova Reporting")
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_company(mut self, company: impl Into<String>) -> Self {
        self.company = company.into();
        self
    }

    pub fn with_period(mut self, period: DateRange) -> Self {
        self.period = period;
        self
    }

    pub fn with_target(mut self, target: Decimal) -> Self {
        self.target = target;
        self
    }

    /// Built-in templates compiled into the binary.
    pub fn html_provider() -> Result<HandlebarsProvider, HtmlError> {
        HandlebarsProvider::from_sources([
            (BODY_TEMPLATE, REPORT_TEMPLATE),
            (HEADER_TEMPLATE, HEADER_SOURCE),
            (FOOTER_TEMPLATE, FOOTER_SOURCE),
        ])
    }
}

#[async_trait]
impl ReportDefinition for SalesReport {
    fn name(&self) -> &str {
        NAME
    }

    async fn init(&self, ctx: &ReportContext, data: &mut ReportData) -> Result<(), ReportError> {
        let logo = ctx.assets().load(LOGO_PATH).await?;

        data.add_parameter("Logo", BASE64.encode(logo))?;
        data.add_parameter("ReportTitle", self.title.as_str())?;
        data.add_parameter("CompanyName", self.company.as_str())?;
        data.add_parameter("DateRange", self.period)?;
        data.add_parameter("SalesTarget", self.target)?;

        data.add_dataset(self.summary.clone())?;
        data.add_dataset(self.products.clone())?;
        Ok(())
    }

    fn validate(&self, data: &ReportData) -> Outcome {
        let mut errors = Vec::new();

        match data.parameter::<Decimal>("SalesTarget") {
            Ok(target) if target <= Decimal::ZERO => errors.push(ValidationError::for_property(
                "SalesTarget",
                "The sales target must be greater than zero",
            )),
            Ok(_) => {}
            Err(e) => return Outcome::fail(e.to_string()),
        }

        match data.dataset::<SalesSummary>() {
            Ok(summary) if summary.rows.is_empty() => errors.push(ValidationError::for_property(
                SalesSummary::KIND,
                "The sales summary has no rows",
            )),
            Ok(_) => {}
            Err(e) => return Outcome::fail(e.to_string()),
        }

        if errors.is_empty() {
            Outcome::ok()
        } else {
            Outcome::validation_failed(errors)
        }
    }

    fn derived_context(&self, data: &ReportData) -> Result<Map<String, Value>, RegistryError> {
        let target: Decimal = data.parameter("SalesTarget")?;
        let summary = data.dataset::<SalesSummary>()?;
        let total = summary.sum_total_sales();

        let mut derived = Map::new();
        derived.insert("under_target".into(), Value::Bool(total < target));
        derived.insert(
            "target_gap".into(),
            json!((target - total).max(Decimal::ZERO)),
        );
        Ok(derived)
    }
}
