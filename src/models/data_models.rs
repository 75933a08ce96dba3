use polars::prelude::*;
use serde::{Deserialize, Serialize};

pub const SEGMENT: &str = "Segment";
pub const COUNTRY: &str = "Country";
pub const PRODUCT: &str = "Product";
pub const DATE: &str = "Date";
pub const YEAR_MONTH: &str = "Year_Month";

pub const UNITS: &str = "Un";
pub const MANUFACTURING_PRICE: &str = "Manufacturing_Price";
pub const SALE_PRICE: &str = "Sale_Price";
pub const GROSS_SALES: &str = "Gross_Sales";
pub const DISCOUNTS: &str = "Discounts";
pub const SALES: &str = "Sales";
pub const COGS: &str = "COGS";
pub const PROFIT: &str = "Profit";

/// Columns holding numbers written as text, in coercion order.
pub const NUMERIC_COLUMNS: [&str; 8] = [
    UNITS,
    MANUFACTURING_PRICE,
    SALE_PRICE,
    GROSS_SALES,
    DISCOUNTS,
    SALES,
    COGS,
    PROFIT,
];

/// Counters collected while cleaning the table. Purely diagnostic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizationReport {
    pub rows: usize,
    /// Values per column that failed numeric coercion
    pub coercion_failures: Vec<(String, usize)>,
    pub negative_values: usize,
    pub discounts_filled: usize,
    pub unparsed_dates: usize,
}

impl NormalizationReport {
    pub fn total_coercion_failures(&self) -> usize {
        self.coercion_failures.iter().map(|(_, n)| n).sum()
    }
}

/// The cleaned record table. Read-only once normalization has finished.
#[derive(Debug, Clone)]
pub struct SalesTable {
    df: DataFrame,
    report: NormalizationReport,
}

impl SalesTable {
    pub fn new(df: DataFrame, report: NormalizationReport) -> Self {
        Self { df, report }
    }

    pub fn frame(&self) -> &DataFrame {
        &self.df
    }

    pub fn report(&self) -> &NormalizationReport {
        &self.report
    }

    pub fn height(&self) -> usize {
        self.df.height()
    }
}
