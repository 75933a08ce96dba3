use anyhow::{Context, Result, anyhow};
use chrono::{Datelike, NaiveDate};
use polars::prelude::*;
use regex::Regex;
use std::str::FromStr;
use tracing::{info, warn};

use crate::models::{DATE, DISCOUNTS, NUMERIC_COLUMNS, NormalizationReport, YEAR_MONTH};

/// Expected layout of the raw `Date` column.
pub const DATE_FORMAT: &str = "%m/%d/%Y";

/// Turns inconsistently formatted numeric text into numbers.
pub struct NumericCleaner {
    currency: Regex,
    whitespace: Regex,
}

impl NumericCleaner {
    pub fn new() -> Result<Self> {
        Ok(Self {
            currency: Regex::new(r"[\$,]")?,
            whitespace: Regex::new(r"\s+")?,
        })
    }

    /// Strips `$` and thousands separators, then all whitespace, and only then
    /// maps a lone `-` to zero, so `"- "` still resolves to `0`. Text spelling
    /// out NaN counts as missing.
    pub fn coerce(&self, raw: &str) -> Option<f64> {
        let stripped = self.currency.replace_all(raw, "");
        let compact = self.whitespace.replace_all(&stripped, "");
        let value: &str = if compact == "-" { "0" } else { &compact };
        f64::from_str(value).ok().filter(|v| !v.is_nan())
    }
}

/// `%Y` alone takes any number of digits, so the year is checked first.
pub fn parse_sale_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    let year = trimmed.rsplit('/').next()?;
    if year.len() != 4 || !year.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    NaiveDate::parse_from_str(trimmed, DATE_FORMAT).ok()
}

/// Monthly period key, `YYYY-MM`.
pub fn year_month_key(date: NaiveDate) -> String {
    format!("{:04}-{:02}", date.year(), date.month())
}

/// Cleans the value columns of the sales table in place.
pub struct RuleNormalizer {
    cleaner: NumericCleaner,
}

impl RuleNormalizer {
    pub fn new() -> Result<Self> {
        Ok(Self {
            cleaner: NumericCleaner::new()?,
        })
    }

    pub fn normalize_dataframe(&self, df: &mut DataFrame) -> Result<NormalizationReport> {
        let mut report = NormalizationReport {
            rows: df.height(),
            ..Default::default()
        };

        for col_name in NUMERIC_COLUMNS {
            let failures = self.coerce_numeric_column(df, col_name)?;
            if failures > 0 {
                warn!("{} value(s) in '{}' could not be coerced to a number", failures, col_name);
            }
            report.coercion_failures.push((col_name.to_string(), failures));
        }

        report.negative_values = self.count_negative_values(df)?;
        if report.negative_values > 0 {
            warn!(
                "Found {} negative value(s) across numeric columns (kept as-is)",
                report.negative_values
            );
        } else {
            info!("No negative values across numeric columns");
        }

        report.discounts_filled = self.fill_missing_discounts(df)?;

        report.unparsed_dates = self.normalize_date_column(df)?;
        if report.unparsed_dates > 0 {
            warn!(
                "{} date(s) did not match {} and will be left out of date-keyed views",
                report.unparsed_dates, DATE_FORMAT
            );
        }

        Ok(report)
    }

    /// Returns how many values ended up missing because they could not be parsed.
    fn coerce_numeric_column(&self, df: &mut DataFrame, col_name: &str) -> Result<usize> {
        let column = df
            .column(col_name)
            .with_context(|| format!("Required numeric column '{}' is missing", col_name))?
            .clone();

        let (normalized, failures) = match column.dtype() {
            DataType::String => {
                let mut failures = 0;
                let values: Vec<Option<f64>> = column
                    .str()?
                    .into_iter()
                    .map(|value| match value {
                        Some(text) => {
                            let parsed = self.cleaner.coerce(text);
                            if parsed.is_none() {
                                failures += 1;
                            }
                            parsed
                        }
                        None => None,
                    })
                    .collect();
                (Column::new(col_name.into(), values), failures)
            }
            _ => {
                let casted = column
                    .cast(&DataType::Float64)
                    .with_context(|| format!("Column '{}' cannot be read as numbers", col_name))?;
                (casted, 0)
            }
        };

        df.with_column(normalized)?;
        Ok(failures)
    }

    fn count_negative_values(&self, df: &DataFrame) -> Result<usize> {
        let mut negatives = 0;
        for col_name in NUMERIC_COLUMNS {
            negatives += df
                .column(col_name)?
                .f64()?
                .into_iter()
                .flatten()
                .filter(|v| *v < 0.0)
                .count();
        }
        Ok(negatives)
    }

    /// An unrecorded discount means no discount was applied.
    fn fill_missing_discounts(&self, df: &mut DataFrame) -> Result<usize> {
        let discounts = df.column(DISCOUNTS)?.f64()?.clone();
        let missing = discounts.null_count();
        info!("Missing discounts before fill: {}", missing);

        let filled: Vec<f64> = discounts.into_iter().map(|v| v.unwrap_or(0.0)).collect();
        df.with_column(Series::new(DISCOUNTS.into(), filled))?;

        info!(
            "Missing discounts after fill: {}",
            df.column(DISCOUNTS)?.null_count()
        );
        Ok(missing)
    }

    /// Replaces the raw `Date` text with calendar dates and appends the
    /// `Year_Month` key. Returns the number of values that failed to parse.
    fn normalize_date_column(&self, df: &mut DataFrame) -> Result<usize> {
        let column = df
            .column(DATE)
            .with_context(|| format!("Required column '{}' is missing", DATE))?
            .cast(&DataType::String)?;

        let epoch = NaiveDate::from_ymd_opt(1970, 1, 1)
            .ok_or_else(|| anyhow!("Invalid epoch date"))?;

        let mut unparsed = 0;
        let mut days = Vec::with_capacity(column.len());
        let mut periods = Vec::with_capacity(column.len());

        for raw in column.str()?.into_iter() {
            match raw.and_then(parse_sale_date) {
                Some(date) => {
                    days.push(Some((date - epoch).num_days() as i32));
                    periods.push(Some(year_month_key(date)));
                }
                None => {
                    unparsed += 1;
                    days.push(None);
                    periods.push(None);
                }
            }
        }

        let dates = Series::new(DATE.into(), days).cast(&DataType::Date)?;
        df.with_column(dates)?;
        df.with_column(Series::new(YEAR_MONTH.into(), periods))?;

        Ok(unparsed)
    }
}
