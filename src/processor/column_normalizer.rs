use anyhow::{Result, bail};
use polars::prelude::*;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

use crate::models::UNITS;

/// Canonical spellings of the columns the sales file is expected to carry.
const CANONICAL_COLUMNS: [&str; 16] = [
    "Segment",
    "Country",
    "Product",
    "Discount_Band",
    "Units_Sold",
    "Manufacturing_Price",
    "Sale_Price",
    "Gross_Sales",
    "Discounts",
    "Sales",
    "COGS",
    "Profit",
    "Date",
    "Month_Number",
    "Month_Name",
    "Year",
];

/// Turns raw header text into stable, machine-safe column identifiers.
pub struct ColumnNormalizer {
    canonical: HashMap<String, String>,
    aliases: HashMap<String, String>,
}

impl ColumnNormalizer {
    pub fn new() -> Self {
        let canonical = CANONICAL_COLUMNS
            .iter()
            .map(|name| (Self::match_key(name), name.to_string()))
            .collect();

        let mut aliases = HashMap::new();
        aliases.insert("Units_Sold".to_string(), UNITS.to_string());

        ColumnNormalizer { canonical, aliases }
    }

    /// Trims the name and replaces each run of inner whitespace with one underscore.
    pub fn clean_identifier(name: &str) -> String {
        name.split_whitespace().collect::<Vec<_>>().join("_")
    }

    fn match_key(name: &str) -> String {
        name.to_lowercase().replace(['_', '-', ' '], "")
    }

    /// Full mapping of one raw header to its final identifier.
    pub fn normalize_name(&self, raw: &str) -> String {
        let cleaned = Self::clean_identifier(raw);

        let canonical = self
            .canonical
            .get(&Self::match_key(&cleaned))
            .cloned()
            .unwrap_or(cleaned);

        self.aliases.get(&canonical).cloned().unwrap_or(canonical)
    }

    /// Renames every column in place and returns the `(old, new)` pairs applied.
    pub fn normalize_columns(&self, df: &mut DataFrame) -> Result<Vec<(String, String)>> {
        let column_names: Vec<String> = df
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect();

        let targets: Vec<String> = column_names
            .iter()
            .map(|name| self.normalize_name(name))
            .collect();

        let mut seen = HashSet::new();
        for (raw, target) in column_names.iter().zip(&targets) {
            if !seen.insert(target.as_str()) {
                bail!(
                    "Column '{}' normalizes to '{}', which is already taken",
                    raw,
                    target
                );
            }
        }

        // Park changed columns under unique temporary names first so that
        // swaps like `a -> b, b -> a` cannot collide half way through.
        let changed: Vec<(String, String)> = column_names
            .into_iter()
            .zip(targets)
            .filter(|(raw, target)| raw != target)
            .collect();

        for (index, (raw, _)) in changed.iter().enumerate() {
            df.rename(raw, format!("__normalizing_{index}").into())?;
        }
        for (index, (raw, target)) in changed.iter().enumerate() {
            df.rename(&format!("__normalizing_{index}"), target.as_str().into())?;
            debug!("Renamed column '{}' -> '{}'", raw, target);
        }

        info!("Normalized {} column names", changed.len());
        Ok(changed)
    }
}

impl Default for ColumnNormalizer {
    fn default() -> Self {
        Self::new()
    }
}
