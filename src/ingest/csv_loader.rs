use anyhow::{Context, Result, bail};
use polars::prelude::*;
use std::path::Path;
use tracing::info;

/// Reads a delimited file with a header row into a DataFrame.
///
/// Column types are inferred over the whole file, so a numeric-looking column
/// with a stray `$1,234` further down stays text and is handled by coercion
/// instead of failing the read.
pub fn load_sales_table(path: impl AsRef<Path>) -> Result<DataFrame> {
    let path = path.as_ref();

    if !path.exists() {
        bail!("Input file not found: {}", path.display());
    }

    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(None)
        .try_into_reader_with_file_path(Some(path.to_path_buf()))
        .with_context(|| format!("Failed to open input file: {}", path.display()))?
        .finish()
        .with_context(|| format!("Failed to parse delimited data from {}", path.display()))?;

    info!(
        "Loaded {} rows x {} columns from {}",
        df.height(),
        df.width(),
        path.display()
    );

    Ok(df)
}
