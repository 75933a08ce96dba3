use anyhow::{Context, Result};
use polars::prelude::*;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::report::ViewSpec;

/// Owns the output directory and every artifact written into it.
pub struct OutputStore {
    dir: PathBuf,
}

impl OutputStore {
    /// Creates the directory (and parents) when absent.
    pub fn create(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create output directory: {}", dir.display()))?;

        info!("Writing charts to {}", dir.display());
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn artifact_path(&self, view: &ViewSpec) -> PathBuf {
        self.dir.join(view.file_name)
    }
}

/// Writes the cleaned table as Parquet.
pub fn export_parquet(df: &DataFrame, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    let file = File::create(path)
        .with_context(|| format!("Failed to create Parquet file: {}", path.display()))?;
    let mut df = df.clone();
    ParquetWriter::new(file)
        .finish(&mut df)
        .with_context(|| format!("Failed to write Parquet file: {}", path.display()))?;

    info!("Stored cleaned table ({} rows) at {}", df.height(), path.display());
    Ok(())
}
