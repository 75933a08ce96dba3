use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const DEFAULT_CONFIG_PATH: &str = "configs/pipeline.toml";

const ENV_INPUT_PATH: &str = "SALES_INPUT_PATH";
const ENV_OUTPUT_DIR: &str = "SALES_OUTPUT_DIR";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PipelineConfig {
    pub input: InputSection,
    pub output: OutputSection,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InputSection {
    /// Delimited sales file with a header row
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutputSection {
    /// Directory receiving the chart images, created if absent
    pub dir: PathBuf,
    /// Optional Parquet export of the cleaned table
    #[serde(default)]
    pub cleaned_parquet: Option<PathBuf>,
}

impl PipelineConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read pipeline config file: {}", path.display()))?;

        let config: PipelineConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse pipeline config file: {}", path.display()))?;

        Ok(config)
    }

    /// Reads the config file when present, otherwise starts from defaults,
    /// then applies environment overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let config = Self::from_file(path)?;
            info!("Loaded pipeline configuration from {}", path.display());
            config
        } else {
            warn!(
                "Config file {} not found, using defaults",
                path.display()
            );
            Self::default()
        };

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) {
        if let Ok(input) = env::var(ENV_INPUT_PATH) {
            info!("Input path overridden by {}: {}", ENV_INPUT_PATH, input);
            self.input.path = PathBuf::from(input);
        }

        if let Ok(dir) = env::var(ENV_OUTPUT_DIR) {
            info!("Output directory overridden by {}: {}", ENV_OUTPUT_DIR, dir);
            self.output.dir = PathBuf::from(dir);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.input.path.as_os_str().is_empty() {
            return Err(anyhow::anyhow!("Input path cannot be empty"));
        }

        if self.output.dir.as_os_str().is_empty() {
            return Err(anyhow::anyhow!("Output directory cannot be empty"));
        }

        if let Some(parquet) = &self.output.cleaned_parquet {
            if parquet.as_os_str().is_empty() {
                return Err(anyhow::anyhow!("Cleaned parquet path cannot be empty when set"));
            }
        }

        Ok(())
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input: InputSection {
                path: PathBuf::from("Financial_data.csv"),
            },
            output: OutputSection {
                dir: PathBuf::from("images"),
                cleaned_parquet: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.input.path, PathBuf::from("Financial_data.csv"));
        assert_eq!(config.output.dir, PathBuf::from("images"));
        assert!(config.output.cleaned_parquet.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[input]
path = "data/Financial_data.csv"

[output]
dir = "charts"
cleaned_parquet = "data/cleaned.parquet"
"#
        )
        .unwrap();

        let config = PipelineConfig::from_file(file.path()).unwrap();
        assert_eq!(config.input.path, PathBuf::from("data/Financial_data.csv"));
        assert_eq!(config.output.dir, PathBuf::from("charts"));
        assert_eq!(
            config.output.cleaned_parquet,
            Some(PathBuf::from("data/cleaned.parquet"))
        );
    }

    #[test]
    fn test_parquet_export_is_optional() {
        let config: PipelineConfig = toml::from_str(
            r#"
[input]
path = "sales.csv"

[output]
dir = "out"
"#,
        )
        .unwrap();
        assert!(config.output.cleaned_parquet.is_none());
    }

    #[test]
    fn test_empty_paths_rejected() {
        let mut config = PipelineConfig::default();
        config.input.path = PathBuf::new();
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.output.dir = PathBuf::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_malformed_config_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[input\npath = ").unwrap();
        assert!(PipelineConfig::from_file(file.path()).is_err());
    }

    #[test]
    fn test_env_overrides() {
        unsafe {
            env::set_var(ENV_INPUT_PATH, "override.csv");
            env::set_var(ENV_OUTPUT_DIR, "override_images");
        }

        let mut config = PipelineConfig::default();
        config.apply_env_overrides();
        assert_eq!(config.input.path, PathBuf::from("override.csv"));
        assert_eq!(config.output.dir, PathBuf::from("override_images"));

        // Clean up
        unsafe {
            env::remove_var(ENV_INPUT_PATH);
            env::remove_var(ENV_OUTPUT_DIR);
        }
    }
}
