use anyhow::{Context, Result};
use sales_report::config::{DEFAULT_CONFIG_PATH, PipelineConfig};
use sales_report::pipeline::SalesPipeline;
use std::env;
use tracing::info;

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    // Load environment variables
    dotenv::dotenv().ok();

    let config_path = env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

    info!("🚀 Starting sales report pipeline");

    let config = PipelineConfig::load(&config_path)
        .with_context(|| format!("Failed to load pipeline configuration from {}", config_path))?;

    info!(
        "Input: {} | Output: {}",
        config.input.path.display(),
        config.output.dir.display()
    );

    let pipeline = SalesPipeline::new(config).context("Failed to initialize pipeline")?;
    let summary = pipeline.run()?;

    info!(
        "🎉 Processed {} rows into {} charts",
        summary.rows,
        summary.artifacts.len()
    );

    Ok(())
}
