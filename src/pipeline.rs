use anyhow::{Context, Result};
use polars::prelude::*;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::config::PipelineConfig;
use crate::ingest::load_sales_table;
use crate::models::SalesTable;
use crate::processor::{ColumnNormalizer, RuleNormalizer};
use crate::report::{Aggregator, ChartRenderer, Summary, ViewSpec, report_catalog};
use crate::storage::{OutputStore, export_parquet};

/// Result of one complete run.
#[derive(Debug)]
pub struct RunSummary {
    pub rows: usize,
    pub artifacts: Vec<PathBuf>,
}

/// Runs ingestion, cleaning and reporting once, in order.
pub struct SalesPipeline {
    config: PipelineConfig,
    columns: ColumnNormalizer,
    rules: RuleNormalizer,
    aggregator: Aggregator,
    renderer: ChartRenderer,
}

impl SalesPipeline {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        Ok(Self {
            config,
            columns: ColumnNormalizer::new(),
            rules: RuleNormalizer::new()?,
            aggregator: Aggregator,
            renderer: ChartRenderer,
        })
    }

    pub fn run(&self) -> Result<RunSummary> {
        let table = self.load_and_clean(&self.config.input.path)?;

        if let Some(path) = &self.config.output.cleaned_parquet {
            export_parquet(table.frame(), path)?;
        }

        let store = OutputStore::create(&self.config.output.dir)?;
        let mut artifacts = Vec::new();

        for (view, summary) in self.summarize_all(&table)? {
            let path = store.artifact_path(&view);
            self.renderer
                .render(&view, &summary, &path)
                .with_context(|| format!("Failed to render view '{}'", view.name))?;
            artifacts.push(path);
        }

        info!(
            "Pipeline finished: {} rows, {} charts in {}",
            table.height(),
            artifacts.len(),
            store.dir().display()
        );

        Ok(RunSummary {
            rows: table.height(),
            artifacts,
        })
    }

    /// Loads the input and applies every normalization step.
    pub fn load_and_clean(&self, path: &Path) -> Result<SalesTable> {
        let df = load_sales_table(path)?;
        self.clean(df)
    }

    pub fn clean(&self, mut df: DataFrame) -> Result<SalesTable> {
        let renames = self.columns.normalize_columns(&mut df)?;
        for (old, new) in &renames {
            info!("Column '{}' -> '{}'", old, new);
        }

        let report = self.rules.normalize_dataframe(&mut df)?;
        info!(
            "Cleaned {} rows: {} coercion failures, {} negative values, {} discounts filled, {} unparsed dates",
            report.rows,
            report.total_coercion_failures(),
            report.negative_values,
            report.discounts_filled,
            report.unparsed_dates
        );

        Ok(SalesTable::new(df, report))
    }

    /// Every view's summary, in catalog order. The table is only read.
    pub fn summarize_all(&self, table: &SalesTable) -> Result<Vec<(ViewSpec, Summary)>> {
        report_catalog()
            .into_iter()
            .map(|view| {
                let summary = self
                    .aggregator
                    .summarize(table, &view)
                    .with_context(|| format!("Failed to summarize view '{}'", view.name))?;
                Ok((view, summary))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{InputSection, OutputSection};
    use crate::models::{COUNTRY, SALES};
    use crate::report::GroupedSummary;
    use std::io::Write;

    const SAMPLE: &str = "\
Segment,Country, Product ,Discount Band, Units Sold , Manufacturing Price , Sale Price , Gross Sales , Discounts , Sales , COGS , Profit ,Date,Month Number,Month Name,Year
Government,Canada, Carretera ,None,\" $1,618.50 \", $3.00 , $20.00 ,\" $32,370.00 \", $-   ,\" $32,370.00 \",\" $16,185.00 \",\" $16,185.00 \",1/1/2014,1,January,2014
Government,Germany, Carretera ,None,\" $1,321.00 \", $3.00 , $20.00 ,\" $26,420.00 \", $-   ,\" $26,420.00 \",\" $13,210.00 \",\" $13,210.00 \",1/1/2014,1,January,2014
Midmarket,France, Carretera ,None,\" $2,178.00 \", $3.00 , $15.00 ,\" $32,670.00 \", $-   ,\" $32,670.00 \",\" $21,780.00 \",\" $10,890.00 \",6/1/2014,6,June,2014
Midmarket,Germany, Montana ,Low, $888.00 , $5.00 , $15.00 ,\" $13,320.00 \", $133.20 ,\" $13,186.80 \",\" $8,880.00 \",\" $4,306.80 \",6/1/2014,6,June,2014
Enterprise,Canada, Montana ,Low, $345.00 , $5.00 , $125.00 ,\" $43,125.00 \", $431.25 ,\" $42,693.75 \",\" $41,400.00 \",\" $1,293.75 \",10/1/2013,10,October,2013
Enterprise,France, Paseo ,High,\" $2,470.00 \", $10.00 , $125.00 ,\" $308,750.00 \",\" $37,050.00 \",\" $271,700.00 \",\" $296,400.00 \",\" $(24,700.00)\",13/45/2014,7,July,2014
";

    fn write_sample() -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        file
    }

    fn pipeline_for(input: &Path, output: &Path) -> SalesPipeline {
        SalesPipeline::new(PipelineConfig {
            input: InputSection {
                path: input.to_path_buf(),
            },
            output: OutputSection {
                dir: output.to_path_buf(),
                cleaned_parquet: None,
            },
        })
        .unwrap()
    }

    #[test]
    fn test_sample_file_is_cleaned() {
        let input = write_sample();
        let out = tempfile::tempdir().unwrap();
        let pipeline = pipeline_for(input.path(), out.path());

        let table = pipeline.load_and_clean(input.path()).unwrap();
        let df = table.frame();
        assert_eq!(table.height(), 6);

        for name in ["Un", "Manufacturing_Price", "Gross_Sales", "Month_Number", "Year_Month"] {
            assert!(df.column(name).is_ok(), "missing column {name}");
        }
        assert!(df.column("Units_Sold").is_err());

        let units: Vec<Option<f64>> = df.column("Un").unwrap().f64().unwrap().into_iter().collect();
        assert_eq!(units[0], Some(1618.5));

        assert_eq!(df.column("Discounts").unwrap().null_count(), 0);
        assert_eq!(table.report().unparsed_dates, 1);
        // "$(24,700.00)" stays missing rather than failing the run
        assert_eq!(df.column("Profit").unwrap().null_count(), 1);
    }

    #[test]
    fn test_summaries_from_sample() {
        let input = write_sample();
        let out = tempfile::tempdir().unwrap();
        let pipeline = pipeline_for(input.path(), out.path());

        let table = pipeline.load_and_clean(input.path()).unwrap();
        let summaries = pipeline.summarize_all(&table).unwrap();
        assert_eq!(summaries.len(), 9);

        let country: &GroupedSummary = summaries
            .iter()
            .find_map(|(view, summary)| match summary {
                Summary::Grouped(g) if view.name == "country" => Some(g),
                _ => None,
            })
            .unwrap();
        assert_eq!(country.key, COUNTRY);
        assert_eq!(country.labels[0], "France");
        let sales: Vec<f64> = country
            .measure(SALES)
            .unwrap()
            .values
            .iter()
            .map(|v| v.unwrap_or(0.0))
            .collect();
        assert!(sales.windows(2).all(|w| w[0] >= w[1]));

        let monthly = summaries
            .iter()
            .find_map(|(view, summary)| match summary {
                Summary::Grouped(g) if view.name == "monthly_trend" => Some(g),
                _ => None,
            })
            .unwrap();
        assert_eq!(monthly.labels, vec!["2013-10", "2014-01", "2014-06"]);

        // Running the aggregation again yields identical summaries
        let again = pipeline.summarize_all(&table).unwrap();
        assert_eq!(summaries, again);
    }

    #[test]
    fn test_every_view_maps_to_one_drawable_artifact() {
        let input = write_sample();
        let out = tempfile::tempdir().unwrap();
        let pipeline = pipeline_for(input.path(), out.path());

        let table = pipeline.load_and_clean(input.path()).unwrap();
        let store = OutputStore::create(out.path()).unwrap();

        let mut paths = std::collections::BTreeSet::new();
        for (view, summary) in pipeline.summarize_all(&table).unwrap() {
            assert!(
                ChartRenderer::supports(view.chart, &summary),
                "view '{}' cannot draw its {} summary",
                view.name,
                summary.kind()
            );
            let path = store.artifact_path(&view);
            assert_eq!(path.parent(), Some(out.path()));
            paths.insert(path);
        }
        assert_eq!(paths.len(), 9);
    }

    #[test]
    fn test_missing_input_is_fatal() {
        let out = tempfile::tempdir().unwrap();
        let missing = out.path().join("nope.csv");
        let pipeline = pipeline_for(&missing, out.path());
        assert!(pipeline.run().is_err());
    }

    #[test]
    #[ignore] // Needs system fonts for chart text; run with --ignored
    fn test_full_run_writes_nine_charts() {
        let input = write_sample();
        let out = tempfile::tempdir().unwrap();
        let images = out.path().join("images");
        let pipeline = pipeline_for(input.path(), &images);

        let summary = pipeline.run().unwrap();
        assert_eq!(summary.rows, 6);
        assert_eq!(summary.artifacts.len(), 9);
        for path in &summary.artifacts {
            assert!(path.is_file(), "{} was not written", path.display());
        }
        assert_eq!(std::fs::read_dir(&images).unwrap().count(), 9);
    }
}
