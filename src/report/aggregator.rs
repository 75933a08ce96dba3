use anyhow::{Context, Result, bail};
use ndarray::Array2;
use polars::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use crate::models::SalesTable;
use crate::report::summary::{GroupedSummary, MatrixSummary, MeasureSeries, PointSet, Summary};
use crate::report::views::{Aggregation, Measure, Reducer, SortPolicy, ViewSpec};

/// Computes the summary table behind each view. Never mutates the table.
pub struct Aggregator;

impl Aggregator {
    pub fn summarize(&self, table: &SalesTable, view: &ViewSpec) -> Result<Summary> {
        let df = table.frame();
        let summary = match &view.aggregation {
            Aggregation::GroupBy {
                key,
                measures,
                sort,
            } => Summary::Grouped(self.group_by(df, key, measures, *sort)?),
            Aggregation::Rows { x, y } => Summary::Points(self.row_pairs(df, x, y)?),
            Aggregation::CrossTab { rows, columns } => {
                Summary::Matrix(self.cross_tab(df, rows, columns)?)
            }
            Aggregation::Correlation => Summary::Matrix(self.correlation(df)?),
        };

        debug!(
            "View '{}' summarized into {} {} entries",
            view.name,
            summary.size(),
            summary.kind()
        );
        Ok(summary)
    }

    /// Null keys are dropped; sums and means skip nulls.
    pub fn group_by(
        &self,
        df: &DataFrame,
        key: &str,
        measures: &[Measure],
        sort: SortPolicy,
    ) -> Result<GroupedSummary> {
        require_column(df, key)?;
        for measure in measures {
            require_column(df, measure.column)?;
        }

        let aggregations: Vec<Expr> = measures
            .iter()
            .map(|m| match m.reducer {
                Reducer::Sum => col(m.column).sum(),
                Reducer::Mean => col(m.column).mean(),
            })
            .collect();

        let grouped = df
            .clone()
            .lazy()
            .filter(col(key).is_not_null())
            .group_by([col(key)])
            .agg(aggregations)
            .collect()?;

        let sorted = match sort {
            SortPolicy::ByKey => grouped.sort([key], SortMultipleOptions::default())?,
            SortPolicy::Descending(by) => {
                if !measures.iter().any(|m| m.column == by) {
                    bail!("Cannot sort by '{}': it is not a measure of this view", by);
                }
                grouped.sort(
                    [by, key],
                    SortMultipleOptions::default()
                        .with_order_descending_multi([true, false])
                        .with_nulls_last(true),
                )?
            }
        };

        let labels_column = sorted.column(key)?.cast(&DataType::String)?;
        let labels: Vec<String> = labels_column
            .str()?
            .into_iter()
            .map(|label| label.unwrap_or_default().to_string())
            .collect();

        let mut series = Vec::with_capacity(measures.len());
        for measure in measures {
            let values = sorted.column(measure.column)?.cast(&DataType::Float64)?;
            series.push(MeasureSeries {
                name: measure.column.to_string(),
                values: values.f64()?.into_iter().collect(),
            });
        }

        Ok(GroupedSummary {
            key: key.to_string(),
            labels,
            measures: series,
        })
    }

    pub fn row_pairs(&self, df: &DataFrame, x: &str, y: &str) -> Result<PointSet> {
        let xs = numeric_values(df, x)?;
        let ys = numeric_values(df, y)?;

        let points = xs
            .into_iter()
            .zip(ys)
            .filter_map(|pair| match pair {
                (Some(x), Some(y)) => Some((x, y)),
                _ => None,
            })
            .collect();

        Ok(PointSet {
            x_name: x.to_string(),
            y_name: y.to_string(),
            points,
        })
    }

    /// Counts rows per `(rows, columns)` label pair. Rows missing either label are skipped.
    pub fn cross_tab(&self, df: &DataFrame, rows: &str, columns: &str) -> Result<MatrixSummary> {
        let row_values = string_values(df, rows)?;
        let column_values = string_values(df, columns)?;

        let mut counts: BTreeMap<(String, String), usize> = BTreeMap::new();
        let mut row_labels = BTreeSet::new();
        let mut column_labels = BTreeSet::new();

        for (r, c) in row_values.into_iter().zip(column_values) {
            if let (Some(r), Some(c)) = (r, c) {
                row_labels.insert(r.clone());
                column_labels.insert(c.clone());
                *counts.entry((r, c)).or_insert(0) += 1;
            }
        }

        let row_labels: Vec<String> = row_labels.into_iter().collect();
        let column_labels: Vec<String> = column_labels.into_iter().collect();

        let values = Array2::from_shape_fn((row_labels.len(), column_labels.len()), |(i, j)| {
            let count = counts
                .get(&(row_labels[i].clone(), column_labels[j].clone()))
                .copied()
                .unwrap_or(0);
            Some(count as f64)
        });

        Ok(MatrixSummary {
            row_labels,
            column_labels,
            values,
        })
    }

    /// Pairwise-complete Pearson correlation over every numeric column.
    pub fn correlation(&self, df: &DataFrame) -> Result<MatrixSummary> {
        let mut labels = Vec::new();
        let mut columns = Vec::new();

        for column in df.get_columns() {
            if is_numeric(column.dtype()) {
                labels.push(column.name().to_string());
                columns.push(numeric_values(df, column.name())?);
            }
        }

        let n = columns.len();
        let mut values = Array2::from_elem((n, n), None);
        for i in 0..n {
            // Self-correlation is exactly one wherever it is defined at all
            values[[i, i]] = pearson(&columns[i], &columns[i]).map(|_| 1.0);
            for j in (i + 1)..n {
                let r = pearson(&columns[i], &columns[j]);
                values[[i, j]] = r;
                values[[j, i]] = r;
            }
        }

        Ok(MatrixSummary {
            row_labels: labels.clone(),
            column_labels: labels,
            values,
        })
    }
}

fn require_column(df: &DataFrame, name: &str) -> Result<()> {
    df.column(name)
        .with_context(|| format!("Required column '{}' is missing", name))?;
    Ok(())
}

fn is_numeric(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Float64
            | DataType::Float32
            | DataType::Int64
            | DataType::Int32
            | DataType::Int16
            | DataType::Int8
            | DataType::UInt64
            | DataType::UInt32
            | DataType::UInt16
            | DataType::UInt8
    )
}

fn numeric_values(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let column = df
        .column(name)
        .with_context(|| format!("Required column '{}' is missing", name))?
        .cast(&DataType::Float64)?;
    Ok(column.f64()?.into_iter().collect())
}

fn string_values(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let column = df
        .column(name)
        .with_context(|| format!("Required column '{}' is missing", name))?
        .cast(&DataType::String)?;
    Ok(column
        .str()?
        .into_iter()
        .map(|v| v.map(|s| s.to_string()))
        .collect())
}

/// `None` when fewer than two complete pairs exist or either side is constant.
fn pearson(xs: &[Option<f64>], ys: &[Option<f64>]) -> Option<f64> {
    let pairs: Vec<(f64, f64)> = xs
        .iter()
        .zip(ys)
        .filter_map(|pair| match pair {
            (Some(x), Some(y)) => Some((*x, *y)),
            _ => None,
        })
        .collect();

    if pairs.len() < 2 {
        return None;
    }

    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|(_, y)| y).sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (x, y) in &pairs {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    if var_x == 0.0 || var_y == 0.0 {
        return None;
    }

    Some((cov / (var_x * var_y).sqrt()).clamp(-1.0, 1.0))
}
