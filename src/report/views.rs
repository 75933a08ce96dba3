use plotters::style::RGBColor;

use crate::models::{
    COUNTRY, DATE, DISCOUNTS, MANUFACTURING_PRICE, PRODUCT, PROFIT, SALE_PRICE, SALES, SEGMENT,
    YEAR_MONTH,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reducer {
    Sum,
    Mean,
}

/// One numeric column reduced per group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Measure {
    pub column: &'static str,
    pub reducer: Reducer,
}

impl Measure {
    pub const fn sum(column: &'static str) -> Self {
        Self {
            column,
            reducer: Reducer::Sum,
        }
    }

    pub const fn mean(column: &'static str) -> Self {
        Self {
            column,
            reducer: Reducer::Mean,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortPolicy {
    /// Ascending by grouping key
    ByKey,
    /// Descending by a reduced measure, ties ascending by key
    Descending(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Aggregation {
    GroupBy {
        key: &'static str,
        measures: Vec<Measure>,
        sort: SortPolicy,
    },
    /// Raw per-row pairs, rows missing either value are skipped
    Rows { x: &'static str, y: &'static str },
    /// Row counts for every `rows` x `columns` combination
    CrossTab {
        rows: &'static str,
        columns: &'static str,
    },
    /// Pearson correlation over every numeric column
    Correlation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Palette {
    Diverging,
    Sequential,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartShape {
    /// One line per measure over the ordered groups
    Lines,
    /// One bar panel per measure, stacked vertically
    Bars,
    /// Points from two columns; `label_points` writes the group key next to each point
    Scatter { label_points: bool },
    /// Annotated matrix
    Heatmap { palette: Palette },
}

/// A single report: what to aggregate and how to draw it.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewSpec {
    pub name: &'static str,
    pub file_name: &'static str,
    /// One title per panel; single-panel charts use the first.
    pub titles: Vec<&'static str>,
    pub x_desc: &'static str,
    pub y_desc: &'static str,
    pub aggregation: Aggregation,
    pub chart: ChartShape,
    pub colors: Vec<RGBColor>,
}

const BLUE: RGBColor = RGBColor(31, 119, 180);
const ORANGE: RGBColor = RGBColor(255, 127, 14);
const GREEN: RGBColor = RGBColor(44, 160, 44);
const SKY_BLUE: RGBColor = RGBColor(135, 206, 235);

/// The fixed set of reports produced by every run, in rendering order.
pub fn report_catalog() -> Vec<ViewSpec> {
    vec![
        ViewSpec {
            name: "time_trend",
            file_name: "sales_trend.png",
            titles: vec!["Sales and Profit over Time"],
            x_desc: "Date",
            y_desc: "Amount",
            aggregation: Aggregation::GroupBy {
                key: DATE,
                measures: vec![Measure::sum(SALES), Measure::sum(PROFIT)],
                sort: SortPolicy::ByKey,
            },
            chart: ChartShape::Lines,
            colors: vec![BLUE, ORANGE],
        },
        ViewSpec {
            name: "segment",
            file_name: "sales_profit_by_segment.png",
            titles: vec!["Sales by Business Segment", "Profit by Business Segment"],
            x_desc: "Segment",
            y_desc: "Amount",
            aggregation: Aggregation::GroupBy {
                key: SEGMENT,
                measures: vec![Measure::sum(SALES), Measure::sum(PROFIT)],
                sort: SortPolicy::ByKey,
            },
            chart: ChartShape::Bars,
            colors: vec![BLUE, GREEN],
        },
        ViewSpec {
            name: "country",
            file_name: "sales_profit_by_country.png",
            titles: vec!["Sales by Country", "Profit by Country"],
            x_desc: "Country",
            y_desc: "Amount",
            aggregation: Aggregation::GroupBy {
                key: COUNTRY,
                measures: vec![Measure::sum(SALES), Measure::sum(PROFIT)],
                sort: SortPolicy::Descending(SALES),
            },
            chart: ChartShape::Bars,
            colors: vec![GREEN, BLUE],
        },
        ViewSpec {
            name: "discount_vs_profit",
            file_name: "discounts_vs_profit.png",
            titles: vec!["Discounts vs Profit"],
            x_desc: "Discounts",
            y_desc: "Profit",
            aggregation: Aggregation::Rows {
                x: DISCOUNTS,
                y: PROFIT,
            },
            chart: ChartShape::Scatter {
                label_points: false,
            },
            colors: vec![BLUE],
        },
        ViewSpec {
            name: "correlation",
            file_name: "correlation_heatmap.png",
            titles: vec!["Correlation Heatmap"],
            x_desc: "",
            y_desc: "",
            aggregation: Aggregation::Correlation,
            chart: ChartShape::Heatmap {
                palette: Palette::Diverging,
            },
            colors: vec![],
        },
        ViewSpec {
            name: "monthly_trend",
            file_name: "monthly_sales_profit.png",
            titles: vec!["Monthly Sales and Profit"],
            x_desc: "Year-Month",
            y_desc: "Amount",
            aggregation: Aggregation::GroupBy {
                key: YEAR_MONTH,
                measures: vec![Measure::sum(SALES), Measure::sum(PROFIT)],
                sort: SortPolicy::ByKey,
            },
            chart: ChartShape::Lines,
            colors: vec![BLUE, ORANGE],
        },
        ViewSpec {
            name: "product_distribution",
            file_name: "product_distribution.png",
            titles: vec!["Product Distribution across Market Segments"],
            x_desc: "Segment",
            y_desc: "Product",
            aggregation: Aggregation::CrossTab {
                rows: PRODUCT,
                columns: SEGMENT,
            },
            chart: ChartShape::Heatmap {
                palette: Palette::Sequential,
            },
            colors: vec![],
        },
        ViewSpec {
            name: "price_relationship",
            file_name: "manufacturing_vs_sale_price.png",
            titles: vec!["Manufacturing Price vs Sale Price by Product"],
            x_desc: "Average Manufacturing Price",
            y_desc: "Average Sale Price",
            aggregation: Aggregation::GroupBy {
                key: PRODUCT,
                measures: vec![Measure::mean(MANUFACTURING_PRICE), Measure::mean(SALE_PRICE)],
                sort: SortPolicy::ByKey,
            },
            chart: ChartShape::Scatter { label_points: true },
            colors: vec![BLUE],
        },
        ViewSpec {
            name: "avg_profit_by_segment",
            file_name: "avg_profit_by_segment.png",
            titles: vec!["Average Profit by Segment"],
            x_desc: "Segment",
            y_desc: "Average Profit",
            aggregation: Aggregation::GroupBy {
                key: SEGMENT,
                measures: vec![Measure::mean(PROFIT)],
                sort: SortPolicy::Descending(PROFIT),
            },
            chart: ChartShape::Bars,
            colors: vec![SKY_BLUE],
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_catalog_has_nine_distinct_artifacts() {
        let catalog = report_catalog();
        assert_eq!(catalog.len(), 9);

        let files: HashSet<&str> = catalog.iter().map(|v| v.file_name).collect();
        assert_eq!(files.len(), 9);
        assert!(files.iter().all(|f| f.ends_with(".png")));

        let names: HashSet<&str> = catalog.iter().map(|v| v.name).collect();
        assert_eq!(names.len(), 9);
    }

    #[test]
    fn test_bar_views_have_a_title_and_color_per_panel() {
        for view in report_catalog() {
            if let (ChartShape::Bars, Aggregation::GroupBy { measures, .. }) =
                (view.chart, &view.aggregation)
            {
                assert_eq!(view.titles.len(), measures.len(), "{}", view.name);
                assert!(view.colors.len() >= measures.len(), "{}", view.name);
            }
        }
    }

    #[test]
    fn test_labeled_scatter_reduces_two_measures() {
        let view = report_catalog()
            .into_iter()
            .find(|v| v.name == "price_relationship")
            .unwrap();
        match view.aggregation {
            Aggregation::GroupBy { key, measures, .. } => {
                assert_eq!(key, PRODUCT);
                assert_eq!(
                    measures,
                    vec![Measure::mean(MANUFACTURING_PRICE), Measure::mean(SALE_PRICE)]
                );
            }
            other => panic!("unexpected aggregation {other:?}"),
        }
    }
}
