use anyhow::{Result, bail};
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use std::path::Path;
use tracing::info;

use crate::report::summary::{GroupedSummary, MatrixSummary, PointSet, Summary};
use crate::report::views::{ChartShape, Palette, ViewSpec};

const CHART_SIZE: (u32, u32) = (1600, 1200);
const PANEL_SIZE: (u32, u32) = (1600, 1400);
const HEATMAP_SIZE: (u32, u32) = (1600, 1600);

const FONT: &str = "sans-serif";
const FALLBACK_COLOR: RGBColor = RGBColor(31, 119, 180);
const UNDEFINED_CELL: RGBColor = RGBColor(230, 230, 230);

type Area<'a> = DrawingArea<BitMapBackend<'a>, Shift>;

/// Draws one summary as a PNG image.
pub struct ChartRenderer;

impl ChartRenderer {
    pub fn render(&self, view: &ViewSpec, summary: &Summary, path: &Path) -> Result<()> {
        if !Self::supports(view.chart, summary) {
            bail!(
                "View '{}' cannot draw a {} summary as {:?}",
                view.name,
                summary.kind(),
                view.chart
            );
        }

        let size = match view.chart {
            ChartShape::Bars if view.titles.len() > 1 => PANEL_SIZE,
            ChartShape::Heatmap { .. } => HEATMAP_SIZE,
            _ => CHART_SIZE,
        };

        let root = BitMapBackend::new(path, size).into_drawing_area();
        root.fill(&WHITE)?;

        if summary.size() == 0 {
            self.draw_empty(&root, view)?;
        } else {
            match (view.chart, summary) {
                (ChartShape::Lines, Summary::Grouped(grouped)) => {
                    self.draw_lines(&root, view, grouped)?
                }
                (ChartShape::Bars, Summary::Grouped(grouped)) => {
                    self.draw_bars(&root, view, grouped)?
                }
                (ChartShape::Scatter { label_points: false }, Summary::Points(points)) => {
                    self.draw_scatter(&root, view, points)?
                }
                (ChartShape::Scatter { label_points: true }, Summary::Grouped(grouped)) => {
                    self.draw_labeled_scatter(&root, view, grouped)?
                }
                (ChartShape::Heatmap { palette }, Summary::Matrix(matrix)) => {
                    self.draw_heatmap(&root, view, matrix, palette)?
                }
                (shape, summary) => bail!(
                    "View '{}' cannot draw a {} summary as {:?}",
                    view.name,
                    summary.kind(),
                    shape
                ),
            }
        }

        root.present()?;
        info!("Rendered '{}' to {}", view.name, path.display());
        Ok(())
    }

    /// Whether `shape` knows how to draw this kind of summary. Checked before
    /// any file is created.
    pub fn supports(shape: ChartShape, summary: &Summary) -> bool {
        matches!(
            (shape, summary),
            (ChartShape::Lines, Summary::Grouped(_))
                | (ChartShape::Bars, Summary::Grouped(_))
                | (ChartShape::Scatter { label_points: false }, Summary::Points(_))
                | (ChartShape::Scatter { label_points: true }, Summary::Grouped(_))
                | (ChartShape::Heatmap { .. }, Summary::Matrix(_))
        )
    }

    fn draw_empty(&self, root: &Area, view: &ViewSpec) -> Result<()> {
        let (width, height) = root.dim_in_pixel();
        root.draw(&Text::new(
            format!("{}: no data", title(view, 0)),
            (width as i32 / 2, height as i32 / 2),
            TextStyle::from((FONT, 32).into_font()).pos(Pos::new(HPos::Center, VPos::Center)),
        ))?;
        Ok(())
    }

    fn draw_lines(&self, root: &Area, view: &ViewSpec, grouped: &GroupedSummary) -> Result<()> {
        let labels = &grouped.labels;
        let x_max = (labels.len().saturating_sub(1)).max(1) as f64;
        let (y_min, y_max) = padded_bounds(
            grouped
                .measures
                .iter()
                .flat_map(|m| m.values.iter().flatten().copied()),
            false,
        );

        let mut chart = ChartBuilder::on(root)
            .caption(title(view, 0), (FONT, 32))
            .margin(20)
            .x_label_area_size(80)
            .y_label_area_size(110)
            .build_cartesian_2d(0f64..x_max, y_min..y_max)?;

        chart
            .configure_mesh()
            .x_desc(view.x_desc)
            .y_desc(view.y_desc)
            .x_labels(labels.len().clamp(2, 12))
            .x_label_formatter(&|x: &f64| label_at(labels, *x))
            .draw()?;

        for (index, measure) in grouped.measures.iter().enumerate() {
            let color = color_at(&view.colors, index);
            let points: Vec<(f64, f64)> = measure
                .values
                .iter()
                .enumerate()
                .filter_map(|(i, v)| v.map(|v| (i as f64, v)))
                .collect();

            chart
                .draw_series(LineSeries::new(points, color.stroke_width(2)))?
                .label(measure.name.as_str())
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &color));
        }

        chart
            .configure_series_labels()
            .background_style(&WHITE.mix(0.8))
            .border_style(&BLACK)
            .draw()?;

        Ok(())
    }

    /// One panel per measure, stacked top to bottom.
    fn draw_bars(&self, root: &Area, view: &ViewSpec, grouped: &GroupedSummary) -> Result<()> {
        let labels = &grouped.labels;
        let panels = root.split_evenly((grouped.measures.len().max(1), 1));

        for (index, (panel, measure)) in panels.iter().zip(&grouped.measures).enumerate() {
            let color = color_at(&view.colors, index);
            let values: Vec<f64> = measure.values.iter().map(|v| v.unwrap_or(0.0)).collect();
            let (y_min, y_max) = padded_bounds(values.iter().copied(), true);

            let mut chart = ChartBuilder::on(panel)
                .caption(title(view, index), (FONT, 28))
                .margin(20)
                .x_label_area_size(70)
                .y_label_area_size(110)
                .build_cartesian_2d((0..labels.len()).into_segmented(), y_min..y_max)?;

            chart
                .configure_mesh()
                .disable_x_mesh()
                .x_desc(view.x_desc)
                .y_desc(view.y_desc)
                .x_labels(labels.len())
                .x_label_formatter(&|v: &SegmentValue<usize>| segment_label(labels, v, false))
                .draw()?;

            chart.draw_series(values.iter().enumerate().map(|(i, v)| {
                let mut bar = Rectangle::new(
                    [(SegmentValue::Exact(i), 0.0), (SegmentValue::Exact(i + 1), *v)],
                    color.mix(0.8).filled(),
                );
                bar.set_margin(0, 0, 10, 10);
                bar
            }))?;
        }

        Ok(())
    }

    fn draw_scatter(&self, root: &Area, view: &ViewSpec, points: &PointSet) -> Result<()> {
        let color = color_at(&view.colors, 0);
        let (x_min, x_max) = padded_bounds(points.points.iter().map(|(x, _)| *x), false);
        let (y_min, y_max) = padded_bounds(points.points.iter().map(|(_, y)| *y), false);

        let mut chart = ChartBuilder::on(root)
            .caption(title(view, 0), (FONT, 32))
            .margin(20)
            .x_label_area_size(80)
            .y_label_area_size(110)
            .build_cartesian_2d(x_min..x_max, y_min..y_max)?;

        chart
            .configure_mesh()
            .x_desc(view.x_desc)
            .y_desc(view.y_desc)
            .draw()?;

        chart.draw_series(
            points
                .points
                .iter()
                .map(|&(x, y)| Circle::new((x, y), 5, color.mix(0.8).filled())),
        )?;

        Ok(())
    }

    /// First measure on x, second on y, each point tagged with its group label.
    fn draw_labeled_scatter(
        &self,
        root: &Area,
        view: &ViewSpec,
        grouped: &GroupedSummary,
    ) -> Result<()> {
        let (xs, ys) = match grouped.measures.as_slice() {
            [x, y, ..] => (&x.values, &y.values),
            _ => bail!(
                "View '{}' needs two measures for a labeled scatter",
                view.name
            ),
        };

        let labeled: Vec<(f64, f64, &str)> = xs
            .iter()
            .zip(ys)
            .zip(&grouped.labels)
            .filter_map(|((x, y), label)| match (x, y) {
                (Some(x), Some(y)) => Some((*x, *y, label.as_str())),
                _ => None,
            })
            .collect();

        let color = color_at(&view.colors, 0);
        let (x_min, x_max) = padded_bounds(labeled.iter().map(|(x, _, _)| *x), false);
        let (y_min, y_max) = padded_bounds(labeled.iter().map(|(_, y, _)| *y), false);

        let mut chart = ChartBuilder::on(root)
            .caption(title(view, 0), (FONT, 32))
            .margin(20)
            .x_label_area_size(80)
            .y_label_area_size(110)
            .build_cartesian_2d(x_min..x_max, y_min..y_max)?;

        chart
            .configure_mesh()
            .x_desc(view.x_desc)
            .y_desc(view.y_desc)
            .draw()?;

        chart.draw_series(
            labeled
                .iter()
                .map(|&(x, y, _)| Circle::new((x, y), 6, color.filled())),
        )?;
        chart.draw_series(
            labeled
                .iter()
                .map(|&(x, y, label)| Text::new(label.to_string(), (x, y), (FONT, 18).into_font())),
        )?;

        Ok(())
    }

    /// Annotated matrix; the first row is drawn at the top.
    fn draw_heatmap(
        &self,
        root: &Area,
        view: &ViewSpec,
        matrix: &MatrixSummary,
        palette: Palette,
    ) -> Result<()> {
        let rows = matrix.row_labels.len();
        let columns = matrix.column_labels.len();

        let (low, high) = match palette {
            Palette::Diverging => (-1.0, 1.0),
            Palette::Sequential => {
                let max = matrix.values.iter().flatten().copied().fold(0.0, f64::max);
                (0.0, if max > 0.0 { max } else { 1.0 })
            }
        };

        let mut chart = ChartBuilder::on(root)
            .caption(title(view, 0), (FONT, 32))
            .margin(20)
            .x_label_area_size(140)
            .y_label_area_size(200)
            .build_cartesian_2d((0..columns).into_segmented(), (0..rows).into_segmented())?;

        chart
            .configure_mesh()
            .disable_mesh()
            .x_desc(view.x_desc)
            .y_desc(view.y_desc)
            .x_labels(columns)
            .y_labels(rows)
            .x_label_formatter(&|v: &SegmentValue<usize>| {
                segment_label(&matrix.column_labels, v, false)
            })
            .y_label_formatter(&|v: &SegmentValue<usize>| segment_label(&matrix.row_labels, v, true))
            .draw()?;

        let cells: Vec<(usize, usize, Option<f64>)> = matrix
            .values
            .indexed_iter()
            .map(|((r, c), value)| (rows - 1 - r, c, *value))
            .collect();

        chart.draw_series(cells.iter().map(|&(y, x, value)| {
            let fill = match value {
                Some(v) => cell_color(palette, (v - low) / (high - low)),
                None => UNDEFINED_CELL,
            };
            Rectangle::new(
                [
                    (SegmentValue::Exact(x), SegmentValue::Exact(y)),
                    (SegmentValue::Exact(x + 1), SegmentValue::Exact(y + 1)),
                ],
                fill.filled(),
            )
        }))?;

        let centered = TextStyle::from((FONT, 20).into_font()).pos(Pos::new(HPos::Center, VPos::Center));
        chart.draw_series(cells.iter().filter_map(|&(y, x, value)| {
            let v = value?;
            let t = (v - low) / (high - low);
            let ink = if needs_light_text(palette, t) { &WHITE } else { &BLACK };
            Some(Text::new(
                format!("{:.2}", v),
                (SegmentValue::CenterOf(x), SegmentValue::CenterOf(y)),
                centered.color(ink),
            ))
        }))?;

        Ok(())
    }
}

fn title(view: &ViewSpec, panel: usize) -> &'static str {
    view.titles
        .get(panel)
        .or_else(|| view.titles.first())
        .copied()
        .unwrap_or(view.name)
}

fn color_at(colors: &[RGBColor], index: usize) -> RGBColor {
    if colors.is_empty() {
        FALLBACK_COLOR
    } else {
        colors[index % colors.len()]
    }
}

/// Axis label for an index-based x axis; blank between whole positions.
fn label_at(labels: &[String], x: f64) -> String {
    let rounded = x.round();
    if (x - rounded).abs() > 1e-6 || rounded < 0.0 {
        return String::new();
    }
    labels.get(rounded as usize).cloned().unwrap_or_default()
}

fn segment_label(labels: &[String], value: &SegmentValue<usize>, reversed: bool) -> String {
    match value {
        SegmentValue::CenterOf(i) => {
            let index = if reversed {
                labels.len().checked_sub(i + 1)
            } else {
                Some(*i)
            };
            index
                .and_then(|i| labels.get(i))
                .cloned()
                .unwrap_or_default()
        }
        _ => String::new(),
    }
}

/// Value range with 5% headroom; `include_zero` keeps bar baselines visible.
fn padded_bounds(values: impl Iterator<Item = f64>, include_zero: bool) -> (f64, f64) {
    let (mut low, mut high) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });

    if !low.is_finite() || !high.is_finite() {
        return (0.0, 1.0);
    }
    if include_zero {
        low = low.min(0.0);
        high = high.max(0.0);
    }
    if low == high {
        return (low - 1.0, high + 1.0);
    }

    let pad = (high - low) * 0.05;
    (
        if include_zero && low == 0.0 { 0.0 } else { low - pad },
        if include_zero && high == 0.0 { 0.0 } else { high + pad },
    )
}

fn lerp(a: RGBColor, b: RGBColor, t: f64) -> RGBColor {
    let mix = |x: u8, y: u8| (x as f64 + (y as f64 - x as f64) * t).round() as u8;
    RGBColor(mix(a.0, b.0), mix(a.1, b.1), mix(a.2, b.2))
}

/// Piecewise-linear colormap over evenly spaced stops, `t` in `[0, 1]`.
fn ramp(stops: &[RGBColor], t: f64) -> RGBColor {
    let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
    let scaled = t * (stops.len() - 1) as f64;
    let index = (scaled.floor() as usize).min(stops.len() - 2);
    lerp(stops[index], stops[index + 1], scaled - index as f64)
}

fn cell_color(palette: Palette, t: f64) -> RGBColor {
    match palette {
        Palette::Diverging => ramp(
            &[
                RGBColor(59, 76, 192),
                RGBColor(221, 221, 221),
                RGBColor(180, 4, 38),
            ],
            t,
        ),
        Palette::Sequential => ramp(
            &[
                RGBColor(68, 1, 84),
                RGBColor(59, 82, 139),
                RGBColor(33, 145, 140),
                RGBColor(94, 201, 98),
                RGBColor(253, 231, 37),
            ],
            t,
        ),
    }
}

fn needs_light_text(palette: Palette, t: f64) -> bool {
    match palette {
        Palette::Diverging => !(0.2..=0.8).contains(&t),
        Palette::Sequential => t < 0.6,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::summary::MeasureSeries;
    use crate::report::views::report_catalog;

    fn catalog_view(name: &str) -> ViewSpec {
        report_catalog()
            .into_iter()
            .find(|view| view.name == name)
            .unwrap()
    }

    fn points() -> Summary {
        Summary::Points(PointSet {
            x_name: "Discounts".to_string(),
            y_name: "Profit".to_string(),
            points: vec![(0.0, 16185.0), (50.0, -50.0)],
        })
    }

    #[test]
    fn test_supported_pairings() {
        let grouped = Summary::Grouped(GroupedSummary {
            key: "Segment".to_string(),
            labels: vec!["Government".to_string()],
            measures: vec![MeasureSeries {
                name: "Sales".to_string(),
                values: vec![Some(1.0)],
            }],
        });

        assert!(ChartRenderer::supports(ChartShape::Lines, &grouped));
        assert!(ChartRenderer::supports(ChartShape::Bars, &grouped));
        assert!(ChartRenderer::supports(ChartShape::Scatter { label_points: true }, &grouped));
        assert!(!ChartRenderer::supports(ChartShape::Scatter { label_points: false }, &grouped));
        assert!(ChartRenderer::supports(ChartShape::Scatter { label_points: false }, &points()));
        assert!(!ChartRenderer::supports(
            ChartShape::Heatmap { palette: Palette::Diverging },
            &points()
        ));
    }

    #[test]
    fn test_mismatched_summary_is_rejected_without_output() {
        let dir = tempfile::tempdir().unwrap();
        let view = catalog_view("correlation");
        let path = dir.path().join(view.file_name);

        let err = ChartRenderer.render(&view, &points(), &path).unwrap_err();
        assert!(err.to_string().contains("correlation"));
        assert!(err.to_string().contains("points"));
        assert!(!path.exists());
    }

    #[test]
    fn test_label_at_whole_positions_only() {
        let labels = vec!["2014-01".to_string(), "2014-02".to_string()];
        assert_eq!(label_at(&labels, 0.0), "2014-01");
        assert_eq!(label_at(&labels, 1.0), "2014-02");
        assert_eq!(label_at(&labels, 0.5), "");
        assert_eq!(label_at(&labels, 2.0), "");
        assert_eq!(label_at(&labels, -1.0), "");
    }

    #[test]
    fn test_segment_label_reversed() {
        let labels = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        assert_eq!(segment_label(&labels, &SegmentValue::CenterOf(0), false), "a");
        assert_eq!(segment_label(&labels, &SegmentValue::CenterOf(0), true), "c");
        assert_eq!(segment_label(&labels, &SegmentValue::CenterOf(3), true), "");
        assert_eq!(segment_label(&labels, &SegmentValue::Exact(1), false), "");
    }

    #[test]
    fn test_padded_bounds() {
        assert_eq!(padded_bounds(std::iter::empty(), false), (0.0, 1.0));
        assert_eq!(padded_bounds([5.0].into_iter(), false), (4.0, 6.0));

        let (low, high) = padded_bounds([10.0, 20.0].into_iter(), true);
        assert_eq!(low, 0.0);
        assert!(high > 20.0);

        let (low, high) = padded_bounds([-10.0, 10.0].into_iter(), false);
        assert!(low < -10.0 && high > 10.0);
    }

    #[test]
    fn test_ramp_endpoints() {
        let stops = [RGBColor(0, 0, 0), RGBColor(200, 100, 50)];
        assert_eq!(ramp(&stops, 0.0), RGBColor(0, 0, 0));
        assert_eq!(ramp(&stops, 1.0), RGBColor(200, 100, 50));
        assert_eq!(ramp(&stops, 0.5), RGBColor(100, 50, 25));
        assert_eq!(ramp(&stops, f64::NAN), RGBColor(0, 0, 0));
    }

    #[test]
    fn test_diverging_midpoint_is_neutral() {
        assert_eq!(cell_color(Palette::Diverging, 0.5), RGBColor(221, 221, 221));
        assert!(!needs_light_text(Palette::Diverging, 0.5));
        assert!(needs_light_text(Palette::Diverging, 1.0));
    }
}
