//! Static Chart Renderer
//! Draws chart models into PNG images with plotters for download.
//!
//! Geometry is always drawn; captions, axis labels and legends are drawn when
//! a system font is available and skipped otherwise.

use crate::charts::layout::TileRect;
use crate::charts::model::{ChartBody, ChartModel, HeatmapGrid, ScatterPoint, Slice, TreemapGroup};
use crate::charts::plotter::{
    format_cell, format_compact, heat_color, palette_color, ACCENT_COLOR, FORECAST_COLOR,
};
use crate::stats::{BoxStats, HistogramBin};
use plotters::coord::Shift;
use plotters::prelude::*;
use std::io::Cursor;
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_WIDTH: u32 = 1000;
pub const DEFAULT_HEIGHT: u32 = 600;

const FONT: &str = "sans-serif";

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Failed to draw chart: {0}")]
    Draw(String),
    #[error("Invalid image size {0}x{1}")]
    Size(u32, u32),
    #[error("Failed to encode image: {0}")]
    Encode(#[from] image::ImageError),
}

fn draw_err<E: std::fmt::Display>(e: E) -> RenderError {
    RenderError::Draw(e.to_string())
}

fn rgb(index: usize) -> RGBColor {
    let c = palette_color(index);
    RGBColor(c.r(), c.g(), c.b())
}

fn accent() -> RGBColor {
    RGBColor(ACCENT_COLOR.r(), ACCENT_COLOR.g(), ACCENT_COLOR.b())
}

fn forecast_color() -> RGBColor {
    RGBColor(FORECAST_COLOR.r(), FORECAST_COLOR.g(), FORECAST_COLOR.b())
}

fn heat(t: f64) -> RGBColor {
    let c = heat_color(t);
    RGBColor(c.r(), c.g(), c.b())
}

/// Value axis range including zero, padded by 10%.
fn value_range(values: impl Iterator<Item = f64>) -> std::ops::Range<f64> {
    let (lo, hi) = values.fold((0.0_f64, 0.0_f64), |(lo, hi), v| (lo.min(v), hi.max(v)));
    let span = if hi > lo { hi - lo } else { 1.0 };
    let pad = span * 0.1;
    (if lo < 0.0 { lo - pad } else { lo })..(hi + pad)
}

pub struct StaticChartRenderer;

impl StaticChartRenderer {
    /// Render a chart model to PNG bytes.
    pub fn render_png(model: &ChartModel, width: u32, height: u32) -> Result<Vec<u8>, RenderError> {
        if width == 0 || height == 0 {
            return Err(RenderError::Size(width, height));
        }

        let mut buffer = vec![255u8; (width as usize) * (height as usize) * 3];
        {
            let root = BitMapBackend::with_buffer(&mut buffer, (width, height)).into_drawing_area();
            root.fill(&WHITE).map_err(draw_err)?;

            let area = match root.titled(&model.title(), (FONT, 22)) {
                Ok(area) => area,
                Err(e) => {
                    debug!(error = %e, "chart title skipped");
                    root.clone()
                }
            };

            match &model.body {
                ChartBody::Empty => Self::label(&area, "No data for the current filters", (20, 20), 16),
                ChartBody::Bars { measure, bars } => Self::draw_bars(&area, bars, measure.label())?,
                ChartBody::Slices(slices) => Self::draw_pie(&area, slices)?,
                ChartBody::Series { points, forecast } => Self::draw_series(&area, points, forecast)?,
                ChartBody::Treemap(groups) => Self::draw_treemap(&area, groups)?,
                ChartBody::Scatter(points) => Self::draw_scatter(&area, points)?,
                ChartBody::Heatmap(grid) => Self::draw_heatmap(&area, grid)?,
                ChartBody::Histogram(bins) => Self::draw_histogram(&area, bins)?,
                ChartBody::BoxPlot(stats) => Self::draw_box_plot(&area, stats)?,
            }

            root.present().map_err(draw_err)?;
        }

        let image = image::RgbImage::from_raw(width, height, buffer)
            .ok_or(RenderError::Size(width, height))?;
        let mut bytes = Vec::new();
        image.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)?;
        debug!(chart = model.id.file_stem(), bytes = bytes.len(), "chart rendered");
        Ok(bytes)
    }

    /// Text that is allowed to fail when no font can be loaded.
    fn label<DB: DrawingBackend>(area: &DrawingArea<DB, Shift>, text: &str, pos: (i32, i32), size: i32) {
        if let Err(e) = area.draw(&Text::new(text.to_string(), pos, (FONT, size).into_font())) {
            debug!(error = %e, "chart label skipped");
        }
    }

    fn draw_bars<DB: DrawingBackend>(
        area: &DrawingArea<DB, Shift>,
        bars: &[(String, f64)],
        measure: &str,
    ) -> Result<(), RenderError> {
        let n = bars.len();
        let mut chart = ChartBuilder::on(area)
            .margin(20)
            .x_label_area_size(50)
            .y_label_area_size(70)
            .build_cartesian_2d(-0.5f64..(n as f64 - 0.5), value_range(bars.iter().map(|(_, v)| *v)))
            .map_err(draw_err)?;

        let x_fmt = |x: &f64| {
            let idx = x.round();
            if idx >= 0.0 && (x - idx).abs() < 1e-6 {
                bars.get(idx as usize).map(|(l, _)| l.clone()).unwrap_or_default()
            } else {
                String::new()
            }
        };
        let y_fmt = |y: &f64| format_compact(*y);
        if let Err(e) = chart
            .configure_mesh()
            .disable_x_mesh()
            .x_labels(n + 1)
            .x_label_formatter(&x_fmt)
            .y_label_formatter(&y_fmt)
            .y_desc(measure)
            .draw()
        {
            debug!(error = %e, "chart axes skipped");
        }

        chart
            .draw_series(bars.iter().enumerate().map(|(i, (_, v))| {
                Rectangle::new([(i as f64 - 0.35, 0.0), (i as f64 + 0.35, *v)], rgb(i).filled())
            }))
            .map_err(draw_err)?;
        Ok(())
    }

    fn draw_series<DB: DrawingBackend>(
        area: &DrawingArea<DB, Shift>,
        points: &[(String, f64)],
        forecast: &[(String, f64)],
    ) -> Result<(), RenderError> {
        let labels: Vec<&str> = points.iter().chain(forecast).map(|(l, _)| l.as_str()).collect();
        let last_x = (labels.len().saturating_sub(1)).max(1) as f64;
        let y_range = value_range(points.iter().chain(forecast).map(|(_, v)| *v));

        let mut chart = ChartBuilder::on(area)
            .margin(20)
            .x_label_area_size(50)
            .y_label_area_size(70)
            .build_cartesian_2d(0f64..last_x, y_range)
            .map_err(draw_err)?;

        let x_fmt = |x: &f64| {
            let idx = x.round();
            if idx >= 0.0 && (x - idx).abs() < 1e-6 {
                labels.get(idx as usize).map(|l| l.to_string()).unwrap_or_default()
            } else {
                String::new()
            }
        };
        let y_fmt = |y: &f64| format_compact(*y);
        if let Err(e) = chart
            .configure_mesh()
            .x_labels(labels.len().min(12))
            .x_label_formatter(&x_fmt)
            .y_label_formatter(&y_fmt)
            .draw()
        {
            debug!(error = %e, "chart axes skipped");
        }

        let history: Vec<(f64, f64)> = points.iter().enumerate().map(|(i, (_, v))| (i as f64, *v)).collect();
        chart
            .draw_series(LineSeries::new(history.iter().copied(), accent().stroke_width(2)))
            .map_err(draw_err)?;
        chart
            .draw_series(history.iter().map(|p| Circle::new(*p, 3, accent().filled())))
            .map_err(draw_err)?;

        if !forecast.is_empty() {
            let projected: Vec<(f64, f64)> = history
                .last()
                .copied()
                .into_iter()
                .chain(
                    forecast
                        .iter()
                        .enumerate()
                        .map(|(i, (_, v))| ((points.len() + i) as f64, *v)),
                )
                .collect();
            chart
                .draw_series(LineSeries::new(projected, forecast_color().stroke_width(2)))
                .map_err(draw_err)?;
        }
        Ok(())
    }

    fn draw_scatter<DB: DrawingBackend>(
        area: &DrawingArea<DB, Shift>,
        points: &[ScatterPoint],
    ) -> Result<(), RenderError> {
        let x_max = points.iter().map(|p| p.x).fold(1.0, f64::max) * 1.1;
        let y_range = value_range(points.iter().map(|p| p.y));

        let mut chart = ChartBuilder::on(area)
            .margin(20)
            .x_label_area_size(50)
            .y_label_area_size(70)
            .build_cartesian_2d(0f64..x_max, y_range)
            .map_err(draw_err)?;

        let y_fmt = |y: &f64| format_compact(*y);
        if let Err(e) = chart
            .configure_mesh()
            .x_desc("Orders")
            .y_desc("Sales")
            .y_label_formatter(&y_fmt)
            .draw()
        {
            debug!(error = %e, "chart axes skipped");
        }

        let mut series: Vec<&str> = Vec::new();
        for p in points {
            if !series.contains(&p.series.as_str()) {
                series.push(&p.series);
            }
        }

        chart
            .draw_series(points.iter().map(|p| {
                let color = series.iter().position(|s| *s == p.series).unwrap_or(0);
                Circle::new((p.x, p.y), 6, rgb(color).filled())
            }))
            .map_err(draw_err)?;
        Ok(())
    }

    fn draw_pie<DB: DrawingBackend>(
        area: &DrawingArea<DB, Shift>,
        slices: &[Slice],
    ) -> Result<(), RenderError> {
        let (w, h) = area.dim_in_pixel();
        let radius = (w.min(h) as f64 / 2.0 - 30.0).max(10.0);
        let center = (radius + 30.0, h as f64 / 2.0);

        let mut start = -std::f64::consts::FRAC_PI_2;
        for (i, slice) in slices.iter().enumerate() {
            let sweep = slice.fraction * std::f64::consts::TAU;
            let steps = ((sweep / 0.05).ceil() as usize).max(1);
            let mut outline = vec![(center.0 as i32, center.1 as i32)];
            outline.extend((0..=steps).map(|s| {
                let a = start + sweep * s as f64 / steps as f64;
                (
                    (center.0 + radius * a.cos()) as i32,
                    (center.1 + radius * a.sin()) as i32,
                )
            }));
            area.draw(&Polygon::new(outline, rgb(i).filled()))
                .map_err(draw_err)?;
            start += sweep;
        }

        let legend_x = (center.0 + radius + 40.0) as i32;
        for (i, slice) in slices.iter().enumerate() {
            let y = 30 + i as i32 * 24;
            area.draw(&Rectangle::new([(legend_x, y), (legend_x + 14, y + 14)], rgb(i).filled()))
                .map_err(draw_err)?;
            Self::label(
                area,
                &format!("{}  {:.1}%", slice.label, slice.fraction * 100.0),
                (legend_x + 22, y),
                14,
            );
        }
        Ok(())
    }

    fn draw_treemap<DB: DrawingBackend>(
        area: &DrawingArea<DB, Shift>,
        groups: &[TreemapGroup],
    ) -> Result<(), RenderError> {
        let (w, h) = area.dim_in_pixel();
        let bounds = TileRect::new(10.0, 10.0, w as f64 - 20.0, h as f64 - 20.0);

        for tile in ChartModel::treemap_tiles(groups, bounds, 3.0) {
            let r = tile.rect;
            if r.w < 1.0 || r.h < 1.0 {
                continue;
            }
            let corners = [
                (r.x as i32, r.y as i32),
                ((r.x + r.w) as i32, (r.y + r.h) as i32),
            ];
            let color = rgb(tile.group);
            if tile.depth == 0 {
                area.draw(&Rectangle::new(corners, color.mix(0.35).filled()))
                    .map_err(draw_err)?;
                continue;
            }
            area.draw(&Rectangle::new(corners, color.mix(0.85).filled()))
                .map_err(draw_err)?;
            area.draw(&Rectangle::new(corners, WHITE.stroke_width(1)))
                .map_err(draw_err)?;
            if r.w > 60.0 && r.h > 20.0 {
                Self::label(area, &tile.label, (r.x as i32 + 4, r.y as i32 + 4), 12);
            }
        }
        Ok(())
    }

    fn draw_histogram<DB: DrawingBackend>(
        area: &DrawingArea<DB, Shift>,
        bins: &[HistogramBin],
    ) -> Result<(), RenderError> {
        let (lo, hi) = match (bins.first(), bins.last()) {
            (Some(first), Some(last)) => (first.start, last.end),
            _ => return Ok(()),
        };
        let mut chart = ChartBuilder::on(area)
            .margin(20)
            .x_label_area_size(50)
            .y_label_area_size(70)
            .build_cartesian_2d(lo..hi, value_range(bins.iter().map(|b| b.count as f64)))
            .map_err(draw_err)?;

        let x_fmt = |x: &f64| format_compact(*x);
        if let Err(e) = chart
            .configure_mesh()
            .disable_x_mesh()
            .x_label_formatter(&x_fmt)
            .x_desc("Sales")
            .y_desc("Count")
            .draw()
        {
            debug!(error = %e, "chart axes skipped");
        }

        chart
            .draw_series(bins.iter().map(|b| {
                Rectangle::new([(b.start, 0.0), (b.end, b.count as f64)], accent().filled())
            }))
            .map_err(draw_err)?;
        chart
            .draw_series(bins.iter().map(|b| {
                Rectangle::new([(b.start, 0.0), (b.end, b.count as f64)], WHITE.stroke_width(1))
            }))
            .map_err(draw_err)?;
        Ok(())
    }

    fn draw_box_plot<DB: DrawingBackend>(
        area: &DrawingArea<DB, Shift>,
        stats: &BoxStats,
    ) -> Result<(), RenderError> {
        let values = [stats.lower_whisker, stats.upper_whisker]
            .into_iter()
            .chain(stats.outliers.iter().copied());
        let mut chart = ChartBuilder::on(area)
            .margin(20)
            .x_label_area_size(20)
            .y_label_area_size(70)
            .build_cartesian_2d(-1f64..1f64, value_range(values))
            .map_err(draw_err)?;

        let y_fmt = |y: &f64| format_compact(*y);
        if let Err(e) = chart
            .configure_mesh()
            .disable_x_mesh()
            .x_labels(0)
            .y_label_formatter(&y_fmt)
            .y_desc("Sales")
            .draw()
        {
            debug!(error = %e, "chart axes skipped");
        }

        let line = accent().stroke_width(2);
        chart
            .draw_series([
                Rectangle::new([(-0.25, stats.q1), (0.25, stats.q3)], accent().mix(0.3).filled()),
                Rectangle::new([(-0.25, stats.q1), (0.25, stats.q3)], line),
            ])
            .map_err(draw_err)?;
        chart
            .draw_series([
                PathElement::new(vec![(-0.25, stats.median), (0.25, stats.median)], line),
                PathElement::new(vec![(0.0, stats.q3), (0.0, stats.upper_whisker)], line),
                PathElement::new(vec![(0.0, stats.q1), (0.0, stats.lower_whisker)], line),
                PathElement::new(vec![(-0.12, stats.upper_whisker), (0.12, stats.upper_whisker)], line),
                PathElement::new(vec![(-0.12, stats.lower_whisker), (0.12, stats.lower_whisker)], line),
            ])
            .map_err(draw_err)?;
        chart
            .draw_series(
                stats
                    .outliers
                    .iter()
                    .map(|v| Circle::new((0.0, *v), 4, forecast_color().filled())),
            )
            .map_err(draw_err)?;
        Ok(())
    }

    fn draw_heatmap<DB: DrawingBackend>(
        area: &DrawingArea<DB, Shift>,
        grid: &HeatmapGrid,
    ) -> Result<(), RenderError> {
        let Some(range) = grid.range() else {
            Self::label(area, "No data for the current filters", (20, 20), 16);
            return Ok(());
        };
        let (w, h) = area.dim_in_pixel();
        let (left, top) = (120i32, 30i32);
        let cell_w = (w as i32 - left - 10).max(1) / grid.columns.len().max(1) as i32;
        let cell_h = (h as i32 - top - 10).max(1) / grid.rows.len().max(1) as i32;

        for (j, name) in grid.columns.iter().enumerate() {
            Self::label(area, name, (left + cell_w * j as i32 + 4, 8), 13);
        }
        for (i, row) in grid.rows.iter().enumerate() {
            let y = top + cell_h * i as i32;
            Self::label(area, row, (8, y + cell_h / 2 - 7), 13);
            for (j, value) in grid.cells[i].iter().enumerate() {
                let x = left + cell_w * j as i32;
                let corners = [(x, y), (x + cell_w, y + cell_h)];
                let t = HeatmapGrid::intensity(*value, range);
                let fill = if value.is_finite() { heat(t) } else { RGBColor(160, 160, 160) };
                area.draw(&Rectangle::new(corners, fill.filled())).map_err(draw_err)?;
                area.draw(&Rectangle::new(corners, WHITE.stroke_width(1)))
                    .map_err(draw_err)?;
                if value.is_finite() && cell_w > 40 && cell_h > 16 {
                    Self::label(area, &format_cell(*value), (x + 6, y + cell_h / 2 - 7), 13);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charts::ChartId;
    use crate::data::Dataset;
    use crate::stats::{AggregateRow, AggregationResult};
    use polars::prelude::{Column, DataFrame};

    fn result(id: ChartId) -> AggregationResult {
        let grouping = id.grouping().unwrap();
        let rows = match grouping {
            crate::stats::Grouping::Pair(_, _) => vec![
                (vec!["East", "Tech"], 120.0, 3),
                (vec!["East", "Office"], 40.0, 2),
                (vec!["West", "Tech"], 80.0, 4),
            ],
            crate::stats::Grouping::Month => vec![
                (vec!["2023-01"], 100.0, 3),
                (vec!["2023-02"], 140.0, 2),
                (vec!["2023-03"], 90.0, 4),
            ],
            _ => vec![(vec!["A"], 120.0, 3), (vec!["B"], 60.0, 2), (vec!["C"], 20.0, 1)],
        };
        AggregationResult {
            grouping,
            rows: rows
                .into_iter()
                .map(|(keys, sales, count)| AggregateRow {
                    keys: keys.into_iter().map(|k| Some(String::from(k))).collect(),
                    sales,
                    profit: sales / 4.0,
                    quantity: count as f64,
                    count,
                })
                .collect(),
        }
    }

    fn records() -> Dataset {
        let df = DataFrame::new(vec![
            Column::new("Order Date".into(), vec!["2023-01-01", "2023-01-02", "2023-01-03", "2023-01-04"]),
            Column::new("Sales".into(), vec![10.0, 20.0, 35.0, 400.0]),
            Column::new("Profit".into(), vec![1.0, 4.0, 3.0, 90.0]),
        ])
        .unwrap();
        Dataset::from_frame(df, "t").unwrap()
    }

    #[test]
    fn every_chart_renders_to_png() {
        let records = records();
        let models = ChartId::AGGREGATED
            .into_iter()
            .map(|id| ChartModel::build(id, &result(id), None))
            .chain(
                ChartId::DISTRIBUTION
                    .into_iter()
                    .map(|id| ChartModel::from_records(id, &records).unwrap()),
            );
        for model in models {
            let id = model.id;
            assert!(!model.is_empty(), "{:?}", id);
            let png = StaticChartRenderer::render_png(&model, 400, 300).unwrap();
            assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
            let decoded = image::load_from_memory(&png).unwrap();
            assert_eq!((decoded.width(), decoded.height()), (400, 300));
        }
    }

    #[test]
    fn placeholder_renders_and_zero_size_is_rejected() {
        let model = ChartModel::empty(ChartId::TopStates);
        assert!(StaticChartRenderer::render_png(&model, 200, 100).is_ok());
        assert!(matches!(
            StaticChartRenderer::render_png(&model, 0, 100),
            Err(RenderError::Size(0, 100))
        ));
    }
}
