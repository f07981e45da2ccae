//! Chart Plotter Module
//! Draws chart models on screen using egui_plot and the egui painter.

use crate::charts::layout::TileRect;
use crate::charts::model::{ChartBody, ChartModel, HeatmapGrid, ScatterPoint, Slice, TreemapGroup};
use crate::stats::{BoxStats, HistogramBin};
use egui::{Align2, Color32, FontId, Pos2, Rect, RichText, Sense, Shape, Stroke, Vec2};
use egui_plot::{
    Bar, BarChart, BoxElem, BoxPlot, BoxSpread, GridMark, Legend, Line, LineStyle, Plot, PlotPoints,
    Points,
};

pub const ACCENT_COLOR: Color32 = Color32::from_rgb(52, 152, 219); // Blue
pub const FORECAST_COLOR: Color32 = Color32::from_rgb(231, 76, 60); // Red

pub const PALETTE: [Color32; 10] = [
    Color32::from_rgb(52, 152, 219),  // Blue
    Color32::from_rgb(46, 204, 113),  // Green
    Color32::from_rgb(155, 89, 182),  // Purple
    Color32::from_rgb(243, 156, 18),  // Orange
    Color32::from_rgb(26, 188, 156),  // Teal
    Color32::from_rgb(233, 30, 99),   // Pink
    Color32::from_rgb(0, 188, 212),   // Cyan
    Color32::from_rgb(255, 87, 34),   // Deep Orange
    Color32::from_rgb(121, 85, 72),   // Brown
    Color32::from_rgb(96, 125, 139),  // Blue Grey
];

/// Segments used to approximate one full turn of a pie.
const PIE_SEGMENTS: usize = 96;

/// Heatmap ramp ends, low to high.
const HEAT_LOW: Color32 = Color32::from_rgb(239, 246, 255);
const HEAT_HIGH: Color32 = Color32::from_rgb(8, 69, 148);

/// Width of the heatmap row label column.
const HEAT_LABEL_WIDTH: f32 = 90.0;

pub fn palette_color(index: usize) -> Color32 {
    PALETTE[index % PALETTE.len()]
}

/// Heatmap cell colour for an intensity in 0..=1.
pub fn heat_color(t: f64) -> Color32 {
    let t = t.clamp(0.0, 1.0) as f32;
    let mix = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * t).round() as u8;
    Color32::from_rgb(
        mix(HEAT_LOW.r(), HEAT_HIGH.r()),
        mix(HEAT_LOW.g(), HEAT_HIGH.g()),
        mix(HEAT_LOW.b(), HEAT_HIGH.b()),
    )
}

/// Short money-style figure: 1.2M, 35.4K, 812.
pub fn format_compact(value: f64) -> String {
    let abs = value.abs();
    if abs >= 1_000_000.0 {
        format!("{:.1}M", value / 1_000_000.0)
    } else if abs >= 1_000.0 {
        format!("{:.1}K", value / 1_000.0)
    } else {
        format!("{:.0}", value)
    }
}

/// Heatmap cell text: coefficients keep two decimals, sums are compacted.
pub fn format_cell(value: f64) -> String {
    if value.abs() <= 1.0 {
        format!("{:.2}", value)
    } else {
        format_compact(value)
    }
}

/// Draws chart models inside egui containers.
pub struct ChartPlotter;

impl ChartPlotter {
    /// Draw any chart model at the given height.
    pub fn draw(ui: &mut egui::Ui, model: &ChartModel, height: f32) {
        let id = model.id.file_stem();
        match &model.body {
            ChartBody::Empty => Self::draw_placeholder(ui, height),
            ChartBody::Bars { measure, bars } => {
                Self::draw_bar_chart(ui, id, bars, measure.label(), height)
            }
            ChartBody::Slices(slices) => Self::draw_pie_chart(ui, slices, height),
            ChartBody::Series { points, forecast } => {
                Self::draw_line_chart(ui, id, points, forecast, height)
            }
            ChartBody::Treemap(groups) => Self::draw_treemap(ui, groups, height),
            ChartBody::Scatter(points) => Self::draw_scatter_chart(ui, id, points, height),
            ChartBody::Heatmap(grid) => Self::draw_heatmap(ui, grid, height),
            ChartBody::Histogram(bins) => Self::draw_histogram(ui, id, bins, height),
            ChartBody::BoxPlot(stats) => Self::draw_box_plot(ui, id, stats, height),
        }
    }

    fn draw_placeholder(ui: &mut egui::Ui, height: f32) {
        let (rect, _) = ui.allocate_exact_size(Vec2::new(ui.available_width(), height), Sense::hover());
        ui.painter().text(
            rect.center(),
            Align2::CENTER_CENTER,
            "No data for the current filters",
            FontId::proportional(13.0),
            Color32::GRAY,
        );
    }

    /// One grid mark per category so every label is shown.
    fn category_marks(count: usize) -> Vec<GridMark> {
        (0..count)
            .map(|i| GridMark {
                value: i as f64,
                step_size: 1.0,
            })
            .collect()
    }

    fn draw_bar_chart(
        ui: &mut egui::Ui,
        id: &str,
        bars: &[(String, f64)],
        measure: &str,
        height: f32,
    ) {
        let labels: Vec<String> = bars.iter().map(|(l, _)| l.clone()).collect();
        let count = labels.len();

        let chart = BarChart::new(
            bars.iter()
                .enumerate()
                .map(|(i, (label, value))| {
                    Bar::new(i as f64, *value)
                        .name(label)
                        .width(0.7)
                        .fill(palette_color(i))
                })
                .collect(),
        )
        .name(measure);

        Plot::new(format!("bar_{id}"))
            .height(height)
            .allow_zoom(false)
            .allow_drag(false)
            .allow_scroll(false)
            .y_axis_label(measure)
            .x_grid_spacer(move |_input| Self::category_marks(count))
            .x_axis_formatter(move |mark, _range| {
                let idx = mark.value.round();
                if idx >= 0.0 && (idx as usize) < labels.len() && (mark.value - idx).abs() < 1e-6 {
                    labels[idx as usize].clone()
                } else {
                    String::new()
                }
            })
            .y_axis_formatter(|mark, _range| format_compact(mark.value))
            .show(ui, |plot_ui| {
                plot_ui.bar_chart(chart);
            });
    }

    fn draw_line_chart(
        ui: &mut egui::Ui,
        id: &str,
        points: &[(String, f64)],
        forecast: &[(String, f64)],
        height: f32,
    ) {
        let labels: Vec<String> = points
            .iter()
            .chain(forecast.iter())
            .map(|(l, _)| l.clone())
            .collect();
        let history: PlotPoints = points
            .iter()
            .enumerate()
            .map(|(i, (_, v))| [i as f64, *v])
            .collect();

        // Forecast starts at the last actual point so the two lines join.
        let offset = points.len().saturating_sub(1);
        let projected: Vec<[f64; 2]> = points
            .last()
            .map(|(_, v)| [offset as f64, *v])
            .into_iter()
            .chain(
                forecast
                    .iter()
                    .enumerate()
                    .map(|(i, (_, v))| [(points.len() + i) as f64, *v]),
            )
            .collect();

        let step = (labels.len() / 8).max(1);

        Plot::new(format!("line_{id}"))
            .height(height)
            .allow_zoom(false)
            .allow_drag(false)
            .allow_scroll(false)
            .legend(Legend::default())
            .x_axis_formatter(move |mark, _range| {
                let idx = mark.value.round();
                if idx < 0.0 || (mark.value - idx).abs() > 1e-6 || idx as usize % step != 0 {
                    return String::new();
                }
                labels.get(idx as usize).cloned().unwrap_or_default()
            })
            .y_axis_formatter(|mark, _range| format_compact(mark.value))
            .show(ui, |plot_ui| {
                plot_ui.line(Line::new(history).color(ACCENT_COLOR).width(2.0).name("Sales"));
                if projected.len() > 1 {
                    plot_ui.line(
                        Line::new(PlotPoints::from_iter(projected.iter().copied()))
                            .color(FORECAST_COLOR)
                            .width(2.0)
                            .style(LineStyle::dashed_loose())
                            .name("Forecast"),
                    );
                }
            });
    }

    fn draw_scatter_chart(ui: &mut egui::Ui, id: &str, points: &[ScatterPoint], height: f32) {
        let mut series: Vec<&str> = Vec::new();
        for p in points {
            if !series.contains(&p.series.as_str()) {
                series.push(&p.series);
            }
        }

        Plot::new(format!("scatter_{id}"))
            .height(height)
            .allow_zoom(false)
            .allow_drag(false)
            .allow_scroll(false)
            .legend(Legend::default())
            .x_axis_label("Orders")
            .y_axis_label("Sales")
            .y_axis_formatter(|mark, _range| format_compact(mark.value))
            .label_formatter(|name, value| {
                if name.is_empty() {
                    String::new()
                } else {
                    format!("{name}\nOrders: {:.0}\nSales: {:.2}", value.x, value.y)
                }
            })
            .show(ui, |plot_ui| {
                for (i, name) in series.iter().enumerate() {
                    let pts: PlotPoints = points
                        .iter()
                        .filter(|p| p.series == *name)
                        .map(|p| [p.x, p.y])
                        .collect();
                    plot_ui.points(
                        Points::new(pts)
                            .radius(5.0)
                            .color(palette_color(i))
                            .name(*name),
                    );
                }
            });
    }

    fn draw_pie_chart(ui: &mut egui::Ui, slices: &[Slice], height: f32) {
        ui.horizontal(|ui| {
            let diameter = height.min(ui.available_width() * 0.6);
            let (rect, response) = ui.allocate_exact_size(Vec2::splat(diameter), Sense::hover());
            let painter = ui.painter_at(rect);
            let center = rect.center();
            let radius = diameter / 2.0 - 4.0;

            let mut start = -std::f32::consts::FRAC_PI_2;
            let mut hovered: Option<&Slice> = None;
            let pointer = response.hover_pos();

            for (i, slice) in slices.iter().enumerate() {
                let sweep = slice.fraction as f32 * std::f32::consts::TAU;
                let color = palette_color(i);
                let steps = ((PIE_SEGMENTS as f32 * slice.fraction as f32).ceil() as usize).max(1);

                // Fan of thin triangles keeps every shape convex.
                for s in 0..steps {
                    let a0 = start + sweep * s as f32 / steps as f32;
                    let a1 = start + sweep * (s + 1) as f32 / steps as f32;
                    painter.add(Shape::convex_polygon(
                        vec![
                            center,
                            center + radius * Vec2::angled(a0),
                            center + radius * Vec2::angled(a1),
                        ],
                        color,
                        Stroke::NONE,
                    ));
                }

                if let Some(pos) = pointer {
                    let d = pos - center;
                    if d.length() <= radius {
                        let angle = Self::normalize_angle(d.angle() - start);
                        if angle < sweep {
                            hovered = Some(slice);
                        }
                    }
                }
                start += sweep;
            }

            if let Some(slice) = hovered {
                response.on_hover_text_at_pointer(format!(
                    "{}: {:.2} ({:.1}%)",
                    slice.label,
                    slice.value,
                    slice.fraction * 100.0
                ));
            }

            ui.vertical(|ui| {
                for (i, slice) in slices.iter().enumerate() {
                    ui.label(
                        RichText::new(format!(
                            "{}  {:.1}%",
                            slice.label,
                            slice.fraction * 100.0
                        ))
                        .color(palette_color(i))
                        .size(11.0),
                    );
                }
            });
        });
    }

    fn draw_histogram(ui: &mut egui::Ui, id: &str, bins: &[HistogramBin], height: f32) {
        let chart = BarChart::new(
            bins.iter()
                .map(|b| {
                    Bar::new((b.start + b.end) / 2.0, b.count as f64)
                        .width(b.end - b.start)
                        .name(format!("{:.2} - {:.2}", b.start, b.end))
                        .fill(ACCENT_COLOR.gamma_multiply(0.8))
                        .stroke(Stroke::new(1.0, Color32::WHITE))
                })
                .collect(),
        )
        .name("Transactions");

        Plot::new(format!("histogram_{id}"))
            .height(height)
            .allow_zoom(false)
            .allow_drag(false)
            .allow_scroll(false)
            .x_axis_label("Sales")
            .y_axis_label("Count")
            .x_axis_formatter(|mark, _range| format_compact(mark.value))
            .show(ui, |plot_ui| {
                plot_ui.bar_chart(chart);
            });
    }

    fn draw_box_plot(ui: &mut egui::Ui, id: &str, stats: &BoxStats, height: f32) {
        let elem = BoxElem::new(
            0.0,
            BoxSpread::new(
                stats.lower_whisker,
                stats.q1,
                stats.median,
                stats.q3,
                stats.upper_whisker,
            ),
        )
        .box_width(0.5)
        .fill(ACCENT_COLOR.gamma_multiply(0.3))
        .stroke(Stroke::new(1.5, ACCENT_COLOR));

        let outliers: PlotPoints = stats.outliers.iter().map(|v| [0.0, *v]).collect();

        Plot::new(format!("box_{id}"))
            .height(height)
            .allow_zoom(false)
            .allow_drag(false)
            .allow_scroll(false)
            .show_x(false)
            .y_axis_label("Sales")
            .x_axis_formatter(|_mark, _range| String::new())
            .y_axis_formatter(|mark, _range| format_compact(mark.value))
            .show(ui, |plot_ui| {
                plot_ui.box_plot(BoxPlot::new(vec![elem]).name("Sales"));
                plot_ui.points(
                    Points::new(outliers)
                        .radius(3.0)
                        .color(FORECAST_COLOR)
                        .name("Outliers"),
                );
            });
    }

    fn draw_heatmap(ui: &mut egui::Ui, grid: &HeatmapGrid, height: f32) {
        let (rect, response) =
            ui.allocate_exact_size(Vec2::new(ui.available_width(), height), Sense::hover());
        let painter = ui.painter_at(rect);
        let Some(range) = grid.range() else {
            return;
        };

        let header = 20.0;
        let cells = Rect::from_min_max(
            Pos2::new(rect.min.x + HEAT_LABEL_WIDTH, rect.min.y + header),
            rect.max,
        );
        let cell_w = cells.width() / grid.columns.len().max(1) as f32;
        let cell_h = cells.height() / grid.rows.len().max(1) as f32;
        let font = FontId::proportional(11.0);
        let mut hovered: Option<String> = None;

        for (j, name) in grid.columns.iter().enumerate() {
            painter.text(
                Pos2::new(cells.min.x + cell_w * (j as f32 + 0.5), rect.min.y + header / 2.0),
                Align2::CENTER_CENTER,
                name,
                font.clone(),
                ui.visuals().text_color(),
            );
        }

        for (i, row) in grid.rows.iter().enumerate() {
            let y = cells.min.y + cell_h * i as f32;
            painter.text(
                Pos2::new(rect.min.x + 4.0, y + cell_h / 2.0),
                Align2::LEFT_CENTER,
                row,
                font.clone(),
                ui.visuals().text_color(),
            );
            for (j, value) in grid.cells[i].iter().enumerate() {
                let r = Rect::from_min_size(
                    Pos2::new(cells.min.x + cell_w * j as f32, y),
                    Vec2::new(cell_w, cell_h),
                );
                let t = HeatmapGrid::intensity(*value, range);
                let fill = if value.is_finite() { heat_color(t) } else { Color32::GRAY };
                painter.rect_filled(r, 0.0, fill);
                painter.rect_stroke(r, 0.0, Stroke::new(1.0, Color32::WHITE));
                if cell_w > 40.0 && cell_h > 14.0 && value.is_finite() {
                    let text_color = if t > 0.5 { Color32::WHITE } else { Color32::BLACK };
                    painter.text(r.center(), Align2::CENTER_CENTER, format_cell(*value), font.clone(), text_color);
                }
                if response.hover_pos().is_some_and(|p| r.contains(p)) {
                    let column = grid.columns.get(j).map(String::as_str).unwrap_or("");
                    hovered = Some(format!("{} / {}: {:.2}", row, column, value));
                }
            }
        }

        if let Some(text) = hovered {
            response.on_hover_text_at_pointer(text);
        }
    }

    fn normalize_angle(angle: f32) -> f32 {
        angle.rem_euclid(std::f32::consts::TAU)
    }

    fn draw_treemap(ui: &mut egui::Ui, groups: &[TreemapGroup], height: f32) {
        let (rect, response) =
            ui.allocate_exact_size(Vec2::new(ui.available_width(), height), Sense::hover());
        let painter = ui.painter_at(rect);
        let bounds = TileRect::new(
            rect.min.x as f64,
            rect.min.y as f64,
            rect.width() as f64,
            rect.height() as f64,
        );

        let tiles = ChartModel::treemap_tiles(groups, bounds, 3.0);
        let mut hovered: Option<String> = None;

        for tile in &tiles {
            let r = Rect::from_min_size(
                Pos2::new(tile.rect.x as f32, tile.rect.y as f32),
                Vec2::new(tile.rect.w as f32, tile.rect.h as f32),
            );
            if r.width() < 1.0 || r.height() < 1.0 {
                continue;
            }
            let base = palette_color(tile.group);

            if tile.depth == 0 {
                painter.rect_filled(r, 2.0, base.gamma_multiply(0.35));
                continue;
            }

            painter.rect_filled(r, 1.0, base.gamma_multiply(0.85));
            painter.rect_stroke(r, 1.0, Stroke::new(1.0, Color32::WHITE));
            if r.width() > 48.0 && r.height() > 18.0 {
                painter.text(
                    r.center(),
                    Align2::CENTER_CENTER,
                    &tile.label,
                    FontId::proportional(11.0),
                    Color32::WHITE,
                );
            }

            if response.hover_pos().is_some_and(|p| r.contains(p)) {
                let parent = groups.get(tile.group).map(|g| g.label.as_str()).unwrap_or("");
                hovered = Some(format!("{} / {}: {:.2}", parent, tile.label, tile.value));
            }
        }

        if let Some(text) = hovered {
            response.on_hover_text_at_pointer(text);
        }
    }
}
