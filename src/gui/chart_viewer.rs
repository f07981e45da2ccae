//! Chart Viewer Widget
//! Central scrollable panel: KPI cards, insight text, chart cards and a data preview.
//! Chart cards wrap into as many columns as the available width allows.

use crate::charts::{format_compact, ChartId, ChartPlotter, ACCENT_COLOR};
use crate::insight::Insight;
use crate::session::{ChartPanel, DashboardView};
use crate::stats::Kpis;
use egui::{Color32, RichText, ScrollArea};

const CHART_SPACING: f32 = 15.0;
const CHART_WIDTH: f32 = 560.0;
const PLOT_HEIGHT: f32 = 300.0;
const PREVIEW_ROWS: usize = 10;

/// Actions triggered from a chart card
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewerAction {
    None,
    DownloadCsv(ChartId),
    DownloadPng(ChartId),
}

/// Dashboard display area.
#[derive(Default)]
pub struct ChartViewer {
    pub view: Option<DashboardView>,
    /// Filter failure shown instead of the dashboard.
    pub error: Option<String>,
    pub insight: Option<Insight>,
    pub insight_pending: bool,
}

impl ChartViewer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_view(&mut self, view: Option<DashboardView>) {
        self.view = view;
        self.error = None;
    }

    pub fn set_error(&mut self, error: impl Into<String>) {
        self.view = None;
        self.error = Some(error.into());
    }

    /// Forget everything derived from the previous dataset.
    pub fn clear(&mut self) {
        self.view = None;
        self.error = None;
        self.insight = None;
        self.insight_pending = false;
    }

    pub fn show(&mut self, ui: &mut egui::Ui) -> ViewerAction {
        let mut action = ViewerAction::None;

        if let Some(error) = &self.error {
            ui.centered_and_justified(|ui| {
                ui.label(
                    RichText::new(format!("⚠ {}", error))
                        .size(16.0)
                        .color(Color32::from_rgb(220, 53, 69)),
                );
            });
            return action;
        }

        let Some(view) = &self.view else {
            ui.centered_and_justified(|ui| {
                ui.label(RichText::new("No Data\nUpload a CSV or Excel file to begin").size(20.0));
            });
            return action;
        };

        ScrollArea::vertical()
            .auto_shrink([false, false])
            .show(ui, |ui| {
                ui.label(
                    RichText::new(format!(
                        "Showing {} of {} records",
                        view.filtered.height(),
                        view.total_rows
                    ))
                    .size(12.0)
                    .color(Color32::GRAY),
                );
                ui.add_space(6.0);

                Self::draw_kpis(ui, &view.kpis);
                ui.add_space(8.0);
                Self::draw_quick_insights(ui, &view.kpis);
                ui.add_space(CHART_SPACING);

                Self::draw_insight(ui, self.insight.as_ref(), self.insight_pending);
                ui.add_space(CHART_SPACING);

                if view.is_empty() {
                    ui.label(
                        RichText::new("No records match the current filters.")
                            .size(16.0)
                            .color(Color32::GRAY),
                    );
                    return;
                }

                // Calculate how many columns fit in available width
                let avail_width = ui.available_width();
                let num_columns = ((avail_width / (CHART_WIDTH + CHART_SPACING)).floor() as usize).max(1);

                for row in view.charts.chunks(num_columns) {
                    ui.horizontal_top(|ui| {
                        for panel in row {
                            if let Some(a) = Self::draw_chart_card(ui, panel) {
                                action = a;
                            }
                            ui.add_space(CHART_SPACING);
                        }
                    });
                    ui.add_space(CHART_SPACING);
                }

                Self::draw_summary(ui, view);
                ui.add_space(CHART_SPACING);
                Self::draw_preview(ui, view);
            });

        action
    }

    fn draw_kpis(ui: &mut egui::Ui, kpis: &Kpis) {
        let margin = kpis
            .profit_margin
            .map(|m| format!("{:.1}%", m))
            .unwrap_or_else(|| "n/a".to_string());
        let cards = [
            ("Total Sales", format!("${}", format_compact(kpis.total_sales))),
            ("Total Profit", format!("${}", format_compact(kpis.total_profit))),
            ("Profit Margin", margin),
            ("Avg Transaction", format!("${:.2}", kpis.avg_transaction)),
            ("Revenue / Day", format!("${}", format_compact(kpis.revenue_per_day))),
            ("Orders", kpis.orders.to_string()),
            ("Regions", kpis.market_penetration.to_string()),
            ("Categories", kpis.product_diversity.to_string()),
        ];

        ui.horizontal_wrapped(|ui| {
            for (label, value) in cards {
                egui::Frame::none()
                    .rounding(8.0)
                    .stroke(egui::Stroke::new(1.0, ACCENT_COLOR))
                    .fill(ui.visuals().widgets.noninteractive.bg_fill)
                    .inner_margin(10.0)
                    .show(ui, |ui| {
                        ui.set_width(130.0);
                        ui.vertical(|ui| {
                            ui.label(RichText::new(label).size(12.0).color(Color32::GRAY));
                            ui.label(RichText::new(value).size(20.0).strong());
                        });
                    });
            }
        });
    }

    /// Leading region and category by sales, and the share of filled cells.
    fn draw_quick_insights(ui: &mut egui::Ui, kpis: &Kpis) {
        let leader = |best: &Option<(String, f64)>| match best {
            Some((name, sales)) => (name.clone(), format!("${}", format_compact(*sales))),
            None => ("n/a".to_string(), String::new()),
        };
        let quality_color = if kpis.data_quality >= 95.0 {
            Color32::from_rgb(40, 167, 69)
        } else {
            Color32::from_rgb(243, 156, 18)
        };
        let cards = [
            ("🏆 Top Region", leader(&kpis.best_region), None),
            ("📦 Top Category", leader(&kpis.best_category), None),
            (
                "✔ Data Quality",
                (format!("{:.1}%", kpis.data_quality), "non-null cells".to_string()),
                Some(quality_color),
            ),
        ];

        ui.horizontal_wrapped(|ui| {
            for (label, (value, detail), color) in cards {
                egui::Frame::none()
                    .rounding(8.0)
                    .fill(ui.visuals().faint_bg_color)
                    .inner_margin(10.0)
                    .show(ui, |ui| {
                        ui.set_width(190.0);
                        ui.vertical(|ui| {
                            ui.label(RichText::new(label).size(12.0).color(Color32::GRAY));
                            let text = RichText::new(value).size(17.0).strong();
                            ui.label(match color {
                                Some(c) => text.color(c),
                                None => text,
                            });
                            if !detail.is_empty() {
                                ui.label(RichText::new(detail).size(11.0).color(Color32::GRAY));
                            }
                        });
                    });
            }
        });
    }

    fn draw_insight(ui: &mut egui::Ui, insight: Option<&Insight>, pending: bool) {
        if !pending && insight.is_none() {
            return;
        }
        egui::Frame::none()
            .rounding(8.0)
            .fill(ui.visuals().faint_bg_color)
            .inner_margin(12.0)
            .show(ui, |ui| {
                ui.label(RichText::new("💡 AI Insights").size(16.0).strong());
                ui.add_space(4.0);
                if pending {
                    ui.horizontal(|ui| {
                        ui.spinner();
                        ui.label("Generating insights...");
                    });
                } else if let Some(insight) = insight {
                    let color = if insight.is_fallback() {
                        Color32::GRAY
                    } else {
                        ui.visuals().text_color()
                    };
                    ui.label(RichText::new(&insight.text).size(13.0).color(color));
                }
            });
    }

    /// Draw a single chart card; returns a download request if one was clicked.
    fn draw_chart_card(ui: &mut egui::Ui, panel: &ChartPanel) -> Option<ViewerAction> {
        let mut action = None;
        let border_color = if panel.error.is_some() {
            Color32::from_rgb(220, 53, 69)
        } else {
            ui.visuals().widgets.noninteractive.bg_stroke.color
        };

        egui::Frame::none()
            .rounding(8.0)
            .stroke(egui::Stroke::new(1.5, border_color))
            .fill(ui.visuals().widgets.noninteractive.bg_fill)
            .inner_margin(12.0)
            .show(ui, |ui| {
                ui.set_width(CHART_WIDTH - 24.0);
                ui.vertical(|ui| {
                    ui.horizontal(|ui| {
                        ui.label(RichText::new(panel.model.title()).size(16.0).strong());
                        ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                            let ready = panel.error.is_none() && !panel.model.is_empty();
                            ui.add_enabled_ui(ready, |ui| {
                                if ui.small_button("PNG").on_hover_text("Download chart image").clicked() {
                                    action = Some(ViewerAction::DownloadPng(panel.id));
                                }
                                if ui.small_button("CSV").on_hover_text("Download chart data").clicked() {
                                    action = Some(ViewerAction::DownloadCsv(panel.id));
                                }
                            });
                        });
                    });
                    ui.add_space(8.0);

                    match &panel.error {
                        Some(error) => {
                            ui.add_sized(
                                [ui.available_width(), PLOT_HEIGHT],
                                egui::Label::new(
                                    RichText::new(format!("Chart unavailable: {}", error))
                                        .color(Color32::from_rgb(220, 53, 69)),
                                ),
                            );
                        }
                        None => ChartPlotter::draw(ui, &panel.model, PLOT_HEIGHT),
                    }
                });
            });
        action
    }

    fn draw_summary(ui: &mut egui::Ui, view: &DashboardView) {
        ui.label(RichText::new("Sales Distribution").size(16.0).strong());
        ui.add_space(4.0);

        let s = &view.summary;
        egui::Grid::new("sales_summary")
            .num_columns(2)
            .striped(true)
            .spacing([30.0, 4.0])
            .show(ui, |ui| {
                for (label, value) in [
                    ("Count", s.count as f64),
                    ("Mean", s.mean),
                    ("Std Dev", s.std),
                    ("Min", s.min),
                    ("25%", s.p25),
                    ("Median", s.median),
                    ("75%", s.p75),
                    ("Max", s.max),
                ] {
                    ui.label(label);
                    ui.label(if value.is_finite() {
                        format!("{:.2}", value)
                    } else {
                        "-".to_string()
                    });
                    ui.end_row();
                }
            });

        if view.segments.is_empty() {
            return;
        }
        ui.add_space(8.0);
        egui::Grid::new("sales_segments")
            .num_columns(3)
            .striped(true)
            .spacing([30.0, 4.0])
            .show(ui, |ui| {
                ui.label(RichText::new("Segment").strong());
                ui.label(RichText::new("Transactions").strong());
                ui.label(RichText::new("Sales").strong());
                ui.end_row();
                for row in &view.segments {
                    ui.label(row.segment.to_string());
                    ui.label(row.count.to_string());
                    ui.label(format!("{:.2}", row.sales));
                    ui.end_row();
                }
            });
    }

    fn draw_preview(ui: &mut egui::Ui, view: &DashboardView) {
        egui::CollapsingHeader::new(RichText::new("Data Preview").size(16.0).strong())
            .id_salt("data_preview")
            .show(ui, |ui| {
                let frame = view.filtered.frame().head(Some(PREVIEW_ROWS));
                ScrollArea::horizontal().id_salt("preview_scroll").show(ui, |ui| {
                    egui::Grid::new("data_preview_grid")
                        .striped(true)
                        .spacing([16.0, 4.0])
                        .show(ui, |ui| {
                            for name in frame.get_column_names() {
                                ui.label(RichText::new(name.as_str()).strong());
                            }
                            ui.end_row();
                            for i in 0..frame.height() {
                                for column in frame.get_columns() {
                                    let text = column
                                        .get(i)
                                        .map(|v| v.to_string())
                                        .unwrap_or_default();
                                    ui.label(text.trim_matches('"'));
                                }
                                ui.end_row();
                            }
                        });
                });
            });
    }
}
