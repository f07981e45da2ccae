//! Control Panel Widget
//! Left side panel with data source, filter and action controls.

use crate::data::{DateRange, Dimension, FileFormat};
use crate::session::Session;
use chrono::NaiveDate;
use egui::{Color32, RichText, ScrollArea};
use egui_extras::DatePickerButton;

/// Severity of the status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    Info,
    Success,
    Error,
}

/// Left side control panel with file selection and filters.
pub struct ControlPanel {
    pub status: String,
    pub status_kind: StatusKind,
    pub busy: bool,
    /// Date picker buffers, synced from the session when it changes.
    start: NaiveDate,
    end: NaiveDate,
    use_dates: bool,
}

impl Default for ControlPanel {
    fn default() -> Self {
        let today = chrono::Local::now().date_naive();
        Self {
            status: "Ready".to_string(),
            status_kind: StatusKind::Info,
            busy: false,
            start: today,
            end: today,
            use_dates: false,
        }
    }
}

impl ControlPanel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_status(&mut self, kind: StatusKind, status: impl Into<String>) {
        self.status_kind = kind;
        self.status = status.into();
    }

    /// Pull date picker state from the session's criteria and data bounds.
    pub fn sync_dates(&mut self, session: &Session) {
        let bounds = session.dataset().and_then(|d| d.date_bounds());
        match (session.criteria().dates, bounds) {
            (Some(range), _) => {
                self.use_dates = true;
                self.start = range.start;
                self.end = range.end;
            }
            (None, Some(bounds)) => {
                self.use_dates = false;
                self.start = bounds.start;
                self.end = bounds.end;
            }
            (None, None) => self.use_dates = false,
        }
    }

    /// Draw the control panel
    pub fn show(&mut self, ui: &mut egui::Ui, session: &Session, insights_ready: bool) -> ControlPanelAction {
        let mut action = ControlPanelAction::None;

        // Title
        ui.vertical_centered(|ui| {
            ui.add_space(5.0);
            ui.label(
                RichText::new("📊 Sales Dashboard")
                    .size(22.0)
                    .color(Color32::from_rgb(100, 149, 237)),
            );
        });
        ui.add_space(10.0);
        ui.separator();
        ui.add_space(5.0);

        // ===== Data Source Section =====
        ui.label(RichText::new("📁 Data Source").size(14.0).strong());
        ui.add_space(5.0);

        egui::Frame::none()
            .fill(ui.visuals().widgets.noninteractive.bg_fill)
            .rounding(5.0)
            .inner_margin(8.0)
            .show(ui, |ui| {
                let source = session.source_name().unwrap_or("No data loaded");
                ui.label(RichText::new(source).size(12.0).color(if session.has_data() {
                    ui.visuals().text_color()
                } else {
                    Color32::GRAY
                }));
                if let Some(ds) = session.dataset() {
                    ui.label(
                        RichText::new(format!("{} rows, {} columns", ds.height(), ds.column_names().len()))
                            .size(11.0)
                            .color(Color32::GRAY),
                    );
                }

                ui.add_space(4.0);
                ui.add_enabled_ui(!self.busy, |ui| {
                    ui.horizontal(|ui| {
                        if ui
                            .button("📂 Browse")
                            .on_hover_text(format!("Supported: {}", FileFormat::EXTENSIONS.join(", ")))
                            .clicked()
                        {
                            action = ControlPanelAction::BrowseFile;
                        }
                        if ui.button("Use sample data").clicked() {
                            action = ControlPanelAction::UseSample;
                        }
                        if ui.button("🔄 Refresh").on_hover_text("Clear cache and reload").clicked() {
                            action = ControlPanelAction::Refresh;
                        }
                    });
                });
            });

        ui.add_space(15.0);
        ui.separator();
        ui.add_space(10.0);

        if session.has_data() {
            self.show_filters(ui, session, &mut action);

            ui.add_space(15.0);
            ui.separator();
            ui.add_space(10.0);

            // ===== Action Buttons =====
            ui.vertical_centered(|ui| {
                let export = egui::Button::new(RichText::new("⬇ Export filtered CSV").size(14.0))
                    .min_size(egui::vec2(200.0, 30.0));
                if ui.add(export).clicked() {
                    action = ControlPanelAction::ExportFiltered;
                }

                ui.add_space(8.0);

                ui.add_enabled_ui(insights_ready, |ui| {
                    let insights = egui::Button::new(RichText::new("💡 Generate insights").size(14.0))
                        .min_size(egui::vec2(200.0, 30.0));
                    if ui.add(insights).clicked() {
                        action = ControlPanelAction::GenerateInsights;
                    }
                });
            });

            ui.add_space(15.0);
            ui.separator();
            ui.add_space(10.0);
        }

        // ===== Status Section =====
        ui.label(RichText::new("ℹ Status").size(14.0).strong());
        ui.add_space(5.0);
        if self.busy {
            ui.add(egui::ProgressBar::new(0.5).animate(true));
        }
        let status_color = match self.status_kind {
            StatusKind::Error => Color32::from_rgb(220, 53, 69),
            StatusKind::Success => Color32::from_rgb(40, 167, 69),
            StatusKind::Info => Color32::GRAY,
        };
        ui.label(RichText::new(&self.status).size(11.0).color(status_color));
        for warning in session.warnings() {
            ui.label(
                RichText::new(format!("⚠ {}", warning))
                    .size(11.0)
                    .color(Color32::from_rgb(243, 156, 18)),
            );
        }

        action
    }

    fn show_filters(&mut self, ui: &mut egui::Ui, session: &Session, action: &mut ControlPanelAction) {
        ui.horizontal(|ui| {
            ui.label(RichText::new("🔎 Filters").size(14.0).strong());
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                if ui.small_button("Reset filters").clicked() {
                    *action = ControlPanelAction::ResetFilters;
                }
            });
        });
        ui.add_space(5.0);

        // Date range
        let label_width = 50.0;
        let mut dates_changed = ui.checkbox(&mut self.use_dates, "Limit date range").changed();
        ui.add_enabled_ui(self.use_dates, |ui| {
            ui.horizontal(|ui| {
                ui.add_sized([label_width, 20.0], egui::Label::new("From:"));
                dates_changed |= ui
                    .add(DatePickerButton::new(&mut self.start).id_salt("filter_start"))
                    .changed();
            });
            ui.horizontal(|ui| {
                ui.add_sized([label_width, 20.0], egui::Label::new("To:"));
                dates_changed |= ui
                    .add(DatePickerButton::new(&mut self.end).id_salt("filter_end"))
                    .changed();
            });
        });
        if dates_changed {
            let range = self.use_dates.then(|| DateRange::new(self.start, self.end));
            *action = ControlPanelAction::SetDates(range);
        }

        ui.add_space(8.0);

        // Categorical multi-selects; an empty selection means "All".
        for dimension in Dimension::ALL {
            let options = session.filter_options(dimension);
            if options.is_empty() {
                continue;
            }
            let selected = session
                .criteria()
                .selected(dimension)
                .map(|s| s.len())
                .unwrap_or(0);
            let header = if selected == 0 {
                format!("{} (All)", dimension)
            } else {
                format!("{} ({} selected)", dimension, selected)
            };

            egui::CollapsingHeader::new(header)
                .id_salt(format!("filter_{}", dimension))
                .show(ui, |ui| {
                    if selected > 0 && ui.small_button("Clear").clicked() {
                        *action = ControlPanelAction::ClearDimension(dimension);
                    }
                    ScrollArea::vertical()
                        .id_salt(format!("filter_scroll_{}", dimension))
                        .max_height(140.0)
                        .show(ui, |ui| {
                            for value in &options {
                                let mut checked = session.criteria().is_selected(dimension, value);
                                if ui.checkbox(&mut checked, value.as_str()).changed() {
                                    *action = ControlPanelAction::Toggle(dimension, value.clone());
                                }
                            }
                        });
                });
        }
    }
}

/// Actions triggered by control panel
#[derive(Debug, Clone, PartialEq)]
pub enum ControlPanelAction {
    None,
    BrowseFile,
    UseSample,
    Refresh,
    SetDates(Option<DateRange>),
    Toggle(Dimension, String),
    ClearDimension(Dimension),
    ResetFilters,
    ExportFiltered,
    GenerateInsights,
}
