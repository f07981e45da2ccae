//! Sales Dashboard Main Application
//! Main window with control panel and dashboard viewer.

use crate::charts::{ChartId, DEFAULT_HEIGHT, DEFAULT_WIDTH};
use crate::config::DashboardConfig;
use crate::data::{DataLoader, Dataset, FileFormat, LoaderError, RawSource};
use crate::export::{ExportKind, Exporter};
use crate::gui::{ChartViewer, ControlPanel, ControlPanelAction, StatusKind, ViewerAction};
use crate::insight::{Insight, InsightGenerator};
use crate::session::{LoadPlan, Session};
use anyhow::Context;
use egui::SidePanel;
use std::path::PathBuf;
use std::sync::mpsc::{channel, Receiver};
use std::thread;
use tracing::{error, info};

/// File loading result from background thread
enum LoadResult {
    /// Bytes read; still needs a cache lookup on the UI thread.
    Read(RawSource),
    Parsed {
        raw: RawSource,
        parsed: Result<Dataset, LoaderError>,
    },
    Error(String),
}

/// Main application window.
pub struct SalesDashboardApp {
    session: Session,
    generator: InsightGenerator,
    control_panel: ControlPanel,
    chart_viewer: ChartViewer,

    // Async file loading
    load_rx: Option<Receiver<LoadResult>>,
    is_loading: bool,

    // Async insight request
    insight_rx: Option<Receiver<Insight>>,
}

impl SalesDashboardApp {
    pub fn new(_cc: &eframe::CreationContext<'_>, config: DashboardConfig) -> Self {
        let generator = InsightGenerator::from_config(&config.insight);
        let mut app = Self {
            session: Session::new(config),
            generator,
            control_panel: ControlPanel::new(),
            chart_viewer: ChartViewer::new(),
            load_rx: None,
            is_loading: false,
            insight_rx: None,
        };

        match app.session.load_default() {
            Ok(()) if app.session.has_data() => app.report_loaded(),
            Ok(()) => app
                .control_panel
                .set_status(StatusKind::Info, "Upload a CSV or Excel file to begin"),
            Err(e) => app
                .control_panel
                .set_status(StatusKind::Error, format!("Sample data failed to load: {}", e)),
        }
        app.rebuild_view();
        app
    }

    /// Handle file selection; reading and parsing run off the UI thread.
    fn handle_browse_file(&mut self) {
        if self.is_loading {
            return;
        }

        let Some(path) = rfd::FileDialog::new()
            .add_filter("Sales data", &FileFormat::EXTENSIONS)
            .pick_file()
        else {
            return;
        };

        self.control_panel.set_status(StatusKind::Info, "Reading file...");
        self.control_panel.busy = true;
        self.is_loading = true;

        let (tx, rx) = channel();
        self.load_rx = Some(rx);

        thread::spawn(move || {
            let result = match RawSource::read(&path) {
                Ok(raw) => LoadResult::Read(raw),
                Err(e) => LoadResult::Error(format!("Could not read {}: {}", path.display(), e)),
            };
            let _ = tx.send(result);
        });
    }

    /// Parse in the background unless the cache already has this content.
    fn start_parse(&mut self, raw: RawSource) {
        match self.session.plan(raw) {
            LoadPlan::Cached(raw, dataset) => {
                info!(source = %raw.name, "using cached parse");
                self.finish_load(raw, Ok(dataset));
            }
            LoadPlan::Parse(raw, options) => {
                self.control_panel
                    .set_status(StatusKind::Info, format!("Parsing {}...", raw.name));
                let (tx, rx) = channel();
                self.load_rx = Some(rx);
                self.is_loading = true;

                thread::spawn(move || {
                    let parsed = DataLoader::parse(&raw, &options);
                    let _ = tx.send(LoadResult::Parsed { raw, parsed });
                });
            }
        }
    }

    fn finish_load(&mut self, raw: RawSource, parsed: Result<Dataset, LoaderError>) {
        self.is_loading = false;
        self.control_panel.busy = false;
        match self.session.finish_load(raw, parsed) {
            Ok(()) => self.report_loaded(),
            Err(_) => {
                let message = self.session.last_error().unwrap_or("Load failed").to_string();
                self.control_panel.set_status(StatusKind::Error, message);
            }
        }
        self.discard_insight();
        self.rebuild_view();
    }

    /// Check for file loading results
    fn check_load_results(&mut self) {
        // Take the receiver temporarily to avoid borrow issues
        let Some(rx) = self.load_rx.take() else {
            return;
        };

        match rx.try_recv() {
            Ok(LoadResult::Read(raw)) => self.start_parse(raw),
            Ok(LoadResult::Parsed { raw, parsed }) => self.finish_load(raw, parsed),
            Ok(LoadResult::Error(message)) => {
                error!(%message, "file read failed");
                self.is_loading = false;
                self.control_panel.busy = false;
                self.control_panel.set_status(StatusKind::Error, message);
            }
            // Put receiver back if still needed
            Err(std::sync::mpsc::TryRecvError::Empty) => self.load_rx = Some(rx),
            Err(std::sync::mpsc::TryRecvError::Disconnected) => {
                self.is_loading = false;
                self.control_panel.busy = false;
                self.control_panel
                    .set_status(StatusKind::Error, "Loader stopped unexpectedly");
            }
        }
    }

    fn report_loaded(&mut self) {
        let (name, rows) = match (self.session.source_name(), self.session.dataset()) {
            (Some(name), Some(ds)) => (name.to_string(), ds.height()),
            _ => return,
        };
        self.control_panel
            .set_status(StatusKind::Success, format!("Loaded {} rows from {}", rows, name));
    }

    /// Recompute the dashboard after the data or the filters changed.
    fn rebuild_view(&mut self) {
        match self.session.view() {
            Ok(view) => self.chart_viewer.set_view(view),
            Err(e) => {
                error!(error = %e, "filtering failed");
                self.chart_viewer.set_error(e.to_string());
            }
        }
        self.control_panel.sync_dates(&self.session);
    }

    fn filters_changed(&mut self) {
        self.chart_viewer.insight = None;
        self.rebuild_view();
    }

    /// A pending answer describes data that is no longer shown.
    fn discard_insight(&mut self) {
        self.insight_rx = None;
        self.chart_viewer.clear();
    }

    fn handle_use_sample(&mut self) {
        if self.session.load(RawSource::sample()).is_ok() {
            self.report_loaded();
        } else if let Some(message) = self.session.last_error() {
            self.control_panel.set_status(StatusKind::Error, message.to_string());
        }
        self.discard_insight();
        self.rebuild_view();
    }

    fn handle_refresh(&mut self) {
        match self.session.refresh() {
            Ok(()) => self.report_loaded(),
            Err(e) => self
                .control_panel
                .set_status(StatusKind::Error, format!("Refresh failed: {}", e)),
        }
        self.chart_viewer.insight = None;
        self.rebuild_view();
    }

    /// Start an insight request in a background thread
    fn start_insights(&mut self) {
        if self.insight_rx.is_some() {
            return;
        }
        let Some(view) = &self.chart_viewer.view else {
            return;
        };
        let context = self.session.insight_context(view);
        let generator = self.generator.clone();

        let (tx, rx) = channel();
        self.insight_rx = Some(rx);
        self.chart_viewer.insight_pending = true;

        thread::spawn(move || {
            let _ = tx.send(generator.generate(&context));
        });
    }

    fn check_insight_results(&mut self) {
        let Some(rx) = self.insight_rx.take() else {
            return;
        };
        match rx.try_recv() {
            Ok(insight) => {
                match &insight.reason {
                    Some(reason) => self
                        .control_panel
                        .set_status(StatusKind::Info, format!("Insights unavailable: {}", reason)),
                    None => self.control_panel.set_status(StatusKind::Success, "Insights ready"),
                }
                self.chart_viewer.insight = Some(insight);
                self.chart_viewer.insight_pending = false;
            }
            Err(std::sync::mpsc::TryRecvError::Empty) => self.insight_rx = Some(rx),
            Err(std::sync::mpsc::TryRecvError::Disconnected) => {
                self.chart_viewer.insight = Some(Insight::fallback());
                self.chart_viewer.insight_pending = false;
            }
        }
    }

    /// Ask where to save, then write. `Ok(None)` means the user cancelled.
    fn save_export(stem: &str, kind: ExportKind, bytes: Vec<u8>) -> anyhow::Result<Option<PathBuf>> {
        let Some(path) = rfd::FileDialog::new()
            .add_filter(kind.filter_name(), &[kind.extension()])
            .set_file_name(Exporter::file_name(stem, kind))
            .save_file()
        else {
            return Ok(None);
        };
        Exporter::write_to(&path, &bytes)
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(Some(path))
    }

    fn export_bytes(&self, target: ExportTarget) -> anyhow::Result<(String, ExportKind, Vec<u8>)> {
        let view = self.chart_viewer.view.as_ref().context("no data to export")?;
        match target {
            ExportTarget::Filtered => Ok((
                "filtered_sales".to_string(),
                ExportKind::Csv,
                Exporter::dataset_csv(&view.filtered)?,
            )),
            ExportTarget::ChartCsv(id) => {
                let panel = view.chart(id).with_context(|| format!("{} is not shown", id.title()))?;
                let bytes = match &panel.result {
                    Some(result) => Exporter::aggregation_csv(result)?,
                    None => Exporter::model_csv(&panel.model)?
                        .with_context(|| format!("{} has no data", id.title()))?,
                };
                Ok((id.file_stem().to_string(), ExportKind::Csv, bytes))
            }
            ExportTarget::ChartPng(id) => {
                let panel = view.chart(id).with_context(|| format!("{} is not shown", id.title()))?;
                Ok((
                    id.file_stem().to_string(),
                    ExportKind::Png,
                    Exporter::chart_png(&panel.model, DEFAULT_WIDTH, DEFAULT_HEIGHT)?,
                ))
            }
        }
    }

    fn handle_export(&mut self, target: ExportTarget) {
        let outcome = self
            .export_bytes(target)
            .and_then(|(stem, kind, bytes)| Self::save_export(&stem, kind, bytes));
        match outcome {
            Ok(Some(path)) => self
                .control_panel
                .set_status(StatusKind::Success, format!("Saved {}", path.display())),
            Ok(None) => {}
            Err(e) => {
                error!(error = %format!("{:#}", e), "export failed");
                self.control_panel
                    .set_status(StatusKind::Error, format!("Export failed: {:#}", e));
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum ExportTarget {
    Filtered,
    ChartCsv(ChartId),
    ChartPng(ChartId),
}

impl eframe::App for SalesDashboardApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // Check for background results
        self.check_load_results();
        self.check_insight_results();

        // Request repaint while background work is running
        if self.is_loading || self.insight_rx.is_some() {
            ctx.request_repaint();
        }

        // Left panel - Control Panel
        SidePanel::left("control_panel")
            .min_width(300.0)
            .max_width(350.0)
            .show(ctx, |ui| {
                egui::ScrollArea::vertical().show(ui, |ui| {
                    let insights_ready = self.insight_rx.is_none();
                    let action = self.control_panel.show(ui, &self.session, insights_ready);

                    match action {
                        ControlPanelAction::BrowseFile => self.handle_browse_file(),
                        ControlPanelAction::UseSample => self.handle_use_sample(),
                        ControlPanelAction::Refresh => self.handle_refresh(),
                        ControlPanelAction::SetDates(range) => {
                            self.session.set_dates(range);
                            self.filters_changed();
                        }
                        ControlPanelAction::Toggle(dimension, value) => {
                            self.session.toggle(dimension, &value);
                            self.filters_changed();
                        }
                        ControlPanelAction::ClearDimension(dimension) => {
                            self.session.clear_selection(dimension);
                            self.filters_changed();
                        }
                        ControlPanelAction::ResetFilters => {
                            self.session.reset_filters();
                            self.filters_changed();
                        }
                        ControlPanelAction::ExportFiltered => self.handle_export(ExportTarget::Filtered),
                        ControlPanelAction::GenerateInsights => self.start_insights(),
                        ControlPanelAction::None => {}
                    }
                });
            });

        // Central panel - Dashboard
        egui::CentralPanel::default().show(ctx, |ui| match self.chart_viewer.show(ui) {
            ViewerAction::DownloadCsv(id) => self.handle_export(ExportTarget::ChartCsv(id)),
            ViewerAction::DownloadPng(id) => self.handle_export(ExportTarget::ChartPng(id)),
            ViewerAction::None => {}
        });
    }
}
