//! Sales Dashboard - interactive sales analytics viewer
//!
//! Filters, aggregates and charts CSV or Excel sales data, with CSV/PNG export.

use anyhow::anyhow;
use eframe::egui;
use sales_dashboard::config::DashboardConfig;
use sales_dashboard::gui::SalesDashboardApp;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = DashboardConfig::from_env();
    info!(
        sample = config.use_sample,
        insights = config.insight.api_key.is_some(),
        "starting sales dashboard"
    );

    // Configure native options
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1400.0, 900.0])
            .with_min_inner_size([1000.0, 700.0])
            .with_title("Sales Dashboard"),
        ..Default::default()
    };

    eframe::run_native(
        "Sales Dashboard",
        options,
        Box::new(move |cc| Ok(Box::new(SalesDashboardApp::new(cc, config)))),
    )
    .map_err(|e| anyhow!("failed to start the dashboard window: {e}"))
}
