//! Charts module - chart catalog, models and rendering

mod catalog;
mod layout;
mod model;
mod plotter;
mod renderer;

pub use catalog::{ChartId, ChartKind};
pub use layout::{squarify, TileRect};
pub use model::{ChartBody, ChartModel, HeatmapGrid, ScatterPoint, Slice, Tile, TreemapGroup};
pub use plotter::{
    format_cell, format_compact, heat_color, palette_color, ChartPlotter, ACCENT_COLOR, FORECAST_COLOR,
    PALETTE,
};
pub use renderer::{RenderError, StaticChartRenderer, DEFAULT_HEIGHT, DEFAULT_WIDTH};
