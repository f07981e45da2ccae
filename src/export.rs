//! Export Module
//! Serializes datasets and aggregations to CSV and charts to PNG.

use crate::charts::{ChartModel, RenderError, StaticChartRenderer};
use crate::data::Dataset;
use crate::stats::AggregationResult;
use polars::prelude::*;
use std::path::Path;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Failed to write CSV: {0}")]
    Polars(#[from] PolarsError),
    #[error("Failed to save file: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Render(#[from] RenderError),
}

/// What a download button produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportKind {
    Csv,
    Png,
}

impl ExportKind {
    pub fn extension(self) -> &'static str {
        match self {
            ExportKind::Csv => "csv",
            ExportKind::Png => "png",
        }
    }

    pub fn filter_name(self) -> &'static str {
        match self {
            ExportKind::Csv => "CSV",
            ExportKind::Png => "PNG image",
        }
    }
}

pub struct Exporter;

impl Exporter {
    /// UTF-8 CSV with header, comma separated, columns in dataset order; dates as ISO `YYYY-MM-DD`.
    pub fn dataset_csv(dataset: &Dataset) -> Result<Vec<u8>, ExportError> {
        let mut df = dataset.frame().clone();
        Self::frame_csv(&mut df)
    }

    /// Key column(s) followed by the measure columns, in ranking/chronological order.
    pub fn aggregation_csv(result: &AggregationResult) -> Result<Vec<u8>, ExportError> {
        let mut df = result.to_dataframe()?;
        Self::frame_csv(&mut df)
    }

    /// Table behind a chart drawn from records; `None` when the chart has no data.
    pub fn model_csv(model: &ChartModel) -> Result<Option<Vec<u8>>, ExportError> {
        match model.to_dataframe()? {
            Some(mut df) => Ok(Some(Self::frame_csv(&mut df)?)),
            None => Ok(None),
        }
    }

    fn frame_csv(df: &mut DataFrame) -> Result<Vec<u8>, ExportError> {
        let mut buf = Vec::new();
        CsvWriter::new(&mut buf)
            .include_header(true)
            .with_separator(b',')
            .finish(df)?;
        Ok(buf)
    }

    pub fn chart_png(model: &ChartModel, width: u32, height: u32) -> Result<Vec<u8>, ExportError> {
        Ok(StaticChartRenderer::render_png(model, width, height)?)
    }

    pub fn write_to(path: &Path, bytes: &[u8]) -> Result<(), ExportError> {
        std::fs::write(path, bytes)?;
        info!(path = %path.display(), bytes = bytes.len(), "export saved");
        Ok(())
    }

    /// `<stem>.<ext>` with characters unsafe in file names replaced.
    pub fn file_name(stem: &str, kind: ExportKind) -> String {
        let clean: String = stem
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        format!("{}.{}", clean, kind.extension())
    }
}
