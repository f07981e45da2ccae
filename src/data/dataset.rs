//! Dataset Module
//! Immutable sales table with a normalized order-date column.

use crate::data::schema::{self, Dimension};
use crate::data::DateRange;
use chrono::NaiveDate;
use polars::prelude::*;
use std::collections::BTreeSet;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("File is empty or has no header row")]
    EmptyFile,
    #[error("No order-date column found (expected one of: {})", schema::DATE_COLUMN_CANDIDATES.join(", "))]
    MissingDateColumn,
    #[error("Column '{0}' contains no parsable dates")]
    UnparsableDates(String),
    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),
}

/// One loaded sales table. Filtering produces new datasets; nothing mutates in place.
#[derive(Debug, Clone)]
pub struct Dataset {
    df: DataFrame,
    date_column: String,
    source: String,
}

impl Dataset {
    /// Wrap a freshly parsed frame, coercing its order-date column to `Date`.
    ///
    /// Unparsable cells become null; the column keeps its header and position.
    pub fn from_frame(mut df: DataFrame, source: impl Into<String>) -> Result<Self, ParseError> {
        if df.width() == 0 {
            return Err(ParseError::EmptyFile);
        }

        let date_column = schema::find_date_column(df.get_column_names().iter().map(|s| s.as_str()))
            .ok_or(ParseError::MissingDateColumn)?;

        let column = df.column(&date_column)?;
        let present = column.len() - column.null_count();

        let days: Vec<Option<i32>> = match column.dtype() {
            DataType::Date => column.cast(&DataType::Int32)?.i32()?.into_iter().collect(),
            DataType::Datetime(_, _) => column
                .cast(&DataType::Date)?
                .cast(&DataType::Int32)?
                .i32()?
                .into_iter()
                .collect(),
            _ => {
                let text = column.cast(&DataType::String)?;
                text.str()?
                    .into_iter()
                    .map(|v| v.and_then(schema::parse_date).map(schema::to_epoch_days))
                    .collect()
            }
        };

        if present > 0 && days.iter().all(Option::is_none) {
            return Err(ParseError::UnparsableDates(date_column));
        }

        let normalized = Column::new(date_column.as_str().into(), days).cast(&DataType::Date)?;
        df.with_column(normalized)?;

        Ok(Self {
            df,
            date_column,
            source: source.into(),
        })
    }

    /// Same schema and metadata, different rows.
    pub(crate) fn with_frame(&self, df: DataFrame) -> Self {
        Self {
            df,
            date_column: self.date_column.clone(),
            source: self.source.clone(),
        }
    }

    pub fn frame(&self) -> &DataFrame {
        &self.df
    }

    pub fn date_column(&self) -> &str {
        &self.date_column
    }

    /// Human readable origin (file name or "sample data").
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn height(&self) -> usize {
        self.df.height()
    }

    pub fn is_empty(&self) -> bool {
        self.df.height() == 0
    }

    pub fn column_names(&self) -> Vec<String> {
        self.df
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    /// Same columns in the same order with equal cells (nulls compare equal).
    pub fn same_records(&self, other: &Dataset) -> bool {
        self.date_column == other.date_column && self.df.equals_missing(&other.df)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.df.column(name).is_ok()
    }

    /// Order dates in row order.
    pub fn dates(&self) -> PolarsResult<Vec<Option<NaiveDate>>> {
        let days = self.df.column(&self.date_column)?.cast(&DataType::Int32)?;
        Ok(days
            .i32()?
            .into_iter()
            .map(|d| d.map(schema::from_epoch_days))
            .collect())
    }

    /// Observed min/max order date, `None` when no row has a date.
    pub fn date_bounds(&self) -> Option<DateRange> {
        let dates = self.dates().ok()?;
        let mut present = dates.into_iter().flatten();
        let first = present.next()?;
        let (min, max) = present.fold((first, first), |(lo, hi), d| (lo.min(d), hi.max(d)));
        Some(DateRange::new(min, max))
    }

    /// Cell values of `column` rendered as text, `None` for nulls.
    pub fn text_values(&self, column: &str) -> PolarsResult<Vec<Option<String>>> {
        let text = self.df.column(column)?.cast(&DataType::String)?;
        Ok(text
            .str()?
            .into_iter()
            .map(|v| v.map(str::to_string))
            .collect())
    }

    /// Numeric values of a measure column; nulls and a missing column count as zero.
    pub fn measure_values(&self, column: &str) -> PolarsResult<Vec<f64>> {
        let Ok(series) = self.df.column(column) else {
            return Ok(vec![0.0; self.df.height()]);
        };
        let values = series.cast(&DataType::Float64)?;
        Ok(values
            .f64()?
            .into_iter()
            .map(|v| v.filter(|x| !x.is_nan()).unwrap_or(0.0))
            .collect())
    }

    /// Integer and float columns other than the order date, in frame order.
    pub fn numeric_columns(&self) -> Vec<String> {
        self.df
            .get_columns()
            .iter()
            .filter(|c| c.name().as_str() != self.date_column && c.dtype().is_primitive_numeric())
            .map(|c| c.name().to_string())
            .collect()
    }

    /// Values of a numeric column with nulls and NaN kept as `None`.
    pub fn numeric_values(&self, column: &str) -> PolarsResult<Vec<Option<f64>>> {
        let values = self.df.column(column)?.cast(&DataType::Float64)?;
        Ok(values
            .f64()?
            .into_iter()
            .map(|v| v.filter(|x| !x.is_nan()))
            .collect())
    }

    /// Percentage of cells that are not null; 100 when there are no cells.
    pub fn completeness(&self) -> f64 {
        let cells = self.df.height() * self.df.width();
        if cells == 0 {
            return 100.0;
        }
        let nulls: usize = self.df.get_columns().iter().map(|c| c.null_count()).sum();
        (cells - nulls) as f64 / cells as f64 * 100.0
    }

    /// Sorted distinct non-blank values of a dimension; empty when the column is absent.
    pub fn unique_values(&self, dimension: Dimension) -> Vec<String> {
        self.text_values(dimension.column_name())
            .map(|values| {
                values
                    .into_iter()
                    .flatten()
                    .filter(|v| !schema::is_blank(v))
                    .collect::<BTreeSet<_>>()
                    .into_iter()
                    .collect()
            })
            .unwrap_or_default()
    }
}
