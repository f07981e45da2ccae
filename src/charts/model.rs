//! Chart Model
//! Backend-independent description of a chart, built from an aggregation
//! or, for the distribution charts, straight from the filtered records.

use crate::charts::catalog::{ChartId, ChartKind};
use crate::charts::layout::{squarify, TileRect};
use crate::data::{schema, Dataset};
use crate::stats::{
    AggregateError, AggregationResult, BoxStats, CorrelationMatrix, Forecast, HistogramBin, Measure,
    StatsCalculator, HISTOGRAM_BINS,
};
use polars::prelude::{Column, DataFrame, PolarsResult};
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq)]
pub struct Slice {
    pub label: String,
    pub value: f64,
    /// Share of the positive total, 0..=1.
    pub fraction: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScatterPoint {
    pub label: String,
    /// First key of the group, used for colouring.
    pub series: String,
    pub x: f64,
    pub y: f64,
}

/// A parent box of the treemap and its children.
#[derive(Debug, Clone, PartialEq)]
pub struct TreemapGroup {
    pub label: String,
    pub value: f64,
    pub children: Vec<(String, f64)>,
}

/// A laid-out treemap rectangle.
#[derive(Debug, Clone, PartialEq)]
pub struct Tile {
    pub label: String,
    pub value: f64,
    pub rect: TileRect,
    /// 0 for groups, 1 for children.
    pub depth: usize,
    /// Index of the group this tile belongs to.
    pub group: usize,
}

/// Row-major grid of cell values with labelled axes.
#[derive(Debug, Clone, PartialEq)]
pub struct HeatmapGrid {
    /// Header of the row label column in CSV output.
    pub corner: String,
    pub rows: Vec<String>,
    pub columns: Vec<String>,
    /// `cells[row][column]`; NaN marks an undefined cell.
    pub cells: Vec<Vec<f64>>,
}

impl HeatmapGrid {
    /// Smallest and largest finite cell.
    pub fn range(&self) -> Option<(f64, f64)> {
        self.cells
            .iter()
            .flatten()
            .copied()
            .filter(|v| v.is_finite())
            .fold(None, |acc, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }

    /// Position of `value` within `range`, 0..=1; 0.5 for a flat range.
    pub fn intensity(value: f64, range: (f64, f64)) -> f64 {
        let (lo, hi) = range;
        if hi > lo {
            ((value - lo) / (hi - lo)).clamp(0.0, 1.0)
        } else {
            0.5
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChartBody {
    /// Nothing to draw for the current filters.
    Empty,
    Bars {
        measure: Measure,
        bars: Vec<(String, f64)>,
    },
    Slices(Vec<Slice>),
    Series {
        points: Vec<(String, f64)>,
        forecast: Vec<(String, f64)>,
    },
    Treemap(Vec<TreemapGroup>),
    Scatter(Vec<ScatterPoint>),
    Heatmap(HeatmapGrid),
    Histogram(Vec<HistogramBin>),
    BoxPlot(BoxStats),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChartModel {
    pub id: ChartId,
    pub body: ChartBody,
}

impl ChartModel {
    pub fn empty(id: ChartId) -> Self {
        Self {
            id,
            body: ChartBody::Empty,
        }
    }

    /// Distribution chart drawn from the filtered records; aggregated charts come out empty.
    pub fn from_records(id: ChartId, dataset: &Dataset) -> Result<Self, AggregateError> {
        let body = match id {
            ChartId::SalesHistogram => {
                let bins = StatsCalculator::histogram(&Self::sales(dataset)?, HISTOGRAM_BINS);
                if bins.is_empty() {
                    ChartBody::Empty
                } else {
                    ChartBody::Histogram(bins)
                }
            }
            ChartId::SalesBoxPlot => StatsCalculator::box_stats(&Self::sales(dataset)?)
                .map(ChartBody::BoxPlot)
                .unwrap_or(ChartBody::Empty),
            ChartId::Correlation => StatsCalculator::correlation(dataset)?
                .map(Self::correlation_grid)
                .unwrap_or(ChartBody::Empty),
            _ => ChartBody::Empty,
        };
        Ok(Self { id, body })
    }

    /// Present sales values; a file without a sales column has none.
    fn sales(dataset: &Dataset) -> Result<Vec<f64>, AggregateError> {
        if !dataset.has_column(schema::SALES_COL) {
            return Ok(Vec::new());
        }
        Ok(dataset
            .numeric_values(schema::SALES_COL)?
            .into_iter()
            .flatten()
            .collect())
    }

    fn correlation_grid(matrix: CorrelationMatrix) -> ChartBody {
        ChartBody::Heatmap(HeatmapGrid {
            corner: "Column".to_string(),
            rows: matrix.columns.clone(),
            columns: matrix.columns,
            cells: matrix.values,
        })
    }

    /// Map an aggregation onto the chart's kind. Stateless.
    pub fn build(id: ChartId, result: &AggregationResult, forecast: Option<&Forecast>) -> Self {
        if result.is_empty() {
            return Self::empty(id);
        }

        let body = match id.kind() {
            ChartKind::Bar => {
                let limit = id.limit().unwrap_or(usize::MAX);
                ChartBody::Bars {
                    measure: id.measure(),
                    bars: result
                        .rows
                        .iter()
                        .take(limit)
                        .map(|r| (r.label(), r.value(id.measure())))
                        .collect(),
                }
            }
            ChartKind::Pie => Self::slices(result, id.measure()),
            ChartKind::Line => {
                let points: Vec<(String, f64)> = result
                    .known_rows()
                    .map(|r| (r.label(), r.value(id.measure())))
                    .collect();
                if points.is_empty() {
                    ChartBody::Empty
                } else {
                    ChartBody::Series {
                        points,
                        forecast: forecast.map(|f| f.projected.clone()).unwrap_or_default(),
                    }
                }
            }
            ChartKind::Treemap => Self::treemap_groups(result, id.measure()),
            ChartKind::Scatter => ChartBody::Scatter(
                result
                    .rows
                    .iter()
                    .map(|r| ScatterPoint {
                        label: r.label(),
                        series: r.key(0).to_string(),
                        x: r.count as f64,
                        y: r.sales,
                    })
                    .collect(),
            ),
            ChartKind::Heatmap => Self::pivot(result, id.measure()),
            ChartKind::Histogram | ChartKind::BoxPlot => ChartBody::Empty,
        };

        Self { id, body }
    }

    pub fn title(&self) -> String {
        match &self.body {
            ChartBody::Series { forecast, .. } if !forecast.is_empty() => {
                format!("{} (+ {} month forecast)", self.id.title(), forecast.len())
            }
            _ => self.id.title().to_string(),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self.body, ChartBody::Empty)
    }

    /// Chart data as a table for download when no aggregation backs the chart.
    pub fn to_dataframe(&self) -> PolarsResult<Option<DataFrame>> {
        let df = match &self.body {
            ChartBody::Histogram(bins) => DataFrame::new(vec![
                Column::new("bin_start".into(), bins.iter().map(|b| b.start).collect::<Vec<_>>()),
                Column::new("bin_end".into(), bins.iter().map(|b| b.end).collect::<Vec<_>>()),
                Column::new("count".into(), bins.iter().map(|b| b.count as u64).collect::<Vec<_>>()),
            ])?,
            ChartBody::BoxPlot(b) => DataFrame::new(vec![
                Column::new(
                    "statistic".into(),
                    vec!["lower_whisker", "q1", "median", "q3", "upper_whisker", "outliers"],
                ),
                Column::new(
                    "value".into(),
                    vec![b.lower_whisker, b.q1, b.median, b.q3, b.upper_whisker, b.outliers.len() as f64],
                ),
            ])?,
            ChartBody::Heatmap(grid) => {
                let mut columns = vec![Column::new(grid.corner.as_str().into(), grid.rows.clone())];
                for (j, name) in grid.columns.iter().enumerate() {
                    let values: Vec<f64> = grid
                        .cells
                        .iter()
                        .map(|row| row.get(j).copied().unwrap_or(f64::NAN))
                        .collect();
                    columns.push(Column::new(name.as_str().into(), values));
                }
                DataFrame::new(columns)?
            }
            _ => return Ok(None),
        };
        Ok(Some(df))
    }

    /// Two-key aggregation as a grid: first key down, second key across, both
    /// sorted, absent combinations 0. Groups with a missing key are left out.
    fn pivot(result: &AggregationResult, measure: Measure) -> ChartBody {
        let known: Vec<_> = result.known_rows().filter(|r| r.keys.len() >= 2).collect();
        if known.is_empty() {
            return ChartBody::Empty;
        }
        let rows: Vec<String> = known
            .iter()
            .map(|r| r.key(0).to_string())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let columns: Vec<String> = known
            .iter()
            .map(|r| r.key(1).to_string())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let mut cells = vec![vec![0.0; columns.len()]; rows.len()];
        for r in known {
            let i = rows.iter().position(|k| k == r.key(0));
            let j = columns.iter().position(|k| k == r.key(1));
            if let (Some(i), Some(j)) = (i, j) {
                cells[i][j] += r.value(measure);
            }
        }

        let corner = match result.grouping {
            crate::stats::Grouping::Pair(first, _) => first.column_name().to_string(),
            _ => String::new(),
        };
        ChartBody::Heatmap(HeatmapGrid {
            corner,
            rows,
            columns,
            cells,
        })
    }

    fn slices(result: &AggregationResult, measure: Measure) -> ChartBody {
        let positive: Vec<(String, f64)> = result
            .rows
            .iter()
            .map(|r| (r.label(), r.value(measure)))
            .filter(|(_, v)| *v > 0.0)
            .collect();
        let total: f64 = positive.iter().map(|(_, v)| v).sum();
        if total <= 0.0 {
            return ChartBody::Empty;
        }
        ChartBody::Slices(
            positive
                .into_iter()
                .map(|(label, value)| Slice {
                    label,
                    value,
                    fraction: value / total,
                })
                .collect(),
        )
    }

    fn treemap_groups(result: &AggregationResult, measure: Measure) -> ChartBody {
        let mut groups: Vec<TreemapGroup> = Vec::new();
        for row in &result.rows {
            let value = row.value(measure);
            if value <= 0.0 {
                continue;
            }
            let parent = row.key(0).to_string();
            let child = row.key(1).to_string();
            match groups.iter_mut().find(|g| g.label == parent) {
                Some(group) => {
                    group.value += value;
                    group.children.push((child, value));
                }
                None => groups.push(TreemapGroup {
                    label: parent,
                    value,
                    children: vec![(child, value)],
                }),
            }
        }

        if groups.is_empty() {
            return ChartBody::Empty;
        }
        groups.sort_by(|a, b| b.value.partial_cmp(&a.value).unwrap_or(std::cmp::Ordering::Equal));
        for group in &mut groups {
            group
                .children
                .sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        }
        ChartBody::Treemap(groups)
    }

    /// Nested squarified layout inside `bounds`: group tiles first, then their children.
    pub fn treemap_tiles(groups: &[TreemapGroup], bounds: TileRect, pad: f64) -> Vec<Tile> {
        let outer = squarify(
            &groups.iter().map(|g| g.value).collect::<Vec<_>>(),
            bounds,
        );

        let mut tiles: Vec<Tile> = groups
            .iter()
            .zip(&outer)
            .enumerate()
            .map(|(i, (g, rect))| Tile {
                label: g.label.clone(),
                value: g.value,
                rect: *rect,
                depth: 0,
                group: i,
            })
            .collect();

        for (i, (group, rect)) in groups.iter().zip(&outer).enumerate() {
            let values: Vec<f64> = group.children.iter().map(|(_, v)| *v).collect();
            let inner = squarify(&values, rect.shrink(pad));
            tiles.extend(group.children.iter().zip(inner).map(|((label, value), rect)| Tile {
                label: label.clone(),
                value: *value,
                rect,
                depth: 1,
                group: i,
            }));
        }

        tiles
    }
}
