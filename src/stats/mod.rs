//! Stats module - aggregation and summary statistics

mod aggregate;
mod calculator;

pub use aggregate::{
    AggregateError, AggregateRow, AggregationResult, Aggregator, Grouping, Measure, MISSING_KEY,
};
pub use calculator::{
    BoxStats, CorrelationMatrix, Forecast, HistogramBin, Kpis, PerformanceSegment, RevenueGrowth,
    SalesSummary, SegmentRow, StatsCalculator, HISTOGRAM_BINS, MIN_FORECAST_HISTORY,
};
