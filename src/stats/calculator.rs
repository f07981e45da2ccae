//! Statistics Calculator Module
//! Descriptive statistics, KPIs, growth, trend forecast and performance segments.
//! Also the distribution views: histogram bins, box plot figures and correlations.

use crate::data::schema::{self, Dimension};
use crate::data::Dataset;
use crate::stats::aggregate::{AggregateError, AggregationResult, Aggregator, Grouping};
use chrono::{Months, NaiveDate};
use statrs::statistics::Statistics;
use std::collections::BTreeSet;
use std::fmt;

/// Months of history needed before a trend line is fitted.
pub const MIN_FORECAST_HISTORY: usize = 3;

/// Bins in the sales histogram.
pub const HISTOGRAM_BINS: usize = 20;

/// Whisker reach in interquartile ranges.
const WHISKER_IQR: f64 = 1.5;

/// Descriptive statistics of the sales column.
#[derive(Debug, Clone, PartialEq)]
pub struct SalesSummary {
    pub count: usize,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub p25: f64,
    pub median: f64,
    pub p75: f64,
    pub max: f64,
}

impl Default for SalesSummary {
    fn default() -> Self {
        Self {
            count: 0,
            mean: f64::NAN,
            std: f64::NAN,
            min: f64::NAN,
            p25: f64::NAN,
            median: f64::NAN,
            p75: f64::NAN,
            max: f64::NAN,
        }
    }
}

/// Headline numbers shown above the charts.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Kpis {
    pub total_sales: f64,
    pub total_profit: f64,
    /// Profit as a percentage of sales, `None` when sales are zero.
    pub profit_margin: Option<f64>,
    pub avg_transaction: f64,
    pub revenue_per_day: f64,
    pub orders: usize,
    /// Distinct regions present.
    pub market_penetration: usize,
    /// Distinct categories present.
    pub product_diversity: usize,
    /// Region with the largest sales sum and that sum.
    pub best_region: Option<(String, f64)>,
    /// Category with the largest sales sum and that sum.
    pub best_category: Option<(String, f64)>,
    /// Non-null cells as a percentage of all cells.
    pub data_quality: f64,
}

/// One equal-width histogram bucket; the last bucket includes its upper edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistogramBin {
    pub start: f64,
    pub end: f64,
    pub count: usize,
}

/// Five-number box with Tukey whiskers.
#[derive(Debug, Clone, PartialEq)]
pub struct BoxStats {
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    /// Smallest value within 1.5 IQR below `q1`.
    pub lower_whisker: f64,
    /// Largest value within 1.5 IQR above `q3`.
    pub upper_whisker: f64,
    pub outliers: Vec<f64>,
}

/// Pearson coefficients between numeric columns, row-major and symmetric.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationMatrix {
    pub columns: Vec<String>,
    /// NaN where fewer than two complete pairs exist or a column is constant.
    pub values: Vec<Vec<f64>>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RevenueGrowth {
    /// First month to last month, in percent.
    pub total_pct: f64,
    /// Mean month-over-month change, in percent.
    pub avg_monthly_pct: f64,
}

/// Linear trend over monthly sales and its projection.
#[derive(Debug, Clone, PartialEq)]
pub struct Forecast {
    pub slope: f64,
    pub intercept: f64,
    pub history: Vec<(String, f64)>,
    pub projected: Vec<(String, f64)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PerformanceSegment {
    Low,
    MediumLow,
    MediumHigh,
    High,
}

impl PerformanceSegment {
    pub const ALL: [PerformanceSegment; 4] = [
        PerformanceSegment::Low,
        PerformanceSegment::MediumLow,
        PerformanceSegment::MediumHigh,
        PerformanceSegment::High,
    ];
}

impl fmt::Display for PerformanceSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PerformanceSegment::Low => "Low",
            PerformanceSegment::MediumLow => "Medium-Low",
            PerformanceSegment::MediumHigh => "Medium-High",
            PerformanceSegment::High => "High",
        })
    }
}

/// Count and sales sum of one performance bucket.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentRow {
    pub segment: PerformanceSegment,
    pub count: usize,
    pub sales: f64,
}

/// Handles statistical calculations over datasets and aggregations.
pub struct StatsCalculator;

impl StatsCalculator {
    /// Descriptive statistics for an array of values.
    pub fn summarize(values: &[f64]) -> SalesSummary {
        let n = values.len();
        if n == 0 {
            return SalesSummary::default();
        }

        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let std = if n > 1 { values.iter().std_dev() } else { 0.0 };

        SalesSummary {
            count: n,
            mean: values.iter().mean(),
            std,
            min: sorted[0],
            p25: Self::percentile(&sorted, 25.0),
            median: Self::percentile(&sorted, 50.0),
            p75: Self::percentile(&sorted, 75.0),
            max: sorted[n - 1],
        }
    }

    /// Calculate percentile using linear interpolation (NumPy compatible).
    pub fn percentile(sorted_values: &[f64], p: f64) -> f64 {
        let n = sorted_values.len();
        if n == 0 {
            return f64::NAN;
        }
        if n == 1 {
            return sorted_values[0];
        }

        let rank = (p / 100.0) * (n - 1) as f64;
        let lower = rank.floor() as usize;
        let upper = (rank.ceil() as usize).min(n - 1);
        let frac = rank - lower as f64;

        if lower == upper {
            sorted_values[lower]
        } else {
            sorted_values[lower] * (1.0 - frac) + sorted_values[upper] * frac
        }
    }

    pub fn sales_summary(dataset: &Dataset) -> Result<SalesSummary, AggregateError> {
        Ok(Self::summarize(&dataset.measure_values(schema::SALES_COL)?))
    }

    pub fn kpis(dataset: &Dataset) -> Result<Kpis, AggregateError> {
        let sales = dataset.measure_values(schema::SALES_COL)?;
        let profit = dataset.measure_values(schema::PROFIT_COL)?;
        let orders = dataset.height();

        let total_sales: f64 = sales.iter().sum();
        let total_profit: f64 = profit.iter().sum();
        let active_days = dataset
            .dates()?
            .into_iter()
            .flatten()
            .collect::<BTreeSet<NaiveDate>>()
            .len();

        Ok(Kpis {
            total_sales,
            total_profit,
            profit_margin: (total_sales != 0.0).then(|| total_profit / total_sales * 100.0),
            avg_transaction: if orders > 0 { total_sales / orders as f64 } else { 0.0 },
            revenue_per_day: total_sales / active_days.max(1) as f64,
            orders,
            market_penetration: dataset.unique_values(Dimension::Region).len(),
            product_diversity: dataset.unique_values(Dimension::Category).len(),
            best_region: Self::leader(dataset, Dimension::Region),
            best_category: Self::leader(dataset, Dimension::Category),
            data_quality: dataset.completeness(),
        })
    }

    /// Group with the largest sales sum; missing keys never lead.
    fn leader(dataset: &Dataset, dimension: Dimension) -> Option<(String, f64)> {
        let result = Aggregator::aggregate(dataset, Grouping::Dimension(dimension)).ok()?;
        let leader = result.known_rows().next().map(|row| (row.label(), row.sales));
        leader
    }

    /// Equal-width bins between the smallest and largest value.
    pub fn histogram(values: &[f64], bins: usize) -> Vec<HistogramBin> {
        let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
        if finite.is_empty() || bins == 0 {
            return Vec::new();
        }

        let (mut lo, mut hi) = finite
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(*v), hi.max(*v)));
        if lo == hi {
            lo -= 0.5;
            hi += 0.5;
        }
        let width = (hi - lo) / bins as f64;

        let mut out: Vec<HistogramBin> = (0..bins)
            .map(|i| HistogramBin {
                start: lo + width * i as f64,
                end: if i + 1 == bins { hi } else { lo + width * (i + 1) as f64 },
                count: 0,
            })
            .collect();
        for v in finite {
            let slot = (((v - lo) / width).floor() as usize).min(bins - 1);
            out[slot].count += 1;
        }
        out
    }

    /// Quartiles, whiskers and outliers; `None` for no finite values.
    pub fn box_stats(values: &[f64]) -> Option<BoxStats> {
        let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
        if sorted.is_empty() {
            return None;
        }
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let q1 = Self::percentile(&sorted, 25.0);
        let q3 = Self::percentile(&sorted, 75.0);
        let reach = WHISKER_IQR * (q3 - q1);
        let (low_fence, high_fence) = (q1 - reach, q3 + reach);

        let inside = sorted.iter().copied().filter(|v| *v >= low_fence && *v <= high_fence);
        let lower_whisker = inside.clone().next().unwrap_or(q1);
        let upper_whisker = inside.last().unwrap_or(q3);

        Some(BoxStats {
            q1,
            median: Self::percentile(&sorted, 50.0),
            q3,
            lower_whisker,
            upper_whisker,
            outliers: sorted
                .iter()
                .copied()
                .filter(|v| *v < low_fence || *v > high_fence)
                .collect(),
        })
    }

    /// Pairwise-complete Pearson correlation of every numeric column but the date.
    /// `None` with fewer than two numeric columns.
    pub fn correlation(dataset: &Dataset) -> Result<Option<CorrelationMatrix>, AggregateError> {
        let columns = dataset.numeric_columns();
        if columns.len() < 2 {
            return Ok(None);
        }
        let data = columns
            .iter()
            .map(|c| dataset.numeric_values(c))
            .collect::<Result<Vec<_>, _>>()?;

        let values = data
            .iter()
            .map(|a| data.iter().map(|b| Self::pearson(a, b)).collect())
            .collect();
        Ok(Some(CorrelationMatrix { columns, values }))
    }

    /// Pearson r over rows where both values are present.
    pub fn pearson(a: &[Option<f64>], b: &[Option<f64>]) -> f64 {
        let (x, y): (Vec<f64>, Vec<f64>) = a
            .iter()
            .zip(b)
            .filter_map(|(x, y)| Some(((*x)?, (*y)?)))
            .unzip();
        if x.len() < 2 {
            return f64::NAN;
        }
        let (sx, sy) = (x.iter().std_dev(), y.iter().std_dev());
        if sx == 0.0 || sy == 0.0 {
            return f64::NAN;
        }
        (x.iter().covariance(y.iter()) / (sx * sy)).clamp(-1.0, 1.0)
    }

    /// Growth across a monthly aggregation; `None` with fewer than two months.
    pub fn revenue_growth(monthly: &AggregationResult) -> Option<RevenueGrowth> {
        if monthly.grouping != Grouping::Month {
            return None;
        }
        let sales: Vec<f64> = monthly.known_rows().map(|r| r.sales).collect();
        if sales.len() < 2 {
            return None;
        }

        let first = sales[0];
        let last = sales[sales.len() - 1];
        let total_pct = if first != 0.0 {
            (last - first) / first * 100.0
        } else {
            f64::NAN
        };

        let changes: Vec<f64> = sales
            .windows(2)
            .filter(|w| w[0] != 0.0)
            .map(|w| (w[1] - w[0]) / w[0] * 100.0)
            .collect();
        let avg_monthly_pct = if changes.is_empty() {
            f64::NAN
        } else {
            changes.iter().mean()
        };

        Some(RevenueGrowth {
            total_pct,
            avg_monthly_pct,
        })
    }

    /// Least-squares trend over monthly sales, projected `periods` months ahead.
    pub fn forecast(monthly: &AggregationResult, periods: usize) -> Option<Forecast> {
        if monthly.grouping != Grouping::Month {
            return None;
        }
        let history: Vec<(String, f64)> = monthly
            .known_rows()
            .map(|r| (r.label(), r.sales))
            .collect();
        if history.len() < MIN_FORECAST_HISTORY {
            return None;
        }

        let x: Vec<f64> = (0..history.len()).map(|i| i as f64).collect();
        let y: Vec<f64> = history.iter().map(|(_, v)| *v).collect();
        let slope = x.iter().covariance(y.iter()) / x.iter().variance();
        let intercept = y.iter().mean() - slope * x.iter().mean();

        let last_month = history
            .last()
            .and_then(|(label, _)| NaiveDate::parse_from_str(&format!("{label}-01"), "%Y-%m-%d").ok())?;

        let projected = (1..=periods)
            .filter_map(|step| {
                let month = last_month.checked_add_months(Months::new(step as u32))?;
                let xi = (history.len() - 1 + step) as f64;
                Some((month.format("%Y-%m").to_string(), intercept + slope * xi))
            })
            .collect();

        Some(Forecast {
            slope,
            intercept,
            history,
            projected,
        })
    }

    /// Bucket positive values by quartile; values at or below zero are left out.
    pub fn segment_performance(values: &[f64]) -> Vec<SegmentRow> {
        let mut sorted: Vec<f64> = values.iter().copied().filter(|v| *v > 0.0).collect();
        if sorted.is_empty() {
            return Vec::new();
        }
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let q1 = Self::percentile(&sorted, 25.0);
        let q2 = Self::percentile(&sorted, 50.0);
        let q3 = Self::percentile(&sorted, 75.0);

        let mut rows: Vec<SegmentRow> = PerformanceSegment::ALL
            .into_iter()
            .map(|segment| SegmentRow {
                segment,
                count: 0,
                sales: 0.0,
            })
            .collect();

        for v in sorted {
            let slot = if v <= q1 {
                0
            } else if v <= q2 {
                1
            } else if v <= q3 {
                2
            } else {
                3
            };
            rows[slot].count += 1;
            rows[slot].sales += v;
        }

        rows.retain(|r| r.count > 0);
        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::aggregate::AggregateRow;
    use polars::prelude::*;

    fn monthly(values: &[(&str, f64)]) -> AggregationResult {
        AggregationResult {
            grouping: Grouping::Month,
            rows: values
                .iter()
                .map(|(k, v)| AggregateRow {
                    keys: vec![Some(k.to_string())],
                    sales: *v,
                    profit: 0.0,
                    quantity: 0.0,
                    count: 1,
                })
                .collect(),
        }
    }

    #[test]
    fn summary_uses_numpy_percentiles() {
        let s = StatsCalculator::summarize(&[4.0, 1.0, 3.0, 2.0]);
        assert_eq!(s.count, 4);
        assert!((s.mean - 2.5).abs() < 1e-12);
        assert!((s.median - 2.5).abs() < 1e-12);
        assert!((s.p25 - 1.75).abs() < 1e-12);
        assert!((s.p75 - 3.25).abs() < 1e-12);
        assert_eq!((s.min, s.max), (1.0, 4.0));
        assert!((s.std - 1.2909944487358056).abs() < 1e-9);
    }

    #[test]
    fn empty_summary_is_nan() {
        let s = StatsCalculator::summarize(&[]);
        assert_eq!(s.count, 0);
        assert!(s.mean.is_nan());
        assert_eq!(StatsCalculator::summarize(&[7.0]).std, 0.0);
    }

    #[test]
    fn kpis_count_distinct_regions_and_categories() {
        let df = DataFrame::new(vec![
            Column::new("Order Date".into(), vec!["2023-01-01", "2023-01-01", "2023-01-03"]),
            Column::new("Region".into(), vec!["East", "West", "East"]),
            Column::new("Category".into(), vec!["Tech", "Tech", "Tech"]),
            Column::new("Sales".into(), vec![100.0, 50.0, 150.0]),
            Column::new("Profit".into(), vec![30.0, -10.0, 10.0]),
        ])
        .unwrap();
        let ds = Dataset::from_frame(df, "t").unwrap();
        let kpis = StatsCalculator::kpis(&ds).unwrap();

        assert_eq!(kpis.total_sales, 300.0);
        assert_eq!(kpis.orders, 3);
        assert_eq!(kpis.avg_transaction, 100.0);
        assert_eq!(kpis.revenue_per_day, 150.0);
        assert!((kpis.profit_margin.unwrap() - 10.0).abs() < 1e-9);
        assert_eq!(kpis.market_penetration, 2);
        assert_eq!(kpis.product_diversity, 1);
    }

    #[test]
    fn kpis_name_top_region_and_category_and_score_completeness() {
        let df = DataFrame::new(vec![
            Column::new("Order Date".into(), vec!["2023-01-01", "2023-01-02", "2023-01-03", "2023-01-04"]),
            Column::new("Region".into(), vec![Some("East"), Some("West"), Some("West"), None]),
            Column::new("Category".into(), vec!["Tech", "Office", "Tech", "Office"]),
            Column::new("Sales".into(), vec![Some(100.0), Some(60.0), Some(50.0), None]),
        ])
        .unwrap();
        let ds = Dataset::from_frame(df, "t").unwrap();
        let kpis = StatsCalculator::kpis(&ds).unwrap();

        assert_eq!(kpis.best_region, Some(("West".to_string(), 110.0)));
        assert_eq!(kpis.best_category, Some(("Tech".to_string(), 150.0)));
        // 2 nulls in 16 cells
        assert!((kpis.data_quality - 87.5).abs() < 1e-9);
    }

    #[test]
    fn kpis_of_an_empty_table() {
        let df = DataFrame::new(vec![
            Column::new("Order Date".into(), Vec::<&str>::new()),
            Column::new("Region".into(), Vec::<&str>::new()),
            Column::new("Sales".into(), Vec::<f64>::new()),
        ])
        .unwrap();
        let kpis = StatsCalculator::kpis(&Dataset::from_frame(df, "t").unwrap()).unwrap();
        assert_eq!(kpis.best_region, None);
        assert_eq!(kpis.best_category, None);
        assert_eq!(kpis.data_quality, 100.0);
    }

    #[test]
    fn histogram_spans_min_to_max_in_equal_bins() {
        let values: Vec<f64> = (0..=100).map(f64::from).collect();
        let bins = StatsCalculator::histogram(&values, HISTOGRAM_BINS);
        assert_eq!(bins.len(), 20);
        assert_eq!(bins[0].start, 0.0);
        assert_eq!(bins[19].end, 100.0);
        assert!((bins[0].end - 5.0).abs() < 1e-12);
        assert_eq!(bins.iter().map(|b| b.count).sum::<usize>(), 101);
        // 95..=100 lands in the last bin
        assert_eq!(bins[19].count, 6);
    }

    #[test]
    fn histogram_of_constant_values_has_a_width() {
        let bins = StatsCalculator::histogram(&[3.0, 3.0], 4);
        assert_eq!(bins.len(), 4);
        assert!(bins[0].start < 3.0 && bins[3].end > 3.0);
        assert_eq!(bins.iter().map(|b| b.count).sum::<usize>(), 2);
        assert!(StatsCalculator::histogram(&[], 20).is_empty());
    }

    #[test]
    fn box_stats_flag_points_beyond_the_whiskers() {
        let b = StatsCalculator::box_stats(&[1.0, 2.0, 3.0, 4.0, 5.0, 100.0]).unwrap();
        assert!((b.q1 - 2.25).abs() < 1e-12);
        assert!((b.median - 3.5).abs() < 1e-12);
        assert!((b.q3 - 4.75).abs() < 1e-12);
        assert_eq!(b.lower_whisker, 1.0);
        assert_eq!(b.upper_whisker, 5.0);
        assert_eq!(b.outliers, vec![100.0]);
        assert!(StatsCalculator::box_stats(&[]).is_none());
    }

    #[test]
    fn pearson_skips_incomplete_pairs() {
        let a = [Some(1.0), Some(2.0), Some(3.0), None];
        let b = [Some(2.0), Some(4.0), Some(6.0), Some(100.0)];
        assert!((StatsCalculator::pearson(&a, &b) - 1.0).abs() < 1e-12);

        let c = [Some(3.0), Some(2.0), Some(1.0), Some(0.0)];
        assert!((StatsCalculator::pearson(&a, &c) + 1.0).abs() < 1e-12);
        assert!(StatsCalculator::pearson(&a, &[Some(5.0); 4]).is_nan());
    }

    #[test]
    fn correlation_covers_numeric_columns_except_the_date() {
        let df = DataFrame::new(vec![
            Column::new("Order Date".into(), vec!["2023-01-01", "2023-01-02", "2023-01-03"]),
            Column::new("Region".into(), vec!["East", "West", "East"]),
            Column::new("Sales".into(), vec![10.0, 20.0, 30.0]),
            Column::new("Profit".into(), vec![3.0, 2.0, 1.0]),
            Column::new("Quantity".into(), vec![1i64, 2, 3]),
        ])
        .unwrap();
        let ds = Dataset::from_frame(df, "t").unwrap();
        let m = StatsCalculator::correlation(&ds).unwrap().unwrap();

        assert_eq!(m.columns, vec!["Sales", "Profit", "Quantity"]);
        assert!((m.values[0][0] - 1.0).abs() < 1e-12);
        assert!((m.values[0][1] + 1.0).abs() < 1e-12);
        assert!((m.values[0][2] - 1.0).abs() < 1e-12);
        assert_eq!(m.values[1][2], m.values[2][1]);
    }

    #[test]
    fn correlation_needs_two_numeric_columns() {
        let df = DataFrame::new(vec![
            Column::new("Order Date".into(), vec!["2023-01-01"]),
            Column::new("Sales".into(), vec![10.0]),
        ])
        .unwrap();
        let ds = Dataset::from_frame(df, "t").unwrap();
        assert!(StatsCalculator::correlation(&ds).unwrap().is_none());
    }

    #[test]
    fn growth_needs_two_months() {
        assert!(StatsCalculator::revenue_growth(&monthly(&[("2023-01", 10.0)])).is_none());

        let g = StatsCalculator::revenue_growth(&monthly(&[
            ("2023-01", 100.0),
            ("2023-02", 150.0),
            ("2023-03", 120.0),
        ]))
        .unwrap();
        assert!((g.total_pct - 20.0).abs() < 1e-9);
        assert!((g.avg_monthly_pct - 15.0).abs() < 1e-9);
    }

    #[test]
    fn forecast_extends_a_perfect_line() {
        let f = StatsCalculator::forecast(
            &monthly(&[("2023-11", 10.0), ("2023-12", 20.0), ("2024-01", 30.0)]),
            2,
        )
        .unwrap();
        assert!((f.slope - 10.0).abs() < 1e-9);
        assert!((f.intercept - 10.0).abs() < 1e-9);
        assert_eq!(f.projected[0].0, "2024-02");
        assert!((f.projected[0].1 - 40.0).abs() < 1e-9);
        assert_eq!(f.projected[1].0, "2024-03");
    }

    #[test]
    fn forecast_requires_three_months() {
        assert!(StatsCalculator::forecast(&monthly(&[("2023-01", 1.0), ("2023-02", 2.0)]), 6).is_none());
    }

    #[test]
    fn segments_split_on_quartiles() {
        let rows = StatsCalculator::segment_performance(&[1.0, 2.0, 3.0, 4.0, 5.0, 0.0, -3.0]);
        let counts: Vec<usize> = rows.iter().map(|r| r.count).collect();
        assert_eq!(counts.iter().sum::<usize>(), 5);
        assert_eq!(rows[0].segment, PerformanceSegment::Low);
        assert_eq!(rows.last().unwrap().segment, PerformanceSegment::High);
        assert_eq!(PerformanceSegment::MediumHigh.to_string(), "Medium-High");
    }
}
