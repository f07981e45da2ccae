//! Aggregation Module
//! Groups a filtered dataset and sums its measures per group.

use crate::data::schema::{self, Dimension};
use crate::data::Dataset;
use chrono::{Datelike, NaiveDate};
use polars::prelude::*;
use rayon::prelude::*;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// Label shown for records whose grouping value is null or blank.
pub const MISSING_KEY: &str = "(missing)";

const WEEKDAYS: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

#[derive(Error, Debug)]
pub enum AggregateError {
    #[error("Column '{0}' is not present in the data")]
    MissingColumn(String),
    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),
}

/// How records are bucketed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Grouping {
    Dimension(Dimension),
    Month,
    Day,
    Weekday,
    Pair(Dimension, Dimension),
}

impl Grouping {
    /// Header(s) of the key column(s) in exported tables.
    pub fn key_columns(&self) -> Vec<String> {
        match self {
            Grouping::Dimension(d) => vec![d.column_name().to_string()],
            Grouping::Month => vec!["Month".to_string()],
            Grouping::Day => vec!["Day".to_string()],
            Grouping::Weekday => vec!["Weekday".to_string()],
            Grouping::Pair(a, b) => vec![a.column_name().to_string(), b.column_name().to_string()],
        }
    }

    pub fn is_chronological(&self) -> bool {
        matches!(self, Grouping::Month | Grouping::Day | Grouping::Weekday)
    }
}

impl fmt::Display for Grouping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key_columns().join(" / "))
    }
}

/// Numeric quantity a chart or ranking looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Measure {
    Sales,
    Profit,
    Quantity,
    Orders,
}

impl Measure {
    pub fn label(self) -> &'static str {
        match self {
            Measure::Sales => schema::SALES_COL,
            Measure::Profit => schema::PROFIT_COL,
            Measure::Quantity => schema::QUANTITY_COL,
            Measure::Orders => "Orders",
        }
    }
}

/// Sums for one group.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateRow {
    /// `None` for a null or blank cell, kept apart from any real value.
    pub keys: Vec<Option<String>>,
    pub sales: f64,
    pub profit: f64,
    pub quantity: f64,
    pub count: usize,
}

impl AggregateRow {
    fn empty(keys: Vec<Option<String>>) -> Self {
        Self {
            keys,
            sales: 0.0,
            profit: 0.0,
            quantity: 0.0,
            count: 0,
        }
    }

    /// Display text of the `i`-th key.
    pub fn key(&self, i: usize) -> &str {
        self.keys
            .get(i)
            .and_then(|k| k.as_deref())
            .unwrap_or(MISSING_KEY)
    }

    pub fn label(&self) -> String {
        (0..self.keys.len())
            .map(|i| self.key(i))
            .collect::<Vec<_>>()
            .join(" / ")
    }

    pub fn value(&self, measure: Measure) -> f64 {
        match measure {
            Measure::Sales => self.sales,
            Measure::Profit => self.profit,
            Measure::Quantity => self.quantity,
            Measure::Orders => self.count as f64,
        }
    }

    pub fn mean_sales(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sales / self.count as f64
        }
    }

    fn is_missing(&self) -> bool {
        self.keys.iter().any(Option::is_none)
    }
}

/// Ordered per-group sums derived from a dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregationResult {
    pub grouping: Grouping,
    pub rows: Vec<AggregateRow>,
}

impl AggregationResult {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// One row summing every group.
    pub fn totals(&self) -> AggregateRow {
        self.rows
            .iter()
            .fold(AggregateRow::empty(vec![Some("Total".to_string())]), |mut acc, row| {
                acc.sales += row.sales;
                acc.profit += row.profit;
                acc.quantity += row.quantity;
                acc.count += row.count;
                acc
            })
    }

    /// First `n` rows of a ranking.
    pub fn top(mut self, n: usize) -> Self {
        self.rows.truncate(n);
        self
    }

    /// Groups with a known key (drops the `(missing)` bucket).
    pub fn known_rows(&self) -> impl Iterator<Item = &AggregateRow> {
        self.rows.iter().filter(|r| !r.is_missing())
    }

    pub fn labels(&self) -> Vec<String> {
        self.rows.iter().map(AggregateRow::label).collect()
    }

    pub fn values(&self, measure: Measure) -> Vec<f64> {
        self.rows.iter().map(|r| r.value(measure)).collect()
    }

    /// Table form: key column(s), then Sales, Profit, Quantity, Orders, Average Sale.
    pub fn to_dataframe(&self) -> PolarsResult<DataFrame> {
        let mut columns: Vec<Column> = self
            .grouping
            .key_columns()
            .into_iter()
            .enumerate()
            .map(|(i, name)| {
                let keys: Vec<String> = self.rows.iter().map(|r| r.key(i).to_string()).collect();
                Column::new(name.into(), keys)
            })
            .collect();

        columns.push(Column::new(
            schema::SALES_COL.into(),
            self.values(Measure::Sales),
        ));
        columns.push(Column::new(
            schema::PROFIT_COL.into(),
            self.values(Measure::Profit),
        ));
        columns.push(Column::new(
            schema::QUANTITY_COL.into(),
            self.values(Measure::Quantity),
        ));
        columns.push(Column::new(
            "Orders".into(),
            self.rows.iter().map(|r| r.count as u64).collect::<Vec<_>>(),
        ));
        columns.push(Column::new(
            "Average Sale".into(),
            self.rows.iter().map(AggregateRow::mean_sales).collect::<Vec<_>>(),
        ));

        DataFrame::new(columns)
    }
}

/// Computes aggregations over datasets.
pub struct Aggregator;

impl Aggregator {
    /// Aggregate ranked by sales (or chronologically for time groupings).
    pub fn aggregate(dataset: &Dataset, grouping: Grouping) -> Result<AggregationResult, AggregateError> {
        Self::aggregate_by(dataset, grouping, Measure::Sales)
    }

    /// Aggregate, ranking by `rank` descending. Ties keep first-appearance order.
    pub fn aggregate_by(
        dataset: &Dataset,
        grouping: Grouping,
        rank: Measure,
    ) -> Result<AggregationResult, AggregateError> {
        let keys = Self::group_keys(dataset, grouping)?;
        let sales = dataset.measure_values(schema::SALES_COL)?;
        let profit = dataset.measure_values(schema::PROFIT_COL)?;
        let quantity = dataset.measure_values(schema::QUANTITY_COL)?;

        let mut rows: Vec<AggregateRow> = Vec::new();
        let mut index: HashMap<Vec<Option<String>>, usize> = HashMap::new();

        for (i, key) in keys.into_iter().enumerate() {
            let slot = *index.entry(key.clone()).or_insert_with(|| {
                rows.push(AggregateRow::empty(key));
                rows.len() - 1
            });
            let row = &mut rows[slot];
            row.sales += sales[i];
            row.profit += profit[i];
            row.quantity += quantity[i];
            row.count += 1;
        }

        match grouping {
            Grouping::Month | Grouping::Day => {
                rows.sort_by(|a, b| (a.is_missing(), &a.keys).cmp(&(b.is_missing(), &b.keys)));
            }
            Grouping::Weekday => {
                rows.sort_by_key(|r| {
                    WEEKDAYS
                        .iter()
                        .position(|d| r.keys.first().and_then(|k| k.as_deref()) == Some(*d))
                        .unwrap_or(WEEKDAYS.len())
                });
            }
            Grouping::Dimension(_) | Grouping::Pair(_, _) => {
                rows.sort_by(|a, b| {
                    b.value(rank)
                        .partial_cmp(&a.value(rank))
                        .unwrap_or(Ordering::Equal)
                });
            }
        }

        Ok(AggregationResult { grouping, rows })
    }

    /// Run independent aggregations in parallel, preserving request order.
    pub fn aggregate_many(
        dataset: &Dataset,
        requests: &[(Grouping, Measure)],
    ) -> Vec<Result<AggregationResult, AggregateError>> {
        requests
            .par_iter()
            .map(|(grouping, rank)| Self::aggregate_by(dataset, *grouping, *rank))
            .collect()
    }

    fn group_keys(
        dataset: &Dataset,
        grouping: Grouping,
    ) -> Result<Vec<Vec<Option<String>>>, AggregateError> {
        let keys = match grouping {
            Grouping::Dimension(d) => Self::dimension_keys(dataset, d)?
                .into_iter()
                .map(|k| vec![k])
                .collect(),
            Grouping::Month => Self::date_keys(dataset, |d| d.format("%Y-%m").to_string())?,
            Grouping::Day => Self::date_keys(dataset, |d| d.format("%Y-%m-%d").to_string())?,
            Grouping::Weekday => Self::date_keys(dataset, |d| {
                WEEKDAYS[d.weekday().num_days_from_monday() as usize].to_string()
            })?,
            Grouping::Pair(a, b) => Self::dimension_keys(dataset, a)?
                .into_iter()
                .zip(Self::dimension_keys(dataset, b)?)
                .map(|(x, y)| vec![x, y])
                .collect(),
        };
        Ok(keys)
    }

    fn dimension_keys(
        dataset: &Dataset,
        dimension: Dimension,
    ) -> Result<Vec<Option<String>>, AggregateError> {
        let column = dimension.column_name();
        if !dataset.has_column(column) {
            return Err(AggregateError::MissingColumn(column.to_string()));
        }
        Ok(dataset
            .text_values(column)?
            .into_iter()
            .map(|v| v.filter(|s| !schema::is_blank(s)))
            .collect())
    }

    fn date_keys<F>(dataset: &Dataset, format: F) -> Result<Vec<Vec<Option<String>>>, AggregateError>
    where
        F: Fn(NaiveDate) -> String,
    {
        Ok(dataset
            .dates()?
            .into_iter()
            .map(|d| vec![d.map(&format)])
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset() -> Dataset {
        let df = DataFrame::new(vec![
            Column::new(
                "Order Date".into(),
                vec!["2023-02-03", "2023-01-02", "2023-02-10", "2023-01-20", "2023-03-01"],
            ),
            Column::new(
                "Category".into(),
                vec![Some("Tech"), Some("Office"), Some("Tech"), None, Some("Furniture")],
            ),
            Column::new(
                "Sub-Category".into(),
                vec!["Phones", "Paper", "Phones", "Chairs", "Chairs"],
            ),
            Column::new(
                "Sales".into(),
                vec![Some(100.0), Some(50.0), None, Some(30.0), Some(50.0)],
            ),
            Column::new("Profit".into(), vec![10.0, 5.0, -2.0, 3.0, 1.0]),
        ])
        .unwrap();
        Dataset::from_frame(df, "test").unwrap()
    }

    #[test]
    fn group_sums_add_up_to_dataset_totals() {
        let ds = dataset();
        let total_sales: f64 = ds.measure_values("Sales").unwrap().iter().sum();
        let total_profit: f64 = ds.measure_values("Profit").unwrap().iter().sum();

        for grouping in [
            Grouping::Dimension(Dimension::Category),
            Grouping::Month,
            Grouping::Weekday,
            Grouping::Pair(Dimension::Category, Dimension::SubCategory),
        ] {
            let result = Aggregator::aggregate(&ds, grouping).unwrap();
            let totals = result.totals();
            assert!((totals.sales - total_sales).abs() < 1e-9, "{grouping}");
            assert!((totals.profit - total_profit).abs() < 1e-9, "{grouping}");
            assert_eq!(totals.count, ds.height());
        }
    }

    #[test]
    fn ranking_is_descending_with_stable_ties() {
        let result = Aggregator::aggregate(&dataset(), Grouping::Dimension(Dimension::Category)).unwrap();
        // Office and Furniture tie at 50; Office appears first in the input.
        assert_eq!(
            result.labels(),
            vec!["Tech", "Office", "Furniture", MISSING_KEY]
        );
        assert_eq!(result.rows[0].count, 2);
        assert_eq!(result.rows[0].sales, 100.0);
    }

    #[test]
    fn literal_missing_text_is_its_own_group() {
        let df = DataFrame::new(vec![
            Column::new("Order Date".into(), vec!["2023-01-01"; 3]),
            Column::new("Region".into(), vec![Some(MISSING_KEY), None, Some("   ")]),
            Column::new("Sales".into(), vec![5.0, 7.0, 1.0]),
        ])
        .unwrap();
        let ds = Dataset::from_frame(df, "test").unwrap();
        let result = Aggregator::aggregate(&ds, Grouping::Dimension(Dimension::Region)).unwrap();

        // Null and blank cells share one bucket; the literal value does not join it.
        assert_eq!(result.rows.len(), 2);
        assert_eq!(result.rows[0].keys, vec![None]);
        assert_eq!(result.rows[0].count, 2);
        assert_eq!(result.rows[1].keys, vec![Some(MISSING_KEY.to_string())]);
        assert_eq!(result.rows[1].count, 1);
        assert_eq!(result.known_rows().count(), 1);
        assert_eq!(result.labels(), vec![MISSING_KEY, MISSING_KEY]);
    }

    #[test]
    fn months_are_chronological() {
        let result = Aggregator::aggregate(&dataset(), Grouping::Month).unwrap();
        assert_eq!(result.labels(), vec!["2023-01", "2023-02", "2023-03"]);
        assert_eq!(result.values(Measure::Sales), vec![80.0, 100.0, 50.0]);
    }

    #[test]
    fn ranking_by_profit() {
        let result = Aggregator::aggregate_by(
            &dataset(),
            Grouping::Dimension(Dimension::SubCategory),
            Measure::Profit,
        )
        .unwrap();
        assert_eq!(result.labels(), vec!["Phones", "Paper", "Chairs"]);
    }

    #[test]
    fn missing_dimension_column_is_reported() {
        let err = Aggregator::aggregate(&dataset(), Grouping::Dimension(Dimension::Region)).unwrap_err();
        assert!(matches!(err, AggregateError::MissingColumn(c) if c == "Region"));
    }

    #[test]
    fn empty_dataset_gives_empty_result() {
        let ds = dataset();
        let empty = ds.with_frame(ds.frame().head(Some(0)));
        let result = Aggregator::aggregate(&empty, Grouping::Month).unwrap();
        assert!(result.is_empty());
        assert_eq!(result.totals().sales, 0.0);
    }

    #[test]
    fn dataframe_has_key_then_measure_columns() {
        let result = Aggregator::aggregate(
            &dataset(),
            Grouping::Pair(Dimension::Category, Dimension::SubCategory),
        )
        .unwrap();
        let df = result.to_dataframe().unwrap();
        let names: Vec<String> = df.get_column_names().iter().map(|s| s.to_string()).collect();
        assert_eq!(
            names,
            vec!["Category", "Sub-Category", "Sales", "Profit", "Quantity", "Orders", "Average Sale"]
        );
        assert_eq!(df.height(), result.rows.len());
    }

    #[test]
    fn parallel_batch_preserves_order() {
        let ds = dataset();
        let results = Aggregator::aggregate_many(
            &ds,
            &[
                (Grouping::Month, Measure::Sales),
                (Grouping::Dimension(Dimension::Category), Measure::Sales),
            ],
        );
        assert_eq!(results[0].as_ref().unwrap().grouping, Grouping::Month);
        assert_eq!(
            results[1].as_ref().unwrap().grouping,
            Grouping::Dimension(Dimension::Category)
        );
    }
}
