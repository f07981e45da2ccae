//! Filter Engine Module
//! Applies date bounds and categorical selections to a dataset.

use crate::data::schema::{to_epoch_days, Dimension};
use crate::data::Dataset;
use chrono::NaiveDate;
use polars::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum FilterError {
    #[error("Filter failed: {0}")]
    Polars(#[from] PolarsError),
}

/// Inclusive date interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// Adjustment made while fitting the user's criteria to the dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterWarning {
    StartClamped { requested: NaiveDate, applied: NaiveDate },
    EndClamped { requested: NaiveDate, applied: NaiveDate },
    InvertedRange { start: NaiveDate, end: NaiveDate },
}

impl fmt::Display for FilterWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterWarning::StartClamped { requested, applied } => write!(
                f,
                "Start date {} is outside the data; using {}",
                requested, applied
            ),
            FilterWarning::EndClamped { requested, applied } => write!(
                f,
                "End date {} is outside the data; using {}",
                requested, applied
            ),
            FilterWarning::InvertedRange { start, end } => write!(
                f,
                "Start date {} is after end date {}; showing the full date range",
                start, end
            ),
        }
    }
}

/// User-selected date range and categorical restrictions.
///
/// An empty (or absent) selection set places no restriction on that dimension.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterCriteria {
    pub dates: Option<DateRange>,
    pub selections: BTreeMap<Dimension, BTreeSet<String>>,
}

impl FilterCriteria {
    pub fn with_dates(mut self, range: DateRange) -> Self {
        self.dates = Some(range);
        self
    }

    pub fn select<I, S>(mut self, dimension: Dimension, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.selections
            .entry(dimension)
            .or_default()
            .extend(values.into_iter().map(Into::into));
        self
    }

    /// Active selection for a dimension, `None` when unrestricted.
    pub fn selected(&self, dimension: Dimension) -> Option<&BTreeSet<String>> {
        self.selections.get(&dimension).filter(|s| !s.is_empty())
    }

    pub fn is_selected(&self, dimension: Dimension, value: &str) -> bool {
        self.selections
            .get(&dimension)
            .is_some_and(|s| s.contains(value))
    }

    pub fn toggle(&mut self, dimension: Dimension, value: &str) {
        let set = self.selections.entry(dimension).or_default();
        if !set.remove(value) {
            set.insert(value.to_string());
        }
    }

    pub fn clear(&mut self, dimension: Dimension) {
        self.selections.remove(&dimension);
    }

    pub fn reset(&mut self) {
        self.dates = None;
        self.selections.clear();
    }

    /// True when no dimension has a non-empty selection.
    pub fn has_no_selections(&self) -> bool {
        self.selections.values().all(BTreeSet::is_empty)
    }

    /// Fit the date range inside the dataset's observed bounds.
    ///
    /// Out-of-range bounds are clamped; an inverted range falls back to the full bounds.
    pub fn clamp_to(&mut self, bounds: Option<DateRange>) -> Vec<FilterWarning> {
        let mut warnings = Vec::new();
        let (Some(range), Some(bounds)) = (self.dates, bounds) else {
            return warnings;
        };

        if range.start > range.end {
            warnings.push(FilterWarning::InvertedRange {
                start: range.start,
                end: range.end,
            });
            self.dates = Some(bounds);
            return warnings;
        }

        let start = range.start.clamp(bounds.start, bounds.end);
        let end = range.end.clamp(bounds.start, bounds.end);
        if start != range.start {
            warnings.push(FilterWarning::StartClamped {
                requested: range.start,
                applied: start,
            });
        }
        if end != range.end {
            warnings.push(FilterWarning::EndClamped {
                requested: range.end,
                applied: end,
            });
        }
        self.dates = Some(DateRange::new(start, end));
        warnings
    }
}

/// Builds and applies row predicates.
pub struct FilterEngine;

impl FilterEngine {
    /// Combined predicate, `None` when the criteria restrict nothing.
    pub fn predicate(dataset: &Dataset, criteria: &FilterCriteria) -> Option<Expr> {
        let mut predicates: Vec<Expr> = Vec::new();

        if let Some(range) = criteria.dates {
            let days = col(dataset.date_column()).cast(DataType::Int32);
            predicates.push(
                days.clone()
                    .gt_eq(lit(to_epoch_days(range.start)))
                    .and(days.lt_eq(lit(to_epoch_days(range.end)))),
            );
        }

        for dimension in Dimension::ALL {
            let Some(values) = criteria.selected(dimension) else {
                continue;
            };
            let column = dimension.column_name();
            if !dataset.has_column(column) {
                // Every record is missing this value, so none can match.
                predicates.push(lit(false));
                continue;
            }
            let text = col(column).cast(DataType::String);
            let any_match = values
                .iter()
                .map(|v| text.clone().eq(lit(v.as_str())))
                .reduce(|a, b| a.or(b));
            if let Some(expr) = any_match {
                predicates.push(expr);
            }
        }

        predicates.into_iter().reduce(|a, b| a.and(b))
    }

    /// Subset of `dataset` matching `criteria`. Never adds or alters records.
    pub fn apply(dataset: &Dataset, criteria: &FilterCriteria) -> Result<Dataset, FilterError> {
        let Some(predicate) = Self::predicate(dataset, criteria) else {
            return Ok(dataset.clone());
        };

        let df = dataset.frame().clone().lazy().filter(predicate).collect()?;
        debug!(
            before = dataset.height(),
            after = df.height(),
            "filter applied"
        );
        Ok(dataset.with_frame(df))
    }

    /// Values offered for a selector, narrowed by selections on its parent dimensions.
    pub fn options(dataset: &Dataset, criteria: &FilterCriteria, dimension: Dimension) -> Vec<String> {
        let mut scoped = FilterCriteria::default();
        for parent in dimension.parents() {
            if let Some(selected) = criteria.selected(*parent) {
                scoped.selections.insert(*parent, selected.clone());
            }
        }

        if scoped.has_no_selections() {
            return dataset.unique_values(dimension);
        }

        match Self::apply(dataset, &scoped) {
            Ok(subset) => subset.unique_values(dimension),
            Err(_) => dataset.unique_values(dimension),
        }
    }

    /// Drop selections a parent change has taken out of their selector's options.
    ///
    /// Parents are pruned before children, so a removed State also narrows City.
    pub fn prune_selections(dataset: &Dataset, criteria: &mut FilterCriteria) -> Vec<(Dimension, String)> {
        let mut dropped = Vec::new();
        for dimension in Dimension::ALL {
            if dimension.parents().is_empty() || criteria.selected(dimension).is_none() {
                continue;
            }
            let offered: BTreeSet<String> = Self::options(dataset, criteria, dimension)
                .into_iter()
                .collect();
            if let Some(set) = criteria.selections.get_mut(&dimension) {
                set.retain(|value| {
                    let keep = offered.contains(value);
                    if !keep {
                        dropped.push((dimension, value.clone()));
                    }
                    keep
                });
            }
        }
        if !dropped.is_empty() {
            debug!(?dropped, "pruned selections no longer offered");
        }
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn dataset() -> Dataset {
        let df = DataFrame::new(vec![
            Column::new(
                "Order Date".into(),
                vec!["2023-01-01", "2023-02-01", "2023-03-01", "2023-03-15"],
            ),
            Column::new(
                "Region".into(),
                vec![Some("A"), Some("B"), Some("A"), None],
            ),
            Column::new("State".into(), vec!["S1", "S2", "S3", "S1"]),
            Column::new("Sales".into(), vec![1.0, 2.0, 3.0, 4.0]),
        ])
        .unwrap();
        Dataset::from_frame(df, "test").unwrap()
    }

    #[test]
    fn date_range_scenario_keeps_two_records() {
        let ds = dataset();
        let criteria =
            FilterCriteria::default().with_dates(DateRange::new(date(2023, 1, 1), date(2023, 2, 1)));
        let out = FilterEngine::apply(&ds, &criteria).unwrap();

        assert_eq!(out.height(), 2);
        let regions: Vec<_> = out.text_values("Region").unwrap().into_iter().flatten().collect();
        assert_eq!(regions, vec!["A", "B"]);
        assert_eq!(out.column_names(), ds.column_names());
    }

    #[test]
    fn every_retained_record_lies_in_range_and_none_is_missed() {
        let ds = dataset();
        let all_dates: Vec<NaiveDate> = ds.dates().unwrap().into_iter().flatten().collect();

        for &a in &all_dates {
            for &b in all_dates.iter().filter(|b| **b >= a) {
                let range = DateRange::new(a, b);
                let out = FilterEngine::apply(&ds, &FilterCriteria::default().with_dates(range))
                    .unwrap();
                let kept: Vec<NaiveDate> = out.dates().unwrap().into_iter().flatten().collect();
                assert!(kept.iter().all(|d| range.contains(*d)));
                let expected = all_dates.iter().filter(|d| range.contains(**d)).count();
                assert_eq!(kept.len(), expected);
            }
        }
    }

    #[test]
    fn missing_region_excluded_only_when_region_selected() {
        let ds = dataset();
        let unrestricted = FilterEngine::apply(&ds, &FilterCriteria::default()).unwrap();
        assert_eq!(unrestricted.height(), 4);

        let criteria = FilterCriteria::default().select(Dimension::Region, ["A"]);
        let out = FilterEngine::apply(&ds, &criteria).unwrap();
        assert_eq!(out.height(), 2);

        let both = FilterCriteria::default().select(Dimension::Region, ["A", "B"]);
        assert_eq!(FilterEngine::apply(&ds, &both).unwrap().height(), 3);
    }

    #[test]
    fn selection_on_absent_column_yields_empty_view() {
        let ds = dataset();
        let criteria = FilterCriteria::default().select(Dimension::City, ["Nowhere"]);
        let out = FilterEngine::apply(&ds, &criteria).unwrap();
        assert!(out.is_empty());
        assert_eq!(out.column_names(), ds.column_names());
    }

    #[test]
    fn clamps_out_of_range_and_resets_inverted_range() {
        let bounds = Some(DateRange::new(date(2023, 1, 1), date(2023, 3, 15)));

        let mut criteria =
            FilterCriteria::default().with_dates(DateRange::new(date(2022, 6, 1), date(2023, 2, 1)));
        let warnings = criteria.clamp_to(bounds);
        assert_eq!(warnings.len(), 1);
        assert_eq!(criteria.dates.unwrap().start, date(2023, 1, 1));

        let mut inverted =
            FilterCriteria::default().with_dates(DateRange::new(date(2023, 3, 1), date(2023, 1, 1)));
        let warnings = inverted.clamp_to(bounds);
        assert!(matches!(warnings[0], FilterWarning::InvertedRange { .. }));
        assert_eq!(inverted.dates, bounds);
    }

    #[test]
    fn state_options_follow_region_selection() {
        let ds = dataset();
        let all = FilterEngine::options(&ds, &FilterCriteria::default(), Dimension::State);
        assert_eq!(all, vec!["S1", "S2", "S3"]);

        let criteria = FilterCriteria::default().select(Dimension::Region, ["A"]);
        let scoped = FilterEngine::options(&ds, &criteria, Dimension::State);
        assert_eq!(scoped, vec!["S1", "S3"]);
    }

    #[test]
    fn empty_selection_sets_restrict_only_by_date() {
        let ds = dataset();
        let range = DateRange::new(date(2023, 2, 1), date(2023, 3, 15));

        let mut with_empty_sets = FilterCriteria::default().with_dates(range);
        for dimension in Dimension::ALL {
            with_empty_sets.selections.insert(dimension, BTreeSet::new());
        }
        assert!(with_empty_sets.has_no_selections());

        let date_only = FilterEngine::apply(&ds, &FilterCriteria::default().with_dates(range)).unwrap();
        let out = FilterEngine::apply(&ds, &with_empty_sets).unwrap();
        assert_eq!(out.height(), 3);
        assert!(out.same_records(&date_only));
    }

    #[test]
    fn parent_change_drops_child_selections_no_longer_offered() {
        let ds = dataset();
        let mut criteria = FilterCriteria::default()
            .select(Dimension::State, ["S1", "S2"])
            .select(Dimension::Region, ["A"]);

        let dropped = FilterEngine::prune_selections(&ds, &mut criteria);

        assert_eq!(dropped, vec![(Dimension::State, "S2".to_string())]);
        assert!(criteria.is_selected(Dimension::State, "S1"));
        assert!(!criteria.is_selected(Dimension::State, "S2"));
        assert_eq!(FilterEngine::apply(&ds, &criteria).unwrap().height(), 1);
    }

    #[test]
    fn toggle_adds_then_removes() {
        let mut criteria = FilterCriteria::default();
        criteria.toggle(Dimension::Segment, "Consumer");
        assert!(criteria.is_selected(Dimension::Segment, "Consumer"));
        criteria.toggle(Dimension::Segment, "Consumer");
        assert!(criteria.selected(Dimension::Segment).is_none());
        assert!(criteria.has_no_selections());
    }
}
