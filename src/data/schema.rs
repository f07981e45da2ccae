//! Sales Schema Module
//! Canonical column names, categorical dimensions and order-date parsing.

use chrono::{NaiveDate, NaiveDateTime};
use std::fmt;

pub const SALES_COL: &str = "Sales";
pub const PROFIT_COL: &str = "Profit";
pub const QUANTITY_COL: &str = "Quantity";

/// Headers accepted as the order-date column, compared after normalization.
pub const DATE_COLUMN_CANDIDATES: [&str; 4] = ["Order Date", "Date", "OrderDate", "order_date"];

const DATE_FORMATS: [&str; 7] = [
    "%Y-%m-%d", "%m/%d/%Y", "%d/%m/%Y", "%Y/%m/%d", "%d-%m-%Y", "%m-%d-%Y", "%d.%m.%Y",
];

const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%m/%d/%Y %H:%M",
];

/// Categorical columns the dashboard can filter and group by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Dimension {
    Region,
    State,
    City,
    Category,
    SubCategory,
    Segment,
}

impl Dimension {
    pub const ALL: [Dimension; 6] = [
        Dimension::Region,
        Dimension::State,
        Dimension::City,
        Dimension::Category,
        Dimension::SubCategory,
        Dimension::Segment,
    ];

    /// Header of the column backing this dimension.
    pub fn column_name(self) -> &'static str {
        match self {
            Dimension::Region => "Region",
            Dimension::State => "State",
            Dimension::City => "City",
            Dimension::Category => "Category",
            Dimension::SubCategory => "Sub-Category",
            Dimension::Segment => "Segment",
        }
    }

    /// Dimensions whose selections narrow the options offered for `self`.
    pub fn parents(self) -> &'static [Dimension] {
        match self {
            Dimension::State => &[Dimension::Region],
            Dimension::City => &[Dimension::Region, Dimension::State],
            Dimension::SubCategory => &[Dimension::Category],
            _ => &[],
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column_name())
    }
}

fn normalize_header(header: &str) -> String {
    header
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Find the order-date column among `headers`, honouring candidate priority.
pub fn find_date_column<'a, I>(headers: I) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let headers: Vec<&str> = headers.into_iter().collect();
    DATE_COLUMN_CANDIDATES.iter().find_map(|candidate| {
        let wanted = normalize_header(candidate);
        headers
            .iter()
            .find(|h| normalize_header(h) == wanted)
            .map(|h| h.to_string())
    })
}

/// Empty or whitespace-only cell text, treated like a null.
pub fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

/// Parse one date cell; returns `None` for anything unrecognised.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let value = raw.trim().trim_matches('"');
    if value.is_empty() {
        return None;
    }

    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
                .map(|dt| dt.date())
        })
}

/// Days since 1970-01-01, the physical representation of a polars `Date`.
pub fn to_epoch_days(date: NaiveDate) -> i32 {
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default();
    (date - epoch).num_days() as i32
}

pub fn from_epoch_days(days: i32) -> NaiveDate {
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default();
    epoch + chrono::Duration::days(days as i64)
}
