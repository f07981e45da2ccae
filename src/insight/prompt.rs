//! Prompt construction from summary statistics.

use crate::data::DateRange;
use crate::insight::client::ChatMessage;
use crate::stats::{AggregationResult, Forecast, Kpis, RevenueGrowth};
use std::fmt::Write;

const SYSTEM_PROMPT: &str = "You are a retail sales analyst. Using only the figures provided, \
write 3 to 5 short, concrete business insights and one recommendation. \
Use plain sentences and bullet points. Do not invent numbers.";

const RANKED: usize = 3;

/// Everything the prompt is built from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InsightContext {
    pub source: String,
    pub period: Option<DateRange>,
    pub kpis: Kpis,
    pub growth: Option<RevenueGrowth>,
    pub next_month: Option<(String, f64)>,
    pub top_categories: Vec<(String, f64)>,
    pub underperforming_categories: Vec<(String, f64)>,
    pub top_regions: Vec<(String, f64)>,
    /// Regions with the lowest average sale.
    pub growth_opportunities: Vec<(String, f64)>,
}

impl InsightContext {
    pub fn new(source: impl Into<String>, period: Option<DateRange>, kpis: Kpis) -> Self {
        Self {
            source: source.into(),
            period,
            kpis,
            ..Self::default()
        }
    }

    pub fn with_growth(mut self, growth: Option<RevenueGrowth>) -> Self {
        self.growth = growth;
        self
    }

    pub fn with_forecast(mut self, forecast: Option<&Forecast>) -> Self {
        self.next_month = forecast.and_then(|f| f.projected.first().cloned());
        self
    }

    pub fn with_categories(mut self, categories: &AggregationResult) -> Self {
        self.top_categories = Self::by_total(categories);
        self.underperforming_categories = Self::by_lowest_mean(categories);
        self
    }

    pub fn with_regions(mut self, regions: &AggregationResult) -> Self {
        self.top_regions = Self::by_total(regions);
        self.growth_opportunities = Self::by_lowest_mean(regions);
        self
    }

    fn by_total(result: &AggregationResult) -> Vec<(String, f64)> {
        result
            .known_rows()
            .take(RANKED)
            .map(|r| (r.label(), r.sales))
            .collect()
    }

    fn by_lowest_mean(result: &AggregationResult) -> Vec<(String, f64)> {
        let mut rows: Vec<(String, f64)> = result
            .known_rows()
            .map(|r| (r.label(), r.mean_sales()))
            .collect();
        rows.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        rows.truncate(RANKED);
        rows
    }

    /// User message body.
    pub fn summary(&self) -> String {
        let k = &self.kpis;
        let mut out = String::new();

        let _ = writeln!(out, "Dataset: {}", self.source);
        if let Some(p) = self.period {
            let _ = writeln!(out, "Period: {} to {}", p.start, p.end);
        }
        let _ = writeln!(out, "Orders: {}", k.orders);
        let _ = writeln!(out, "Total revenue: {:.2}", k.total_sales);
        let _ = writeln!(out, "Total profit: {:.2}", k.total_profit);
        if let Some(m) = k.profit_margin {
            let _ = writeln!(out, "Profit margin: {:.1}%", m);
        }
        let _ = writeln!(out, "Average transaction: {:.2}", k.avg_transaction);
        let _ = writeln!(out, "Revenue per active day: {:.2}", k.revenue_per_day);
        let _ = writeln!(out, "Regions: {}, categories: {}", k.market_penetration, k.product_diversity);
        let _ = writeln!(out, "Data completeness: {:.1}%", k.data_quality);

        if let Some(g) = self.growth {
            if g.total_pct.is_finite() {
                let _ = writeln!(out, "Growth first to last month: {:.1}%", g.total_pct);
            }
            if g.avg_monthly_pct.is_finite() {
                let _ = writeln!(out, "Average month-over-month growth: {:.1}%", g.avg_monthly_pct);
            }
        }
        if let Some((month, value)) = &self.next_month {
            let _ = writeln!(out, "Trend forecast for {}: {:.2}", month, value);
        }

        Self::ranked(&mut out, "Top categories by revenue", &self.top_categories);
        Self::ranked(&mut out, "Categories with lowest average sale", &self.underperforming_categories);
        Self::ranked(&mut out, "Top regions by revenue", &self.top_regions);
        Self::ranked(&mut out, "Regions with lowest average sale", &self.growth_opportunities);
        out
    }

    fn ranked(out: &mut String, heading: &str, rows: &[(String, f64)]) {
        if rows.is_empty() {
            return;
        }
        let _ = writeln!(out, "{heading}:");
        for (label, value) in rows {
            let _ = writeln!(out, "- {label}: {value:.2}");
        }
    }

    pub fn messages(&self) -> Vec<ChatMessage> {
        vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(self.summary())]
    }
}
