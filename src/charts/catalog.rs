//! Chart Catalog
//! The fixed set of dashboard charts and what each one aggregates.

use crate::data::Dimension;
use crate::stats::{Grouping, Measure};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChartKind {
    Bar,
    Pie,
    Line,
    Treemap,
    Scatter,
    Heatmap,
    Histogram,
    BoxPlot,
}

/// Every chart the dashboard shows, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChartId {
    SalesByCategory,
    RegionShare,
    MonthlyTrend,
    CategoryTreemap,
    OrdersVsSales,
    ProfitBySegment,
    TopStates,
    WeekdaySales,
    CategoryRegionHeatmap,
    SalesHistogram,
    SalesBoxPlot,
    Correlation,
}

impl ChartId {
    pub const ALL: [ChartId; 12] = [
        ChartId::SalesByCategory,
        ChartId::RegionShare,
        ChartId::MonthlyTrend,
        ChartId::CategoryTreemap,
        ChartId::OrdersVsSales,
        ChartId::ProfitBySegment,
        ChartId::TopStates,
        ChartId::WeekdaySales,
        ChartId::CategoryRegionHeatmap,
        ChartId::SalesHistogram,
        ChartId::SalesBoxPlot,
        ChartId::Correlation,
    ];

    /// Charts drawn from a group-by, in catalog order.
    pub const AGGREGATED: [ChartId; 9] = [
        ChartId::SalesByCategory,
        ChartId::RegionShare,
        ChartId::MonthlyTrend,
        ChartId::CategoryTreemap,
        ChartId::OrdersVsSales,
        ChartId::ProfitBySegment,
        ChartId::TopStates,
        ChartId::WeekdaySales,
        ChartId::CategoryRegionHeatmap,
    ];

    /// Charts drawn from the filtered records themselves.
    pub const DISTRIBUTION: [ChartId; 3] = [
        ChartId::SalesHistogram,
        ChartId::SalesBoxPlot,
        ChartId::Correlation,
    ];

    pub fn title(self) -> &'static str {
        match self {
            ChartId::SalesByCategory => "Sales by Category",
            ChartId::RegionShare => "Sales share by Region",
            ChartId::MonthlyTrend => "Monthly sales trend",
            ChartId::CategoryTreemap => "Category / Sub-Category",
            ChartId::OrdersVsSales => "Orders vs sales by Region & Category",
            ChartId::ProfitBySegment => "Profit by Segment",
            ChartId::TopStates => "Top 10 States",
            ChartId::WeekdaySales => "Sales by day of week",
            ChartId::CategoryRegionHeatmap => "Sales heatmap: Category vs Region",
            ChartId::SalesHistogram => "Sales histogram",
            ChartId::SalesBoxPlot => "Sales spread",
            ChartId::Correlation => "Correlation matrix",
        }
    }

    pub fn kind(self) -> ChartKind {
        match self {
            ChartId::RegionShare => ChartKind::Pie,
            ChartId::MonthlyTrend => ChartKind::Line,
            ChartId::CategoryTreemap => ChartKind::Treemap,
            ChartId::OrdersVsSales => ChartKind::Scatter,
            ChartId::CategoryRegionHeatmap | ChartId::Correlation => ChartKind::Heatmap,
            ChartId::SalesHistogram => ChartKind::Histogram,
            ChartId::SalesBoxPlot => ChartKind::BoxPlot,
            ChartId::SalesByCategory
            | ChartId::ProfitBySegment
            | ChartId::TopStates
            | ChartId::WeekdaySales => ChartKind::Bar,
        }
    }

    /// Group-by behind the chart, `None` for the distribution charts.
    pub fn grouping(self) -> Option<Grouping> {
        let grouping = match self {
            ChartId::SalesByCategory => Grouping::Dimension(Dimension::Category),
            ChartId::RegionShare => Grouping::Dimension(Dimension::Region),
            ChartId::MonthlyTrend => Grouping::Month,
            ChartId::CategoryTreemap => Grouping::Pair(Dimension::Category, Dimension::SubCategory),
            ChartId::OrdersVsSales => Grouping::Pair(Dimension::Region, Dimension::Category),
            ChartId::ProfitBySegment => Grouping::Dimension(Dimension::Segment),
            ChartId::TopStates => Grouping::Dimension(Dimension::State),
            ChartId::WeekdaySales => Grouping::Weekday,
            ChartId::CategoryRegionHeatmap => Grouping::Pair(Dimension::Category, Dimension::Region),
            ChartId::SalesHistogram | ChartId::SalesBoxPlot | ChartId::Correlation => return None,
        };
        Some(grouping)
    }

    /// Measure plotted (and ranked by).
    pub fn measure(self) -> Measure {
        match self {
            ChartId::ProfitBySegment => Measure::Profit,
            _ => Measure::Sales,
        }
    }

    /// Rows kept from the ranking, `None` for all.
    pub fn limit(self) -> Option<usize> {
        match self {
            ChartId::TopStates => Some(10),
            _ => None,
        }
    }

    /// File name stem for downloads.
    pub fn file_stem(self) -> &'static str {
        match self {
            ChartId::SalesByCategory => "sales_by_category",
            ChartId::RegionShare => "sales_share_by_region",
            ChartId::MonthlyTrend => "monthly_sales_trend",
            ChartId::CategoryTreemap => "category_treemap",
            ChartId::OrdersVsSales => "orders_vs_sales",
            ChartId::ProfitBySegment => "profit_by_segment",
            ChartId::TopStates => "top_states",
            ChartId::WeekdaySales => "sales_by_weekday",
            ChartId::CategoryRegionHeatmap => "category_region_heatmap",
            ChartId::SalesHistogram => "sales_histogram",
            ChartId::SalesBoxPlot => "sales_box_plot",
            ChartId::Correlation => "correlation_matrix",
        }
    }

    /// Aggregations for the `AGGREGATED` charts, in that order.
    pub fn requests() -> Vec<(Grouping, Measure)> {
        Self::AGGREGATED
            .iter()
            .filter_map(|c| c.grouping().map(|g| (g, c.measure())))
            .collect()
    }
}
