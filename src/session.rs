//! Session Module
//! One user's dashboard state: current source, load cache, filters and derived view.

use crate::charts::{ChartId, ChartModel};
use crate::config::DashboardConfig;
use crate::data::{
    CacheKey, DataLoader, Dataset, DateRange, Dimension, FilterCriteria, FilterEngine, FilterError,
    FilterWarning, LoadCache, LoadOptions, LoaderError, RawSource, SAMPLE_NAME,
};
use crate::insight::InsightContext;
use crate::stats::{
    AggregationResult, Aggregator, Forecast, Grouping, Kpis, RevenueGrowth, SalesSummary,
    SegmentRow, StatsCalculator,
};
use tracing::{info, warn};

/// What must happen to turn raw bytes into a dataset.
pub enum LoadPlan {
    /// Parsed before with the same options.
    Cached(RawSource, Dataset),
    /// Needs parsing; safe to run off the UI thread with `DataLoader::parse`.
    Parse(RawSource, LoadOptions),
}

/// One chart with the aggregation behind it.
#[derive(Debug, Clone)]
pub struct ChartPanel {
    pub id: ChartId,
    pub model: ChartModel,
    pub result: Option<AggregationResult>,
    /// Aggregation failure for this chart only.
    pub error: Option<String>,
}

/// Everything derived from the current dataset and criteria.
#[derive(Debug, Clone)]
pub struct DashboardView {
    pub filtered: Dataset,
    pub total_rows: usize,
    pub kpis: Kpis,
    pub summary: SalesSummary,
    pub growth: Option<RevenueGrowth>,
    pub forecast: Option<Forecast>,
    pub segments: Vec<SegmentRow>,
    pub charts: Vec<ChartPanel>,
}

impl DashboardView {
    pub fn chart(&self, id: ChartId) -> Option<&ChartPanel> {
        self.charts.iter().find(|c| c.id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.filtered.is_empty()
    }
}

struct Loaded {
    raw: RawSource,
    dataset: Dataset,
}

pub struct Session {
    config: DashboardConfig,
    options: LoadOptions,
    cache: LoadCache,
    current: Option<Loaded>,
    criteria: FilterCriteria,
    warnings: Vec<FilterWarning>,
    last_error: Option<String>,
}

impl Session {
    pub fn new(config: DashboardConfig) -> Self {
        Self {
            config,
            options: LoadOptions::default(),
            cache: LoadCache::new(),
            current: None,
            criteria: FilterCriteria::default(),
            warnings: Vec::new(),
            last_error: None,
        }
    }

    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }

    pub fn options(&self) -> LoadOptions {
        self.options
    }

    pub fn dataset(&self) -> Option<&Dataset> {
        self.current.as_ref().map(|l| &l.dataset)
    }

    pub fn has_data(&self) -> bool {
        self.current.is_some()
    }

    pub fn source_name(&self) -> Option<&str> {
        self.current.as_ref().map(|l| l.raw.name.as_str())
    }

    pub fn criteria(&self) -> &FilterCriteria {
        &self.criteria
    }

    pub fn warnings(&self) -> &[FilterWarning] {
        &self.warnings
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn cache(&self) -> &LoadCache {
        &self.cache
    }

    /// Load the bundled sample when enabled; otherwise the session stays empty.
    pub fn load_default(&mut self) -> Result<(), LoaderError> {
        if !self.config.use_sample {
            info!("bundled sample disabled; waiting for an upload");
            return Ok(());
        }
        self.load(RawSource::sample())
    }

    /// Decide whether `raw` needs parsing.
    pub fn plan(&self, raw: RawSource) -> LoadPlan {
        let key = CacheKey::new(&raw, &self.options);
        match self.cache.get(&key) {
            Some(dataset) => LoadPlan::Cached(raw, dataset.clone()),
            None => LoadPlan::Parse(raw, self.options),
        }
    }

    /// Load synchronously through the cache.
    pub fn load(&mut self, raw: RawSource) -> Result<(), LoaderError> {
        match self.plan(raw) {
            LoadPlan::Cached(raw, dataset) => self.finish_load(raw, Ok(dataset)),
            LoadPlan::Parse(raw, options) => {
                let parsed = DataLoader::parse(&raw, &options);
                self.finish_load(raw, parsed)
            }
        }
    }

    /// Install a parse result.
    ///
    /// On failure the previous dataset stays; with none, the bundled sample is tried.
    pub fn finish_load(
        &mut self,
        raw: RawSource,
        parsed: Result<Dataset, LoaderError>,
    ) -> Result<(), LoaderError> {
        match parsed {
            Ok(dataset) => {
                let key = CacheKey::new(&raw, &self.options);
                if !self.cache.contains_digest(&key.digest) {
                    self.cache.invalidate();
                }
                self.cache.insert(key, dataset.clone());
                info!(source = %raw.name, rows = dataset.height(), "session dataset installed");
                self.current = Some(Loaded { raw, dataset });
                self.criteria.reset();
                self.warnings.clear();
                self.last_error = None;
                Ok(())
            }
            Err(e) => {
                warn!(source = %raw.name, error = %e, "load failed");
                let message = format!("Could not load {}: {}", raw.name, e);
                if self.current.is_none() && self.config.use_sample && raw.name != SAMPLE_NAME {
                    if let Err(fallback) = self.load(RawSource::sample()) {
                        warn!(error = %fallback, "bundled sample failed to load");
                    }
                }
                self.last_error = Some(message);
                Err(e)
            }
        }
    }

    /// Drop cached parses and re-read the current source.
    pub fn refresh(&mut self) -> Result<(), LoaderError> {
        self.cache.invalidate();
        let Some(raw) = self.current.as_ref().map(|l| l.raw.clone()) else {
            return self.load_default();
        };
        let criteria = self.criteria.clone();
        self.load(raw)?;
        self.set_criteria(criteria);
        Ok(())
    }

    /// Replace the criteria, fitting the date range to the data.
    pub fn set_criteria(&mut self, mut criteria: FilterCriteria) -> &[FilterWarning] {
        let bounds = self.dataset().and_then(Dataset::date_bounds);
        self.warnings = criteria.clamp_to(bounds);
        self.criteria = criteria;
        &self.warnings
    }

    pub fn set_dates(&mut self, range: Option<DateRange>) -> &[FilterWarning] {
        let mut criteria = self.criteria.clone();
        criteria.dates = range;
        self.set_criteria(criteria)
    }

    pub fn toggle(&mut self, dimension: Dimension, value: &str) {
        self.criteria.toggle(dimension, value);
        self.prune_selections();
    }

    pub fn clear_selection(&mut self, dimension: Dimension) {
        self.criteria.clear(dimension);
        self.prune_selections();
    }

    /// Keep every active selection visible in its selector.
    fn prune_selections(&mut self) {
        if let Some(loaded) = &self.current {
            FilterEngine::prune_selections(&loaded.dataset, &mut self.criteria);
        }
    }

    pub fn reset_filters(&mut self) {
        self.criteria.reset();
        self.warnings.clear();
    }

    /// Selector values for a dimension, narrowed by parent selections.
    pub fn filter_options(&self, dimension: Dimension) -> Vec<String> {
        self.dataset()
            .map(|ds| FilterEngine::options(ds, &self.criteria, dimension))
            .unwrap_or_default()
    }

    pub fn filtered(&self) -> Result<Option<Dataset>, FilterError> {
        self.dataset()
            .map(|ds| FilterEngine::apply(ds, &self.criteria))
            .transpose()
    }

    /// Filter, aggregate and summarize. `None` means there is no data to show.
    pub fn view(&self) -> Result<Option<DashboardView>, FilterError> {
        let Some(dataset) = self.dataset() else {
            return Ok(None);
        };
        let filtered = FilterEngine::apply(dataset, &self.criteria)?;
        Ok(Some(Self::build_view(
            filtered,
            dataset.height(),
            self.config.forecast_months,
        )))
    }

    fn build_view(filtered: Dataset, total_rows: usize, forecast_months: usize) -> DashboardView {
        let results = Aggregator::aggregate_many(&filtered, &ChartId::requests());

        let forecast = results
            .iter()
            .zip(ChartId::AGGREGATED)
            .find(|(_, id)| id.grouping() == Some(Grouping::Month))
            .and_then(|(r, _)| r.as_ref().ok())
            .and_then(|monthly| StatsCalculator::forecast(monthly, forecast_months));
        let growth = results
            .iter()
            .filter_map(|r| r.as_ref().ok())
            .find(|r| r.grouping == Grouping::Month)
            .and_then(StatsCalculator::revenue_growth);

        let aggregated = ChartId::AGGREGATED
            .into_iter()
            .zip(results)
            .map(|(id, result)| match result {
                Ok(result) => ChartPanel {
                    id,
                    model: ChartModel::build(id, &result, forecast.as_ref()),
                    result: Some(result),
                    error: None,
                },
                Err(e) => ChartPanel {
                    id,
                    model: ChartModel::empty(id),
                    result: None,
                    error: Some(e.to_string()),
                },
            });
        let distribution = ChartId::DISTRIBUTION
            .into_iter()
            .map(|id| match ChartModel::from_records(id, &filtered) {
                Ok(model) => ChartPanel {
                    id,
                    model,
                    result: None,
                    error: None,
                },
                Err(e) => ChartPanel {
                    id,
                    model: ChartModel::empty(id),
                    result: None,
                    error: Some(e.to_string()),
                },
            });
        let charts = aggregated.chain(distribution).collect();

        let sales = filtered
            .measure_values(crate::data::schema::SALES_COL)
            .unwrap_or_default();

        DashboardView {
            kpis: StatsCalculator::kpis(&filtered).unwrap_or_default(),
            summary: StatsCalculator::summarize(&sales),
            segments: StatsCalculator::segment_performance(&sales),
            growth,
            forecast,
            charts,
            total_rows,
            filtered,
        }
    }

    /// Prompt inputs for the insight generator.
    pub fn insight_context(&self, view: &DashboardView) -> InsightContext {
        let mut context = InsightContext::new(
            self.source_name().unwrap_or_default(),
            view.filtered.date_bounds(),
            view.kpis.clone(),
        )
        .with_growth(view.growth)
        .with_forecast(view.forecast.as_ref());

        if let Some(categories) = view
            .chart(ChartId::SalesByCategory)
            .and_then(|c| c.result.as_ref())
        {
            context = context.with_categories(categories);
        }
        if let Some(regions) = view.chart(ChartId::RegionShare).and_then(|c| c.result.as_ref()) {
            context = context.with_regions(regions);
        }
        context
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{FileFormat, ParseError};
    use chrono::NaiveDate;

    fn raw(name: &str, text: &str) -> RawSource {
        RawSource {
            name: name.to_string(),
            format: FileFormat::Csv,
            bytes: text.as_bytes().to_vec(),
        }
    }

    fn no_sample() -> DashboardConfig {
        DashboardConfig {
            use_sample: false,
            ..DashboardConfig::default()
        }
    }

    const THREE: &str = "Order Date,Region,Category,Sales\n\
        2023-01-01,A,Tech,10\n\
        2023-02-01,B,Office,20\n\
        2023-03-01,A,Tech,30\n";

    #[test]
    fn empty_upload_without_default_shows_no_data() {
        let mut session = Session::new(no_sample());
        let err = session.load(raw("empty.csv", "")).unwrap_err();

        assert!(matches!(err, LoaderError::Parse(ParseError::EmptyFile)));
        assert!(session.last_error().is_some());
        assert!(!session.has_data());
        assert!(session.view().unwrap().is_none());
    }

    #[test]
    fn failed_first_upload_falls_back_to_sample() {
        let mut session = Session::new(DashboardConfig::default());
        assert!(session.load(raw("bad.csv", "Region\nEast\n")).is_err());
        assert_eq!(session.source_name(), Some(SAMPLE_NAME));
        assert!(session.last_error().unwrap().contains("bad.csv"));
    }

    #[test]
    fn failed_upload_keeps_previous_dataset() {
        let mut session = Session::new(no_sample());
        session.load(raw("three.csv", THREE)).unwrap();
        assert!(session.load(raw("empty.csv", " ")).is_err());
        assert_eq!(session.source_name(), Some("three.csv"));
    }

    #[test]
    fn date_range_scenario_through_the_session() {
        let mut session = Session::new(no_sample());
        session.load(raw("three.csv", THREE)).unwrap();
        let d = |m| NaiveDate::from_ymd_opt(2023, m, 1).unwrap();
        assert!(session.set_dates(Some(DateRange::new(d(1), d(2)))).is_empty());

        let view = session.view().unwrap().unwrap();
        assert_eq!(view.filtered.height(), 2);
        assert_eq!(view.total_rows, 3);
        assert_eq!(view.kpis.total_sales, 30.0);
        assert_eq!(view.charts.len(), ChartId::ALL.len());
    }

    #[test]
    fn missing_dimension_breaks_only_its_chart() {
        let mut session = Session::new(no_sample());
        session.load(raw("three.csv", THREE)).unwrap();
        let view = session.view().unwrap().unwrap();

        let states = view.chart(ChartId::TopStates).unwrap();
        assert!(states.error.is_some());
        assert!(states.model.is_empty());

        let categories = view.chart(ChartId::SalesByCategory).unwrap();
        assert!(categories.error.is_none());
        assert!(!categories.model.is_empty());
    }

    #[test]
    fn cache_is_reused_and_invalidated_on_new_content() {
        let mut session = Session::new(no_sample());
        session.load(raw("three.csv", THREE)).unwrap();
        assert!(matches!(session.plan(raw("again.csv", THREE)), LoadPlan::Cached(..)));

        session.load(raw("other.csv", "Date,Sales\n2023-05-05,1\n")).unwrap();
        assert_eq!(session.cache().len(), 1);
        assert!(matches!(session.plan(raw("three.csv", THREE)), LoadPlan::Parse(..)));
    }

    #[test]
    fn refresh_keeps_filters_and_reloads() {
        let mut session = Session::new(no_sample());
        session.load(raw("three.csv", THREE)).unwrap();
        session.toggle(Dimension::Region, "B");
        session.refresh().unwrap();

        assert!(session.criteria().is_selected(Dimension::Region, "B"));
        assert_eq!(session.view().unwrap().unwrap().filtered.height(), 1);
    }

    #[test]
    fn selecting_a_region_releases_states_outside_it() {
        let mut session = Session::new(no_sample());
        let text = "Order Date,Region,State,Sales\n\
            2023-01-01,East,New York,10\n\
            2023-01-02,Central,Texas,20\n";
        session.load(raw("states.csv", text)).unwrap();

        session.toggle(Dimension::State, "Texas");
        session.toggle(Dimension::Region, "East");

        assert!(session.criteria().selected(Dimension::State).is_none());
        assert_eq!(session.view().unwrap().unwrap().filtered.height(), 1);
    }

    #[test]
    fn view_carries_distribution_charts_and_quick_insights() {
        let mut session = Session::new(no_sample());
        session.load(raw("three.csv", THREE)).unwrap();
        let view = session.view().unwrap().unwrap();

        let ids: Vec<ChartId> = view.charts.iter().map(|c| c.id).collect();
        assert_eq!(ids, ChartId::ALL.to_vec());
        for id in [ChartId::CategoryRegionHeatmap, ChartId::SalesHistogram, ChartId::SalesBoxPlot] {
            let panel = view.chart(id).unwrap();
            assert!(panel.error.is_none(), "{:?}", id);
            assert!(!panel.model.is_empty(), "{:?}", id);
        }
        // Sales is the only numeric column
        assert!(view.chart(ChartId::Correlation).unwrap().model.is_empty());

        assert_eq!(view.kpis.best_region, Some(("A".to_string(), 40.0)));
        assert_eq!(view.kpis.best_category, Some(("Tech".to_string(), 40.0)));
        assert_eq!(view.kpis.data_quality, 100.0);
    }

    #[test]
    fn insight_context_carries_rankings() {
        let mut session = Session::new(no_sample());
        session.load(raw("three.csv", THREE)).unwrap();
        let view = session.view().unwrap().unwrap();
        let ctx = session.insight_context(&view);

        assert_eq!(ctx.source, "three.csv");
        assert_eq!(ctx.top_categories[0].0, "Tech");
        assert_eq!(ctx.top_regions[0], ("A".to_string(), 40.0));
    }
}
