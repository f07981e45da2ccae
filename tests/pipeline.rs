//! End-to-end checks: file on disk -> dataset -> filters -> aggregates -> exported files.

use chrono::NaiveDate;
use sales_dashboard::charts::{ChartId, ChartModel};
use sales_dashboard::data::{
    DataLoader, DateRange, Dimension, FilterCriteria, FilterEngine, LoadOptions, LoaderError,
    ParseError,
};
use sales_dashboard::export::{ExportKind, Exporter};
use sales_dashboard::stats::{Aggregator, Grouping, StatsCalculator};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const ORDERS: &str = "Order Date,Region,State,Category,Sales,Profit,Quantity\n\
2023-01-05,East,New York,Technology,120,30,2\n\
2023-01-20,West,California,Furniture,80,-5,1\n\
2023-02-11,East,New York,Office Supplies,15,4,3\n\
2023-03-02,,Texas,Technology,200,50,1\n\
2023-03-28,West,Oregon,Furniture,40,8,2\n";

fn write(dir: &TempDir, name: &str, text: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, text).unwrap();
    path
}

fn load(path: &Path) -> sales_dashboard::data::Dataset {
    DataLoader::load_path(path, &LoadOptions::default()).unwrap()
}

fn day(m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2023, m, d).unwrap()
}

#[test]
fn exported_csv_reloads_to_the_same_records() {
    let dir = TempDir::new().unwrap();
    let original = load(&write(&dir, "orders.csv", ORDERS));

    let out = dir.path().join(Exporter::file_name("orders export", ExportKind::Csv));
    Exporter::write_to(&out, &Exporter::dataset_csv(&original).unwrap()).unwrap();
    let reloaded = load(&out);

    assert_eq!(reloaded.height(), original.height());
    assert!(reloaded.same_records(&original));
}

#[test]
fn group_totals_add_up_to_the_overall_total() {
    let dir = TempDir::new().unwrap();
    let dataset = load(&write(&dir, "orders.csv", ORDERS));
    let kpis = StatsCalculator::kpis(&dataset).unwrap();

    for dimension in [Dimension::Region, Dimension::Category, Dimension::State] {
        let result = Aggregator::aggregate(&dataset, Grouping::Dimension(dimension)).unwrap();
        assert!((result.totals().sales - kpis.total_sales).abs() < 1e-9);
        assert_eq!(result.totals().count, dataset.height());
    }
    assert_eq!(kpis.total_sales, 455.0);
}

#[test]
fn date_and_region_filters_combine() {
    let dir = TempDir::new().unwrap();
    let dataset = load(&write(&dir, "orders.csv", ORDERS));

    let criteria = FilterCriteria::default()
        .with_dates(DateRange::new(day(1, 1), day(2, 28)))
        .select(Dimension::Region, ["East"]);
    let filtered = FilterEngine::apply(&dataset, &criteria).unwrap();

    assert_eq!(filtered.height(), 2);
    let kpis = StatsCalculator::kpis(&filtered).unwrap();
    assert_eq!(kpis.total_sales, 135.0);
}

#[test]
fn monthly_export_is_chronological() {
    let dir = TempDir::new().unwrap();
    let dataset = load(&write(&dir, "orders.csv", ORDERS));
    let monthly = Aggregator::aggregate(&dataset, Grouping::Month).unwrap();

    let out = dir.path().join("monthly.csv");
    Exporter::write_to(&out, &Exporter::aggregation_csv(&monthly).unwrap()).unwrap();
    let text = fs::read_to_string(&out).unwrap();
    let months: Vec<&str> = text
        .lines()
        .skip(1)
        .filter_map(|l| l.split(',').next())
        .collect();

    assert_eq!(months, ["2023-01", "2023-02", "2023-03"]);
}

#[test]
fn chart_png_is_written_to_disk() {
    let dir = TempDir::new().unwrap();
    let dataset = load(&write(&dir, "orders.csv", ORDERS));
    let result = Aggregator::aggregate(&dataset, ChartId::SalesByCategory.grouping().unwrap()).unwrap();
    let model = ChartModel::build(ChartId::SalesByCategory, &result, None);

    let out = dir.path().join(Exporter::file_name(ChartId::SalesByCategory.file_stem(), ExportKind::Png));
    Exporter::write_to(&out, &Exporter::chart_png(&model, 640, 400).unwrap()).unwrap();

    let bytes = fs::read(&out).unwrap();
    assert_eq!(&bytes[..4], b"\x89PNG");
}

#[test]
fn empty_upload_is_an_error_not_a_dataset() {
    let dir = TempDir::new().unwrap();
    let err = DataLoader::load_path(&write(&dir, "empty.csv", ""), &LoadOptions::default()).unwrap_err();
    assert!(matches!(err, LoaderError::Parse(ParseError::EmptyFile)));
}
