//! Data module - loading, caching and filtering sales tables

mod cache;
mod dataset;
mod filter;
mod loader;
pub mod schema;

pub use cache::{CacheKey, LoadCache};
pub use dataset::{Dataset, ParseError};
pub use filter::{DateRange, FilterCriteria, FilterEngine, FilterError, FilterWarning};
pub use loader::{DataLoader, FileFormat, LoadOptions, LoaderError, RawSource, SAMPLE_NAME};
pub use schema::Dimension;
