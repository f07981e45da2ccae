//! Sales Dashboard - load, filter, aggregate, chart and export sales records.
//!
//! The GUI lives in [`gui`]; everything else is usable headless through [`session::Session`].

pub mod charts;
pub mod config;
pub mod data;
pub mod export;
pub mod gui;
pub mod insight;
pub mod session;
pub mod stats;
