//! Derived views over the email sequence: filter/sort and CSV export.

pub mod export;
pub mod filter;

pub use export::{export_csv, export_filename};
pub use filter::{EmailFilter, SortDirection, SortField, SortState, ViewQuery, apply};
