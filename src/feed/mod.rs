//! Email feed ingestion: CSV source, row normalization, periodic refresh.

pub mod client;
pub mod model;
pub mod normalize;
pub mod refresher;

pub use client::{EmailSource, FeedClient, parse_emails};
pub use model::{Category, Email, SyncStatus, UNLABELED};
pub use normalize::{DecodedRow, FieldIssue, RawRow, normalize_row};
pub use refresher::{CycleOutcome, EmailStore, FeedSnapshot, run_cycle, spawn_feed_refresher};
