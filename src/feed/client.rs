//! CSV feed client. Fetches the published spreadsheet and normalizes it.
//!
//! One call is one ingestion cycle:
//! 1. GET the configured URL, failing on any non-2xx status
//! 2. Parse the body header-first, rejecting structurally broken CSV outright
//! 3. Normalize every row in order
//!
//! There is no partial result. A cycle either yields the full sequence or an
//! error, and the caller keeps whatever it had before.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::model::Email;
use super::normalize::{RawRow, normalize_row};
use crate::config::FeedConfig;
use crate::error::FeedError;

/// Anything that can produce a fresh email sequence.
#[async_trait]
pub trait EmailSource: Send + Sync {
    async fn fetch_emails(&self) -> Result<Vec<Email>, FeedError>;
}

/// HTTP client for the published CSV export.
pub struct FeedClient {
    http: reqwest::Client,
    url: String,
}

impl FeedClient {
    pub fn new(config: &FeedConfig) -> Result<Self, FeedError> {
        let http = reqwest::Client::builder()
            .timeout(config.fetch_timeout)
            .build()
            .map_err(|e| FeedError::Transport(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            url: config.url.clone(),
        })
    }

    async fn fetch_text(&self) -> Result<String, FeedError> {
        let response = self
            .http
            .get(&self.url)
            .send()
            .await
            .map_err(|e| FeedError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FeedError::Network {
                status: status.as_u16(),
                status_text: status.canonical_reason().unwrap_or_default().to_string(),
            });
        }

        response
            .text()
            .await
            .map_err(|e| FeedError::Transport(format!("Failed to read CSV body: {e}")))
    }
}

#[async_trait]
impl EmailSource for FeedClient {
    async fn fetch_emails(&self) -> Result<Vec<Email>, FeedError> {
        debug!(url = %self.url, "Fetching email feed");
        let text = self.fetch_text().await?;
        let emails = parse_emails(&text, Utc::now())?;
        info!(count = emails.len(), "Email feed ingested");
        Ok(emails)
    }
}

/// Parse CSV text into canonical emails.
///
/// `fetched_at` stands in for rows without a usable timestamp. Blank lines and
/// rows made only of empty cells are skipped and do not consume a row index.
pub fn parse_emails(text: &str, fetched_at: DateTime<Utc>) -> Result<Vec<Email>, FeedError> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(false)
        .from_reader(text.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| FeedError::Parse(e.to_string()))?
        .clone();

    let mut emails = Vec::new();
    let mut rows_with_defaults = 0usize;

    for record in reader.records() {
        let record = record.map_err(|e| FeedError::Parse(e.to_string()))?;
        if record.iter().all(|field| field.trim().is_empty()) {
            continue;
        }

        let row = RawRow::new(headers.iter().zip(record.iter()));
        let decoded = normalize_row(&row, emails.len(), fetched_at);

        if !decoded.is_clean() {
            rows_with_defaults += 1;
            for issue in &decoded.issues {
                debug!(
                    row = emails.len() + 1,
                    field = %issue.field,
                    kind = ?issue.kind,
                    "Feed field defaulted"
                );
            }
        }

        emails.push(decoded.email);
    }

    if rows_with_defaults > 0 {
        warn!(
            rows = rows_with_defaults,
            total = emails.len(),
            "Some feed rows were missing fields and used defaults"
        );
    }

    Ok(emails)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::model::{Category, SyncStatus};

    fn now() -> DateTime<Utc> {
        "2025-06-01T12:00:00Z".parse().unwrap()
    }

    const HEADER: &str = "Sender Email,Subject,Summary,Label,Category,Timestamp,Sync Status";

    #[test]
    fn full_and_sparse_rows() {
        let csv = format!(
            "{HEADER}\na@x.com,Hi,Sum,Work,inbox,2024-01-01T00:00:00Z,synced\nb@y.com,Hello,,,,,\n"
        );
        let emails = parse_emails(&csv, now()).unwrap();
        assert_eq!(emails.len(), 2);

        let first = &emails[0];
        assert_eq!(first.id, "email-1");
        assert_eq!(first.sender, "a@x.com");
        assert_eq!(first.subject, "Hi");
        assert_eq!(first.body, "Sum");
        assert_eq!(first.label, "Work");
        assert_eq!(first.category, Category::Inbox);
        assert_eq!(first.processed_at, "2024-01-01T00:00:00Z".parse::<DateTime<Utc>>().unwrap());
        assert_eq!(first.sync_status, SyncStatus::Synced);

        let second = &emails[1];
        assert_eq!(second.id, "email-2");
        assert_eq!(second.sender, "b@y.com");
        assert_eq!(second.subject, "Hello");
        assert_eq!(second.label, "Unlabeled");
        assert_eq!(second.category, Category::Inbox);
        assert_eq!(second.sync_status, SyncStatus::Synced);
        assert_eq!(second.processed_at, now());
    }

    #[test]
    fn quoted_fields_may_hold_commas_and_newlines() {
        let csv = format!(
            "{HEADER}\n\"c@z.com\",\"Re: a, b\",\"line one\nline two\",Work,sent,2024-02-02,failed\n"
        );
        let emails = parse_emails(&csv, now()).unwrap();
        assert_eq!(emails.len(), 1);
        assert_eq!(emails[0].subject, "Re: a, b");
        assert_eq!(emails[0].body, "line one\nline two");
        assert_eq!(emails[0].category, Category::Sent);
        assert_eq!(emails[0].sync_status, SyncStatus::Failed);
    }

    #[test]
    fn blank_lines_are_skipped_without_consuming_ids() {
        let csv = format!("{HEADER}\n\na@x.com,One,,,,,\n,,,,,,\n\nb@x.com,Two,,,,,\n");
        let emails = parse_emails(&csv, now()).unwrap();
        let ids: Vec<_> = emails.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, ["email-1", "email-2"]);
        assert_eq!(emails[1].subject, "Two");
    }

    #[test]
    fn rows_of_blank_cells_do_not_count_as_emails() {
        let csv = format!(
            "{HEADER}\n,,,,,,\na@x.com,One,Sum,Work,inbox,2024-01-01T00:00:00Z,synced\n ,  ,,,\t,,\n,,,,,,\n"
        );
        let emails = parse_emails(&csv, now()).unwrap();
        assert_eq!(emails.len(), 1);
        assert_eq!(emails[0].id, "email-1");

        let stats = crate::analytics::compute_analytics_stats(&emails);
        assert_eq!(stats.total_emails, 1);
        assert_eq!(stats.synced_emails, 1);
    }

    #[test]
    fn message_id_column_wins_over_placeholder() {
        let csv = "Message ID,Sender Email\n<abc@mail>,a@x.com\n,b@x.com\n";
        let emails = parse_emails(csv, now()).unwrap();
        assert_eq!(emails[0].id, "<abc@mail>");
        assert_eq!(emails[1].id, "email-2");
    }

    #[test]
    fn ragged_rows_fail_with_parse_error() {
        let csv = format!("{HEADER}\na@x.com,Hi,Sum,Work,inbox,2024-01-01T00:00:00Z,synced\nb@y.com,Hi\n");
        let err = parse_emails(&csv, now()).unwrap_err();
        assert!(matches!(err, FeedError::Parse(_)), "got {err:?}");
        assert!(err.to_string().starts_with("CSV parsing error:"));
    }

    #[test]
    fn byte_order_mark_is_ignored() {
        let csv = "\u{feff}Sender Email,Label\na@x.com,Work\n";
        let emails = parse_emails(csv, now()).unwrap();
        assert_eq!(emails[0].sender, "a@x.com");
        assert_eq!(emails[0].label, "Work");
    }

    #[test]
    fn empty_body_yields_empty_sequence() {
        assert!(parse_emails("", now()).unwrap().is_empty());
        assert!(parse_emails(HEADER, now()).unwrap().is_empty());
    }
}
