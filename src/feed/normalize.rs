//! Row normalizer: turns one loosely-typed spreadsheet row into an `Email`.
//!
//! Decoding never fails. Every field has an ordered list of header aliases
//! and a literal default; whenever the default is taken the decoder records a
//! `FieldIssue` so the ingestion client can report schema drift without
//! rejecting the row.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use super::model::{Category, Email, SyncStatus, UNLABELED};

const ID_HEADERS: &[&str] = &["Message ID", "ID"];
const SENDER_HEADERS: &[&str] = &["Sender Email", "Sender Name", "From"];
const SUBJECT_HEADERS: &[&str] = &["Subject"];
const BODY_HEADERS: &[&str] = &["Summary", "Body"];
const LABEL_HEADERS: &[&str] = &["Label"];
const CATEGORY_HEADERS: &[&str] = &["Category"];
const PROCESSED_AT_HEADERS: &[&str] = &["Processed At", "Timestamp"];
const SYNC_STATUS_HEADERS: &[&str] = &["Sync Status", "Status"];

/// Naive timestamp layouts seen in spreadsheet exports. Read as UTC.
const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y"];

/// Canonical form of a header for lookup: lowercase ASCII alphanumerics only,
/// so `"Sender Email"`, `"sender_email"` and `" SENDER-EMAIL "` collide.
pub fn header_key(header: &str) -> String {
    header
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// One parsed CSV row keyed by canonical header.
#[derive(Debug, Clone, Default)]
pub struct RawRow {
    fields: HashMap<String, String>,
}

impl RawRow {
    /// Build a row from `(header, value)` pairs. When two headers collapse to
    /// the same key the first one wins.
    pub fn new<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut fields = HashMap::new();
        for (header, value) in pairs {
            fields
                .entry(header_key(header.as_ref()))
                .or_insert_with(|| value.into());
        }
        Self { fields }
    }

    /// Value under `header`, if present and not blank.
    pub fn get(&self, header: &str) -> Option<&str> {
        self.fields
            .get(&header_key(header))
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }

    /// First non-blank value among `headers`, most specific first.
    pub fn first_of(&self, headers: &[&str]) -> Option<&str> {
        headers.iter().find_map(|h| self.get(h))
    }
}

/// Email field a decode issue refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Id,
    Sender,
    Subject,
    Body,
    Label,
    Category,
    ProcessedAt,
    SyncStatus,
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Id => "id",
            Self::Sender => "sender",
            Self::Subject => "subject",
            Self::Body => "body",
            Self::Label => "label",
            Self::Category => "category",
            Self::ProcessedAt => "processedAt",
            Self::SyncStatus => "syncStatus",
        };
        f.write_str(name)
    }
}

/// Why a field fell back to its default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssueKind {
    /// No column, or a blank cell.
    Missing,
    /// A value was present but could not be interpreted.
    Unrecognized(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldIssue {
    pub field: Field,
    pub kind: IssueKind,
}

/// Result of decoding one row: always an `Email`, plus whatever defaults
/// had to be applied to get there.
#[derive(Debug, Clone)]
pub struct DecodedRow {
    pub email: Email,
    pub issues: Vec<FieldIssue>,
}

impl DecodedRow {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}

struct Decoder<'a> {
    row: &'a RawRow,
    issues: Vec<FieldIssue>,
}

impl<'a> Decoder<'a> {
    fn text(&mut self, field: Field, headers: &[&str]) -> Option<&'a str> {
        let value = self.row.first_of(headers);
        if value.is_none() {
            self.issues.push(FieldIssue {
                field,
                kind: IssueKind::Missing,
            });
        }
        value
    }

    fn text_or(&mut self, field: Field, headers: &[&str], default: &str) -> String {
        self.text(field, headers).unwrap_or(default).to_string()
    }

    fn parsed<T>(
        &mut self,
        field: Field,
        headers: &[&str],
        parse: impl Fn(&str) -> Option<T>,
    ) -> Option<T> {
        let raw = self.text(field, headers)?;
        let value = parse(raw);
        if value.is_none() {
            self.issues.push(FieldIssue {
                field,
                kind: IssueKind::Unrecognized(raw.to_string()),
            });
        }
        value
    }
}

/// Decode row `index` (zero-based) of a fetch performed at `fetched_at`.
pub fn normalize_row(row: &RawRow, index: usize, fetched_at: DateTime<Utc>) -> DecodedRow {
    let mut d = Decoder {
        row,
        issues: Vec::new(),
    };

    let id = d
        .text(Field::Id, ID_HEADERS)
        .map(str::to_string)
        .unwrap_or_else(|| format!("email-{}", index + 1));
    let sender = d.text_or(Field::Sender, SENDER_HEADERS, "");
    let subject = d.text_or(Field::Subject, SUBJECT_HEADERS, "");
    let body = d.text_or(Field::Body, BODY_HEADERS, "");
    let label = d.text_or(Field::Label, LABEL_HEADERS, UNLABELED);
    let category = d
        .parsed(Field::Category, CATEGORY_HEADERS, |v| v.parse().ok())
        .unwrap_or(Category::Inbox);
    let processed_at = d
        .parsed(Field::ProcessedAt, PROCESSED_AT_HEADERS, parse_timestamp)
        .unwrap_or(fetched_at);
    let sync_status = d
        .parsed(Field::SyncStatus, SYNC_STATUS_HEADERS, |v| v.parse().ok())
        .unwrap_or(SyncStatus::Synced);

    DecodedRow {
        email: Email {
            id,
            sender,
            subject,
            body,
            label,
            category,
            processed_at,
            sync_status,
        },
        issues: d.issues,
    }
}

/// Parse the timestamp layouts the feed is known to use.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    for fmt in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(naive.and_utc());
        }
    }

    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
