//! Filter and sort engine for the email log view.
//!
//! `apply` never touches its input: it copies the matching emails, then sorts
//! the copy with a stable sort so equal keys keep ingestion order.

use std::cmp::Ordering;

use chrono::NaiveDate;
use serde::Deserialize;

use crate::feed::{Category, Email};

/// Conjunctive filter. `None` means the predicate is inactive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EmailFilter {
    pub category: Option<Category>,
    /// Matches the UTC calendar date of `processed_at`; time of day ignored.
    pub date: Option<NaiveDate>,
}

impl EmailFilter {
    pub fn matches(&self, email: &Email) -> bool {
        self.category.is_none_or(|c| email.category == c)
            && self.date.is_none_or(|d| email.processed_at.date_naive() == d)
    }
}

/// Sortable columns of the log view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    Sender,
    Subject,
    Label,
    SyncStatus,
    ProcessedAt,
}

impl SortField {
    fn compare(&self, a: &Email, b: &Email) -> Ordering {
        match self {
            Self::Sender => cmp_case_insensitive(&a.sender, &b.sender),
            Self::Subject => cmp_case_insensitive(&a.subject, &b.subject),
            Self::Label => cmp_case_insensitive(&a.label, &b.label),
            Self::SyncStatus => a.sync_status.as_str().cmp(b.sync_status.as_str()),
            Self::ProcessedAt => a
                .processed_at
                .timestamp_millis()
                .cmp(&b.processed_at.timestamp_millis()),
        }
    }
}

impl std::str::FromStr for SortField {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sender" => Ok(Self::Sender),
            "subject" => Ok(Self::Subject),
            "label" => Ok(Self::Label),
            "syncStatus" | "sync_status" => Ok(Self::SyncStatus),
            "processedAt" | "processed_at" => Ok(Self::ProcessedAt),
            _ => Err(format!("Unknown sort field: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl std::str::FromStr for SortDirection {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "asc" | "ascending" => Ok(Self::Ascending),
            "desc" | "descending" => Ok(Self::Descending),
            _ => Err(format!("Unknown sort direction: {}", s)),
        }
    }
}

/// Column-header sort state: unsorted → ascending → descending → unsorted
/// on repeated clicks of one column. Clicking another column starts that
/// column at ascending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortState {
    #[default]
    Unsorted,
    Sorted {
        field: SortField,
        direction: SortDirection,
    },
}

impl SortState {
    /// The log page opens newest first.
    pub fn newest_first() -> Self {
        Self::Sorted {
            field: SortField::ProcessedAt,
            direction: SortDirection::Descending,
        }
    }

    pub fn toggle(self, field: SortField) -> Self {
        match self {
            Self::Sorted {
                field: current,
                direction: SortDirection::Ascending,
            } if current == field => Self::Sorted {
                field,
                direction: SortDirection::Descending,
            },
            Self::Sorted {
                field: current,
                direction: SortDirection::Descending,
            } if current == field => Self::Unsorted,
            _ => Self::Sorted {
                field,
                direction: SortDirection::Ascending,
            },
        }
    }
}

/// Filtered, sorted copy of `emails`.
pub fn apply(emails: &[Email], filter: &EmailFilter, sort: SortState) -> Vec<Email> {
    let mut view: Vec<Email> = emails
        .iter()
        .filter(|e| filter.matches(e))
        .cloned()
        .collect();

    if let SortState::Sorted { field, direction } = sort {
        view.sort_by(|a, b| {
            let ord = field.compare(a, b);
            match direction {
                SortDirection::Ascending => ord,
                SortDirection::Descending => ord.reverse(),
            }
        });
    }

    view
}

/// Query-string form of a view: `?category=sent&date=2024-01-01&sort=label&direction=desc`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ViewQuery {
    pub category: Option<String>,
    pub date: Option<String>,
    pub sort: Option<String>,
    pub direction: Option<String>,
}

impl ViewQuery {
    /// Validate into a filter and sort state. A sort field without a
    /// direction sorts ascending; a direction without a field is rejected.
    pub fn parse(&self) -> Result<(EmailFilter, SortState), String> {
        let category = match non_empty(&self.category) {
            None | Some("all") => None,
            Some(raw) => Some(raw.parse::<Category>()?),
        };

        let date = non_empty(&self.date)
            .map(|raw| {
                NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                    .map_err(|_| format!("Invalid date filter (expected YYYY-MM-DD): {}", raw))
            })
            .transpose()?;

        let sort = match (non_empty(&self.sort), non_empty(&self.direction)) {
            (None, None) => SortState::Unsorted,
            (None, Some(_)) => return Err("Sort direction given without a sort field".into()),
            (Some(field), direction) => SortState::Sorted {
                field: field.parse()?,
                direction: direction
                    .map(str::parse::<SortDirection>)
                    .transpose()?
                    .unwrap_or(SortDirection::Ascending),
            },
        };

        Ok((EmailFilter { category, date }, sort))
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn cmp_case_insensitive(a: &str, b: &str) -> Ordering {
    a.chars()
        .flat_map(char::to_lowercase)
        .cmp(b.chars().flat_map(char::to_lowercase))
}
