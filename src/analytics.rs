//! Dashboard aggregates over the current email sequence.
//!
//! Pure functions, no I/O. An empty sequence is valid input everywhere and
//! yields zero counts rather than NaN percentages.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::feed::{Email, SyncStatus};

/// Number of senders listed in the dashboard summary.
const TOP_SENDER_LIMIT: usize = 5;

/// Headline counters for the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsStats {
    pub total_emails: usize,
    /// Distinct labels, compared case-sensitively.
    pub total_labels: usize,
    pub synced_emails: usize,
    pub failed_syncs: usize,
}

/// Share of the sequence carrying one label.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelStats {
    pub label: String,
    pub count: usize,
    /// `count / total * 100`, rounded to two decimals.
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SenderCount {
    pub sender: String,
    pub count: usize,
}

/// Everything the overview page shows, derived in one place.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub stats: AnalyticsStats,
    /// Whole-number percentage of synced emails.
    pub sync_rate: u32,
    /// Emails that are neither synced nor failed.
    pub pending_emails: usize,
    pub top_senders: Vec<SenderCount>,
}

pub fn compute_analytics_stats(emails: &[Email]) -> AnalyticsStats {
    let mut labels = HashSet::new();
    let mut stats = AnalyticsStats {
        total_emails: emails.len(),
        ..Default::default()
    };

    for email in emails {
        labels.insert(email.label.as_str());
        match email.sync_status {
            SyncStatus::Synced => stats.synced_emails += 1,
            SyncStatus::Failed => stats.failed_syncs += 1,
            SyncStatus::Pending => {}
        }
    }

    stats.total_labels = labels.len();
    stats
}

/// One entry per distinct label. Entries come out in first-seen order, but
/// callers should not depend on that.
pub fn compute_label_stats(emails: &[Email]) -> Vec<LabelStats> {
    let total = emails.len();
    let counts = count_first_seen(emails.iter().map(|e| e.label.as_str()));

    counts
        .into_iter()
        .map(|(label, count)| LabelStats {
            label: label.to_string(),
            count,
            percentage: percentage(count, total),
        })
        .collect()
}

pub fn compute_dashboard_summary(emails: &[Email]) -> DashboardSummary {
    let stats = compute_analytics_stats(emails);

    let sync_rate = if stats.total_emails > 0 {
        (stats.synced_emails as f64 / stats.total_emails as f64 * 100.0).round() as u32
    } else {
        0
    };
    let pending_emails = stats.total_emails - stats.synced_emails - stats.failed_syncs;

    let mut senders = count_first_seen(emails.iter().map(|e| e.sender.as_str()));
    // Stable, so equal counts keep first-seen order.
    senders.sort_by(|a, b| b.1.cmp(&a.1));
    let top_senders = senders
        .into_iter()
        .take(TOP_SENDER_LIMIT)
        .map(|(sender, count)| SenderCount {
            sender: sender.to_string(),
            count,
        })
        .collect();

    DashboardSummary {
        stats,
        sync_rate,
        pending_emails,
        top_senders,
    }
}

fn count_first_seen<'a>(keys: impl Iterator<Item = &'a str>) -> Vec<(&'a str, usize)> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut counts: Vec<(&str, usize)> = Vec::new();

    for key in keys {
        match index.get(key) {
            Some(&i) => counts[i].1 += 1,
            None => {
                index.insert(key, counts.len());
                counts.push((key, 1));
            }
        }
    }
    counts
}

fn percentage(count: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (count as f64 / total as f64 * 100.0 * 100.0).round() / 100.0
}
