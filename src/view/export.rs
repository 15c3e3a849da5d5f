//! CSV download of the current log view.

use chrono::NaiveDate;

use crate::error::ExportError;
use crate::feed::Email;

const EXPORT_HEADERS: [&str; 6] = ["Sender", "Subject", "Summary", "Label", "Status", "Date"];

/// Serialize `emails` in the order given. Every field is quoted, inner quotes
/// are doubled, records end with `\n`, and dates are rendered `YYYY-MM-DD`.
pub fn export_csv(emails: &[Email]) -> Result<String, ExportError> {
    let mut writer = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Always)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    writer.write_record(EXPORT_HEADERS)?;
    for email in emails {
        let date = email.processed_at.date_naive().to_string();
        writer.write_record([
            email.sender.as_str(),
            email.subject.as_str(),
            email.body.as_str(),
            email.label.as_str(),
            email.sync_status.as_str(),
            date.as_str(),
        ])?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| ExportError::Csv(e.into_error().into()))?;
    String::from_utf8(bytes).map_err(|_| ExportError::Encoding)
}

/// Download name for an export taken on `today`.
pub fn export_filename(today: NaiveDate) -> String {
    format!("emails_{}.csv", today.format("%Y-%m-%d"))
}
