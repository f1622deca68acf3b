//! Document validity relative to a reference date

use chrono::NaiveDate;
use tender_types::{ComplianceDocument, DocumentStatus};

/// Documents expiring within this many days are flagged `warning`
pub const EXPIRY_WARNING_DAYS: i64 = 90;

/// Status of a document on `today`.
///
/// An expiry date decides on its own. Without one the stored status is
/// trusted, and a document with neither is treated as valid.
pub fn document_status(doc: &ComplianceDocument, today: NaiveDate) -> DocumentStatus {
    match doc.expiry_date {
        Some(expiry) => status_for_expiry(expiry, today),
        None => doc.status.unwrap_or(DocumentStatus::Valid),
    }
}

pub fn status_for_expiry(expiry: NaiveDate, today: NaiveDate) -> DocumentStatus {
    let days_left = (expiry - today).num_days();
    if days_left < 0 {
        DocumentStatus::Expired
    } else if days_left <= EXPIRY_WARNING_DAYS {
        DocumentStatus::Warning
    } else {
        DocumentStatus::Valid
    }
}
