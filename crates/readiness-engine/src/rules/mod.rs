pub mod bbbee;
pub mod cidb;
pub mod mandatory;

use chrono::NaiveDate;
use tender_types::{ComplianceDocument, DocumentStatus};

use crate::patterns::canonical_doc_key;
use crate::status::document_status;

/// The bidder's strongest document of a given type, with its status on `today`.
/// When a type was uploaded more than once, a valid copy wins over an expiring
/// one, which wins over an expired one.
pub(crate) fn find_document<'a>(
    docs: &'a [ComplianceDocument],
    key: &str,
    today: NaiveDate,
) -> Option<(&'a ComplianceDocument, DocumentStatus)> {
    let key = canonical_doc_key(key);
    docs.iter()
        .filter(|d| canonical_doc_key(&d.doc_type) == key)
        .map(|d| (d, document_status(d, today)))
        .min_by_key(|(_, status)| match status {
            DocumentStatus::Valid => 0,
            DocumentStatus::Warning => 1,
            DocumentStatus::Expired => 2,
        })
}

/// Like [`find_document`], but when several unexpired copies exist the one
/// scoring highest under `rank` is graded. Expired copies are only returned
/// when nothing else is on file.
pub(crate) fn find_best_document<'a, F>(
    docs: &'a [ComplianceDocument],
    key: &str,
    today: NaiveDate,
    rank: F,
) -> Option<(&'a ComplianceDocument, DocumentStatus)>
where
    F: Fn(&ComplianceDocument) -> i64,
{
    let canonical = canonical_doc_key(key);
    docs.iter()
        .filter(|d| canonical_doc_key(&d.doc_type) == canonical)
        .map(|d| (d, document_status(d, today)))
        .filter(|(_, status)| *status != DocumentStatus::Expired)
        .max_by_key(|(d, status)| (rank(d), *status == DocumentStatus::Valid))
        .or_else(|| find_document(docs, key, today))
}
