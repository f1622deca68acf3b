//! In-app alert generation from document expiry and tender closing dates

use std::collections::HashSet;

use chrono::{Duration, NaiveDate};
use readiness_engine::patterns::doc_label;
use tender_types::{Alert, AlertPriority, ComplianceDocument, Tender, TenderStatus};

/// Documents expiring within this many days raise an alert
pub const DOCUMENT_ALERT_DAYS: i64 = 30;

/// Open tenders closing within this many days raise an alert
pub const TENDER_ALERT_DAYS: i64 = 7;

/// Identical messages are not repeated within this many days
pub const DEDUP_WINDOW_DAYS: i64 = 7;

const OPEN_STATUSES: &[TenderStatus] = &[
    TenderStatus::Draft,
    TenderStatus::Analyzing,
    TenderStatus::Compliant,
];

fn document_title(doc: &ComplianceDocument) -> &str {
    doc.title
        .as_deref()
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| doc_label(&doc.doc_type))
}

/// Alerts due for `user_id` on `today`, in document then tender order
pub fn due_alerts(
    user_id: &str,
    documents: &[ComplianceDocument],
    tenders: &[Tender],
    today: NaiveDate,
) -> Vec<Alert> {
    let mut alerts = Vec::new();
    let doc_horizon = today + Duration::days(DOCUMENT_ALERT_DAYS);
    let tender_horizon = today + Duration::days(TENDER_ALERT_DAYS);

    for doc in documents {
        let Some(expiry) = doc.expiry_date else {
            continue;
        };
        let title = document_title(doc);
        if expiry < today {
            alerts.push(Alert::new(
                user_id,
                AlertPriority::High,
                format!("EXPIRED: {} has expired! Please renew immediately.", title),
            ));
        } else if expiry <= doc_horizon {
            alerts.push(Alert::new(
                user_id,
                AlertPriority::High,
                format!(
                    "Document Expiring Soon: {} ({}) expires on {}",
                    title,
                    doc.category.as_deref().unwrap_or("General"),
                    expiry
                ),
            ));
        }
    }

    for tender in tenders.iter().filter(|t| OPEN_STATUSES.contains(&t.status)) {
        let Some(closing) = tender.closing_date else {
            continue;
        };
        if closing >= today && closing <= tender_horizon {
            let mut alert = Alert::new(
                user_id,
                AlertPriority::High,
                format!("Tender Closing Soon: {} closes on {}", tender.title, closing),
            );
            alert.tender_id = Some(tender.id.clone()).filter(|id| !id.is_empty());
            alerts.push(alert);
        }
    }

    alerts
}

/// Drop alerts whose message already went out recently, and duplicates within the batch
pub fn dedup(alerts: Vec<Alert>, recent_messages: &[String]) -> Vec<Alert> {
    let mut seen: HashSet<&str> = recent_messages.iter().map(String::as_str).collect();
    let mut fresh = Vec::new();
    for alert in &alerts {
        if seen.insert(alert.message.as_str()) {
            fresh.push(alert.clone());
        }
    }
    fresh
}
