//! `send-weekly-report`: summarise the last seven days for the founder

use axum::{extract::State, Json};
use platform::{fetch_one, EmailMessage, Query};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tender_types::{AuditAction, AuditEntry, AuditSeverity};
use tracing::{info, warn};

use super::record_audit;
use crate::error::FunctionError;
use crate::state::AppState;

/// Single row of `weekly_stats_view`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklyStats {
    #[serde(default)]
    pub new_tenders_count: u64,
    #[serde(default)]
    pub compliant_count: u64,
    #[serde(default)]
    pub non_compliant_count: u64,
    #[serde(default)]
    pub ai_success_count: u64,
    #[serde(default)]
    pub ai_failure_count: u64,
}

impl WeeklyStats {
    /// Share of drafts that cleared the safety gate; 100 with no attempts
    pub fn reliability(&self) -> u64 {
        let attempts = self.ai_success_count + self.ai_failure_count;
        if attempts == 0 {
            return 100;
        }
        ((self.ai_success_count as f64 / attempts as f64) * 100.0).round() as u64
    }
}

#[derive(Debug, Serialize)]
pub struct ReportResponse {
    pub success: bool,
    pub report: String,
    pub emailed: bool,
}

pub fn render_report(stats: &WeeklyStats) -> String {
    format!(
        "# Weekly Tender Engine Report
**Period:** Last 7 Days

## Activity
- **New Tenders Processed:** {}
- **Pass Rate:** {} Compliant / {} Failed

## AI System Health
- **Successful Drafts:** {}
- **Safety Fallbacks:** {}
- **Model Reliability:** {}%

## Action Items
- [ ] Check system alerts (if any CRITICAL logs exists)
",
        stats.new_tenders_count,
        stats.compliant_count,
        stats.non_compliant_count,
        stats.ai_success_count,
        stats.ai_failure_count,
        stats.reliability(),
    )
}

pub async fn handle_send_weekly_report(
    State(state): State<AppState>,
) -> Result<Json<ReportResponse>, FunctionError> {
    let db = state.backend.service_db()?;

    let stats: WeeklyStats = fetch_one(db.as_ref(), &Query::table("weekly_stats_view").limit(1))
        .await?
        .ok_or_else(|| FunctionError::NotFound("Weekly statistics are unavailable".to_string()))?;

    let report = render_report(&stats);

    let mut emailed = false;
    match (&state.mailer, state.config.report_recipient.as_deref()) {
        (Some(mailer), Some(recipient)) => {
            let mut message = EmailMessage::new(
                vec![recipient.to_string()],
                "Weekly Tender Engine Report",
                format!("<pre>{}</pre>", report),
            )
            .with_tag("category", "weekly_report");
            message.text = Some(report.clone());
            match mailer.send(&message).await {
                Ok(result) if result.success => emailed = true,
                Ok(result) => warn!(error = ?result.error, "weekly report was not accepted"),
                Err(e) => warn!("weekly report mail failed: {}", e),
            }
        }
        _ => info!("no report recipient configured, report not mailed"),
    }

    record_audit(
        db.as_ref(),
        AuditEntry::new(
            AuditAction::ReportSent.as_str(),
            AuditSeverity::Info,
            json!({"stats": stats, "emailed": emailed}),
        ),
    )
    .await;

    Ok(Json(ReportResponse {
        success: true,
        report,
        emailed,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reliability() {
        assert_eq!(WeeklyStats::default().reliability(), 100);
        let stats = WeeklyStats {
            ai_success_count: 2,
            ai_failure_count: 1,
            ..Default::default()
        };
        assert_eq!(stats.reliability(), 67);
    }

    #[test]
    fn test_report_sections() {
        let stats = WeeklyStats {
            new_tenders_count: 12,
            compliant_count: 8,
            non_compliant_count: 4,
            ai_success_count: 9,
            ai_failure_count: 1,
        };
        let report = render_report(&stats);
        assert!(report.starts_with("# Weekly Tender Engine Report"));
        assert!(report.contains("- **New Tenders Processed:** 12"));
        assert!(report.contains("- **Pass Rate:** 8 Compliant / 4 Failed"));
        assert!(report.contains("- **Model Reliability:** 90%"));
    }
}
