//! `notify-admin`: database webhook that mails opted-in admins about
//! high-tier client messages and critical system errors.

use axum::{body::Bytes, extract::State, Json};
use chrono::{SecondsFormat, Utc};
use platform::{fetch, fetch_one, EmailMessage, EmailSendResult, Query};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tender_types::Profile;
use tracing::{info, warn};

use crate::error::{parse_body, FunctionError};
use crate::state::AppState;

/// Row-change event as posted by the database webhook
#[derive(Debug, Deserialize)]
pub struct WebhookPayload {
    #[serde(rename = "type", default)]
    pub event_type: String,
    #[serde(default)]
    pub table: String,
    #[serde(default)]
    pub record: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    NotInsert,
    ProfileNotFound,
    TierThreshold,
    SeverityThreshold,
    NoSubscribers,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum NotifyOutcome {
    Skipped { status: &'static str, reason: SkipReason },
    Sent(EmailSendResult),
    Idle { status: &'static str, msg: &'static str },
}

impl NotifyOutcome {
    fn skipped(reason: SkipReason) -> Self {
        info!(?reason, "notification skipped");
        NotifyOutcome::Skipped {
            status: "skipped",
            reason,
        }
    }
}

/// Which admin preference a notification is gated on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Audience {
    TierSupport,
    CriticalErrors,
}

impl Audience {
    fn wants(&self, admin: &Profile) -> bool {
        match self {
            Audience::TierSupport => admin.notify_email_tier_support,
            Audience::CriticalErrors => admin.notify_email_critical_errors,
        }
    }
}

struct Notice {
    audience: Audience,
    subject: String,
    body: String,
}

#[derive(Deserialize)]
struct AuthorProfile {
    #[serde(default)]
    tier: Option<String>,
    #[serde(default)]
    company_name: Option<String>,
    #[serde(default)]
    full_name: Option<String>,
}

/// Subject for a client message, or `None` below Tier 2
pub fn feedback_subject(tier: Option<&str>, company: Option<&str>) -> Option<String> {
    let tier = tier.unwrap_or_default().to_lowercase();
    let prefix = if tier.contains("tier 3") {
        "[URGENT | TIER 3]"
    } else if tier.contains("tier 2") {
        "[TIER 2]"
    } else {
        return None;
    };
    Some(format!(
        "{} Client Message: {}",
        prefix,
        company.filter(|c| !c.is_empty()).unwrap_or("Unknown Company")
    ))
}

/// Subject for a critical error, or `None` for lower severities
pub fn error_subject(severity: Option<&str>, page: Option<&str>, description: Option<&str>) -> Option<String> {
    let severity = severity.unwrap_or_default().to_lowercase();
    if severity != "critical" && severity != "red" {
        return None;
    }
    let head: String = description.unwrap_or_default().chars().take(50).collect();
    Some(format!(
        "[CRITICAL | SYSTEM ERROR] {} – {}...",
        page.filter(|p| !p.is_empty()).unwrap_or("System"),
        head
    ))
}

fn field<'a>(record: &'a Value, key: &str) -> Option<&'a str> {
    record.get(key).and_then(Value::as_str)
}

fn display(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => "N/A".to_string(),
        Some(other) => other.to_string(),
    }
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

pub async fn handle_notify_admin(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<NotifyOutcome>, FunctionError> {
    let db = state.backend.service_db()?;
    let payload: WebhookPayload = parse_body(&body)?;

    if payload.event_type != "INSERT" {
        return Ok(Json(NotifyOutcome::skipped(SkipReason::NotInsert)));
    }

    let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
    let record = &payload.record;

    let notice = match payload.table.as_str() {
        "user_feedback" => {
            let author: Option<AuthorProfile> = fetch_one(
                db.as_ref(),
                &Query::table("profiles")
                    .select("tier,company_name,full_name")
                    .eq("id", field(record, "user_id").unwrap_or_default()),
            )
            .await
            .unwrap_or_else(|e| {
                warn!("profile lookup failed: {}", e);
                None
            });
            let Some(author) = author else {
                return Ok(Json(NotifyOutcome::skipped(SkipReason::ProfileNotFound)));
            };
            let Some(subject) = feedback_subject(author.tier.as_deref(), author.company_name.as_deref())
            else {
                return Ok(Json(NotifyOutcome::skipped(SkipReason::TierThreshold)));
            };
            Notice {
                audience: Audience::TierSupport,
                subject,
                body: format!(
                    "Event Type: Client Message (Feedback)\nCompany: {}\nClient Tier: {}\nUser: {}\nTimestamp: {}\n\nSummary:\n{}\n\nRating: {}/5\n",
                    author.company_name.as_deref().unwrap_or("N/A"),
                    author.tier.as_deref().unwrap_or("N/A"),
                    author.full_name.as_deref().filter(|n| !n.is_empty()).unwrap_or("N/A"),
                    timestamp,
                    display(record.get("message")),
                    display(record.get("rating")),
                ),
            }
        }
        "error_logs" => {
            let severity = field(record, "severity");
            let Some(subject) = error_subject(severity, field(record, "page"), field(record, "description"))
            else {
                return Ok(Json(NotifyOutcome::skipped(SkipReason::SeverityThreshold)));
            };
            Notice {
                audience: Audience::CriticalErrors,
                subject,
                body: format!(
                    "Event Type: Critical System Error\nSeverity: {}\nTimestamp: {}\n\nError Summary:\n{}\n\nPage/Context: {}\n",
                    severity.unwrap_or_default().to_uppercase(),
                    timestamp,
                    display(record.get("description")),
                    display(record.get("page")),
                ),
            }
        }
        _ => {
            return Ok(Json(NotifyOutcome::Idle {
                status: "ok",
                msg: "No conditions met",
            }))
        }
    };

    let admins: Vec<Profile> = fetch(
        db.as_ref(),
        &Query::table("profiles")
            .select("id,notify_email_tier_support,notify_email_critical_errors")
            .eq("is_admin", true),
    )
    .await
    .map_err(|e| {
        warn!("admin lookup failed: {}", e);
        FunctionError::Internal("DB Error".to_string())
    })?;

    let subscribers: Vec<&Profile> = admins.iter().filter(|a| notice.audience.wants(a)).collect();
    if subscribers.is_empty() {
        return Ok(Json(NotifyOutcome::skipped(SkipReason::NoSubscribers)));
    }

    let mut recipients = Vec::new();
    if let Some(directory) = &state.directory {
        for admin in subscribers {
            match directory.user_email(&admin.id).await {
                Ok(Some(email)) => recipients.push(email),
                Ok(None) => {}
                Err(e) => warn!(admin = %admin.id, "email lookup failed: {}", e),
            }
        }
    }
    if recipients.is_empty() {
        return Err(FunctionError::Internal("No Recipients".to_string()));
    }

    let mailer = state
        .mailer
        .as_ref()
        .ok_or_else(|| FunctionError::Config("Configuration Missing".to_string()))?;

    info!(count = recipients.len(), subject = %notice.subject, "notifying admins");

    let mut message = EmailMessage::new(
        recipients,
        notice.subject,
        format!("<pre>{}</pre>", escape_html(&notice.body)),
    );
    message.text = Some(notice.body);

    let result = mailer.send(&message).await?;
    if !result.success {
        warn!(error = ?result.error, "resend rejected notification");
        return Err(FunctionError::Internal("Resend Failed".to_string()));
    }

    Ok(Json(NotifyOutcome::Sent(result)))
}
