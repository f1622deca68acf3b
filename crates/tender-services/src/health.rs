//! System health derived from recent `error_logs`

use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tender_types::ErrorLog;

/// More than this many errors in the window degrades the system
pub const DEGRADED_ERROR_THRESHOLD: usize = 5;

/// Incidents listed in a health report
pub const MAX_INCIDENTS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthWindow {
    #[serde(rename = "1h")]
    Hour,
    #[serde(rename = "24h")]
    Day,
    #[serde(rename = "7d")]
    Week,
}

impl HealthWindow {
    pub fn hours(&self) -> i64 {
        match self {
            HealthWindow::Hour => 1,
            HealthWindow::Day => 24,
            HealthWindow::Week => 168,
        }
    }

    pub fn start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - Duration::hours(self.hours())
    }
}

impl FromStr for HealthWindow {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "1" | "1h" => Ok(HealthWindow::Hour),
            "24" | "24h" => Ok(HealthWindow::Day),
            "168" | "168h" | "7d" => Ok(HealthWindow::Week),
            other => Err(format!("Unknown health window: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Critical,
}

/// Where an incident most likely originated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IncidentLayer {
    Db,
    Rpc,
    Auth,
    EdgeFunction,
    Client,
}

impl IncidentLayer {
    /// Classify by keywords in the page and description
    pub fn classify(log: &ErrorLog) -> Self {
        let text = format!("{} {}", log.page, log.description).to_lowercase();
        let has = |needles: &[&str]| needles.iter().any(|n| text.contains(n));

        if has(&["edge function", "functions/v1", "function error"]) {
            IncidentLayer::EdgeFunction
        } else if has(&["rpc", "get_admin_", "function get_"]) {
            IncidentLayer::Rpc
        } else if has(&["auth", "jwt", "token", "session", "unauthorized"]) {
            IncidentLayer::Auth
        } else if has(&["relation", "column", "database", "postgres", "violates", "row-level"]) {
            IncidentLayer::Db
        } else {
            IncidentLayer::Client
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthSignals {
    pub errors: usize,
    pub critical_errors: usize,
    pub rpc_failures: usize,
    pub auth_failures: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Incident {
    pub layer: IncidentLayer,
    pub page: String,
    pub description: String,
    pub severity: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemHealth {
    pub status: HealthStatus,
    pub window_hours: i64,
    pub signals: HealthSignals,
    pub incidents: Vec<Incident>,
    pub next_actions: Vec<String>,
}

/// Assess logs that already fall inside `window`
pub fn assess(window: HealthWindow, logs: &[ErrorLog]) -> SystemHealth {
    let mut signals = HealthSignals {
        errors: logs.len(),
        ..HealthSignals::default()
    };
    let mut incidents = Vec::with_capacity(logs.len());

    for log in logs {
        let layer = IncidentLayer::classify(log);
        if log.is_critical() {
            signals.critical_errors += 1;
        }
        match layer {
            IncidentLayer::Rpc => signals.rpc_failures += 1,
            IncidentLayer::Auth => signals.auth_failures += 1,
            _ => {}
        }
        incidents.push(Incident {
            layer,
            page: log.page.clone(),
            description: log.description.clone(),
            severity: log.severity.clone(),
            created_at: log.created_at,
        });
    }

    incidents.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    incidents.truncate(MAX_INCIDENTS);

    let status = if signals.critical_errors > 0 {
        HealthStatus::Critical
    } else if signals.errors > DEGRADED_ERROR_THRESHOLD {
        HealthStatus::Degraded
    } else {
        HealthStatus::Healthy
    };

    SystemHealth {
        status,
        window_hours: window.hours(),
        next_actions: next_actions(&signals),
        signals,
        incidents,
    }
}

fn next_actions(signals: &HealthSignals) -> Vec<String> {
    let mut actions = Vec::new();
    if signals.critical_errors > 0 {
        actions.push(format!(
            "Investigate {} critical error(s) before anything else",
            signals.critical_errors
        ));
    }
    if signals.rpc_failures > 0 {
        actions.push(format!(
            "Check database functions and grants: {} RPC failure(s)",
            signals.rpc_failures
        ));
    }
    if signals.auth_failures > 0 {
        actions.push(format!(
            "Review sign-in and token refresh: {} auth failure(s)",
            signals.auth_failures
        ));
    }
    if actions.is_empty() && signals.errors > DEGRADED_ERROR_THRESHOLD {
        actions.push("Review the error log for recurring client failures".to_string());
    }
    if actions.is_empty() {
        actions.push("No action needed".to_string());
    }
    actions
}
