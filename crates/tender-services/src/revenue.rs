//! Revenue reporting over `subscription_history`

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tender_types::SubscriptionHistoryEntry;

const UNKNOWN_EMAIL: &str = "Unknown Email";
const UNKNOWN_COMPANY: &str = "Unknown Company";

/// Reporting window of the revenue dashboard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RevenueRange {
    #[serde(rename = "7D")]
    Week,
    #[serde(rename = "30D")]
    Month,
    #[serde(rename = "90D")]
    Quarter,
    #[serde(rename = "1Y")]
    Year,
}

impl RevenueRange {
    pub fn days(&self) -> i64 {
        match self {
            RevenueRange::Week => 7,
            RevenueRange::Month => 30,
            RevenueRange::Quarter => 90,
            RevenueRange::Year => 365,
        }
    }

    pub fn start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - Duration::days(self.days())
    }
}

impl FromStr for RevenueRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "7D" => Ok(RevenueRange::Week),
            "30D" => Ok(RevenueRange::Month),
            "90D" => Ok(RevenueRange::Quarter),
            "1Y" => Ok(RevenueRange::Year),
            other => Err(format!("Unknown revenue range: {}", other)),
        }
    }
}

impl fmt::Display for RevenueRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RevenueRange::Week => "7D",
            RevenueRange::Month => "30D",
            RevenueRange::Quarter => "90D",
            RevenueRange::Year => "1Y",
        };
        f.write_str(label)
    }
}

/// Who a payment belongs to, as reported by the admin users RPC
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRef {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub company_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub date: DateTime<Utc>,
    pub user_email: String,
    pub company_name: String,
    pub plan: String,
    pub amount: f64,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevenuePoint {
    pub date: String,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevenueReport {
    pub total_revenue: f64,
    /// Daily totals, oldest first
    pub graph_data: Vec<RevenuePoint>,
    /// Newest first
    pub transactions: Vec<Transaction>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyStatement {
    pub year: i32,
    pub month: u32,
    pub transactions: Vec<Transaction>,
    pub total_revenue: f64,
    pub count: usize,
}

/// Revenue over the trailing 30 days next to the all-time total
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RevenueSummary {
    pub revenue_30d: f64,
    pub lifetime_revenue: f64,
}

/// Index the admin users RPC result by id; malformed entries are skipped
pub fn user_index(users: &Value) -> HashMap<String, UserRef> {
    users
        .as_array()
        .map(|rows| {
            rows.iter()
                .filter_map(|row| serde_json::from_value::<UserRef>(row.clone()).ok())
                .map(|user| (user.id.clone(), user))
                .collect()
        })
        .unwrap_or_default()
}

pub fn transactions(entries: &[SubscriptionHistoryEntry], users: &HashMap<String, UserRef>) -> Vec<Transaction> {
    entries
        .iter()
        .map(|entry| {
            let user = users.get(&entry.user_id);
            Transaction {
                date: entry.created_at,
                user_email: user
                    .and_then(|u| u.email.clone())
                    .unwrap_or_else(|| UNKNOWN_EMAIL.to_string()),
                company_name: user
                    .and_then(|u| u.company_name.clone())
                    .unwrap_or_else(|| UNKNOWN_COMPANY.to_string()),
                plan: entry.plan_name.clone().unwrap_or_default(),
                amount: entry.amount,
                status: entry.status.clone().unwrap_or_default(),
            }
        })
        .collect()
}

pub fn total(entries: &[SubscriptionHistoryEntry]) -> f64 {
    entries.iter().map(|e| e.amount).sum()
}

/// Build the dashboard report from entries already limited to the range
pub fn build_report(entries: &[SubscriptionHistoryEntry], users: &HashMap<String, UserRef>) -> RevenueReport {
    let mut daily: BTreeMap<String, f64> = BTreeMap::new();
    for entry in entries {
        *daily.entry(entry.created_at.format("%Y-%m-%d").to_string()).or_default() += entry.amount;
    }

    let mut sorted = entries.to_vec();
    sorted.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    RevenueReport {
        total_revenue: total(entries),
        graph_data: daily
            .into_iter()
            .map(|(date, amount)| RevenuePoint { date, amount })
            .collect(),
        transactions: transactions(&sorted, users),
    }
}

/// Distinct `YYYY-MM` months with activity, newest first
pub fn available_months(dates: &[DateTime<Utc>]) -> Vec<String> {
    let months: BTreeSet<String> = dates.iter().map(|d| d.format("%Y-%m").to_string()).collect();
    months.into_iter().rev().collect()
}

/// `[start, end)` of a calendar month, or `None` for an invalid month
pub fn month_bounds(year: i32, month: u32) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let start = Utc.with_ymd_and_hms(year, month, 1, 0, 0, 0).single()?;
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    let end = Utc.with_ymd_and_hms(next_year, next_month, 1, 0, 0, 0).single()?;
    Some((start, end))
}

pub fn summarize(entries: &[SubscriptionHistoryEntry], now: DateTime<Utc>) -> RevenueSummary {
    let cutoff = RevenueRange::Month.start(now);
    RevenueSummary {
        revenue_30d: entries
            .iter()
            .filter(|e| e.created_at >= cutoff)
            .map(|e| e.amount)
            .sum(),
        lifetime_revenue: total(entries),
    }
}

pub fn statement(
    year: i32,
    month: u32,
    entries: &[SubscriptionHistoryEntry],
    users: &HashMap<String, UserRef>,
) -> MonthlyStatement {
    let in_month: Vec<SubscriptionHistoryEntry> = entries
        .iter()
        .filter(|e| e.created_at.year() == year && e.created_at.month() == month)
        .cloned()
        .collect();
    MonthlyStatement {
        year,
        month,
        transactions: transactions(&in_month, users),
        total_revenue: total(&in_month),
        count: in_month.len(),
    }
}
