//! `analyze-document`: read an uploaded compliance document with the vision
//! model and check it against the caller's profile.
//!
//! Every outcome is answered with HTTP 200. Failures carry an `error` field
//! so browser clients never see an opaque non-2xx from the function host.

use axum::{body::Bytes, extract::State, http::HeaderMap, Json};
use platform::{ModelError, PlatformError, Query, COMPLIANCE_BUCKET};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Map, Value};
use tender_types::{reply::extract_json_object, ErrorBody, FunctionResult};
use thiserror::Error;
use tracing::{info, warn};

use crate::error::FunctionError;
use crate::state::AppState;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Invalid Request Body")]
    InvalidBody,

    #[error("Missing required fields: file_path={file_path}, doc_type={doc_type}")]
    MissingFields { file_path: String, doc_type: String },

    #[error("System Configuration Error: Missing {0}.")]
    NotConfigured(&'static str),

    #[error("Unauthorized: Missing Authorization Header")]
    MissingAuthorization,

    #[error("Failed to download file: {0}")]
    Download(String),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("Failed to parse AI response as JSON")]
    Unparseable,

    /// The model answered with an `error` object instead of an analysis
    #[error("AI Response Error: {0}")]
    Reported(String),

    #[error("{0}")]
    Backend(String),
}

impl From<FunctionError> for AnalysisError {
    fn from(e: FunctionError) -> Self {
        AnalysisError::Backend(e.to_string())
    }
}

impl From<AnalysisError> for ErrorBody {
    fn from(e: AnalysisError) -> Self {
        ErrorBody::new(e.to_string()).with_details("Edge Function Error Catch")
    }
}

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    pub doc_type: Option<String>,
    #[serde(default, rename = "validationRules")]
    pub validation_rules: Option<Value>,
}

/// The model's verdict on one document. Models are loose with types, so
/// nulls read as defaults and lists or strings are accepted interchangeably.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentAnalysis {
    #[serde(default, deserialize_with = "null_as_default")]
    pub valid: bool,
    /// 0-100
    #[serde(default, deserialize_with = "number_or_numeric_text")]
    pub confidence: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub reason: String,
    #[serde(default, deserialize_with = "text_or_list")]
    pub doc_type_detected: Option<String>,
    #[serde(default, deserialize_with = "text_or_list")]
    pub expiry_date: Option<String>,
    #[serde(default, deserialize_with = "text_or_list")]
    pub reference_number: Option<String>,
    #[serde(default, deserialize_with = "text_or_list")]
    pub summary: Option<String>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub risks: Vec<String>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub warnings: Vec<String>,
    #[serde(default, deserialize_with = "text_or_list")]
    pub strategic_value: Option<String>,
    #[serde(default, deserialize_with = "text_or_list")]
    pub strategy_tips: Option<String>,
    /// Anything else the model chose to return
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn value_text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn number_or_numeric_text<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_f64().unwrap_or_default(),
        Value::String(s) => s.trim().trim_end_matches('%').trim().parse().unwrap_or_default(),
        _ => 0.0,
    })
}

fn text_or_list<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => None,
        Value::Array(items) => {
            let joined = items.into_iter().map(value_text).collect::<Vec<_>>().join("; ");
            Some(joined).filter(|s| !s.is_empty())
        }
        other => Some(value_text(other)),
    })
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(items) => items.into_iter().map(value_text).collect(),
        Value::String(s) if !s.trim().is_empty() => vec![s],
        _ => Vec::new(),
    })
}

#[derive(Serialize)]
pub struct StatusResponse {
    status: &'static str,
    message: &'static str,
}

/// GET probe used by the dashboard to check the function is deployed
pub async fn handle_analyze_status() -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "active",
        message: "Analyze Document Function is running",
    })
}

pub async fn handle_analyze_document(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Json<FunctionResult<DocumentAnalysis>> {
    let result = analyze(&state, &headers, &body).await;
    if let Err(e) = &result {
        warn!("analyze-document failed: {}", e);
    }
    Json(result.into())
}

async fn analyze(state: &AppState, headers: &HeaderMap, body: &[u8]) -> Result<DocumentAnalysis, AnalysisError> {
    let request: AnalyzeRequest = serde_json::from_slice(body).map_err(|_| AnalysisError::InvalidBody)?;

    let (file_path, doc_type) = match (
        request.file_path.as_deref().filter(|p| !p.is_empty()),
        request.doc_type.as_deref().filter(|d| !d.is_empty()),
    ) {
        (Some(path), Some(doc_type)) => (path, doc_type),
        (path, doc_type) => {
            return Err(AnalysisError::MissingFields {
                file_path: path.unwrap_or("undefined").to_string(),
                doc_type: doc_type.unwrap_or("undefined").to_string(),
            })
        }
    };

    if state.config.project_url.is_none() {
        return Err(AnalysisError::NotConfigured("SUPABASE_URL"));
    }
    if state.config.anon_key.is_none() {
        return Err(AnalysisError::NotConfigured("SUPABASE_ANON_KEY"));
    }
    let vision = state
        .vision
        .as_ref()
        .ok_or(AnalysisError::NotConfigured("GEMINI_API_KEY"))?;

    let authorization = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.trim().is_empty())
        .ok_or(AnalysisError::MissingAuthorization)?;

    // Row level security limits this to the caller's own profile
    let db = state.backend.user_db(authorization)?;
    let profile = db
        .select(
            &Query::table("profiles")
                .select("company_name,registration_number,tax_reference_number,full_name")
                .limit(1),
        )
        .await
        .ok()
        .and_then(|rows| rows.into_iter().next())
        .unwrap_or_else(|| json!({}));

    let storage = state.backend.user_storage(authorization)?;
    let pdf = storage
        .download(COMPLIANCE_BUCKET, file_path)
        .await
        .map_err(|e| AnalysisError::Download(download_message(&e)))?;

    info!(doc_type, bytes = pdf.len(), "analyzing compliance document");

    let rules = request.validation_rules.unwrap_or_else(|| json!({}));
    let prompt = analysis_prompt(doc_type, &profile, &rules);
    let reply = vision.analyze_pdf(&prompt, &pdf).await?;

    parse_analysis(&reply)
}

fn download_message(e: &PlatformError) -> String {
    match e {
        PlatformError::Status { message, .. } => message.clone(),
        other => other.to_string(),
    }
}

/// Turn the model's reply into an analysis
pub fn parse_analysis(reply: &str) -> Result<DocumentAnalysis, AnalysisError> {
    if reply.trim().is_empty() {
        return Err(AnalysisError::Model(ModelError::EmptyReply));
    }
    let value = extract_json_object(reply).ok_or(AnalysisError::Unparseable)?;
    if let Some(error) = value.get("error") {
        return Err(AnalysisError::Reported(error.to_string()));
    }
    serde_json::from_value(value).map_err(|_| AnalysisError::Unparseable)
}

fn profile_field<'a>(profile: &'a Value, key: &str) -> &'a str {
    profile.get(key).and_then(Value::as_str).unwrap_or("Not on file")
}

pub fn analysis_prompt(doc_type: &str, profile: &Value, rules: &Value) -> String {
    let company = profile_field(profile, "company_name");
    let registration = profile_field(profile, "registration_number");
    let tax = profile_field(profile, "tax_reference_number");

    format!(
        r#"You are a STRICT Compliance Officer for South African Construction Tenders.
Your GOAL: Validate if this document is EXACTLY what is claimed and CROSS-REFERENCE it against the user's profile.

CLAIMED DOCUMENT TYPE: "{doc_type}"
USER PROFILE DATA (FOR COMPARISON):
- Company Name: "{company}"
- Full Name: "{full_name}"
- Registration No: "{registration}"
- Tax Reference No: "{tax}"

VALIDATION RULES: {rules}

INSTRUCTIONS:
1. **CLASSIFY**: Does this document match the claimed type?
2. **CROSS-REFERENCE**:
   - Does the Company Name on the document match "{company}"?
   - Does the Registration Number match "{registration}"?
   - Does the Tax Number match "{tax}"?
   - If there is a SIGNIFICANT mismatch (e.g. different company name), return "valid": false and state "Mismatched Company Identity" in reason.
3. **EXTRACT**: Extract fields.
   - Look for Expiry Dates.
   - Look for Reference Numbers.
4. **VALIDATE**:
   - If a "required" field is missing or expired, mark as "valid": false.
   - "valid" should be boolean.

RETURN JSON FORMAT ONLY:
{{
  "valid": boolean,
  "confidence": number, // 0-100
  "reason": "Short explanation of validity/mismatch judgment",
  "doc_type_detected": "What you think it is",
  "expiry_date": "YYYY-MM-DD" or null,
  "reference_number": "Main extracted ID" or null,
  "summary": "Brief 2 sentence summary",
  "risks": ["Risk 1", "Risk 2"],
  "strategic_value": "High/Medium/Low",
  "strategy_tips": "One key tip"
}}"#,
        full_name = profile_field(profile, "full_name"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_fenced_reply() {
        let reply = "```json\n{\"valid\": true, \"confidence\": 92, \"reason\": \"Matches\", \"risks\": [\"Expires soon\"]}\n```";
        let analysis = parse_analysis(reply).unwrap();
        assert!(analysis.valid);
        assert_eq!(analysis.confidence, 92.0);
        assert_eq!(analysis.risks, vec!["Expires soon".to_string()]);
    }

    #[test]
    fn test_parse_json_inside_prose() {
        let reply = "Here is the result: {\"valid\": false, \"reason\": \"Mismatched Company Identity\"} hope it helps";
        let analysis = parse_analysis(reply).unwrap();
        assert!(!analysis.valid);
        assert_eq!(analysis.reason, "Mismatched Company Identity");
    }

    #[test]
    fn test_parse_failures() {
        assert_eq!(parse_analysis("   ").unwrap_err().to_string(), "AI returned empty response");
        assert_eq!(
            parse_analysis("I cannot read this document").unwrap_err().to_string(),
            "Failed to parse AI response as JSON"
        );
        assert_eq!(
            parse_analysis("{\"error\": {\"code\": 429}}").unwrap_err().to_string(),
            "AI Response Error: {\"code\":429}"
        );
    }

    #[test]
    fn test_extra_fields_survive() {
        let analysis = parse_analysis("{\"valid\": true, \"risks\": \"single risk\", \"bbbee_level\": 2}").unwrap();
        assert_eq!(analysis.risks, vec!["single risk".to_string()]);
        assert_eq!(analysis.extra.get("bbbee_level"), Some(&json!(2)));
    }

    #[test]
    fn test_null_reason_reads_as_empty() {
        let analysis = parse_analysis(r#"{"valid": true, "confidence": 90, "reason": null}"#).unwrap();
        assert!(analysis.valid);
        assert_eq!(analysis.reason, "");
        assert_eq!(analysis.confidence, 90.0);
    }

    #[test]
    fn test_confidence_given_as_text() {
        let analysis = parse_analysis(r#"{"valid": true, "confidence": "90", "reason": "ok"}"#).unwrap();
        assert_eq!(analysis.confidence, 90.0);
        let analysis = parse_analysis(r#"{"valid": null, "confidence": "85%"}"#).unwrap();
        assert!(!analysis.valid);
        assert_eq!(analysis.confidence, 85.0);
    }

    #[test]
    fn test_list_valued_tips_are_joined() {
        let reply = r#"{"valid": true, "strategy_tips": ["a", "b"], "strategic_value": "High", "summary": null}"#;
        let analysis = parse_analysis(reply).unwrap();
        assert_eq!(analysis.strategy_tips.as_deref(), Some("a; b"));
        assert_eq!(analysis.strategic_value.as_deref(), Some("High"));
        assert_eq!(analysis.summary, None);
    }

    #[test]
    fn test_warnings_kept_beside_risks() {
        let reply = r#"{"valid": true, "risks": ["Unsigned"], "warnings": "Expires in 30 days"}"#;
        let analysis = parse_analysis(reply).unwrap();
        assert_eq!(analysis.risks, vec!["Unsigned".to_string()]);
        assert_eq!(analysis.warnings, vec!["Expires in 30 days".to_string()]);
        assert!(!analysis.extra.contains_key("warnings"));
    }

    #[test]
    fn test_prompt_carries_profile_and_rules() {
        let profile = json!({"company_name": "Acme Civils", "registration_number": "2015/123456/07"});
        let prompt = analysis_prompt("TAX_CLEARANCE", &profile, &json!({"required": ["pin"]}));
        assert!(prompt.contains("CLAIMED DOCUMENT TYPE: \"TAX_CLEARANCE\""));
        assert!(prompt.contains("- Company Name: \"Acme Civils\""));
        assert!(prompt.contains("- Tax Reference No: \"Not on file\""));
        assert!(prompt.contains("VALIDATION RULES: {\"required\":[\"pin\"]}"));
        assert!(prompt.contains("Mismatched Company Identity"));
    }

    #[test]
    fn test_error_body_details() {
        let body: ErrorBody = AnalysisError::MissingAuthorization.into();
        assert_eq!(body.error, "Unauthorized: Missing Authorization Header");
        assert_eq!(body.details.as_deref(), Some("Edge Function Error Catch"));
    }
}
