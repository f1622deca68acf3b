//! Document keys, display labels and lenient value parsing for requirement targets

use serde_json::Value;

/// Document key of the CIDB grading certificate
pub const CIDB_CERT: &str = "cidb_cert";

/// Document key of the B-BBEE certificate or affidavit
pub const BBBEE_CERT: &str = "bbbee_cert";

/// Level assumed when a B-BBEE target or certificate omits one
pub const DEFAULT_BBBEE_LEVEL: i64 = 8;

/// Grade assumed when a CIDB target omits one
pub const DEFAULT_CIDB_TARGET_GRADE: i64 = 1;

/// Standard administrative set attached to manually registered tenders
pub const STANDARD_MANDATORY_DOCS: &[&str] = &[
    "cipc_cert",
    "sars_pin",
    "csd_summary",
    "coid_letter",
    "uif_reg",
    "bank_letter",
];

/// Metadata keys that carry a document's reference number, lowest priority first
pub const REFERENCE_NUMBER_KEYS: &[&str] = &[
    "registration_number",
    "crs_number",
    "tax_ref",
    "maaa_number",
    "vat_number",
    "uif_number",
    "coid_ref",
];

/// Aliases used by ingestion for keys stored under another name
const DOC_KEY_ALIASES: &[(&str, &str)] = &[
    ("tax_clearance", "sars_pin"),
    ("cidb", CIDB_CERT),
    ("bbbee", BBBEE_CERT),
    ("uif_cert", "uif_reg"),
];

/// Human label for a required document key
pub fn doc_label(key: &str) -> &str {
    match key {
        "cipc_cert" => "CIPC Registration",
        "sars_pin" => "Tax Clearance",
        "coid_letter" => "COID Letter",
        "uif_cert" => "UIF Registration",
        "bank_letter" => "Bank Letter",
        other => other,
    }
}

/// Canonical document key: lowercased, aliases resolved
pub fn canonical_doc_key(key: &str) -> String {
    let lower = key.trim().to_lowercase();
    DOC_KEY_ALIASES
        .iter()
        .find(|(alias, _)| *alias == lower)
        .map(|(_, canonical)| canonical.to_string())
        .unwrap_or(lower)
}

/// Integer prefix of a JSON value: `6`, `"6"`, `"6GB"` all read as 6
pub fn leading_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Value::String(s) => {
            let s = s.trim();
            let sign_len = usize::from(s.starts_with('-'));
            let digits: String = s[sign_len..]
                .chars()
                .take_while(|c| c.is_ascii_digit())
                .collect();
            if digits.is_empty() {
                return None;
            }
            let n: i64 = digits.parse().ok()?;
            Some(if sign_len == 1 { -n } else { n })
        }
        _ => None,
    }
}

/// String form of a target field, accepting numbers too
pub fn field_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
