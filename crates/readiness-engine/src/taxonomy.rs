//! Catalogue of South African tender compliance documents and their metadata fields

use std::collections::HashMap;

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;

use crate::patterns::field_text;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocCategory {
    Company,
    Cidb,
    Tax,
    Bbbee,
    Labour,
    Financial,
}

impl DocCategory {
    pub fn label(&self) -> &'static str {
        match self {
            DocCategory::Company => "Company & Registration",
            DocCategory::Cidb => "CIDB Grading",
            DocCategory::Tax => "Tax & Government",
            DocCategory::Bbbee => "B-BBEE",
            DocCategory::Labour => "Labour & Safety",
            DocCategory::Financial => "Financial",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "options", rename_all = "lowercase")]
pub enum FieldKind {
    Text,
    Date,
    Select(&'static [&'static str]),
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct FieldSpec {
    pub key: &'static str,
    pub label: &'static str,
    pub kind: FieldKind,
    pub required: bool,
    pub pattern: Option<&'static str>,
    pub message: Option<&'static str>,
}

const fn text(key: &'static str, label: &'static str, required: bool) -> FieldSpec {
    FieldSpec {
        key,
        label,
        kind: FieldKind::Text,
        required,
        pattern: None,
        message: None,
    }
}

const fn checked(
    key: &'static str,
    label: &'static str,
    pattern: &'static str,
    message: &'static str,
) -> FieldSpec {
    FieldSpec {
        key,
        label,
        kind: FieldKind::Text,
        required: true,
        pattern: Some(pattern),
        message: Some(message),
    }
}

const fn select(key: &'static str, label: &'static str, options: &'static [&'static str]) -> FieldSpec {
    FieldSpec {
        key,
        label,
        kind: FieldKind::Select(options),
        required: true,
        pattern: None,
        message: None,
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct DocumentTypeSpec {
    pub key: &'static str,
    pub label: &'static str,
    pub category: DocCategory,
    pub mandatory: bool,
    pub fields: &'static [FieldSpec],
}

pub const CIDB_GRADES: &[&str] = &["1", "2", "3", "4", "5", "6", "7", "8", "9"];

pub const CIDB_CLASSES: &[&str] = &[
    "CE", "GB", "ME", "EP", "EB", "SO", "SQ", "SH", "SI", "SJ", "SK", "SL",
];

pub const BBBEE_LEVELS: &[&str] = &["1", "2", "3", "4", "5", "6", "7", "8", "Non-Compliant"];

pub static DOCUMENT_TYPES: &[DocumentTypeSpec] = &[
    DocumentTypeSpec {
        key: "cipc_cert",
        label: "CIPC Registration Certificate",
        category: DocCategory::Company,
        mandatory: true,
        fields: &[checked(
            "registration_number",
            "Company Registration Number",
            r"^\d{4}/\d{6}/\d{2}$",
            "Format must be YYYY/NNNNNN/NN",
        )],
    },
    DocumentTypeSpec {
        key: "shareholding",
        label: "Shareholding / Share Certificates",
        category: DocCategory::Company,
        mandatory: false,
        fields: &[],
    },
    DocumentTypeSpec {
        key: "cidb_cert",
        label: "CIDB Certificate",
        category: DocCategory::Cidb,
        mandatory: true,
        fields: &[
            select("grade", "CIDB Grade", CIDB_GRADES),
            select("class", "Class of Work", CIDB_CLASSES),
            checked("crs_number", "CRS Number", r"^\d{6,8}$", "CRS Number should be 6-8 digits"),
        ],
    },
    DocumentTypeSpec {
        key: "sars_pin",
        label: "SARS Tax Clearance Pin",
        category: DocCategory::Tax,
        mandatory: true,
        fields: &[checked(
            "pin",
            "10-digit Tax PIN",
            r"^[A-Za-z0-9]{10}$",
            "Must be exactly 10 alphanumeric characters",
        )],
    },
    DocumentTypeSpec {
        key: "csd_summary",
        label: "CSD Registration Summary",
        category: DocCategory::Tax,
        mandatory: true,
        fields: &[checked(
            "maaa_number",
            "MAAA Number",
            r"^MAAA\d{7}$",
            "Must start with MAAA followed by 7 digits",
        )],
    },
    DocumentTypeSpec {
        key: "vat_cert",
        label: "VAT Registration",
        category: DocCategory::Tax,
        mandatory: false,
        fields: &[checked(
            "vat_number",
            "VAT Number",
            r"^4\d{9}$",
            "VAT Number must start with 4 and be 10 digits",
        )],
    },
    DocumentTypeSpec {
        key: "uif_reg",
        label: "UIF Registration",
        category: DocCategory::Tax,
        mandatory: true,
        fields: &[checked(
            "uif_number",
            "UIF Reference Number",
            r"^\d{7,9}(/\d)?$",
            "Invalid UIF format (e.g. 1234567/8)",
        )],
    },
    DocumentTypeSpec {
        key: "paye_reg",
        label: "PAYE Registration",
        category: DocCategory::Tax,
        mandatory: false,
        fields: &[],
    },
    DocumentTypeSpec {
        key: "bbbee_cert",
        label: "B-BBEE Certificate / Sworn Affidavit",
        category: DocCategory::Bbbee,
        mandatory: true,
        fields: &[
            select("level", "B-BBEE Level", BBBEE_LEVELS),
            checked(
                "black_ownership",
                "Black Ownership %",
                r"^\d{1,3}(\.\d{1,2})?%?$",
                "Enter a valid percentage (e.g. 51 or 51%)",
            ),
        ],
    },
    DocumentTypeSpec {
        key: "sbd_6_1",
        label: "SBD 6.1 Preference Points Claim",
        category: DocCategory::Bbbee,
        mandatory: true,
        fields: &[],
    },
    DocumentTypeSpec {
        key: "coid_letter",
        label: "COID Letter of Good Standing",
        category: DocCategory::Labour,
        mandatory: true,
        fields: &[text("coid_ref", "COID Reference", false)],
    },
    DocumentTypeSpec {
        key: "ohs_plan",
        label: "Occupational Health & Safety Plan",
        category: DocCategory::Labour,
        mandatory: true,
        fields: &[FieldSpec {
            key: "revision_date",
            label: "Date of Last Revision",
            kind: FieldKind::Date,
            required: true,
            pattern: None,
            message: None,
        }],
    },
    DocumentTypeSpec {
        key: "she_file",
        label: "SHE File Index",
        category: DocCategory::Labour,
        mandatory: false,
        fields: &[],
    },
    DocumentTypeSpec {
        key: "bank_letter",
        label: "Bank Confirmation Letter",
        category: DocCategory::Financial,
        mandatory: true,
        fields: &[
            text("bank_name", "Bank Name", true),
            text("account_holder", "Account Holder Name", true),
        ],
    },
];

lazy_static! {
    /// Compiled field patterns keyed by `(doc_type, field)`
    static ref FIELD_PATTERNS: HashMap<(&'static str, &'static str), Regex> = {
        let mut map = HashMap::new();
        for doc in DOCUMENT_TYPES {
            for field in doc.fields {
                if let Some(pattern) = field.pattern {
                    map.insert((doc.key, field.key), Regex::new(pattern).unwrap());
                }
            }
        }
        map
    };
}

pub fn lookup(doc_type: &str) -> Option<&'static DocumentTypeSpec> {
    DOCUMENT_TYPES.iter().find(|d| d.key == doc_type)
}

pub fn mandatory_types() -> impl Iterator<Item = &'static DocumentTypeSpec> {
    DOCUMENT_TYPES.iter().filter(|d| d.mandatory)
}

/// A metadata field that failed its taxonomy rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

/// Check a document's metadata against the fields its type declares.
/// Unknown document types have no field rules.
pub fn validate_metadata(doc_type: &str, metadata: &Value) -> Vec<FieldError> {
    let Some(spec) = lookup(doc_type) else {
        return Vec::new();
    };

    let mut errors = Vec::new();
    for field in spec.fields {
        let value = metadata.get(field.key).and_then(field_text);
        let Some(value) = value else {
            if field.required {
                errors.push(FieldError {
                    field: field.key,
                    message: format!("{} is required", field.label),
                });
            }
            continue;
        };

        match field.kind {
            FieldKind::Select(options) if !options.contains(&value.as_str()) => {
                errors.push(FieldError {
                    field: field.key,
                    message: format!("{} must be one of {}", field.label, options.join(", ")),
                });
            }
            FieldKind::Date if tender_types::dates::parse_date(&value).is_none() => {
                errors.push(FieldError {
                    field: field.key,
                    message: format!("{} is not a valid date", field.label),
                });
            }
            _ => {}
        }

        if let Some(re) = FIELD_PATTERNS.get(&(spec.key, field.key)) {
            if !re.is_match(&value) {
                errors.push(FieldError {
                    field: field.key,
                    message: field.message.unwrap_or("Invalid format").to_string(),
                });
            }
        }
    }
    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_lookup_known_and_unknown() {
        assert_eq!(lookup("cidb_cert").map(|d| d.category), Some(DocCategory::Cidb));
        assert!(lookup("passport").is_none());
    }

    #[test]
    fn test_mandatory_types_excludes_optional() {
        let keys: Vec<_> = mandatory_types().map(|d| d.key).collect();
        assert!(keys.contains(&"bank_letter"));
        assert!(!keys.contains(&"vat_cert"));
        assert!(!keys.contains(&"she_file"));
    }

    #[test]
    fn test_validate_cidb_metadata() {
        let ok = json!({ "grade": "7", "class": "GB", "crs_number": "10012345" });
        assert!(validate_metadata("cidb_cert", &ok).is_empty());

        let bad = json!({ "grade": "10", "class": "XX", "crs_number": "12" });
        let fields: Vec<_> = validate_metadata("cidb_cert", &bad).iter().map(|e| e.field).collect();
        assert_eq!(fields, vec!["grade", "class", "crs_number"]);
    }

    #[test]
    fn test_validate_reports_missing_required_only() {
        let errors = validate_metadata("coid_letter", &json!({}));
        assert!(errors.is_empty());

        let errors = validate_metadata("bank_letter", &json!({ "bank_name": "FNB" }));
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "account_holder");
    }

    #[test]
    fn test_validate_accepts_numeric_json_values() {
        let errors = validate_metadata("vat_cert", &json!({ "vat_number": 4123456789u64 }));
        assert!(errors.is_empty());
    }

    #[test]
    fn test_csd_pattern() {
        assert!(validate_metadata("csd_summary", &json!({ "maaa_number": "MAAA1234567" })).is_empty());
        assert_eq!(validate_metadata("csd_summary", &json!({ "maaa_number": "MAA123" })).len(), 1);
    }
}
