//! Storage key normalization and the keeper-folder rule

use lazy_static::lazy_static;
use regex::Regex;
use reqwest::Url;

lazy_static! {
    static ref UUID_SEGMENT: Regex =
        Regex::new(r"(?i)^[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$").unwrap();
}

fn first_segment(path: &str) -> &str {
    path.split('/').next().unwrap_or_default()
}

/// The preserved account. Its top-level folder is never deleted.
#[derive(Debug, Clone)]
pub struct Keeper {
    pub id: String,
}

impl Keeper {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    pub fn owns_folder(&self, path: &str) -> bool {
        first_segment(path).eq_ignore_ascii_case(&self.id)
    }

    /// Fallback rule without an allow-list: delete only objects filed under
    /// another account's UUID folder
    pub fn foreign_uuid_folder(&self, path: &str) -> bool {
        let first = first_segment(path);
        UUID_SEGMENT.is_match(first) && !first.eq_ignore_ascii_case(&self.id)
    }
}

/// Bucket-relative key: decoded, no leading slash, no `bucket/` prefix
pub fn normalize_key(key: &str, bucket: &str) -> Option<String> {
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    let decoded = urlencoding::decode(key)
        .map(|k| k.into_owned())
        .unwrap_or_else(|_| key.to_string());
    let key = decoded.strip_prefix('/').unwrap_or(&decoded);
    let key = key
        .strip_prefix(bucket)
        .and_then(|rest| rest.strip_prefix('/'))
        .unwrap_or(key);
    (!key.is_empty()).then(|| key.to_string())
}

/// Accepts bare keys as well as public or signed object URLs
pub fn extract_storage_path(raw: &str, bucket: &str) -> Option<String> {
    if raw.starts_with("http") {
        if let Ok(url) = Url::parse(raw) {
            let marker = format!("/{}/", bucket);
            if let Some((_, rest)) = url.path().split_once(&marker) {
                return normalize_key(rest, bucket);
            }
        }
    }
    normalize_key(raw, bucket)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const KEEPER: &str = "faaaf0ba-77d3-4fc6-b3c7-21bf04b55400";

    #[test]
    fn test_normalize_key() {
        assert_eq!(
            normalize_key("/compliance/u1/cidb%20cert.pdf", "compliance").as_deref(),
            Some("u1/cidb cert.pdf")
        );
        assert_eq!(normalize_key("u1/a.pdf", "compliance").as_deref(), Some("u1/a.pdf"));
        assert_eq!(normalize_key("  ", "compliance"), None);
    }

    #[test]
    fn test_extract_from_public_url() {
        let url = "https://abc.supabase.co/storage/v1/object/public/tenders_documents/t1/spec%20v2.pdf";
        assert_eq!(
            extract_storage_path(url, "tenders_documents").as_deref(),
            Some("t1/spec v2.pdf")
        );
        assert_eq!(
            extract_storage_path("tenders_documents/t1/a.pdf", "tenders_documents").as_deref(),
            Some("t1/a.pdf")
        );
    }

    #[test]
    fn test_keeper_rules() {
        let keeper = Keeper::new(KEEPER);
        assert!(keeper.owns_folder(&format!("{}/doc.pdf", KEEPER.to_uppercase())));
        assert!(!keeper.owns_folder("cidb/doc.pdf"));

        assert!(keeper.foreign_uuid_folder("0b6a8f2e-1c1d-4c55-9a0e-2f1e0c9d8b7a/spec.pdf"));
        assert!(!keeper.foreign_uuid_folder(&format!("{}/spec.pdf", KEEPER)));
        assert!(!keeper.foreign_uuid_folder("public/spec.pdf"));
    }
}
