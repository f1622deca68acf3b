//! Environment configuration for the hosted functions

/// Secrets and endpoints read from the environment. Every value is optional;
/// each function reports the ones it needs when they are missing.
#[derive(Debug, Clone, Default)]
pub struct FunctionsConfig {
    pub project_url: Option<String>,
    pub anon_key: Option<String>,
    pub service_role_key: Option<String>,
    pub gemini_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub resend_api_key: Option<String>,
    /// Comma-separated model override for document analysis
    pub analysis_models: Option<String>,
    /// Where the weekly report goes
    pub report_recipient: Option<String>,
}

impl FunctionsConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; blank values count as missing
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        Self {
            project_url: get("SUPABASE_URL").or_else(|| get("PROJECT_URL")),
            anon_key: get("SUPABASE_ANON_KEY"),
            service_role_key: get("SUPABASE_SERVICE_ROLE_KEY"),
            gemini_api_key: get("GEMINI_API_KEY"),
            openai_api_key: get("OPENAI_API_KEY"),
            resend_api_key: get("RESEND_API_KEY"),
            analysis_models: get("ANALYSIS_MODELS"),
            report_recipient: get("REPORT_RECIPIENT"),
        }
    }
}
