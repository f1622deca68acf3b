//! Confidence, prohibited-phrase and placeholder gates

use std::fmt;

use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

use tender_types::{AuditAction, AuditSeverity, DraftStatus};

use crate::template::FALLBACK_TEMPLATE;

/// Marker the model is told to emit for every missing detail
pub const PLACEHOLDER_MARKER: &str = "[[REQUIRES INPUT";

/// Confidence assumed for replies that are plain text rather than JSON
pub const RAW_TEXT_CONFIDENCE: f64 = 80.0;

lazy_static! {
    static ref DEFAULT_PROHIBITED: Vec<Regex> = vec![
        Regex::new(r"(?i)as mentioned in project").unwrap(),
        Regex::new(r"(?i)guaranteed win").unwrap(),
        Regex::new(r"(?i)bribe").unwrap(),
    ];
}

#[derive(Debug, Clone)]
pub struct SafetyConfig {
    pub min_confidence: f64,
    pub prohibited_phrases: Vec<Regex>,
    pub max_placeholders: usize,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            min_confidence: 50.0,
            prohibited_phrases: DEFAULT_PROHIBITED.clone(),
            max_placeholders: 5,
        }
    }
}

/// Structured reply requested from the text model
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DraftCandidate {
    #[serde(default)]
    pub content_markdown: String,
    #[serde(default = "raw_text_confidence")]
    pub confidence_score: f64,
    #[serde(default)]
    pub missing_data: Vec<String>,
}

fn raw_text_confidence() -> f64 {
    RAW_TEXT_CONFIDENCE
}

impl DraftCandidate {
    /// Read a model reply. Replies that are not the requested JSON object are
    /// taken verbatim as the draft body.
    pub fn from_model_reply(text: &str) -> Self {
        tender_types::reply::extract_json_object(text)
            .and_then(|value| serde_json::from_value::<DraftCandidate>(value).ok())
            .unwrap_or_else(|| DraftCandidate {
                content_markdown: text.to_string(),
                confidence_score: RAW_TEXT_CONFIDENCE,
                missing_data: Vec::new(),
            })
    }

    pub fn placeholder_count(&self) -> usize {
        self.content_markdown.matches(PLACEHOLDER_MARKER).count()
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SafetyViolation {
    #[error("Model unavailable ({0})")]
    ModelUnavailable(String),

    #[error("Empty draft content")]
    EmptyContent,

    #[error("Confidence too low ({0})")]
    LowConfidence(f64),

    #[error("Unsafe content detected by regex: {0}")]
    ProhibitedPhrase(String),
}

/// What gets stored for one drafting attempt
#[derive(Debug, Clone, PartialEq)]
pub struct DraftDecision {
    pub content: String,
    pub status: DraftStatus,
    pub notes: String,
    pub confidence: f64,
}

impl DraftDecision {
    pub fn fallback(violation: &SafetyViolation) -> Self {
        Self {
            content: FALLBACK_TEMPLATE.to_string(),
            status: DraftStatus::DraftManualEdit,
            notes: format!("Safety Failure: {}", violation),
            confidence: 0.0,
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.status == DraftStatus::DraftManualEdit
    }

    /// Audit action and severity recorded for this attempt
    pub fn audit(&self) -> (AuditAction, AuditSeverity) {
        if self.is_fallback() {
            (AuditAction::DraftFallback, AuditSeverity::Warn)
        } else {
            (AuditAction::DraftGenerated, AuditSeverity::Info)
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SafetyGate {
    config: SafetyConfig,
}

impl SafetyGate {
    pub fn new(config: SafetyConfig) -> Self {
        Self { config }
    }

    /// Run the gates in order: content, confidence, prohibited phrases, placeholders.
    /// Placeholder overload does not reject; it downgrades the status.
    pub fn evaluate(&self, candidate: DraftCandidate) -> Result<DraftDecision, SafetyViolation> {
        if candidate.content_markdown.trim().is_empty() {
            return Err(SafetyViolation::EmptyContent);
        }

        if candidate.confidence_score < self.config.min_confidence {
            return Err(SafetyViolation::LowConfidence(candidate.confidence_score));
        }

        if let Some(re) = self
            .config
            .prohibited_phrases
            .iter()
            .find(|re| re.is_match(&candidate.content_markdown))
        {
            return Err(SafetyViolation::ProhibitedPhrase(re.as_str().to_string()));
        }

        let status = if candidate.placeholder_count() > self.config.max_placeholders {
            DraftStatus::IncompleteData
        } else {
            DraftStatus::ReviewPending
        };

        Ok(DraftDecision {
            content: candidate.content_markdown,
            status,
            notes: "AI Generated successfully".to_string(),
            confidence: candidate.confidence_score,
        })
    }

    /// Decide what to store for a model call, substituting the fallback template
    /// on transport failure or any gate rejection.
    pub fn decide<E: fmt::Display>(&self, reply: Result<String, E>) -> DraftDecision {
        let outcome = reply
            .map_err(|e| SafetyViolation::ModelUnavailable(e.to_string()))
            .and_then(|text| self.evaluate(DraftCandidate::from_model_reply(&text)));

        match outcome {
            Ok(decision) => decision,
            Err(violation) => {
                warn!(%violation, "draft rejected, reverting to template");
                DraftDecision::fallback(&violation)
            }
        }
    }
}

/// Next version for a (tender, section) pair given the highest stored one
pub fn next_version(latest: Option<u32>) -> u32 {
    latest.unwrap_or(0) + 1
}
