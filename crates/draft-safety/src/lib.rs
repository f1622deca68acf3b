//! Drafting safety gate
//!
//! Model output for a tender response section is only stored as reviewable
//! content when it clears every gate in [`gate::SafetyGate`]. Anything else is
//! replaced by [`template::FALLBACK_TEMPLATE`] and flagged for manual editing.

pub mod gate;
pub mod template;

pub use gate::{
    next_version, DraftCandidate, DraftDecision, SafetyConfig, SafetyGate, SafetyViolation,
    PLACEHOLDER_MARKER,
};
pub use template::{system_prompt, user_context, DEFAULT_COMPANY_NAME, FALLBACK_TEMPLATE};
