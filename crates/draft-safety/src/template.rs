//! Prompts sent to the text model and the template stored when it cannot be trusted

/// Stored with `DRAFT_MANUAL_EDIT` whenever generation fails or is rejected
pub const FALLBACK_TEMPLATE: &str = "
# Method Statement (Template)

**Note:** AI generation was unavailable or unsafe. Please edit this standard template.

## 1. Scope of Works
[Insert Scope Here]

## 2. Resources
- Plant: [List Plant]
- Labor: [List Team]

## 3. Methodology
The works will be executed in accordance with SANS 1200...
";

/// Company name used when the bidder's profile has none
pub const DEFAULT_COMPANY_NAME: &str = "The Contractor";

pub fn system_prompt(company_name: &str) -> String {
    format!(
        "You are the Tender Compliance Assistant for {company_name}.
Your Role: Draft technical method statements for construction tenders.

STRICT CONSTRAINTS:
1. SOURCE TRUTH: Use the provided context. Do NOT invent specific stats (e.g., \"Crane tonnage\").
2. NO HALLUCINATIONS: If a detail is missing, write \"[[REQUIRES INPUT: <Detail>]]\".
3. OUTPUT FORMAT: Return ONLY a valid JSON object.

JSON SCHEMA:
{{
  \"content_markdown\": \"string (markdown formatted)\",
  \"confidence_score\": number (0-100),
  \"missing_data\": [\"string\"]
}}"
    )
}

pub fn user_context(
    tender_title: &str,
    client_name: Option<&str>,
    section_name: &str,
    instruction: Option<&str>,
) -> String {
    format!(
        "Project: {}\nClient: {}\nSection: {}\nUser Instruction: {}",
        tender_title,
        client_name.filter(|c| !c.trim().is_empty()).unwrap_or("Generic Client"),
        section_name,
        instruction
            .filter(|p| !p.trim().is_empty())
            .unwrap_or("Standard professional draft"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_prompt_names_company_and_marker() {
        let prompt = system_prompt("Acme Civils");
        assert!(prompt.contains("Tender Compliance Assistant for Acme Civils"));
        assert!(prompt.contains("[[REQUIRES INPUT: <Detail>]]"));
        assert!(prompt.contains("\"confidence_score\""));
    }

    #[test]
    fn test_user_context_defaults() {
        let ctx = user_context("N2 Upgrade", None, "Method Statement", Some("  "));
        assert!(ctx.contains("Client: Generic Client"));
        assert!(ctx.contains("User Instruction: Standard professional draft"));
    }
}
