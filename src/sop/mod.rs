//! SOP document operations: prompt composition for generate, improve,
//! analyze, and summarize.
//!
//! Everything here is an opaque payload from the gateway's point of view.
//! Each operation pairs a user prompt with the shared system prompt and a
//! fixed sampling profile.

use serde::Deserialize;

/// System prompt shared by all four document operations.
pub const SYSTEM_PROMPT: &str = "\
You are an expert Standard Operating Procedure (SOP) architect with deep \
expertise in process engineering, quality management systems, and technical \
documentation. You produce SOPs that satisfy ISO 9001:2015 and ISO 45001 \
expectations while staying practical and actionable.

Structure every SOP with, in order: document control block (title, document \
ID, version, effective date, owner, classification), purpose, scope, \
definitions and acronyms, roles and responsibilities, prerequisites, the \
numbered procedure itself, safety and compliance notes, quality checkpoints, \
troubleshooting, references, and appendices where warranted.

Write in active voice and imperative mood, present tense, third person for \
roles. One instruction per step; numbered sub-steps for complex procedures; \
explicit IF/THEN decision points; concrete quantities, durations, and \
thresholds; never vague terms such as \"approximately\" or \"as needed\".

Output clean, properly nested Markdown: consistent heading hierarchy, \
tables with headers, code blocks with language tags, and horizontal rules \
between major sections. The result must be ready for review by ISO \
registrars and enterprise quality teams.";

/// Sampling profile for one document operation.
#[derive(Debug, Clone, Copy)]
pub struct OperationProfile {
    pub temperature: f64,
    pub max_tokens: u32,
}

pub const GENERATE_PROFILE: OperationProfile = OperationProfile {
    temperature: 0.7,
    max_tokens: 4000,
};
pub const IMPROVE_PROFILE: OperationProfile = OperationProfile {
    temperature: 0.6,
    max_tokens: 4000,
};
pub const ANALYZE_PROFILE: OperationProfile = OperationProfile {
    temperature: 0.5,
    max_tokens: 3000,
};
pub const SUMMARIZE_PROFILE: OperationProfile = OperationProfile {
    temperature: 0.5,
    max_tokens: 1000,
};

/// What an improvement pass should concentrate on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImproveFocus {
    #[default]
    General,
    Clarity,
    Structure,
    Compliance,
    Detail,
}

impl ImproveFocus {
    fn guidance(self) -> &'static str {
        match self {
            Self::General => "overall quality, structure, clarity, and professionalism",
            Self::Clarity => "clarity, readability, and ease of understanding",
            Self::Structure => "document structure, organization, and formatting",
            Self::Compliance => {
                "regulatory compliance, safety standards, and best practices"
            }
            Self::Detail => "level of detail, specificity, and completeness",
        }
    }
}

/// Marker the improve prompt asks the model to place between the rewritten
/// document and its feedback section.
pub const FEEDBACK_SEPARATOR: &str = "<!-- FEEDBACK_SEPARATOR -->";

/// Fallback heading looked for when the model ignores the separator.
const FEEDBACK_HEADING: &str = "## Improvement Summary";

pub fn generate_prompt(
    topic: &str,
    department: Option<&str>,
    complexity: Option<&str>,
    additional_context: Option<&str>,
) -> String {
    format!(
        "Generate a comprehensive Standard Operating Procedure for the following:\n\n\
         Topic: {topic}\n\
         Department: {department}\n\
         Complexity Level: {complexity}\n\
         Additional Context: {context}\n\n\
         Create a complete SOP document with:\n\
         1. Document Information (Title, Document ID, Version, Date, Approval)\n\
         2. Purpose and Objective\n\
         3. Scope and Applicability\n\
         4. Definitions and Acronyms (if needed)\n\
         5. Responsibilities\n\
         6. Required Materials/Equipment\n\
         7. Detailed Procedure (numbered steps with sub-steps)\n\
         8. Safety and Compliance Considerations\n\
         9. Quality Control Checkpoints\n\
         10. References and Related Documents\n\
         11. Revision History\n\n\
         Format the output in clear, professional Markdown format.",
        department = department.unwrap_or("General"),
        complexity = complexity.unwrap_or("Medium"),
        context = additional_context.unwrap_or("None"),
    )
}

pub fn improve_prompt(text: &str, focus: ImproveFocus) -> String {
    format!(
        "Improve the following SOP document. Focus on: {guidance}.\n\n\
         ## Original SOP:\n\
         {text}\n\n\
         ---\n\n\
         ## Your Task:\n\n\
         PART 1 - IMPROVED SOP:\n\
         Return the COMPLETE improved SOP document in proper Markdown format, \
         ready to use as-is. Preserve all original essential information, add a \
         proper document header (Title, ID, Version, Date, Owner), and use \
         well-structured sections with professional formatting.\n\n\
         Then place this exact delimiter on its own line:\n\
         {separator}\n\n\
         PART 2 - IMPROVEMENT FEEDBACK:\n\
         After the delimiter, add a section starting with \"{heading}\" \
         containing a table of changes made per category (structure, clarity, \
         completeness, compliance, formatting), the key improvements, and \
         recommendations for future updates.",
        guidance = focus.guidance(),
        separator = FEEDBACK_SEPARATOR,
        heading = FEEDBACK_HEADING,
    )
}

pub fn analyze_prompt(text: &str) -> String {
    format!(
        "Analyze this SOP document and provide a comprehensive quality assessment:\n\n\
         {text}\n\n\
         Provide detailed analysis covering:\n\
         1. Structure & Organization - document structure and logical flow\n\
         2. Clarity & Readability - language clarity and ease of understanding\n\
         3. Completeness - missing essential sections or information\n\
         4. Compliance - alignment with ISO 9001 and industry standards\n\
         5. Actionability - how well the procedures can be followed\n\
         6. Safety & Risk - safety considerations and risk management\n\
         7. Quality Score - overall rating (1-10) with justification\n\
         8. Specific Recommendations - prioritized list of improvements\n\n\
         Format as a detailed professional analysis report in Markdown."
    )
}

pub fn summarize_prompt(text: &str) -> String {
    format!(
        "Create an executive summary for this SOP:\n\n\
         {text}\n\n\
         Provide a concise executive summary that includes:\n\
         1. Document title and purpose\n\
         2. Key objectives (2-3 bullet points)\n\
         3. Primary responsibilities\n\
         4. Critical steps overview\n\
         5. Compliance requirements\n\n\
         Keep the summary under 300 words and format in professional Markdown."
    )
}

/// Split an improve response into (document, feedback).
///
/// Known-fragile text heuristic, deliberately confined to this one
/// function: prefer the explicit delimiter the prompt asked for, fall back
/// to the feedback heading, otherwise treat the whole output as the
/// document.
pub fn split_improved_document(content: &str) -> (&str, Option<&str>) {
    if let Some(index) = content.find(FEEDBACK_SEPARATOR) {
        let document = content[..index].trim_end();
        let feedback = content[index + FEEDBACK_SEPARATOR.len()..].trim();
        return (document, (!feedback.is_empty()).then_some(feedback));
    }

    if let Some(index) = content.find(FEEDBACK_HEADING) {
        let document = content[..index].trim_end().trim_end_matches('-').trim_end();
        let feedback = content[index..].trim();
        return (document, (!feedback.is_empty()).then_some(feedback));
    }

    (content.trim(), None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_prompt_fills_defaults() {
        let prompt = generate_prompt("Server patching", None, None, None);
        assert!(prompt.contains("Topic: Server patching"));
        assert!(prompt.contains("Department: General"));
        assert!(prompt.contains("Complexity Level: Medium"));
        assert!(prompt.contains("Additional Context: None"));
    }

    #[test]
    fn generate_prompt_uses_supplied_fields() {
        let prompt = generate_prompt(
            "Incident response",
            Some("Security"),
            Some("High"),
            Some("24/7 on-call rotation"),
        );
        assert!(prompt.contains("Department: Security"));
        assert!(prompt.contains("Complexity Level: High"));
        assert!(prompt.contains("24/7 on-call rotation"));
    }

    #[test]
    fn improve_focus_deserializes_lowercase() {
        let focus: ImproveFocus = serde_json::from_str("\"compliance\"").unwrap();
        assert_eq!(focus, ImproveFocus::Compliance);
        assert_eq!(ImproveFocus::default(), ImproveFocus::General);
    }

    #[test]
    fn improve_prompt_embeds_focus_guidance_and_document() {
        let prompt = improve_prompt("# Old SOP", ImproveFocus::Clarity);
        assert!(prompt.contains("clarity, readability"));
        assert!(prompt.contains("# Old SOP"));
        assert!(prompt.contains(FEEDBACK_SEPARATOR));
    }

    #[test]
    fn split_on_explicit_separator() {
        let content = format!(
            "# Improved SOP\n\nbody\n\n{FEEDBACK_SEPARATOR}\n\n## Improvement Summary\n\nnotes"
        );
        let (document, feedback) = split_improved_document(&content);

        assert_eq!(document, "# Improved SOP\n\nbody");
        assert!(feedback.unwrap().contains("notes"));
    }

    #[test]
    fn split_falls_back_to_heading() {
        let content = "# Improved SOP\n\nbody\n\n---\n\n## Improvement Summary\n\nnotes";
        let (document, feedback) = split_improved_document(content);

        assert_eq!(document, "# Improved SOP\n\nbody");
        assert!(feedback.unwrap().starts_with("## Improvement Summary"));
    }

    #[test]
    fn split_without_markers_returns_whole_document() {
        let (document, feedback) = split_improved_document("# Improved SOP only\n");
        assert_eq!(document, "# Improved SOP only");
        assert!(feedback.is_none());
    }

    #[test]
    fn per_operation_profiles_match_contract() {
        assert!((IMPROVE_PROFILE.temperature - 0.6).abs() < f64::EPSILON);
        assert_eq!(ANALYZE_PROFILE.max_tokens, 3000);
        assert_eq!(SUMMARIZE_PROFILE.max_tokens, 1000);
    }
}
