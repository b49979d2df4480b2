//! Prompt templates for summarization and Q&A generation.
//!
//! All prompts work for both English and non-English documents. User
//! templates can be overridden via the `prompt_summary` / `prompt_qa`
//! settings; named placeholders are substituted and unknown placeholders are
//! left literal.

/// Section summary prompt (MAP phase), system part.
pub const SECTION_SUMMARY_SYSTEM: &str = "You are an expert document analyst. Your task is to create concise, accurate summaries of document sections.

Rules:
- Extract only the most important information
- Preserve specific numbers, dates, percentages, and names
- Keep summary to 3-5 sentences
- Be factual - no interpretations or opinions
- Write in the same language as the source text";

/// Section summary prompt (MAP phase), user part.
pub const SECTION_SUMMARY_USER: &str = "Summarize this section from a document.

## Section Title
{section_title}

## Section Content
{section_content}

## Instructions
Write a concise summary (3-5 sentences) capturing:
- Main topic/purpose of this section
- Key facts, numbers, or data points
- Important decisions, conclusions, or action items

Summary:";

/// Final summary prompt (REDUCE phase), system part.
pub const FINAL_SUMMARY_SYSTEM: &str = "You are an expert document analyst. Your task is to create a comprehensive summary from multiple section summaries.

Rules:
- Create a unified, coherent narrative
- Do not repeat information
- Prioritize the most important points
- Maintain logical flow between topics
- Write in the same language as the source text";

/// Final summary prompt (REDUCE phase), user part.
pub const FINAL_SUMMARY_USER: &str = "Create a comprehensive document summary from these section summaries.

## Document Title
{document_title}

## Document Type
{document_type}

## Section Summaries
{section_summaries}

## Instructions
Write a complete summary with this structure:

### Overview
2-3 sentences describing what this document is about and its main purpose.

### Key Points
• Most important finding or information
• Second most important point
• Third most important point
(add more if needed, maximum 7 points)

### Important Data
List any critical numbers, dates, names, or statistics that should be remembered.

### Conclusions
Main takeaways, recommendations, or action items from the document.

Summary:";

/// Single-call summary for short documents, system part.
pub const SHORT_DOC_SUMMARY_SYSTEM: &str = "You are an expert document analyst. Create clear, accurate, and comprehensive summaries.

Rules:
- Focus on main ideas and key findings
- Preserve critical numbers, dates, names
- Be objective and factual
- Write in the same language as the source text";

/// Single-call summary for short documents, user part.
pub const SHORT_DOC_SUMMARY_USER: &str = "Summarize this document.

## Document Title
{document_title}

## Document Type
{document_type}

## Document Content
{document_content}

## Instructions
Write a summary with this structure:

### Overview
2-3 sentences describing what this document is about.

### Key Points
• Most important information (3-7 bullet points)

### Important Data
Key numbers, dates, names, statistics worth remembering.

### Conclusions
Main takeaways or action items (if any).

Summary:";

/// Q&A generation system prompt.
pub const QA_SYSTEM: &str = "You are an expert at generating diverse question-answer pairs for document retrieval systems.";

/// Q&A generation user prompt.
pub const QA_USER: &str = "Generate {num_questions} diverse question-answer pairs for a document retrieval system.

## Document Information
- Title: {document_title}
- Type: {document_type}

## Document Content
{document_content}

## Guidelines
- Questions must be self-contained (understandable without context)
- Answers must be directly supported by the document - no assumptions
- Cover different sections and topics from the document
- Include diverse question types

## Question Types to Include
- **Factual**: Specific facts, numbers, dates, names (e.g., \"What was the revenue in Q3?\")
- **Overview**: General questions about purpose/topic (e.g., \"What is this document about?\")
- **Procedural**: How-to, processes, steps (e.g., \"How do I submit a request?\")
- **Comparison**: Comparing items, periods, options (e.g., \"How does X compare to Y?\")
- **Reasoning**: Why questions, causes, explanations (e.g., \"Why did sales increase?\")

## Required Output Format (JSON)
{
  \"qa_pairs\": [
    {
      \"question\": \"The question text\",
      \"answer\": \"The answer based on document content\",
      \"type\": \"factual|overview|procedural|comparison|reasoning\"
    }
  ]
}

Generate questions in the same language as the source document.";

/// Parent chunk summary prompt for the hierarchical chunking strategy.
pub const PARENT_SUMMARY_SYSTEM: &str = "You summarize document sections in one or two sentences. Be factual and concise.";

/// Substitutes `{name}` placeholders from the pairs; placeholders without a
/// pair stay literal.
pub fn render(template: &str, pairs: &[(&str, &str)]) -> String {
    let mut out = template.to_string();
    for (name, value) in pairs {
        out = out.replace(&format!("{{{name}}}"), value);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_substitutes_known_placeholders() {
        let out = render(
            "Title: {document_title} ({document_type})",
            &[("document_title", "plan.pdf"), ("document_type", "application/pdf")],
        );
        assert_eq!(out, "Title: plan.pdf (application/pdf)");
    }

    #[test]
    fn render_leaves_unknown_placeholders_literal() {
        let out = render("{document_title} {mystery}", &[("document_title", "x")]);
        assert_eq!(out, "x {mystery}");
    }
}
