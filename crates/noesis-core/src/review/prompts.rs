//! Prompt templates for review services.

use crate::types::KnowledgeNode;

/// Characters of each candidate's content included in a link prompt.
pub const CANDIDATE_SNIPPET_CHARS: usize = 500;

pub const QUESTION_GENERATION_PROMPT: &str = r#"You are a tutor writing review questions for a personal knowledge base.

Write ONE multiple-choice question that checks understanding of the key idea in the note below.

Rules:
- Ask about the concept, not about wording or formatting.
- Give between 2 and 4 options, each on its own line, labelled "A.", "B.", "C.", "D.".
- Exactly one option is correct.
- Finish with a line "ANSWER: <letter>".
- Reply in the language of the note.

Format:
<question stem>
A. <option>
B. <option>
C. <option>
D. <option>
ANSWER: <letter>

Note:
"#;

pub const LINK_INFERENCE_PROMPT: &str = r#"You connect notes in a personal knowledge base.

Given a SOURCE note and a list of CANDIDATE notes, decide which candidates the source should link to.

Return ONLY a JSON array. Each element has:
- "targetId": the candidate id
- "relation": a short phrase describing the relation (e.g. "extends", "example of", "contrasts with")
- "confidence": a number between 0 and 1

Omit candidates that are unrelated. Return [] when nothing is related.
"#;

/// Build the question generation prompt for `content`.
pub fn question_prompt(content: &str, max_chars: usize) -> String {
    format!("{}{}", QUESTION_GENERATION_PROMPT, truncate_chars(content, max_chars))
}

/// Build the link inference prompt.
pub fn link_prompt(source: &KnowledgeNode, candidates: &[&KnowledgeNode], max_chars: usize) -> String {
    let mut prompt = String::from(LINK_INFERENCE_PROMPT);
    prompt.push_str("\nSOURCE (id: ");
    prompt.push_str(&source.id);
    prompt.push_str(")\n");
    prompt.push_str(truncate_chars(&source.content, max_chars));
    prompt.push_str("\n\nCANDIDATES\n");

    for candidate in candidates {
        prompt.push_str("\n--- id: ");
        prompt.push_str(&candidate.id);
        prompt.push('\n');
        prompt.push_str(truncate_chars(&candidate.content, CANDIDATE_SNIPPET_CHARS));
        prompt.push('\n');
    }

    prompt
}

/// Longest prefix of `text` with at most `max_chars` characters.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NodeWeight;
    use chrono::Utc;

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("所有权很重要", 3), "所有权");
        assert_eq!(truncate_chars("short", 100), "short");
        assert_eq!(truncate_chars("abc", 0), "");
    }

    #[test]
    fn test_question_prompt_truncates_content() {
        let prompt = question_prompt(&"x".repeat(50), 10);
        assert!(prompt.ends_with(&"x".repeat(10)));
        assert!(!prompt.ends_with(&"x".repeat(11)));
        assert!(prompt.contains("ANSWER: <letter>"));
    }

    #[test]
    fn test_link_prompt_lists_candidates() {
        let now = Utc::now();
        let source = KnowledgeNode::new("a.md", "Ownership", NodeWeight::new(0.5, now));
        let b = KnowledgeNode::new("b.md", "Borrowing", NodeWeight::new(0.5, now));
        let c = KnowledgeNode::new("c.md", "Lifetimes", NodeWeight::new(0.5, now));

        let prompt = link_prompt(&source, &[&b, &c], 1000);
        assert!(prompt.contains("SOURCE (id: a)"));
        assert!(prompt.contains("--- id: b\nBorrowing"));
        assert!(prompt.contains("--- id: c\nLifetimes"));
    }
}
