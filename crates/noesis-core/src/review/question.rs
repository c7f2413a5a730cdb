//! Multiple-choice review questions.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{NoesisError, NoesisResult};

use super::json_parser::remove_code_blocks;

/// Accepted number of options per question.
pub const MIN_OPTIONS: usize = 2;
pub const MAX_OPTIONS: usize = 4;

static OPTION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(?:[-*]\s*)?\(?([A-Da-d])[.):]\s*(.+?)\s*$").unwrap());
static ANSWER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*\**\s*(?:correct\s+)?answer\s*\**\s*[:：]\s*\**\s*\(?([A-D])\b").unwrap()
});
static STEM_PREFIX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*\**\s*(?:question|q)\s*\d*\s*[:.：]\s*\**\s*").unwrap());

/// One lettered option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionOption {
    /// Uppercase letter, `A` to `D`.
    pub label: char,
    pub text: String,
}

/// A generated multiple-choice question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewQuestion {
    pub stem: String,
    pub options: Vec<QuestionOption>,
    /// Label of the correct option.
    pub answer: char,
}

impl ReviewQuestion {
    /// The correct option.
    pub fn correct_option(&self) -> Option<&QuestionOption> {
        self.options.iter().find(|o| o.label == self.answer)
    }

    /// Whether `response` names the correct option, either by letter (any
    /// case, trailing punctuation allowed) or by the option's full text.
    pub fn check_answer(&self, response: &str) -> bool {
        let response = response
            .trim()
            .trim_end_matches(['.', ')', ':', '!'])
            .trim();

        let mut chars = response.chars();
        if let (Some(letter), None) = (chars.next(), chars.next()) {
            return letter.to_ascii_uppercase() == self.answer;
        }

        self.correct_option()
            .map(|o| o.text.trim().eq_ignore_ascii_case(response))
            .unwrap_or(false)
    }
}

impl fmt::Display for ReviewQuestion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.stem)?;
        for option in &self.options {
            writeln!(f, "  {}. {}", option.label, option.text)?;
        }
        Ok(())
    }
}

/// Parse a question from free text.
///
/// Expects a stem, 2 to 4 lettered options (`A.`, `A)` or `A:`) and an
/// `ANSWER: <letter>` marker naming one of the options.
pub fn parse_question(text: &str) -> NoesisResult<ReviewQuestion> {
    let cleaned = remove_code_blocks(text);

    let mut stem_lines: Vec<&str> = Vec::new();
    let mut options: Vec<QuestionOption> = Vec::new();
    let mut answer = None;

    for line in cleaned.lines() {
        if line.trim().is_empty() {
            continue;
        }
        if let Some(caps) = ANSWER_RE.captures(line) {
            answer = caps[1].chars().next().map(|c| c.to_ascii_uppercase());
            continue;
        }
        if let Some(caps) = OPTION_RE.captures(line) {
            let label = caps[1].chars().next().map(|c| c.to_ascii_uppercase());
            if let Some(label) = label {
                if options.iter().any(|o| o.label == label) {
                    return Err(NoesisError::invalid_question(format!(
                        "Duplicate option {}",
                        label
                    )));
                }
                options.push(QuestionOption {
                    label,
                    text: caps[2].to_string(),
                });
            }
            continue;
        }
        if options.is_empty() {
            stem_lines.push(line.trim());
        }
    }

    let stem = STEM_PREFIX_RE
        .replace(&stem_lines.join(" "), "")
        .trim()
        .to_string();
    if stem.is_empty() {
        return Err(NoesisError::invalid_question("Missing question stem"));
    }

    if !(MIN_OPTIONS..=MAX_OPTIONS).contains(&options.len()) {
        return Err(NoesisError::invalid_question(format!(
            "Expected {} to {} options, found {}",
            MIN_OPTIONS,
            MAX_OPTIONS,
            options.len()
        )));
    }

    let answer = answer.ok_or_else(|| NoesisError::invalid_question("Missing ANSWER marker"))?;
    if !options.iter().any(|o| o.label == answer) {
        return Err(NoesisError::invalid_question(format!(
            "Answer {} does not name an option",
            answer
        )));
    }

    Ok(ReviewQuestion {
        stem,
        options,
        answer,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const WELL_FORMED: &str = "What does the borrow checker enforce?\n\
        A. Garbage collection\n\
        B) Aliasing XOR mutability\n\
        C: Green threads\n\
        D. Tail calls\n\
        ANSWER: B";

    #[test]
    fn test_parse_well_formed() {
        let q = parse_question(WELL_FORMED).unwrap();
        assert_eq!(q.stem, "What does the borrow checker enforce?");
        assert_eq!(q.options.len(), 4);
        assert_eq!(q.answer, 'B');
        assert_eq!(q.correct_option().unwrap().text, "Aliasing XOR mutability");
    }

    #[test]
    fn test_parse_two_options_and_prefixes() {
        let text = "```\nQuestion: Is Rust memory safe?\n(a) Yes\n(b) No\n**Answer:** a\n```";
        let q = parse_question(text).unwrap();
        assert_eq!(q.stem, "Is Rust memory safe?");
        assert_eq!(q.options.len(), 2);
        assert_eq!(q.answer, 'A');
    }

    #[test]
    fn test_reject_missing_answer() {
        let text = "Stem?\nA. one\nB. two";
        let err = parse_question(text).unwrap_err();
        assert_eq!(err.code(), crate::error::ErrorCode::ParseInvalidQuestion);
    }

    #[test]
    fn test_reject_answer_outside_options() {
        let text = "Stem?\nA. one\nB. two\nANSWER: D";
        assert!(parse_question(text).is_err());
    }

    #[test]
    fn test_reject_wrong_option_count() {
        assert!(parse_question("Stem?\nA. only\nANSWER: A").is_err());
        assert!(parse_question("No options at all.\nANSWER: A").is_err());
    }

    #[test]
    fn test_reject_missing_stem() {
        assert!(parse_question("A. one\nB. two\nANSWER: A").is_err());
    }

    #[test]
    fn test_check_answer() {
        let q = parse_question(WELL_FORMED).unwrap();
        assert!(q.check_answer("B"));
        assert!(q.check_answer(" b. "));
        assert!(q.check_answer("b)"));
        assert!(q.check_answer("aliasing xor mutability"));
        assert!(!q.check_answer("A"));
        assert!(!q.check_answer("Garbage collection"));
        assert!(!q.check_answer(""));
    }

    #[test]
    fn test_display_lists_options() {
        let q = parse_question(WELL_FORMED).unwrap();
        let rendered = q.to_string();
        assert!(rendered.starts_with("What does the borrow checker enforce?"));
        assert!(rendered.contains("  B. Aliasing XOR mutability"));
        assert!(!rendered.contains("ANSWER"));
    }
}
