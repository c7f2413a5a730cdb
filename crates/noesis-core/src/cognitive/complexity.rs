//! Bilingual (CJK + Latin) text complexity heuristic.
//!
//! A Flesch–Kincaid grade is estimated over markdown-stripped text and then
//! squashed through a log-sigmoid into `[0.1, 1.0]`. Only monotonicity and
//! stability matter here; the value is used for ranking, not as a
//! readability grade.

use once_cell::sync::Lazy;
use regex::Regex;

/// Score given to empty or whitespace-only text.
pub const MIN_COMPLEXITY: f64 = 0.1;

static CODE_BLOCK_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"```[\s\S]*?```").unwrap());
static IMAGE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"!\[[^\]]*\]\([^)]*\)").unwrap());
static WIKI_LINK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[\[(?:[^\]|]*\|)?([^\]]*)\]\]").unwrap());
static LINK_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[([^\]]*)\]\([^)]*\)").unwrap());
static HTML_TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").unwrap());
static HEADING_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^\s*#{1,6}\s*").unwrap());
static LIST_BULLET_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*(?:[-*+]|\d+\.)\s+").unwrap());
static VOWEL_GROUP_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[aeiouy]+").unwrap());

/// Scores how linguistically demanding a document is.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextComplexityAnalyzer;

/// Intermediate counts, exposed for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextStats {
    pub sentences: usize,
    pub words: usize,
    pub syllables: f64,
    pub cjk_chars: usize,
}

impl TextComplexityAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Complexity in `[0.1, 1.0]`.
    pub fn complexity(&self, text: &str) -> f64 {
        if text.trim().is_empty() {
            return MIN_COMPLEXITY;
        }

        let cleaned = strip_markdown(text);
        if cleaned.trim().is_empty() {
            return MIN_COMPLEXITY;
        }

        let stats = self.stats(&cleaned);
        let grade = 0.39 * (stats.words as f64 / stats.sentences as f64)
            + 11.8 * (stats.syllables / stats.words as f64)
            - 15.59;

        let score = sigmoid(0.5 * ((grade.max(0.0) + 1.0).ln() - 2.5));
        (MIN_COMPLEXITY + (1.0 - MIN_COMPLEXITY) * score).clamp(MIN_COMPLEXITY, 1.0)
    }

    /// Sentence, word and syllable counts of already-stripped text.
    pub fn stats(&self, text: &str) -> TextStats {
        let cjk_chars = text.chars().filter(|&c| is_cjk(c)).count();

        let cjk_sentences = text.chars().filter(|c| matches!(c, '。' | '！' | '？')).count();
        let latin_sentences = text.chars().filter(|c| matches!(c, '.' | '!' | '?')).count();
        let sentences = (cjk_sentences + latin_sentences).max(1);

        let latin_text: String = text
            .chars()
            .map(|c| if is_cjk(c) { ' ' } else { c })
            .collect();
        let latin_words: Vec<&str> = latin_text
            .split_whitespace()
            .filter(|token| token.chars().any(|c| c.is_alphanumeric()))
            .collect();

        let words = (cjk_chars + latin_words.len()).max(1);
        let syllables = 1.5 * cjk_chars as f64
            + latin_words
                .iter()
                .map(|w| latin_syllables(w) as f64)
                .sum::<f64>();

        TextStats {
            sentences,
            words,
            syllables,
            cjk_chars,
        }
    }
}

/// Remove markdown constructs that carry no prose.
pub fn strip_markdown(text: &str) -> String {
    let text = CODE_BLOCK_RE.replace_all(text, " ");
    let text = IMAGE_RE.replace_all(&text, " ");
    let text = WIKI_LINK_RE.replace_all(&text, "$1");
    let text = LINK_RE.replace_all(&text, "$1");
    let text = HTML_TAG_RE.replace_all(&text, " ");
    let text = HEADING_RE.replace_all(&text, "");
    let text = LIST_BULLET_RE.replace_all(&text, "");
    text.into_owned()
}

fn latin_syllables(word: &str) -> usize {
    let lower = word.to_lowercase();
    let letters: String = lower.chars().filter(|c| c.is_alphabetic()).collect();
    let groups = VOWEL_GROUP_RE.find_iter(&letters).count();

    let silent_e = letters.ends_with('e') && groups >= 2;
    let count = if silent_e { groups - 1 } else { groups };
    count.max(1)
}

fn is_cjk(c: char) -> bool {
    matches!(c,
        '\u{4E00}'..='\u{9FFF}'
        | '\u{3400}'..='\u{4DBF}'
        | '\u{F900}'..='\u{FAFF}'
        | '\u{3040}'..='\u{30FF}'
        | '\u{AC00}'..='\u{D7AF}')
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_text_is_floor() {
        let analyzer = TextComplexityAnalyzer::new();
        assert_eq!(analyzer.complexity(""), MIN_COMPLEXITY);
        assert_eq!(analyzer.complexity("   \n\t "), MIN_COMPLEXITY);
    }

    #[test]
    fn test_markup_only_is_floor() {
        let analyzer = TextComplexityAnalyzer::new();
        assert_eq!(analyzer.complexity("```rust\nfn main() {}\n```"), MIN_COMPLEXITY);
    }

    #[test]
    fn test_single_character_in_range() {
        let analyzer = TextComplexityAnalyzer::new();
        for text in ["a", "。", "字", "#", "-"] {
            let c = analyzer.complexity(text);
            assert!((MIN_COMPLEXITY..=1.0).contains(&c), "{:?} -> {}", text, c);
        }
    }

    #[test]
    fn test_dense_prose_scores_higher_than_simple_prose() {
        let analyzer = TextComplexityAnalyzer::new();
        let simple = "The cat sat. The dog ran. We had fun.";
        let dense = "Epistemological considerations notwithstanding, the institutionalization \
                     of interdisciplinary methodologies necessitates comprehensive reconsideration \
                     of foundational theoretical presuppositions underlying contemporary scholarship.";
        assert!(analyzer.complexity(dense) > analyzer.complexity(simple));
    }

    #[test]
    fn test_stats_count_cjk_and_latin() {
        let analyzer = TextComplexityAnalyzer::new();
        let stats = analyzer.stats("所有权很重要。Ownership matters!");
        assert_eq!(stats.cjk_chars, 6);
        assert_eq!(stats.sentences, 2);
        assert_eq!(stats.words, 8);
    }

    #[test]
    fn test_latin_syllables() {
        assert_eq!(latin_syllables("cat"), 1);
        assert_eq!(latin_syllables("make"), 1);
        assert_eq!(latin_syllables("the"), 1);
        assert_eq!(latin_syllables("computer"), 3);
        assert_eq!(latin_syllables("rhythm"), 1);
        assert_eq!(latin_syllables("42"), 1);
    }

    #[test]
    fn test_strip_markdown() {
        let text = "# Title\n- item with [link](http://x.y) and [[Target|alias]]\n<b>bold</b>\n![img](a.png)";
        let stripped = strip_markdown(text);
        assert!(!stripped.contains('#'));
        assert!(!stripped.contains("http"));
        assert!(!stripped.contains("<b>"));
        assert!(!stripped.contains("a.png"));
        assert!(stripped.contains("link"));
        assert!(stripped.contains("alias"));
        assert!(stripped.starts_with("Title"));
    }
}
