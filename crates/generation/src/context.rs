//! Prompt context assembly
//!
//! Concatenates the top passages with stable delimiters and per-passage
//! headers carrying source id and chunk index, truncated to a token
//! budget. Whole passages are preserved where possible; a single passage
//! over the budget is truncated from its tail.

use docqa_core::text;
use docqa_core::Passage;

/// Assemble passages into a prompt context within `token_budget`
pub fn build_context(passages: &[Passage], token_budget: usize) -> String {
    let mut sections: Vec<String> = Vec::new();
    let mut used_tokens = 0usize;

    for passage in passages {
        let section = format!(
            "[{}#{}]\n{}",
            passage.source_id, passage.chunk_index, passage.content
        );
        let section_tokens = text::estimate_tokens(&section);

        if used_tokens + section_tokens <= token_budget {
            used_tokens += section_tokens;
            sections.push(section);
            continue;
        }

        // First passage alone over budget: keep its head, drop its tail
        if sections.is_empty() {
            let remaining = token_budget.saturating_sub(used_tokens);
            sections.push(truncate_tail(&section, remaining));
        }
        break;
    }

    sections.join("\n\n")
}

/// Truncate to roughly `token_budget` tokens at a word boundary
fn truncate_tail(section: &str, token_budget: usize) -> String {
    let max_chars = token_budget.saturating_mul(4);
    if section.len() <= max_chars {
        return section.to_string();
    }

    let boundary = section
        .char_indices()
        .take_while(|(i, _)| *i < max_chars)
        .last()
        .map(|(i, c)| i + c.len_utf8())
        .unwrap_or(0);
    let head = &section[..boundary];

    match head.rfind(char::is_whitespace) {
        Some(last_space) => format!("{}...", &section[..last_space]),
        None => format!("{}...", head),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn passage(source: &str, index: u32, content: &str) -> Passage {
        Passage::new(source, index, content, 0.8)
    }

    #[test]
    fn test_headers_carry_source_and_chunk() {
        let passages = vec![
            passage("kb.md", 0, "B-trees are balanced."),
            passage("notes.md", 3, "Pages hold many keys."),
        ];
        let context = build_context(&passages, 1_000);
        assert!(context.contains("[kb.md#0]"));
        assert!(context.contains("[notes.md#3]"));
        assert!(context.contains("B-trees are balanced."));
    }

    #[test]
    fn test_whole_passages_preserved_within_budget() {
        let long = "words and more words ".repeat(50);
        let passages = vec![
            passage("a.md", 0, &long),
            passage("b.md", 0, &long),
            passage("c.md", 0, &long),
        ];
        // Budget fits roughly one and a half passages: only one is kept whole
        let one_tokens = docqa_core::text::estimate_tokens(&format!("[a.md#0]\n{}", long));
        let context = build_context(&passages, one_tokens + one_tokens / 2);

        assert!(context.contains("[a.md#0]"));
        assert!(!context.contains("[b.md#0]"));
        assert!(!context.ends_with("..."));
    }

    #[test]
    fn test_single_oversized_passage_truncated_from_tail() {
        let huge = "token ".repeat(2_000);
        let passages = vec![passage("a.md", 0, &huge)];
        let context = build_context(&passages, 100);

        assert!(context.starts_with("[a.md#0]"));
        assert!(context.ends_with("..."));
        assert!(context.len() < huge.len());
    }

    #[test]
    fn test_empty_passages_empty_context() {
        assert_eq!(build_context(&[], 500), "");
    }
}
