//! Prompt assembly for question answering.

use super::vector_index::SearchHit;

const CLOSING: &str = "Please base your response strictly on the excerpts provided and highlight \
key insights, trends, or anomalies relevant to the question.";

const SEPARATOR: &str = "\n\n";

/// Join retrieved chunk texts in rank order without exceeding `max_chars`
/// characters (separators included). Whole chunks are preferred; only a first
/// chunk that is longer than the budget on its own is cut short.
pub fn assemble_context(hits: &[SearchHit], max_chars: usize) -> String {
    let mut context = String::new();
    let mut used = 0;

    for hit in hits {
        let text = hit.chunk.text.as_str();
        let len = text.chars().count();

        if context.is_empty() {
            if len > max_chars {
                context.extend(text.chars().take(max_chars));
                break;
            }
            context.push_str(text);
            used = len;
            continue;
        }

        let needed = SEPARATOR.len() + len;
        if used + needed > max_chars {
            break;
        }
        context.push_str(SEPARATOR);
        context.push_str(text);
        used += needed;
    }
    context
}

/// Build the completion prompt for `question` from the retrieved `hits`.
pub fn build_prompt(
    instructions: &str,
    question: &str,
    hits: &[SearchHit],
    max_context_chars: usize,
) -> String {
    let context = assemble_context(hits, max_context_chars);
    format!(
        "{instructions}\n\nQuestion: {question}\n\nExcerpts:\n{context}\n\n{CLOSING}",
        instructions = instructions.trim(),
        question = question.trim(),
    )
}
