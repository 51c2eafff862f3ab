use crate::models::RetrievedChunk;

pub const SYSTEM_INSTRUCTION: &str = "Answer using only the context. \
If answer not present, say 'NOT FOUND'. \
Cite page numbers like (page 7).";

pub const CONTEXT_PREVIEW_CHARS: usize = 3_000;

/// One `[page N] text` entry per chunk, separated by a blank line.
pub fn build_context(retrieved: &[RetrievedChunk]) -> String {
    retrieved
        .iter()
        .map(|hit| format!("[page {}] {}", hit.page_number(), hit.text()))
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn build_prompt(context: &str, question: &str) -> String {
    format!("Context:\n{context}\n\nQ: {question}\nA:")
}

/// The first `max_chars` characters of the context, with `...` appended when
/// anything was cut.
pub fn context_preview(context: &str, max_chars: usize) -> String {
    match context.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &context[..cut]),
        None => context.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Chunk;

    fn hit(page_number: u32, text: &str) -> RetrievedChunk {
        RetrievedChunk {
            position: 0,
            distance: 0.0,
            chunk: Chunk {
                page_number,
                text: text.to_string(),
            },
        }
    }

    #[test]
    fn context_cites_each_page_and_separates_chunks() {
        let context = build_context(&[
            hit(2, "Load capacity is 500 kilograms per square meter."),
            hit(1, "The roof truss spans 12 meters."),
        ]);

        assert_eq!(
            context,
            "[page 2] Load capacity is 500 kilograms per square meter.\n\n[page 1] The roof truss spans 12 meters."
        );
    }

    #[test]
    fn prompt_follows_template() {
        let prompt = build_prompt("[page 2] Load capacity is 500 kg.", "What is the load capacity?");
        assert_eq!(
            prompt,
            "Context:\n[page 2] Load capacity is 500 kg.\n\nQ: What is the load capacity?\nA:"
        );
    }

    #[test]
    fn instruction_demands_grounding_and_citations() {
        assert!(SYSTEM_INSTRUCTION.contains("only the context"));
        assert!(SYSTEM_INSTRUCTION.contains("NOT FOUND"));
        assert!(SYSTEM_INSTRUCTION.contains("(page 7)"));
    }

    #[test]
    fn empty_retrieval_gives_empty_context() {
        assert_eq!(build_context(&[]), "");
    }

    #[test]
    fn preview_truncates_with_ellipsis() {
        let long = "ü".repeat(CONTEXT_PREVIEW_CHARS + 10);
        let preview = context_preview(&long, CONTEXT_PREVIEW_CHARS);

        assert_eq!(preview.chars().count(), CONTEXT_PREVIEW_CHARS + 3);
        assert!(preview.ends_with("ü..."));

        let exact = "a".repeat(CONTEXT_PREVIEW_CHARS);
        assert_eq!(context_preview(&exact, CONTEXT_PREVIEW_CHARS), exact);
    }
}
