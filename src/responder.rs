//! Prompt assembly for the retrieval-augmented chat flow.
//!
//! Pure functions only; the route handler wires them to the index actor and
//! the LLM client.

use crate::protocol::{ChatMessage, ScoredChunk};

const SYSTEM_PROMPT: &str = "You are a friendly and professional university assistant chatbot. \
Answer questions using only the provided document context. Be concise and helpful. \
If the context does not contain the answer, say so honestly instead of guessing. \
Maintain a warm, professional tone suitable for students and staff.";

/// Number of prior exchanges carried into the prompt.
const HISTORY_WINDOW: usize = 6;

/// Build the message list for a chat completion: system prompt, recent
/// conversation history, then the retrieved context and the question.
pub fn build_messages(
    history: &[(String, String)],
    context: &[ScoredChunk],
    question: &str,
) -> Vec<ChatMessage> {
    let mut messages = vec![ChatMessage::system(SYSTEM_PROMPT)];

    let start = history.len().saturating_sub(HISTORY_WINDOW);
    for (user_msg, assistant_msg) in &history[start..] {
        messages.push(ChatMessage::user(user_msg.clone()));
        messages.push(ChatMessage::assistant(assistant_msg.clone()));
    }

    let context_block = context
        .iter()
        .map(|c| c.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    messages.push(ChatMessage::user(format!(
        "Context from uploaded documents:\n{}\n\nQuestion: {}",
        context_block, question
    )));

    messages
}

/// Append a deduplicated source list to the answer, preserving retrieval
/// order.
pub fn append_sources(answer: &str, context: &[ScoredChunk]) -> String {
    let mut seen = Vec::new();
    for chunk in context {
        if !seen.contains(&chunk.source) {
            seen.push(chunk.source.clone());
        }
    }
    if seen.is_empty() {
        return answer.to_string();
    }
    format!("{}\n\nSources: {}", answer.trim_end(), seen.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(content: &str, source: &str) -> ScoredChunk {
        ScoredChunk {
            content: content.into(),
            source: source.into(),
            score: 0.9,
        }
    }

    #[test]
    fn test_messages_start_with_system() {
        let messages = build_messages(&[], &[], "hello");
        assert_eq!(messages[0].role, "system");
        assert_eq!(messages.len(), 2);
        assert!(messages[1].content.contains("Question: hello"));
    }

    #[test]
    fn test_history_window_limits_exchanges() {
        let history: Vec<(String, String)> = (0..20)
            .map(|i| (format!("q{}", i), format!("a{}", i)))
            .collect();
        let messages = build_messages(&history, &[], "latest");
        // system + 6 exchanges (12 messages) + final question
        assert_eq!(messages.len(), 14);
        assert_eq!(messages[1].content, "q14");
    }

    #[test]
    fn test_context_included() {
        let ctx = vec![chunk("Exam is on Friday.", "0-exams.pdf")];
        let messages = build_messages(&[], &ctx, "when is the exam?");
        assert!(messages[1].content.contains("Exam is on Friday."));
    }

    #[test]
    fn test_sources_deduplicated_in_order() {
        let ctx = vec![
            chunk("a", "0-notes.pdf"),
            chunk("b", "1-notes.pdf"),
            chunk("c", "0-notes.pdf"),
        ];
        let out = append_sources("Answer.", &ctx);
        assert_eq!(out, "Answer.\n\nSources: 0-notes.pdf, 1-notes.pdf");
    }

    #[test]
    fn test_no_sources_no_suffix() {
        assert_eq!(append_sources("Answer.", &[]), "Answer.");
    }
}
