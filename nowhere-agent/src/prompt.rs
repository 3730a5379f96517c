//! Builds the per-iteration prompt: date, question, aggregated content,
//! diary, and visited references, per SPEC_FULL §4.5 step 5.
use chrono::Utc;

pub const RESPONSE_INSTRUCTIONS: &str = r#"Respond with exactly one JSON object, no surrounding prose, matching:
{"action": "answer"|"search"|"reflect", "thoughts": "...", "searchQuery": "..."|null, "questionsToAnswer": ["..."]|null, "answer": "..."|null, "references": [{"exactQuote": "...", "url": "..."}]|null}"#;

pub fn build_iteration_prompt(
    question: &str,
    content: &[String],
    diary_rendered: &str,
    visited: &[String],
) -> String {
    let mut out = String::new();
    out.push_str(&format!("Current date: {}\n\n", Utc::now().format("%Y-%m-%d")));
    out.push_str(&format!("Question: {question}\n\n"));

    out.push_str("Gathered content:\n");
    if content.is_empty() {
        out.push_str("(none yet)\n");
    } else {
        for (i, c) in content.iter().enumerate() {
            out.push_str(&format!("--- Source {} ---\n{c}\n", i + 1));
        }
    }
    out.push('\n');

    out.push_str("Diary:\n");
    out.push_str(if diary_rendered.is_empty() {
        "(empty)"
    } else {
        diary_rendered
    });
    out.push_str("\n\n");

    out.push_str("Visited references:\n");
    if visited.is_empty() {
        out.push_str("(none yet)\n");
    } else {
        for url in visited {
            out.push_str(&format!("- {url}\n"));
        }
    }
    out.push('\n');
    out.push_str(RESPONSE_INSTRUCTIONS);
    out
}

pub fn build_reflection_prompt(answer: &str, diary_rendered: &str) -> String {
    format!(
        "Your answer was too short:\n\n{answer}\n\n\
         Diary so far:\n{diary_rendered}\n\n\
         Expand the answer above into a fuller, well-structured response. \
         Reply with the expanded answer text only, no JSON wrapper."
    )
}

pub fn build_beast_mode_prompt(question: &str, diary_rendered: &str) -> String {
    format!(
        "Beast Mode Activated. You have run out of search budget. \
         Question: {question}\n\n\
         Diary of everything tried so far:\n{diary_rendered}\n\n\
         Give your best-effort final answer now, using whatever you have learned. \
         Reply with the answer text only, no JSON wrapper."
    )
}

pub fn append_sources(answer: &str, visited: &[String]) -> String {
    let mut out = answer.to_string();
    out.push_str("\n\nSources:\n");
    out.push_str(&visited.join("\n"));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_includes_question_and_visited_refs() {
        let prompt = build_iteration_prompt(
            "What is quicksort?",
            &["content a".into()],
            "",
            &["https://a".into(), "https://b".into()],
        );
        assert!(prompt.contains("What is quicksort?"));
        assert!(prompt.contains("content a"));
        assert!(prompt.contains("https://a"));
        assert!(prompt.contains("https://b"));
    }

    #[test]
    fn sources_block_lists_every_visited_url() {
        let out = append_sources("final answer", &["https://a".into(), "https://b".into()]);
        assert!(out.starts_with("final answer"));
        assert!(out.contains("Sources:\nhttps://a\nhttps://b"));
    }
}
