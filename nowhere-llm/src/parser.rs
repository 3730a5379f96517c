//! Tolerant decoder for the LLM's structured reply.
//!
//! Turns a string the model claims is JSON into an [`LlmResponse`]. Two
//! entry points exist: [`parse_strict`] may reject (used when a malformed
//! reply should end the run), and [`parse_lenient`] never rejects (used
//! when any text at all should be treated as a best-effort answer).

use regex::Regex;
use serde::Deserialize;
use std::sync::OnceLock;

/// A single citation attached to an answer.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Reference {
    #[serde(default, rename = "exactQuote")]
    pub exact_quote: Option<String>,
    pub url: String,
}

/// The decoded form of the LLM's reply, per the reply contract in §6.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LlmResponse {
    Answer {
        thoughts: String,
        answer: String,
        references: Vec<Reference>,
    },
    Search {
        thoughts: String,
        search_query: String,
    },
    Reflect {
        thoughts: String,
        questions_to_answer: Vec<String>,
    },
    Unknown {
        thoughts: String,
    },
}

impl LlmResponse {
    pub fn thoughts(&self) -> &str {
        match self {
            LlmResponse::Answer { thoughts, .. }
            | LlmResponse::Search { thoughts, .. }
            | LlmResponse::Reflect { thoughts, .. }
            | LlmResponse::Unknown { thoughts } => thoughts,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("LLM reply could not be decoded as JSON: {0}")]
    Malformed(String),
}

#[derive(Debug, Deserialize)]
struct RawReply {
    action: String,
    #[serde(default)]
    thoughts: String,
    #[serde(default, rename = "searchQuery")]
    search_query: Option<String>,
    #[serde(default, rename = "questionsToAnswer")]
    questions_to_answer: Option<Vec<String>>,
    #[serde(default)]
    answer: Option<String>,
    #[serde(default)]
    references: Option<Vec<Reference>>,
}

impl From<RawReply> for LlmResponse {
    fn from(raw: RawReply) -> Self {
        match raw.action.to_ascii_lowercase().as_str() {
            "answer" => LlmResponse::Answer {
                thoughts: raw.thoughts,
                answer: raw.answer.unwrap_or_default(),
                references: raw.references.unwrap_or_default(),
            },
            "search" => LlmResponse::Search {
                thoughts: raw.thoughts,
                search_query: raw.search_query.unwrap_or_default(),
            },
            "reflect" => LlmResponse::Reflect {
                thoughts: raw.thoughts,
                questions_to_answer: raw.questions_to_answer.unwrap_or_default(),
            },
            _ => LlmResponse::Unknown {
                thoughts: raw.thoughts,
            },
        }
    }
}

const CHAT_TEMPLATE_TOKENS: &[&str] = &[
    "<|im_start|>",
    "<|im_end|>",
    "<|eot_id|>",
    "<|start_header_id|>",
    "<|end_header_id|>",
    "[INST]",
    "[/INST]",
    "<s>",
    "</s>",
];

fn missing_comma_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#""\s*\n\s*""#).unwrap())
}

fn missing_space_after_colon_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#":\s*\n\s*""#).unwrap())
}

const FINAL_ANSWER_MARKER: &str = "FINAL ANSWER:";

/// Strict decode: raw JSON, then a repair pass, then a `FINAL ANSWER:`
/// fallback. May return [`ParseError::Malformed`].
pub fn parse_strict(raw: &str) -> Result<LlmResponse, ParseError> {
    if let Ok(reply) = serde_json::from_str::<RawReply>(raw) {
        return Ok(reply.into());
    }

    let repaired = repair(raw);
    if let Ok(reply) = serde_json::from_str::<RawReply>(&repaired) {
        return Ok(reply.into());
    }

    if let Some(idx) = raw.find(FINAL_ANSWER_MARKER) {
        let answer = raw[idx + FINAL_ANSWER_MARKER.len()..].trim().to_string();
        return Ok(LlmResponse::Answer {
            thoughts: String::new(),
            answer,
            references: Vec::new(),
        });
    }

    Err(ParseError::Malformed(raw.to_string()))
}

/// Strip chat-template tokens, trim, clip to the outer braces, and apply a
/// couple of regex fixes for the comma/space mistakes models commonly make
/// when asked for JSON inside a code fence.
fn repair(raw: &str) -> String {
    let mut s = raw.to_string();
    for tok in CHAT_TEMPLATE_TOKENS {
        s = s.replace(tok, "");
    }
    s = s.trim().to_string();

    if let (Some(start), Some(end)) = (s.find('{'), s.rfind('}')) {
        if end >= start {
            s = s[start..=end].to_string();
        }
    }

    let s = missing_comma_re().replace_all(&s, "\",\n\"");
    let s = missing_space_after_colon_re().replace_all(&s, ": \"");
    s.into_owned()
}

/// Lenient decode: never fails. Tries the strict path first; on failure,
/// treats the whole payload as prose — strips JSON artefacts and code
/// fences, normalizes headings — and returns it as an `answer`.
pub fn parse_lenient(raw: &str) -> LlmResponse {
    if let Ok(resp) = parse_strict(raw) {
        return resp;
    }

    let mut text = raw.trim().to_string();
    for fence in ["```json", "```JSON", "```"] {
        text = text.replace(fence, "");
    }
    text = text.replace('{', "").replace('}', "");
    text = text
        .replace("\"action\"", "")
        .replace("\"thoughts\"", "")
        .replace("\"answer\"", "");
    // Normalize markdown-style headings ("## Summary") into plain lines so
    // downstream section-keyword checks still see the words.
    let text = text
        .lines()
        .map(|line| line.trim_start_matches('#').trim())
        .collect::<Vec<_>>()
        .join("\n");

    LlmResponse::Answer {
        thoughts: String::new(),
        answer: text.trim().to_string(),
        references: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_well_formed_json() {
        let raw = r#"{"action":"Answer","thoughts":"t","answer":"a","references":[]}"#;
        let resp = parse_strict(raw).unwrap();
        assert_eq!(
            resp,
            LlmResponse::Answer {
                thoughts: "t".into(),
                answer: "a".into(),
                references: vec![],
            }
        );
    }

    #[test]
    fn action_is_case_insensitive() {
        let raw = r#"{"action":"SEARCH","thoughts":"t","searchQuery":"q"}"#;
        let resp = parse_strict(raw).unwrap();
        assert_eq!(
            resp,
            LlmResponse::Search {
                thoughts: "t".into(),
                search_query: "q".into(),
            }
        );
    }

    #[test]
    fn unknown_action_becomes_unknown_variant() {
        let raw = r#"{"action":"ponder","thoughts":"t"}"#;
        let resp = parse_strict(raw).unwrap();
        assert_eq!(
            resp,
            LlmResponse::Unknown {
                thoughts: "t".into()
            }
        );
    }

    #[test]
    fn repairs_wrapped_and_chat_templated_json() {
        let raw = "<|im_start|>assistant\nHere you go:\n```json\n{\"action\":\"answer\",\"thoughts\":\"t\",\"answer\":\"a\"}\n```<|im_end|>";
        let resp = parse_strict(raw).unwrap();
        assert_eq!(
            resp,
            LlmResponse::Answer {
                thoughts: "t".into(),
                answer: "a".into(),
                references: vec![],
            }
        );
    }

    #[test]
    fn falls_back_to_final_answer_marker() {
        let raw = "I could not produce JSON.\nFINAL ANSWER: the sky is blue";
        let resp = parse_strict(raw).unwrap();
        assert_eq!(
            resp,
            LlmResponse::Answer {
                thoughts: String::new(),
                answer: "the sky is blue".into(),
                references: vec![],
            }
        );
    }

    #[test]
    fn strict_rejects_unrecoverable_garbage() {
        assert!(parse_strict("not json at all and no marker").is_err());
    }

    #[test]
    fn lenient_never_fails() {
        let resp = parse_lenient("not json at all and no marker");
        match resp {
            LlmResponse::Answer { answer, .. } => {
                assert_eq!(answer, "not json at all and no marker")
            }
            _ => panic!("lenient parse must always produce an answer"),
        }
    }
}
