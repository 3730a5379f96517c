//! Append-only, time-ordered log of what the agent did, snapshotted into
//! every prompt so the LLM can see its own history.
use chrono::{DateTime, Utc};

#[derive(Debug, Clone)]
pub struct DiaryEntry {
    pub at: DateTime<Utc>,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct Diary {
    entries: Vec<DiaryEntry>,
}

impl Diary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, message: impl Into<String>) {
        self.entries.push(DiaryEntry {
            at: Utc::now(),
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Render the diary as a plain-text block, oldest entry first, for
    /// inclusion in a prompt.
    pub fn render(&self) -> String {
        self.entries
            .iter()
            .map(|e| format!("[{}] {}", e.at.format("%Y-%m-%dT%H:%M:%SZ"), e.message))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_entries_in_recorded_order() {
        let mut diary = Diary::new();
        diary.record("first");
        diary.record("second");
        let rendered = diary.render();
        let first_idx = rendered.find("first").unwrap();
        let second_idx = rendered.find("second").unwrap();
        assert!(first_idx < second_idx);
    }

    #[test]
    fn empty_diary_renders_empty_string() {
        assert_eq!(Diary::new().render(), "");
    }
}
