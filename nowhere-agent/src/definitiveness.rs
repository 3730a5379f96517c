//! The quality gate an `answer` action must pass before it is accepted as a
//! candidate, in both the configured modes.
use nowhere_config::DefinitivenessMode;

const HEDGING_PHRASES: [&str; 4] = [
    "i don't know",
    "unsure",
    "not available",
    "insufficient information",
];

const SECTION_KEYWORDS: [&str; 4] = ["summary", "background", "analysis", "conclusion"];

const DISCOURSE_MARKERS: [&str; 4] = ["first", "additionally", "furthermore", "in conclusion"];

/// `Strict` applies the full structural test from the source (section
/// headings, paragraph break, discourse marker, minimum source count).
/// `Lenient` is the "length > 30 and no hedging phrase" short-answer
/// variant, chosen per configuration rather than hardcoded (§4.5 open
/// question).
pub fn is_definitive(
    answer: &str,
    reference_count: usize,
    min_answer_length: usize,
    min_sources: usize,
    mode: DefinitivenessMode,
) -> bool {
    let lower = answer.to_ascii_lowercase();
    if HEDGING_PHRASES.iter().any(|phrase| lower.contains(phrase)) {
        return false;
    }

    match mode {
        DefinitivenessMode::Lenient => answer.len() > 30,
        DefinitivenessMode::Strict => {
            answer.len() >= min_answer_length
                && SECTION_KEYWORDS.iter().all(|kw| lower.contains(kw))
                && answer.contains("\n\n")
                && DISCOURSE_MARKERS.iter().any(|m| lower.contains(m))
                && reference_count >= min_sources
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn structured_answer() -> String {
        "Summary: quicksort partitions around a pivot.\n\n\
         Background: it was devised by Tony Hoare.\n\n\
         Analysis: average case is O(n log n).\n\n\
         In conclusion, quicksort remains a practical default."
            .to_string()
    }

    #[test]
    fn strict_rejects_hedging_regardless_of_structure() {
        let answer = format!("{} I don't know for certain.", structured_answer());
        assert!(!is_definitive(&answer, 3, 50, 2, DefinitivenessMode::Strict));
    }

    #[test]
    fn strict_requires_sections_paragraph_break_marker_and_sources() {
        let answer = structured_answer();
        assert!(is_definitive(&answer, 2, 50, 2, DefinitivenessMode::Strict));
        assert!(!is_definitive(&answer, 1, 50, 2, DefinitivenessMode::Strict));
    }

    #[test]
    fn strict_rejects_short_unstructured_answers() {
        assert!(!is_definitive(
            "Quicksort is fast.",
            5,
            50,
            2,
            DefinitivenessMode::Strict
        ));
    }

    #[test]
    fn lenient_accepts_any_sufficiently_long_non_hedging_answer() {
        let answer = "Quicksort is a divide-and-conquer sorting algorithm that partitions.";
        assert!(is_definitive(answer, 0, 50, 2, DefinitivenessMode::Lenient));
    }

    #[test]
    fn lenient_still_rejects_hedging() {
        assert!(!is_definitive(
            "I don't know, sorry, this is long enough otherwise.",
            0,
            50,
            2,
            DefinitivenessMode::Lenient
        ));
    }
}
