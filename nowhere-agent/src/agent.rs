//! The research control loop: gap queue, visited-URL set, diary, token
//! budget, candidate answers, and the `answer`/`search`/`reflect` dispatch,
//! per SPEC_FULL §4.5.
use crate::definitiveness::is_definitive;
use crate::diary::Diary;
use crate::prompt::{
    append_sources, build_beast_mode_prompt, build_iteration_prompt, build_reflection_prompt,
};
use nowhere_common::{ResearchError, Result};
use nowhere_config::{AgentSettings, ParserMode};
use nowhere_llm::parser::{parse_lenient, parse_strict, LlmResponse};
use nowhere_llm::traits::LlmProvider;
use nowhere_web::{ContentExtractor, SearchProvider};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

/// Answer below this length is sent back through the reflection step before
/// the definitiveness test is applied.
const REFLECTION_THRESHOLD: usize = 40;
/// An answer this long is accepted even if it fails the full definitiveness
/// test, per §4.5 step 9.
const LENGTH_ACCEPT_THRESHOLD: usize = 50;

pub struct ResearchAgent {
    search: Arc<dyn SearchProvider>,
    extractor: Arc<dyn ContentExtractor>,
    llm: Arc<dyn LlmProvider>,
    config: AgentSettings,
    cancel: CancellationToken,
}

impl ResearchAgent {
    pub fn new(
        search: Arc<dyn SearchProvider>,
        extractor: Arc<dyn ContentExtractor>,
        llm: Arc<dyn LlmProvider>,
        config: AgentSettings,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            search,
            extractor,
            llm,
            config,
            cancel,
        }
    }

    fn ensure_not_cancelled(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            Err(ResearchError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// `getResponse(question, maxBadAttempts?)`, per SPEC_FULL §4.5/§6.
    pub async fn get_response(
        &self,
        question: &str,
        max_bad_attempts_override: Option<u32>,
    ) -> Result<String> {
        if question.trim().is_empty() {
            return Err(ResearchError::InvalidQuery);
        }
        let max_bad_attempts = max_bad_attempts_override.unwrap_or(self.config.max_bad_attempts);

        let mut gaps: VecDeque<String> = VecDeque::new();
        gaps.push_back(question.to_string());
        let mut visited_set: HashSet<String> = HashSet::new();
        let mut visited: Vec<String> = Vec::new();
        let mut diary = Diary::new();
        let mut token_usage: u64 = 0;
        let mut candidates: Vec<String> = Vec::new();
        let mut bad_attempts: u32 = 0;

        diary.record(format!("starting research: {question}"));
        self.seed_query_variations(question, &mut gaps).await;
        diary.record(format!("seeded {} initial gap(s)", gaps.len()));

        loop {
            // Step 1: inter-iteration pacing, cancellable.
            tokio::select! {
                _ = self.cancel.cancelled() => return Err(ResearchError::Cancelled),
                _ = sleep(Duration::from_millis(self.config.step_sleep_ms)) => {}
            }

            // Step 2.
            let current = gaps.pop_front().unwrap_or_else(|| question.to_string());

            // Step 3: search, filtered against visited.
            let fetched = tokio::select! {
                _ = self.cancel.cancelled() => return Err(ResearchError::Cancelled),
                res = self.search.search(&current) => res,
            };
            let fetched = match fetched {
                Ok(results) => results,
                Err(e) => {
                    diary.record(format!("search failed for \"{current}\": {e}"));
                    Vec::new()
                }
            };

            if fetched.is_empty() && gaps.is_empty() {
                return Err(ResearchError::NoSearchResults(current));
            }

            let unvisited: Vec<_> = fetched
                .into_iter()
                .filter(|r| !visited_set.contains(&r.url))
                .collect();

            if unvisited.is_empty() {
                // Either nothing came back (gaps non-empty, so this isn't
                // fatal) or every result was already visited.
                gaps.push_back(current);
                diary.record("all results already visited; re-queued the gap");
                continue;
            }

            for r in &unvisited {
                visited_set.insert(r.url.clone());
                visited.push(r.url.clone());
            }

            // Step 4: concurrent extraction, per-URL failures swallowed.
            let admitted_content = self.extract_and_budget(&unvisited, &mut diary).await?;

            // Step 5/6: prompt build + token-budget check.
            let prompt = build_iteration_prompt(
                question,
                &admitted_content,
                &diary.render(),
                &visited,
            );
            token_usage += prompt.len() as u64;
            if token_usage > self.config.token_budget {
                return Err(ResearchError::TokenBudgetExceeded {
                    used: token_usage,
                    budget: self.config.token_budget,
                });
            }

            // Step 7: invoke the LLM.
            let reply = tokio::select! {
                _ = self.cancel.cancelled() => return Err(ResearchError::Cancelled),
                res = self.llm.process_text(None, &prompt, true) => res?,
            };
            token_usage += reply.len() as u64;

            // Step 8: parse.
            let parsed = match self.config.parser_mode {
                ParserMode::Strict => parse_strict(&reply)
                    .map_err(|e| ResearchError::InvalidLlmResponse(e.to_string()))?,
                ParserMode::Lenient => parse_lenient(&reply),
            };

            // Step 9: dispatch.
            self.dispatch(
                parsed,
                &current,
                &mut gaps,
                &mut candidates,
                &mut bad_attempts,
                &mut token_usage,
                &mut diary,
            )
            .await?;

            // Step 10/11: termination check, else loop.
            if gaps.is_empty() || bad_attempts >= max_bad_attempts {
                if let Some(answer) = candidates.last() {
                    return Ok(append_sources(answer, &visited));
                }
                self.ensure_not_cancelled()?;
                let beast_prompt = build_beast_mode_prompt(question, &diary.render());
                let beast_answer = self.llm.process_text(None, &beast_prompt, false).await?;
                return Ok(append_sources(&beast_answer, &visited));
            }
        }
    }

    /// Ask the LLM (non-streaming) for up to `maxSearchQueries` distinct
    /// query variations; prepend them so the original question stays at the
    /// tail, per §4.5 Initialization. Failures here are non-fatal: the run
    /// simply proceeds with the original question alone.
    async fn seed_query_variations(&self, question: &str, gaps: &mut VecDeque<String>) {
        if self.config.max_search_queries == 0 {
            return;
        }
        let prompt = format!(
            "Suggest up to {} distinct web search query variations for the question: \"{question}\". \
             Reply with one query per line, no numbering or commentary.",
            self.config.max_search_queries
        );
        let Ok(reply) = self.llm.process_text(None, &prompt, false).await else {
            return;
        };

        let variations: Vec<String> = reply
            .lines()
            .map(|l| {
                l.trim()
                    .trim_start_matches(|c: char| c == '-' || c == '*' || c.is_ascii_digit() || c == '.')
                    .trim()
                    .to_string()
            })
            .filter(|l| !l.is_empty() && !l.eq_ignore_ascii_case(question))
            .take(self.config.max_search_queries)
            .collect();

        for v in variations.into_iter().rev() {
            gaps.push_front(v);
        }
    }

    /// Extract concurrently from every unvisited URL, then admit the
    /// shortest-first results into a per-iteration content budget
    /// (`content.length / 4` tokens, capped at `tokenBudget`), per §4.5
    /// step 4.
    async fn extract_and_budget(
        &self,
        unvisited: &[nowhere_web::SearchResult],
        diary: &mut Diary,
    ) -> Result<Vec<String>> {
        let mut joinset = JoinSet::new();
        for r in unvisited {
            let extractor = Arc::clone(&self.extractor);
            let url = r.url.clone();
            joinset.spawn(async move {
                let res = extractor.extract_content(&url).await;
                (url, res)
            });
        }

        let mut fetched_content = Vec::new();
        loop {
            let joined = tokio::select! {
                _ = self.cancel.cancelled() => return Err(ResearchError::Cancelled),
                joined = joinset.join_next() => joined,
            };
            let Some(joined) = joined else { break };
            let (url, res) = joined.expect("extraction task does not panic");
            match res {
                Ok(text) if !text.is_empty() => fetched_content.push(text),
                Ok(_) => {}
                Err(e) => diary.record(format!("extraction failed for {url}: {e}")),
            }
        }

        fetched_content.sort_by_key(|c: &String| c.len());
        let mut admitted = Vec::new();
        let mut content_tokens: u64 = 0;
        for c in fetched_content {
            let tokens = (c.len() as u64) / 4;
            if content_tokens + tokens > self.config.token_budget {
                break;
            }
            content_tokens += tokens;
            admitted.push(c);
        }
        Ok(admitted)
    }

    #[allow(clippy::too_many_arguments)]
    async fn dispatch(
        &self,
        parsed: LlmResponse,
        current: &str,
        gaps: &mut VecDeque<String>,
        candidates: &mut Vec<String>,
        bad_attempts: &mut u32,
        token_usage: &mut u64,
        diary: &mut Diary,
    ) -> Result<()> {
        match parsed {
            LlmResponse::Answer {
                answer, references, ..
            } => {
                if answer.is_empty() {
                    *bad_attempts += 1;
                    diary.record("LLM returned an empty answer");
                    return Ok(());
                }

                let mut answer = answer;
                if answer.len() < REFLECTION_THRESHOLD {
                    let reflect_prompt = build_reflection_prompt(&answer, &diary.render());
                    if let Ok(expanded) = self.llm.process_text(None, &reflect_prompt, false).await
                    {
                        *token_usage += expanded.len() as u64;
                        answer = expanded;
                    }
                }

                let definitive = is_definitive(
                    &answer,
                    references.len(),
                    self.config.min_answer_length,
                    self.config.min_sources,
                    self.config.definitiveness_mode,
                );
                if definitive || answer.len() > LENGTH_ACCEPT_THRESHOLD {
                    diary.record("accepted a candidate answer");
                    candidates.push(answer);
                } else {
                    *bad_attempts += 1;
                    diary.record("answer rejected by the definitiveness test");
                }
            }
            LlmResponse::Reflect {
                questions_to_answer,
                ..
            } => {
                if questions_to_answer.is_empty() {
                    gaps.push_back(current.to_string());
                } else {
                    gaps.extend(questions_to_answer);
                }
                *bad_attempts += 1;
                diary.record("reflected");
            }
            LlmResponse::Search { search_query, .. } => {
                if search_query.trim().is_empty() {
                    gaps.push_back(current.to_string());
                } else {
                    gaps.push_front(search_query);
                }
                *bad_attempts += 1;
                diary.record("requested another search");
            }
            LlmResponse::Unknown { .. } => {
                *bad_attempts += 1;
                diary.record("LLM returned an unrecognized action");
            }
        }
        Ok(())
    }
}

/// Pure accounting for the fatal budget check (§4.5 step 6/7), factored out
/// so it can be exercised with the scenario's exact numbers without
/// depending on the byte length of a real prompt template.
fn accumulate_and_check(token_usage: u64, delta: u64, budget: u64) -> Result<u64> {
    let updated = token_usage + delta;
    if updated > budget {
        return Err(ResearchError::TokenBudgetExceeded {
            used: updated,
            budget,
        });
    }
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use nowhere_config::{AgentSettings, DefinitivenessMode, ParserMode};
    use nowhere_web::{ExtractError, SearchError, SearchResult};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn test_config() -> AgentSettings {
        AgentSettings {
            step_sleep_ms: 0,
            max_bad_attempts: 3,
            token_budget: 1_000_000,
            min_answer_length: 50,
            max_search_queries: 0,
            min_sources: 2,
            definitiveness_mode: DefinitivenessMode::Strict,
            parser_mode: ParserMode::Strict,
        }
    }

    struct ScriptedLlm {
        replies: Mutex<VecDeque<String>>,
    }

    impl ScriptedLlm {
        fn new(replies: Vec<&str>) -> Self {
            Self {
                replies: Mutex::new(replies.into_iter().map(String::from).collect()),
            }
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedLlm {
        async fn process_text(
            &self,
            _system_prompt: Option<&str>,
            _user_prompt: &str,
            _streaming: bool,
        ) -> Result<String> {
            let mut q = self.replies.lock().unwrap();
            Ok(q.pop_front()
                .unwrap_or_else(|| r#"{"action":"unknown","thoughts":""}"#.to_string()))
        }

        fn model_name(&self) -> &str {
            "scripted"
        }
    }

    /// Returns a fixed page of results per call index (clamped to the last
    /// configured page for any extra calls), and records every query asked.
    struct ScriptedSearch {
        pages: Vec<Vec<SearchResult>>,
        call: AtomicUsize,
        queries: Mutex<Vec<String>>,
    }

    impl ScriptedSearch {
        fn new(pages: Vec<Vec<SearchResult>>) -> Self {
            Self {
                pages,
                call: AtomicUsize::new(0),
                queries: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl SearchProvider for ScriptedSearch {
        async fn search(&self, query: &str) -> std::result::Result<Vec<SearchResult>, SearchError> {
            self.queries.lock().unwrap().push(query.to_string());
            let idx = self.call.fetch_add(1, Ordering::SeqCst);
            let page = self.pages.get(idx).or_else(|| self.pages.last());
            Ok(page.cloned().unwrap_or_default())
        }
    }

    struct StubExtractor;

    #[async_trait]
    impl ContentExtractor for StubExtractor {
        async fn extract_content(&self, url: &str) -> std::result::Result<String, ExtractError> {
            Ok(format!("Extracted prose content for {url}, plenty of words to go around here."))
        }
    }

    fn result(url: &str) -> SearchResult {
        SearchResult {
            title: url.into(),
            url: url.into(),
            snippet: String::new(),
        }
    }

    fn definitive_answer_json(references: &[&str]) -> String {
        let refs: Vec<_> = references
            .iter()
            .map(|u| serde_json::json!({"exactQuote": "quote", "url": u}))
            .collect();
        serde_json::json!({
            "action": "answer",
            "thoughts": "t",
            "answer": "Summary: quicksort partitions around a pivot element chosen from the array.\n\n\
                        Background: it was devised by Tony Hoare in 1959 as a fast in-place sort.\n\n\
                        Analysis: average case running time is O(n log n) with O(log n) stack depth.\n\n\
                        In conclusion, quicksort remains a practical default for general-purpose sorting.",
            "references": refs,
        })
        .to_string()
    }

    #[tokio::test]
    async fn happy_path_returns_definitive_answer_with_sources() {
        let search = Arc::new(ScriptedSearch::new(vec![vec![
            result("https://a"),
            result("https://b"),
            result("https://c"),
        ]]));
        let llm = Arc::new(ScriptedLlm::new(vec![&definitive_answer_json(&[
            "https://a",
            "https://b",
        ])]));
        let agent = ResearchAgent::new(
            search,
            Arc::new(StubExtractor),
            llm,
            test_config(),
            CancellationToken::new(),
        );

        let out = agent.get_response("What is quicksort?", None).await.unwrap();
        assert!(out.contains("Quicksort"));
        assert!(out.contains("Sources:"));
        assert!(out.contains("https://a"));
        assert!(out.contains("https://b"));
        assert!(out.contains("https://c"));
    }

    #[tokio::test]
    async fn search_then_answer_converges_on_second_reply() {
        let search = Arc::new(ScriptedSearch::new(vec![
            vec![result("https://first")],
            vec![result("https://second")],
        ]));
        let llm = Arc::new(ScriptedLlm::new(vec![
            &serde_json::json!({
                "action": "search",
                "thoughts": "t",
                "searchQuery": "quicksort partition scheme",
            })
            .to_string(),
            &definitive_answer_json(&["https://first", "https://second"]),
        ]));
        let agent = ResearchAgent::new(
            search.clone(),
            Arc::new(StubExtractor),
            llm,
            test_config(),
            CancellationToken::new(),
        );

        let out = agent.get_response("What is quicksort?", None).await.unwrap();
        assert!(out.contains("https://first"));
        assert!(out.contains("https://second"));
        assert_eq!(search.queries.lock().unwrap()[1], "quicksort partition scheme");
    }

    #[tokio::test]
    async fn reflect_processes_sub_questions_before_loop_would_retry_original() {
        let search = Arc::new(ScriptedSearch::new(vec![
            vec![result("https://q0")],
            vec![result("https://q1")],
            vec![result("https://q2")],
        ]));
        let llm = Arc::new(ScriptedLlm::new(vec![
            &serde_json::json!({
                "action": "reflect",
                "thoughts": "t",
                "questionsToAnswer": ["What is pivot selection?", "What is worst case?"],
            })
            .to_string(),
            // Non-definitive and long enough to skip the reflection re-prompt,
            // keeping the loop going on to the tail question.
            &serde_json::json!({
                "action": "answer",
                "thoughts": "t",
                "answer": "Pivot selection needs more context to explain.",
            })
            .to_string(),
            &definitive_answer_json(&["https://q0", "https://q1", "https://q2"]),
        ]));
        let config = AgentSettings {
            max_bad_attempts: 5,
            ..test_config()
        };
        let agent = ResearchAgent::new(
            search.clone(),
            Arc::new(StubExtractor),
            llm,
            config,
            CancellationToken::new(),
        );

        agent.get_response("Original question", None).await.unwrap();
        let queries = search.queries.lock().unwrap();
        assert_eq!(queries[0], "Original question");
        assert_eq!(queries[1], "What is pivot selection?");
        assert_eq!(queries[2], "What is worst case?");
    }

    #[tokio::test]
    async fn all_visited_results_requeue_the_gap_until_a_new_url_appears() {
        let search = Arc::new(ScriptedSearch::new(vec![
            vec![result("https://a"), result("https://b")],
            vec![result("https://a"), result("https://b")],
            vec![result("https://a"), result("https://c")],
        ]));
        let llm = Arc::new(ScriptedLlm::new(vec![
            &serde_json::json!({
                "action": "search",
                "thoughts": "t",
                "searchQuery": "follow-up",
            })
            .to_string(),
            &definitive_answer_json(&["https://a", "https://b", "https://c"]),
        ]));
        let agent = ResearchAgent::new(
            search.clone(),
            Arc::new(StubExtractor),
            llm,
            test_config(),
            CancellationToken::new(),
        );

        let out = agent.get_response("q", None).await.unwrap();
        assert!(out.contains("https://c"));
        assert_eq!(search.queries.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn beast_mode_fires_once_badattempts_cap_is_reached_without_a_candidate() {
        let search = Arc::new(ScriptedSearch::new(vec![vec![result("https://a")]]));
        let llm = Arc::new(ScriptedLlm::new(vec![
            &serde_json::json!({"action": "reflect", "thoughts": "t"}).to_string(),
            "Beast Mode best-effort final answer text.",
        ]));
        let config = AgentSettings {
            max_bad_attempts: 1,
            ..test_config()
        };
        let agent = ResearchAgent::new(
            search,
            Arc::new(StubExtractor),
            llm,
            config,
            CancellationToken::new(),
        );

        let out = agent.get_response("q", None).await.unwrap();
        assert!(out.contains("Beast Mode best-effort final answer text."));
        assert!(out.contains("Sources:"));
    }

    #[tokio::test]
    async fn empty_question_is_rejected() {
        let agent = ResearchAgent::new(
            Arc::new(ScriptedSearch::new(vec![])),
            Arc::new(StubExtractor),
            Arc::new(ScriptedLlm::new(vec![])),
            test_config(),
            CancellationToken::new(),
        );
        assert!(matches!(
            agent.get_response("   ", None).await,
            Err(ResearchError::InvalidQuery)
        ));
    }

    #[tokio::test]
    async fn no_results_and_empty_gaps_fails_fast() {
        let agent = ResearchAgent::new(
            Arc::new(ScriptedSearch::new(vec![vec![]])),
            Arc::new(StubExtractor),
            Arc::new(ScriptedLlm::new(vec![])),
            test_config(),
            CancellationToken::new(),
        );
        assert!(matches!(
            agent.get_response("q", None).await,
            Err(ResearchError::NoSearchResults(_))
        ));
    }

    #[test]
    fn token_budget_accounting_matches_the_seed_scenario() {
        // budget=1000, prompt1=900 (ok), reply1=200 (tracked but not
        // rechecked until the next prompt), prompt2=900 -> exceeds at 2000.
        let usage = accumulate_and_check(0, 900, 1000).unwrap();
        let usage = accumulate_and_check(usage, 200, 1000).unwrap();
        let err = accumulate_and_check(usage, 900, 1000).unwrap_err();
        match err {
            ResearchError::TokenBudgetExceeded { used, budget } => {
                assert_eq!(used, 2000);
                assert_eq!(budget, 1000);
            }
            other => panic!("expected TokenBudgetExceeded, got {other:?}"),
        }
    }
}
