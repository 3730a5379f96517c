//! Site-specific [`ContentExtractor`] for the Reddit-shaped listing API:
//! thread mode walks post metadata + the comment tree (expanding "more"
//! nodes via bounded-concurrency POSTs), index mode formats a listing.
use super::client::RedditApi;
use super::types::{CommentData, CommentNode, MoreData, PostData};
use async_trait::async_trait;
use nowhere_web::{ContentExtractor, ExtractError};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::sleep;

const MORE_CHUNK_SIZE: usize = 100;
const MORE_CONCURRENCY: usize = 3;
const BETWEEN_CHUNKS_DELAY: Duration = Duration::from_millis(500);

pub struct RedditExtractor {
    api: Arc<RedditApi>,
}

impl RedditExtractor {
    pub fn new() -> Result<Self, ExtractError> {
        let api = RedditApi::new().map_err(|e| ExtractError::Network(e.to_string()))?;
        Ok(Self { api: Arc::new(api) })
    }

    /// `true` for comment-thread permalinks (`/comments/<id>/...`).
    pub fn handles(url: &str) -> bool {
        url.contains("reddit.com")
    }
}

#[async_trait]
impl ContentExtractor for RedditExtractor {
    async fn extract_content(&self, url: &str) -> Result<String, ExtractError> {
        let normalized = super::client::normalize_url(url)
            .map_err(|e| ExtractError::CannotParseResponse(e.to_string()))?;

        if normalized.contains("/comments/") {
            self.extract_thread(&normalized).await
        } else {
            self.extract_index(&normalized).await
        }
    }
}

impl RedditExtractor {
    async fn extract_thread(&self, url: &str) -> Result<String, ExtractError> {
        let (post_listing, comment_listing) = self
            .api
            .fetch_thread(url)
            .await
            .map_err(|e| ExtractError::Network(e.to_string()))?;

        let post = post_listing
            .data
            .children
            .into_iter()
            .next()
            .ok_or_else(|| ExtractError::CannotParseResponse("empty post listing".into()))?
            .data;

        let link_id = post.name.clone();
        let mut out = format_post_header(&post);

        let mut lines = Vec::new();
        let mut more_queue: VecDeque<(String, Vec<String>, i64)> = VecDeque::new();
        collect_comments(
            comment_listing.data.children,
            0,
            &mut lines,
            &mut more_queue,
            &link_id,
        );

        expand_more(&self.api, &mut more_queue, &mut lines).await;

        out.push_str("\n\n");
        out.push_str(&lines.join("\n"));
        Ok(out)
    }

    async fn extract_index(&self, url: &str) -> Result<String, ExtractError> {
        let listing = self
            .api
            .fetch_index(url)
            .await
            .map_err(|e| ExtractError::Network(e.to_string()))?;

        let entries: Vec<String> = listing
            .data
            .children
            .into_iter()
            .map(|child| format_index_entry(&child.data))
            .collect();

        Ok(entries.join("\n\n"))
    }
}

fn format_post_header(post: &PostData) -> String {
    format!(
        "{title}\nby {author} in r/{subreddit} | score {score} | {comments} comments{nsfw}\n\n{selftext}",
        title = post.title,
        author = post.author,
        subreddit = post.subreddit,
        score = post.score,
        comments = post.num_comments,
        nsfw = if post.nsfw { " | NSFW" } else { "" },
        selftext = post.selftext,
    )
}

fn format_index_entry(post: &PostData) -> String {
    format!(
        "{title} (by {author}, score {score}, {comments} comments) — {url}",
        title = post.title,
        author = post.author,
        score = post.score,
        comments = post.num_comments,
        url = post.permalink,
    )
}

fn format_comment(depth: i64, data: &CommentData) -> String {
    let indent = "  ".repeat(depth.max(0) as usize);
    format!("{indent}{}: {} [{}]", data.author, data.body, data.score)
}

/// Recurse into an already-fetched comment tree (bounded by the thread's
/// real nesting depth, not network round-trips), deferring `more` nodes
/// into `more_queue` for bounded-concurrency expansion per SPEC_FULL §4.3/§9.
fn collect_comments(
    nodes: Vec<CommentNode>,
    depth: i64,
    lines: &mut Vec<String>,
    more_queue: &mut VecDeque<(String, Vec<String>, i64)>,
    link_id: &str,
) {
    for node in nodes {
        match node.kind.as_str() {
            "t1" => {
                let Ok(data) = serde_json::from_value::<CommentData>(node.data.clone()) else {
                    continue;
                };
                lines.push(format_comment(depth, &data));
                let replies = data.replies.children();
                collect_comments(replies, depth + 1, lines, more_queue, link_id);
            }
            "more" => {
                if let Ok(data) = serde_json::from_value::<MoreData>(node.data) {
                    if !data.children.is_empty() {
                        more_queue.push_back((link_id.to_string(), data.children, depth));
                    }
                }
            }
            _ => {}
        }
    }
}

/// Drain `more_queue` in rounds: each round's entries are chunked into
/// groups of [`MORE_CHUNK_SIZE`] and fetched with at most
/// [`MORE_CONCURRENCY`] requests in flight; nodes a chunk reveals are
/// appended to `lines` and any nested `more` nodes re-enter the queue for
/// the next round.
async fn expand_more(
    api: &Arc<RedditApi>,
    more_queue: &mut VecDeque<(String, Vec<String>, i64)>,
    lines: &mut Vec<String>,
) {
    while let Some((link_id, ids, depth)) = more_queue.pop_front() {
        let semaphore = Arc::new(Semaphore::new(MORE_CONCURRENCY));
        let mut joinset = JoinSet::new();

        for chunk in ids.chunks(MORE_CHUNK_SIZE) {
            let api = Arc::clone(api);
            let link_id = link_id.clone();
            let chunk = chunk.to_vec();
            let permit = Arc::clone(&semaphore);

            joinset.spawn(async move {
                let _permit = permit.acquire_owned().await.expect("semaphore not closed");
                let result = api.fetch_more_children(&link_id, &chunk, depth).await;
                sleep(BETWEEN_CHUNKS_DELAY).await;
                result
            });
        }

        while let Some(joined) = joinset.join_next().await {
            if let Ok(Some(nodes)) = joined {
                collect_comments(nodes, depth, lines, more_queue, &link_id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_comment_with_indent() {
        let data = CommentData {
            author: "alice".into(),
            body: "hello".into(),
            score: 3,
            replies: Default::default(),
        };
        assert_eq!(format_comment(2, &data), "    alice: hello [3]");
    }

    #[test]
    fn collects_top_level_comments_and_defers_more() {
        let nodes: Vec<CommentNode> = serde_json::from_value(serde_json::json!([
            { "kind": "t1", "data": { "author": "a", "body": "hi", "score": 1, "replies": "" } },
            { "kind": "more", "data": { "children": ["x", "y"] } }
        ]))
        .unwrap();

        let mut lines = Vec::new();
        let mut queue = VecDeque::new();
        collect_comments(nodes, 0, &mut lines, &mut queue, "t3_abc");

        assert_eq!(lines, vec!["a: hi [1]"]);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].1, vec!["x", "y"]);
    }
}
