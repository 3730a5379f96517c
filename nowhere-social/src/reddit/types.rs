//! Wire types for the Reddit-shaped "listing" JSON API.
use serde::Deserialize;
use serde_json::Value;

/// `{ "kind": "Listing", "data": { "children": [...] } }`
#[derive(Debug, Deserialize)]
pub struct Listing<T> {
    pub data: ListingData<T>,
}

#[derive(Debug, Deserialize)]
pub struct ListingData<T> {
    #[serde(default)]
    pub children: Vec<Thing<T>>,
}

/// `{ "kind": "...", "data": {...} }`. `kind` distinguishes `t1` (comment),
/// `t3` (post), and `more` (deferred children) within the same listing, so
/// comment-tree nodes are kept as raw [`Value`] and dispatched on `kind` by
/// the traversal code rather than given one rigid payload type.
#[derive(Debug, Deserialize)]
pub struct Thing<T> {
    pub kind: String,
    pub data: T,
}

pub type CommentNode = Thing<Value>;

#[derive(Debug, Deserialize)]
pub struct PostData {
    pub title: String,
    pub author: String,
    pub subreddit: String,
    pub created_utc: f64,
    pub score: i64,
    pub num_comments: i64,
    #[serde(default, rename = "over_18")]
    pub nsfw: bool,
    #[serde(default)]
    pub selftext: String,
    /// `t3_<id>`, used to address "more children" expansion requests.
    pub name: String,
    pub permalink: String,
}

#[derive(Debug, Deserialize)]
pub struct CommentData {
    pub author: String,
    #[serde(default)]
    pub body: String,
    pub score: i64,
    #[serde(default)]
    pub replies: RepliesField,
}

/// Reddit encodes "no replies" as an empty string rather than `null` or `{}`.
#[derive(Debug, Deserialize, Default)]
#[serde(untagged)]
pub enum RepliesField {
    #[default]
    None,
    Empty(String),
    Listing(Box<Listing<Value>>),
}

impl RepliesField {
    pub fn children(self) -> Vec<CommentNode> {
        match self {
            RepliesField::Listing(listing) => listing
                .data
                .children
                .into_iter()
                .map(|c| Thing {
                    kind: c.kind,
                    data: c.data,
                })
                .collect(),
            _ => Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct MoreData {
    #[serde(default)]
    pub children: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_replies_deserialize_to_no_children() {
        let v: RepliesField = serde_json::from_str(r#""""#).unwrap();
        assert!(v.children().is_empty());
    }

    #[test]
    fn nested_listing_replies_yield_children() {
        let raw = serde_json::json!({
            "data": {
                "children": [
                    { "kind": "t1", "data": { "author": "a", "body": "hi", "score": 1 } }
                ]
            }
        });
        let v: RepliesField = serde_json::from_value(raw).unwrap();
        assert_eq!(v.children().len(), 1);
    }
}
