use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Wrapper for Apify API responses.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse<T> {
    pub data: T,
}

/// A start URL entry for scraper input.
#[derive(Debug, Clone, Serialize)]
pub struct StartUrl {
    pub url: String,
}

/// Input for the trudax/reddit-scraper-lite actor.
#[derive(Debug, Clone, Serialize)]
pub struct RedditScraperInput {
    #[serde(rename = "startUrls")]
    pub start_urls: Vec<StartUrl>,
    /// Hard cap on dataset items across all start URLs.
    #[serde(rename = "maxItems")]
    pub max_items: u32,
    /// Cap on posts per start URL.
    #[serde(rename = "maxPostCount")]
    pub max_post_count: u32,
    #[serde(rename = "skipComments")]
    pub skip_comments: bool,
    #[serde(rename = "skipCommunity")]
    pub skip_community: bool,
    pub sort: String,
}

/// A single Reddit item from the Apify dataset.
#[derive(Debug, Clone, Deserialize)]
pub struct RedditPost {
    /// Reddit fullname, e.g. `t3_1abcd2`.
    pub id: Option<String>,
    /// Bare base36 id, e.g. `1abcd2`.
    #[serde(rename = "parsedId")]
    pub parsed_id: Option<String>,
    pub url: Option<String>,
    pub username: Option<String>,
    pub title: Option<String>,
    pub body: Option<String>,
    #[serde(rename = "communityName")]
    pub community_name: Option<String>,
    #[serde(rename = "parsedCommunityName")]
    pub parsed_community_name: Option<String>,
    #[serde(rename = "upVotes")]
    pub up_votes: Option<i64>,
    #[serde(rename = "numberOfComments")]
    pub number_of_comments: Option<i64>,
    #[serde(rename = "createdAt")]
    pub created_at: Option<String>,
    /// Apify returns "community", "post", "comment" or "user". Used to filter out non-posts.
    #[serde(rename = "dataType")]
    pub data_type: Option<String>,
}

impl RedditPost {
    pub fn is_post(&self) -> bool {
        self.data_type.as_deref() == Some("post")
    }

    /// Bare submission id. Prefers `parsedId`, falls back to the fullname
    /// with its `t3_` kind prefix removed.
    pub fn submission_id(&self) -> Option<String> {
        let raw = self
            .parsed_id
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .or(self.id.as_deref())?
            .trim();
        let bare = raw.strip_prefix("t3_").unwrap_or(raw);
        if bare.is_empty() {
            None
        } else {
            Some(bare.to_string())
        }
    }

    /// Subreddit name without the `r/` prefix.
    pub fn subreddit(&self) -> Option<String> {
        self.parsed_community_name
            .clone()
            .or_else(|| {
                self.community_name
                    .as_deref()
                    .map(|c| c.strip_prefix("r/").unwrap_or(c).to_string())
            })
            .filter(|s| !s.is_empty())
    }

    pub fn created_at_utc(&self) -> Option<DateTime<Utc>> {
        self.created_at
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
    }
}

/// Apify actor run metadata.
#[derive(Debug, Clone, Deserialize)]
pub struct RunData {
    pub id: String,
    pub status: String,
    #[serde(rename = "defaultDatasetId")]
    pub default_dataset_id: String,
    #[serde(rename = "startedAt")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(rename = "finishedAt")]
    pub finished_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const DATASET: &str = r#"[
        {
            "id": "t3_1f2g3h",
            "parsedId": "1f2g3h",
            "url": "https://www.reddit.com/r/stocks/comments/1f2g3h/apple_earnings/",
            "username": "someone",
            "title": "Apple earnings beat",
            "body": "Services revenue up again.",
            "communityName": "r/stocks",
            "parsedCommunityName": "stocks",
            "upVotes": 42,
            "numberOfComments": 7,
            "createdAt": "2024-05-03T14:21:09.000Z",
            "dataType": "post"
        },
        {
            "id": "t1_k9x8y7",
            "parsedId": "k9x8y7",
            "body": "agreed",
            "createdAt": "2024-05-03T15:00:00.000Z",
            "dataType": "comment"
        }
    ]"#;

    #[test]
    fn parses_dataset_items() {
        let items: Vec<RedditPost> = serde_json::from_str(DATASET).unwrap();
        assert_eq!(items.len(), 2);

        let post = &items[0];
        assert!(post.is_post());
        assert_eq!(post.submission_id().as_deref(), Some("1f2g3h"));
        assert_eq!(post.subreddit().as_deref(), Some("stocks"));
        assert_eq!(post.up_votes, Some(42));
        assert_eq!(
            post.created_at_utc().unwrap().to_rfc3339(),
            "2024-05-03T14:21:09+00:00"
        );

        assert!(!items[1].is_post());
    }

    #[test]
    fn submission_id_strips_fullname_prefix() {
        let post: RedditPost =
            serde_json::from_str(r#"{"id": "t3_abc123", "communityName": "r/investing"}"#).unwrap();
        assert_eq!(post.submission_id().as_deref(), Some("abc123"));
        assert_eq!(post.subreddit().as_deref(), Some("investing"));
    }

    #[test]
    fn blank_ids_are_absent() {
        let post: RedditPost = serde_json::from_str(r#"{"id": "  ", "parsedId": ""}"#).unwrap();
        assert_eq!(post.submission_id(), None);
    }

    #[test]
    fn unparseable_timestamp_is_none() {
        let post: RedditPost = serde_json::from_str(r#"{"createdAt": "yesterday"}"#).unwrap();
        assert!(post.created_at_utc().is_none());
    }
}
