// Capability boundaries for the orchestrators.
//
// PostFetcher: "fetch posts matching query Q" (production: Apify Reddit search).
// SentimentModel: "score(texts) -> scores" (production: FinBERT over HF inference).
//
// Both are mocked in `testing`, so orchestrator tests need no network.

use async_trait::async_trait;

use apify_client::{ApifyClient, ApifyError, RedditPost};
use finbert_client::{FinbertClient, FinbertError};
use tickerpulse_common::{FetchError, RawPost, ScoringError, SentimentScores};

// ---------------------------------------------------------------------------
// PostFetcher
// ---------------------------------------------------------------------------

#[async_trait]
pub trait PostFetcher: Send + Sync {
    /// Fetch up to `limit` recent posts per channel matching `query`. May return
    /// posts that were already collected; dedup is the caller's job.
    async fn fetch(
        &self,
        query: &str,
        channels: &[String],
        limit: u32,
    ) -> Result<Vec<RawPost>, FetchError>;
}

#[async_trait]
impl PostFetcher for ApifyClient {
    async fn fetch(
        &self,
        query: &str,
        channels: &[String],
        limit: u32,
    ) -> Result<Vec<RawPost>, FetchError> {
        let posts = self
            .search_reddit(query, channels, limit)
            .await
            .map_err(fetch_error)?;
        Ok(posts.into_iter().map(raw_post).collect())
    }
}

fn fetch_error(err: ApifyError) -> FetchError {
    match err {
        ApifyError::Api { status: 429, message } => FetchError::RateLimited(message),
        ApifyError::Network(message) => FetchError::Network(message),
        other if other.is_transient() => FetchError::Network(other.to_string()),
        other => FetchError::Upstream(other.to_string()),
    }
}

fn raw_post(p: RedditPost) -> RawPost {
    RawPost {
        id: p.submission_id(),
        created_at: p.created_at_utc(),
        subreddit: p.subreddit(),
        title: p.title.unwrap_or_default(),
        body: p.body.unwrap_or_default(),
        score: p.up_votes,
        num_comments: p.number_of_comments,
        author: p.username,
        url: p.url,
    }
}

// ---------------------------------------------------------------------------
// SentimentModel
// ---------------------------------------------------------------------------

#[async_trait]
pub trait SentimentModel: Send + Sync {
    /// Model identifier recorded next to every score.
    fn name(&self) -> &str;

    /// Score non-empty texts. Must return one result per input, in input order.
    async fn score(&self, texts: &[String]) -> Result<Vec<SentimentScores>, ScoringError>;
}

#[async_trait]
impl SentimentModel for FinbertClient {
    fn name(&self) -> &str {
        self.model()
    }

    async fn score(&self, texts: &[String]) -> Result<Vec<SentimentScores>, ScoringError> {
        let distributions = self.classify(texts).await.map_err(scoring_error)?;
        Ok(distributions
            .into_iter()
            .map(|d| SentimentScores::from_probabilities(d.negative, d.neutral, d.positive))
            .collect())
    }
}

/// Input rejections are per-record; everything else means the model is unusable.
fn scoring_error(err: FinbertError) -> ScoringError {
    if err.is_input_error() {
        ScoringError::Record(err.to_string())
    } else {
        ScoringError::Unavailable(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reddit_post_maps_to_raw_post() {
        let post: RedditPost = serde_json::from_str(
            r#"{
                "id": "t3_1f2g3h",
                "url": "https://www.reddit.com/r/stocks/comments/1f2g3h/x/",
                "username": "someone",
                "title": "Apple earnings beat",
                "communityName": "r/stocks",
                "upVotes": 42,
                "numberOfComments": 7,
                "createdAt": "2024-05-03T14:21:09.000Z",
                "dataType": "post"
            }"#,
        )
        .unwrap();

        let raw = raw_post(post);
        assert_eq!(raw.id.as_deref(), Some("1f2g3h"));
        assert_eq!(raw.subreddit.as_deref(), Some("stocks"));
        assert_eq!(raw.title, "Apple earnings beat");
        assert_eq!(raw.body, "");
        assert_eq!(raw.score, Some(42));
        assert_eq!(raw.author.as_deref(), Some("someone"));
        assert!(raw.created_at.is_some());
    }

    #[test]
    fn apify_errors_map_to_fetch_errors() {
        assert!(matches!(
            fetch_error(ApifyError::Api { status: 429, message: "slow down".into() }),
            FetchError::RateLimited(_)
        ));
        assert!(matches!(
            fetch_error(ApifyError::Network("reset".into())),
            FetchError::Network(_)
        ));
        assert!(matches!(
            fetch_error(ApifyError::RunFailed("FAILED".into())),
            FetchError::Upstream(_)
        ));
        assert!(matches!(
            fetch_error(ApifyError::Api { status: 502, message: "bad gateway".into() }),
            FetchError::Network(_)
        ));
        assert!(matches!(
            fetch_error(ApifyError::RunFailed("TIMED-OUT".into())),
            FetchError::Network(_)
        ));
        assert!(matches!(
            fetch_error(ApifyError::Api { status: 401, message: "unauthorized".into() }),
            FetchError::Upstream(_)
        ));
    }

    #[test]
    fn finbert_errors_map_to_scoring_errors() {
        assert!(matches!(
            scoring_error(FinbertError::Api { status: 400, message: "bad input".into() }),
            ScoringError::Record(_)
        ));
        assert!(scoring_error(FinbertError::Network("refused".into())).is_unavailable());
        assert!(scoring_error(FinbertError::ModelLoading { model: "m".into() }).is_unavailable());
        assert!(scoring_error(FinbertError::CountMismatch { expected: 2, got: 1 }).is_unavailable());
    }
}
