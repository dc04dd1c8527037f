// Test mocks for the pipeline.
//
// Two mocks matching the two capability boundaries:
// - MockFetcher (PostFetcher) — HashMap-based query→posts, with scripted failures
// - MockModel (SentimentModel) — text→scores, with scripted record rejections
//   and unavailability
//
// Plus helpers for constructing RawPost and TrackedEntity values.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};

use tickerpulse_common::{FetchError, RawPost, ScoringError, SentimentScores, TrackedEntity};

use crate::traits::{PostFetcher, SentimentModel};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Fixed base time so fingerprints are reproducible across test runs.
pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 3, 12, 0, 0).unwrap()
}

/// A Reddit-style post with a platform id. `n` offsets its timestamp in minutes.
pub fn raw_post(id: &str, n: i64) -> RawPost {
    RawPost {
        id: Some(id.to_string()),
        created_at: Some(base_time() + Duration::minutes(n)),
        title: format!("Post {id}"),
        body: format!("Body of {id}"),
        subreddit: Some("stocks".to_string()),
        score: Some(n),
        num_comments: Some(0),
        author: Some("tester".to_string()),
        url: Some(format!("https://www.reddit.com/r/stocks/comments/{id}/")),
    }
}

/// An entity that searches for its own name in r/stocks.
pub fn entity(name: &str) -> TrackedEntity {
    TrackedEntity::new(name, &[name], &["stocks"])
}

// ---------------------------------------------------------------------------
// MockFetcher
// ---------------------------------------------------------------------------

/// Query-keyed fetcher. Returns `Err` for unregistered queries.
/// Builder pattern: `.on_query()`, `.failing_query()`.
pub struct MockFetcher {
    posts: HashMap<String, Vec<RawPost>>,
    failures: HashMap<String, String>,
    calls: Mutex<Vec<(String, Vec<String>, u32)>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self {
            posts: HashMap::new(),
            failures: HashMap::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn on_query(mut self, query: &str, posts: Vec<RawPost>) -> Self {
        self.posts.insert(query.to_string(), posts);
        self
    }

    pub fn failing_query(mut self, query: &str, message: &str) -> Self {
        self.failures.insert(query.to_string(), message.to_string());
        self
    }

    /// Every `(query, channels, limit)` this fetcher was called with, in order.
    pub fn calls(&self) -> Vec<(String, Vec<String>, u32)> {
        self.calls.lock().unwrap().clone()
    }
}

impl Default for MockFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PostFetcher for MockFetcher {
    async fn fetch(
        &self,
        query: &str,
        channels: &[String],
        limit: u32,
    ) -> Result<Vec<RawPost>, FetchError> {
        self.calls
            .lock()
            .unwrap()
            .push((query.to_string(), channels.to_vec(), limit));

        if let Some(message) = self.failures.get(query) {
            return Err(FetchError::Network(message.clone()));
        }
        self.posts
            .get(query)
            .cloned()
            .ok_or_else(|| FetchError::Upstream(format!("MockFetcher: no posts registered for {query}")))
    }
}

// ---------------------------------------------------------------------------
// MockModel
// ---------------------------------------------------------------------------

/// Text-keyed scorer. Unregistered texts get a mildly positive distribution.
pub struct MockModel {
    scores: HashMap<String, SentimentScores>,
    poison: HashSet<String>,
    unavailable: bool,
    drop_last: bool,
    batches: Mutex<Vec<Vec<String>>>,
}

impl MockModel {
    pub fn new() -> Self {
        Self {
            scores: HashMap::new(),
            poison: HashSet::new(),
            unavailable: false,
            drop_last: false,
            batches: Mutex::new(Vec::new()),
        }
    }

    pub fn on_text(mut self, text: &str, scores: SentimentScores) -> Self {
        self.scores.insert(text.to_string(), scores);
        self
    }

    /// Any batch containing a text that contains `needle` is rejected as a
    /// bad input, the way an inference endpoint rejects a whole request.
    pub fn failing_on(mut self, needle: &str) -> Self {
        self.poison.insert(needle.to_string());
        self
    }

    /// Every call fails as if the model could not be loaded.
    pub fn unavailable(mut self) -> Self {
        self.unavailable = true;
        self
    }

    /// Return one result fewer than requested.
    pub fn dropping_last_result(mut self) -> Self {
        self.drop_last = true;
        self
    }

    /// Sizes of the batches the model received, in call order.
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batches.lock().unwrap().iter().map(Vec::len).collect()
    }

    /// Every text the model received, flattened in call order.
    pub fn scored_texts(&self) -> Vec<String> {
        self.batches.lock().unwrap().iter().flatten().cloned().collect()
    }

    pub fn call_count(&self) -> usize {
        self.batches.lock().unwrap().len()
    }
}

impl Default for MockModel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SentimentModel for MockModel {
    fn name(&self) -> &str {
        "mock-finbert"
    }

    async fn score(&self, texts: &[String]) -> Result<Vec<SentimentScores>, ScoringError> {
        self.batches.lock().unwrap().push(texts.to_vec());

        if self.unavailable {
            return Err(ScoringError::Unavailable("MockModel: model failed to load".to_string()));
        }
        if let Some(bad) = texts
            .iter()
            .find(|t| self.poison.iter().any(|needle| t.contains(needle.as_str())))
        {
            return Err(ScoringError::Record(format!("MockModel: rejected input {bad:?}")));
        }

        let mut scores: Vec<SentimentScores> = texts
            .iter()
            .map(|t| {
                self.scores
                    .get(t)
                    .copied()
                    .unwrap_or_else(|| SentimentScores::from_probabilities(0.1, 0.3, 0.6))
            })
            .collect();
        if self.drop_last {
            scores.pop();
        }
        Ok(scores)
    }
}
