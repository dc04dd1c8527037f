pub mod error;
pub mod types;

pub use error::{ApifyError, Result};
pub use types::{RedditPost, RedditScraperInput, RunData, StartUrl};

use serde::de::DeserializeOwned;
use serde::Serialize;
use types::ApiResponse;
use url::Url;

const BASE_URL: &str = "https://api.apify.com/v2";

/// Actor path for trudax/reddit-scraper-lite (`~` separates owner and actor name).
const REDDIT_SCRAPER: &str = "trudax~reddit-scraper-lite";

pub struct ApifyClient {
    client: reqwest::Client,
    token: String,
    base_url: String,
}

impl ApifyClient {
    pub fn new(token: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            token,
            base_url: BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    /// Start an actor run. Returns immediately with run metadata.
    pub async fn start_run<I: Serialize>(&self, actor: &str, input: &I) -> Result<RunData> {
        let url = format!("{}/acts/{}/runs", self.base_url, actor);
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(input)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ApifyError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let api_resp: ApiResponse<RunData> = resp.json().await?;
        Ok(api_resp.data)
    }

    /// Poll until a run completes. Uses `waitForFinish=60` for efficient long-polling.
    pub async fn wait_for_run(&self, run_id: &str) -> Result<RunData> {
        loop {
            let url = format!("{}/actor-runs/{}?waitForFinish=60", self.base_url, run_id);
            let resp = self
                .client
                .get(&url)
                .bearer_auth(&self.token)
                .send()
                .await?;

            let status = resp.status();
            if !status.is_success() {
                let body = resp.text().await.unwrap_or_default();
                return Err(ApifyError::Api {
                    status: status.as_u16(),
                    message: body,
                });
            }

            let api_resp: ApiResponse<RunData> = resp.json().await?;
            match api_resp.data.status.as_str() {
                "SUCCEEDED" => return Ok(api_resp.data),
                "FAILED" | "ABORTED" | "TIMED-OUT" => {
                    return Err(ApifyError::RunFailed(api_resp.data.status));
                }
                _ => {
                    tracing::debug!(run_id, status = %api_resp.data.status, "Run still in progress");
                    continue;
                }
            }
        }
    }

    /// Fetch dataset items from a completed run.
    pub async fn get_dataset_items<T: DeserializeOwned>(&self, dataset_id: &str) -> Result<Vec<T>> {
        let url = format!("{}/datasets/{}/items?format=json", self.base_url, dataset_id);
        let resp = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ApifyError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let body = resp.text().await?;
        let items: Vec<T> = serde_json::from_str(&body)?;
        Ok(items)
    }

    /// Search Reddit for `query` inside each subreddit, newest first, end-to-end:
    /// start run, poll, fetch results. At most `limit` posts per subreddit.
    /// Comments and community records in the dataset are dropped.
    pub async fn search_reddit(
        &self,
        query: &str,
        subreddits: &[String],
        limit: u32,
    ) -> Result<Vec<RedditPost>> {
        tracing::info!(query, ?subreddits, limit, "Starting Reddit search scrape");

        let input = reddit_search_input(query, subreddits, limit)?;
        let run = self.start_run(REDDIT_SCRAPER, &input).await?;
        tracing::info!(run_id = %run.id, "Apify run started, polling for completion");

        let completed = self.wait_for_run(&run.id).await?;
        tracing::info!(
            run_id = %completed.id,
            dataset_id = %completed.default_dataset_id,
            "Run completed, fetching results"
        );

        let items: Vec<RedditPost> = self
            .get_dataset_items(&completed.default_dataset_id)
            .await?;
        let total = items.len();
        let posts: Vec<RedditPost> = items.into_iter().filter(RedditPost::is_post).collect();
        tracing::info!(count = posts.len(), skipped = total - posts.len(), "Fetched Reddit posts");

        Ok(posts)
    }
}

/// Build the actor input: one `restrict_sr` search URL per subreddit, sorted by new.
pub fn reddit_search_input(
    query: &str,
    subreddits: &[String],
    limit: u32,
) -> Result<RedditScraperInput> {
    if query.trim().is_empty() {
        return Err(ApifyError::InvalidInput("empty search query".to_string()));
    }
    if subreddits.is_empty() {
        return Err(ApifyError::InvalidInput("no subreddits to search".to_string()));
    }

    let start_urls = subreddits
        .iter()
        .map(|sub| {
            let base = format!("https://www.reddit.com/r/{}/search/", sub.trim_start_matches("r/"));
            let url = Url::parse_with_params(
                &base,
                &[("q", query), ("restrict_sr", "1"), ("sort", "new")],
            )?;
            Ok(StartUrl { url: url.to_string() })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(RedditScraperInput {
        max_items: limit.saturating_mul(start_urls.len() as u32),
        start_urls,
        max_post_count: limit,
        skip_comments: true,
        skip_community: true,
        sort: "new".to_string(),
    })
}
