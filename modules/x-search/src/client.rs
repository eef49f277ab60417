use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::error::{Result, SearchError};
use crate::record::RawTweet;
use crate::types::{ApiResponse, RunData, RunState, TweetSearchInput};

const APIFY_API: &str = "https://api.apify.com/v2";

/// apidojo/tweet-scraper
const TWEET_SCRAPER_ACTOR: &str = "61RPP7dywgiy0JPD0";

/// Seconds the API may hold a run-status request open.
const WAIT_FOR_FINISH_SECS: u32 = 60;

/// Anything that can run an X search query and hand back raw posts.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str, limit: u32) -> Result<Vec<RawTweet>>;
}

/// Runs X searches through the Apify tweet-scraper actor with one account token.
pub struct ApifyClient {
    http: reqwest::Client,
    token: String,
}

impl ApifyClient {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            token: token.into(),
        }
    }

    /// Kick off a scraper run for `query`. The run finishes asynchronously.
    pub async fn start_search(&self, query: &str, limit: u32) -> Result<RunData> {
        let input = TweetSearchInput {
            search_terms: vec![query.to_string()],
            max_items: limit,
        };
        let request = self
            .http
            .post(format!("{APIFY_API}/acts/{TWEET_SCRAPER_ACTOR}/runs"))
            .json(&input);
        let started: ApiResponse<RunData> = self.fetch(request).await?;
        Ok(started.data)
    }

    /// Long-poll the run until it reaches a terminal state.
    pub async fn wait_for_run(&self, run_id: &str) -> Result<RunData> {
        let url = format!("{APIFY_API}/actor-runs/{run_id}");
        loop {
            let request = self
                .http
                .get(&url)
                .query(&[("waitForFinish", WAIT_FOR_FINISH_SECS)]);
            let ApiResponse { data: run }: ApiResponse<RunData> = self.fetch(request).await?;

            match RunState::from_status(&run.status) {
                RunState::Succeeded => return Ok(run),
                RunState::Failed => return Err(SearchError::RunFailed(run.status)),
                RunState::Running => {
                    tracing::debug!(run_id, status = %run.status, "Scraper run still going");
                }
            }
        }
    }

    pub async fn get_dataset_items<T: DeserializeOwned>(&self, dataset_id: &str) -> Result<Vec<T>> {
        let request = self
            .http
            .get(format!("{APIFY_API}/datasets/{dataset_id}/items"))
            .query(&[("format", "json")]);
        self.fetch(request).await
    }

    async fn fetch<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> Result<T> {
        let resp = request.bearer_auth(&self.token).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(SearchError::Api {
                status: status.as_u16(),
                message: resp.text().await.unwrap_or_default(),
            });
        }
        let bytes = resp.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[async_trait]
impl SearchProvider for ApifyClient {
    async fn search(&self, query: &str, limit: u32) -> Result<Vec<RawTweet>> {
        let run = self.start_search(query, limit).await?;
        tracing::info!(run_id = %run.id, limit, "Scraper run started");

        let run = self.wait_for_run(&run.id).await?;
        let items: Vec<serde_json::Value> =
            self.get_dataset_items(&run.default_dataset_id).await?;
        let tweets = posts_from_items(&items);
        tracing::info!(
            run_id = %run.id,
            dataset_id = %run.default_dataset_id,
            items = items.len(),
            count = tweets.len(),
            "Scraper run finished"
        );

        Ok(tweets)
    }
}

/// Read every object item as a post; anything else in the dataset is skipped.
pub(crate) fn posts_from_items(items: &[serde_json::Value]) -> Vec<RawTweet> {
    items
        .iter()
        .enumerate()
        .filter_map(|(index, item)| {
            let post = RawTweet::from_value(item);
            if post.is_none() {
                tracing::warn!(index, "Skipping dataset item that is not an object");
            }
            post
        })
        .collect()
}
