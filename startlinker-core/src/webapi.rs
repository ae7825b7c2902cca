use std::{sync::Arc, thread, time::Duration};

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use ureq::{
    http::{Response, StatusCode},
    Agent, Body,
};
use url::Url;

use crate::{
    error::Error,
    feed::FeedPage,
    model::{NewStory, Story, StoryId},
    util::default_ureq_agent_builder,
};

const FEED_PATH: &str = "/api/social/stories/feed/";
const STORIES_PATH: &str = "/api/social/stories/";
const MAX_RATE_LIMIT_RETRIES: usize = 3;
const DEFAULT_RETRY_AFTER_SECS: u64 = 2;
const MAX_RETRY_AFTER_SECS: u64 = 30;

/// Backend operations the stories engine depends on.
pub trait StoriesBackend: Send + Sync {
    /// Load the first feed page, or the page behind an opaque `next` URL.
    fn load_feed(&self, page: Option<&str>) -> Result<FeedPage, Error>;

    fn mark_viewed(&self, story: StoryId) -> Result<(), Error>;

    fn create_story(&self, story: &NewStory) -> Result<Story, Error>;
}

pub type BackendHandle = Arc<dyn StoriesBackend>;

#[derive(Clone, Debug)]
pub struct WebApiConfig {
    pub base_url: String,
    pub token: Option<String>,
    pub proxy_url: Option<String>,
}

/// HTTP client for the StartLinker social API.
pub struct WebApi {
    agent: Agent,
    base: Url,
    token: Option<String>,
}

impl WebApi {
    pub fn new(config: WebApiConfig) -> Result<Self, Error> {
        let base = Url::parse(&config.base_url)
            .map_err(|err| Error::WebApiError(format!("invalid API url: {err}")))?;
        let agent = default_ureq_agent_builder(config.proxy_url.as_deref()).build();
        Ok(Self {
            agent: agent.into(),
            base,
            token: config.token,
        })
    }

    pub fn into_handle(self) -> BackendHandle {
        Arc::new(self)
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base.as_str().trim_end_matches('/'), path)
    }

    fn authorization(&self) -> Option<String> {
        self.token.as_ref().map(|token| format!("Token {token}"))
    }

    fn get(&self, url: &str) -> Result<Response<Body>, Error> {
        let mut req = self.agent.get(url).header("Accept", "application/json");
        if let Some(auth) = self.authorization() {
            req = req.header("Authorization", &auth);
        }
        Ok(req.call()?)
    }

    fn post<T: Serialize>(&self, url: &str, body: &T) -> Result<Response<Body>, Error> {
        let mut req = self.agent.post(url).header("Accept", "application/json");
        if let Some(auth) = self.authorization() {
            req = req.header("Authorization", &auth);
        }
        Ok(req.send_json(body)?)
    }

    /// Repeat the request while the server asks us to back off, then turn any
    /// non-success status into an error.
    fn with_retry(f: impl Fn() -> Result<Response<Body>, Error>) -> Result<Response<Body>, Error> {
        let mut attempts = 0;
        loop {
            let response = f()?;
            match response.status() {
                StatusCode::TOO_MANY_REQUESTS if attempts < MAX_RATE_LIMIT_RETRIES => {
                    let retry_after = response
                        .headers()
                        .get("Retry-After")
                        .and_then(|secs| secs.to_str().ok());
                    let secs = retry_after_secs(retry_after);
                    log::warn!("rate limited, retrying in {}s", secs);
                    thread::sleep(Duration::from_secs(secs));
                    attempts += 1;
                }
                status if status.is_success() => {
                    break Ok(response);
                }
                status => {
                    break Err(Error::UnexpectedResponse {
                        status: status.as_u16(),
                    });
                }
            }
        }
    }

    fn load<T: DeserializeOwned>(&self, url: &str) -> Result<T, Error> {
        let mut response = Self::with_retry(|| self.get(url))?;
        response
            .body_mut()
            .read_json()
            .map_err(|err| Error::WebApiError(err.to_string()))
    }
}

/// Seconds to back off for a `Retry-After` header value, bounded so a loader
/// thread is never parked for long.
fn retry_after_secs(header: Option<&str>) -> u64 {
    header
        .and_then(|secs| secs.trim().parse::<u64>().ok())
        .unwrap_or(DEFAULT_RETRY_AFTER_SECS)
        .min(MAX_RETRY_AFTER_SECS)
}

/// The feed endpoint answers either with a paginated envelope or, when
/// pagination is disabled server-side, with a bare array.
#[derive(Deserialize)]
#[serde(untagged)]
enum FeedResponse {
    Paginated {
        results: Vec<Story>,
        #[serde(default)]
        next: Option<String>,
    },
    Bare(Vec<Story>),
}

impl From<FeedResponse> for FeedPage {
    fn from(response: FeedResponse) -> Self {
        match response {
            FeedResponse::Paginated { results, next } => FeedPage {
                stories: results,
                next,
            },
            FeedResponse::Bare(stories) => FeedPage {
                stories,
                next: None,
            },
        }
    }
}

impl StoriesBackend for WebApi {
    fn load_feed(&self, page: Option<&str>) -> Result<FeedPage, Error> {
        let url = match page {
            Some(next) => next.to_owned(),
            None => self.endpoint(FEED_PATH),
        };
        log::info!("loading stories from {}", url);
        let response: FeedResponse = self.load(&url)?;
        Ok(response.into())
    }

    fn mark_viewed(&self, story: StoryId) -> Result<(), Error> {
        let url = self.endpoint(&format!("{STORIES_PATH}{story}/view_story/"));
        Self::with_retry(|| self.post(&url, &serde_json::json!({}))).map(|_| ())
    }

    fn create_story(&self, story: &NewStory) -> Result<Story, Error> {
        story.validate()?;
        let url = self.endpoint(STORIES_PATH);
        let mut response = Self::with_retry(|| self.post(&url, story))?;
        response
            .body_mut()
            .read_json()
            .map_err(|err| Error::WebApiError(err.to_string()))
    }
}
