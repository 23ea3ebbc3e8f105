use std::time::Duration;

use futures_util::StreamExt;
use harvester_core::QueryDescriptor;
use reqwest::header::{
    HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, AUTHORIZATION, REFERER, USER_AGENT,
};
use serde::Deserialize;
use url::Url;

use crate::token::Token;
use crate::{FailureKind, FetchError, FetchOutcome, RawRecord};

/// Desktop Chrome user agent shared by the API client and the browser.
pub const DESKTOP_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub base_url: String,
    pub endpoint: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub max_bytes: u64,
    pub user_agent: String,
    pub accept_language: String,
    pub referer: String,
    pub app_version: String,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.dealapp.sa/production".to_string(),
            endpoint: "/ad".to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            max_bytes: 5 * 1024 * 1024,
            user_agent: DESKTOP_USER_AGENT.to_string(),
            accept_language: "ar".to_string(),
            referer: "https://dealapp.sa/".to_string(),
            app_version: "7.2.23".to_string(),
        }
    }
}

/// Performs one listings request per call.
#[async_trait::async_trait]
pub trait ListingsClient: Send + Sync {
    async fn fetch(&self, token: &Token, query: &QueryDescriptor) -> FetchOutcome;
}

#[derive(Debug, Deserialize)]
struct PageBody {
    #[serde(default)]
    data: Vec<RawRecord>,
}

#[derive(Debug, Clone)]
pub struct ReqwestListingsClient {
    settings: FetchSettings,
    endpoint: Url,
    client: reqwest::Client,
}

impl ReqwestListingsClient {
    pub fn new(settings: FetchSettings) -> Result<Self, FetchError> {
        let raw = format!(
            "{}/{}",
            settings.base_url.trim_end_matches('/'),
            settings.endpoint.trim_start_matches('/')
        );
        let endpoint = Url::parse(&raw)
            .map_err(|err| FetchError::new(FailureKind::InvalidUrl, err.to_string()))?;
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| FetchError::new(FailureKind::Network, err.to_string()))?;
        Ok(Self {
            settings,
            endpoint,
            client,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn request_url(&self, query: &QueryDescriptor) -> Url {
        let mut url = self.endpoint.clone();
        if !query.params().is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (name, value) in query.params() {
                pairs.append_pair(name, value);
            }
        }
        url
    }

    fn headers(&self, token: &Token) -> Result<HeaderMap, FetchError> {
        let value = |raw: &str| {
            HeaderValue::from_str(raw)
                .map_err(|err| FetchError::new(FailureKind::InvalidHeader, err.to_string()))
        };
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT_LANGUAGE, value(&self.settings.accept_language)?);
        headers.insert(REFERER, value(&self.settings.referer)?);
        headers.insert(USER_AGENT, value(&self.settings.user_agent)?);
        headers.insert("appversion", value(&self.settings.app_version)?);
        headers.insert(AUTHORIZATION, value(&format!("Bearer {}", token.as_str()))?);
        Ok(headers)
    }

    async fn try_fetch(
        &self,
        token: &Token,
        query: &QueryDescriptor,
    ) -> Result<FetchOutcome, FetchError> {
        let response = self
            .client
            .get(self.request_url(query))
            .headers(self.headers(token)?)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Ok(FetchOutcome::AuthRejected {
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            return Err(FetchError::new(
                FailureKind::HttpStatus(status.as_u16()),
                status.to_string(),
            ));
        }

        if let Some(content_len) = response.content_length() {
            if content_len > self.settings.max_bytes {
                return Err(FetchError::new(
                    FailureKind::TooLarge {
                        max_bytes: self.settings.max_bytes,
                        actual: Some(content_len),
                    },
                    "response too large",
                ));
            }
        }

        let mut bytes = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(map_reqwest_error)?;
            let next_len = bytes.len() as u64 + chunk.len() as u64;
            if next_len > self.settings.max_bytes {
                return Err(FetchError::new(
                    FailureKind::TooLarge {
                        max_bytes: self.settings.max_bytes,
                        actual: Some(next_len),
                    },
                    "response too large",
                ));
            }
            bytes.extend_from_slice(&chunk);
        }

        let body: PageBody = serde_json::from_slice(&bytes)
            .map_err(|err| FetchError::new(FailureKind::MalformedBody, err.to_string()))?;
        Ok(FetchOutcome::Page(body.data))
    }
}

#[async_trait::async_trait]
impl ListingsClient for ReqwestListingsClient {
    async fn fetch(&self, token: &Token, query: &QueryDescriptor) -> FetchOutcome {
        match self.try_fetch(token, query).await {
            Ok(outcome) => outcome,
            Err(err) => FetchOutcome::Transient(err),
        }
    }
}

fn map_reqwest_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        return FetchError::new(FailureKind::Timeout, err.to_string());
    }
    FetchError::new(FailureKind::Network, err.to_string())
}
