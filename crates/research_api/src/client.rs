use std::pin::Pin;

use futures_util::{Stream, StreamExt};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;

use crate::cancel::{await_or_cancel, CancellationSignal};
use crate::config::ResearchApiConfig;
use crate::conversation::{ConversationRecord, ConversationSummary};
use crate::endpoint::{endpoint_url, normalize_api_base};
use crate::error::ApiError;
use crate::events::{ResearchResult, WireEvent};
use crate::headers::{build_headers, ACCEPT_EVENT_STREAM, ACCEPT_JSON, ACCEPT_PDF};
use crate::payload::{ConversationCreate, ConversationUpdate, ResearchDepth, ResearchRequest};
use crate::service::{CacheCleared, CacheInvalidation, CacheStats, HealthStatus, LlmHealth, ServerConfig};
use crate::sse::decode_stream;

/// Raw response body chunks in arrival order.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>, ApiError>> + Send>>;

#[derive(Debug)]
pub struct ResearchApiClient {
    http: Client,
    config: ResearchApiConfig,
}

#[derive(Debug, Clone)]
pub struct StreamResult {
    pub events: Vec<WireEvent>,
}

impl StreamResult {
    /// The last result frame, if the stream produced one.
    pub fn result(&self) -> Option<&ResearchResult> {
        self.events.iter().rev().find_map(|event| match event {
            WireEvent::Result(result) => Some(result),
            _ => None,
        })
    }

    /// The first producer-reported error, if any.
    pub fn error_message(&self) -> Option<&str> {
        self.events.iter().find_map(|event| match event {
            WireEvent::Error(error) => Some(error.message.as_str()),
            _ => None,
        })
    }
}

impl ResearchApiClient {
    pub fn new(config: ResearchApiConfig) -> Result<Self, ApiError> {
        if reqwest::Url::parse(&normalize_api_base(&config.base_url)).is_err() {
            return Err(ApiError::InvalidBaseUrl(config.base_url.clone()));
        }
        let http = Client::builder().build().map_err(ApiError::from)?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &ResearchApiConfig {
        &self.config
    }

    pub fn endpoint(&self, path: &str) -> String {
        endpoint_url(&self.config.base_url, path)
    }

    pub fn build_headers(&self, token: Option<&str>, accept: &str) -> Result<HeaderMap, ApiError> {
        let headers = build_headers(&self.config, token, accept);
        let mut out = HeaderMap::new();
        for (key, value) in headers {
            out.insert(
                HeaderName::from_bytes(key.as_bytes()).map_err(|_| {
                    ApiError::InvalidRequest(format!("invalid header key: {key}"))
                })?,
                HeaderValue::from_str(&value).map_err(|_| {
                    ApiError::InvalidRequest(format!("invalid header value for {key}"))
                })?,
            );
        }
        Ok(out)
    }

    fn request(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
        accept: &str,
    ) -> Result<RequestBuilder, ApiError> {
        let headers = self.build_headers(token, accept)?;
        let mut builder = self.http.request(method, self.endpoint(path)).headers(headers);
        if accept != ACCEPT_EVENT_STREAM {
            if let Some(timeout) = self.config.timeout {
                builder = builder.timeout(timeout);
            }
        }
        Ok(builder)
    }

    pub fn build_research_request(
        &self,
        request: &ResearchRequest,
        token: Option<&str>,
    ) -> Result<RequestBuilder, ApiError> {
        request.validate()?;
        Ok(self
            .request(Method::POST, "research", token, ACCEPT_EVENT_STREAM)?
            .json(request))
    }

    /// Start a research run and return its body as raw chunks.
    ///
    /// Non-success statuses are classified before any frame is read, so
    /// `401`/`429` surface as [`ApiError::Unauthorized`]/[`ApiError::RateLimited`].
    pub async fn open_research_stream(
        &self,
        request: &ResearchRequest,
        token: Option<&str>,
        cancellation: Option<&CancellationSignal>,
    ) -> Result<ChunkStream, ApiError> {
        let builder = self.build_research_request(request, token)?;
        tracing::info!(
            topic = %request.topic,
            depth = request.depth.as_str(),
            include_academic = request.include_academic,
            "opening research stream"
        );
        let response = send_checked(builder, cancellation).await?;
        let chunks = response.bytes_stream().map(|chunk| {
            chunk
                .map(|bytes| bytes.to_vec())
                .map_err(|error| ApiError::Stream(error.to_string()))
        });
        Ok(Box::pin(chunks))
    }

    pub async fn stream_research_with_handler<F>(
        &self,
        request: &ResearchRequest,
        token: Option<&str>,
        cancellation: Option<&CancellationSignal>,
        mut on_event: F,
    ) -> Result<(), ApiError>
    where
        F: FnMut(WireEvent),
    {
        let chunks = self.open_research_stream(request, token, cancellation).await?;
        let mut events = Box::pin(decode_stream(chunks));

        loop {
            let Some(event) = await_or_cancel(events.next(), cancellation).await? else {
                break;
            };
            let event = event?;
            let done = event.is_done();
            on_event(event);
            if done {
                break;
            }
        }

        Ok(())
    }

    pub async fn stream_research(
        &self,
        request: &ResearchRequest,
        token: Option<&str>,
        cancellation: Option<&CancellationSignal>,
    ) -> Result<StreamResult, ApiError> {
        let mut events = Vec::new();
        self.stream_research_with_handler(request, token, cancellation, |event| {
            events.push(event);
        })
        .await?;

        Ok(StreamResult { events })
    }

    pub async fn create_conversation(
        &self,
        token: Option<&str>,
        payload: &ConversationCreate,
    ) -> Result<ConversationRecord, ApiError> {
        let token = require_token(token)?;
        let builder = self
            .request(Method::POST, "conversations", Some(token), ACCEPT_JSON)?
            .json(payload);
        read_json(send_checked(builder, None).await?).await
    }

    pub async fn get_conversation(
        &self,
        token: Option<&str>,
        id: i64,
    ) -> Result<ConversationRecord, ApiError> {
        let token = require_token(token)?;
        let builder = self.request(
            Method::GET,
            &format!("conversations/{id}"),
            Some(token),
            ACCEPT_JSON,
        )?;
        read_json(send_checked(builder, None).await?).await
    }

    pub async fn update_conversation(
        &self,
        token: Option<&str>,
        id: i64,
        update: &ConversationUpdate,
    ) -> Result<ConversationRecord, ApiError> {
        let token = require_token(token)?;
        let builder = self
            .request(
                Method::PUT,
                &format!("conversations/{id}"),
                Some(token),
                ACCEPT_JSON,
            )?
            .json(update);
        read_json(send_checked(builder, None).await?).await
    }

    pub async fn delete_conversation(&self, token: Option<&str>, id: i64) -> Result<(), ApiError> {
        let token = require_token(token)?;
        let builder = self.request(
            Method::DELETE,
            &format!("conversations/{id}"),
            Some(token),
            ACCEPT_JSON,
        )?;
        send_checked(builder, None).await?;
        Ok(())
    }

    pub async fn list_conversations(
        &self,
        token: Option<&str>,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<ConversationSummary>, ApiError> {
        let token = require_token(token)?;
        let builder = self
            .request(Method::GET, "conversations", Some(token), ACCEPT_JSON)?
            .query(&[("limit", limit), ("offset", offset)]);
        read_json(send_checked(builder, None).await?).await
    }

    pub async fn health(&self) -> Result<HealthStatus, ApiError> {
        let builder = self.request(Method::GET, "health", None, ACCEPT_JSON)?;
        read_json(send_checked(builder, None).await?).await
    }

    pub async fn llm_health(&self) -> Result<LlmHealth, ApiError> {
        let builder = self.request(Method::GET, "health/llm", None, ACCEPT_JSON)?;
        read_json(send_checked(builder, None).await?).await
    }

    pub async fn server_config(&self) -> Result<ServerConfig, ApiError> {
        let builder = self.request(Method::GET, "config", None, ACCEPT_JSON)?;
        read_json(send_checked(builder, None).await?).await
    }

    pub async fn cache_stats(&self) -> Result<CacheStats, ApiError> {
        let builder = self.request(Method::GET, "cache/stats", None, ACCEPT_JSON)?;
        read_json(send_checked(builder, None).await?).await
    }

    pub async fn clear_cache(&self) -> Result<CacheCleared, ApiError> {
        let builder = self.request(Method::POST, "cache/clear", None, ACCEPT_JSON)?;
        read_json(send_checked(builder, None).await?).await
    }

    pub async fn invalidate_cache(
        &self,
        topic: &str,
        depth: ResearchDepth,
        include_academic: bool,
    ) -> Result<CacheInvalidation, ApiError> {
        let mut url = reqwest::Url::parse(&self.endpoint("cache"))
            .map_err(|error| ApiError::InvalidBaseUrl(error.to_string()))?;
        url.path_segments_mut()
            .map_err(|()| ApiError::InvalidBaseUrl(self.config.base_url.clone()))?
            .push(topic);
        let builder = self
            .http
            .delete(url)
            .headers(self.build_headers(None, ACCEPT_JSON)?)
            .query(&[
                ("depth", depth.as_str()),
                ("include_academic", if include_academic { "true" } else { "false" }),
            ]);
        read_json(send_checked(builder, None).await?).await
    }

    /// Render a briefing as PDF server-side and return the document bytes.
    pub async fn export_pdf(
        &self,
        token: Option<&str>,
        result: &ResearchResult,
    ) -> Result<Vec<u8>, ApiError> {
        let builder = self
            .request(Method::POST, "export/pdf", token, ACCEPT_PDF)?
            .json(result);
        let response = send_checked(builder, None).await?;
        Ok(response.bytes().await?.to_vec())
    }
}

fn require_token(token: Option<&str>) -> Result<&str, ApiError> {
    token
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or(ApiError::MissingAccessToken)
}

async fn send_checked(
    builder: RequestBuilder,
    cancellation: Option<&CancellationSignal>,
) -> Result<Response, ApiError> {
    let response = await_or_cancel(builder.send(), cancellation).await??;
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = await_or_cancel(response.text(), cancellation)
        .await?
        .unwrap_or_default();
    tracing::debug!(status = status.as_u16(), body = %body, "request rejected");
    Err(ApiError::from_status(status, &body))
}

async fn read_json<T>(response: Response) -> Result<T, ApiError>
where
    T: DeserializeOwned,
{
    let bytes = response.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}
