use std::future::Future;
use std::sync::{atomic::AtomicBool, atomic::Ordering, Arc};
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::{Client, Response};

use crate::config::OllamaApiConfig;
use crate::error::{parse_error_message, OllamaApiError};
use crate::events::OllamaStreamEvent;
use crate::ndjson::NdjsonStreamParser;
use crate::payload::{merge_options, OllamaChatRequest};
use crate::url::normalize_chat_url;

/// Optional cancellation signal shared across request and stream loops.
pub type CancellationSignal = Arc<AtomicBool>;

const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(25);

#[derive(Debug)]
pub struct OllamaApiClient {
    http: Client,
    config: OllamaApiConfig,
}

#[derive(Debug, Clone)]
pub struct StreamResult {
    pub events: Vec<OllamaStreamEvent>,
    pub done_reason: Option<String>,
}

impl StreamResult {
    /// Concatenated assistant text across all deltas.
    pub fn text(&self) -> String {
        self.events
            .iter()
            .filter_map(|event| match event {
                OllamaStreamEvent::MessageDelta { content } => Some(content.as_str()),
                _ => None,
            })
            .collect()
    }
}

impl OllamaApiClient {
    pub fn new(config: OllamaApiConfig) -> Result<Self, OllamaApiError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }
        let http = builder.build().map_err(OllamaApiError::from)?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &OllamaApiConfig {
        &self.config
    }

    pub fn normalized_endpoint(&self) -> String {
        normalize_chat_url(&self.config.base_url)
    }

    pub fn build_headers(&self) -> Result<HeaderMap, OllamaApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/x-ndjson"));
        if let Some(agent) = self
            .config
            .user_agent
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
        {
            headers.insert(
                USER_AGENT,
                HeaderValue::from_str(agent)
                    .map_err(|_| OllamaApiError::InvalidHeader(agent.to_string()))?,
            );
        }
        Ok(headers)
    }

    pub fn build_request(
        &self,
        request: &OllamaChatRequest,
    ) -> Result<reqwest::RequestBuilder, OllamaApiError> {
        validate_request(request)?;

        let headers = self.build_headers()?;
        let payload = self.request_with_transport_defaults(request);
        Ok(self
            .http
            .post(self.normalized_endpoint())
            .headers(headers)
            .json(&payload))
    }

    fn request_with_transport_defaults(&self, request: &OllamaChatRequest) -> OllamaChatRequest {
        let mut payload = request.clone();
        payload.stream = true;
        payload.model = payload.model.trim().to_string();
        payload.options = merge_options(request, &self.config.options);
        payload
    }

    /// Sends the request once. Non-success statuses surface as
    /// [`OllamaApiError::Status`] with the server's message.
    pub async fn send(
        &self,
        request: &OllamaChatRequest,
        cancellation: Option<&CancellationSignal>,
    ) -> Result<Response, OllamaApiError> {
        if is_cancelled(cancellation) {
            return Err(OllamaApiError::Cancelled);
        }

        let response = self.build_request(request)?.send();
        let response = await_or_cancel(response, cancellation)
            .await?
            .map_err(OllamaApiError::from)?;

        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let body = await_or_cancel(response.text(), cancellation)
            .await?
            .unwrap_or_default();
        Err(OllamaApiError::Status(
            status,
            parse_error_message(status, &body),
        ))
    }

    /// Streams the response, handing each event to `on_event` as soon as its
    /// line is complete. Returns the `done_reason` of the final line.
    pub async fn stream_with_handler<F>(
        &self,
        request: &OllamaChatRequest,
        cancellation: Option<&CancellationSignal>,
        mut on_event: F,
    ) -> Result<Option<String>, OllamaApiError>
    where
        F: FnMut(OllamaStreamEvent),
    {
        let response = self.send(request, cancellation).await?;
        let mut bytes = response.bytes_stream();
        let mut parser = NdjsonStreamParser::default();
        let mut terminal = None;

        loop {
            let Some(chunk) = await_or_cancel(bytes.next(), cancellation).await? else {
                break;
            };
            if is_cancelled(cancellation) {
                return Err(OllamaApiError::Cancelled);
            }
            let chunk = chunk.map_err(OllamaApiError::from)?;
            for event in parser.feed(&chunk) {
                process_stream_event(event, &mut terminal, &mut on_event)?;
            }
        }

        for event in parser.finish() {
            process_stream_event(event, &mut terminal, &mut on_event)?;
        }

        if is_cancelled(cancellation) {
            return Err(OllamaApiError::Cancelled);
        }

        terminal.ok_or(OllamaApiError::Truncated)
    }

    pub async fn stream(
        &self,
        request: &OllamaChatRequest,
        cancellation: Option<&CancellationSignal>,
    ) -> Result<StreamResult, OllamaApiError> {
        let mut events = Vec::new();
        let done_reason = self
            .stream_with_handler(request, cancellation, |event| {
                events.push(event);
            })
            .await?;

        Ok(StreamResult {
            events,
            done_reason,
        })
    }
}

fn validate_request(request: &OllamaChatRequest) -> Result<(), OllamaApiError> {
    if request.model.trim().is_empty() {
        return Err(OllamaApiError::MissingModel);
    }
    if request.messages.is_empty() {
        return Err(OllamaApiError::InvalidRequestPayload(
            "'messages' must contain at least one message".to_string(),
        ));
    }
    Ok(())
}

/// Forwards one parsed event. Server-side errors abort the stream; a `Done`
/// line records the terminal reason.
fn process_stream_event<F>(
    event: OllamaStreamEvent,
    terminal: &mut Option<Option<String>>,
    on_event: &mut F,
) -> Result<(), OllamaApiError>
where
    F: FnMut(OllamaStreamEvent),
{
    if let OllamaStreamEvent::Error { message } = &event {
        return Err(OllamaApiError::StreamFailed {
            message: message.clone(),
        });
    }

    if let OllamaStreamEvent::Done { done_reason } = &event {
        *terminal = Some(done_reason.clone());
    }

    on_event(event);
    Ok(())
}

fn is_cancelled(cancel: Option<&CancellationSignal>) -> bool {
    cancel.is_some_and(|token| token.load(Ordering::Acquire))
}

async fn await_or_cancel<F>(
    future: F,
    cancellation: Option<&CancellationSignal>,
) -> Result<F::Output, OllamaApiError>
where
    F: Future,
{
    if cancellation.is_none() {
        return Ok(future.await);
    }

    let mut future = Box::pin(future);

    loop {
        if is_cancelled(cancellation) {
            return Err(OllamaApiError::Cancelled);
        }

        if let Ok(output) = tokio::time::timeout(CANCEL_POLL_INTERVAL, &mut future).await {
            if is_cancelled(cancellation) {
                return Err(OllamaApiError::Cancelled);
            }
            return Ok(output);
        }
    }
}
