use std::time::Duration;

use reqwest::header::{HeaderName, HeaderValue, USER_AGENT};
use reqwest::{Client, Method, Url};
use tokio::runtime::Handle;
use tokio::time::timeout;

use crate::config::HttpConfig;
use crate::protocol::{HttpError, HttpHeader, HttpRequest, HttpResponse, HttpResult, RequestId};
use crate::resolvers::{Completion, CompletionSender, Resolved};

/// Performs http requests on the runtime and reports exactly one
/// [`HttpResult`] per request. No retries happen here.
pub struct HttpResolver {
    client: Client,
    timeout: Duration,
    user_agent: String,
    runtime: Handle,
    completions: CompletionSender,
}

impl HttpResolver {
    pub fn new(
        config: &HttpConfig,
        runtime: Handle,
        completions: CompletionSender,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout())
            .build()?;

        Ok(Self {
            client,
            timeout: config.timeout(),
            user_agent: config.user_agent.clone(),
            runtime,
            completions,
        })
    }

    pub fn resolve(&self, id: RequestId, request: HttpRequest) {
        let client = self.client.clone();
        let request_timeout = self.timeout;
        let user_agent = self.user_agent.clone();
        let completions = self.completions.clone();

        tracing::debug!(request = %id, method = %request.method, url = %request.url, "http request started");

        self.runtime.spawn(async move {
            let result = execute(&client, request, request_timeout, &user_agent).await;
            match &result {
                HttpResult::Ok(response) => {
                    tracing::debug!(request = %id, status = response.status, "http request finished")
                }
                HttpResult::Err(error) => {
                    tracing::debug!(request = %id, error = %error, "http request failed")
                }
            }
            if completions
                .send(Completion::task(id, Resolved::Http(result)))
                .is_err()
            {
                tracing::trace!(request = %id, "http completion dropped (shell stopped)");
            }
        });
    }
}

/// Run one request to completion, folding every failure into the result.
pub async fn execute(
    client: &Client,
    request: HttpRequest,
    request_timeout: Duration,
    user_agent: &str,
) -> HttpResult {
    match timeout(request_timeout, send(client, request, user_agent)).await {
        Ok(result) => result.into(),
        Err(_) => HttpResult::Err(HttpError::Timeout),
    }
}

async fn send(
    client: &Client,
    request: HttpRequest,
    user_agent: &str,
) -> Result<HttpResponse, HttpError> {
    let method = Method::from_bytes(request.method.as_bytes())
        .map_err(|e| HttpError::InvalidRequest(format!("method '{}': {}", request.method, e)))?;
    let url = Url::parse(&request.url)
        .map_err(|e| HttpError::Url(format!("'{}': {}", request.url, e)))?;

    let mut builder = client.request(method, url);

    for header in &request.headers {
        let name = HeaderName::from_bytes(header.name.as_bytes()).map_err(|e| {
            HttpError::InvalidRequest(format!("header name '{}': {}", header.name, e))
        })?;
        let value = HeaderValue::from_bytes(header.value.as_bytes()).map_err(|e| {
            HttpError::InvalidRequest(format!("header value for '{}': {}", header.name, e))
        })?;
        builder = builder.header(name, value);
    }

    if !request.has_header(USER_AGENT.as_str()) {
        builder = builder.header(USER_AGENT, user_agent);
    }

    let response = builder
        .body(request.body)
        .send()
        .await
        .map_err(classify)?;

    let status = response.status().as_u16();
    let headers = response
        .headers()
        .iter()
        .map(|(name, value)| {
            HttpHeader::new(name.as_str(), String::from_utf8_lossy(value.as_bytes()))
        })
        .collect();

    let body = response.bytes().await.map_err(classify)?.to_vec();

    Ok(HttpResponse {
        status,
        headers,
        body,
    })
}

fn classify(err: reqwest::Error) -> HttpError {
    if err.is_timeout() {
        HttpError::Timeout
    } else if err.is_builder() {
        HttpError::InvalidRequest(err.to_string())
    } else {
        HttpError::Io(err.to_string())
    }
}
