use std::{sync::Arc, time::Duration};

use backon::{ExponentialBuilder, Retryable};
use reqwest::{
    header::{CONTENT_TYPE, USER_AGENT},
    Method, RequestBuilder, Response,
};
use serde_json::Value;

use crate::{error::TransportError, log_entry::LogEntry, page::RenderTarget};

/// A thin wrapper on an HTTP client for talking to the verification service. Sets the JSON
/// content type, user-agent & timeout on every request, decodes JSON bodies and mirrors each
/// decoded response into the log target, if any.
pub(crate) struct Transport {
    client: reqwest::Client,
    timeout: Duration,
    max_retries: u32,
    log_target: Option<Arc<dyn RenderTarget>>,
}

impl Transport {
    /// Initializes a new `Transport` instance.
    pub(crate) fn new(
        timeout: Duration,
        max_retries: u32,
        log_target: Option<Arc<dyn RenderTarget>>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            timeout,
            max_retries,
            log_target,
        }
    }

    /// Creates a request builder with defaults applied. `body` is only sent for `POST`; caller
    /// headers are added on top of the defaults.
    fn req(
        &self,
        method: &Method,
        url: &str,
        body: &Value,
        extra_headers: &[(&str, &str)],
    ) -> RequestBuilder {
        let mut request_builder = self
            .client
            .request(method.clone(), url)
            .timeout(self.timeout)
            .header(CONTENT_TYPE, "application/json")
            .header(
                USER_AGENT,
                format!("agekit-core/{}", env!("CARGO_PKG_VERSION")),
            );

        for (name, value) in extra_headers {
            request_builder = request_builder.header(*name, *value);
        }

        if *method == Method::POST {
            request_builder = request_builder.body(body.to_string());
        }

        request_builder
    }

    /// Sends a single request and returns the decoded JSON body.
    ///
    /// The HTTP status is not inspected: the service reports failures as JSON bodies (e.g.
    /// `{"error": "..."}`), which callers handle themselves.
    ///
    /// # Errors
    /// Returns a [`TransportError`] if the service cannot be reached or the body is not JSON.
    pub(crate) async fn send(
        &self,
        url: &str,
        method: Method,
        body: &Value,
        extra_headers: &[(&str, &str)],
    ) -> Result<Value, TransportError> {
        tracing::debug!(%method, url, "sending request");
        let request_builder = self.req(&method, url, body, extra_headers);
        let response = execute_request_builder(request_builder)
            .await
            .map_err(|err| err.error)?;
        let data = decode_response(response).await.map_err(|err| err.error)?;
        self.log_fetched_data(&data);
        Ok(data)
    }

    /// Like [`Transport::send`], but retries transient failures (connect errors, timeouts, 429
    /// and 5xx statuses) with exponential backoff.
    ///
    /// # Errors
    /// Returns the last [`TransportError`] once retries are exhausted, or the first permanent one.
    pub(crate) async fn send_with_retry(
        &self,
        url: &str,
        method: Method,
        body: &Value,
        extra_headers: &[(&str, &str)],
    ) -> Result<Value, TransportError> {
        tracing::debug!(%method, url, max_retries = self.max_retries, "sending request");
        let template = self.req(&method, url, body, extra_headers);

        let backoff = ExponentialBuilder::default()
            .with_min_delay(Duration::from_millis(200))
            .with_max_delay(Duration::from_secs(2))
            .with_max_times(self.max_retries as usize);

        let data = (|| async {
            let request_builder = template.try_clone().ok_or_else(|| {
                RequestHandleError::permanent(TransportError::Network {
                    url: url.to_string(),
                    status: None,
                    error: "request cannot be retried because it is not cloneable"
                        .to_string(),
                })
            })?;
            let response = execute_request_builder(request_builder).await?;
            let status = response.status().as_u16();
            if status == 429 || (500..600).contains(&status) {
                return Err(RequestHandleError::retryable(TransportError::Network {
                    url: url.to_string(),
                    status: Some(status),
                    error: format!("request error with bad status code {status}"),
                }));
            }
            decode_response(response).await
        })
        .retry(backoff)
        .when(RequestHandleError::is_retryable)
        .notify(|err: &RequestHandleError, after: Duration| {
            tracing::warn!(error = %err.error, ?after, "retrying request");
        })
        .await
        .map_err(|err| err.error)?;

        self.log_fetched_data(&data);
        Ok(data)
    }

    fn log_fetched_data(&self, data: &Value) {
        if let Some(log_target) = &self.log_target {
            log_target.prepend_entry(LogEntry::from_response(data));
        }
    }
}

#[derive(Debug)]
struct RequestHandleError {
    error: TransportError,
    retryable: bool,
}

impl RequestHandleError {
    const fn retryable(error: TransportError) -> Self {
        Self {
            error,
            retryable: true,
        }
    }

    const fn permanent(error: TransportError) -> Self {
        Self {
            error,
            retryable: false,
        }
    }

    const fn is_retryable(&self) -> bool {
        self.retryable
    }
}

async fn execute_request_builder(
    request_builder: RequestBuilder,
) -> Result<Response, RequestHandleError> {
    let (client, request) = request_builder.build_split();
    let request = request.map_err(|err| {
        RequestHandleError::permanent(TransportError::Network {
            url: err
                .url()
                .map_or_else(|| "<unknown>".to_string(), ToString::to_string),
            status: None,
            error: format!("request build failed: {err}"),
        })
    })?;
    let url = request.url().to_string();

    client.execute(request).await.map_err(|err| {
        if err.is_timeout() || err.is_connect() {
            return RequestHandleError::retryable(TransportError::Network {
                url: url.clone(),
                status: None,
                error: format!("request timeout/connect error: {err}"),
            });
        }

        RequestHandleError::permanent(TransportError::Network {
            url: url.clone(),
            status: None,
            error: format!("request failed: {err}"),
        })
    })
}

async fn decode_response(response: Response) -> Result<Value, RequestHandleError> {
    let url = response.url().to_string();
    let status = response.status().as_u16();
    let bytes = response.bytes().await.map_err(|err| {
        RequestHandleError::retryable(TransportError::Network {
            url: url.clone(),
            status: Some(status),
            error: format!("failed to read response body: {err}"),
        })
    })?;

    serde_json::from_slice(&bytes).map_err(|err| {
        RequestHandleError::permanent(TransportError::Decode {
            url,
            error: format!("response is not valid JSON (status {status}): {err}"),
        })
    })
}
