//! The verification client: configuration, QR code generation, polling and dispatch.

use std::{
    fmt,
    ops::ControlFlow,
    sync::{Arc, PoisonError, RwLock, Weak},
};

use reqwest::Method;
use serde::Serialize;
use serde_json::{json, Value};
use tokio::runtime::Handle;

use crate::{
    defaults::{API_KEY_HEADER_NAME, GENERATE_QR_CODE_ENDPOINT},
    dispatcher::Dispatch,
    error::AgeKitError,
    options::{Session, VerificationOptions},
    page::Page,
    poller::Poller,
    renderer::{RetryAction, View},
    state::FailureReason,
};

/// The result of a QR code generation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QrCodeArtifact {
    /// Image of the QR code.
    pub qr_code_url: String,
    /// Link opening the verification app directly, for holders on the same device.
    pub deep_link: String,
    /// Endpoint reporting the scanning state of this QR code.
    #[serde(rename = "qrCodeStatusCheckUrl")]
    pub status_check_url: String,
}

impl QrCodeArtifact {
    fn from_response(data: &Value) -> Result<Self, AgeKitError> {
        let field = |name: &'static str| {
            data.get(name)
                .and_then(Value::as_str)
                .filter(|value| !value.is_empty())
                .map(ToString::to_string)
                .ok_or(AgeKitError::InvalidResponse { field: name })
        };

        Ok(Self {
            qr_code_url: field("qrCodeUrl")?,
            deep_link: field("deepLink")?,
            status_check_url: field("qrCodeStatusCheckUrl")?,
        })
    }
}

/// Drives one age verification flow on a host page.
///
/// The client is created unconfigured; every network operation fails with
/// [`AgeKitError::NotConfigured`] until [`VerificationClient::configure`] succeeds. It owns the
/// single polling task of the flow: a new QR code always supersedes the previous one.
///
/// Cloning is cheap and every clone drives the same flow.
///
/// # Examples
///
/// ```rust,no_run
/// use std::sync::Arc;
///
/// use agekit_core::{Page, VerificationClient, VerificationOptions};
///
/// # async fn run(page: Arc<dyn Page>) -> Result<(), agekit_core::AgeKitError> {
/// let client = VerificationClient::new(page)?;
/// client.configure(
///     VerificationOptions::new()
///         .with_api_key("my-api-key")
///         .with_qr_container_selector("#qr")
///         .on_success(|| println!("verified"))
///         .on_failure(|reason| eprintln!("failed: {reason}"))
///         .on_scanning(|| println!("scanning"))
///         .on_rejected_by_user(|| println!("declined"))
///         .on_rejected_by_requirements(|| println!("too young"))
///         .on_timeout(|| println!("expired")),
/// )?;
/// let artifact = client.generate_qr_code().await?;
/// println!("scan {}", artifact.qr_code_url);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct VerificationClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    page: Arc<dyn Page>,
    session: RwLock<Option<Arc<Session>>>,
    poller: Poller,
    runtime: Handle,
}

impl VerificationClient {
    /// Creates an unconfigured client rendering into `page`.
    ///
    /// # Errors
    /// Returns [`AgeKitError::NoRuntime`] when called outside of a Tokio runtime, which the
    /// client needs to run its polling task.
    pub fn new(page: Arc<dyn Page>) -> Result<Self, AgeKitError> {
        let runtime = Handle::try_current().map_err(|_| AgeKitError::NoRuntime)?;
        Ok(Self {
            inner: Arc::new(ClientInner {
                page,
                session: RwLock::new(None),
                poller: Poller::default(),
                runtime,
            }),
        })
    }

    /// Validates `options` and binds the resulting session. Calling it again replaces the
    /// session; an active polling task picks up the new session on its next tick.
    ///
    /// # Errors
    /// - [`AgeKitError::Configuration`] naming the first missing required field.
    /// - [`AgeKitError::InvalidTarget`] if the QR container selector matches nothing.
    pub fn configure(&self, options: VerificationOptions) -> Result<(), AgeKitError> {
        let session = options.into_session(self.inner.page.as_ref())?;
        tracing::info!(api_base_url = %session.api_base_url, "client configured");
        *self
            .inner
            .session
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(session));
        Ok(())
    }

    /// Whether [`VerificationClient::configure`] succeeded at least once.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.inner.session().is_ok()
    }

    /// Requests a new QR code, renders it and starts polling its status.
    ///
    /// Any polling of a previous QR code stops as soon as the new one is polled. When the
    /// request fails, the failure callback fires, polling stops and nothing is rendered.
    ///
    /// # Errors
    /// - [`AgeKitError::NotConfigured`] before a successful `configure`.
    /// - [`AgeKitError::Transport`] if the service could not be reached.
    /// - [`AgeKitError::InvalidResponse`] if the response lacks a QR code field.
    pub async fn generate_qr_code(&self) -> Result<QrCodeArtifact, AgeKitError> {
        let session = self.inner.session()?;
        let url = session.build_url(GENERATE_QR_CODE_ENDPOINT);

        let response = session
            .transport
            .send_with_retry(
                &url,
                Method::POST,
                &json!({}),
                &[(API_KEY_HEADER_NAME, session.api_key())],
            )
            .await;

        let artifact = match response {
            Ok(data) => QrCodeArtifact::from_response(&data).map_err(|err| {
                let reason = data
                    .get("error")
                    .filter(|error| is_truthy(error))
                    .map_or_else(|| err.to_string(), display_value);
                (err, FailureReason::ServiceError(reason))
            }),
            Err(err) => {
                let reason = FailureReason::Transport(err.to_string());
                Err((err.into(), reason))
            }
        };

        match artifact {
            Ok(artifact) => {
                tracing::info!(status_check_url = %artifact.status_check_url, "QR code generated");
                session.render_target.replace_content(View::QrCode {
                    image_url: artifact.qr_code_url.clone(),
                    deep_link: artifact.deep_link.clone(),
                });
                self.start_polling(&artifact.status_check_url)?;
                Ok(artifact)
            }
            Err((err, reason)) => {
                tracing::warn!(%err, "QR code generation failed");
                self.inner
                    .dispatch_and_stop(&session, &Dispatch::Failure(reason));
                Err(err)
            }
        }
    }

    /// Starts polling `url`, cancelling any previous polling first.
    ///
    /// # Errors
    /// Returns [`AgeKitError::NotConfigured`] before a successful `configure`.
    pub fn start_polling(&self, url: &str) -> Result<(), AgeKitError> {
        let session = self.inner.session()?;
        let client = Arc::downgrade(&self.inner);
        let poll_url = url.to_string();

        self.inner.poller.start(
            &self.inner.runtime,
            url,
            session.poll_interval,
            move |id| poll_once(Weak::clone(&client), poll_url.clone(), id),
        );
        Ok(())
    }

    /// Stops the active polling, if any. Returns whether polling was active; calling it again is
    /// a no-op.
    pub fn cancel_polling(&self) -> bool {
        self.inner.poller.cancel()
    }

    /// The status check URL currently polled.
    #[must_use]
    pub fn polling_url(&self) -> Option<String> {
        self.inner.poller.active_url()
    }

    /// Feeds a status value to the state machine: fires the matching callback and stops polling
    /// on any terminal or unrecognized state.
    ///
    /// Only the polling active when the callback fired is stopped, so a callback may start a new
    /// polling.
    ///
    /// # Errors
    /// Returns [`AgeKitError::NotConfigured`] before a successful `configure`.
    pub fn handle_status(&self, status: &str) -> Result<Dispatch, AgeKitError> {
        let session = self.inner.session()?;
        let dispatch = Dispatch::from_status(status);
        self.inner.dispatch_and_stop(&session, &dispatch);
        Ok(dispatch)
    }

    /// An action requesting a new QR code in the background, for "New QR" buttons.
    ///
    /// The action does not keep the client alive; once every clone of the client is dropped
    /// it does nothing.
    #[must_use]
    pub fn retry_action(&self) -> RetryAction {
        let client = Arc::downgrade(&self.inner);
        RetryAction::new(move || {
            let Some(inner) = client.upgrade() else {
                return;
            };
            let runtime = inner.runtime.clone();
            let client = Self { inner };
            runtime.spawn(async move {
                if let Err(err) = client.generate_qr_code().await {
                    tracing::warn!(%err, "new QR code request failed");
                }
            });
        })
    }
}

impl ClientInner {
    fn session(&self) -> Result<Arc<Session>, AgeKitError> {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(AgeKitError::NotConfigured)
    }

    fn dispatch(session: &Session, dispatch: &Dispatch) {
        tracing::info!(?dispatch, "verification state changed");
        session.callbacks.fire(dispatch);
    }

    /// Fires the callback of `dispatch`, then stops the polling that was active before it fired
    /// if the dispatch ends the session.
    fn dispatch_and_stop(&self, session: &Session, dispatch: &Dispatch) {
        let active = self.poller.active_id();
        self.poller.dispatch(|| Self::dispatch(session, dispatch));
        if let Some(id) = active.filter(|_| dispatch.stops_polling()) {
            self.poller.cancel_task(id);
        }
    }
}

/// One status check of `url` for the polling task `id`. Breaks once the state machine reaches a
/// terminal state, or once the task was superseded.
///
/// A terminal state only ends the polling task that observed it; a newer task started from a
/// callback keeps running.
async fn poll_once(client: Weak<ClientInner>, url: String, id: u64) -> ControlFlow<()> {
    let Some(client) = client.upgrade() else {
        return ControlFlow::Break(());
    };
    let session = match client.session() {
        Ok(session) => session,
        Err(err) => {
            tracing::error!(%err, "polling without a session");
            return ControlFlow::Break(());
        }
    };

    let response = session
        .transport
        .send(
            &url,
            Method::GET,
            &json!({}),
            &[(API_KEY_HEADER_NAME, session.api_key())],
        )
        .await;

    let dispatch = match response {
        Ok(data) => match status_of(&data) {
            Some(dispatch) => dispatch,
            None => {
                tracing::debug!(%url, "status check without state, polling on");
                return ControlFlow::Continue(());
            }
        },
        Err(err) => {
            tracing::warn!(%err, "status check failed");
            Dispatch::Failure(FailureReason::Transport(err.to_string()))
        }
    };

    let dispatched = client
        .poller
        .dispatch_if_active(id, || ClientInner::dispatch(&session, &dispatch));
    if !dispatched || dispatch.stops_polling() {
        ControlFlow::Break(())
    } else {
        ControlFlow::Continue(())
    }
}

/// Reads a status check response: the `scanningState` if set, else the `error` as a failure.
/// Returns `None` when the response carries neither.
fn status_of(data: &Value) -> Option<Dispatch> {
    if let Some(state) = data.get("scanningState").filter(|state| is_truthy(state)) {
        return Some(Dispatch::from_status(&display_value(state)));
    }
    data.get("error")
        .filter(|error| is_truthy(error))
        .map(|error| Dispatch::Failure(FailureReason::ServiceError(display_value(error))))
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::String(text) => !text.is_empty(),
        Value::Number(number) => number.as_f64().is_some_and(|number| number != 0.0),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

impl fmt::Debug for VerificationClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerificationClient")
            .field("configured", &self.is_configured())
            .field("polling_url", &self.polling_url())
            .finish_non_exhaustive()
    }
}
