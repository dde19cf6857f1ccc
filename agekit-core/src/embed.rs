//! The embedded widget: reads its parameters from the embedding URL and wires the client to a
//! [`StateRenderer`].

use std::{sync::Arc, time::Duration};

use reqwest::Url;

use crate::{
    client::VerificationClient,
    defaults::{EMBED_LOG_CONTAINER_SELECTOR, EMBED_QR_CONTAINER_SELECTOR},
    error::AgeKitError,
    options::VerificationOptions,
    page::Page,
    renderer::{RendererOptions, StateRenderer},
    state::{FailureReason, VerificationState},
};

/// Parameters carried by the query string of the URL the widget is embedded with, e.g.
/// `https://cdn.example/age.js?apiKey=...&successURL=...`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmbedParams {
    /// `apiKey`: required to generate QR codes.
    pub api_key: Option<String>,
    /// `successURL`: where to go after an approval.
    pub success_url: Option<String>,
    /// `failureURL`: where to go after a rejection.
    pub failure_url: Option<String>,
    /// `notificationURL`: forwarded to the host, not used by the flow.
    pub notification_url: Option<String>,
}

impl EmbedParams {
    /// Extracts the parameters from the embedding URL. Unknown parameters are ignored and empty
    /// ones count as absent.
    ///
    /// # Errors
    /// Returns [`AgeKitError::InvalidEmbedUrl`] if `src` is not an absolute URL.
    pub fn from_script_src(src: &str) -> Result<Self, AgeKitError> {
        let url = Url::parse(src).map_err(|err| AgeKitError::InvalidEmbedUrl {
            error: err.to_string(),
        })?;

        let mut params = Self::default();
        for (key, value) in url.query_pairs() {
            if value.is_empty() {
                continue;
            }
            let slot = match &*key {
                "apiKey" => &mut params.api_key,
                "successURL" => &mut params.success_url,
                "failureURL" => &mut params.failure_url,
                "notificationURL" => &mut params.notification_url,
                _ => continue,
            };
            slot.get_or_insert_with(|| value.into_owned());
        }
        Ok(params)
    }
}

/// A mounted widget. Dropping it ends the flow: polling stops at its next tick.
#[derive(Debug)]
pub struct EmbeddedWidget {
    client: VerificationClient,
    renderer: Arc<StateRenderer>,
    params: EmbedParams,
}

impl EmbeddedWidget {
    /// The client driving the flow.
    #[must_use]
    pub const fn client(&self) -> &VerificationClient {
        &self.client
    }

    /// The renderer the callbacks draw with.
    #[must_use]
    pub fn renderer(&self) -> &StateRenderer {
        &self.renderer
    }

    /// The parameters the widget was mounted with.
    #[must_use]
    pub const fn params(&self) -> &EmbedParams {
        &self.params
    }
}

/// Mounts the widget on `page` and requests the first QR code in the background.
///
/// `base` provides the optional settings (API base URL, intervals); the API key, containers and
/// callbacks are set here. Every callback renders its state, except failures which render the
/// expired view so that the holder can request a new QR code.
///
/// # Errors
/// - [`AgeKitError::Configuration`] when `params` has no API key.
/// - Any error of [`VerificationClient::configure`] or [`StateRenderer::new`].
pub fn mount(
    params: EmbedParams,
    page: Arc<dyn Page>,
    base: VerificationOptions,
    redirect_delay: Option<Duration>,
) -> Result<EmbeddedWidget, AgeKitError> {
    let api_key = params
        .api_key
        .clone()
        .ok_or(AgeKitError::Configuration { field: "apiKey" })?;

    let client = VerificationClient::new(Arc::clone(&page))?;
    let renderer = Arc::new(StateRenderer::new(
        page,
        RendererOptions {
            qr_container_selector: EMBED_QR_CONTAINER_SELECTOR.to_string(),
            success_redirect_url: params.success_url.clone(),
            fail_redirect_url: params.failure_url.clone(),
            redirect_delay,
        },
        Some(client.retry_action()),
    )?);

    let render = |state: VerificationState| {
        let renderer = Arc::clone(&renderer);
        move || renderer.render(state)
    };
    let on_failure = {
        let renderer = Arc::clone(&renderer);
        move |reason: &FailureReason| {
            tracing::warn!(%reason, "verification failed");
            renderer.render(VerificationState::Timeout);
        }
    };

    client.configure(
        base.with_api_key(api_key)
            .with_qr_container_selector(EMBED_QR_CONTAINER_SELECTOR)
            .with_log_container_selector(EMBED_LOG_CONTAINER_SELECTOR)
            .on_success(render(VerificationState::Approved))
            .on_failure(on_failure)
            .on_scanning(render(VerificationState::Scanned))
            .on_rejected_by_user(render(VerificationState::RejectedByUser))
            .on_rejected_by_requirements(render(VerificationState::RejectedByRequirement))
            .on_timeout(render(VerificationState::Timeout)),
    )?;

    if let Some(notification_url) = &params.notification_url {
        tracing::debug!(%notification_url, "notification URL provided");
    }

    client.retry_action().trigger();

    Ok(EmbeddedWidget {
        client,
        renderer,
        params,
    })
}

/// Mounts the widget from its embedding URL with default settings.
///
/// Never fails: a missing API key or any configuration error is logged and yields `None`.
pub fn bootstrap(script_src: &str, page: Arc<dyn Page>) -> Option<EmbeddedWidget> {
    let params = match EmbedParams::from_script_src(script_src) {
        Ok(params) => params,
        Err(err) => {
            tracing::error!(%err, "cannot read the embedding parameters");
            return None;
        }
    };
    if params.api_key.is_none() {
        tracing::error!("apiKey is missing from the embedding URL, no QR code will be generated");
        return None;
    }

    mount(params, page, VerificationOptions::new(), None)
        .inspect_err(|err| tracing::error!(%err, "cannot mount the age verification widget"))
        .ok()
}
