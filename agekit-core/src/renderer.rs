//! Presentation of the verification flow.
//!
//! [`StateRenderer`] is display only: it does not poll nor fire callbacks. Hosts (or
//! [`bootstrap`](crate::embed::bootstrap)) drive it from their callbacks.

use std::{fmt, str::FromStr, sync::Arc, time::Duration};

use tokio::runtime::Handle;

use crate::{
    defaults::REDIRECT_DELAY,
    error::AgeKitError,
    page::{Page, RenderTarget},
    state::VerificationState,
};

/// A host-triggered action that requests a fresh QR code.
#[derive(Clone)]
pub struct RetryAction(Arc<dyn Fn() + Send + Sync>);

impl RetryAction {
    /// Wraps `action`.
    pub fn new(action: impl Fn() + Send + Sync + 'static) -> Self {
        Self(Arc::new(action))
    }

    /// Runs the action. Called by the host when the holder presses "New QR".
    pub fn trigger(&self) {
        (self.0)();
    }
}

impl fmt::Debug for RetryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RetryAction")
    }
}

/// What the render target shows.
#[derive(Debug, Clone)]
pub enum View {
    /// The QR code to scan. Activating it should open `deep_link`.
    QrCode {
        /// Image of the QR code.
        image_url: String,
        /// Link opening the verification app directly.
        deep_link: String,
    },
    /// The QR code expired. `retry` requests a new one.
    Expired {
        /// The "New QR" action, if one is wired.
        retry: Option<RetryAction>,
    },
    /// The QR code was scanned; the holder is reviewing the request.
    Scanning,
    /// The holder's age was validated.
    Approved,
    /// The holder declined or does not meet the requirements.
    Denied,
    /// Fallback for a state without a template.
    Unknown(String),
}

impl View {
    /// The message shown for this view.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::QrCode { .. } => "Age Verification QR Code".to_string(),
            Self::Expired { .. } => "QR code expired.".to_string(),
            Self::Scanning => "Scanning in progress...".to_string(),
            Self::Approved => {
                "Your age was validated. You will gain access in 10 seconds".to_string()
            }
            Self::Denied => "Access Denied".to_string(),
            Self::Unknown(state) => format!("Unknown state: {state}"),
        }
    }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::QrCode {
                image_url,
                deep_link,
            } => write!(f, "{}\n  image: {image_url}\n  open: {deep_link}", self.message()),
            Self::Expired { retry: Some(_) } => write!(f, "{} [New QR]", self.message()),
            _ => f.write_str(&self.message()),
        }
    }
}

/// Configuration of a [`StateRenderer`].
#[derive(Debug, Clone, Default)]
pub struct RendererOptions {
    /// Selector of the element states are rendered into.
    pub qr_container_selector: String,
    /// Where to navigate after an approval.
    pub success_redirect_url: Option<String>,
    /// Where to navigate after a rejection.
    pub fail_redirect_url: Option<String>,
    /// Delay before redirecting. Defaults to 10 seconds.
    pub redirect_delay: Option<Duration>,
}

/// Renders verification states into a target and wires their interactions.
pub struct StateRenderer {
    page: Arc<dyn Page>,
    target: Arc<dyn RenderTarget>,
    retry: Option<RetryAction>,
    success_redirect_url: Option<String>,
    fail_redirect_url: Option<String>,
    redirect_delay: Duration,
    runtime: Handle,
}

impl StateRenderer {
    /// Resolves the container on `page` and builds the renderer. Must be called within a Tokio
    /// runtime, which schedules the redirects.
    ///
    /// # Errors
    /// - [`AgeKitError::Configuration`] if the selector is empty.
    /// - [`AgeKitError::InvalidTarget`] if the selector matches nothing.
    /// - [`AgeKitError::NoRuntime`] outside of a Tokio runtime.
    pub fn new(
        page: Arc<dyn Page>,
        options: RendererOptions,
        retry: Option<RetryAction>,
    ) -> Result<Self, AgeKitError> {
        if options.qr_container_selector.is_empty() {
            return Err(AgeKitError::Configuration {
                field: "qrCodeSelector",
            });
        }
        let target = page
            .query_selector(&options.qr_container_selector)
            .ok_or_else(|| AgeKitError::InvalidTarget {
                selector: options.qr_container_selector.clone(),
            })?;
        let runtime = Handle::try_current().map_err(|_| AgeKitError::NoRuntime)?;

        Ok(Self {
            page,
            target,
            retry,
            success_redirect_url: options.success_redirect_url.filter(|url| !url.is_empty()),
            fail_redirect_url: options.fail_redirect_url.filter(|url| !url.is_empty()),
            redirect_delay: options.redirect_delay.unwrap_or(REDIRECT_DELAY),
            runtime,
        })
    }

    /// Replaces the target's content with the view of `state`.
    ///
    /// `WaitingForScan` has no view and leaves the content untouched. Approvals and rejections
    /// schedule a redirect when the matching URL is configured.
    pub fn render(&self, state: VerificationState) {
        let view = match state {
            VerificationState::WaitingForScan => return,
            VerificationState::Timeout => View::Expired {
                retry: self.retry.clone(),
            },
            VerificationState::Scanned => View::Scanning,
            VerificationState::Approved => View::Approved,
            VerificationState::RejectedByUser | VerificationState::RejectedByRequirement => {
                View::Denied
            }
        };
        tracing::debug!(%state, "rendering state");
        self.target.replace_content(view);

        let redirect = match state {
            VerificationState::Approved => self.success_redirect_url.as_deref(),
            VerificationState::RejectedByUser | VerificationState::RejectedByRequirement => {
                self.fail_redirect_url.as_deref()
            }
            _ => None,
        };
        if let Some(url) = redirect {
            self.redirect_with_delay(url.to_string());
        }
    }

    /// Like [`StateRenderer::render`] for a raw status value. Unrecognized values render the
    /// fallback view.
    pub fn render_status(&self, status: &str) {
        match VerificationState::from_str(status) {
            Ok(state) => self.render(state),
            Err(_) => {
                tracing::warn!(status, "rendering unknown state");
                self.target
                    .replace_content(View::Unknown(status.to_string()));
            }
        }
    }

    /// Navigates the page to `url` once the redirect delay elapsed. Not cancellable.
    fn redirect_with_delay(&self, url: String) {
        let page = Arc::clone(&self.page);
        let delay = self.redirect_delay;
        tracing::info!(%url, ?delay, "scheduling redirect");
        self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            page.navigate(&url);
        });
    }
}

impl fmt::Debug for StateRenderer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateRenderer")
            .field("success_redirect_url", &self.success_redirect_url)
            .field("fail_redirect_url", &self.fail_redirect_url)
            .field("redirect_delay", &self.redirect_delay)
            .finish_non_exhaustive()
    }
}
