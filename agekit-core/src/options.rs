//! Host configuration and its validation into a session.

use std::{fmt, sync::Arc, time::Duration};

use secrecy::{ExposeSecret, SecretString};

use crate::{
    defaults::{
        DEFAULT_API_BASE_URL, GENERATION_MAX_RETRIES, POLLING_INTERVAL, REQUEST_TIMEOUT,
    },
    dispatcher::{Callback, FailureCallback, VerificationCallbacks},
    error::AgeKitError,
    http_request::Transport,
    page::{Page, RenderTarget},
    state::FailureReason,
};

/// The configuration record a host passes to
/// [`VerificationClient::configure`](crate::VerificationClient::configure).
///
/// Every field is optional at the type level so that validation can report the first missing
/// required field, in the same order for every host.
///
/// Required: `api_key`, `qr_container_selector` and all six callbacks.
#[derive(Clone, Default)]
pub struct VerificationOptions {
    /// Credential sent as `x-api-key` on every request.
    pub api_key: Option<String>,
    /// Selector of the element the QR code and the states are rendered into.
    pub qr_container_selector: Option<String>,
    /// Selector of the element responses are logged into.
    pub log_container_selector: Option<String>,
    /// Base URL of the verification service. Defaults to the production endpoint.
    pub api_base_url: Option<String>,
    /// Fired once the holder is approved.
    pub on_verification_success: Option<Callback>,
    /// Fired on unknown states, service errors and transport failures.
    pub on_verification_failure: Option<FailureCallback>,
    /// Fired while the QR code is being scanned.
    pub on_verification_scanning: Option<Callback>,
    /// Fired when the holder declines.
    pub on_verification_rejected_by_user: Option<Callback>,
    /// Fired when the holder does not meet the host's requirements.
    pub on_verification_rejected_by_requirements: Option<Callback>,
    /// Fired when the QR code expires.
    pub on_verification_timeout: Option<Callback>,
    /// Time between two status checks.
    pub poll_interval: Option<Duration>,
    /// Upper bound for a single request.
    pub request_timeout: Option<Duration>,
    /// Retries for the QR code generation request.
    pub max_retries: Option<u32>,
}

impl VerificationOptions {
    /// Creates an empty configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the API key.
    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Sets the QR container selector.
    #[must_use]
    pub fn with_qr_container_selector(mut self, selector: impl Into<String>) -> Self {
        self.qr_container_selector = Some(selector.into());
        self
    }

    /// Sets the log container selector.
    #[must_use]
    pub fn with_log_container_selector(mut self, selector: impl Into<String>) -> Self {
        self.log_container_selector = Some(selector.into());
        self
    }

    /// Overrides the verification service base URL.
    #[must_use]
    pub fn with_api_base_url(mut self, api_base_url: impl Into<String>) -> Self {
        self.api_base_url = Some(api_base_url.into());
        self
    }

    /// Sets the success callback.
    #[must_use]
    pub fn on_success(mut self, callback: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_verification_success = Some(Arc::new(callback));
        self
    }

    /// Sets the failure callback.
    #[must_use]
    pub fn on_failure(
        mut self,
        callback: impl Fn(&FailureReason) + Send + Sync + 'static,
    ) -> Self {
        self.on_verification_failure = Some(Arc::new(callback));
        self
    }

    /// Sets the scanning callback.
    #[must_use]
    pub fn on_scanning(mut self, callback: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_verification_scanning = Some(Arc::new(callback));
        self
    }

    /// Sets the user-rejection callback.
    #[must_use]
    pub fn on_rejected_by_user(
        mut self,
        callback: impl Fn() + Send + Sync + 'static,
    ) -> Self {
        self.on_verification_rejected_by_user = Some(Arc::new(callback));
        self
    }

    /// Sets the requirement-rejection callback.
    #[must_use]
    pub fn on_rejected_by_requirements(
        mut self,
        callback: impl Fn() + Send + Sync + 'static,
    ) -> Self {
        self.on_verification_rejected_by_requirements = Some(Arc::new(callback));
        self
    }

    /// Sets the timeout callback.
    #[must_use]
    pub fn on_timeout(mut self, callback: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_verification_timeout = Some(Arc::new(callback));
        self
    }

    /// Overrides the time between two status checks.
    #[must_use]
    pub const fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = Some(poll_interval);
        self
    }

    /// Overrides the per-request timeout.
    #[must_use]
    pub const fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = Some(request_timeout);
        self
    }

    /// Overrides the number of retries of the generation request.
    #[must_use]
    pub const fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Validates the configuration and resolves its selectors on `page`.
    ///
    /// # Errors
    /// - [`AgeKitError::Configuration`] naming the first missing required field.
    /// - [`AgeKitError::InvalidTarget`] if the QR container selector matches nothing.
    pub(crate) fn into_session(self, page: &dyn Page) -> Result<Session, AgeKitError> {
        let api_key = required("apiKey", self.api_key.filter(|key| !key.is_empty()))?;
        let qr_container_selector = required(
            "qrContainerSelector",
            self.qr_container_selector
                .filter(|selector| !selector.is_empty()),
        )?;
        let callbacks = VerificationCallbacks {
            on_success: required("onVerificationSuccess", self.on_verification_success)?,
            on_failure: required("onVerificationFailure", self.on_verification_failure)?,
            on_scanning: required("onVerificationScanning", self.on_verification_scanning)?,
            on_rejected_by_user: required(
                "onVerificationRejectedByUser",
                self.on_verification_rejected_by_user,
            )?,
            on_rejected_by_requirements: required(
                "onVerificationRejectedByRequirements",
                self.on_verification_rejected_by_requirements,
            )?,
            on_timeout: required("onVerificationTimeout", self.on_verification_timeout)?,
        };

        let poll_interval = self.poll_interval.unwrap_or(POLLING_INTERVAL);
        if poll_interval.is_zero() {
            return Err(AgeKitError::Configuration {
                field: "pollInterval",
            });
        }

        let render_target = page.query_selector(&qr_container_selector).ok_or_else(|| {
            AgeKitError::InvalidTarget {
                selector: qr_container_selector.clone(),
            }
        })?;
        let log_target = self
            .log_container_selector
            .as_deref()
            .and_then(|selector| page.query_selector(selector));

        let api_base_url = self
            .api_base_url
            .filter(|url| !url.is_empty())
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(Session {
            api_key: SecretString::from(api_key),
            api_base_url,
            render_target,
            callbacks,
            poll_interval,
            transport: Transport::new(
                self.request_timeout.unwrap_or(REQUEST_TIMEOUT),
                self.max_retries.unwrap_or(GENERATION_MAX_RETRIES),
                log_target,
            ),
        })
    }
}

fn required<T>(field: &'static str, value: Option<T>) -> Result<T, AgeKitError> {
    value.ok_or(AgeKitError::Configuration { field })
}

impl fmt::Debug for VerificationOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerificationOptions")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("qr_container_selector", &self.qr_container_selector)
            .field("log_container_selector", &self.log_container_selector)
            .field("api_base_url", &self.api_base_url)
            .field("poll_interval", &self.poll_interval)
            .field("request_timeout", &self.request_timeout)
            .field("max_retries", &self.max_retries)
            .finish_non_exhaustive()
    }
}

/// The validated, immutable configuration every operation reads.
pub(crate) struct Session {
    api_key: SecretString,
    pub(crate) api_base_url: String,
    pub(crate) render_target: Arc<dyn RenderTarget>,
    pub(crate) callbacks: VerificationCallbacks,
    pub(crate) poll_interval: Duration,
    pub(crate) transport: Transport,
}

impl Session {
    /// The API key, only exposed to build request headers.
    pub(crate) fn api_key(&self) -> &str {
        self.api_key.expose_secret()
    }

    /// Joins `endpoint` onto the configured base URL.
    pub(crate) fn build_url(&self, endpoint: &str) -> String {
        format!("{}{endpoint}", self.api_base_url)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use test_case::test_case;

    use super::*;
    use crate::{log_entry::LogEntry, renderer::View};

    struct NullTarget;

    impl RenderTarget for NullTarget {
        fn replace_content(&self, _view: View) {}
        fn prepend_entry(&self, _entry: LogEntry) {}
    }

    struct FakePage {
        elements: HashMap<&'static str, Arc<dyn RenderTarget>>,
    }

    impl FakePage {
        fn with(selectors: &[&'static str]) -> Self {
            Self {
                elements: selectors
                    .iter()
                    .map(|selector| (*selector, Arc::new(NullTarget) as Arc<dyn RenderTarget>))
                    .collect(),
            }
        }
    }

    impl Page for FakePage {
        fn query_selector(&self, selector: &str) -> Option<Arc<dyn RenderTarget>> {
            self.elements.get(selector).cloned()
        }

        fn navigate(&self, _url: &str) {}
    }

    fn complete_options() -> VerificationOptions {
        VerificationOptions::new()
            .with_api_key("key-123")
            .with_qr_container_selector("#qr")
            .on_success(|| {})
            .on_failure(|_| {})
            .on_scanning(|| {})
            .on_rejected_by_user(|| {})
            .on_rejected_by_requirements(|| {})
            .on_timeout(|| {})
    }

    fn field_of(result: Result<Session, AgeKitError>) -> &'static str {
        match result {
            Err(AgeKitError::Configuration { field }) => field,
            Err(other) => panic!("Expected Configuration error, got: {other:?}"),
            Ok(_) => panic!("Expected Configuration error, got a session"),
        }
    }

    #[test_case(|o| o.api_key = None, "apiKey" ; "api key")]
    #[test_case(|o| o.api_key = Some(String::new()), "apiKey" ; "empty api key")]
    #[test_case(|o| o.qr_container_selector = None, "qrContainerSelector" ; "container")]
    #[test_case(|o| o.on_verification_success = None, "onVerificationSuccess" ; "success")]
    #[test_case(|o| o.on_verification_failure = None, "onVerificationFailure" ; "failure")]
    #[test_case(|o| o.on_verification_scanning = None, "onVerificationScanning" ; "scanning")]
    #[test_case(|o| o.on_verification_rejected_by_user = None, "onVerificationRejectedByUser" ; "rejected by user")]
    #[test_case(
        |o| o.on_verification_rejected_by_requirements = None,
        "onVerificationRejectedByRequirements" ;
        "rejected by requirements"
    )]
    #[test_case(|o| o.on_verification_timeout = None, "onVerificationTimeout" ; "timeout")]
    fn test_missing_field_is_reported(strip: fn(&mut VerificationOptions), field: &str) {
        let mut options = complete_options();
        strip(&mut options);

        let result = options.into_session(&FakePage::with(&["#qr"]));

        assert_eq!(field_of(result), field);
    }

    #[test]
    fn test_first_missing_field_wins() {
        let options = VerificationOptions::new()
            .on_success(|| {})
            .with_qr_container_selector("#qr");
        assert_eq!(
            field_of(options.into_session(&FakePage::with(&["#qr"]))),
            "apiKey"
        );

        let options = VerificationOptions::new()
            .with_api_key("key")
            .with_qr_container_selector("#qr")
            .on_success(|| {});
        assert_eq!(
            field_of(options.into_session(&FakePage::with(&["#qr"]))),
            "onVerificationFailure"
        );
    }

    #[test]
    fn test_missing_fields_are_reported_before_target_resolution() {
        let options = VerificationOptions::new()
            .with_api_key("key")
            .with_qr_container_selector("#missing");

        assert_eq!(
            field_of(options.into_session(&FakePage::with(&[]))),
            "onVerificationSuccess"
        );
    }

    #[test]
    fn test_unresolvable_container_is_invalid_target() {
        let result = complete_options().into_session(&FakePage::with(&["#other"]));

        match result {
            Err(AgeKitError::InvalidTarget { selector }) => assert_eq!(selector, "#qr"),
            Err(other) => panic!("Expected InvalidTarget, got: {other:?}"),
            Ok(_) => panic!("Expected InvalidTarget, got a session"),
        }
    }

    #[test]
    fn test_zero_poll_interval_is_rejected() {
        let result = complete_options()
            .with_poll_interval(Duration::ZERO)
            .into_session(&FakePage::with(&["#qr"]));

        assert_eq!(field_of(result), "pollInterval");
    }

    #[test]
    fn test_defaults_are_applied() {
        let session = complete_options()
            .with_log_container_selector("#logs-not-on-page")
            .into_session(&FakePage::with(&["#qr"]))
            .unwrap();

        assert_eq!(session.api_key(), "key-123");
        assert_eq!(session.api_base_url, DEFAULT_API_BASE_URL);
        assert_eq!(session.poll_interval, POLLING_INTERVAL);
        assert_eq!(
            session.build_url("/users/v1/age-verification"),
            "https://api.chainit.online/users/v1/age-verification"
        );
    }

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let session = complete_options()
            .with_api_base_url("http://localhost:8080/")
            .into_session(&FakePage::with(&["#qr"]))
            .unwrap();

        assert_eq!(session.build_url("/status"), "http://localhost:8080/status");
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let rendered = format!("{:?}", complete_options());
        assert!(!rendered.contains("key-123"));
        assert!(rendered.contains("<redacted>"));
    }
}
