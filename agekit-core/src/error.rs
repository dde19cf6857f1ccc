use thiserror::Error;

/// Error outputs from `AgeKit`
#[derive(Debug, Error)]
pub enum AgeKitError {
    /// A required configuration field is missing or empty. Fields are checked in a fixed order
    /// and only the first missing one is reported.
    #[error("configuration_error: {field} is required")]
    Configuration {
        /// Name of the first missing field, as it appears in the host configuration.
        field: &'static str,
    },
    /// The render target selector does not resolve to an element on the page.
    #[error("invalid_target: {selector} does not resolve to a render target")]
    InvalidTarget {
        /// The selector that failed to resolve.
        selector: String,
    },
    /// An operation was attempted before `configure()` succeeded.
    #[error("not_configured: you must call configure() before calling this method")]
    NotConfigured,
    /// The embedding URL could not be parsed.
    #[error("invalid_embed_url: {error}")]
    InvalidEmbedUrl {
        /// Parser error description.
        error: String,
    },
    /// The client was created outside of a Tokio runtime.
    #[error("no_runtime: the client must be created within a Tokio runtime")]
    NoRuntime,
    /// The verification service could not be reached or returned an unreadable body.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// The verification service answered, but without a field the flow depends on.
    #[error("invalid_response: missing `{field}`")]
    InvalidResponse {
        /// The missing response field.
        field: &'static str,
    },
}

/// Transport-level failure talking to the verification service.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// Network connection error with details
    #[error("network_error: {error} ({url}, status: {status:?})")]
    Network {
        /// Requested URL.
        url: String,
        /// HTTP status, when a response was received.
        status: Option<u16>,
        /// Error description.
        error: String,
    },
    /// The response body was not valid JSON.
    #[error("decode_error: {error} ({url})")]
    Decode {
        /// Requested URL.
        url: String,
        /// Error description.
        error: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_error_names_field() {
        let err = AgeKitError::Configuration { field: "apiKey" };
        assert_eq!(err.to_string(), "configuration_error: apiKey is required");
    }
}
