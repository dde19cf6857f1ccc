use std::time::Duration;

/// Production endpoint of the verification service.
pub const DEFAULT_API_BASE_URL: &str = "https://api.chainit.online";

/// Path of the QR code generation endpoint, relative to the API base URL.
pub const GENERATE_QR_CODE_ENDPOINT: &str = "/users/v1/age-verification";

/// Header carrying the API key on every request.
pub const API_KEY_HEADER_NAME: &str = "x-api-key";

/// Time between two status checks of the same QR code.
pub const POLLING_INTERVAL: Duration = Duration::from_secs(10);

/// Delay before navigating away after an approval or a rejection.
pub const REDIRECT_DELAY: Duration = Duration::from_secs(10);

/// Upper bound for a single request to the verification service.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Retries for the QR code generation request (total attempts = 3).
pub const GENERATION_MAX_RETRIES: u32 = 2;

/// Selector of the QR container used by the embedded widget.
pub const EMBED_QR_CONTAINER_SELECTOR: &str = "#bit-age-verification-qr";

/// Selector of the log container used by the embedded widget.
pub const EMBED_LOG_CONTAINER_SELECTOR: &str = "#bit-age-verification-logs";
