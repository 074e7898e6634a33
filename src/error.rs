// Error taxonomy for the fetcher core. Every API call resolves to exactly
// one success or one of these classified failures; nothing is swallowed.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    /// No API key could be resolved from the environment or the settings
    /// file. Detected before any network I/O.
    #[error("REBRICKABLE_API_KEY is not set (environment or settings file)")]
    MissingCredential,

    /// Bad caller input while constructing the request: a `--param` without
    /// `=`, an empty key, or a resource path that could redirect the host.
    /// Detected before any network I/O.
    #[error("{0}")]
    MalformedParameter(String),

    /// The call never reached the service: connection refused, DNS failure,
    /// or a TLS handshake failure with verification enabled. The detail
    /// string has the request URL stripped so the token cannot leak.
    #[error("network error: {0}")]
    Network(String),

    /// The service answered with a non-2xx status. Carries the status and
    /// the raw body for the caller to render.
    #[error("HTTP error {status}: {body}")]
    Http { status: u16, body: String },
}

pub type Result<T> = std::result::Result<T, ApiError>;
