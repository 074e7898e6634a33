// API client module: a small blocking HTTP client that executes one
// authenticated GET against the Rebrickable V3 API per invocation. No
// retries, no timeout override beyond the transport default; callers that
// need resilience wrap this client themselves.

use reqwest::blocking::Client;
use reqwest::header::ACCEPT;

use crate::config::Credentials;
use crate::error::{ApiError, Result};
use crate::request::{RequestDescriptor, BASE_URL};

/// Raw outcome of a successful call: the status code and the unmodified
/// response body. Parsing or reshaping the JSON is the renderer's job.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

/// Holds the verifying reqwest client and the API base URL. When a
/// descriptor asks for the trust override, a one-off insecure client is
/// built for that single call and dropped afterwards, so the override never
/// leaks into later calls.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    /// Create a client targeting the real Rebrickable API.
    pub fn new() -> Result<Self> {
        Self::with_base_url(BASE_URL)
    }

    /// Create a client targeting an alternate base URL (stub servers in
    /// tests).
    pub fn with_base_url(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| ApiError::Network(e.without_url().to_string()))?;
        Ok(ApiClient {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build a descriptor for `path` + `params` and execute it. Mirrors the
    /// common resolve-build-execute flow for callers that hold Credentials.
    pub fn fetch(
        &self,
        path: &str,
        params: &[(String, String)],
        credentials: &Credentials,
    ) -> Result<ApiResponse> {
        let request = RequestDescriptor::build(&self.base_url, path, params, credentials)?;
        self.execute(&request)
    }

    /// Issue the single GET described by `request` and classify the outcome.
    pub fn execute(&self, request: &RequestDescriptor) -> Result<ApiResponse> {
        tracing::debug!(path = request.path(), "issuing GET request");

        // The insecure client is scoped to this one call.
        let insecure;
        let client = if request.skip_ssl_verify() {
            insecure = Client::builder()
                .danger_accept_invalid_certs(true)
                .build()
                .map_err(|e| ApiError::Network(e.without_url().to_string()))?;
            &insecure
        } else {
            &self.client
        };

        let response = client
            .get(request.url().clone())
            .header(ACCEPT, "application/json")
            .send()
            .map_err(|e| ApiError::Network(e.without_url().to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .map_err(|e| ApiError::Network(e.without_url().to_string()))?;

        if !status.is_success() {
            return Err(ApiError::Http {
                status: status.as_u16(),
                body,
            });
        }

        Ok(ApiResponse {
            status: status.as_u16(),
            body,
        })
    }
}

/// Guidance shown when certificate verification fails, naming the explicit
/// trust-override workaround.
pub fn ssl_fix_hint() -> &'static str {
    "SSL certificate verification failed. Fix your local certificate store \
     (on macOS, run the 'Install Certificates.command' that ships with your \
     toolchain). Temporary workaround: set REBRICKABLE_SKIP_SSL_VERIFY=1."
}

/// Heuristic for rendering the hint above: does this failure look like a
/// certificate problem?
pub fn is_certificate_error(error: &ApiError) -> bool {
    match error {
        ApiError::Network(detail) => {
            let detail = detail.to_ascii_lowercase();
            detail.contains("certificate") || detail.contains("self signed")
        }
        _ => false,
    }
}
