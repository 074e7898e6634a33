// Request construction: turns a resource path plus repeatable `key=value`
// parameters into a fully qualified, authenticated request descriptor.
// Construction is a pure function from inputs to a Result; a bad parameter
// aborts with no partial descriptor.

use reqwest::Url;
use std::fmt;

use crate::config::Credentials;
use crate::error::{ApiError, Result};

/// Root of the Rebrickable V3 API. Tests point descriptors at a stub server
/// instead by passing their own base.
pub const BASE_URL: &str = "https://rebrickable.com/api/v3";

/// Name of the query parameter carrying the API key.
const AUTH_PARAM: &str = "key";

/// One fully resolved GET request: the target URL (auth token attached) and
/// the per-call trust override. Built fresh per invocation, immutable after
/// construction, owned by exactly one caller.
#[derive(Clone)]
pub struct RequestDescriptor {
    path: String,
    params: Vec<(String, String)>,
    url: Url,
    skip_ssl_verify: bool,
}

impl RequestDescriptor {
    /// Join `path` onto `base_url`, attach the auth token as the first query
    /// parameter and append `params` in submission order (duplicates kept).
    ///
    /// The path is not validated against any schema (the remote service owns
    /// that), but it must be non-empty and must not be able to change the
    /// target host: a leading `//` or an embedded scheme is rejected.
    pub fn build(
        base_url: &str,
        path: &str,
        params: &[(String, String)],
        credentials: &Credentials,
    ) -> Result<Self> {
        if path.trim().is_empty() {
            return Err(ApiError::MalformedParameter(
                "Invalid path: must not be empty.".into(),
            ));
        }
        if path.starts_with("//") || path.contains("://") {
            return Err(ApiError::MalformedParameter(format!(
                "Invalid path '{path}': must be relative to the API root."
            )));
        }
        // Credentials::new already rejects an empty key; re-check so a
        // descriptor can never reach the network without one.
        if credentials.api_key().is_empty() {
            return Err(ApiError::MissingCredential);
        }

        let joined = format!(
            "{}/{}",
            base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        let mut url = Url::parse(&joined)
            .map_err(|e| ApiError::MalformedParameter(format!("Invalid path '{path}': {e}")))?;

        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair(AUTH_PARAM, credentials.api_key());
            for (key, value) in params {
                pairs.append_pair(key, value);
            }
        }

        Ok(RequestDescriptor {
            path: path.to_string(),
            params: params.to_vec(),
            url,
            skip_ssl_verify: credentials.skip_ssl_verify(),
        })
    }

    /// The resolved absolute URL, auth token included. Handle with care:
    /// never log or echo it.
    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Caller-supplied parameters in submission order (auth excluded).
    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    pub fn skip_ssl_verify(&self) -> bool {
        self.skip_ssl_verify
    }
}

// The resolved URL embeds the token, so Debug shows the path and parameters
// instead.
impl fmt::Debug for RequestDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestDescriptor")
            .field("path", &self.path)
            .field("params", &self.params)
            .field("skip_ssl_verify", &self.skip_ssl_verify)
            .finish()
    }
}

/// Split each `key=value` string on the first `=` only, preserving order and
/// duplicates. A string without `=` or with an empty key aborts the whole
/// list with `MalformedParameter`.
pub fn parse_params(items: &[String]) -> Result<Vec<(String, String)>> {
    let mut params = Vec::with_capacity(items.len());
    for item in items {
        let Some((key, value)) = item.split_once('=') else {
            return Err(ApiError::MalformedParameter(format!(
                "Invalid param '{item}'. Use key=value."
            )));
        };
        if key.is_empty() {
            return Err(ApiError::MalformedParameter(format!(
                "Invalid param '{item}'. Key cannot be empty."
            )));
        }
        params.push((key.to_string(), value.to_string()));
    }
    Ok(params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn creds() -> Credentials {
        Credentials::new("test-key", false).unwrap()
    }

    fn pairs(items: &[&str]) -> Vec<(String, String)> {
        parse_params(&items.iter().map(|s| s.to_string()).collect::<Vec<_>>()).unwrap()
    }

    #[test]
    fn parse_params_splits_on_first_equals_only() {
        let params = pairs(&["filter=a=b=c"]);
        assert_eq!(params, vec![("filter".to_string(), "a=b=c".to_string())]);
    }

    #[test]
    fn parse_params_preserves_order_and_duplicates() {
        let params = pairs(&["b=2", "a=1", "b=3"]);
        assert_eq!(
            params,
            vec![
                ("b".to_string(), "2".to_string()),
                ("a".to_string(), "1".to_string()),
                ("b".to_string(), "3".to_string()),
            ]
        );
    }

    #[test]
    fn parse_params_rejects_missing_equals() {
        let err = parse_params(&["oops".to_string()]).unwrap_err();
        assert!(matches!(err, ApiError::MalformedParameter(_)));
    }

    #[test]
    fn parse_params_rejects_empty_key() {
        let err = parse_params(&["=1".to_string()]).unwrap_err();
        assert!(matches!(err, ApiError::MalformedParameter(_)));
    }

    #[test]
    fn auth_token_is_the_first_query_parameter() {
        let desc =
            RequestDescriptor::build(BASE_URL, "lego/parts/3001/", &[], &creds()).unwrap();
        assert_eq!(
            desc.url().as_str(),
            "https://rebrickable.com/api/v3/lego/parts/3001/?key=test-key"
        );
    }

    #[test]
    fn caller_params_follow_the_token_in_order() {
        let params = pairs(&["inc_part_details=1", "page=2"]);
        let desc =
            RequestDescriptor::build(BASE_URL, "lego/parts/3001/", &params, &creds()).unwrap();
        assert_eq!(
            desc.url().query(),
            Some("key=test-key&inc_part_details=1&page=2")
        );
        // The descriptor keeps the caller's submission order verbatim.
        assert_eq!(desc.params(), params.as_slice());
    }

    #[test]
    fn leading_slash_is_normalized() {
        let desc = RequestDescriptor::build(BASE_URL, "/lego/sets/", &[], &creds()).unwrap();
        assert_eq!(desc.url().path(), "/api/v3/lego/sets/");
    }

    #[test]
    fn empty_path_is_rejected() {
        let err = RequestDescriptor::build(BASE_URL, "  ", &[], &creds()).unwrap_err();
        assert!(matches!(err, ApiError::MalformedParameter(_)));
    }

    #[test]
    fn host_changing_paths_are_rejected() {
        for path in ["//evil.example/x", "https://evil.example/x"] {
            let err = RequestDescriptor::build(BASE_URL, path, &[], &creds()).unwrap_err();
            assert!(matches!(err, ApiError::MalformedParameter(_)), "path {path}");
        }
    }

    #[test]
    fn trust_override_comes_from_credentials() {
        let insecure = Credentials::new("test-key", true).unwrap();
        let desc = RequestDescriptor::build(BASE_URL, "lego/sets/", &[], &insecure).unwrap();
        assert!(desc.skip_ssl_verify());

        // A descriptor built from default credentials is unaffected.
        let desc = RequestDescriptor::build(BASE_URL, "lego/sets/", &[], &creds()).unwrap();
        assert!(!desc.skip_ssl_verify());
    }

    #[test]
    fn debug_output_never_contains_the_token() {
        let desc =
            RequestDescriptor::build(BASE_URL, "lego/parts/3001/", &[], &creds()).unwrap();
        let rendered = format!("{desc:?}");
        assert!(!rendered.contains("test-key"));
    }
}
