// Library root
// -----------
// This crate exposes a small library surface shared by the two binaries:
// the `rebrick` CLI fetcher and the `rebrick-web` lookup page.
//
// Module responsibilities:
// - `config`: Resolves credentials from the environment and an optional
//   `.env`-style settings file (environment always wins).
// - `request`: Builds authenticated request descriptors from a resource
//   path and repeatable `key=value` parameters.
// - `api`: Executes a descriptor with a blocking HTTP client and classifies
//   the outcome.
// - `error`: The closed failure taxonomy shared by all of the above.
//
// Keeping this separation means both front ends go through exactly the same
// resolve -> build -> execute path, and the core stays testable against a
// stub HTTP server.
pub mod api;
pub mod config;
pub mod error;
pub mod request;

pub use api::{ApiClient, ApiResponse};
pub use config::Credentials;
pub use error::{ApiError, Result};
pub use request::RequestDescriptor;
