// Entrypoint for the CLI fetcher.
// - Resolves credentials once, builds one request, prints one result.
// - Exit codes: 1 missing credential, 2 bad param or path, 3 HTTP error,
//   4 network error, 5 certificate verification failure.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use rebrick::api::{is_certificate_error, ssl_fix_hint};
use rebrick::{request, ApiClient, ApiError, Credentials};

/// Fetch JSON data from the Rebrickable V3 API.
#[derive(Parser)]
#[command(name = "rebrick")]
#[command(version)]
#[command(about = "Fetch JSON data from the Rebrickable V3 API")]
struct Cli {
    /// API path after /api/v3, e.g. 'lego/sets/10270-1/' or 'lego/sets/'
    path: String,

    /// Query parameters in key=value form (repeatable)
    #[arg(long = "param", value_name = "KEY=VALUE")]
    param: Vec<String>,

    /// Optional path to save JSON output
    #[arg(long, value_name = "FILE")]
    save: Option<PathBuf>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let credentials = match Credentials::resolve() {
        Ok(credentials) => credentials,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::from(1);
        }
    };

    let params = match request::parse_params(&cli.param) {
        Ok(params) => params,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::from(2);
        }
    };

    let api = match ApiClient::new() {
        Ok(api) => api,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::from(4);
        }
    };

    let response = match api.fetch(&cli.path, &params, &credentials) {
        Ok(response) => response,
        Err(e) => {
            if is_certificate_error(&e) {
                eprintln!("{}", ssl_fix_hint());
                return ExitCode::from(5);
            }
            eprintln!("{e}");
            return match e {
                ApiError::MissingCredential => ExitCode::from(1),
                ApiError::MalformedParameter(_) => ExitCode::from(2),
                ApiError::Http { .. } => ExitCode::from(3),
                ApiError::Network(_) => ExitCode::from(4),
            };
        }
    };

    // Pretty-print when the body is JSON (serde_json's map keeps keys
    // sorted); otherwise pass the raw body through untouched.
    let output = match serde_json::from_str::<serde_json::Value>(&response.body) {
        Ok(value) => serde_json::to_string_pretty(&value).unwrap_or(response.body),
        Err(_) => response.body,
    };

    if let Some(save) = &cli.save {
        if let Err(e) = fs::write(save, &output) {
            eprintln!("Failed to save output to {}: {e}", save.display());
            return ExitCode::FAILURE;
        }
        println!("Saved response to {}", save.display());
    } else {
        println!("{output}");
    }

    ExitCode::SUCCESS
}
