// Web front end: a single lookup form that maps a part number onto the
// `lego/parts/{id}/` resource template and renders the fetch result.
//
// Credentials are resolved once at startup and shared read-only across
// handlers; every incoming lookup builds its own request descriptor and
// executes its own call, so concurrent lookups share no mutable state. The
// blocking HTTP client runs on the blocking thread pool.

use std::sync::Arc;

use anyhow::Context as _;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use clap::Parser;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tera::Tera;
use tracing_subscriber::EnvFilter;

use rebrick::api::{is_certificate_error, ssl_fix_hint};
use rebrick::{ApiClient, ApiError, Credentials};

// Embed the template at compile time so the binary is self-contained.
const TPL_LOOKUP: &str = include_str!("../../templates/lookup.html");

/// Serve the Rebrickable part lookup page.
#[derive(Parser)]
#[command(name = "rebrick-web")]
#[command(version)]
#[command(about = "Serve a local Rebrickable part lookup page")]
struct Cli {
    /// Address to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on
    #[arg(long, default_value_t = 8000)]
    port: u16,
}

struct AppState {
    credentials: Credentials,
    api: ApiClient,
    templates: Tera,
}

#[derive(Deserialize)]
struct LookupQuery {
    part_num: Option<String>,
}

/// Fields extracted from the part payload for the details table. All values
/// are pre-formatted strings; empty means "omit the row".
#[derive(Serialize)]
struct PartView {
    part_num: String,
    name: String,
    category: String,
    part_url: String,
    print_of: String,
    part_material: String,
    year_from: String,
    year_to: String,
    img_url: String,
    external_ids: Vec<ExternalLink>,
    colors: Vec<ColorRow>,
    raw_json: String,
}

#[derive(Serialize)]
struct ExternalLink {
    source: String,
    id: String,
    url: String,
}

#[derive(Serialize)]
struct ColorRow {
    id: String,
    name: String,
    rgb: String,
    rgb_raw: String,
    url: String,
    num_sets: String,
    num_parts: String,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    // The blocking reqwest client must not be constructed on the async
    // runtime, so credentials and the client are resolved before it starts.
    // Inside handlers the client only ever runs under spawn_blocking.
    let credentials = Credentials::resolve().context("resolving Rebrickable credentials")?;
    let api = ApiClient::new().context("building HTTP client")?;
    let state = build_state(credentials, api)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("starting async runtime")?;
    runtime.block_on(serve(cli, state))
}

fn build_state(credentials: Credentials, api: ApiClient) -> anyhow::Result<Arc<AppState>> {
    let mut templates = Tera::default();
    templates
        .add_raw_template("lookup.html", TPL_LOOKUP)
        .context("loading lookup template")?;
    Ok(Arc::new(AppState {
        credentials,
        api,
        templates,
    }))
}

async fn serve(cli: Cli, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = Router::new().route("/", get(lookup)).with_state(state);

    let addr = format!("{}:{}", cli.host, cli.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!("Serving on http://{addr}");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn lookup(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LookupQuery>,
) -> Response {
    let part_num = query.part_num.unwrap_or_default().trim().to_string();

    let mut context = tera::Context::new();
    context.insert("part_num", &part_num);

    if !part_num.is_empty() {
        // Reserved URL characters would escape the lego/parts/{id}/ template.
        if part_num.contains(['/', '?', '#']) {
            context.insert("error", "Part numbers must not contain '/', '?' or '#'.");
        } else {
            let worker = state.clone();
            let requested = part_num.clone();
            let outcome =
                tokio::task::spawn_blocking(move || fetch_part_view(&worker, &requested)).await;
            match outcome {
                Ok(Ok(view)) => context.insert("part", &view),
                Ok(Err(e)) => {
                    let detail = if is_certificate_error(&e) {
                        ssl_fix_hint().to_string()
                    } else {
                        e.to_string()
                    };
                    context.insert("error", &format!("Failed to fetch data: {detail}"));
                }
                Err(e) => {
                    tracing::error!("lookup task failed: {e}");
                    context.insert("error", "Internal error while fetching part data.");
                }
            }
        }
    }

    match state.templates.render("lookup.html", &context) {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            tracing::error!("template rendering failed: {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, "template error").into_response()
        }
    }
}

/// Fetch the part and its color list, then flatten both payloads into
/// template-ready strings.
fn fetch_part_view(state: &AppState, part_num: &str) -> Result<PartView, ApiError> {
    let part_body = state
        .api
        .fetch(&format!("lego/parts/{part_num}/"), &[], &state.credentials)?
        .body;
    let part: Value = serde_json::from_str(&part_body)
        .map_err(|e| ApiError::Network(format!("unexpected payload: {e}")))?;

    let colors_body = state
        .api
        .fetch(
            &format!("lego/parts/{part_num}/colors/"),
            &[],
            &state.credentials,
        )?
        .body;
    let colors: Value = serde_json::from_str(&colors_body)
        .map_err(|e| ApiError::Network(format!("unexpected payload: {e}")))?;

    Ok(part_view(&part, &colors))
}

fn part_view(part: &Value, colors: &Value) -> PartView {
    let part_url = field_text(part, "part_url");

    PartView {
        part_num: field_text(part, "part_num"),
        name: field_text(part, "name"),
        category: part
            .get("part_cat")
            .and_then(|cat| cat.get("name"))
            .map(fmt_value)
            .unwrap_or_default(),
        part_url: part_url.clone(),
        print_of: field_text(part, "print_of"),
        part_material: field_text(part, "part_material"),
        year_from: field_text(part, "year_from"),
        year_to: field_text(part, "year_to"),
        img_url: field_text(part, "part_img_url"),
        external_ids: external_links(part),
        colors: color_rows(colors, &part_url),
        raw_json: serde_json::to_string_pretty(part).unwrap_or_default(),
    }
}

/// Format a JSON value the way the page shows it: nulls vanish, booleans
/// become Yes/No, arrays are comma-joined.
fn fmt_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => if *b { "Yes" } else { "No" }.to_string(),
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => items.iter().map(fmt_value).collect::<Vec<_>>().join(", "),
        Value::Object(_) => serde_json::to_string(value).unwrap_or_default(),
    }
}

fn field_text(entry: &Value, key: &str) -> String {
    entry.get(key).map(fmt_value).unwrap_or_default()
}

fn external_links(part: &Value) -> Vec<ExternalLink> {
    let Some(external_ids) = part.get("external_ids").and_then(Value::as_object) else {
        return Vec::new();
    };

    let mut links = Vec::new();
    for (source, raw_ids) in external_ids {
        let ids: Vec<String> = match raw_ids {
            Value::Array(items) => items.iter().map(fmt_value).collect(),
            other => vec![fmt_value(other)],
        };
        for id in ids.into_iter().filter(|id| !id.is_empty()) {
            let url = external_url(source, &id).unwrap_or_default();
            links.push(ExternalLink {
                source: source.clone(),
                id,
                url,
            });
        }
    }
    links
}

/// Known catalog URL templates for external part IDs. Unknown sources render
/// as plain text.
fn external_url(source: &str, ext_id: &str) -> Option<String> {
    match source.trim().to_ascii_lowercase().as_str() {
        "bricklink" => Some(format!(
            "https://www.bricklink.com/v2/catalog/catalogitem.page?P={ext_id}"
        )),
        "brickowl" => Some(format!("https://www.brickowl.com/catalog/lego-part-{ext_id}")),
        "lego" => Some(format!(
            "https://www.lego.com/en-us/pick-and-build/pick-a-brick?query={ext_id}"
        )),
        "ldraw" => Some(format!(
            "https://library.ldraw.org/library/unofficial/{ext_id}.dat"
        )),
        "brickset" => Some(format!("https://brickset.com/parts/design-{ext_id}")),
        _ => None,
    }
}

fn color_rows(colors: &Value, part_url: &str) -> Vec<ColorRow> {
    let Some(results) = colors.get("results").and_then(Value::as_array) else {
        return Vec::new();
    };

    let part_url = part_url.trim_end_matches('/');
    let mut rows = Vec::new();
    for entry in results {
        if !entry.is_object() {
            continue;
        }

        let id = color_field(entry, "id");
        let name = color_field(entry, "name");
        let rgb_raw = color_field(entry, "rgb");
        let num_sets = first_present(entry, &["num_sets", "sets", "set_count"]);
        let num_parts = first_present(
            entry,
            &["num_parts", "parts", "part_count", "quantity", "num_set_parts"],
        );

        if id.is_empty() && name.is_empty() && rgb_raw.is_empty() {
            continue;
        }

        let url = if !part_url.is_empty() && !id.is_empty() && !name.is_empty() {
            format!("{part_url}/{id}/")
        } else {
            String::new()
        };

        rows.push(ColorRow {
            rgb: normalize_rgb(&rgb_raw),
            id,
            name,
            rgb_raw,
            url,
            num_sets,
            num_parts,
        });
    }
    rows
}

/// Best-effort extraction for color fields across the payload shapes the API
/// has been seen to return: flat fields, a nested `color` object, and a few
/// alias key names.
fn color_field(entry: &Value, field: &str) -> String {
    let direct = field_text(entry, field);
    if !direct.is_empty() {
        return direct;
    }

    if let Some(nested) = entry.get("color") {
        let nested_value = field_text(nested, field);
        if !nested_value.is_empty() {
            return nested_value;
        }
    }

    let aliases: &[&str] = match field {
        "id" => &["color_id", "id_color", "colour_id"],
        "name" => &["color_name", "colour_name"],
        "rgb" => &["color_rgb", "rgb_hex", "hex", "colour_rgb"],
        _ => &[],
    };
    first_present(entry, aliases)
}

fn first_present(entry: &Value, keys: &[&str]) -> String {
    keys.iter()
        .map(|key| field_text(entry, key))
        .find(|value| !value.is_empty())
        .unwrap_or_default()
}

/// Normalize an RGB string to six uppercase hex digits for the swatch, or
/// empty when it cannot be one.
fn normalize_rgb(value: &str) -> String {
    let rgb = value.trim().trim_start_matches('#');
    let expanded = if rgb.len() == 3 {
        rgb.chars().flat_map(|c| [c, c]).collect::<String>()
    } else {
        rgb.to_string()
    };
    if expanded.len() != 6 || !expanded.chars().all(|c| c.is_ascii_hexdigit()) {
        return String::new();
    }
    expanded.to_ascii_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn normalize_rgb_expands_short_form() {
        assert_eq!(normalize_rgb("#fff"), "FFFFFF");
        assert_eq!(normalize_rgb("05131D"), "05131D".to_string());
        assert_eq!(normalize_rgb("not-a-color"), "");
        assert_eq!(normalize_rgb(""), "");
    }

    #[test]
    fn color_field_reads_flat_nested_and_alias_shapes() {
        let flat = json!({"id": 4, "name": "Red", "rgb": "C91A09"});
        assert_eq!(color_field(&flat, "id"), "4");
        assert_eq!(color_field(&flat, "rgb"), "C91A09");

        let nested = json!({"color": {"id": 15, "name": "White"}});
        assert_eq!(color_field(&nested, "name"), "White");

        let aliased = json!({"color_id": 0, "colour_name": "Black"});
        assert_eq!(color_field(&aliased, "id"), "0");
        assert_eq!(color_field(&aliased, "name"), "Black");
    }

    #[test]
    fn part_view_flattens_payload_fields() {
        let part = json!({
            "part_num": "3001",
            "name": "Brick 2 x 4",
            "part_cat": {"name": "Bricks"},
            "part_url": "https://rebrickable.com/parts/3001/",
            "year_from": 1961,
            "external_ids": {"BrickLink": ["3001"], "Unknown": "x1"}
        });
        let colors = json!({"results": [
            {"id": 4, "name": "Red", "rgb": "C91A09", "num_sets": 3300, "num_parts": 14000}
        ]});

        let view = part_view(&part, &colors);
        assert_eq!(view.part_num, "3001");
        assert_eq!(view.category, "Bricks");
        assert_eq!(view.year_from, "1961");
        assert_eq!(view.year_to, "");

        let bricklink = view
            .external_ids
            .iter()
            .find(|link| link.source == "BrickLink")
            .unwrap();
        assert!(bricklink.url.contains("bricklink.com"));
        let unknown = view
            .external_ids
            .iter()
            .find(|link| link.source == "Unknown")
            .unwrap();
        assert_eq!(unknown.url, "");

        assert_eq!(view.colors.len(), 1);
        assert_eq!(view.colors[0].rgb, "C91A09");
        assert_eq!(view.colors[0].url, "https://rebrickable.com/parts/3001/4/");
    }

    #[test]
    fn fmt_value_renders_nulls_and_booleans() {
        assert_eq!(fmt_value(&json!(null)), "");
        assert_eq!(fmt_value(&json!(true)), "Yes");
        assert_eq!(fmt_value(&json!([1, 2])), "1, 2");
    }

    fn test_state(api: ApiClient) -> Arc<AppState> {
        build_state(Credentials::new("test-key", false).unwrap(), api).unwrap()
    }

    fn test_runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .unwrap()
    }

    async fn render(state: Arc<AppState>, part_num: Option<&str>) -> (StatusCode, String) {
        let query = LookupQuery {
            part_num: part_num.map(str::to_string),
        };
        let response = lookup(State(state), Query(query)).await;
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    // Startup mirror: the blocking client is built before the runtime
    // exists, and the handler then runs on that runtime. Building the
    // client inside the runtime instead panics reqwest's blocking layer.
    #[test]
    fn state_is_built_before_the_runtime_and_serves_the_form() {
        let state = test_state(ApiClient::new().unwrap());

        let (status, page) = test_runtime().block_on(render(state, None));
        assert_eq!(status, StatusCode::OK);
        assert!(page.contains("Rebrickable Part Lookup"));
    }

    #[test]
    fn part_numbers_with_reserved_characters_are_rejected() {
        // An unroutable base URL: a rejected part number must never reach
        // the fetch path at all.
        let state = test_state(ApiClient::with_base_url("http://127.0.0.1:9").unwrap());
        let runtime = test_runtime();

        for part_num in ["30/01", "3001?x=1", "3001#frag"] {
            let (status, page) = runtime.block_on(render(state.clone(), Some(part_num)));
            assert_eq!(status, StatusCode::OK);
            assert!(page.contains("must not contain"), "part_num {part_num}");
            assert!(!page.contains("network error"), "part_num {part_num}");
        }
    }
}
