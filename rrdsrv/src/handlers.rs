use axum::{
    extract::{RawQuery, State},
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Json, Response},
};
use rrdsrv_core::{sanitize_xport, SanitizeError};
use serde_json::json;
use tracing::{debug, error, info, warn};

use crate::AppState;

const INDEX_HTML: &str = r#"<html>
<body>
<style> a { text-decoration: none }</style>

<h1>rrdsrv</h1>

API:

<ul>
  <li><a href="/api/v1/ping">/api/v1/ping</a></li>
  <li><a href="/api/v1/xport">/api/v1/xport?q=$query[&amp;format=$format&amp;start=$start&amp;end=$end&amp;step=$step]</a></li>
</ul>

Make an export query:

<form action="/api/v1/xport" accept-charset="UTF-8">
  <textarea name="q" cols="80" rows="3"></textarea>
  <br>
  <button type="submit">export</button>
</form>

</body>
</html>
"#;

/// Landing page with a manual query form
pub async fn index_handler() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// Liveness endpoint
pub async fn ping_handler(headers: HeaderMap) -> Json<serde_json::Value> {
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-");
    info!(user_agent, "got ping");
    Json(json!("pong"))
}

/// Requested output format of the export
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Json,
    Xml,
}

impl OutputFormat {
    fn content_type(self) -> &'static str {
        match self {
            OutputFormat::Json => "application/json; charset=utf8",
            OutputFormat::Xml => "application/xml; charset=utf8",
        }
    }
}

/// Parsed query-string parameters of an xport request
#[derive(Debug)]
struct XportParams {
    query: String,
    format: OutputFormat,
    start: Option<String>,
    end: Option<String>,
    step: Option<String>,
}

type RequestError = (StatusCode, String);

fn bad_request<S: Into<String>>(message: S) -> RequestError {
    (StatusCode::BAD_REQUEST, message.into())
}

/// Parse the raw query string ourselves: axum's `Query` extractor collapses
/// repeated keys, and every repeated `q` value must survive in submitted
/// order.
fn parse_params(raw: &str) -> Result<XportParams, RequestError> {
    let mut query_parts: Vec<String> = Vec::new();
    let mut format = OutputFormat::Json;
    let mut start = None;
    let mut end = None;
    let mut step = None;

    for (key, value) in form_urlencoded::parse(raw.as_bytes()) {
        match key.as_ref() {
            "q" => query_parts.push(value.into_owned()),
            "format" => {
                format = match value.as_ref() {
                    "json" => OutputFormat::Json,
                    "xml" => OutputFormat::Xml,
                    _ => return Err(bad_request("invalid format")),
                }
            }
            "start" => start = Some(value.into_owned()),
            "end" => end = Some(value.into_owned()),
            "step" => step = Some(value.into_owned()),
            _ => {}
        }
    }

    Ok(XportParams {
        query: query_parts.join(" "),
        format,
        start,
        end,
        step,
    })
}

/// Time-range parameters are opaque rrdtool time specs, but must never be
/// readable as flags by the tool.
fn validate_time_spec(name: &str, value: &str) -> Result<(), RequestError> {
    if value.is_empty() || value.starts_with('-') {
        return Err(bad_request(format!("invalid {name}")));
    }
    Ok(())
}

/// Assemble the full rrdtool argv. Flags come only from independently
/// validated parameters, never from the sanitized query, and `--` closes
/// the flag section before the clause arguments.
fn build_args(params: &XportParams, sanitized: Vec<String>) -> Vec<String> {
    let mut args = vec!["xport".to_string()];
    if params.format == OutputFormat::Json {
        args.push("--json".to_string());
    }
    if let Some(start) = &params.start {
        args.push("--start".to_string());
        args.push(start.clone());
    }
    if let Some(end) = &params.end {
        args.push("--end".to_string());
        args.push(end.clone());
    }
    if let Some(step) = &params.step {
        args.push("--step".to_string());
        args.push(step.clone());
    }
    args.push("--".to_string());
    args.extend(sanitized);
    args
}

fn sanitize_error_response(err: SanitizeError) -> RequestError {
    if err.is_client_error() {
        warn!(category = err.category(), "rejected xport query: {err}");
        bad_request(err.to_string())
    } else {
        error!(category = err.category(), "sanitizer configuration error: {err}");
        (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
    }
}

/// Export endpoint: sanitize the query, confine its file references, run
/// rrdtool, and stream its output back.
pub async fn xport_handler(
    State(state): State<AppState>,
    RawQuery(raw): RawQuery,
) -> Result<Response, RequestError> {
    let raw = raw.unwrap_or_default();
    let params = parse_params(&raw)?;
    debug!(query = %params.query, "got xport request");

    if params.query.len() > state.config.max_query_length {
        return Err(bad_request(format!(
            "query too long: {} > {} bytes",
            params.query.len(),
            state.config.max_query_length
        )));
    }

    if let Some(start) = &params.start {
        validate_time_spec("start", start)?;
    }
    if let Some(end) = &params.end {
        validate_time_spec("end", end)?;
    }
    if let Some(step) = &params.step {
        validate_time_spec("step", step)?;
    }

    let sanitized =
        sanitize_xport(&params.query, &state.root).map_err(sanitize_error_response)?;
    if sanitized.is_empty() {
        return Err(sanitize_error_response(SanitizeError::EmptyQuery));
    }

    let args = build_args(&params, sanitized);
    info!(tool = %state.config.rrdtool_path, ?args, "running rrdtool");

    let output = tokio::process::Command::new(&state.config.rrdtool_path)
        .args(&args)
        .output()
        .await
        .map_err(|e| {
            error!("failed to launch {}: {e}", state.config.rrdtool_path);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "export tool unavailable".to_string(),
            )
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        warn!(status = ?output.status, "rrdtool rejected query");
        return Err(bad_request(stderr));
    }

    Ok((
        [(header::CONTENT_TYPE, params.format.content_type())],
        output.stdout,
    )
        .into_response())
}
