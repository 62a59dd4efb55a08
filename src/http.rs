//! HTTP front end over [`MetricService`].

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use hyped::*;
use poem::{
    get, handler,
    http::StatusCode,
    listener::TcpListener,
    middleware::AddData,
    web::{Data, Html, Json, Path, Query},
    EndpointExt, Response, Route, Server,
};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    config::Widget,
    error::{Error, Result},
    query::MetricService,
    view::{columnar_json, scatter_chart_html, tree_json},
    Reading, Time,
};

pub const DEFAULT_LOOKBACK_MINUTES: i64 = 15;
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);
const PLOTLY_JS: &str = "https://cdn.plot.ly/plotly-2.12.1.min.js";

#[derive(Debug, Clone)]
pub struct AppState {
    pub service: MetricService,
    pub dashboard: Arc<Vec<Widget>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    #[default]
    Columns,
    Tree,
}

#[derive(Debug, Default, Deserialize)]
pub struct MetricParams {
    pub min: Option<String>,
    pub max: Option<String>,
    #[serde(default)]
    pub strict: bool,
    #[serde(default)]
    pub format: Format,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChartParams {
    #[serde(default)]
    pub keys: String,
    pub min: Option<String>,
    pub max: Option<String>,
}

/// Absent means `default`; anything else must be RFC 3339.
pub fn time_param(raw: Option<&str>, default: Time) -> Result<Time> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(default),
        Some(s) => DateTime::parse_from_rfc3339(s)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|_| Error::InvalidTime { input: s.to_string() }),
    }
}

fn time_range(min: Option<&str>, max: Option<&str>) -> Result<(Time, Time)> {
    let now = Utc::now();
    let min = time_param(min, now - chrono::Duration::minutes(DEFAULT_LOOKBACK_MINUTES))?;
    let max = time_param(max, now)?;
    Ok((min, max))
}

fn status_of(e: &Error) -> StatusCode {
    match e {
        Error::InvalidTime { .. } => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn failure(context: &str, e: Error) -> poem::Error {
    let status = status_of(&e);
    if status.is_server_error() {
        error!(error = %e, "{context}");
    } else {
        warn!(error = %e, "{context}");
    }
    poem::Error::from_string(e.to_string(), status)
}

async fn readings(state: &AppState, key: &str, params: &MetricParams) -> Result<Vec<Reading>> {
    let (min, max) = time_range(params.min.as_deref(), params.max.as_deref())?;
    if params.strict {
        state.service.metric_strict(key, min, max).await
    } else {
        state.service.metric(key, min, max).await
    }
}

async fn metrics_response(
    state: &AppState,
    key: &str,
    params: MetricParams,
) -> poem::Result<Response> {
    debug!(key, ?params, "metrics request");
    let readings = readings(state, key, &params)
        .await
        .map_err(|e| failure("failed to get readings", e))?;
    let body = match params.format {
        Format::Columns => columnar_json(&readings),
        Format::Tree => tree_json(&readings),
    }
    .map_err(|e| failure("failed to create response body", e))?;
    Ok(Response::builder()
        .content_type("application/json")
        .body(body))
}

#[handler]
async fn all_metrics(
    Query(params): Query<MetricParams>,
    state: Data<&AppState>,
) -> poem::Result<Response> {
    metrics_response(&state, "", params).await
}

#[handler]
async fn metric(
    Path(key): Path<String>,
    Query(params): Query<MetricParams>,
    state: Data<&AppState>,
) -> poem::Result<Response> {
    metrics_response(&state, &key, params).await
}

#[handler]
async fn dashboard(state: Data<&AppState>) -> Json<Vec<Widget>> {
    Json(state.dashboard.as_ref().clone())
}

#[handler]
async fn chart(
    Query(params): Query<ChartParams>,
    state: Data<&AppState>,
) -> poem::Result<Html<String>> {
    let (min, max) = time_range(params.min.as_deref(), params.max.as_deref())
        .map_err(|e| failure("bad chart range", e))?;
    let mut readings = vec![];
    for key in params.keys.split(',').map(str::trim) {
        let batch = state
            .service
            .metric(key, min, max)
            .await
            .map_err(|e| failure("failed to get readings", e))?;
        readings.extend(batch);
    }
    let chart = danger(scatter_chart_html(&readings, None, None));
    let plotly = script(()).src(PLOTLY_JS);
    let root_div = div((plotly, chart));
    let body = hyped::body(root_div);
    let root = (doctype(), html(body));
    Ok(Html(render(root)))
}

pub fn routes(state: AppState) -> impl poem::Endpoint {
    Route::new()
        .at("/", get(chart))
        .at("/dashboard", get(dashboard))
        .at("/api/v1/metrics", get(all_metrics))
        .at("/api/v1/metrics/:metric", get(metric))
        .with(AddData::new(state))
}

/// Serves until `shutdown` is cancelled.
pub async fn serve(
    addr: &str,
    state: AppState,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    info!(address = addr, "start HTTP server");
    let listener = TcpListener::bind(addr.to_string());
    Server::new(listener)
        .run_with_graceful_shutdown(
            routes(state),
            async move {
                shutdown.cancelled().await;
                info!("HTTP server shutting down");
            },
            Some(SHUTDOWN_TIMEOUT),
        )
        .await
}
