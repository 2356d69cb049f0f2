use std::sync::Arc;

use shuttle_axum::axum::{
    body::Bytes,
    extract::{Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::CorsLayer;

use crate::engine::{EngineStatus, Published, Refused, SelectOptions};
use crate::enrich::Enrichment;
use crate::scheduler::Denial;
use crate::service::{PublishOutcome, PublishService};
use crate::types::CandidateItem;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<PublishService>,
}

impl AppState {
    pub fn new(service: PublishService) -> Self {
        Self {
            service: Arc::new(service),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/next-post", get(next_post))
        .route("/autopublish", get(autopublish).post(autopublish_post))
        .route("/publish", post(publish_item))
        .route("/status", get(status))
        .route("/ai/process", post(ai_process))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(Debug, Default, Clone, Copy, serde::Deserialize)]
struct PublishQuery {
    #[serde(default)]
    force: bool,
    #[serde(default, alias = "preferBreaking")]
    prefer_breaking: bool,
}

impl From<PublishQuery> for SelectOptions {
    fn from(q: PublishQuery) -> Self {
        SelectOptions {
            force: q.force,
            prefer_breaking: q.prefer_breaking,
        }
    }
}

impl PublishQuery {
    /// A flag set in either the query string or the body wins.
    fn merge(self, other: PublishQuery) -> Self {
        PublishQuery {
            force: self.force || other.force,
            prefer_breaking: self.prefer_breaking || other.prefer_breaking,
        }
    }
}

#[derive(serde::Serialize)]
struct PostOut {
    text: String,
    title: String,
    link: String,
    source: String,
    details: Vec<String>,
    is_breaking: bool,
    fingerprint: String,
    daily_count: u32,
    daily_limit: u32,
}

impl From<Published> for PostOut {
    fn from(p: Published) -> Self {
        PostOut {
            text: p.post.text,
            title: p.post.title,
            link: p.post.link,
            source: p.post.source,
            details: p.post.details,
            is_breaking: p.post.is_breaking,
            fingerprint: p.fingerprint.to_string(),
            daily_count: p.daily.count,
            daily_limit: p.daily.limit,
        }
    }
}

#[derive(serde::Serialize)]
struct DeniedOut {
    reason: String,
    phase: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    daily_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    daily_limit: Option<u32>,
    retry_after_secs: i64,
}

fn denied_response(d: Denial) -> Response {
    let (daily_count, daily_limit) = match d {
        Denial::QuotaExhausted {
            daily_count,
            daily_limit,
            ..
        } => (Some(daily_count), Some(daily_limit)),
        _ => (None, None),
    };
    let retry_after_secs = d.retry_after().num_seconds().max(0);
    let body = DeniedOut {
        reason: d.to_string(),
        phase: d.phase().as_str(),
        daily_count,
        daily_limit,
        retry_after_secs,
    };
    let mut resp = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
    if let Ok(v) = HeaderValue::from_str(&retry_after_secs.to_string()) {
        resp.headers_mut().insert(header::RETRY_AFTER, v);
    }
    resp
}

fn refused_response(r: Refused) -> Response {
    let (status, fingerprint) = match &r {
        Refused::Malformed => (StatusCode::BAD_REQUEST, None),
        Refused::Duplicate(fp) => (StatusCode::CONFLICT, Some(fp.to_string())),
        Refused::Rejected(_) => (StatusCode::UNPROCESSABLE_ENTITY, None),
    };
    let body = serde_json::json!({ "reason": r.as_str(), "fingerprint": fingerprint });
    (status, Json(body)).into_response()
}

fn outcome_response(outcome: PublishOutcome) -> Response {
    match outcome {
        PublishOutcome::Published(p) => (StatusCode::OK, Json(PostOut::from(p))).into_response(),
        PublishOutcome::Nothing(n) => {
            tracing::debug!(target: "api", reason = n.as_str(), "nothing to publish");
            StatusCode::NO_CONTENT.into_response()
        }
        PublishOutcome::Denied(d) => denied_response(d),
        PublishOutcome::Refused(r) => refused_response(r),
    }
}

fn sent_response(result: anyhow::Result<PublishOutcome>) -> Response {
    match result {
        Ok(outcome) => outcome_response(outcome),
        Err(e) => {
            tracing::error!(target: "api", error = ?e, "publish failed");
            (
                StatusCode::BAD_GATEWAY,
                Json(serde_json::json!({ "error": format!("{e:#}") })),
            )
                .into_response()
        }
    }
}

async fn next_post(State(state): State<AppState>, Query(q): Query<PublishQuery>) -> Response {
    outcome_response(state.service.next_post(q.into()).await)
}

async fn autopublish(State(state): State<AppState>, Query(q): Query<PublishQuery>) -> Response {
    sent_response(state.service.autopublish(q.into()).await)
}

/// Same cycle as `GET /autopublish`; flags may also come as a JSON body. A body carrying
/// a `title` publishes that item instead of running a fetch cycle.
async fn autopublish_post(
    State(state): State<AppState>,
    Query(q): Query<PublishQuery>,
    body: Bytes,
) -> Response {
    if body.iter().all(u8::is_ascii_whitespace) {
        return sent_response(state.service.autopublish(q.into()).await);
    }
    let req: ItemReq = match serde_json::from_slice(&body) {
        Ok(r) => r,
        Err(e) => return (StatusCode::BAD_REQUEST, format!("invalid body: {e}")).into_response(),
    };
    let opts = q.merge(req.flags).into();
    match req.item() {
        Some(item) => sent_response(state.service.publish_item(&item, opts).await),
        None => sent_response(state.service.autopublish(opts).await),
    }
}

async fn publish_item(State(state): State<AppState>, Json(req): Json<ItemReq>) -> Response {
    let opts = req.flags.into();
    match req.item() {
        Some(item) => sent_response(state.service.publish_item(&item, opts).await),
        None => (StatusCode::BAD_REQUEST, "title is required").into_response(),
    }
}

async fn status(State(state): State<AppState>) -> Json<EngineStatus> {
    Json(state.service.status().await)
}

#[derive(serde::Deserialize)]
struct ProcessReq {
    title: String,
    #[serde(default)]
    content: String,
    #[serde(default, alias = "source_name")]
    source: String,
    #[serde(default, alias = "sourceUrl")]
    link: String,
}

#[derive(serde::Deserialize)]
struct ItemReq {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    content: String,
    #[serde(default, alias = "source_name")]
    source: String,
    #[serde(default, alias = "sourceUrl")]
    link: String,
    #[serde(flatten)]
    flags: PublishQuery,
}

impl ItemReq {
    fn item(&self) -> Option<CandidateItem> {
        let title = self.title.as_deref().filter(|t| !t.trim().is_empty())?;
        Some(CandidateItem::new(
            title,
            self.content.as_str(),
            self.source.as_str(),
            self.link.as_str(),
        ))
    }
}

async fn ai_process(
    State(state): State<AppState>,
    Json(body): Json<ProcessReq>,
) -> Result<Json<Enrichment>, (StatusCode, String)> {
    if body.title.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "title is required".to_string()));
    }
    let item = CandidateItem::new(body.title, body.content, body.source, body.link);
    Ok(Json(state.service.enrich(&item).await))
}
