use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{
        rejection::{BytesRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::Caller;
use crate::error::AppError;
use crate::models::{Period, QualityScore, Recommendation};
use crate::service::{self, Page};
use crate::store::QualityStore;

pub type AppState = Arc<dyn QualityStore>;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route(
            "/api/quality/scores/current/{provider_id}",
            get(current_score),
        )
        .route(
            "/api/quality/scores/calculate/{provider_id}",
            post(calculate_score),
        )
        .route(
            "/api/quality/scores/history/{provider_id}",
            get(score_history),
        )
        .route("/api/quality/scores/top", get(top_providers))
        .route(
            "/api/quality/recommendations/{provider_id}",
            get(recommendations),
        )
        .route("/api/quality/benchmarks", get(benchmarks))
}

#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
}

impl<T> Envelope<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
            pagination: None,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub pages: i64,
}

#[derive(Debug, Default, Deserialize)]
pub struct PeriodQuery {
    pub period: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub period: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TopQuery {
    pub period: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CalculateRequest {
    pub period: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationReport {
    pub provider_id: Uuid,
    pub period: Period,
    pub score: QualityScore,
    pub recommendations: Vec<Recommendation>,
}

fn parse_provider_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw.trim())
        .map_err(|_| AppError::invalid("providerId", "providerId must be a valid id"))
}

fn parse_period(raw: Option<&str>) -> Result<Period, AppError> {
    Period::parse_or_default(raw).map_err(|e| AppError::invalid("period", e.to_string()))
}

fn parse_calculate_body(bytes: &Bytes) -> Result<CalculateRequest, AppError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(CalculateRequest::default());
    }
    serde_json::from_slice(bytes)
        .map_err(|e| AppError::invalid("body", format!("malformed JSON body: {e}")))
}

async fn health() -> Json<Envelope<serde_json::Value>> {
    Json(Envelope::ok(serde_json::json!({ "status": "ok" })))
}

pub async fn current_score(
    State(store): State<AppState>,
    Path(provider_id): Path<String>,
    query: Result<Query<PeriodQuery>, QueryRejection>,
) -> Result<Json<Envelope<QualityScore>>, AppError> {
    let Query(query) = query?;
    let provider_id = parse_provider_id(&provider_id)?;
    let period = parse_period(query.period.as_deref())?;

    let score = service::current_score(store.as_ref(), provider_id, period).await?;
    Ok(Json(Envelope::ok(score)))
}

pub async fn calculate_score(
    State(store): State<AppState>,
    caller: Caller,
    Path(provider_id): Path<String>,
    body: Result<Bytes, BytesRejection>,
) -> Result<impl IntoResponse, AppError> {
    let provider_id = parse_provider_id(&provider_id)?;
    let request = parse_calculate_body(&body?)?;
    let period = parse_period(request.period.as_deref())?;

    let provider = service::require_provider(store.as_ref(), provider_id).await?;
    caller.ensure_can_manage(&provider)?;

    let score = service::calculate_for(store.as_ref(), &provider, period, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(Envelope::ok(score))))
}

pub async fn recommendations(
    State(store): State<AppState>,
    caller: Caller,
    Path(provider_id): Path<String>,
    query: Result<Query<PeriodQuery>, QueryRejection>,
) -> Result<Json<Envelope<RecommendationReport>>, AppError> {
    let Query(query) = query?;
    let provider_id = parse_provider_id(&provider_id)?;
    let period = parse_period(query.period.as_deref())?;

    let provider = service::require_provider(store.as_ref(), provider_id).await?;
    caller.ensure_can_manage(&provider)?;

    let (score, recommendations) =
        service::recommendations_for(store.as_ref(), provider_id, period).await?;
    Ok(Json(Envelope::ok(RecommendationReport {
        provider_id,
        period,
        score,
        recommendations,
    })))
}

pub async fn score_history(
    State(store): State<AppState>,
    caller: Caller,
    Path(provider_id): Path<String>,
    query: Result<Query<HistoryQuery>, QueryRejection>,
) -> Result<Json<Envelope<Vec<QualityScore>>>, AppError> {
    let Query(query) = query?;
    let provider_id = parse_provider_id(&provider_id)?;
    let period = parse_period(query.period.as_deref())?;
    let page = Page::new(query.page, query.limit)?;

    let provider = service::require_provider(store.as_ref(), provider_id).await?;
    caller.ensure_can_manage(&provider)?;

    let (scores, total) = service::score_history(store.as_ref(), provider_id, period, page).await?;
    Ok(Json(Envelope {
        success: true,
        data: scores,
        pagination: Some(Pagination {
            page: page.page,
            limit: page.limit,
            total,
            pages: (total + page.limit - 1) / page.limit,
        }),
    }))
}

pub async fn top_providers(
    State(store): State<AppState>,
    query: Result<Query<TopQuery>, QueryRejection>,
) -> Result<Json<Envelope<Vec<QualityScore>>>, AppError> {
    let Query(query) = query?;
    let period = parse_period(query.period.as_deref())?;
    let limit = Page::new(None, query.limit)?.limit;

    let scores = service::top_providers(store.as_ref(), period, limit as usize).await?;
    Ok(Json(Envelope::ok(scores)))
}

pub async fn benchmarks(
    State(store): State<AppState>,
    query: Result<Query<PeriodQuery>, QueryRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Query(query) = query?;
    let period = parse_period(query.period.as_deref())?;
    let summary = service::benchmarks_for(store.as_ref(), period).await?;
    Ok(Json(Envelope::ok(summary)))
}
