/// HTTP API поверх нормализатора, выбора моделей и аналитики продаж

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{Method, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};

use crate::error::BiError;
use crate::frame::{build_frame, RawValue};
use crate::insights::{kpi_summary, ColumnMapper, SalesInsights};
use crate::models::{ModelSelector, SelectionConfig};
use crate::preprocessing::{ingest_file, NormalizationReport, TableNormalizer};
use crate::types::{CleanTable, Kpi, RawTable, SalesInsightsOutput, SelectionResult};

#[derive(Default)]
pub struct AppState {
    pub normalizer: TableNormalizer,
    pub selector: ModelSelector,
    pub mapper: ColumnMapper,
}

pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/api/normalize", post(normalize))
        .route("/api/train", post(train))
        .route("/api/insights", post(insights))
        .layer(cors)
        .with_state(state)
}

/// Ошибка обработчика: ошибки входных данных - 400, обучение и polars - 500
#[derive(Debug)]
pub struct ApiError(pub BiError);

impl From<BiError> for ApiError {
    fn from(err: BiError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            BiError::Training(msg) | BiError::Data(msg) => {
                tracing::error!(detail = %msg, "Processing error");
                StatusCode::INTERNAL_SERVER_ERROR
            }
            other => {
                tracing::warn!("Rejected request: {}", other);
                StatusCode::BAD_REQUEST
            }
        };

        let body = Json(json!({
            "error": true,
            "message": self.0.to_string(),
        }));

        (status, body).into_response()
    }
}

type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

/// Колонка во входном JSON; тип выводится по значениям
#[derive(Debug, Deserialize)]
pub struct ColumnPayload {
    pub name: String,
    pub values: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct TablePayload {
    pub columns: Vec<ColumnPayload>,
}

impl TablePayload {
    fn into_table(self) -> Result<RawTable, BiError> {
        build_frame(
            self.columns
                .into_iter()
                .map(|c| (c.name, c.values.iter().map(RawValue::from).collect()))
                .collect(),
        )
    }
}

/// Имя файла нужно только для выбора формата; без него читаем CSV
#[derive(Debug, Deserialize)]
pub struct NormalizeQuery {
    filename: Option<String>,
}

const DEFAULT_UPLOAD_NAME: &str = "uploaded";

#[derive(Debug, Serialize)]
pub struct NormalizeResponse {
    pub table: CleanTable,
    pub report: NormalizationReport,
}

#[derive(Debug, Deserialize)]
pub struct TrainRequest {
    pub table: TablePayload,
    pub target: String,
    pub features: Vec<String>,
    #[serde(default)]
    pub config: Option<SelectionConfig>,
}

#[derive(Debug, Deserialize)]
pub struct InsightsRequest {
    pub table: TablePayload,
}

#[derive(Debug, Serialize)]
pub struct InsightsResponse {
    pub kpis: Vec<Kpi>,
    pub insights: SalesInsightsOutput,
}

async fn root() -> Json<serde_json::Value> {
    Json(json!({
        "message": "MSME BI API (Rust)",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn normalize(
    State(state): State<Arc<AppState>>,
    Query(query): Query<NormalizeQuery>,
    body: Bytes,
) -> ApiResult<NormalizeResponse> {
    let filename = query.filename.as_deref().unwrap_or(DEFAULT_UPLOAD_NAME);
    tracing::info!("Normalize request: '{}', {} bytes", filename, body.len());

    let raw = ingest_file(filename, &body, state.normalizer.config())?;
    let (table, report) = state.normalizer.normalize_with_report(&raw)?;

    Ok(Json(NormalizeResponse { table, report }))
}

async fn train(State(state): State<Arc<AppState>>, Json(request): Json<TrainRequest>) -> ApiResult<SelectionResult> {
    tracing::info!(
        "Train request: target '{}', {} features",
        request.target,
        request.features.len()
    );

    let raw = request.table.into_table()?;
    let selector = match request.config {
        Some(config) => ModelSelector::with_config(config),
        None => state.selector.clone(),
    };

    // Обучение леса занимает CPU, поэтому уходит в blocking-пул
    let result = tokio::task::spawn_blocking(move || {
        let clean = state.normalizer.normalize(&raw)?;
        selector.train_and_compare(&clean, &request.target, &request.features)
    })
    .await
    .map_err(|e| BiError::Training(format!("Training task failed: {}", e)))??;

    Ok(Json(result))
}

async fn insights(
    State(state): State<Arc<AppState>>,
    Json(request): Json<InsightsRequest>,
) -> ApiResult<InsightsResponse> {
    let raw = request.table.into_table()?;
    tracing::info!("Insights request: {} rows", raw.height());

    let clean = SalesInsights::prepare(&raw, &state.mapper, &state.normalizer)?;
    let insights = SalesInsights::analyze(&clean)?;

    Ok(Json(InsightsResponse {
        kpis: kpi_summary(&clean)?,
        insights,
    }))
}
