//! HTTP interface for the dashboard UI

use crate::generation::{Dashboard, PanelSelection, PanelSnapshot};
use crate::ingestion::pipeline::FeedService;
use crate::ingestion::rank::{DisplayMode, SubscriptionView, TransactionSort};
use crate::ingestion::types::{
    DataKind, Feed, PopulationRecord, SubscriptionRecord, TransactionListing,
};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<FeedService>,
    pub dashboard: Arc<Dashboard>,
}

impl AppState {
    pub fn new(service: Arc<FeedService>) -> Self {
        AppState {
            dashboard: Arc::new(Dashboard::new(service.clone())),
            service,
        }
    }

    /// Requested group, or the catalog default
    fn group(&self, requested: Option<String>) -> String {
        requested
            .filter(|g| !g.trim().is_empty())
            .unwrap_or_else(|| self.service.catalog().default_group().key.clone())
    }
}

#[derive(Serialize, Deserialize)]
pub struct ApiResponse {
    message: String,
    status: String,
}

#[derive(Debug, Deserialize)]
pub struct TransactionQuery {
    group: Option<String>,
    #[serde(default)]
    mode: DisplayMode,
    sort: Option<TransactionSort>,
}

#[derive(Debug, Deserialize)]
pub struct SubscriptionQuery {
    group: Option<String>,
    #[serde(default)]
    view: SubscriptionView,
    #[serde(default)]
    mode: DisplayMode,
}

#[derive(Debug, Deserialize)]
pub struct PopulationQuery {
    group: Option<String>,
    #[serde(default)]
    mode: DisplayMode,
}

#[derive(Debug, Serialize)]
pub struct RegionsResponse {
    regions_version: String,
    fallback_version: String,
    default_group: String,
    groups: Vec<String>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health_check))
        .route("/api/health", get(health_check))
        .route("/api/transactions", get(transactions))
        .route("/api/subscriptions", get(subscriptions))
        .route("/api/population", get(population))
        .route("/api/regions", get(regions))
        .route("/api/dashboard", get(dashboard))
        .route("/api/dashboard/select", post(select_panel))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> Json<ApiResponse> {
    Json(ApiResponse {
        message: "Realty feed API is running!".to_string(),
        status: "ok".to_string(),
    })
}

async fn transactions(
    State(state): State<AppState>,
    Query(query): Query<TransactionQuery>,
) -> Json<Feed<TransactionListing>> {
    let group = state.group(query.group);
    Json(state.service.transactions(&group, query.mode, query.sort).await)
}

async fn subscriptions(
    State(state): State<AppState>,
    Query(query): Query<SubscriptionQuery>,
) -> Json<Feed<SubscriptionRecord>> {
    let group = state.group(query.group);
    Json(state.service.subscriptions(&group, query.view, query.mode).await)
}

async fn population(
    State(state): State<AppState>,
    Query(query): Query<PopulationQuery>,
) -> Json<Feed<PopulationRecord>> {
    let group = state.group(query.group);
    Json(state.service.population(&group, query.mode).await)
}

async fn regions(State(state): State<AppState>) -> Json<RegionsResponse> {
    let catalog = state.service.catalog();
    Json(RegionsResponse {
        regions_version: catalog.version().to_string(),
        fallback_version: state.service.fallback_catalog().version().to_string(),
        default_group: catalog.default_group().key.clone(),
        groups: catalog.group_keys().into_iter().map(String::from).collect(),
    })
}

async fn dashboard(State(state): State<AppState>) -> Json<HashMap<DataKind, PanelSnapshot>> {
    Json(state.dashboard.snapshot().await)
}

/// 409 when a newer selection on the same panel superseded this one
async fn select_panel(
    State(state): State<AppState>,
    Json(selection): Json<PanelSelection>,
) -> Result<Json<PanelSnapshot>, StatusCode> {
    state
        .dashboard
        .select(selection)
        .await
        .map(Json)
        .ok_or(StatusCode::CONFLICT)
}
