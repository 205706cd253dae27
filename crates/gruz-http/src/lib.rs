//! HTTP adapter: public order listing over axum.

use std::net::SocketAddr;

use anyhow::Context;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use gruz_core::{
    errors::Error,
    model::{FloatRange, Order, OrderFilter},
    query::Pagination,
    service::Service,
};

#[derive(Clone)]
pub struct AppState {
    service: Service,
}

/// Build the full router with CORS and request tracing.
pub fn router(service: Service) -> Router {
    Router::new()
        .route("/v1/orders", get(list_orders))
        .route("/health", get(health))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { service })
}

/// Serve until `cancel` fires, then drain in-flight requests.
pub async fn serve(addr: SocketAddr, service: Service, cancel: CancellationToken) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("HTTP server: bind {addr} failed"))?;
    tracing::info!(%addr, "HTTP server listening");

    axum::serve(listener, router(service))
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
        .context("axum::serve")?;

    tracing::info!("HTTP server stopped");
    Ok(())
}

async fn health() -> &'static str {
    "OK"
}

/// Raw query parameters; every value is parsed leniently.
#[derive(Debug, Default)]
pub struct OrderParams {
    pub min_weight: Option<String>,
    pub max_weight: Option<String>,
    pub min_length: Option<String>,
    pub max_length: Option<String>,
    pub min_width: Option<String>,
    pub max_width: Option<String>,
    pub min_height: Option<String>,
    pub max_height: Option<String>,
    pub min_price: Option<String>,
    pub max_price: Option<String>,
    pub tags: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

impl OrderParams {
    /// The first occurrence of a key wins; unknown keys are ignored.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (String, String)>) -> Self {
        let mut params = Self::default();
        for (key, value) in pairs {
            let slot = match key.as_str() {
                "min_weight" => &mut params.min_weight,
                "max_weight" => &mut params.max_weight,
                "min_length" => &mut params.min_length,
                "max_length" => &mut params.max_length,
                "min_width" => &mut params.min_width,
                "max_width" => &mut params.max_width,
                "min_height" => &mut params.min_height,
                "max_height" => &mut params.max_height,
                "min_price" => &mut params.min_price,
                "max_price" => &mut params.max_price,
                "tags" => &mut params.tags,
                "from" => &mut params.from,
                "to" => &mut params.to,
                "page" => &mut params.page,
                "limit" => &mut params.limit,
                "sort_by" => &mut params.sort_by,
                "sort_order" => &mut params.sort_order,
                _ => continue,
            };
            slot.get_or_insert(value);
        }
        params
    }

    /// Unparseable numbers are ignored; blank tags are dropped.
    pub fn into_filter(self) -> OrderFilter {
        let range = |min: &Option<String>, max: &Option<String>| {
            FloatRange::new(parse_f64(min), parse_f64(max))
        };
        let defaults = Pagination::default();

        OrderFilter {
            weight: range(&self.min_weight, &self.max_weight),
            length: range(&self.min_length, &self.max_length),
            width: range(&self.min_width, &self.max_width),
            height: range(&self.min_height, &self.max_height),
            price: range(&self.min_price, &self.max_price),
            tags: self
                .tags
                .as_deref()
                .map(|raw| {
                    raw.split(',')
                        .map(str::trim)
                        .filter(|t| !t.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
            from: non_empty(self.from),
            to: non_empty(self.to),
            pagination: Pagination::new(
                parse_i64(&self.page).unwrap_or(defaults.page),
                parse_i64(&self.limit).unwrap_or(defaults.limit),
            ),
            sort_by: non_empty(self.sort_by),
            sort_order: non_empty(self.sort_order),
        }
    }
}

fn parse_f64(v: &Option<String>) -> Option<f64> {
    v.as_deref()
        .and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|f| f.is_finite())
}

fn parse_i64(v: &Option<String>) -> Option<i64> {
    v.as_deref().and_then(|s| s.trim().parse::<i64>().ok())
}

fn non_empty(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

#[derive(Debug, Serialize)]
pub struct OrdersResponse {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub orders: Vec<Order>,
}

async fn list_orders(
    State(state): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Json<OrdersResponse>, ApiError> {
    let filter = OrderParams::from_pairs(pairs).into_filter();

    // Dropped with the request future, so an abandoned request stops its query.
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    let page = state.service.list_orders(&filter, &cancel).await?;
    Ok(Json(OrdersResponse {
        page: page.page,
        limit: page.limit,
        total: page.total,
        orders: page.items,
    }))
}

pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.0.is_caller_error() {
            return (StatusCode::BAD_REQUEST, self.0.to_string()).into_response();
        }
        tracing::error!(error = %self.0, "request failed");
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
    }
}
