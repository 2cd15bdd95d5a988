//! HTTP front end: the query façade exposed as JSON GET routes.
//!
//! Routes:
//! - `/optimise?range=&results=`
//! - `/optimise/location`
//! - `/optimise/location/{location}?range=&results=`
//! - `/optimise/location/{location}/window/{window}?range=&results=`
//! - `/optimise/location/window/{window}?range=&results=`
//! - `/timestamp`, `/health`

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use common::{Error, ForecastPoint};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::context::AppContext;
use crate::optimizer::{LocatedPoint, LocatedWindowCost, LocationOption, Selection, WindowCost};
use crate::query::QueryParams;

/// A façade error rendered as `{"error": ...}` with a matching status.
#[derive(Debug)]
pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        Self(e)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            Error::Validation(_) | Error::UnknownRegion(_) => StatusCode::BAD_REQUEST,
            Error::LocationNotConfigured(_) => StatusCode::NOT_FOUND,
            Error::CacheNotReady => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() && status != StatusCode::SERVICE_UNAVAILABLE {
            warn!("Request failed: {}", self.0);
        }
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;
type AppState = Arc<AppContext>;

pub fn router(ctx: AppState) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/timestamp", get(timestamp_handler))
        .route("/optimise", get(optimise_handler))
        .route("/optimise/location", get(optimal_location_handler))
        .route("/optimise/location/window/{window}", get(window_handler))
        .route("/optimise/location/{location}", get(location_handler))
        .route(
            "/optimise/location/{location}/window/{window}",
            get(location_window_handler),
        )
        .with_state(ctx)
}

/// Bind `addr` and answer queries until the listener fails.
pub async fn serve(ctx: AppState, addr: String) -> Result<(), Error> {
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("HTTP server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router(ctx)).await?;
    Ok(())
}

async fn root_handler() -> Json<&'static str> {
    Json("Carbon Minimiser")
}

async fn health_handler(State(ctx): State<AppState>) -> impl IntoResponse {
    let healthy = ctx.source().health_status().await;
    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        status,
        Json(json!({ "source": ctx.source().name(), "healthy": healthy })),
    )
}

async fn timestamp_handler(State(ctx): State<AppState>) -> ApiResult<Value> {
    Ok(Json(json!({ "created": ctx.facade().timestamp()? })))
}

async fn optimise_handler(
    State(ctx): State<AppState>,
    Query(params): Query<QueryParams>,
) -> ApiResult<Selection<LocatedPoint>> {
    Ok(Json(ctx.facade().optimise(&params).await?))
}

async fn optimal_location_handler(
    State(ctx): State<AppState>,
) -> ApiResult<Option<LocationOption>> {
    Ok(Json(ctx.facade().optimal_location().await?))
}

async fn location_handler(
    State(ctx): State<AppState>,
    Path(location): Path<String>,
    Query(params): Query<QueryParams>,
) -> ApiResult<Selection<ForecastPoint>> {
    Ok(Json(ctx.facade().location(&location, &params).await?))
}

async fn location_window_handler(
    State(ctx): State<AppState>,
    Path((location, window)): Path<(String, String)>,
    Query(params): Query<QueryParams>,
) -> ApiResult<Selection<WindowCost>> {
    Ok(Json(
        ctx.facade()
            .location_window(&location, &window, &params)
            .await?,
    ))
}

async fn window_handler(
    State(ctx): State<AppState>,
    Path(window): Path<String>,
    Query(params): Query<QueryParams>,
) -> ApiResult<Selection<LocatedWindowCost>> {
    Ok(Json(ctx.facade().window(&window, &params).await?))
}
