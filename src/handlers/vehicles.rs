use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::db::queries::{self, VehicleFilter};
use crate::errors::AppError;
use crate::handlers::require_session;
use crate::models::{Review, Vehicle, VehicleStatus};
use crate::services::reviews::{self, NewReview};
use crate::state::AppState;

// GET /api/vehicles
#[derive(Deserialize)]
pub struct VehiclesQuery {
    pub category: Option<String>,
    pub status: Option<VehicleStatus>,
    pub max_daily_rate: Option<i64>,
}

pub async fn list_vehicles(
    State(state): State<Arc<AppState>>,
    Query(query): Query<VehiclesQuery>,
) -> Result<Json<Vec<Vehicle>>, AppError> {
    let filter = VehicleFilter {
        category: query.category.filter(|c| !c.is_empty()),
        status: query.status,
        max_daily_rate: query.max_daily_rate,
    };

    let db = state.db();
    Ok(Json(queries::list_vehicles(&db, &filter)?))
}

// GET /api/vehicles/:id
#[derive(Serialize)]
pub struct VehicleDetail {
    #[serde(flatten)]
    vehicle: Vehicle,
    average_rating: Option<f64>,
    review_count: usize,
}

pub async fn get_vehicle(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<VehicleDetail>, AppError> {
    let db = state.db();
    let vehicle = queries::get_vehicle(&db, &id)?
        .ok_or_else(|| AppError::NotFound("vehicle not found".to_string()))?;
    let average_rating = queries::get_average_rating(&db, &id)?;
    let review_count = queries::get_reviews_for_vehicle(&db, &id)?.len();

    Ok(Json(VehicleDetail {
        vehicle,
        average_rating,
        review_count,
    }))
}

// GET /api/vehicles/:id/reviews
pub async fn list_reviews(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Review>>, AppError> {
    let db = state.db();
    if queries::get_vehicle(&db, &id)?.is_none() {
        return Err(AppError::NotFound("vehicle not found".to_string()));
    }
    Ok(Json(queries::get_reviews_for_vehicle(&db, &id)?))
}

// POST /api/vehicles/:id/reviews
pub async fn create_review(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<NewReview>,
) -> Result<(StatusCode, Json<Review>), AppError> {
    let session = require_session(&state, &headers)?;
    let review = reviews::submit_review(&state, &session, &id, &body)?;
    Ok((StatusCode::CREATED, Json(review)))
}
