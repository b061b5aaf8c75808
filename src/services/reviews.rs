use chrono::Utc;
use serde::Deserialize;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::Review;
use crate::services::auth::Session;
use crate::state::AppState;

#[derive(Debug, Clone, Deserialize)]
pub struct NewReview {
    pub rating: i32,
    pub comment: Option<String>,
}

/// Only customers with a COMPLETED rental of the vehicle may review it, once.
pub fn submit_review(
    state: &AppState,
    session: &Session,
    vehicle_id: &str,
    req: &NewReview,
) -> Result<Review, AppError> {
    if !(1..=5).contains(&req.rating) {
        return Err(AppError::Validation("rating must be between 1 and 5".to_string()));
    }

    let db = state.db();
    if queries::get_vehicle(&db, vehicle_id)?.is_none() {
        return Err(AppError::NotFound("vehicle not found".to_string()));
    }
    if !queries::has_completed_booking(&db, &session.user_id, vehicle_id)? {
        return Err(AppError::Forbidden(
            "only customers with a completed rental can review this vehicle".to_string(),
        ));
    }
    if queries::has_review(&db, &session.user_id, vehicle_id)? {
        return Err(AppError::Conflict("vehicle already reviewed".to_string()));
    }

    let user = queries::get_user_by_id(&db, &session.user_id)?.ok_or(AppError::Unauthorized)?;
    let review = Review {
        id: uuid::Uuid::new_v4().to_string(),
        user_id: user.id,
        user_name: user.name,
        vehicle_id: vehicle_id.to_string(),
        rating: req.rating,
        comment: req.comment.clone().filter(|c| !c.trim().is_empty()),
        created_at: Utc::now().naive_utc(),
    };
    queries::create_review(&db, &review)?;

    tracing::info!(vehicle_id, user_id = %review.user_id, rating = review.rating, "review submitted");
    Ok(review)
}
