use chrono::Utc;
use serde::Deserialize;

use crate::errors::AppError;
use crate::models::{Vehicle, VehicleStatus};

const MIN_YEAR: i32 = 1950;
const MAX_YEAR: i32 = 2100;

#[derive(Debug, Clone, Deserialize)]
pub struct NewVehicle {
    pub brand: String,
    pub model: String,
    pub year: i32,
    pub category: String,
    pub daily_rate: i64,
    pub seats: Option<i32>,
    pub image_url: Option<String>,
    pub description: Option<String>,
    pub status: Option<VehicleStatus>,
}

/// Partial update; absent fields keep their stored value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VehiclePatch {
    pub brand: Option<String>,
    pub model: Option<String>,
    pub year: Option<i32>,
    pub category: Option<String>,
    pub daily_rate: Option<i64>,
    pub seats: Option<i32>,
    pub image_url: Option<String>,
    pub description: Option<String>,
    pub status: Option<VehicleStatus>,
}

pub fn validate_vehicle(vehicle: &Vehicle) -> Result<(), AppError> {
    if vehicle.brand.trim().is_empty() || vehicle.model.trim().is_empty() {
        return Err(AppError::Validation("brand and model are required".to_string()));
    }
    if vehicle.category.trim().is_empty() {
        return Err(AppError::Validation("category is required".to_string()));
    }
    if !(MIN_YEAR..=MAX_YEAR).contains(&vehicle.year) {
        return Err(AppError::Validation(format!(
            "year must be between {MIN_YEAR} and {MAX_YEAR}"
        )));
    }
    if vehicle.daily_rate <= 0 {
        return Err(AppError::Validation("daily_rate must be positive".to_string()));
    }
    if vehicle.seats <= 0 {
        return Err(AppError::Validation("seats must be positive".to_string()));
    }
    Ok(())
}

pub fn new_vehicle(req: NewVehicle) -> Result<Vehicle, AppError> {
    let now = Utc::now().naive_utc();
    let vehicle = Vehicle {
        id: uuid::Uuid::new_v4().to_string(),
        brand: req.brand.trim().to_string(),
        model: req.model.trim().to_string(),
        year: req.year,
        category: req.category.trim().to_string(),
        daily_rate: req.daily_rate,
        seats: req.seats.unwrap_or(5),
        image_url: req.image_url,
        description: req.description,
        status: req.status.unwrap_or(VehicleStatus::Available),
        created_at: now,
        updated_at: now,
    };
    validate_vehicle(&vehicle)?;
    Ok(vehicle)
}

pub fn apply_patch(mut vehicle: Vehicle, patch: VehiclePatch) -> Result<Vehicle, AppError> {
    if let Some(brand) = patch.brand {
        vehicle.brand = brand.trim().to_string();
    }
    if let Some(model) = patch.model {
        vehicle.model = model.trim().to_string();
    }
    if let Some(year) = patch.year {
        vehicle.year = year;
    }
    if let Some(category) = patch.category {
        vehicle.category = category.trim().to_string();
    }
    if let Some(rate) = patch.daily_rate {
        vehicle.daily_rate = rate;
    }
    if let Some(seats) = patch.seats {
        vehicle.seats = seats;
    }
    if let Some(url) = patch.image_url {
        vehicle.image_url = Some(url);
    }
    if let Some(description) = patch.description {
        vehicle.description = Some(description);
    }
    if let Some(status) = patch.status {
        vehicle.status = status;
    }
    validate_vehicle(&vehicle)?;
    Ok(vehicle)
}
