use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::ParseEnumError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: String,
    pub brand: String,
    pub model: String,
    pub year: i32,
    pub category: String,
    pub daily_rate: i64,
    pub seats: i32,
    pub image_url: Option<String>,
    pub description: Option<String>,
    pub status: VehicleStatus,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Vehicle {
    /// Human-readable label, e.g. "Toyota Corolla (2022)".
    pub fn label(&self) -> String {
        format!("{} {} ({})", self.brand, self.model, self.year)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum VehicleStatus {
    Available,
    Rented,
    Maintenance,
    Unavailable,
}

impl VehicleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VehicleStatus::Available => "AVAILABLE",
            VehicleStatus::Rented => "RENTED",
            VehicleStatus::Maintenance => "MAINTENANCE",
            VehicleStatus::Unavailable => "UNAVAILABLE",
        }
    }
}

impl FromStr for VehicleStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "AVAILABLE" => Ok(VehicleStatus::Available),
            "RENTED" => Ok(VehicleStatus::Rented),
            "MAINTENANCE" => Ok(VehicleStatus::Maintenance),
            "UNAVAILABLE" => Ok(VehicleStatus::Unavailable),
            other => Err(ParseEnumError::new("vehicle status", other)),
        }
    }
}
