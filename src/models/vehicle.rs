use chrono::{DateTime, Utc};
use garde::Validate;
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// Represents a row of the `vehicles` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    /// The unique identifier for the vehicle.
    pub id: Uuid,
    /// The ID of the user who owns the vehicle.
    pub user_id: Uuid,
    /// The vehicle's brand.
    pub brand: String,
    /// The vehicle's model.
    pub model: String,
    /// The vehicle's color, if given.
    #[serde(default)]
    pub color: Option<String>,
    /// The vehicle's license plate, if given.
    #[serde(default)]
    pub license_plate: Option<String>,
    /// Whether this is the user's default vehicle.
    #[serde(default)]
    pub is_primary: bool,
    /// The timestamp when the vehicle was created.
    pub created_at: DateTime<Utc>,
}

/// The fields a user supplies when registering a vehicle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct NewVehicle {
    #[garde(length(min = 1, max = 100))]
    pub brand: String,
    #[garde(length(min = 1, max = 100))]
    pub model: String,
    #[garde(length(max = 50))]
    #[serde(default)]
    pub color: Option<String>,
    #[garde(length(max = 20))]
    #[serde(default)]
    pub license_plate: Option<String>,
    #[garde(skip)]
    #[serde(default)]
    pub is_primary: bool,
}

/// A sparse update of a vehicle's mutable columns.
///
/// `color` and `license_plate` distinguish "leave as is" (`None`) from
/// "clear" (`Some(None)`), which is sent as JSON `null`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct VehicleUpdate {
    #[garde(length(min = 1, max = 100))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    #[garde(length(min = 1, max = 100))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[garde(skip)]
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "clearable"
    )]
    pub color: Option<Option<String>>,
    #[garde(skip)]
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "clearable"
    )]
    pub license_plate: Option<Option<String>>,
    #[garde(skip)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_primary: Option<bool>,
}

/// A present `null` means "clear"; an absent field stays `None` through `default`.
fn clearable<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

impl VehicleUpdate {
    /// Returns true when no column would change.
    pub fn is_empty(&self) -> bool {
        self.brand.is_none()
            && self.model.is_none()
            && self.color.is_none()
            && self.license_plate.is_none()
            && self.is_primary.is_none()
    }
}
