use garde::Validate;

use crate::error::{AppError, Result};
use crate::models::vehicle::{NewVehicle, VehicleUpdate};

/// Trims an optional field, turning blank input into `None`.
pub fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

/// Normalizes and validates a vehicle before it is inserted.
///
/// Brand and model are required; color and license plate become `None` when
/// blank.
pub fn prepare_new_vehicle(vehicle: NewVehicle) -> Result<NewVehicle> {
    let vehicle = NewVehicle {
        brand: vehicle.brand.trim().to_owned(),
        model: vehicle.model.trim().to_owned(),
        color: optional_text(vehicle.color),
        license_plate: optional_text(vehicle.license_plate),
        is_primary: vehicle.is_primary,
    };

    if vehicle.brand.is_empty() {
        return Err(AppError::Validation("Brand is required".to_string()));
    }

    if vehicle.model.is_empty() {
        return Err(AppError::Validation("Model is required".to_string()));
    }

    vehicle.validate()?;
    Ok(vehicle)
}

/// Fails when a clearable column is longer than `max` characters.
fn check_clearable(field: &str, value: &Option<Option<String>>, max: usize) -> Result<()> {
    match value {
        Some(Some(text)) if text.chars().count() > max => Err(AppError::Validation(format!(
            "{} must be at most {} characters",
            field, max
        ))),
        _ => Ok(()),
    }
}

/// Normalizes and validates a sparse vehicle update.
///
/// A blank color or license plate clears the column instead of being dropped.
pub fn prepare_vehicle_update(update: VehicleUpdate) -> Result<VehicleUpdate> {
    let update = VehicleUpdate {
        brand: update.brand.map(|b| b.trim().to_owned()),
        model: update.model.map(|m| m.trim().to_owned()),
        color: update.color.map(optional_text),
        license_plate: update.license_plate.map(optional_text),
        is_primary: update.is_primary,
    };

    if update.is_empty() {
        return Err(AppError::Validation("Nothing to update".to_string()));
    }

    check_clearable("Color", &update.color, 50)?;
    check_clearable("License plate", &update.license_plate, 20)?;

    update.validate()?;
    Ok(update)
}
