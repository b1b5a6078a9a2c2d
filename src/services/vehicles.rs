use uuid::Uuid;

use crate::{
    error::Result,
    models::vehicle::{NewVehicle, Vehicle, VehicleUpdate},
    repositories::vehicle as vehicle_repo,
    state::AppState,
    validation::vehicle::{prepare_new_vehicle, prepare_vehicle_update},
};

/// Lists the signed-in user's vehicles, newest first.
pub async fn get_user_vehicles(state: &AppState) -> Result<Vec<Vehicle>> {
    let session = state.store.require_session()?;

    let vehicles =
        vehicle_repo::list_by_user(&state.rest, &session.access_token, &session.user.id).await?;

    tracing::debug!("🚗 {} vehicles for user: {}", vehicles.len(), session.user.id);
    Ok(vehicles)
}

/// Registers a vehicle for the signed-in user.
///
/// Creating a vehicle with `is_primary` set does not clear the flag on the
/// user's other vehicles; use [`set_primary_vehicle`] for that.
///
/// # Arguments
///
/// * `state` - The application's state.
/// * `vehicle` - The vehicle as typed on the form.
///
/// # Returns
///
/// A `Result` containing the stored `Vehicle`.
pub async fn create_vehicle(state: &AppState, vehicle: NewVehicle) -> Result<Vehicle> {
    let session = state.store.require_session()?;
    let vehicle = prepare_new_vehicle(vehicle)?;

    let created =
        vehicle_repo::create_vehicle(&state.rest, &session.access_token, session.user.id, &vehicle)
            .await
            .inspect_err(|e| tracing::error!("❌ Failed to create vehicle: {}", e))?;

    tracing::info!("✅ Vehicle created: {}", created.id);
    Ok(created)
}

/// Changes some columns of a vehicle.
///
/// # Arguments
///
/// * `state` - The application's state.
/// * `vehicle_id` - The vehicle to change.
/// * `update` - The columns to change; at least one must be set.
pub async fn update_vehicle(
    state: &AppState,
    vehicle_id: Uuid,
    update: VehicleUpdate,
) -> Result<Vehicle> {
    let session = state.store.require_session()?;
    let update = prepare_vehicle_update(update)?;

    let vehicle =
        vehicle_repo::update_vehicle(&state.rest, &session.access_token, &vehicle_id, &update)
            .await?;

    tracing::info!("✅ Vehicle updated: {}", vehicle.id);
    Ok(vehicle)
}

/// Makes one vehicle the user's default.
///
/// Two separate writes: clear the flag on every vehicle of the user, then set
/// it on `vehicle_id`. A failure of the first write is logged and the second
/// still runs. Concurrent calls can interleave.
pub async fn set_primary_vehicle(state: &AppState, vehicle_id: Uuid) -> Result<Vehicle> {
    let session = state.store.require_session()?;

    if let Err(e) =
        vehicle_repo::clear_primary(&state.rest, &session.access_token, &session.user.id).await
    {
        tracing::warn!("⚠️ Failed to clear primary vehicles: {}", e);
    }

    let vehicle = vehicle_repo::mark_primary(&state.rest, &session.access_token, &vehicle_id)
        .await
        .inspect_err(|e| tracing::error!("❌ Failed to set primary vehicle: {}", e))?;

    tracing::info!("⭐ Primary vehicle set: {}", vehicle.id);
    Ok(vehicle)
}

/// Deletes a vehicle.
pub async fn delete_vehicle(state: &AppState, vehicle_id: Uuid) -> Result<()> {
    let session = state.store.require_session()?;

    vehicle_repo::delete_vehicle(&state.rest, &session.access_token, &vehicle_id).await?;

    tracing::info!("🗑️ Vehicle deleted: {}", vehicle_id);
    Ok(())
}
