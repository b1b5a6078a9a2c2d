use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use crate::{
    db::{Filter, RestClient},
    error::Result,
    models::{
        session::Token,
        vehicle::{NewVehicle, Vehicle, VehicleUpdate},
    },
};

const TABLE: &str = "vehicles";

/// The row sent on insert: the user's fields plus the owner.
#[derive(Serialize)]
struct VehicleInsert<'a> {
    user_id: Uuid,
    #[serde(flatten)]
    vehicle: &'a NewVehicle,
}

/// Lists a user's vehicles, newest first.
pub async fn list_by_user(rest: &RestClient, token: &Token, user_id: &Uuid) -> Result<Vec<Vehicle>> {
    rest.select(
        token,
        TABLE,
        &[Filter::eq("user_id", user_id)],
        Some("created_at.desc"),
    )
    .await
}

/// Inserts a vehicle owned by `user_id`.
///
/// Other vehicles keep their `is_primary` flag.
pub async fn create_vehicle(
    rest: &RestClient,
    token: &Token,
    user_id: Uuid,
    vehicle: &NewVehicle,
) -> Result<Vehicle> {
    rest.insert_single(token, TABLE, &VehicleInsert { user_id, vehicle })
        .await
}

/// Updates the given columns of a vehicle.
pub async fn update_vehicle(
    rest: &RestClient,
    token: &Token,
    vehicle_id: &Uuid,
    update: &VehicleUpdate,
) -> Result<Vehicle> {
    rest.update_single(token, TABLE, &[Filter::eq("id", vehicle_id)], update)
        .await
}

/// Clears `is_primary` on every vehicle of a user.
pub async fn clear_primary(rest: &RestClient, token: &Token, user_id: &Uuid) -> Result<()> {
    rest.update(
        token,
        TABLE,
        &[Filter::eq("user_id", user_id)],
        &json!({ "is_primary": false }),
    )
    .await
}

/// Sets `is_primary` on one vehicle.
pub async fn mark_primary(rest: &RestClient, token: &Token, vehicle_id: &Uuid) -> Result<Vehicle> {
    rest.update_single(
        token,
        TABLE,
        &[Filter::eq("id", vehicle_id)],
        &json!({ "is_primary": true }),
    )
    .await
}

/// Deletes a vehicle.
pub async fn delete_vehicle(rest: &RestClient, token: &Token, vehicle_id: &Uuid) -> Result<()> {
    rest.delete(token, TABLE, &[Filter::eq("id", vehicle_id)])
        .await
}
