mod common;

use std::sync::Arc;

use serde_json::{Value, json};
use uuid::Uuid;
use wiremock::matchers::{header, method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use parkswap::error::AppError;
use parkswap::models::profile::{ProfileUpdate, UserStats};
use parkswap::models::session::Session;
use parkswap::models::vehicle::{NewVehicle, VehicleUpdate};
use parkswap::services::{profile, vehicles};
use parkswap::state::{AppState, SessionGuard};
use parkswap::storage::MemoryStorage;

use common::{MockProvider, init_tracing, session, test_config};

struct SignedIn {
    server: MockServer,
    state: AppState,
    session: Session,
    _guard: SessionGuard,
}

impl SignedIn {
    fn bearer(&self) -> String {
        format!("Bearer {}", self.session.access_token.expose())
    }

    fn user_id(&self) -> Uuid {
        self.session.user.id
    }
}

async fn signed_in() -> SignedIn {
    init_tracing();
    let server = MockServer::start().await;
    let session = session("ana@example.com");
    let state = AppState::with_provider(
        &test_config(&server.uri()),
        MockProvider::new("secret")
            .with_session(session.clone())
            .into_arc(),
        Arc::new(MemoryStorage::new()),
    )
    .unwrap();
    let guard = state.store.initialize(&state.auth).await;

    SignedIn {
        server,
        state,
        session,
        _guard: guard,
    }
}

fn vehicle_row(id: Uuid, user_id: Uuid, brand: &str, is_primary: bool) -> Value {
    json!({
        "id": id,
        "user_id": user_id,
        "brand": brand,
        "model": "Corolla",
        "color": null,
        "license_plate": "ABC1D23",
        "is_primary": is_primary,
        "created_at": "2024-05-01T12:00:00Z"
    })
}

async fn requests_with_method(server: &MockServer, verb: &str) -> Vec<wiremock::Request> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|r| r.method.as_str() == verb)
        .collect()
}

#[tokio::test]
async fn data_access_requires_a_session() {
    init_tracing();
    let server = MockServer::start().await;
    let state = AppState::with_provider(
        &test_config(&server.uri()),
        MockProvider::new("secret").into_arc(),
        Arc::new(MemoryStorage::new()),
    )
    .unwrap();
    let _guard = state.store.initialize(&state.auth).await;

    assert_eq!(
        vehicles::get_user_vehicles(&state).await.unwrap_err(),
        AppError::NotAuthenticated
    );
    assert_eq!(
        profile::get_current_user_data(&state).await.unwrap_err(),
        AppError::NotAuthenticated
    );
    assert_eq!(
        profile::get_user_stats(&state).await.unwrap_err(),
        AppError::NotAuthenticated
    );
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
}

#[tokio::test]
async fn vehicles_are_listed_for_the_user_newest_first() {
    let ctx = signed_in().await;
    let user_id = ctx.user_id();

    Mock::given(method("GET"))
        .and(path("/rest/v1/vehicles"))
        .and(query_param("user_id", format!("eq.{}", user_id)))
        .and(query_param("order", "created_at.desc"))
        .and(header("authorization", ctx.bearer().as_str()))
        .and(header("apikey", "test-anon-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            vehicle_row(Uuid::new_v4(), user_id, "Toyota", true),
            vehicle_row(Uuid::new_v4(), user_id, "Honda", false),
        ])))
        .expect(1)
        .mount(&ctx.server)
        .await;

    let listed = vehicles::get_user_vehicles(&ctx.state).await.unwrap();

    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].brand, "Toyota");
    assert!(listed[0].is_primary);
    assert_eq!(listed[1].color, None);
}

#[tokio::test]
async fn creating_a_primary_vehicle_leaves_other_primaries_alone() {
    let ctx = signed_in().await;
    let user_id = ctx.user_id();

    Mock::given(method("POST"))
        .and(path("/rest/v1/vehicles"))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(vehicle_row(Uuid::new_v4(), user_id, "Toyota", true)),
        )
        .expect(2)
        .mount(&ctx.server)
        .await;
    Mock::given(method("PATCH"))
        .respond_with(ResponseTemplate::new(204))
        .expect(0)
        .mount(&ctx.server)
        .await;

    for _ in 0..2 {
        let created = vehicles::create_vehicle(
            &ctx.state,
            NewVehicle {
                brand: " Toyota ".into(),
                model: "Corolla".into(),
                color: Some("  ".into()),
                license_plate: Some("ABC1D23".into()),
                is_primary: true,
            },
        )
        .await
        .unwrap();
        assert!(created.is_primary);
    }

    let inserts = requests_with_method(&ctx.server, "POST").await;
    let body: Value = serde_json::from_slice(&inserts[0].body).unwrap();
    assert_eq!(body[0]["user_id"], json!(user_id));
    assert_eq!(body[0]["brand"], json!("Toyota"));
    assert_eq!(body[0]["color"], Value::Null);
    assert_eq!(body[0]["is_primary"], json!(true));
}

#[tokio::test]
async fn invalid_vehicle_is_rejected_before_any_request() {
    let ctx = signed_in().await;

    let err = vehicles::create_vehicle(
        &ctx.state,
        NewVehicle {
            brand: "".into(),
            model: "Corolla".into(),
            ..Default::default()
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let err = vehicles::update_vehicle(&ctx.state, Uuid::new_v4(), VehicleUpdate::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    assert!(ctx.server.received_requests().await.unwrap_or_default().is_empty());
}

#[tokio::test]
async fn setting_the_primary_vehicle_clears_then_sets() {
    let ctx = signed_in().await;
    let user_id = ctx.user_id();
    let vehicle_id = Uuid::new_v4();

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/vehicles"))
        .and(query_param("user_id", format!("eq.{}", user_id)))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&ctx.server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/vehicles"))
        .and(query_param("id", format!("eq.{}", vehicle_id)))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(vehicle_row(vehicle_id, user_id, "Toyota", true)),
        )
        .expect(1)
        .mount(&ctx.server)
        .await;

    let primary = vehicles::set_primary_vehicle(&ctx.state, vehicle_id).await.unwrap();
    assert_eq!(primary.id, vehicle_id);
    assert!(primary.is_primary);

    let patches = requests_with_method(&ctx.server, "PATCH").await;
    assert_eq!(patches.len(), 2);
    assert!(patches[0].url.query_pairs().any(|(k, _)| k == "user_id"));
    assert!(patches[1].url.query_pairs().any(|(k, _)| k == "id"));

    let cleared: Value = serde_json::from_slice(&patches[0].body).unwrap();
    assert_eq!(cleared, json!({ "is_primary": false }));
}

#[tokio::test]
async fn vehicle_update_and_delete_target_one_row() {
    let ctx = signed_in().await;
    let user_id = ctx.user_id();
    let vehicle_id = Uuid::new_v4();

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/vehicles"))
        .and(query_param("id", format!("eq.{}", vehicle_id)))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(vehicle_row(vehicle_id, user_id, "Fiat", false)),
        )
        .expect(1)
        .mount(&ctx.server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/rest/v1/vehicles"))
        .and(query_param("id", format!("eq.{}", vehicle_id)))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&ctx.server)
        .await;

    let updated = vehicles::update_vehicle(
        &ctx.state,
        vehicle_id,
        VehicleUpdate {
            brand: Some("Fiat".into()),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(updated.brand, "Fiat");

    let patches = requests_with_method(&ctx.server, "PATCH").await;
    let body: Value = serde_json::from_slice(&patches[0].body).unwrap();
    assert_eq!(body, json!({ "brand": "Fiat" }));

    vehicles::delete_vehicle(&ctx.state, vehicle_id).await.unwrap();
}

#[tokio::test]
async fn blank_license_plate_is_cleared_on_the_server() {
    let ctx = signed_in().await;
    let user_id = ctx.user_id();
    let vehicle_id = Uuid::new_v4();

    let mut row = vehicle_row(vehicle_id, user_id, "Toyota", false);
    row["license_plate"] = Value::Null;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/vehicles"))
        .and(query_param("id", format!("eq.{}", vehicle_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(row))
        .expect(1)
        .mount(&ctx.server)
        .await;

    let updated = vehicles::update_vehicle(
        &ctx.state,
        vehicle_id,
        VehicleUpdate {
            license_plate: Some(Some("   ".into())),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(updated.license_plate, None);

    let patches = requests_with_method(&ctx.server, "PATCH").await;
    let body: Value = serde_json::from_slice(&patches[0].body).unwrap();
    assert_eq!(body, json!({ "license_plate": null }));
}

#[tokio::test]
async fn missing_profile_row_is_not_found() {
    let ctx = signed_in().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/users"))
        .and(query_param("id", format!("eq.{}", ctx.user_id())))
        .respond_with(ResponseTemplate::new(406).set_body_json(json!({
            "code": "PGRST116",
            "message": "JSON object requested, multiple (or no) rows returned"
        })))
        .mount(&ctx.server)
        .await;

    assert_eq!(
        profile::get_current_user_data(&ctx.state).await.unwrap_err(),
        AppError::NotFound
    );
}

#[tokio::test]
async fn profile_update_trims_and_clears_blank_phone() {
    let ctx = signed_in().await;
    let user_id = ctx.user_id();

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/users"))
        .and(query_param("id", format!("eq.{}", user_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": user_id,
            "name": "Ana Souza",
            "email": "ana@example.com",
            "phone": null,
            "photo_url": null
        })))
        .expect(1)
        .mount(&ctx.server)
        .await;

    let updated = profile::update_user_profile(
        &ctx.state,
        ProfileUpdate {
            name: "  Ana Souza ".into(),
            phone: Some(" ".into()),
            photo_url: None,
        },
    )
    .await
    .unwrap();
    assert_eq!(updated.name.as_deref(), Some("Ana Souza"));

    let patches = requests_with_method(&ctx.server, "PATCH").await;
    let body: Value = serde_json::from_slice(&patches[0].body).unwrap();
    assert_eq!(body, json!({ "name": "Ana Souza", "phone": null }));
}

#[tokio::test]
async fn profile_photo_is_uploaded_under_the_user_avatar_path() {
    let ctx = signed_in().await;
    let png = vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 13];

    Mock::given(method("POST"))
        .and(path_regex(r"^/storage/v1/object/profiles/avatars/[0-9a-f-]+_\d+\.png$"))
        .and(header("content-type", "image/png"))
        .and(header("x-upsert", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "Key": "profiles/avatars" })))
        .expect(1)
        .mount(&ctx.server)
        .await;

    let url = profile::upload_profile_photo(&ctx.state, png, ".PNG").await.unwrap();

    let prefix = format!(
        "{}/storage/v1/object/public/profiles/avatars/{}_",
        ctx.server.uri(),
        ctx.user_id()
    );
    assert!(url.starts_with(&prefix), "unexpected url {url}");
    assert!(url.ends_with(".png"));
}

#[tokio::test]
async fn empty_photo_is_rejected() {
    let ctx = signed_in().await;
    let err = profile::upload_profile_photo(&ctx.state, Vec::new(), "jpg")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}

#[tokio::test]
async fn stats_are_zero_for_a_signed_in_user() {
    let ctx = signed_in().await;
    assert_eq!(
        profile::get_user_stats(&ctx.state).await.unwrap(),
        UserStats::default()
    );
}

#[tokio::test]
async fn expired_token_on_a_table_read_is_a_rejection() {
    let ctx = signed_in().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/vehicles"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "code": "PGRST301",
            "message": "JWT expired"
        })))
        .mount(&ctx.server)
        .await;

    assert_eq!(
        vehicles::get_user_vehicles(&ctx.state).await.unwrap_err(),
        AppError::AuthenticationRejected("JWT expired".into())
    );
}
