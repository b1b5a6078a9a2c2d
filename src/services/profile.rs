use chrono::Utc;

use crate::{
    error::{AppError, Result},
    models::profile::{Profile, ProfileUpdate, UserStats},
    repositories::profile as profile_repo,
    state::AppState,
    validation::profile::prepare_profile_update,
};

/// Loads the signed-in user's profile row.
///
/// # Arguments
///
/// * `state` - The application's state.
///
/// # Returns
///
/// A `Result` containing the `Profile`, or `NotFound` if the row is missing.
pub async fn get_current_user_data(state: &AppState) -> Result<Profile> {
    let session = state.store.require_session()?;

    profile_repo::find_by_id(&state.rest, &session.access_token, &session.user.id)
        .await
        .inspect_err(|e| tracing::error!("❌ Failed to load profile {}: {}", session.user.id, e))
}

/// Saves the editable part of the signed-in user's profile.
///
/// # Arguments
///
/// * `state` - The application's state.
/// * `update` - The edit as typed on the form.
///
/// # Returns
///
/// A `Result` containing the stored `Profile`.
pub async fn update_user_profile(state: &AppState, update: ProfileUpdate) -> Result<Profile> {
    let session = state.store.require_session()?;
    let update = prepare_profile_update(update)?;

    let profile =
        profile_repo::update_profile(&state.rest, &session.access_token, &session.user.id, &update)
            .await?;

    tracing::info!("✅ Profile updated: {}", profile.id);
    Ok(profile)
}

/// Uploads a new profile photo and returns its public URL.
///
/// The profile row is not touched; save the URL with
/// [`update_user_profile`].
///
/// # Arguments
///
/// * `state` - The application's state.
/// * `bytes` - The encoded image.
/// * `extension` - The file extension the image was picked with (`jpg`, `png`, ...).
///
/// # Returns
///
/// A `Result` containing the public URL of the uploaded photo.
pub async fn upload_profile_photo(
    state: &AppState,
    bytes: Vec<u8>,
    extension: &str,
) -> Result<String> {
    let session = state.store.require_session()?;

    if bytes.is_empty() {
        return Err(AppError::Validation("Photo is empty".to_string()));
    }

    let extension = extension.trim().trim_start_matches('.').to_ascii_lowercase();
    if extension.is_empty() || !extension.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(AppError::Validation("Invalid photo extension".to_string()));
    }

    let content_type = infer::get(&bytes)
        .map(|kind| kind.mime_type())
        .filter(|mime| mime.starts_with("image/"))
        .map(str::to_owned)
        .unwrap_or_else(|| format!("image/{}", extension));

    let path = format!(
        "avatars/{}_{}.{}",
        session.user.id,
        Utc::now().timestamp_millis(),
        extension
    );
    tracing::debug!("📤 Uploading profile photo to {} ({})", path, content_type);

    let url = profile_repo::upload_photo(
        &state.rest,
        &session.access_token,
        &path,
        bytes,
        &content_type,
    )
    .await
    .inspect_err(|e| tracing::error!("❌ Photo upload failed: {}", e))?;

    tracing::info!("✅ Profile photo uploaded for user: {}", session.user.id);
    Ok(url)
}

/// Activity counters for the profile screen.
///
/// Reservations and listings are not tracked yet, so every counter is zero.
pub async fn get_user_stats(state: &AppState) -> Result<UserStats> {
    state.store.require_user()?;
    Ok(UserStats::default())
}
