use uuid::Uuid;

use crate::{
    db::{Filter, RestClient},
    error::Result,
    models::{profile::{Profile, ProfileUpdate}, session::Token},
};

const TABLE: &str = "users";

/// The public bucket holding profile photos.
pub const PHOTO_BUCKET: &str = "profiles";

/// Finds a profile by its user ID.
pub async fn find_by_id(rest: &RestClient, token: &Token, user_id: &Uuid) -> Result<Profile> {
    rest.select_single(token, TABLE, &[Filter::eq("id", user_id)])
        .await
}

/// Writes the editable columns of a profile and returns the stored row.
pub async fn update_profile(
    rest: &RestClient,
    token: &Token,
    user_id: &Uuid,
    update: &ProfileUpdate,
) -> Result<Profile> {
    rest.update_single(token, TABLE, &[Filter::eq("id", user_id)], update)
        .await
}

/// Uploads a photo into the profile bucket and returns its public URL.
pub async fn upload_photo(
    rest: &RestClient,
    token: &Token,
    path: &str,
    bytes: Vec<u8>,
    content_type: &str,
) -> Result<String> {
    rest.upload_object(token, PHOTO_BUCKET, path, bytes, content_type)
        .await?;
    Ok(rest.public_object_url(PHOTO_BUCKET, path))
}
