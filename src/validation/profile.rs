use garde::Validate;

use crate::error::{AppError, Result};
use crate::models::profile::ProfileUpdate;
use crate::validation::vehicle::optional_text;

/// Normalizes and validates a profile edit.
///
/// # Arguments
///
/// * `update` - The edit as typed on the form.
///
/// # Returns
///
/// A `Result` containing the trimmed `ProfileUpdate`.
pub fn prepare_profile_update(update: ProfileUpdate) -> Result<ProfileUpdate> {
    let update = ProfileUpdate {
        name: update.name.trim().to_owned(),
        phone: optional_text(update.phone),
        photo_url: optional_text(update.photo_url),
    };

    if update.name.is_empty() {
        return Err(AppError::Validation("Name is required".to_string()));
    }

    update.validate()?;
    Ok(update)
}
