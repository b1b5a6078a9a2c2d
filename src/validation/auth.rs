use garde::Validate;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{AppError, Result};

/// An email/password pair checked on the client before it reaches the provider.
#[derive(Clone, Validate, Zeroize, ZeroizeOnDrop)]
pub struct Credentials {
    #[garde(email)]
    pub email: String,
    #[garde(length(min = 1, max = 72))]
    pub password: String,
}

impl Credentials {
    /// Builds credentials from raw form input.
    ///
    /// # Arguments
    ///
    /// * `email` - The email as typed; surrounding whitespace is dropped.
    /// * `password` - The password, taken verbatim.
    ///
    /// # Returns
    ///
    /// A `Result` containing the validated `Credentials`.
    pub fn new(email: &str, password: &str) -> Result<Self> {
        validate_email(email)?;
        validate_password(password)?;

        let credentials = Self {
            email: email.trim().to_owned(),
            password: password.to_owned(),
        };
        credentials.validate()?;
        Ok(credentials)
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Validates that an email was provided.
///
/// # Arguments
///
/// * `email` - The email to validate.
///
/// # Returns
///
/// A `Result<()>` indicating whether the email is present.
pub fn validate_email(email: &str) -> Result<()> {
    if email.trim().is_empty() {
        return Err(AppError::Validation("Email is required".to_string()));
    }

    if email.len() > 255 {
        return Err(AppError::Validation(
            "Email must be at most 255 characters".to_string(),
        ));
    }

    Ok(())
}

/// Validates that a password was provided.
///
/// # Arguments
///
/// * `password` - The password to validate.
///
/// # Returns
///
/// A `Result<()>` indicating whether the password is present.
pub fn validate_password(password: &str) -> Result<()> {
    if password.is_empty() {
        return Err(AppError::Validation("Password is required".to_string()));
    }

    Ok(())
}
