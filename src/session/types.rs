use serde::{Deserialize, Serialize};

use crate::shared::{AppError, FieldErrors};
use crate::user::password::validate_identifier;
use crate::user::CredentialError;

const REQUIRED: &str = "This field is required.";
const BLANK: &str = "This field may not be blank.";

/// Request payload for `POST /register`
#[derive(Default, Deserialize)]
pub struct RegisterRequest {
    pub identifier: Option<String>,
    pub credential: Option<String>,
}

/// Request payload for `POST /login`
#[derive(Default, Deserialize)]
pub struct LoginRequest {
    pub identifier: Option<String>,
    pub credential: Option<String>,
}

/// Request payload for `POST /logout`
#[derive(Default, Deserialize)]
pub struct LogoutRequest {
    pub refresh_token: Option<String>,
}

/// Request payload for `POST /token/refresh`
#[derive(Default, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: Option<String>,
}

/// Identifier and raw credential that passed request validation
pub struct ValidCredentials {
    pub identifier: String,
    pub credential: String,
}

/// Response for a successful login
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
}

/// Response for a successful token refresh
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct RefreshResponse {
    pub access_token: String,
}

fn required(
    errors: &mut FieldErrors,
    field: &str,
    value: Option<String>,
    trim: bool,
) -> Option<String> {
    let value = match value {
        Some(value) => value,
        None => {
            errors.add(field, REQUIRED);
            return None;
        }
    };
    let value = if trim {
        value.trim().to_string()
    } else {
        value
    };

    if value.trim().is_empty() {
        errors.add(field, BLANK);
        return None;
    }
    Some(value)
}

fn credentials_from(
    identifier: Option<String>,
    credential: Option<String>,
    check_identifier_format: bool,
) -> Result<ValidCredentials, AppError> {
    let mut errors = FieldErrors::new();
    let identifier = required(&mut errors, "identifier", identifier, true);
    let credential = required(&mut errors, "credential", credential, false);

    if check_identifier_format {
        if let Some(Err(CredentialError::InvalidIdentifier(message))) =
            identifier.as_deref().map(validate_identifier)
        {
            errors.add("identifier", message);
        }
    }

    match (identifier, credential) {
        (Some(identifier), Some(credential)) if errors.is_empty() => Ok(ValidCredentials {
            identifier,
            credential,
        }),
        _ => Err(AppError::Validation(errors)),
    }
}

impl RegisterRequest {
    pub fn validate(self) -> Result<ValidCredentials, AppError> {
        credentials_from(self.identifier, self.credential, true)
    }
}

impl LoginRequest {
    pub fn validate(self) -> Result<ValidCredentials, AppError> {
        credentials_from(self.identifier, self.credential, false)
    }
}

fn refresh_token_field(value: Option<String>) -> Result<String, AppError> {
    let mut errors = FieldErrors::new();
    let token = required(&mut errors, "refresh_token", value, true);
    match token {
        Some(token) => errors.into_result(token),
        None => Err(AppError::Validation(errors)),
    }
}

impl LogoutRequest {
    pub fn validate(self) -> Result<String, AppError> {
        refresh_token_field(self.refresh_token)
    }
}

impl RefreshRequest {
    pub fn validate(self) -> Result<String, AppError> {
        refresh_token_field(self.refresh_token)
    }
}
