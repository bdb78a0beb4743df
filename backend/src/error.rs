use hyper::StatusCode;
use mlib_core::LibraryError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error(transparent)]
    Library(#[from] LibraryError),
    #[error("Missing or unknown user identity")]
    Unauthorized,
    #[error("Wrong id: {0}")]
    WrongId(String),
    #[error("Bad request body: {0}")]
    BadBody(String),
    #[error("Bad query string: {0}")]
    BadQuery(#[from] serde_urlencoded::de::Error),
    #[error("Json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Bad base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("Http error: {0}")]
    Http(#[from] hyper::http::Error),
    #[error("No such route: {0}")]
    NoRoute(String),
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<sea_orm::DbErr> for ProcessError {
    fn from(e: sea_orm::DbErr) -> Self {
        ProcessError::Library(e.into())
    }
}

impl ProcessError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProcessError::Library(e) => match e {
                LibraryError::Validation { .. } => StatusCode::BAD_REQUEST,
                LibraryError::PermissionDenied(_) => StatusCode::FORBIDDEN,
                LibraryError::NotFound { .. } => StatusCode::NOT_FOUND,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ProcessError::Unauthorized => StatusCode::UNAUTHORIZED,
            ProcessError::WrongId(_)
            | ProcessError::BadBody(_)
            | ProcessError::BadQuery(_)
            | ProcessError::Json(_)
            | ProcessError::Base64(_) => StatusCode::BAD_REQUEST,
            ProcessError::NoRoute(_) => StatusCode::NOT_FOUND,
            ProcessError::Http(_) | ProcessError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Field name for field-level validation messages.
    pub fn field(&self) -> Option<&str> {
        match self {
            ProcessError::Library(LibraryError::Validation { field, .. }) => Some(field.as_str()),
            _ => None,
        }
    }

    /// Text shown to the client. Infrastructure details stay in the log.
    pub fn public_message(&self) -> String {
        match self {
            ProcessError::Library(LibraryError::Validation { message, .. }) => message.clone(),
            e if e.status().is_server_error() => "Internal server error".to_string(),
            e => e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mlib_core::model::type_enum::ItemType;

    #[test]
    fn test_status_mapping() {
        let e: ProcessError =
            LibraryError::validation("rating", "Rating must be between 1 and 5.").into();
        assert_eq!(e.status(), StatusCode::BAD_REQUEST);
        assert_eq!(e.field(), Some("rating"));
        assert_eq!(e.public_message(), "Rating must be between 1 and 5.");

        let e: ProcessError = LibraryError::denied("not yours").into();
        assert_eq!(e.status(), StatusCode::FORBIDDEN);

        let e: ProcessError = LibraryError::not_found(ItemType::Song, 3).into();
        assert_eq!(e.status(), StatusCode::NOT_FOUND);
        assert_eq!(e.public_message(), "No such song: 3");

        let e: ProcessError = anyhow::anyhow!("disk on fire").into();
        assert_eq!(e.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(e.public_message(), "Internal server error");

        assert_eq!(ProcessError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
    }
}
