use crate::model::type_enum::ItemType;
use sea_orm::{DbErr, SqlErr};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("{field}: {message}")]
    Validation { field: String, message: String },
    #[error("Permission denied: {0}")]
    PermissionDenied(String),
    #[error("No such {item}: {id}")]
    NotFound { item: ItemType, id: i64 },
    #[error("Database error: {0}")]
    Db(#[from] DbErr),
    #[error(transparent)]
    IO(#[from] std::io::Error),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl LibraryError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn denied(message: impl Into<String>) -> Self {
        Self::PermissionDenied(message.into())
    }

    pub fn not_found(item: ItemType, id: i64) -> Self {
        Self::NotFound { item, id }
    }
}

pub fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

pub type Result<T, E = LibraryError> = std::result::Result<T, E>;
