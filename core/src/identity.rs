use crate::model::user;
use serde::{Deserialize, Serialize};

/// The authenticated caller, as supplied by the identity provider.
///
/// Every access-control and mutation operation takes one explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: i64,
    pub is_staff: bool,
}

impl Principal {
    pub fn new(id: i64) -> Self {
        Self {
            id,
            is_staff: false,
        }
    }

    pub fn staff(id: i64) -> Self {
        Self { id, is_staff: true }
    }
}

impl From<&user::Model> for Principal {
    fn from(u: &user::Model) -> Self {
        Self {
            id: u.id,
            is_staff: u.is_staff,
        }
    }
}
