pub mod blob;
pub mod db;
pub mod error;
pub mod form;
pub mod identity;
pub mod model;

pub use error::{LibraryError, Result};
pub use identity::Principal;
