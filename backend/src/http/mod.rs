pub mod body;
pub mod router;
