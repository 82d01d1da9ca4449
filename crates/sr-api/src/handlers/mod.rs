pub mod activities;
pub mod categories;
pub mod certificate;
pub mod coordinator;
mod error;
pub mod health;
pub mod student;

pub use error::{ApiError, ApiResult};
