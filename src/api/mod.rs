pub mod auth;
mod error;
pub mod sections;

pub use error::{ApiError, FieldError, ResultExt};
