pub mod clock;
pub mod error;
pub mod query;
pub mod security;

pub use error::{CatalogError, Result};
