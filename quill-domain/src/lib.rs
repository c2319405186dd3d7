pub mod catalog;
pub mod content;

pub use catalog::Catalog;
