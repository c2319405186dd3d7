pub mod clock;
pub mod lock;
pub mod store;

pub use clock::SystemClock;
pub use lock::LockManager;
pub use store::{CatalogStore, CommentTotals, SlugScope};
