pub mod category_counter;
pub mod category_service;
pub mod comment_service;
pub mod filter_compiler;
pub mod id_service;
pub mod post_service;
pub mod publication_service;
pub mod slug_service;

pub use category_counter::roll_up;
pub use category_service::{
    CategoryDraft, CategoryTreeService, DefaultCategoryTreeService, Reassign, SiblingPosition,
    TraversalOrder,
};
pub use comment_service::{CommentDraft, CommentService, DefaultCommentService};
pub use filter_compiler::{FilterCompiler, PostQueryService};
pub use id_service::{IdAllocator, IdReservation};
pub use post_service::{DefaultPostService, PostDraft, PostService};
pub use publication_service::{PublicationService, PublishEvent};
pub use slug_service::{SlugAllocator, SlugVars};
