pub mod content;

pub use content::{
    CategoryDraft, CategoryTreeService, DefaultCategoryTreeService, Reassign, SiblingPosition,
    TraversalOrder,
    CommentDraft, CommentService, DefaultCommentService,
    DefaultPostService, PostDraft, PostService,
    FilterCompiler, PostQueryService,
    IdAllocator, IdReservation,
    PublicationService, PublishEvent,
    SlugAllocator, SlugVars,
};
