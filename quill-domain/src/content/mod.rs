pub mod category;
pub mod comment;
pub mod filter;
pub mod post;

pub use category::{Category, CategoryCount};
pub use comment::{Comment, CommentAuthor, CommentStatus};
pub use filter::{CategorySelector, CategoryToken, FilterCriteria, FilterParams};
pub use post::{Post, PostStatus};

/// 内容相关的常量
pub mod constant {
    /// 顺序ID分配的目标表
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub enum IdTable {
        Posts,
        Comments,
        Categories,
    }

    impl IdTable {
        pub fn as_str(&self) -> &'static str {
            match self {
                IdTable::Posts => "posts",
                IdTable::Comments => "comments",
                IdTable::Categories => "categories",
            }
        }
    }

    /// 默认的内容类型标签
    pub const DEFAULT_POST_KIND: &str = "post";
}
