use thiserror::Error;

/// CatalogError 目录引擎的统一错误类型
///
/// 所有服务方法都返回该类型，由上层（管理端、API层）决定如何呈现。
#[derive(Error, Debug)]
pub enum CatalogError {
    /// 校验失败（缺少必填字段、非法邮箱/URL等），不会产生任何部分写入
    #[error("Validation error: {0}")]
    Validation(String),

    /// 最终候选slug为空（空标题且模板为空）
    #[error("Slug is empty after normalization")]
    EmptySlug,

    /// 权限不足，在任何写入之前抛出
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// 分类下仍有关联内容，删除会导致内容悬空
    #[error("Category {0} still has content attached")]
    NotEmpty(i64),

    /// slug唯一约束冲突（分配器竞争的权威信号，调用方应重试分配）
    #[error("Slug conflict: {0}")]
    SlugConflict(String),

    /// 结构冲突（如把分类移动到自己的后代下面）
    #[error("Structural conflict: {0}")]
    StructuralConflict(String),

    /// 锁等待超时，属于瞬时错误，调用方可退避重试
    #[error("Lock timeout: {0}")]
    LockTimeout(String),

    /// 存储层错误，属于瞬时错误
    #[error("Storage error: {0}")]
    Storage(String),

    /// 结构性不变量被破坏（如嵌套集合边界重叠）
    ///
    /// 表示分类树已损坏，必须中止事务并作为内部错误上抛，
    /// 绝不允许捕获后忽略。
    #[error("Consistency violation: {0}")]
    Consistency(String),
}

pub type Result<T> = std::result::Result<T, CatalogError>;
