use async_trait::async_trait;

/// Requester 表示发起调用的身份
///
/// 匿名调用者 `user_id` 为 None。所有编译器/生命周期调用都显式传入，
/// 不读取任何全局的"当前用户"。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Requester {
    pub user_id: Option<i64>,
}

impl Requester {
    /// 匿名调用者
    pub fn anonymous() -> Self {
        Self { user_id: None }
    }

    /// 已认证的调用者
    pub fn user(user_id: i64) -> Self {
        Self {
            user_id: Some(user_id),
        }
    }
}

/// PermissionOracle 权限判定协作方
///
/// 凭证校验与权限串求值在本子系统之外，这里只消费布尔结论。
#[async_trait]
pub trait PermissionOracle: Send + Sync {
    /// 调用者是否对目标目录拥有内容管理权限
    async fn may_content_admin(&self, catalog_id: i64, requester: &Requester) -> bool;
}

/// AllowAll 测试用的全通过实现
pub struct AllowAll;

#[async_trait]
impl PermissionOracle for AllowAll {
    async fn may_content_admin(&self, _catalog_id: i64, _requester: &Requester) -> bool {
        true
    }
}

/// DenyAll 测试用的全拒绝实现
pub struct DenyAll;

#[async_trait]
impl PermissionOracle for DenyAll {
    async fn may_content_admin(&self, _catalog_id: i64, _requester: &Requester) -> bool {
        false
    }
}
