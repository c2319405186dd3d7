use async_trait::async_trait;
use quill_api::clock::Clock;
use quill_api::query::Sort;
use quill_api::security::{PermissionOracle, Requester};
use quill_api::{CatalogError, Result};
use quill_domain::content::constant::IdTable;
use quill_domain::content::{Comment, CommentAuthor, CommentStatus, FilterCriteria};
use quill_infra::CatalogStore;
use std::collections::HashSet;
use std::sync::Arc;

use crate::content::filter_compiler::FilterCompiler;
use crate::content::id_service::IdAllocator;
use crate::content::publication_service::PublicationService;

/// CommentDraft 新评论的输入
#[derive(Debug, Clone)]
pub struct CommentDraft {
    pub post_id: i64,
    pub author: CommentAuthor,
    pub content: String,
    pub is_trackback: bool,
    pub ip: Option<String>,
    /// 缺省进入待审
    pub status: Option<CommentStatus>,
}

/// Comment服务trait
#[async_trait]
pub trait CommentService: Send + Sync {
    /// 新建评论，匿名调用者允许（公开评论入口）
    async fn create(&self, catalog_id: i64, draft: CommentDraft) -> Result<Comment>;

    /// 更新评论内容与作者信息，要求目录管理权限
    ///
    /// 作者字段重新走一遍校验；状态变化会触发所属文章的计数重算。
    async fn update(
        &self,
        catalog_id: i64,
        requester: &Requester,
        id: i64,
        draft: CommentDraft,
    ) -> Result<Comment>;

    /// 批量状态变更，要求目录管理权限
    async fn change_status(
        &self,
        catalog_id: i64,
        requester: &Requester,
        ids: &[i64],
        status: CommentStatus,
    ) -> Result<()>;

    /// 删除评论，要求目录管理权限
    async fn delete(&self, catalog_id: i64, requester: &Requester, id: i64) -> Result<()>;

    /// 按条件查询评论，非管理员只见已发布的
    async fn query(
        &self,
        criteria: &FilterCriteria,
        requester: &Requester,
        sort: &Sort,
        limit: Option<u64>,
    ) -> Result<Vec<Comment>>;

    /// 按条件统计评论数，可见性规则与 [`CommentService::query`] 一致
    async fn count(&self, criteria: &FilterCriteria, requester: &Requester) -> Result<u64>;
}

/// 默认Comment服务实现
pub struct DefaultCommentService {
    store: Arc<dyn CatalogStore>,
    oracle: Arc<dyn PermissionOracle>,
    ids: Arc<IdAllocator>,
    publication: Arc<PublicationService>,
    clock: Arc<dyn Clock>,
}

impl DefaultCommentService {
    pub fn new(
        store: Arc<dyn CatalogStore>,
        oracle: Arc<dyn PermissionOracle>,
        ids: Arc<IdAllocator>,
        publication: Arc<PublicationService>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            oracle,
            ids,
            publication,
            clock,
        }
    }

    async fn require_admin(&self, catalog_id: i64, requester: &Requester) -> Result<()> {
        if self.oracle.may_content_admin(catalog_id, requester).await {
            Ok(())
        } else {
            Err(CatalogError::PermissionDenied(
                "content admin rights required".to_string(),
            ))
        }
    }
}

#[async_trait]
impl CommentService for DefaultCommentService {
    async fn create(&self, catalog_id: i64, draft: CommentDraft) -> Result<Comment> {
        if draft.content.trim().is_empty() {
            return Err(CatalogError::Validation(
                "comment content is required".to_string(),
            ));
        }
        let author = draft.author.validated()?;
        self.store
            .get_post(catalog_id, draft.post_id)
            .await?
            .ok_or_else(|| CatalogError::NotFound(format!("post {}", draft.post_id)))?;

        let reservation = self.ids.next(IdTable::Comments).await?;
        let comment = Comment {
            id: reservation.id,
            post_id: draft.post_id,
            catalog_id,
            status: draft.status.unwrap_or(CommentStatus::Pending),
            is_trackback: draft.is_trackback,
            author_name: author.name,
            author_email: author.email,
            author_url: author.url,
            content: draft.content,
            created_at: self.clock.now(),
            ip: draft.ip,
        };
        self.store.insert_comment(comment.clone()).await?;
        drop(reservation);

        self.publication
            .refresh_comment_counters(catalog_id, &[comment.post_id])
            .await?;
        Ok(comment)
    }

    async fn update(
        &self,
        catalog_id: i64,
        requester: &Requester,
        id: i64,
        draft: CommentDraft,
    ) -> Result<Comment> {
        self.require_admin(catalog_id, requester).await?;
        if draft.content.trim().is_empty() {
            return Err(CatalogError::Validation(
                "comment content is required".to_string(),
            ));
        }
        let author = draft.author.validated()?;
        let existing = self
            .store
            .get_comment(catalog_id, id)
            .await?
            .ok_or_else(|| CatalogError::NotFound(format!("comment {}", id)))?;

        let mut comment = existing;
        comment.author_name = author.name;
        comment.author_email = author.email;
        comment.author_url = author.url;
        comment.content = draft.content;
        comment.is_trackback = draft.is_trackback;
        if let Some(status) = draft.status {
            comment.status = status;
        }
        self.store.update_comment(comment.clone()).await?;

        self.publication
            .refresh_comment_counters(catalog_id, &[comment.post_id])
            .await?;
        Ok(comment)
    }

    async fn change_status(
        &self,
        catalog_id: i64,
        requester: &Requester,
        ids: &[i64],
        status: CommentStatus,
    ) -> Result<()> {
        self.require_admin(catalog_id, requester).await?;
        // 受影响文章在状态变更前收集，变更后统一重算计数
        let mut posts: HashSet<i64> = HashSet::new();
        for &id in ids {
            let comment = self
                .store
                .get_comment(catalog_id, id)
                .await?
                .ok_or_else(|| CatalogError::NotFound(format!("comment {}", id)))?;
            posts.insert(comment.post_id);
        }
        self.store
            .update_comment_status(catalog_id, ids, status)
            .await?;
        let posts: Vec<i64> = posts.into_iter().collect();
        self.publication
            .refresh_comment_counters(catalog_id, &posts)
            .await
    }

    async fn delete(&self, catalog_id: i64, requester: &Requester, id: i64) -> Result<()> {
        self.require_admin(catalog_id, requester).await?;
        let comment = self
            .store
            .get_comment(catalog_id, id)
            .await?
            .ok_or_else(|| CatalogError::NotFound(format!("comment {}", id)))?;
        self.store.delete_comment(catalog_id, id).await?;
        self.publication
            .refresh_comment_counters(catalog_id, &[comment.post_id])
            .await
    }

    async fn query(
        &self,
        criteria: &FilterCriteria,
        requester: &Requester,
        sort: &Sort,
        limit: Option<u64>,
    ) -> Result<Vec<Comment>> {
        let content_admin = self
            .oracle
            .may_content_admin(criteria.catalog_id, requester)
            .await;
        let condition = FilterCompiler::compile_comments(criteria, content_admin);
        self.store
            .query_comments(criteria.catalog_id, &condition, sort, limit)
            .await
    }

    async fn count(&self, criteria: &FilterCriteria, requester: &Requester) -> Result<u64> {
        let content_admin = self
            .oracle
            .may_content_admin(criteria.catalog_id, requester)
            .await;
        let condition = FilterCompiler::compile_comments(criteria, content_admin);
        self.store
            .count_comments(criteria.catalog_id, &condition)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use quill_api::clock::FixedClock;
    use quill_api::security::{AllowAll, DenyAll};
    use quill_domain::content::{Post, PostStatus};
    use quill_domain::Catalog;
    use quill_infra::store::MemoryStore;
    use quill_infra::LockManager;
    use std::time::Duration;

    fn now() -> DateTime<Utc> {
        "2024-03-05T10:00:00Z".parse().unwrap()
    }

    async fn service(
        oracle: Arc<dyn PermissionOracle>,
    ) -> (DefaultCommentService, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        store
            .insert_catalog(Catalog::new(1, "blog", now()))
            .await
            .unwrap();
        store
            .insert_post(Post {
                id: 1,
                catalog_id: 1,
                author_id: 1,
                category_id: None,
                status: PostStatus::Published,
                title: "post".to_string(),
                slug: "post".to_string(),
                body: String::new(),
                word_index: String::new(),
                created_at: now(),
                updated_at: now(),
                published_at: now(),
                utc_offset_minutes: 0,
                language: "en".to_string(),
                password: None,
                first_published: true,
                comment_count: 0,
                trackback_count: 0,
                kind: "post".to_string(),
            })
            .await
            .unwrap();
        let locks = Arc::new(LockManager::new(Duration::from_secs(1)));
        let clock = Arc::new(FixedClock(now()));
        let ids = Arc::new(IdAllocator::new(store.clone(), locks));
        let publication = Arc::new(PublicationService::new(store.clone(), clock.clone()));
        (
            DefaultCommentService::new(store.clone(), oracle, ids, publication, clock),
            store,
        )
    }

    fn draft(content: &str) -> CommentDraft {
        CommentDraft {
            post_id: 1,
            author: CommentAuthor {
                name: "alice".to_string(),
                email: Some("alice@example.com".to_string()),
                url: None,
            },
            content: content.to_string(),
            is_trackback: false,
            ip: Some("203.0.113.9".to_string()),
            status: None,
        }
    }

    #[tokio::test]
    async fn test_create_defaults_to_pending() {
        let (service, store) = service(Arc::new(AllowAll)).await;
        let comment = service.create(1, draft("nice post")).await.unwrap();
        assert_eq!(comment.id, 1);
        assert_eq!(comment.status, CommentStatus::Pending);
        // 待审评论不计入派生计数
        let post = store.get_post(1, 1).await.unwrap().unwrap();
        assert_eq!(post.comment_count, 0);
    }

    #[tokio::test]
    async fn test_published_comment_updates_post_counter() {
        let (service, store) = service(Arc::new(AllowAll)).await;
        let mut published = draft("nice post");
        published.status = Some(CommentStatus::Published);
        service.create(1, published).await.unwrap();
        let post = store.get_post(1, 1).await.unwrap().unwrap();
        assert_eq!(post.comment_count, 1);
        assert_eq!(post.trackback_count, 0);
    }

    #[tokio::test]
    async fn test_create_rejects_invalid_author() {
        let (service, _store) = service(Arc::new(AllowAll)).await;
        let mut bad = draft("hi");
        bad.author.email = Some("not-an-email".to_string());
        let err = service.create(1, bad).await.unwrap_err();
        assert!(matches!(err, CatalogError::Validation(_)));
    }

    #[tokio::test]
    async fn test_create_requires_existing_post() {
        let (service, _store) = service(Arc::new(AllowAll)).await;
        let mut orphan = draft("hi");
        orphan.post_id = 99;
        let err = service.create(1, orphan).await.unwrap_err();
        assert!(matches!(err, CatalogError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_status_change_recounts() {
        let (service, store) = service(Arc::new(AllowAll)).await;
        service.create(1, draft("first")).await.unwrap();
        service
            .change_status(1, &Requester::user(1), &[1], CommentStatus::Published)
            .await
            .unwrap();
        let post = store.get_post(1, 1).await.unwrap().unwrap();
        assert_eq!(post.comment_count, 1);
    }

    #[tokio::test]
    async fn test_status_change_requires_admin() {
        let (service, _store) = service(Arc::new(DenyAll)).await;
        service.create(1, draft("first")).await.unwrap();
        let err = service
            .change_status(1, &Requester::user(1), &[1], CommentStatus::Published)
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::PermissionDenied(_)));
    }

    #[tokio::test]
    async fn test_update_revalidates_and_recounts() {
        let (service, store) = service(Arc::new(AllowAll)).await;
        service.create(1, draft("original")).await.unwrap();

        // 非法作者字段被拒，原评论不动
        let mut bad = draft("edited");
        bad.author.email = Some("not-an-email".to_string());
        let err = service
            .update(1, &Requester::user(1), 1, bad)
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::Validation(_)));
        let unchanged = store.get_comment(1, 1).await.unwrap().unwrap();
        assert_eq!(unchanged.content, "original");

        // 合法更新连带状态变化触发计数重算
        let mut good = draft("edited");
        good.author.name = "bob".to_string();
        good.status = Some(CommentStatus::Published);
        let updated = service.update(1, &Requester::user(1), 1, good).await.unwrap();
        assert_eq!(updated.content, "edited");
        assert_eq!(updated.author_name, "bob");
        assert_eq!(updated.status, CommentStatus::Published);
        let post = store.get_post(1, 1).await.unwrap().unwrap();
        assert_eq!(post.comment_count, 1);
    }

    #[tokio::test]
    async fn test_update_requires_admin() {
        let (service, _store) = service(Arc::new(DenyAll)).await;
        service.create(1, draft("original")).await.unwrap();
        let err = service
            .update(1, &Requester::user(1), 1, draft("edited"))
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::PermissionDenied(_)));
    }

    #[tokio::test]
    async fn test_count_applies_visibility() {
        let (service, _store) = service(Arc::new(DenyAll)).await;
        service.create(1, draft("pending one")).await.unwrap();
        let mut published = draft("published one");
        published.status = Some(CommentStatus::Published);
        service.create(1, published).await.unwrap();

        let criteria = FilterCriteria::for_catalog(1);
        let public = service
            .count(&criteria, &Requester::anonymous())
            .await
            .unwrap();
        assert_eq!(public, 1);
    }

    #[tokio::test]
    async fn test_count_unrestricted_for_admin() {
        let (service, _store) = service(Arc::new(AllowAll)).await;
        service.create(1, draft("pending one")).await.unwrap();
        let total = service
            .count(&FilterCriteria::for_catalog(1), &Requester::user(1))
            .await
            .unwrap();
        assert_eq!(total, 1);
    }

    #[tokio::test]
    async fn test_delete_recounts() {
        let (service, store) = service(Arc::new(AllowAll)).await;
        let mut published = draft("bye");
        published.status = Some(CommentStatus::Published);
        service.create(1, published).await.unwrap();
        service.delete(1, &Requester::user(1), 1).await.unwrap();
        let post = store.get_post(1, 1).await.unwrap().unwrap();
        assert_eq!(post.comment_count, 0);
        assert!(store.get_comment(1, 1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_query_hides_unpublished_from_public() {
        let (service, _store) = service(Arc::new(DenyAll)).await;
        service.create(1, draft("pending one")).await.unwrap();
        let mut published = draft("published one");
        published.status = Some(CommentStatus::Published);
        service.create(1, published).await.unwrap();

        let criteria = FilterCriteria::for_catalog(1);
        let visible = service
            .query(
                &criteria,
                &Requester::anonymous(),
                &Sort::ascending("id"),
                None,
            )
            .await
            .unwrap();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].content, "published one");
    }
}
