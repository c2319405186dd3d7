use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quill_api::clock::Clock;
use quill_api::security::{PermissionOracle, Requester};
use quill_api::{CatalogError, Result};
use quill_domain::content::constant::{IdTable, DEFAULT_POST_KIND};
use quill_domain::content::{Post, PostStatus};
use quill_infra::{CatalogStore, SlugScope};
use std::sync::Arc;
use tracing::debug;

use crate::content::id_service::IdAllocator;
use crate::content::publication_service::PublicationService;
use crate::content::slug_service::{SlugAllocator, SlugVars};

/// PostDraft 文章写入的输入
#[derive(Debug, Clone)]
pub struct PostDraft {
    pub title: String,
    /// 期望slug，为空时按目录模板合成
    pub slug: String,
    pub body: String,
    pub category_id: Option<i64>,
    pub status: PostStatus,
    /// 缺省为当前时刻
    pub published_at: Option<DateTime<Utc>>,
    pub utc_offset_minutes: i32,
    pub language: String,
    pub password: Option<String>,
    /// 为空时取默认内容类型
    pub kind: String,
}

/// Post服务trait
#[async_trait]
pub trait PostService: Send + Sync {
    /// 新建文章，要求已认证调用者，作者即调用者
    async fn create(&self, catalog_id: i64, requester: &Requester, draft: PostDraft)
        -> Result<Post>;

    /// 更新文章，要求目录管理权限或作者本人
    async fn update(
        &self,
        catalog_id: i64,
        requester: &Requester,
        id: i64,
        draft: PostDraft,
    ) -> Result<Post>;

    /// 删除文章及其全部评论
    async fn delete(&self, catalog_id: i64, requester: &Requester, id: i64) -> Result<()>;

    /// 单条或批量状态变更
    async fn change_status(
        &self,
        catalog_id: i64,
        requester: &Requester,
        ids: &[i64],
        status: PostStatus,
    ) -> Result<()>;
}

/// 默认Post服务实现
pub struct DefaultPostService {
    store: Arc<dyn CatalogStore>,
    oracle: Arc<dyn PermissionOracle>,
    ids: Arc<IdAllocator>,
    slugs: Arc<SlugAllocator>,
    publication: Arc<PublicationService>,
    clock: Arc<dyn Clock>,
}

impl DefaultPostService {
    pub fn new(
        store: Arc<dyn CatalogStore>,
        oracle: Arc<dyn PermissionOracle>,
        ids: Arc<IdAllocator>,
        slugs: Arc<SlugAllocator>,
        publication: Arc<PublicationService>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            oracle,
            ids,
            slugs,
            publication,
            clock,
        }
    }

    /// 管理员或作者本人可改
    async fn require_may_edit(
        &self,
        catalog_id: i64,
        requester: &Requester,
        author_id: i64,
    ) -> Result<()> {
        if self.oracle.may_content_admin(catalog_id, requester).await {
            return Ok(());
        }
        if requester.user_id == Some(author_id) {
            return Ok(());
        }
        Err(CatalogError::PermissionDenied(
            "content admin rights or authorship required".to_string(),
        ))
    }

    async fn require_category(&self, catalog_id: i64, category_id: Option<i64>) -> Result<()> {
        if let Some(id) = category_id {
            self.store
                .get_category(catalog_id, id)
                .await?
                .ok_or_else(|| CatalogError::NotFound(format!("category {}", id)))?;
        }
        Ok(())
    }
}

#[async_trait]
impl PostService for DefaultPostService {
    async fn create(
        &self,
        catalog_id: i64,
        requester: &Requester,
        draft: PostDraft,
    ) -> Result<Post> {
        let author_id = requester.user_id.ok_or_else(|| {
            CatalogError::PermissionDenied("authentication required".to_string())
        })?;
        if draft.title.trim().is_empty() {
            return Err(CatalogError::Validation("post title is required".to_string()));
        }
        let catalog = self
            .store
            .get_catalog(catalog_id)
            .await?
            .ok_or_else(|| CatalogError::NotFound(format!("catalog {}", catalog_id)))?;
        self.require_category(catalog_id, draft.category_id).await?;

        let now = self.clock.now();
        let published_at = draft.published_at.unwrap_or(now);
        let reservation = self.ids.next(IdTable::Posts).await?;
        let vars = SlugVars {
            title: &draft.title,
            id: reservation.id,
            date: published_at,
        };
        let slug = self
            .slugs
            .allocate(&catalog, SlugScope::Posts, &draft.slug, &vars, None)
            .await?;

        let mut post = Post {
            id: reservation.id,
            catalog_id,
            author_id,
            category_id: draft.category_id,
            status: draft.status,
            word_index: build_word_index(&draft.title, &draft.body),
            title: draft.title,
            slug,
            body: draft.body,
            created_at: now,
            updated_at: now,
            published_at,
            utc_offset_minutes: draft.utc_offset_minutes,
            language: draft.language,
            password: draft.password.filter(|p| !p.is_empty()),
            first_published: false,
            comment_count: 0,
            trackback_count: 0,
            kind: if draft.kind.is_empty() {
                DEFAULT_POST_KIND.to_string()
            } else {
                draft.kind
            },
        };

        // 分配与插入之间可能有并发写入抢走slug，唯一约束是权威
        // 信号，撞上时重新分配一次再插
        if let Err(err) = self.store.insert_post(post.clone()).await {
            match err {
                CatalogError::SlugConflict(taken) => {
                    debug!(slug = %taken, "slug lost to concurrent insert, reallocating");
                    let vars = SlugVars {
                        title: &post.title,
                        id: post.id,
                        date: post.published_at,
                    };
                    post.slug = self
                        .slugs
                        .allocate(&catalog, SlugScope::Posts, &post.slug, &vars, None)
                        .await?;
                    self.store.insert_post(post.clone()).await?;
                }
                other => return Err(other),
            }
        }
        drop(reservation);

        if post.is_published() {
            self.publication.confirm_published(catalog_id, &[post.id]).await?;
            post = self
                .store
                .get_post(catalog_id, post.id)
                .await?
                .ok_or_else(|| CatalogError::NotFound(format!("post {}", post.id)))?;
        }
        self.publication.touch(catalog_id).await?;
        Ok(post)
    }

    async fn update(
        &self,
        catalog_id: i64,
        requester: &Requester,
        id: i64,
        draft: PostDraft,
    ) -> Result<Post> {
        if draft.title.trim().is_empty() {
            return Err(CatalogError::Validation("post title is required".to_string()));
        }
        let catalog = self
            .store
            .get_catalog(catalog_id)
            .await?
            .ok_or_else(|| CatalogError::NotFound(format!("catalog {}", catalog_id)))?;
        let existing = self
            .store
            .get_post(catalog_id, id)
            .await?
            .ok_or_else(|| CatalogError::NotFound(format!("post {}", id)))?;
        self.require_may_edit(catalog_id, requester, existing.author_id)
            .await?;
        self.require_category(catalog_id, draft.category_id).await?;

        // 期望slug为空时保持现有slug不变
        let desired = if draft.slug.trim().is_empty() {
            existing.slug.as_str()
        } else {
            draft.slug.as_str()
        };
        let published_at = draft.published_at.unwrap_or(existing.published_at);
        let vars = SlugVars {
            title: &draft.title,
            id,
            date: published_at,
        };
        let slug = self
            .slugs
            .allocate(&catalog, SlugScope::Posts, desired, &vars, Some(id))
            .await?;

        let mut post = existing;
        post.word_index = build_word_index(&draft.title, &draft.body);
        post.title = draft.title;
        post.slug = slug;
        post.body = draft.body;
        post.category_id = draft.category_id;
        post.status = draft.status;
        post.published_at = published_at;
        post.utc_offset_minutes = draft.utc_offset_minutes;
        post.language = draft.language;
        post.password = draft.password.filter(|p| !p.is_empty());
        post.updated_at = self.clock.now();
        if !draft.kind.is_empty() {
            post.kind = draft.kind;
        }
        self.store.update_post(post.clone()).await?;

        if post.is_published() {
            self.publication.confirm_published(catalog_id, &[id]).await?;
            post = self
                .store
                .get_post(catalog_id, id)
                .await?
                .ok_or_else(|| CatalogError::NotFound(format!("post {}", id)))?;
        }
        self.publication.touch(catalog_id).await?;
        Ok(post)
    }

    async fn delete(&self, catalog_id: i64, requester: &Requester, id: i64) -> Result<()> {
        let existing = self
            .store
            .get_post(catalog_id, id)
            .await?
            .ok_or_else(|| CatalogError::NotFound(format!("post {}", id)))?;
        self.require_may_edit(catalog_id, requester, existing.author_id)
            .await?;
        self.store.delete_post(catalog_id, id).await?;
        self.publication.touch(catalog_id).await
    }

    async fn change_status(
        &self,
        catalog_id: i64,
        requester: &Requester,
        ids: &[i64],
        status: PostStatus,
    ) -> Result<()> {
        for &id in ids {
            let post = self
                .store
                .get_post(catalog_id, id)
                .await?
                .ok_or_else(|| CatalogError::NotFound(format!("post {}", id)))?;
            self.require_may_edit(catalog_id, requester, post.author_id)
                .await?;
        }
        self.publication.change_status(catalog_id, ids, status).await
    }
}

/// 预计算词索引列：标题与正文分词、转小写、去重、空格连接
///
/// 全文检索的子串谓词作用于该列，见过滤编译。
fn build_word_index(title: &str, body: &str) -> String {
    let mut words: Vec<String> = Vec::new();
    for word in title.split_whitespace().chain(body.split_whitespace()) {
        let cleaned: String = word
            .chars()
            .filter(|c| c.is_alphanumeric())
            .collect::<String>()
            .to_lowercase();
        if !cleaned.is_empty() && !words.contains(&cleaned) {
            words.push(cleaned);
        }
    }
    words.join(" ")
}
