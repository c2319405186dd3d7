use quill_api::query::{queries, Condition, DatePart, Sort};
use quill_api::security::{PermissionOracle, Requester};
use quill_api::{CatalogError, Result};
use quill_domain::content::constant::DEFAULT_POST_KIND;
use quill_domain::content::{
    Category, CategorySelector, CategoryToken, FilterCriteria, FilterParams, Post,
};
use quill_domain::Catalog;
use quill_infra::CatalogStore;
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

/// FilterCompiler 过滤条件编译器
///
/// 把归一化的 `FilterCriteria` 编译为存储无关的 `Condition` 谓词树。
/// 纯函数：分类集合与权限结论由调用方预先取好传入，编译本身
/// 不触存储。
pub struct FilterCompiler;

impl FilterCompiler {
    /// 编译文章查询条件
    ///
    /// `content_admin` 为真时不附加可见性限制；否则要求
    /// 已发布（口令受目录开关约束）或调用者本人的内容。
    pub fn compile_posts(
        criteria: &FilterCriteria,
        requester: &Requester,
        content_admin: bool,
        catalog: &Catalog,
        categories: &[Category],
    ) -> Condition {
        let mut condition = queries::equal(
            "kind",
            json!(criteria.kind.as_deref().unwrap_or(DEFAULT_POST_KIND)),
        );

        if !criteria.ids.is_empty() {
            condition = condition.and(queries::in_condition(
                "id",
                criteria.ids.iter().map(|id| json!(id)).collect(),
            ));
        }
        if !criteria.exclude_ids.is_empty() {
            condition = condition.and(queries::not_in(
                "id",
                criteria.exclude_ids.iter().map(|id| json!(id)).collect(),
            ));
        }

        condition = condition.and(Self::category_condition(&criteria.categories, categories));

        if let Some(year) = criteria.year {
            condition = condition.and(queries::date_part("publishedAt", DatePart::Year, year as u32));
        }
        if let Some(month) = criteria.month {
            condition = condition.and(queries::date_part("publishedAt", DatePart::Month, month));
        }
        if let Some(day) = criteria.day {
            condition = condition.and(queries::date_part("publishedAt", DatePart::Day, day));
        }

        if let Some(language) = &criteria.language {
            condition = condition.and(queries::equal("language", json!(language)));
        }

        // 检索词已统一为小写，词索引列同样以小写存储
        for word in &criteria.words {
            condition = condition.and(queries::contains("wordIndex", word.clone()));
        }

        if !content_admin {
            condition = condition.and(Self::visibility_condition(requester, catalog));
        }

        condition
    }

    /// 编译评论查询条件：按文章限定，非管理员只见已发布评论
    pub fn compile_comments(
        criteria: &FilterCriteria,
        content_admin: bool,
    ) -> Condition {
        let mut condition = Condition::empty();
        if !criteria.ids.is_empty() {
            condition = condition.and(queries::in_condition(
                "postId",
                criteria.ids.iter().map(|id| json!(id)).collect(),
            ));
        }
        if !criteria.exclude_ids.is_empty() {
            condition = condition.and(queries::not_in(
                "postId",
                criteria.exclude_ids.iter().map(|id| json!(id)).collect(),
            ));
        }
        if !content_admin {
            condition = condition.and(queries::equal("status", json!(1)));
        }
        condition
    }

    /// 分类令牌集编译
    ///
    /// 包含令牌OR合并；排除令牌OR合并后取反，再与"有分类"相与。
    /// 两组之间AND。
    fn category_condition(tokens: &[CategoryToken], categories: &[Category]) -> Condition {
        let mut included = Condition::empty();
        let mut excluded = Condition::empty();

        for token in tokens {
            let Some(token_condition) = Self::token_condition(token, categories) else {
                continue;
            };
            if token.negate {
                excluded = match excluded {
                    Condition::Empty => token_condition,
                    prior => prior.or(token_condition),
                };
            } else {
                included = match included {
                    Condition::Empty => token_condition,
                    prior => prior.or(token_condition),
                };
            }
        }

        let mut condition = included;
        if excluded != Condition::Empty {
            condition = condition
                .and(excluded.not())
                .and(queries::is_not_null("categoryId"));
        }
        condition
    }

    /// 单个令牌的谓词；指向不存在分类的令牌丢弃
    fn token_condition(token: &CategoryToken, categories: &[Category]) -> Option<Condition> {
        let target = match &token.selector {
            CategorySelector::Uncategorized => {
                return Some(queries::is_null("categoryId"));
            }
            CategorySelector::Id(id) => categories.iter().find(|c| c.id == *id),
            CategorySelector::Slug(slug) => categories.iter().find(|c| c.slug == *slug),
        };
        let Some(target) = target else {
            debug!(selector = ?token.selector, "category token does not resolve, dropped");
            return None;
        };

        let ids: Vec<serde_json::Value> = if token.subtree {
            categories
                .iter()
                .filter(|c| c.id == target.id || target.contains(c))
                .map(|c| json!(c.id))
                .collect()
        } else {
            vec![json!(target.id)]
        };
        Some(queries::in_condition("categoryId", ids))
    }

    /// 可见性：已发布（口令受目录开关约束）或本人的内容
    fn visibility_condition(requester: &Requester, catalog: &Catalog) -> Condition {
        let mut published = queries::equal("status", json!(1));
        if !catalog.show_passworded {
            published = published.and(queries::is_null("password"));
        }
        match requester.user_id {
            Some(user_id) => published.or(queries::equal("authorId", json!(user_id))),
            None => published,
        }
    }
}

/// PostQueryService 文章查询服务
///
/// 取目录与分类集合、问询权限、编译谓词、交给存储执行。
pub struct PostQueryService {
    store: Arc<dyn CatalogStore>,
    oracle: Arc<dyn PermissionOracle>,
}

impl PostQueryService {
    pub fn new(store: Arc<dyn CatalogStore>, oracle: Arc<dyn PermissionOracle>) -> Self {
        Self { store, oracle }
    }

    /// 从松散参数包归一化条件集，最小检索词长取目录配置
    pub async fn criteria_from_params(
        &self,
        catalog_id: i64,
        params: &FilterParams,
    ) -> Result<FilterCriteria> {
        let catalog = self
            .store
            .get_catalog(catalog_id)
            .await?
            .ok_or_else(|| CatalogError::NotFound(format!("catalog {}", catalog_id)))?;
        Ok(FilterCriteria::from_params(
            catalog_id,
            params,
            catalog.min_search_word_len,
        ))
    }

    /// 编译给定条件集（目录不存在时 `NotFound`）
    pub async fn compile(
        &self,
        criteria: &FilterCriteria,
        requester: &Requester,
    ) -> Result<Condition> {
        let catalog = self
            .store
            .get_catalog(criteria.catalog_id)
            .await?
            .ok_or_else(|| CatalogError::NotFound(format!("catalog {}", criteria.catalog_id)))?;
        let categories = self.store.list_categories(criteria.catalog_id).await?;
        let content_admin = self
            .oracle
            .may_content_admin(criteria.catalog_id, requester)
            .await;
        Ok(FilterCompiler::compile_posts(
            criteria,
            requester,
            content_admin,
            &catalog,
            &categories,
        ))
    }

    pub async fn query(
        &self,
        criteria: &FilterCriteria,
        requester: &Requester,
        sort: &Sort,
        limit: Option<u64>,
    ) -> Result<Vec<Post>> {
        let condition = self.compile(criteria, requester).await?;
        self.store
            .query_posts(criteria.catalog_id, &condition, sort, limit)
            .await
    }

    pub async fn count(&self, criteria: &FilterCriteria, requester: &Requester) -> Result<u64> {
        let condition = self.compile(criteria, requester).await?;
        self.store.count_posts(criteria.catalog_id, &condition).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use quill_api::security::{AllowAll, DenyAll};
    use quill_domain::content::{FilterParams, PostStatus};
    use quill_infra::store::MemoryStore;

    fn now() -> DateTime<Utc> {
        "2024-03-05T10:00:00Z".parse().unwrap()
    }

    fn category(id: i64, slug: &str, left: i64, right: i64) -> Category {
        Category {
            id,
            catalog_id: 1,
            title: slug.to_string(),
            slug: slug.to_string(),
            description: None,
            left_bound: left,
            right_bound: right,
        }
    }

    fn post(id: i64, author_id: i64, category_id: Option<i64>, status: PostStatus) -> Post {
        Post {
            id,
            catalog_id: 1,
            author_id,
            category_id,
            status,
            title: format!("post {}", id),
            slug: format!("post-{}", id),
            body: String::new(),
            word_index: format!("post {}", id),
            created_at: now(),
            updated_at: now(),
            published_at: now(),
            utc_offset_minutes: 0,
            language: "en".to_string(),
            password: None,
            first_published: status == PostStatus::Published,
            comment_count: 0,
            trackback_count: 0,
            kind: "post".to_string(),
        }
    }

    async fn seeded_store() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store
            .insert_catalog(Catalog::new(1, "blog", now()))
            .await
            .unwrap();
        store
    }

    fn criteria_with_categories(tokens: &[&str]) -> FilterCriteria {
        let params = FilterParams {
            categories: tokens.iter().map(|t| t.to_string()).collect(),
            ..Default::default()
        };
        FilterCriteria::from_params(1, &params, 3)
    }

    #[tokio::test]
    async fn test_subtree_token_matches_descendant_posts() {
        let store = seeded_store().await;
        // A(1,6) > B(2,5) > C(3,4)
        store
            .save_category_set(
                1,
                vec![
                    category(1, "a", 1, 6),
                    category(2, "b", 2, 5),
                    category(3, "c", 3, 4),
                ],
            )
            .await
            .unwrap();
        store.insert_post(post(1, 1, Some(3), PostStatus::Published)).await.unwrap();

        let service = PostQueryService::new(store.clone(), Arc::new(AllowAll));

        let hits = service
            .query(
                &criteria_with_categories(&["1?sub"]),
                &Requester::user(1),
                &Sort::default(),
                None,
            )
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);

        // 不带?sub时只匹配直接挂在A下的文章
        let hits = service
            .query(
                &criteria_with_categories(&["1"]),
                &Requester::user(1),
                &Sort::default(),
                None,
            )
            .await
            .unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_negated_token_excludes_and_requires_category() {
        let store = seeded_store().await;
        store
            .save_category_set(1, vec![category(1, "a", 1, 2), category(2, "b", 3, 4)])
            .await
            .unwrap();
        store.insert_post(post(1, 1, Some(1), PostStatus::Published)).await.unwrap();
        store.insert_post(post(2, 1, Some(2), PostStatus::Published)).await.unwrap();
        store.insert_post(post(3, 1, None, PostStatus::Published)).await.unwrap();

        let service = PostQueryService::new(store, Arc::new(AllowAll));
        let hits = service
            .query(
                &criteria_with_categories(&["1?not"]),
                &Requester::user(1),
                &Sort::default(),
                None,
            )
            .await
            .unwrap();
        // 未归类的3也被"有分类"约束排除
        let ids: Vec<i64> = hits.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![2]);
    }

    #[tokio::test]
    async fn test_uncategorized_token_matches_null_category() {
        let store = seeded_store().await;
        store
            .save_category_set(1, vec![category(1, "a", 1, 2)])
            .await
            .unwrap();
        store.insert_post(post(1, 1, Some(1), PostStatus::Published)).await.unwrap();
        store.insert_post(post(2, 1, None, PostStatus::Published)).await.unwrap();

        let service = PostQueryService::new(store, Arc::new(AllowAll));
        let hits = service
            .query(
                &criteria_with_categories(&["null"]),
                &Requester::user(1),
                &Sort::default(),
                None,
            )
            .await
            .unwrap();
        let ids: Vec<i64> = hits.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![2]);
    }

    #[tokio::test]
    async fn test_visibility_anonymous_vs_author() {
        let store = seeded_store().await;
        store.insert_post(post(1, 1, None, PostStatus::Published)).await.unwrap();
        store.insert_post(post(2, 2, None, PostStatus::Pending)).await.unwrap();

        let service = PostQueryService::new(store, Arc::new(DenyAll));
        let criteria = FilterCriteria::for_catalog(1);

        let hits = service
            .query(&criteria, &Requester::anonymous(), &Sort::default(), None)
            .await
            .unwrap();
        let ids: Vec<i64> = hits.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![1]);

        // 待审文章的作者能看到自己的
        let hits = service
            .query(&criteria, &Requester::user(2), &Sort::default(), None)
            .await
            .unwrap();
        let ids: Vec<i64> = hits.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_passworded_posts_hidden_unless_catalog_allows() {
        let store = seeded_store().await;
        let mut locked = post(1, 1, None, PostStatus::Published);
        locked.password = Some("secret".to_string());
        store.insert_post(locked).await.unwrap();

        let service = PostQueryService::new(store.clone(), Arc::new(DenyAll));
        let criteria = FilterCriteria::for_catalog(1);
        let hits = service
            .query(&criteria, &Requester::anonymous(), &Sort::default(), None)
            .await
            .unwrap();
        assert!(hits.is_empty());

        let mut catalog = store.get_catalog(1).await.unwrap().unwrap();
        catalog.show_passworded = true;
        store.insert_catalog(catalog).await.unwrap();
        let hits = service
            .query(&criteria, &Requester::anonymous(), &Sort::default(), None)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[tokio::test]
    async fn test_admin_sees_everything() {
        let store = seeded_store().await;
        store.insert_post(post(1, 1, None, PostStatus::Pending)).await.unwrap();
        let service = PostQueryService::new(store, Arc::new(AllowAll));
        let count = service
            .count(&FilterCriteria::for_catalog(1), &Requester::anonymous())
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_criteria_from_params_uses_catalog_word_length() {
        let store = seeded_store().await;
        let mut catalog = store.get_catalog(1).await.unwrap().unwrap();
        catalog.min_search_word_len = 5;
        store.insert_catalog(catalog).await.unwrap();

        let service = PostQueryService::new(store, Arc::new(AllowAll));
        let params = FilterParams {
            search: Some("rust async runtime".to_string()),
            ..Default::default()
        };
        let criteria = service.criteria_from_params(1, &params).await.unwrap();
        // "rust"短于目录配置的最小词长，被丢弃
        assert_eq!(criteria.words, vec!["async", "runtime"]);

        let err = service.criteria_from_params(99, &params).await.unwrap_err();
        assert!(matches!(err, CatalogError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_word_search_requires_all_words() {
        let store = seeded_store().await;
        let mut first = post(1, 1, None, PostStatus::Published);
        first.word_index = "rust async runtime".to_string();
        let mut second = post(2, 1, None, PostStatus::Published);
        second.word_index = "rust borrow checker".to_string();
        store.insert_post(first).await.unwrap();
        store.insert_post(second).await.unwrap();

        let params = FilterParams {
            search: Some("Rust ASYNC".to_string()),
            ..Default::default()
        };
        let criteria = FilterCriteria::from_params(1, &params, 3);
        let service = PostQueryService::new(store, Arc::new(AllowAll));
        let hits = service
            .query(&criteria, &Requester::user(1), &Sort::default(), None)
            .await
            .unwrap();
        let ids: Vec<i64> = hits.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![1]);
    }

    #[tokio::test]
    async fn test_date_part_filters() {
        let store = seeded_store().await;
        let mut march = post(1, 1, None, PostStatus::Published);
        march.published_at = "2024-03-05T10:00:00Z".parse().unwrap();
        let mut april = post(2, 1, None, PostStatus::Published);
        april.published_at = "2024-04-01T10:00:00Z".parse().unwrap();
        store.insert_post(march).await.unwrap();
        store.insert_post(april).await.unwrap();

        let params = FilterParams {
            year: Some("2024".to_string()),
            month: Some("3".to_string()),
            ..Default::default()
        };
        let criteria = FilterCriteria::from_params(1, &params, 3);
        let service = PostQueryService::new(store, Arc::new(AllowAll));
        let hits = service
            .query(&criteria, &Requester::user(1), &Sort::default(), None)
            .await
            .unwrap();
        let ids: Vec<i64> = hits.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![1]);
    }

    #[test]
    fn test_unresolvable_token_is_dropped() {
        let catalog = Catalog::new(1, "blog", "2024-01-01T00:00:00Z".parse().unwrap());
        let criteria = criteria_with_categories(&["no-such-slug"]);
        let condition = FilterCompiler::compile_posts(
            &criteria,
            &Requester::user(1),
            true,
            &catalog,
            &[],
        );
        // 只剩kind谓词
        assert_eq!(
            condition,
            queries::equal("kind", json!("post"))
        );
    }
}
