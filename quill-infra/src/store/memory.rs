use async_trait::async_trait;
use chrono::{DateTime, Datelike, Utc};
use indexmap::IndexMap;
use quill_api::query::{Condition, DatePart, Sort};
use quill_api::{CatalogError, Result};
use quill_domain::content::constant::IdTable;
use quill_domain::content::{Category, Comment, CommentStatus, Post, PostStatus};
use quill_domain::Catalog;
use serde::Serialize;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::warn;

use super::{CatalogStore, CommentTotals, SlugScope};

/// MemoryStore 进程内的参考存储实现
///
/// 行以实体本身保存，谓词求值作用在行的JSON序列化形态上，
/// 字段用点分路径寻址。每个方法持有同一把写锁完成整批变更，
/// 因此注明"原子"的批量操作天然是全有或全无的。
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    catalogs: IndexMap<i64, Catalog>,
    categories: IndexMap<i64, Category>,
    posts: IndexMap<i64, Post>,
    comments: IndexMap<i64, Comment>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

/// 按点分路径取字段值
fn field_value<'a>(row: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = row;
    for segment in path.split('.') {
        current = current.get(segment)?;
    }
    Some(current)
}

fn is_null(row: &Value, path: &str) -> bool {
    matches!(field_value(row, path), None | Some(Value::Null))
}

/// 对单行求值谓词树
pub fn matches_condition(condition: &Condition, row: &Value) -> bool {
    match condition {
        Condition::Empty => true,

        Condition::And { left, right } => {
            matches_condition(left, row) && matches_condition(right, row)
        }

        Condition::Or { left, right } => {
            matches_condition(left, row) || matches_condition(right, row)
        }

        Condition::Not { condition } => !matches_condition(condition, row),

        Condition::Equal { field, value } => {
            field_value(row, field).map(|v| v == value).unwrap_or(false)
        }

        Condition::NotEqual { field, value } => {
            field_value(row, field).map(|v| v != value).unwrap_or(true)
        }

        Condition::In { field, values } => field_value(row, field)
            .map(|v| values.contains(v))
            .unwrap_or(false),

        Condition::NotIn { field, values } => field_value(row, field)
            .map(|v| !values.contains(v))
            .unwrap_or(true),

        Condition::IsNull { field } => is_null(row, field),

        Condition::IsNotNull { field } => !is_null(row, field),

        Condition::Contains { field, value } => field_value(row, field)
            .and_then(Value::as_str)
            .map(|s| s.contains(value.as_str()))
            .unwrap_or(false),

        Condition::Matches { field, pattern } => {
            let regex = match regex::Regex::new(pattern) {
                Ok(regex) => regex,
                Err(e) => {
                    warn!("invalid match pattern {:?}: {}", pattern, e);
                    return false;
                }
            };
            field_value(row, field)
                .and_then(Value::as_str)
                .map(|s| regex.is_match(s))
                .unwrap_or(false)
        }

        Condition::DatePartEquals { field, part, value } => field_value(row, field)
            .and_then(Value::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|ts| match part {
                DatePart::Year => ts.year() == *value as i32,
                DatePart::Month => ts.month() == *value,
                DatePart::Day => ts.day() == *value,
            })
            .unwrap_or(false),
    }
}

fn cmp_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}

fn to_row<T: Serialize>(item: &T) -> Result<Value> {
    serde_json::to_value(item).map_err(|e| CatalogError::Storage(e.to_string()))
}

/// 过滤、排序、截断一批实体
fn select<T: Serialize + Clone>(
    items: impl Iterator<Item = T>,
    condition: &Condition,
    sort: Option<&Sort>,
    limit: Option<u64>,
) -> Result<Vec<T>> {
    let mut selected = Vec::new();
    for item in items {
        let row = to_row(&item)?;
        if matches_condition(condition, &row) {
            selected.push((row, item));
        }
    }
    if let Some(sort) = sort {
        selected.sort_by(|(a, _), (b, _)| {
            let left = field_value(a, &sort.field).unwrap_or(&Value::Null);
            let right = field_value(b, &sort.field).unwrap_or(&Value::Null);
            let ordering = cmp_values(left, right);
            if sort.descending {
                ordering.reverse()
            } else {
                ordering
            }
        });
    }
    let mut result: Vec<T> = selected.into_iter().map(|(_, item)| item).collect();
    if let Some(limit) = limit {
        result.truncate(limit as usize);
    }
    Ok(result)
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn max_id(&self, table: IdTable) -> Result<i64> {
        let inner = self.inner.read().unwrap();
        let max = match table {
            IdTable::Posts => inner.posts.keys().max().copied(),
            IdTable::Comments => inner.comments.keys().max().copied(),
            IdTable::Categories => inner.categories.keys().max().copied(),
        };
        Ok(max.unwrap_or(0))
    }

    async fn insert_catalog(&self, catalog: Catalog) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        inner.catalogs.insert(catalog.id, catalog);
        Ok(())
    }

    async fn get_catalog(&self, catalog_id: i64) -> Result<Option<Catalog>> {
        let inner = self.inner.read().unwrap();
        Ok(inner.catalogs.get(&catalog_id).cloned())
    }

    async fn touch_catalog(&self, catalog_id: i64, at: DateTime<Utc>) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        let catalog = inner
            .catalogs
            .get_mut(&catalog_id)
            .ok_or_else(|| CatalogError::NotFound(format!("catalog {}", catalog_id)))?;
        catalog.updated_at = at;
        Ok(())
    }

    async fn get_category(&self, catalog_id: i64, id: i64) -> Result<Option<Category>> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .categories
            .get(&id)
            .filter(|c| c.catalog_id == catalog_id)
            .cloned())
    }

    async fn list_categories(&self, catalog_id: i64) -> Result<Vec<Category>> {
        let inner = self.inner.read().unwrap();
        let mut categories: Vec<Category> = inner
            .categories
            .values()
            .filter(|c| c.catalog_id == catalog_id)
            .cloned()
            .collect();
        categories.sort_by_key(|c| c.left_bound);
        Ok(categories)
    }

    async fn save_category_set(&self, catalog_id: i64, categories: Vec<Category>) -> Result<()> {
        let mut slugs = std::collections::HashSet::new();
        for category in &categories {
            if !slugs.insert(category.slug.as_str()) {
                return Err(CatalogError::SlugConflict(category.slug.clone()));
            }
        }
        let mut inner = self.inner.write().unwrap();
        inner.categories.retain(|_, c| c.catalog_id != catalog_id);
        for mut category in categories {
            category.catalog_id = catalog_id;
            inner.categories.insert(category.id, category);
        }
        Ok(())
    }

    async fn update_category(&self, category: Category) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        let slug_taken = inner.categories.values().any(|c| {
            c.catalog_id == category.catalog_id && c.id != category.id && c.slug == category.slug
        });
        if slug_taken {
            return Err(CatalogError::SlugConflict(category.slug));
        }
        let existing = inner
            .categories
            .get_mut(&category.id)
            .filter(|c| c.catalog_id == category.catalog_id)
            .ok_or_else(|| CatalogError::NotFound(format!("category {}", category.id)))?;
        // 保留结构字段，属性更新不触碰边界
        let (left, right) = (existing.left_bound, existing.right_bound);
        *existing = category;
        existing.left_bound = left;
        existing.right_bound = right;
        Ok(())
    }

    async fn insert_post(&self, post: Post) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        let slug_taken = inner
            .posts
            .values()
            .any(|p| p.catalog_id == post.catalog_id && p.slug == post.slug);
        if slug_taken {
            return Err(CatalogError::SlugConflict(post.slug));
        }
        if inner.posts.contains_key(&post.id) {
            return Err(CatalogError::Storage(format!(
                "duplicate post id {}",
                post.id
            )));
        }
        inner.posts.insert(post.id, post);
        Ok(())
    }

    async fn update_post(&self, post: Post) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        let slug_taken = inner
            .posts
            .values()
            .any(|p| p.catalog_id == post.catalog_id && p.id != post.id && p.slug == post.slug);
        if slug_taken {
            return Err(CatalogError::SlugConflict(post.slug));
        }
        let existing = inner
            .posts
            .get_mut(&post.id)
            .filter(|p| p.catalog_id == post.catalog_id)
            .ok_or_else(|| CatalogError::NotFound(format!("post {}", post.id)))?;
        *existing = post;
        Ok(())
    }

    async fn get_post(&self, catalog_id: i64, id: i64) -> Result<Option<Post>> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .posts
            .get(&id)
            .filter(|p| p.catalog_id == catalog_id)
            .cloned())
    }

    async fn delete_post(&self, catalog_id: i64, id: i64) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        let found = inner
            .posts
            .get(&id)
            .map(|p| p.catalog_id == catalog_id)
            .unwrap_or(false);
        if !found {
            return Err(CatalogError::NotFound(format!("post {}", id)));
        }
        inner.posts.shift_remove(&id);
        inner.comments.retain(|_, c| c.post_id != id);
        Ok(())
    }

    async fn query_posts(
        &self,
        catalog_id: i64,
        condition: &Condition,
        sort: &Sort,
        limit: Option<u64>,
    ) -> Result<Vec<Post>> {
        let inner = self.inner.read().unwrap();
        select(
            inner
                .posts
                .values()
                .filter(|p| p.catalog_id == catalog_id)
                .cloned(),
            condition,
            Some(sort),
            limit,
        )
    }

    async fn count_posts(&self, catalog_id: i64, condition: &Condition) -> Result<u64> {
        let inner = self.inner.read().unwrap();
        let matched = select(
            inner
                .posts
                .values()
                .filter(|p| p.catalog_id == catalog_id)
                .cloned(),
            condition,
            None,
            None,
        )?;
        Ok(matched.len() as u64)
    }

    async fn update_post_status(
        &self,
        catalog_id: i64,
        ids: &[i64],
        status: PostStatus,
    ) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        for id in ids {
            if let Some(post) = inner
                .posts
                .get_mut(id)
                .filter(|p| p.catalog_id == catalog_id)
            {
                post.status = status;
            }
        }
        Ok(())
    }

    async fn mark_first_published(&self, catalog_id: i64, ids: &[i64]) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        for id in ids {
            if let Some(post) = inner
                .posts
                .get_mut(id)
                .filter(|p| p.catalog_id == catalog_id)
            {
                post.first_published = true;
            }
        }
        Ok(())
    }

    async fn update_post_counters(&self, catalog_id: i64, totals: &[CommentTotals]) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        for total in totals {
            if let Some(post) = inner
                .posts
                .get_mut(&total.post_id)
                .filter(|p| p.catalog_id == catalog_id)
            {
                post.comment_count = total.comments;
                post.trackback_count = total.trackbacks;
            }
        }
        Ok(())
    }

    async fn reassign_posts(
        &self,
        catalog_id: i64,
        from: &[i64],
        to: Option<i64>,
    ) -> Result<u64> {
        let mut inner = self.inner.write().unwrap();
        let mut changed = 0u64;
        for post in inner.posts.values_mut() {
            if post.catalog_id != catalog_id {
                continue;
            }
            if post
                .category_id
                .map(|c| from.contains(&c))
                .unwrap_or(false)
            {
                post.category_id = to;
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn direct_post_counts(&self, catalog_id: i64) -> Result<HashMap<i64, i64>> {
        let inner = self.inner.read().unwrap();
        let mut counts = HashMap::new();
        for post in inner.posts.values() {
            if post.catalog_id != catalog_id {
                continue;
            }
            if let Some(category_id) = post.category_id {
                *counts.entry(category_id).or_insert(0) += 1;
            }
        }
        Ok(counts)
    }

    async fn list_slugs(
        &self,
        catalog_id: i64,
        scope: SlugScope,
        condition: &Condition,
        exclude_id: Option<i64>,
    ) -> Result<Vec<String>> {
        let inner = self.inner.read().unwrap();
        let rows: Vec<(i64, String)> = match scope {
            SlugScope::Posts => inner
                .posts
                .values()
                .filter(|p| p.catalog_id == catalog_id)
                .map(|p| (p.id, p.slug.clone()))
                .collect(),
            SlugScope::Categories => inner
                .categories
                .values()
                .filter(|c| c.catalog_id == catalog_id)
                .map(|c| (c.id, c.slug.clone()))
                .collect(),
        };
        let mut slugs = Vec::new();
        for (id, slug) in rows {
            if exclude_id == Some(id) {
                continue;
            }
            let row = serde_json::json!({ "id": id, "slug": slug });
            if matches_condition(condition, &row) {
                slugs.push(slug);
            }
        }
        Ok(slugs)
    }

    async fn insert_comment(&self, comment: Comment) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        let post_in_catalog = inner
            .posts
            .get(&comment.post_id)
            .map(|p| p.catalog_id == comment.catalog_id)
            .unwrap_or(false);
        if !post_in_catalog {
            return Err(CatalogError::NotFound(format!(
                "post {} in catalog {}",
                comment.post_id, comment.catalog_id
            )));
        }
        inner.comments.insert(comment.id, comment);
        Ok(())
    }

    async fn update_comment(&self, comment: Comment) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        let existing = inner
            .comments
            .get_mut(&comment.id)
            .filter(|c| c.catalog_id == comment.catalog_id)
            .ok_or_else(|| CatalogError::NotFound(format!("comment {}", comment.id)))?;
        *existing = comment;
        Ok(())
    }

    async fn get_comment(&self, catalog_id: i64, id: i64) -> Result<Option<Comment>> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .comments
            .get(&id)
            .filter(|c| c.catalog_id == catalog_id)
            .cloned())
    }

    async fn delete_comment(&self, catalog_id: i64, id: i64) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        let found = inner
            .comments
            .get(&id)
            .map(|c| c.catalog_id == catalog_id)
            .unwrap_or(false);
        if !found {
            return Err(CatalogError::NotFound(format!("comment {}", id)));
        }
        inner.comments.shift_remove(&id);
        Ok(())
    }

    async fn query_comments(
        &self,
        catalog_id: i64,
        condition: &Condition,
        sort: &Sort,
        limit: Option<u64>,
    ) -> Result<Vec<Comment>> {
        let inner = self.inner.read().unwrap();
        select(
            inner
                .comments
                .values()
                .filter(|c| c.catalog_id == catalog_id)
                .cloned(),
            condition,
            Some(sort),
            limit,
        )
    }

    async fn count_comments(&self, catalog_id: i64, condition: &Condition) -> Result<u64> {
        let inner = self.inner.read().unwrap();
        let matched = select(
            inner
                .comments
                .values()
                .filter(|c| c.catalog_id == catalog_id)
                .cloned(),
            condition,
            None,
            None,
        )?;
        Ok(matched.len() as u64)
    }

    async fn update_comment_status(
        &self,
        catalog_id: i64,
        ids: &[i64],
        status: CommentStatus,
    ) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        for id in ids {
            if let Some(comment) = inner
                .comments
                .get_mut(id)
                .filter(|c| c.catalog_id == catalog_id)
            {
                comment.status = status;
            }
        }
        Ok(())
    }

    async fn published_comment_totals(
        &self,
        catalog_id: i64,
        post_ids: &[i64],
    ) -> Result<Vec<CommentTotals>> {
        let inner = self.inner.read().unwrap();
        let mut totals: Vec<CommentTotals> = post_ids
            .iter()
            .map(|id| CommentTotals {
                post_id: *id,
                comments: 0,
                trackbacks: 0,
            })
            .collect();
        for comment in inner.comments.values() {
            if comment.catalog_id != catalog_id || !comment.is_published() {
                continue;
            }
            if let Some(entry) = totals.iter_mut().find(|t| t.post_id == comment.post_id) {
                if comment.is_trackback {
                    entry.trackbacks += 1;
                } else {
                    entry.comments += 1;
                }
            }
        }
        Ok(totals)
    }
}
