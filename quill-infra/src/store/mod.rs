pub mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quill_api::query::{Condition, Sort};
use quill_api::Result;
use quill_domain::content::constant::IdTable;
use quill_domain::content::{Category, Comment, CommentStatus, Post, PostStatus};
use quill_domain::Catalog;
use std::collections::HashMap;

/// SlugScope slug唯一性的检查范围
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlugScope {
    Posts,
    Categories,
}

/// CommentTotals 单篇文章的已发布评论/trackback计数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentTotals {
    pub post_id: i64,
    pub comments: i64,
    pub trackbacks: i64,
}

/// CatalogStore trait 定义目录引擎的数据访问操作
///
/// 关系型驱动在本子系统之外，这里是它的类型化门面。凡是注明
/// "原子"的方法，实现方必须把整批变更放进同一个事务，部分写入
/// 不得被并发读者观察到。正则匹配条件在不支持正则的引擎上可以
/// 退化为转义后的前缀LIKE扫描加二次过滤。
#[async_trait]
pub trait CatalogStore: Send + Sync {
    // ---- 顺序ID ----

    /// 读取目标表当前最大id（无行时为0），调用方持表锁期间调用
    async fn max_id(&self, table: IdTable) -> Result<i64>;

    // ---- 目录 ----

    async fn insert_catalog(&self, catalog: Catalog) -> Result<()>;

    async fn get_catalog(&self, catalog_id: i64) -> Result<Option<Catalog>>;

    /// 刷新目录的最后修改时间戳（缓存失效信号）
    async fn touch_catalog(&self, catalog_id: i64, at: DateTime<Utc>) -> Result<()>;

    // ---- 分类 ----

    async fn get_category(&self, catalog_id: i64, id: i64) -> Result<Option<Category>>;

    /// 按left_bound升序返回目录内全部分类
    async fn list_categories(&self, catalog_id: i64) -> Result<Vec<Category>>;

    /// 原子替换目录的整个分类集合（嵌套集合维护是目录级的）
    ///
    /// slug在集合内重复时返回 `SlugConflict`。
    async fn save_category_set(&self, catalog_id: i64, categories: Vec<Category>) -> Result<()>;

    /// 非结构性的属性更新（标题、描述等），不触碰边界
    async fn update_category(&self, category: Category) -> Result<()>;

    // ---- 文章 ----

    /// 插入文章；slug在目录内撞上唯一约束时返回 `SlugConflict`
    async fn insert_post(&self, post: Post) -> Result<()>;

    async fn update_post(&self, post: Post) -> Result<()>;

    async fn get_post(&self, catalog_id: i64, id: i64) -> Result<Option<Post>>;

    async fn delete_post(&self, catalog_id: i64, id: i64) -> Result<()>;

    async fn query_posts(
        &self,
        catalog_id: i64,
        condition: &Condition,
        sort: &Sort,
        limit: Option<u64>,
    ) -> Result<Vec<Post>>;

    async fn count_posts(&self, catalog_id: i64, condition: &Condition) -> Result<u64>;

    /// 批量状态更新（原子）
    async fn update_post_status(
        &self,
        catalog_id: i64,
        ids: &[i64],
        status: PostStatus,
    ) -> Result<()>;

    /// 批量置首次发布标志（原子，只置真）
    async fn mark_first_published(&self, catalog_id: i64, ids: &[i64]) -> Result<()>;

    /// 批量写入派生计数（原子）
    async fn update_post_counters(&self, catalog_id: i64, totals: &[CommentTotals]) -> Result<()>;

    /// 把分类在 `from` 中的文章整批改挂到 `to`，返回改动行数（原子）
    async fn reassign_posts(
        &self,
        catalog_id: i64,
        from: &[i64],
        to: Option<i64>,
    ) -> Result<u64>;

    /// 每个分类的直接文章数（未归类的文章不计入）
    async fn direct_post_counts(&self, catalog_id: i64) -> Result<HashMap<i64, i64>>;

    // ---- slug ----

    /// 返回范围内满足条件的slug集合，排除指定id的行
    async fn list_slugs(
        &self,
        catalog_id: i64,
        scope: SlugScope,
        condition: &Condition,
        exclude_id: Option<i64>,
    ) -> Result<Vec<String>>;

    // ---- 评论 ----

    /// 插入评论；所引用的文章必须存在于同一目录，否则 `NotFound`
    async fn insert_comment(&self, comment: Comment) -> Result<()>;

    async fn update_comment(&self, comment: Comment) -> Result<()>;

    async fn get_comment(&self, catalog_id: i64, id: i64) -> Result<Option<Comment>>;

    async fn delete_comment(&self, catalog_id: i64, id: i64) -> Result<()>;

    async fn query_comments(
        &self,
        catalog_id: i64,
        condition: &Condition,
        sort: &Sort,
        limit: Option<u64>,
    ) -> Result<Vec<Comment>>;

    async fn count_comments(&self, catalog_id: i64, condition: &Condition) -> Result<u64>;

    /// 批量状态更新（原子）
    async fn update_comment_status(
        &self,
        catalog_id: i64,
        ids: &[i64],
        status: CommentStatus,
    ) -> Result<()>;

    /// 统计每篇文章的已发布评论/trackback数
    ///
    /// 请求里的每个post_id都会有一条结果，无匹配行时计数为0。
    async fn published_comment_totals(
        &self,
        catalog_id: i64,
        post_ids: &[i64],
    ) -> Result<Vec<CommentTotals>>;
}
