use async_trait::async_trait;
use quill_api::clock::Clock;
use quill_api::{CatalogError, Result};
use quill_domain::content::constant::IdTable;
use quill_domain::content::{Category, CategoryCount};
use quill_infra::{CatalogStore, LockManager, SlugScope};
use std::sync::Arc;
use tracing::debug;

use crate::content::category_counter::roll_up;
use crate::content::id_service::IdAllocator;
use crate::content::slug_service::{SlugAllocator, SlugVars};

/// CategoryDraft 新建分类的输入
#[derive(Debug, Clone)]
pub struct CategoryDraft {
    pub title: String,
    /// 期望slug，为空时从标题导出
    pub slug: String,
    pub description: Option<String>,
}

/// TraversalOrder 深度优先遍历方向（按left_bound排序）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraversalOrder {
    Ascending,
    Descending,
}

/// SiblingPosition 同级重排的目标位置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiblingPosition {
    Before,
    After,
}

/// Reassign 删除仍有文章的分类时的处置方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reassign {
    /// 拒绝删除，返回 `NotEmpty`
    Block,
    /// 整批改挂到指定分类
    ToCategory(i64),
    /// 整批改为未归类
    Uncategorized,
}

/// CategoryTree服务trait
///
/// 全部操作以单个目录为作用域。结构性变更在目录级锁内完成：
/// 嵌套集合的边界维护是目录级的，同目录的并发结构变更必须串行。
#[async_trait]
pub trait CategoryTreeService: Send + Sync {
    /// 在父分类（None为根）下插入新分类
    async fn insert(
        &self,
        catalog_id: i64,
        parent_id: Option<i64>,
        draft: CategoryDraft,
    ) -> Result<Category>;

    /// 删除分类；`keep_children` 时后代上提一级，否则整棵子树删除
    async fn delete(
        &self,
        catalog_id: i64,
        id: i64,
        keep_children: bool,
        reassign: Reassign,
    ) -> Result<()>;

    /// 返回起点（None为整棵树）之下的后代，深度优先序
    async fn children(
        &self,
        catalog_id: i64,
        start_id: Option<i64>,
        order: TraversalOrder,
    ) -> Result<Vec<Category>>;

    /// 返回祖先链，从根到直接父级
    async fn parents(&self, catalog_id: i64, id: i64) -> Result<Vec<Category>>;

    /// 把子树挂到新的父分类下，保留子树内部结构
    async fn set_parent(&self, catalog_id: i64, id: i64, new_parent_id: Option<i64>)
        -> Result<()>;

    /// 在同级兄弟之间重排两棵子树
    async fn set_position(
        &self,
        catalog_id: i64,
        id: i64,
        sibling_id: i64,
        position: SiblingPosition,
    ) -> Result<()>;

    /// 依据现有父子关系从1开始重建全部边界
    async fn reset_order(&self, catalog_id: i64) -> Result<()>;

    /// 非结构性属性更新（标题、slug、描述）
    async fn update_attributes(&self, category: Category) -> Result<()>;

    /// 带层级和子树文章总数的分类列表；`hide_empty` 在回卷完成后过滤
    async fn counts(&self, catalog_id: i64, hide_empty: bool) -> Result<Vec<CategoryCount>>;
}

/// 默认CategoryTree服务实现
pub struct DefaultCategoryTreeService {
    store: Arc<dyn CatalogStore>,
    locks: Arc<LockManager>,
    ids: Arc<IdAllocator>,
    slugs: Arc<SlugAllocator>,
    clock: Arc<dyn Clock>,
}

impl DefaultCategoryTreeService {
    pub fn new(
        store: Arc<dyn CatalogStore>,
        locks: Arc<LockManager>,
        ids: Arc<IdAllocator>,
        slugs: Arc<SlugAllocator>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            locks,
            ids,
            slugs,
            clock,
        }
    }

    /// 校验后保存整个分类集合并刷新目录时间戳
    async fn commit(&self, catalog_id: i64, categories: Vec<Category>) -> Result<()> {
        verify(&categories)?;
        self.store.save_category_set(catalog_id, categories).await?;
        self.store.touch_catalog(catalog_id, self.clock.now()).await
    }
}

#[async_trait]
impl CategoryTreeService for DefaultCategoryTreeService {
    async fn insert(
        &self,
        catalog_id: i64,
        parent_id: Option<i64>,
        draft: CategoryDraft,
    ) -> Result<Category> {
        if draft.title.trim().is_empty() {
            return Err(CatalogError::Validation(
                "category title is required".to_string(),
            ));
        }
        let catalog = self
            .store
            .get_catalog(catalog_id)
            .await?
            .ok_or_else(|| CatalogError::NotFound(format!("catalog {}", catalog_id)))?;

        let _lock = self.locks.lock_catalog(catalog_id).await?;
        let mut categories = self.store.list_categories(catalog_id).await?;

        let left = match parent_id {
            Some(pid) => {
                let parent = find(&categories, pid)
                    .ok_or_else(|| CatalogError::NotFound(format!("category {}", pid)))?;
                categories[parent].right_bound
            }
            None => max_bound(&categories) + 1,
        };

        let reservation = self.ids.next(IdTable::Categories).await?;
        let desired = if draft.slug.trim().is_empty() {
            draft.title.as_str()
        } else {
            draft.slug.as_str()
        };
        let slug = self
            .slugs
            .allocate(
                &catalog,
                SlugScope::Categories,
                desired,
                &SlugVars {
                    title: &draft.title,
                    id: reservation.id,
                    date: self.clock.now(),
                },
                None,
            )
            .await?;

        shift_for_insert(&mut categories, left);
        let category = Category {
            id: reservation.id,
            catalog_id,
            title: draft.title,
            slug,
            description: draft.description,
            left_bound: left,
            right_bound: left + 1,
        };
        categories.push(category.clone());

        self.commit(catalog_id, categories).await?;
        Ok(category)
    }

    async fn delete(
        &self,
        catalog_id: i64,
        id: i64,
        keep_children: bool,
        reassign: Reassign,
    ) -> Result<()> {
        let _lock = self.locks.lock_catalog(catalog_id).await?;
        let mut categories = self.store.list_categories(catalog_id).await?;
        let index = find(&categories, id)
            .ok_or_else(|| CatalogError::NotFound(format!("category {}", id)))?;
        let node = categories[index].clone();

        let affected: Vec<i64> = if keep_children {
            vec![id]
        } else {
            let mut ids = subtree_ids(&categories, &node);
            ids.push(id);
            ids
        };

        let direct = self.store.direct_post_counts(catalog_id).await?;
        let attached: i64 = affected
            .iter()
            .map(|i| direct.get(i).copied().unwrap_or(0))
            .sum();
        if attached > 0 {
            match reassign {
                Reassign::Block => return Err(CatalogError::NotEmpty(id)),
                Reassign::ToCategory(target) => {
                    if affected.contains(&target) {
                        return Err(CatalogError::StructuralConflict(format!(
                            "reassign target {} is being deleted",
                            target
                        )));
                    }
                    find(&categories, target)
                        .ok_or_else(|| CatalogError::NotFound(format!("category {}", target)))?;
                    self.store
                        .reassign_posts(catalog_id, &affected, Some(target))
                        .await?;
                }
                Reassign::Uncategorized => {
                    self.store.reassign_posts(catalog_id, &affected, None).await?;
                }
            }
        }

        if keep_children {
            remove_single(&mut categories, &node);
        } else {
            remove_subtree(&mut categories, &node);
        }
        debug!(
            catalog_id,
            category = id,
            keep_children,
            "category deleted, {} posts reassigned",
            attached
        );
        self.commit(catalog_id, categories).await
    }

    async fn children(
        &self,
        catalog_id: i64,
        start_id: Option<i64>,
        order: TraversalOrder,
    ) -> Result<Vec<Category>> {
        let categories = self.store.list_categories(catalog_id).await?;
        let mut result: Vec<Category> = match start_id {
            None => categories,
            Some(id) => {
                let index = find(&categories, id)
                    .ok_or_else(|| CatalogError::NotFound(format!("category {}", id)))?;
                let start = categories[index].clone();
                categories
                    .into_iter()
                    .filter(|c| start.contains(c))
                    .collect()
            }
        };
        result.sort_by_key(|c| c.left_bound);
        if order == TraversalOrder::Descending {
            result.reverse();
        }
        Ok(result)
    }

    async fn parents(&self, catalog_id: i64, id: i64) -> Result<Vec<Category>> {
        let categories = self.store.list_categories(catalog_id).await?;
        let index = find(&categories, id)
            .ok_or_else(|| CatalogError::NotFound(format!("category {}", id)))?;
        let node = categories[index].clone();
        let mut ancestors: Vec<Category> = categories
            .into_iter()
            .filter(|c| c.contains(&node))
            .collect();
        // 根在前，直接父级在后
        ancestors.sort_by_key(|c| c.left_bound);
        Ok(ancestors)
    }

    async fn set_parent(
        &self,
        catalog_id: i64,
        id: i64,
        new_parent_id: Option<i64>,
    ) -> Result<()> {
        let _lock = self.locks.lock_catalog(catalog_id).await?;
        let mut categories = self.store.list_categories(catalog_id).await?;
        let index = find(&categories, id)
            .ok_or_else(|| CatalogError::NotFound(format!("category {}", id)))?;
        let node = categories[index].clone();

        if let Some(pid) = new_parent_id {
            if pid == id {
                return Err(CatalogError::StructuralConflict(
                    "cannot move a category under itself".to_string(),
                ));
            }
            let parent_index = find(&categories, pid)
                .ok_or_else(|| CatalogError::NotFound(format!("category {}", pid)))?;
            if node.contains(&categories[parent_index]) {
                return Err(CatalogError::StructuralConflict(
                    "cannot move a category under its own descendant".to_string(),
                ));
            }
        }

        let block = extract_block(&mut categories, &node);
        let new_left = match new_parent_id {
            Some(pid) => {
                let parent_index = find(&categories, pid).expect("checked above");
                categories[parent_index].right_bound
            }
            None => max_bound(&categories) + 1,
        };
        insert_block(&mut categories, block, new_left);

        self.commit(catalog_id, categories).await
    }

    async fn set_position(
        &self,
        catalog_id: i64,
        id: i64,
        sibling_id: i64,
        position: SiblingPosition,
    ) -> Result<()> {
        if id == sibling_id {
            return Err(CatalogError::StructuralConflict(
                "cannot reorder a category against itself".to_string(),
            ));
        }
        let _lock = self.locks.lock_catalog(catalog_id).await?;
        let mut categories = self.store.list_categories(catalog_id).await?;
        let index = find(&categories, id)
            .ok_or_else(|| CatalogError::NotFound(format!("category {}", id)))?;
        let sibling_index = find(&categories, sibling_id)
            .ok_or_else(|| CatalogError::NotFound(format!("category {}", sibling_id)))?;
        let node = categories[index].clone();
        let sibling = categories[sibling_index].clone();

        if immediate_parent(&categories, &node) != immediate_parent(&categories, &sibling) {
            return Err(CatalogError::StructuralConflict(format!(
                "categories {} and {} are not siblings",
                id, sibling_id
            )));
        }

        let block = extract_block(&mut categories, &node);
        // 兄弟块可能因抽取而平移，按id重新定位
        let sibling_index = find(&categories, sibling_id).expect("sibling survives extraction");
        let sibling = &categories[sibling_index];
        let new_left = match position {
            SiblingPosition::Before => sibling.left_bound,
            SiblingPosition::After => sibling.right_bound + 1,
        };
        insert_block(&mut categories, block, new_left);

        self.commit(catalog_id, categories).await
    }

    async fn reset_order(&self, catalog_id: i64) -> Result<()> {
        let _lock = self.locks.lock_catalog(catalog_id).await?;
        let mut categories = self.store.list_categories(catalog_id).await?;
        reset_bounds(&mut categories);
        self.commit(catalog_id, categories).await
    }

    async fn update_attributes(&self, category: Category) -> Result<()> {
        if category.title.trim().is_empty() {
            return Err(CatalogError::Validation(
                "category title is required".to_string(),
            ));
        }
        let catalog_id = category.catalog_id;
        self.store.update_category(category).await?;
        self.store.touch_catalog(catalog_id, self.clock.now()).await
    }

    async fn counts(&self, catalog_id: i64, hide_empty: bool) -> Result<Vec<CategoryCount>> {
        let categories = self.store.list_categories(catalog_id).await?;
        let direct = self.store.direct_post_counts(catalog_id).await?;
        let rows: Vec<(i64, u32, i64)> = with_levels(&categories)
            .into_iter()
            .map(|(id, level)| (id, level, direct.get(&id).copied().unwrap_or(0)))
            .collect();
        let mut result = roll_up(&rows);
        if hide_empty {
            result.retain(|c| c.total > 0);
        }
        Ok(result)
    }
}

// ---- 边界运算（纯函数，单个目录的分类集合） ----

fn find(categories: &[Category], id: i64) -> Option<usize> {
    categories.iter().position(|c| c.id == id)
}

fn max_bound(categories: &[Category]) -> i64 {
    categories.iter().map(|c| c.right_bound).max().unwrap_or(0)
}

fn subtree_ids(categories: &[Category], node: &Category) -> Vec<i64> {
    categories
        .iter()
        .filter(|c| node.contains(c))
        .map(|c| c.id)
        .collect()
}

/// 直接父级：包含节点的区间中left_bound最大者
fn immediate_parent(categories: &[Category], node: &Category) -> Option<i64> {
    categories
        .iter()
        .filter(|c| c.contains(node))
        .max_by_key(|c| c.left_bound)
        .map(|c| c.id)
}

/// 为span=2的新节点腾位：所有 >= left 的边界整体右移2
fn shift_for_insert(categories: &mut [Category], left: i64) {
    for c in categories.iter_mut() {
        if c.left_bound >= left {
            c.left_bound += 2;
        }
        if c.right_bound >= left {
            c.right_bound += 2;
        }
    }
}

/// 摘除单个节点，后代上提一级
fn remove_single(categories: &mut Vec<Category>, node: &Category) {
    categories.retain(|c| c.id != node.id);
    for c in categories.iter_mut() {
        for bound in [&mut c.left_bound, &mut c.right_bound] {
            if *bound > node.left_bound && *bound < node.right_bound {
                *bound -= 1;
            } else if *bound > node.right_bound {
                *bound -= 2;
            }
        }
    }
}

/// 摘除整棵子树
fn remove_subtree(categories: &mut Vec<Category>, node: &Category) {
    let span = node.span();
    categories.retain(|c| c.id != node.id && !node.contains(c));
    for c in categories.iter_mut() {
        if c.left_bound > node.right_bound {
            c.left_bound -= span;
        }
        if c.right_bound > node.right_bound {
            c.right_bound -= span;
        }
    }
}

/// 抽取的子树块：节点及后代，连同相对偏移
struct Block {
    members: Vec<Category>,
    span: i64,
}

/// 把子树连根抽出，余下集合闭合空隙
fn extract_block(categories: &mut Vec<Category>, node: &Category) -> Block {
    let mut members: Vec<Category> = categories
        .iter()
        .filter(|c| c.id == node.id || node.contains(c))
        .cloned()
        .collect();
    let span = node.span();
    categories.retain(|c| c.id != node.id && !node.contains(c));
    for c in categories.iter_mut() {
        if c.left_bound > node.right_bound {
            c.left_bound -= span;
        }
        if c.right_bound > node.right_bound {
            c.right_bound -= span;
        }
    }
    // 成员边界改为相对偏移
    for member in members.iter_mut() {
        member.left_bound -= node.left_bound;
        member.right_bound -= node.left_bound;
    }
    Block { members, span }
}

/// 在 new_left 处腾出 span 大小的窗口并放回块
fn insert_block(categories: &mut Vec<Category>, block: Block, new_left: i64) {
    for c in categories.iter_mut() {
        if c.left_bound >= new_left {
            c.left_bound += block.span;
        }
        if c.right_bound >= new_left {
            c.right_bound += block.span;
        }
    }
    for mut member in block.members {
        member.left_bound += new_left;
        member.right_bound += new_left;
        categories.push(member);
    }
    categories.sort_by_key(|c| c.left_bound);
}

/// 依据现有包含关系重建边界，深度优先计数器从1开始
fn reset_bounds(categories: &mut [Category]) {
    let mut order: Vec<usize> = (0..categories.len()).collect();
    order.sort_by_key(|&i| categories[i].left_bound);
    let old: Vec<(i64, i64)> = categories
        .iter()
        .map(|c| (c.left_bound, c.right_bound))
        .collect();

    let mut counter: i64 = 1;
    let mut stack: Vec<usize> = Vec::new();
    for &index in &order {
        while let Some(&open) = stack.last() {
            let contains = old[open].0 < old[index].0 && old[index].1 < old[open].1;
            if contains {
                break;
            }
            stack.pop();
            categories[open].right_bound = counter;
            counter += 1;
        }
        categories[index].left_bound = counter;
        counter += 1;
        stack.push(index);
    }
    while let Some(open) = stack.pop() {
        categories[open].right_bound = counter;
        counter += 1;
    }
}

/// 按left升序的序列计算层级（根为0）
fn with_levels(categories: &[Category]) -> Vec<(i64, u32)> {
    let mut stack: Vec<i64> = Vec::new();
    let mut result = Vec::new();
    for c in categories {
        while let Some(&right) = stack.last() {
            if right < c.left_bound {
                stack.pop();
            } else {
                break;
            }
        }
        result.push((c.id, stack.len() as u32));
        stack.push(c.right_bound);
    }
    result
}

/// 结构不变量检查，违反即树已损坏
fn verify(categories: &[Category]) -> Result<()> {
    let mut bounds = Vec::with_capacity(categories.len() * 2);
    for c in categories {
        if c.left_bound >= c.right_bound {
            return Err(CatalogError::Consistency(format!(
                "category {} has left_bound {} >= right_bound {}",
                c.id, c.left_bound, c.right_bound
            )));
        }
        bounds.push(c.left_bound);
        bounds.push(c.right_bound);
    }
    bounds.sort_unstable();
    for (i, bound) in bounds.iter().enumerate() {
        if *bound != i as i64 + 1 {
            return Err(CatalogError::Consistency(
                "bound set is not a contiguous integer range".to_string(),
            ));
        }
    }
    // 区间要么互不相交要么完全包含
    let mut sorted: Vec<&Category> = categories.iter().collect();
    sorted.sort_by_key(|c| c.left_bound);
    let mut stack: Vec<&Category> = Vec::new();
    for c in sorted {
        while let Some(top) = stack.last() {
            if top.right_bound < c.left_bound {
                stack.pop();
            } else {
                break;
            }
        }
        if let Some(top) = stack.last() {
            if c.right_bound > top.right_bound {
                return Err(CatalogError::Consistency(format!(
                    "categories {} and {} have overlapping bounds",
                    top.id, c.id
                )));
            }
        }
        stack.push(c);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use quill_api::clock::FixedClock;
    use quill_domain::content::{Post, PostStatus};
    use quill_domain::Catalog;
    use quill_infra::store::MemoryStore;
    use std::time::Duration;

    fn now() -> DateTime<Utc> {
        "2024-03-05T10:00:00Z".parse().unwrap()
    }

    async fn service() -> (DefaultCategoryTreeService, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        store
            .insert_catalog(Catalog::new(1, "blog", now()))
            .await
            .unwrap();
        let locks = Arc::new(LockManager::new(Duration::from_secs(1)));
        let ids = Arc::new(IdAllocator::new(store.clone(), locks.clone()));
        let slugs = Arc::new(SlugAllocator::new(store.clone()));
        let clock = Arc::new(FixedClock(now()));
        (
            DefaultCategoryTreeService::new(store.clone(), locks, ids, slugs, clock),
            store,
        )
    }

    fn draft(title: &str) -> CategoryDraft {
        CategoryDraft {
            title: title.to_string(),
            slug: String::new(),
            description: None,
        }
    }

    async fn bounds(store: &MemoryStore, id: i64) -> (i64, i64) {
        let c = store.get_category(1, id).await.unwrap().unwrap();
        (c.left_bound, c.right_bound)
    }

    async fn seed_post(store: &MemoryStore, id: i64, category_id: Option<i64>) {
        store
            .insert_post(Post {
                id,
                catalog_id: 1,
                author_id: 1,
                category_id,
                status: PostStatus::Published,
                title: format!("p{}", id),
                slug: format!("p{}", id),
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
    }

    #[tokio::test]
    async fn test_insert_under_root_assigns_expected_bounds() {
        let (service, store) = service().await;
        let a = service.insert(1, None, draft("A")).await.unwrap();
        assert_eq!((a.left_bound, a.right_bound), (1, 2));

        let b = service.insert(1, Some(a.id), draft("B")).await.unwrap();
        assert_eq!(bounds(&store, a.id).await, (1, 4));
        assert_eq!((b.left_bound, b.right_bound), (2, 3));

        let c = service.insert(1, None, draft("C")).await.unwrap();
        assert_eq!((c.left_bound, c.right_bound), (5, 6));
    }

    #[tokio::test]
    async fn test_insert_rejects_missing_parent_and_empty_title() {
        let (service, _store) = service().await;
        let err = service.insert(1, Some(99), draft("A")).await.unwrap_err();
        assert!(matches!(err, CatalogError::NotFound(_)));
        let err = service.insert(1, None, draft("   ")).await.unwrap_err();
        assert!(matches!(err, CatalogError::Validation(_)));
    }

    #[tokio::test]
    async fn test_delete_subtree_closes_gap() {
        let (service, store) = service().await;
        let a = service.insert(1, None, draft("A")).await.unwrap();
        let b = service.insert(1, Some(a.id), draft("B")).await.unwrap();
        let _c = service.insert(1, Some(b.id), draft("C")).await.unwrap();
        let d = service.insert(1, None, draft("D")).await.unwrap();

        service
            .delete(1, b.id, false, Reassign::Block)
            .await
            .unwrap();
        assert_eq!(bounds(&store, a.id).await, (1, 2));
        assert_eq!(bounds(&store, d.id).await, (3, 4));
    }

    #[tokio::test]
    async fn test_delete_keeping_children_reparents_one_level_up() {
        let (service, store) = service().await;
        let a = service.insert(1, None, draft("A")).await.unwrap();
        let b = service.insert(1, Some(a.id), draft("B")).await.unwrap();
        let c = service.insert(1, Some(b.id), draft("C")).await.unwrap();

        service.delete(1, b.id, true, Reassign::Block).await.unwrap();
        // C成为A的直接子节点
        assert_eq!(bounds(&store, a.id).await, (1, 4));
        assert_eq!(bounds(&store, c.id).await, (2, 3));
    }

    #[tokio::test]
    async fn test_delete_with_posts_requires_reassignment() {
        let (service, store) = service().await;
        let a = service.insert(1, None, draft("A")).await.unwrap();
        let b = service.insert(1, None, draft("B")).await.unwrap();
        seed_post(&store, 1, Some(a.id)).await;

        let err = service
            .delete(1, a.id, false, Reassign::Block)
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::NotEmpty(_)));

        service
            .delete(1, a.id, false, Reassign::ToCategory(b.id))
            .await
            .unwrap();
        let post = store.get_post(1, 1).await.unwrap().unwrap();
        assert_eq!(post.category_id, Some(b.id));
    }

    #[tokio::test]
    async fn test_children_and_parents_traversal() {
        let (service, _store) = service().await;
        let a = service.insert(1, None, draft("A")).await.unwrap();
        let b = service.insert(1, Some(a.id), draft("B")).await.unwrap();
        let c = service.insert(1, Some(b.id), draft("C")).await.unwrap();
        let _d = service.insert(1, None, draft("D")).await.unwrap();

        let descendants = service
            .children(1, Some(a.id), TraversalOrder::Ascending)
            .await
            .unwrap();
        let ids: Vec<i64> = descendants.iter().map(|x| x.id).collect();
        assert_eq!(ids, vec![b.id, c.id]);

        let ancestors = service.parents(1, c.id).await.unwrap();
        let ids: Vec<i64> = ancestors.iter().map(|x| x.id).collect();
        assert_eq!(ids, vec![a.id, b.id]);
    }

    #[tokio::test]
    async fn test_set_parent_preserves_subtree_structure() {
        let (service, store) = service().await;
        let a = service.insert(1, None, draft("A")).await.unwrap();
        let b = service.insert(1, Some(a.id), draft("B")).await.unwrap();
        let c = service.insert(1, Some(b.id), draft("C")).await.unwrap();
        let d = service.insert(1, None, draft("D")).await.unwrap();

        // 把B子树移到D下
        service.set_parent(1, b.id, Some(d.id)).await.unwrap();
        assert_eq!(bounds(&store, a.id).await, (1, 2));
        assert_eq!(bounds(&store, d.id).await, (3, 8));
        assert_eq!(bounds(&store, b.id).await, (4, 7));
        assert_eq!(bounds(&store, c.id).await, (5, 6));
    }

    #[tokio::test]
    async fn test_set_parent_to_root() {
        let (service, store) = service().await;
        let a = service.insert(1, None, draft("A")).await.unwrap();
        let b = service.insert(1, Some(a.id), draft("B")).await.unwrap();

        service.set_parent(1, b.id, None).await.unwrap();
        assert_eq!(bounds(&store, a.id).await, (1, 2));
        assert_eq!(bounds(&store, b.id).await, (3, 4));
    }

    #[tokio::test]
    async fn test_set_parent_rejects_own_descendant() {
        let (service, _store) = service().await;
        let a = service.insert(1, None, draft("A")).await.unwrap();
        let b = service.insert(1, Some(a.id), draft("B")).await.unwrap();
        let err = service.set_parent(1, a.id, Some(b.id)).await.unwrap_err();
        assert!(matches!(err, CatalogError::StructuralConflict(_)));
    }

    #[tokio::test]
    async fn test_set_position_reorders_unequal_spans() {
        let (service, store) = service().await;
        let a = service.insert(1, None, draft("A")).await.unwrap();
        let a1 = service.insert(1, Some(a.id), draft("A1")).await.unwrap();
        let b = service.insert(1, None, draft("B")).await.unwrap();

        // A占(1,4)，B占(5,6)；把B移到A之前
        service
            .set_position(1, b.id, a.id, SiblingPosition::Before)
            .await
            .unwrap();
        assert_eq!(bounds(&store, b.id).await, (1, 2));
        assert_eq!(bounds(&store, a.id).await, (3, 6));
        assert_eq!(bounds(&store, a1.id).await, (4, 5));
    }

    #[tokio::test]
    async fn test_set_position_rejects_non_siblings() {
        let (service, _store) = service().await;
        let a = service.insert(1, None, draft("A")).await.unwrap();
        let b = service.insert(1, Some(a.id), draft("B")).await.unwrap();
        let c = service.insert(1, None, draft("C")).await.unwrap();
        let err = service
            .set_position(1, b.id, c.id, SiblingPosition::After)
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::StructuralConflict(_)));
    }

    #[tokio::test]
    async fn test_reset_order_rebuilds_contiguous_bounds() {
        let (service, store) = service().await;
        let a = service.insert(1, None, draft("A")).await.unwrap();
        let b = service.insert(1, Some(a.id), draft("B")).await.unwrap();
        let c = service.insert(1, None, draft("C")).await.unwrap();

        service.reset_order(1).await.unwrap();
        assert_eq!(bounds(&store, a.id).await, (1, 4));
        assert_eq!(bounds(&store, b.id).await, (2, 3));
        assert_eq!(bounds(&store, c.id).await, (5, 6));
    }

    #[tokio::test]
    async fn test_invariant_holds_after_mixed_operations() {
        let (service, store) = service().await;
        let a = service.insert(1, None, draft("A")).await.unwrap();
        let b = service.insert(1, Some(a.id), draft("B")).await.unwrap();
        let c = service.insert(1, Some(b.id), draft("C")).await.unwrap();
        let d = service.insert(1, None, draft("D")).await.unwrap();
        service.set_parent(1, c.id, Some(d.id)).await.unwrap();
        service.delete(1, b.id, true, Reassign::Block).await.unwrap();
        service
            .set_position(1, d.id, a.id, SiblingPosition::Before)
            .await
            .unwrap();

        let categories = store.list_categories(1).await.unwrap();
        assert!(verify(&categories).is_ok());
    }

    #[tokio::test]
    async fn test_counts_rolls_up_and_hides_empty_after() {
        let (service, store) = service().await;
        let a = service.insert(1, None, draft("A")).await.unwrap();
        let b = service.insert(1, Some(a.id), draft("B")).await.unwrap();
        let c = service.insert(1, Some(b.id), draft("C")).await.unwrap();
        let d = service.insert(1, None, draft("D")).await.unwrap();
        seed_post(&store, 1, Some(c.id)).await;
        seed_post(&store, 2, Some(c.id)).await;

        let counts = service.counts(1, false).await.unwrap();
        let by_id: std::collections::HashMap<i64, i64> =
            counts.iter().map(|x| (x.category_id, x.total)).collect();
        assert_eq!(by_id[&a.id], 2);
        assert_eq!(by_id[&b.id], 2);
        assert_eq!(by_id[&c.id], 2);
        assert_eq!(by_id[&d.id], 0);

        let visible = service.counts(1, true).await.unwrap();
        let ids: Vec<i64> = visible.iter().map(|x| x.category_id).collect();
        // A和B直接计数为0，但子树非空，回卷后保留
        assert_eq!(ids, vec![a.id, b.id, c.id]);
    }

    #[test]
    fn test_verify_detects_overlap() {
        let make = |id, l, r| Category {
            id,
            catalog_id: 1,
            title: format!("c{}", id),
            slug: format!("c{}", id),
            description: None,
            left_bound: l,
            right_bound: r,
        };
        // 边界连续但区间部分重叠
        let broken = vec![make(1, 1, 3), make(2, 2, 4)];
        assert!(matches!(
            verify(&broken),
            Err(CatalogError::Consistency(_))
        ));
    }
}
