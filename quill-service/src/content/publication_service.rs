use chrono::Duration;
use quill_api::clock::Clock;
use quill_api::query::{queries, Sort};
use quill_api::Result;
use quill_domain::content::PostStatus;
use quill_infra::CatalogStore;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;

const EVENT_CHANNEL_CAPACITY: usize = 16;

/// PublishEvent 首次发布事件
///
/// 只在 `first_published` 从假翻真的那一刻发出，每个id一生一次。
#[derive(Debug, Clone)]
pub struct PublishEvent {
    pub catalog_id: i64,
    pub post_ids: Vec<i64>,
}

/// PublicationService 发布生命周期服务
///
/// 状态机变更、定时发布清扫、首次发布标志与事件、派生计数。
/// 本服务不自带调度器，清扫由外部触发（渲染、cron）调用。
pub struct PublicationService {
    store: Arc<dyn CatalogStore>,
    clock: Arc<dyn Clock>,
    events: broadcast::Sender<PublishEvent>,
}

impl PublicationService {
    pub fn new(store: Arc<dyn CatalogStore>, clock: Arc<dyn Clock>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            store,
            clock,
            events,
        }
    }

    /// 订阅首次发布事件
    pub fn subscribe(&self) -> broadcast::Receiver<PublishEvent> {
        self.events.subscribe()
    }

    /// 批量状态变更
    ///
    /// 任何状态可达任何状态（含取消发布）；进入Published的id
    /// 走一次首次发布确认。
    pub async fn change_status(
        &self,
        catalog_id: i64,
        ids: &[i64],
        status: PostStatus,
    ) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        self.store.update_post_status(catalog_id, ids, status).await?;
        if status == PostStatus::Published {
            self.confirm_published(catalog_id, ids).await?;
        }
        self.touch(catalog_id).await
    }

    /// 首次发布确认：对尚未标记的id置位并广播事件
    ///
    /// 标志单向，已标记的id不重复进事件。无订阅者时发送失败被忽略。
    pub async fn confirm_published(&self, catalog_id: i64, ids: &[i64]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let condition = queries::in_condition("id", ids.iter().map(|id| json!(id)).collect())
            .and(queries::equal("firstPublished", json!(false)));
        let fresh: Vec<i64> = self
            .store
            .query_posts(catalog_id, &condition, &Sort::ascending("id"), None)
            .await?
            .into_iter()
            .map(|p| p.id)
            .collect();
        if fresh.is_empty() {
            return Ok(());
        }
        self.store.mark_first_published(catalog_id, &fresh).await?;
        let _ = self.events.send(PublishEvent {
            catalog_id,
            post_ids: fresh,
        });
        Ok(())
    }

    /// 定时发布清扫
    ///
    /// 处于Scheduled且按文章时区换算后已到点的文章，整批转为
    /// Published。先收集合格id，再做单次批量更新，失败不产生
    /// 半途状态。返回本批发布的id。
    pub async fn sweep(&self, catalog_id: i64) -> Result<Vec<i64>> {
        let scheduled = self
            .store
            .query_posts(
                catalog_id,
                &queries::equal("status", json!(i8::from(PostStatus::Scheduled))),
                &Sort::ascending("id"),
                None,
            )
            .await?;
        let now = self.clock.now();
        let eligible: Vec<i64> = scheduled
            .iter()
            .filter(|post| now + Duration::minutes(post.utc_offset_minutes as i64) >= post.published_at)
            .map(|post| post.id)
            .collect();
        if eligible.is_empty() {
            return Ok(eligible);
        }
        debug!(catalog_id, count = eligible.len(), "scheduled publish sweep");
        self.store
            .update_post_status(catalog_id, &eligible, PostStatus::Published)
            .await?;
        self.confirm_published(catalog_id, &eligible).await?;
        self.touch(catalog_id).await?;
        Ok(eligible)
    }

    /// 重算受影响文章的已发布评论/trackback计数
    ///
    /// 无匹配行时显式写零，不留空。
    pub async fn refresh_comment_counters(&self, catalog_id: i64, post_ids: &[i64]) -> Result<()> {
        if post_ids.is_empty() {
            return Ok(());
        }
        let totals = self
            .store
            .published_comment_totals(catalog_id, post_ids)
            .await?;
        self.store.update_post_counters(catalog_id, &totals).await?;
        self.touch(catalog_id).await
    }

    /// 刷新目录时间戳（前端缓存失效信号）
    pub async fn touch(&self, catalog_id: i64) -> Result<()> {
        self.store.touch_catalog(catalog_id, self.clock.now()).await
    }
}
