use quill_api::Result;
use quill_domain::content::constant::IdTable;
use quill_infra::{CatalogStore, LockManager};
use std::sync::Arc;
use tokio::sync::OwnedMutexGuard;

/// IdReservation 一次ID分配的结果
///
/// 持有表级锁的guard：调用方应在新行落库之后再丢弃它，
/// 这样同一张表的下一次分配必然读到新的最大值。
#[derive(Debug)]
pub struct IdReservation {
    pub id: i64,
    _guard: OwnedMutexGuard<()>,
}

/// IdAllocator 顺序ID分配器
///
/// 每次分配都重新读取存储的最大id，不在进程内缓存下一个值，
/// 以容忍其他进程的写入。以吞吐换取多进程部署下的正确性。
pub struct IdAllocator {
    store: Arc<dyn CatalogStore>,
    locks: Arc<LockManager>,
}

impl IdAllocator {
    pub fn new(store: Arc<dyn CatalogStore>, locks: Arc<LockManager>) -> Self {
        Self { store, locks }
    }

    /// 分配目标表的下一个id
    ///
    /// 锁获取超时返回 `LockTimeout`，最大值读取失败返回 `Storage`。
    pub async fn next(&self, table: IdTable) -> Result<IdReservation> {
        let guard = self.locks.lock_table(table).await?;
        let max = self.store.max_id(table).await?;
        Ok(IdReservation {
            id: max + 1,
            _guard: guard,
        })
    }
}
