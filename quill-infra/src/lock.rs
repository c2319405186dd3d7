use quill_api::{CatalogError, Result};
use quill_domain::content::constant::IdTable;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// LockManager 有界等待的互斥锁管理器
///
/// 两类共享资源需要串行化：每张表的顺序ID分配、每个目录的
/// 分类树结构变更。锁按需创建，等待超过上限返回 `LockTimeout`。
pub struct LockManager {
    timeout: Duration,
    /// 表级锁：ID分配
    table_locks: Mutex<HashMap<IdTable, Arc<AsyncMutex<()>>>>,
    /// 目录级锁：嵌套集合结构变更
    catalog_locks: Mutex<HashMap<i64, Arc<AsyncMutex<()>>>>,
}

impl LockManager {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            table_locks: Mutex::new(HashMap::new()),
            catalog_locks: Mutex::new(HashMap::new()),
        }
    }

    /// 获取表级锁，持有返回的guard直到新行落库
    pub async fn lock_table(&self, table: IdTable) -> Result<OwnedMutexGuard<()>> {
        let lock = {
            let mut locks = self.table_locks.lock().unwrap();
            locks
                .entry(table)
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        self.acquire(lock, || format!("table {}", table.as_str()))
            .await
    }

    /// 获取目录级结构锁，覆盖整个边界重算过程
    pub async fn lock_catalog(&self, catalog_id: i64) -> Result<OwnedMutexGuard<()>> {
        let lock = {
            let mut locks = self.catalog_locks.lock().unwrap();
            locks
                .entry(catalog_id)
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        self.acquire(lock, || format!("catalog {}", catalog_id)).await
    }

    async fn acquire(
        &self,
        lock: Arc<AsyncMutex<()>>,
        what: impl Fn() -> String,
    ) -> Result<OwnedMutexGuard<()>> {
        tokio::time::timeout(self.timeout, lock.lock_owned())
            .await
            .map_err(|_| CatalogError::LockTimeout(what()))
    }
}

impl Default for LockManager {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}
