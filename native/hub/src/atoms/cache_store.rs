// 远程文本缓存：按 URL 读取，过期或缺失时回源并落盘。
// 带查询参数的 URL 视为动态内容，直接回源，不读写缓存。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::fs as async_fs;
use tokio::sync::RwLock;

use crate::error::{Result, StoreError};

// 默认缓存有效期：24 小时
pub const DEFAULT_CACHE_EXPIRE: Duration = Duration::from_secs(24 * 60 * 60);

// 缓存条目
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub body: String,
    pub updated_at_ms: i64, // 最近一次成功回源的时间（Unix 毫秒）
}

impl CacheEntry {
    pub fn new(body: String) -> Self {
        Self {
            body,
            updated_at_ms: chrono::Utc::now().timestamp_millis(),
        }
    }

    fn is_fresh(&self, expire: Duration, now_ms: i64) -> bool {
        let age_ms = now_ms.saturating_sub(self.updated_at_ms);
        age_ms >= 0 && (age_ms as u128) < expire.as_millis()
    }
}

// 缓存持久化后端
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> std::result::Result<Option<CacheEntry>, StoreError>;

    // 写入内容并刷新时间戳
    async fn put(&self, key: &str, body: &str) -> std::result::Result<(), StoreError>;
}

// 内存后端（测试与临时运行）
#[derive(Default)]
pub struct MemoryBackend {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl CacheBackend for MemoryBackend {
    async fn get(&self, key: &str) -> std::result::Result<Option<CacheEntry>, StoreError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn put(&self, key: &str, body: &str) -> std::result::Result<(), StoreError> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), CacheEntry::new(body.to_string()));
        Ok(())
    }
}

// 文件后端：整个缓存保存为一个 JSON 文件，启动时载入，每次写入整体落盘
pub struct FileBackend {
    path: PathBuf,
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl FileBackend {
    pub async fn open(path: impl Into<PathBuf>) -> std::result::Result<Self, StoreError> {
        let path = path.into();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            async_fs::create_dir_all(parent).await?;
        }

        let entries = match async_fs::read_to_string(&path).await {
            Ok(content) if content.trim().is_empty() => HashMap::new(),
            Ok(content) => serde_json::from_str(&content)?,
            Err(e) if e.kind() == ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };

        log::info!(
            "缓存文件已载入：{}（{} 条）",
            path.display(),
            entries.len()
        );

        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }

    // 先写临时文件再重命名，避免中途失败留下半个文件
    async fn persist(
        &self,
        entries: &HashMap<String, CacheEntry>,
    ) -> std::result::Result<(), StoreError> {
        let json_str = serde_json::to_string(entries)?;
        let tmp_path = self.path.with_extension("tmp");
        async_fs::write(&tmp_path, json_str).await?;
        async_fs::rename(&tmp_path, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl CacheBackend for FileBackend {
    async fn get(&self, key: &str) -> std::result::Result<Option<CacheEntry>, StoreError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn put(&self, key: &str, body: &str) -> std::result::Result<(), StoreError> {
        // 持有写锁直到落盘完成，写入者串行
        let mut entries = self.entries.write().await;
        let mut updated = entries.clone();
        updated.insert(key.to_string(), CacheEntry::new(body.to_string()));
        self.persist(&updated).await?;
        *entries = updated;
        Ok(())
    }
}

// 缓存存储：在后端之上实现过期策略
#[derive(Clone)]
pub struct CacheStore {
    backend: Arc<dyn CacheBackend>,
    expire: Duration,
}

impl CacheStore {
    pub fn new(backend: Arc<dyn CacheBackend>, expire: Duration) -> Self {
        Self { backend, expire }
    }

    // 读取缓存，缺失或过期时调用 supplier 回源并覆盖旧条目。
    // 回源失败时原条目保持不变；落盘失败返回 Storage 错误。
    pub async fn get_or_populate<F, Fut>(&self, key: &str, supplier: F) -> Result<String>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<String>>,
    {
        if key.contains('?') {
            log::debug!("URL 含查询参数，跳过缓存：{}", key);
            return supplier(key.to_string()).await;
        }

        let cached = self.backend.get(key).await?;
        let now_ms = chrono::Utc::now().timestamp_millis();

        match &cached {
            Some(entry) if entry.is_fresh(self.expire, now_ms) => {
                log::info!("使用缓存：{}", key);
                return Ok(entry.body.clone());
            }
            Some(_) => log::info!("缓存已过期：{}", key),
            None => log::info!("缓存未命中：{}", key),
        }

        let body = supplier(key.to_string()).await?;

        self.backend.put(key, &body).await.map_err(|e| {
            log::error!("写入缓存失败：{} - {}", key, e);
            e
        })?;

        Ok(body)
    }
}
