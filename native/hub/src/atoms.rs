// L0 原子层：缓存、HTTP 访问、脚本执行器

pub mod cache_store;
pub mod http_client;
#[cfg(test)]
pub mod mock_transport;
pub mod override_processor;

pub use cache_store::{
    CacheBackend, CacheEntry, CacheStore, DEFAULT_CACHE_EXPIRE, FileBackend, MemoryBackend,
};
pub use http_client::{HttpResponse, HttpTransport, ReqwestTransport, fetch_text};
pub use override_processor::JsExecutor;
