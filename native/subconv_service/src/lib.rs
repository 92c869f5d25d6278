// Subconv Service Library
//
// 订阅转换 HTTP 服务：读取环境配置，组装缓存与传输层，对外提供 /ping 与 /sub

pub mod config;
pub mod logger;
pub mod server;

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use subconv_hub::atoms::{CacheStore, FileBackend, ReqwestTransport};
use subconv_hub::{ConfigCoordinator, PipelineOptions};

pub use config::ServiceConfig;

// 单次上游请求超时
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

// 服务主入口
pub async fn run() -> Result<()> {
    log::info!("Subconv Service v{} 启动", env!("CARGO_PKG_VERSION"));

    let config = ServiceConfig::from_env()?;
    log::info!(
        "缓存文件: {}，缓存有效期: {}s",
        config.cache_path.display(),
        config.cache_expire.as_secs()
    );

    let backend = FileBackend::open(&config.cache_path)
        .await
        .with_context(|| format!("打开缓存文件失败: {}", config.cache_path.display()))?;
    let cache = CacheStore::new(Arc::new(backend), config.cache_expire);
    let transport = ReqwestTransport::new(HTTP_TIMEOUT).context("创建 HTTP 客户端失败")?;
    let coordinator =
        ConfigCoordinator::new(Arc::new(transport), cache, PipelineOptions::default());

    let state = Arc::new(server::AppState::new(coordinator, &config));
    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("监听 {} 失败", config.listen_addr))?;

    log::info!("HTTP 服务已启动，监听: {}", config.listen_addr);

    axum::serve(listener, server::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP 服务运行失败")?;

    log::info!("服务已停止");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => log::info!("收到 Ctrl+C 信号，正在停止服务..."),
        Err(e) => {
            log::error!("无法注册 Ctrl+C 处理器: {e}");
            std::future::pending::<()>().await;
        }
    }
}
