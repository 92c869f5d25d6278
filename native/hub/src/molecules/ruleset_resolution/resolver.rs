// 规则集解析器：并发获取脚本声明的规则集内容，经缓存读取，按声明顺序返回

use futures_util::stream::{FuturesUnordered, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Semaphore;

use crate::atoms::{CacheStore, HttpTransport, fetch_text};
use crate::error::{HubError, Result};

// 同时进行的规则集获取上限
pub const MAX_CONCURRENT_FETCHES: usize = 8;

// 脚本中 r(tag, url) 的一次声明
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RulesetDeclaration {
    pub tag: String,
    pub url: String,
}

// 获取到内容的规则集
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRuleset {
    pub tag: String,
    pub url: String,
    pub content: String,
}

#[derive(Clone)]
pub struct RulesetResolver {
    cache: CacheStore,
    transport: Arc<dyn HttpTransport>,
    max_concurrency: usize,
}

impl RulesetResolver {
    pub fn new(cache: CacheStore, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            cache,
            transport,
            max_concurrency: MAX_CONCURRENT_FETCHES,
        }
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.clamp(1, MAX_CONCURRENT_FETCHES);
        self
    }

    // 解析全部声明。同一 URL 只获取一次；任一获取失败则整体失败，
    // 但会等待其余已发起的获取结束后才返回。
    pub async fn resolve(
        &self,
        declarations: &[RulesetDeclaration],
    ) -> Result<Vec<ResolvedRuleset>> {
        if declarations.is_empty() {
            return Ok(Vec::new());
        }

        let mut unique_urls: Vec<&str> = Vec::new();
        for declaration in declarations {
            if !unique_urls.contains(&declaration.url.as_str()) {
                unique_urls.push(&declaration.url);
            }
        }

        log::info!(
            "开始获取规则集：声明{}个，去重后{}个，并发数：{}",
            declarations.len(),
            unique_urls.len(),
            self.max_concurrency
        );

        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let mut tasks = FuturesUnordered::new();

        for url in unique_urls {
            let url = url.to_string();
            let semaphore = Arc::clone(&semaphore);
            let cache = self.cache.clone();
            let transport = Arc::clone(&self.transport);

            let handle = tokio::spawn(async move {
                let result = match semaphore.acquire_owned().await {
                    Ok(_permit) => {
                        cache
                            .get_or_populate(&url, move |key| async move {
                                fetch_text(transport.as_ref(), &key).await
                            })
                            .await
                    }
                    Err(e) => Err(HubError::Task(e.to_string())),
                };
                (url, result)
            });
            tasks.push(handle);
        }

        let mut contents: HashMap<String, String> = HashMap::new();
        let mut first_error: Option<HubError> = None;

        while let Some(joined) = tasks.next().await {
            let outcome = joined
                .map_err(|e| HubError::Task(format!("规则集获取任务异常：{}", e)))
                .and_then(|(url, result)| result.map(|body| (url, body)));

            match outcome {
                Ok((url, body)) => {
                    contents.insert(url, body);
                }
                Err(e) => {
                    log::error!("规则集获取失败：{}", e);
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }

        if let Some(e) = first_error {
            return Err(e);
        }

        let resolved = declarations
            .iter()
            .map(|declaration| {
                let content = contents.get(&declaration.url).cloned().ok_or_else(|| {
                    HubError::Task(format!("规则集内容缺失：{}", declaration.url))
                })?;
                Ok(ResolvedRuleset {
                    tag: declaration.tag.clone(),
                    url: declaration.url.clone(),
                    content,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        log::info!("规则集获取完成，共{}个", resolved.len());
        Ok(resolved)
    }
}
