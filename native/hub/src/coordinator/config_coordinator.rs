// 配置协调器：编排一次完整的配置生成
// 订阅并发下载 → 合并 → 获取模板与脚本 → 脚本沙箱 → 注入用量信息

use futures_util::stream::{FuturesUnordered, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;

use crate::atoms::{CacheStore, HttpTransport, fetch_text};
use crate::error::{HubError, Result};
use crate::molecules::clash_config::inject_sub_info;
use crate::molecules::override_processing::ScriptSandbox;
use crate::molecules::ruleset_resolution::{MAX_CONCURRENT_FETCHES, RulesetResolver};
use crate::molecules::subscription_management::{
    SUBSCRIPTION_USER_AGENT, SubscriptionResult, download_subscription, merge_subscriptions,
};

// 生成流程参数
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub ruleset_concurrency: usize,
    pub user_agent: String,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            ruleset_concurrency: MAX_CONCURRENT_FETCHES,
            user_agent: SUBSCRIPTION_USER_AGENT.to_string(),
        }
    }
}

// 一次生成请求
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateRequest {
    pub subscription_urls: Vec<String>,
    pub script_url: String,
    pub template_url: String,
}

// 生成结果：配置文本与需要写入响应的头
#[derive(Debug, Clone)]
pub struct GeneratedConfig {
    pub content: String,
    pub headers: HashMap<String, String>,
}

#[derive(Clone)]
pub struct ConfigCoordinator {
    transport: Arc<dyn HttpTransport>,
    sandbox: ScriptSandbox,
    options: PipelineOptions,
}

impl ConfigCoordinator {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        cache: CacheStore,
        options: PipelineOptions,
    ) -> Self {
        let resolver = RulesetResolver::new(cache, Arc::clone(&transport))
            .with_max_concurrency(options.ruleset_concurrency);

        Self {
            transport,
            sandbox: ScriptSandbox::new(resolver),
            options,
        }
    }

    pub async fn generate(&self, request: &GenerateRequest) -> Result<GeneratedConfig> {
        log::info!(
            "开始生成配置：订阅{}个，脚本：{}，模板：{}",
            request.subscription_urls.len(),
            request.script_url,
            request.template_url
        );

        let subscriptions = self
            .fetch_subscriptions(&request.subscription_urls)
            .await
            .inspect_err(|e| log::error!("订阅获取失败：{}", e))?;

        let dataset = Arc::new(merge_subscriptions(subscriptions));

        let (template, script) = tokio::try_join!(
            fetch_text(self.transport.as_ref(), &request.template_url),
            fetch_text(self.transport.as_ref(), &request.script_url),
        )
        .inspect_err(|e| log::error!("模板或脚本获取失败：{}", e))?;

        let config = self
            .sandbox
            .run(script, template, Arc::clone(&dataset))
            .await
            .inspect_err(|e| log::error!("脚本执行失败：{}", e))?;

        let content = inject_sub_info(&config, dataset.usages())
            .inspect_err(|e| log::error!("注入用量信息失败：{}", e))?;

        Ok(GeneratedConfig {
            content,
            headers: dataset.transparent_headers().clone(),
        })
    }

    // 并发下载全部订阅，结果按请求顺序排列。
    // 失败时返回请求顺序中第一个失败的订阅，错误前附上其地址。
    async fn fetch_subscriptions(&self, urls: &[String]) -> Result<Vec<SubscriptionResult>> {
        let mut tasks = FuturesUnordered::new();

        for (index, url) in urls.iter().enumerate() {
            let transport = Arc::clone(&self.transport);
            let user_agent = self.options.user_agent.clone();
            let url = url.clone();
            let fallback_name = format!("订阅{:02}", index + 1);

            tasks.push(tokio::spawn(async move {
                let result =
                    download_subscription(transport.as_ref(), &url, &fallback_name, &user_agent)
                        .await;
                (index, result)
            }));
        }

        let mut outcomes: HashMap<usize, Result<SubscriptionResult>> = HashMap::new();
        while let Some(joined) = tasks.next().await {
            let (index, result) =
                joined.map_err(|e| HubError::Task(format!("订阅下载任务异常：{}", e)))?;
            outcomes.insert(index, result);
        }

        urls.iter()
            .enumerate()
            .map(|(index, url)| match outcomes.remove(&index) {
                Some(Ok(result)) => Ok(result),
                Some(Err(source)) => Err(HubError::Subscription {
                    url: url.clone(),
                    source: Box::new(source),
                }),
                None => Err(HubError::Task(format!("订阅结果缺失：{}", url))),
            })
            .collect()
    }
}
