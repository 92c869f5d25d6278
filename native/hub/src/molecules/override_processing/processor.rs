// 生成脚本处理器
// 在隔离的 JavaScript 环境中执行脚本：收集规则集声明 → 获取规则集 → 构建配置 → buildConfig 后处理

use serde_yaml_ng::Value as YamlValue;
use std::sync::Arc;
use tokio::runtime::Handle;

use crate::atoms::JsExecutor;
use crate::error::{HubError, Result};
use crate::molecules::clash_config::build_config;
use crate::molecules::ruleset_resolution::RulesetResolver;
use crate::molecules::subscription_management::MergedDataset;

#[derive(Clone)]
pub struct ScriptSandbox {
    resolver: RulesetResolver,
}

impl ScriptSandbox {
    pub fn new(resolver: RulesetResolver) -> Self {
        Self { resolver }
    }

    // 执行脚本并返回序列化后的配置。
    // 解释器运行在阻塞线程上，规则集获取回到异步运行时完成。
    pub async fn run(
        &self,
        script: String,
        template: String,
        dataset: Arc<MergedDataset>,
    ) -> Result<String> {
        let handle = Handle::current();
        let resolver = self.resolver.clone();

        tokio::task::spawn_blocking(move || {
            execute(&handle, &resolver, &script, &template, &dataset)
        })
        .await
        .map_err(|e| {
            log::error!("脚本执行线程异常：{}", e);
            HubError::Task(format!("脚本执行线程异常：{}", e))
        })?
    }
}

fn execute(
    handle: &Handle,
    resolver: &RulesetResolver,
    script: &str,
    template: &str,
    dataset: &MergedDataset,
) -> Result<String> {
    let executor = JsExecutor::new()?;
    executor.load(script)?;

    // 脚本回调全部完成后才开始获取，回调中抛出异常则不会发起任何请求
    let declarations = executor.collect_rulesets()?;
    log::info!("脚本声明了{}个规则集", declarations.len());

    let rulesets = handle.block_on(resolver.resolve(&declarations))?;

    let config = build_config(template, dataset, &rulesets)?;
    let config = match executor.apply_build_config(&config)? {
        Some(updated) => updated,
        None => config,
    };

    serialize_config(&config)
}

fn serialize_config(config: &YamlValue) -> Result<String> {
    let output = serde_yaml_ng::to_string(config).map_err(|e| HubError::yaml("最终配置", e))?;
    log::info!("配置生成完成，长度：{}字节", output.len());
    Ok(output)
}
