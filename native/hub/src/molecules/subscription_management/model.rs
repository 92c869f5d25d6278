// 订阅数据模型

use serde_yaml_ng::Mapping;
use std::collections::HashMap;

// 代理节点：内容对本服务不透明，原样透传
pub type ProxyNode = Mapping;

// 单个订阅的流量与状态信息，缺失字段为 0
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UsageMetadata {
    pub url: String,
    pub name: String,
    pub upload: i64,
    pub download: i64,
    pub total: i64,
    pub expire: i64, // Unix 秒
    pub status_code: u16,
    pub raw_body: String, // 原始响应体，排查问题用
}

// 一次订阅获取的结果
#[derive(Debug, Clone, Default)]
pub struct SubscriptionResult {
    pub proxies: Vec<ProxyNode>,
    pub transparent_headers: HashMap<String, String>,
    pub usage: UsageMetadata,
}

impl SubscriptionResult {
    pub fn url(&self) -> &str {
        &self.usage.url
    }

    pub fn name(&self) -> &str {
        &self.usage.name
    }
}

// 合并后的订阅数据，构建后只读
#[derive(Debug, Clone, Default)]
pub struct MergedDataset {
    pub(super) proxies: Vec<ProxyNode>,
    pub(super) transparent_headers: HashMap<String, String>,
    pub(super) usages: Vec<UsageMetadata>,
}

impl MergedDataset {
    pub fn proxies(&self) -> &[ProxyNode] {
        &self.proxies
    }

    pub fn transparent_headers(&self) -> &HashMap<String, String> {
        &self.transparent_headers
    }

    pub fn usages(&self) -> &[UsageMetadata] {
        &self.usages
    }
}
