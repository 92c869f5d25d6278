// 订阅管理分子模块

pub mod downloader;
pub mod merger;
pub mod model;

pub use downloader::{
    CLASH_HEADERS, SUBSCRIPTION_USER_AGENT, download_subscription, extract_filename,
    parse_subscription_response, parse_subscription_userinfo,
};
pub use merger::merge_subscriptions;
pub use model::{MergedDataset, ProxyNode, SubscriptionResult, UsageMetadata};
