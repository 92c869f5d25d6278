// L1 分子层：订阅、规则集、脚本与配置构建

pub mod clash_config;
pub mod override_processing;
pub mod ruleset_resolution;
pub mod subscription_management;
