// Clash 配置构建分子模块

pub mod generator;
pub mod injector;

pub use generator::{RULE_TYPES, build_config, rewrite_rules};
pub use injector::{SUB_INFO_GROUP_NAME, inject_sub_info};
