// 用量信息注入器：为每个订阅生成一个显示用量的占位节点，并放入 "Sub Info" 代理组

use serde_yaml_ng::{Mapping, Value as YamlValue};

use crate::error::{HubError, Result};
use crate::molecules::subscription_management::UsageMetadata;

pub const SUB_INFO_GROUP_NAME: &str = "Sub Info";

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

// 占位节点：不可用的 ss 节点，仅用于在客户端界面显示名称
fn dummy_node(name: &str) -> YamlValue {
    let mut node = Mapping::new();
    node.insert(YamlValue::from("name"), YamlValue::from(name));
    node.insert(YamlValue::from("type"), YamlValue::from("ss"));
    node.insert(YamlValue::from("server"), YamlValue::from("127.0.0.1"));
    node.insert(YamlValue::from("port"), YamlValue::from(1080));
    node.insert(YamlValue::from("cipher"), YamlValue::from("aes-128-gcm"));
    node.insert(YamlValue::from("password"), YamlValue::from("dummy"));
    YamlValue::Mapping(node)
}

// 用量显示名：<订阅名>：<已用 GiB>/<总量 GiB>
fn usage_label(usage: &UsageMetadata) -> String {
    let used = usage.upload.saturating_add(usage.download) as f64 / GIB;
    let total = usage.total as f64 / GIB;
    format!("{}：{:.1}/{:.1}", usage.name, used, total)
}

// 插到序列最前面，字段缺失或不是序列时新建
fn prepend_sequence(config_map: &mut Mapping, key: &str, items: Vec<YamlValue>) {
    match config_map.get_mut(key) {
        Some(YamlValue::Sequence(existing)) => {
            existing.splice(0..0, items);
        }
        _ => {
            config_map.insert(YamlValue::from(key), YamlValue::Sequence(items));
        }
    }
}

pub fn inject_sub_info(yaml_content: &str, usages: &[UsageMetadata]) -> Result<String> {
    let mut config: YamlValue =
        serde_yaml_ng::from_str(yaml_content).map_err(|e| HubError::yaml("生成的配置", e))?;

    let config_map = config.as_mapping_mut().ok_or_else(|| {
        log::error!("配置根节点不是 Map");
        HubError::InvalidDocument
    })?;

    let labels: Vec<String> = usages.iter().map(usage_label).collect();

    // 每个占位节点都插到最前面，最终顺序与订阅顺序相反
    let placeholders: Vec<YamlValue> = labels.iter().rev().map(|l| dummy_node(l)).collect();
    prepend_sequence(config_map, "proxies", placeholders);

    let mut group = Mapping::new();
    group.insert(YamlValue::from("name"), YamlValue::from(SUB_INFO_GROUP_NAME));
    group.insert(YamlValue::from("type"), YamlValue::from("select"));
    group.insert(
        YamlValue::from("proxies"),
        YamlValue::Sequence(labels.iter().map(|l| YamlValue::from(l.as_str())).collect()),
    );

    prepend_sequence(config_map, "proxy-groups", vec![YamlValue::Mapping(group)]);

    for label in &labels {
        log::info!("注入用量信息：{}", label);
    }

    serde_yaml_ng::to_string(&config).map_err(|e| HubError::yaml("最终配置", e))
}
