// Clash 配置生成器：解析模板，写入合并后的节点，并把规则集改写为带策略的规则

use once_cell::sync::Lazy;
use serde_yaml_ng::{Mapping, Value as YamlValue};
use std::collections::HashSet;

use crate::error::{HubError, Result};
use crate::molecules::ruleset_resolution::ResolvedRuleset;
use crate::molecules::subscription_management::MergedDataset;

// 可识别的规则类型，其余行视为注释或不支持的指令直接丢弃
pub static RULE_TYPES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "DOMAIN",
        "DOMAIN-SUFFIX",
        "DOMAIN-KEYWORD",
        "DOMAIN-REGEX",
        "GEOSITE",
        "IP-CIDR",
        "IP-CIDR6",
        "IP-SUFFIX",
        "IP-ASN",
        "GEOIP",
        "SRC-GEOIP",
        "SRC-IP-ASN",
        "SRC-IP-CIDR",
        "SRC-IP-SUFFIX",
        "DST-PORT",
        "SRC-PORT",
        "IN-PORT",
        "IN-TYPE",
        "IN-USER",
        "IN-NAME",
        "PROCESS-PATH",
        "PROCESS-PATH-REGEX",
        "PROCESS-NAME",
        "PROCESS-NAME-REGEX",
        "UID",
        "NETWORK",
        "DSCP",
        "RULE-SET",
        "AND",
        "OR",
        "NOT",
        "SUB-RULE",
    ]
    .into_iter()
    .collect()
});

// 根据模板构建配置：proxies 与 rules 字段整体覆盖
pub fn build_config(
    template: &str,
    dataset: &MergedDataset,
    rulesets: &[ResolvedRuleset],
) -> Result<YamlValue> {
    let mut config: YamlValue =
        serde_yaml_ng::from_str(template).map_err(|e| HubError::yaml("模板", e))?;

    if config.is_null() {
        config = YamlValue::Mapping(Mapping::new());
    }
    let config_map = config.as_mapping_mut().ok_or_else(|| {
        log::error!("模板根节点不是 Map");
        HubError::InvalidDocument
    })?;

    let proxies = dataset
        .proxies()
        .iter()
        .cloned()
        .map(YamlValue::Mapping)
        .collect();
    config_map.insert(YamlValue::from("proxies"), YamlValue::Sequence(proxies));

    let rules = rewrite_rules(rulesets)?
        .into_iter()
        .map(YamlValue::String)
        .collect();
    config_map.insert(YamlValue::from("rules"), YamlValue::Sequence(rules));

    log_config_summary(&config);
    Ok(config)
}

// 逐行改写规则集内容，为每条规则插入规则集的策略标签。
// TYPE,VALUE,OPTION 改写为 TYPE,VALUE,tag,OPTION；其他情况在行尾追加 ,tag。
pub fn rewrite_rules(rulesets: &[ResolvedRuleset]) -> Result<Vec<String>> {
    let mut rules = Vec::new();

    for ruleset in rulesets {
        let tag = &ruleset.tag;
        let before = rules.len();

        for line in ruleset.content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let components: Vec<&str> = line.split(',').collect();
            if components.len() < 2 {
                log::error!("规则格式错误 [{}]：{}", tag, line);
                return Err(HubError::MalformedRule {
                    tag: tag.clone(),
                    line: line.to_string(),
                });
            }

            if !RULE_TYPES.contains(components[0]) {
                continue;
            }

            if components.len() == 3 {
                rules.push(format!(
                    "{},{},{},{}",
                    components[0], components[1], tag, components[2]
                ));
            } else {
                rules.push(format!("{},{}", line, tag));
            }
        }

        log::debug!(
            "规则集 [{}] 生成{}条规则：{}",
            tag,
            rules.len() - before,
            ruleset.url
        );
    }

    Ok(rules)
}

// 输出配置摘要到日志
fn log_config_summary(config: &YamlValue) {
    let count = |key: &str| {
        config
            .get(key)
            .and_then(|v| v.as_sequence())
            .map(|s| s.len())
            .unwrap_or(0)
    };

    log::info!(
        "配置统计：节点={}, 代理组={}, 规则={}",
        count("proxies"),
        count("proxy-groups"),
        count("rules")
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::molecules::subscription_management::{SubscriptionResult, merge_subscriptions};

    fn ruleset(tag: &str, content: &str) -> ResolvedRuleset {
        ResolvedRuleset {
            tag: tag.to_string(),
            url: format!("https://rules.test/{}", tag),
            content: content.to_string(),
        }
    }

    fn dataset_with_nodes(names: &[&str]) -> MergedDataset {
        let proxies = names
            .iter()
            .map(|name| {
                let mut node = Mapping::new();
                node.insert(YamlValue::from("name"), YamlValue::from(*name));
                node.insert(YamlValue::from("type"), YamlValue::from("ss"));
                node
            })
            .collect();
        merge_subscriptions(vec![SubscriptionResult {
            proxies,
            ..Default::default()
        }])
    }

    #[test]
    fn test_rewrite_two_and_three_components() {
        let rules = rewrite_rules(&[ruleset(
            "Proxy",
            "DOMAIN-SUFFIX,google.com\nIP-CIDR,1.1.1.1/32,no-resolve\n",
        )])
        .unwrap();

        assert_eq!(
            rules,
            vec![
                "DOMAIN-SUFFIX,google.com,Proxy",
                "IP-CIDR,1.1.1.1/32,Proxy,no-resolve",
            ]
        );
    }

    #[test]
    fn test_mixed_ruleset_body() {
        let rules = rewrite_rules(&[ruleset(
            "A",
            "DOMAIN,example.com\nDOMAIN-SUFFIX,foo.com,no-resolve\n# comment\n\nBOGUS,x",
        )])
        .unwrap();

        assert_eq!(
            rules,
            vec!["DOMAIN,example.com,A", "DOMAIN-SUFFIX,foo.com,A,no-resolve"]
        );
    }

    #[test]
    fn test_comments_blank_and_unknown_lines_are_skipped() {
        let rules = rewrite_rules(&[ruleset(
            "DIRECT",
            "# header\n\n   \n  # indented comment\nUSER-AGENT,curl*\nDOMAIN,example.com\n",
        )])
        .unwrap();

        assert_eq!(rules, vec!["DOMAIN,example.com,DIRECT"]);
    }

    #[test]
    fn test_more_components_append_tag() {
        let rules = rewrite_rules(&[ruleset(
            "Block",
            "AND,((DOMAIN,ads.com),(NETWORK,UDP))\nIP-CIDR6,::1/128,x,no-resolve",
        )])
        .unwrap();

        assert_eq!(
            rules,
            vec![
                "AND,((DOMAIN,ads.com),(NETWORK,UDP)),Block",
                "IP-CIDR6,::1/128,x,no-resolve,Block",
            ]
        );
    }

    #[test]
    fn test_single_component_line_is_fatal() {
        let err = rewrite_rules(&[ruleset("Proxy", "DOMAIN,a.com\nnot-a-rule\n")]).unwrap_err();

        match err {
            HubError::MalformedRule { tag, line } => {
                assert_eq!(tag, "Proxy");
                assert_eq!(line, "not-a-rule");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_rules_follow_ruleset_order() {
        let rules = rewrite_rules(&[
            ruleset("A", "DOMAIN,a1.com\nDOMAIN,a2.com"),
            ruleset("B", "DOMAIN,b1.com"),
        ])
        .unwrap();

        assert_eq!(
            rules,
            vec!["DOMAIN,a1.com,A", "DOMAIN,a2.com,A", "DOMAIN,b1.com,B"]
        );
    }

    #[test]
    fn test_build_config_overwrites_proxies_and_rules() {
        let template = "\
mixed-port: 7890
proxies:
  - name: stale
proxy-groups:
  - name: Proxy
    type: select
rules:
  - MATCH,DIRECT
";
        let dataset = dataset_with_nodes(&["HK-01", "JP-01"]);

        let config =
            build_config(template, &dataset, &[ruleset("Proxy", "DOMAIN,a.com")]).unwrap();

        assert_eq!(config["mixed-port"].as_i64(), Some(7890));
        let names: Vec<&str> = config["proxies"]
            .as_sequence()
            .unwrap()
            .iter()
            .filter_map(|p| p.get("name").and_then(|v| v.as_str()))
            .collect();
        assert_eq!(names, vec!["HK-01", "JP-01"]);
        assert_eq!(
            config["rules"].as_sequence().unwrap(),
            &vec![YamlValue::from("DOMAIN,a.com,Proxy")]
        );
        assert_eq!(config["proxy-groups"].as_sequence().map(|s| s.len()), Some(1));
    }

    #[test]
    fn test_demo_template_builds() {
        let template = include_str!("../../../../../demos/template.yaml");
        let config = build_config(template, &dataset_with_nodes(&["HK-01"]), &[]).unwrap();

        assert_eq!(config["mode"].as_str(), Some("rule"));
        assert_eq!(config["proxy-groups"].as_sequence().map(|s| s.len()), Some(2));
        assert_eq!(config["rules"].as_sequence().map(|s| s.len()), Some(0));
    }

    #[test]
    fn test_build_config_rejects_non_mapping_template() {
        let dataset = dataset_with_nodes(&[]);

        let err = build_config("- a\n- b\n", &dataset, &[]).unwrap_err();
        assert!(matches!(err, HubError::InvalidDocument));

        let err = build_config("key: [", &dataset, &[]).unwrap_err();
        assert!(matches!(err, HubError::Yaml { .. }));
    }
}
