// 订阅下载器
// 获取单个订阅，解析节点列表、流量信息和需要透传的响应头

use serde::Deserialize;
use serde_yaml_ng::Value as YamlValue;
use std::collections::HashMap;

use super::model::{ProxyNode, SubscriptionResult, UsageMetadata};
use crate::atoms::{HttpResponse, HttpTransport};
use crate::error::{HubError, Result};

// 订阅请求使用的客户端标识，部分机场据此返回 Clash 格式
pub const SUBSCRIPTION_USER_AGENT: &str = "clash.meta/v1.19.14";

// 原样透传给调用方的响应头
pub const CLASH_HEADERS: [&str; 4] = [
    "Content-Disposition",
    "Profile-Update-Interval",
    "Subscription-Userinfo",
    "Profile-Web-Page-Url",
];

#[derive(Deserialize)]
struct SubscriptionDocument {
    #[serde(default)]
    proxies: Vec<ProxyNode>,
}

// 下载并解析一个订阅
pub async fn download_subscription(
    transport: &dyn HttpTransport,
    url: &str,
    fallback_name: &str,
    user_agent: &str,
) -> Result<SubscriptionResult> {
    log::info!("开始下载订阅：{}", url);

    let response = transport.get(url, Some(user_agent)).await?;
    let result = parse_subscription_response(url, fallback_name, response)?;

    log::info!(
        "订阅下载成功：{}，名称：{}，节点数：{}",
        url,
        result.name(),
        result.proxies.len()
    );
    Ok(result)
}

// 解析订阅响应。非 200 视为失败，错误中保留状态码和响应体。
pub fn parse_subscription_response(
    url: &str,
    fallback_name: &str,
    response: HttpResponse,
) -> Result<SubscriptionResult> {
    if response.status != 200 {
        return Err(HubError::UpstreamStatus {
            url: url.to_string(),
            status: response.status,
            body: response.body,
        });
    }

    let document: YamlValue = serde_yaml_ng::from_str(&response.body)
        .map_err(|e| HubError::yaml(format!("订阅 {}", url), e))?;
    let proxies = if document.is_null() {
        Vec::new()
    } else {
        serde_yaml_ng::from_value::<SubscriptionDocument>(document)
            .map_err(|e| HubError::yaml(format!("订阅 {}", url), e))?
            .proxies
    };

    // 部分机场直接在头中写入 UTF-8 文件名，不能只接受可见 ASCII
    let header_str = |name: &str| {
        response
            .headers
            .get(name)
            .and_then(|v| std::str::from_utf8(v.as_bytes()).ok())
            .filter(|v| !v.is_empty())
    };

    let name = header_str("Content-Disposition")
        .and_then(extract_filename)
        .unwrap_or_else(|| fallback_name.to_string());

    let mut transparent_headers = HashMap::new();
    for header in CLASH_HEADERS {
        if let Some(value) = header_str(header) {
            transparent_headers.insert(header.to_string(), value.to_string());
        }
    }

    let mut usage = UsageMetadata {
        url: url.to_string(),
        name,
        status_code: response.status,
        ..Default::default()
    };
    if let Some(userinfo) = header_str("Subscription-Userinfo") {
        parse_subscription_userinfo(userinfo, &mut usage);
    }
    usage.raw_body = response.body;

    Ok(SubscriptionResult {
        proxies,
        transparent_headers,
        usage,
    })
}

// 从 Content-Disposition 提取文件名（去掉扩展名）。
// filename*=（RFC 2231）优先于 filename=。
pub fn extract_filename(content_disposition: &str) -> Option<String> {
    let parts: Vec<&str> = content_disposition.split(';').map(str::trim).collect();

    let extended = parts.iter().find_map(|part| part.strip_prefix("filename*="));
    if let Some(value) = extended {
        let value = match value.find("''") {
            Some(idx) => &value[idx + 2..],
            None => value,
        };
        let value = value.trim_matches('"');
        let decoded = urlencoding::decode(value)
            .map(|d| d.into_owned())
            .unwrap_or_else(|_| value.to_string());
        return non_empty(remove_extension(&decoded));
    }

    let plain = parts.iter().find_map(|part| part.strip_prefix("filename="))?;
    non_empty(remove_extension(plain.trim_matches('"')))
}

fn remove_extension(filename: &str) -> &str {
    match filename.rfind('.') {
        Some(idx) => &filename[..idx],
        None => filename,
    }
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

// 解析 Subscription-Userinfo。
// 示例：upload=0; download=123; total=1073741824; expire=1735689600
// 未知字段与无法解析的数值直接忽略。
pub fn parse_subscription_userinfo(header_value: &str, usage: &mut UsageMetadata) {
    log::debug!("解析订阅信息头：{}", header_value);

    for pair in header_value.split(';') {
        let Some((key, value)) = pair.trim().split_once('=') else {
            continue;
        };
        let Ok(value) = value.trim().parse::<i64>() else {
            continue;
        };

        match key.trim() {
            "upload" => usage.upload = value,
            "download" => usage.download = value,
            "total" => usage.total = value,
            "expire" => usage.expire = value,
            _ => {}
        }
    }
}
