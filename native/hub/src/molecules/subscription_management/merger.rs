// 订阅合并：节点按订阅顺序拼接，流量累加，过期时间取最大值

use super::model::{MergedDataset, SubscriptionResult};

const USERINFO_HEADER: &str = "Subscription-Userinfo";
const DISPOSITION_HEADER: &str = "Content-Disposition";

pub fn merge_subscriptions(results: Vec<SubscriptionResult>) -> MergedDataset {
    let mut merged = MergedDataset {
        usages: Vec::with_capacity(results.len()),
        ..Default::default()
    };

    let mut total_upload: i64 = 0;
    let mut total_download: i64 = 0;
    let mut total_quota: i64 = 0;
    let mut max_expire: i64 = 0;
    let mut names: Vec<String> = Vec::with_capacity(results.len());

    for result in results {
        merged.proxies.extend(result.proxies);

        // 流量与文件名由合并结果重新生成，其余透传头后者覆盖前者
        for (key, value) in result.transparent_headers {
            if key.eq_ignore_ascii_case(USERINFO_HEADER)
                || key.eq_ignore_ascii_case(DISPOSITION_HEADER)
            {
                continue;
            }
            merged.transparent_headers.insert(key, value);
        }

        let usage = result.usage;
        total_upload = total_upload.saturating_add(usage.upload);
        total_download = total_download.saturating_add(usage.download);
        total_quota = total_quota.saturating_add(usage.total);
        max_expire = max_expire.max(usage.expire);
        if !usage.name.is_empty() {
            names.push(usage.name.clone());
        }
        merged.usages.push(usage);
    }

    if total_quota > 0 {
        merged.transparent_headers.insert(
            USERINFO_HEADER.to_string(),
            format!(
                "upload={}; download={}; total={}; expire={}",
                total_upload, total_download, total_quota, max_expire
            ),
        );
    }

    if !names.is_empty() {
        let combined = names.join(" | ");
        merged.transparent_headers.insert(
            DISPOSITION_HEADER.to_string(),
            format!("attachment; filename*=UTF-8''{}", urlencoding::encode(&combined)),
        );
    }

    log::info!(
        "订阅合并完成：订阅{}个，节点{}个",
        merged.usages.len(),
        merged.proxies.len()
    );
    merged
}
