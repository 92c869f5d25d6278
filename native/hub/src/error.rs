// 订阅转换核心错误类型

use thiserror::Error;

// 缓存持久化错误
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("读写缓存文件失败：{0}")]
    Io(#[from] std::io::Error),

    #[error("序列化缓存内容失败：{0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum HubError {
    // 上游返回非 2xx，保留状态码与原始响应体便于排查
    #[error("{status}\n{body}")]
    UpstreamStatus {
        url: String,
        status: u16,
        body: String,
    },

    #[error("请求 {url} 失败：{message}")]
    Transport { url: String, message: String },

    #[error("解析 {context} 失败：{source}")]
    Yaml {
        context: String,
        #[source]
        source: serde_yaml_ng::Error,
    },

    #[error("规则至少需要 2 段 [{tag}]：{line}")]
    MalformedRule { tag: String, line: String },

    #[error("配置根节点必须是 Map")]
    InvalidDocument,

    // 订阅失败时在错误前附上订阅地址
    #[error("{url}:\n{source}")]
    Subscription {
        url: String,
        #[source]
        source: Box<HubError>,
    },

    #[error("[script] {message}\n{stack}")]
    Script { message: String, stack: String },

    #[error("任务执行失败：{0}")]
    Task(String),

    #[error("缓存持久化失败：{0}")]
    Storage(#[from] StoreError),

    #[error("配置转换失败：{0}")]
    Json(#[from] serde_json::Error),
}

impl HubError {
    pub fn yaml(context: impl Into<String>, source: serde_yaml_ng::Error) -> Self {
        HubError::Yaml {
            context: context.into(),
            source,
        }
    }

    pub fn script(message: impl Into<String>, stack: impl Into<String>) -> Self {
        HubError::Script {
            message: message.into(),
            stack: stack.into(),
        }
    }

    // 基础设施故障（缓存落盘失败）不可恢复，由上层决定终止进程
    pub fn is_fatal(&self) -> bool {
        match self {
            HubError::Storage(_) => true,
            HubError::Subscription { source, .. } => source.is_fatal(),
            _ => false,
        }
    }

    // 可重试：传输层失败或上游 5xx
    pub fn is_transient(&self) -> bool {
        match self {
            HubError::Transport { .. } => true,
            HubError::UpstreamStatus { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, HubError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_status_display_keeps_body() {
        let err = HubError::UpstreamStatus {
            url: "https://example.com/sub".to_string(),
            status: 403,
            body: "forbidden".to_string(),
        };
        assert_eq!(err.to_string(), "403\nforbidden");
        assert!(!err.is_transient());
    }

    #[test]
    fn test_error_classification() {
        let io = std::io::Error::other("disk full");
        assert!(HubError::from(StoreError::from(io)).is_fatal());

        let transport = HubError::Transport {
            url: "https://example.com".to_string(),
            message: "connection reset".to_string(),
        };
        assert!(transport.is_transient());
        assert!(!transport.is_fatal());

        let gateway = HubError::UpstreamStatus {
            url: "https://example.com".to_string(),
            status: 502,
            body: String::new(),
        };
        assert!(gateway.is_transient());
    }
}
