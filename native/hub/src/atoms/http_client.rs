// HTTP 访问层
// 订阅、规则集、模板和脚本都通过这里获取

use async_trait::async_trait;
use http::HeaderMap;
use http::header::USER_AGENT;
use reqwest::Client;
use std::time::Duration;

use crate::error::{HubError, Result};

// 通用文本获取的最大重试次数
pub const RETRY_COUNT: u32 = 3;
const RETRY_BACKOFF: Duration = Duration::from_millis(200);

// 单次 GET 的结果
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

// 传输层抽象，测试时替换为内存实现
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn get(&self, url: &str, user_agent: Option<&str>) -> Result<HttpResponse>;
}

pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> std::result::Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, url: &str, user_agent: Option<&str>) -> Result<HttpResponse> {
        let transport_error = |e: reqwest::Error| HubError::Transport {
            url: url.to_string(),
            message: e.to_string(),
        };

        let mut request = self.client.get(url);
        if let Some(user_agent) = user_agent {
            request = request.header(USER_AGENT, user_agent);
        }

        let response = request.send().await.map_err(transport_error)?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.text().await.map_err(transport_error)?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

// 获取远程文本：非 2xx 视为错误，传输失败或 5xx 时重试
pub async fn fetch_text(transport: &dyn HttpTransport, url: &str) -> Result<String> {
    log::info!("开始获取：{}", url);

    let mut retries = 0;
    loop {
        let result = transport.get(url, None).await.and_then(|response| {
            if response.is_success() {
                Ok(response.body)
            } else {
                Err(HubError::UpstreamStatus {
                    url: url.to_string(),
                    status: response.status,
                    body: response.body,
                })
            }
        });

        match result {
            Ok(body) => {
                log::info!("获取成功：{}，长度：{} 字节", url, body.len());
                return Ok(body);
            }
            Err(e) if e.is_transient() && retries < RETRY_COUNT => {
                retries += 1;
                log::warn!("获取失败，第 {} 次重试：{} - {}", retries, url, e);
                tokio::time::sleep(RETRY_BACKOFF * retries).await;
            }
            Err(e) => {
                log::error!("获取失败：{} - {}", url, e);
                return Err(e);
            }
        }
    }
}
