// 测试用内存传输层：按 URL 返回预设响应，可注入延迟和失败次数

use async_trait::async_trait;
use http::{HeaderMap, HeaderName, HeaderValue};
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::http_client::{HttpResponse, HttpTransport};
use crate::error::{HubError, Result};

struct MockRoute {
    response: HttpResponse,
    delay: Duration,
    failures_left: usize,
}

#[derive(Default)]
pub struct MockTransport {
    routes: Mutex<HashMap<String, MockRoute>>,
    calls: Mutex<Vec<(String, Option<String>)>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(self, url: &str, body: &str) -> Self {
        self.route_full(url, 200, &[], body, Duration::ZERO)
    }

    pub fn route_with_status(self, url: &str, status: u16, body: &str) -> Self {
        self.route_full(url, status, &[], body, Duration::ZERO)
    }

    pub fn route_with_delay(self, url: &str, body: &str, delay: Duration) -> Self {
        self.route_full(url, 200, &[], body, delay)
    }

    pub fn route_with_headers(self, url: &str, headers: &[(&str, &str)], body: &str) -> Self {
        self.route_full(url, 200, headers, body, Duration::ZERO)
    }

    pub fn route_full(
        self,
        url: &str,
        status: u16,
        headers: &[(&str, &str)],
        body: &str,
        delay: Duration,
    ) -> Self {
        let mut header_map = HeaderMap::new();
        for (name, value) in headers {
            header_map.insert(
                HeaderName::from_bytes(name.as_bytes()).unwrap(),
                HeaderValue::from_str(value).unwrap(),
            );
        }

        self.routes.lock().unwrap().insert(
            url.to_string(),
            MockRoute {
                response: HttpResponse {
                    status,
                    headers: header_map,
                    body: body.to_string(),
                },
                delay,
                failures_left: 0,
            },
        );
        self
    }

    // 前 times 次请求返回传输错误
    pub fn fail_first(self, url: &str, times: usize) -> Self {
        if let Some(route) = self.routes.lock().unwrap().get_mut(url) {
            route.failures_left = times;
        }
        self
    }

    pub fn call_count(&self, url: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(called, _)| called == url)
            .count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn user_agent_of(&self, url: &str) -> Option<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .find(|(called, _)| called == url)
            .and_then(|(_, user_agent)| user_agent.clone())
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn get(&self, url: &str, user_agent: Option<&str>) -> Result<HttpResponse> {
        self.calls
            .lock()
            .unwrap()
            .push((url.to_string(), user_agent.map(str::to_string)));

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        let (delay, outcome) = {
            let mut routes = self.routes.lock().unwrap();
            match routes.get_mut(url) {
                None => (
                    Duration::ZERO,
                    Err(HubError::Transport {
                        url: url.to_string(),
                        message: "no route".to_string(),
                    }),
                ),
                Some(route) if route.failures_left > 0 => {
                    route.failures_left -= 1;
                    (
                        route.delay,
                        Err(HubError::Transport {
                            url: url.to_string(),
                            message: "connection reset".to_string(),
                        }),
                    )
                }
                Some(route) => (route.delay, Ok(route.response.clone())),
            }
        };

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        outcome
    }
}
