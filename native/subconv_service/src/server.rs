// HTTP 接口：/ping 健康检查，/sub 生成配置

use axum::Router;
use axum::extract::{RawQuery, State};
use axum::http::{HeaderName, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use std::sync::Arc;
use subconv_hub::{ConfigCoordinator, GenerateRequest, GeneratedConfig};

use crate::config::ServiceConfig;

pub struct AppState {
    coordinator: ConfigCoordinator,
    access_token: String,
    default_script_url: Option<String>,
    default_template_url: Option<String>,
}

impl AppState {
    pub fn new(coordinator: ConfigCoordinator, config: &ServiceConfig) -> Self {
        Self {
            coordinator,
            access_token: config.access_token.clone(),
            default_script_url: config.default_script_url.clone(),
            default_template_url: config.default_template_url.clone(),
        }
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/ping", get(ping))
        .route("/sub", get(sub))
        .with_state(state)
}

async fn ping() -> &'static str {
    "pong"
}

// /sub 的查询参数，sub 可重复出现
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SubQuery {
    pub subs: Vec<String>,
    pub script: Option<String>,
    pub template: Option<String>,
    pub token: String,
}

impl SubQuery {
    pub fn parse(query: &str) -> Self {
        let mut parsed = SubQuery::default();

        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                "sub" if !value.is_empty() => parsed.subs.push(value.into_owned()),
                "script" if !value.is_empty() => parsed.script = Some(value.into_owned()),
                "template" if !value.is_empty() => parsed.template = Some(value.into_owned()),
                "token" => parsed.token = value.into_owned(),
                _ => {}
            }
        }

        parsed
    }

    // 补全默认脚本与模板，缺少必要参数时返回 None
    fn into_request(self, state: &AppState) -> Option<GenerateRequest> {
        let script_url = self.script.or_else(|| state.default_script_url.clone())?;
        let template_url = self.template.or_else(|| state.default_template_url.clone())?;
        if self.subs.is_empty() {
            return None;
        }

        Some(GenerateRequest {
            subscription_urls: self.subs,
            script_url,
            template_url,
        })
    }
}

async fn sub(State(state): State<Arc<AppState>>, RawQuery(query): RawQuery) -> Response {
    let query = SubQuery::parse(query.as_deref().unwrap_or_default());

    if query.token != state.access_token {
        log::warn!("收到未授权的请求");
        return (StatusCode::UNAUTHORIZED, "Unauthorized request").into_response();
    }

    let Some(request) = query.into_request(&state) else {
        return (StatusCode::BAD_REQUEST, "sub, script and template are required").into_response();
    };

    match state.coordinator.generate(&request).await {
        Ok(generated) => config_response(generated),
        Err(e) if e.is_fatal() => {
            // 缓存无法落盘，继续服务会让缓存与磁盘不一致
            log::error!("缓存持久化失败，服务退出: {e}");
            std::process::exit(1);
        }
        Err(e) => {
            log::error!("生成配置失败: {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

fn config_response(generated: GeneratedConfig) -> Response {
    let mut response = (
        [(header::CONTENT_TYPE, "text/yaml; charset=utf-8")],
        generated.content,
    )
        .into_response();

    let headers = response.headers_mut();
    for (name, value) in &generated.headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                headers.insert(name, value);
            }
            _ => log::warn!("忽略无效的响应头: {name}"),
        }
    }

    response
}
