// 服务配置：全部来自环境变量，均有默认值

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use subconv_hub::atoms::DEFAULT_CACHE_EXPIRE;

const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_CACHE_PATH: &str = "./data/cache.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub listen_addr: SocketAddr,
    pub access_token: String,
    pub cache_expire: Duration,
    pub cache_path: PathBuf,
    pub default_script_url: Option<String>,
    pub default_template_url: Option<String>,
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    // 按给定的查找函数读取配置，空字符串视为未设置
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let listen_addr = get("LISTEN_ADDR").unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string());
        let listen_addr: SocketAddr = listen_addr
            .parse()
            .with_context(|| format!("LISTEN_ADDR 无效: {listen_addr}"))?;

        let cache_expire = match get("CACHE_EXPIRE_SEC") {
            None => DEFAULT_CACHE_EXPIRE,
            Some(value) => match value.trim().parse::<u64>() {
                Ok(secs) => Duration::from_secs(secs),
                Err(e) => {
                    log::warn!(
                        "CACHE_EXPIRE_SEC 无效: {value} ({e})，使用默认值 {}s",
                        DEFAULT_CACHE_EXPIRE.as_secs()
                    );
                    DEFAULT_CACHE_EXPIRE
                }
            },
        };

        if get("ACCESS_TOKEN").is_none() {
            log::warn!("未设置 ACCESS_TOKEN，/sub 接口不做鉴权");
        }

        Ok(Self {
            listen_addr,
            access_token: lookup("ACCESS_TOKEN").unwrap_or_default(),
            cache_expire,
            cache_path: PathBuf::from(
                get("CACHE_PATH").unwrap_or_else(|| DEFAULT_CACHE_PATH.to_string()),
            ),
            default_script_url: get("DEFAULT_SCRIPT_URL"),
            default_template_url: get("DEFAULT_TEMPLATE_URL"),
        })
    }
}
