// 订阅转换核心库
// atoms：缓存与 HTTP 等基础能力；molecules：订阅、规则集、脚本与配置构建；coordinator：流程编排

pub mod atoms;
pub mod coordinator;
pub mod error;
pub mod molecules;

pub use coordinator::{ConfigCoordinator, GenerateRequest, GeneratedConfig, PipelineOptions};
pub use error::{HubError, Result, StoreError};
