// L2 协调层模块入口

pub mod config_coordinator;

pub use config_coordinator::{
    ConfigCoordinator, GenerateRequest, GeneratedConfig, PipelineOptions,
};
