// 生成脚本处理分子模块

pub mod processor;

pub use processor::ScriptSandbox;
