// JavaScript 生成脚本执行器：在独立的 QuickJS 实例中运行不受信任的脚本。
// 脚本只能看到 log()，以及由宿主调用的 rulesets(r) 与 buildConfig(config)。

use rquickjs::convert::Coerced;
use rquickjs::{CatchResultExt, CaughtError, Context, Function, Runtime, Value};
use serde_json::Value as JsonValue;
use serde_yaml_ng::Value as YamlValue;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::{Duration, Instant};

use crate::error::{HubError, Result};
use crate::molecules::ruleset_resolution::RulesetDeclaration;

// 脚本中声明规则集的函数名
pub const RULESETS_FUNCTION: &str = "rulesets";
// 脚本中对最终配置做后处理的函数名
pub const BUILD_CONFIG_FUNCTION: &str = "buildConfig";

const MEMORY_LIMIT: usize = 64 * 1024 * 1024;
const MAX_STACK_SIZE: usize = 1024 * 1024;
// 每次进入脚本（顶层代码、rulesets、buildConfig）允许运行的最长时间
pub const DEFAULT_TIME_LIMIT: Duration = Duration::from_secs(30);

// JavaScript 执行器，每个请求一个实例
pub struct JsExecutor {
    runtime: Runtime,
    context: Context,
    time_limit: Duration,
    deadline: Rc<Cell<Instant>>,
}

impl JsExecutor {
    pub fn new() -> Result<Self> {
        Self::with_time_limit(DEFAULT_TIME_LIMIT)
    }

    // 创建执行器并注入 log()，超过 time_limit 的脚本调用会被中断
    pub fn with_time_limit(time_limit: Duration) -> Result<Self> {
        let runtime = Runtime::new()
            .map_err(|e| HubError::script(format!("初始化 JavaScript 运行时失败：{}", e), ""))?;
        runtime.set_memory_limit(MEMORY_LIMIT);
        runtime.set_max_stack_size(MAX_STACK_SIZE);

        let deadline = Rc::new(Cell::new(Instant::now() + time_limit));
        let watched = Rc::clone(&deadline);
        runtime.set_interrupt_handler(Some(Box::new(move || Instant::now() > watched.get())));

        let context = Context::full(&runtime)
            .map_err(|e| HubError::script(format!("初始化 JavaScript 上下文失败：{}", e), ""))?;

        context.with(|ctx| {
            let log_fn = Function::new(ctx.clone(), |message: Coerced<String>| {
                log::info!("[JS] {}", message.0);
            })
            .map_err(engine_error)?;
            ctx.globals().set("log", log_fn).map_err(engine_error)
        })?;

        Ok(Self {
            runtime,
            context,
            time_limit,
            deadline,
        })
    }

    // 每次进入脚本前重新计时
    fn arm_deadline(&self) {
        self.deadline.set(Instant::now() + self.time_limit);
    }

    // 编译并执行脚本顶层代码，语法错误在执行前即被报告
    pub fn load(&self, script: &str) -> Result<()> {
        log::info!("加载生成脚本，长度：{}字节", script.len());

        let _runtime = &self.runtime;
        self.arm_deadline();
        self.context.with(|ctx| {
            ctx.eval::<(), _>(script)
                .catch(&ctx)
                .map_err(caught_error)
        })
    }

    // 调用 rulesets(r)，收集脚本通过 r(tag, url) 声明的规则集。
    // 脚本未定义 rulesets 时返回空列表。
    pub fn collect_rulesets(&self) -> Result<Vec<RulesetDeclaration>> {
        self.context.with(|ctx| {
            let value: Value = ctx
                .globals()
                .get(RULESETS_FUNCTION)
                .catch(&ctx)
                .map_err(caught_error)?;
            let Some(rulesets_fn) = value.as_function() else {
                log::debug!("脚本未定义 {}()", RULESETS_FUNCTION);
                return Ok(Vec::new());
            };

            self.arm_deadline();
            let declarations = Rc::new(RefCell::new(Vec::new()));
            let sink = Rc::clone(&declarations);
            let register = Function::new(
                ctx.clone(),
                move |tag: Coerced<String>, url: Coerced<String>| {
                    sink.borrow_mut().push(RulesetDeclaration {
                        tag: tag.0,
                        url: url.0,
                    });
                },
            )
            .map_err(engine_error)?;

            rulesets_fn
                .call::<_, Value>((register,))
                .catch(&ctx)
                .map_err(caught_error)?;

            let collected = std::mem::take(&mut *declarations.borrow_mut());
            Ok(collected)
        })
    }

    // 把配置交给 buildConfig(config) 原地修改，函数返回值被忽略。
    // 脚本未定义 buildConfig 时返回 None。
    pub fn apply_build_config(&self, config: &YamlValue) -> Result<Option<YamlValue>> {
        let config_json = serde_json::to_string(&serde_json::to_value(config)?)?;
        log::debug!("配置转换为 JSON，长度：{}字节", config_json.len());

        let result_str = self.context.with(|ctx| -> Result<Option<String>> {
            let value: Value = ctx
                .globals()
                .get(BUILD_CONFIG_FUNCTION)
                .catch(&ctx)
                .map_err(caught_error)?;
            let Some(build_fn) = value.as_function() else {
                log::debug!("脚本未定义 {}()", BUILD_CONFIG_FUNCTION);
                return Ok(None);
            };

            let input = ctx
                .json_parse(config_json)
                .catch(&ctx)
                .map_err(caught_error)?;
            self.arm_deadline();
            build_fn
                .call::<_, Value>((input.clone(),))
                .catch(&ctx)
                .map_err(caught_error)?;

            let serialized = ctx
                .json_stringify(input)
                .catch(&ctx)
                .map_err(caught_error)?
                .ok_or_else(|| HubError::script("buildConfig 生成的配置无法序列化", ""))?;
            serialized.to_string().map(Some).map_err(engine_error)
        })?;

        let Some(result_str) = result_str else {
            return Ok(None);
        };

        let json_result: JsonValue = serde_json::from_str(&result_str)?;
        match json_result.get("proxies").and_then(|p| p.as_array()) {
            Some(proxies) => log::info!("buildConfig 返回的配置中包含{}个代理节点", proxies.len()),
            None => log::warn!("buildConfig 返回的配置中未找到 proxies 字段"),
        }

        let yaml_result: YamlValue = serde_json::from_value(json_result)?;
        Ok(Some(yaml_result))
    }
}

// 脚本抛出的异常：保留消息与调用栈
fn caught_error(caught: CaughtError<'_>) -> HubError {
    match caught {
        CaughtError::Exception(exception) => {
            let message = exception
                .message()
                .unwrap_or_else(|| "未知异常".to_string());
            let stack = exception.stack().unwrap_or_default();
            log::error!("JavaScript 执行失败：{}", message);
            HubError::script(message, stack)
        }
        other => {
            log::error!("JavaScript 执行失败：{}", other);
            HubError::script(other.to_string(), "")
        }
    }
}

fn engine_error(error: rquickjs::Error) -> HubError {
    HubError::script(format!("JavaScript 引擎错误：{}", error), "")
}
