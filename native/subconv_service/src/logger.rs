// 日志初始化：HH:MM:SS.mmm [LEVEL] [target] message

use env_logger::{Builder, Env};
use std::io::Write;

pub fn init_logger() {
    let mut builder = Builder::from_env(Env::default().default_filter_or("info"));
    builder.format(|buf, record| {
        writeln!(
            buf,
            "{} [{}] [{}] {}",
            chrono::Local::now().format("%H:%M:%S%.3f"),
            record.level(),
            record.target(),
            record.args()
        )
    });

    if let Err(e) = builder.try_init() {
        eprintln!("日志初始化失败: {e}");
    }
}
