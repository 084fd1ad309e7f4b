//! 日志初始化
//!
//! 终端输出或按天滚动的文件输出，可选 JSON 格式。
//! 设置了 `RUST_LOG` 时优先于配置的级别。

use std::path::Path;
use tracing_subscriber::EnvFilter;

const LOG_FILE_PREFIX: &str = "fulfillment-server";

/// 开发默认：info 级别，文本格式，输出到终端
pub fn init_logger() {
    init_logger_with_file(None, None, None);
}

pub fn init_logger_with_file(log_level: Option<&str>, json: Option<bool>, log_dir: Option<&str>) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.unwrap_or("info")));
    let json = json.unwrap_or(false);

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_file(false)
        .with_line_number(false);

    let appender = log_dir.and_then(|dir| match std::fs::create_dir_all(Path::new(dir)) {
        Ok(()) => Some(tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX)),
        Err(e) => {
            eprintln!("Cannot create log dir {dir}: {e}, logging to stdout");
            None
        }
    });

    let result = match (appender, json) {
        (Some(file), true) => builder.with_writer(file).with_ansi(false).json().try_init(),
        (Some(file), false) => builder.with_writer(file).with_ansi(false).try_init(),
        (None, true) => builder.json().try_init(),
        (None, false) => builder.try_init(),
    };
    if let Err(e) = result {
        eprintln!("Logger already initialized: {e}");
    }
}
